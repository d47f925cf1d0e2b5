use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::Deserialize;

pub const CONFIG_VERSION: u32 = 1;

/// Texture units the lessons bind samplers to.
pub const MAX_LESSON_TEXTURES: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonKind {
    #[default]
    Triangle,
    Textured,
    Transform,
}

impl LessonKind {
    pub const ALL: [LessonKind; 3] = [Self::Triangle, Self::Textured, Self::Transform];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Triangle => "triangle",
            Self::Textured => "textured",
            Self::Transform => "transform",
        }
    }

    pub fn uses_textures(self) -> bool {
        !matches!(self, Self::Triangle)
    }
}

impl fmt::Display for LessonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LessonKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| {
                format!("unknown lesson '{raw}'; expected one of: triangle, textured, transform")
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapMode {
    #[default]
    Repeat,
    MirroredRepeat,
    ClampToEdge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    Linear,
    Nearest,
}

/// RGBA clear colour with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearColor(pub [f32; 4]);

impl Default for ClearColor {
    fn default() -> Self {
        Self([0.2, 0.3, 0.3, 1.0])
    }
}

impl FromStr for ClearColor {
    type Err = String;

    /// Parses `#rrggbb` or `#rrggbbaa`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let hex = trimmed
            .strip_prefix('#')
            .ok_or_else(|| format!("colour '{trimmed}' must start with '#'"))?;
        if !matches!(hex.len(), 6 | 8) || !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(format!(
                "colour '{trimmed}' must be #rrggbb or #rrggbbaa hexadecimal"
            ));
        }
        let mut rgba = [1.0f32; 4];
        for (slot, index) in rgba.iter_mut().zip((0..hex.len()).step_by(2)) {
            let byte = u8::from_str_radix(&hex[index..index + 2], 16)
                .map_err(|err| format!("colour '{trimmed}': {err}"))?;
            *slot = f32::from(byte) / 255.0;
        }
        Ok(Self(rgba))
    }
}

impl<'de> Deserialize<'de> for ClearColor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            Str(String),
            List(Vec<f32>),
        }

        match Helper::deserialize(deserializer)? {
            Helper::Str(raw) => raw.parse().map_err(de::Error::custom),
            Helper::List(values) => match values.as_slice() {
                [r, g, b] => Ok(Self([*r, *g, *b, 1.0])),
                [r, g, b, a] => Ok(Self([*r, *g, *b, *a])),
                other => Err(de::Error::custom(format!(
                    "colour list must have 3 or 4 components, got {}",
                    other.len()
                ))),
            },
        }
    }
}

/// OpenGL version written as `"major.minor"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlVersionSetting {
    pub major: u8,
    pub minor: u8,
}

impl Default for GlVersionSetting {
    fn default() -> Self {
        Self { major: 3, minor: 3 }
    }
}

impl FromStr for GlVersionSetting {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let (major, minor) = trimmed
            .split_once('.')
            .ok_or_else(|| format!("GL version '{trimmed}' must look like 3.3"))?;
        let major = major
            .parse()
            .map_err(|_| format!("GL version '{trimmed}' has an invalid major number"))?;
        let minor = minor
            .parse()
            .map_err(|_| format!("GL version '{trimmed}' has an invalid minor number"))?;
        Ok(Self { major, minor })
    }
}

impl<'de> Deserialize<'de> for GlVersionSetting {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneConfig {
    pub version: u32,
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub render: RenderSection,
    #[serde(default)]
    pub lesson: LessonSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowSection {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub vsync: bool,
    pub gl_version: GlVersionSetting,
}

impl Default for WindowSection {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "LearnOpenGL".to_string(),
            vsync: true,
            gl_version: GlVersionSetting::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSection {
    pub clear_color: ClearColor,
    pub wireframe: bool,
    #[serde(deserialize_with = "deserialize_duration_opt")]
    pub run_for: Option<Duration>,
    /// Freeze animation time at this many seconds.
    pub fixed_time: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LessonSection {
    pub kind: LessonKind,
    pub vertex_shader: Option<PathBuf>,
    pub fragment_shader: Option<PathBuf>,
    pub textures: Vec<TextureEntry>,
    /// Blend factor between the two lesson textures.
    pub mix: f32,
}

impl Default for LessonSection {
    fn default() -> Self {
        Self {
            kind: LessonKind::default(),
            vertex_shader: None,
            fragment_shader: None,
            textures: Vec::new(),
            mix: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextureEntry {
    pub path: PathBuf,
    #[serde(default = "default_flip")]
    pub flip_vertically: bool,
    #[serde(default)]
    pub wrap: WrapMode,
    #[serde(default)]
    pub filter: FilterMode,
}

impl TextureEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            flip_vertically: default_flip(),
            wrap: WrapMode::default(),
            filter: FilterMode::default(),
        }
    }
}

fn default_flip() -> bool {
    true
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Duration::try_from_secs_f64(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration {v}: {err}")))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            window: WindowSection::default(),
            render: RenderSection::default(),
            lesson: LessonSection::default(),
        }
    }
}

impl SceneConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: SceneConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads, parses, and validates `path`, resolving relative asset paths
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::load_from(path, base)
    }

    /// Like [`SceneConfig::load`], but relative paths are joined onto `base`.
    pub fn load_from(path: &Path, base: &Path) -> Result<Self, ConfigError> {
        let input = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&input)?;
        config.resolve_paths(base);
        Ok(config)
    }

    /// Joins every relative shader and texture path onto `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let lesson = &mut self.lesson;
        for path in lesson
            .vertex_shader
            .iter_mut()
            .chain(lesson.fragment_shader.iter_mut())
            .chain(lesson.textures.iter_mut().map(|entry| &mut entry.path))
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected {CONFIG_VERSION}",
                self.version
            )));
        }

        let window = &self.window;
        if window.width == 0 || window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size must be non-zero, got {}x{}",
                window.width, window.height
            )));
        }
        let gl = window.gl_version;
        if (gl.major, gl.minor) < (3, 3) {
            return Err(ConfigError::Invalid(format!(
                "window.gl_version {}.{} is too old; core profile 3.3 or newer is required",
                gl.major, gl.minor
            )));
        }

        let render = &self.render;
        if render
            .clear_color
            .0
            .iter()
            .any(|component| !(0.0..=1.0).contains(component))
        {
            return Err(ConfigError::Invalid(
                "render.clear_color components must be within 0.0..=1.0".into(),
            ));
        }
        if render.run_for.is_some_and(|duration| duration.is_zero()) {
            return Err(ConfigError::Invalid(
                "render.run_for must be greater than zero".into(),
            ));
        }
        if let Some(time) = render.fixed_time {
            if !time.is_finite() || time < 0.0 {
                return Err(ConfigError::Invalid(
                    "render.fixed_time must be a finite, non-negative number of seconds".into(),
                ));
            }
        }

        let lesson = &self.lesson;
        if lesson.vertex_shader.is_some() != lesson.fragment_shader.is_some() {
            return Err(ConfigError::Invalid(
                "lesson.vertex_shader and lesson.fragment_shader must be set together".into(),
            ));
        }
        if !(0.0..=1.0).contains(&lesson.mix) {
            return Err(ConfigError::Invalid(format!(
                "lesson.mix must be within 0.0..=1.0, got {}",
                lesson.mix
            )));
        }
        if lesson.textures.len() > MAX_LESSON_TEXTURES {
            return Err(ConfigError::Invalid(format!(
                "lesson.textures supports at most {MAX_LESSON_TEXTURES} entries, got {}",
                lesson.textures.len()
            )));
        }
        for entry in &lesson.textures {
            if entry.path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(
                    "lesson.textures contains an entry with an empty path".into(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
version = 1

[window]
width = 1024
height = 768
title = "Textures"
vsync = false
gl_version = "4.1"

[render]
clear_color = "#334d4d"
wireframe = true
run_for = "2s 500ms"

[lesson]
kind = "textured"
vertex_shader = "shaders/textured.vert"
fragment_shader = "shaders/textured.frag"
mix = 0.4

[[lesson.textures]]
path = "textures/container.jpg"
wrap = "clamp_to_edge"
filter = "nearest"

[[lesson.textures]]
path = "/abs/awesomeface.png"
flip_vertically = false
"##;

    #[test]
    fn parses_sample_config() {
        let config = SceneConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.window.width, 1024);
        assert!(!config.window.vsync);
        assert_eq!(config.window.gl_version, GlVersionSetting { major: 4, minor: 1 });
        assert!(config.render.wireframe);
        assert_eq!(config.render.run_for, Some(Duration::from_millis(2500)));
        assert_eq!(config.lesson.kind, LessonKind::Textured);
        assert_eq!(config.lesson.mix, 0.4);

        let first = &config.lesson.textures[0];
        assert_eq!(first.wrap, WrapMode::ClampToEdge);
        assert_eq!(first.filter, FilterMode::Nearest);
        assert!(first.flip_vertically);
        assert!(!config.lesson.textures[1].flip_vertically);
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = SceneConfig::from_toml_str("version = 1").unwrap();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.window.title, "LearnOpenGL");
        assert_eq!(config.render.clear_color, ClearColor::default());
        assert_eq!(config.lesson.kind, LessonKind::Triangle);
        assert!(config.lesson.textures.is_empty());
    }

    #[test]
    fn clear_color_accepts_hex_and_lists() {
        let hex: ClearColor = "#ff000080".parse().unwrap();
        assert_eq!(hex.0[0], 1.0);
        assert!((hex.0[3] - 128.0 / 255.0).abs() < 1e-6);

        let config = SceneConfig::from_toml_str(
            r#"
version = 1
[render]
clear_color = [0.1, 0.2, 0.3]
"#,
        )
        .unwrap();
        assert_eq!(config.render.clear_color, ClearColor([0.1, 0.2, 0.3, 1.0]));

        assert!("334d4d".parse::<ClearColor>().is_err());
        assert!("#12345".parse::<ClearColor>().is_err());
    }

    #[test]
    fn rejects_unsupported_version() {
        let err = SceneConfig::from_toml_str("version = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_out_of_range_values() {
        for body in [
            "[window]\nwidth = 0",
            "[window]\ngl_version = \"2.1\"",
            "[render]\nclear_color = [1.5, 0.0, 0.0]",
            "[render]\nrun_for = 0",
            "[render]\nfixed_time = -1.0",
            "[lesson]\nmix = 2.0",
            "[lesson]\nvertex_shader = \"only.vert\"",
        ] {
            let err = SceneConfig::from_toml_str(&format!("version = 1\n{body}")).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{body}: {err}");
        }
    }

    #[test]
    fn rejects_run_for_beyond_duration_range() {
        for value in ["inf", "nan", "1e30", "-1.5"] {
            let input = format!("version = 1\n[render]\nrun_for = {value}");
            let err = SceneConfig::from_toml_str(&input).unwrap_err();
            assert!(matches!(err, ConfigError::Parse(_)), "{value}: {err}");
        }
    }

    #[test]
    fn rejects_too_many_textures() {
        let config = r#"
version = 1
[lesson]
kind = "textured"
textures = [{ path = "a.png" }, { path = "b.png" }, { path = "c.png" }]
"#;
        let err = SceneConfig::from_toml_str(config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_keys_fail_to_parse() {
        let err = SceneConfig::from_toml_str("version = 1\n[window]\nfullscreen = true").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn lesson_kind_parses_case_insensitively() {
        assert_eq!("Transform".parse::<LessonKind>(), Ok(LessonKind::Transform));
        assert!("cube".parse::<LessonKind>().is_err());
        assert!(!LessonKind::Triangle.uses_textures());
    }

    #[test]
    fn load_resolves_relative_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("scene.toml");
        fs::write(&path, SAMPLE).unwrap();

        let config = SceneConfig::load(&path).unwrap();
        assert_eq!(
            config.lesson.vertex_shader.as_deref(),
            Some(dir.path().join("shaders/textured.vert").as_path())
        );
        assert_eq!(
            config.lesson.textures[0].path,
            dir.path().join("textures/container.jpg")
        );
        assert_eq!(config.lesson.textures[1].path, Path::new("/abs/awesomeface.png"));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = SceneConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
