use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use sceneconfig::LessonKind;

#[derive(Parser, Debug)]
#[command(
    name = "glprimer",
    author,
    version,
    about = "Introductory OpenGL lessons rendered in a window",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Scene configuration TOML file.
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Lesson to render: `triangle`, `textured`, or `transform`.
    #[arg(long, value_name = "LESSON", value_parser = parse_lesson, global = true)]
    pub lesson: Option<LessonKind>,

    /// Vertex shader source file (requires `--fragment`).
    #[arg(long, value_name = "PATH", global = true)]
    pub vertex: Option<PathBuf>,

    /// Fragment shader source file (requires `--vertex`).
    #[arg(long, value_name = "PATH", global = true)]
    pub fragment: Option<PathBuf>,

    /// Texture image bound to the next free unit; repeat for a second texture.
    #[arg(long = "texture", value_name = "PATH", global = true)]
    pub textures: Vec<PathBuf>,

    /// Window size (e.g. `800x600`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size, global = true)]
    pub size: Option<(u32, u32)>,

    /// Window title.
    #[arg(long, value_name = "TITLE", global = true)]
    pub title: Option<String>,

    /// Swap buffers without waiting for the display refresh.
    #[arg(long, global = true)]
    pub no_vsync: bool,

    /// Draw polygons as outlines.
    #[arg(long, global = true)]
    pub wireframe: bool,

    /// Close the window after this long (e.g. `5s`, `1m 30s`).
    #[arg(long, value_name = "DURATION", value_parser = parse_duration, global = true)]
    pub run_for: Option<Duration>,

    /// Freeze animation time at this many seconds.
    #[arg(long, value_name = "SECONDS", global = true)]
    pub fixed_time: Option<f32>,

    /// Directory relative shader and texture paths are resolved against.
    #[arg(long, value_name = "DIR", global = true)]
    pub assets: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate the configuration and that every shader and texture is readable.
    Check,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_lesson(value: &str) -> Result<LessonKind, String> {
    if value.trim().is_empty() {
        return Err("lesson must not be empty".to_string());
    }
    value.parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 800x600".to_string())?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in size '{trimmed}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in size '{trimmed}'"))?;

    if width == 0 || height == 0 {
        return Err("window dimensions must be greater than zero".to_string());
    }

    Ok((width, height))
}

pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let trimmed = value.trim();
    let duration = match trimmed.parse::<f64>() {
        Ok(seconds) if seconds.is_sign_negative() => {
            return Err(format!("duration '{trimmed}' must be non-negative"))
        }
        Ok(seconds) => Duration::try_from_secs_f64(seconds)
            .map_err(|err| format!("invalid duration '{trimmed}': {err}"))?,
        Err(_) => humantime::parse_duration(trimmed)
            .map_err(|err| format!("invalid duration '{trimmed}': {err}"))?,
    };
    if duration.is_zero() {
        return Err("duration must be greater than zero".to_string());
    }
    Ok(duration)
}
