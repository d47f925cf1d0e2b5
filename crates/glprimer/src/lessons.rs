//! The three lesson scenes: a vertex-coloured triangle, a textured quad
//! blending two textures, and the same quad rotating over time.

use anyhow::{Context, Result};
use glam::{Mat4, Vec3};
use renderer::{
    DrawCall, GlDriver, ImageData, Mesh, RenderContext, RenderError, Scene, ShaderProgram, Texture,
    TextureOptions, TimeSample, VertexLayout,
};
use sceneconfig::LessonKind;

use crate::settings::{texture_options, LessonPlan, ShaderSource};

pub const TRIANGLE_VERTEX: &str = include_str!("../shaders/triangle.vert");
pub const TRIANGLE_FRAGMENT: &str = include_str!("../shaders/triangle.frag");
pub const TEXTURED_VERTEX: &str = include_str!("../shaders/textured.vert");
pub const TEXTURED_FRAGMENT: &str = include_str!("../shaders/textured.frag");
pub const TRANSFORM_VERTEX: &str = include_str!("../shaders/transform.vert");

/// Position and colour per vertex.
#[rustfmt::skip]
pub const TRIANGLE_VERTICES: [f32; 18] = [
    // positions        // colours
    -0.5, -0.5, 0.0,    1.0, 0.0, 0.0,
     0.5, -0.5, 0.0,    0.0, 1.0, 0.0,
     0.0,  0.5, 0.0,    0.0, 0.0, 1.0,
];

/// Position, colour, and texture coordinate per corner.
#[rustfmt::skip]
pub const QUAD_VERTICES: [f32; 32] = [
    // positions        // colours        // uv
     0.5,  0.5, 0.0,    1.0, 0.0, 0.0,    1.0, 1.0,
     0.5, -0.5, 0.0,    0.0, 1.0, 0.0,    1.0, 0.0,
    -0.5, -0.5, 0.0,    0.0, 0.0, 1.0,    0.0, 0.0,
    -0.5,  0.5, 0.0,    1.0, 1.0, 0.0,    0.0, 1.0,
];

pub const QUAD_INDICES: [u32; 6] = [0, 1, 3, 1, 2, 3];

/// Sampler uniform names, indexed by texture unit.
pub const SAMPLER_UNIFORMS: [&str; 2] = ["texture1", "texture2"];

/// Built-in `(vertex, fragment)` sources for a lesson.
pub fn builtin_sources(kind: LessonKind) -> (&'static str, &'static str) {
    match kind {
        LessonKind::Triangle => (TRIANGLE_VERTEX, TRIANGLE_FRAGMENT),
        LessonKind::Textured => (TEXTURED_VERTEX, TEXTURED_FRAGMENT),
        LessonKind::Transform => (TRANSFORM_VERTEX, TEXTURED_FRAGMENT),
    }
}

/// Model matrix for the transform lesson: rotate about Z, then move to the
/// bottom-right quadrant.
pub fn transform_at(seconds: f32) -> Mat4 {
    Mat4::from_translation(Vec3::new(0.5, -0.5, 0.0)) * Mat4::from_rotation_z(seconds)
}

pub enum LessonScene<G: GlDriver> {
    Triangle(TriangleLesson<G>),
    Textured(TexturedLesson<G>),
    Transform(TransformLesson<G>),
}

impl<G: GlDriver> LessonScene<G> {
    pub fn build(ctx: &RenderContext<G>, plan: &LessonPlan) -> Result<Self> {
        let program = build_program(ctx, plan)?;
        let scene = match plan.kind {
            LessonKind::Triangle => Self::Triangle(TriangleLesson::new(ctx, program)?),
            LessonKind::Textured => Self::Textured(TexturedLesson::new(ctx, program, plan)?),
            LessonKind::Transform => Self::Transform(TransformLesson {
                quad: TexturedLesson::new(ctx, program, plan)?,
            }),
        };
        tracing::info!(lesson = %plan.kind, "lesson ready");
        Ok(scene)
    }
}

impl<G: GlDriver> Scene<G> for LessonScene<G> {
    fn render(&mut self, ctx: &RenderContext<G>, time: TimeSample) -> Result<()> {
        match self {
            Self::Triangle(lesson) => lesson.draw(ctx)?,
            Self::Textured(lesson) => lesson.draw(ctx)?,
            Self::Transform(lesson) => lesson.draw(ctx, time)?,
        }
        Ok(())
    }
}

fn build_program<G: GlDriver>(
    ctx: &RenderContext<G>,
    plan: &LessonPlan,
) -> Result<ShaderProgram<G>> {
    let program = match &plan.shaders {
        ShaderSource::Builtin => {
            let (vertex, fragment) = builtin_sources(plan.kind);
            ShaderProgram::from_sources(ctx, plan.kind.as_str(), vertex, fragment)
        }
        ShaderSource::Files { vertex, fragment } => {
            tracing::debug!(
                vertex = %vertex.display(),
                fragment = %fragment.display(),
                "loading shader sources"
            );
            ShaderProgram::from_files(ctx, vertex, fragment)
        }
    };
    program.with_context(|| format!("failed to build shader program for the {} lesson", plan.kind))
}

pub struct TriangleLesson<G: GlDriver> {
    program: ShaderProgram<G>,
    mesh: Mesh<G>,
}

impl<G: GlDriver> TriangleLesson<G> {
    pub fn new(ctx: &RenderContext<G>, program: ShaderProgram<G>) -> Result<Self> {
        let mesh = Mesh::new(ctx, &TRIANGLE_VERTICES, None, &VertexLayout::position_color())
            .context("failed to upload triangle vertices")?;
        Ok(Self { program, mesh })
    }

    pub fn draw(&self, ctx: &RenderContext<G>) -> Result<(), RenderError> {
        ctx.draw(&DrawCall::new(&self.program, &self.mesh))
    }
}

pub struct TexturedLesson<G: GlDriver> {
    program: ShaderProgram<G>,
    mesh: Mesh<G>,
    /// Textures that loaded, with the unit each one is bound to.
    textures: Vec<(u32, Texture<G>)>,
    mix: f32,
}

impl<G: GlDriver> TexturedLesson<G> {
    pub fn new(ctx: &RenderContext<G>, program: ShaderProgram<G>, plan: &LessonPlan) -> Result<Self> {
        let mesh = Mesh::new(
            ctx,
            &QUAD_VERTICES,
            Some(&QUAD_INDICES[..]),
            &VertexLayout::position_color_uv(),
        )
        .context("failed to upload quad geometry")?;

        let textures = if plan.textures.is_empty() {
            fallback_textures(ctx)?
        } else {
            load_textures(ctx, plan)
        };

        program.use_program();
        for (unit, name) in SAMPLER_UNIFORMS.iter().enumerate() {
            program.set_uniform(name, unit as i32);
        }
        program.set_uniform("mixValue", plan.mix);

        Ok(Self {
            program,
            mesh,
            textures,
            mix: plan.mix,
        })
    }

    pub fn program(&self) -> &ShaderProgram<G> {
        &self.program
    }

    pub fn draw(&self, ctx: &RenderContext<G>) -> Result<(), RenderError> {
        self.program.use_program();
        self.program.set_uniform("mixValue", self.mix);
        let bindings: Vec<(u32, &Texture<G>)> = self
            .textures
            .iter()
            .map(|(unit, texture)| (*unit, texture))
            .collect();
        ctx.draw(&DrawCall::new(&self.program, &self.mesh).with_textures(&bindings))
    }
}

/// Loads each configured texture onto its unit, skipping ones that fail.
fn load_textures<G: GlDriver>(ctx: &RenderContext<G>, plan: &LessonPlan) -> Vec<(u32, Texture<G>)> {
    let mut textures = Vec::with_capacity(plan.textures.len());
    for (unit, entry) in plan.textures.iter().enumerate() {
        match Texture::from_path(ctx, &entry.path, &texture_options(entry)) {
            Ok(texture) => textures.push((unit as u32, texture)),
            Err(err) => tracing::warn!(
                unit,
                path = %entry.path.display(),
                "continuing without texture: {err}"
            ),
        }
    }
    textures
}

/// Two generated checkerboards used when no texture files are configured.
fn fallback_textures<G: GlDriver>(ctx: &RenderContext<G>) -> Result<Vec<(u32, Texture<G>)>> {
    let options = TextureOptions::default();
    let wood = ImageData::checkerboard(64, 8, [181, 130, 76, 255], [120, 78, 40, 255]);
    let dots = ImageData::checkerboard(64, 16, [255, 214, 0, 255], [255, 255, 255, 0]);
    let first = Texture::from_image(ctx, &wood, &options).context("failed to upload fallback texture")?;
    let second = Texture::from_image(ctx, &dots, &options).context("failed to upload fallback texture")?;
    tracing::debug!("no textures configured; using generated checkerboards");
    Ok(vec![(0, first), (1, second)])
}

pub struct TransformLesson<G: GlDriver> {
    quad: TexturedLesson<G>,
}

impl<G: GlDriver> TransformLesson<G> {
    pub fn draw(&self, ctx: &RenderContext<G>, time: TimeSample) -> Result<(), RenderError> {
        let program = self.quad.program();
        program.use_program();
        program.set_uniform("transform", transform_at(time.seconds));
        self.quad.draw(ctx)
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;
    use std::rc::Rc;

    use glam::Vec4;
    use renderer::testing::FakeGl;
    use sceneconfig::TextureEntry;
    use tempfile::TempDir;

    use super::*;

    fn context() -> (Rc<FakeGl>, RenderContext<FakeGl>) {
        let gl = Rc::new(FakeGl::new());
        let ctx = RenderContext::new(gl.clone());
        (gl, ctx)
    }

    fn plan(kind: LessonKind, textures: Vec<TextureEntry>) -> LessonPlan {
        LessonPlan {
            kind,
            shaders: ShaderSource::Builtin,
            textures,
            mix: 0.35,
        }
    }

    fn units(lesson: &TexturedLesson<FakeGl>) -> Vec<u32> {
        lesson.textures.iter().map(|(unit, _)| *unit).collect()
    }

    #[test]
    fn triangle_vertices_match_position_color_layout() {
        let layout = VertexLayout::position_color();
        assert_eq!(layout.floats_per_vertex(), 6);
        assert_eq!(TRIANGLE_VERTICES.len() / layout.floats_per_vertex(), 3);
    }

    #[test]
    fn quad_indices_cover_four_corners() {
        let layout = VertexLayout::position_color_uv();
        let corners = QUAD_VERTICES.len() / layout.floats_per_vertex();
        assert_eq!(corners, 4);
        assert!(QUAD_INDICES.iter().all(|&index| (index as usize) < corners));
        assert_eq!(QUAD_INDICES.len() % 3, 0);
    }

    #[test]
    fn transform_starts_as_translation() {
        let origin = transform_at(0.0) * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!((origin - Vec4::new(0.5, -0.5, 0.0, 1.0)).length() < 1e-6);
    }

    #[test]
    fn transform_rotates_counter_clockwise() {
        let corner = transform_at(FRAC_PI_2) * Vec4::new(0.5, 0.0, 0.0, 1.0);
        assert!((corner - Vec4::new(0.5, 0.0, 0.0, 1.0)).length() < 1e-5);
    }

    #[test]
    fn builtin_sources_declare_lesson_uniforms() {
        let (vertex, fragment) = builtin_sources(LessonKind::Transform);
        assert!(vertex.contains("uniform mat4 transform;"));
        for name in SAMPLER_UNIFORMS {
            assert!(fragment.contains(&format!("uniform sampler2D {name};")));
        }
        assert!(fragment.contains("uniform float mixValue;"));

        let (vertex, fragment) = builtin_sources(LessonKind::Triangle);
        assert!(vertex.contains("out vec3 ourColor;"));
        assert!(fragment.contains("in vec3 ourColor;"));
    }

    #[test]
    fn triangle_scene_draws_three_vertices() {
        let (gl, ctx) = context();
        let mut scene = LessonScene::build(&ctx, &plan(LessonKind::Triangle, Vec::new())).unwrap();
        scene.render(&ctx, TimeSample::new(0.0, 0)).unwrap();

        let draws = gl.draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].count, 3);
        assert!(!draws[0].indexed);
        assert_eq!(gl.created_textures(), 0);
    }

    #[test]
    fn unreadable_texture_is_skipped_and_the_rest_kept() {
        let dir = TempDir::new().unwrap();
        let face = dir.path().join("face.png");
        image::RgbaImage::new(4, 2).save(&face).unwrap();
        let textures = vec![
            TextureEntry::new(dir.path().join("absent.png")),
            TextureEntry::new(face),
        ];

        let (gl, ctx) = context();
        let mut scene = LessonScene::build(&ctx, &plan(LessonKind::Textured, textures)).unwrap();
        let LessonScene::Textured(lesson) = &scene else {
            panic!("expected the textured lesson");
        };
        assert_eq!(units(lesson), vec![1]);
        assert_eq!(lesson.textures[0].1.size(), (4, 2));
        assert_eq!(gl.uploads(), 1);

        scene.render(&ctx, TimeSample::new(0.0, 0)).unwrap();
        assert_eq!(gl.bound_texture(0), None);
        assert!(gl.bound_texture(1).is_some());
        assert_eq!(gl.draws().len(), 1);
    }

    #[test]
    fn no_configured_textures_uses_two_checkerboards() {
        let (gl, ctx) = context();
        let scene = LessonScene::build(&ctx, &plan(LessonKind::Textured, Vec::new())).unwrap();
        let LessonScene::Textured(lesson) = &scene else {
            panic!("expected the textured lesson");
        };
        assert_eq!(units(lesson), vec![0, 1]);
        assert_eq!(gl.uploads(), 2);
        for (_, texture) in &lesson.textures {
            assert_eq!(texture.size(), (64, 64));
        }
    }

    #[test]
    fn textured_scene_sets_samplers_and_mix() {
        let (gl, ctx) = context();
        let scene = LessonScene::build(&ctx, &plan(LessonKind::Textured, Vec::new())).unwrap();
        let LessonScene::Textured(lesson) = &scene else {
            panic!("expected the textured lesson");
        };
        let program = lesson.program().handle().unwrap();

        assert_eq!(gl.uniform_floats(program, "texture1"), vec![0.0]);
        assert_eq!(gl.uniform_floats(program, "texture2"), vec![1.0]);
        assert_eq!(gl.uniform_floats(program, "mixValue"), vec![0.35]);
        ctx.check_error().unwrap();
    }

    #[test]
    fn transform_scene_uploads_matrix_for_frame_time() {
        let (gl, ctx) = context();
        let mut scene = LessonScene::build(&ctx, &plan(LessonKind::Transform, Vec::new())).unwrap();
        scene.render(&ctx, TimeSample::new(FRAC_PI_2, 7)).unwrap();

        let LessonScene::Transform(lesson) = &scene else {
            panic!("expected the transform lesson");
        };
        let program = lesson.quad.program().handle().unwrap();
        assert_eq!(
            gl.uniform_floats(program, "transform"),
            transform_at(FRAC_PI_2).to_cols_array().to_vec()
        );
        let draws = gl.draws();
        assert_eq!(draws.len(), 1);
        assert!(draws[0].indexed);
        assert_eq!(draws[0].count, QUAD_INDICES.len() as i32);
    }
}
