//! Shader programs: compile two stages, link them, activate, set uniforms.
//!
//! Construction short-circuits on the first failing step and returns a
//! [`RenderError`] carrying the stage and a bounded driver diagnostic, so
//! the caller decides whether running without the program is acceptable.
//! Intermediate stage objects never outlive construction, and the linked
//! program is released exactly once, either explicitly or on drop.

use std::fs;
use std::path::Path;
use std::rc::Rc;

use glam::{Mat4, Vec4};

use crate::context::RenderContext;
use crate::driver::GlDriver;
use crate::error::{bounded_info_log, RenderError, ShaderStage};

/// Value accepted by [`ShaderProgram::set_uniform`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    /// Uploaded as an int (`0` or `1`), the way GLSL `bool` uniforms are set.
    Bool(bool),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for UniformValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec4> for UniformValue {
    fn from(value: Vec4) -> Self {
        Self::Vec4(value)
    }
}

impl From<Mat4> for UniformValue {
    fn from(value: Mat4) -> Self {
        Self::Mat4(value)
    }
}

/// Shape of a uniform to read back with [`ShaderProgram::read_uniform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Int,
    Float,
    Vec4,
    Mat4,
}

/// A linked vertex + fragment program owned by the driver.
pub struct ShaderProgram<G: GlDriver> {
    gl: Rc<G>,
    handle: Option<G::Program>,
    label: String,
}

impl<G: GlDriver> ShaderProgram<G> {
    /// Reads both stage sources from disk and builds the program.
    ///
    /// A read failure is reported before any driver object is created.
    pub fn from_files(
        ctx: &RenderContext<G>,
        vertex_path: &Path,
        fragment_path: &Path,
    ) -> Result<Self, RenderError> {
        let vertex_source = read_source(vertex_path)?;
        let fragment_source = read_source(fragment_path)?;
        let label = fragment_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "program".to_string());
        Self::from_sources(ctx, &label, &vertex_source, &fragment_source)
    }

    /// Compiles and links the two stages.
    pub fn from_sources(
        ctx: &RenderContext<G>,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, RenderError> {
        let gl = ctx.driver();

        let vertex = compile_stage(gl.as_ref(), label, ShaderStage::Vertex, vertex_source)?;
        let fragment =
            match compile_stage(gl.as_ref(), label, ShaderStage::Fragment, fragment_source) {
                Ok(fragment) => fragment,
                Err(err) => {
                    gl.delete_shader(vertex);
                    return Err(err);
                }
            };

        let program = match gl.create_program() {
            Ok(program) => program,
            Err(message) => {
                gl.delete_shader(vertex);
                gl.delete_shader(fragment);
                tracing::error!(program = label, %message, "failed to create shader program");
                return Err(RenderError::Driver(message));
            }
        };

        gl.attach_shader(program, vertex);
        gl.attach_shader(program, fragment);
        gl.link_program(program);
        let linked = gl.program_linked(program);
        let link_log = (!linked).then(|| bounded_info_log(&gl.program_info_log(program)));

        for stage in [vertex, fragment] {
            gl.detach_shader(program, stage);
            gl.delete_shader(stage);
        }

        if let Some(log) = link_log {
            gl.delete_program(program);
            tracing::error!(program = label, diagnostic = %log, "shader program failed to link");
            return Err(RenderError::ProgramLink { log });
        }

        tracing::debug!(program = label, handle = ?program, "linked shader program");
        Ok(Self {
            gl,
            handle: Some(program),
            label: label.to_string(),
        })
    }

    /// Driver handle, or `None` once the program has been released.
    pub fn handle(&self) -> Option<G::Program> {
        self.handle
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_released(&self) -> bool {
        self.handle.is_none()
    }

    /// Makes this program the active pipeline for subsequent draws.
    pub fn use_program(&self) {
        match self.handle {
            Some(program) => self.gl.use_program(Some(program)),
            None => tracing::warn!(program = %self.label, "ignoring use of released program"),
        }
    }

    /// Looks up `name` in the linked program.
    ///
    /// Returns `None` when the program does not declare the uniform (or the
    /// compiler optimised it away) or the program has been released.
    pub fn uniform_location(&self, name: &str) -> Option<G::UniformLocation> {
        let program = self.handle?;
        self.gl.uniform_location(program, name)
    }

    /// Uploads `value` to the uniform called `name`.
    ///
    /// The name is resolved on every call. Unknown names are a silent no-op,
    /// matching driver behaviour for the invalid location; use
    /// [`Self::uniform_location`] to tell the two cases apart. The upload
    /// targets the active program, so call [`Self::use_program`] first.
    pub fn set_uniform(&self, name: &str, value: impl Into<UniformValue>) {
        let Some(location) = self.uniform_location(name) else {
            tracing::trace!(program = %self.label, uniform = name, "uniform not found; skipping");
            return;
        };
        match value.into() {
            UniformValue::Int(value) => self.gl.set_uniform_i32(&location, value),
            UniformValue::Float(value) => self.gl.set_uniform_f32(&location, value),
            UniformValue::Bool(value) => self.gl.set_uniform_i32(&location, i32::from(value)),
            UniformValue::Vec4(value) => self.gl.set_uniform_vec4(&location, value.to_array()),
            UniformValue::Mat4(value) => {
                self.gl.set_uniform_mat4(&location, &value.to_cols_array())
            }
        }
    }

    /// Reads the current value of a uniform back from the driver.
    pub fn read_uniform(&self, name: &str, kind: UniformKind) -> Option<UniformValue> {
        let program = self.handle?;
        let location = self.gl.uniform_location(program, name)?;
        let value = match kind {
            UniformKind::Int => {
                let mut out = [0i32; 1];
                self.gl.read_uniform_i32(program, &location, &mut out);
                UniformValue::Int(out[0])
            }
            UniformKind::Float => {
                let mut out = [0f32; 1];
                self.gl.read_uniform_f32(program, &location, &mut out);
                UniformValue::Float(out[0])
            }
            UniformKind::Vec4 => {
                let mut out = [0f32; 4];
                self.gl.read_uniform_f32(program, &location, &mut out);
                UniformValue::Vec4(Vec4::from_array(out))
            }
            UniformKind::Mat4 => {
                let mut out = [0f32; 16];
                self.gl.read_uniform_f32(program, &location, &mut out);
                UniformValue::Mat4(Mat4::from_cols_array(&out))
            }
        };
        Some(value)
    }

    /// Returns the program to the driver. Further calls do nothing.
    pub fn release(&mut self) {
        if let Some(program) = self.handle.take() {
            self.gl.delete_program(program);
            tracing::debug!(program = %self.label, "released shader program");
        }
    }
}

impl<G: GlDriver> Drop for ShaderProgram<G> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<G: GlDriver> std::fmt::Debug for ShaderProgram<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("label", &self.label)
            .field("handle", &self.handle)
            .finish()
    }
}

fn read_source(path: &Path) -> Result<String, RenderError> {
    fs::read_to_string(path).map_err(|source| {
        tracing::error!(path = %path.display(), error = %source, "failed to read shader source");
        RenderError::FileRead {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn compile_stage<G: GlDriver>(
    gl: &G,
    label: &str,
    stage: ShaderStage,
    source: &str,
) -> Result<G::Shader, RenderError> {
    let shader = gl.create_shader(stage).map_err(|message| {
        tracing::error!(program = label, %stage, %message, "failed to create shader object");
        RenderError::Driver(message)
    })?;
    gl.compile_shader(shader, source);
    if gl.shader_compiled(shader) {
        return Ok(shader);
    }

    let log = bounded_info_log(&gl.shader_info_log(shader));
    gl.delete_shader(shader);
    tracing::error!(program = label, %stage, diagnostic = %log, "shader stage failed to compile");
    Err(RenderError::ShaderCompile { stage, log })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use glam::{Mat4, Quat, Vec3, Vec4};
    use tempfile::TempDir;

    use super::*;
    use crate::testing::{
        FakeGl, COLOR_FRAGMENT, MISMATCHED_FRAGMENT, POSITION_VERTEX, TRANSFORM_VERTEX,
    };

    fn context() -> (Rc<FakeGl>, RenderContext<FakeGl>) {
        let gl = Rc::new(FakeGl::new());
        let ctx = RenderContext::new(gl.clone());
        (gl, ctx)
    }

    #[test]
    fn valid_sources_link_and_activate() {
        let (gl, ctx) = context();
        let program =
            ShaderProgram::from_sources(&ctx, "triangle", POSITION_VERTEX, COLOR_FRAGMENT)
                .expect("program links");

        program.use_program();
        assert_eq!(gl.current_program(), program.handle());
        assert_eq!(gl.take_error(), None);
        assert_eq!(gl.live_shaders(), 0, "stage objects are deleted after linking");
    }

    #[test]
    fn vertex_failure_reports_stage_and_diagnostic() {
        let (gl, ctx) = context();
        let err = ShaderProgram::from_sources(&ctx, "broken", "void mian() {", COLOR_FRAGMENT)
            .expect_err("vertex stage must fail");

        assert_eq!(err.stage(), Some(ShaderStage::Vertex));
        assert!(!err.diagnostic().unwrap_or_default().is_empty());
        assert_eq!(gl.live_shaders(), 0);
        assert_eq!(gl.live_programs(), 0);
    }

    #[test]
    fn fragment_failure_reports_stage_and_cleans_up_vertex() {
        let (gl, ctx) = context();
        let err = ShaderProgram::from_sources(&ctx, "broken", POSITION_VERTEX, "#error nope")
            .expect_err("fragment stage must fail");

        assert_eq!(err.stage(), Some(ShaderStage::Fragment));
        assert!(!err.diagnostic().unwrap_or_default().is_empty());
        assert_eq!(gl.live_shaders(), 0);
        assert_eq!(gl.live_programs(), 0);
    }

    #[test]
    fn incompatible_stages_fail_at_link() {
        let (gl, ctx) = context();
        let err =
            ShaderProgram::from_sources(&ctx, "mismatch", POSITION_VERTEX, MISMATCHED_FRAGMENT)
                .expect_err("link must fail");

        assert!(matches!(err, RenderError::ProgramLink { .. }));
        assert!(err.diagnostic().unwrap_or_default().contains("vertexColor"));
        assert_eq!(gl.live_shaders(), 0);
        assert_eq!(gl.live_programs(), 0);
    }

    #[test]
    fn missing_file_is_a_read_failure() {
        let (gl, ctx) = context();
        let dir = TempDir::new().unwrap();
        let vertex = dir.path().join("shader.vert");
        fs::write(&vertex, POSITION_VERTEX).unwrap();

        let err = ShaderProgram::from_files(&ctx, &vertex, &dir.path().join("missing.frag"))
            .expect_err("missing fragment file");

        assert!(matches!(err, RenderError::FileRead { .. }));
        assert_eq!(gl.created_shaders(), 0, "no driver work before sources are read");
    }

    #[test]
    fn files_build_a_labelled_program() {
        let (_gl, ctx) = context();
        let dir = TempDir::new().unwrap();
        let vertex = dir.path().join("triangle.vert");
        let fragment = dir.path().join("triangle.frag");
        fs::write(&vertex, POSITION_VERTEX).unwrap();
        fs::write(&fragment, COLOR_FRAGMENT).unwrap();

        let program = ShaderProgram::from_files(&ctx, &vertex, &fragment).unwrap();
        assert_eq!(program.label(), "triangle");
    }

    #[test]
    fn absent_uniform_is_a_silent_no_op() {
        let (gl, ctx) = context();
        let program =
            ShaderProgram::from_sources(&ctx, "transform", TRANSFORM_VERTEX, COLOR_FRAGMENT)
                .unwrap();
        program.use_program();
        program.set_uniform("mixValue", 0.25f32);

        program.set_uniform("doesNotExist", 7);

        assert!(program.uniform_location("doesNotExist").is_none());
        assert_eq!(
            program.read_uniform("mixValue", UniformKind::Float),
            Some(UniformValue::Float(0.25))
        );
        assert_eq!(gl.take_error(), None);
    }

    #[test]
    fn mat4_round_trips_column_major() {
        let (gl, ctx) = context();
        let program =
            ShaderProgram::from_sources(&ctx, "transform", TRANSFORM_VERTEX, COLOR_FRAGMENT)
                .unwrap();
        program.use_program();
        let transform = Mat4::from_scale_rotation_translation(
            Vec3::splat(0.5),
            Quat::from_rotation_z(1.2),
            Vec3::new(0.5, -0.5, 0.0),
        );

        program.set_uniform("transform", transform);

        let uploaded = gl.uniform_floats(program.handle().unwrap(), "transform");
        assert_eq!(uploaded, transform.to_cols_array().to_vec());
        assert_eq!(
            program.read_uniform("transform", UniformKind::Mat4),
            Some(UniformValue::Mat4(transform))
        );
    }

    #[test]
    fn int_bool_and_vec4_uniforms_upload() {
        let (_gl, ctx) = context();
        let program =
            ShaderProgram::from_sources(&ctx, "transform", TRANSFORM_VERTEX, COLOR_FRAGMENT)
                .unwrap();
        program.use_program();

        program.set_uniform("texture1", 1);
        program.set_uniform("flipped", true);
        program.set_uniform("tint", Vec4::new(0.1, 0.2, 0.3, 1.0));

        assert_eq!(
            program.read_uniform("texture1", UniformKind::Int),
            Some(UniformValue::Int(1))
        );
        assert_eq!(
            program.read_uniform("flipped", UniformKind::Int),
            Some(UniformValue::Int(1))
        );
        assert_eq!(
            program.read_uniform("tint", UniformKind::Vec4),
            Some(UniformValue::Vec4(Vec4::new(0.1, 0.2, 0.3, 1.0)))
        );
    }

    #[test]
    fn release_is_idempotent() {
        let (gl, ctx) = context();
        let mut program =
            ShaderProgram::from_sources(&ctx, "triangle", POSITION_VERTEX, COLOR_FRAGMENT)
                .unwrap();
        let handle = program.handle().unwrap();

        program.release();
        program.release();
        assert!(program.is_released());
        drop(program);

        assert_eq!(gl.program_deletions(handle), 1);
        assert_eq!(gl.take_error(), None);
    }

    #[test]
    fn drop_releases_program() {
        let (gl, ctx) = context();
        let program =
            ShaderProgram::from_sources(&ctx, "triangle", POSITION_VERTEX, COLOR_FRAGMENT)
                .unwrap();
        let handle = program.handle().unwrap();
        drop(program);
        assert_eq!(gl.program_deletions(handle), 1);
        assert_eq!(gl.live_programs(), 0);
    }

    #[test]
    fn released_program_ignores_use_and_uniforms() {
        let (gl, ctx) = context();
        let mut program =
            ShaderProgram::from_sources(&ctx, "triangle", POSITION_VERTEX, COLOR_FRAGMENT)
                .unwrap();
        program.release();

        program.use_program();
        program.set_uniform("anything", 1.0f32);

        assert_eq!(gl.current_program(), None);
        assert!(program.read_uniform("anything", UniformKind::Float).is_none());
        assert_eq!(gl.take_error(), None);
    }
}
