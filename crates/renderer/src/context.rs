use std::rc::Rc;

use crate::driver::{error_name, GlDriver};
use crate::error::RenderError;
use crate::mesh::Mesh;
use crate::shader::ShaderProgram;
use crate::texture::Texture;

/// Explicit handle on the current GL context.
///
/// Every resource constructor and draw goes through a `RenderContext`, so
/// the single piece of ambient driver state (the active program and the
/// bindings a draw depends on) is set right before the draw that needs it.
/// Holding an `Rc` keeps resources on the thread that owns the context.
pub struct RenderContext<G: GlDriver> {
    gl: Rc<G>,
}

/// One draw: the program, the geometry, and the textures to bind.
pub struct DrawCall<'a, G: GlDriver> {
    pub program: &'a ShaderProgram<G>,
    pub mesh: &'a Mesh<G>,
    /// `(texture unit, texture)` pairs bound before drawing.
    pub textures: &'a [(u32, &'a Texture<G>)],
}

impl<'a, G: GlDriver> DrawCall<'a, G> {
    pub fn new(program: &'a ShaderProgram<G>, mesh: &'a Mesh<G>) -> Self {
        Self {
            program,
            mesh,
            textures: &[],
        }
    }

    pub fn with_textures(mut self, textures: &'a [(u32, &'a Texture<G>)]) -> Self {
        self.textures = textures;
        self
    }
}

impl<G: GlDriver> RenderContext<G> {
    pub fn new(gl: Rc<G>) -> Self {
        Self { gl }
    }

    /// Shared driver handle; resources keep a clone to release themselves.
    pub fn driver(&self) -> Rc<G> {
        Rc::clone(&self.gl)
    }

    pub fn clear(&self, color: [f32; 4]) {
        self.gl.clear(color);
    }

    pub fn set_viewport(&self, width: u32, height: u32) {
        self.gl
            .viewport(width.min(i32::MAX as u32) as i32, height.min(i32::MAX as u32) as i32);
    }

    pub fn set_wireframe(&self, wireframe: bool) {
        self.gl.polygon_fill(wireframe);
    }

    /// Activates the program, binds textures and geometry, and draws.
    pub fn draw(&self, call: &DrawCall<'_, G>) -> Result<(), RenderError> {
        if call.program.is_released() {
            return Err(RenderError::Driver(format!(
                "draw with released program '{}'",
                call.program.label()
            )));
        }
        call.program.use_program();
        for (unit, texture) in call.textures {
            texture.bind(*unit);
        }
        call.mesh.draw();
        self.check_error()
    }

    /// Pops the driver error flag and turns it into a [`RenderError`].
    pub fn check_error(&self) -> Result<(), RenderError> {
        match self.gl.take_error() {
            None => Ok(()),
            Some(code) => {
                let name = error_name(code);
                tracing::error!(code, name, "graphics driver raised an error");
                Err(RenderError::Driver(format!("{name} (0x{code:04x})")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::VertexLayout;
    use crate::testing::{FakeGl, COLOR_FRAGMENT, POSITION_VERTEX, TEXTURED_FRAGMENT, TEXTURED_VERTEX};
    use crate::texture::{ImageData, TextureOptions};

    const TRIANGLE: [f32; 18] = [
        -0.5, -0.5, 0.0, 1.0, 0.0, 0.0, //
        0.5, -0.5, 0.0, 0.0, 1.0, 0.0, //
        0.0, 0.5, 0.0, 0.0, 0.0, 1.0,
    ];

    fn context() -> (Rc<FakeGl>, RenderContext<FakeGl>) {
        let gl = Rc::new(FakeGl::new());
        let ctx = RenderContext::new(gl.clone());
        (gl, ctx)
    }

    #[test]
    fn triangle_draw_raises_no_driver_error() {
        let (gl, ctx) = context();
        let program =
            ShaderProgram::from_sources(&ctx, "triangle", POSITION_VERTEX, COLOR_FRAGMENT)
                .unwrap();
        let mesh = Mesh::new(&ctx, &TRIANGLE, None, &VertexLayout::position_color()).unwrap();
        assert_eq!(mesh.vertex_count(), 3);

        ctx.clear([0.2, 0.3, 0.3, 1.0]);
        ctx.draw(&DrawCall::new(&program, &mesh)).expect("draw succeeds");

        let draws = gl.draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].count, 3);
        assert_eq!(draws[0].program, program.handle());
        assert!(!draws[0].indexed);
    }

    #[test]
    fn indexed_textured_quad_binds_units() {
        let (gl, ctx) = context();
        let program =
            ShaderProgram::from_sources(&ctx, "textured", TEXTURED_VERTEX, TEXTURED_FRAGMENT)
                .unwrap();
        let quad: [f32; 32] = [
            0.5, 0.5, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, //
            0.5, -0.5, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, //
            -0.5, -0.5, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, //
            -0.5, 0.5, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0,
        ];
        let indices = [0u32, 1, 3, 1, 2, 3];
        let mesh = Mesh::new(
            &ctx,
            &quad,
            Some(&indices),
            &VertexLayout::position_color_uv(),
        )
        .unwrap();
        let image = ImageData::solid(2, 2, [255, 0, 0, 255]);
        let texture = Texture::from_image(&ctx, &image, &TextureOptions::default()).unwrap();

        program.use_program();
        program.set_uniform("texture1", 0);
        let bindings = [(0, &texture)];
        ctx.draw(&DrawCall::new(&program, &mesh).with_textures(&bindings))
            .unwrap();

        let draws = gl.draws();
        assert_eq!(draws.len(), 1);
        assert!(draws[0].indexed);
        assert_eq!(draws[0].count, 6);
        assert_eq!(gl.bound_texture(0), texture.handle());
    }

    #[test]
    fn draw_with_released_program_is_rejected() {
        let (gl, ctx) = context();
        let mut program =
            ShaderProgram::from_sources(&ctx, "triangle", POSITION_VERTEX, COLOR_FRAGMENT)
                .unwrap();
        let mesh = Mesh::new(&ctx, &TRIANGLE, None, &VertexLayout::position_color()).unwrap();
        program.release();

        let err = ctx.draw(&DrawCall::new(&program, &mesh)).unwrap_err();
        assert!(matches!(err, RenderError::Driver(_)));
        assert!(gl.draws().is_empty());
    }

    #[test]
    fn driver_errors_surface_through_check_error() {
        let (gl, ctx) = context();
        gl.raise(0x0502);
        let err = ctx.check_error().unwrap_err();
        assert!(err.to_string().contains("GL_INVALID_OPERATION"));
        assert!(ctx.check_error().is_ok());
    }

    #[test]
    fn viewport_and_wireframe_reach_driver() {
        let (gl, ctx) = context();
        ctx.set_viewport(800, 600);
        ctx.set_wireframe(true);
        assert_eq!(gl.viewport_size(), (800, 600));
        assert!(gl.wireframe());
    }
}
