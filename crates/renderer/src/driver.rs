//! The slice of the OpenGL API the renderer depends on.
//!
//! `GlDriver` is deliberately narrow: stage compilation, program linking,
//! uniform lookup/upload/read-back, buffer and vertex-array setup, 2D
//! textures, draws, and the error flag. The production implementation
//! forwards to a [`glow::Context`]; every call assumes the context that
//! created the handles is current on the calling thread, which the window
//! loop guarantees for the lifetime of every resource it hands out.

use std::fmt::Debug;

use glow::HasContext;

use crate::error::ShaderStage;

/// Binding points used for buffer uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferTarget {
    Vertex,
    Index,
}

/// Texture coordinate wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureWrap {
    #[default]
    Repeat,
    MirroredRepeat,
    ClampToEdge,
}

/// Texture sampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureFilter {
    #[default]
    Linear,
    Nearest,
}

/// Sampler state applied to a freshly created texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerState {
    pub wrap: TextureWrap,
    pub filter: TextureFilter,
    pub mipmaps: bool,
}

/// Driver primitives consumed by shaders, meshes, textures, and draws.
pub trait GlDriver {
    type Shader: Copy + Eq + Debug;
    type Program: Copy + Eq + Debug;
    type UniformLocation: Clone + Debug;
    type Buffer: Copy + Eq + Debug;
    type VertexArray: Copy + Eq + Debug;
    type Texture: Copy + Eq + Debug;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String>;
    /// Uploads `source` and compiles it; query the outcome with [`Self::shader_compiled`].
    fn compile_shader(&self, shader: Self::Shader, source: &str);
    fn shader_compiled(&self, shader: Self::Shader) -> bool;
    fn shader_info_log(&self, shader: Self::Shader) -> String;
    fn delete_shader(&self, shader: Self::Shader);

    fn create_program(&self) -> Result<Self::Program, String>;
    fn attach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn detach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn link_program(&self, program: Self::Program);
    fn program_linked(&self, program: Self::Program) -> bool;
    fn program_info_log(&self, program: Self::Program) -> String;
    fn delete_program(&self, program: Self::Program);
    fn use_program(&self, program: Option<Self::Program>);

    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation>;
    fn set_uniform_i32(&self, location: &Self::UniformLocation, value: i32);
    fn set_uniform_f32(&self, location: &Self::UniformLocation, value: f32);
    fn set_uniform_vec4(&self, location: &Self::UniformLocation, value: [f32; 4]);
    /// Uploads a column-major matrix without transposition.
    fn set_uniform_mat4(&self, location: &Self::UniformLocation, columns: &[f32; 16]);
    fn read_uniform_f32(
        &self,
        program: Self::Program,
        location: &Self::UniformLocation,
        out: &mut [f32],
    );
    fn read_uniform_i32(
        &self,
        program: Self::Program,
        location: &Self::UniformLocation,
        out: &mut [i32],
    );

    fn create_vertex_array(&self) -> Result<Self::VertexArray, String>;
    fn bind_vertex_array(&self, vertex_array: Option<Self::VertexArray>);
    fn delete_vertex_array(&self, vertex_array: Self::VertexArray);
    fn create_buffer(&self) -> Result<Self::Buffer, String>;
    fn bind_buffer(&self, target: BufferTarget, buffer: Option<Self::Buffer>);
    /// Fills the bound buffer with static-draw data.
    fn buffer_data(&self, target: BufferTarget, data: &[u8]);
    fn delete_buffer(&self, buffer: Self::Buffer);
    /// Describes a float attribute; `stride` and `offset` are in bytes.
    fn vertex_attrib_f32(&self, location: u32, components: i32, stride: i32, offset: i32);
    fn enable_vertex_attrib(&self, location: u32);

    fn create_texture(&self) -> Result<Self::Texture, String>;
    /// Binds `texture` to texture unit `unit` on the 2D target.
    fn bind_texture(&self, unit: u32, texture: Option<Self::Texture>);
    /// Uploads tightly packed RGBA8 pixels to the 2D texture bound on the active unit.
    fn upload_rgba8(&self, width: u32, height: u32, pixels: &[u8], sampler: SamplerState);
    fn delete_texture(&self, texture: Self::Texture);

    fn clear(&self, color: [f32; 4]);
    fn viewport(&self, width: i32, height: i32);
    fn polygon_fill(&self, wireframe: bool);
    fn draw_triangles(&self, first: i32, count: i32);
    /// Draws `count` `u32` indices from the bound index buffer as triangles.
    fn draw_indexed_triangles(&self, count: i32, offset: i32);
    /// Pops the driver error flag; `None` means `GL_NO_ERROR`.
    fn take_error(&self) -> Option<u32>;
}

fn stage_enum(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex => glow::VERTEX_SHADER,
        ShaderStage::Fragment => glow::FRAGMENT_SHADER,
    }
}

fn target_enum(target: BufferTarget) -> u32 {
    match target {
        BufferTarget::Vertex => glow::ARRAY_BUFFER,
        BufferTarget::Index => glow::ELEMENT_ARRAY_BUFFER,
    }
}

/// Human-readable name for a `glGetError` code.
pub fn error_name(code: u32) -> &'static str {
    match code {
        glow::INVALID_ENUM => "GL_INVALID_ENUM",
        glow::INVALID_VALUE => "GL_INVALID_VALUE",
        glow::INVALID_OPERATION => "GL_INVALID_OPERATION",
        glow::INVALID_FRAMEBUFFER_OPERATION => "GL_INVALID_FRAMEBUFFER_OPERATION",
        glow::OUT_OF_MEMORY => "GL_OUT_OF_MEMORY",
        _ => "unknown GL error",
    }
}

impl GlDriver for glow::Context {
    type Shader = glow::Shader;
    type Program = glow::Program;
    type UniformLocation = glow::UniformLocation;
    type Buffer = glow::Buffer;
    type VertexArray = glow::VertexArray;
    type Texture = glow::Texture;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String> {
        unsafe { HasContext::create_shader(self, stage_enum(stage)) }
    }

    fn compile_shader(&self, shader: Self::Shader, source: &str) {
        unsafe {
            self.shader_source(shader, source);
            HasContext::compile_shader(self, shader);
        }
    }

    fn shader_compiled(&self, shader: Self::Shader) -> bool {
        unsafe { self.get_shader_compile_status(shader) }
    }

    fn shader_info_log(&self, shader: Self::Shader) -> String {
        unsafe { self.get_shader_info_log(shader) }
    }

    fn delete_shader(&self, shader: Self::Shader) {
        unsafe { HasContext::delete_shader(self, shader) }
    }

    fn create_program(&self) -> Result<Self::Program, String> {
        unsafe { HasContext::create_program(self) }
    }

    fn attach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { HasContext::attach_shader(self, program, shader) }
    }

    fn detach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { HasContext::detach_shader(self, program, shader) }
    }

    fn link_program(&self, program: Self::Program) {
        unsafe { HasContext::link_program(self, program) }
    }

    fn program_linked(&self, program: Self::Program) -> bool {
        unsafe { self.get_program_link_status(program) }
    }

    fn program_info_log(&self, program: Self::Program) -> String {
        unsafe { self.get_program_info_log(program) }
    }

    fn delete_program(&self, program: Self::Program) {
        unsafe { HasContext::delete_program(self, program) }
    }

    fn use_program(&self, program: Option<Self::Program>) {
        unsafe { HasContext::use_program(self, program) }
    }

    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        unsafe { self.get_uniform_location(program, name) }
    }

    fn set_uniform_i32(&self, location: &Self::UniformLocation, value: i32) {
        unsafe { self.uniform_1_i32(Some(location), value) }
    }

    fn set_uniform_f32(&self, location: &Self::UniformLocation, value: f32) {
        unsafe { self.uniform_1_f32(Some(location), value) }
    }

    fn set_uniform_vec4(&self, location: &Self::UniformLocation, value: [f32; 4]) {
        unsafe { self.uniform_4_f32(Some(location), value[0], value[1], value[2], value[3]) }
    }

    fn set_uniform_mat4(&self, location: &Self::UniformLocation, columns: &[f32; 16]) {
        unsafe { self.uniform_matrix_4_f32_slice(Some(location), false, columns) }
    }

    fn read_uniform_f32(
        &self,
        program: Self::Program,
        location: &Self::UniformLocation,
        out: &mut [f32],
    ) {
        unsafe { self.get_uniform_f32(program, location, out) }
    }

    fn read_uniform_i32(
        &self,
        program: Self::Program,
        location: &Self::UniformLocation,
        out: &mut [i32],
    ) {
        unsafe { self.get_uniform_i32(program, location, out) }
    }

    fn create_vertex_array(&self) -> Result<Self::VertexArray, String> {
        unsafe { HasContext::create_vertex_array(self) }
    }

    fn bind_vertex_array(&self, vertex_array: Option<Self::VertexArray>) {
        unsafe { HasContext::bind_vertex_array(self, vertex_array) }
    }

    fn delete_vertex_array(&self, vertex_array: Self::VertexArray) {
        unsafe { HasContext::delete_vertex_array(self, vertex_array) }
    }

    fn create_buffer(&self) -> Result<Self::Buffer, String> {
        unsafe { HasContext::create_buffer(self) }
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<Self::Buffer>) {
        unsafe { HasContext::bind_buffer(self, target_enum(target), buffer) }
    }

    fn buffer_data(&self, target: BufferTarget, data: &[u8]) {
        unsafe { self.buffer_data_u8_slice(target_enum(target), data, glow::STATIC_DRAW) }
    }

    fn delete_buffer(&self, buffer: Self::Buffer) {
        unsafe { HasContext::delete_buffer(self, buffer) }
    }

    fn vertex_attrib_f32(&self, location: u32, components: i32, stride: i32, offset: i32) {
        unsafe {
            self.vertex_attrib_pointer_f32(location, components, glow::FLOAT, false, stride, offset)
        }
    }

    fn enable_vertex_attrib(&self, location: u32) {
        unsafe { self.enable_vertex_attrib_array(location) }
    }

    fn create_texture(&self) -> Result<Self::Texture, String> {
        unsafe { HasContext::create_texture(self) }
    }

    fn bind_texture(&self, unit: u32, texture: Option<Self::Texture>) {
        unsafe {
            self.active_texture(glow::TEXTURE0 + unit);
            HasContext::bind_texture(self, glow::TEXTURE_2D, texture);
        }
    }

    fn upload_rgba8(&self, width: u32, height: u32, pixels: &[u8], sampler: SamplerState) {
        let wrap = match sampler.wrap {
            TextureWrap::Repeat => glow::REPEAT,
            TextureWrap::MirroredRepeat => glow::MIRRORED_REPEAT,
            TextureWrap::ClampToEdge => glow::CLAMP_TO_EDGE,
        };
        let (min_filter, mag_filter) = match (sampler.filter, sampler.mipmaps) {
            (TextureFilter::Linear, true) => (glow::LINEAR_MIPMAP_LINEAR, glow::LINEAR),
            (TextureFilter::Linear, false) => (glow::LINEAR, glow::LINEAR),
            (TextureFilter::Nearest, true) => (glow::NEAREST_MIPMAP_NEAREST, glow::NEAREST),
            (TextureFilter::Nearest, false) => (glow::NEAREST, glow::NEAREST),
        };
        unsafe {
            self.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, wrap as i32);
            self.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, wrap as i32);
            self.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, min_filter as i32);
            self.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, mag_filter as i32);
            self.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            self.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                width as i32,
                height as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(pixels)),
            );
            if sampler.mipmaps {
                self.generate_mipmap(glow::TEXTURE_2D);
            }
        }
    }

    fn delete_texture(&self, texture: Self::Texture) {
        unsafe { HasContext::delete_texture(self, texture) }
    }

    fn clear(&self, color: [f32; 4]) {
        unsafe {
            self.clear_color(color[0], color[1], color[2], color[3]);
            HasContext::clear(self, glow::COLOR_BUFFER_BIT);
        }
    }

    fn viewport(&self, width: i32, height: i32) {
        unsafe { HasContext::viewport(self, 0, 0, width, height) }
    }

    fn polygon_fill(&self, wireframe: bool) {
        let mode = if wireframe { glow::LINE } else { glow::FILL };
        unsafe { self.polygon_mode(glow::FRONT_AND_BACK, mode) }
    }

    fn draw_triangles(&self, first: i32, count: i32) {
        unsafe { self.draw_arrays(glow::TRIANGLES, first, count) }
    }

    fn draw_indexed_triangles(&self, count: i32, offset: i32) {
        unsafe { self.draw_elements(glow::TRIANGLES, count, glow::UNSIGNED_INT, offset) }
    }

    fn take_error(&self) -> Option<u32> {
        let code = unsafe { self.get_error() };
        (code != glow::NO_ERROR).then_some(code)
    }
}

/// Logs vendor, renderer, and version strings for the current context.
pub(crate) fn log_driver_info(gl: &glow::Context) {
    let (vendor, renderer, version, glsl) = unsafe {
        (
            gl.get_parameter_string(glow::VENDOR),
            gl.get_parameter_string(glow::RENDERER),
            gl.get_parameter_string(glow::VERSION),
            gl.get_parameter_string(glow::SHADING_LANGUAGE_VERSION),
        )
    };
    tracing::info!(
        vendor = vendor.trim(),
        renderer = renderer.trim(),
        version = version.trim(),
        glsl = glsl.trim(),
        "OpenGL context ready"
    );
}
