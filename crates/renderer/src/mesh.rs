use std::rc::Rc;

use crate::context::RenderContext;
use crate::driver::{BufferTarget, GlDriver};
use crate::error::RenderError;

const FLOAT_SIZE: i32 = std::mem::size_of::<f32>() as i32;

/// A float vertex attribute bound to a shader `layout (location = N)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub components: u32,
}

/// Interleaved float layout; attributes are packed in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    pub fn new(attributes: Vec<VertexAttribute>) -> Self {
        Self { attributes }
    }

    /// `vec3` position at location 0, `vec3` colour at location 1.
    pub fn position_color() -> Self {
        Self::new(vec![
            VertexAttribute {
                location: 0,
                components: 3,
            },
            VertexAttribute {
                location: 1,
                components: 3,
            },
        ])
    }

    /// Position and colour plus a `vec2` texture coordinate at location 2.
    pub fn position_color_uv() -> Self {
        let mut layout = Self::position_color();
        layout.attributes.push(VertexAttribute {
            location: 2,
            components: 2,
        });
        layout
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    pub fn floats_per_vertex(&self) -> usize {
        self.attributes
            .iter()
            .map(|attribute| attribute.components as usize)
            .sum()
    }

    pub fn stride_bytes(&self) -> i32 {
        self.floats_per_vertex() as i32 * FLOAT_SIZE
    }
}

/// Vertex array with its vertex buffer and optional index buffer.
pub struct Mesh<G: GlDriver> {
    gl: Rc<G>,
    vertex_array: Option<G::VertexArray>,
    vertex_buffer: Option<G::Buffer>,
    index_buffer: Option<G::Buffer>,
    vertex_count: usize,
    index_count: Option<usize>,
}

impl<G: GlDriver> Mesh<G> {
    /// Uploads interleaved `vertices` (and `indices`, if any) and records the
    /// attribute layout in a new vertex array.
    pub fn new(
        ctx: &RenderContext<G>,
        vertices: &[f32],
        indices: Option<&[u32]>,
        layout: &VertexLayout,
    ) -> Result<Self, RenderError> {
        let vertex_count = validate(vertices, indices, layout)?;
        let gl = ctx.driver();

        let vertex_array = gl.create_vertex_array().map_err(RenderError::Driver)?;
        let mut mesh = Self {
            gl: Rc::clone(&gl),
            vertex_array: Some(vertex_array),
            vertex_buffer: None,
            index_buffer: None,
            vertex_count,
            index_count: indices.map(<[u32]>::len),
        };

        gl.bind_vertex_array(Some(vertex_array));

        let vertex_buffer = gl.create_buffer().map_err(RenderError::Driver)?;
        mesh.vertex_buffer = Some(vertex_buffer);
        gl.bind_buffer(BufferTarget::Vertex, Some(vertex_buffer));
        gl.buffer_data(BufferTarget::Vertex, bytemuck::cast_slice(vertices));

        if let Some(indices) = indices {
            let index_buffer = gl.create_buffer().map_err(RenderError::Driver)?;
            mesh.index_buffer = Some(index_buffer);
            gl.bind_buffer(BufferTarget::Index, Some(index_buffer));
            gl.buffer_data(BufferTarget::Index, bytemuck::cast_slice(indices));
        }

        let stride = layout.stride_bytes();
        let mut offset = 0;
        for attribute in layout.attributes() {
            gl.vertex_attrib_f32(
                attribute.location,
                attribute.components as i32,
                stride,
                offset,
            );
            gl.enable_vertex_attrib(attribute.location);
            offset += attribute.components as i32 * FLOAT_SIZE;
        }

        // The index buffer binding is vertex-array state; unbind the array first.
        gl.bind_buffer(BufferTarget::Vertex, None);
        gl.bind_vertex_array(None);

        tracing::debug!(
            vertices = vertex_count,
            indices = ?mesh.index_count,
            stride,
            "uploaded mesh"
        );
        Ok(mesh)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Binds the vertex array and issues the draw; the caller activates a program.
    pub(crate) fn draw(&self) {
        let Some(vertex_array) = self.vertex_array else {
            tracing::warn!("ignoring draw of released mesh");
            return;
        };
        self.gl.bind_vertex_array(Some(vertex_array));
        match self.index_count {
            Some(count) => self.gl.draw_indexed_triangles(count as i32, 0),
            None => self.gl.draw_triangles(0, self.vertex_count as i32),
        }
    }

    /// Returns the vertex array and buffers to the driver. Further calls do nothing.
    pub fn release(&mut self) {
        if let Some(vertex_array) = self.vertex_array.take() {
            self.gl.delete_vertex_array(vertex_array);
        }
        if let Some(buffer) = self.vertex_buffer.take() {
            self.gl.delete_buffer(buffer);
        }
        if let Some(buffer) = self.index_buffer.take() {
            self.gl.delete_buffer(buffer);
        }
    }
}

impl<G: GlDriver> Drop for Mesh<G> {
    fn drop(&mut self) {
        self.release();
    }
}

fn validate(
    vertices: &[f32],
    indices: Option<&[u32]>,
    layout: &VertexLayout,
) -> Result<usize, RenderError> {
    let per_vertex = layout.floats_per_vertex();
    if per_vertex == 0 {
        return Err(RenderError::InvalidMesh(
            "vertex layout declares no components".into(),
        ));
    }
    if vertices.is_empty() || vertices.len() % per_vertex != 0 {
        return Err(RenderError::InvalidMesh(format!(
            "{} floats is not a whole number of {}-float vertices",
            vertices.len(),
            per_vertex
        )));
    }
    let vertex_count = vertices.len() / per_vertex;
    if let Some(indices) = indices {
        if indices.is_empty() {
            return Err(RenderError::InvalidMesh("index list is empty".into()));
        }
        if let Some(bad) = indices.iter().find(|&&index| index as usize >= vertex_count) {
            return Err(RenderError::InvalidMesh(format!(
                "index {bad} out of range for {vertex_count} vertices"
            )));
        }
    }
    Ok(vertex_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeGl;

    fn context() -> (Rc<FakeGl>, RenderContext<FakeGl>) {
        let gl = Rc::new(FakeGl::new());
        let ctx = RenderContext::new(gl.clone());
        (gl, ctx)
    }

    #[test]
    fn layouts_compute_stride() {
        assert_eq!(VertexLayout::position_color().stride_bytes(), 24);
        assert_eq!(VertexLayout::position_color_uv().stride_bytes(), 32);
    }

    #[test]
    fn attributes_are_configured_at_consecutive_offsets() {
        let (gl, ctx) = context();
        let vertices = [0.0f32; 16];
        let _mesh = Mesh::new(&ctx, &vertices, None, &VertexLayout::position_color_uv()).unwrap();

        let attributes = gl.attributes();
        assert_eq!(attributes, vec![(0, 3, 32, 0), (1, 3, 32, 12), (2, 2, 32, 24)]);
    }

    #[test]
    fn partial_vertex_is_rejected() {
        let (gl, ctx) = context();
        let err = Mesh::new(&ctx, &[0.0; 7], None, &VertexLayout::position_color())
            .err()
            .expect("7 floats is not a whole vertex");
        assert!(matches!(err, RenderError::InvalidMesh(_)));
        assert_eq!(gl.live_vertex_arrays(), 0);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let (_gl, ctx) = context();
        let err = Mesh::new(
            &ctx,
            &[0.0; 18],
            Some(&[0, 1, 3]),
            &VertexLayout::position_color(),
        )
        .err()
        .expect("index 3 is out of range");
        assert!(err.to_string().contains("index 3"));
    }

    #[test]
    fn release_deletes_each_object_once() {
        let (gl, ctx) = context();
        let mut mesh = Mesh::new(
            &ctx,
            &[0.0; 18],
            Some(&[0, 1, 2]),
            &VertexLayout::position_color(),
        )
        .unwrap();
        assert_eq!(gl.live_buffers(), 2);

        mesh.release();
        mesh.release();
        drop(mesh);

        assert_eq!(gl.live_buffers(), 0);
        assert_eq!(gl.live_vertex_arrays(), 0);
        assert_eq!(gl.take_error(), None);
    }
}
