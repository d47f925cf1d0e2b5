//! In-memory stand-in for the GL driver used by unit tests. Other crates
//! reach it through the `test-support` feature.
//!
//! `FakeGl` follows the parts of GL semantics the renderer relies on:
//! objects are integer handles, uniform uploads target the active program,
//! deleting an unknown handle raises `GL_INVALID_VALUE`, and drawing without
//! a linked program or vertex array raises `GL_INVALID_OPERATION`.
//!
//! Its "compiler" accepts a stage when the source defines `main` with
//! balanced braces and contains no `#error`. Declarations of the form
//! `uniform T name;`, `in T name;` and `out T name;` (optionally behind a
//! `layout (...)` qualifier) are recorded, and linking fails when a
//! fragment input has no vertex output with the same name and type.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::driver::{BufferTarget, GlDriver, SamplerState};
use crate::error::ShaderStage;

const INVALID_VALUE: u32 = 0x0501;
const INVALID_OPERATION: u32 = 0x0502;

pub const POSITION_VERTEX: &str = r"#version 330 core
layout (location = 0) in vec3 aPos;
layout (location = 1) in vec3 aColor;
out vec3 vertexColor;
void main() {
    gl_Position = vec4(aPos, 1.0);
    vertexColor = aColor;
}
";

pub const COLOR_FRAGMENT: &str = r"#version 330 core
out vec4 FragColor;
void main() {
    FragColor = vec4(1.0, 0.5, 0.2, 1.0);
}
";

pub const MISMATCHED_FRAGMENT: &str = r"#version 330 core
in vec4 vertexColor;
out vec4 FragColor;
void main() {
    FragColor = vertexColor;
}
";

pub const TRANSFORM_VERTEX: &str = r"#version 330 core
layout (location = 0) in vec3 aPos;
layout (location = 1) in vec2 aTexCoord;
out vec2 TexCoord;
uniform mat4 transform;
uniform float mixValue;
uniform sampler2D texture1;
uniform bool flipped;
uniform vec4 tint;
void main() {
    gl_Position = transform * vec4(aPos, 1.0);
    TexCoord = aTexCoord;
}
";

pub const TEXTURED_VERTEX: &str = r"#version 330 core
layout (location = 0) in vec3 aPos;
layout (location = 1) in vec3 aColor;
layout (location = 2) in vec2 aTexCoord;
out vec3 ourColor;
out vec2 TexCoord;
void main() {
    gl_Position = vec4(aPos, 1.0);
    ourColor = aColor;
    TexCoord = aTexCoord;
}
";

pub const TEXTURED_FRAGMENT: &str = r"#version 330 core
in vec3 ourColor;
in vec2 TexCoord;
out vec4 FragColor;
uniform sampler2D texture1;
void main() {
    FragColor = texture(texture1, TexCoord) * vec4(ourColor, 1.0);
}
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawRecord {
    pub program: Option<u32>,
    pub count: i32,
    pub indexed: bool,
}

#[derive(Debug, Default)]
struct Declarations {
    uniforms: Vec<(String, String)>,
    inputs: Vec<(String, String)>,
    outputs: Vec<(String, String)>,
}

struct FakeShader {
    stage: ShaderStage,
    compiled: bool,
    log: String,
    declarations: Declarations,
}

#[derive(Clone)]
enum UniformSlot {
    Ints(Vec<i32>),
    Floats(Vec<f32>),
}

struct FakeProgram {
    attached: Vec<u32>,
    linked: bool,
    log: String,
    uniforms: Vec<(String, UniformSlot)>,
}

#[derive(Default)]
struct FakeVertexArray {
    index_buffer: Option<u32>,
    attributes: Vec<(u32, i32, i32, i32)>,
}

#[derive(Default)]
struct State {
    next_handle: u32,
    shaders: HashMap<u32, FakeShader>,
    created_shaders: usize,
    programs: HashMap<u32, FakeProgram>,
    program_deletions: HashMap<u32, usize>,
    current_program: Option<u32>,
    vertex_arrays: HashMap<u32, FakeVertexArray>,
    bound_vertex_array: Option<u32>,
    buffers: HashMap<u32, Vec<u8>>,
    bound_vertex_buffer: Option<u32>,
    textures: HashMap<u32, Option<((u32, u32), SamplerState)>>,
    created_textures: usize,
    uploads: usize,
    texture_units: HashMap<u32, u32>,
    active_unit: u32,
    errors: Vec<u32>,
    draws: Vec<DrawRecord>,
    viewport: (i32, i32),
    wireframe: bool,
}

impl State {
    fn allocate(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    fn raise(&mut self, code: u32) {
        self.errors.push(code);
    }

    fn current_slot(&mut self, location: u32) -> Option<&mut UniformSlot> {
        let Some(program) = self.current_program else {
            self.raise(INVALID_OPERATION);
            return None;
        };
        let slot = self
            .programs
            .get_mut(&program)
            .and_then(|program| program.uniforms.get_mut(location as usize))
            .map(|(_, slot)| slot);
        if slot.is_none() {
            self.errors.push(INVALID_OPERATION);
        }
        slot
    }
}

pub struct FakeGl {
    state: RefCell<State>,
}

impl Default for FakeGl {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeGl {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State::default()),
        }
    }

    pub fn raise(&self, code: u32) {
        self.state.borrow_mut().raise(code);
    }

    pub fn current_program(&self) -> Option<u32> {
        self.state.borrow().current_program
    }

    pub fn created_shaders(&self) -> usize {
        self.state.borrow().created_shaders
    }

    pub fn live_shaders(&self) -> usize {
        self.state.borrow().shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    pub fn program_deletions(&self, program: u32) -> usize {
        self.state
            .borrow()
            .program_deletions
            .get(&program)
            .copied()
            .unwrap_or(0)
    }

    /// Stored value of a uniform in `program`, widened to floats.
    pub fn uniform_floats(&self, program: u32, name: &str) -> Vec<f32> {
        let state = self.state.borrow();
        let Some(program) = state.programs.get(&program) else {
            return Vec::new();
        };
        program
            .uniforms
            .iter()
            .find(|(uniform, _)| uniform == name)
            .map(|(_, slot)| match slot {
                UniformSlot::Ints(values) => values.iter().map(|&v| v as f32).collect(),
                UniformSlot::Floats(values) => values.clone(),
            })
            .unwrap_or_default()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.state.borrow().vertex_arrays.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.state.borrow().buffers.len()
    }

    /// Attribute pointers recorded on the most recently created vertex array.
    pub fn attributes(&self) -> Vec<(u32, i32, i32, i32)> {
        let state = self.state.borrow();
        state
            .vertex_arrays
            .iter()
            .max_by_key(|(handle, _)| **handle)
            .map(|(_, vao)| vao.attributes.clone())
            .unwrap_or_default()
    }

    pub fn created_textures(&self) -> usize {
        self.state.borrow().created_textures
    }

    pub fn live_textures(&self) -> usize {
        self.state.borrow().textures.len()
    }

    pub fn uploads(&self) -> usize {
        self.state.borrow().uploads
    }

    pub fn texture_upload(&self, texture: u32) -> Option<((u32, u32), SamplerState)> {
        self.state.borrow().textures.get(&texture).copied().flatten()
    }

    pub fn bound_texture(&self, unit: u32) -> Option<u32> {
        self.state.borrow().texture_units.get(&unit).copied()
    }

    pub fn draws(&self) -> Vec<DrawRecord> {
        self.state.borrow().draws.clone()
    }

    pub fn viewport_size(&self) -> (i32, i32) {
        self.state.borrow().viewport
    }

    pub fn wireframe(&self) -> bool {
        self.state.borrow().wireframe
    }

    fn record_draw(&self, count: i32, indexed: bool) {
        let mut state = self.state.borrow_mut();
        let program_ok = state
            .current_program
            .and_then(|program| state.programs.get(&program))
            .is_some_and(|program| program.linked);
        let vertex_array = state
            .bound_vertex_array
            .and_then(|handle| state.vertex_arrays.get(&handle));
        let geometry_ok = match vertex_array {
            Some(vao) => !indexed || vao.index_buffer.is_some(),
            None => false,
        };
        if !program_ok || !geometry_ok || count < 0 {
            state.raise(INVALID_OPERATION);
            return;
        }
        let program = state.current_program;
        state.draws.push(DrawRecord {
            program,
            count,
            indexed,
        });
    }
}

fn parse_declarations(source: &str) -> Declarations {
    let mut declarations = Declarations::default();
    for line in source.lines() {
        let mut line = line.trim();
        if line.starts_with("layout") {
            match line.find(')') {
                Some(end) => line = line[end + 1..].trim_start(),
                None => continue,
            }
        }
        let Some(body) = line.strip_suffix(';') else {
            continue;
        };
        let words: Vec<&str> = body.split_whitespace().collect();
        let [qualifier, ty, name] = words.as_slice() else {
            continue;
        };
        let entry = (ty.to_string(), name.to_string());
        match *qualifier {
            "uniform" => declarations.uniforms.push(entry),
            "in" => declarations.inputs.push(entry),
            "out" => declarations.outputs.push(entry),
            _ => {}
        }
    }
    declarations
}

fn compile_log(source: &str) -> Option<String> {
    if source.contains("#error") {
        return Some("0:1(1): error: #error directive".to_string());
    }
    if !source.contains("void main()") {
        return Some("0:1(1): error: no function with name 'main'".to_string());
    }
    let opened = source.matches('{').count();
    let closed = source.matches('}').count();
    if opened != closed {
        return Some(format!(
            "0:{}(1): error: syntax error, unexpected end of file",
            source.lines().count()
        ));
    }
    None
}

fn uniform_slot(ty: &str) -> UniformSlot {
    match ty {
        "float" => UniformSlot::Floats(vec![0.0]),
        "vec2" => UniformSlot::Floats(vec![0.0; 2]),
        "vec3" => UniformSlot::Floats(vec![0.0; 3]),
        "vec4" => UniformSlot::Floats(vec![0.0; 4]),
        "mat4" => UniformSlot::Floats(vec![0.0; 16]),
        _ => UniformSlot::Ints(vec![0]),
    }
}

impl GlDriver for FakeGl {
    type Shader = u32;
    type Program = u32;
    type UniformLocation = u32;
    type Buffer = u32;
    type VertexArray = u32;
    type Texture = u32;

    fn create_shader(&self, stage: ShaderStage) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let handle = state.allocate();
        state.created_shaders += 1;
        state.shaders.insert(
            handle,
            FakeShader {
                stage,
                compiled: false,
                log: String::new(),
                declarations: Declarations::default(),
            },
        );
        Ok(handle)
    }

    fn compile_shader(&self, shader: u32, source: &str) {
        let mut state = self.state.borrow_mut();
        let Some(entry) = state.shaders.get_mut(&shader) else {
            state.raise(INVALID_VALUE);
            return;
        };
        match compile_log(source) {
            Some(log) => {
                entry.compiled = false;
                entry.log = log;
            }
            None => {
                entry.compiled = true;
                entry.log.clear();
                entry.declarations = parse_declarations(source);
            }
        }
    }

    fn shader_compiled(&self, shader: u32) -> bool {
        self.state
            .borrow()
            .shaders
            .get(&shader)
            .is_some_and(|shader| shader.compiled)
    }

    fn shader_info_log(&self, shader: u32) -> String {
        self.state
            .borrow()
            .shaders
            .get(&shader)
            .map(|shader| shader.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&self, shader: u32) {
        let mut state = self.state.borrow_mut();
        if state.shaders.remove(&shader).is_none() {
            state.raise(INVALID_VALUE);
        }
    }

    fn create_program(&self) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let handle = state.allocate();
        state.programs.insert(
            handle,
            FakeProgram {
                attached: Vec::new(),
                linked: false,
                log: String::new(),
                uniforms: Vec::new(),
            },
        );
        Ok(handle)
    }

    fn attach_shader(&self, program: u32, shader: u32) {
        let mut state = self.state.borrow_mut();
        if !state.shaders.contains_key(&shader) {
            state.raise(INVALID_VALUE);
            return;
        }
        match state.programs.get_mut(&program) {
            Some(entry) => entry.attached.push(shader),
            None => state.raise(INVALID_VALUE),
        }
    }

    fn detach_shader(&self, program: u32, shader: u32) {
        let mut state = self.state.borrow_mut();
        match state.programs.get_mut(&program) {
            Some(entry) => entry.attached.retain(|&attached| attached != shader),
            None => state.raise(INVALID_VALUE),
        }
    }

    fn link_program(&self, program: u32) {
        let mut state = self.state.borrow_mut();
        let Some(entry) = state.programs.get(&program) else {
            state.raise(INVALID_VALUE);
            return;
        };

        let mut vertex = None;
        let mut fragment = None;
        let mut log = None;
        for handle in &entry.attached {
            let shader = &state.shaders[handle];
            if !shader.compiled {
                log = Some("error: attached shader is not compiled".to_string());
            }
            match shader.stage {
                ShaderStage::Vertex => vertex = Some(&shader.declarations),
                ShaderStage::Fragment => fragment = Some(&shader.declarations),
            }
        }

        let mut uniforms: Vec<(String, UniformSlot)> = Vec::new();
        match (vertex, fragment) {
            (Some(vertex), Some(fragment)) if log.is_none() => {
                for (ty, name) in &fragment.inputs {
                    let matched = vertex
                        .outputs
                        .iter()
                        .any(|(out_ty, out_name)| out_name == name && out_ty == ty);
                    if !matched {
                        log = Some(format!(
                            "error: fragment shader input '{name}' of type {ty} has no matching vertex output"
                        ));
                        break;
                    }
                }
                for (ty, name) in vertex.uniforms.iter().chain(&fragment.uniforms) {
                    if !uniforms.iter().any(|(existing, _)| existing == name) {
                        uniforms.push((name.clone(), uniform_slot(ty)));
                    }
                }
            }
            (_, _) if log.is_some() => {}
            _ => log = Some("error: program requires a vertex and a fragment stage".to_string()),
        }

        let Some(entry) = state.programs.get_mut(&program) else {
            return;
        };
        match log {
            Some(log) => {
                entry.linked = false;
                entry.log = log;
                entry.uniforms.clear();
            }
            None => {
                entry.linked = true;
                entry.log.clear();
                entry.uniforms = uniforms;
            }
        }
    }

    fn program_linked(&self, program: u32) -> bool {
        self.state
            .borrow()
            .programs
            .get(&program)
            .is_some_and(|program| program.linked)
    }

    fn program_info_log(&self, program: u32) -> String {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|program| program.log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&self, program: u32) {
        let mut state = self.state.borrow_mut();
        if state.programs.remove(&program).is_none() {
            state.raise(INVALID_VALUE);
            return;
        }
        *state.program_deletions.entry(program).or_default() += 1;
        if state.current_program == Some(program) {
            state.current_program = None;
        }
    }

    fn use_program(&self, program: Option<u32>) {
        let mut state = self.state.borrow_mut();
        match program {
            None => state.current_program = None,
            Some(handle) => match state.programs.get(&handle) {
                Some(entry) if entry.linked => state.current_program = Some(handle),
                Some(_) => state.raise(INVALID_OPERATION),
                None => state.raise(INVALID_VALUE),
            },
        }
    }

    fn uniform_location(&self, program: u32, name: &str) -> Option<u32> {
        let state = self.state.borrow();
        let entry = state.programs.get(&program)?;
        entry
            .uniforms
            .iter()
            .position(|(uniform, _)| uniform == name)
            .map(|index| index as u32)
    }

    fn set_uniform_i32(&self, location: &u32, value: i32) {
        let mut state = self.state.borrow_mut();
        let mismatch = match state.current_slot(*location) {
            Some(UniformSlot::Ints(values)) => {
                values[0] = value;
                false
            }
            Some(UniformSlot::Floats(_)) => true,
            None => false,
        };
        if mismatch {
            state.raise(INVALID_OPERATION);
        }
    }

    fn set_uniform_f32(&self, location: &u32, value: f32) {
        let mut state = self.state.borrow_mut();
        let mismatch = match state.current_slot(*location) {
            Some(UniformSlot::Floats(values)) if values.len() == 1 => {
                values[0] = value;
                false
            }
            Some(_) => true,
            None => false,
        };
        if mismatch {
            state.raise(INVALID_OPERATION);
        }
    }

    fn set_uniform_vec4(&self, location: &u32, value: [f32; 4]) {
        let mut state = self.state.borrow_mut();
        let mismatch = match state.current_slot(*location) {
            Some(UniformSlot::Floats(values)) if values.len() == 4 => {
                values.copy_from_slice(&value);
                false
            }
            Some(_) => true,
            None => false,
        };
        if mismatch {
            state.raise(INVALID_OPERATION);
        }
    }

    fn set_uniform_mat4(&self, location: &u32, columns: &[f32; 16]) {
        let mut state = self.state.borrow_mut();
        let mismatch = match state.current_slot(*location) {
            Some(UniformSlot::Floats(values)) if values.len() == 16 => {
                values.copy_from_slice(columns);
                false
            }
            Some(_) => true,
            None => false,
        };
        if mismatch {
            state.raise(INVALID_OPERATION);
        }
    }

    fn read_uniform_f32(&self, program: u32, location: &u32, out: &mut [f32]) {
        let state = self.state.borrow();
        let slot = state
            .programs
            .get(&program)
            .and_then(|entry| entry.uniforms.get(*location as usize));
        let values: Vec<f32> = match slot {
            Some((_, UniformSlot::Floats(values))) => values.clone(),
            Some((_, UniformSlot::Ints(values))) => values.iter().map(|&v| v as f32).collect(),
            None => Vec::new(),
        };
        for (dst, src) in out.iter_mut().zip(values) {
            *dst = src;
        }
    }

    fn read_uniform_i32(&self, program: u32, location: &u32, out: &mut [i32]) {
        let state = self.state.borrow();
        let slot = state
            .programs
            .get(&program)
            .and_then(|entry| entry.uniforms.get(*location as usize));
        let values: Vec<i32> = match slot {
            Some((_, UniformSlot::Ints(values))) => values.clone(),
            Some((_, UniformSlot::Floats(values))) => values.iter().map(|&v| v as i32).collect(),
            None => Vec::new(),
        };
        for (dst, src) in out.iter_mut().zip(values) {
            *dst = src;
        }
    }

    fn create_vertex_array(&self) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let handle = state.allocate();
        state
            .vertex_arrays
            .insert(handle, FakeVertexArray::default());
        Ok(handle)
    }

    fn bind_vertex_array(&self, vertex_array: Option<u32>) {
        let mut state = self.state.borrow_mut();
        match vertex_array {
            Some(handle) if !state.vertex_arrays.contains_key(&handle) => {
                state.raise(INVALID_OPERATION)
            }
            other => state.bound_vertex_array = other,
        }
    }

    fn delete_vertex_array(&self, vertex_array: u32) {
        let mut state = self.state.borrow_mut();
        if state.vertex_arrays.remove(&vertex_array).is_none() {
            state.raise(INVALID_VALUE);
        }
        if state.bound_vertex_array == Some(vertex_array) {
            state.bound_vertex_array = None;
        }
    }

    fn create_buffer(&self) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let handle = state.allocate();
        state.buffers.insert(handle, Vec::new());
        Ok(handle)
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<u32>) {
        let mut state = self.state.borrow_mut();
        if let Some(handle) = buffer {
            if !state.buffers.contains_key(&handle) {
                state.raise(INVALID_VALUE);
                return;
            }
        }
        match target {
            BufferTarget::Vertex => state.bound_vertex_buffer = buffer,
            BufferTarget::Index => {
                let Some(vao) = state.bound_vertex_array else {
                    state.raise(INVALID_OPERATION);
                    return;
                };
                if let Some(entry) = state.vertex_arrays.get_mut(&vao) {
                    entry.index_buffer = buffer;
                }
            }
        }
    }

    fn buffer_data(&self, target: BufferTarget, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        let bound = match target {
            BufferTarget::Vertex => state.bound_vertex_buffer,
            BufferTarget::Index => state
                .bound_vertex_array
                .and_then(|vao| state.vertex_arrays.get(&vao))
                .and_then(|vao| vao.index_buffer),
        };
        match bound.and_then(|handle| state.buffers.get_mut(&handle)) {
            Some(storage) => *storage = data.to_vec(),
            None => state.raise(INVALID_OPERATION),
        }
    }

    fn delete_buffer(&self, buffer: u32) {
        let mut state = self.state.borrow_mut();
        if state.buffers.remove(&buffer).is_none() {
            state.raise(INVALID_VALUE);
        }
    }

    fn vertex_attrib_f32(&self, location: u32, components: i32, stride: i32, offset: i32) {
        let mut state = self.state.borrow_mut();
        if state.bound_vertex_buffer.is_none() {
            state.raise(INVALID_OPERATION);
            return;
        }
        let Some(vao) = state.bound_vertex_array else {
            state.raise(INVALID_OPERATION);
            return;
        };
        if let Some(entry) = state.vertex_arrays.get_mut(&vao) {
            entry.attributes.push((location, components, stride, offset));
        }
    }

    fn enable_vertex_attrib(&self, _location: u32) {
        let mut state = self.state.borrow_mut();
        if state.bound_vertex_array.is_none() {
            state.raise(INVALID_OPERATION);
        }
    }

    fn create_texture(&self) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let handle = state.allocate();
        state.created_textures += 1;
        state.textures.insert(handle, None);
        Ok(handle)
    }

    fn bind_texture(&self, unit: u32, texture: Option<u32>) {
        let mut state = self.state.borrow_mut();
        state.active_unit = unit;
        match texture {
            Some(handle) if !state.textures.contains_key(&handle) => {
                state.raise(INVALID_VALUE)
            }
            Some(handle) => {
                state.texture_units.insert(unit, handle);
            }
            None => {
                state.texture_units.remove(&unit);
            }
        }
    }

    fn upload_rgba8(&self, width: u32, height: u32, pixels: &[u8], sampler: SamplerState) {
        let mut state = self.state.borrow_mut();
        let unit = state.active_unit;
        let Some(handle) = state.texture_units.get(&unit).copied() else {
            state.raise(INVALID_OPERATION);
            return;
        };
        if pixels.len() != (width * height * 4) as usize {
            state.raise(INVALID_VALUE);
            return;
        }
        state.uploads += 1;
        state
            .textures
            .insert(handle, Some(((width, height), sampler)));
    }

    fn delete_texture(&self, texture: u32) {
        let mut state = self.state.borrow_mut();
        if state.textures.remove(&texture).is_none() {
            state.raise(INVALID_VALUE);
        }
        state.texture_units.retain(|_, bound| *bound != texture);
    }

    fn clear(&self, _color: [f32; 4]) {}

    fn viewport(&self, width: i32, height: i32) {
        self.state.borrow_mut().viewport = (width, height);
    }

    fn polygon_fill(&self, wireframe: bool) {
        self.state.borrow_mut().wireframe = wireframe;
    }

    fn draw_triangles(&self, _first: i32, count: i32) {
        self.record_draw(count, false);
    }

    fn draw_indexed_triangles(&self, count: i32, _offset: i32) {
        self.record_draw(count, true);
    }

    fn take_error(&self) -> Option<u32> {
        let mut state = self.state.borrow_mut();
        if state.errors.is_empty() {
            None
        } else {
            Some(state.errors.remove(0))
        }
    }
}
