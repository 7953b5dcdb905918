/// GraphicsDevice trait - factory and immediate command interface

use std::sync::Arc;
use std::sync::{Mutex, MutexGuard};
use crate::error::{CityscapeError, CityscapeResult};
use crate::graphics_device::{
    Buffer, BufferDesc, BufferTarget, Fence, IndexType,
    Shader, ShaderDesc, Texture, TextureDesc, VertexInput, VertexInputDesc,
};

/// Primitive topology of a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    TriangleList,
    LineList,
    PointList,
}

/// A single draw call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCall {
    /// Non-indexed draw
    Arrays {
        topology: PrimitiveTopology,
        first_vertex: u32,
        vertex_count: u32,
        /// Index of the first instance fetched from per-instance bindings
        first_instance: u32,
        instance_count: u32,
    },
    /// Indexed draw
    Indexed {
        topology: PrimitiveTopology,
        index_type: IndexType,
        first_index: u32,
        index_count: u32,
        /// Added to every index before fetching vertices
        base_vertex: i32,
        first_instance: u32,
        instance_count: u32,
    },
}

impl DrawCall {
    /// Number of instances drawn
    pub fn instance_count(&self) -> u32 {
        match self {
            DrawCall::Arrays { instance_count, .. } | DrawCall::Indexed { instance_count, .. } => *instance_count,
        }
    }

    /// First instance index
    pub fn first_instance(&self) -> u32 {
        match self {
            DrawCall::Arrays { first_instance, .. } | DrawCall::Indexed { first_instance, .. } => *first_instance,
        }
    }

    /// Number of vertices (or indices) consumed per instance
    pub fn element_count(&self) -> u32 {
        match self {
            DrawCall::Arrays { vertex_count, .. } => *vertex_count,
            DrawCall::Indexed { index_count, .. } => *index_count,
        }
    }
}

/// Device statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Draw calls issued
    pub draw_calls: u64,
    /// Instances drawn across all draw calls
    pub instances_drawn: u64,
    /// Buffers created
    pub buffers_created: u64,
    /// Textures created
    pub textures_created: u64,
    /// Textures currently alive
    pub live_textures: u64,
    /// Fences inserted
    pub fences_inserted: u64,
    /// Fence polls that found the fence pending
    pub fence_polls: u64,
}

/// Graphics device trait
///
/// Central factory for GPU objects and the sink for immediate-mode binds and
/// draws. Implemented by backends; the crate ships
/// [`HeadlessGraphicsDevice`](crate::graphics_device::HeadlessGraphicsDevice).
/// Shared as `Arc<Mutex<dyn GraphicsDevice>>`.
pub trait GraphicsDevice: Send {
    /// Create a buffer
    fn create_buffer(&mut self, desc: BufferDesc) -> CityscapeResult<Arc<dyn Buffer>>;

    /// Create a texture
    fn create_texture(&mut self, desc: TextureDesc) -> CityscapeResult<Arc<dyn Texture>>;

    /// Compile and link a shader program
    fn create_shader(&mut self, desc: ShaderDesc) -> CityscapeResult<Arc<dyn Shader>>;

    /// Create an input-assembly state
    fn create_vertex_input(&mut self, desc: VertexInputDesc) -> CityscapeResult<Arc<dyn VertexInput>>;

    /// Insert a fence after the most recently submitted command
    fn insert_fence(&mut self) -> CityscapeResult<Box<dyn Fence>>;

    /// Make `shader` the active program
    fn bind_program(&mut self, shader: &Arc<dyn Shader>) -> CityscapeResult<()>;

    /// Activate an input-assembly state and its buffers
    fn bind_vertex_input(&mut self, input: &Arc<dyn VertexInput>) -> CityscapeResult<()>;

    /// Bind a texture to a texture unit
    fn bind_texture(&mut self, unit: u32, texture: &Arc<dyn Texture>) -> CityscapeResult<()>;

    /// Bind a whole buffer to a binding point
    fn bind_buffer(&mut self, target: BufferTarget, buffer: &Arc<dyn Buffer>) -> CityscapeResult<()>;

    /// Bind a buffer range to an indexed binding point
    fn bind_buffer_range(
        &mut self,
        target: BufferTarget,
        index: u32,
        buffer: &Arc<dyn Buffer>,
        offset: u64,
        size: u64,
    ) -> CityscapeResult<()>;

    /// Issue a draw with the current bindings
    fn draw(&mut self, call: DrawCall) -> CityscapeResult<()>;

    /// Block until all submitted work has completed
    fn finish(&mut self) -> CityscapeResult<()>;

    /// Statistics since creation
    fn stats(&self) -> DeviceStats;
}

/// Lock the shared device, mapping poisoning to a backend error
pub(crate) fn lock_device(
    device: &Arc<Mutex<dyn GraphicsDevice>>,
) -> CityscapeResult<MutexGuard<'_, dyn GraphicsDevice + 'static>> {
    device.lock().map_err(|_| CityscapeError::BackendError("Graphics device mutex poisoned".to_string()))
}
