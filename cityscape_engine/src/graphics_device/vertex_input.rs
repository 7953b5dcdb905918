/// Vertex input (input-assembly state) trait and descriptor

use std::sync::Arc;
use crate::graphics_device::Buffer;

/// Scalar type of one attribute component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    F32,
    I32,
    U32,
    I16,
    U16,
    I8,
    U8,
}

impl ScalarType {
    /// Size of one component in bytes
    pub fn size_bytes(&self) -> u32 {
        match self {
            ScalarType::F32 | ScalarType::I32 | ScalarType::U32 => 4,
            ScalarType::I16 | ScalarType::U16 => 2,
            ScalarType::I8 | ScalarType::U8 => 1,
        }
    }
}

/// How often a binding advances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexStepMode {
    /// Once per vertex
    Vertex,
    /// Once per instance
    Instance,
}

/// A buffer bound to a vertex binding slot
#[derive(Clone)]
pub struct VertexBinding {
    pub binding: u32,
    pub stride: u32,
    pub step: VertexStepMode,
    pub buffer: Arc<dyn Buffer>,
}

/// One vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader input location
    pub location: u32,
    /// Binding slot the attribute reads from
    pub binding: u32,
    /// Component count (1..=4)
    pub components: u32,
    pub scalar: ScalarType,
    /// Integer components are normalized to [0, 1] / [-1, 1]
    pub normalized: bool,
    /// Byte offset within the binding's stride
    pub offset: u32,
}

impl VertexAttribute {
    /// Size of the attribute in bytes
    pub fn size_bytes(&self) -> u32 {
        self.components * self.scalar.size_bytes()
    }
}

/// Descriptor for creating a vertex input
#[derive(Clone)]
pub struct VertexInputDesc {
    pub bindings: Vec<VertexBinding>,
    pub attributes: Vec<VertexAttribute>,
    /// Index buffer associated with this input
    pub index_buffer: Option<Arc<dyn Buffer>>,
}

/// Element counts the buffers behind a vertex input can supply
///
/// `None` means no binding of that step rate, so the count is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputLimits {
    pub vertices: Option<u64>,
    pub instances: Option<u64>,
}

impl VertexInputDesc {
    /// Smallest element count over the bindings of each step rate
    pub fn limits(&self) -> InputLimits {
        let capacity = |step: VertexStepMode| self.bindings.iter()
            .filter(|b| b.step == step && b.stride > 0)
            .map(|b| b.buffer.size() / b.stride as u64)
            .min();
        InputLimits {
            vertices: capacity(VertexStepMode::Vertex),
            instances: capacity(VertexStepMode::Instance),
        }
    }
}

/// Opaque input-assembly state handle
pub trait VertexInput: Send + Sync {
    /// Number of attributes
    fn attribute_count(&self) -> usize;

    /// Stride of a binding slot
    fn stride(&self, binding: u32) -> Option<u32>;

    /// Whether an index buffer is associated
    fn has_index_buffer(&self) -> bool;

    /// Index buffer fetched by indexed draws
    fn index_buffer(&self) -> Option<&Arc<dyn Buffer>>;

    /// Element counts the bound buffers can supply
    fn limits(&self) -> InputLimits;
}
