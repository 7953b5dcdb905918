/// Buffer trait and buffer descriptor

use bitflags::bitflags;
use crate::error::CityscapeResult;

bitflags! {
    /// What a buffer may be bound as
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Per-vertex attribute data
        const VERTEX   = 1 << 0;
        /// Index data
        const INDEX    = 1 << 1;
        /// Uniform block data
        const UNIFORM  = 1 << 2;
        /// Shader storage data
        const STORAGE  = 1 << 3;
        /// Per-instance attribute data
        const INSTANCE = 1 << 4;
    }
}

/// CPU access pattern of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferAccess {
    /// Written once at creation, never mapped afterwards
    Static,
    /// Persistently mapped for the buffer's lifetime
    Dynamic,
}

/// Pipeline binding point for a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Vertex,
    Index,
    Uniform,
    Storage,
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Debug label
    pub label: String,
    /// Size in bytes
    pub size: u64,
    /// Allowed bindings
    pub usage: BufferUsage,
    /// CPU access pattern
    pub access: BufferAccess,
    /// Initial contents (required for Static, at most `size` bytes)
    pub data: Option<Vec<u8>>,
}

/// Buffer resource trait
///
/// Implemented by backend-specific buffer types. The buffer is destroyed when
/// the last `Arc` is dropped.
pub trait Buffer: Send + Sync {
    /// Debug label
    fn label(&self) -> &str;

    /// Size in bytes
    fn size(&self) -> u64;

    /// CPU access pattern
    fn access(&self) -> BufferAccess;

    /// Copy `data` into the buffer at `offset` (Dynamic buffers only)
    fn update(&self, offset: u64, data: &[u8]) -> CityscapeResult<()>;

    /// Raw pointer to persistently mapped memory
    ///
    /// Returns None for Static buffers. The pointer stays valid for the
    /// lifetime of the buffer.
    fn mapped_ptr(&self) -> Option<*mut u8>;

    /// Whether CPU writes through the mapping are visible without a flush
    fn is_coherent(&self) -> bool;

    /// Make CPU writes in `[offset, offset + size)` visible to the device
    fn flush_mapped_range(&self, offset: u64, size: u64) -> CityscapeResult<()>;

    /// Read back `size` bytes at `offset` as the device currently sees them
    fn read(&self, offset: u64, size: u64) -> CityscapeResult<Vec<u8>>;
}

/// Index element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    /// Size of one index in bytes
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}
