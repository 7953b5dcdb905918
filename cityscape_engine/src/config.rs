/// Streaming configuration shared by the resource pool, meshes and batches

use crate::buffer::SectionCount;

/// Default capacity of a shared instance buffer, in instances
pub const DEFAULT_INSTANCE_CAPACITY: u32 = 10_000;

/// Default number of fence polls before a waiting thread starts yielding
pub const DEFAULT_FENCE_SPIN_LIMIT: u32 = 1_000;

/// Configuration for buffer streaming
///
/// # Example
///
/// ```
/// use cityscape_engine::cityscape::{StreamingConfig, buffer::SectionCount};
///
/// let config = StreamingConfig::default()
///     .with_instance_capacity(2_048)
///     .with_batch_sections(SectionCount::Triple);
/// assert_eq!(config.instance_capacity, 2_048);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamingConfig {
    /// Instances per section of each shared instance buffer
    pub instance_capacity: u32,
    /// Sections of each shared instance buffer
    pub instance_sections: SectionCount,
    /// Sections of the vertex/index ring buffers owned by a RenderBatch
    pub batch_sections: SectionCount,
    /// Fence polls spent spinning before `sync()` yields between polls
    pub fence_spin_limit: u32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            instance_capacity: DEFAULT_INSTANCE_CAPACITY,
            instance_sections: SectionCount::Triple,
            batch_sections: SectionCount::Double,
            fence_spin_limit: DEFAULT_FENCE_SPIN_LIMIT,
        }
    }
}

impl StreamingConfig {
    /// Set the shared instance buffer capacity (instances per section)
    pub fn with_instance_capacity(mut self, capacity: u32) -> Self {
        self.instance_capacity = capacity;
        self
    }

    /// Set the section count of shared instance buffers
    pub fn with_instance_sections(mut self, sections: SectionCount) -> Self {
        self.instance_sections = sections;
        self
    }

    /// Set the section count of batch ring buffers
    pub fn with_batch_sections(mut self, sections: SectionCount) -> Self {
        self.batch_sections = sections;
        self
    }

    /// Set the number of spinning fence polls before yielding
    pub fn with_fence_spin_limit(mut self, limit: u32) -> Self {
        self.fence_spin_limit = limit;
        self
    }
}
