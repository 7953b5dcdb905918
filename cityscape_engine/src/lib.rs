/*!
# Cityscape Engine

GPU buffer streaming and instanced rendering core.

The crate talks to the GPU only through the [`GraphicsDevice`](cityscape::graphics_device::GraphicsDevice)
trait object. A headless implementation checks every draw against the bound
buffers and runs a simulated fence timeline, so the whole streaming path runs
without a window.

## Architecture

- **MappedRingBuffer**: persistently mapped buffer split into 1-3 sections,
  fenced per section so the CPU writes one while the GPU reads another
- **VertexLayoutBinding**: vertex attribute layout for a buffer pair, with an
  optional per-instance stream
- **Mesh / Model**: host geometry committed to static GPU buffers, textured
  through the shared resource pool and drawable with per-frame instances
- **RenderBatch**: per-frame accumulation of small meshes into one draw

Backend implementations provide concrete types that implement the device traits.
*/

// Internal modules
mod error;
mod engine;
mod config;
pub mod log;
pub mod graphics_device;
pub mod buffer;
pub mod vertex;
pub mod resource;
pub mod render;

// Main cityscape namespace module
pub mod cityscape {
    // Error types
    pub use crate::error::{CityscapeError, CityscapeResult};

    // Engine singleton
    pub use crate::engine::Engine;

    // Streaming configuration
    pub use crate::config::{StreamingConfig, DEFAULT_FENCE_SPIN_LIMIT, DEFAULT_INSTANCE_CAPACITY};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    pub mod graphics_device {
        pub use crate::graphics_device::*;
    }

    pub mod buffer {
        pub use crate::buffer::*;
    }

    pub mod vertex {
        pub use crate::vertex::*;
    }

    pub mod resource {
        pub use crate::resource::*;
    }

    pub mod render {
        pub use crate::render::*;
    }
}

// Re-export math library at crate root
pub use glam;
