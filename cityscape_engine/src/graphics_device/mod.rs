//! Graphics device module - backend traits and the headless implementation

// Module declarations
pub mod graphics_device;
pub mod buffer;
pub mod fence;
pub mod texture;
pub mod shader;
pub mod vertex_input;
pub mod headless_graphics_device;

// Re-export everything from graphics_device.rs
pub use graphics_device::*;

// Re-export from other modules
pub use buffer::*;
pub use fence::*;
pub use texture::*;
pub use shader::*;
pub use vertex_input::*;
pub use headless_graphics_device::{HeadlessGraphicsDevice, HeadlessConfig, RecordedCommand, DEFAULT_COMMAND_LOG_CAPACITY};
