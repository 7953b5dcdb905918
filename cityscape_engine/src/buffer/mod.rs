//! Streaming buffers - persistently mapped multi-section ring buffers

pub mod ring_buffer;

pub use ring_buffer::{MappedRingBuffer, RingBufferDesc, SectionCount};
