/// Persistently mapped multi-section ring buffer.
///
/// A fixed-capacity device buffer split into 1, 2 or 3 equal sections. The
/// CPU appends into the active section through a write cursor while the GPU
/// consumes the sections written in previous frames. Each section carries at
/// most one fence; a section must not be rewritten until its fence signals.
///
/// Per-section order:
///
/// ```text
/// sync (if reused) -> write* -> flush/bind -> draw -> lock -> swap_sections
/// ```
///
/// A section that becomes active while still fenced is marked pending-sync and
/// the first write into it waits for the fence, so the order above holds even
/// when the caller forgets the explicit `sync()`.

use std::sync::{Arc, Mutex};
use bytemuck::Pod;
use crate::error::{CityscapeError, CityscapeResult};
use crate::{engine_bail, engine_trace, engine_warn};
use crate::graphics_device::{
    Buffer, BufferAccess, BufferDesc, BufferTarget, BufferUsage, Fence, GraphicsDevice, lock_device,
};
use crate::config::DEFAULT_FENCE_SPIN_LIMIT;

// ===== SECTION COUNT =====

/// Number of sections in a ring buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionCount {
    /// No overlap: every reuse waits for the GPU
    Single = 1,
    /// Double buffering
    Double = 2,
    /// Triple buffering
    Triple = 3,
}

impl SectionCount {
    /// Number of sections as an integer
    pub fn count(&self) -> usize {
        *self as usize
    }
}

impl TryFrom<u32> for SectionCount {
    type Error = CityscapeError;

    fn try_from(value: u32) -> CityscapeResult<Self> {
        match value {
            1 => Ok(SectionCount::Single),
            2 => Ok(SectionCount::Double),
            3 => Ok(SectionCount::Triple),
            other => Err(CityscapeError::InvalidResource(format!(
                "Section count must be 1, 2 or 3 (got {})", other))),
        }
    }
}

// ===== RING BUFFER DESC =====

/// Descriptor for creating a MappedRingBuffer
#[derive(Debug, Clone)]
pub struct RingBufferDesc {
    /// Debug label of the device buffer
    pub label: String,
    pub section_count: SectionCount,
    /// Size of one section in bytes
    pub section_size: u64,
    pub usage: BufferUsage,
    /// Static buffers require `initial_data` and reject writes
    pub access: BufferAccess,
    /// Initial contents of the whole buffer (all sections)
    pub initial_data: Option<Vec<u8>>,
    /// Fence polls spent spinning before `sync()` yields between polls
    pub fence_spin_limit: u32,
}

impl RingBufferDesc {
    /// Dynamic descriptor with default spin limit and no initial data
    pub fn dynamic(label: impl Into<String>, section_count: SectionCount, section_size: u64, usage: BufferUsage) -> Self {
        Self {
            label: label.into(),
            section_count,
            section_size,
            usage,
            access: BufferAccess::Dynamic,
            initial_data: None,
            fence_spin_limit: DEFAULT_FENCE_SPIN_LIMIT,
        }
    }
}

// ===== SECTION STATE =====

/// Fence bookkeeping of one section
#[derive(Default)]
struct Section {
    fence: Option<Box<dyn Fence>>,
    pending_sync: bool,
}

// ===== MAPPED RING BUFFER =====

/// Multi-section streaming buffer
pub struct MappedRingBuffer {
    device: Arc<Mutex<dyn GraphicsDevice>>,
    buffer: Arc<dyn Buffer>,
    mapped: Option<*mut u8>,
    section_count: SectionCount,
    section_size: u64,
    current: usize,
    /// Write cursor within the active section
    offset: u64,
    /// End of the highest byte written since the last flush
    dirty_end: u64,
    sections: Vec<Section>,
    fence_spin_limit: u32,
}

// SAFETY: `mapped` points into `buffer`, which is Send + Sync and outlives
// this struct; all writes go through `&mut self`.
unsafe impl Send for MappedRingBuffer {}
unsafe impl Sync for MappedRingBuffer {}

impl MappedRingBuffer {
    /// Allocate `section_count × section_size` bytes on the device
    pub fn new(device: Arc<Mutex<dyn GraphicsDevice>>, desc: RingBufferDesc) -> CityscapeResult<Self> {
        // ========== VALIDATION ==========
        if desc.section_size == 0 {
            engine_bail!(InvalidResource => "cityscape::RingBuffer", "Ring buffer '{}' has zero section size", desc.label);
        }
        let capacity = desc.section_size
            .checked_mul(desc.section_count.count() as u64)
            .ok_or_else(|| CityscapeError::InvalidResource(format!("Ring buffer '{}' capacity overflows", desc.label)))?;

        if desc.access == BufferAccess::Static && desc.initial_data.is_none() {
            engine_bail!(InvalidResource => "cityscape::RingBuffer",
                "Static ring buffer '{}' requires initial data", desc.label);
        }

        // ========== ALLOCATION ==========
        let buffer = {
            let mut device = lock_device(&device)?;
            device.create_buffer(BufferDesc {
                label: desc.label.clone(),
                size: capacity,
                usage: desc.usage,
                access: desc.access,
                data: desc.initial_data,
            })?
        };

        let mapped = match desc.access {
            BufferAccess::Dynamic => match buffer.mapped_ptr() {
                Some(ptr) => Some(ptr),
                None => engine_bail!("cityscape::RingBuffer",
                    "Device returned an unmapped buffer for dynamic ring buffer '{}'", desc.label),
            },
            BufferAccess::Static => None,
        };

        engine_trace!("cityscape::RingBuffer",
            "Created ring buffer '{}' ({} x {} bytes)", desc.label, desc.section_count.count(), desc.section_size);

        Ok(Self {
            device,
            buffer,
            mapped,
            section_count: desc.section_count,
            section_size: desc.section_size,
            current: 0,
            offset: 0,
            dirty_end: 0,
            sections: (0..desc.section_count.count()).map(|_| Section::default()).collect(),
            fence_spin_limit: desc.fence_spin_limit,
        })
    }

    // ===== WRITES =====

    /// Append a plain-old-data value (scalar, vector, matrix or struct)
    pub fn write<T: Pod>(&mut self, value: &T) -> CityscapeResult<()> {
        self.write_bytes(bytemuck::bytes_of(value))
    }

    /// Append a slice of plain-old-data values
    pub fn write_slice<T: Pod>(&mut self, values: &[T]) -> CityscapeResult<()> {
        self.write_bytes(bytemuck::cast_slice(values))
    }

    /// Append raw bytes at the cursor of the active section
    ///
    /// Rejected without a partial write when the bytes do not fit in the
    /// rest of the section.
    pub fn write_bytes(&mut self, data: &[u8]) -> CityscapeResult<()> {
        let Some(mapped) = self.mapped else {
            engine_bail!(InvalidState => "cityscape::RingBuffer",
                "Ring buffer '{}' is static and cannot be written", self.buffer.label());
        };

        let len = data.len() as u64;
        let available = self.section_size - self.offset;
        if len > available {
            engine_warn!("cityscape::RingBuffer",
                "Write of {} bytes rejected: {} of {} bytes left in section {} of '{}'",
                len, available, self.section_size, self.current, self.buffer.label());
            return Err(CityscapeError::CapacityExceeded { requested: len, available });
        }

        if self.sections[self.current].pending_sync {
            self.sync();
        }

        let start = self.section_base() + self.offset;
        // SAFETY: `start + len` lies within the active section of the mapped
        // allocation (checked above) and the allocation stays alive with
        // `self.buffer`.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.add(start as usize), data.len());
        }

        self.offset += len;
        self.dirty_end = self.dirty_end.max(self.offset);
        Ok(())
    }

    /// Move the cursor within the active section
    ///
    /// Offsets at or past the section size are ignored.
    pub fn set_offset(&mut self, offset: u64) {
        if offset < self.section_size {
            self.offset = offset;
        } else {
            engine_trace!("cityscape::RingBuffer",
                "Ignoring offset {} (section size {})", offset, self.section_size);
        }
    }

    /// Make the active section's writes visible to the device
    ///
    /// Flushes the written range on non-coherent mappings; no-op on coherent
    /// ones. Optionally resets the cursor to 0.
    pub fn flush(&mut self, reset_offset: bool) -> CityscapeResult<()> {
        if self.dirty_end > 0 && !self.buffer.is_coherent() {
            self.buffer.flush_mapped_range(self.section_base(), self.dirty_end)?;
        }
        self.dirty_end = 0;
        if reset_offset {
            self.offset = 0;
        }
        Ok(())
    }

    // ===== SYNCHRONIZATION =====

    /// Fence the active section after the most recently submitted commands
    ///
    /// Any previous fence of this section is dropped.
    pub fn lock(&mut self) -> CityscapeResult<()> {
        let fence = lock_device(&self.device)?.insert_fence()?;
        let section = &mut self.sections[self.current];
        section.fence = Some(fence);
        section.pending_sync = false;
        Ok(())
    }

    /// Block until the active section's fence signals
    ///
    /// Returns immediately when the section holds no fence.
    pub fn sync(&mut self) {
        let section = &mut self.sections[self.current];
        section.pending_sync = false;
        let Some(fence) = section.fence.take() else {
            return;
        };

        let mut polls: u32 = 0;
        while !fence.is_signaled() {
            if polls < self.fence_spin_limit {
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
            polls = polls.saturating_add(1);
        }

        if polls > 0 {
            engine_trace!("cityscape::RingBuffer",
                "Section {} of '{}' synced after {} polls", self.current, self.buffer.label(), polls);
        }
    }

    /// Advance to the next section and reset the cursor
    ///
    /// Does not wait; the first write into a still-fenced section does.
    pub fn swap_sections(&mut self) {
        self.current = (self.current + 1) % self.section_count.count();
        self.offset = 0;
        self.dirty_end = 0;
        let section = &mut self.sections[self.current];
        section.pending_sync = section.fence.is_some();
    }

    // ===== BINDING =====

    /// Bind the whole device buffer to `target`
    pub fn bind(&self, target: BufferTarget) -> CityscapeResult<()> {
        lock_device(&self.device)?.bind_buffer(target, &self.buffer)
    }

    /// Bind the active section to indexed binding point `index`
    pub fn bind_base(&self, target: BufferTarget, index: u32) -> CityscapeResult<()> {
        lock_device(&self.device)?
            .bind_buffer_range(target, index, &self.buffer, self.section_base(), self.section_size)
    }

    /// Bind a range of the active section (offset relative to the section)
    pub fn bind_range(&self, target: BufferTarget, index: u32, offset: u64, size: u64) -> CityscapeResult<()> {
        if offset.checked_add(size).map_or(true, |end| end > self.section_size) {
            engine_bail!(InvalidResource => "cityscape::RingBuffer",
                "Range [{}, +{}) exceeds section size {} of '{}'",
                offset, size, self.section_size, self.buffer.label());
        }
        lock_device(&self.device)?
            .bind_buffer_range(target, index, &self.buffer, self.section_base() + offset, size)
    }

    // ===== ACCESSORS =====

    /// Total size in bytes
    pub fn capacity(&self) -> u64 {
        self.section_size * self.section_count.count() as u64
    }

    pub fn section_size(&self) -> u64 {
        self.section_size
    }

    pub fn section_count(&self) -> SectionCount {
        self.section_count
    }

    /// Index of the active section
    pub fn current_section(&self) -> usize {
        self.current
    }

    /// Write cursor within the active section
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Byte offset of the active section within the device buffer
    pub fn section_base(&self) -> u64 {
        self.current as u64 * self.section_size
    }

    /// Whether `section` currently holds a fence
    pub fn is_fenced(&self, section: usize) -> bool {
        self.sections.get(section).is_some_and(|s| s.fence.is_some())
    }

    /// Whether the next write into the active section will wait first
    pub fn needs_sync(&self) -> bool {
        self.sections[self.current].pending_sync
    }

    /// Underlying device buffer
    pub fn buffer(&self) -> &Arc<dyn Buffer> {
        &self.buffer
    }

    /// Device the buffer was created on
    pub fn device(&self) -> &Arc<Mutex<dyn GraphicsDevice>> {
        &self.device
    }
}

#[cfg(test)]
#[path = "ring_buffer_tests.rs"]
mod tests;
