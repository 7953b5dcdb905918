/// Headless graphics device
///
/// A software implementation of [`GraphicsDevice`] that needs no GPU. Buffers
/// live in host memory and fences follow a simulated GPU timeline. Draws are
/// checked against the bound buffers, and recent commands are kept in a
/// bounded log that tests and tools can inspect.
///
/// # GPU timeline
///
/// Each draw is one submission with a monotonically increasing serial. A
/// fence captures the serial of the last submission at insertion time and is
/// signaled once the timeline has completed that serial. The simulated GPU
/// makes progress whenever a pending fence is polled (one submission per
/// poll) and completes everything on `finish()`, so every wait terminates.

use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use crate::error::{CityscapeError, CityscapeResult};
use crate::engine_bail;
use crate::graphics_device::{
    Buffer, BufferAccess, BufferDesc, BufferTarget, DeviceStats, DrawCall,
    Fence, FenceStatus, GraphicsDevice, IndexType, InputLimits, Shader, ShaderDesc,
    Texture, TextureDesc, TextureInfo, VertexInput, VertexInputDesc, mip_level_count,
};

// ============================================================================
// Configuration
// ============================================================================

/// Commands kept by a default-configured device
pub const DEFAULT_COMMAND_LOG_CAPACITY: usize = 4096;

/// Headless device configuration
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Device label used in log messages
    pub label: String,
    /// Mapped writes are visible without explicit flushes
    pub coherent_mapping: bool,
    /// Most recent commands kept in the log; 0 disables recording
    pub command_log_capacity: usize,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            label: "headless".to_string(),
            coherent_mapping: true,
            command_log_capacity: DEFAULT_COMMAND_LOG_CAPACITY,
        }
    }
}

// ============================================================================
// Recorded commands
// ============================================================================

/// A command observed by the headless device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCommand {
    BindProgram(String),
    BindVertexInput { attributes: usize, indexed: bool },
    BindTexture { unit: u32, label: String },
    BindBuffer { target: BufferTarget, label: String },
    BindBufferRange { target: BufferTarget, index: u32, label: String, offset: u64, size: u64 },
    FlushMappedRange { label: String, offset: u64, size: u64 },
    Draw(DrawCall),
    InsertFence(u64),
    Finish,
}

// ============================================================================
// Shared state
// ============================================================================

/// State shared between the device and the objects it creates
struct Shared {
    submitted: AtomicU64,
    completed: AtomicU64,
    draw_calls: AtomicU64,
    instances_drawn: AtomicU64,
    buffers_created: AtomicU64,
    textures_created: AtomicU64,
    live_textures: AtomicU64,
    fences_inserted: AtomicU64,
    fence_polls: AtomicU64,
    commands: Mutex<VecDeque<RecordedCommand>>,
    command_log_capacity: usize,
}

impl Shared {
    fn new(command_log_capacity: usize) -> Self {
        Self {
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            draw_calls: AtomicU64::new(0),
            instances_drawn: AtomicU64::new(0),
            buffers_created: AtomicU64::new(0),
            textures_created: AtomicU64::new(0),
            live_textures: AtomicU64::new(0),
            fences_inserted: AtomicU64::new(0),
            fence_polls: AtomicU64::new(0),
            commands: Mutex::new(VecDeque::with_capacity(command_log_capacity.min(DEFAULT_COMMAND_LOG_CAPACITY))),
            command_log_capacity,
        }
    }

    fn record(&self, command: RecordedCommand) {
        if self.command_log_capacity == 0 {
            return;
        }
        if let Ok(mut commands) = self.commands.lock() {
            if commands.len() == self.command_log_capacity {
                commands.pop_front();
            }
            commands.push_back(command);
        }
    }

    /// Complete one outstanding submission, if any
    fn retire_one(&self) {
        let submitted = self.submitted.load(Ordering::Acquire);
        let _ = self.completed.fetch_update(Ordering::AcqRel, Ordering::Acquire, |done| {
            (done < submitted).then_some(done + 1)
        });
    }

    fn retire_all(&self) {
        let submitted = self.submitted.load(Ordering::Acquire);
        self.completed.fetch_max(submitted, Ordering::AcqRel);
    }
}

// ============================================================================
// Host memory
// ============================================================================

/// Fixed-size host allocation that is written through raw pointers
struct HostMemory {
    bytes: Box<[UnsafeCell<u8>]>,
}

// SAFETY: the streaming core writes mapped memory from a single thread; the
// allocation never moves or resizes while the buffer is alive.
unsafe impl Send for HostMemory {}
unsafe impl Sync for HostMemory {}

impl HostMemory {
    fn zeroed(size: usize) -> Self {
        Self {
            bytes: (0..size).map(|_| UnsafeCell::new(0u8)).collect(),
        }
    }

    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn ptr(&self) -> *mut u8 {
        // UnsafeCell<u8> has the same layout as u8
        self.bytes.as_ptr() as *mut u8
    }

    fn write(&self, offset: usize, data: &[u8]) {
        debug_assert!(offset + data.len() <= self.len());
        // SAFETY: bounds checked by every caller
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.ptr().add(offset), data.len());
        }
    }

    fn read(&self, offset: usize, size: usize) -> Vec<u8> {
        debug_assert!(offset + size <= self.len());
        // SAFETY: bounds checked by every caller
        unsafe { std::slice::from_raw_parts(self.ptr().add(offset), size).to_vec() }
    }

    fn copy_from(&self, other: &HostMemory, offset: usize, size: usize) {
        let data = other.read(offset, size);
        self.write(offset, &data);
    }
}

// ============================================================================
// Headless Buffer
// ============================================================================

/// Host-memory buffer
///
/// Coherent buffers have a single allocation. Non-coherent buffers keep a
/// separate device copy that only receives mapped writes on flush.
pub struct HeadlessBuffer {
    shared: Arc<Shared>,
    label: String,
    access: BufferAccess,
    mapped: HostMemory,
    device_copy: Option<HostMemory>,
}

impl HeadlessBuffer {
    fn visible(&self) -> &HostMemory {
        self.device_copy.as_ref().unwrap_or(&self.mapped)
    }

    fn check_range(&self, offset: u64, size: u64) -> CityscapeResult<()> {
        let end = offset.checked_add(size)
            .ok_or_else(|| CityscapeError::InvalidResource(format!("Range overflow in buffer '{}'", self.label)))?;
        if end > self.mapped.len() as u64 {
            engine_bail!(InvalidResource => "cityscape::HeadlessGraphicsDevice",
                "Range [{}, {}) exceeds size {} of buffer '{}'",
                offset, end, self.mapped.len(), self.label);
        }
        Ok(())
    }
}

impl Buffer for HeadlessBuffer {
    fn label(&self) -> &str {
        &self.label
    }

    fn size(&self) -> u64 {
        self.mapped.len() as u64
    }

    fn access(&self) -> BufferAccess {
        self.access
    }

    fn update(&self, offset: u64, data: &[u8]) -> CityscapeResult<()> {
        if self.access == BufferAccess::Static {
            engine_bail!(InvalidState => "cityscape::HeadlessGraphicsDevice", "Buffer '{}' is static and cannot be updated", self.label);
        }
        self.check_range(offset, data.len() as u64)?;
        self.mapped.write(offset as usize, data);
        Ok(())
    }

    fn mapped_ptr(&self) -> Option<*mut u8> {
        match self.access {
            BufferAccess::Dynamic => Some(self.mapped.ptr()),
            BufferAccess::Static => None,
        }
    }

    fn is_coherent(&self) -> bool {
        self.device_copy.is_none()
    }

    fn flush_mapped_range(&self, offset: u64, size: u64) -> CityscapeResult<()> {
        self.check_range(offset, size)?;
        if let Some(device_copy) = &self.device_copy {
            device_copy.copy_from(&self.mapped, offset as usize, size as usize);
        }
        self.shared.record(RecordedCommand::FlushMappedRange {
            label: self.label.clone(),
            offset,
            size,
        });
        Ok(())
    }

    fn read(&self, offset: u64, size: u64) -> CityscapeResult<Vec<u8>> {
        self.check_range(offset, size)?;
        Ok(self.visible().read(offset as usize, size as usize))
    }
}

// ============================================================================
// Headless Fence
// ============================================================================

/// Fence on the simulated timeline
pub struct HeadlessFence {
    shared: Arc<Shared>,
    serial: u64,
}

impl HeadlessFence {
    /// Submission serial this fence waits for
    pub fn serial(&self) -> u64 {
        self.serial
    }
}

impl Fence for HeadlessFence {
    fn status(&self) -> FenceStatus {
        if self.shared.completed.load(Ordering::Acquire) >= self.serial {
            return FenceStatus::Signaled;
        }
        self.shared.fence_polls.fetch_add(1, Ordering::Relaxed);
        self.shared.retire_one();
        FenceStatus::Pending
    }
}

// ============================================================================
// Headless Texture / Shader / VertexInput
// ============================================================================

/// Host-memory texture
pub struct HeadlessTexture {
    shared: Arc<Shared>,
    label: String,
    info: TextureInfo,
    pixels: Vec<u8>,
}

impl HeadlessTexture {
    /// Pixel data of the base level
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

impl Texture for HeadlessTexture {
    fn label(&self) -> &str {
        &self.label
    }

    fn info(&self) -> &TextureInfo {
        &self.info
    }
}

impl Drop for HeadlessTexture {
    fn drop(&mut self) {
        self.shared.live_textures.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Shader program stub: remembers its name and uniform blocks
pub struct HeadlessShader {
    name: String,
    uniform_blocks: Vec<String>,
}

impl Shader for HeadlessShader {
    fn name(&self) -> &str {
        &self.name
    }

    fn uniform_block_binding(&self, block: &str) -> Option<u32> {
        self.uniform_blocks.iter().position(|b| b == block).map(|i| i as u32)
    }
}

/// Validated input-assembly state
pub struct HeadlessVertexInput {
    desc: VertexInputDesc,
    limits: InputLimits,
}

impl VertexInput for HeadlessVertexInput {
    fn attribute_count(&self) -> usize {
        self.desc.attributes.len()
    }

    fn stride(&self, binding: u32) -> Option<u32> {
        self.desc.bindings.iter().find(|b| b.binding == binding).map(|b| b.stride)
    }

    fn has_index_buffer(&self) -> bool {
        self.desc.index_buffer.is_some()
    }

    fn index_buffer(&self) -> Option<&Arc<dyn Buffer>> {
        self.desc.index_buffer.as_ref()
    }

    fn limits(&self) -> InputLimits {
        self.limits
    }
}

// ============================================================================
// Headless Graphics Device
// ============================================================================

/// Software graphics device
pub struct HeadlessGraphicsDevice {
    config: HeadlessConfig,
    shared: Arc<Shared>,
    program_bound: bool,
    bound_input: Option<Arc<dyn VertexInput>>,
}

impl HeadlessGraphicsDevice {
    /// Create a device with the default configuration (coherent mapping)
    pub fn new() -> Self {
        Self::with_config(HeadlessConfig::default())
    }

    /// Create a device with an explicit configuration
    pub fn with_config(config: HeadlessConfig) -> Self {
        crate::engine_info!("cityscape::HeadlessGraphicsDevice",
            "Headless device '{}' created (coherent mapping: {}, command log: {})",
            config.label, config.coherent_mapping, config.command_log_capacity);
        Self {
            shared: Arc::new(Shared::new(config.command_log_capacity)),
            config,
            program_bound: false,
            bound_input: None,
        }
    }

    /// Device configuration
    pub fn config(&self) -> &HeadlessConfig {
        &self.config
    }

    /// Snapshot of the command log, oldest first
    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.shared.commands.lock()
            .map(|c| c.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Clear the command log
    pub fn clear_commands(&self) {
        if let Ok(mut commands) = self.shared.commands.lock() {
            commands.clear();
        }
    }

    /// Draw calls currently in the command log
    pub fn draws(&self) -> Vec<DrawCall> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                RecordedCommand::Draw(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    /// Serial of the last submission
    pub fn submitted_serial(&self) -> u64 {
        self.shared.submitted.load(Ordering::Acquire)
    }

    /// Serial of the last completed submission
    pub fn completed_serial(&self) -> u64 {
        self.shared.completed.load(Ordering::Acquire)
    }
}

/// Check that `call` only fetches elements the bound buffers hold
fn validate_draw(input: &dyn VertexInput, call: &DrawCall) -> CityscapeResult<()> {
    let limits = input.limits();
    check_fetch("instance", call.first_instance() as u64 + call.instance_count() as u64, limits.instances)?;

    match *call {
        DrawCall::Arrays { first_vertex, vertex_count, .. } => {
            check_fetch("vertex", first_vertex as u64 + vertex_count as u64, limits.vertices)
        }
        DrawCall::Indexed { index_type, first_index, index_count, base_vertex, .. } => {
            let Some(indices) = input.index_buffer() else {
                engine_bail!(InvalidState => "cityscape::HeadlessGraphicsDevice",
                    "Indexed draw on a vertex input without an index buffer");
            };
            let stride = index_type.size_bytes() as u64;
            let available = indices.size() / stride;
            check_fetch("index", first_index as u64 + index_count as u64, Some(available))?;
            if index_count == 0 {
                return Ok(());
            }

            let bytes = indices.read(first_index as u64 * stride, index_count as u64 * stride)?;
            let values: Vec<i64> = match index_type {
                IndexType::U16 => bytes.chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]) as i64)
                    .collect(),
                IndexType::U32 => bytes.chunks_exact(4)
                    .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as i64)
                    .collect(),
            };
            let smallest = values.iter().min().copied().unwrap_or(0) + base_vertex as i64;
            let largest = values.iter().max().copied().unwrap_or(0) + base_vertex as i64;
            if smallest < 0 {
                engine_bail!(InvalidResource => "cityscape::HeadlessGraphicsDevice",
                    "Base vertex {} moves an index below zero", base_vertex);
            }
            check_fetch("vertex", largest as u64 + 1, limits.vertices)
        }
    }
}

fn check_fetch(kind: &str, end: u64, available: Option<u64>) -> CityscapeResult<()> {
    match available {
        Some(available) if end > available => {
            engine_bail!(InvalidResource => "cityscape::HeadlessGraphicsDevice",
                "Draw fetches {} {} elements, bound buffers hold {}", end, kind, available);
        }
        _ => Ok(()),
    }
}

impl Default for HeadlessGraphicsDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for HeadlessGraphicsDevice {
    fn create_buffer(&mut self, desc: BufferDesc) -> CityscapeResult<Arc<dyn Buffer>> {
        if desc.size == 0 {
            engine_bail!(InvalidResource => "cityscape::HeadlessGraphicsDevice", "Buffer '{}' has zero size", desc.label);
        }
        let size = desc.size as usize;
        let mapped = HostMemory::zeroed(size);

        match (&desc.data, desc.access) {
            (None, BufferAccess::Static) => {
                engine_bail!(InvalidResource => "cityscape::HeadlessGraphicsDevice",
                    "Static buffer '{}' requires initial data", desc.label);
            }
            (Some(data), _) if data.len() > size => {
                engine_bail!(InvalidResource => "cityscape::HeadlessGraphicsDevice",
                    "Initial data ({} bytes) larger than buffer '{}' ({} bytes)",
                    data.len(), desc.label, size);
            }
            (Some(data), _) => mapped.write(0, data),
            (None, BufferAccess::Dynamic) => {}
        }

        let device_copy = if desc.access == BufferAccess::Dynamic && !self.config.coherent_mapping {
            let copy = HostMemory::zeroed(size);
            copy.copy_from(&mapped, 0, size);
            Some(copy)
        } else {
            None
        };

        self.shared.buffers_created.fetch_add(1, Ordering::Relaxed);
        crate::engine_trace!("cityscape::HeadlessGraphicsDevice", "Created buffer '{}' ({} bytes, {:?})",
            desc.label, size, desc.access);

        Ok(Arc::new(HeadlessBuffer {
            shared: self.shared.clone(),
            label: desc.label,
            access: desc.access,
            mapped,
            device_copy,
        }))
    }

    fn create_texture(&mut self, desc: TextureDesc) -> CityscapeResult<Arc<dyn Texture>> {
        if desc.width == 0 || desc.height == 0 {
            engine_bail!(InvalidResource => "cityscape::HeadlessGraphicsDevice", "Texture '{}' has zero extent", desc.label);
        }
        let expected = desc.width as usize * desc.height as usize * desc.format.bytes_per_pixel() as usize;
        let pixels = match desc.data {
            Some(data) if data.len() != expected => {
                engine_bail!(InvalidResource => "cityscape::HeadlessGraphicsDevice",
                    "Texture '{}' data is {} bytes, expected {}", desc.label, data.len(), expected);
            }
            Some(data) => data,
            None => vec![0; expected],
        };
        let mip_levels = if desc.sampler.mipmaps { mip_level_count(desc.width, desc.height) } else { 1 };

        self.shared.textures_created.fetch_add(1, Ordering::Relaxed);
        self.shared.live_textures.fetch_add(1, Ordering::AcqRel);

        Ok(Arc::new(HeadlessTexture {
            shared: self.shared.clone(),
            label: desc.label,
            info: TextureInfo {
                width: desc.width,
                height: desc.height,
                format: desc.format,
                mip_levels,
                sampler: desc.sampler,
            },
            pixels,
        }))
    }

    fn create_shader(&mut self, desc: ShaderDesc) -> CityscapeResult<Arc<dyn Shader>> {
        if desc.vertex_source.is_empty() || desc.fragment_source.is_empty() {
            engine_bail!(InvalidResource => "cityscape::HeadlessGraphicsDevice", "Shader '{}' is missing a stage source", desc.name);
        }
        Ok(Arc::new(HeadlessShader {
            name: desc.name,
            uniform_blocks: desc.uniform_blocks,
        }))
    }

    fn create_vertex_input(&mut self, desc: VertexInputDesc) -> CityscapeResult<Arc<dyn VertexInput>> {
        for attribute in &desc.attributes {
            let binding = desc.bindings.iter().find(|b| b.binding == attribute.binding)
                .ok_or_else(|| CityscapeError::InvalidResource(format!(
                    "Attribute at location {} reads unknown binding {}", attribute.location, attribute.binding)))?;
            if !(1..=4).contains(&attribute.components) {
                engine_bail!(InvalidResource => "cityscape::HeadlessGraphicsDevice",
                    "Attribute at location {} has {} components", attribute.location, attribute.components);
            }
            if attribute.offset + attribute.size_bytes() > binding.stride {
                engine_bail!(InvalidResource => "cityscape::HeadlessGraphicsDevice",
                    "Attribute at location {} ends at byte {}, past stride {}",
                    attribute.location, attribute.offset + attribute.size_bytes(), binding.stride);
            }
        }

        let limits = desc.limits();
        Ok(Arc::new(HeadlessVertexInput { desc, limits }))
    }

    fn insert_fence(&mut self) -> CityscapeResult<Box<dyn Fence>> {
        let serial = self.shared.submitted.load(Ordering::Acquire);
        self.shared.fences_inserted.fetch_add(1, Ordering::Relaxed);
        self.shared.record(RecordedCommand::InsertFence(serial));
        Ok(Box::new(HeadlessFence {
            shared: self.shared.clone(),
            serial,
        }))
    }

    fn bind_program(&mut self, shader: &Arc<dyn Shader>) -> CityscapeResult<()> {
        self.program_bound = true;
        self.shared.record(RecordedCommand::BindProgram(shader.name().to_string()));
        Ok(())
    }

    fn bind_vertex_input(&mut self, input: &Arc<dyn VertexInput>) -> CityscapeResult<()> {
        self.bound_input = Some(input.clone());
        self.shared.record(RecordedCommand::BindVertexInput {
            attributes: input.attribute_count(),
            indexed: input.has_index_buffer(),
        });
        Ok(())
    }

    fn bind_texture(&mut self, unit: u32, texture: &Arc<dyn Texture>) -> CityscapeResult<()> {
        self.shared.record(RecordedCommand::BindTexture {
            unit,
            label: texture.label().to_string(),
        });
        Ok(())
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: &Arc<dyn Buffer>) -> CityscapeResult<()> {
        self.shared.record(RecordedCommand::BindBuffer {
            target,
            label: buffer.label().to_string(),
        });
        Ok(())
    }

    fn bind_buffer_range(
        &mut self,
        target: BufferTarget,
        index: u32,
        buffer: &Arc<dyn Buffer>,
        offset: u64,
        size: u64,
    ) -> CityscapeResult<()> {
        if offset.checked_add(size).map_or(true, |end| end > buffer.size()) {
            engine_bail!(InvalidResource => "cityscape::HeadlessGraphicsDevice",
                "Range [{}, +{}) outside buffer '{}' ({} bytes)",
                offset, size, buffer.label(), buffer.size());
        }
        self.shared.record(RecordedCommand::BindBufferRange {
            target,
            index,
            label: buffer.label().to_string(),
            offset,
            size,
        });
        Ok(())
    }

    fn draw(&mut self, call: DrawCall) -> CityscapeResult<()> {
        let Some(input) = self.bound_input.as_ref().filter(|_| self.program_bound) else {
            engine_bail!(InvalidState => "cityscape::HeadlessGraphicsDevice", "Draw issued without a bound program and vertex input");
        };
        validate_draw(input.as_ref(), &call)?;
        self.shared.submitted.fetch_add(1, Ordering::AcqRel);
        self.shared.draw_calls.fetch_add(1, Ordering::Relaxed);
        self.shared.instances_drawn.fetch_add(call.instance_count() as u64, Ordering::Relaxed);
        self.shared.record(RecordedCommand::Draw(call));
        Ok(())
    }

    fn finish(&mut self) -> CityscapeResult<()> {
        self.shared.retire_all();
        self.shared.record(RecordedCommand::Finish);
        Ok(())
    }

    fn stats(&self) -> DeviceStats {
        DeviceStats {
            draw_calls: self.shared.draw_calls.load(Ordering::Relaxed),
            instances_drawn: self.shared.instances_drawn.load(Ordering::Relaxed),
            buffers_created: self.shared.buffers_created.load(Ordering::Relaxed),
            textures_created: self.shared.textures_created.load(Ordering::Relaxed),
            live_textures: self.shared.live_textures.load(Ordering::Acquire),
            fences_inserted: self.shared.fences_inserted.load(Ordering::Relaxed),
            fence_polls: self.shared.fence_polls.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "headless_graphics_device_tests.rs"]
mod tests;
