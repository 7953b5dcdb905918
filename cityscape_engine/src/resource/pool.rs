/// Shared GPU resource pool.
///
/// Owns the two kinds of GPU state that meshes share with each other:
///
/// - textures, keyed by file path and reference counted: the first mesh that
///   asks for a path loads it, the last one to release it frees it;
/// - one instance ring buffer per vertex format, created when the first mesh
///   of that format draws instanced and torn down when the last one releases.
///
/// The pool is held as `Arc<Mutex<ResourcePool>>` by every mesh created from
/// it. Lock order is pool, then device.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use crate::config::StreamingConfig;
use crate::error::{CityscapeError, CityscapeResult};
use crate::{engine_debug, engine_error, engine_trace, engine_warn};
use crate::buffer::{MappedRingBuffer, RingBufferDesc};
use crate::graphics_device::{
    BufferUsage, GraphicsDevice, SamplerDesc, Texture, TextureDesc, TextureFormat, lock_device,
};
use crate::vertex::{InstanceData, VertexFormat};

new_key_type! {
    /// Stable handle to a pooled texture
    pub struct TextureKey;
}

// ===== TEXTURE SOURCE =====

/// Decoded RGBA8 image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 pixels, row-major
    pub pixels: Vec<u8>,
}

/// Turns a texture path into pixels
pub trait TextureSource: Send {
    fn load(&self, path: &str) -> CityscapeResult<DecodedImage>;
}

/// Decodes image files from disk with the `image` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct FileTextureSource;

impl TextureSource for FileTextureSource {
    fn load(&self, path: &str) -> CityscapeResult<DecodedImage> {
        let image = image::open(Path::new(path))
            .map_err(|e| CityscapeError::LoadFailed(format!("{}: {}", path, e)))?
            .to_rgba8();
        let (width, height) = image.dimensions();
        Ok(DecodedImage {
            width,
            height,
            pixels: image.into_raw(),
        })
    }
}

// ===== ENTRIES =====

struct TextureEntry {
    path: String,
    texture: Arc<dyn Texture>,
    width: u32,
    height: u32,
    refs: u32,
}

struct InstanceBufferEntry {
    ring: Arc<Mutex<MappedRingBuffer>>,
    refs: u32,
}

// ===== RESOURCE POOL =====

/// Registry of shared textures and instance buffers
pub struct ResourcePool {
    device: Arc<Mutex<dyn GraphicsDevice>>,
    config: StreamingConfig,
    source: Box<dyn TextureSource>,
    textures: SlotMap<TextureKey, TextureEntry>,
    texture_paths: FxHashMap<String, TextureKey>,
    instance_buffers: FxHashMap<VertexFormat, InstanceBufferEntry>,
}

impl ResourcePool {
    /// Pool that loads textures from disk
    pub fn new(device: Arc<Mutex<dyn GraphicsDevice>>, config: StreamingConfig) -> Self {
        Self::with_texture_source(device, config, FileTextureSource)
    }

    /// Pool with a custom texture source
    pub fn with_texture_source<S: TextureSource + 'static>(
        device: Arc<Mutex<dyn GraphicsDevice>>,
        config: StreamingConfig,
        source: S,
    ) -> Self {
        Self {
            device,
            config,
            source: Box::new(source),
            textures: SlotMap::with_key(),
            texture_paths: FxHashMap::default(),
            instance_buffers: FxHashMap::default(),
        }
    }

    /// Wrap the pool for sharing between meshes
    pub fn into_shared(self) -> Arc<Mutex<ResourcePool>> {
        Arc::new(Mutex::new(self))
    }

    pub fn device(&self) -> &Arc<Mutex<dyn GraphicsDevice>> {
        &self.device
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    // ===== TEXTURES =====

    /// Reference the texture at `path`, loading it on first use
    ///
    /// A path that fails to decode is logged and registered as a 1x1 zeroed
    /// texture so the caller can keep going. The sampler of the first
    /// acquisition wins for every later user of the path.
    pub fn acquire_texture(&mut self, path: &str, sampler: SamplerDesc) -> CityscapeResult<TextureKey> {
        if let Some(&key) = self.texture_paths.get(path) {
            if let Some(entry) = self.textures.get_mut(key) {
                entry.refs += 1;
                engine_trace!("cityscape::ResourcePool",
                    "Texture '{}' shared ({} references)", path, entry.refs);
                return Ok(key);
            }
        }

        let image = match self.source.load(path) {
            Ok(image) => image,
            Err(e) => {
                engine_error!("cityscape::ResourcePool",
                    "Failed to load texture '{}': {}; using an empty texture", path, e);
                DecodedImage { width: 1, height: 1, pixels: vec![0; 4] }
            }
        };

        let texture = lock_device(&self.device)?.create_texture(TextureDesc {
            label: path.to_string(),
            width: image.width,
            height: image.height,
            format: TextureFormat::R8G8B8A8_UNORM,
            data: Some(image.pixels),
            sampler,
        })?;

        let key = self.textures.insert(TextureEntry {
            path: path.to_string(),
            texture,
            width: image.width,
            height: image.height,
            refs: 1,
        });
        self.texture_paths.insert(path.to_string(), key);
        engine_debug!("cityscape::ResourcePool",
            "Loaded texture '{}' ({}x{})", path, image.width, image.height);
        Ok(key)
    }

    /// Drop one reference; the texture is freed with its last reference
    pub fn release_texture(&mut self, key: TextureKey) {
        let Some(entry) = self.textures.get_mut(key) else {
            engine_warn!("cityscape::ResourcePool", "Release of unknown texture key {:?}", key);
            return;
        };
        entry.refs -= 1;
        if entry.refs == 0 {
            if let Some(entry) = self.textures.remove(key) {
                self.texture_paths.remove(&entry.path);
                engine_debug!("cityscape::ResourcePool", "Freed texture '{}'", entry.path);
            }
        }
    }

    pub fn texture(&self, key: TextureKey) -> Option<Arc<dyn Texture>> {
        self.textures.get(key).map(|e| e.texture.clone())
    }

    /// Pixel dimensions of a pooled texture
    pub fn texture_size(&self, key: TextureKey) -> Option<(u32, u32)> {
        self.textures.get(key).map(|e| (e.width, e.height))
    }

    pub fn texture_key(&self, path: &str) -> Option<TextureKey> {
        self.texture_paths.get(path).copied()
    }

    /// Number of distinct textures alive in the pool
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// References held on the texture at `path` (0 when not loaded)
    pub fn texture_ref_count(&self, path: &str) -> u32 {
        self.texture_key(path)
            .and_then(|key| self.textures.get(key))
            .map_or(0, |e| e.refs)
    }

    // ===== INSTANCE BUFFERS =====

    /// Reference the shared instance buffer of `format`, creating it on first use
    pub fn acquire_instance_buffer(&mut self, format: VertexFormat) -> CityscapeResult<Arc<Mutex<MappedRingBuffer>>> {
        if let Some(entry) = self.instance_buffers.get_mut(&format) {
            entry.refs += 1;
            return Ok(entry.ring.clone());
        }

        let section_size = self.config.instance_capacity as u64 * std::mem::size_of::<InstanceData>() as u64;
        let mut desc = RingBufferDesc::dynamic(
            format!("instances {:?}", format),
            self.config.instance_sections,
            section_size,
            BufferUsage::INSTANCE,
        );
        desc.fence_spin_limit = self.config.fence_spin_limit;
        let ring = Arc::new(Mutex::new(MappedRingBuffer::new(self.device.clone(), desc)?));

        self.instance_buffers.insert(format, InstanceBufferEntry { ring: ring.clone(), refs: 1 });
        engine_debug!("cityscape::ResourcePool",
            "Created instance buffer for {:?} ({} instances x {} sections)",
            format, self.config.instance_capacity, self.config.instance_sections.count());
        Ok(ring)
    }

    /// Drop one reference; the buffer is torn down with its last reference
    pub fn release_instance_buffer(&mut self, format: VertexFormat) {
        let Some(entry) = self.instance_buffers.get_mut(&format) else {
            engine_warn!("cityscape::ResourcePool", "Release of unknown instance buffer {:?}", format);
            return;
        };
        entry.refs -= 1;
        if entry.refs == 0 {
            self.instance_buffers.remove(&format);
            engine_debug!("cityscape::ResourcePool", "Destroyed instance buffer for {:?}", format);
        }
    }

    /// Number of live shared instance buffers
    pub fn instance_buffer_count(&self) -> usize {
        self.instance_buffers.len()
    }

    /// References held on the instance buffer of `format`
    pub fn instance_buffer_ref_count(&self, format: VertexFormat) -> u32 {
        self.instance_buffers.get(&format).map_or(0, |e| e.refs)
    }
}

/// Lock a shared pool, mapping poisoning to a backend error
pub(crate) fn lock_pool(pool: &Arc<Mutex<ResourcePool>>) -> CityscapeResult<MutexGuard<'_, ResourcePool>> {
    pool.lock().map_err(|_| CityscapeError::BackendError("Resource pool mutex poisoned".to_string()))
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
