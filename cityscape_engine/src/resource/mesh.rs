/// Mesh - host geometry that is committed once into device buffers.
///
/// Lifecycle:
///
/// ```text
/// Empty -> Building (add_*) -> Committed (commit) -> draw* / draw_instances* -> reset -> Empty
/// ```
///
/// Host data is mutable only before `commit()`. Textures are shared through
/// the [`ResourcePool`] by path; the shared per-format instance buffer is
/// acquired on the first instanced draw. Both are released on `reset()` and
/// on drop.

use std::sync::{Arc, Mutex};
use crate::error::{CityscapeError, CityscapeResult};
use crate::{engine_bail, engine_error, engine_trace, engine_warn};
use crate::buffer::MappedRingBuffer;
use crate::graphics_device::{
    Buffer, BufferAccess, BufferDesc, BufferUsage, DrawCall, GraphicsDevice, IndexType,
    PrimitiveTopology, SamplerDesc, Shader, Texture, lock_device,
};
use crate::resource::pool::{lock_pool, ResourcePool, TextureKey};
use crate::vertex::{InstanceData, InstanceLayout, Vertex, VertexFormat, VertexLayoutBinding, VertexLayoutBuilder};

/// Number of texture slots per mesh
pub const TEXTURE_SLOT_COUNT: usize = 6;

// ===== TEXTURE SLOT =====

/// Fixed texture slot; each maps to one texture unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Albedo0,
    Albedo1,
    Specular0,
    Specular1,
    Normal0,
    Normal1,
}

impl TextureSlot {
    pub const ALL: [TextureSlot; TEXTURE_SLOT_COUNT] = [
        TextureSlot::Albedo0,
        TextureSlot::Albedo1,
        TextureSlot::Specular0,
        TextureSlot::Specular1,
        TextureSlot::Normal0,
        TextureSlot::Normal1,
    ];

    /// Texture unit the slot is bound to
    pub fn unit(&self) -> u32 {
        *self as u32
    }
}

// ===== MESH STATE =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshState {
    /// No host data
    Empty,
    /// Host data present, not yet on the device
    Building,
    /// Device buffers exist; host data is frozen
    Committed,
}

// ===== INTERNALS =====

struct SlotBinding {
    key: TextureKey,
    texture: Arc<dyn Texture>,
}

struct DeviceGeometry {
    vertex_buffer: Arc<dyn Buffer>,
    index_buffer: Option<Arc<dyn Buffer>>,
    layout: VertexLayoutBinding,
}

struct Instancing {
    ring: Arc<Mutex<MappedRingBuffer>>,
    layout: VertexLayoutBinding,
    capacity: u32,
}

// ===== MESH =====

/// Geometry resource with a canonical vertex format
pub struct Mesh<V: Vertex> {
    pool: Arc<Mutex<ResourcePool>>,
    device: Arc<Mutex<dyn GraphicsDevice>>,
    indexed: bool,
    vertices: Vec<V>,
    indices: Vec<u32>,
    slots: [Option<SlotBinding>; TEXTURE_SLOT_COUNT],
    geometry: Option<DeviceGeometry>,
    instancing: Option<Instancing>,
}

impl<V: Vertex> Mesh<V> {
    /// Empty mesh
    pub fn new(pool: &Arc<Mutex<ResourcePool>>, indexed: bool) -> CityscapeResult<Self> {
        let device = lock_pool(pool)?.device().clone();
        Ok(Self {
            pool: pool.clone(),
            device,
            indexed,
            vertices: Vec::new(),
            indices: Vec::new(),
            slots: Default::default(),
            geometry: None,
            instancing: None,
        })
    }

    /// Mesh from existing data; indexed when `indices` is not empty
    pub fn with_data(pool: &Arc<Mutex<ResourcePool>>, vertices: Vec<V>, indices: Vec<u32>) -> CityscapeResult<Self> {
        let mut mesh = Self::new(pool, !indices.is_empty())?;
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            engine_bail!(InvalidResource => "cityscape::Mesh", "Index {} out of range for {} vertices", bad, vertices.len());
        }
        mesh.vertices = vertices;
        mesh.indices = indices;
        Ok(mesh)
    }

    // ===== BUILDING =====

    /// Append one triangle
    pub fn add_triangle(&mut self, a: V, b: V, c: V) -> CityscapeResult<()> {
        self.ensure_mutable("add_triangle")?;
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&[a, b, c]);
        if self.indexed {
            self.indices.extend_from_slice(&[base, base + 1, base + 2]);
        }
        Ok(())
    }

    /// Append a quad as two counter-clockwise triangles
    ///
    /// Non-indexed meshes receive `tl, bl, br, tl, br, tr`. Indexed meshes
    /// receive the vertices `tl, tr, bl, br` and the indices
    /// `0, 2, 3, 0, 3, 1` offset by the current vertex count.
    pub fn add_quad(&mut self, tl: V, tr: V, bl: V, br: V) -> CityscapeResult<()> {
        self.ensure_mutable("add_quad")?;
        if self.indexed {
            let base = self.vertices.len() as u32;
            self.vertices.extend_from_slice(&[tl, tr, bl, br]);
            self.indices.extend([0, 2, 3, 0, 3, 1].map(|i| base + i));
        } else {
            self.vertices.extend_from_slice(&[tl, bl, br, tl, br, tr]);
        }
        Ok(())
    }

    /// Append a surface
    ///
    /// Indices refer to `vertices`. Indexed meshes offset them by the current
    /// vertex count (an empty index list means sequential). Non-indexed meshes
    /// expand them into a flat vertex list.
    pub fn add_surface(&mut self, vertices: &[V], indices: &[u32]) -> CityscapeResult<()> {
        self.ensure_mutable("add_surface")?;
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            engine_bail!(InvalidResource => "cityscape::Mesh", "Index {} out of range for {} surface vertices", bad, vertices.len());
        }

        let base = self.vertices.len() as u32;
        match (self.indexed, indices.is_empty()) {
            (true, false) => {
                self.vertices.extend_from_slice(vertices);
                self.indices.extend(indices.iter().map(|i| base + i));
            }
            (true, true) => {
                self.vertices.extend_from_slice(vertices);
                self.indices.extend(base..base + vertices.len() as u32);
            }
            (false, false) => self.vertices.extend(indices.iter().map(|&i| vertices[i as usize])),
            (false, true) => self.vertices.extend_from_slice(vertices),
        }
        Ok(())
    }

    /// Attach the texture at `path` to `slot`
    ///
    /// The texture is shared with every other mesh of the pool using the same
    /// path. An occupied slot is left untouched.
    pub fn add_texture(&mut self, slot: TextureSlot, path: &str, sampler: SamplerDesc) -> CityscapeResult<()> {
        self.ensure_mutable("add_texture")?;
        if let Some(existing) = &self.slots[slot as usize] {
            engine_warn!("cityscape::Mesh",
                "Texture slot {:?} already holds '{}'; ignoring '{}'", slot, existing.texture.label(), path);
            return Ok(());
        }

        let mut pool = lock_pool(&self.pool)?;
        let key = pool.acquire_texture(path, sampler)?;
        let texture = pool.texture(key)
            .ok_or_else(|| CityscapeError::InvalidResource(format!("Texture '{}' vanished from the pool", path)))?;
        self.slots[slot as usize] = Some(SlotBinding { key, texture });
        Ok(())
    }

    // ===== COMMIT =====

    /// Upload host data into immutable device buffers
    ///
    /// # Panics
    ///
    /// Panics when `V` reports `VertexFormat::Custom`: only canonical formats
    /// can be committed.
    pub fn commit(&mut self) -> CityscapeResult<()> {
        if self.geometry.is_some() {
            engine_error!("cityscape::Mesh", "commit() called on a committed mesh");
            return Err(CityscapeError::InvalidState("mesh already committed".to_string()));
        }
        if V::FORMAT.is_custom() {
            engine_error!("cityscape::Mesh", "Cannot commit mesh with unsupported format {:?}", V::FORMAT);
            panic!("unsupported vertex format {:?} at commit", V::FORMAT);
        }
        if self.vertices.is_empty() {
            engine_bail!(InvalidState => "cityscape::Mesh", "Cannot commit a mesh without vertices");
        }
        if self.indexed && self.indices.is_empty() {
            engine_bail!(InvalidState => "cityscape::Mesh", "Cannot commit an indexed mesh without indices");
        }

        let (vertex_buffer, index_buffer) = {
            let mut device = lock_device(&self.device)?;
            let vertex_bytes: &[u8] = bytemuck::cast_slice(&self.vertices);
            let vertex_buffer = device.create_buffer(BufferDesc {
                label: format!("mesh vertices {:?}", V::FORMAT),
                size: vertex_bytes.len() as u64,
                usage: BufferUsage::VERTEX,
                access: BufferAccess::Static,
                data: Some(vertex_bytes.to_vec()),
            })?;
            let index_buffer = if self.indexed {
                let index_bytes: &[u8] = bytemuck::cast_slice(&self.indices);
                Some(device.create_buffer(BufferDesc {
                    label: "mesh indices".to_string(),
                    size: index_bytes.len() as u64,
                    usage: BufferUsage::INDEX,
                    access: BufferAccess::Static,
                    data: Some(index_bytes.to_vec()),
                })?)
            } else {
                None
            };
            (vertex_buffer, index_buffer)
        };

        let layout = VertexLayoutBinding::new(&self.device, V::FORMAT, vertex_buffer.clone(), index_buffer.clone())?;
        engine_trace!("cityscape::Mesh", "Committed {} vertices, {} indices ({:?})",
            self.vertices.len(), self.indices.len(), V::FORMAT);
        self.geometry = Some(DeviceGeometry { vertex_buffer, index_buffer, layout });
        Ok(())
    }

    // ===== DRAWING =====

    /// One non-instanced draw
    pub fn draw(&self, shader: &Arc<dyn Shader>) -> CityscapeResult<()> {
        let geometry = self.committed("draw")?;
        self.bind_and_draw(shader, &geometry.layout, 0, 1)
    }

    /// Draw one copy per entry of `instances`
    ///
    /// The instance data goes through the pool's shared instance buffer for
    /// this vertex format. More instances than one section holds are rejected.
    pub fn draw_instances(&mut self, shader: &Arc<dyn Shader>, instances: &[InstanceData]) -> CityscapeResult<()> {
        self.committed("draw_instances")?;
        if instances.is_empty() {
            return Ok(());
        }
        self.ensure_instancing()?;
        let Some(instancing) = &self.instancing else {
            return Err(CityscapeError::InvalidState("instancing unavailable".to_string()));
        };

        let count = instances.len() as u64;
        if count > instancing.capacity as u64 {
            engine_warn!("cityscape::Mesh",
                "{} instances exceed the shared instance buffer capacity of {}", count, instancing.capacity);
            return Err(CityscapeError::CapacityExceeded { requested: count, available: instancing.capacity as u64 });
        }

        let mut ring = instancing.ring.lock()
            .map_err(|_| CityscapeError::BackendError("Instance buffer mutex poisoned".to_string()))?;
        ring.sync();
        ring.write_slice(instances)?;
        ring.flush(true)?;
        let first_instance = ring.current_section() as u32 * instancing.capacity;

        self.bind_and_draw(shader, &instancing.layout, first_instance, count as u32)?;

        ring.lock()?;
        ring.swap_sections();
        Ok(())
    }

    fn bind_and_draw(
        &self,
        shader: &Arc<dyn Shader>,
        layout: &VertexLayoutBinding,
        first_instance: u32,
        instance_count: u32,
    ) -> CityscapeResult<()> {
        lock_device(&self.device)?.bind_program(shader)?;
        layout.bind()?;

        let mut device = lock_device(&self.device)?;
        for (slot, binding) in TextureSlot::ALL.iter().zip(&self.slots) {
            if let Some(binding) = binding {
                device.bind_texture(slot.unit(), &binding.texture)?;
            }
        }

        let call = if self.indexed {
            DrawCall::Indexed {
                topology: PrimitiveTopology::TriangleList,
                index_type: IndexType::U32,
                first_index: 0,
                index_count: self.indices.len() as u32,
                base_vertex: 0,
                first_instance,
                instance_count,
            }
        } else {
            DrawCall::Arrays {
                topology: PrimitiveTopology::TriangleList,
                first_vertex: 0,
                vertex_count: self.vertices.len() as u32,
                first_instance,
                instance_count,
            }
        };
        device.draw(call)
    }

    fn ensure_instancing(&mut self) -> CityscapeResult<()> {
        if self.instancing.is_some() {
            return Ok(());
        }
        let Some(geometry) = &self.geometry else {
            return Err(CityscapeError::InvalidState("mesh not committed".to_string()));
        };

        let (ring, capacity) = {
            let mut pool = lock_pool(&self.pool)?;
            (pool.acquire_instance_buffer(V::FORMAT)?, pool.config().instance_capacity)
        };
        let instance_buffer = match ring.lock() {
            Ok(ring) => ring.buffer().clone(),
            Err(_) => {
                self.release_instance_buffer();
                return Err(CityscapeError::BackendError("Instance buffer mutex poisoned".to_string()));
            }
        };

        let layout = VertexLayoutBuilder::from_format(V::FORMAT)
            .and_then(|builder| builder
                .with_instances(InstanceLayout::instance_data(), instance_buffer)
                .build(&self.device, geometry.vertex_buffer.clone(), geometry.index_buffer.clone()));
        match layout {
            Ok(layout) => {
                self.instancing = Some(Instancing { ring, layout, capacity });
                Ok(())
            }
            Err(e) => {
                self.release_instance_buffer();
                Err(e)
            }
        }
    }

    // ===== RESET =====

    /// Return to Empty: clear host data, release textures and device buffers
    pub fn reset(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.release_shared();
        self.geometry = None;
    }

    fn release_shared(&mut self) {
        let keys: Vec<TextureKey> = self.slots.iter_mut()
            .filter_map(|slot| slot.take().map(|binding| binding.key))
            .collect();
        let had_instancing = self.instancing.take().is_some();
        if keys.is_empty() && !had_instancing {
            return;
        }

        match self.pool.lock() {
            Ok(mut pool) => {
                for key in keys {
                    pool.release_texture(key);
                }
                if had_instancing {
                    pool.release_instance_buffer(V::FORMAT);
                }
            }
            Err(_) => engine_error!("cityscape::Mesh", "Resource pool poisoned; shared resources leaked"),
        }
    }

    fn release_instance_buffer(&self) {
        if let Ok(mut pool) = self.pool.lock() {
            pool.release_instance_buffer(V::FORMAT);
        }
    }

    // ===== ACCESSORS =====

    pub fn state(&self) -> MeshState {
        if self.geometry.is_some() {
            MeshState::Committed
        } else if self.vertices.is_empty() {
            MeshState::Empty
        } else {
            MeshState::Building
        }
    }

    pub fn is_committed(&self) -> bool {
        self.geometry.is_some()
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    pub fn format(&self) -> VertexFormat {
        V::FORMAT
    }

    pub fn vertices(&self) -> &[V] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Texture attached to `slot`
    pub fn texture(&self, slot: TextureSlot) -> Option<&Arc<dyn Texture>> {
        self.slots[slot as usize].as_ref().map(|b| &b.texture)
    }

    /// Pool key of the texture attached to `slot`
    pub fn texture_key(&self, slot: TextureSlot) -> Option<TextureKey> {
        self.slots[slot as usize].as_ref().map(|b| b.key)
    }

    /// Layout binding of the committed geometry
    pub fn layout(&self) -> Option<&VertexLayoutBinding> {
        self.geometry.as_ref().map(|g| &g.layout)
    }

    pub fn pool(&self) -> &Arc<Mutex<ResourcePool>> {
        &self.pool
    }

    fn ensure_mutable(&self, operation: &str) -> CityscapeResult<()> {
        if self.geometry.is_some() {
            engine_error!("cityscape::Mesh", "{}() called on a committed mesh", operation);
            return Err(CityscapeError::InvalidState(format!("{} after commit", operation)));
        }
        Ok(())
    }

    fn committed(&self, operation: &str) -> CityscapeResult<&DeviceGeometry> {
        self.geometry.as_ref().ok_or_else(|| {
            engine_error!("cityscape::Mesh", "{}() called before commit", operation);
            CityscapeError::InvalidState(format!("{} before commit", operation))
        })
    }
}

impl<V: Vertex> Drop for Mesh<V> {
    fn drop(&mut self) {
        self.release_shared();
    }
}

#[cfg(test)]
#[path = "mesh_tests.rs"]
mod tests;
