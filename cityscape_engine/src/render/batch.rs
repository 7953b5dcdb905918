/// RenderBatch - per-frame accumulation of same-format geometry.
///
/// Geometry from many small meshes is staged on the host, then written into
/// the active section of a multi-section ring buffer and drawn with a single
/// call. The next frame stages into the following section while the GPU
/// still reads this one.
///
/// Overflow policy: `add_mesh` / `add_vertices` reject geometry that does not
/// fit and leave the staging untouched. `submit` flushes and retries once.

use std::sync::{Arc, Mutex};
use crate::config::StreamingConfig;
use crate::error::{CityscapeError, CityscapeResult};
use crate::{engine_bail, engine_trace, engine_warn};
use crate::buffer::{MappedRingBuffer, RingBufferDesc};
use crate::graphics_device::{
    BufferUsage, DrawCall, GraphicsDevice, IndexType, PrimitiveTopology, Shader, lock_device,
};
use crate::resource::Mesh;
use crate::vertex::{Vertex, VertexLayoutBinding};

/// Counters accumulated by flushes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Draw calls issued
    pub draw_calls: u64,
    pub vertices: u64,
    pub indices: u64,
}

/// Batch renderer for one vertex type
pub struct RenderBatch<V: Vertex> {
    device: Arc<Mutex<dyn GraphicsDevice>>,
    max_vertices: u32,
    max_indices: u32,
    vertex_ring: MappedRingBuffer,
    index_ring: Option<MappedRingBuffer>,
    layout: VertexLayoutBinding,
    staged_vertices: Vec<V>,
    staged_indices: Vec<u32>,
    stats: BatchStats,
}

impl<V: Vertex> RenderBatch<V> {
    /// Create a batch holding up to `max_vertices` vertices per flush
    ///
    /// `max_indices == 0` selects non-indexed drawing.
    pub fn new(
        device: Arc<Mutex<dyn GraphicsDevice>>,
        config: &StreamingConfig,
        max_vertices: u32,
        max_indices: u32,
    ) -> CityscapeResult<Self> {
        if max_vertices == 0 {
            engine_bail!(InvalidResource => "cityscape::RenderBatch", "Batch needs room for at least one vertex");
        }

        let mut vertex_desc = RingBufferDesc::dynamic(
            format!("batch vertices {:?}", V::FORMAT),
            config.batch_sections,
            max_vertices as u64 * V::FORMAT.stride() as u64,
            BufferUsage::VERTEX,
        );
        vertex_desc.fence_spin_limit = config.fence_spin_limit;
        let vertex_ring = MappedRingBuffer::new(device.clone(), vertex_desc)?;

        let index_ring = if max_indices > 0 {
            let mut index_desc = RingBufferDesc::dynamic(
                "batch indices",
                config.batch_sections,
                max_indices as u64 * IndexType::U32.size_bytes() as u64,
                BufferUsage::INDEX,
            );
            index_desc.fence_spin_limit = config.fence_spin_limit;
            Some(MappedRingBuffer::new(device.clone(), index_desc)?)
        } else {
            None
        };

        let layout = VertexLayoutBinding::new(
            &device,
            V::FORMAT,
            vertex_ring.buffer().clone(),
            index_ring.as_ref().map(|ring| ring.buffer().clone()),
        )?;

        engine_trace!("cityscape::RenderBatch", "Created batch {:?}: {} vertices, {} indices, {} sections",
            V::FORMAT, max_vertices, max_indices, config.batch_sections.count());

        Ok(Self {
            device,
            max_vertices,
            max_indices,
            vertex_ring,
            index_ring,
            layout,
            staged_vertices: Vec::with_capacity(max_vertices as usize),
            staged_indices: Vec::with_capacity(max_indices as usize),
            stats: BatchStats::default(),
        })
    }

    // ===== STAGING =====

    /// Stage the host geometry of `mesh`
    pub fn add_mesh(&mut self, mesh: &Mesh<V>) -> CityscapeResult<()> {
        self.add_vertices(mesh.vertices(), mesh.indices())
    }

    /// Stage raw geometry
    ///
    /// Indices refer to `vertices` (empty means sequential). An indexed batch
    /// offsets them by the staged vertex count; a non-indexed batch expands
    /// them.
    pub fn add_vertices(&mut self, vertices: &[V], indices: &[u32]) -> CityscapeResult<()> {
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            engine_bail!(InvalidResource => "cityscape::RenderBatch", "Index {} out of range for {} vertices", bad, vertices.len());
        }

        let (needed_vertices, needed_indices) = Self::footprint(self.is_indexed(), vertices, indices);
        let free_vertices = self.max_vertices as u64 - self.staged_vertices.len() as u64;
        let free_indices = self.max_indices as u64 - self.staged_indices.len() as u64;
        if needed_vertices > free_vertices || needed_indices > free_indices {
            engine_warn!("cityscape::RenderBatch",
                "Geometry rejected: {} vertices / {} indices requested, {} / {} free",
                needed_vertices, needed_indices, free_vertices, free_indices);
            let (requested, available) = if needed_vertices > free_vertices {
                (needed_vertices, free_vertices)
            } else {
                (needed_indices, free_indices)
            };
            return Err(CityscapeError::CapacityExceeded { requested, available });
        }

        let base = self.staged_vertices.len() as u32;
        match (self.is_indexed(), indices.is_empty()) {
            (true, false) => {
                self.staged_vertices.extend_from_slice(vertices);
                self.staged_indices.extend(indices.iter().map(|i| base + i));
            }
            (true, true) => {
                self.staged_vertices.extend_from_slice(vertices);
                self.staged_indices.extend(base..base + vertices.len() as u32);
            }
            (false, false) => self.staged_vertices.extend(indices.iter().map(|&i| vertices[i as usize])),
            (false, true) => self.staged_vertices.extend_from_slice(vertices),
        }
        Ok(())
    }

    /// Stage `mesh`, flushing first when it does not fit
    ///
    /// A mesh larger than an empty batch is rejected before anything is
    /// flushed; the staged geometry stays in place.
    pub fn submit(&mut self, mesh: &Mesh<V>, shader: &Arc<dyn Shader>) -> CityscapeResult<()> {
        let (needed_vertices, needed_indices) = Self::footprint(self.is_indexed(), mesh.vertices(), mesh.indices());
        if needed_vertices > self.max_vertices as u64 || needed_indices > self.max_indices as u64 {
            engine_warn!("cityscape::RenderBatch",
                "Mesh rejected: {} vertices / {} indices exceed batch capacity {} / {}",
                needed_vertices, needed_indices, self.max_vertices, self.max_indices);
            let (requested, available) = if needed_vertices > self.max_vertices as u64 {
                (needed_vertices, self.max_vertices as u64)
            } else {
                (needed_indices, self.max_indices as u64)
            };
            return Err(CityscapeError::CapacityExceeded { requested, available });
        }

        let fits = self.staged_vertices.len() as u64 + needed_vertices <= self.max_vertices as u64
            && self.staged_indices.len() as u64 + needed_indices <= self.max_indices as u64;
        if !fits && !self.is_empty() {
            self.flush(shader)?;
        }
        self.add_mesh(mesh)
    }

    fn footprint(indexed: bool, vertices: &[V], indices: &[u32]) -> (u64, u64) {
        let expanded = (if indices.is_empty() { vertices.len() } else { indices.len() }) as u64;
        if indexed {
            (vertices.len() as u64, expanded)
        } else {
            (expanded, 0)
        }
    }

    // ===== FLUSH =====

    /// Draw everything staged with one call, then advance the ring
    pub fn flush(&mut self, shader: &Arc<dyn Shader>) -> CityscapeResult<()> {
        if self.is_empty() {
            return Ok(());
        }

        // ========== UPLOAD ==========
        self.vertex_ring.sync();
        self.vertex_ring.write_slice(&self.staged_vertices)?;
        self.vertex_ring.flush(true)?;
        if let Some(index_ring) = &mut self.index_ring {
            index_ring.sync();
            index_ring.write_slice(&self.staged_indices)?;
            index_ring.flush(true)?;
        }

        // ========== DRAW ==========
        let section = self.vertex_ring.current_section() as u32;
        let call = if self.index_ring.is_some() {
            DrawCall::Indexed {
                topology: PrimitiveTopology::TriangleList,
                index_type: IndexType::U32,
                first_index: section * self.max_indices,
                index_count: self.staged_indices.len() as u32,
                base_vertex: (section * self.max_vertices) as i32,
                first_instance: 0,
                instance_count: 1,
            }
        } else {
            DrawCall::Arrays {
                topology: PrimitiveTopology::TriangleList,
                first_vertex: section * self.max_vertices,
                vertex_count: self.staged_vertices.len() as u32,
                first_instance: 0,
                instance_count: 1,
            }
        };

        lock_device(&self.device)?.bind_program(shader)?;
        self.layout.bind()?;
        lock_device(&self.device)?.draw(call)?;

        // ========== ADVANCE ==========
        self.vertex_ring.lock()?;
        self.vertex_ring.swap_sections();
        if let Some(index_ring) = &mut self.index_ring {
            index_ring.lock()?;
            index_ring.swap_sections();
        }

        self.stats.draw_calls += 1;
        self.stats.vertices += self.staged_vertices.len() as u64;
        self.stats.indices += self.staged_indices.len() as u64;
        self.staged_vertices.clear();
        self.staged_indices.clear();
        Ok(())
    }

    // ===== ACCESSORS =====

    pub fn is_indexed(&self) -> bool {
        self.index_ring.is_some()
    }

    /// Nothing staged
    pub fn is_empty(&self) -> bool {
        self.staged_vertices.is_empty()
    }

    pub fn staged_vertex_count(&self) -> usize {
        self.staged_vertices.len()
    }

    pub fn staged_index_count(&self) -> usize {
        self.staged_indices.len()
    }

    pub fn max_vertices(&self) -> u32 {
        self.max_vertices
    }

    pub fn max_indices(&self) -> u32 {
        self.max_indices
    }

    /// Section the next flush writes into
    pub fn current_section(&self) -> usize {
        self.vertex_ring.current_section()
    }

    pub fn vertex_ring(&self) -> &MappedRingBuffer {
        &self.vertex_ring
    }

    pub fn index_ring(&self) -> Option<&MappedRingBuffer> {
        self.index_ring.as_ref()
    }

    /// Counters since creation or the last `reset_frame_stats`
    pub fn frame_stats(&self) -> BatchStats {
        self.stats
    }

    pub fn reset_frame_stats(&mut self) {
        self.stats = BatchStats::default();
    }
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
