//! Unit tests for RenderBatch

use super::*;
use glam::Vec3;
use crate::buffer::SectionCount;
use crate::graphics_device::{Buffer, HeadlessGraphicsDevice, ShaderDesc};
use crate::resource::ResourcePool;
use crate::vertex::VertexPosition;

// ============================================================================
// TEST HELPERS
// ============================================================================

struct Fixture {
    headless: Arc<Mutex<HeadlessGraphicsDevice>>,
    device: Arc<Mutex<dyn GraphicsDevice>>,
    pool: Arc<Mutex<ResourcePool>>,
    shader: Arc<dyn Shader>,
}

fn fixture() -> Fixture {
    let headless = Arc::new(Mutex::new(HeadlessGraphicsDevice::new()));
    let device: Arc<Mutex<dyn GraphicsDevice>> = headless.clone();
    let pool = ResourcePool::new(device.clone(), StreamingConfig::default()).into_shared();
    let shader = headless.lock().unwrap().create_shader(ShaderDesc {
        name: "batch".to_string(),
        vertex_source: "v".to_string(),
        fragment_source: "f".to_string(),
        uniform_blocks: Vec::new(),
    }).unwrap();
    Fixture { headless, device, pool, shader }
}

fn batch(f: &Fixture, max_vertices: u32, max_indices: u32) -> RenderBatch<VertexPosition> {
    RenderBatch::new(f.device.clone(), &StreamingConfig::default(), max_vertices, max_indices).unwrap()
}

fn p(x: f32, y: f32) -> VertexPosition {
    VertexPosition::new(Vec3::new(x, y, 0.0))
}

/// Indexed quad: 4 vertices, 6 indices
fn quad(f: &Fixture, x: f32) -> Mesh<VertexPosition> {
    let mut mesh = Mesh::new(&f.pool, true).unwrap();
    mesh.add_quad(p(x, 1.0), p(x + 1.0, 1.0), p(x, 0.0), p(x + 1.0, 0.0)).unwrap();
    mesh
}

fn draws(f: &Fixture) -> Vec<DrawCall> {
    f.headless.lock().unwrap().draws()
}

// ============================================================================
// CREATION
// ============================================================================

#[test]
fn test_new_selects_indexed_mode() {
    let f = fixture();

    let indexed = batch(&f, 16, 24);
    let flat = batch(&f, 16, 0);

    assert!(indexed.is_indexed());
    assert!(indexed.index_ring().is_some());
    assert!(!flat.is_indexed());
    assert!(flat.index_ring().is_none());
    assert_eq!(indexed.vertex_ring().section_size(), 16 * 12);
    assert_eq!(indexed.vertex_ring().section_count(), SectionCount::Double);
    assert!(indexed.is_empty());
}

#[test]
fn test_new_rejects_zero_vertices() {
    let f = fixture();
    let result = RenderBatch::<VertexPosition>::new(f.device.clone(), &StreamingConfig::default(), 0, 6);
    assert!(matches!(result, Err(CityscapeError::InvalidResource(_))));
}

// ============================================================================
// STAGING
// ============================================================================

#[test]
fn test_add_mesh_offsets_indices() {
    let f = fixture();
    let mut batch = batch(&f, 16, 24);

    batch.add_mesh(&quad(&f, 0.0)).unwrap();
    batch.add_mesh(&quad(&f, 2.0)).unwrap();

    assert_eq!(batch.staged_vertex_count(), 8);
    assert_eq!(batch.staged_index_count(), 12);
    assert_eq!(&batch.staged_indices[6..], &[4, 6, 7, 4, 7, 5]);
}

#[test]
fn test_sequential_geometry_gets_generated_indices() {
    let f = fixture();
    let mut batch = batch(&f, 16, 24);
    batch.add_mesh(&quad(&f, 0.0)).unwrap();

    batch.add_vertices(&[p(0.0, 0.0), p(1.0, 0.0), p(0.0, 1.0)], &[]).unwrap();

    assert_eq!(&batch.staged_indices[6..], &[4, 5, 6]);
}

#[test]
fn test_non_indexed_batch_expands_indices() {
    let f = fixture();
    let mut batch = batch(&f, 16, 0);
    let mesh = quad(&f, 0.0);

    batch.add_mesh(&mesh).unwrap();

    assert_eq!(batch.staged_vertex_count(), 6);
    assert_eq!(batch.staged_index_count(), 0);
    assert_eq!(batch.staged_vertices[1], mesh.vertices()[2]);
}

#[test]
fn test_overflow_is_rejected_and_staging_untouched() {
    let f = fixture();
    let mut batch = batch(&f, 6, 12);
    batch.add_mesh(&quad(&f, 0.0)).unwrap();

    let result = batch.add_mesh(&quad(&f, 2.0));

    assert!(matches!(result, Err(CityscapeError::CapacityExceeded { requested: 4, available: 2 })));
    assert_eq!(batch.staged_vertex_count(), 4);
    assert_eq!(batch.staged_index_count(), 6);
}

#[test]
fn test_index_overflow_is_reported() {
    let f = fixture();
    let mut batch = batch(&f, 16, 8);
    batch.add_mesh(&quad(&f, 0.0)).unwrap();

    let result = batch.add_mesh(&quad(&f, 2.0));

    assert!(matches!(result, Err(CityscapeError::CapacityExceeded { requested: 6, available: 2 })));
}

#[test]
fn test_out_of_range_index_is_rejected() {
    let f = fixture();
    let mut batch = batch(&f, 16, 24);

    assert!(matches!(
        batch.add_vertices(&[p(0.0, 0.0)], &[0, 1, 0]),
        Err(CityscapeError::InvalidResource(_))
    ));
    assert!(batch.is_empty());
}

// ============================================================================
// FLUSH
// ============================================================================

#[test]
fn test_flush_of_empty_batch_is_noop() {
    let f = fixture();
    let mut batch = batch(&f, 16, 24);

    batch.flush(&f.shader).unwrap();

    assert!(draws(&f).is_empty());
    assert_eq!(batch.current_section(), 0);
    assert_eq!(batch.frame_stats(), BatchStats::default());
}

#[test]
fn test_flush_uploads_into_current_section() {
    let f = fixture();
    let mut batch = batch(&f, 16, 24);
    let mesh = quad(&f, 0.0);
    batch.add_mesh(&mesh).unwrap();

    batch.flush(&f.shader).unwrap();

    let bytes = batch.vertex_ring().buffer().read(0, 4 * 12).unwrap();
    assert_eq!(bytes, bytemuck::cast_slice::<VertexPosition, u8>(mesh.vertices()));
    let index_bytes = batch.index_ring().unwrap().buffer().read(0, 6 * 4).unwrap();
    assert_eq!(index_bytes, bytemuck::cast_slice::<u32, u8>(mesh.indices()));
    assert!(batch.is_empty());
    assert_eq!(batch.current_section(), 1);
}

#[test]
fn test_flush_offsets_draw_by_section() {
    let f = fixture();
    let mut batch = batch(&f, 16, 24);

    for _ in 0..3 {
        batch.add_mesh(&quad(&f, 0.0)).unwrap();
        batch.flush(&f.shader).unwrap();
    }

    let draws = draws(&f);
    assert_eq!(draws.len(), 3);
    let offsets: Vec<(u32, i32)> = draws.iter().map(|d| match *d {
        DrawCall::Indexed { first_index, base_vertex, index_count, .. } => {
            assert_eq!(index_count, 6);
            (first_index, base_vertex)
        }
        DrawCall::Arrays { .. } => panic!("expected indexed draw"),
    }).collect();
    assert_eq!(offsets, vec![(0, 0), (24, 16), (0, 0)]);
}

#[test]
fn test_non_indexed_flush_draws_arrays() {
    let f = fixture();
    let mut batch = batch(&f, 16, 0);

    batch.add_mesh(&quad(&f, 0.0)).unwrap();
    batch.flush(&f.shader).unwrap();
    batch.add_mesh(&quad(&f, 0.0)).unwrap();
    batch.flush(&f.shader).unwrap();

    let draws = draws(&f);
    assert!(matches!(draws[0], DrawCall::Arrays { first_vertex: 0, vertex_count: 6, .. }));
    assert!(matches!(draws[1], DrawCall::Arrays { first_vertex: 16, vertex_count: 6, .. }));
}

#[test]
fn test_flush_fences_the_drawn_section() {
    let f = fixture();
    let mut batch = batch(&f, 16, 24);
    batch.add_mesh(&quad(&f, 0.0)).unwrap();

    batch.flush(&f.shader).unwrap();

    assert!(batch.vertex_ring().is_fenced(0));
    assert!(batch.index_ring().unwrap().is_fenced(0));
}

// ============================================================================
// SUBMIT
// ============================================================================

#[test]
fn test_submit_flushes_when_full() {
    let f = fixture();
    let mut batch = batch(&f, 8, 12);

    batch.submit(&quad(&f, 0.0), &f.shader).unwrap();
    batch.submit(&quad(&f, 1.0), &f.shader).unwrap();
    assert!(draws(&f).is_empty());

    batch.submit(&quad(&f, 2.0), &f.shader).unwrap();

    assert_eq!(draws(&f).len(), 1);
    assert_eq!(batch.staged_vertex_count(), 4);
    assert_eq!(batch.staged_indices, vec![0, 2, 3, 0, 3, 1]);
}

#[test]
fn test_submit_rejects_mesh_larger_than_batch() {
    let f = fixture();
    let mut batch = batch(&f, 3, 12);

    let result = batch.submit(&quad(&f, 0.0), &f.shader);

    assert!(matches!(result, Err(CityscapeError::CapacityExceeded { .. })));
    assert!(draws(&f).is_empty());
    assert!(batch.is_empty());
}

#[test]
fn test_oversized_submit_keeps_staged_geometry() {
    let f = fixture();
    let mut batch = batch(&f, 6, 12);
    batch.submit(&quad(&f, 0.0), &f.shader).unwrap();
    let mut tower = quad(&f, 1.0);
    tower.add_quad(p(1.0, 2.0), p(2.0, 2.0), p(1.0, 1.0), p(2.0, 1.0)).unwrap();

    let result = batch.submit(&tower, &f.shader);

    assert!(matches!(result, Err(CityscapeError::CapacityExceeded { requested: 8, available: 6 })));
    assert!(draws(&f).is_empty());
    assert_eq!(batch.staged_vertex_count(), 4);
    assert_eq!(batch.staged_index_count(), 6);
    assert_eq!(batch.current_section(), 0);
}

// ============================================================================
// STATS
// ============================================================================

#[test]
fn test_frame_stats_accumulate_and_reset() {
    let f = fixture();
    let mut batch = batch(&f, 16, 24);

    batch.add_mesh(&quad(&f, 0.0)).unwrap();
    batch.add_mesh(&quad(&f, 1.0)).unwrap();
    batch.flush(&f.shader).unwrap();
    batch.add_mesh(&quad(&f, 2.0)).unwrap();
    batch.flush(&f.shader).unwrap();

    assert_eq!(batch.frame_stats(), BatchStats { draw_calls: 2, vertices: 12, indices: 18 });

    batch.reset_frame_stats();
    assert_eq!(batch.frame_stats(), BatchStats::default());
}
