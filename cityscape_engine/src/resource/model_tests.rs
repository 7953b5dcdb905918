use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use crate::config::StreamingConfig;
use crate::error::CityscapeResult;
use crate::graphics_device::{GraphicsDevice, HeadlessGraphicsDevice, ShaderDesc};
use crate::resource::pool::{DecodedImage, TextureSource};

// ============================================================================
// TEST HELPERS
// ============================================================================

struct CountingSource {
    loads: Arc<AtomicUsize>,
}

impl TextureSource for CountingSource {
    fn load(&self, _path: &str) -> CityscapeResult<DecodedImage> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(DecodedImage { width: 1, height: 1, pixels: vec![128; 4] })
    }
}

fn create_pool() -> (Arc<Mutex<HeadlessGraphicsDevice>>, Arc<Mutex<ResourcePool>>, Arc<AtomicUsize>) {
    let headless = Arc::new(Mutex::new(HeadlessGraphicsDevice::new()));
    let device: Arc<Mutex<dyn GraphicsDevice>> = headless.clone();
    let loads = Arc::new(AtomicUsize::new(0));
    let pool = ResourcePool::with_texture_source(
        device,
        StreamingConfig::default().with_instance_capacity(4),
        CountingSource { loads: loads.clone() },
    ).into_shared();
    (headless, pool, loads)
}

fn triangle_submesh(albedo: Option<&str>) -> ImportedSubmesh {
    ImportedSubmesh {
        name: "tri".to_string(),
        positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        indices: vec![0, 1, 2],
        albedo: albedo.map(str::to_string),
        ..Default::default()
    }
}

/// Write an OBJ + MTL pair into a fresh temp directory
fn write_quad_obj(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("cityscape_model_{}_{}", std::process::id(), name));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("quad.mtl"), "newmtl brick\nmap_Kd brick.png\n").unwrap();
    std::fs::write(dir.join("quad.obj"), "\
mtllib quad.mtl
o quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
usemtl brick
f 1/1/1 2/2/1 3/3/1 4/4/1
").unwrap();
    dir.join("quad.obj")
}

// ============================================================================
// IMPORTED SUBMESH
// ============================================================================

#[test]
fn test_missing_attributes_are_filled() {
    let vertices = triangle_submesh(None).vertices();

    assert_eq!(vertices.len(), 3);
    assert_eq!(vertices[1].position, [1.0, 0.0, 0.0]);
    assert_eq!(vertices[1].color, [1.0; 4]);
    assert_eq!(vertices[1].normal, [0.0, 1.0, 0.0]);
    assert_eq!(vertices[1].uv, [0.0, 0.0]);
}

#[test]
fn test_present_attributes_are_kept() {
    let mut submesh = triangle_submesh(None);
    submesh.normals = vec![[0.0, 0.0, 1.0]; 3];
    submesh.uvs = vec![[0.5, 0.25]; 3];
    submesh.colors = vec![[1.0, 0.0, 0.0, 1.0]; 3];

    let vertex = submesh.vertices()[2];

    assert_eq!(vertex.normal, [0.0, 0.0, 1.0]);
    assert_eq!(vertex.uv, [0.5, 0.25]);
    assert_eq!(vertex.color, [1.0, 0.0, 0.0, 1.0]);
}

// ============================================================================
// OBJ IMPORT
// ============================================================================

#[test]
fn test_import_obj_triangulates_and_resolves_textures() {
    let path = write_quad_obj("import");

    let submeshes = import_obj(&path);

    assert_eq!(submeshes.len(), 1);
    let quad = &submeshes[0];
    assert_eq!(quad.name, "quad");
    assert_eq!(quad.positions.len(), 4);
    assert_eq!(quad.uvs.len(), 4);
    assert_eq!(quad.normals.len(), 4);
    assert_eq!(quad.indices.len(), 6);
    let albedo = quad.albedo.as_ref().unwrap();
    assert!(Path::new(albedo).ends_with("brick.png"));
    assert!(Path::new(albedo).starts_with(path.parent().unwrap()));
    assert!(quad.specular.is_none());
}

#[test]
fn test_import_missing_file_yields_nothing() {
    assert!(import_obj("no/such/model.obj").is_empty());
}

// ============================================================================
// MODEL
// ============================================================================

#[test]
fn test_from_submeshes_builds_meshes_with_textures() {
    let (_headless, pool, loads) = create_pool();
    let submeshes = vec![triangle_submesh(Some("wall.png")), triangle_submesh(Some("wall.png"))];

    let model = Model::from_submeshes(&pool, &submeshes, SamplerDesc::default()).unwrap();

    assert_eq!(model.mesh_count(), 2);
    assert_eq!(model.vertex_count(), 6);
    assert_eq!(model.index_count(), 6);
    assert!(model.meshes()[0].is_indexed());
    assert!(model.meshes()[1].texture(TextureSlot::Albedo0).is_some());
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(pool.lock().unwrap().texture_ref_count("wall.png"), 2);
}

#[test]
fn test_empty_submeshes_are_skipped() {
    let (_headless, pool, _loads) = create_pool();
    let submeshes = vec![ImportedSubmesh::default(), triangle_submesh(None)];

    let model = Model::from_submeshes(&pool, &submeshes, SamplerDesc::default()).unwrap();

    assert_eq!(model.mesh_count(), 1);
}

#[test]
fn test_commit_and_draw_every_mesh() {
    let (headless, pool, _loads) = create_pool();
    let submeshes = vec![triangle_submesh(None), triangle_submesh(None), triangle_submesh(None)];
    let mut model = Model::from_submeshes(&pool, &submeshes, SamplerDesc::default()).unwrap();
    let shader = headless.lock().unwrap().create_shader(ShaderDesc {
        name: "model".to_string(),
        vertex_source: "v".to_string(),
        fragment_source: "f".to_string(),
        uniform_blocks: Vec::new(),
    }).unwrap();

    model.commit().unwrap();
    model.draw(&shader).unwrap();
    model.draw_instances(&shader, &[InstanceData::at(Vec3::X), InstanceData::at(Vec3::Y)]).unwrap();

    let stats = headless.lock().unwrap().stats();
    assert_eq!(stats.draw_calls, 6);
    assert_eq!(stats.instances_drawn, 3 + 6);
}

#[test]
fn test_load_obj_model_and_reset_releases_textures() {
    let (_headless, pool, loads) = create_pool();
    let path = write_quad_obj("load");

    let mut model = Model::load(&pool, &path, SamplerDesc::default()).unwrap();
    model.commit().unwrap();

    assert_eq!(model.mesh_count(), 1);
    assert_eq!(model.index_count(), 6);
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    model.reset();
    assert_eq!(model.vertex_count(), 0);
    assert_eq!(pool.lock().unwrap().texture_count(), 0);
}
