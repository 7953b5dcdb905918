/// Model - a set of meshes built from imported submeshes.
///
/// Import produces flat per-submesh attribute arrays ([`ImportedSubmesh`]);
/// `Model::from_submeshes` turns each into a `Mesh<VertexPositionColorNormalUv>`
/// and attaches its material textures. Attributes missing from the source
/// are filled in: white color, +Y normal, zero uv.

use std::path::Path;
use std::sync::{Arc, Mutex};
use glam::{Vec2, Vec3, Vec4};
use crate::error::CityscapeResult;
use crate::{engine_error, engine_info, engine_warn};
use crate::graphics_device::{SamplerDesc, Shader};
use crate::resource::mesh::{Mesh, TextureSlot};
use crate::resource::pool::ResourcePool;
use crate::vertex::{InstanceData, VertexPositionColorNormalUv};

// ===== IMPORTED SUBMESH =====

/// Flattened geometry of one imported submesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedSubmesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    /// Empty or one per position
    pub normals: Vec<[f32; 3]>,
    /// Empty or one per position
    pub colors: Vec<[f32; 4]>,
    /// Empty or one per position
    pub uvs: Vec<[f32; 2]>,
    /// Triangle list; empty means non-indexed
    pub indices: Vec<u32>,
    pub albedo: Option<String>,
    pub specular: Option<String>,
    pub normal: Option<String>,
}

impl ImportedSubmesh {
    /// Interleave into the canonical model vertex format
    pub fn vertices(&self) -> Vec<VertexPositionColorNormalUv> {
        self.positions.iter().enumerate().map(|(i, &position)| {
            VertexPositionColorNormalUv::new(
                Vec3::from(position),
                self.colors.get(i).copied().map_or(Vec4::ONE, Vec4::from),
                self.normals.get(i).copied().map_or(Vec3::Y, Vec3::from),
                self.uvs.get(i).copied().map_or(Vec2::ZERO, Vec2::from),
            )
        }).collect()
    }
}

// ===== OBJ IMPORT =====

/// Import a Wavefront OBJ file (triangulated, single index)
///
/// Load failures are logged and yield no submeshes. Material texture paths
/// are resolved relative to the OBJ file.
pub fn import_obj(path: impl AsRef<Path>) -> Vec<ImportedSubmesh> {
    let path = path.as_ref();
    let options = tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    };

    let (models, materials) = match tobj::load_obj(path, &options) {
        Ok(loaded) => loaded,
        Err(e) => {
            engine_error!("cityscape::Model", "Failed to import '{}': {}", path.display(), e);
            return Vec::new();
        }
    };
    let materials = materials.unwrap_or_else(|e| {
        engine_warn!("cityscape::Model", "No materials for '{}': {}", path.display(), e);
        Vec::new()
    });

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let resolve = |texture: &Option<String>| -> Option<String> {
        texture.as_ref()
            .filter(|t| !t.is_empty())
            .map(|t| base.join(t).to_string_lossy().into_owned())
    };

    models.into_iter().map(|model| {
        let mesh = model.mesh;
        let material = mesh.material_id.and_then(|id| materials.get(id));
        ImportedSubmesh {
            name: model.name,
            positions: mesh.positions.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect(),
            normals: mesh.normals.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect(),
            colors: mesh.vertex_color.chunks_exact(3).map(|c| [c[0], c[1], c[2], 1.0]).collect(),
            uvs: mesh.texcoords.chunks_exact(2).map(|c| [c[0], c[1]]).collect(),
            indices: mesh.indices,
            albedo: material.and_then(|m| resolve(&m.diffuse_texture)),
            specular: material.and_then(|m| resolve(&m.specular_texture)),
            normal: material.and_then(|m| resolve(&m.normal_texture)),
        }
    }).collect()
}

// ===== MODEL =====

/// Meshes imported from one source
pub struct Model {
    meshes: Vec<Mesh<VertexPositionColorNormalUv>>,
}

impl Model {
    /// Import `path` and build its meshes (not committed)
    pub fn load(pool: &Arc<Mutex<ResourcePool>>, path: impl AsRef<Path>, sampler: SamplerDesc) -> CityscapeResult<Self> {
        let path = path.as_ref();
        let submeshes = import_obj(path);
        let model = Self::from_submeshes(pool, &submeshes, sampler)?;
        engine_info!("cityscape::Model", "Loaded '{}': {} meshes, {} vertices",
            path.display(), model.mesh_count(), model.vertex_count());
        Ok(model)
    }

    /// One mesh per submesh, with material textures attached
    pub fn from_submeshes(
        pool: &Arc<Mutex<ResourcePool>>,
        submeshes: &[ImportedSubmesh],
        sampler: SamplerDesc,
    ) -> CityscapeResult<Self> {
        let mut meshes = Vec::with_capacity(submeshes.len());
        for submesh in submeshes.iter().filter(|s| !s.positions.is_empty()) {
            let mut mesh = Mesh::with_data(pool, submesh.vertices(), submesh.indices.clone())?;
            let textures = [
                (TextureSlot::Albedo0, &submesh.albedo),
                (TextureSlot::Specular0, &submesh.specular),
                (TextureSlot::Normal0, &submesh.normal),
            ];
            for (slot, path) in textures {
                if let Some(path) = path {
                    mesh.add_texture(slot, path, sampler)?;
                }
            }
            meshes.push(mesh);
        }
        Ok(Self { meshes })
    }

    pub fn commit(&mut self) -> CityscapeResult<()> {
        self.meshes.iter_mut().try_for_each(|mesh| mesh.commit())
    }

    pub fn draw(&self, shader: &Arc<dyn Shader>) -> CityscapeResult<()> {
        self.meshes.iter().try_for_each(|mesh| mesh.draw(shader))
    }

    pub fn draw_instances(&mut self, shader: &Arc<dyn Shader>, instances: &[InstanceData]) -> CityscapeResult<()> {
        self.meshes.iter_mut().try_for_each(|mesh| mesh.draw_instances(shader, instances))
    }

    pub fn reset(&mut self) {
        self.meshes.iter_mut().for_each(|mesh| mesh.reset());
    }

    pub fn meshes(&self) -> &[Mesh<VertexPositionColorNormalUv>] {
        &self.meshes
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.vertex_count()).sum()
    }

    pub fn index_count(&self) -> usize {
        self.meshes.iter().map(|m| m.index_count()).sum()
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
