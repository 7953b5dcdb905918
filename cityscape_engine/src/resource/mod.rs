//! GPU resources - shared pool, meshes and models

pub mod pool;
pub mod mesh;
pub mod model;

pub use pool::{DecodedImage, FileTextureSource, ResourcePool, TextureKey, TextureSource};
pub use mesh::{Mesh, MeshState, TextureSlot, TEXTURE_SLOT_COUNT};
pub use model::{import_obj, ImportedSubmesh, Model};
