//! Asset loading/parsers (meshes, textures).
//! OBJ geometry is turned into deduplicated indexed meshes; images into RGBA8.

pub mod mesh;
pub mod obj;
pub mod texture;

pub use mesh::IndexedMesh;
pub use obj::{LoadOptions, ObjError, load_obj_from_path};
pub use texture::TextureData;
