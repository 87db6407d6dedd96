//! Asset data and GPU resource management

pub mod mesh;
pub mod pack;
pub mod texture;

pub use mesh::{GpuMesh, Mesh};
pub use pack::{AssetError, MeshPack, ModelEntry};
pub use texture::{GpuTexture, TextureData, TextureError};
