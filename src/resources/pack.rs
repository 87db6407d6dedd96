//! Indexed mesh and texture store
//!
//! Models and textures are addressed by dense indices handed out at insert
//! time. Lookups with a stale or wrong index fail loudly rather than
//! rendering the wrong asset.

use thiserror::Error;

use crate::backend::traits::{BackendResult, GraphicsBackend};
use crate::resources::mesh::{GpuMesh, Mesh};
use crate::resources::texture::GpuTexture;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Asset index {id} out of range (store holds {len})")]
    OutOfRange { id: u32, len: usize },
}

/// A stored model: CPU mesh data plus optionally uploaded GPU geometry
#[derive(Debug)]
pub struct ModelEntry {
    pub mesh: Mesh,
    pub gpu: Option<GpuMesh>,
}

/// Store of models and textures addressed by index
#[derive(Default)]
pub struct MeshPack {
    models: Vec<ModelEntry>,
    textures: Vec<GpuTexture>,
}

impl MeshPack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a model without GPU geometry. It will be skipped by draw passes
    /// until uploaded.
    pub fn add_model(&mut self, mesh: Mesh) -> u32 {
        let id = self.models.len() as u32;
        self.models.push(ModelEntry { mesh, gpu: None });
        id
    }

    /// Add a model and upload its geometry
    pub fn add_model_with_gpu<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        mesh: Mesh,
    ) -> BackendResult<u32> {
        let gpu = GpuMesh::upload(backend, &mesh)?;
        let id = self.models.len() as u32;
        self.models.push(ModelEntry {
            mesh,
            gpu: Some(gpu),
        });
        Ok(id)
    }

    pub fn add_texture(&mut self, texture: GpuTexture) -> u32 {
        let id = self.textures.len() as u32;
        self.textures.push(texture);
        id
    }

    pub fn get_model(&self, id: u32) -> Result<&ModelEntry, AssetError> {
        self.models.get(id as usize).ok_or(AssetError::OutOfRange {
            id,
            len: self.models.len(),
        })
    }

    pub fn get_texture(&self, id: u32) -> Result<&GpuTexture, AssetError> {
        self.textures.get(id as usize).ok_or(AssetError::OutOfRange {
            id,
            len: self.textures.len(),
        })
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::RecordingBackend;

    #[test]
    fn indices_are_dense_and_stable() {
        let mut pack = MeshPack::new();
        let a = pack.add_model(Mesh::cube());
        let b = pack.add_model(Mesh::plane(1.0, 1.0, 1));
        assert_eq!((a, b), (0, 1));
        assert_eq!(pack.get_model(a).unwrap().mesh.name, "cube");
        assert_eq!(pack.get_model(b).unwrap().mesh.name, "plane");
    }

    #[test]
    fn out_of_range_lookup_fails() {
        let pack = MeshPack::new();
        let err = pack.get_model(3).unwrap_err();
        assert!(matches!(err, AssetError::OutOfRange { id: 3, len: 0 }));
    }

    #[test]
    fn uploaded_model_has_gpu_geometry() {
        let mut backend = RecordingBackend::new();
        let mut pack = MeshPack::new();
        let cpu_only = pack.add_model(Mesh::cube());
        let uploaded = pack
            .add_model_with_gpu(&mut backend, Mesh::cube())
            .unwrap();

        assert!(pack.get_model(cpu_only).unwrap().gpu.is_none());
        let entry = pack.get_model(uploaded).unwrap();
        let gpu = entry.gpu.as_ref().unwrap();
        assert_eq!(gpu.index_count, 36);
    }
}
