//! Model component

use bevy_ecs::prelude::*;
use glam::Vec3;

/// Reference to renderable geometry in the mesh store
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Model {
    /// Index into the mesh store
    pub mesh_id: u32,
    /// Local offset added to the entity position before the world matrix
    /// is built
    pub offset: Vec3,
}

impl Model {
    pub fn new(mesh_id: u32) -> Self {
        Self {
            mesh_id,
            offset: Vec3::ZERO,
        }
    }

    pub fn with_offset(mesh_id: u32, offset: Vec3) -> Self {
        Self { mesh_id, offset }
    }
}
