//! A planar-reflection water renderer on wgpu
//!
//! The engine renders the scene twice per frame: once mirrored across the
//! water plane into an offscreen target, then normally with the reflection
//! composited onto the water surface. Entities live in a bevy_ecs world and
//! are drawn through a backend-agnostic graphics trait.

pub mod backend;
pub mod egui_integration;
pub mod engine;
pub mod resources;
pub mod scene;
pub mod water;
pub mod window;

pub use backend::{
    GraphicsBackend, ShaderProgram, ShaderProgramDescriptor, UniformKind, UniformValue,
    WgpuBackend,
};
pub use egui_integration::WgpuEguiIntegration;
pub use engine::Engine;
pub use resources::{GpuMesh, GpuTexture, Mesh, MeshPack, TextureData};
pub use scene::{Camera, Model, Plane, Projection, ReflectionCamera, Registry, Transform};
pub use water::WaterRenderer;
pub use window::Window;

// Re-export ECS types so applications can define their own components
pub use bevy_ecs::prelude::*;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    /// Edge length of the square offscreen reflection target
    pub reflection_size: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: "Water Engine".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
            reflection_size: water::DEFAULT_REFLECTION_SIZE,
        }
    }
}

/// Initialize logging for native applications
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
