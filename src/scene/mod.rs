//! Scene management: entities, cameras, and the model draw pass

pub mod camera;
pub mod model;
pub mod reflection;
pub mod transform;

pub use camera::{Camera, Projection};
pub use model::Model;
pub use reflection::{Plane, ReflectionCamera};
pub use transform::Transform;

use bevy_ecs::prelude::*;
use glam::{Mat4, Vec3};
use thiserror::Error;

use crate::backend::{GraphicsBackend, ShaderProgram, UniformValue};
use crate::resources::{AssetError, MeshPack};

#[derive(Error, Debug)]
pub enum DrawError {
    #[error(transparent)]
    Backend(#[from] crate::backend::BackendError),
    #[error(transparent)]
    Asset(#[from] AssetError),
}

/// WGSL for the model draw pass
pub const MODEL_SHADER: &str = r#"
struct Uniforms {
    view_projection: mat4x4<f32>,
    model: mat4x4<f32>,
};

@group(0) @binding(0) var<uniform> uniforms: Uniforms;
@group(1) @binding(0) var t_color: texture_2d<f32>;
@group(1) @binding(1) var s_color: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_normal: vec3<f32>,
    @location(1) uv: vec2<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_position = uniforms.model * vec4<f32>(in.position, 1.0);
    out.clip_position = uniforms.view_projection * world_position;
    out.world_normal = normalize((uniforms.model * vec4<f32>(in.normal, 0.0)).xyz);
    out.uv = in.uv;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let light_dir = normalize(vec3<f32>(0.4, 1.0, 0.3));
    let diffuse = max(dot(in.world_normal, light_dir), 0.0);
    let ambient = 0.25;
    let albedo = textureSample(t_color, s_color, in.uv);
    return vec4<f32>(albedo.rgb * (ambient + diffuse * 0.75), albedo.a);
}
"#;

/// Entity registry over the ECS world
#[derive(Default)]
pub struct Registry {
    world: World,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a drawable entity
    pub fn spawn_model(&mut self, model: Model, transform: Transform) -> Entity {
        self.world.spawn((model, transform)).id()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn len(&self) -> usize {
        self.world.entities().len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Draw every entity with a model and transform under the given
    /// view-projection.
    ///
    /// Models without uploaded GPU geometry are skipped. A mesh index that
    /// does not exist in the store aborts the pass with an error.
    pub fn draw_models<B: GraphicsBackend>(
        &mut self,
        view_projection: Mat4,
        shader: &mut ShaderProgram,
        pack: &MeshPack,
        backend: &mut B,
    ) -> Result<(), DrawError> {
        let mut query = self.world.query::<(&Model, &Transform)>();
        for (model, transform) in query.iter(&self.world) {
            let entry = pack.get_model(model.mesh_id)?;
            let Some(gpu) = entry.gpu.as_ref() else {
                log::trace!("model {} has no GPU geometry, skipping", model.mesh_id);
                continue;
            };

            let world_position: Vec3 = transform.position + model.offset;
            shader.set_uniform_value("u_view_projection", UniformValue::Mat4(view_projection));
            shader.set_uniform_value(
                "u_model",
                UniformValue::Mat4(transform.world_matrix(world_position)),
            );
            shader.bind(backend)?;
            gpu.draw(backend);
        }
        Ok(())
    }
}
