//! Graphics backend abstraction

pub mod shader;
pub mod traits;
pub mod types;
pub mod wgpu_backend;

#[cfg(test)]
pub(crate) mod recording;

pub use shader::{ShaderProgram, ShaderProgramDescriptor, UniformKind, UniformValue};
pub use traits::*;
pub use types::*;
pub use wgpu_backend::WgpuBackend;
