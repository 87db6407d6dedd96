//! egui GUI integration

mod wgpu;

pub use self::wgpu::WgpuEguiIntegration;
