//! Main engine orchestrator
//!
//! Owns the backend, the scene state, and the water renderer, and runs the
//! two-pass frame: mirrored scene into the reflection target, then the main
//! pass with the water composite and optional debug UI on top.

use std::sync::Arc;

use winit::window::Window as WinitWindow;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::backend::wgpu_backend::WgpuBackend;
use crate::backend::{ShaderProgram, ShaderProgramDescriptor, UniformKind};
use crate::egui_integration::WgpuEguiIntegration;
use crate::resources::{GpuTexture, Mesh, MeshPack, TextureData};
use crate::scene::{Camera, DrawError, Registry, MODEL_SHADER};
use crate::water::{WaterRenderer, WaterVertex, WATER_SHADER};
use crate::EngineConfig;

/// The main engine
pub struct Engine {
    backend: WgpuBackend,
    camera: Camera,
    registry: Registry,
    pack: MeshPack,
    water: WaterRenderer,

    model_shader: ShaderProgram,
    water_shader: ShaderProgram,
    default_sampler: SamplerHandle,

    depth_texture: TextureHandle,
    depth_view: TextureViewHandle,

    egui: Option<WgpuEguiIntegration>,
    show_water_debug: bool,

    width: u32,
    height: u32,
}

impl Engine {
    pub fn new(window: Arc<WinitWindow>, config: &EngineConfig) -> BackendResult<Self> {
        let mut backend = WgpuBackend::new(window, config.vsync)?;
        let (width, height) = backend.surface_size();
        let swapchain_format = backend.swapchain_format();

        let (depth_texture, depth_view) = Self::create_depth_buffer(&mut backend, width, height)?;

        let mut model_shader = ShaderProgram::new(
            &mut backend,
            &ShaderProgramDescriptor {
                label: Some("Model Shader".into()),
                source: MODEL_SHADER.into(),
                uniforms: vec![
                    ("u_view_projection".into(), UniformKind::Mat4),
                    ("u_model".into(), UniformKind::Mat4),
                ],
                samplers: vec!["s_color".into()],
                vertex_layout: Vertex::layout(),
                color_format: swapchain_format,
                blend: None,
                depth_stencil: Some(DepthStencilState {
                    format: TextureFormat::Depth32Float,
                    depth_write_enabled: true,
                    depth_compare: CompareFunction::Less,
                }),
                front_face: FrontFace::Ccw,
                cull_mode: CullMode::Back,
            },
        )?;

        // The composite quad covers the screen; it ignores depth instead of
        // fighting the scene it reflects.
        let water_shader = ShaderProgram::new(
            &mut backend,
            &ShaderProgramDescriptor {
                label: Some("Water Shader".into()),
                source: WATER_SHADER.into(),
                uniforms: vec![],
                samplers: vec!["s_reflection".into()],
                vertex_layout: WaterVertex::layout(),
                color_format: swapchain_format,
                blend: None,
                depth_stencil: Some(DepthStencilState {
                    format: TextureFormat::Depth32Float,
                    depth_write_enabled: false,
                    depth_compare: CompareFunction::Always,
                }),
                front_face: FrontFace::Ccw,
                cull_mode: CullMode::Back,
            },
        )?;

        let default_sampler = backend.create_sampler(&SamplerDescriptor {
            label: Some("Default Sampler".into()),
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            ..Default::default()
        })?;

        let water = WaterRenderer::new(&mut backend, config.reflection_size)?;

        let mut pack = MeshPack::new();
        let white = GpuTexture::create(&mut backend, &TextureData::white())?;
        model_shader.set_texture(0, white.view, default_sampler);
        pack.add_texture(white);

        let mut camera = Camera::default();
        camera.set_aspect(width as f32, height as f32);

        Ok(Self {
            backend,
            camera,
            registry: Registry::new(),
            pack,
            water,
            model_shader,
            water_shader,
            default_sampler,
            depth_texture,
            depth_view,
            egui: None,
            show_water_debug: false,
            width,
            height,
        })
    }

    fn create_depth_buffer<B: GraphicsBackend>(
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> BackendResult<(TextureHandle, TextureViewHandle)> {
        let texture = backend.create_texture(&TextureDescriptor {
            label: Some("Depth Buffer".into()),
            width,
            height,
            format: TextureFormat::Depth32Float,
            usage: TextureUsage::RENDER_ATTACHMENT,
        })?;
        let view = backend.create_texture_view(texture)?;
        Ok((texture, view))
    }

    /// Enable the egui debug overlay, including the water reflection preview
    pub fn enable_debug_ui(&mut self, window: &WinitWindow) {
        self.egui = Some(WgpuEguiIntegration::new(&self.backend, window));
        self.show_water_debug = true;
    }

    /// Forward a window event. Returns true if the debug UI consumed it.
    pub fn on_window_event(
        &mut self,
        window: &WinitWindow,
        event: &winit::event::WindowEvent,
    ) -> bool {
        if let Some(egui) = &mut self.egui {
            egui.on_window_event(window, event)
        } else {
            false
        }
    }

    /// Handle window resize
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.backend.resize(width, height);
        let (actual_width, actual_height) = self.backend.surface_size();
        if actual_width == self.width && actual_height == self.height {
            return;
        }
        self.width = actual_width;
        self.height = actual_height;
        self.camera
            .set_aspect(actual_width as f32, actual_height as f32);

        (self.depth_texture, self.depth_view) = Self::recreate_depth_buffer(
            &mut self.backend,
            (self.depth_texture, self.depth_view),
            actual_width,
            actual_height,
        );
    }

    /// Swap in a depth buffer of the new size. The old target is only
    /// destroyed once the replacement exists; on failure it stays valid at
    /// its previous size.
    fn recreate_depth_buffer<B: GraphicsBackend>(
        backend: &mut B,
        old: (TextureHandle, TextureViewHandle),
        width: u32,
        height: u32,
    ) -> (TextureHandle, TextureViewHandle) {
        match Self::create_depth_buffer(backend, width, height) {
            Ok(new) => {
                backend.destroy_texture(old.0);
                new
            }
            Err(e) => {
                log::error!("failed to recreate depth buffer after resize: {e}");
                old
            }
        }
    }

    /// Upload a mesh and return its store index
    pub fn add_mesh(&mut self, mesh: Mesh) -> BackendResult<u32> {
        self.pack.add_model_with_gpu(&mut self.backend, mesh)
    }

    /// Upload texture data and return its store index
    pub fn add_texture(&mut self, data: &TextureData) -> BackendResult<u32> {
        let texture = GpuTexture::create(&mut self.backend, data)?;
        Ok(self.pack.add_texture(texture))
    }

    /// Use a stored texture as the model albedo
    pub fn set_model_texture(&mut self, id: u32) -> Result<(), DrawError> {
        let view = self.pack.get_texture(id)?.view;
        self.model_shader.set_texture(0, view, self.default_sampler);
        Ok(())
    }

    /// Render one frame.
    ///
    /// Draw errors propagate only after every open pass and the frame
    /// itself are closed, so the backend is back in its idle state.
    pub fn render_frame(&mut self, window: &WinitWindow) -> Result<(), DrawError> {
        let frame = self.backend.begin_frame()?;
        self.model_shader.begin_frame();
        self.water_shader.begin_frame();

        let result = Self::run_scene_passes(
            &mut self.backend,
            &frame,
            self.depth_view,
            &self.camera,
            &mut self.registry,
            &self.pack,
            &mut self.water,
            &mut self.model_shader,
            &mut self.water_shader,
        );

        if result.is_ok() {
            if let Some(egui) = &mut self.egui {
                egui.begin_frame(window);
                if self.show_water_debug {
                    let ctx = egui.context().clone();
                    self.water.debug_gui(&ctx, egui, &self.backend);
                }
                egui.end_frame(window);
                egui.render(
                    &mut self.backend,
                    frame.swapchain_view,
                    frame.width,
                    frame.height,
                );
            }
        }

        self.backend.end_frame()?;
        result
    }

    /// Reflection pass followed by the main pass.
    ///
    /// Each pass opened here is closed before its draw error propagates,
    /// keeping the begin/end pairs and the saved viewport balanced on every
    /// exit path.
    #[allow(clippy::too_many_arguments)]
    fn run_scene_passes<B: GraphicsBackend>(
        backend: &mut B,
        frame: &FrameContext,
        depth_view: TextureViewHandle,
        camera: &Camera,
        registry: &mut Registry,
        pack: &MeshPack,
        water: &mut WaterRenderer,
        model_shader: &mut ShaderProgram,
        water_shader: &mut ShaderProgram,
    ) -> Result<(), DrawError> {
        // Reflection pass: the scene mirrored across the water plane
        let reflection_vp = water
            .begin_reflection(backend, camera)
            .view_projection_matrix();
        let reflection_result =
            registry.draw_models(reflection_vp, model_shader, pack, backend);
        water.end_reflection(backend);
        reflection_result?;

        // Main pass: scene plus the water composite
        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Main Pass".into()),
            color_attachments: vec![ColorAttachment {
                view: frame.swapchain_view,
                load_op: LoadOp::Clear([0.1, 0.1, 0.15, 1.0]),
                store_op: StoreOp::Store,
            }],
            depth_stencil_attachment: Some(DepthStencilAttachment {
                view: depth_view,
                depth_load_op: LoadOp::Clear([0.0; 4]),
                depth_store_op: StoreOp::Store,
                depth_clear_value: 1.0,
            }),
        });
        backend.set_viewport(Viewport::full(frame.width, frame.height));

        let mut main_result = registry.draw_models(
            camera.view_projection_matrix(),
            model_shader,
            pack,
            backend,
        );
        if main_result.is_ok() {
            main_result = water
                .draw(backend, water_shader)
                .map_err(DrawError::from);
        }
        backend.end_render_pass();
        main_result
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn pack(&self) -> &MeshPack {
        &self.pack
    }

    pub fn water(&self) -> &WaterRenderer {
        &self.water
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{RecordedCommand, RecordingBackend};
    use crate::scene::{Model, Transform};

    fn scene_shaders(backend: &mut RecordingBackend) -> (ShaderProgram, ShaderProgram) {
        let mut model_shader = ShaderProgram::new(
            backend,
            &ShaderProgramDescriptor {
                label: Some("Model Shader".into()),
                source: MODEL_SHADER.into(),
                uniforms: vec![
                    ("u_view_projection".into(), UniformKind::Mat4),
                    ("u_model".into(), UniformKind::Mat4),
                ],
                samplers: vec!["s_color".into()],
                vertex_layout: Vertex::layout(),
                color_format: TextureFormat::Bgra8UnormSrgb,
                blend: None,
                depth_stencil: None,
                front_face: FrontFace::Ccw,
                cull_mode: CullMode::Back,
            },
        )
        .unwrap();
        let (view, sampler) = backend.dummy_texture_binding();
        model_shader.set_texture(0, view, sampler);

        let water_shader = ShaderProgram::new(
            backend,
            &ShaderProgramDescriptor {
                label: Some("Water Shader".into()),
                source: WATER_SHADER.into(),
                uniforms: vec![],
                samplers: vec!["s_reflection".into()],
                vertex_layout: WaterVertex::layout(),
                color_format: TextureFormat::Bgra8UnormSrgb,
                blend: None,
                depth_stencil: None,
                front_face: FrontFace::Ccw,
                cull_mode: CullMode::Back,
            },
        )
        .unwrap();
        (model_shader, water_shader)
    }

    #[test]
    fn failed_scene_draw_closes_the_reflection_pass() {
        let mut backend = RecordingBackend::new();
        let (mut model_shader, mut water_shader) = scene_shaders(&mut backend);
        let mut water = WaterRenderer::new(&mut backend, 512).unwrap();
        let (_, depth_view) = Engine::create_depth_buffer(&mut backend, 800, 600).unwrap();

        // The registry references a mesh id the pack does not hold, so the
        // reflection pass draw fails.
        let mut registry = Registry::new();
        registry.spawn_model(Model::new(9), Transform::default());
        let pack = MeshPack::new();
        let camera = Camera::default();

        let frame = backend.begin_frame().unwrap();
        model_shader.begin_frame();
        water_shader.begin_frame();

        let err = Engine::run_scene_passes(
            &mut backend,
            &frame,
            depth_view,
            &camera,
            &mut registry,
            &pack,
            &mut water,
            &mut model_shader,
            &mut water_shader,
        )
        .unwrap_err();
        assert!(matches!(err, DrawError::Asset(_)));

        // The error left no pass open and undid the viewport redirect.
        assert_eq!(backend.active_render_target(), None);
        assert_eq!(backend.viewport(), Viewport::full(800, 600));
        let begins = backend
            .commands
            .iter()
            .filter(|c| matches!(c, RecordedCommand::BeginRenderPass { .. }))
            .count();
        let ends = backend
            .commands
            .iter()
            .filter(|c| matches!(c, RecordedCommand::EndRenderPass))
            .count();
        assert_eq!(begins, ends);
    }

    #[test]
    fn failed_depth_recreation_keeps_the_old_target() {
        let mut backend = RecordingBackend::new();
        let old = Engine::create_depth_buffer(&mut backend, 800, 600).unwrap();

        backend.fail_texture_creation = true;
        let kept = Engine::recreate_depth_buffer(&mut backend, old, 1024, 768);
        assert_eq!(kept, old);
        assert!(backend.texture_descriptors.contains_key(&old.0 .0));

        backend.fail_texture_creation = false;
        let replaced = Engine::recreate_depth_buffer(&mut backend, kept, 1024, 768);
        assert_ne!(replaced, kept);
        assert!(!backend.texture_descriptors.contains_key(&kept.0 .0));
    }
}
