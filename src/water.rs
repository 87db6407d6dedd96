//! Water surface rendering
//!
//! The water is drawn in two stages each frame. First the scene is rendered
//! mirrored across the water plane into an offscreen target
//! (`begin_reflection` .. `end_reflection`), then the main pass composites
//! that target onto the water surface as a full-screen quad (`draw`).

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::backend::{ShaderProgram, UniformValue, WgpuBackend};
use crate::egui_integration::WgpuEguiIntegration;
use crate::scene::{Camera, Plane, ReflectionCamera};

/// Offscreen reflection target edge length
pub const DEFAULT_REFLECTION_SIZE: u32 = 1024;

const PREVIEW_SIZE: f32 = 256.0;

/// WGSL for the water composite quad
pub const WATER_SHADER: &str = r#"
@group(0) @binding(0) var t_reflection: texture_2d<f32>;
@group(0) @binding(1) var s_reflection: sampler;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@location(0) position: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = vec4<f32>(position, 0.0, 1.0);
    out.uv = position * vec2<f32>(0.5, -0.5) + vec2<f32>(0.5, 0.5);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let reflection = textureSample(t_reflection, s_reflection, in.uv);
    let water_color = vec3<f32>(0.05, 0.18, 0.25);
    return vec4<f32>(mix(water_color, reflection.rgb, 0.6), 1.0);
}
"#;

/// Vertex of the composite quad, clip-space position only
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct WaterVertex {
    pub position: Vec2,
}

impl WaterVertex {
    pub fn layout() -> VertexBufferLayout {
        VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as u64,
            attributes: vec![VertexAttribute {
                location: 0,
                format: VertexFormat::Float32x2,
                offset: 0,
            }],
        }
    }
}

pub(crate) const QUAD_VERTICES: [WaterVertex; 4] = [
    WaterVertex { position: Vec2::new(-1.0, 1.0) },
    WaterVertex { position: Vec2::new(1.0, 1.0) },
    WaterVertex { position: Vec2::new(1.0, -1.0) },
    WaterVertex { position: Vec2::new(-1.0, -1.0) },
];

pub(crate) const QUAD_INDICES: [u16; 6] = [2, 1, 0, 0, 3, 2];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassState {
    Idle,
    ReflectionPass,
}

/// Renders the planar water reflection and composites it on screen
pub struct WaterRenderer {
    state: PassState,
    size: u32,

    color_texture: TextureHandle,
    color_view: TextureViewHandle,
    depth_texture: TextureHandle,
    depth_view: TextureViewHandle,
    sampler: SamplerHandle,

    quad_vertex_buffer: BufferHandle,
    quad_index_buffer: BufferHandle,

    saved_viewport: Option<Viewport>,
    reflection_camera: Option<ReflectionCamera>,
    preview_texture: Option<egui::TextureId>,
}

impl WaterRenderer {
    pub fn new<B: GraphicsBackend>(backend: &mut B, size: u32) -> BackendResult<Self> {
        let color_texture = backend.create_texture(&TextureDescriptor {
            label: Some("Water Reflection Color".into()),
            width: size,
            height: size,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        })?;
        let color_view = backend.create_texture_view(color_texture)?;

        let depth_texture = backend.create_texture(&TextureDescriptor {
            label: Some("Water Reflection Depth".into()),
            width: size,
            height: size,
            format: TextureFormat::Depth32Float,
            usage: TextureUsage::RENDER_ATTACHMENT,
        })?;
        let depth_view = backend.create_texture_view(depth_texture)?;

        let sampler = backend.create_sampler(&SamplerDescriptor {
            label: Some("Water Reflection Sampler".into()),
            ..Default::default()
        })?;

        let quad_vertex_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some("Water Quad Vertices".into()),
                size: std::mem::size_of_val(&QUAD_VERTICES) as u64,
                usage: BufferUsage::VERTEX,
                mapped_at_creation: false,
            },
            bytemuck::cast_slice(&QUAD_VERTICES),
        )?;
        let quad_index_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some("Water Quad Indices".into()),
                size: std::mem::size_of_val(&QUAD_INDICES) as u64,
                usage: BufferUsage::INDEX,
                mapped_at_creation: false,
            },
            bytemuck::cast_slice(&QUAD_INDICES),
        )?;

        Ok(Self {
            state: PassState::Idle,
            size,
            color_texture,
            color_view,
            depth_texture,
            depth_view,
            sampler,
            quad_vertex_buffer,
            quad_index_buffer,
            saved_viewport: None,
            reflection_camera: None,
            preview_texture: None,
        })
    }

    /// The offscreen target the mirrored scene is rendered into
    pub fn reflection_view(&self) -> TextureViewHandle {
        self.color_view
    }

    pub fn reflection_size(&self) -> u32 {
        self.size
    }

    /// Redirect rendering into the offscreen reflection target.
    ///
    /// Saves the current viewport, opens a cleared pass on the reflection
    /// target, and returns the camera whose view-projection mirrors the
    /// scene across the water plane. Every call must be paired with
    /// [`WaterRenderer::end_reflection`].
    pub fn begin_reflection<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        camera: &Camera,
    ) -> &ReflectionCamera {
        debug_assert_eq!(self.state, PassState::Idle, "reflection pass already open");

        self.saved_viewport = Some(backend.viewport());

        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Water Reflection Pass".into()),
            color_attachments: vec![ColorAttachment {
                view: self.color_view,
                load_op: LoadOp::Clear([0.0, 0.0, 0.0, 1.0]),
                store_op: StoreOp::Store,
            }],
            depth_stencil_attachment: Some(DepthStencilAttachment {
                view: self.depth_view,
                depth_load_op: LoadOp::Clear([0.0; 4]),
                depth_store_op: StoreOp::Store,
                depth_clear_value: 1.0,
            }),
        });
        backend.set_viewport(Viewport::full(self.size, self.size));

        self.state = PassState::ReflectionPass;
        self.reflection_camera
            .insert(ReflectionCamera::from_camera(camera, Plane::WATER))
    }

    /// Close the reflection pass and restore the previous viewport
    pub fn end_reflection<B: GraphicsBackend>(&mut self, backend: &mut B) {
        debug_assert_eq!(
            self.state,
            PassState::ReflectionPass,
            "no reflection pass open"
        );

        backend.end_render_pass();
        if let Some(viewport) = self.saved_viewport.take() {
            backend.set_viewport(viewport);
        }
        self.state = PassState::Idle;
    }

    /// Composite the reflection onto the water surface.
    ///
    /// Must be called inside the main pass, after the reflection pass has
    /// closed.
    pub fn draw<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        shader: &mut ShaderProgram,
    ) -> BackendResult<()> {
        debug_assert_eq!(self.state, PassState::Idle, "reflection pass still open");

        shader.set_uniform_value("s_reflection", UniformValue::Sampler(0));
        shader.set_texture(0, self.color_view, self.sampler);
        shader.bind(backend)?;

        backend.set_vertex_buffer(0, self.quad_vertex_buffer, 0);
        backend.set_index_buffer(self.quad_index_buffer, 0, IndexFormat::Uint16);
        backend.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);
        Ok(())
    }

    /// Show a live preview of the reflection target
    pub fn debug_gui(
        &mut self,
        ctx: &egui::Context,
        integration: &mut WgpuEguiIntegration,
        backend: &WgpuBackend,
    ) {
        let texture_id = match self.preview_texture {
            Some(id) => id,
            None => {
                let Some(id) = integration.register_texture(backend, self.color_view) else {
                    return;
                };
                self.preview_texture = Some(id);
                id
            }
        };

        egui::Window::new("Water Reflection")
            .resizable(false)
            .show(ctx, |ui| {
                ui.image((texture_id, egui::vec2(PREVIEW_SIZE, PREVIEW_SIZE)));
            });
    }

    pub fn destroy<B: GraphicsBackend>(&mut self, backend: &mut B) {
        backend.destroy_texture(self.color_texture);
        backend.destroy_texture(self.depth_texture);
        backend.destroy_buffer(self.quad_vertex_buffer);
        backend.destroy_buffer(self.quad_index_buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{RecordedCommand, RecordingBackend};
    use crate::backend::ShaderProgramDescriptor;
    use approx::assert_relative_eq;
    use glam::{Mat4, Vec3};

    fn water_program(backend: &mut RecordingBackend) -> ShaderProgram {
        ShaderProgram::new(
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
        .unwrap()
    }

    #[test]
    fn offscreen_target_is_square_and_bindable() {
        let mut backend = RecordingBackend::new();
        let water = WaterRenderer::new(&mut backend, 1024).unwrap();

        let texture = backend.texture_of_view(water.reflection_view()).unwrap();
        let desc = &backend.texture_descriptors[&texture.0];
        assert_eq!((desc.width, desc.height), (1024, 1024));
        assert_eq!(desc.format, TextureFormat::Rgba8Unorm);
        assert!(desc.usage.contains(TextureUsage::RENDER_ATTACHMENT));
        assert!(desc.usage.contains(TextureUsage::TEXTURE_BINDING));
    }

    #[test]
    fn reflection_pass_round_trip_restores_state() {
        let mut backend = RecordingBackend::new();
        let mut water = WaterRenderer::new(&mut backend, 512).unwrap();
        backend.begin_frame().unwrap();

        let custom = Viewport {
            x: 10.0,
            y: 20.0,
            width: 300.0,
            height: 200.0,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        backend.set_viewport(custom);

        let camera = Camera::default();
        water.begin_reflection(&mut backend, &camera);
        assert_eq!(backend.viewport(), Viewport::full(512, 512));
        assert_eq!(backend.active_render_target(), Some(water.reflection_view()));

        water.end_reflection(&mut backend);
        assert_eq!(backend.viewport(), custom);
        assert_eq!(backend.active_render_target(), None);
    }

    #[test]
    fn reflection_pass_clears_color_and_depth() {
        let mut backend = RecordingBackend::new();
        let mut water = WaterRenderer::new(&mut backend, 256).unwrap();
        backend.begin_frame().unwrap();

        let camera = Camera::default();
        water.begin_reflection(&mut backend, &camera);
        water.end_reflection(&mut backend);

        let desc = backend.pass_descriptors.last().unwrap();
        assert!(matches!(
            desc.color_attachments[0].load_op,
            LoadOp::Clear(_)
        ));
        let depth = desc.depth_stencil_attachment.as_ref().unwrap();
        assert!(matches!(depth.depth_load_op, LoadOp::Clear(_)));
        assert_eq!(depth.depth_clear_value, 1.0);
    }

    #[test]
    fn reflection_camera_mirrors_the_scene_camera() {
        let mut backend = RecordingBackend::new();
        let mut water = WaterRenderer::new(&mut backend, 256).unwrap();
        backend.begin_frame().unwrap();

        let camera = Camera::new(Vec3::new(0.0, 3.0, 8.0), Vec3::ZERO);
        let reflection = water.begin_reflection(&mut backend, &camera).clone();
        water.end_reflection(&mut backend);

        let expected = camera.projection_matrix()
            * camera.view_rotation()
            * Mat4::from_translation(-camera.position)
            * Plane::WATER.reflection_matrix();
        for (a, b) in reflection
            .view_projection_matrix()
            .to_cols_array()
            .iter()
            .zip(expected.to_cols_array().iter())
        {
            assert_relative_eq!(a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn draw_issues_the_quad() {
        let mut backend = RecordingBackend::new();
        let mut water = WaterRenderer::new(&mut backend, 256).unwrap();
        let mut shader = water_program(&mut backend);
        backend.begin_frame().unwrap();

        shader.begin_frame();
        water.draw(&mut backend, &mut shader).unwrap();

        assert!(backend.commands.contains(&RecordedCommand::SetVertexBuffer {
            slot: 0,
            buffer: water.quad_vertex_buffer,
        }));
        assert!(backend.commands.contains(&RecordedCommand::SetIndexBuffer {
            buffer: water.quad_index_buffer,
            format: IndexFormat::Uint16,
        }));
        assert!(backend
            .commands
            .contains(&RecordedCommand::DrawIndexed { indices: 0..6 }));
    }

    #[test]
    fn quad_triangles_are_ccw_and_cover_clip_space() {
        let mut area = 0.0f32;
        for tri in QUAD_INDICES.chunks(3) {
            let a = QUAD_VERTICES[tri[0] as usize].position;
            let b = QUAD_VERTICES[tri[1] as usize].position;
            let c = QUAD_VERTICES[tri[2] as usize].position;
            let cross = (b - a).perp_dot(c - a);
            assert!(cross > 0.0, "triangle {tri:?} is not counter-clockwise");
            area += cross / 2.0;
        }
        // Two triangles tile the [-1,1] square exactly.
        assert_relative_eq!(area, 4.0, epsilon = 1e-6);
    }
}
