//! In-memory backend used by unit tests
//!
//! Hands out handles, records every pass command, and tracks the same
//! observable state the real backend does (viewport, active target), so
//! render logic can be exercised without a GPU.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use crate::backend::traits::*;
use crate::backend::types::*;

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    BeginRenderPass {
        color: Vec<TextureViewHandle>,
        depth: Option<TextureViewHandle>,
    },
    EndRenderPass,
    SetPipeline(RenderPipelineHandle),
    SetBindGroup {
        index: u32,
        bind_group: BindGroupHandle,
    },
    SetVertexBuffer {
        slot: u32,
        buffer: BufferHandle,
    },
    SetIndexBuffer {
        buffer: BufferHandle,
        format: IndexFormat,
    },
    SetViewport(Viewport),
    Draw {
        vertices: Range<u32>,
    },
    DrawIndexed {
        indices: Range<u32>,
    },
}

#[derive(Default)]
pub struct RecordingBackend {
    next_id: u64,
    pub commands: Vec<RecordedCommand>,
    pub pass_descriptors: Vec<RenderPassDescriptor>,
    pub buffer_data: HashMap<u64, Vec<u8>>,
    pub texture_descriptors: HashMap<u64, TextureDescriptor>,
    view_textures: HashMap<u64, TextureHandle>,
    current_viewport: Option<Viewport>,
    active_target: Option<TextureViewHandle>,
    /// When set, `create_texture` fails, for exercising fallback paths
    pub fail_texture_creation: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// A throwaway texture view and sampler pair for binding tests
    pub fn dummy_texture_binding(&mut self) -> (TextureViewHandle, SamplerHandle) {
        (
            TextureViewHandle(self.next_id()),
            SamplerHandle(self.next_id()),
        )
    }

    /// The texture a view was created from
    pub fn texture_of_view(&self, view: TextureViewHandle) -> Option<TextureHandle> {
        self.view_textures.get(&view.0).copied()
    }

    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, RecordedCommand::Draw { .. } | RecordedCommand::DrawIndexed { .. }))
            .count()
    }
}

impl GraphicsBackend for RecordingBackend {
    fn new(_window: Arc<winit::window::Window>, _vsync: bool) -> BackendResult<Self> {
        Ok(Self::default())
    }

    fn resize(&mut self, _width: u32, _height: u32) {}

    fn surface_size(&self) -> (u32, u32) {
        (800, 600)
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext> {
        self.current_viewport = Some(Viewport::full(800, 600));
        Ok(FrameContext {
            swapchain_view: TextureViewHandle(self.next_id()),
            width: 800,
            height: 600,
        })
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        Ok(())
    }

    fn swapchain_format(&self) -> TextureFormat {
        TextureFormat::Bgra8UnormSrgb
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        let id = self.next_id();
        self.buffer_data.insert(id, vec![0u8; desc.size as usize]);
        Ok(BufferHandle(id))
    }

    fn create_buffer_init(
        &mut self,
        _desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        let id = self.next_id();
        self.buffer_data.insert(id, data.to_vec());
        Ok(BufferHandle(id))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        if let Some(contents) = self.buffer_data.get_mut(&buffer.0) {
            let offset = offset as usize;
            if contents.len() < offset + data.len() {
                contents.resize(offset + data.len(), 0);
            }
            contents[offset..offset + data.len()].copy_from_slice(data);
        }
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        if self.fail_texture_creation {
            return Err(BackendError::TextureCreationFailed(
                "texture creation disabled".into(),
            ));
        }
        let id = self.next_id();
        self.texture_descriptors.insert(id, desc.clone());
        Ok(TextureHandle(id))
    }

    fn create_texture_view(&mut self, texture: TextureHandle) -> BackendResult<TextureViewHandle> {
        let id = self.next_id();
        self.view_textures.insert(id, texture);
        Ok(TextureViewHandle(id))
    }

    fn write_texture(&mut self, _texture: TextureHandle, _data: &[u8], _width: u32, _height: u32) {}

    fn create_sampler(&mut self, _desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        Ok(SamplerHandle(self.next_id()))
    }

    fn create_bind_group_layout(
        &mut self,
        _entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        Ok(BindGroupLayoutHandle(self.next_id()))
    }

    fn create_bind_group(
        &mut self,
        _layout: BindGroupLayoutHandle,
        _entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        Ok(BindGroupHandle(self.next_id()))
    }

    fn create_render_pipeline(
        &mut self,
        _desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        Ok(RenderPipelineHandle(self.next_id()))
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        self.active_target = desc.color_attachments.first().map(|att| att.view);
        self.pass_descriptors.push(desc.clone());
        self.commands.push(RecordedCommand::BeginRenderPass {
            color: desc.color_attachments.iter().map(|att| att.view).collect(),
            depth: desc.depth_stencil_attachment.as_ref().map(|att| att.view),
        });
    }

    fn end_render_pass(&mut self) {
        self.active_target = None;
        self.commands.push(RecordedCommand::EndRenderPass);
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.commands.push(RecordedCommand::SetPipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        self.commands
            .push(RecordedCommand::SetBindGroup { index, bind_group });
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, _offset: u64) {
        self.commands
            .push(RecordedCommand::SetVertexBuffer { slot, buffer });
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle, _offset: u64, format: IndexFormat) {
        self.commands
            .push(RecordedCommand::SetIndexBuffer { buffer, format });
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.current_viewport = Some(viewport);
        self.commands.push(RecordedCommand::SetViewport(viewport));
    }

    fn draw(&mut self, vertices: Range<u32>, _instances: Range<u32>) {
        self.commands.push(RecordedCommand::Draw { vertices });
    }

    fn draw_indexed(
        &mut self,
        indices: Range<u32>,
        _base_vertex: i32,
        _instances: Range<u32>,
    ) {
        self.commands.push(RecordedCommand::DrawIndexed { indices });
    }

    fn viewport(&self) -> Viewport {
        self.current_viewport
            .unwrap_or_else(|| Viewport::full(800, 600))
    }

    fn active_render_target(&self) -> Option<TextureViewHandle> {
        self.active_target
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffer_data.remove(&buffer.0);
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.texture_descriptors.remove(&texture.0);
    }
}
