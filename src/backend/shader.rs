//! Shader program with named uniform access
//!
//! Wraps a render pipeline together with a uniform block and texture slots
//! addressed by name. Uniform writes go to a CPU staging block; [`ShaderProgram::bind`]
//! flushes the block to a fresh GPU buffer for the draw and emits the bind
//! group commands. One buffer per draw keeps earlier draws in the same pass
//! from being clobbered, since buffer writes execute before the buffered
//! pass commands do.

use std::collections::HashMap;

use glam::{Mat4, Vec4};

use crate::backend::traits::*;
use crate::backend::types::*;

/// A value assignable to a named shader parameter
#[derive(Debug, Clone, Copy)]
pub enum UniformValue {
    Mat4(Mat4),
    Vec4(Vec4),
    Float(f32),
    /// Texture slot index for a named sampler
    Sampler(u32),
}

/// Declared type of a uniform block field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Mat4,
    Vec4,
    Float,
}

impl UniformKind {
    fn size(&self) -> usize {
        match self {
            UniformKind::Mat4 => 64,
            UniformKind::Vec4 => 16,
            UniformKind::Float => 4,
        }
    }

    fn align(&self) -> usize {
        match self {
            UniformKind::Mat4 | UniformKind::Vec4 => 16,
            UniformKind::Float => 4,
        }
    }
}

/// Everything needed to build a [`ShaderProgram`]
///
/// `uniforms` declares the uniform block fields in the same order the WGSL
/// struct declares them. `samplers` declares named texture slots; the name's
/// index is its slot.
#[derive(Debug, Clone)]
pub struct ShaderProgramDescriptor {
    pub label: Option<String>,
    pub source: String,
    pub uniforms: Vec<(String, UniformKind)>,
    pub samplers: Vec<String>,
    pub vertex_layout: VertexBufferLayout,
    pub color_format: TextureFormat,
    pub blend: Option<BlendState>,
    pub depth_stencil: Option<DepthStencilState>,
    pub front_face: FrontFace,
    pub cull_mode: CullMode,
}

struct UniformField {
    offset: usize,
    kind: UniformKind,
}

pub struct ShaderProgram {
    pipeline: RenderPipelineHandle,

    fields: HashMap<String, UniformField>,
    staging: Vec<u8>,

    uniform_layout: Option<BindGroupLayoutHandle>,
    // One (buffer, bind group) per draw this frame
    draw_buffers: Vec<(BufferHandle, BindGroupHandle)>,
    draw_index: usize,

    sampler_slots: HashMap<String, u32>,
    texture_layout: Option<BindGroupLayoutHandle>,
    texture_group_index: u32,
    textures: Vec<Option<(TextureViewHandle, SamplerHandle)>>,
    texture_bind_group: Option<BindGroupHandle>,
    textures_dirty: bool,
}

impl ShaderProgram {
    pub fn new<B: GraphicsBackend>(
        backend: &mut B,
        desc: &ShaderProgramDescriptor,
    ) -> BackendResult<Self> {
        // Lay out the uniform block field by field, matching the WGSL struct
        let mut fields = HashMap::new();
        let mut cursor = 0usize;
        for (name, kind) in &desc.uniforms {
            let align = kind.align();
            cursor = (cursor + align - 1) / align * align;
            fields.insert(
                name.clone(),
                UniformField {
                    offset: cursor,
                    kind: *kind,
                },
            );
            cursor += kind.size();
        }
        // Uniform buffer bindings must be 16-byte sized
        let block_size = (cursor + 15) / 16 * 16;

        let mut bind_group_layouts = Vec::new();

        let uniform_layout = if !desc.uniforms.is_empty() {
            let layout = backend.create_bind_group_layout(&[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStageFlags::VERTEX_FRAGMENT,
                ty: BindingType::UniformBuffer,
            }])?;
            bind_group_layouts.push(layout);
            Some(layout)
        } else {
            None
        };

        let texture_group_index = bind_group_layouts.len() as u32;
        let texture_layout = if !desc.samplers.is_empty() {
            let mut entries = Vec::new();
            for slot in 0..desc.samplers.len() as u32 {
                entries.push(BindGroupLayoutEntry {
                    binding: slot * 2,
                    visibility: ShaderStageFlags::FRAGMENT,
                    ty: BindingType::Texture,
                });
                entries.push(BindGroupLayoutEntry {
                    binding: slot * 2 + 1,
                    visibility: ShaderStageFlags::FRAGMENT,
                    ty: BindingType::Sampler,
                });
            }
            let layout = backend.create_bind_group_layout(&entries)?;
            bind_group_layouts.push(layout);
            Some(layout)
        } else {
            None
        };

        let pipeline = backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: desc.label.clone(),
            shader: desc.source.clone(),
            vertex_layouts: vec![desc.vertex_layout.clone()],
            bind_group_layouts,
            primitive_topology: PrimitiveTopology::TriangleList,
            front_face: desc.front_face,
            cull_mode: desc.cull_mode,
            depth_stencil: desc.depth_stencil.clone(),
            color_targets: vec![ColorTargetState {
                format: desc.color_format,
                blend: desc.blend,
            }],
        })?;

        let sampler_slots = desc
            .samplers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i as u32))
            .collect();

        Ok(Self {
            pipeline,
            fields,
            staging: vec![0u8; block_size],
            uniform_layout,
            draw_buffers: Vec::new(),
            draw_index: 0,
            sampler_slots,
            texture_layout,
            texture_group_index,
            textures: vec![None; desc.samplers.len()],
            texture_bind_group: None,
            textures_dirty: false,
        })
    }

    /// Reset the per-draw buffer cursor. Call once per frame before any bind.
    pub fn begin_frame(&mut self) {
        self.draw_index = 0;
    }

    /// Assign a named parameter.
    ///
    /// Unknown names and kind mismatches are programmer errors and only
    /// checked in debug builds; release builds ignore the write.
    pub fn set_uniform_value(&mut self, name: &str, value: UniformValue) {
        if let UniformValue::Sampler(slot) = value {
            debug_assert_eq!(
                self.sampler_slots.get(name).copied(),
                Some(slot),
                "sampler {name} is not declared for slot {slot}"
            );
            return;
        }

        let Some(field) = self.fields.get(name) else {
            debug_assert!(false, "unknown uniform {name}");
            return;
        };

        let bytes: &[u8] = match (&value, field.kind) {
            (UniformValue::Mat4(m), UniformKind::Mat4) => {
                self.staging[field.offset..field.offset + 64]
                    .copy_from_slice(bytemuck::bytes_of(m));
                return;
            }
            (UniformValue::Vec4(v), UniformKind::Vec4) => bytemuck::bytes_of(v),
            (UniformValue::Float(f), UniformKind::Float) => bytemuck::bytes_of(f),
            _ => {
                debug_assert!(false, "uniform {name} set with mismatched kind");
                return;
            }
        };
        self.staging[field.offset..field.offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Attach a texture and sampler to a slot
    pub fn set_texture(&mut self, slot: u32, view: TextureViewHandle, sampler: SamplerHandle) {
        let slot = slot as usize;
        debug_assert!(slot < self.textures.len(), "texture slot {slot} out of range");
        if slot < self.textures.len() && self.textures[slot] != Some((view, sampler)) {
            self.textures[slot] = Some((view, sampler));
            self.textures_dirty = true;
        }
    }

    /// Flush uniforms and set pipeline plus bind groups on the current pass.
    ///
    /// Must be called once per draw, after all `set_uniform_value` calls for
    /// that draw.
    pub fn bind<B: GraphicsBackend>(&mut self, backend: &mut B) -> BackendResult<()> {
        backend.set_render_pipeline(self.pipeline);

        if let Some(uniform_layout) = self.uniform_layout {
            if self.draw_index == self.draw_buffers.len() {
                let buffer = backend.create_buffer(&BufferDescriptor {
                    label: Some("Uniform Block".into()),
                    size: self.staging.len() as u64,
                    usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
                    mapped_at_creation: false,
                })?;
                let bind_group = backend.create_bind_group(
                    uniform_layout,
                    &[(
                        0,
                        BindGroupEntry::Buffer {
                            buffer,
                            offset: 0,
                            size: None,
                        },
                    )],
                )?;
                self.draw_buffers.push((buffer, bind_group));
            }

            let (buffer, bind_group) = self.draw_buffers[self.draw_index];
            backend.write_buffer(buffer, 0, &self.staging);
            backend.set_bind_group(0, bind_group);
            self.draw_index += 1;
        }

        if let Some(texture_layout) = self.texture_layout {
            if self.textures_dirty || self.texture_bind_group.is_none() {
                let mut entries = Vec::new();
                for (slot, bound) in self.textures.iter().enumerate() {
                    let Some((view, sampler)) = bound else {
                        debug_assert!(false, "texture slot {slot} bound without a texture");
                        continue;
                    };
                    let slot = slot as u32;
                    entries.push((slot * 2, BindGroupEntry::Texture(*view)));
                    entries.push((slot * 2 + 1, BindGroupEntry::Sampler(*sampler)));
                }
                self.texture_bind_group =
                    Some(backend.create_bind_group(texture_layout, &entries)?);
                self.textures_dirty = false;
            }
            if let Some(bind_group) = self.texture_bind_group {
                backend.set_bind_group(self.texture_group_index, bind_group);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::RecordingBackend;

    fn descriptor() -> ShaderProgramDescriptor {
        ShaderProgramDescriptor {
            label: Some("Test Shader".into()),
            source: "// wgsl".into(),
            uniforms: vec![
                ("u_view_projection".into(), UniformKind::Mat4),
                ("u_model".into(), UniformKind::Mat4),
                ("u_tint".into(), UniformKind::Vec4),
            ],
            samplers: vec!["s_color".into()],
            vertex_layout: Vertex::layout(),
            color_format: TextureFormat::Bgra8UnormSrgb,
            blend: None,
            depth_stencil: None,
            front_face: FrontFace::Ccw,
            cull_mode: CullMode::Back,
        }
    }

    #[test]
    fn uniform_block_layout_is_sequential() {
        let mut backend = RecordingBackend::new();
        let program = ShaderProgram::new(&mut backend, &descriptor()).unwrap();
        assert_eq!(program.fields["u_view_projection"].offset, 0);
        assert_eq!(program.fields["u_model"].offset, 64);
        assert_eq!(program.fields["u_tint"].offset, 128);
        assert_eq!(program.staging.len(), 144);
    }

    #[test]
    fn set_uniform_writes_staging_bytes() {
        let mut backend = RecordingBackend::new();
        let mut program = ShaderProgram::new(&mut backend, &descriptor()).unwrap();
        let m = Mat4::from_translation(glam::Vec3::new(1.0, 2.0, 3.0));
        program.set_uniform_value("u_model", UniformValue::Mat4(m));
        assert_eq!(&program.staging[64..128], bytemuck::bytes_of(&m));
    }

    #[test]
    fn bind_allocates_one_buffer_per_draw() {
        let mut backend = RecordingBackend::new();
        let mut program = ShaderProgram::new(&mut backend, &descriptor()).unwrap();
        let (view, sampler) = backend.dummy_texture_binding();
        program.set_texture(0, view, sampler);

        program.begin_frame();
        program.bind(&mut backend).unwrap();
        program.bind(&mut backend).unwrap();
        assert_eq!(program.draw_buffers.len(), 2);

        // The next frame reuses the pool instead of growing it.
        program.begin_frame();
        program.bind(&mut backend).unwrap();
        program.bind(&mut backend).unwrap();
        assert_eq!(program.draw_buffers.len(), 2);
    }

    #[test]
    fn texture_bind_group_is_cached_until_changed() {
        let mut backend = RecordingBackend::new();
        let mut program = ShaderProgram::new(&mut backend, &descriptor()).unwrap();
        let (view, sampler) = backend.dummy_texture_binding();
        program.set_texture(0, view, sampler);

        program.begin_frame();
        program.bind(&mut backend).unwrap();
        let first = program.texture_bind_group;
        program.bind(&mut backend).unwrap();
        assert_eq!(program.texture_bind_group, first);

        let (view2, sampler2) = backend.dummy_texture_binding();
        program.set_texture(0, view2, sampler2);
        program.bind(&mut backend).unwrap();
        assert_ne!(program.texture_bind_group, first);
    }
}
