//! wgpu plumbing for the packed data textures.
//!
//! Programs are not provided for this backend; it exposes the texture
//! uploads, bind-group layout and vertex layouts a caller needs to bind a
//! [`GpuFrame`] to their own pipeline.

use log::debug;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingResource, BindingType, Device, Extent3d, Queue, ShaderStages,
    TexelCopyBufferLayout, TexelCopyTextureInfo, Texture, TextureDescriptor, TextureDimension,
    TextureFormat, TextureSampleType, TextureUsages, TextureView, TextureViewDescriptor,
    TextureViewDimension, VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode,
};

use crate::allocator::GpuFrame;
use crate::error::{Error, Result};
use crate::layout::SamplerSlot;
use crate::loader::InstanceAttributes;

/// Data texture format: one `TexelQuad` per texel.
pub const DATA_TEXTURE_FORMAT: TextureFormat = TextureFormat::Rgba32Float;

const BYTES_PER_TEXEL: u32 = 16;

/// Slots bound by [`FrameTextures::bind_group`].
pub const DATA_SLOTS: [SamplerSlot; 4] = [
    SamplerSlot::Layers,
    SamplerSlot::RenderTasks,
    SamplerSlot::PrimGeometry,
    SamplerSlot::ResourceCache,
];

const QUAD_ATTRIBUTES: [VertexAttribute; 1] = [VertexAttribute {
    format: VertexFormat::Float32x3,
    offset: 0,
    shader_location: 0,
}];

const INSTANCE_ATTRIBUTES: [VertexAttribute; 2] = [
    VertexAttribute {
        format: VertexFormat::Sint32x4,
        offset: 0,
        shader_location: 1,
    },
    VertexAttribute {
        format: VertexFormat::Sint32x4,
        offset: 16,
        shader_location: 2,
    },
];

/// Per-vertex unit-quad positions (`aPosition`).
#[must_use]
pub fn quad_buffer_layout() -> VertexBufferLayout<'static> {
    VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 3]>() as u64,
        step_mode: VertexStepMode::Vertex,
        attributes: &QUAD_ATTRIBUTES,
    }
}

/// Per-instance [`InstanceAttributes`] (`aData0`, `aData1`).
#[must_use]
pub fn instance_buffer_layout() -> VertexBufferLayout<'static> {
    VertexBufferLayout {
        array_stride: std::mem::size_of::<InstanceAttributes>() as u64,
        step_mode: VertexStepMode::Instance,
        attributes: &INSTANCE_ATTRIBUTES,
    }
}

/// Layout entry for `slot`, bound at its texture unit.
#[must_use]
pub fn bind_group_layout_entry(slot: SamplerSlot) -> BindGroupLayoutEntry {
    let view_dimension = if slot.is_array() {
        TextureViewDimension::D2Array
    } else {
        TextureViewDimension::D2
    };
    BindGroupLayoutEntry {
        binding: slot.unit(),
        visibility: ShaderStages::VERTEX_FRAGMENT,
        ty: BindingType::Texture {
            sample_type: TextureSampleType::Float {
                filterable: !slot.is_data_texture(),
            },
            view_dimension,
            multisampled: false,
        },
        count: None,
    }
}

/// Bind-group layout covering the four data textures.
#[must_use]
pub fn create_bind_group_layout(device: &Device) -> BindGroupLayout {
    let entries: Vec<BindGroupLayoutEntry> =
        DATA_SLOTS.iter().copied().map(bind_group_layout_entry).collect();
    device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("gpu-prim-cache data textures"),
        entries: &entries,
    })
}

/// The data textures of one frame, uploaded to the GPU.
#[derive(Debug)]
pub struct FrameTextures {
    textures: Vec<(SamplerSlot, Texture, TextureView)>,
}

impl FrameTextures {
    /// Create and fill one `Rgba32Float` texture per data slot.
    ///
    /// # Errors
    ///
    /// Fails if a texture dimension does not fit wgpu's `u32` sizes.
    pub fn upload(device: &Device, queue: &Queue, frame: &GpuFrame) -> Result<Self> {
        let mut textures = Vec::with_capacity(DATA_SLOTS.len());
        for (slot, data) in frame.textures() {
            let width = extent(data.width())?;
            let height = extent(data.rows())?;
            let size = Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            };
            let texture = device.create_texture(&TextureDescriptor {
                label: Some(data.label()),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: TextureDimension::D2,
                format: DATA_TEXTURE_FORMAT,
                usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
                view_formats: &[],
            });
            queue.write_texture(
                TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                data.as_bytes(),
                TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(width * BYTES_PER_TEXEL),
                    rows_per_image: Some(height),
                },
                size,
            );
            let view = texture.create_view(&TextureViewDescriptor::default());
            debug!("uploaded {} ({width}x{height})", slot.name());
            textures.push((slot, texture, view));
        }
        Ok(Self { textures })
    }

    /// View bound to `slot`, if it is a data slot.
    #[must_use]
    pub fn view(&self, slot: SamplerSlot) -> Option<&TextureView> {
        self.textures
            .iter()
            .find(|(s, ..)| *s == slot)
            .map(|(_, _, view)| view)
    }

    /// Bind group for a layout made by [`create_bind_group_layout`].
    #[must_use]
    pub fn bind_group(&self, device: &Device, layout: &BindGroupLayout) -> BindGroup {
        let entries: Vec<BindGroupEntry<'_>> = self
            .textures
            .iter()
            .map(|(slot, _, view)| BindGroupEntry {
                binding: slot.unit(),
                resource: BindingResource::TextureView(view),
            })
            .collect();
        device.create_bind_group(&BindGroupDescriptor {
            label: Some("gpu-prim-cache frame"),
            layout,
            entries: &entries,
        })
    }
}

fn extent(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::Gl(format!("dimension {value} exceeds u32::MAX")))
}
