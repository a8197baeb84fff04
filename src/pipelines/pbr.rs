//! Physically-based shading pipeline and per-mesh material bind groups.
//!
//! Bind groups: 0 camera, 1 scene (lights, model transform, constants),
//! 2 material. The material group holds the five slot textures at bindings
//! 0 to 4, a shared sampler at 5 and [`MaterialFlags`] at 6. Slots without a
//! texture get a flat placeholder and a cleared flag.

use wgpu::util::DeviceExt;

use crate::data_structures::model::{MaterialBindings, ModelVertex, TextureSlot, Vertex};
use crate::data_structures::texture::{self, Texture};
use crate::gpu::WgpuDevice;

const SLOT_COUNT: usize = 5;
const SAMPLER_BINDING: u32 = SLOT_COUNT as u32;
const FLAGS_BINDING: u32 = SLOT_COUNT as u32 + 1;

/// Which slots carry a texture, and whether normal mapping is on.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialFlags {
    has_albedo: u32,
    has_normal: u32,
    has_metallic: u32,
    has_roughness: u32,
    has_ao: u32,
    use_tangent_space: u32,
    _padding: [u32; 2],
}

impl From<&MaterialBindings> for MaterialFlags {
    fn from(bindings: &MaterialBindings) -> Self {
        let has = |slot| bindings.has(slot) as u32;
        Self {
            has_albedo: has(TextureSlot::Albedo),
            has_normal: has(TextureSlot::Normal),
            has_metallic: has(TextureSlot::Metallic),
            has_roughness: has(TextureSlot::Roughness),
            has_ao: has(TextureSlot::AmbientOcclusion),
            use_tangent_space: bindings.use_tangent_space as u32,
            _padding: [0; 2],
        }
    }
}

/// Bind group and flag buffer of one mesh.
#[derive(Debug)]
pub struct MaterialResources {
    pub flags: MaterialFlags,
    pub flags_buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl MaterialResources {
    /// Rewrite the flags, for example after tangent space was toggled.
    pub fn update(&mut self, queue: &wgpu::Queue, bindings: &MaterialBindings) {
        let flags = MaterialFlags::from(bindings);
        if flags != self.flags {
            self.flags = flags;
            queue.write_buffer(&self.flags_buffer, 0, bytemuck::cast_slice(&[flags]));
        }
    }
}

/// The PBR pipeline plus what every material bind group shares.
#[derive(Debug)]
pub struct PbrPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub material_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    placeholder: Texture,
}

impl PbrPipeline {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        color_format: wgpu::TextureFormat,
        camera_layout: &wgpu::BindGroupLayout,
        scene_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let material_layout = material_layout(device);
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("PBR Pipeline Layout"),
            bind_group_layouts: &[camera_layout, scene_layout, &material_layout],
            push_constant_ranges: &[],
        });
        let pipeline = create_pipeline(device, &layout, color_format);

        Self {
            pipeline,
            material_layout,
            sampler: texture::create_default_sampler(device),
            placeholder: Texture::create_flat([255, 255, 255, 255], device, queue, "placeholder"),
        }
    }

    /// Build the material bind group for `bindings`. Handles the device no
    /// longer knows about are treated as unbound.
    pub fn material(
        &self,
        gpu: &WgpuDevice,
        label: &str,
        bindings: &MaterialBindings,
    ) -> MaterialResources {
        let mut bindings = *bindings;
        let textures: Vec<Option<Texture>> = bindings
            .textures
            .iter_mut()
            .map(|slot| {
                let texture = slot.and_then(|handle| gpu.texture(handle));
                if texture.is_none() {
                    *slot = None;
                }
                texture
            })
            .collect();

        let flags = MaterialFlags::from(&bindings);
        let flags_buffer = gpu
            .device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} material flags")),
                contents: bytemuck::cast_slice(&[flags]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });

        let mut entries: Vec<wgpu::BindGroupEntry> = textures
            .iter()
            .enumerate()
            .map(|(binding, texture)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: wgpu::BindingResource::TextureView(
                    &texture.as_ref().unwrap_or(&self.placeholder).view,
                ),
            })
            .collect();
        entries.push(wgpu::BindGroupEntry {
            binding: SAMPLER_BINDING,
            resource: wgpu::BindingResource::Sampler(&self.sampler),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: FLAGS_BINDING,
            resource: flags_buffer.as_entire_binding(),
        });

        let bind_group = gpu.device().create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.material_layout,
            entries: &entries,
            label: Some(label),
        });

        MaterialResources {
            flags,
            flags_buffer,
            bind_group,
        }
    }
}

/// Depth-tested opaque triangles. Imported models are not guaranteed to wind
/// consistently, so nothing is culled.
fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    color_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("PBR Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("pbr.wgsl").into()),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some("PBR Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[ModelVertex::desc()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: Texture::DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let mut entries: Vec<wgpu::BindGroupLayoutEntry> = (0..SLOT_COUNT as u32)
        .map(|binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
            },
            count: None,
        })
        .collect();
    entries.push(wgpu::BindGroupLayoutEntry {
        binding: SAMPLER_BINDING,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    });
    entries.push(wgpu::BindGroupLayoutEntry {
        binding: FLAGS_BINDING,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    });

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &entries,
        label: Some("material_bind_group_layout"),
    })
}
