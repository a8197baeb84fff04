//! Scene uniform: point lights, model transform and the material constants
//! used for slots without a texture.

use cgmath::{Matrix, Matrix4, SquareMatrix};
use wgpu::util::DeviceExt;

use crate::config::{MAX_LIGHTS, ViewerConfig};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    position: [f32; 3],
    // Due to uniforms requiring 16 byte (4 float) spacing, we need to use a padding field here
    _padding: u32,
    color: [f32; 3],
    _padding2: u32,
}

impl LightUniform {
    pub fn new(position: [f32; 3], color: [f32; 3]) -> Self {
        Self {
            position,
            _padding: 0,
            color,
            _padding2: 0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneUniform {
    lights: [LightUniform; MAX_LIGHTS],
    model: [[f32; 4]; 4],
    normal_matrix: [[f32; 4]; 4],
    /// rgb albedo, metallic
    albedo_metallic: [f32; 4],
    roughness: f32,
    ao: f32,
    num_lights: u32,
    albedo_is_srgb: u32,
}

impl SceneUniform {
    pub fn from_config(config: &ViewerConfig) -> Self {
        let lights = config
            .lights
            .map(|light| LightUniform::new(light.position, light.color));
        let [r, g, b] = config.material.albedo;
        let mut uniform = Self {
            lights,
            model: Matrix4::<f32>::identity().into(),
            normal_matrix: Matrix4::<f32>::identity().into(),
            albedo_metallic: [r, g, b, config.material.metallic],
            roughness: config.material.roughness,
            ao: config.material.ao,
            num_lights: MAX_LIGHTS as u32,
            albedo_is_srgb: config.albedo_is_srgb as u32,
        };
        uniform.set_model(Matrix4::from_scale(config.model_scale));
        uniform
    }

    pub fn set_model(&mut self, model: Matrix4<f32>) {
        self.model = model.into();
        self.normal_matrix = model
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or(model)
            .into();
    }

    pub fn set_albedo_is_srgb(&mut self, value: bool) {
        self.albedo_is_srgb = value as u32;
    }

    pub fn albedo_is_srgb(&self) -> bool {
        self.albedo_is_srgb != 0
    }
}

#[derive(Debug)]
pub struct LightResources {
    pub uniform: SceneUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl LightResources {
    pub fn new(uniform: SceneUniform, device: &wgpu::Device) -> Self {
        let buffer = mk_buffer(device, uniform);
        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = mk_bind_group(device, &bind_group_layout, &buffer);
        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    pub fn write(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

pub fn mk_buffer(device: &wgpu::Device, uniform: SceneUniform) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Scene Uniform Buffer"),
        contents: bytemuck::cast_slice(&[uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("scene_bind_group_layout"),
    })
}

pub fn mk_bind_group(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: bind_group_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
        label: Some("scene_bind_group"),
    })
}
