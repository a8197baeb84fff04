use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbaImage};
use wgpu::util::DeviceExt;

use super::{
    GpuDevice, GpuError, GpuResult, MeshBufferHandle, PixelFormat, TextureDescriptor,
    TextureHandle,
};
use crate::data_structures::texture::{MipLevel, Texture};

/// Vertex and index buffers of one uploaded mesh.
#[derive(Clone, Debug)]
pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
}

#[derive(Debug)]
struct Inner {
    device: wgpu::Device,
    queue: wgpu::Queue,
    next_id: Cell<u32>,
    textures: RefCell<HashMap<TextureHandle, Texture>>,
    meshes: RefCell<HashMap<MeshBufferHandle, GpuMesh>>,
}

/// [`GpuDevice`] backed by a wgpu device and queue.
///
/// Owns every texture and buffer it hands out a handle for; the renderer
/// looks them up by handle when building bind groups and issuing draws.
#[derive(Clone, Debug)]
pub struct WgpuDevice {
    inner: Rc<Inner>,
}

impl WgpuDevice {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            inner: Rc::new(Inner {
                device,
                queue,
                next_id: Cell::new(0),
                textures: RefCell::new(HashMap::new()),
                meshes: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.inner.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.inner.queue
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<Texture> {
        self.inner.textures.borrow().get(&handle).cloned()
    }

    pub fn mesh(&self, handle: MeshBufferHandle) -> Option<GpuMesh> {
        self.inner.meshes.borrow().get(&handle).cloned()
    }

    fn next_id(&self) -> u32 {
        let id = self.inner.next_id.get() + 1;
        self.inner.next_id.set(id);
        id
    }
}

/// Build the full mip chain on the CPU. RGB data is widened to RGBA because
/// wgpu has no three-channel 8-bit format.
fn build_mip_chain(desc: &TextureDescriptor, pixels: &[u8]) -> GpuResult<Vec<MipLevel>> {
    let (width, height) = (desc.width, desc.height);
    let size_error = || GpuError::InvalidDataSize {
        expected: desc.base_level_len(),
        actual: pixels.len(),
    };

    let mut levels = Vec::with_capacity(desc.mip_levels as usize);
    match desc.format {
        PixelFormat::R8 => {
            let base = GrayImage::from_raw(width, height, pixels.to_vec()).ok_or_else(size_error)?;
            for level in 1..desc.mip_levels {
                let (w, h) = level_size(width, height, level);
                levels.push(imageops::resize(&base, w, h, FilterType::Triangle).into_raw());
            }
            levels.insert(0, base.into_raw());
        }
        PixelFormat::Rgb8 | PixelFormat::Rgba8 => {
            let rgba = if desc.format == PixelFormat::Rgb8 {
                if pixels.len() != desc.base_level_len() {
                    return Err(size_error());
                }
                pixels
                    .chunks_exact(3)
                    .flat_map(|p| [p[0], p[1], p[2], 255])
                    .collect()
            } else {
                pixels.to_vec()
            };
            let base = RgbaImage::from_raw(width, height, rgba).ok_or_else(size_error)?;
            for level in 1..desc.mip_levels {
                let (w, h) = level_size(width, height, level);
                levels.push(imageops::resize(&base, w, h, FilterType::Triangle).into_raw());
            }
            levels.insert(0, base.into_raw());
        }
    }

    Ok(levels
        .into_iter()
        .enumerate()
        .map(|(level, data)| {
            let (width, height) = level_size(width, height, level as u32);
            MipLevel {
                width,
                height,
                data,
            }
        })
        .collect())
}

fn level_size(width: u32, height: u32, level: u32) -> (u32, u32) {
    ((width >> level).max(1), (height >> level).max(1))
}

impl GpuDevice for WgpuDevice {
    fn create_texture(&self, desc: &TextureDescriptor, pixels: &[u8]) -> GpuResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(GpuError::InvalidDimensions {
                width: desc.width,
                height: desc.height,
            });
        }
        let limit = self.inner.device.limits().max_texture_dimension_2d;
        if desc.width > limit || desc.height > limit {
            return Err(GpuError::TextureCreationFailed(format!(
                "{} is {}x{}, device limit is {}",
                desc.label, desc.width, desc.height, limit
            )));
        }

        let levels = build_mip_chain(desc, pixels)?;
        let format = match desc.format {
            PixelFormat::R8 => wgpu::TextureFormat::R8Unorm,
            PixelFormat::Rgb8 | PixelFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        };
        let texture = Texture::from_mip_levels(
            &self.inner.device,
            &self.inner.queue,
            desc.label,
            format,
            &levels,
            &desc.sampler,
        );

        let handle = TextureHandle::new(self.next_id())
            .ok_or_else(|| GpuError::TextureCreationFailed(desc.label.to_string()))?;
        self.inner.textures.borrow_mut().insert(handle, texture);
        Ok(handle)
    }

    fn destroy_texture(&self, texture: TextureHandle) {
        if let Some(texture) = self.inner.textures.borrow_mut().remove(&texture) {
            texture.texture.destroy();
        }
    }

    fn create_mesh_buffers(
        &self,
        label: &str,
        vertices: &[u8],
        indices: &[u32],
    ) -> GpuResult<MeshBufferHandle> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(GpuError::BufferCreationFailed(format!(
                "{label} has no geometry"
            )));
        }
        let device = &self.inner.device;
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Vertex Buffer", label)),
            contents: vertices,
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Index Buffer", label)),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let handle = MeshBufferHandle::new(self.next_id())
            .ok_or_else(|| GpuError::BufferCreationFailed(label.to_string()))?;
        self.inner.meshes.borrow_mut().insert(
            handle,
            GpuMesh {
                vertex_buffer,
                index_buffer,
                num_elements: indices.len() as u32,
            },
        );
        Ok(handle)
    }

    fn destroy_mesh_buffers(&self, buffers: MeshBufferHandle) {
        if let Some(mesh) = self.inner.meshes.borrow_mut().remove(&buffers) {
            mesh.vertex_buffer.destroy();
            mesh.index_buffer.destroy();
        }
    }

    fn backend_name(&self) -> &'static str {
        "wgpu"
    }
}
