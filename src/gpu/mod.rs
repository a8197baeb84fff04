//! GPU abstraction used by the loading pipeline.
//!
//! Model loading only needs to create and release textures and mesh buffers.
//! [`GpuDevice`] captures exactly that, so the same loader runs against the
//! real [`WgpuDevice`] in the viewer and against [`MockGpu`] in tests.

pub mod mock;
pub mod wgpu_device;

use std::fmt::Debug;
use std::num::NonZeroU32;

use thiserror::Error;

pub use mock::MockGpu;
pub use wgpu_device::{GpuMesh, WgpuDevice};

#[derive(Error, Debug)]
pub enum GpuError {
    #[error("texture creation failed: {0}")]
    TextureCreationFailed(String),

    #[error("buffer creation failed: {0}")]
    BufferCreationFailed(String),

    #[error("pixel data has {actual} bytes, expected {expected}")]
    InvalidDataSize { expected: usize, actual: usize },

    #[error("invalid texture dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

pub type GpuResult<T> = Result<T, GpuError>;

/// Opaque handle to a texture living on a [`GpuDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(NonZeroU32);

impl TextureHandle {
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn raw(self) -> u32 {
        self.0.get()
    }
}

/// Opaque handle to the vertex + index buffer pair of one mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshBufferHandle(NonZeroU32);

impl MeshBufferHandle {
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn raw(self) -> u32 {
        self.0.get()
    }
}

/// Upload format for 8-bit texture data, selected by the decoded channel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Single channel
    R8,
    /// Three channels, no alpha
    Rgb8,
    /// Four channels
    Rgba8,
}

impl PixelFormat {
    /// Maps 1/3/4 channels to a format. Every other count has no format.
    pub fn from_channel_count(channels: u8) -> Option<Self> {
        match channels {
            1 => Some(Self::R8),
            3 => Some(Self::Rgb8),
            4 => Some(Self::Rgba8),
            _ => None,
        }
    }

    pub fn channels(self) -> usize {
        match self {
            Self::R8 => 1,
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Sampling state attached to a texture at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerSettings {
    pub wrap: WrapMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmap_filter: FilterMode,
}

impl SamplerSettings {
    /// Repeat wrapping, linear-mipmap-linear minification, linear magnification.
    pub const MATERIAL: Self = Self {
        wrap: WrapMode::Repeat,
        mag_filter: FilterMode::Linear,
        min_filter: FilterMode::Linear,
        mipmap_filter: FilterMode::Linear,
    };
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self::MATERIAL
    }
}

/// Everything a backend needs to create a 2D texture.
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Number of mip levels including the base level.
    pub mip_levels: u32,
    pub sampler: SamplerSettings,
}

impl<'a> TextureDescriptor<'a> {
    /// Descriptor for a material texture with a complete mip chain.
    pub fn material(label: &'a str, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            label,
            width,
            height,
            format,
            mip_levels: full_mip_chain(width, height),
            sampler: SamplerSettings::MATERIAL,
        }
    }

    /// Byte length of the base level for this descriptor.
    pub fn base_level_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.channels()
    }
}

/// Number of levels down to 1x1.
pub fn full_mip_chain(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Texture and mesh-buffer creation as seen by the loader.
///
/// Implementations are cheap to clone; clones share the same device.
pub trait GpuDevice: Clone + Debug {
    /// Create a texture from tightly packed base-level pixels. The backend
    /// builds the remaining `desc.mip_levels - 1` levels itself.
    fn create_texture(&self, desc: &TextureDescriptor, pixels: &[u8]) -> GpuResult<TextureHandle>;

    fn destroy_texture(&self, texture: TextureHandle);

    /// Upload a mesh's vertex bytes and `u32` indices as one buffer pair.
    fn create_mesh_buffers(
        &self,
        label: &str,
        vertices: &[u8],
        indices: &[u32],
    ) -> GpuResult<MeshBufferHandle>;

    fn destroy_mesh_buffers(&self, buffers: MeshBufferHandle);

    fn backend_name(&self) -> &'static str;
}
