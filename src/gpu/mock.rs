//! In-memory GPU used by tests.
//!
//! Records every texture and mesh buffer it is asked to create so tests can
//! assert on formats, sizes and lifetimes without a graphics adapter.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::{
    GpuDevice, GpuError, GpuResult, MeshBufferHandle, PixelFormat, SamplerSettings,
    TextureDescriptor, TextureHandle,
};

#[derive(Clone, Debug, PartialEq)]
pub struct MockTexture {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub mip_levels: u32,
    pub sampler: SamplerSettings,
    pub pixels: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MockMeshBuffers {
    pub label: String,
    pub vertex_bytes: usize,
    pub indices: Vec<u32>,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u32,
    textures: HashMap<TextureHandle, MockTexture>,
    mesh_buffers: HashMap<MeshBufferHandle, MockMeshBuffers>,
    textures_created: usize,
    fail_textures: bool,
    fail_buffers: bool,
}

impl MockState {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Mock device; clones share state.
#[derive(Clone, Debug, Default)]
pub struct MockGpu {
    state: Rc<RefCell<MockState>>,
}

impl MockGpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following texture creation fail.
    pub fn fail_texture_creation(&self, fail: bool) {
        self.state.borrow_mut().fail_textures = fail;
    }

    /// Make every following mesh buffer creation fail.
    pub fn fail_buffer_creation(&self, fail: bool) {
        self.state.borrow_mut().fail_buffers = fail;
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<MockTexture> {
        self.state.borrow().textures.get(&handle).cloned()
    }

    pub fn mesh_buffers(&self, handle: MeshBufferHandle) -> Option<MockMeshBuffers> {
        self.state.borrow().mesh_buffers.get(&handle).cloned()
    }

    /// Textures created and not yet destroyed.
    pub fn live_textures(&self) -> usize {
        self.state.borrow().textures.len()
    }

    /// Textures ever created, including destroyed ones.
    pub fn textures_created(&self) -> usize {
        self.state.borrow().textures_created
    }

    pub fn live_mesh_buffers(&self) -> usize {
        self.state.borrow().mesh_buffers.len()
    }
}

impl GpuDevice for MockGpu {
    fn create_texture(&self, desc: &TextureDescriptor, pixels: &[u8]) -> GpuResult<TextureHandle> {
        let mut state = self.state.borrow_mut();
        if state.fail_textures {
            return Err(GpuError::TextureCreationFailed(desc.label.to_string()));
        }
        if desc.width == 0 || desc.height == 0 {
            return Err(GpuError::InvalidDimensions {
                width: desc.width,
                height: desc.height,
            });
        }
        let expected = desc.base_level_len();
        if pixels.len() != expected {
            return Err(GpuError::InvalidDataSize {
                expected,
                actual: pixels.len(),
            });
        }

        let id = state.next_id();
        let handle = TextureHandle::new(id)
            .ok_or_else(|| GpuError::TextureCreationFailed(desc.label.to_string()))?;
        state.textures.insert(
            handle,
            MockTexture {
                label: desc.label.to_string(),
                width: desc.width,
                height: desc.height,
                format: desc.format,
                mip_levels: desc.mip_levels,
                sampler: desc.sampler,
                pixels: pixels.to_vec(),
            },
        );
        state.textures_created += 1;
        Ok(handle)
    }

    fn destroy_texture(&self, texture: TextureHandle) {
        if self.state.borrow_mut().textures.remove(&texture).is_none() {
            log::warn!("mock texture {} destroyed twice", texture.raw());
        }
    }

    fn create_mesh_buffers(
        &self,
        label: &str,
        vertices: &[u8],
        indices: &[u32],
    ) -> GpuResult<MeshBufferHandle> {
        let mut state = self.state.borrow_mut();
        if state.fail_buffers {
            return Err(GpuError::BufferCreationFailed(label.to_string()));
        }
        let id = state.next_id();
        let handle = MeshBufferHandle::new(id)
            .ok_or_else(|| GpuError::BufferCreationFailed(label.to_string()))?;
        state.mesh_buffers.insert(
            handle,
            MockMeshBuffers {
                label: label.to_string(),
                vertex_bytes: vertices.len(),
                indices: indices.to_vec(),
            },
        );
        Ok(handle)
    }

    fn destroy_mesh_buffers(&self, buffers: MeshBufferHandle) {
        self.state.borrow_mut().mesh_buffers.remove(&buffers);
    }

    fn backend_name(&self) -> &'static str {
        "Mock"
    }
}
