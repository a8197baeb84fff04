//! Loaded model data: vertices, meshes, texture references and the model that
//! owns them.

use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::gpu::{GpuDevice, MeshBufferHandle, TextureHandle};
use crate::resources::cache::TextureCache;
use crate::resources::defaults::DefaultTextures;

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

/// Per-vertex data as uploaded to the GPU.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 11]>() as wgpu::BufferAddress,
                    shader_location: 4,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Role a texture plays in a PBR material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Albedo,
    /// Loaded and listed but never bound for rendering.
    Specular,
    Normal,
    Metallic,
    Roughness,
    AmbientOcclusion,
}

impl TextureSlot {
    /// The five slots that are bound for rendering, in texture-unit order.
    pub const BOUND: [TextureSlot; 5] = [
        TextureSlot::Albedo,
        TextureSlot::Normal,
        TextureSlot::Metallic,
        TextureSlot::Roughness,
        TextureSlot::AmbientOcclusion,
    ];

    /// Texture unit the slot is bound to, `None` for auxiliary slots.
    pub fn binding_index(self) -> Option<usize> {
        match self {
            TextureSlot::Albedo => Some(0),
            TextureSlot::Normal => Some(1),
            TextureSlot::Metallic => Some(2),
            TextureSlot::Roughness => Some(3),
            TextureSlot::AmbientOcclusion => Some(4),
            TextureSlot::Specular => None,
        }
    }

    pub fn shader_name(self) -> &'static str {
        match self {
            TextureSlot::Albedo => "texture_albedo",
            TextureSlot::Specular => "texture_specular",
            TextureSlot::Normal => "texture_normal",
            TextureSlot::Metallic => "texture_metallic",
            TextureSlot::Roughness => "texture_roughness",
            TextureSlot::AmbientOcclusion => "texture_ao",
        }
    }
}

impl fmt::Display for TextureSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.shader_name())
    }
}

/// A texture resolved for one reference string.
///
/// `handle` is `None` when the reference could not be found. The slot is the
/// one the reference was first requested for; later requests for the same
/// string share this value unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureRef {
    pub handle: Option<TextureHandle>,
    pub slot: TextureSlot,
    pub path: String,
}

impl TextureRef {
    pub fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }
}

/// Per-draw material state derived from a mesh's texture list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterialBindings {
    /// Indexed by [`TextureSlot::binding_index`].
    pub textures: [Option<TextureHandle>; 5],
    pub use_tangent_space: bool,
}

impl MaterialBindings {
    pub fn has(&self, slot: TextureSlot) -> bool {
        slot.binding_index()
            .is_some_and(|index| self.textures[index].is_some())
    }

    pub fn get(&self, slot: TextureSlot) -> Option<TextureHandle> {
        slot.binding_index().and_then(|index| self.textures[index])
    }
}

#[derive(Debug)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<ModelVertex>,
    /// Flattened triangle list; every entry is `< vertices.len()`.
    pub indices: Vec<u32>,
    pub textures: Vec<Rc<TextureRef>>,
    pub has_tangent_space: bool,
    pub buffers: Option<MeshBufferHandle>,
}

impl Mesh {
    /// Resolve which texture is bound to each unit for a draw.
    ///
    /// Textures are applied in list order, so a later texture with the same
    /// slot replaces an earlier one. Tangent space is used only when it was
    /// requested and the mesh carries tangent data.
    pub fn bindings(&self, tangent_space_requested: bool) -> MaterialBindings {
        let mut bindings = MaterialBindings {
            use_tangent_space: tangent_space_requested && self.has_tangent_space,
            ..Default::default()
        };
        for texture in &self.textures {
            if let (Some(index), Some(handle)) = (texture.slot.binding_index(), texture.handle) {
                bindings.textures[index] = Some(handle);
            }
        }
        bindings
    }
}

/// Everything loaded from one model file.
///
/// Owns the GPU resources of its meshes and of its texture cache and releases
/// them on drop. Default textures belong to the shared provider instead; the
/// model only keeps it alive.
pub struct Model<G: GpuDevice> {
    pub meshes: Vec<Mesh>,
    pub textures: TextureCache,
    pub directory: PathBuf,
    pub defaults: Option<Rc<DefaultTextures<G>>>,
    gpu: G,
}

impl<G: GpuDevice> Model<G> {
    pub fn new(
        gpu: G,
        directory: PathBuf,
        meshes: Vec<Mesh>,
        textures: TextureCache,
        defaults: Option<Rc<DefaultTextures<G>>>,
    ) -> Self {
        Self {
            meshes,
            textures,
            directory,
            defaults,
            gpu,
        }
    }

    /// A model with no meshes, returned when loading fails.
    pub fn empty(gpu: G, directory: PathBuf, defaults: Option<Rc<DefaultTextures<G>>>) -> Self {
        Self::new(gpu, directory, Vec::new(), TextureCache::new(), defaults)
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl<G: GpuDevice> fmt::Debug for Model<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("meshes", &self.meshes.len())
            .field("textures", &self.textures.len())
            .field("directory", &self.directory)
            .field("backend", &self.gpu.backend_name())
            .finish()
    }
}

impl<G: GpuDevice> Drop for Model<G> {
    fn drop(&mut self) {
        for mesh in &mut self.meshes {
            if let Some(buffers) = mesh.buffers.take() {
                self.gpu.destroy_mesh_buffers(buffers);
            }
        }
        for handle in self.textures.drain_handles() {
            self.gpu.destroy_texture(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tex(raw: u32, slot: TextureSlot) -> Rc<TextureRef> {
        Rc::new(TextureRef {
            handle: TextureHandle::new(raw),
            slot,
            path: format!("{raw}.png"),
        })
    }

    fn mesh(textures: Vec<Rc<TextureRef>>, has_tangent_space: bool) -> Mesh {
        Mesh {
            name: "m".into(),
            vertices: vec![ModelVertex::default(); 3],
            indices: vec![0, 1, 2],
            textures,
            has_tangent_space,
            buffers: None,
        }
    }

    #[test]
    fn vertex_layout_matches_struct() {
        let desc = ModelVertex::desc();
        assert_eq!(desc.array_stride, 56);
        assert_eq!(desc.attributes.len(), 5);
        assert_eq!(desc.attributes[4].offset, 44);
    }

    #[test]
    fn bindings_follow_slot_tags() {
        let m = mesh(
            vec![
                tex(1, TextureSlot::Albedo),
                tex(2, TextureSlot::Specular),
                tex(3, TextureSlot::Roughness),
            ],
            true,
        );
        let b = m.bindings(true);
        assert_eq!(b.get(TextureSlot::Albedo), TextureHandle::new(1));
        assert!(!b.has(TextureSlot::Specular));
        assert!(!b.has(TextureSlot::Metallic));
        assert!(b.has(TextureSlot::Roughness));
        assert!(b.use_tangent_space);
    }

    #[test]
    fn later_texture_replaces_earlier_in_same_slot() {
        let m = mesh(
            vec![tex(1, TextureSlot::Albedo), tex(5, TextureSlot::Albedo)],
            false,
        );
        assert_eq!(m.bindings(true).get(TextureSlot::Albedo), TextureHandle::new(5));
    }

    #[test]
    fn tangent_space_needs_mesh_support() {
        let m = mesh(vec![], false);
        assert!(!m.bindings(true).use_tangent_space);
        let m = mesh(vec![], true);
        assert!(!m.bindings(false).use_tangent_space);
    }

    #[test]
    fn absent_textures_are_not_bound() {
        let absent = Rc::new(TextureRef {
            handle: None,
            slot: TextureSlot::Normal,
            path: "missing.png".into(),
        });
        let m = mesh(vec![absent], true);
        assert_eq!(m.bindings(true), MaterialBindings {
            textures: [None; 5],
            use_tangent_space: true,
        });
    }

    #[test]
    fn slot_names() {
        assert_eq!(TextureSlot::AmbientOcclusion.to_string(), "texture_ao");
        assert_eq!(TextureSlot::Specular.binding_index(), None);
        let units: Vec<_> = TextureSlot::BOUND
            .iter()
            .filter_map(|s| s.binding_index())
            .collect();
        assert_eq!(units, vec![0, 1, 2, 3, 4]);
    }
}
