//! Imported scene graph.
//!
//! Importers produce an [`ImportedScene`]: an arena of nodes addressed by
//! [`NodeId`], a flat table of raw meshes and a table of materials. Nodes
//! refer to meshes by index, so one mesh may be instanced by several nodes.
//! [`traverse`] walks the arena in pre-order to decide mesh assembly order.

use std::collections::HashMap;

use cgmath::{Matrix4, SquareMatrix};
use thiserror::Error;

use crate::resources::import::ImportError;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("no scene could be imported from {path}")]
    NoScene {
        path: String,
        #[source]
        source: ImportError,
    },

    #[error("imported scene is incomplete")]
    Incomplete,

    #[error("imported scene has no root node")]
    NoRootNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneFlags {
    /// Set by an importer when it could not produce a usable scene.
    pub incomplete: bool,
}

/// Material channels an importer can report texture references for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureChannel {
    Diffuse,
    Specular,
    Ambient,
    Emissive,
    Height,
    Normals,
    Shininess,
    Opacity,
    Displacement,
    Lightmap,
    Metalness,
    DiffuseRoughness,
}

/// Per-channel ordered lists of texture reference strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedMaterial {
    pub name: String,
    pub textures: HashMap<TextureChannel, Vec<String>>,
}

impl ImportedMaterial {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            textures: HashMap::new(),
        }
    }

    pub fn add_texture(&mut self, channel: TextureChannel, reference: impl Into<String>) {
        self.textures
            .entry(channel)
            .or_default()
            .push(reference.into());
    }

    pub fn with_texture(mut self, channel: TextureChannel, reference: impl Into<String>) -> Self {
        self.add_texture(channel, reference);
        self
    }

    pub fn texture_count(&self, channel: TextureChannel) -> usize {
        self.textures.get(&channel).map_or(0, Vec::len)
    }

    pub fn texture(&self, channel: TextureChannel, index: usize) -> Option<&str> {
        self.textures
            .get(&channel)
            .and_then(|refs| refs.get(index))
            .map(String::as_str)
    }
}

/// Raw per-vertex arrays of one mesh, before assembly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    /// First UV channel only.
    pub tex_coords: Option<Vec<[f32; 2]>>,
    pub tangents: Option<Vec<[f32; 3]>>,
    pub bitangents: Option<Vec<[f32; 3]>>,
    /// Polygons as vertex index lists; triangles after post-processing.
    pub faces: Vec<Vec<u32>>,
    /// Index into [`ImportedScene::materials`].
    pub material: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedNode {
    pub name: String,
    pub transform: Matrix4<f32>,
    pub meshes: Vec<usize>,
    pub children: Vec<NodeId>,
}

impl ImportedNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Matrix4::identity(),
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// Image bytes stored inside the model file, referenced as `*N`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedTexture {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

impl EmbeddedTexture {
    /// Decode with the declared MIME type, guessing from the bytes when it is
    /// missing or unknown.
    pub fn decode(&self) -> image::ImageResult<image::DynamicImage> {
        match self.mime_type.as_deref().and_then(image::ImageFormat::from_mime_type) {
            Some(format) => image::load_from_memory_with_format(&self.bytes, format),
            None => image::load_from_memory(&self.bytes),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedScene {
    pub flags: SceneFlags,
    pub nodes: Vec<ImportedNode>,
    pub root: Option<NodeId>,
    pub meshes: Vec<ImportedMesh>,
    pub materials: Vec<ImportedMaterial>,
    pub embedded_textures: Vec<EmbeddedTexture>,
}

impl ImportedScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: ImportedNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Append `child` to `parent`'s children. Unknown parents are ignored.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(parent.0) {
            node.children.push(child);
        }
    }

    pub fn add_mesh(&mut self, mesh: ImportedMesh) -> usize {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    pub fn add_material(&mut self, material: ImportedMaterial) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn node(&self, id: NodeId) -> Option<&ImportedNode> {
        self.nodes.get(id.0)
    }

    pub fn root_node(&self) -> Option<&ImportedNode> {
        self.root.and_then(|id| self.node(id))
    }

    /// Resolve a `*N` reference to the N-th embedded texture.
    pub fn embedded(&self, reference: &str) -> Option<&EmbeddedTexture> {
        embedded_index(reference).and_then(|index| self.embedded_textures.get(index))
    }
}

/// Parse the index out of a `*N` embedded-texture reference.
pub fn embedded_index(reference: &str) -> Option<usize> {
    reference.strip_prefix('*')?.parse().ok()
}

/// Mesh indices in pre-order: a node's own meshes in listed order, then each
/// child subtree in listed order.
///
/// Fails if the scene is flagged incomplete or has no root. Mesh or node
/// references outside the arena, and nodes reached a second time, are skipped.
pub fn traverse(scene: &ImportedScene) -> Result<Vec<usize>, LoadError> {
    if scene.flags.incomplete {
        return Err(LoadError::Incomplete);
    }
    let root = match scene.root {
        Some(root) if scene.node(root).is_some() => root,
        _ => return Err(LoadError::NoRootNode),
    };

    let mut order = Vec::new();
    let mut visited = vec![false; scene.nodes.len()];
    let mut stack = vec![root];

    while let Some(id) = stack.pop() {
        let Some(node) = scene.node(id) else {
            log::warn!("node {} referenced but not present, skipping", id.0);
            continue;
        };
        if std::mem::replace(&mut visited[id.0], true) {
            log::warn!("node {:?} reached twice, skipping", node.name);
            continue;
        }

        for &mesh in &node.meshes {
            if mesh < scene.meshes.len() {
                order.push(mesh);
            } else {
                log::warn!("node {:?} references missing mesh {}", node.name, mesh);
            }
        }
        // Reversed so the first child is popped first.
        stack.extend(node.children.iter().rev().copied());
    }

    Ok(order)
}
