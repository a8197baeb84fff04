//! Fixture builders shared by the integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use pbr_viewer::LoadOptions;
use pbr_viewer::resources::texture::AssetSearch;

pub use super::scratch::{png_bytes, write_png, write_rgb_png};
use super::scratch::{ScratchDir, rgb_png_bytes};

/// Scratch directory laid out as `<dir>/work` (the asset search root) next to
/// `<dir>/models`.
pub struct TestDir {
    scratch: ScratchDir,
}

impl TestDir {
    pub fn new(tag: &str) -> Self {
        let scratch = ScratchDir::new(tag);
        std::fs::create_dir_all(scratch.path().join("work")).unwrap();
        std::fs::create_dir_all(scratch.path().join("models")).unwrap();
        Self { scratch }
    }

    pub fn path(&self) -> &Path {
        self.scratch.path()
    }

    pub fn models(&self) -> PathBuf {
        self.path().join("models")
    }

    pub fn search(&self) -> AssetSearch {
        AssetSearch {
            root: self.path().join("work"),
            ..Default::default()
        }
    }

    pub fn options(&self) -> LoadOptions {
        LoadOptions {
            search: self.search(),
            ..Default::default()
        }
    }

    /// Put the conventional default textures under `<root>/Pbr`.
    pub fn install_default_assets(&self) {
        let search = self.search();
        let dir = search.root.join(&search.asset_dir);
        for name in search.names.all() {
            write_png(&dir.join(name), 2, 2, 4);
        }
    }
}

/// A single right triangle in the XY plane.
const POSITIONS: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
const NORMALS: [[f32; 3]; 3] = [[0.0, 0.0, 1.0]; 3];
const UVS: [[f32; 2]; 3] = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
const TANGENTS: [[f32; 4]; 3] = [[1.0, 0.0, 0.0, 1.0]; 3];

/// Which optional attributes a triangle mesh carries.
#[derive(Debug, Clone, Copy)]
pub struct Attributes {
    pub normals: bool,
    pub uvs: bool,
    pub tangents: bool,
}

impl Attributes {
    pub const POSITIONS_ONLY: Self = Self {
        normals: false,
        uvs: false,
        tangents: false,
    };
    pub const TEXTURED: Self = Self {
        normals: true,
        uvs: true,
        tangents: false,
    };
    pub const FULL: Self = Self {
        normals: true,
        uvs: true,
        tangents: true,
    };
}

/// Builds small glTF documents around one shared binary buffer.
#[derive(Debug, Default)]
pub struct GltfBuilder {
    bin: Vec<u8>,
    buffer_views: Vec<String>,
    accessors: Vec<String>,
    meshes: Vec<String>,
    materials: Vec<String>,
    textures: Vec<String>,
    images: Vec<String>,
    nodes: Vec<String>,
    scene_nodes: Vec<usize>,
}

impl GltfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_view(&mut self, bytes: &[u8]) -> usize {
        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }
        self.buffer_views.push(format!(
            r#"{{"buffer": 0, "byteOffset": {}, "byteLength": {}}}"#,
            self.bin.len(),
            bytes.len()
        ));
        self.bin.extend_from_slice(bytes);
        self.buffer_views.len() - 1
    }

    fn push_accessor(&mut self, bytes: &[u8], kind: &str, extra: &str) -> usize {
        let view = self.push_view(bytes);
        self.accessors.push(format!(
            r#"{{"bufferView": {view}, "componentType": 5126, "count": 3, "type": "{kind}"{extra}}}"#
        ));
        self.accessors.len() - 1
    }

    /// Add a one-triangle mesh, returning its mesh index.
    pub fn triangle(&mut self, attributes: Attributes, material: Option<usize>) -> usize {
        let position = self.push_accessor(
            bytemuck::cast_slice(&POSITIONS),
            "VEC3",
            r#", "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]"#,
        );
        let mut fields = vec![format!(r#""POSITION": {position}"#)];
        if attributes.normals {
            let normal = self.push_accessor(bytemuck::cast_slice(&NORMALS), "VEC3", "");
            fields.push(format!(r#""NORMAL": {normal}"#));
        }
        if attributes.uvs {
            let uv = self.push_accessor(bytemuck::cast_slice(&UVS), "VEC2", "");
            fields.push(format!(r#""TEXCOORD_0": {uv}"#));
        }
        if attributes.tangents {
            let tangent = self.push_accessor(bytemuck::cast_slice(&TANGENTS), "VEC4", "");
            fields.push(format!(r#""TANGENT": {tangent}"#));
        }
        let material = material
            .map(|index| format!(r#", "material": {index}"#))
            .unwrap_or_default();
        self.meshes.push(format!(
            r#"{{"name": "tri{}", "primitives": [{{"attributes": {{{}}}{material}}}]}}"#,
            self.meshes.len(),
            fields.join(", ")
        ));
        self.meshes.len() - 1
    }

    /// Texture backed by an external image file, returning the texture index.
    pub fn image_uri(&mut self, uri: &str) -> usize {
        self.images.push(format!(r#"{{"uri": "{uri}"}}"#));
        self.texture_for_last_image()
    }

    /// Texture whose PNG bytes live in the binary buffer.
    pub fn embedded_png(&mut self, width: u32, height: u32, channels: u8) -> usize {
        let view = self.push_view(&png_bytes(width, height, channels));
        self.images
            .push(format!(r#"{{"bufferView": {view}, "mimeType": "image/png"}}"#));
        self.texture_for_last_image()
    }

    /// Embedded RGB texture filled with one colour.
    pub fn embedded_rgb_png(&mut self, width: u32, height: u32, rgb: [u8; 3]) -> usize {
        let view = self.push_view(&rgb_png_bytes(width, height, rgb));
        self.images
            .push(format!(r#"{{"bufferView": {view}, "mimeType": "image/png"}}"#));
        self.texture_for_last_image()
    }

    /// Material with a packed metallic-roughness texture.
    pub fn metallic_roughness_material(&mut self, texture: usize) -> usize {
        self.material(&format!(
            r#""pbrMetallicRoughness": {{"metallicRoughnessTexture": {{"index": {texture}}}}}"#
        ))
    }

    fn texture_for_last_image(&mut self) -> usize {
        self.textures
            .push(format!(r#"{{"source": {}}}"#, self.images.len() - 1));
        self.textures.len() - 1
    }

    /// Add a material from raw glTF material fields, e.g.
    /// `"normalTexture": {"index": 0}`.
    pub fn material(&mut self, fields: &str) -> usize {
        let separator = if fields.is_empty() { "" } else { ", " };
        self.materials.push(format!(
            r#"{{"name": "mat{}"{separator}{fields}}}"#,
            self.materials.len()
        ));
        self.materials.len() - 1
    }

    /// Material with a base colour texture.
    pub fn base_color_material(&mut self, texture: usize) -> usize {
        self.material(&format!(
            r#""pbrMetallicRoughness": {{"baseColorTexture": {{"index": {texture}}}}}"#
        ))
    }

    pub fn node(&mut self, mesh: Option<usize>, children: &[usize]) -> usize {
        let mut fields = vec![format!(r#""name": "node{}""#, self.nodes.len())];
        if let Some(mesh) = mesh {
            fields.push(format!(r#""mesh": {mesh}"#));
        }
        if !children.is_empty() {
            fields.push(format!(r#""children": {children:?}"#));
        }
        self.nodes.push(format!("{{{}}}", fields.join(", ")));
        self.nodes.len() - 1
    }

    pub fn scene(&mut self, roots: &[usize]) {
        self.scene_nodes = roots.to_vec();
    }

    fn json(&self, buffer_uri: Option<&str>) -> String {
        let uri = buffer_uri
            .map(|uri| format!(r#""uri": "{uri}", "#))
            .unwrap_or_default();
        let mut sections = vec![
            r#""asset": {"version": "2.0"}"#.to_string(),
            format!(r#""buffers": [{{{uri}"byteLength": {}}}]"#, self.bin.len()),
            format!(r#""bufferViews": [{}]"#, self.buffer_views.join(", ")),
            format!(r#""accessors": [{}]"#, self.accessors.join(", ")),
            format!(r#""meshes": [{}]"#, self.meshes.join(", ")),
            format!(r#""nodes": [{}]"#, self.nodes.join(", ")),
            format!(r#""scenes": [{{"nodes": {:?}}}]"#, self.scene_nodes),
            r#""scene": 0"#.to_string(),
        ];
        for (key, items) in [
            ("materials", &self.materials),
            ("textures", &self.textures),
            ("images", &self.images),
        ] {
            if !items.is_empty() {
                sections.push(format!(r#""{key}": [{}]"#, items.join(", ")));
            }
        }
        format!("{{{}}}", sections.join(",\n"))
    }

    /// Write `<dir>/<name>.gltf` with its buffer in `<dir>/<name>.bin`.
    pub fn write_gltf(&self, dir: &Path, name: &str) -> PathBuf {
        let bin_name = format!("{name}.bin");
        std::fs::write(dir.join(&bin_name), &self.bin).unwrap();
        let path = dir.join(format!("{name}.gltf"));
        std::fs::write(&path, self.json(Some(&bin_name))).unwrap();
        path
    }

    /// Write a binary `<dir>/<name>.glb`.
    pub fn write_glb(&self, dir: &Path, name: &str) -> PathBuf {
        let mut json = self.json(None).into_bytes();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let mut bin = self.bin.clone();
        while bin.len() % 4 != 0 {
            bin.push(0);
        }
        let total = 12 + 8 + json.len() + 8 + bin.len();

        let mut glb = Vec::with_capacity(total);
        glb.extend_from_slice(b"glTF");
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&(total as u32).to_le_bytes());
        glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"JSON");
        glb.extend_from_slice(&json);
        glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"BIN\0");
        glb.extend_from_slice(&bin);

        let path = dir.join(format!("{name}.glb"));
        std::fs::write(&path, glb).unwrap();
        path
    }
}

/// Two quads, one triangle each side, sharing a single diffuse map.
pub const TWO_QUADS_OBJ: &str = "\
mtllib scene.mtl
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
o first
usemtl painted
f 1/1/1 2/2/1 3/3/1 4/4/1
o second
usemtl painted
f 4/4/1 3/3/1 2/2/1 1/1/1
";

pub const TWO_QUADS_MTL: &str = "\
newmtl painted
Kd 1 1 1
map_Kd tex/wood_diffuse.png
";

pub fn write_obj(dir: &Path, name: &str, obj: &str, mtl: Option<(&str, &str)>) -> PathBuf {
    if let Some((mtl_name, mtl)) = mtl {
        std::fs::write(dir.join(mtl_name), mtl).unwrap();
    }
    let path = dir.join(name);
    std::fs::write(&path, obj).unwrap();
    path
}
