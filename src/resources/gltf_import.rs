//! glTF 2.0 importer (`.gltf` with external or embedded buffers, `.glb`).

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use cgmath::{Matrix4, Vector3, Vector4};

use crate::data_structures::scene_graph::{
    EmbeddedTexture, ImportedMaterial, ImportedMesh, ImportedNode, ImportedScene, NodeId,
    TextureChannel,
};
use crate::resources::import::ImportError;

pub fn import(path: &Path) -> Result<ImportedScene, ImportError> {
    let bytes = std::fs::read(path).map_err(|source| ImportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let gltf = gltf::Gltf::from_slice(&bytes)?;
    let directory = path.parent().unwrap_or(Path::new("."));

    // Load buffers
    let mut buffer_data: Vec<Vec<u8>> = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                buffer_data.push(gltf.blob.clone().unwrap_or_default());
            }
            gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => {
                log::warn!("buffer {} uses a data URI, which is not supported", buffer.index());
                buffer_data.push(Vec::new());
            }
            gltf::buffer::Source::Uri(uri) => {
                let buffer_path = directory.join(uri);
                let bin = std::fs::read(&buffer_path).map_err(|source| ImportError::Io {
                    path: buffer_path.display().to_string(),
                    source,
                })?;
                buffer_data.push(bin);
            }
        }
    }

    let mut scene = ImportedScene::new();

    // Images stored in buffer views become embedded textures, referenced as `*N`.
    let mut image_refs: HashMap<usize, String> = HashMap::new();
    for image in gltf.images() {
        match image.source() {
            gltf::image::Source::View { view, mime_type } => {
                let start = view.offset();
                let end = start + view.length();
                match buffer_data.get(view.buffer().index()).and_then(|b| b.get(start..end)) {
                    Some(bytes) => {
                        image_refs.insert(image.index(), format!("*{}", scene.embedded_textures.len()));
                        scene.embedded_textures.push(EmbeddedTexture {
                            bytes: bytes.to_vec(),
                            mime_type: Some(mime_type.to_string()),
                        });
                    }
                    None => log::warn!("image {} points outside its buffer", image.index()),
                }
            }
            gltf::image::Source::Uri { uri, .. } if uri.starts_with("data:") => {
                log::warn!("image {} uses a data URI, which is not supported", image.index());
            }
            gltf::image::Source::Uri { uri, .. } => {
                image_refs.insert(image.index(), uri.to_string());
            }
        }
    }

    // Load materials
    let mut split_images: HashMap<usize, Option<(String, String)>> = HashMap::new();
    for material in gltf.materials() {
        let mut imported = ImportedMaterial::new(material.name().unwrap_or("material"));
        let reference = |texture: gltf::Texture| image_refs.get(&texture.source().index()).cloned();
        let pbr = material.pbr_metallic_roughness();
        if let Some(diffuse) = pbr.base_color_texture().and_then(|info| reference(info.texture())) {
            imported.add_texture(TextureChannel::Diffuse, diffuse);
        }
        if let Some(info) = pbr.metallic_roughness_texture() {
            let image = info.texture().source().index();
            let split = match split_images.get(&image) {
                Some(split) => split.clone(),
                None => {
                    let split = image_refs
                        .get(&image)
                        .and_then(|packed| split_metallic_roughness(&mut scene, directory, packed));
                    split_images.insert(image, split.clone());
                    split
                }
            };
            if let Some((metalness, roughness)) = split {
                imported.add_texture(TextureChannel::Metalness, metalness);
                imported.add_texture(TextureChannel::DiffuseRoughness, roughness);
            }
        }
        // Normal maps travel in the height channel, like OBJ bump maps.
        if let Some(normal) = material.normal_texture().and_then(|info| reference(info.texture())) {
            imported.add_texture(TextureChannel::Height, normal);
        }
        if let Some(occlusion) = material
            .occlusion_texture()
            .and_then(|info| reference(info.texture()))
        {
            imported.add_texture(TextureChannel::Lightmap, occlusion);
        }
        if let Some(emissive) = material
            .emissive_texture()
            .and_then(|info| reference(info.texture()))
        {
            imported.add_texture(TextureChannel::Emissive, emissive);
        }
        scene.add_material(imported);
    }
    let mut default_material = None;

    // One imported mesh per triangle primitive
    let mut mesh_primitives: Vec<Vec<usize>> = Vec::new();
    for mesh in gltf.meshes() {
        let mut primitives = Vec::new();
        let name = mesh.name().unwrap_or("unknown_mesh");
        for primitive in mesh.primitives() {
            let reader = primitive.reader(|buffer| buffer_data.get(buffer.index()).map(Vec::as_slice));

            let Some(positions) = reader.read_positions() else {
                log::warn!("primitive {} of {:?} has no positions", primitive.index(), name);
                continue;
            };
            let positions: Vec<[f32; 3]> = positions.collect();
            let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(|n| n.collect());
            // Stored bottom-left like every importer; the UV flip pass restores them.
            let tex_coords: Option<Vec<[f32; 2]>> = reader
                .read_tex_coords(0)
                .map(|v| v.into_f32().map(|[u, v]| [u, 1.0 - v]).collect());

            // GLTF represents tangents as vec4 where the 4th elem can be used to calculate the bitangent
            let (tangents, bitangents) = match (reader.read_tangents(), normals.as_ref()) {
                (Some(tangents), Some(normals)) => {
                    let (t, b): (Vec<[f32; 3]>, Vec<[f32; 3]>) = tangents
                        .zip(normals)
                        .map(|(tangent, normal)| {
                            let tangent: Vector4<f32> = tangent.into();
                            let normal: Vector3<f32> = (*normal).into();
                            let bitangent: [f32; 3] =
                                (normal.cross(tangent.truncate()) * tangent.w).into();
                            let tangent: [f32; 3] = tangent.truncate().into();
                            (tangent, bitangent)
                        })
                        .unzip();
                    (Some(t), Some(b))
                }
                _ => (None, None),
            };

            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };
            let faces = match faces(primitive.mode(), &indices) {
                Some(faces) => faces,
                None => {
                    log::warn!(
                        "primitive {} of {:?} is {:?}, only triangles are loaded",
                        primitive.index(),
                        name,
                        primitive.mode()
                    );
                    continue;
                }
            };

            let material = match primitive.material().index() {
                Some(index) => index,
                None => *default_material
                    .get_or_insert_with(|| scene.add_material(ImportedMaterial::new("default"))),
            };
            let index = scene.add_mesh(ImportedMesh {
                name: name.to_string(),
                positions,
                normals,
                tex_coords,
                tangents,
                bitangents,
                faces,
                material,
            });
            primitives.push(index);
        }
        mesh_primitives.push(primitives);
    }

    // Nodes keep their glTF indices as arena ids.
    for node in gltf.nodes() {
        let mut imported = ImportedNode::new(node.name().unwrap_or("node"));
        imported.transform = Matrix4::from(node.transform().matrix());
        if let Some(mesh) = node.mesh() {
            imported.meshes = mesh_primitives.get(mesh.index()).cloned().unwrap_or_default();
        }
        imported.children = node.children().map(|child| NodeId(child.index())).collect();
        scene.add_node(imported);
    }

    let Some(gltf_scene) = gltf.default_scene().or_else(|| gltf.scenes().next()) else {
        log::warn!("{} contains no scene", path.display());
        scene.flags.incomplete = true;
        return Ok(scene);
    };
    let roots: Vec<NodeId> = gltf_scene.nodes().map(|node| NodeId(node.index())).collect();
    scene.root = if roots.len() == 1 {
        Some(roots[0])
    } else {
        let mut root = ImportedNode::new(gltf_scene.name().unwrap_or("root"));
        root.children = roots;
        Some(scene.add_node(root))
    };

    Ok(scene)
}

/// Split a glTF metallic-roughness image (roughness in G, metalness in B)
/// into two single-channel embedded textures, returning their metalness and
/// roughness references.
fn split_metallic_roughness(
    scene: &mut ImportedScene,
    directory: &Path,
    reference: &str,
) -> Option<(String, String)> {
    let decoded = match scene.embedded(reference) {
        Some(texture) => texture.decode(),
        None => image::open(directory.join(reference)),
    };
    let packed = match decoded {
        Ok(img) => img.to_rgb8(),
        Err(e) => {
            log::warn!("metallic-roughness image {} not usable: {}", reference, e);
            return None;
        }
    };

    let mut extract = |channel: usize| -> Option<String> {
        let plane = image::GrayImage::from_fn(packed.width(), packed.height(), |x, y| {
            image::Luma([packed.get_pixel(x, y)[channel]])
        });
        let mut bytes = Cursor::new(Vec::new());
        let encoded = image::DynamicImage::ImageLuma8(plane).write_to(&mut bytes, image::ImageFormat::Png);
        if let Err(e) = encoded {
            log::warn!("could not split {}: {}", reference, e);
            return None;
        }
        let split = format!("*{}", scene.embedded_textures.len());
        scene.embedded_textures.push(EmbeddedTexture {
            bytes: bytes.into_inner(),
            mime_type: Some("image/png".to_string()),
        });
        Some(split)
    };
    let metalness = extract(2)?;
    let roughness = extract(1)?;
    Some((metalness, roughness))
}

/// Triangle faces for the triangle topologies; `None` for points and lines.
fn faces(mode: gltf::mesh::Mode, indices: &[u32]) -> Option<Vec<Vec<u32>>> {
    use gltf::mesh::Mode;
    match mode {
        Mode::Triangles => Some(indices.chunks_exact(3).map(<[u32]>::to_vec).collect()),
        Mode::TriangleStrip => Some(
            indices
                .windows(3)
                .enumerate()
                .map(|(i, w)| {
                    if i % 2 == 0 {
                        vec![w[0], w[1], w[2]]
                    } else {
                        vec![w[1], w[0], w[2]]
                    }
                })
                .collect(),
        ),
        Mode::TriangleFan => indices.split_first().map(|(&first, rest)| {
            rest.windows(2)
                .map(|w| vec![first, w[0], w[1]])
                .collect()
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::scene_graph::traverse;
    use crate::resources::test_support::ScratchDir;

    /// A minimal glTF with one triangle, positions and UVs in an external buffer.
    fn write_triangle(dir: &Path, with_texture: bool, nodes: &str, scene_nodes: &str) -> std::path::PathBuf {
        let mut bin = Vec::new();
        for p in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            for c in p {
                bin.extend_from_slice(&c.to_le_bytes());
            }
        }
        for uv in [[0.0f32, 0.0], [1.0, 0.0], [0.0, 1.0]] {
            for c in uv {
                bin.extend_from_slice(&c.to_le_bytes());
            }
        }
        std::fs::write(dir.join("tri.bin"), &bin).unwrap();

        let material = if with_texture {
            r#""materials": [{"name": "mat", "pbrMetallicRoughness": {"baseColorTexture": {"index": 0}}}],
               "textures": [{"source": 0}],
               "images": [{"uri": "albedo.png"}],"#
        } else {
            ""
        };
        let material_ref = if with_texture { r#", "material": 0"# } else { "" };
        let json = format!(
            r#"{{
  "asset": {{"version": "2.0"}},
  "scene": 0,
  "scenes": [{{"nodes": {scene_nodes}}}],
  "nodes": {nodes},
  "meshes": [{{"name": "tri", "primitives": [{{"attributes": {{"POSITION": 0, "TEXCOORD_0": 1}}{material_ref}}}]}}],
  {material}
  "buffers": [{{"uri": "tri.bin", "byteLength": 60}}],
  "bufferViews": [
    {{"buffer": 0, "byteOffset": 0, "byteLength": 36}},
    {{"buffer": 0, "byteOffset": 36, "byteLength": 24}}
  ],
  "accessors": [
    {{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0, 0, 0], "max": [1, 1, 0]}},
    {{"bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC2"}}
  ]
}}"#
        );
        let path = dir.join("tri.gltf");
        std::fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn imports_single_node_scene() {
        let dir = ScratchDir::new("gltf-single");
        let path = write_triangle(dir.path(), true, r#"[{"mesh": 0}]"#, "[0]");
        let scene = import(&path).unwrap();

        assert_eq!(scene.root, Some(NodeId(0)));
        assert_eq!(scene.meshes.len(), 1);
        let mesh = &scene.meshes[0];
        assert_eq!(mesh.faces, vec![vec![0, 1, 2]]);
        assert!(mesh.normals.is_none());
        assert_eq!(mesh.tex_coords.as_ref().unwrap()[2], [0.0, 0.0]);
        assert_eq!(
            scene.materials[mesh.material].texture(TextureChannel::Diffuse, 0),
            Some("albedo.png")
        );
    }

    #[test]
    fn several_scene_roots_get_a_common_parent() {
        let dir = ScratchDir::new("gltf-multi");
        let path = write_triangle(
            dir.path(),
            false,
            r#"[{"mesh": 0, "name": "a"}, {"mesh": 0, "name": "b", "translation": [1, 0, 0]}]"#,
            "[0, 1]",
        );
        let scene = import(&path).unwrap();

        assert_eq!(scene.root, Some(NodeId(2)));
        assert_eq!(traverse(&scene).unwrap(), vec![0, 0]);
        assert_eq!(scene.node(NodeId(1)).unwrap().transform.w.x, 1.0);
        // Primitive without a material gets the synthetic default one.
        assert_eq!(scene.materials.len(), 1);
        assert_eq!(scene.materials[0].name, "default");
    }

    #[test]
    fn strips_and_fans_become_triangles() {
        use gltf::mesh::Mode;
        assert_eq!(
            faces(Mode::TriangleStrip, &[0, 1, 2, 3]).unwrap(),
            vec![vec![0, 1, 2], vec![2, 1, 3]]
        );
        assert_eq!(
            faces(Mode::TriangleFan, &[0, 1, 2, 3]).unwrap(),
            vec![vec![0, 1, 2], vec![0, 2, 3]]
        );
        assert!(faces(Mode::Lines, &[0, 1]).is_none());
    }

    #[test]
    fn packed_metallic_roughness_splits_blue_and_green() {
        let mut packed = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(3, 1, image::Rgb([9, 80, 200])))
            .write_to(&mut packed, image::ImageFormat::Png)
            .unwrap();
        let mut scene = ImportedScene::new();
        scene.embedded_textures.push(EmbeddedTexture {
            bytes: packed.into_inner(),
            mime_type: Some("image/png".to_string()),
        });

        let (metalness, roughness) =
            split_metallic_roughness(&mut scene, Path::new("."), "*0").unwrap();
        assert_eq!((metalness.as_str(), roughness.as_str()), ("*1", "*2"));

        let plane = |reference: &str| scene.embedded(reference).unwrap().decode().unwrap();
        let metal = plane("*1");
        assert_eq!(metal.color(), image::ColorType::L8);
        assert!(metal.as_bytes().iter().all(|&v| v == 200));
        assert!(plane("*2").as_bytes().iter().all(|&v| v == 80));
    }

    #[test]
    fn unreadable_packed_image_adds_nothing() {
        let dir = ScratchDir::new("gltf-mr-missing");
        let mut scene = ImportedScene::new();
        assert!(split_metallic_roughness(&mut scene, dir.path(), "missing.png").is_none());
        assert!(scene.embedded_textures.is_empty());
    }
}
