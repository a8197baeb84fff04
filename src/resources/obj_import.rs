//! Wavefront OBJ/MTL importer.

use std::path::Path;

use crate::data_structures::scene_graph::{
    ImportedMaterial, ImportedMesh, ImportedNode, ImportedScene, TextureChannel,
};
use crate::resources::import::ImportError;

/// MTL statements `tobj` leaves in `unknown_param`, and their channels.
const EXTRA_MAPS: [(&str, TextureChannel); 6] = [
    ("map_Pr", TextureChannel::DiffuseRoughness),
    ("map_Pm", TextureChannel::Metalness),
    ("map_Ke", TextureChannel::Emissive),
    // Normal maps travel in the height channel, like `bump`.
    ("norm", TextureChannel::Height),
    ("disp", TextureChannel::Displacement),
    ("map_Ao", TextureChannel::Lightmap),
];

pub fn import(path: &Path) -> Result<ImportedScene, ImportError> {
    let (models, materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: false,
            single_index: true,
            ..Default::default()
        },
    )?;

    let mut scene = ImportedScene::new();
    match materials {
        Ok(materials) => {
            for material in &materials {
                scene.add_material(convert_material(material));
            }
        }
        Err(e) => log::warn!("materials of {} could not be loaded: {}", path.display(), e),
    }
    let mut default_material = None;

    if models.is_empty() {
        log::warn!("{} contains no geometry", path.display());
        scene.flags.incomplete = true;
        return Ok(scene);
    }

    let root = scene.add_node(ImportedNode::new(
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "root".to_string()),
    ));
    scene.root = Some(root);

    for model in &models {
        let m = &model.mesh;
        let material = match m.material_id.filter(|&id| id < scene.materials.len()) {
            Some(id) => id,
            None => *default_material
                .get_or_insert_with(|| scene.add_material(ImportedMaterial::new("default"))),
        };
        let mesh = scene.add_mesh(ImportedMesh {
            name: model.name.clone(),
            positions: m.positions.chunks_exact(3).map(|p| [p[0], p[1], p[2]]).collect(),
            normals: (!m.normals.is_empty())
                .then(|| m.normals.chunks_exact(3).map(|n| [n[0], n[1], n[2]]).collect()),
            tex_coords: (!m.texcoords.is_empty())
                .then(|| m.texcoords.chunks_exact(2).map(|t| [t[0], t[1]]).collect()),
            tangents: None,
            bitangents: None,
            faces: faces(&m.indices, &m.face_arities),
            material,
        });

        let mut node = ImportedNode::new(model.name.clone());
        node.meshes.push(mesh);
        let node = scene.add_node(node);
        scene.attach(root, node);
    }

    Ok(scene)
}

/// Split the flat index list by face arity. No arities means all triangles.
fn faces(indices: &[u32], arities: &[u32]) -> Vec<Vec<u32>> {
    if arities.is_empty() {
        return indices.chunks(3).map(<[u32]>::to_vec).collect();
    }
    let mut faces = Vec::with_capacity(arities.len());
    let mut start = 0;
    for &arity in arities {
        let end = (start + arity as usize).min(indices.len());
        faces.push(indices[start..end].to_vec());
        start = end;
    }
    faces
}

/// The file name of a map statement: everything after the leading `-option`
/// arguments, so names containing spaces survive.
fn map_file(statement: &str) -> Option<&str> {
    let mut rest = statement.trim();
    while let Some(option) = rest.strip_prefix('-') {
        let (name, tail) = split_token(option);
        rest = tail;
        // `-o`, `-s` and `-t` take one to three numbers, `-mm` two.
        let max_values = match name {
            "o" | "s" | "t" => 3,
            "mm" => 2,
            _ => 1,
        };
        for i in 0..max_values {
            let (value, tail) = split_token(rest);
            if i > 0 && value.parse::<f32>().is_err() {
                break;
            }
            rest = tail;
        }
    }
    (!rest.is_empty()).then_some(rest)
}

fn split_token(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(end) => (&s[..end], s[end..].trim_start()),
        None => (s, ""),
    }
}

fn convert_material(material: &tobj::Material) -> ImportedMaterial {
    let mut imported = ImportedMaterial::new(material.name.clone());
    let standard = [
        (&material.diffuse_texture, TextureChannel::Diffuse),
        (&material.specular_texture, TextureChannel::Specular),
        (&material.ambient_texture, TextureChannel::Ambient),
        // `map_Bump`/`bump` is a height map in MTL terms.
        (&material.normal_texture, TextureChannel::Height),
        (&material.shininess_texture, TextureChannel::Shininess),
        (&material.dissolve_texture, TextureChannel::Opacity),
    ];
    for (texture, channel) in standard {
        if let Some(file) = texture.as_deref().and_then(map_file) {
            imported.add_texture(channel, file);
        }
    }
    for (key, channel) in EXTRA_MAPS {
        if let Some(file) = material.unknown_param.get(key).and_then(|v| map_file(v)) {
            imported.add_texture(channel, file);
        }
    }
    imported
}
