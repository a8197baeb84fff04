use crate::data_structures::model::{Mesh, ModelVertex};
use crate::data_structures::scene_graph::{ImportedMaterial, ImportedMesh};
use crate::gpu::GpuDevice;
use crate::resources::cache::{LoadContext, TextureCache};
use crate::resources::material;

/**
 * Build an immutable `Mesh` from the raw arrays of an imported mesh.
 *
 * Missing normals and UVs become zero. Tangents and bitangents are only copied
 * when UVs, tangents and bitangents are all present; otherwise they are zero
 * and the mesh is marked as having no tangent space, which also suppresses its
 * normal map. When the material yields no texture at all the default set is
 * used.
 */
pub fn assemble<G: GpuDevice>(
    raw: &ImportedMesh,
    material: &ImportedMaterial,
    cache: &mut TextureCache,
    ctx: &LoadContext<'_, G>,
) -> Mesh {
    let has_tangent_space =
        raw.tex_coords.is_some() && raw.tangents.is_some() && raw.bitangents.is_some();

    let vertices = (0..raw.positions.len())
        .map(|i| {
            let (tangent, bitangent) = if has_tangent_space {
                (attribute(&raw.tangents, i), attribute(&raw.bitangents, i))
            } else {
                ([0.0; 3], [0.0; 3])
            };
            ModelVertex {
                position: raw.positions[i],
                tex_coords: attribute(&raw.tex_coords, i),
                normal: attribute(&raw.normals, i),
                tangent,
                bitangent,
            }
        })
        .collect::<Vec<_>>();

    let indices = flatten_faces(raw, vertices.len());

    let mut textures = material::classify(material, has_tangent_space, cache, ctx);
    if textures.is_empty() {
        if let Some(defaults) = ctx.defaults {
            textures.extend(defaults.get().iter().cloned());
        }
    }

    let buffers = if vertices.is_empty() || indices.is_empty() {
        None
    } else {
        match ctx
            .gpu
            .create_mesh_buffers(&raw.name, bytemuck::cast_slice(&vertices), &indices)
        {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("could not upload mesh {:?}: {}", raw.name, e);
                None
            }
        }
    };

    Mesh {
        name: raw.name.clone(),
        vertices,
        indices,
        textures,
        has_tangent_space,
        buffers,
    }
}

/// Element `i` of an optional attribute array, zero when absent or short.
fn attribute<const N: usize>(values: &Option<Vec<[f32; N]>>, i: usize) -> [f32; N] {
    values
        .as_ref()
        .and_then(|values| values.get(i))
        .copied()
        .unwrap_or([0.0; N])
}

/// Faces concatenated in order, dropping any face that points past the
/// vertex array.
fn flatten_faces(raw: &ImportedMesh, vertex_count: usize) -> Vec<u32> {
    let mut indices = Vec::with_capacity(raw.faces.len() * 3);
    let mut dropped = 0;
    for face in &raw.faces {
        if face.iter().all(|&i| (i as usize) < vertex_count) {
            indices.extend_from_slice(face);
        } else {
            dropped += 1;
        }
    }
    if dropped > 0 {
        log::warn!(
            "mesh {:?}: dropped {} faces referencing missing vertices",
            raw.name,
            dropped
        );
    }
    indices
}
