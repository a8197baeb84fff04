//! Clean-up passes applied to an imported scene before assembly.
//!
//! Importers hand over what the file contains. These passes bring every scene
//! into the shape the assembler expects: triangles only, normals everywhere,
//! UVs with a top-left origin, tangent frames where UVs exist, and no node
//! transforms left to apply at draw time.

use cgmath::{InnerSpace, Matrix, Matrix3, Matrix4, SquareMatrix, Vector3, Vector4, Zero};

use crate::data_structures::scene_graph::{ImportedMesh, ImportedNode, ImportedScene, NodeId};

/// Which passes [`apply`](PostProcess::apply) runs. They always run in the
/// order the fields are declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostProcess {
    pub triangulate: bool,
    pub pre_transform_vertices: bool,
    pub gen_smooth_normals: bool,
    pub flip_uvs: bool,
    pub calc_tangent_space: bool,
}

impl PostProcess {
    pub const ALL: Self = Self {
        triangulate: true,
        pre_transform_vertices: true,
        gen_smooth_normals: true,
        flip_uvs: true,
        calc_tangent_space: true,
    };

    pub const NONE: Self = Self {
        triangulate: false,
        pre_transform_vertices: false,
        gen_smooth_normals: false,
        flip_uvs: false,
        calc_tangent_space: false,
    };

    pub fn apply(&self, scene: &mut ImportedScene) {
        if self.triangulate {
            scene.meshes.iter_mut().for_each(triangulate);
        }
        if self.pre_transform_vertices {
            pre_transform_vertices(scene);
        }
        if self.gen_smooth_normals {
            scene.meshes.iter_mut().for_each(gen_smooth_normals);
        }
        if self.flip_uvs {
            scene.meshes.iter_mut().for_each(flip_uvs);
        }
        if self.calc_tangent_space {
            scene.meshes.iter_mut().for_each(calc_tangent_space);
        }
    }
}

impl Default for PostProcess {
    fn default() -> Self {
        Self::ALL
    }
}

/// Split polygons into triangle fans; points and lines are removed.
pub fn triangulate(mesh: &mut ImportedMesh) {
    let mut dropped = 0;
    let faces = std::mem::take(&mut mesh.faces);
    for face in faces {
        match face.len() {
            0..=2 => dropped += 1,
            3 => mesh.faces.push(face),
            _ => {
                for i in 1..face.len() - 1 {
                    mesh.faces.push(vec![face[0], face[i], face[i + 1]]);
                }
            }
        }
    }
    if dropped > 0 {
        log::debug!("mesh {:?}: removed {} point/line primitives", mesh.name, dropped);
    }
}

fn triangle(face: &[u32], vertex_count: usize) -> Option<[usize; 3]> {
    match face {
        &[a, b, c] if [a, b, c].iter().all(|&i| (i as usize) < vertex_count) => {
            Some([a as usize, b as usize, c as usize])
        }
        _ => None,
    }
}

/// Area-weighted vertex normals, only for meshes that have none.
pub fn gen_smooth_normals(mesh: &mut ImportedMesh) {
    if mesh.normals.is_some() {
        return;
    }
    let count = mesh.positions.len();
    let mut normals = vec![Vector3::<f32>::zero(); count];
    for face in &mesh.faces {
        let Some([a, b, c]) = triangle(face, count) else {
            continue;
        };
        let p0: Vector3<f32> = mesh.positions[a].into();
        let p1: Vector3<f32> = mesh.positions[b].into();
        let p2: Vector3<f32> = mesh.positions[c].into();
        let n = (p1 - p0).cross(p2 - p0);
        for i in [a, b, c] {
            normals[i] += n;
        }
    }
    mesh.normals = Some(
        normals
            .into_iter()
            .map(|n| {
                if n.magnitude2() > f32::EPSILON {
                    n.normalize().into()
                } else {
                    [0.0; 3]
                }
            })
            .collect(),
    );
}

/// Move the UV origin from bottom-left to top-left.
pub fn flip_uvs(mesh: &mut ImportedMesh) {
    if let Some(tex_coords) = mesh.tex_coords.as_mut() {
        for uv in tex_coords {
            uv[1] = 1.0 - uv[1];
        }
    }
}

/**
 * Per-vertex tangents and bitangents from UV gradients.
 *
 * Needs UVs and normals; meshes that already carry both tangents and
 * bitangents are left alone. Each triangle's tangent frame is added to its
 * three vertices and the sums are averaged. Triangles with degenerate UVs
 * contribute nothing.
 */
pub fn calc_tangent_space(mesh: &mut ImportedMesh) {
    if mesh.tangents.is_some() && mesh.bitangents.is_some() {
        return;
    }
    let (Some(tex_coords), Some(normals)) = (mesh.tex_coords.as_ref(), mesh.normals.as_ref())
    else {
        return;
    };
    let count = mesh.positions.len();
    if tex_coords.len() < count || normals.len() < count {
        log::warn!("mesh {:?}: attribute arrays too short for tangents", mesh.name);
        return;
    }

    let mut tangents = vec![Vector3::<f32>::zero(); count];
    let mut bitangents = vec![Vector3::<f32>::zero(); count];
    let mut triangles_included = vec![0u32; count];

    for face in &mesh.faces {
        let Some(c) = triangle(face, count) else {
            continue;
        };
        let pos0: Vector3<f32> = mesh.positions[c[0]].into();
        let pos1: Vector3<f32> = mesh.positions[c[1]].into();
        let pos2: Vector3<f32> = mesh.positions[c[2]].into();

        let uv0: cgmath::Vector2<f32> = tex_coords[c[0]].into();
        let uv1: cgmath::Vector2<f32> = tex_coords[c[1]].into();
        let uv2: cgmath::Vector2<f32> = tex_coords[c[2]].into();

        let delta_pos1 = pos1 - pos0;
        let delta_pos2 = pos2 - pos0;
        let delta_uv1 = uv1 - uv0;
        let delta_uv2 = uv2 - uv0;

        //     delta_pos1 = delta_uv1.x * T + delta_uv1.y * B
        //     delta_pos2 = delta_uv2.x * T + delta_uv2.y * B
        let det = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
        if det.abs() < f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) * r;
        // Flipped for right-handed normal maps with top-left UVs.
        let bitangent = (delta_pos2 * delta_uv1.x - delta_pos1 * delta_uv2.x) * -r;

        for i in c {
            tangents[i] += tangent;
            bitangents[i] += bitangent;
            triangles_included[i] += 1;
        }
    }

    let mut out_t = Vec::with_capacity(count);
    let mut out_b = Vec::with_capacity(count);
    for i in 0..count {
        let n = triangles_included[i];
        if n == 0 {
            out_t.push([0.0; 3]);
            out_b.push([0.0; 3]);
            continue;
        }
        let denom = 1.0 / n as f32;
        out_t.push((tangents[i] * denom).into());
        out_b.push((bitangents[i] * denom).into());
    }
    mesh.tangents = Some(out_t);
    mesh.bitangents = Some(out_b);
}

/**
 * Bake node transforms into vertex data and collapse the hierarchy.
 *
 * Afterwards the root holds every mesh reference in pre-order and has no
 * children. A mesh referenced by several nodes is duplicated so each copy can
 * carry its own transform.
 */
pub fn pre_transform_vertices(scene: &mut ImportedScene) {
    let Some(root) = scene.root.filter(|&id| scene.node(id).is_some()) else {
        return;
    };

    let mut placements: Vec<(usize, Matrix4<f32>)> = Vec::new();
    let mut visited = vec![false; scene.nodes.len()];
    let mut stack = vec![(root, Matrix4::identity())];
    while let Some((id, parent)) = stack.pop() {
        let Some(node) = scene.node(id) else {
            continue;
        };
        if std::mem::replace(&mut visited[id.0], true) {
            continue;
        }
        let world = parent * node.transform;
        placements.extend(
            node.meshes
                .iter()
                .filter(|&&mesh| mesh < scene.meshes.len())
                .map(|&mesh| (mesh, world)),
        );
        stack.extend(node.children.iter().rev().map(|&child| (child, world)));
    }

    let originals = std::mem::take(&mut scene.meshes);
    let mut used = vec![false; originals.len()];
    let mut meshes = Vec::with_capacity(placements.len());
    for (index, world) in placements {
        let mut mesh = originals[index].clone();
        if std::mem::replace(&mut used[index], true) {
            log::debug!("mesh {:?} instanced again, duplicating", mesh.name);
        }
        transform_mesh(&mut mesh, &world);
        meshes.push(mesh);
    }

    let root_name = scene
        .node(root)
        .map(|node| node.name.clone())
        .unwrap_or_default();
    let mut flat_root = ImportedNode::new(root_name);
    flat_root.meshes = (0..meshes.len()).collect();

    scene.meshes = meshes;
    scene.nodes = vec![flat_root];
    scene.root = Some(NodeId(0));
}

fn transform_mesh(mesh: &mut ImportedMesh, world: &Matrix4<f32>) {
    if *world == Matrix4::identity() {
        return;
    }
    for p in &mut mesh.positions {
        let v = *world * Vector4::new(p[0], p[1], p[2], 1.0);
        *p = [v.x, v.y, v.z];
    }

    let linear = Matrix3::from_cols(
        world.x.truncate(),
        world.y.truncate(),
        world.z.truncate(),
    );
    let normal_matrix = linear
        .invert()
        .map(|inverse| inverse.transpose())
        .unwrap_or(linear);

    let apply = |values: &mut Option<Vec<[f32; 3]>>, m: &Matrix3<f32>| {
        if let Some(values) = values.as_mut() {
            for v in values {
                let t = *m * Vector3::from(*v);
                *v = if t.magnitude2() > f32::EPSILON {
                    t.normalize().into()
                } else {
                    [0.0; 3]
                };
            }
        }
    };
    apply(&mut mesh.normals, &normal_matrix);
    apply(&mut mesh.tangents, &linear);
    apply(&mut mesh.bitangents, &linear);
}
