//! Drawing a loaded model with the PBR pipeline.
//!
//! [`ModelRenderer`] pairs each mesh of a [`Model`] with its uploaded buffers
//! and a material bind group built from [`Mesh::bindings`]. Meshes whose
//! buffers never made it to the GPU are skipped.

use crate::data_structures::model::{Mesh, Model};
use crate::gpu::{GpuMesh, WgpuDevice};
use crate::pipelines::pbr::{MaterialResources, PbrPipeline};

/// A mesh ready to draw.
#[derive(Debug)]
pub struct DrawableMesh {
    /// Index into `Model::meshes`.
    pub mesh: usize,
    pub buffers: GpuMesh,
    pub material: MaterialResources,
}

#[derive(Debug, Default)]
pub struct ModelRenderer {
    drawables: Vec<DrawableMesh>,
}

impl ModelRenderer {
    pub fn new(
        gpu: &WgpuDevice,
        pipeline: &PbrPipeline,
        model: &Model<WgpuDevice>,
        tangent_space_requested: bool,
    ) -> Self {
        let drawables = model
            .meshes
            .iter()
            .enumerate()
            .filter_map(|(index, mesh)| {
                let Some(buffers) = mesh.buffers.and_then(|handle| gpu.mesh(handle)) else {
                    log::warn!("mesh {:?} has no GPU buffers and will not be drawn", mesh.name);
                    return None;
                };
                let bindings = mesh.bindings(tangent_space_requested);
                log::debug!("mesh {:?}: {:?}", mesh.name, bindings);
                Some(DrawableMesh {
                    mesh: index,
                    buffers,
                    material: pipeline.material(gpu, &mesh.name, &bindings),
                })
            })
            .collect();
        Self { drawables }
    }

    pub fn len(&self) -> usize {
        self.drawables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drawables.is_empty()
    }

    /// Re-derive every mesh's flags for a new tangent-space request.
    pub fn set_tangent_space(
        &mut self,
        queue: &wgpu::Queue,
        model: &Model<WgpuDevice>,
        requested: bool,
    ) {
        for drawable in &mut self.drawables {
            if let Some(mesh) = model.meshes.get(drawable.mesh) {
                drawable.material.update(queue, &mesh.bindings(requested));
            }
        }
    }

    pub fn draw(
        &self,
        render_pass: &mut wgpu::RenderPass<'_>,
        pipeline: &PbrPipeline,
        camera_bind_group: &wgpu::BindGroup,
        scene_bind_group: &wgpu::BindGroup,
    ) {
        render_pass.set_pipeline(&pipeline.pipeline);
        for drawable in &self.drawables {
            render_pass.draw_mesh(drawable, camera_bind_group, scene_bind_group);
        }
    }
}

pub trait DrawMesh {
    fn draw_mesh(
        &mut self,
        drawable: &DrawableMesh,
        camera_bind_group: &wgpu::BindGroup,
        scene_bind_group: &wgpu::BindGroup,
    );
}

impl DrawMesh for wgpu::RenderPass<'_> {
    fn draw_mesh(
        &mut self,
        drawable: &DrawableMesh,
        camera_bind_group: &wgpu::BindGroup,
        scene_bind_group: &wgpu::BindGroup,
    ) {
        self.set_vertex_buffer(0, drawable.buffers.vertex_buffer.slice(..));
        self.set_index_buffer(drawable.buffers.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.set_bind_group(0, camera_bind_group, &[]);
        self.set_bind_group(1, scene_bind_group, &[]);
        self.set_bind_group(2, &drawable.material.bind_group, &[]);
        self.draw_indexed(0..drawable.buffers.num_elements, 0, 0..1);
    }
}

/// Number of triangles a mesh contributes, for logging.
pub fn triangle_count(mesh: &Mesh) -> usize {
    mesh.indices.len() / 3
}
