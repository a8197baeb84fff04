//! Loading of models and their textures from external files.
//!
//! [`load_model`] is the entry point: it imports the file, walks the scene
//! graph in pre-order and assembles one [`Mesh`](crate::data_structures::model::Mesh)
//! per mesh reference, resolving textures through a per-model cache and
//! falling back to the shared default set when a material yields nothing.

pub mod cache;
pub mod defaults;
pub mod gltf_import;
pub mod import;
pub mod material;
pub mod mesh;
pub mod obj_import;
pub mod postprocess;
pub mod texture;

#[cfg(test)]
#[path = "../../tests/common/scratch.rs"]
pub(crate) mod test_support;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::data_structures::model::Model;
use crate::data_structures::scene_graph::{ImportedMaterial, LoadError, traverse};
use crate::gpu::GpuDevice;
use crate::resources::cache::{LoadContext, TextureCache};
use crate::resources::defaults::DefaultTextures;
use crate::resources::postprocess::PostProcess;
use crate::resources::texture::{AssetSearch, TextureResolver};

/// Settings for a single model load.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub post: PostProcess,
    pub search: AssetSearch,
}

/// Load `path`, returning an empty model if the scene cannot be imported.
///
/// The failure is logged at `error`; callers that need to react to it use
/// [`try_load_model`].
pub fn load_model<G: GpuDevice>(
    path: &Path,
    gpu: &G,
    defaults: Option<Rc<DefaultTextures<G>>>,
    options: &LoadOptions,
) -> Model<G> {
    match try_load_model(path, gpu, defaults.clone(), options) {
        Ok(model) => model,
        Err(e) => {
            log::error!("could not load model {}: {}", path.display(), error_chain(&e));
            Model::empty(gpu.clone(), model_directory(path), defaults)
        }
    }
}

/**
 * Load `path` into a [`Model`].
 *
 * # Arguments
 *
 * * `gpu` - device that receives texture and mesh buffer uploads.
 * * `defaults` - shared fallback textures, or `None` to leave materials
 *   without textures unbound.
 * * `options` - post-process passes and texture search settings.
 */
pub fn try_load_model<G: GpuDevice>(
    path: &Path,
    gpu: &G,
    defaults: Option<Rc<DefaultTextures<G>>>,
    options: &LoadOptions,
) -> Result<Model<G>, LoadError> {
    log::info!("loading model {}", path.display());
    let directory = model_directory(path);
    let scene = import::import(path, &options.post).map_err(|source| LoadError::NoScene {
        path: path.display().to_string(),
        source,
    })?;
    let order = traverse(&scene)?;

    let resolver = TextureResolver::new(options.search.clone());
    let ctx = LoadContext {
        gpu,
        resolver: &resolver,
        directory: &directory,
        embedded: &scene.embedded_textures,
        defaults: defaults.as_deref(),
    };
    let mut cache = TextureCache::new();
    let fallback = ImportedMaterial::new("default");

    let meshes = order
        .into_iter()
        .map(|index| {
            let raw = &scene.meshes[index];
            let material = scene.materials.get(raw.material).unwrap_or_else(|| {
                log::warn!("mesh {:?} uses missing material {}", raw.name, raw.material);
                &fallback
            });
            mesh::assemble(raw, material, &mut cache, &ctx)
        })
        .collect::<Vec<_>>();

    log::info!(
        "loaded {}: {} meshes, {} unique textures",
        path.display(),
        meshes.len(),
        cache.len()
    );
    Ok(Model::new(gpu.clone(), directory, meshes, cache, defaults))
}

/// Directory textures are resolved against: the model's parent, or `.`.
fn model_directory(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn error_chain(e: &dyn Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
