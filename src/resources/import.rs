//! Reading model files into an [`ImportedScene`].

use std::path::Path;

use thiserror::Error;

use crate::data_structures::scene_graph::ImportedScene;
use crate::resources::postprocess::PostProcess;
use crate::resources::{gltf_import, obj_import};

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("could not read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid glTF")]
    Gltf(#[from] gltf::Error),

    #[error("invalid OBJ")]
    Obj(#[from] tobj::LoadError),

    #[error("unsupported model format {0:?}")]
    UnsupportedFormat(String),
}

/// Model file formats with an importer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Gltf,
    Obj,
}

impl ModelFormat {
    /// Detect the format from the file extension, ignoring case.
    pub fn from_path(path: &Path) -> Result<Self, ImportError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "gltf" | "glb" => Ok(Self::Gltf),
            "obj" => Ok(Self::Obj),
            _ => Err(ImportError::UnsupportedFormat(extension)),
        }
    }
}

/// Import `path` and run the selected post-process passes on the result.
pub fn import(path: &Path, post: &PostProcess) -> Result<ImportedScene, ImportError> {
    let mut scene = match ModelFormat::from_path(path)? {
        ModelFormat::Gltf => gltf_import::import(path)?,
        ModelFormat::Obj => obj_import::import(path)?,
    };
    log::debug!(
        "imported {}: {} nodes, {} meshes, {} materials",
        path.display(),
        scene.nodes.len(),
        scene.meshes.len(),
        scene.materials.len()
    );
    post.apply(&mut scene);
    Ok(scene)
}
