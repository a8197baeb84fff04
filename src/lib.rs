//! pbr-viewer
//!
//! A physically-based model viewer. The library loads a model file into
//! GPU-ready meshes, working out which PBR texture slots each mesh fills from
//! inconsistently tagged material data and falling back to a shared default
//! texture set. The binary renders the result with wgpu under four point
//! lights and a fly camera.
//!
//! High-level modules
//! - `camera`: fly camera, controller and the view/projection uniform
//! - `config`: viewer settings and command-line parsing
//! - `context`: window, surface and GPU state kept across frames
//! - `data_structures`: vertices, meshes, models, textures and imported scenes
//! - `flow`: the winit event loop
//! - `gpu`: the `GpuDevice` upload seam with wgpu and in-memory backends
//! - `input`: edge-triggered keyboard toggles
//! - `pipelines`: scene uniform and the PBR pipeline
//! - `render`: per-mesh draw state and draw calls
//! - `resources`: import, texture resolution and caching, mesh assembly
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod gpu;
pub mod input;
pub mod pipelines;
pub mod render;
pub mod resources;

pub use config::ViewerConfig;
pub use data_structures::model::{Mesh, Model, ModelVertex, TextureRef, TextureSlot};
pub use resources::{LoadOptions, load_model, try_load_model};
