//! Viewer data structures: meshes, models, textures and imported scene graphs.
//!
//! - `model` contains the vertex layout, texture slots, meshes and the model that owns them
//! - `texture` contains the wgpu texture wrapper and creation utilities
//! - `scene_graph` holds the arena-indexed scene importers produce, and its traversal

pub mod model;
pub mod scene_graph;
pub mod texture;
