//! Render pipelines: the scene/light uniform and the PBR pipeline with its
//! material bind groups.

pub mod light;
pub mod pbr;
