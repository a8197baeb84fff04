//! Mapping imported material channels onto PBR texture slots.
//!
//! Exporters disagree on where PBR maps go. Normal maps are read from the
//! bump (height) channel, where both importers put them. Older pipelines
//! store metalness as specular and roughness as shininess. [`SLOT_RULES`] lists, per slot, the channel to read and the
//! channel to fall back to when the first declares no texture.

use std::rc::Rc;

use crate::data_structures::model::{TextureRef, TextureSlot};
use crate::data_structures::scene_graph::{ImportedMaterial, TextureChannel};
use crate::gpu::GpuDevice;
use crate::resources::cache::{LoadContext, TextureCache};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRule {
    pub slot: TextureSlot,
    pub primary: TextureChannel,
    pub fallback: Option<TextureChannel>,
}

/// Slot rules in output order.
pub const SLOT_RULES: [SlotRule; 6] = [
    SlotRule {
        slot: TextureSlot::Albedo,
        primary: TextureChannel::Diffuse,
        fallback: None,
    },
    SlotRule {
        slot: TextureSlot::Specular,
        primary: TextureChannel::Specular,
        fallback: None,
    },
    SlotRule {
        slot: TextureSlot::Normal,
        primary: TextureChannel::Height,
        fallback: None,
    },
    SlotRule {
        slot: TextureSlot::Metallic,
        primary: TextureChannel::Metalness,
        fallback: Some(TextureChannel::Specular),
    },
    SlotRule {
        slot: TextureSlot::Roughness,
        primary: TextureChannel::DiffuseRoughness,
        fallback: Some(TextureChannel::Shininess),
    },
    SlotRule {
        slot: TextureSlot::AmbientOcclusion,
        primary: TextureChannel::Lightmap,
        fallback: None,
    },
];

impl SlotRule {
    /// The first reference of the first channel that declares any.
    pub fn reference<'m>(&self, material: &'m ImportedMaterial) -> Option<&'m str> {
        material
            .texture(self.primary, 0)
            .or_else(|| self.fallback.and_then(|channel| material.texture(channel, 0)))
    }
}

/// Load the textures of `material`, one per rule that finds a reference.
///
/// The normal rule is skipped entirely when the mesh has no tangent space.
/// References that resolve to nothing, or fail to load, are left out.
pub fn classify<G: GpuDevice>(
    material: &ImportedMaterial,
    has_tangent_space: bool,
    cache: &mut TextureCache,
    ctx: &LoadContext<'_, G>,
) -> Vec<Rc<TextureRef>> {
    let mut textures = Vec::new();
    for rule in &SLOT_RULES {
        let Some(reference) = rule.reference(material) else {
            continue;
        };
        if rule.slot == TextureSlot::Normal && !has_tangent_space {
            log::warn!(
                "normal map {} ignored for material {:?} (no UVs/tangents in mesh)",
                reference,
                material.name
            );
            continue;
        }

        match cache.get_or_load(ctx, reference, rule.slot) {
            Ok(texture) if texture.is_loaded() => textures.push(texture),
            Ok(_) => log::warn!("{} for material {:?} is unavailable", rule.slot, material.name),
            Err(e) => log::error!("failed to load {} {}: {}", rule.slot, reference, e),
        }
    }
    textures
}
