//! Per-model texture cache.

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use crate::data_structures::model::{TextureRef, TextureSlot};
use crate::data_structures::scene_graph::EmbeddedTexture;
use crate::gpu::{GpuDevice, TextureHandle};
use crate::resources::defaults::DefaultTextures;
use crate::resources::texture::{self, TextureError, TextureResolver};

/// What a model load needs to turn references into textures.
pub struct LoadContext<'a, G: GpuDevice> {
    pub gpu: &'a G,
    pub resolver: &'a TextureResolver,
    /// Directory of the model file; references are relative to it.
    pub directory: &'a Path,
    pub embedded: &'a [EmbeddedTexture],
    pub defaults: Option<&'a DefaultTextures<G>>,
}

/// Textures loaded for one model, keyed by the reference string exactly as
/// the model file spells it.
///
/// No path normalisation happens: `a.png` and `./a.png` are two entries even
/// if they name the same file. References that could not be found are stored
/// as absent textures and are never searched for again.
#[derive(Debug, Default)]
pub struct TextureCache {
    entries: Vec<Rc<TextureRef>>,
    by_reference: HashMap<String, usize>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, reference: &str) -> Option<&Rc<TextureRef>> {
        self.by_reference
            .get(reference)
            .map(|&index| &self.entries[index])
    }

    /// Return the cached texture for `reference`, loading it on first use.
    ///
    /// A hit returns the shared value with the slot it was first loaded for,
    /// whatever `slot` is passed now. Decoding and upload errors are returned
    /// without caching anything.
    pub fn get_or_load<G: GpuDevice>(
        &mut self,
        ctx: &LoadContext<'_, G>,
        reference: &str,
        slot: TextureSlot,
    ) -> Result<Rc<TextureRef>, TextureError> {
        if let Some(hit) = self.get(reference) {
            return Ok(Rc::clone(hit));
        }

        let handle = match ctx.resolver.resolve(reference, ctx.directory, ctx.embedded) {
            Ok(image) => Some(texture::upload(ctx.gpu, reference, &image)?),
            Err(TextureError::NotFound { .. }) => None,
            Err(e) => return Err(e),
        };

        let texture = Rc::new(TextureRef {
            handle,
            slot,
            path: reference.to_string(),
        });
        self.by_reference
            .insert(reference.to_string(), self.entries.len());
        self.entries.push(Rc::clone(&texture));
        Ok(texture)
    }

    /// Empty the cache, returning every GPU handle it held.
    pub fn drain_handles(&mut self) -> Vec<TextureHandle> {
        self.by_reference.clear();
        self.entries
            .drain(..)
            .filter_map(|texture| texture.handle)
            .collect()
    }
}
