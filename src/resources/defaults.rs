//! Shared fallback textures for meshes whose material yields none.

use std::cell::OnceCell;
use std::rc::Rc;

use crate::data_structures::model::{TextureRef, TextureSlot};
use crate::gpu::GpuDevice;
use crate::resources::texture::{self, AssetSearch, DecodedImage};

/// Slots the default set covers, in list order. There is no default AO map.
pub const DEFAULT_SLOTS: [TextureSlot; 4] = [
    TextureSlot::Albedo,
    TextureSlot::Normal,
    TextureSlot::Metallic,
    TextureSlot::Roughness,
];

/// Lazily loaded default texture set.
///
/// Created once by the application and handed to every model load. The
/// files are read on the first [`get`](Self::get) and never again, whether
/// or not they were found. Textures are released when the provider drops.
#[derive(Debug)]
pub struct DefaultTextures<G: GpuDevice> {
    gpu: G,
    search: AssetSearch,
    textures: OnceCell<Vec<Rc<TextureRef>>>,
}

impl<G: GpuDevice> DefaultTextures<G> {
    pub fn new(gpu: G, search: AssetSearch) -> Self {
        Self {
            gpu,
            search,
            textures: OnceCell::new(),
        }
    }

    pub fn shared(gpu: G, search: AssetSearch) -> Rc<Self> {
        Rc::new(Self::new(gpu, search))
    }

    /// Albedo, normal, metallic and roughness, skipping any that are missing.
    pub fn get(&self) -> &[Rc<TextureRef>] {
        self.textures.get_or_init(|| {
            log::info!("No textures found in material, loading default PBR textures...");
            DEFAULT_SLOTS
                .iter()
                .filter_map(|&slot| self.load(slot))
                .collect()
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.textures.get().is_some()
    }

    fn load(&self, slot: TextureSlot) -> Option<Rc<TextureRef>> {
        let name = self.search.names.for_slot(slot)?;
        let image = self.search.locations(name).iter().find_map(|path| {
            log::debug!("  trying default texture {}", path.display());
            image::open(path).ok().map(DecodedImage::from_dynamic)
        });
        let Some(image) = image else {
            log::warn!("default {} ({}) not found", slot, name);
            return None;
        };

        let reference = self.search.asset_dir.join(name).to_string_lossy().into_owned();
        match texture::upload(&self.gpu, &reference, &image) {
            Ok(handle) => {
                log::info!("  loaded default {} texture (ID: {})", slot, handle.raw());
                Some(Rc::new(TextureRef {
                    handle: Some(handle),
                    slot,
                    path: reference,
                }))
            }
            Err(e) => {
                log::error!("default {} could not be uploaded: {}", slot, e);
                None
            }
        }
    }
}

impl<G: GpuDevice> Drop for DefaultTextures<G> {
    fn drop(&mut self) {
        if let Some(textures) = self.textures.take() {
            for handle in textures.iter().filter_map(|t| t.handle) {
                self.gpu.destroy_texture(handle);
            }
        }
    }
}
