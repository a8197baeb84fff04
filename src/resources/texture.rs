//! Texture lookup and decoding.
//!
//! Texture references in model files are frequently wrong: absolute paths from
//! the authoring machine, missing files, or names that only hint at the
//! texture's role. [`TextureResolver`] tries the literal path first and then
//! falls back to a small shared asset directory of conventionally named PBR
//! textures:
//!
//! - `<directory>/<reference>` as written
//! - the conventional file for the role guessed from the file name, in
//!   `<asset dir>` then `../<asset dir>`
//! - the bare file name and every conventional file, each in `<asset dir>`
//!   then `../<asset dir>`
//!
//! References of the form `*N` are looked up among the scene's embedded
//! images before any of the above.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use thiserror::Error;

use crate::data_structures::model::TextureSlot;
use crate::data_structures::scene_graph::{EmbeddedTexture, embedded_index};
use crate::gpu::{GpuDevice, GpuError, PixelFormat, TextureDescriptor, TextureHandle};

#[derive(Error, Debug)]
pub enum TextureError {
    #[error("texture {reference:?} not found")]
    NotFound { reference: String },

    #[error("texture {reference:?} has {channels} channels, expected 1, 3 or 4")]
    UnsupportedChannelCount { reference: String, channels: u8 },

    #[error("texture upload failed")]
    Gpu(#[from] GpuError),
}

/// File names of the shared fallback texture set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConventionalNames {
    pub albedo: String,
    pub normal: String,
    pub metallic: String,
    pub roughness: String,
    /// Stands in for ambient occlusion.
    pub height: String,
}

impl Default for ConventionalNames {
    fn default() -> Self {
        Self {
            albedo: "mjolnir3_lp_GreyMetal_BaseColor.png".to_string(),
            normal: "mjolnir3_lp_GreyMetal_Normal.png".to_string(),
            metallic: "mjolnir3_lp_GreyMetal_Metallic.png".to_string(),
            roughness: "mjolnir3_lp_GreyMetal_Roughness.png".to_string(),
            height: "mjolnir3_lp_GreyMetal_Height.png".to_string(),
        }
    }
}

impl ConventionalNames {
    pub fn for_slot(&self, slot: TextureSlot) -> Option<&str> {
        match slot {
            TextureSlot::Albedo => Some(&self.albedo),
            TextureSlot::Normal => Some(&self.normal),
            TextureSlot::Metallic => Some(&self.metallic),
            TextureSlot::Roughness => Some(&self.roughness),
            TextureSlot::AmbientOcclusion => Some(&self.height),
            TextureSlot::Specular => None,
        }
    }

    /// Albedo, normal, metallic, roughness, height.
    pub fn all(&self) -> [&str; 5] {
        [
            &self.albedo,
            &self.normal,
            &self.metallic,
            &self.roughness,
            &self.height,
        ]
    }
}

/// Where fallback textures are searched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSearch {
    /// Directory the asset directory is looked up from, usually the working
    /// directory.
    pub root: PathBuf,
    pub asset_dir: PathBuf,
    pub names: ConventionalNames,
}

impl Default for AssetSearch {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            asset_dir: PathBuf::from("Pbr"),
            names: ConventionalNames::default(),
        }
    }
}

impl AssetSearch {
    /// `<root>/<asset dir>/<file>` then `<root>/../<asset dir>/<file>`.
    pub fn locations(&self, file_name: &str) -> [PathBuf; 2] {
        [
            self.root.join(&self.asset_dir).join(file_name),
            self.root.join("..").join(&self.asset_dir).join(file_name),
        ]
    }
}

/// Guess a texture's role from its file name.
///
/// Case-insensitive substring match on the name without directories or
/// extension. Categories are checked in a fixed order and the first match wins.
pub fn classify_reference(reference: &str) -> Option<TextureSlot> {
    let file_name = bare_file_name(reference);
    let base = match file_name.rfind('.') {
        Some(dot) => &file_name[..dot],
        None => file_name,
    }
    .to_ascii_lowercase();

    const RULES: [(TextureSlot, &[&str]); 5] = [
        (TextureSlot::Albedo, &["diffuse", "albedo", "base", "color"]),
        (TextureSlot::Normal, &["normal"]),
        (TextureSlot::Metallic, &["metallic"]),
        (TextureSlot::Roughness, &["roughness", "rough"]),
        (TextureSlot::AmbientOcclusion, &["ao", "height", "occlusion"]),
    ];
    RULES
        .iter()
        .find(|(_, keys)| keys.iter().any(|key| base.contains(key)))
        .map(|(slot, _)| *slot)
}

/// The part after the last `/` or `\`.
fn bare_file_name(reference: &str) -> &str {
    match reference.rfind(['/', '\\']) {
        Some(slash) => &reference[slash + 1..],
        None => reference,
    }
}

/// Decoded 8-bit pixels with their channel count as stored in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

impl DecodedImage {
    /// Keeps the source channel count; wider sample types are narrowed to 8 bits.
    pub fn from_dynamic(img: DynamicImage) -> Self {
        let (width, height) = (img.width(), img.height());
        let (channels, pixels) = match img {
            DynamicImage::ImageLuma8(buf) => (1, buf.into_raw()),
            DynamicImage::ImageLumaA8(buf) => (2, buf.into_raw()),
            DynamicImage::ImageRgb8(buf) => (3, buf.into_raw()),
            DynamicImage::ImageRgba8(buf) => (4, buf.into_raw()),
            other => match other.color().channel_count() {
                1 => (1, other.to_luma8().into_raw()),
                2 => (2, other.to_luma_alpha8().into_raw()),
                3 => (3, other.to_rgb8().into_raw()),
                _ => (4, other.to_rgba8().into_raw()),
            },
        };
        Self {
            pixels,
            width,
            height,
            channels,
        }
    }

    pub fn pixel_format(&self, reference: &str) -> Result<PixelFormat, TextureError> {
        PixelFormat::from_channel_count(self.channels).ok_or_else(|| {
            TextureError::UnsupportedChannelCount {
                reference: reference.to_string(),
                channels: self.channels,
            }
        })
    }
}

/// Upload decoded pixels as a material texture with a full mip chain.
pub fn upload<G: GpuDevice>(
    gpu: &G,
    reference: &str,
    image: &DecodedImage,
) -> Result<TextureHandle, TextureError> {
    let format = image.pixel_format(reference)?;
    let desc = TextureDescriptor::material(reference, image.width, image.height, format);
    Ok(gpu.create_texture(&desc, &image.pixels)?)
}

fn decode_file(path: &Path) -> Option<DecodedImage> {
    let decoded = image::ImageReader::open(path)
        .map_err(image::ImageError::IoError)
        .and_then(|reader| reader.with_guessed_format().map_err(image::ImageError::IoError))
        .and_then(|reader| reader.decode());
    match decoded {
        Ok(img) => Some(DecodedImage::from_dynamic(img)),
        Err(e) => {
            log::debug!("  {} not usable: {}", path.display(), e);
            None
        }
    }
}

fn decode_embedded(embedded: &EmbeddedTexture) -> Option<DecodedImage> {
    match embedded.decode() {
        Ok(img) => Some(DecodedImage::from_dynamic(img)),
        Err(e) => {
            log::debug!("  embedded image not usable: {}", e);
            None
        }
    }
}

/// Finds and decodes texture files. See the module docs for the search order.
#[derive(Debug, Clone, Default)]
pub struct TextureResolver {
    search: AssetSearch,
}

impl TextureResolver {
    pub fn new(search: AssetSearch) -> Self {
        Self { search }
    }

    /// Every file path tried for `reference`, in order, without duplicates.
    pub fn candidates(&self, reference: &str, directory: &Path) -> Vec<PathBuf> {
        let mut paths = vec![directory.join(reference)];

        let names = &self.search.names;
        if let Some(name) = classify_reference(reference).and_then(|slot| names.for_slot(slot)) {
            paths.extend(self.search.locations(name));
        }

        let file_name = bare_file_name(reference);
        let mut fallbacks = vec![file_name];
        fallbacks.extend(names.all());
        for name in fallbacks {
            paths.extend(self.search.locations(name));
        }

        let mut unique = Vec::with_capacity(paths.len());
        for path in paths {
            if !unique.contains(&path) {
                unique.push(path);
            }
        }
        unique
    }

    /// Locate and decode `reference`.
    ///
    /// A candidate that exists but cannot be decoded counts as a miss. Only
    /// [`TextureError::NotFound`] is returned from here; channel counts are
    /// checked by the caller before upload.
    pub fn resolve(
        &self,
        reference: &str,
        directory: &Path,
        embedded: &[EmbeddedTexture],
    ) -> Result<DecodedImage, TextureError> {
        if let Some(index) = embedded_index(reference) {
            log::debug!("  trying embedded texture {}", index);
            if let Some(image) = embedded.get(index).and_then(decode_embedded) {
                log::info!("  loaded embedded texture {}", reference);
                return Ok(image);
            }
        }

        for path in self.candidates(reference, directory) {
            log::debug!("  trying to load texture: {}", path.display());
            if let Some(image) = decode_file(&path) {
                log::info!("  loaded texture {} from {}", reference, path.display());
                return Ok(image);
            }
        }

        log::warn!(
            "texture failed to load: {} (directory: {})",
            reference,
            directory.display()
        );
        Err(TextureError::NotFound {
            reference: reference.to_string(),
        })
    }
}
