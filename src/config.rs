//! Viewer configuration and command-line parsing.
//!
//! Every field has a default, so the viewer starts with no arguments at all.
//! Flags use the `--key=value` form; a bare argument is taken as the model path.

use std::path::PathBuf;

use crate::resources::LoadOptions;
use crate::resources::texture::AssetSearch;

pub const MAX_LIGHTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

/// Material constants the shader uses for slots without a texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialDefaults {
    pub albedo: [f32; 3],
    pub metallic: f32,
    pub roughness: f32,
    pub ao: f32,
}

impl Default for MaterialDefaults {
    fn default() -> Self {
        Self {
            albedo: [0.8, 0.8, 0.8],
            metallic: 0.5,
            roughness: 0.3,
            ao: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub model: PathBuf,
    pub width: u32,
    pub height: u32,
    pub lights: [PointLight; MAX_LIGHTS],
    pub z_near: f32,
    pub z_far: f32,
    pub model_scale: f32,
    pub clear_colour: wgpu::Color,
    pub material: MaterialDefaults,
    pub camera_position: [f32; 3],
    pub use_tangent_space: bool,
    pub albedo_is_srgb: bool,
    pub load: LoadOptions,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        let color = [65.0, 65.0, 65.0];
        Self {
            model: PathBuf::from("mjolnir.glb"),
            width: 1280,
            height: 720,
            lights: [
                PointLight { position: [4.0, 4.0, 4.0], color },
                PointLight { position: [-4.0, 4.0, 4.0], color },
                PointLight { position: [0.0, 4.0, -4.0], color },
                PointLight { position: [0.0, -4.0, 4.0], color },
            ],
            z_near: 0.1,
            z_far: 100.0,
            model_scale: 0.1,
            clear_colour: wgpu::Color {
                r: 0.1,
                g: 0.1,
                b: 0.1,
                a: 1.0,
            },
            material: MaterialDefaults::default(),
            camera_position: [0.0, 0.0, 10.0],
            use_tangent_space: true,
            albedo_is_srgb: true,
            load: LoadOptions::default(),
        }
    }
}

impl ViewerConfig {
    /// Build a configuration from `std::env::args()`, skipping the program name.
    pub fn from_env() -> Self {
        Self::from_args(std::env::args().skip(1))
    }

    /// Apply each argument on top of the defaults. Unknown or malformed
    /// flags are logged and ignored.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::default();
        for arg in args {
            config.apply_arg(arg.as_ref());
        }
        config
    }

    fn apply_arg(&mut self, arg: &str) {
        if let Some(v) = arg.strip_prefix("--model=") {
            self.model = PathBuf::from(v);
        } else if let Some(v) = arg.strip_prefix("--size=") {
            match parse_size(v) {
                Some((w, h)) => {
                    self.width = w;
                    self.height = h;
                }
                None => log::warn!("ignoring malformed size {:?}, expected WxH", v),
            }
        } else if let Some(v) = arg.strip_prefix("--width=") {
            if let Some(w) = parse_dimension("width", v) {
                self.width = w;
            }
        } else if let Some(v) = arg.strip_prefix("--height=") {
            if let Some(h) = parse_dimension("height", v) {
                self.height = h;
            }
        } else if let Some(v) = arg.strip_prefix("--assets=") {
            self.load.search.asset_dir = PathBuf::from(v);
        } else if let Some(v) = arg.strip_prefix("--asset-root=") {
            self.load.search.root = PathBuf::from(v);
        } else if arg == "--no-tangent-space" {
            self.use_tangent_space = false;
        } else if arg.starts_with("--") {
            log::warn!("unknown argument {:?}", arg);
        } else {
            self.model = PathBuf::from(arg);
        }
    }

    pub fn search(&self) -> &AssetSearch {
        &self.load.search
    }
}

/// A single window dimension, at least 1. Malformed values are warned about.
fn parse_dimension(name: &str, v: &str) -> Option<u32> {
    match v.parse::<u32>() {
        Ok(value) => Some(value.max(1)),
        Err(_) => {
            log::warn!("ignoring malformed {} {:?}, expected a positive integer", name, v);
            None
        }
    }
}

/// `1280x720` or `1280X720`.
fn parse_size(v: &str) -> Option<(u32, u32)> {
    let (w, h) = v.split_once('x').or_else(|| v.split_once('X'))?;
    Some((w.parse::<u32>().ok()?.max(1), h.parse::<u32>().ok()?.max(1)))
}
