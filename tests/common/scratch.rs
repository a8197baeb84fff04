//! Scratch directories and PNG fixtures, shared by the unit and integration
//! tests.
#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT: AtomicU32 = AtomicU32::new(0);

/// A fresh directory under the system temp dir, removed on drop.
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn new(tag: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "pbr-viewer-test-{}-{}-{}",
            tag,
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = std::fs::remove_dir_all(&path);
        std::fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

fn image(width: u32, height: u32, channels: u8) -> image::DynamicImage {
    match channels {
        1 => image::DynamicImage::ImageLuma8(image::GrayImage::new(width, height)),
        2 => image::DynamicImage::ImageLumaA8(image::GrayAlphaImage::new(width, height)),
        3 => image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height)),
        _ => image::DynamicImage::ImageRgba8(image::RgbaImage::new(width, height)),
    }
}

/// Write a PNG with 1, 2, 3 or 4 channels, creating parent directories.
pub fn write_png(path: &Path, width: u32, height: u32, channels: u8) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    image(width, height, channels).save(path).unwrap();
}

/// Write an RGB PNG filled with one colour.
pub fn write_rgb_png(path: &Path, width: u32, height: u32, rgb: [u8; 3]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    image::RgbImage::from_pixel(width, height, image::Rgb(rgb))
        .save(path)
        .unwrap();
}

pub fn png_bytes(width: u32, height: u32, channels: u8) -> Vec<u8> {
    encode_png(image(width, height, channels))
}

pub fn rgb_png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    encode_png(image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        width,
        height,
        image::Rgb(rgb),
    )))
}

fn encode_png(img: image::DynamicImage) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    bytes.into_inner()
}
