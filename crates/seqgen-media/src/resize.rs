//! Reference image resizing.
//!
//! Reference images must match the requested video size exactly, so the
//! image is scaled to cover the target and center-cropped, then re-encoded
//! as JPEG. Transparent pixels are flattened onto white.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, Rgb, RgbImage};
use seqgen_models::VideoSize;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// JPEG quality used for resized reference images.
pub const JPEG_QUALITY: u8 = 95;

/// Resizes an image file the caller owns.
#[async_trait]
pub trait ImageResizer: Send + Sync {
    /// Resize `path` to exactly `size` and return the new path.
    ///
    /// The returned path may differ from the input (format change).
    async fn resize(&self, path: &Path, size: VideoSize) -> MediaResult<PathBuf>;
}

/// Crop-to-fill resizer producing JPEG files.
#[derive(Debug, Clone)]
pub struct JpegResizer {
    quality: u8,
}

impl Default for JpegResizer {
    fn default() -> Self {
        Self {
            quality: JPEG_QUALITY,
        }
    }
}

impl JpegResizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }
}

#[async_trait]
impl ImageResizer for JpegResizer {
    async fn resize(&self, path: &Path, size: VideoSize) -> MediaResult<PathBuf> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        let source = path.to_path_buf();
        let quality = self.quality;
        let output = tokio::task::spawn_blocking(move || resize_to_jpeg(&source, size, quality))
            .await
            .map_err(|e| MediaError::internal(format!("Resize task failed: {}", e)))??;

        info!(
            "Resized reference image {} -> {} ({})",
            path.display(),
            output.display(),
            size
        );
        Ok(output)
    }
}

/// Blocking crop-to-fill resize. Deletes the source when the output path differs.
fn resize_to_jpeg(path: &Path, size: VideoSize, quality: u8) -> MediaResult<PathBuf> {
    let img = image::open(path)?;
    let flattened = DynamicImage::ImageRgb8(flatten_on_white(&img));
    let filled = flattened
        .resize_to_fill(size.width, size.height, FilterType::Lanczos3)
        .to_rgb8();

    let jpeg_path = path.with_extension("jpg");
    let mut writer = BufWriter::new(File::create(&jpeg_path)?);
    JpegEncoder::new_with_quality(&mut writer, quality).encode(
        filled.as_raw(),
        filled.width(),
        filled.height(),
        ColorType::Rgb8,
    )?;
    writer.flush()?;

    if jpeg_path != path {
        if let Err(e) = std::fs::remove_file(path) {
            debug!("Could not remove original image {}: {}", path.display(), e);
        }
    }

    Ok(jpeg_path)
}

fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn write_png(dir: &TempDir, name: &str, width: u32, height: u32, px: Rgba<u8>) -> PathBuf {
        let path = dir.path().join(name);
        RgbaImage::from_pixel(width, height, px).save(&path).unwrap();
        path
    }

    #[tokio::test]
    async fn test_resize_yields_exact_dimensions() {
        let dir = TempDir::new().unwrap();
        let resizer = JpegResizer::new();
        let target = VideoSize::new(64, 112);

        for (i, (w, h)) in [(300, 100), (100, 300), (64, 112), (10, 10)].into_iter().enumerate() {
            let src = write_png(&dir, &format!("ref_{}.png", i), w, h, Rgba([10, 20, 30, 255]));
            let out = resizer.resize(&src, target).await.unwrap();

            let img = image::open(&out).unwrap();
            assert_eq!((img.width(), img.height()), (64, 112), "input {}x{}", w, h);
            assert_eq!(out.extension().and_then(|e| e.to_str()), Some("jpg"));
            assert!(!src.exists(), "original should be removed");
        }
    }

    #[tokio::test]
    async fn test_transparency_is_flattened_on_white() {
        let dir = TempDir::new().unwrap();
        let src = write_png(&dir, "clear.png", 40, 40, Rgba([0, 0, 0, 0]));

        let out = JpegResizer::new()
            .resize(&src, VideoSize::new(20, 20))
            .await
            .unwrap();

        let px = image::open(&out).unwrap().to_rgb8().get_pixel(10, 10).0;
        assert!(px.iter().all(|c| *c > 240), "got {:?}", px);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = JpegResizer::new()
            .resize(&dir.path().join("nope.png"), VideoSize::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
