//! Upload checks, normalization to RGB PNG, and export helpers.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use promptcanvas_contracts::result::ImageData;
use promptcanvas_contracts::settings::AppSettings;

const MIB: f64 = 1024.0 * 1024.0;

/// Reads an upload from disk. The size limit is checked before the file is read.
pub fn read_upload(path: &Path, settings: &AppSettings) -> Result<ImageData> {
    let size = fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?
        .len();
    ensure_size(size, settings)?;
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    prepare_upload(bytes, file_name, settings)
}

/// Validates size and extension, then returns the image as RGB PNG no larger
/// than `max_input_dimension` on either side.
pub fn prepare_upload(
    bytes: Vec<u8>,
    file_name: &str,
    settings: &AppSettings,
) -> Result<ImageData> {
    ensure_size(bytes.len() as u64, settings)?;
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    if !settings.is_supported_format(extension) {
        bail!(
            "unsupported image type {:?}; expected one of {}",
            file_name,
            settings.supported_formats.join(", ")
        );
    }

    let format = image::guess_format(&bytes).context("unrecognized image data")?;
    let decoded = image::load_from_memory_with_format(&bytes, format)
        .with_context(|| format!("failed to decode {file_name}"))?;
    let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());
    let fitted = fit_within(rgb, settings.max_input_dimension);
    Ok(ImageData::new(encode_png(&fitted)?, "image/png"))
}

fn ensure_size(size: u64, settings: &AppSettings) -> Result<()> {
    if size > settings.max_upload_bytes {
        bail!(
            "image is {:.1} MiB; the limit is {:.0} MiB",
            size as f64 / MIB,
            settings.max_upload_bytes as f64 / MIB
        );
    }
    Ok(())
}

/// Downscales with Lanczos so the longer side is at most `max_dimension`. Aspect ratio is kept.
pub fn fit_within(image: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if max_dimension == 0 || (width <= max_dimension && height <= max_dimension) {
        return image;
    }
    image.resize(max_dimension, max_dimension, FilterType::Lanczos3)
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .context("failed to encode PNG")?;
    Ok(out.into_inner())
}

/// PNG bytes for `image`, re-encoding when it is stored in another format.
pub fn to_png(image: &ImageData) -> Result<Vec<u8>> {
    if image.mime_type == "image/png" {
        return Ok(image.bytes.clone());
    }
    let decoded = image::load_from_memory(&image.bytes)
        .with_context(|| format!("failed to decode {} image", image.mime_type))?;
    encode_png(&decoded)
}

pub fn download_file_name(key: &str) -> String {
    let key: String = key
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    format!("generated_image_{key}.png")
}

/// Writes `image` as PNG to `path`, or to `download_file_name(key)` inside `dir`
/// when `path` is `None`.
pub fn save_png(
    image: &ImageData,
    path: Option<&Path>,
    dir: &Path,
    key: &str,
) -> Result<PathBuf> {
    let target = match path {
        Some(path) => path.to_path_buf(),
        None => dir.join(download_file_name(key)),
    };
    if let Some(parent) = target.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&target, to_png(image)?)
        .with_context(|| format!("failed to write {}", target.display()))?;
    Ok(target)
}

pub fn to_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::test_support::png_bytes;

    fn rgba_png(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([10, 20, 30, 128]),
        ));
        encode_png(&image).expect("encode rgba fixture")
    }

    #[test]
    fn upload_is_converted_to_rgb_png() -> anyhow::Result<()> {
        let prepared = prepare_upload(rgba_png(8, 4), "photo.PNG", &AppSettings::default())?;
        assert_eq!(prepared.mime_type, "image/png");
        let decoded = image::load_from_memory(&prepared.bytes)?;
        assert_eq!(decoded.color(), image::ColorType::Rgb8);
        assert_eq!(decoded.dimensions(), (8, 4));
        Ok(())
    }

    #[test]
    fn large_upload_is_resized_keeping_aspect() -> anyhow::Result<()> {
        let settings = AppSettings {
            max_input_dimension: 64,
            ..AppSettings::default()
        };
        let prepared = prepare_upload(png_bytes(256, 128), "wide.png", &settings)?;
        let decoded = image::load_from_memory(&prepared.bytes)?;
        assert_eq!(decoded.dimensions(), (64, 32));
        Ok(())
    }

    #[test]
    fn upload_rejections() {
        let settings = AppSettings {
            max_upload_bytes: 16,
            ..AppSettings::default()
        };
        let too_big = prepare_upload(png_bytes(4, 4), "a.png", &settings);
        assert!(too_big.is_err_and(|err| err.to_string().contains("limit")));

        let defaults = AppSettings::default();
        assert!(prepare_upload(png_bytes(1, 1), "a.gif", &defaults).is_err());
        assert!(prepare_upload(b"plain text".to_vec(), "a.png", &defaults).is_err());
    }

    #[test]
    fn read_upload_from_disk() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("input.png");
        fs::write(&path, png_bytes(3, 3))?;
        let prepared = read_upload(&path, &AppSettings::default())?;
        assert_eq!(
            image::load_from_memory(&prepared.bytes)?.dimensions(),
            (3, 3)
        );

        let missing = temp.path().join("missing.png");
        assert!(read_upload(&missing, &AppSettings::default()).is_err());
        Ok(())
    }

    #[test]
    fn save_uses_download_name_by_default() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let image = ImageData::new(png_bytes(2, 2), "image/png");

        let saved = save_png(&image, None, temp.path(), "a1b2")?;
        assert_eq!(saved, temp.path().join("generated_image_a1b2.png"));
        assert_eq!(fs::read(&saved)?, image.bytes);

        let explicit = temp.path().join("nested").join("out.png");
        assert_eq!(
            save_png(&image, Some(&explicit), temp.path(), "x")?,
            explicit
        );
        assert!(explicit.exists());
        Ok(())
    }

    #[test]
    fn download_name_is_sanitized() {
        assert_eq!(download_file_name("3"), "generated_image_3.png");
        assert_eq!(download_file_name("a/b c"), "generated_image_a_b_c.png");
    }

    #[test]
    fn base64_is_standard_alphabet() {
        assert_eq!(to_base64(&[0xfb, 0xff]), "+/8=");
    }
}
