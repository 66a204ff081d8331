//! Image preprocessing: arbitrary raster → downscaled base64 JPEG.
//!
//! Vision APIs bill by image tiles and reject oversized uploads, while a
//! phone camera produces 12+ megapixel photos. Scaling so the longest side is
//! at most `max_dimension` and re-encoding as JPEG keeps the request small
//! without losing the printed text a receipt is made of.
//!
//! Decoding is the only memory-hungry step, so it runs under an
//! [`image::Limits`] budget: a photo that would exceed it fails with
//! [`ReceiptError::ImageTooLarge`] rather than aborting the process.

use crate::config::ExtractionConfig;
use crate::error::{ReceiptError, UnreadableCause};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, ImageReader, Limits};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where the receipt image comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// A file on disk.
    Path(PathBuf),
    /// Already-loaded encoded image bytes (PNG, JPEG).
    Bytes(Vec<u8>),
}

impl From<PathBuf> for ImageSource {
    fn from(p: PathBuf) -> Self {
        ImageSource::Path(p)
    }
}

impl From<&Path> for ImageSource {
    fn from(p: &Path) -> Self {
        ImageSource::Path(p.to_path_buf())
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        ImageSource::Bytes(bytes)
    }
}

/// A compressed image ready to embed in a provider request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Base64 (standard alphabet, no line wrapping) of the JPEG bytes.
    pub data: String,
    /// Always `image/jpeg`.
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Compute the output size for a `width × height` source.
///
/// The factor is `min(max / width, max / height)`, so neither side exceeds
/// `max` and the aspect ratio is kept. With `allow_upscale` the factor may
/// exceed 1 for small images; without it, small images keep their size.
/// Sides are truncated and never drop below one pixel.
pub fn target_dimensions(width: u32, height: u32, max: u32, allow_upscale: bool) -> (u32, u32) {
    let ratio = (max as f64 / width.max(1) as f64).min(max as f64 / height.max(1) as f64);
    let ratio = if allow_upscale { ratio } else { ratio.min(1.0) };
    // Nudge before truncating so 1024/4000 * 4000 lands on 1024, not 1023.
    let w = ((width as f64 * ratio + 1e-6) as u32).max(1);
    let h = ((height as f64 * ratio + 1e-6) as u32).max(1);
    (w, h)
}

/// Load and compress an image source.
///
/// Blocking: call from `spawn_blocking` when on an async runtime.
pub fn compress(source: &ImageSource, config: &ExtractionConfig) -> Result<EncodedImage, ReceiptError> {
    match source {
        ImageSource::Path(path) => {
            let bytes = read_image_file(path)?;
            compress_bytes(&bytes, config).map_err(|e| attach_path(e, path))
        }
        ImageSource::Bytes(bytes) => compress_bytes(bytes, config),
    }
}

/// Compress already-loaded image bytes.
pub fn compress_bytes(bytes: &[u8], config: &ExtractionConfig) -> Result<EncodedImage, ReceiptError> {
    let decoded = decode(bytes, config.max_decode_bytes)?;
    let (src_w, src_h) = (decoded.width(), decoded.height());
    let (w, h) = target_dimensions(src_w, src_h, config.max_dimension, config.allow_upscale);

    let resized = if (w, h) == (src_w, src_h) {
        decoded.into_rgb8()
    } else {
        let scaled = decoded.resize_exact(w, h, FilterType::Triangle).into_rgb8();
        drop(decoded);
        scaled
    };

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, config.jpeg_quality)
        .encode_image(&resized)
        .map_err(classify_image_error)?;
    drop(resized);

    let data = STANDARD.encode(&jpeg);
    debug!(
        "Compressed {}x{} → {}x{}: {} bytes JPEG, {} bytes base64",
        src_w,
        src_h,
        w,
        h,
        jpeg.len(),
        data.len()
    );

    Ok(EncodedImage {
        data,
        mime_type: "image/jpeg",
        width: w,
        height: h,
    })
}

fn decode(bytes: &[u8], max_alloc: u64) -> Result<DynamicImage, ReceiptError> {
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ReceiptError::ImageUnreadable {
            path: None,
            cause: UnreadableCause::Corrupt,
            detail: e.to_string(),
        })?;

    let mut limits = Limits::default();
    limits.max_alloc = Some(max_alloc);
    reader.limits(limits);

    reader.decode().map_err(classify_image_error)
}

fn read_image_file(path: &Path) -> Result<Vec<u8>, ReceiptError> {
    std::fs::read(path).map_err(|e| {
        let cause = match e.kind() {
            std::io::ErrorKind::NotFound => UnreadableCause::NotFound,
            std::io::ErrorKind::PermissionDenied => UnreadableCause::PermissionDenied,
            _ => UnreadableCause::Corrupt,
        };
        ReceiptError::ImageUnreadable {
            path: Some(path.to_path_buf()),
            cause,
            detail: e.to_string(),
        }
    })
}

fn classify_image_error(e: ImageError) -> ReceiptError {
    match e {
        ImageError::Limits(l) => ReceiptError::ImageTooLarge {
            detail: l.to_string(),
        },
        ImageError::IoError(io) if io.kind() == std::io::ErrorKind::OutOfMemory => {
            ReceiptError::ImageTooLarge {
                detail: io.to_string(),
            }
        }
        other => ReceiptError::ImageUnreadable {
            path: None,
            cause: UnreadableCause::Corrupt,
            detail: other.to_string(),
        },
    }
}

fn attach_path(e: ReceiptError, source_path: &Path) -> ReceiptError {
    match e {
        ReceiptError::ImageUnreadable {
            path: None,
            cause,
            detail,
        } => ReceiptError::ImageUnreadable {
            path: Some(source_path.to_path_buf()),
            cause,
            detail,
        },
        other => other,
    }
}
