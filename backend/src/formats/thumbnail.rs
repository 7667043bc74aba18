//! Thumbnail validation.
//!
//! Only the image header is decoded: dimensions are read from the PNG IHDR
//! chunk or the first JPEG start-of-frame marker.

use serde::Serialize;

use super::KB;
use crate::error::{Rejection, SubReason};

pub const THUMBNAIL_MAX_BYTES: u64 = 200 * KB;
pub const THUMBNAIL_WIDTH: u32 = 400;
pub const THUMBNAIL_HEIGHT: u32 = 300;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_SOI: &[u8] = &[0xFF, 0xD8, 0xFF];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// Detect the image format from magic bytes.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    if bytes.starts_with(PNG_SIGNATURE) {
        Some(ImageFormat::Png)
    } else if bytes.starts_with(JPEG_SOI) {
        Some(ImageFormat::Jpeg)
    } else {
        None
    }
}

fn undecodable(format: ImageFormat) -> Rejection {
    Rejection::thumbnail(
        SubReason::WrongFormat,
        format!("Thumbnail {} header could not be decoded", format.extension()),
    )
}

fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    // signature, IHDR length, "IHDR", width, height
    if bytes.len() < 24 || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(bytes[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(bytes[20..24].try_into().ok()?);
    Some((width, height))
}

fn jpeg_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let mut pos = 2;
    loop {
        while *bytes.get(pos)? != 0xFF {
            pos += 1;
        }
        while *bytes.get(pos)? == 0xFF {
            pos += 1;
        }
        let marker = *bytes.get(pos)?;
        pos += 1;

        // standalone markers carry no length
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            continue;
        }
        if marker == 0xD9 || marker == 0xDA {
            return None;
        }

        let len = u16::from_be_bytes([*bytes.get(pos)?, *bytes.get(pos + 1)?]) as usize;
        if len < 2 {
            return None;
        }
        let is_sof = (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            let height = u16::from_be_bytes([*bytes.get(pos + 3)?, *bytes.get(pos + 4)?]);
            let width = u16::from_be_bytes([*bytes.get(pos + 5)?, *bytes.get(pos + 6)?]);
            return Some((width as u32, height as u32));
        }
        pos += len;
    }
}

/// Validate size, format and dimensions, in that order.
pub fn validate_thumbnail(bytes: &[u8], truncated: bool) -> Result<ImageInfo, Rejection> {
    let size = bytes.len() as u64;
    if truncated || size > THUMBNAIL_MAX_BYTES {
        return Err(Rejection::thumbnail(
            SubReason::FileTooLarge,
            format!("Thumbnail exceeds the {} byte limit", THUMBNAIL_MAX_BYTES),
        )
        .with_detail("max_bytes", THUMBNAIL_MAX_BYTES)
        .with_detail("actual_bytes", size));
    }

    let format = detect_format(bytes).ok_or_else(|| {
        Rejection::thumbnail(SubReason::WrongFormat, "Thumbnail must be a PNG or JPEG image")
            .with_detail("allowed_formats", ["png", "jpeg"])
    })?;

    let (width, height) = match format {
        ImageFormat::Png => png_dimensions(bytes),
        ImageFormat::Jpeg => jpeg_dimensions(bytes),
    }
    .ok_or_else(|| undecodable(format))?;

    if width != THUMBNAIL_WIDTH || height != THUMBNAIL_HEIGHT {
        return Err(Rejection::thumbnail(
            SubReason::WrongDimensions,
            format!(
                "Thumbnail must be exactly {}x{}, got {}x{}",
                THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT, width, height
            ),
        )
        .with_detail(
            "expected",
            serde_json::json!({ "width": THUMBNAIL_WIDTH, "height": THUMBNAIL_HEIGHT }),
        )
        .with_detail("actual", serde_json::json!({ "width": width, "height": height })));
    }

    Ok(ImageInfo {
        format,
        width,
        height,
    })
}
