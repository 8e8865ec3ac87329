//! Image inspection, validation and re-encoding

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView, ImageFormat, RgbImage};
use serde::Serialize;
use std::io::Cursor;
use tracing::debug;

use crate::config::GalleryConfig;
use crate::error::{AppError, Result};
use crate::response::base64;

/// Largest input accepted for generation uploads
pub const MAX_GENERATION_INPUT_BYTES: usize = 50 * 1024 * 1024;
const MIN_GENERATION_SIDE: u32 = 64;
const MAX_GENERATION_PIXELS: u64 = 9_437_184;
const MIN_ASPECT_RATIO: f64 = 0.4;
const MAX_ASPECT_RATIO: f64 = 2.5;

/// Detect image format from binary data using magic bytes
pub fn detect_format(data: &[u8]) -> Option<ImageFormat> {
    if data.len() < 8 {
        return None;
    }

    // PNG: 89 50 4E 47 0D 0A 1A 0A
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some(ImageFormat::Png);
    }

    // JPEG: FF D8 FF
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(ImageFormat::Jpeg);
    }

    // WebP: RIFF....WEBP
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some(ImageFormat::WebP);
    }

    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some(ImageFormat::Gif);
    }

    if data.starts_with(b"BM") {
        return Some(ImageFormat::Bmp);
    }

    None
}

/// Upper-case format label reported to clients
pub fn format_label(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "JPEG",
        ImageFormat::Png => "PNG",
        ImageFormat::WebP => "WEBP",
        ImageFormat::Gif => "GIF",
        ImageFormat::Bmp => "BMP",
        _ => "UNKNOWN",
    }
}

/// Lower-case subtype used in media types and file names
pub fn format_subtype(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png => "png",
        ImageFormat::WebP => "webp",
        ImageFormat::Gif => "gif",
        ImageFormat::Bmp => "bmp",
        _ => "octet-stream",
    }
}

fn is_supported(format: ImageFormat) -> bool {
    matches!(format, ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP)
}

/// Pixel layout named the way image editors label it
fn color_mode(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 => "L",
        ColorType::La8 | ColorType::La16 => "LA",
        ColorType::L16 => "I;16",
        ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => "RGBA",
        _ => "RGB",
    }
}

/// Decode an image of a supported format
pub fn decode(data: &[u8]) -> Result<(DynamicImage, ImageFormat)> {
    let format = detect_format(data)
        .ok_or_else(|| AppError::InvalidRequest("Invalid image file".into()))?;
    if !is_supported(format) {
        return Err(AppError::InvalidRequest(
            "Unsupported format. Allowed: JPEG, PNG, WebP".into(),
        ));
    }
    let image = image::load_from_memory_with_format(data, format)?;
    Ok((image, format))
}

/// Dimensions of encoded image bytes, when they can be decoded
pub fn dimensions(data: &[u8]) -> Option<(u32, u32)> {
    decode(data).ok().map(|(image, _)| image.dimensions())
}

/// An image re-encoded for storage
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub data: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl ProcessedImage {
    pub fn data_uri(&self) -> String {
        base64::image_data_uri(&self.data, format_subtype(self.format))
    }
}

/// Validate and normalize an uploaded gallery image.
///
/// Transparency is flattened onto white, the image is scaled down to fit a
/// `max_dimension` square and re-encoded in its original format.
pub fn process_upload(data: &[u8], config: &GalleryConfig) -> Result<ProcessedImage> {
    let max_bytes = config.max_upload_mb * 1024 * 1024;
    if data.len() > max_bytes {
        return Err(AppError::InvalidRequest(format!(
            "File too large. Maximum size is {}MB",
            config.max_upload_mb
        )));
    }

    let (image, format) = decode(data)?;
    let (orig_width, orig_height) = image.dimensions();

    let mut rgb = DynamicImage::ImageRgb8(flatten_to_rgb(image));
    if orig_width > config.max_dimension || orig_height > config.max_dimension {
        rgb = rgb.resize(config.max_dimension, config.max_dimension, FilterType::Lanczos3);
    }
    let (width, height) = rgb.dimensions();

    let mut encoded = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut encoded, config.jpeg_quality);
            rgb.write_with_encoder(encoder)?;
        }
        other => rgb.write_to(&mut Cursor::new(&mut encoded), other)?,
    }

    debug!(
        format = format_subtype(format),
        orig_width,
        orig_height,
        width,
        height,
        bytes = encoded.len(),
        "Processed uploaded image"
    );

    Ok(ProcessedImage {
        data: encoded,
        format,
        width,
        height,
    })
}

/// Composite any alpha channel onto a white background
fn flatten_to_rgb(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.into_rgb8();
    }

    let rgba = image.into_rgba8();
    let (width, height) = rgba.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as u16;
        let blend = |c: u8| ((c as u16 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Facts about an uploaded image
#[derive(Debug, Clone, Serialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub mode: String,
    pub file_size: usize,
    pub aspect_ratio: f64,
}

/// Outcome of checking an image against the generation input rules
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub message: String,
    pub file_info: Option<ImageInfo>,
}

impl ValidationReport {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
            file_info: None,
        }
    }
}

/// Check an image against the provider's input limits, collecting every violation
pub fn validate_for_generation(data: &[u8]) -> ValidationReport {
    let format = match detect_format(data) {
        Some(format) => format,
        None => return ValidationReport::rejected("Invalid image file"),
    };
    let image = match image::load_from_memory_with_format(data, format) {
        Ok(image) => image,
        Err(e) => return ValidationReport::rejected(format!("Invalid image file: {}", e)),
    };

    let (width, height) = image.dimensions();
    let aspect_ratio = width as f64 / height.max(1) as f64;
    let mut errors = Vec::new();

    if data.len() > MAX_GENERATION_INPUT_BYTES {
        errors.push(format!(
            "File size exceeds {}MB",
            MAX_GENERATION_INPUT_BYTES / (1024 * 1024)
        ));
    }
    if width < MIN_GENERATION_SIDE || height < MIN_GENERATION_SIDE {
        errors.push(format!(
            "Image resolution is smaller than {}x{}",
            MIN_GENERATION_SIDE, MIN_GENERATION_SIDE
        ));
    }
    if width as u64 * height as u64 > MAX_GENERATION_PIXELS {
        errors.push(format!("Image exceeds {} pixels", MAX_GENERATION_PIXELS));
    }
    if !(MIN_ASPECT_RATIO..=MAX_ASPECT_RATIO).contains(&aspect_ratio) {
        errors.push("Aspect ratio is outside the supported range (1:2.5 to 2.5:1)".to_string());
    }
    if !is_supported(format) {
        errors.push("Unsupported image format. Supported formats: JPEG, PNG, WEBP".to_string());
    }

    let info = ImageInfo {
        width,
        height,
        format: format_label(format).to_string(),
        mode: color_mode(image.color()).to_string(),
        file_size: data.len(),
        aspect_ratio: (aspect_ratio * 100.0).round() / 100.0,
    };

    ValidationReport {
        valid: errors.is_empty(),
        message: if errors.is_empty() {
            "Valid image file".to_string()
        } else {
            errors.join("; ")
        },
        file_info: Some(info),
    }
}
