//! Unit tests for data URI and image helpers

use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

use classroom_gateway::config::GalleryConfig;
use classroom_gateway::response::{base64, image as images};
use classroom_gateway::AppError;

fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

#[test]
fn test_data_uri_round_trip() {
    let uri = base64::image_data_uri(b"Hello, World!", "webp");
    assert_eq!(uri, "data:image/webp;base64,SGVsbG8sIFdvcmxkIQ==");
    assert_eq!(base64::decode(&uri).unwrap(), b"Hello, World!");
}

#[test]
fn test_decode_tolerates_surrounding_whitespace() {
    assert_eq!(base64::decode("  SGk=\n").unwrap(), b"Hi");
    assert!(matches!(
        base64::decode("data:image/png;base64,@@@"),
        Err(AppError::InvalidRequest(_))
    ));
}

#[test]
fn test_text_data_uri_decodes_payload_only() {
    let uri = base64::data_uri(b"notes", "text/plain");
    assert!(uri.starts_with("data:text/plain;base64,"));
    assert_eq!(base64::decode(&uri).unwrap(), b"notes");
}

#[test]
fn test_detect_format_rejects_unknown_bytes() {
    assert_eq!(images::detect_format(b"GIF89a\0\0\0\0"), Some(ImageFormat::Gif));
    assert_eq!(images::detect_format(b"%PDF-1.4 trailer"), None);
}

#[test]
fn test_jpeg_upload_keeps_format_and_fits_limit() {
    let jpeg = encode(DynamicImage::new_rgb8(400, 200), ImageFormat::Jpeg);
    let config = GalleryConfig {
        max_dimension: 200,
        jpeg_quality: 70,
        ..GalleryConfig::default()
    };

    let processed = images::process_upload(&jpeg, &config).unwrap();
    assert_eq!(processed.format, ImageFormat::Jpeg);
    assert_eq!((processed.width, processed.height), (200, 100));
    assert!(processed.data_uri().starts_with("data:image/jpeg;base64,"));
    assert_eq!(images::dimensions(&processed.data), Some((200, 100)));
}

#[test]
fn test_transparent_png_is_flattened_on_upload() {
    let mut img = RgbaImage::new(4, 4);
    for pixel in img.pixels_mut() {
        *pixel = Rgba([0, 0, 0, 0]);
    }
    let png = encode(DynamicImage::ImageRgba8(img), ImageFormat::Png);

    let processed = images::process_upload(&png, &GalleryConfig::default()).unwrap();
    assert_eq!((processed.width, processed.height), (4, 4));

    let decoded = image::load_from_memory(&processed.data).unwrap();
    assert!(!decoded.color().has_alpha());
    assert_eq!(decoded.get_pixel(2, 2).0, [255, 255, 255, 255]);
}

#[test]
fn test_upload_rejects_non_images() {
    let err = images::process_upload(b"plain text, not pixels", &GalleryConfig::default())
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid image file");
}

#[test]
fn test_generation_validation_of_wide_image() {
    let wide = encode(DynamicImage::new_rgba8(300, 100), ImageFormat::Png);

    let report = images::validate_for_generation(&wide);
    assert!(!report.valid);
    assert!(report.message.contains("Aspect ratio"));
    assert!(!report.message.contains("smaller than"));

    let info = report.file_info.unwrap();
    assert_eq!((info.width, info.height), (300, 100));
    assert_eq!(info.mode, "RGBA");
    assert_eq!(info.aspect_ratio, 3.0);
    assert_eq!(info.file_size, wide.len());
}
