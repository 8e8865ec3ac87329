//! Functional tests for the image generation endpoints

#[path = "../common/mod.rs"]
mod common;

use axum::http::{
    header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    StatusCode,
};
use tower::ServiceExt;

use classroom_gateway::backend::traits::ImageTier;
use common::*;

fn app_with(images: std::sync::Arc<FakeImageGenerator>) -> axum::Router {
    test_app_with(
        test_settings(),
        MemoryStore::new(),
        FakeChatModel::replying(&["ok"]),
        images,
    )
}

#[tokio::test]
async fn test_core_generation_returns_attachment() {
    let images = FakeImageGenerator::new();
    let request = MultipartForm::new()
        .text("prompt", "  a friendly robot teacher  ")
        .text("aspect_ratio", "16:9")
        .text("output_format", "png")
        .text("style_preset", "")
        .text("seed", "42")
        .into_request("/image/generate/core");

    let response = app_with(images.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "image/png");
    let disposition = response.headers()[CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment; filename=core_image_"));
    assert!(disposition.ends_with(".png"));
    assert_eq!(body_bytes(response).await, png_bytes(64, 48));

    let sent = images.requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].tier, ImageTier::Core);
    assert_eq!(sent[0].prompt, "a friendly robot teacher");
    assert_eq!(sent[0].aspect_ratio.as_deref(), Some("16:9"));
    assert_eq!(sent[0].style_preset, None);
    assert_eq!(sent[0].seed, Some(42));
}

#[tokio::test]
async fn test_generation_validation_errors() {
    let cases = [
        MultipartForm::new()
            .text("prompt", "   ")
            .into_request("/image/generate/core"),
        MultipartForm::new()
            .text("prompt", "cat")
            .text("output_format", "gif")
            .into_request("/image/generate/core"),
        MultipartForm::new()
            .text("prompt", "cat")
            .text("seed", "-1")
            .into_request("/image/generate/ultra"),
        MultipartForm::new()
            .text("prompt", "cat")
            .text("mode", "image-to-image")
            .text("strength", "0.5")
            .into_request("/image/generate/sd35"),
        MultipartForm::new()
            .text("prompt", "cat")
            .text("cfg_scale", "11")
            .into_request("/image/generate/sd35"),
        MultipartForm::new()
            .text("prompt", "cat")
            .into_request("/image/control/sketch"),
    ];

    let images = FakeImageGenerator::new();
    for request in cases {
        let uri = request.uri().to_string();
        let response = app_with(images.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
    }
    assert!(images.requests().is_empty());
}

#[tokio::test]
async fn test_sd35_image_to_image() {
    let images = FakeImageGenerator::new();
    let request = MultipartForm::new()
        .text("prompt", "make it autumn")
        .text("mode", "image-to-image")
        .text("model", "sd3.5-medium")
        .text("strength", "0.6")
        .text("output_format", "jpeg")
        .file("image", "tree.png", "image/png", &png_bytes(80, 80))
        .into_request("/api/image/generate/sd35");

    let response = app_with(images.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "image/jpeg");
    let disposition = response.headers()[CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.contains("sd35_i2i_"));

    let sent = &images.requests()[0];
    assert_eq!(sent.mode.as_deref(), Some("image-to-image"));
    assert_eq!(sent.model.as_deref(), Some("sd3.5-medium"));
    assert_eq!(sent.strength, Some(0.6));
    assert_eq!(sent.aspect_ratio, None);
    assert!(sent.image.is_some());
}

#[tokio::test]
async fn test_sketch_defaults_control_strength() {
    let images = FakeImageGenerator::new();
    let request = MultipartForm::new()
        .text("prompt", "a castle")
        .file("image", "sketch.png", "image/png", &png_bytes(64, 64))
        .into_request("/image/control/sketch");

    let response = app_with(images.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(images.requests()[0].control_strength, Some(0.7));
}

#[tokio::test]
async fn test_educational_generation_summary() {
    let images = FakeImageGenerator::new();
    let request = MultipartForm::new()
        .text("prompt", "the water cycle")
        .text("subject", "science")
        .text("grade_level", "4")
        .text("style", "illustration")
        .into_request("/image/generate/educational");

    let response = app_with(images.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["credits_used"], 3);
    assert_eq!(body["model_used"], "stable-image-core");
    assert_eq!(body["width"], 64);
    assert_eq!(body["height"], 48);
    assert!(body["image"].as_str().unwrap().starts_with("data:image/png;base64,"));
    assert!(body["filename"].as_str().unwrap().starts_with("core_image_"));

    let sent = &images.requests()[0];
    assert_eq!(
        sent.prompt,
        "Educational illustration for science suitable for grade 4: the water cycle, \
         clear and simple, educational style, colorful, engaging"
    );
    assert_eq!(sent.aspect_ratio.as_deref(), Some("16:9"));
    assert_eq!(sent.style_preset, None);
    assert!(sent.negative_prompt.is_some());
}

#[tokio::test]
async fn test_quick_generation_uses_square_png() {
    let images = FakeImageGenerator::new();
    let request = MultipartForm::new()
        .text("prompt", "a happy sun")
        .text("style", "anime")
        .into_request("/image/generate/quick");

    let response = app_with(images.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let sent = &images.requests()[0];
    assert_eq!(sent.output_format, "png");
    assert_eq!(sent.aspect_ratio.as_deref(), Some("1:1"));
    assert_eq!(sent.style_preset.as_deref(), Some("anime"));
}

#[tokio::test]
async fn test_validate_endpoint() {
    let request = MultipartForm::new()
        .file("image", "ok.png", "image/png", &png_bytes(128, 96))
        .into_request("/image/validate");
    let body = body_json(app_with(FakeImageGenerator::new()).oneshot(request).await.unwrap()).await;
    assert_eq!(body["valid"], true);
    assert_eq!(body["message"], "Valid image file");
    assert_eq!(body["file_info"]["width"], 128);
    assert_eq!(body["file_info"]["format"], "PNG");
    assert_eq!(body["file_info"]["aspect_ratio"], 1.33);

    let request = MultipartForm::new()
        .file("image", "tiny.png", "image/png", &png_bytes(32, 32))
        .into_request("/image/validate");
    let body = body_json(app_with(FakeImageGenerator::new()).oneshot(request).await.unwrap()).await;
    assert_eq!(body["valid"], false);
    assert!(body["message"].as_str().unwrap().contains("smaller than 64x64"));

    let request = MultipartForm::new()
        .file("image", "doc.pdf", "application/pdf", b"%PDF-1.4")
        .into_request("/image/validate");
    let body = body_json(app_with(FakeImageGenerator::new()).oneshot(request).await.unwrap()).await;
    assert_eq!(body["valid"], false);
    assert!(body["file_info"].is_null());
}

#[tokio::test]
async fn test_metadata_endpoints() {
    let body = body_json(app_with(FakeImageGenerator::new()).oneshot(get("/image/constants")).await.unwrap()).await;
    assert_eq!(body["output_formats"].as_array().unwrap().len(), 3);
    assert_eq!(body["aspect_ratios"].as_object().unwrap().len(), 9);
    assert_eq!(body["generation_modes"]["text-to-image"], "Text To Image");

    let body = body_json(
        app_with(FakeImageGenerator::new())
            .oneshot(get("/image/model-info/ultra"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["credits_required"], 8);

    let response = app_with(FakeImageGenerator::new())
        .oneshot(get("/image/model-info/dalle"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(
        app_with(FakeImageGenerator::new())
            .oneshot(get("/image/educational-prompts?subject=math"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body, serde_json::json!({"all_subjects": {}}));
}

#[tokio::test]
async fn test_health_reflects_credentials() {
    let body = body_json(app_with(FakeImageGenerator::new()).oneshot(get("/image/health")).await.unwrap()).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["api_available"], true);
    assert_eq!(body["service"], "stability-ai");

    let body = body_json(
        app_with(FakeImageGenerator::unconfigured())
            .oneshot(get("/api/image/health"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["api_available"], false);
}
