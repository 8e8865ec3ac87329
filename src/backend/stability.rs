//! Stability AI image generation client

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::backend::traits::{ImageGenerationRequest, ImageGenerator};
use crate::config::ImageConfig;
use crate::error::{AppError, Result};
use crate::response::base64;

const PROVIDER: &str = "Stability AI";

/// Multipart client for the v2beta stable-image endpoints
pub struct StabilityClient {
    client: Client,
    base_url: String,
    api_key: String,
}

/// JSON body returned when the provider does not answer with raw image bytes
#[derive(Debug, Deserialize)]
struct JsonImageResponse {
    #[serde(default)]
    artifacts: Vec<Artifact>,
    #[serde(default)]
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Artifact {
    base64: String,
}

impl StabilityClient {
    pub fn new(config: &ImageConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

/// Serialize a request as the provider's multipart form; unset options are omitted
fn build_form(request: ImageGenerationRequest) -> Result<Form> {
    let mut form = Form::new()
        .text("prompt", request.prompt)
        .text("output_format", request.output_format);

    let optional = [
        ("aspect_ratio", request.aspect_ratio),
        ("style_preset", request.style_preset.filter(|s| !s.is_empty())),
        ("negative_prompt", request.negative_prompt.filter(|s| !s.is_empty())),
        ("seed", request.seed.map(|v| v.to_string())),
        ("mode", request.mode),
        ("model", request.model),
        ("strength", request.strength.map(|v| v.to_string())),
        ("cfg_scale", request.cfg_scale.map(|v| v.to_string())),
        ("control_strength", request.control_strength.map(|v| v.to_string())),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            form = form.text(name, value);
        }
    }

    if let Some(image) = request.image {
        let part = Part::bytes(image.data)
            .file_name(image.file_name)
            .mime_str(&image.content_type)
            .map_err(|e| AppError::InvalidRequest(format!("Invalid image content type: {}", e)))?;
        form = form.part("image", part);
    }

    Ok(form)
}

#[async_trait]
impl ImageGenerator for StabilityClient {
    async fn generate(&self, request: ImageGenerationRequest) -> Result<Vec<u8>> {
        if !self.is_configured() {
            return Err(AppError::upstream(PROVIDER, None, "API key is not configured"));
        }

        let tier = request.tier;
        let url = format!("{}{}", self.base_url, tier.endpoint());
        let form = build_form(request)?;

        debug!(tier = tier.as_str(), url = %url, "Sending image generation request");
        let started = Instant::now();

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "image/*")
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout("image generation timed out".into())
                } else {
                    AppError::upstream(PROVIDER, None, format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(tier = tier.as_str(), status = %status, body = %body, "Image generation rejected");
            return Err(AppError::upstream(
                PROVIDER,
                Some(status.as_u16()),
                format!("API error: {} - {}", status.as_u16(), body),
            ));
        }

        let is_image = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("image/"))
            .unwrap_or(false);

        let data = if is_image {
            response.bytes().await?.to_vec()
        } else {
            let body: JsonImageResponse = response
                .json()
                .await
                .map_err(|e| AppError::upstream(PROVIDER, None, format!("invalid response: {}", e)))?;
            let encoded = body
                .artifacts
                .into_iter()
                .next()
                .map(|artifact| artifact.base64)
                .or(body.image)
                .ok_or_else(|| AppError::upstream(PROVIDER, None, "response carried no image"))?;
            base64::decode(&encoded)?
        };

        info!(
            tier = tier.as_str(),
            bytes = data.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Image generated"
        );
        Ok(data)
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}
