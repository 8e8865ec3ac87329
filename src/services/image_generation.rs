//! Image generation on top of the text-to-image provider

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::backend::traits::{ImageGenerationRequest, ImageTier, InputImage};
use crate::backend::ImageGenerator;
use crate::error::{AppError, Result};
use crate::response::{base64, image};
use crate::services::gallery::UploadedFile;

pub const OUTPUT_FORMATS: [&str; 3] = ["png", "jpeg", "webp"];

pub const ASPECT_RATIOS: [(&str, &str); 9] = [
    ("21:9", "Ultra wide (cinematic)"),
    ("16:9", "Landscape (presentations)"),
    ("3:2", "Landscape (photography)"),
    ("5:4", "Landscape (classic)"),
    ("1:1", "Square (social media)"),
    ("4:5", "Portrait (Instagram)"),
    ("2:3", "Portrait (posters)"),
    ("9:16", "Portrait (mobile)"),
    ("9:21", "Ultra portrait"),
];

pub const STYLE_PRESETS: [(&str, &str); 18] = [
    ("", "Default style"),
    ("3d-model", "3D model"),
    ("analog-film", "Analog film"),
    ("anime", "Japanese animation"),
    ("cinematic", "Cinematic"),
    ("comic-book", "Comic book"),
    ("digital-art", "Digital art"),
    ("enhance", "Enhanced quality"),
    ("fantasy-art", "Fantasy art"),
    ("isometric", "Isometric"),
    ("line-art", "Line art"),
    ("low-poly", "Low poly"),
    ("modeling-compound", "Modeling compound"),
    ("neon-punk", "Neon punk"),
    ("origami", "Origami"),
    ("photographic", "Photorealistic"),
    ("pixel-art", "Pixel art"),
    ("tile-texture", "Tile texture"),
];

pub const SD35_MODELS: [(&str, &str); 3] = [
    ("sd3.5-large", "Highest quality (slow)"),
    ("sd3.5-large-turbo", "Fast generation (medium quality)"),
    ("sd3.5-medium", "Balanced quality and speed"),
];

pub const TEXT_TO_IMAGE: &str = "text-to-image";
pub const IMAGE_TO_IMAGE: &str = "image-to-image";
pub const GENERATION_MODES: [&str; 2] = [TEXT_TO_IMAGE, IMAGE_TO_IMAGE];

const MAX_PROMPT_CHARS: usize = 10_000;
const MAX_SEED: i64 = 2_147_483_647;
const ACCEPTED_INPUT_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];
const EDUCATIONAL_NEGATIVE_PROMPT: &str = "complex, confusing, inappropriate, violent, dark";

/// Credits the provider charges per generation
pub fn credits_required(tier: ImageTier) -> u32 {
    match tier {
        ImageTier::Core => 3,
        ImageTier::Sd35 => 4,
        ImageTier::Ultra => 8,
        ImageTier::Sketch => 3,
    }
}

fn model_used(tier: ImageTier) -> &'static str {
    match tier {
        ImageTier::Core => "stable-image-core",
        ImageTier::Sd35 => "stable-diffusion-3.5",
        ImageTier::Ultra => "stable-image-ultra",
        ImageTier::Sketch => "stable-image-control-sketch",
    }
}

/// Fields of the generation forms; each tier reads the ones it supports
#[derive(Debug, Clone, Default)]
pub struct GenerationForm {
    pub prompt: String,
    pub output_format: Option<String>,
    pub aspect_ratio: Option<String>,
    pub style_preset: Option<String>,
    pub negative_prompt: Option<String>,
    pub seed: Option<i64>,
    pub mode: Option<String>,
    pub model: Option<String>,
    pub strength: Option<f32>,
    pub cfg_scale: Option<f32>,
    pub control_strength: Option<f32>,
    pub image: Option<UploadedFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EducationalRequest {
    pub prompt: String,
    pub subject: String,
    pub grade_level: Option<String>,
    pub style: Option<String>,
    pub aspect_ratio: Option<String>,
    pub output_format: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuickRequest {
    pub prompt: String,
    pub style: Option<String>,
}

/// A generated image ready to be sent back
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub data: Vec<u8>,
    pub output_format: String,
    pub filename: String,
    pub tier: ImageTier,
    pub generation_time: f64,
}

/// JSON summary returned by the educational and quick endpoints
#[derive(Debug, Clone, Serialize)]
pub struct GenerationSummary {
    pub success: bool,
    pub message: String,
    pub filename: String,
    pub file_size: usize,
    pub generation_time: f64,
    pub credits_used: u32,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub model_used: String,
    pub image: String,
}

impl From<GeneratedImage> for GenerationSummary {
    fn from(generated: GeneratedImage) -> Self {
        let dimensions = image::dimensions(&generated.data);
        Self {
            success: true,
            message: "Image generated successfully".into(),
            file_size: generated.data.len(),
            generation_time: generated.generation_time,
            credits_used: credits_required(generated.tier),
            width: dimensions.map(|(w, _)| w),
            height: dimensions.map(|(_, h)| h),
            model_used: model_used(generated.tier).into(),
            image: base64::image_data_uri(&generated.data, &generated.output_format),
            filename: generated.filename,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Constants {
    pub output_formats: Vec<&'static str>,
    pub aspect_ratios: BTreeMap<&'static str, &'static str>,
    pub style_presets: BTreeMap<&'static str, &'static str>,
    pub sd35_models: BTreeMap<&'static str, &'static str>,
    pub generation_modes: BTreeMap<&'static str, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub credits_required: u32,
    pub supported_modes: Vec<&'static str>,
    pub max_resolution: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub api_available: bool,
    pub timestamp: String,
    pub service: &'static str,
}

/// "text-to-image" -> "Text To Image"
fn title_case(mode: &str) -> String {
    mode.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError::InvalidRequest(message.into())
}

fn one_of<'a>(value: &'a str, allowed: &[&str], field: &str) -> Result<&'a str> {
    if allowed.contains(&value) {
        Ok(value)
    } else {
        Err(invalid(format!(
            "Invalid {}: '{}'. Allowed: {}",
            field,
            value,
            allowed.join(", ")
        )))
    }
}

fn unit_range(value: Option<f32>, field: &str) -> Result<Option<f32>> {
    match value {
        Some(v) if !(0.0..=1.0).contains(&v) => {
            Err(invalid(format!("{} must be between 0 and 1", field)))
        }
        other => Ok(other),
    }
}

fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

pub struct ImageGenerationService {
    generator: Arc<dyn ImageGenerator>,
}

impl ImageGenerationService {
    pub fn new(generator: Arc<dyn ImageGenerator>) -> Self {
        Self { generator }
    }

    /// Checks shared by every tier; returns a request with the common fields set
    fn base_request(&self, tier: ImageTier, form: &GenerationForm) -> Result<ImageGenerationRequest> {
        let prompt = form.prompt.trim();
        if prompt.is_empty() {
            return Err(invalid("Prompt cannot be empty"));
        }
        if prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(invalid(format!("Prompt exceeds {} characters", MAX_PROMPT_CHARS)));
        }

        let negative_prompt = form
            .negative_prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());
        if negative_prompt.map(|p| p.chars().count() > MAX_PROMPT_CHARS).unwrap_or(false) {
            return Err(invalid(format!(
                "Negative prompt exceeds {} characters",
                MAX_PROMPT_CHARS
            )));
        }

        let output_format = one_of(
            form.output_format.as_deref().unwrap_or("png"),
            &OUTPUT_FORMATS,
            "output_format",
        )?;

        let presets: Vec<&str> = STYLE_PRESETS.iter().map(|(name, _)| *name).collect();
        let style_preset = match form.style_preset.as_deref() {
            Some(style) => Some(one_of(style, &presets, "style_preset")?.to_string()),
            None => None,
        };

        let seed = match form.seed {
            Some(seed) if !(0..=MAX_SEED).contains(&seed) => {
                return Err(invalid(format!("seed must be between 0 and {}", MAX_SEED)))
            }
            Some(seed) => Some(seed as u32),
            None => None,
        };

        let mut request = ImageGenerationRequest::new(tier, prompt, output_format);
        request.style_preset = style_preset;
        request.negative_prompt = negative_prompt.map(str::to_string);
        request.seed = seed;
        Ok(request)
    }

    fn aspect_ratio(value: Option<&str>) -> Result<String> {
        let ratios: Vec<&str> = ASPECT_RATIOS.iter().map(|(ratio, _)| *ratio).collect();
        Ok(one_of(value.unwrap_or("1:1"), &ratios, "aspect_ratio")?.to_string())
    }

    async fn run(&self, request: ImageGenerationRequest, filename_stem: String) -> Result<GeneratedImage> {
        let tier = request.tier;
        let output_format = request.output_format.clone();
        let prompt_preview: String = request.prompt.chars().take(50).collect();
        info!(tier = tier.as_str(), prompt = %prompt_preview, "Image generation started");

        let started = Instant::now();
        let data = self.generator.generate(request).await?;
        let generation_time = started.elapsed().as_secs_f64();
        let filename = format!("{}_{}.{}", filename_stem, timestamp(), output_format);

        info!(
            tier = tier.as_str(),
            filename = %filename,
            bytes = data.len(),
            seconds = generation_time,
            "Image generation finished"
        );
        Ok(GeneratedImage {
            data,
            output_format,
            filename,
            tier,
            generation_time,
        })
    }

    pub async fn generate_core(&self, form: GenerationForm) -> Result<GeneratedImage> {
        let mut request = self.base_request(ImageTier::Core, &form)?;
        request.aspect_ratio = Some(Self::aspect_ratio(form.aspect_ratio.as_deref())?);
        self.run(request, "core_image".into()).await
    }

    pub async fn generate_sd35(&self, form: GenerationForm) -> Result<GeneratedImage> {
        let mut request = self.base_request(ImageTier::Sd35, &form)?;

        let mode = one_of(form.mode.as_deref().unwrap_or(TEXT_TO_IMAGE), &GENERATION_MODES, "mode")?;
        let models: Vec<&str> = SD35_MODELS.iter().map(|(name, _)| *name).collect();
        let model = one_of(form.model.as_deref().unwrap_or("sd3.5-large"), &models, "model")?;

        if let Some(cfg) = form.cfg_scale {
            if !(1.0..=10.0).contains(&cfg) {
                return Err(invalid("cfg_scale must be between 1 and 10"));
            }
        }
        let strength = unit_range(form.strength, "strength")?;

        if mode == IMAGE_TO_IMAGE {
            let image = form
                .image
                .as_ref()
                .ok_or_else(|| invalid("image-to-image mode requires an image"))?;
            let strength =
                strength.ok_or_else(|| invalid("image-to-image mode requires strength"))?;
            request.image = Some(input_image(image)?);
            request.strength = Some(strength);
        } else {
            request.aspect_ratio = Some(Self::aspect_ratio(form.aspect_ratio.as_deref())?);
        }

        request.mode = Some(mode.to_string());
        request.model = Some(model.to_string());
        request.cfg_scale = form.cfg_scale;

        let suffix = if mode == IMAGE_TO_IMAGE { "i2i" } else { "t2i" };
        self.run(request, format!("sd35_{}", suffix)).await
    }

    pub async fn generate_ultra(&self, form: GenerationForm) -> Result<GeneratedImage> {
        let mut request = self.base_request(ImageTier::Ultra, &form)?;
        request.aspect_ratio = Some(Self::aspect_ratio(form.aspect_ratio.as_deref())?);

        if let Some(image) = form.image.as_ref() {
            request.image = Some(input_image(image)?);
            request.strength = unit_range(form.strength, "strength")?;
        }
        self.run(request, "ultra_image".into()).await
    }

    pub async fn generate_sketch(&self, form: GenerationForm) -> Result<GeneratedImage> {
        let mut request = self.base_request(ImageTier::Sketch, &form)?;
        let sketch = form
            .image
            .as_ref()
            .ok_or_else(|| invalid("A sketch image is required"))?;

        request.image = Some(input_image(sketch)?);
        request.control_strength =
            Some(unit_range(form.control_strength, "control_strength")?.unwrap_or(0.7));
        self.run(request, "sketch_result".into()).await
    }

    pub async fn generate_educational(&self, request: EducationalRequest) -> Result<GenerationSummary> {
        if request.subject.trim().is_empty() {
            return Err(invalid("subject is required"));
        }
        if request.prompt.trim().is_empty() {
            return Err(invalid("Prompt cannot be empty"));
        }

        let mut prompt = format!("Educational illustration for {}", request.subject.trim());
        if let Some(grade) = request.grade_level.as_deref().filter(|g| !g.trim().is_empty()) {
            prompt.push_str(&format!(" suitable for grade {}", grade.trim()));
        }
        prompt.push_str(&format!(
            ": {}, clear and simple, educational style, colorful, engaging",
            request.prompt.trim()
        ));

        let form = GenerationForm {
            prompt,
            output_format: request.output_format,
            aspect_ratio: Some(request.aspect_ratio.unwrap_or_else(|| "16:9".into())),
            style_preset: known_style(request.style),
            negative_prompt: Some(EDUCATIONAL_NEGATIVE_PROMPT.into()),
            ..GenerationForm::default()
        };
        Ok(self.generate_core(form).await?.into())
    }

    pub async fn generate_quick(&self, request: QuickRequest) -> Result<GenerationSummary> {
        let form = GenerationForm {
            prompt: request.prompt,
            output_format: Some("png".into()),
            aspect_ratio: Some("1:1".into()),
            style_preset: known_style(request.style),
            ..GenerationForm::default()
        };
        Ok(self.generate_core(form).await?.into())
    }

    pub fn validate(&self, file: &UploadedFile) -> image::ValidationReport {
        let content_type = file.content_type.as_deref().unwrap_or_default();
        if !ACCEPTED_INPUT_TYPES.contains(&content_type) {
            return image::ValidationReport::rejected(format!(
                "Unsupported file type. Allowed types: {}",
                ACCEPTED_INPUT_TYPES.join(", ")
            ));
        }
        if file.data.len() > image::MAX_GENERATION_INPUT_BYTES {
            return image::ValidationReport::rejected("File size exceeds 50MB");
        }
        image::validate_for_generation(&file.data)
    }

    pub fn constants(&self) -> Constants {
        Constants {
            output_formats: OUTPUT_FORMATS.to_vec(),
            aspect_ratios: ASPECT_RATIOS.into_iter().collect(),
            style_presets: STYLE_PRESETS.into_iter().collect(),
            sd35_models: SD35_MODELS.into_iter().collect(),
            generation_modes: GENERATION_MODES
                .into_iter()
                .map(|mode| (mode, title_case(mode)))
                .collect(),
        }
    }

    pub fn model_info(&self, model_type: &str) -> Result<ModelInfo> {
        let info = match model_type {
            "core" => ModelInfo {
                name: "Stable Image Core",
                description: "Standard text-to-image model",
                credits_required: credits_required(ImageTier::Core),
                supported_modes: vec![TEXT_TO_IMAGE],
                max_resolution: "1024x1024",
            },
            "sd35" => ModelInfo {
                name: "Stable Diffusion 3.5",
                description: "Advanced model for text or image to image",
                credits_required: credits_required(ImageTier::Sd35),
                supported_modes: vec![TEXT_TO_IMAGE, IMAGE_TO_IMAGE],
                max_resolution: "1536x1536",
            },
            "ultra" => ModelInfo {
                name: "Stable Image Ultra",
                description: "Highest quality generation model",
                credits_required: credits_required(ImageTier::Ultra),
                supported_modes: vec![TEXT_TO_IMAGE, "reference-image"],
                max_resolution: "2048x2048",
            },
            "sketch" => ModelInfo {
                name: "Sketch Control",
                description: "Turns sketches into finished images",
                credits_required: credits_required(ImageTier::Sketch),
                supported_modes: vec!["sketch-to-image"],
                max_resolution: "1024x1024",
            },
            other => {
                return Err(AppError::NotFound(format!("Unsupported model type: {}", other)))
            }
        };
        Ok(info)
    }

    pub fn educational_prompts(&self, _subject: Option<&str>) -> serde_json::Value {
        serde_json::json!({ "all_subjects": {} })
    }

    pub fn health(&self) -> HealthReport {
        let api_available = self.generator.is_configured();
        HealthReport {
            status: if api_available { "healthy" } else { "unhealthy" },
            api_available,
            timestamp: Utc::now().to_rfc3339(),
            service: "stability-ai",
        }
    }
}

/// Presets outside the provider's list are dropped for the simplified endpoints
fn known_style(style: Option<String>) -> Option<String> {
    let style = style?;
    if STYLE_PRESETS.iter().any(|(name, _)| *name == style) {
        Some(style).filter(|s| !s.is_empty())
    } else {
        warn!(style = %style, "Ignoring unknown style preset");
        None
    }
}

fn input_image(file: &UploadedFile) -> Result<InputImage> {
    let content_type = file.content_type.as_deref().unwrap_or_default();
    if !ACCEPTED_INPUT_TYPES.contains(&content_type) {
        return Err(invalid(format!(
            "Unsupported file type. Allowed types: {}",
            ACCEPTED_INPUT_TYPES.join(", ")
        )));
    }
    if file.data.len() > image::MAX_GENERATION_INPUT_BYTES {
        return Err(invalid("File size exceeds 50MB"));
    }
    Ok(InputImage {
        data: file.data.clone(),
        file_name: file.file_name.clone(),
        content_type: content_type.to_string(),
    })
}
