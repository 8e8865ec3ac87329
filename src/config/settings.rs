//! Application settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub gallery: GalleryConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound for a whole request, including image generation
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Largest accepted request body (multipart uploads included)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_request_timeout() -> u64 {
    180
}

fn default_max_body_bytes() -> usize {
    60 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Allowed browser origins
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    #[serde(default = "default_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_origins(),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_rps")]
    pub requests_per_second: u32,
    #[serde(default = "default_burst")]
    pub burst_size: u32,
}

fn default_true() -> bool {
    true
}

fn default_rps() -> u32 {
    50
}

fn default_burst() -> u32 {
    100
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: default_rps(),
            burst_size: default_burst(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Hosted PostgREST database
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_db_timeout")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

fn default_db_timeout() -> u64 {
    10000
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff() -> u64 {
    200
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            timeout_ms: default_db_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

/// Chat completion provider
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_penalty")]
    pub presence_penalty: f32,
    #[serde(default = "default_penalty")]
    pub frequency_penalty: f32,
    #[serde(default = "default_chat_timeout")]
    pub timeout_ms: u64,
    /// Messages of context sent with each new question
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Messages returned by the history endpoint
    #[serde(default = "default_history_view_limit")]
    pub history_view_limit: usize,
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,
    #[serde(default = "default_response_language")]
    pub response_language: String,
}

fn default_chat_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    500
}

fn default_temperature() -> f32 {
    0.7
}

fn default_penalty() -> f32 {
    0.1
}

fn default_chat_timeout() -> u64 {
    30000
}

fn default_history_limit() -> usize {
    20
}

fn default_history_view_limit() -> usize {
    100
}

fn default_assistant_name() -> String {
    "AI Assistant".to_string()
}

fn default_response_language() -> String {
    "Korean".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: default_chat_base_url(),
            api_key: String::new(),
            model: default_chat_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            presence_penalty: default_penalty(),
            frequency_penalty: default_penalty(),
            timeout_ms: default_chat_timeout(),
            history_limit: default_history_limit(),
            history_view_limit: default_history_view_limit(),
            assistant_name: default_assistant_name(),
            response_language: default_response_language(),
        }
    }
}

/// Text-to-image provider
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageConfig {
    #[serde(default = "default_image_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_image_timeout")]
    pub timeout_ms: u64,
}

fn default_image_base_url() -> String {
    "https://api.stability.ai".to_string()
}

fn default_image_timeout() -> u64 {
    60000
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            base_url: default_image_base_url(),
            api_key: String::new(),
            timeout_ms: default_image_timeout(),
        }
    }
}

/// Class session lifetime and code shape
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default = "default_expire_hours")]
    pub expire_hours: i64,
    #[serde(default = "default_code_length")]
    pub class_code_length: usize,
}

fn default_expire_hours() -> i64 {
    24
}

fn default_code_length() -> usize {
    6
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expire_hours: default_expire_hours(),
            class_code_length: default_code_length(),
        }
    }
}

/// Gallery upload processing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GalleryConfig {
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_max_upload_mb() -> usize {
    5
}

fn default_max_dimension() -> u32 {
    1920
}

fn default_jpeg_quality() -> u8 {
    85
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            max_upload_mb: default_max_upload_mb(),
            max_dimension: default_max_dimension(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/default.toml")
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            // Load from configuration file
            .add_source(
                File::with_name(path.as_ref().to_str().unwrap_or("config/default"))
                    .required(false),
            )
            // Override with environment variables (prefixed with CLASSROOM_)
            .add_source(
                Environment::with_prefix("CLASSROOM")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins"),
            )
            .build()?;

        let mut settings: Settings = config.try_deserialize()?;
        settings.apply_provider_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Fill empty provider credentials from their conventional variable names
    pub fn apply_provider_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let fill = |slot: &mut String, key: &str| {
            if slot.is_empty() {
                if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                    *slot = value;
                }
            }
        };

        fill(&mut self.database.url, "SUPABASE_URL");
        fill(&mut self.database.api_key, "SUPABASE_KEY");
        fill(&mut self.chat.api_key, "OPENAI_API_KEY");
        fill(&mut self.image.api_key, "STABILITY_API_KEY");
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(invalid("Server port cannot be 0"));
        }

        if self.database.url.trim().is_empty() {
            return Err(invalid(
                "Database URL is not configured (set database.url or SUPABASE_URL)",
            ));
        }

        if self.session.class_code_length == 0 || self.session.class_code_length > 32 {
            return Err(invalid("session.class_code_length must be between 1 and 32"));
        }

        if self.session.expire_hours <= 0 {
            return Err(invalid("session.expire_hours must be positive"));
        }

        if self.gallery.max_dimension == 0 {
            return Err(invalid("gallery.max_dimension cannot be 0"));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> AppError {
    AppError::Config(config::ConfigError::Message(message.to_string()))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            cors: CorsConfig::default(),
            rate_limit: RateLimitConfig::default(),
            logging: LoggingConfig::default(),
            database: DatabaseConfig::default(),
            chat: ChatConfig::default(),
            image: ImageConfig::default(),
            session: SessionConfig::default(),
            gallery: GalleryConfig::default(),
        }
    }
}
