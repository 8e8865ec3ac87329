//! Configuration module

mod settings;

pub use settings::{
    ChatConfig, CorsConfig, DatabaseConfig, GalleryConfig, ImageConfig, LoggingConfig,
    RateLimitConfig, ServerConfig, SessionConfig, Settings,
};
