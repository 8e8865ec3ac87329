//! Seams between the services and the external providers

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{
    ChatMessage, ChatThread, ClassSession, GalleryItem, NewChatMessage, NewChatThread,
    NewClassSession, NewGalleryItem, NewStudent, NewTeacher, Student, Teacher,
};

/// Hosted relational store holding every persisted record
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn find_teacher_by_email(&self, email: &str) -> Result<Option<Teacher>>;
    async fn create_teacher(&self, teacher: NewTeacher) -> Result<Teacher>;

    /// Newest session carrying this code
    async fn find_session_by_code(&self, class_code: &str) -> Result<Option<ClassSession>>;
    async fn get_session(&self, session_id: i64) -> Result<Option<ClassSession>>;
    async fn create_session(&self, session: NewClassSession) -> Result<ClassSession>;
    async fn list_teacher_sessions(&self, teacher_id: i64) -> Result<Vec<ClassSession>>;
    async fn delete_session(&self, session_id: i64) -> Result<()>;

    async fn find_student(&self, name: &str, class_code: &str) -> Result<Option<Student>>;
    async fn find_student_in_session(&self, session_id: i64, name: &str)
        -> Result<Option<Student>>;
    async fn get_student(&self, student_id: i64) -> Result<Option<Student>>;
    async fn create_student(&self, student: NewStudent) -> Result<Student>;
    async fn list_session_students(&self, session_id: i64) -> Result<Vec<Student>>;

    async fn find_thread(&self, user_id: i64, session_id: i64) -> Result<Option<ChatThread>>;
    async fn create_thread(&self, thread: NewChatThread) -> Result<ChatThread>;
    /// The newest `limit` messages of a thread, oldest first
    async fn recent_messages(&self, thread_id: i64, limit: usize) -> Result<Vec<ChatMessage>>;
    async fn create_message(&self, message: NewChatMessage) -> Result<ChatMessage>;

    async fn create_gallery_item(&self, item: NewGalleryItem) -> Result<GalleryItem>;
    /// Newest first
    async fn list_gallery_items(&self, session_id: i64) -> Result<Vec<GalleryItem>>;
    async fn get_gallery_item(&self, item_id: i64) -> Result<Option<GalleryItem>>;
    /// Whether a row was removed
    async fn delete_gallery_item(&self, item_id: i64) -> Result<bool>;

    /// Cheap reachability probe
    async fn ping(&self) -> Result<()>;
}

/// Role of a message sent to the chat model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One piece of a multimodal message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Plain text, or a list of parts when images are attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Collapse a single text part to plain text
    pub fn from_parts(mut parts: Vec<ContentPart>) -> Self {
        if parts.len() == 1 {
            if let ContentPart::Text { .. } = &parts[0] {
                if let Some(ContentPart::Text { text }) = parts.pop() {
                    return MessageContent::Text(text);
                }
            }
        }
        MessageContent::Parts(parts)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl PromptMessage {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.into()),
        }
    }
}

/// Conversation handed to the chat model, system prompt included
#[derive(Debug, Clone, Default)]
pub struct ChatPrompt {
    pub messages: Vec<PromptMessage>,
}

/// Chat completion provider
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Full response text
    async fn complete(&self, prompt: ChatPrompt) -> Result<String>;

    /// Response as a stream of text deltas
    async fn stream(&self, prompt: ChatPrompt) -> Result<BoxStream<'static, Result<String>>>;
}

/// Generation tiers offered by the image provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageTier {
    Core,
    Sd35,
    Ultra,
    Sketch,
}

impl ImageTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageTier::Core => "core",
            ImageTier::Sd35 => "sd35",
            ImageTier::Ultra => "ultra",
            ImageTier::Sketch => "sketch",
        }
    }

    /// Provider path for this tier
    pub fn endpoint(&self) -> &'static str {
        match self {
            ImageTier::Core => "/v2beta/stable-image/generate/core",
            ImageTier::Sd35 => "/v2beta/stable-image/generate/sd3",
            ImageTier::Ultra => "/v2beta/stable-image/generate/ultra",
            ImageTier::Sketch => "/v2beta/stable-image/control/sketch",
        }
    }
}

/// Input image for image-to-image, reference or sketch generation
#[derive(Debug, Clone)]
pub struct InputImage {
    pub data: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

/// A validated generation request; the provider client only serializes it
#[derive(Debug, Clone)]
pub struct ImageGenerationRequest {
    pub tier: ImageTier,
    pub prompt: String,
    pub output_format: String,
    pub aspect_ratio: Option<String>,
    pub style_preset: Option<String>,
    pub negative_prompt: Option<String>,
    pub seed: Option<u32>,
    pub mode: Option<String>,
    pub model: Option<String>,
    pub strength: Option<f32>,
    pub cfg_scale: Option<f32>,
    pub control_strength: Option<f32>,
    pub image: Option<InputImage>,
}

impl ImageGenerationRequest {
    pub fn new(tier: ImageTier, prompt: impl Into<String>, output_format: impl Into<String>) -> Self {
        Self {
            tier,
            prompt: prompt.into(),
            output_format: output_format.into(),
            aspect_ratio: None,
            style_preset: None,
            negative_prompt: None,
            seed: None,
            mode: None,
            model: None,
            strength: None,
            cfg_scale: None,
            control_strength: None,
            image: None,
        }
    }
}

/// Text-to-image provider
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Encoded image bytes in the requested output format
    async fn generate(&self, request: ImageGenerationRequest) -> Result<Vec<u8>>;

    /// Whether credentials are present
    fn is_configured(&self) -> bool;
}
