//! Classroom Gateway
//!
//! Backend for a classroom platform: teachers open class sessions identified
//! by short codes, students join with a code, and both sides can chat with an
//! AI assistant, generate images through Stability AI and share results in a
//! per-session gallery.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod response;
pub mod services;

pub use error::{AppError, Result};

use std::sync::Arc;

use backend::{ChatModel, DataStore, ImageGenerator};
use services::{
    AuthService, ChatService, GalleryService, ImageGenerationService, StudentService,
    TeacherService,
};

/// Application state shared across all handlers
pub struct AppState {
    pub settings: config::Settings,
    pub store: Arc<dyn DataStore>,
    pub auth: AuthService,
    pub teacher: TeacherService,
    pub student: StudentService,
    pub chat: Arc<ChatService>,
    pub gallery: GalleryService,
    pub images: ImageGenerationService,
}

impl AppState {
    /// Wire the services over the given providers
    pub fn new(
        settings: config::Settings,
        store: Arc<dyn DataStore>,
        chat_model: Arc<dyn ChatModel>,
        image_generator: Arc<dyn ImageGenerator>,
    ) -> Self {
        Self {
            auth: AuthService::new(store.clone()),
            teacher: TeacherService::new(store.clone(), settings.session.clone()),
            student: StudentService::new(store.clone()),
            chat: Arc::new(ChatService::new(
                store.clone(),
                chat_model,
                settings.chat.clone(),
            )),
            gallery: GalleryService::new(store.clone(), settings.gallery.clone()),
            images: ImageGenerationService::new(image_generator),
            store,
            settings,
        }
    }
}
