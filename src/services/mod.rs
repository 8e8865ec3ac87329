//! Business services behind the HTTP handlers

pub mod auth;
pub mod chat;
pub mod gallery;
pub mod image_generation;
pub mod student;
pub mod teacher;

pub use auth::AuthService;
pub use chat::ChatService;
pub use gallery::GalleryService;
pub use image_generation::ImageGenerationService;
pub use student::StudentService;
pub use teacher::TeacherService;
