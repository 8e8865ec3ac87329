//! Request handlers grouped by feature; each module exposes its own router

pub mod auth;
pub mod chat;
pub mod gallery;
pub mod health;
pub mod image;
pub mod student;
pub mod teacher;
