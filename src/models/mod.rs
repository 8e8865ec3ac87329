//! Records persisted by the hosted database, and the insert payloads for them

pub mod timestamp;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Who is acting on a session resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Teacher,
    Student,
    /// Author of assistant chat messages
    Ai,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Teacher => "teacher",
            UserType::Student => "student",
            UserType::Ai => "ai",
        }
    }

    /// Parse a participant role; the assistant is not a valid participant
    pub fn participant(value: &str) -> Result<Self, AppError> {
        match value.parse::<UserType>() {
            Ok(UserType::Ai) | Err(_) => Err(AppError::InvalidRequest("Invalid user type".into())),
            Ok(user_type) => Ok(user_type),
        }
    }
}

impl FromStr for UserType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "teacher" => Ok(UserType::Teacher),
            "student" => Ok(UserType::Student),
            "ai" => Ok(UserType::Ai),
            other => Err(AppError::InvalidRequest(format!("Invalid user type: {}", other))),
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Teacher {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// SHA-256 hex digest; never sent to clients
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTeacher {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassSession {
    pub id: i64,
    pub teacher_id: i64,
    pub class_code: String,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl ClassSession {
    /// Sessions without an expiry never expire
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at < now).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewClassSession {
    pub teacher_id: i64,
    pub class_code: String,
    #[serde(with = "timestamp")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub class_code: String,
    pub session_id: i64,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewStudent {
    pub name: String,
    pub class_code: String,
    pub session_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatThread {
    pub id: i64,
    pub user_id: i64,
    pub session_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewChatThread {
    pub user_id: i64,
    pub session_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub thread_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub user_type: UserType,
    pub message: String,
    pub is_ai_response: bool,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewChatMessage {
    pub thread_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub user_type: UserType,
    pub message: String,
    pub is_ai_response: bool,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl NewChatMessage {
    /// The record as it would look had the store accepted it
    pub fn unsaved(self) -> ChatMessage {
        ChatMessage {
            id: 0,
            thread_id: self.thread_id,
            user_id: self.user_id,
            user_name: self.user_name,
            user_type: self.user_type,
            message: self.message,
            is_ai_response: self.is_ai_response,
            created_at: Some(self.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryItem {
    pub id: i64,
    pub session_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub user_type: UserType,
    pub image_url: String,
    pub prompt: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewGalleryItem {
    pub session_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub user_type: UserType,
    pub image_url: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}
