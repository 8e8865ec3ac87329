//! Class session management for teachers

use chrono::{Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::backend::DataStore;
use crate::config::SessionConfig;
use crate::error::{AppError, Result};
use crate::models::{ClassSession, NewClassSession};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MAX_CODE_ATTEMPTS: usize = 16;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateClassRequest {
    pub teacher_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateClassResponse {
    pub class_code: String,
    pub session: ClassSession,
}

/// Random code drawn from upper-case letters and digits
pub fn generate_class_code<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

pub struct TeacherService {
    store: Arc<dyn DataStore>,
    config: SessionConfig,
}

impl TeacherService {
    pub fn new(store: Arc<dyn DataStore>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    pub async fn create_class(&self, request: CreateClassRequest) -> Result<CreateClassResponse> {
        let class_code = self.unique_class_code().await?;
        let expires_at = Utc::now() + Duration::hours(self.config.expire_hours);

        let session = self
            .store
            .create_session(NewClassSession {
                teacher_id: request.teacher_id,
                class_code: class_code.clone(),
                expires_at,
            })
            .await?;

        info!(
            teacher_id = request.teacher_id,
            session_id = session.id,
            class_code = %class_code,
            "Class session created"
        );
        Ok(CreateClassResponse { class_code, session })
    }

    async fn unique_class_code(&self) -> Result<String> {
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            // ThreadRng is not Send, so it must not live across the await below.
            let code = generate_class_code(&mut rand::thread_rng(), self.config.class_code_length);
            if self.store.find_session_by_code(&code).await?.is_none() {
                return Ok(code);
            }
            warn!(attempt = attempt, "Class code collision, regenerating");
        }
        Err(AppError::Internal("Could not allocate a unique class code".into()))
    }

    pub async fn list_sessions(&self, teacher_id: i64) -> Result<Vec<ClassSession>> {
        self.store.list_teacher_sessions(teacher_id).await
    }

    pub async fn delete_session(&self, session_id: i64) -> Result<serde_json::Value> {
        if self.store.get_session(session_id).await?.is_none() {
            return Err(AppError::NotFound("Session not found".into()));
        }

        self.store.delete_session(session_id).await?;
        info!(session_id = session_id, "Class session deleted");
        Ok(serde_json::json!({ "message": "Session deleted successfully" }))
    }
}
