//! Per-session image gallery with role-based access

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

use crate::backend::DataStore;
use crate::config::GalleryConfig;
use crate::error::{AppError, Result};
use crate::models::{ClassSession, GalleryItem, NewGalleryItem, UserType};
use crate::response::image;

/// An uploaded file as received from a multipart form
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct GalleryUpload {
    pub session_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub user_type: String,
    pub prompt: String,
    pub title: Option<String>,
    pub file: UploadedFile,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub item: GalleryItem,
}

#[derive(Debug, Clone, Serialize)]
pub struct GalleryListing {
    pub success: bool,
    pub items: Vec<GalleryItem>,
    pub session_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemResponse {
    pub success: bool,
    pub item: GalleryItem,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GalleryStats {
    pub total_items: usize,
    pub student_items: usize,
    pub teacher_items: usize,
    pub unique_contributors: usize,
    pub session_id: i64,
}

impl GalleryStats {
    pub fn from_items(session_id: i64, items: &[GalleryItem]) -> Self {
        let count = |user_type: UserType| items.iter().filter(|i| i.user_type == user_type).count();
        let contributors: HashSet<(&str, UserType)> = items
            .iter()
            .map(|i| (i.user_name.as_str(), i.user_type))
            .collect();

        Self {
            total_items: items.len(),
            student_items: count(UserType::Student),
            teacher_items: count(UserType::Teacher),
            unique_contributors: contributors.len(),
            session_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub stats: GalleryStats,
}

fn access_denied() -> AppError {
    AppError::Forbidden("Access denied to this session".into())
}

pub struct GalleryService {
    store: Arc<dyn DataStore>,
    config: GalleryConfig,
}

impl GalleryService {
    pub fn new(store: Arc<dyn DataStore>, config: GalleryConfig) -> Self {
        Self { store, config }
    }

    async fn session(&self, session_id: i64) -> Result<ClassSession> {
        self.store
            .get_session(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Session not found".into()))
    }

    /// Teachers may read their own sessions, students the session they joined
    async fn authorize_read(&self, session_id: i64, user_id: i64, user_type: UserType) -> Result<()> {
        let session = self.session(session_id).await?;
        match user_type {
            UserType::Teacher if session.teacher_id == user_id => Ok(()),
            UserType::Student => match self.store.get_student(user_id).await? {
                Some(student) if student.session_id == session_id => Ok(()),
                _ => Err(access_denied()),
            },
            _ => Err(access_denied()),
        }
    }

    pub async fn upload(&self, upload: GalleryUpload) -> Result<UploadResponse> {
        let user_type = UserType::participant(&upload.user_type)?;

        let is_image = upload
            .file
            .content_type
            .as_deref()
            .map(|ct| ct.starts_with("image/"))
            .unwrap_or(false);
        if !is_image {
            return Err(AppError::InvalidRequest("File must be an image".into()));
        }

        let session = self.session(upload.session_id).await?;
        match user_type {
            UserType::Student => {
                if self
                    .store
                    .find_student_in_session(session.id, &upload.user_name)
                    .await?
                    .is_none()
                {
                    return Err(AppError::Forbidden("Student not found in this session".into()));
                }
            }
            _ => {
                if session.teacher_id != upload.user_id {
                    return Err(AppError::Forbidden(
                        "Teacher not authorized for this session".into(),
                    ));
                }
            }
        }

        let processed = image::process_upload(&upload.file.data, &self.config)?;

        let item = self
            .store
            .create_gallery_item(NewGalleryItem {
                session_id: session.id,
                user_id: upload.user_id,
                user_name: upload.user_name,
                user_type,
                image_url: processed.data_uri(),
                prompt: upload.prompt,
                title: upload.title.filter(|t| !t.trim().is_empty()),
            })
            .await?;

        info!(
            item_id = item.id,
            session_id = session.id,
            file = %upload.file.file_name,
            width = processed.width,
            height = processed.height,
            "Gallery item uploaded"
        );

        Ok(UploadResponse {
            success: true,
            message: "Image uploaded successfully".into(),
            item,
        })
    }

    pub async fn list(&self, session_id: i64, user_id: i64, user_type: &str) -> Result<GalleryListing> {
        let user_type = UserType::participant(user_type)?;
        self.authorize_read(session_id, user_id, user_type).await?;

        let items = self.store.list_gallery_items(session_id).await?;
        Ok(GalleryListing {
            success: true,
            items,
            session_id,
        })
    }

    pub async fn get(&self, item_id: i64, user_id: i64, user_type: &str) -> Result<ItemResponse> {
        let user_type = UserType::participant(user_type)?;
        let item = self.item(item_id).await?;
        self.authorize_read(item.session_id, user_id, user_type).await?;

        Ok(ItemResponse {
            success: true,
            item,
        })
    }

    /// Teachers may delete anything in their sessions, students only their own items
    pub async fn delete(&self, item_id: i64, user_id: i64, user_type: &str) -> Result<DeleteResponse> {
        let user_type = UserType::participant(user_type)?;
        let item = self.item(item_id).await?;

        let allowed = match user_type {
            UserType::Teacher => self
                .store
                .get_session(item.session_id)
                .await?
                .map(|session| session.teacher_id == user_id)
                .unwrap_or(false),
            _ => item.user_type == UserType::Student && item.user_id == user_id,
        };
        if !allowed {
            return Err(AppError::Forbidden("Access denied".into()));
        }

        if !self.store.delete_gallery_item(item_id).await? {
            return Err(AppError::Database("Failed to delete gallery item".into()));
        }

        info!(item_id, user_id, user_type = %user_type, "Gallery item deleted");
        Ok(DeleteResponse {
            success: true,
            message: "Gallery item deleted successfully".into(),
        })
    }

    pub async fn stats(&self, session_id: i64, user_id: i64, user_type: &str) -> Result<StatsResponse> {
        let listing = self.list(session_id, user_id, user_type).await?;
        Ok(StatsResponse {
            success: true,
            stats: GalleryStats::from_items(session_id, &listing.items),
        })
    }

    async fn item(&self, item_id: i64) -> Result<GalleryItem> {
        self.store
            .get_gallery_item(item_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Gallery item not found".into()))
    }
}
