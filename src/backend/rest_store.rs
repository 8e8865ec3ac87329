//! PostgREST client for the hosted database

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::backend::traits::DataStore;
use crate::config::DatabaseConfig;
use crate::error::{AppError, Result};
use crate::models::{
    ChatMessage, ChatThread, ClassSession, GalleryItem, NewChatMessage, NewChatThread,
    NewClassSession, NewGalleryItem, NewStudent, NewTeacher, Student, Teacher,
};

const TEACHERS: &str = "teachers";
const SESSIONS: &str = "class_sessions";
const STUDENTS: &str = "students";
const THREADS: &str = "chat_threads";
const MESSAGES: &str = "chat_messages";
const GALLERY: &str = "gallery_items";

/// Database client speaking the PostgREST dialect (`/rest/v1/<table>`)
pub struct RestStore {
    client: Client,
    base_url: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl RestStore {
    /// Create a new store client from configuration
    pub fn new(config: &DatabaseConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let key = header_value(&config.api_key)?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", config.api_key))?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, table: &str, query: &[(&str, String)]) -> RequestBuilder {
        self.client.request(method, self.table_url(table)).query(query)
    }

    /// GET rows, retrying transient failures with exponential backoff
    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut attempt = 0;
        loop {
            let outcome = self.request(Method::GET, table, query).send().await;

            let retryable = match &outcome {
                Ok(response) => response.status().is_server_error(),
                Err(e) => e.is_connect() || e.is_timeout(),
            };

            if retryable && attempt < self.max_retries {
                let delay = self.retry_backoff * 2u32.saturating_pow(attempt);
                attempt += 1;
                warn!(
                    table = %table,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Database read failed, retrying"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            let response = outcome.map_err(|e| transport_error(table, e))?;
            return parse_rows(table, response).await;
        }
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>> {
        let mut rows = self.select(table, query).await?;
        Ok(if rows.is_empty() { None } else { Some(rows.swap_remove(0)) })
    }

    /// POST a row and return the stored representation
    async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .request(Method::POST, table, &[])
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(table, e))?;

        let mut rows: Vec<T> = parse_rows(table, response).await?;
        if rows.is_empty() {
            return Err(AppError::Database(format!("Insert into {} returned no row", table)));
        }
        debug!(table = %table, "Inserted row");
        Ok(rows.swap_remove(0))
    }

    /// DELETE matching rows, returning how many were removed
    async fn delete(&self, table: &str, query: &[(&str, String)]) -> Result<usize> {
        let response = self
            .request(Method::DELETE, table, query)
            .send()
            .await
            .map_err(|e| transport_error(table, e))?;

        let rows: Vec<serde_json::Value> = parse_rows(table, response).await?;
        debug!(table = %table, deleted = rows.len(), "Deleted rows");
        Ok(rows.len())
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| AppError::Internal("Database API key contains invalid characters".into()))
}

fn eq(value: impl ToString) -> String {
    format!("eq.{}", value.to_string())
}

fn transport_error(table: &str, e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::Timeout(format!("database request on {} timed out", table))
    } else {
        AppError::Database(format!("request on {} failed: {}", table, e))
    }
}

async fn parse_rows<T: DeserializeOwned>(table: &str, response: Response) -> Result<Vec<T>> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Database(format!("{} returned {}: {}", table, status, body)));
    }

    // DELETE without representation, or 204 responses, carry no body.
    if status == StatusCode::NO_CONTENT {
        return Ok(Vec::new());
    }

    let bytes = response.bytes().await.map_err(|e| transport_error(table, e))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    // A single object is returned when the caller asked for one representation.
    let value: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| AppError::Database(format!("invalid response from {}: {}", table, e)))?;
    let value = match value {
        serde_json::Value::Array(_) => value,
        other => serde_json::Value::Array(vec![other]),
    };
    serde_json::from_value(value)
        .map_err(|e| AppError::Database(format!("unexpected row shape from {}: {}", table, e)))
}

#[async_trait]
impl DataStore for RestStore {
    async fn find_teacher_by_email(&self, email: &str) -> Result<Option<Teacher>> {
        self.select_one(TEACHERS, &[("email", eq(email))]).await
    }

    async fn create_teacher(&self, teacher: NewTeacher) -> Result<Teacher> {
        self.insert(TEACHERS, &teacher).await
    }

    async fn find_session_by_code(&self, class_code: &str) -> Result<Option<ClassSession>> {
        self.select_one(
            SESSIONS,
            &[
                ("class_code", eq(class_code)),
                ("order", "created_at.desc".to_string()),
                ("limit", "1".to_string()),
            ],
        )
        .await
    }

    async fn get_session(&self, session_id: i64) -> Result<Option<ClassSession>> {
        self.select_one(SESSIONS, &[("id", eq(session_id))]).await
    }

    async fn create_session(&self, session: NewClassSession) -> Result<ClassSession> {
        self.insert(SESSIONS, &session).await
    }

    async fn list_teacher_sessions(&self, teacher_id: i64) -> Result<Vec<ClassSession>> {
        self.select(
            SESSIONS,
            &[
                ("teacher_id", eq(teacher_id)),
                ("order", "created_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn delete_session(&self, session_id: i64) -> Result<()> {
        self.delete(SESSIONS, &[("id", eq(session_id))]).await?;
        Ok(())
    }

    async fn find_student(&self, name: &str, class_code: &str) -> Result<Option<Student>> {
        self.select_one(
            STUDENTS,
            &[("name", eq(name)), ("class_code", eq(class_code))],
        )
        .await
    }

    async fn find_student_in_session(
        &self,
        session_id: i64,
        name: &str,
    ) -> Result<Option<Student>> {
        self.select_one(
            STUDENTS,
            &[("session_id", eq(session_id)), ("name", eq(name))],
        )
        .await
    }

    async fn get_student(&self, student_id: i64) -> Result<Option<Student>> {
        self.select_one(STUDENTS, &[("id", eq(student_id))]).await
    }

    async fn create_student(&self, student: NewStudent) -> Result<Student> {
        self.insert(STUDENTS, &student).await
    }

    async fn list_session_students(&self, session_id: i64) -> Result<Vec<Student>> {
        self.select(
            STUDENTS,
            &[
                ("session_id", eq(session_id)),
                ("order", "created_at.asc".to_string()),
            ],
        )
        .await
    }

    async fn find_thread(&self, user_id: i64, session_id: i64) -> Result<Option<ChatThread>> {
        self.select_one(
            THREADS,
            &[("user_id", eq(user_id)), ("session_id", eq(session_id))],
        )
        .await
    }

    async fn create_thread(&self, thread: NewChatThread) -> Result<ChatThread> {
        self.insert(THREADS, &thread).await
    }

    async fn recent_messages(&self, thread_id: i64, limit: usize) -> Result<Vec<ChatMessage>> {
        let mut messages: Vec<ChatMessage> = self
            .select(
                MESSAGES,
                &[
                    ("thread_id", eq(thread_id)),
                    ("order", "created_at.desc,id.desc".to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        messages.reverse();
        Ok(messages)
    }

    async fn create_message(&self, message: NewChatMessage) -> Result<ChatMessage> {
        self.insert(MESSAGES, &message).await
    }

    async fn create_gallery_item(&self, item: NewGalleryItem) -> Result<GalleryItem> {
        self.insert(GALLERY, &item).await
    }

    async fn list_gallery_items(&self, session_id: i64) -> Result<Vec<GalleryItem>> {
        self.select(
            GALLERY,
            &[
                ("session_id", eq(session_id)),
                ("order", "created_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn get_gallery_item(&self, item_id: i64) -> Result<Option<GalleryItem>> {
        self.select_one(GALLERY, &[("id", eq(item_id))]).await
    }

    async fn delete_gallery_item(&self, item_id: i64) -> Result<bool> {
        Ok(self.delete(GALLERY, &[("id", eq(item_id))]).await? > 0)
    }

    async fn ping(&self) -> Result<()> {
        let _: Vec<serde_json::Value> = self
            .select(SESSIONS, &[("select", "id".to_string()), ("limit", "1".to_string())])
            .await?;
        Ok(())
    }
}
