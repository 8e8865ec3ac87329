//! Threaded AI chat.
//!
//! Every (user, session) pair owns one thread. The store is optional for a
//! conversation to happen: when it cannot be reached the exchange runs with
//! thread id 0, no history, and nothing is persisted.

use chrono::Utc;
use dashmap::DashMap;
use futures::StreamExt;
use serde::{Deserialize, Serialize, Serializer};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::backend::chat_client::system_prompt;
use crate::backend::traits::{
    ChatPrompt, ContentPart, ImageUrl, MessageContent, PromptMessage, Role,
};
use crate::backend::{ChatModel, DataStore};
use crate::config::ChatConfig;
use crate::error::{AppError, Result};
use crate::models::{ChatMessage, NewChatMessage, NewChatThread, UserType};
use crate::response::base64;

/// Text sent when a streamed message carries neither text nor attachments
const EMPTY_MESSAGE_TEXT: &str = "(attached files)";

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub user_id: i64,
    pub session_id: i64,
    pub user_name: String,
    pub user_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub thread_id: i64,
    #[serde(serialize_with = "object_or_empty")]
    pub user_message: Option<ChatMessage>,
    #[serde(serialize_with = "object_or_empty")]
    pub ai_message: Option<ChatMessage>,
    pub status: &'static str,
}

/// Unsaved messages are reported as `{}` rather than `null`
fn object_or_empty<S: Serializer>(
    message: &Option<ChatMessage>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match message {
        Some(message) => message.serialize(serializer),
        None => serde_json::Map::new().serialize(serializer),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatHistory {
    pub thread_id: i64,
    pub messages: Vec<ChatMessage>,
    pub status: &'static str,
}

/// A file uploaded alongside a streamed message
#[derive(Debug, Clone)]
pub struct Attachment {
    pub name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// How an attachment is presented to the model
#[derive(Debug, Clone, PartialEq)]
pub enum AttachmentKind {
    /// Data URI sent as an image part
    Image(String),
    /// UTF-8 contents sent inline
    Text(String),
    /// Neither an image nor text; only its name and size are mentioned
    Binary(usize),
}

impl Attachment {
    pub fn classify(&self) -> AttachmentKind {
        match self.content_type.as_deref() {
            Some(ct) if ct.starts_with("image/") => {
                AttachmentKind::Image(base64::data_uri(&self.data, ct))
            }
            _ => match std::str::from_utf8(&self.data) {
                Ok(text) => AttachmentKind::Text(text.to_string()),
                Err(_) => AttachmentKind::Binary(self.data.len()),
            },
        }
    }

    fn to_part(&self) -> ContentPart {
        match self.classify() {
            AttachmentKind::Image(url) => ContentPart::ImageUrl {
                image_url: ImageUrl { url },
            },
            AttachmentKind::Text(text) => ContentPart::Text {
                text: format!("[File: {}]\n{}", self.name, text),
            },
            AttachmentKind::Binary(size) => ContentPart::Text {
                text: format!(
                    "[Attachment: {} ({} bytes) - unsupported file type]",
                    self.name, size
                ),
            },
        }
    }
}

/// Multipart form of the streaming endpoint, already parsed
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub message: String,
    pub user_id: i64,
    pub session_id: i64,
    pub user_name: String,
    pub user_type: UserType,
    pub attachments: Vec<Attachment>,
}

impl StreamRequest {
    /// Message content for the model: text first, then one part per attachment
    pub fn content(&self) -> MessageContent {
        let mut parts = Vec::with_capacity(self.attachments.len() + 1);
        if !self.message.trim().is_empty() {
            parts.push(ContentPart::Text {
                text: self.message.clone(),
            });
        }
        parts.extend(self.attachments.iter().map(Attachment::to_part));
        if parts.is_empty() {
            parts.push(ContentPart::Text {
                text: EMPTY_MESSAGE_TEXT.to_string(),
            });
        }
        MessageContent::from_parts(parts)
    }

    /// Text stored for the user's turn; attachments are listed by name
    pub fn stored_message(&self) -> String {
        if self.attachments.is_empty() {
            return self.message.clone();
        }
        let names: Vec<&str> = self.attachments.iter().map(|a| a.name.as_str()).collect();
        format!("{} [Attachments: {}]", self.message, names.join(", "))
    }
}

/// Server-sent event emitted by the streaming endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Chunk { content: String },
    Done { thread_id: i64 },
    Error { message: String },
}

pub struct ChatService {
    store: Arc<dyn DataStore>,
    model: Arc<dyn ChatModel>,
    config: ChatConfig,
    threads: DashMap<(i64, i64), i64>,
}

impl ChatService {
    pub fn new(store: Arc<dyn DataStore>, model: Arc<dyn ChatModel>, config: ChatConfig) -> Self {
        Self {
            store,
            model,
            config,
            threads: DashMap::new(),
        }
    }

    /// Thread id for (user, session), creating the thread on first use
    async fn resolve_thread(&self, user_id: i64, session_id: i64) -> Result<i64> {
        let key = (user_id, session_id);
        if let Some(thread_id) = self.threads.get(&key) {
            return Ok(*thread_id);
        }

        let thread = match self.store.find_thread(user_id, session_id).await? {
            Some(thread) => thread,
            None => {
                let thread = self
                    .store
                    .create_thread(NewChatThread { user_id, session_id })
                    .await?;
                debug!(thread_id = thread.id, user_id, session_id, "Chat thread created");
                thread
            }
        };

        self.threads.insert(key, thread.id);
        Ok(thread.id)
    }

    /// Drop cached thread ids of a deleted session
    pub fn forget_session(&self, session_id: i64) {
        self.threads.retain(|(_, session), _| *session != session_id);
    }

    /// Thread and recent history, or thread 0 and no history when the store fails
    async fn load_context(&self, user_id: i64, session_id: i64) -> (i64, Vec<ChatMessage>) {
        let loaded = async {
            let thread_id = self.resolve_thread(user_id, session_id).await?;
            let history = self
                .store
                .recent_messages(thread_id, self.config.history_limit)
                .await?;
            Ok::<_, AppError>((thread_id, history))
        }
        .await;

        match loaded {
            Ok((thread_id, history)) => {
                debug!(thread_id, messages = history.len(), "Loaded chat context");
                (thread_id, history)
            }
            Err(e) => {
                warn!(user_id, session_id, error = %e, "Chat store unavailable, continuing without history");
                (0, Vec::new())
            }
        }
    }

    fn build_prompt(
        &self,
        user_type: UserType,
        user_name: &str,
        history: &[ChatMessage],
        content: MessageContent,
    ) -> Vec<PromptMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(system_prompt(user_type, user_name, &self.config.response_language));
        messages.extend(history.iter().map(|m| {
            let role = if m.is_ai_response { Role::Assistant } else { Role::User };
            PromptMessage::text(role, m.message.clone())
        }));
        messages.push(PromptMessage {
            role: Role::User,
            content,
        });
        messages
    }

    fn user_record(
        &self,
        thread_id: i64,
        user_id: i64,
        user_name: &str,
        user_type: UserType,
        message: String,
    ) -> NewChatMessage {
        NewChatMessage {
            thread_id,
            user_id,
            user_name: user_name.to_string(),
            user_type,
            message,
            is_ai_response: false,
            created_at: Utc::now(),
        }
    }

    fn ai_record(&self, thread_id: i64, message: String) -> NewChatMessage {
        NewChatMessage {
            thread_id,
            user_id: 0,
            user_name: self.config.assistant_name.clone(),
            user_type: UserType::Ai,
            message,
            is_ai_response: true,
            created_at: Utc::now(),
        }
    }

    /// Save both messages; a failed write evicts the cached thread so the next turn re-resolves it
    async fn persist_exchange(
        &self,
        key: (i64, i64),
        user: NewChatMessage,
        ai: NewChatMessage,
    ) -> Result<(ChatMessage, ChatMessage)> {
        let saved = async {
            let user = self.store.create_message(user).await?;
            let ai = self.store.create_message(ai).await?;
            Ok::<_, AppError>((user, ai))
        }
        .await;

        if saved.is_err() {
            self.threads.remove(&key);
        }
        saved
    }

    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let user_type = UserType::participant(&request.user_type)?;
        let (thread_id, history) = self.load_context(request.user_id, request.session_id).await;

        let prompt = self.build_prompt(
            user_type,
            &request.user_name,
            &history,
            MessageContent::Text(request.message.clone()),
        );
        let response = self
            .model
            .complete(ChatPrompt { messages: prompt })
            .await?;

        let (user_message, ai_message) = if thread_id > 0 {
            let user = self.user_record(
                thread_id,
                request.user_id,
                &request.user_name,
                user_type,
                request.message.clone(),
            );
            let ai = self.ai_record(thread_id, response.clone());
            let key = (request.user_id, request.session_id);
            match self.persist_exchange(key, user.clone(), ai.clone()).await {
                Ok((user, ai)) => (Some(user), Some(ai)),
                Err(e) => {
                    warn!(thread_id, error = %e, "Failed to save chat messages, returning unsaved copies");
                    (Some(user.unsaved()), Some(ai.unsaved()))
                }
            }
        } else {
            (None, None)
        };

        info!(thread_id, user_id = request.user_id, "Chat exchange completed");
        Ok(ChatResponse {
            response,
            thread_id,
            user_message,
            ai_message,
            status: "success",
        })
    }

    pub async fn history(&self, user_id: i64, session_id: i64) -> Result<ChatHistory> {
        let loaded = async {
            let thread_id = self.resolve_thread(user_id, session_id).await?;
            let messages = self
                .store
                .recent_messages(thread_id, self.config.history_view_limit)
                .await?;
            Ok::<_, AppError>((thread_id, messages))
        }
        .await;

        let (thread_id, messages) =
            loaded.map_err(|e| AppError::Database(format!("Failed to load chat history: {}", e)))?;
        Ok(ChatHistory {
            thread_id,
            messages,
            status: "success",
        })
    }

    /// Stream the model's answer as events; the exchange is saved once it completes
    pub fn stream(self: &Arc<Self>, request: StreamRequest) -> ReceiverStream<StreamEvent> {
        let (tx, rx) = mpsc::channel(64);
        let service = Arc::clone(self);

        tokio::spawn(async move {
            if let Err(e) = service.run_stream(request, &tx).await {
                warn!(error = %e, "Chat stream failed");
                let _ = tx
                    .send(StreamEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
            }
        });

        ReceiverStream::new(rx)
    }

    async fn run_stream(&self, request: StreamRequest, tx: &mpsc::Sender<StreamEvent>) -> Result<()> {
        let (thread_id, history) = self.load_context(request.user_id, request.session_id).await;
        let prompt = self.build_prompt(
            request.user_type,
            &request.user_name,
            &history,
            request.content(),
        );

        let mut deltas = self
            .model
            .stream(ChatPrompt { messages: prompt })
            .await?;

        let mut collected = String::new();
        while let Some(delta) = deltas.next().await {
            let delta = delta?;
            collected.push_str(&delta);
            if tx.send(StreamEvent::Chunk { content: delta }).await.is_err() {
                debug!(thread_id, "Client went away, abandoning chat stream");
                return Ok(());
            }
        }

        if thread_id > 0 {
            let user = self.user_record(
                thread_id,
                request.user_id,
                &request.user_name,
                request.user_type,
                request.stored_message(),
            );
            let ai = self.ai_record(thread_id, collected);
            let key = (request.user_id, request.session_id);
            if let Err(e) = self.persist_exchange(key, user, ai).await {
                warn!(thread_id, error = %e, "Failed to save streamed chat messages");
            }
        }

        info!(thread_id, attachments = request.attachments.len(), "Chat stream completed");
        let _ = tx.send(StreamEvent::Done { thread_id }).await;
        Ok(())
    }
}
