//! OpenAI-compatible chat completion client

use async_trait::async_trait;
use axum::body::Bytes;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::backend::traits::{ChatModel, ChatPrompt, PromptMessage, Role};
use crate::config::ChatConfig;
use crate::error::{AppError, Result};
use crate::models::UserType;

const PROVIDER: &str = "OpenAI";

/// Chat completion client
pub struct ChatClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    presence_penalty: f32,
    frequency_penalty: f32,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    max_tokens: u32,
    temperature: f32,
    presence_penalty: f32,
    frequency_penalty: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

impl ChatClient {
    /// Create a new chat client from configuration
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            presence_penalty: config.presence_penalty,
            frequency_penalty: config.frequency_penalty,
        })
    }

    async fn send(&self, prompt: &ChatPrompt, stream: bool) -> Result<Response> {
        if self.api_key.is_empty() {
            return Err(AppError::upstream(PROVIDER, None, "API key is not configured"));
        }

        let body = CompletionRequest {
            model: &self.model,
            messages: &prompt.messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            presence_penalty: self.presence_penalty,
            frequency_penalty: self.frequency_penalty,
            stream,
        };

        debug!(
            model = %self.model,
            messages = prompt.messages.len(),
            stream = stream,
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        check_status(response).await
    }
}

fn request_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::Timeout("chat completion timed out".into())
    } else {
        AppError::upstream(PROVIDER, None, format!("request failed: {}", e))
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(status = %status, body = %body, "Chat completion request rejected");

    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => {
            AppError::upstream(PROVIDER, Some(429), "API usage limit exceeded")
        }
        StatusCode::UNAUTHORIZED => AppError::upstream(PROVIDER, None, "invalid API key"),
        StatusCode::GATEWAY_TIMEOUT | StatusCode::REQUEST_TIMEOUT => {
            AppError::Timeout("chat completion timed out".into())
        }
        other if other.is_client_error() => AppError::upstream(
            PROVIDER,
            Some(other.as_u16()),
            format!("returned {}: {}", other, body),
        ),
        other => AppError::upstream(PROVIDER, None, format!("returned {}: {}", other, body)),
    })
}

#[async_trait]
impl ChatModel for ChatClient {
    async fn complete(&self, prompt: ChatPrompt) -> Result<String> {
        let response = self.send(&prompt, false).await?;
        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::upstream(PROVIDER, None, format!("invalid response: {}", e)))?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| AppError::upstream(PROVIDER, None, "empty response"))?;

        info!(model = %self.model, chars = text.len(), "Chat completion done");
        Ok(text)
    }

    async fn stream(&self, prompt: ChatPrompt) -> Result<BoxStream<'static, Result<String>>> {
        let response = self.send(&prompt, true).await?;
        Ok(delta_stream(response.bytes_stream().boxed()))
    }
}

struct StreamState {
    bytes: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

/// Turn the provider's SSE byte stream into text deltas
fn delta_stream(
    bytes: BoxStream<'static, reqwest::Result<Bytes>>,
) -> BoxStream<'static, Result<String>> {
    let state = StreamState {
        bytes,
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(data) = state.pending.pop_front() {
                if data == "[DONE]" {
                    return None;
                }
                match serde_json::from_str::<StreamChunk>(&data) {
                    Ok(chunk) => {
                        let text: String = chunk
                            .choices
                            .into_iter()
                            .filter_map(|choice| choice.delta.content)
                            .collect();
                        if text.is_empty() {
                            continue;
                        }
                        return Some((Ok(text), state));
                    }
                    Err(e) => {
                        state.finished = true;
                        state.pending.clear();
                        let err = AppError::upstream(
                            PROVIDER,
                            None,
                            format!("invalid stream chunk: {}", e),
                        );
                        return Some((Err(err), state));
                    }
                }
            }

            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.push(&chunk);
                    state.pending.extend(events);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(request_error(e)), state));
                }
                None => {
                    let events = state.decoder.finish();
                    state.pending.extend(events);
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}

/// Incremental decoder for `data:` lines of a Server-Sent Events body
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed bytes, returning the payloads of every completed `data:` line
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(data) = parse_data_line(&line) {
                events.push(data);
            }
        }
        events
    }

    /// Flush a trailing line that was not newline-terminated
    pub fn finish(&mut self) -> Vec<String> {
        let line = std::mem::take(&mut self.buffer);
        parse_data_line(&line).into_iter().collect()
    }
}

fn parse_data_line(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\r', '\n']);
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    if data.is_empty() {
        None
    } else {
        Some(data.to_string())
    }
}

/// System message framing the assistant for the current speaker
pub fn system_prompt(user_type: UserType, user_name: &str, language: &str) -> PromptMessage {
    let mut prompt = format!(
        "You are an educational AI assistant on a classroom platform shared by teachers and students.\n\
         Follow these guidelines:\n\
         1. Be friendly and helpful.\n\
         2. Give answers with educational value.\n\
         3. Ask questions or give explanations that help learning.\n\
         4. Politely decline inappropriate requests.\n\
         5. Respond in {}.",
        language
    );

    let name = if user_name.trim().is_empty() { "the user" } else { user_name.trim() };
    match user_type {
        UserType::Teacher => prompt.push_str(&format!(
            "\n\nYou are talking with {}, a teacher. Offer advice that helps with lesson \
             preparation and classroom management.",
            name
        )),
        _ => prompt.push_str(&format!(
            "\n\nYou are talking with {}, a student. Give friendly explanations and \
             encouragement that support learning.",
            name
        )),
    }

    PromptMessage::text(Role::System, prompt)
}
