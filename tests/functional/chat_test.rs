//! Functional tests for the AI chat endpoints

#[path = "../common/mod.rs"]
mod common;

use axum::http::{header::CONTENT_TYPE, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use classroom_gateway::backend::traits::{ContentPart, MessageContent, Role};
use common::*;

fn chat_body(message: &str) -> Value {
    json!({
        "message": message,
        "user_id": 7,
        "session_id": 3,
        "user_name": "Mina",
        "user_type": "student"
    })
}

/// `data:` payloads of an SSE body, in order
fn sse_events(body: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(body)
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect()
}

#[tokio::test]
async fn test_chat_persists_exchange_and_replays_history() {
    let store = MemoryStore::new();
    let model = FakeChatModel::replying(&["Hello", " there"]);
    let app = test_app_with(test_settings(), store.clone(), model.clone(), FakeImageGenerator::new());

    let response = app
        .clone()
        .oneshot(post_json("/chat/ai", chat_body("What is a volcano?")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["response"], "Hello there");
    assert_eq!(body["status"], "success");
    let thread_id = body["thread_id"].as_i64().unwrap();
    assert!(thread_id > 0);
    assert_eq!(body["user_message"]["message"], "What is a volcano?");
    assert_eq!(body["ai_message"]["user_type"], "ai");
    assert_eq!(body["ai_message"]["user_id"], 0);
    assert_eq!(body["ai_message"]["is_ai_response"], true);

    app.clone()
        .oneshot(post_json("/chat/ai", chat_body("And a glacier?")))
        .await
        .unwrap();

    let prompts = model.prompts();
    assert_eq!(prompts.len(), 2);
    let second = &prompts[1].messages;
    assert_eq!(second.len(), 4);
    assert_eq!(second[0].role, Role::System);
    assert_eq!(second[1].role, Role::User);
    assert_eq!(second[2].role, Role::Assistant);
    assert_eq!(second[3].content, MessageContent::Text("And a glacier?".into()));

    let history = body_json(app.oneshot(get("/chat/history/7/3")).await.unwrap()).await;
    assert_eq!(history["thread_id"], thread_id);
    assert_eq!(history["messages"].as_array().unwrap().len(), 4);
    assert_eq!(store.messages().len(), 4);
}

#[tokio::test]
async fn test_chat_degrades_when_store_is_down() {
    let store = MemoryStore::new();
    store.set_failing(true);

    let response = test_app(store)
        .oneshot(post_json("/chat/ai", chat_body("Hi")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["response"], "Hello there");
    assert_eq!(body["thread_id"], 0);
    assert_eq!(body["user_message"], json!({}));
    assert_eq!(body["ai_message"], json!({}));
}

#[tokio::test]
async fn test_chat_returns_unsaved_copies_when_writes_fail() {
    let store = MemoryStore::new();
    let app = test_app(store.clone());

    let first = body_json(
        app.clone()
            .oneshot(post_json("/chat/ai", chat_body("What is a volcano?")))
            .await
            .unwrap(),
    )
    .await;
    let thread_id = first["thread_id"].as_i64().unwrap();
    assert!(thread_id > 0);

    store.set_failing_writes(true);
    let response = app
        .clone()
        .oneshot(post_json("/chat/ai", chat_body("And a glacier?")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["thread_id"], thread_id);
    assert_eq!(body["user_message"]["id"], 0);
    assert_eq!(body["user_message"]["message"], "And a glacier?");
    assert_eq!(body["user_message"]["thread_id"], thread_id);
    assert_eq!(body["ai_message"]["id"], 0);
    assert_eq!(body["ai_message"]["user_type"], "ai");
    assert_eq!(store.messages().len(), 2);

    store.set_failing_writes(false);
    let body = body_json(
        app.oneshot(post_json("/chat/ai", chat_body("Thanks")))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["thread_id"], thread_id);
    assert!(body["user_message"]["id"].as_i64().unwrap() > 0);
    assert_eq!(store.messages().len(), 4);
}

#[tokio::test]
async fn test_deleted_session_starts_a_new_thread() {
    let store = MemoryStore::new();
    let teacher = store.seed_teacher("Ms. Park", "park@school.kr", "secret");
    let session = store.seed_session(teacher.id, "AB12CD", in_one_day());
    let app = test_app(store.clone());

    let mut body = chat_body("Hi");
    body["session_id"] = json!(session.id);

    let first = body_json(app.clone().oneshot(post_json("/chat/ai", body.clone())).await.unwrap()).await;
    let old_thread = first["thread_id"].as_i64().unwrap();
    assert!(old_thread > 0);

    let response = app
        .clone()
        .oneshot(delete(&format!("/teacher/session/{}", session.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(store.threads().is_empty());
    assert!(store.messages().is_empty());

    let second = body_json(app.oneshot(post_json("/chat/ai", body)).await.unwrap()).await;
    let new_thread = second["thread_id"].as_i64().unwrap();
    assert!(new_thread > 0);
    assert_ne!(new_thread, old_thread);
    assert_eq!(store.threads().len(), 1);
    assert!(store.messages().iter().all(|m| m.thread_id == new_thread));
}

#[tokio::test]
async fn test_history_fails_when_store_is_down() {
    let store = MemoryStore::new();
    store.set_failing(true);

    let response = test_app(store).oneshot(get("/chat/history/7/3")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_chat_provider_failure_is_reported() {
    let app = test_app_with(
        test_settings(),
        MemoryStore::new(),
        FakeChatModel::failing(),
        FakeImageGenerator::new(),
    );

    let response = app.oneshot(post_json("/chat/ai", chat_body("Hi"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_chat_rejects_unknown_user_type() {
    let mut body = chat_body("Hi");
    body["user_type"] = json!("admin");

    let response = test_app(MemoryStore::new())
        .oneshot(post_json("/chat/ai", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stream_emits_chunks_then_done() {
    let store = MemoryStore::new();
    let model = FakeChatModel::replying(&["Lava", " is hot"]);
    let app = test_app_with(test_settings(), store.clone(), model.clone(), FakeImageGenerator::new());

    let request = MultipartForm::new()
        .text("message", "Explain")
        .text("user_id", "7")
        .text("session_id", "3")
        .text("user_name", "Mina")
        .text("user_type", "student")
        .file("file_0", "notes.txt", "text/plain", b"magma rises")
        .into_request("/chat/ai/stream");

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let events = sse_events(&body_bytes(response).await);
    assert_eq!(events.len(), 3);
    assert_eq!(events[0], json!({"type": "chunk", "content": "Lava"}));
    assert_eq!(events[1], json!({"type": "chunk", "content": " is hot"}));
    assert_eq!(events[2]["type"], "done");
    assert!(events[2]["thread_id"].as_i64().unwrap() > 0);

    let messages = store.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].message, "Explain [Attachments: notes.txt]");
    assert_eq!(messages[1].message, "Lava is hot");

    let prompt = &model.prompts()[0].messages;
    match &prompt.last().unwrap().content {
        MessageContent::Parts(parts) => {
            assert_eq!(parts.len(), 2);
            assert_eq!(parts[0], ContentPart::Text { text: "Explain".into() });
            assert_eq!(
                parts[1],
                ContentPart::Text {
                    text: "[File: notes.txt]\nmagma rises".into()
                }
            );
        }
        other => panic!("expected multimodal content, got {:?}", other),
    }
}

#[tokio::test]
async fn test_stream_reports_provider_failure_as_event() {
    let app = test_app_with(
        test_settings(),
        MemoryStore::new(),
        FakeChatModel::failing(),
        FakeImageGenerator::new(),
    );

    let request = MultipartForm::new()
        .text("message", "Hi")
        .text("user_id", "7")
        .text("session_id", "3")
        .text("user_name", "Mina")
        .text("user_type", "teacher")
        .into_request("/chat/ai/stream");

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let events = sse_events(&body_bytes(response).await);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "error");
    assert!(events[0]["message"].as_str().unwrap().contains("API usage limit exceeded"));
}

#[tokio::test]
async fn test_stream_degrades_when_store_is_down() {
    let store = MemoryStore::new();
    store.set_failing(true);
    let model = FakeChatModel::replying(&["Lava", " is hot"]);
    let app = test_app_with(test_settings(), store.clone(), model.clone(), FakeImageGenerator::new());

    let request = MultipartForm::new()
        .text("message", "Explain")
        .text("user_id", "7")
        .text("session_id", "3")
        .text("user_name", "Mina")
        .text("user_type", "student")
        .into_request("/chat/ai/stream");

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let events = sse_events(&body_bytes(response).await);
    assert_eq!(
        events,
        vec![
            json!({"type": "chunk", "content": "Lava"}),
            json!({"type": "chunk", "content": " is hot"}),
            json!({"type": "done", "thread_id": 0}),
        ]
    );
    assert_eq!(model.prompts()[0].messages.len(), 2);
    assert!(store.messages().is_empty());
    assert!(store.threads().is_empty());
}

#[tokio::test]
async fn test_stream_rejects_invalid_form() {
    let request = MultipartForm::new()
        .text("message", "Hi")
        .text("user_id", "seven")
        .text("session_id", "3")
        .text("user_name", "Mina")
        .text("user_type", "student")
        .into_request("/chat/ai/stream");

    let response = test_app(MemoryStore::new()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_health() {
    let body = body_json(test_app(MemoryStore::new()).oneshot(get("/chat/health")).await.unwrap()).await;
    assert_eq!(body, json!({"status": "healthy", "service": "chat"}));
}
