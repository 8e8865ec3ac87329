//! Unit tests for the chat and image provider clients

use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use classroom_gateway::backend::traits::{
    ChatPrompt, ImageGenerationRequest, ImageTier, PromptMessage, Role,
};
use classroom_gateway::backend::{ChatClient, ChatModel, ImageGenerator, StabilityClient};
use classroom_gateway::config::{ChatConfig, ImageConfig};
use classroom_gateway::response::base64;
use classroom_gateway::AppError;

fn chat_client(server: &MockServer) -> ChatClient {
    ChatClient::new(&ChatConfig {
        base_url: server.uri(),
        api_key: "sk-test".into(),
        ..ChatConfig::default()
    })
    .unwrap()
}

fn prompt() -> ChatPrompt {
    ChatPrompt {
        messages: vec![
            PromptMessage::text(Role::System, "be kind"),
            PromptMessage::text(Role::User, "hello"),
        ],
    }
}

#[tokio::test]
async fn test_chat_completion_request_and_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "max_tokens": 500,
            "stream": false,
            "messages": [
                {"role": "system", "content": "be kind"},
                {"role": "user", "content": "hello"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "  Hi there!  "}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = chat_client(&server).complete(prompt()).await.unwrap();
    assert_eq!(text, "Hi there!");
}

#[tokio::test]
async fn test_chat_error_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let err = chat_client(&server).complete(prompt()).await.unwrap_err();
    assert!(matches!(err, AppError::Upstream { status: Some(429), .. }));
    assert_eq!(err.status_code().as_u16(), 429);

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = chat_client(&server).complete(prompt()).await.unwrap_err();
    assert_eq!(err.status_code().as_u16(), 502);
    assert!(err.to_string().contains("invalid API key"));
}

#[tokio::test]
async fn test_chat_client_errors_keep_their_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("context length exceeded"))
        .mount(&server)
        .await;

    let err = chat_client(&server).complete(prompt()).await.unwrap_err();
    assert!(matches!(err, AppError::Upstream { status: Some(400), .. }));
    assert_eq!(err.status_code().as_u16(), 400);
    assert!(err.to_string().contains("context length exceeded"));

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = chat_client(&server).complete(prompt()).await.unwrap_err();
    assert!(matches!(err, AppError::Upstream { status: None, .. }));
    assert_eq!(err.status_code().as_u16(), 502);
}

#[tokio::test]
async fn test_chat_without_key_does_not_call_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = ChatClient::new(&ChatConfig {
        base_url: server.uri(),
        ..ChatConfig::default()
    })
    .unwrap();
    assert!(client.complete(prompt()).await.is_err());
}

#[tokio::test]
async fn test_chat_stream_yields_deltas() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Vol\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"canoes\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let deltas: Vec<String> = chat_client(&server)
        .stream(prompt())
        .await
        .unwrap()
        .map(|delta| delta.unwrap())
        .collect()
        .await;
    assert_eq!(deltas, vec!["Vol", "canoes"]);
}

fn stability_client(server: &MockServer) -> StabilityClient {
    StabilityClient::new(&ImageConfig {
        base_url: server.uri(),
        api_key: "stab-key".into(),
        timeout_ms: 5000,
    })
    .unwrap()
}

#[tokio::test]
async fn test_stability_returns_raw_image_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2beta/stable-image/generate/core"))
        .and(header("authorization", "Bearer stab-key"))
        .and(header("accept", "image/*"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(vec![0x89, b'P', b'N', b'G']),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut request = ImageGenerationRequest::new(ImageTier::Core, "a cat", "png");
    request.aspect_ratio = Some("1:1".into());
    let data = stability_client(&server).generate(request).await.unwrap();
    assert_eq!(data, vec![0x89, b'P', b'N', b'G']);

    let received = server.received_requests().await.unwrap();
    let form = String::from_utf8_lossy(&received[0].body).to_string();
    assert!(form.contains("name=\"prompt\""));
    assert!(form.contains("a cat"));
    assert!(form.contains("name=\"aspect_ratio\""));
    assert!(!form.contains("name=\"seed\""));
}

#[tokio::test]
async fn test_stability_decodes_json_artifacts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2beta/stable-image/generate/ultra"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "artifacts": [{"base64": base64::encode(b"jpeg-bytes")}]
        })))
        .mount(&server)
        .await;

    let request = ImageGenerationRequest::new(ImageTier::Ultra, "a dog", "jpeg");
    let data = stability_client(&server).generate(request).await.unwrap();
    assert_eq!(data, b"jpeg-bytes".to_vec());
}

#[tokio::test]
async fn test_stability_error_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad prompt"))
        .mount(&server)
        .await;

    let request = ImageGenerationRequest::new(ImageTier::Sketch, "a house", "png");
    let err = stability_client(&server).generate(request).await.unwrap_err();
    assert!(matches!(err, AppError::Upstream { status: Some(400), .. }));
    assert!(err.to_string().contains("API error: 400 - bad prompt"));
}
