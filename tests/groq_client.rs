//! Request/response behaviour of the Groq client against a local stub.

mod common;

use axum::http::{Method, StatusCode};
use relaybot::groq::{Client, Error, Inference, Model};

fn client(base_url: String) -> Client {
    Client::new("gsk_test".to_string(), base_url)
}

#[tokio::test]
async fn test_completion_request_and_content() {
    let (base, rx) = common::serve_json(
        StatusCode::OK,
        r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"4"}}]}"#,
    )
    .await;

    let content = client(base).complete(Model::default(), "2+2?").await.unwrap();
    assert_eq!(content.as_deref(), Some("4"));

    let request = rx.await.unwrap();
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.path, "/openai/v1/chat/completions");
    assert_eq!(request.header("authorization"), Some("Bearer gsk_test"));
    let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(
        body,
        serde_json::json!({
            "messages": [{"role": "user", "content": "2+2?"}],
            "model": "llama3-70b-8192"
        })
    );
}

#[tokio::test]
async fn test_completion_selected_model() {
    let (base, rx) = common::serve_json(StatusCode::OK, r#"{"choices":[]}"#).await;

    let content = client(base).complete(Model::Mixtral8x7b, "hi").await.unwrap();
    assert!(content.is_none());

    let request = rx.await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(body["model"], "mixtral-8x7b-32768");
}

#[tokio::test]
async fn test_completion_api_error() {
    let (base, _rx) = common::serve_json(
        StatusCode::UNAUTHORIZED,
        r#"{"error":{"message":"Invalid API Key"}}"#,
    )
    .await;

    let err = client(base).complete(Model::default(), "hi").await.unwrap_err();
    assert!(matches!(err, Error::Api(_)));
    assert!(err.to_string().contains("Invalid API Key"));
}

#[tokio::test]
async fn test_completion_malformed_body() {
    let (base, _rx) = common::serve_json(StatusCode::OK, "not json").await;

    let err = client(base).complete(Model::default(), "hi").await.unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
}

#[tokio::test]
async fn test_completion_connection_refused() {
    let err = client("http://127.0.0.1:1".into())
        .complete(Model::default(), "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Http(_)));
}

#[tokio::test]
async fn test_transcription_form_fields() {
    let dir = tempfile::tempdir().unwrap();
    let audio = dir.path().join("3f2a-memo.ogg");
    std::fs::write(&audio, b"OggS fake audio").unwrap();

    let (base, rx) = common::serve_json(StatusCode::OK, r#"{"text":" Hello there."}"#).await;

    let text = client(base).transcribe(&audio).await.unwrap();
    assert_eq!(text.as_deref(), Some(" Hello there."));

    let request = rx.await.unwrap();
    assert_eq!(request.path, "/openai/v1/audio/transcriptions");
    assert_eq!(request.header("authorization"), Some("Bearer gsk_test"));
    assert!(request.header("content-type").unwrap().starts_with("multipart/form-data"));

    let file = request.field("file").expect("file part");
    assert_eq!(file.file_name.as_deref(), Some("3f2a-memo.ogg"));
    assert_eq!(&file.data[..], b"OggS fake audio");
    for (field, value) in [
        ("model", "whisper-large-v3"),
        ("prompt", ""),
        ("response_format", "json"),
        ("language", "en"),
        ("temperature", "0"),
    ] {
        let part = request.field(field).unwrap_or_else(|| panic!("missing field {field}"));
        assert_eq!(part.text(), value, "field {field}");
    }
}

#[tokio::test]
async fn test_transcription_without_text() {
    let dir = tempfile::tempdir().unwrap();
    let audio = dir.path().join("memo.ogg");
    std::fs::write(&audio, b"OggS").unwrap();

    let (base, _rx) = common::serve_json(StatusCode::OK, r#"{}"#).await;

    assert!(client(base).transcribe(&audio).await.unwrap().is_none());
}

#[tokio::test]
async fn test_transcription_missing_file() {
    let err = client("http://127.0.0.1:1".into())
        .transcribe(std::path::Path::new("/nonexistent/memo.ogg"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[tokio::test]
async fn test_transcription_streams_large_file_intact() {
    let dir = tempfile::tempdir().unwrap();
    let audio = dir.path().join("long.ogg");
    let data: Vec<u8> = (0..512 * 1024).map(|i| (i % 251) as u8).collect();
    std::fs::write(&audio, &data).unwrap();

    let (base, rx) = common::serve_json(StatusCode::OK, r#"{"text":"ok"}"#).await;
    client(base).transcribe(&audio).await.unwrap();

    let request = rx.await.unwrap();
    let file = request.field("file").expect("file part");
    assert_eq!(file.data.len(), data.len());
    assert_eq!(&file.data[..], &data[..]);
}
