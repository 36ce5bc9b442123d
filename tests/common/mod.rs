//! In-process axum stand-in for the Groq API.

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use tokio::sync::oneshot;

/// One uploaded multipart field.
pub struct FormField {
    pub name: String,
    pub file_name: Option<String>,
    pub data: Bytes,
}

impl FormField {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// A request as seen by the stub.
pub struct Captured {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    /// Raw body; empty for multipart uploads, which land in `fields`.
    pub body: Bytes,
    pub fields: Vec<FormField>,
}

impl Captured {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Clone)]
struct Stub {
    status: StatusCode,
    body: &'static str,
    tx: Arc<Mutex<Option<oneshot::Sender<Captured>>>>,
}

impl Stub {
    fn record(&self, captured: Captured) {
        if let Some(tx) = self.tx.lock().unwrap().take() {
            let _ = tx.send(captured);
        }
    }

    fn respond(&self) -> Response {
        (self.status, [(header::CONTENT_TYPE, "application/json")], self.body).into_response()
    }
}

async fn capture_raw(
    State(stub): State<Stub>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    stub.record(Captured {
        method,
        path: uri.path().to_string(),
        headers,
        body,
        fields: Vec::new(),
    });
    stub.respond()
}

async fn capture_form(
    State(stub): State<Stub>,
    uri: Uri,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let mut fields = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let data = field.bytes().await.unwrap_or_default();
        fields.push(FormField { name, file_name, data });
    }
    stub.record(Captured {
        method: Method::POST,
        path: uri.path().to_string(),
        headers,
        body: Bytes::new(),
        fields,
    });
    stub.respond()
}

/// Answer requests with `status` and a JSON `body`.
///
/// Returns the API base URL and a receiver for the first captured request.
pub async fn serve_json(status: StatusCode, body: &'static str) -> (String, oneshot::Receiver<Captured>) {
    let (tx, rx) = oneshot::channel();
    let stub = Stub {
        status,
        body,
        tx: Arc::new(Mutex::new(Some(tx))),
    };

    let router = Router::new()
        .route("/openai/v1/audio/transcriptions", post(capture_form))
        .fallback(capture_raw)
        .with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    (format!("http://{addr}/openai/v1"), rx)
}
