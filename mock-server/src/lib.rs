use std::{collections::HashMap, collections::VecDeque, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Deserialize)]
pub struct EmbeddingRequest {
    pub model: String,
    pub input: Vec<String>,
}

/// Shared state: the scripted assistant replies still to be served and a
/// log of every completion request received.
#[derive(Clone, Default)]
pub struct Upstream {
    replies: Arc<Mutex<VecDeque<String>>>,
    received: Arc<Mutex<Vec<ChatRequest>>>,
}

impl Upstream {
    /// Completions are answered with `replies` in order; once they run out
    /// the endpoint returns 503.
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().map(Into::into).collect())),
            received: Arc::default(),
        }
    }

    pub async fn received(&self) -> Vec<ChatRequest> {
        self.received.lock().await.clone()
    }

    /// Blocking variant of [`Upstream::received`] for synchronous tests.
    /// Must not be called from inside a runtime.
    pub fn received_blocking(&self) -> Vec<ChatRequest> {
        self.received.blocking_lock().clone()
    }
}

pub fn app(upstream: Upstream) -> Router {
    Router::new()
        .route("/chat/completions", post(chat_completions))
        .route("/embeddings", post(embeddings))
        .route("/v2/assets", get(list_assets))
        .route("/v2/assets/{id}", get(get_asset))
        .route("/api/v3/NextPublicHolidays/{country}", get(next_public_holidays))
        .route("/status/{code}", get(status))
        .route("/text", get(plain_text))
        .route("/echo", any(echo))
        .with_state(upstream)
}

pub async fn run(listener: TcpListener, upstream: Upstream) -> Result<(), std::io::Error> {
    axum::serve(listener, app(upstream)).await
}

async fn chat_completions(
    State(upstream): State<Upstream>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Response {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer ") && v.len() > "Bearer ".len());
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"message": "missing bearer token"}})),
        )
            .into_response();
    }

    let model = request.model.clone();
    upstream.received.lock().await.push(request);

    let Some(reply) = upstream.replies.lock().await.pop_front() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": {"message": "no scripted reply left"}})),
        )
            .into_response();
    };

    Json(json!({
        "id": "chatcmpl-stub",
        "object": "chat.completion",
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": reply},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 0, "completion_tokens": 0, "total_tokens": 0}
    }))
    .into_response()
}

/// Letter-frequency vectors: identical texts embed identically and texts
/// sharing letters score higher than texts that do not.
pub fn letter_histogram(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; 26];
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() {
            vector[(c as u8 - b'a') as usize] += 1.0;
        }
    }
    vector
}

async fn embeddings(Json(request): Json<EmbeddingRequest>) -> Json<Value> {
    // Returned in reverse order so clients must honor `index`.
    let data: Vec<Value> = request
        .input
        .iter()
        .enumerate()
        .rev()
        .map(|(index, text)| json!({"object": "embedding", "index": index, "embedding": letter_histogram(text)}))
        .collect();
    Json(json!({"object": "list", "model": request.model, "data": data}))
}

fn asset(id: &str) -> Option<Value> {
    let (symbol, name, price) = match id {
        "bitcoin" => ("BTC", "Bitcoin", "97000.5512"),
        "ethereum" => ("ETH", "Ethereum", "3300.1234"),
        "dogecoin" => ("DOGE", "Dogecoin", "0.3187"),
        _ => return None,
    };
    Some(json!({
        "id": id,
        "symbol": symbol,
        "name": name,
        "priceUsd": price,
        "changePercent24Hr": "1.25"
    }))
}

async fn list_assets(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let limit = params
        .get("limit")
        .and_then(|l| l.parse::<usize>().ok())
        .unwrap_or(usize::MAX);
    let data: Vec<Value> = ["bitcoin", "ethereum", "dogecoin"]
        .into_iter()
        .filter_map(asset)
        .take(limit)
        .collect();
    Json(json!({"data": data, "timestamp": 1736000000000u64}))
}

async fn get_asset(Path(id): Path<String>) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    asset(&id)
        .map(|data| Json(json!({"data": data, "timestamp": 1736000000000u64})))
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(json!({"error": format!("{id} not found")})),
            )
        })
}

async fn next_public_holidays(Path(country): Path<String>) -> Result<Json<Value>, StatusCode> {
    let holidays = match country.as_str() {
        "US" => json!([
            {"date": "2025-01-20", "localName": "Martin Luther King, Jr. Day", "name": "Martin Luther King, Jr. Day", "countryCode": "US"},
            {"date": "2025-02-17", "localName": "Presidents Day", "name": "Washington's Birthday", "countryCode": "US"}
        ]),
        "FR" => json!([
            {"date": "2025-04-21", "localName": "Lundi de Pâques", "name": "Easter Monday", "countryCode": "FR"}
        ]),
        _ => return Err(StatusCode::NOT_FOUND),
    };
    Ok(Json(holidays))
}

async fn status(Path(code): Path<u16>) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (status, Json(json!({"status": status.as_u16()}))).into_response()
}

async fn plain_text() -> &'static str {
    "plain text, not JSON"
}

/// Reflect the request back as JSON so clients can check what they sent.
async fn echo(
    method: Method,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    let headers: HashMap<String, String> = headers
        .iter()
        .filter(|(name, _)| name.as_str().starts_with("x-") || *name == header::CONTENT_TYPE)
        .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
        .collect();
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    Json(json!({
        "method": method.as_str(),
        "query": query,
        "headers": headers,
        "body": body
    }))
}
