#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

/// Four-byte "icon" whose search-engine hash is known.
pub const ICON_BYTES: &[u8] = b"\x00\x00\x01\x00";
pub const ICON_HASH: &str = "-216455174";
pub const FOFA_KEY: &str = "secret";

pub async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub server");
    let addr = listener.local_addr().expect("stub address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });
    addr
}

/// Site serving `page` at `/` and, when given, an icon at `icon_path`.
pub fn site(page: &'static str, icon_path: Option<&'static str>) -> Router {
    let mut router = Router::new().route("/", get(move || async move { Html(page) }));
    if let Some(path) = icon_path {
        router = router.route(
            path,
            get(|| async { ([(header::CONTENT_TYPE, "image/x-icon")], ICON_BYTES) }),
        );
    }
    router
}

#[derive(Clone, Default)]
pub struct FofaStub {
    rows: Arc<HashMap<String, Vec<Value>>>,
    pub queries: Arc<Mutex<Vec<String>>>,
}

impl FofaStub {
    pub fn new(rows: HashMap<String, Vec<Value>>) -> Self {
        Self {
            rows: Arc::new(rows),
            queries: Arc::default(),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/v1/search/all", get(fofa_search))
            .with_state(self.clone())
    }

    pub fn recorded(&self) -> Vec<String> {
        self.queries.lock().expect("queries lock").clone()
    }
}

pub fn fofa_row(host: &str, scheme: &str) -> Value {
    json!([host, "127.0.0.1", "0", scheme])
}

async fn fofa_search(
    State(stub): State<FofaStub>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    if params.get("key").map(String::as_str) != Some(FOFA_KEY) {
        return Json(json!({"error": true, "errmsg": "[-700] Account Invalid"}));
    }
    let query = params
        .get("qbase64")
        .and_then(|encoded| STANDARD.decode(encoded).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_default();
    stub.queries.lock().expect("queries lock").push(query.clone());
    let rows = stub.rows.get(&query).cloned().unwrap_or_default();
    Json(json!({
        "error": false,
        "size": rows.len(),
        "page": 1,
        "mode": "extended",
        "query": query,
        "results": rows,
    }))
}

/// Chat completions stub answering every request with `reply`.
pub fn chat_stub(reply: &'static str, status: StatusCode) -> Router {
    Router::new().route(
        "/chat/completions",
        post(move |headers: axum::http::HeaderMap, Json(body): Json<Value>| async move {
            let authorized = headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                == Some("Bearer sk-test");
            if !authorized || body["messages"][0]["role"] != "system" {
                return (StatusCode::UNAUTHORIZED, "bad request shape").into_response();
            }
            if status != StatusCode::OK {
                return (status, "upstream overloaded").into_response();
            }
            Json(json!({
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "model": body["model"],
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": reply},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
            }))
            .into_response()
        }),
    )
}

/// Anthropic messages stub answering every request with `reply`.
pub fn messages_stub(reply: &'static str) -> Router {
    Router::new().route(
        "/v1/messages",
        post(move |headers: axum::http::HeaderMap, Json(body): Json<Value>| async move {
            let keyed = headers
                .get("x-api-key")
                .and_then(|value| value.to_str().ok())
                == Some("sk-ant-test");
            if !keyed || headers.get("anthropic-version").is_none() || body["system"].is_null() {
                return (StatusCode::UNAUTHORIZED, "bad request shape").into_response();
            }
            Json(json!({
                "id": "msg_1",
                "type": "message",
                "role": "assistant",
                "content": [
                    {"type": "thinking", "thinking": "..."},
                    {"type": "text", "text": reply}
                ],
                "stop_reason": "end_turn"
            }))
            .into_response()
        }),
    )
}
