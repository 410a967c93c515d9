//! Mock of the remote document service for integration tests.
//!
//! Each endpoint replays a queue of scripted replies and records the
//! requests it saw, so tests can assert on both state and traffic.

#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Clone, Debug)]
pub enum Reply {
    Json(u16, Value),
    Text(u16, String),
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Reply::Json(200, body)
    }

    pub fn not_found() -> Self {
        Reply::Json(404, json!({ "detail": "Not Found" }))
    }

    pub fn error(status: u16, detail: &str) -> Self {
        Reply::Json(status, json!({ "detail": detail }))
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self {
            Reply::Json(status, body) => {
                (StatusCode::from_u16(status).unwrap(), Json(body)).into_response()
            }
            Reply::Text(status, body) => (StatusCode::from_u16(status).unwrap(), body).into_response(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Seen {
    Parse { owner: String, document_id: String },
    Query { owner: String, document_id: String, body: Value },
}

#[derive(Default)]
pub struct MockService {
    parse: Mutex<VecDeque<Reply>>,
    query: Mutex<VecDeque<Reply>>,
    seen: Mutex<Vec<Seen>>,
}

impl MockService {
    pub fn new(parse: Vec<Reply>, query: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            parse: Mutex::new(parse.into()),
            query: Mutex::new(query.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn parse_calls(&self) -> usize {
        self.seen()
            .iter()
            .filter(|s| matches!(s, Seen::Parse { .. }))
            .count()
    }

    pub fn query_calls(&self) -> usize {
        self.seen()
            .iter()
            .filter(|s| matches!(s, Seen::Query { .. }))
            .count()
    }
}

async fn handle_parse(
    State(mock): State<Arc<MockService>>,
    Path((owner, document_id)): Path<(String, String)>,
) -> Reply {
    mock.seen.lock().unwrap().push(Seen::Parse { owner, document_id });
    mock.parse
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Reply::error(500, "no scripted parse reply"))
}

async fn handle_query(
    State(mock): State<Arc<MockService>>,
    Path((owner, document_id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Reply {
    mock.seen.lock().unwrap().push(Seen::Query {
        owner,
        document_id,
        body,
    });
    mock.query
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Reply::error(500, "no scripted query reply"))
}

/// Serve the mock on an ephemeral loopback port and return its base URL.
pub async fn spawn(mock: Arc<MockService>) -> String {
    let app = Router::new()
        .route("/file/parse/{owner}/{document_id}", get(handle_parse))
        .route("/query/{owner}/{document_id}", post(handle_query))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Write a config file pointing at `base_url`.
pub fn write_config(base_url: &str, owner: Option<&str>) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let mut content = format!(
        "[service]\nbase_url = \"{}\"\ntimeout_secs = 5\n\n[query]\ntop_k = 5\n",
        base_url
    );
    if let Some(owner) = owner {
        content.push_str(&format!("\n[session]\nowner = \"{}\"\n", owner));
    }
    let path = tmp.path().join("rgk.toml");
    std::fs::write(&path, content).unwrap();
    (tmp, path)
}

pub fn stored_hello_world() -> Reply {
    Reply::ok(json!({
        "message": "stored successfully",
        "raw_text": "Hello world",
        "chunks": ["Hello", "world"]
    }))
}

pub fn answer_42() -> Reply {
    Reply::ok(json!({
        "answer": "42",
        "source_chunks": [{ "chunk_index": 1, "text": "world" }],
        "file_id": 42,
        "query": "What is the deadline?"
    }))
}
