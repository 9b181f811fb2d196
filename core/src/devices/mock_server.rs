// Copyright 2025 HEM Sp. z o.o.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Local HTTP server standing in for Home Assistant and the Apple TV service in tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

#[derive(Default)]
struct ServerState {
    requests: Mutex<Vec<RecordedRequest>>,
    states: Mutex<HashMap<String, Value>>,
    failing_paths: Mutex<HashSet<String>>,
}

pub(crate) struct MockServer {
    address: std::net::SocketAddr,
    state: Arc<ServerState>,
}

async fn record(
    State(state): State<Arc<ServerState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.to_string(),
        path: path.clone(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: String::from_utf8_lossy(&body).to_string(),
    });

    if state.failing_paths.lock().unwrap().contains(&path) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "failure").into_response();
    }
    if let Some(entity_id) = path.rsplit_once("/api/states/").map(|(_, id)| id.to_string()) {
        return match state.states.lock().unwrap().get(&entity_id) {
            Some(entity) => axum::Json(entity.clone()).into_response(),
            None => (StatusCode::NOT_FOUND, "Entity not found").into_response(),
        };
    }
    (StatusCode::OK, "OK").into_response()
}

impl MockServer {
    pub async fn start() -> Self {
        let state = Arc::new(ServerState::default());
        let app = Router::new().fallback(record).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { address, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.address)
    }

    pub fn host(&self) -> String {
        self.address.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }

    pub fn set_state(&self, entity_id: &str, state: &str, attributes: Value) {
        self.state.states.lock().unwrap().insert(
            entity_id.to_string(),
            json!({ "entity_id": entity_id, "state": state, "attributes": attributes }),
        );
    }

    pub fn fail_path(&self, path: &str) {
        self.state.failing_paths.lock().unwrap().insert(path.to_string());
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Service calls only, as `(path, json body)`.
    pub fn service_calls(&self) -> Vec<(String, Value)> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.contains("/api/services/"))
            .map(|r| {
                let body = r.json();
                (r.path, body)
            })
            .collect()
    }
}

/// Accepts connections and never answers. Returns its address.
pub(crate) async fn start_silent_listener() -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    address
}
