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

//! HTTP control surface for an Apple TV. Every route forwards to a cached backend connection.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use log::{info, warn};
use pnut_core::devices::RemoteCommand;
use serde::Deserialize;
use tokio::sync::Mutex;

pub mod apple_tv;
pub mod config;
pub mod hass_backend;

pub use apple_tv::{AppleTvConnector, AppleTvInterface, AtvError, PowerState};
pub use config::AtvServiceConfig;
pub use hass_backend::{HassAppleTv, HassConnector};

type Connection = Arc<dyn AppleTvInterface>;

#[derive(Clone)]
pub struct AppState {
    connector: Arc<dyn AppleTvConnector>,
    connection: Arc<Mutex<Option<Connection>>>,
}

impl AppState {
    pub fn new(connector: Arc<dyn AppleTvConnector>) -> Self {
        Self {
            connector,
            connection: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the cached connection, connecting first if there is none.
    async fn connection(&self) -> Result<Connection, AtvError> {
        let mut cached = self.connection.lock().await;
        if let Some(connection) = cached.as_ref() {
            return Ok(connection.clone());
        }
        let connection = self.connector.connect().await?;
        *cached = Some(connection.clone());
        Ok(connection)
    }

    async fn drop_connection(&self) {
        if let Some(connection) = self.connection.lock().await.take() {
            connection.close().await;
        }
    }

    /// Closes the cached connection, if any.
    pub async fn close(&self) {
        self.drop_connection().await;
        info!("Apple TV connection closed");
    }
}

fn ok() -> Response {
    (StatusCode::OK, "OK").into_response()
}

fn failed(message: impl Into<String>) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, message.into()).into_response()
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/launch_app/:app", get(launch_app))
        .route("/remote_control/:command", get(remote_control))
        .route("/power_toggle", get(power_toggle))
        .route("/keyboard_enter", post(keyboard_enter))
        .route("/keyboard_clear", get(keyboard_clear))
        .route("/keep_alive", get(keep_alive))
        .with_state(state)
}

macro_rules! connect_or_fail {
    ($state:expr) => {
        match $state.connection().await {
            Ok(connection) => connection,
            Err(e) => {
                warn!("Could not connect to Apple TV: {}", e);
                return failed(format!("Device could not be connected: {}", e));
            }
        }
    };
}

async fn launch_app(State(state): State<AppState>, Path(app): Path<String>) -> Response {
    let atv = connect_or_fail!(state);
    match atv.launch_app(&app).await {
        Ok(()) => ok(),
        Err(e) => failed(format!("Command failed: {}", e)),
    }
}

async fn remote_control(State(state): State<AppState>, Path(command): Path<String>) -> Response {
    let Ok(command) = command.parse::<RemoteCommand>() else {
        return (StatusCode::NOT_FOUND, "Unknown remote control command").into_response();
    };
    let atv = connect_or_fail!(state);
    match atv.remote_control(command).await {
        Ok(()) => ok(),
        Err(e) => failed(format!("Remote control command failed: {}", e)),
    }
}

async fn power_toggle(State(state): State<AppState>) -> Response {
    let atv = connect_or_fail!(state);
    let result = match atv.power_state().await {
        Ok(PowerState::On) => atv.turn_off().await,
        Ok(_) => atv.turn_on().await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => ok(),
        Err(e) => {
            warn!("Power toggle failed: {}", e);
            state.drop_connection().await;
            failed("Failed to toggle power")
        }
    }
}

#[derive(Deserialize)]
struct KeyboardEnter {
    character: String,
}

async fn keyboard_enter(State(state): State<AppState>, Form(form): Form<KeyboardEnter>) -> Response {
    let atv = connect_or_fail!(state);
    match atv.text_append(&form.character).await {
        Ok(()) => ok(),
        Err(e) => {
            warn!("Keyboard entry failed: {}", e);
            state.drop_connection().await;
            failed("Failed to send text")
        }
    }
}

async fn keyboard_clear(State(state): State<AppState>) -> Response {
    let atv = connect_or_fail!(state);
    match atv.text_clear().await {
        Ok(()) => ok(),
        Err(e) => {
            warn!("Keyboard clear failed: {}", e);
            state.drop_connection().await;
            failed("Failed to clear keyboard")
        }
    }
}

async fn keep_alive(State(state): State<AppState>) -> Response {
    let _atv = connect_or_fail!(state);
    ok()
}
