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

//! Apple TV backend driving the Home Assistant `apple_tv` integration.

use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use pnut_core::devices::{HassClient, RemoteCommand};
use serde_json::json;

use crate::apple_tv::{AppleTvConnector, AppleTvInterface, AtvError, PowerState};

pub struct HassAppleTv {
    hass: Arc<HassClient>,
    /// Object id shared by the `media_player` and `remote` entities, e.g. `living_room`.
    entity: String,
}

impl HassAppleTv {
    pub fn new(hass: Arc<HassClient>, entity: &str) -> Self {
        Self {
            hass,
            entity: entity.to_string(),
        }
    }

    fn media_player(&self) -> String {
        format!("media_player.{}", self.entity)
    }

    fn remote(&self) -> String {
        format!("remote.{}", self.entity)
    }
}

#[async_trait]
impl AppleTvInterface for HassAppleTv {
    async fn launch_app(&self, bundle_id: &str) -> Result<(), AtvError> {
        self.hass
            .call_service(
                "media_player",
                "play_media",
                json!({
                    "entity_id": self.media_player(),
                    "media_content_type": "app",
                    "media_content_id": bundle_id,
                }),
            )
            .await?;
        Ok(())
    }

    async fn remote_control(&self, command: RemoteCommand) -> Result<(), AtvError> {
        self.hass
            .call_service(
                "remote",
                "send_command",
                json!({ "entity_id": self.remote(), "command": command.as_str() }),
            )
            .await?;
        Ok(())
    }

    async fn power_state(&self) -> Result<PowerState, AtvError> {
        let state = self.hass.get_state(&self.media_player()).await?;
        Ok(match state.state.as_str() {
            "off" | "standby" => PowerState::Off,
            "unavailable" | "unknown" => PowerState::Unknown,
            _ => PowerState::On,
        })
    }

    async fn turn_on(&self) -> Result<(), AtvError> {
        self.hass
            .call_service("media_player", "turn_on", json!({ "entity_id": self.media_player() }))
            .await?;
        Ok(())
    }

    async fn turn_off(&self) -> Result<(), AtvError> {
        self.hass
            .call_service("media_player", "turn_off", json!({ "entity_id": self.media_player() }))
            .await?;
        Ok(())
    }
}

pub struct HassConnector {
    hass: Arc<HassClient>,
    entity: String,
}

impl HassConnector {
    pub fn new(hass: Arc<HassClient>, entity: &str) -> Self {
        Self {
            hass,
            entity: entity.to_string(),
        }
    }
}

#[async_trait]
impl AppleTvConnector for HassConnector {
    async fn connect(&self) -> Result<Arc<dyn AppleTvInterface>, AtvError> {
        let media_player = format!("media_player.{}", self.entity);
        self.hass
            .get_state(&media_player)
            .await
            .map_err(|e| AtvError::NotFound(format!("{}: {}", media_player, e)))?;
        info!("Connected to {} through Home Assistant", media_player);
        Ok(Arc::new(HassAppleTv::new(self.hass.clone(), &self.entity)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::Uri;
    use axum::Router;
    use serde_json::Value;
    use std::sync::Mutex;

    type Calls = Arc<Mutex<Vec<(String, Value)>>>;

    async fn record(State(calls): State<Calls>, uri: Uri, body: Bytes) -> &'static str {
        let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
        calls.lock().unwrap().push((uri.path().to_string(), body));
        "OK"
    }

    /// Home Assistant stand-in answering every service call with 200.
    async fn recording_hass() -> (Arc<HassClient>, Calls) {
        let calls = Calls::default();
        let app = Router::new().fallback(record).with_state(calls.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let hass = Arc::new(HassClient::new(&format!("http://{address}"), "token").unwrap());
        (hass, calls)
    }

    #[tokio::test]
    async fn launch_app_plays_the_app_as_media() {
        let (hass, calls) = recording_hass().await;
        let atv = HassAppleTv::new(hass, "living_room");

        atv.launch_app("com.netflix.Netflix").await.unwrap();

        assert_eq!(
            *calls.lock().unwrap(),
            vec![(
                "/api/services/media_player/play_media".to_string(),
                json!({
                    "entity_id": "media_player.living_room",
                    "media_content_type": "app",
                    "media_content_id": "com.netflix.Netflix",
                })
            )]
        );
    }

    #[tokio::test]
    async fn keyboard_is_not_supported() {
        let hass = Arc::new(HassClient::new("http://localhost:8123", "token").unwrap());
        let atv = HassAppleTv::new(hass, "living_room");

        assert!(matches!(atv.text_append("a").await, Err(AtvError::FeatureNotSupported)));
        assert!(matches!(atv.text_clear().await, Err(AtvError::FeatureNotSupported)));
    }

    #[test]
    fn entity_ids_share_the_object_id() {
        let hass = Arc::new(HassClient::new("http://localhost:8123", "token").unwrap());
        let atv = HassAppleTv::new(hass, "living_room");

        assert_eq!(atv.media_player(), "media_player.living_room");
        assert_eq!(atv.remote(), "remote.living_room");
    }
}
