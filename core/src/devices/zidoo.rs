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

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::action::PressArgs;
use crate::devices::{require_argument, Device, DeviceError, HassClient};

// Requires the zidoo-player custom integration in Home Assistant.
const KEYS: &[(&str, &str)] = &[
    ("back", "Key.Back"),
    ("cancel", "Key.Cancel"),
    ("home", "Key.Home"),
    ("up", "Key.Up"),
    ("down", "Key.Down"),
    ("left", "Key.Left"),
    ("right", "Key.Right"),
    ("ok", "Key.Ok"),
    ("select", "Key.Select"),
    ("menu", "Key.Menu"),
    ("pop_menu", "Key.PopMenu"),
    ("play", "Key.MediaPlay"),
    ("stop", "Key.MediaStop"),
    ("pause", "Key.MediaPause"),
    ("next", "Key.MediaNext"),
    ("prev", "Key.MediaPrev"),
    ("on", "Key.PowerOn"),
    ("off", "Key.PowerOff"),
    ("backward", "Key.MediaBackward"),
    ("forward", "Key.MediaForward"),
    ("info", "Key.Info"),
    ("page_up", "Key.PageUP"),
    ("page_down", "Key.PageDown"),
];

fn key_for(command: &str) -> Option<&'static str> {
    KEYS.iter().find(|(name, _)| *name == command).map(|(_, key)| *key)
}

/// Zidoo Android media player.
pub struct Zidoo {
    name: String,
    hass: Arc<HassClient>,
    entity_id: String,
}

impl Zidoo {
    pub fn new(name: &str, hass: Arc<HassClient>, entity_id: &str) -> Self {
        Self {
            name: name.to_string(),
            hass,
            entity_id: entity_id.to_string(),
        }
    }

    async fn send_key(&self, key: &str) -> Result<(), DeviceError> {
        self.hass
            .call_service("zidoo", "send_key", json!({ "entity_id": self.entity_id, "key": key }))
            .await
    }

    pub async fn launch_app(&self, app_name: &str) -> Result<(), DeviceError> {
        self.hass
            .call_service(
                "media_player",
                "select_source",
                json!({ "entity_id": self.entity_id, "source": app_name }),
            )
            .await
    }

    pub async fn is_playing(&self) -> Result<bool, DeviceError> {
        Ok(self.hass.get_state(&self.entity_id).await?.state == "playing")
    }
}

#[async_trait]
impl Device for Zidoo {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, command: &str) -> bool {
        command == "launch_app" || key_for(command).is_some()
    }

    async fn execute(&self, command: &str, argument: Option<&str>, _args: PressArgs) -> Result<(), DeviceError> {
        if command == "launch_app" {
            return self.launch_app(require_argument(command, argument)?).await;
        }
        match key_for(command) {
            Some(key) => self.send_key(key).await,
            None => Err(DeviceError::unsupported(&self.name, command)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::mock_server::MockServer;

    #[tokio::test]
    async fn sends_mapped_key() {
        let server = MockServer::start().await;
        let hass = Arc::new(HassClient::new(&server.base_url(), "token").unwrap());
        let zidoo = Zidoo::new("zidoo", hass, "media_player.zidoo");

        zidoo.execute("pop_menu", None, PressArgs::none()).await.unwrap();
        zidoo.execute("launch_app", Some("Plex"), PressArgs::none()).await.unwrap();

        let calls = server.service_calls();
        assert_eq!(calls[0].0, "/api/services/zidoo/send_key");
        assert_eq!(calls[0].1["key"], "Key.PopMenu");
        assert_eq!(calls[1].0, "/api/services/media_player/select_source");
        assert_eq!(calls[1].1["source"], "Plex");
    }

    #[tokio::test]
    async fn launch_app_needs_an_argument() {
        let server = MockServer::start().await;
        let hass = Arc::new(HassClient::new(&server.base_url(), "token").unwrap());
        let zidoo = Zidoo::new("zidoo", hass, "media_player.zidoo");

        assert!(matches!(
            zidoo.execute("launch_app", None, PressArgs::none()).await,
            Err(DeviceError::MissingArgument(_))
        ));
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn reports_playing_state() {
        let server = MockServer::start().await;
        server.set_state("media_player.zidoo", "playing", json!({}));
        let hass = Arc::new(HassClient::new(&server.base_url(), "token").unwrap());
        let zidoo = Zidoo::new("zidoo", hass, "media_player.zidoo");

        assert!(zidoo.is_playing().await.unwrap());
    }

    #[test]
    fn page_up_keeps_its_odd_casing() {
        assert_eq!(key_for("page_up"), Some("Key.PageUP"));
        assert_eq!(key_for("eject"), None);
    }
}
