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

use std::time::Duration;

use log::debug;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::devices::{check_status, http_client, DeviceError, DEFAULT_REQUEST_TIMEOUT};

/// State of a single Home Assistant entity as returned by `/api/states/<entity_id>`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl EntityState {
    pub fn attribute_f64(&self, name: &str) -> Option<f64> {
        self.attributes.get(name).and_then(Value::as_f64)
    }

    pub fn attribute_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }

    pub fn is_off(&self) -> bool {
        self.state == "off"
    }
}

/// Minimal Home Assistant REST API client.
pub struct HassClient {
    base_url: Url,
    token: String,
    http: Client,
}

impl HassClient {
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self, DeviceError> {
        Self::with_timeout(base_url, token, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Requests that do not complete within `timeout` fail with [`DeviceError::Http`].
    pub fn with_timeout(base_url: &str, token: impl Into<String>, timeout: Duration) -> Result<Self, DeviceError> {
        let mut base_url = Url::parse(base_url).map_err(|e| DeviceError::InvalidUrl(format!("{base_url}: {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            token: token.into(),
            http: http_client(timeout)?,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, DeviceError> {
        self.base_url
            .join(path)
            .map_err(|e| DeviceError::InvalidUrl(format!("{path}: {e}")))
    }

    /// `POST /api/services/<domain>/<service>` with `data` as the JSON body.
    pub async fn call_service(&self, domain: &str, service: &str, data: Value) -> Result<(), DeviceError> {
        debug!("Calling Home Assistant service {}.{} with {}", domain, service, data);
        let url = self.endpoint(&format!("api/services/{domain}/{service}"))?;
        let response = self.http.post(url).bearer_auth(&self.token).json(&data).send().await?;
        check_status(response).await?;
        Ok(())
    }

    pub async fn get_state(&self, entity_id: &str) -> Result<EntityState, DeviceError> {
        let url = self.endpoint(&format!("api/states/{entity_id}"))?;
        let response = self.http.get(url).bearer_auth(&self.token).send().await?;
        let state = check_status(response).await?.json::<EntityState>().await?;
        Ok(state)
    }

    /// Liveness check against the API root.
    pub async fn ping(&self) -> Result<(), DeviceError> {
        let url = self.endpoint("api/")?;
        let response = self.http.get(url).bearer_auth(&self.token).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::mock_server::{start_silent_listener, MockServer};
    use serde_json::json;

    #[tokio::test]
    async fn call_service_posts_json_with_bearer_token() {
        let server = MockServer::start().await;
        let client = HassClient::new(&server.base_url(), "secret").unwrap();

        client
            .call_service("media_player", "volume_set", json!({ "entity_id": "media_player.avr", "volume_level": 0.5 }))
            .await
            .unwrap();

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].path, "/api/services/media_player/volume_set");
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer secret"));
        assert_eq!(requests[0].json()["volume_level"], json!(0.5));
    }

    #[tokio::test]
    async fn get_state_parses_attributes() {
        let server = MockServer::start().await;
        server.set_state("media_player.avr", "on", json!({ "volume_level": 0.3, "source": "Apple TV" }));
        let client = HassClient::new(&server.base_url(), "secret").unwrap();

        let state = client.get_state("media_player.avr").await.unwrap();
        assert_eq!(state.state, "on");
        assert_eq!(state.attribute_f64("volume_level"), Some(0.3));
        assert_eq!(state.attribute_str("source"), Some("Apple TV"));
        assert!(!state.is_off());
    }

    #[tokio::test]
    async fn error_status_is_reported_as_service_error() {
        let server = MockServer::start().await;
        let client = HassClient::new(&server.base_url(), "secret").unwrap();

        match client.get_state("media_player.missing").await {
            Err(DeviceError::Service { status, .. }) => assert_eq!(status, 404),
            other => panic!("unexpected result {:?}", other.map(|s| s.state)),
        }
    }

    #[tokio::test]
    async fn ping_hits_api_root_under_base_path() {
        let server = MockServer::start().await;
        let client = HassClient::new(&format!("{}/ha", server.base_url()), "secret").unwrap();

        client.ping().await.unwrap();
        assert_eq!(server.requests()[0].path, "/ha/api/");
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(matches!(HassClient::new("not a url", "t"), Err(DeviceError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn unresponsive_server_times_out() {
        let address = start_silent_listener().await;
        let client = HassClient::with_timeout(&format!("http://{address}"), "secret", Duration::from_millis(200)).unwrap();

        let call = client.call_service("media_player", "volume_set", json!({}));
        let result = tokio::time::timeout(Duration::from_secs(5), call)
            .await
            .expect("request was not bounded by the client timeout");
        assert!(matches!(result, Err(DeviceError::Http(_))));
    }
}
