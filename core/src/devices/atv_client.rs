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

use reqwest::{Client, Url};

use crate::devices::{check_status, http_client, DeviceError, RemoteCommand, DEFAULT_REQUEST_TIMEOUT};

/// HTTP client for the Apple TV control service (`pnut_atv_service`).
pub struct AtvServiceClient {
    base_url: Url,
    http: Client,
}

impl AtvServiceClient {
    pub fn new(host: &str, port: u16) -> Result<Self, DeviceError> {
        Self::with_timeout(host, port, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(host: &str, port: u16, timeout: Duration) -> Result<Self, DeviceError> {
        let raw = format!("http://{host}:{port}/");
        let base_url = Url::parse(&raw).map_err(|e| DeviceError::InvalidUrl(format!("{raw}: {e}")))?;
        Ok(Self { base_url, http: http_client(timeout)? })
    }

    fn endpoint(&self, path: &str) -> Result<Url, DeviceError> {
        self.base_url
            .join(path)
            .map_err(|e| DeviceError::InvalidUrl(format!("{path}: {e}")))
    }

    async fn get(&self, path: &str) -> Result<(), DeviceError> {
        let response = self.http.get(self.endpoint(path)?).send().await?;
        check_status(response).await?;
        Ok(())
    }

    pub async fn launch_app(&self, identifier: &str) -> Result<(), DeviceError> {
        self.get(&format!("launch_app/{identifier}")).await
    }

    pub async fn press_button(&self, command: RemoteCommand) -> Result<(), DeviceError> {
        self.get(&format!("remote_control/{command}")).await
    }

    pub async fn power_toggle(&self) -> Result<(), DeviceError> {
        self.get("power_toggle").await
    }

    pub async fn keyboard_enter(&self, character: &str) -> Result<(), DeviceError> {
        let response = self
            .http
            .post(self.endpoint("keyboard_enter")?)
            .form(&[("character", character)])
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    pub async fn keyboard_clear(&self) -> Result<(), DeviceError> {
        self.get("keyboard_clear").await
    }

    pub async fn keep_alive(&self) -> Result<(), DeviceError> {
        self.get("keep_alive").await
    }
}
