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

//! Devices a button press can be routed to, and the Home Assistant plumbing they share.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::action::PressArgs;
use crate::config::{ConfigError, DeviceConfig};

pub mod apple_tv;
pub mod atv_client;
pub mod fan;
pub mod hass;
pub mod lighting;
pub mod receiver;
pub mod script;
pub mod zidoo;

#[cfg(test)]
pub(crate) mod mock_server;

pub use apple_tv::{AppleTv, RemoteCommand};
pub use atv_client::AtvServiceClient;
pub use fan::Fan;
pub use hass::{EntityState, HassClient};
pub use lighting::Lighting;
pub use receiver::Receiver;
pub use script::ScriptDevice;
pub use zidoo::Zidoo;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service responded with status {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Invalid URL {0}")]
    InvalidUrl(String),

    #[error("Command {command} is not supported by {device}")]
    UnsupportedCommand { device: String, command: String },

    #[error("Command {0} requires an argument")]
    MissingArgument(String),

    #[error("Invalid argument {argument:?} for command {command}")]
    InvalidArgument { command: String, argument: String },

    #[error("Unexpected state of {entity_id}: {reason}")]
    UnexpectedState { entity_id: String, reason: String },
}

impl DeviceError {
    pub(crate) fn unsupported(device: &str, command: &str) -> Self {
        DeviceError::UnsupportedCommand {
            device: device.to_string(),
            command: command.to_string(),
        }
    }
}

/// Upper bound for connecting to and hearing back from Home Assistant or the ATV service.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Client bounded by `timeout` both while connecting and for the whole request.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, DeviceError> {
    Ok(reqwest::Client::builder().connect_timeout(timeout).timeout(timeout).build()?)
}

/// Turns a non-success HTTP response into [`DeviceError::Service`].
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, DeviceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(DeviceError::Service { status: status.as_u16(), body })
}

pub(crate) fn require_argument<'a>(command: &str, argument: Option<&'a str>) -> Result<&'a str, DeviceError> {
    argument.ok_or_else(|| DeviceError::MissingArgument(command.to_string()))
}

#[async_trait]
pub trait Device: Send + Sync {
    fn name(&self) -> &str;

    /// Whether `command` is understood. Checked once when button bindings are built.
    fn supports(&self, command: &str) -> bool;

    async fn execute(&self, command: &str, argument: Option<&str>, args: PressArgs) -> Result<(), DeviceError>;

    async fn keep_alive(&self) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// Reports which input is currently selected, usually on the AVR.
#[async_trait]
pub trait SourceControl: Send + Sync {
    async fn active_source(&self) -> Result<String, DeviceError>;
}

/// Named devices built from configuration.
#[derive(Default, Clone)]
pub struct DeviceSet {
    devices: HashMap<String, Arc<dyn Device>>,
    source_controls: HashMap<String, Arc<dyn SourceControl>>,
}

impl DeviceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, device: Arc<dyn Device>) {
        self.devices.insert(device.name().to_string(), device);
    }

    pub fn insert_source_control(&mut self, name: impl Into<String>, control: Arc<dyn SourceControl>) {
        self.source_controls.insert(name.into(), control);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Device>> {
        self.devices.get(name).cloned()
    }

    pub fn source_control(&self, name: &str) -> Option<Arc<dyn SourceControl>> {
        self.source_controls.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.devices.contains_key(name)
    }

    pub fn devices(&self) -> impl Iterator<Item = &Arc<dyn Device>> {
        self.devices.values()
    }

    pub fn from_config(
        configs: &HashMap<String, DeviceConfig>,
        hass: Arc<HassClient>,
        atv_service: Option<Arc<AtvServiceClient>>,
    ) -> Result<Self, ConfigError> {
        let mut set = DeviceSet::new();
        for (name, config) in configs {
            match config {
                DeviceConfig::Receiver { entity_id, default_source } => {
                    let receiver = Arc::new(Receiver::new(name, hass.clone(), entity_id, default_source));
                    set.insert_source_control(name.clone(), receiver.clone());
                    set.insert(receiver);
                }
                DeviceConfig::AppleTv { entity_id } => {
                    let service = atv_service.clone().ok_or(ConfigError::MissingAtvService)?;
                    set.insert(Arc::new(AppleTv::new(name, hass.clone(), entity_id, service)));
                }
                DeviceConfig::Zidoo { entity_id } => {
                    set.insert(Arc::new(Zidoo::new(name, hass.clone(), entity_id)));
                }
                DeviceConfig::Fan { entity_id } => {
                    set.insert(Arc::new(Fan::new(name, hass.clone(), entity_id)));
                }
                DeviceConfig::Lighting => {
                    set.insert(Arc::new(Lighting::new(name, hass.clone())));
                }
                DeviceConfig::Script { scripts } => {
                    set.insert(Arc::new(ScriptDevice::new(name, hass.clone(), scripts.clone())));
                }
            }
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configs() -> HashMap<String, DeviceConfig> {
        serde_json::from_value(serde_json::json!({
            "avr": { "type": "receiver", "entity_id": "media_player.avr" },
            "zidoo": { "type": "zidoo", "entity_id": "media_player.zidoo" },
            "lights": { "type": "lighting" }
        }))
        .unwrap()
    }

    #[test]
    fn builds_devices_and_source_controls() {
        let hass = Arc::new(HassClient::new("http://localhost:8123", "token").unwrap());
        let set = DeviceSet::from_config(&configs(), hass, None).unwrap();

        assert!(set.contains("avr"));
        assert!(set.contains("zidoo"));
        assert!(set.contains("lights"));
        assert!(set.source_control("avr").is_some());
        assert!(set.source_control("zidoo").is_none());
        assert_eq!(set.devices().count(), 3);
    }

    #[test]
    fn apple_tv_requires_service_endpoint() {
        let hass = Arc::new(HassClient::new("http://localhost:8123", "token").unwrap());
        let configs: HashMap<String, DeviceConfig> = serde_json::from_value(serde_json::json!({
            "atv": { "type": "apple_tv", "entity_id": "living_room" }
        }))
        .unwrap();

        assert!(matches!(
            DeviceSet::from_config(&configs, hass, None),
            Err(ConfigError::MissingAtvService)
        ));
    }
}
