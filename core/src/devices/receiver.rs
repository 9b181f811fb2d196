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

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::debug;
use serde_json::json;

use crate::action::PressArgs;
use crate::devices::{require_argument, Device, DeviceError, EntityState, HassClient, SourceControl};

const COMMANDS: &[&str] = &["on", "off", "mute", "volume_up", "volume_down", "set_active_source"];

/// Volume change applied per press when no step is supplied.
pub const DEFAULT_VOLUME_STEP: f64 = 0.025;

/// AVR exposed as a Home Assistant media player. Knows which input is active and controls volume.
pub struct Receiver {
    name: String,
    hass: Arc<HassClient>,
    entity_id: String,
    default_source: String,
    prior_level: Mutex<Option<f64>>,
}

impl Receiver {
    pub fn new(name: &str, hass: Arc<HassClient>, entity_id: &str, default_source: &str) -> Self {
        Self {
            name: name.to_string(),
            hass,
            entity_id: entity_id.to_string(),
            default_source: default_source.to_string(),
            prior_level: Mutex::new(None),
        }
    }

    async fn entity(&self) -> Result<EntityState, DeviceError> {
        self.hass.get_state(&self.entity_id).await
    }

    async fn media_player(&self, service: &str, data: serde_json::Value) -> Result<(), DeviceError> {
        self.hass.call_service("media_player", service, data).await
    }

    pub async fn on(&self) -> Result<(), DeviceError> {
        self.media_player("turn_on", json!({ "entity_id": self.entity_id })).await
    }

    pub async fn off(&self) -> Result<(), DeviceError> {
        self.media_player("turn_off", json!({ "entity_id": self.entity_id })).await
    }

    async fn ensure_on(&self) -> Result<(), DeviceError> {
        if self.entity().await?.is_off() {
            self.on().await?;
        }
        Ok(())
    }

    pub async fn volume_level(&self) -> Result<f64, DeviceError> {
        self.ensure_on().await?;
        Ok(self.entity().await?.attribute_f64("volume_level").unwrap_or(0.0))
    }

    async fn volume_set(&self, level: f64) -> Result<(), DeviceError> {
        debug!("Setting {} volume to {:.3}", self.entity_id, level);
        self.media_player("volume_set", json!({ "entity_id": self.entity_id, "volume_level": level }))
            .await
    }

    pub async fn volume_up(&self, step: f64) -> Result<(), DeviceError> {
        let level = self.volume_level().await?;
        self.volume_set((level + step).min(1.0)).await
    }

    pub async fn volume_down(&self, step: f64) -> Result<(), DeviceError> {
        let level = self.volume_level().await?;
        self.volume_set((level - step).max(0.0)).await
    }

    /// Toggles between silence and the level that was active before muting.
    pub async fn mute(&self) -> Result<(), DeviceError> {
        let level = self.volume_level().await?;
        if level > 0.0 {
            *self.prior_level.lock().unwrap_or_else(|e| e.into_inner()) = Some(level);
            self.volume_set(0.0).await
        } else {
            let prior = self.prior_level.lock().unwrap_or_else(|e| e.into_inner()).unwrap_or(0.0);
            self.volume_set(prior).await
        }
    }

    pub async fn set_active_source(&self, source: &str) -> Result<(), DeviceError> {
        self.ensure_on().await?;
        self.media_player("select_source", json!({ "entity_id": self.entity_id, "source": source }))
            .await
    }
}

#[async_trait]
impl SourceControl for Receiver {
    async fn active_source(&self) -> Result<String, DeviceError> {
        let entity = self.entity().await?;
        if entity.is_off() {
            return Ok(self.default_source.clone());
        }
        match entity.attribute_str("source") {
            // the AVR reports "tv" when its own input is selected; fall back to the default
            Some("tv") => {
                self.set_active_source(&self.default_source).await?;
                Ok(self.default_source.clone())
            }
            Some(source) => Ok(source.to_string()),
            None => Err(DeviceError::UnexpectedState {
                entity_id: self.entity_id.clone(),
                reason: "no source attribute".to_string(),
            }),
        }
    }
}

#[async_trait]
impl Device for Receiver {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, command: &str) -> bool {
        COMMANDS.contains(&command)
    }

    async fn execute(&self, command: &str, argument: Option<&str>, args: PressArgs) -> Result<(), DeviceError> {
        let step = args.step.unwrap_or(DEFAULT_VOLUME_STEP);
        match command {
            "on" => self.on().await,
            "off" => self.off().await,
            "mute" => self.mute().await,
            "volume_up" => self.volume_up(step).await,
            "volume_down" => self.volume_down(step).await,
            "set_active_source" => self.set_active_source(require_argument(command, argument)?).await,
            _ => Err(DeviceError::unsupported(&self.name, command)),
        }
    }

    async fn keep_alive(&self) -> Result<(), DeviceError> {
        self.hass.ping().await
    }
}
