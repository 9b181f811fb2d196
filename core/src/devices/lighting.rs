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

//! Any Home Assistant light, addressed by command `<light>.<op>` so one configured device covers
//! the whole house.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::action::PressArgs;
use crate::devices::{Device, DeviceError, HassClient};

const OPERATIONS: &[&str] = &["turn_on", "turn_off", "turn_up", "turn_down", "toggle"];
const TRANSITION_SECS: u32 = 3;
const BRIGHTNESS_STEP: i64 = 10;

pub struct Lighting {
    name: String,
    hass: Arc<HassClient>,
}

impl Lighting {
    pub fn new(name: &str, hass: Arc<HassClient>) -> Self {
        Self {
            name: name.to_string(),
            hass,
        }
    }

    fn split(command: &str) -> Option<(&str, &str)> {
        let (light, operation) = command.rsplit_once('.')?;
        if light.is_empty() || !OPERATIONS.contains(&operation) {
            return None;
        }
        Some((light, operation))
    }

    /// Current brightness as a percentage.
    pub async fn brightness(&self, entity_id: &str) -> Result<i64, DeviceError> {
        let raw = self.hass.get_state(entity_id).await?.attribute_f64("brightness").unwrap_or(0.0);
        Ok((raw / 255.0 * 100.0).round() as i64)
    }

    async fn light(&self, service: &str, data: serde_json::Value) -> Result<(), DeviceError> {
        self.hass.call_service("light", service, data).await
    }
}

#[async_trait]
impl Device for Lighting {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, command: &str) -> bool {
        Self::split(command).is_some()
    }

    async fn execute(&self, command: &str, argument: Option<&str>, _args: PressArgs) -> Result<(), DeviceError> {
        let (light, operation) = Self::split(command).ok_or_else(|| DeviceError::unsupported(&self.name, command))?;
        let entity_id = format!("light.{light}");
        match operation {
            "turn_on" => {
                let brightness = match argument {
                    Some(raw) => raw
                        .trim()
                        .parse::<u8>()
                        .ok()
                        .filter(|b| *b <= 100)
                        .ok_or_else(|| DeviceError::InvalidArgument {
                            command: command.to_string(),
                            argument: raw.to_string(),
                        })?,
                    None => 100,
                };
                self.light(
                    "turn_on",
                    json!({ "entity_id": entity_id, "brightness_pct": brightness, "transition": TRANSITION_SECS }),
                )
                .await
            }
            "turn_off" => {
                self.light("turn_off", json!({ "entity_id": entity_id, "transition": TRANSITION_SECS }))
                    .await
            }
            "turn_up" => {
                let level = (self.brightness(&entity_id).await? + BRIGHTNESS_STEP).min(100);
                self.light("turn_on", json!({ "entity_id": entity_id, "brightness_pct": level }))
                    .await
            }
            "turn_down" => {
                let level = (self.brightness(&entity_id).await? - BRIGHTNESS_STEP).max(0);
                self.light("turn_on", json!({ "entity_id": entity_id, "brightness_pct": level }))
                    .await
            }
            "toggle" => self.light("toggle", json!({ "entity_id": entity_id })).await,
            _ => Err(DeviceError::unsupported(&self.name, command)),
        }
    }
}
