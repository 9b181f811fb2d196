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
use serde_json::{json, Value};

use crate::action::PressArgs;
use crate::devices::{require_argument, Device, DeviceError, HassClient};

const COMMANDS: &[&str] = &["turn_on", "turn_off", "turn_up", "turn_down", "set_percentage", "set_direction"];

pub struct Fan {
    name: String,
    hass: Arc<HassClient>,
    entity_id: String,
}

impl Fan {
    pub fn new(name: &str, hass: Arc<HassClient>, entity_id: &str) -> Self {
        Self {
            name: name.to_string(),
            hass,
            entity_id: entity_id.to_string(),
        }
    }

    async fn fan(&self, service: &str, mut data: Value) -> Result<(), DeviceError> {
        data["entity_id"] = json!(self.entity_id);
        self.hass.call_service("fan", service, data).await
    }
}

#[async_trait]
impl Device for Fan {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, command: &str) -> bool {
        COMMANDS.contains(&command)
    }

    async fn execute(&self, command: &str, argument: Option<&str>, _args: PressArgs) -> Result<(), DeviceError> {
        match command {
            "turn_on" => self.fan("turn_on", json!({})).await,
            "turn_off" => self.fan("turn_off", json!({})).await,
            "turn_up" => self.fan("increase_speed", json!({})).await,
            "turn_down" => self.fan("decrease_speed", json!({})).await,
            "set_percentage" => {
                let raw = require_argument(command, argument)?;
                let percentage: u8 = raw
                    .trim()
                    .parse()
                    .ok()
                    .filter(|p| *p <= 100)
                    .ok_or_else(|| DeviceError::InvalidArgument {
                        command: command.to_string(),
                        argument: raw.to_string(),
                    })?;
                self.fan("set_percentage", json!({ "percentage": percentage })).await
            }
            "set_direction" => {
                let direction = require_argument(command, argument)?;
                if direction != "forward" && direction != "reverse" {
                    return Err(DeviceError::InvalidArgument {
                        command: command.to_string(),
                        argument: direction.to_string(),
                    });
                }
                self.fan("set_direction", json!({ "direction": direction })).await
            }
            _ => Err(DeviceError::unsupported(&self.name, command)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::mock_server::MockServer;

    #[tokio::test]
    async fn speed_changes_map_to_fan_services() {
        let server = MockServer::start().await;
        let hass = Arc::new(HassClient::new(&server.base_url(), "token").unwrap());
        let fan = Fan::new("fan", hass, "fan.bedroom");

        fan.execute("turn_up", None, PressArgs::none()).await.unwrap();
        fan.execute("set_percentage", Some("40"), PressArgs::none()).await.unwrap();

        let calls = server.service_calls();
        assert_eq!(calls[0].0, "/api/services/fan/increase_speed");
        assert_eq!(calls[0].1, json!({ "entity_id": "fan.bedroom" }));
        assert_eq!(calls[1].0, "/api/services/fan/set_percentage");
        assert_eq!(calls[1].1["percentage"], 40);
    }

    #[tokio::test]
    async fn rejects_bad_arguments() {
        let server = MockServer::start().await;
        let hass = Arc::new(HassClient::new(&server.base_url(), "token").unwrap());
        let fan = Fan::new("fan", hass, "fan.bedroom");

        assert!(matches!(
            fan.execute("set_percentage", Some("140"), PressArgs::none()).await,
            Err(DeviceError::InvalidArgument { .. })
        ));
        assert!(matches!(
            fan.execute("set_direction", Some("sideways"), PressArgs::none()).await,
            Err(DeviceError::InvalidArgument { .. })
        ));
        assert!(server.requests().is_empty());
    }
}
