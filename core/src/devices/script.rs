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

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::action::PressArgs;
use crate::devices::{Device, DeviceError, HassClient};

/// Device controlled entirely through Home Assistant scripts, one script per command.
pub struct ScriptDevice {
    name: String,
    hass: Arc<HassClient>,
    scripts: HashMap<String, String>,
}

impl ScriptDevice {
    pub fn new(name: &str, hass: Arc<HassClient>, scripts: HashMap<String, String>) -> Self {
        Self {
            name: name.to_string(),
            hass,
            scripts,
        }
    }
}

#[async_trait]
impl Device for ScriptDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, command: &str) -> bool {
        self.scripts.contains_key(command)
    }

    async fn execute(&self, command: &str, _argument: Option<&str>, _args: PressArgs) -> Result<(), DeviceError> {
        let script = self
            .scripts
            .get(command)
            .ok_or_else(|| DeviceError::unsupported(&self.name, command))?;
        let entity_id = if script.starts_with("script.") {
            script.clone()
        } else {
            format!("script.{script}")
        };
        self.hass
            .call_service("script", "turn_on", json!({ "entity_id": entity_id }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::mock_server::MockServer;

    #[tokio::test]
    async fn triggers_configured_script() {
        let server = MockServer::start().await;
        let hass = Arc::new(HassClient::new(&server.base_url(), "token").unwrap());
        let scripts = HashMap::from([("on".to_string(), "projector_on".to_string())]);
        let device = ScriptDevice::new("projector", hass, scripts);

        device.execute("on", None, PressArgs::none()).await.unwrap();

        let calls = server.service_calls();
        assert_eq!(calls[0].0, "/api/services/script/turn_on");
        assert_eq!(calls[0].1["entity_id"], "script.projector_on");
        assert!(matches!(
            device.execute("off", None, PressArgs::none()).await,
            Err(DeviceError::UnsupportedCommand { .. })
        ));
    }
}
