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

//! Routes symbolic button presses to devices based on which source is active.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use log::{debug, info, warn};
use serde::Deserialize;
use tokio::runtime::Handle;

use crate::action::PressArgs;
use crate::config::{ConfigError, RemoteConfig};
use crate::devices::{Device, DeviceError, DeviceSet, SourceControl};

/// What the dispatch pipeline drives. Called from the scheduler thread, so it is synchronous.
pub trait RemoteTarget: Send + Sync {
    fn press_button(&self, command: &str, args: PressArgs) -> anyhow::Result<()>;

    fn keep_alive(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A single device call as written in configuration: either `"device.command"` or an object.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CallConfig {
    Shorthand(String),
    Full {
        device: String,
        command: String,
        #[serde(default)]
        argument: Option<String>,
    },
}

/// One call or a chain of calls executed in order.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum BindingConfig {
    Single(CallConfig),
    Chain(Vec<CallConfig>),
}

impl BindingConfig {
    fn calls(&self) -> Vec<&CallConfig> {
        match self {
            BindingConfig::Single(call) => vec![call],
            BindingConfig::Chain(calls) => calls.iter().collect(),
        }
    }
}

#[derive(Clone)]
pub struct BoundCall {
    device: Arc<dyn Device>,
    command: String,
    argument: Option<String>,
}

impl BoundCall {
    fn resolve(call: &CallConfig, devices: &DeviceSet) -> Result<Self, ConfigError> {
        let (device_name, command, argument) = match call {
            CallConfig::Shorthand(raw) => {
                let (device, command) = raw
                    .split_once('.')
                    .ok_or_else(|| ConfigError::InvalidBinding(raw.clone()))?;
                (device, command, None)
            }
            CallConfig::Full { device, command, argument } => (device.as_str(), command.as_str(), argument.clone()),
        };
        let device = devices
            .get(device_name)
            .ok_or_else(|| ConfigError::UnknownDevice(device_name.to_string()))?;
        if !device.supports(command) {
            return Err(ConfigError::UnsupportedCommand {
                device: device_name.to_string(),
                command: command.to_string(),
            });
        }
        Ok(Self {
            device,
            command: command.to_string(),
            argument,
        })
    }

    async fn invoke(&self, args: PressArgs) -> Result<(), DeviceError> {
        self.device.execute(&self.command, self.argument.as_deref(), args).await
    }
}

impl std::fmt::Debug for BoundCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.device.name(), self.command)?;
        if let Some(argument) = &self.argument {
            write!(f, "({argument})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Binding {
    calls: Vec<BoundCall>,
}

impl Binding {
    pub fn resolve(config: &BindingConfig, devices: &DeviceSet) -> Result<Self, ConfigError> {
        let calls = config
            .calls()
            .into_iter()
            .map(|call| BoundCall::resolve(call, devices))
            .collect::<Result<Vec<_>, _>>()?;
        if calls.is_empty() {
            return Err(ConfigError::InvalidBinding("empty chain".to_string()));
        }
        Ok(Self { calls })
    }

    async fn invoke(&self, args: PressArgs) -> Result<(), DeviceError> {
        for call in &self.calls {
            call.invoke(args).await?;
        }
        Ok(())
    }
}

pub struct UniversalRemote {
    sources: HashMap<String, String>,
    source_control: Arc<dyn SourceControl>,
    source_default: String,
    button_map: HashMap<String, HashMap<String, Binding>>,
    devices: DeviceSet,
}

impl UniversalRemote {
    pub fn new(
        sources: HashMap<String, String>,
        source_control: Arc<dyn SourceControl>,
        source_default: impl Into<String>,
        button_map: HashMap<String, HashMap<String, Binding>>,
        devices: DeviceSet,
    ) -> Self {
        Self {
            sources,
            source_control,
            source_default: source_default.into(),
            button_map,
            devices,
        }
    }

    /// Resolves every binding against `devices`. Fails on unknown devices or unsupported commands.
    pub fn from_config(config: &RemoteConfig, devices: DeviceSet) -> Result<Self, ConfigError> {
        let source_control = devices
            .source_control(&config.source_control)
            .ok_or_else(|| ConfigError::NotASourceControl(config.source_control.clone()))?;

        for device in config.sources.values().chain(std::iter::once(&config.source_default)) {
            if !devices.contains(device) {
                return Err(ConfigError::UnknownDevice(device.clone()));
            }
        }

        let mut button_map = HashMap::new();
        for (command, per_device) in &config.button_map {
            let mut bindings = HashMap::new();
            for (device, binding) in per_device {
                if !devices.contains(device) {
                    return Err(ConfigError::UnknownDevice(device.clone()));
                }
                bindings.insert(device.clone(), Binding::resolve(binding, &devices)?);
            }
            button_map.insert(command.clone(), bindings);
        }

        Ok(Self::new(
            config.sources.clone(),
            source_control,
            config.source_default.clone(),
            button_map,
            devices,
        ))
    }

    /// Name of the device that should receive presses right now.
    pub async fn source(&self) -> Result<String, DeviceError> {
        let active = self.source_control.active_source().await?;
        Ok(self
            .sources
            .get(&active)
            .cloned()
            .unwrap_or_else(|| self.source_default.clone()))
    }

    pub async fn press_button(&self, command: &str, args: PressArgs) -> Result<(), DeviceError> {
        let source = self.source().await?;
        let binding = self.button_map.get(command).and_then(|bindings| bindings.get(&source));
        info!("Press [{}] on {}: {:?}", command, source, binding);
        match binding {
            Some(binding) => binding.invoke(args).await,
            None => Ok(()),
        }
    }

    /// Pings every device once. The first failure is returned after all have been tried.
    pub async fn keep_alive(&self) -> Result<(), DeviceError> {
        let mut first_error = None;
        for device in self.devices.devices() {
            debug!("Keep alive for {}", device.name());
            if let Err(e) = device.keep_alive().await {
                warn!("Keep alive for {} failed: {}", device.name(), e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Bridges the synchronous pipeline to the async device layer.
///
/// Must be called from threads outside the runtime, such as the scheduler thread.
pub struct BlockingRemote {
    remote: Arc<UniversalRemote>,
    runtime: Handle,
}

impl BlockingRemote {
    pub fn new(remote: Arc<UniversalRemote>, runtime: Handle) -> Self {
        Self { remote, runtime }
    }
}

impl RemoteTarget for BlockingRemote {
    fn press_button(&self, command: &str, args: PressArgs) -> anyhow::Result<()> {
        self.runtime
            .block_on(self.remote.press_button(command, args))
            .with_context(|| format!("Press of {} failed", command))
    }

    fn keep_alive(&self) -> anyhow::Result<()> {
        self.runtime.block_on(self.remote.keep_alive()).context("Keep alive failed")
    }
}
