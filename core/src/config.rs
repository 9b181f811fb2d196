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

//! JSON configuration of the remote daemon.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;
use serde::Deserialize;
use thiserror::Error;

use crate::devices::DEFAULT_REQUEST_TIMEOUT;
use crate::keymap::{KeyMap, KeyMapEntry};
use crate::remote::BindingConfig;
use crate::scheduler::DEFAULT_IDLE_TIMEOUT;
use crate::usb::DongleId;

pub const CONFIG_PATH_ENV: &str = "PNUT_CONFIG";
pub const HASS_TOKEN_ENV: &str = "PNUT_HASS_TOKEN";
pub const DEFAULT_CONFIG_PATH: &str = "pnut.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid report {report:?}: {reason}")]
    InvalidReport { report: String, reason: String },

    #[error("Report {0:?} is mapped more than once")]
    DuplicateReport(String),

    #[error("Unknown device {0}")]
    UnknownDevice(String),

    #[error("Device {device} does not support command {command}")]
    UnsupportedCommand { device: String, command: String },

    #[error("Invalid binding {0:?}, expected \"device.command\"")]
    InvalidBinding(String),

    #[error("No Home Assistant token configured (set {HASS_TOKEN_ENV})")]
    MissingToken,

    #[error("An apple_tv device is configured but atv_service is missing")]
    MissingAtvService,

    #[error("Invalid URL {0}")]
    InvalidUrl(String),

    #[error("Device {0} cannot report the active source")]
    NotASourceControl(String),

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}

#[derive(Debug, Clone, Deserialize)]
pub struct HomeAssistantConfig {
    pub url: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl HomeAssistantConfig {
    /// The token from the environment takes precedence over the file.
    pub fn resolve_token(&self) -> Result<String, ConfigError> {
        resolve_token(std::env::var(HASS_TOKEN_ENV).ok(), self.token.as_deref())
    }
}

fn resolve_token(from_env: Option<String>, from_file: Option<&str>) -> Result<String, ConfigError> {
    from_env
        .filter(|t| !t.is_empty())
        .or_else(|| from_file.map(str::to_string))
        .filter(|t| !t.is_empty())
        .ok_or(ConfigError::MissingToken)
}

#[derive(Debug, Clone, Deserialize)]
pub struct AtvServiceEndpoint {
    pub host: String,
    pub port: u16,
}

fn default_source() -> String {
    "Apple TV".to_string()
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceConfig {
    Receiver {
        entity_id: String,
        #[serde(default = "default_source")]
        default_source: String,
    },
    AppleTv {
        entity_id: String,
    },
    Zidoo {
        entity_id: String,
    },
    Fan {
        entity_id: String,
    },
    Lighting,
    Script {
        scripts: HashMap<String, String>,
    },
}

fn default_idle_timeout_secs() -> u64 {
    DEFAULT_IDLE_TIMEOUT.as_secs()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

fn positive_secs(field: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    match secs {
        0 => Err(ConfigError::ZeroTimeout(field)),
        secs => Ok(Duration::from_secs(secs)),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub dongle: DongleId,
    pub home_assistant: HomeAssistantConfig,
    #[serde(default)]
    pub atv_service: Option<AtvServiceEndpoint>,
    #[serde(default)]
    pub devices: HashMap<String, DeviceConfig>,
    /// Active source as reported by the source control, mapped to a device name.
    #[serde(default)]
    pub sources: HashMap<String, String>,
    pub source_control: String,
    pub source_default: String,
    /// Symbolic command, then device name, then what to call.
    #[serde(default)]
    pub button_map: HashMap<String, HashMap<String, BindingConfig>>,
    #[serde(default)]
    pub keymap: Vec<KeyMapEntry>,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Applies to every Home Assistant and ATV service request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl RemoteConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: RemoteConfig = serde_json::from_str(&raw)?;
        config.idle_timeout()?;
        config.request_timeout()?;
        info!(
            "Loaded configuration from {} ({} devices, {} keys)",
            path.display(),
            config.devices.len(),
            config.keymap.len()
        );
        Ok(config)
    }

    /// Path from the environment, or the default.
    pub fn default_path() -> PathBuf {
        std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn idle_timeout(&self) -> Result<Duration, ConfigError> {
        positive_secs("idle_timeout_secs", self.idle_timeout_secs)
    }

    pub fn request_timeout(&self) -> Result<Duration, ConfigError> {
        positive_secs("request_timeout_secs", self.request_timeout_secs)
    }

    pub fn key_map(&self) -> Result<KeyMap, ConfigError> {
        KeyMap::from_entries(&self.keymap)
    }

    pub fn hass_token(&self) -> Result<String, ConfigError> {
        self.home_assistant.resolve_token()
    }
}
