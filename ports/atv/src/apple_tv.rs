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
use pnut_core::devices::{DeviceError, RemoteCommand};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AtvError {
    #[error("Feature not supported")]
    FeatureNotSupported,

    #[error("Device could not be found: {0}")]
    NotFound(String),

    #[error("Backend error: {0}")]
    Backend(#[from] DeviceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
    Unknown,
}

/// Operations the web service forwards to an Apple TV connection.
#[async_trait]
pub trait AppleTvInterface: Send + Sync {
    async fn launch_app(&self, _bundle_id: &str) -> Result<(), AtvError> {
        Err(AtvError::FeatureNotSupported)
    }

    async fn remote_control(&self, _command: RemoteCommand) -> Result<(), AtvError> {
        Err(AtvError::FeatureNotSupported)
    }

    async fn power_state(&self) -> Result<PowerState, AtvError> {
        Err(AtvError::FeatureNotSupported)
    }

    async fn turn_on(&self) -> Result<(), AtvError> {
        Err(AtvError::FeatureNotSupported)
    }

    async fn turn_off(&self) -> Result<(), AtvError> {
        Err(AtvError::FeatureNotSupported)
    }

    async fn text_append(&self, _text: &str) -> Result<(), AtvError> {
        Err(AtvError::FeatureNotSupported)
    }

    async fn text_clear(&self) -> Result<(), AtvError> {
        Err(AtvError::FeatureNotSupported)
    }

    async fn close(&self) {}
}

/// Creates connections on demand; the service keeps one and reconnects after failures.
#[async_trait]
pub trait AppleTvConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn AppleTvInterface>, AtvError>;
}
