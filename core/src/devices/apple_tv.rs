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

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::action::PressArgs;
use crate::devices::{require_argument, AtvServiceClient, Device, DeviceError, HassClient};

/// Navigation and playback buttons of the Apple TV remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteCommand {
    Up,
    Down,
    Left,
    Right,
    ChannelUp,
    ChannelDown,
    Home,
    HomeHold,
    Menu,
    Next,
    Pause,
    Play,
    PlayPause,
    Previous,
    Select,
    SkipForward,
    SkipBackward,
    Stop,
    Suspend,
    TopMenu,
    Wakeup,
}

impl RemoteCommand {
    pub const ALL: [RemoteCommand; 21] = [
        RemoteCommand::Up,
        RemoteCommand::Down,
        RemoteCommand::Left,
        RemoteCommand::Right,
        RemoteCommand::ChannelUp,
        RemoteCommand::ChannelDown,
        RemoteCommand::Home,
        RemoteCommand::HomeHold,
        RemoteCommand::Menu,
        RemoteCommand::Next,
        RemoteCommand::Pause,
        RemoteCommand::Play,
        RemoteCommand::PlayPause,
        RemoteCommand::Previous,
        RemoteCommand::Select,
        RemoteCommand::SkipForward,
        RemoteCommand::SkipBackward,
        RemoteCommand::Stop,
        RemoteCommand::Suspend,
        RemoteCommand::TopMenu,
        RemoteCommand::Wakeup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteCommand::Up => "up",
            RemoteCommand::Down => "down",
            RemoteCommand::Left => "left",
            RemoteCommand::Right => "right",
            RemoteCommand::ChannelUp => "channel_up",
            RemoteCommand::ChannelDown => "channel_down",
            RemoteCommand::Home => "home",
            RemoteCommand::HomeHold => "home_hold",
            RemoteCommand::Menu => "menu",
            RemoteCommand::Next => "next",
            RemoteCommand::Pause => "pause",
            RemoteCommand::Play => "play",
            RemoteCommand::PlayPause => "play_pause",
            RemoteCommand::Previous => "previous",
            RemoteCommand::Select => "select",
            RemoteCommand::SkipForward => "skip_forward",
            RemoteCommand::SkipBackward => "skip_backward",
            RemoteCommand::Stop => "stop",
            RemoteCommand::Suspend => "suspend",
            RemoteCommand::TopMenu => "top_menu",
            RemoteCommand::Wakeup => "wakeup",
        }
    }
}

impl FromStr for RemoteCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RemoteCommand::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Unknown remote control command: {}", s))
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const SERVICE_COMMANDS: &[&str] = &["launch_app", "append_text", "clear_text", "power_toggle"];
const HASS_REMOTE_COMMANDS: &[&str] = &["volume_up", "volume_down"];

/// Apple TV driven through the pnut Apple TV web service, which answers far quicker than the
/// Home Assistant remote API. Volume goes through Home Assistant.
pub struct AppleTv {
    name: String,
    hass: Arc<HassClient>,
    entity_id: String,
    service: Arc<AtvServiceClient>,
}

impl AppleTv {
    pub fn new(name: &str, hass: Arc<HassClient>, entity_id: &str, service: Arc<AtvServiceClient>) -> Self {
        Self {
            name: name.to_string(),
            hass,
            entity_id: entity_id.to_string(),
            service,
        }
    }

    async fn send_remote_command(&self, command: &str) -> Result<(), DeviceError> {
        self.hass
            .call_service(
                "remote",
                "send_command",
                json!({ "entity_id": format!("remote.{}", self.entity_id), "command": command }),
            )
            .await
    }
}

#[async_trait]
impl Device for AppleTv {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, command: &str) -> bool {
        command.parse::<RemoteCommand>().is_ok()
            || SERVICE_COMMANDS.contains(&command)
            || HASS_REMOTE_COMMANDS.contains(&command)
    }

    async fn execute(&self, command: &str, argument: Option<&str>, _args: PressArgs) -> Result<(), DeviceError> {
        if let Ok(remote_command) = command.parse::<RemoteCommand>() {
            return self.service.press_button(remote_command).await;
        }
        match command {
            "launch_app" => self.service.launch_app(require_argument(command, argument)?).await,
            "append_text" => self.service.keyboard_enter(require_argument(command, argument)?).await,
            "clear_text" => self.service.keyboard_clear().await,
            "power_toggle" => self.service.power_toggle().await,
            "volume_up" | "volume_down" => self.send_remote_command(command).await,
            _ => Err(DeviceError::unsupported(&self.name, command)),
        }
    }

    async fn keep_alive(&self) -> Result<(), DeviceError> {
        self.service.keep_alive().await
    }
}
