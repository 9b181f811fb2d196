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

use serde::Deserialize;

use crate::config::ConfigError;

/// Symbol emitted when every button on the remote has been let go.
pub const KEY_RELEASE: &str = "KEY_RELEASE";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SymbolicCommand {
    pub value: String,
    #[serde(default)]
    pub repeat: bool,
    #[serde(default)]
    pub accelerates: Option<bool>,
}

impl SymbolicCommand {
    pub fn new(value: impl Into<String>, repeat: bool, accelerates: Option<bool>) -> Self {
        Self { value: value.into(), repeat, accelerates }
    }

    pub fn is_release(&self) -> bool {
        self.value == KEY_RELEASE
    }

    pub fn accelerates(&self) -> bool {
        self.accelerates.unwrap_or(false)
    }
}

/// One row of the key map as written in the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyMapEntry {
    /// Raw HID report in hex, whitespace allowed (`"02 e9 00"`).
    pub report: String,
    #[serde(flatten)]
    pub command: SymbolicCommand,
}

/// Lookup from raw dongle reports to symbolic commands.
#[derive(Debug, Clone, Default)]
pub struct KeyMap {
    commands: HashMap<Vec<u8>, SymbolicCommand>,
}

fn significant_bytes(report: &[u8]) -> &[u8] {
    let end = report.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    &report[..end]
}

fn parse_report(report: &str) -> Result<Vec<u8>, ConfigError> {
    let compact: String = report.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(ConfigError::InvalidReport {
            report: report.to_string(),
            reason: "report is empty".to_string(),
        });
    }
    hex::decode(&compact).map_err(|e| ConfigError::InvalidReport {
        report: report.to_string(),
        reason: e.to_string(),
    })
}

impl KeyMap {
    pub fn from_entries(entries: &[KeyMapEntry]) -> Result<Self, ConfigError> {
        let mut commands = HashMap::with_capacity(entries.len());
        for entry in entries {
            let raw = parse_report(&entry.report)?;
            let key = significant_bytes(&raw).to_vec();
            if commands.insert(key, entry.command.clone()).is_some() {
                return Err(ConfigError::DuplicateReport(entry.report.clone()));
            }
        }
        Ok(Self { commands })
    }

    /// Resolves a raw report. Zero padding after the report is ignored.
    pub fn map(&self, report: &[u8]) -> Option<SymbolicCommand> {
        self.commands.get(significant_bytes(report)).cloned()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<KeyMapEntry> {
        serde_json::from_value(serde_json::json!([
            { "report": "00 00 00 00 00 00 00 00", "value": "KEY_RELEASE" },
            { "report": "00 00 52 00 00 00 00 00", "value": "up", "repeat": true },
            { "report": "02 e9 00", "value": "volume_up", "repeat": true, "accelerates": true },
            { "report": "00 00 28", "value": "select" }
        ]))
        .unwrap()
    }

    #[test]
    fn maps_padded_reads_to_configured_commands() {
        let key_map = KeyMap::from_entries(&entries()).unwrap();
        let mut read = vec![0u8; 64];
        read[0] = 0x02;
        read[1] = 0xe9;

        let command = key_map.map(&read).unwrap();
        assert_eq!(command.value, "volume_up");
        assert!(command.repeat);
        assert!(command.accelerates());
    }

    #[test]
    fn missing_accelerates_defaults_to_false() {
        let key_map = KeyMap::from_entries(&entries()).unwrap();
        let command = key_map.map(&[0, 0, 0x52, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(command.accelerates, None);
        assert!(!command.accelerates());
        let select = key_map.map(&[0, 0, 0x28]).unwrap();
        assert!(!select.repeat);
    }

    #[test]
    fn all_zero_report_is_release() {
        let key_map = KeyMap::from_entries(&entries()).unwrap();
        assert!(key_map.map(&[0u8; 64]).unwrap().is_release());
    }

    #[test]
    fn unknown_report_is_unmatched() {
        let key_map = KeyMap::from_entries(&entries()).unwrap();
        assert!(key_map.map(&[0x01, 0x02, 0x03]).is_none());
        assert!(key_map.map(&[0x02, 0xe9, 0x01]).is_none());
    }

    #[test]
    fn rejects_reports_that_collide_after_padding() {
        let mut list = entries();
        list.push(serde_json::from_value(serde_json::json!({ "report": "02e9", "value": "other" })).unwrap());
        assert!(matches!(KeyMap::from_entries(&list), Err(ConfigError::DuplicateReport(_))));
    }

    #[test]
    fn rejects_malformed_hex() {
        let list: Vec<KeyMapEntry> =
            serde_json::from_value(serde_json::json!([{ "report": "zz", "value": "up" }])).unwrap();
        assert!(matches!(KeyMap::from_entries(&list), Err(ConfigError::InvalidReport { .. })));
        let list: Vec<KeyMapEntry> =
            serde_json::from_value(serde_json::json!([{ "report": "  ", "value": "up" }])).unwrap();
        assert!(matches!(KeyMap::from_entries(&list), Err(ConfigError::InvalidReport { .. })));
    }
}
