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

//! Access to the RF remote's USB receiver.

use serde::Deserialize;
use thiserror::Error;

mod hid_dongle;

pub use hid_dongle::HidDongle;

pub const DEFAULT_VENDOR_ID: u16 = 0x150a;
pub const DEFAULT_PRODUCT_ID: u16 = 0x1203;
/// Largest report the dongle sends.
pub const REPORT_SIZE: usize = 64;

fn default_vendor_id() -> u16 {
    DEFAULT_VENDOR_ID
}

fn default_product_id() -> u16 {
    DEFAULT_PRODUCT_ID
}

fn default_endpoint() -> u8 {
    0x81
}

/// Which USB device to open and where its reports arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DongleId {
    #[serde(default = "default_vendor_id")]
    pub vendor_id: u16,
    #[serde(default = "default_product_id")]
    pub product_id: u16,
    #[serde(default)]
    pub interface: u8,
    #[serde(default = "default_endpoint")]
    pub endpoint: u8,
}

impl Default for DongleId {
    fn default() -> Self {
        Self {
            vendor_id: DEFAULT_VENDOR_ID,
            product_id: DEFAULT_PRODUCT_ID,
            interface: 0,
            endpoint: default_endpoint(),
        }
    }
}

#[derive(Error, Debug)]
pub enum DongleError {
    #[error("USB device {vendor_id:04x}:{product_id:04x} not found")]
    NotFound { vendor_id: u16, product_id: u16 },

    #[error("USB error: {0}")]
    Usb(#[from] std::io::Error),

    #[error("Transfer failed: {0}")]
    Transfer(#[from] nusb::transfer::TransferError),

    #[error("Device is closed")]
    Closed,
}
