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

use futures::executor::block_on;
use log::{debug, info};
use nusb::transfer::RequestBuffer;
use nusb::Interface;

use crate::dispatcher::RawEventSource;
use crate::usb::{DongleError, DongleId, REPORT_SIZE};

/// HID receiver of the RF remote, read through its interrupt IN endpoint.
pub struct HidDongle {
    id: DongleId,
    interface: Option<Interface>,
}

impl HidDongle {
    pub fn open(id: &DongleId) -> Result<Self, DongleError> {
        let device_info = nusb::list_devices()?
            .find(|d| d.vendor_id() == id.vendor_id && d.product_id() == id.product_id)
            .ok_or(DongleError::NotFound {
                vendor_id: id.vendor_id,
                product_id: id.product_id,
            })?;
        debug!("Found dongle on bus {} address {}", device_info.bus_number(), device_info.device_address());

        let device = device_info.open()?;
        // the kernel HID driver owns the interface until it is detached
        let interface = device.detach_and_claim_interface(id.interface)?;
        info!(
            "Opened dongle {:04x}:{:04x} interface {}",
            id.vendor_id, id.product_id, id.interface
        );
        Ok(Self {
            id: *id,
            interface: Some(interface),
        })
    }
}

impl RawEventSource for HidDongle {
    fn read(&mut self) -> Result<Vec<u8>, DongleError> {
        let interface = self.interface.as_ref().ok_or(DongleError::Closed)?;
        let completion = block_on(interface.interrupt_in(self.id.endpoint, RequestBuffer::new(REPORT_SIZE)));
        Ok(completion.into_result()?)
    }

    fn close(&mut self) {
        if self.interface.take().is_some() {
            info!("Closed dongle {:04x}:{:04x}", self.id.vendor_id, self.id.product_id);
        }
    }
}
