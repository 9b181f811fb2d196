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
use std::thread::JoinHandle;

use log::{info, warn};
use thiserror::Error;
use tokio::runtime::Handle;

use crate::action::ExitAction;
use crate::config::{ConfigError, RemoteConfig};
use crate::devices::{AtvServiceClient, DeviceSet, HassClient};
use crate::dispatcher::{EventDispatcher, RawEventSource};
use crate::remote::{BlockingRemote, RemoteTarget, UniversalRemote};
use crate::scheduler::{ActionScheduler, SchedulerHandle, SchedulerThread};
use crate::signals::{ExitReason, ExitSignal, ReleaseSignal};
use crate::usb::{DongleError, HidDongle};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to open the remote receiver: {0}")]
    Dongle(#[from] DongleError),

    #[error("Failed to start worker thread: {0}")]
    Thread(#[from] std::io::Error),
}

/// The running pipeline: dispatcher thread feeding the scheduler thread.
pub struct RemoteService {
    exit: ExitSignal,
    scheduler: SchedulerThread,
    dispatcher: JoinHandle<()>,
}

impl RemoteService {
    /// Opens the event source and starts both threads. Nothing is started if opening fails.
    pub fn start<S, F>(config: &RemoteConfig, remote: Arc<dyn RemoteTarget>, opener: F) -> Result<Self, ServiceError>
    where
        S: RawEventSource + 'static,
        F: FnOnce() -> Result<S, DongleError>,
    {
        let key_map = config.key_map()?;
        let exit = ExitSignal::new();
        let release = ReleaseSignal::new();

        let scheduler = ActionScheduler::new(remote.clone(), exit.clone()).with_idle_timeout(config.idle_timeout()?);
        let dispatcher = EventDispatcher::open(opener, key_map, scheduler.handle(), remote, release, exit.clone())?;

        let scheduler = scheduler.spawn()?;
        let dispatcher = dispatcher.spawn()?;
        info!("Remote service started");
        Ok(Self { exit, scheduler, dispatcher })
    }

    /// Builds the device layer from `config` and starts the pipeline on the USB dongle.
    ///
    /// `runtime` must belong to a multi-threaded runtime; device calls are blocked on from the
    /// scheduler thread.
    pub fn from_config(config: &RemoteConfig, runtime: Handle) -> Result<Self, ServiceError> {
        let timeout = config.request_timeout()?;
        let hass = HassClient::with_timeout(&config.home_assistant.url, config.hass_token()?, timeout)
            .map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;
        let atv_service = config
            .atv_service
            .as_ref()
            .map(|endpoint| AtvServiceClient::with_timeout(&endpoint.host, endpoint.port, timeout))
            .transpose()
            .map_err(|e| ConfigError::InvalidUrl(e.to_string()))?
            .map(Arc::new);

        let devices = DeviceSet::from_config(&config.devices, Arc::new(hass), atv_service)?;
        let remote = UniversalRemote::from_config(config, devices)?;
        let target: Arc<dyn RemoteTarget> = Arc::new(BlockingRemote::new(Arc::new(remote), runtime));

        let dongle = config.dongle;
        Self::start(config, target, move || HidDongle::open(&dongle))
    }

    pub fn exit_signal(&self) -> ExitSignal {
        self.exit.clone()
    }

    pub fn scheduler(&self) -> SchedulerHandle {
        self.scheduler.handle()
    }

    /// Blocks until something requests exit and returns why.
    pub fn wait(&self) -> ExitReason {
        self.exit.wait();
        self.exit.reason().unwrap_or(ExitReason::Requested)
    }

    /// Stops the scheduler and waits for it. The dispatcher ends after its in-flight read returns.
    pub fn shutdown(self) {
        info!("Shutting down remote service");
        self.exit.set();
        // wakes the scheduler if it is parked waiting for work
        if self.scheduler.handle().schedule(Box::new(ExitAction)).is_err() {
            info!("Scheduler already stopped");
        }
        if self.scheduler.join().is_err() {
            warn!("Scheduler thread panicked");
        }
        if self.dispatcher.is_finished() {
            let _ = self.dispatcher.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::PressArgs;
    use crate::scheduler::SchedulerState;
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::time::Duration;

    struct ChannelSource(mpsc::Receiver<Vec<u8>>);

    impl RawEventSource for ChannelSource {
        fn read(&mut self) -> Result<Vec<u8>, DongleError> {
            self.0.recv().map_err(|_| DongleError::Closed)
        }

        fn close(&mut self) {}
    }

    #[derive(Default)]
    struct Presses(Mutex<Vec<String>>);

    impl RemoteTarget for Presses {
        fn press_button(&self, command: &str, _args: PressArgs) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(command.to_string());
            Ok(())
        }
    }

    fn config() -> RemoteConfig {
        serde_json::from_value(serde_json::json!({
            "home_assistant": { "url": "http://localhost:8123", "token": "token" },
            "source_control": "avr",
            "source_default": "atv",
            "keymap": [
                { "report": "00", "value": "KEY_RELEASE" },
                { "report": "00 00 28", "value": "select" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn presses_flow_through_and_shutdown_stops_scheduler() {
        let presses = Arc::new(Presses::default());
        let (sender, receiver) = mpsc::channel();
        let service = RemoteService::start(&config(), presses.clone(), move || Ok(ChannelSource(receiver))).unwrap();

        sender.send(vec![0, 0, 0x28, 0, 0, 0, 0, 0]).unwrap();
        sender.send(vec![0; 8]).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while presses.0.lock().unwrap().is_empty() {
            assert!(std::time::Instant::now() < deadline);
            std::thread::sleep(Duration::from_millis(5));
        }

        let scheduler = service.scheduler();
        let exit = service.exit_signal();
        service.shutdown();

        assert!(exit.is_set());
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert_eq!(*presses.0.lock().unwrap(), vec!["select"]);
    }

    #[test]
    fn unopenable_source_starts_nothing() {
        let result = RemoteService::start(&config(), Arc::new(Presses::default()), || {
            Err::<ChannelSource, _>(DongleError::NotFound { vendor_id: 0x150a, product_id: 0x1203 })
        });

        assert!(matches!(result, Err(ServiceError::Dongle(DongleError::NotFound { .. }))));
    }

    #[test]
    fn lost_device_requests_exit() {
        let (sender, receiver) = mpsc::channel::<Vec<u8>>();
        let service =
            RemoteService::start(&config(), Arc::new(Presses::default()), move || Ok(ChannelSource(receiver))).unwrap();

        drop(sender);
        assert!(service.exit_signal().wait_timeout(Duration::from_secs(5)));
        assert_eq!(service.wait(), ExitReason::DeviceLost(DongleError::Closed.to_string()));
        service.shutdown();
    }

    #[test]
    fn operator_exit_is_reported_as_requested() {
        let (_sender, receiver) = mpsc::channel::<Vec<u8>>();
        let service =
            RemoteService::start(&config(), Arc::new(Presses::default()), move || Ok(ChannelSource(receiver))).unwrap();

        service.exit_signal().set();
        assert_eq!(service.wait(), ExitReason::Requested);
        service.shutdown();
    }

    #[test]
    fn zero_idle_timeout_starts_nothing() {
        let mut config = config();
        config.idle_timeout_secs = 0;

        let result = RemoteService::start(&config, Arc::new(Presses::default()), || {
            Err::<ChannelSource, _>(DongleError::Closed)
        });
        assert!(matches!(result, Err(ServiceError::Config(ConfigError::ZeroTimeout(_)))));
    }

    #[test]
    fn invalid_keymap_is_a_config_error() {
        let mut config = config();
        config.keymap[1].report = "zz".to_string();

        let result = RemoteService::start(&config, Arc::new(Presses::default()), || {
            Err::<ChannelSource, _>(DongleError::Closed)
        });
        assert!(matches!(result, Err(ServiceError::Config(ConfigError::InvalidReport { .. }))));
    }
}
