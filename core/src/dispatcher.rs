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

//! Producer side of the pipeline: turns raw dongle reports into scheduled actions.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, info};

use crate::action::{Action, ActionTarget, RepeatCadence, RepeatingAction, SingleAction};
use crate::keymap::{KeyMap, SymbolicCommand};
use crate::remote::RemoteTarget;
use crate::scheduler::{SchedulerHandle, SchedulerStopped};
use crate::signals::{ExitReason, ExitSignal, ReleaseSignal};
use crate::usb::DongleError;

/// Blocking source of raw input reports.
pub trait RawEventSource: Send {
    fn read(&mut self) -> Result<Vec<u8>, DongleError>;

    fn close(&mut self);
}

pub struct EventDispatcher<S: RawEventSource> {
    source: S,
    key_map: KeyMap,
    scheduler: SchedulerHandle,
    remote: Arc<dyn RemoteTarget>,
    release: ReleaseSignal,
    exit: ExitSignal,
    cadence: RepeatCadence,
}

impl<S: RawEventSource + 'static> EventDispatcher<S> {
    pub fn new(
        source: S,
        key_map: KeyMap,
        scheduler: SchedulerHandle,
        remote: Arc<dyn RemoteTarget>,
        release: ReleaseSignal,
        exit: ExitSignal,
    ) -> Self {
        Self {
            source,
            key_map,
            scheduler,
            remote,
            release,
            exit,
            cadence: RepeatCadence::default(),
        }
    }

    /// Opens the event source first. A source that cannot be opened is returned as an error and
    /// no dispatcher is created.
    pub fn open<F>(
        opener: F,
        key_map: KeyMap,
        scheduler: SchedulerHandle,
        remote: Arc<dyn RemoteTarget>,
        release: ReleaseSignal,
        exit: ExitSignal,
    ) -> Result<Self, DongleError>
    where
        F: FnOnce() -> Result<S, DongleError>,
    {
        let source = opener()?;
        Ok(Self::new(source, key_map, scheduler, remote, release, exit))
    }

    pub fn with_cadence(mut self, cadence: RepeatCadence) -> Self {
        self.cadence = cadence;
        self
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("event-dispatcher".into())
            .spawn(move || self.run())
    }

    pub fn run(mut self) {
        info!("Event dispatcher started with {} mapped keys", self.key_map.len());
        while !self.exit.is_set() {
            let report = match self.source.read() {
                Ok(report) => report,
                Err(e) => {
                    error!("Reading from the remote failed, exiting: {}", e);
                    self.exit.set_with_reason(ExitReason::DeviceLost(e.to_string()));
                    break;
                }
            };
            if self.exit.is_set() {
                break;
            }
            if let Err(e) = self.handle_report(&report) {
                error!("{}, exiting", e);
                self.exit.set_with_reason(ExitReason::SchedulerStopped);
                break;
            }
        }
        self.source.close();
        info!("Event dispatcher stopped");
    }

    fn handle_report(&self, report: &[u8]) -> Result<(), SchedulerStopped> {
        // any new event invalidates a pending release
        self.release.clear();

        let Some(command) = self.key_map.map(report) else {
            info!("Unmapped report {}", hex::encode(report));
            return Ok(());
        };
        if command.is_release() {
            debug!("Release");
            self.release.set();
            return Ok(());
        }

        debug!("Mapped report to {:?}", command);
        self.scheduler.schedule(self.build_action(&command))
    }

    fn build_action(&self, command: &SymbolicCommand) -> Box<dyn Action> {
        let remote = self.remote.clone();
        let value = command.value.clone();
        let target: ActionTarget = Box::new(move |args| remote.press_button(&value, args));

        if command.repeat {
            Box::new(
                RepeatingAction::new(command.value.clone(), target, command.accelerates(), self.release.clone())
                    .with_cadence(self.cadence),
            )
        } else {
            Box::new(SingleAction::new(command.value.clone(), target))
        }
    }
}
