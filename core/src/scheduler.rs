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

use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};
use thiserror::Error;

use crate::action::{Action, ActionOutcome};
use crate::remote::RemoteTarget;
use crate::signals::ExitSignal;

/// Roughly how long the scheduler may sit idle before pinging downstream sessions.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(3600);

/// What an executing action may see of the scheduler running it.
pub struct SchedulerContext {
    exit: ExitSignal,
}

impl SchedulerContext {
    pub fn new(exit: ExitSignal) -> Self {
        Self { exit }
    }

    pub fn exit_signal(&self) -> &ExitSignal {
        &self.exit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Executing,
    Stopped,
}

#[derive(Error, Debug)]
#[error("Action scheduler is no longer running")]
pub struct SchedulerStopped;

type ActionQueueSender = mpsc::Sender<Box<dyn Action>>;

/// Producer side of the scheduler queue. Cheap to clone; any number of producers may submit.
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: ActionQueueSender,
    state: Arc<Mutex<SchedulerState>>,
}

impl SchedulerHandle {
    /// Enqueues an action without blocking. Actions run in the order they were enqueued.
    pub fn schedule(&self, action: Box<dyn Action>) -> Result<(), SchedulerStopped> {
        self.sender.send(action).map_err(|_| SchedulerStopped)
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Single consumer that executes queued actions strictly one at a time.
pub struct ActionScheduler {
    sender: ActionQueueSender,
    receiver: mpsc::Receiver<Box<dyn Action>>,
    keep_alive: Arc<dyn RemoteTarget>,
    exit: ExitSignal,
    idle_timeout: Duration,
    state: Arc<Mutex<SchedulerState>>,
}

impl ActionScheduler {
    pub fn new(keep_alive: Arc<dyn RemoteTarget>, exit: ExitSignal) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            keep_alive,
            exit,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            state: Arc::new(Mutex::new(SchedulerState::Idle)),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            sender: self.sender.clone(),
            state: self.state.clone(),
        }
    }

    /// Starts the consume loop on a dedicated thread.
    pub fn spawn(self) -> std::io::Result<SchedulerThread> {
        let handle = self.handle();
        let ActionScheduler { sender, receiver, keep_alive, exit, idle_timeout, state } = self;
        // only external handles keep the queue open from here on
        drop(sender);
        let worker = SchedulerWorker { receiver, keep_alive, exit, idle_timeout, state };
        let join = thread::Builder::new()
            .name("action-scheduler".into())
            .spawn(move || worker.run())?;
        Ok(SchedulerThread { join, handle })
    }

    /// Takes everything queued so far without running it.
    #[cfg(test)]
    pub(crate) fn drain(&self) -> Vec<Box<dyn Action>> {
        self.receiver.try_iter().collect()
    }
}

pub struct SchedulerThread {
    join: JoinHandle<()>,
    handle: SchedulerHandle,
}

impl SchedulerThread {
    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    pub fn join(self) -> thread::Result<()> {
        self.join.join()
    }
}

struct SchedulerWorker {
    receiver: mpsc::Receiver<Box<dyn Action>>,
    keep_alive: Arc<dyn RemoteTarget>,
    exit: ExitSignal,
    idle_timeout: Duration,
    state: Arc<Mutex<SchedulerState>>,
}

impl SchedulerWorker {
    fn set_state(&self, state: SchedulerState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    fn run(self) {
        info!("Action scheduler started (idle timeout {:?})", self.idle_timeout);
        let ctx = SchedulerContext::new(self.exit.clone());
        while !self.exit.is_set() {
            match panic::catch_unwind(AssertUnwindSafe(|| self.run_once(&ctx))) {
                Ok(ControlFlow::Continue(())) => {}
                Ok(ControlFlow::Break(())) => break,
                Err(_) => {
                    error!("Encountered panic in scheduler, continuing");
                    self.set_state(SchedulerState::Idle);
                }
            }
        }
        self.set_state(SchedulerState::Stopped);
        info!("Action scheduler stopped");
    }

    fn run_once(&self, ctx: &SchedulerContext) -> ControlFlow<()> {
        match self.receiver.recv_timeout(self.idle_timeout) {
            Ok(action) => {
                self.execute(action, ctx);
                ControlFlow::Continue(())
            }
            Err(RecvTimeoutError::Timeout) => {
                debug!("Scheduler idle, sending keep alive");
                if let Err(e) = self.keep_alive.keep_alive() {
                    warn!("Keep alive failed: {:#}", e);
                }
                ControlFlow::Continue(())
            }
            Err(RecvTimeoutError::Disconnected) => {
                info!("All action producers are gone, stopping scheduler");
                ControlFlow::Break(())
            }
        }
    }

    fn execute(&self, action: Box<dyn Action>, ctx: &SchedulerContext) {
        let description = action.describe();
        self.set_state(SchedulerState::Executing);
        debug!("Executing action {}", description);
        match action.execute(ctx) {
            ActionOutcome::Completed => debug!("Action {} completed", description),
            ActionOutcome::Failed(e) => info!("Action {} failed: {}", description, e),
            ActionOutcome::Stopped => info!("Action {} requested exit", description),
        }
        self.set_state(SchedulerState::Idle);
    }
}
