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

//! Units of work executed by the [`ActionScheduler`](crate::scheduler::ActionScheduler).
//!
//! Every action converts failures of its target into an [`ActionOutcome`]; nothing raised by a
//! target ever reaches the scheduler loop.

use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::scheduler::SchedulerContext;
use crate::signals::ReleaseSignal;

/// Keyword arguments forwarded with a button press.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PressArgs {
    pub step: Option<f64>,
}

impl PressArgs {
    pub fn none() -> Self {
        Self { step: None }
    }

    pub fn with_step(step: f64) -> Self {
        Self { step: Some(step) }
    }
}

/// Operation wrapped by an action, usually a closure forwarding a command to the remote.
pub type ActionTarget = Box<dyn Fn(PressArgs) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Completed,
    Failed(String),
    Stopped,
}

pub trait Action: Send {
    fn execute(&self, ctx: &SchedulerContext) -> ActionOutcome;

    fn describe(&self) -> String;
}

fn invoke_isolated(target: &ActionTarget, args: PressArgs, label: &str) -> Result<(), String> {
    match panic::catch_unwind(AssertUnwindSafe(|| target(args))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            warn!("Action {} failed: {:#}", label, e);
            Err(e.to_string())
        }
        Err(_) => {
            warn!("Action {} panicked", label);
            Err(format!("action {} panicked", label))
        }
    }
}

/// Invokes its target exactly once.
pub struct SingleAction {
    label: String,
    target: ActionTarget,
}

impl SingleAction {
    pub fn new(label: impl Into<String>, target: ActionTarget) -> Self {
        Self { label: label.into(), target }
    }
}

impl Action for SingleAction {
    fn execute(&self, _ctx: &SchedulerContext) -> ActionOutcome {
        match invoke_isolated(&self.target, PressArgs::none(), &self.label) {
            Ok(()) => ActionOutcome::Completed,
            Err(e) => ActionOutcome::Failed(e),
        }
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// Timing and step progression of a held button.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepeatCadence {
    pub initial_step: f64,
    pub step_increment: f64,
    /// Gap after the first invocation; longer so a short press does not double fire.
    pub first_interval: Duration,
    pub repeat_interval: Duration,
}

impl Default for RepeatCadence {
    fn default() -> Self {
        Self {
            initial_step: 0.025,
            step_increment: 0.025,
            first_interval: Duration::from_millis(250),
            repeat_interval: Duration::from_millis(50),
        }
    }
}

/// Re-invokes its target until the release signal is observed.
///
/// While running it occupies the scheduler's single worker, so nothing else executes until the
/// button is let go. When `accelerates` is set the target receives a growing `step`.
pub struct RepeatingAction {
    label: String,
    target: ActionTarget,
    accelerates: bool,
    release: ReleaseSignal,
    cadence: RepeatCadence,
}

impl RepeatingAction {
    pub fn new(label: impl Into<String>, target: ActionTarget, accelerates: bool, release: ReleaseSignal) -> Self {
        Self {
            label: label.into(),
            target,
            accelerates,
            release,
            cadence: RepeatCadence::default(),
        }
    }

    pub fn with_cadence(mut self, cadence: RepeatCadence) -> Self {
        self.cadence = cadence;
        self
    }

    pub fn accelerates(&self) -> bool {
        self.accelerates
    }
}

impl Action for RepeatingAction {
    fn execute(&self, ctx: &SchedulerContext) -> ActionOutcome {
        let mut step = self.cadence.initial_step;
        let mut interval = self.cadence.first_interval;
        let mut invocations = 0usize;
        let mut failures = 0usize;

        while !self.release.is_set() && !ctx.exit_signal().is_set() {
            let args = if self.accelerates {
                PressArgs::with_step(step)
            } else {
                PressArgs::none()
            };
            // a failed press does not end the repeat, only the release does
            if invoke_isolated(&self.target, args, &self.label).is_err() {
                failures += 1;
            }
            invocations += 1;
            if self.accelerates {
                step += self.cadence.step_increment;
            }
            thread::sleep(interval);
            interval = self.cadence.repeat_interval;
        }

        debug!("Repeating action {} stopped after {} invocations ({} failed)", self.label, invocations, failures);
        ActionOutcome::Completed
    }

    fn describe(&self) -> String {
        format!("{} (repeating{})", self.label, if self.accelerates { ", accelerating" } else { "" })
    }
}

/// Requests termination of the whole pipeline when executed.
pub struct ExitAction;

impl Action for ExitAction {
    fn execute(&self, ctx: &SchedulerContext) -> ActionOutcome {
        ctx.exit_signal().set();
        ActionOutcome::Stopped
    }

    fn describe(&self) -> String {
        "exit".to_string()
    }
}
