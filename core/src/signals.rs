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

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Flag telling an in-flight repeating action that the held button was let go.
///
/// The dispatcher is the only writer; a running `RepeatingAction` is the only reader.
/// Clones share the same underlying flag.
#[derive(Clone, Debug, Default)]
pub struct ReleaseSignal {
    released: Arc<AtomicBool>,
}

impl ReleaseSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.released.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.released.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

/// Why the pipeline was asked to stop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// Operator interrupt or an explicit shutdown.
    Requested,
    /// Reading from the remote dongle failed.
    DeviceLost(String),
    /// The scheduler went away while events were still arriving.
    SchedulerStopped,
}

#[derive(Debug, Default)]
struct ExitState {
    reason: Mutex<Option<ExitReason>>,
    changed: Condvar,
}

/// Process-wide termination request observed by the dispatcher and scheduler loops.
///
/// Setting it is idempotent and wakes every thread blocked in [`ExitSignal::wait`].
/// The first reason recorded is kept.
#[derive(Clone, Debug, Default)]
pub struct ExitSignal {
    state: Arc<ExitState>,
}

impl ExitSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.set_with_reason(ExitReason::Requested);
    }

    pub fn set_with_reason(&self, reason: ExitReason) {
        let mut current = self.state.reason.lock().unwrap_or_else(|e| e.into_inner());
        if current.is_none() {
            *current = Some(reason);
        }
        self.state.changed.notify_all();
    }

    pub fn is_set(&self) -> bool {
        self.state.reason.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    pub fn reason(&self) -> Option<ExitReason> {
        self.state.reason.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Blocks the calling thread until the signal is set.
    pub fn wait(&self) {
        let mut reason = self.state.reason.lock().unwrap_or_else(|e| e.into_inner());
        while reason.is_none() {
            reason = self.state.changed.wait(reason).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Waits at most `timeout`. Returns whether the signal is set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut reason = self.state.reason.lock().unwrap_or_else(|e| e.into_inner());
        while reason.is_none() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (guard, _) = self
                .state
                .changed
                .wait_timeout(reason, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            reason = guard;
        }
        reason.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn release_signal_clones_share_state() {
        let release = ReleaseSignal::new();
        let reader = release.clone();
        assert!(!reader.is_set());
        release.set();
        assert!(reader.is_set());
        release.set();
        assert!(reader.is_set());
        release.clear();
        assert!(!reader.is_set());
    }

    #[test]
    fn exit_signal_wakes_waiting_thread() {
        let exit = ExitSignal::new();
        let waiter = exit.clone();
        let handle = thread::spawn(move || {
            waiter.wait();
            waiter.is_set()
        });
        thread::sleep(Duration::from_millis(20));
        exit.set();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn exit_signal_wait_timeout_expires_when_not_set() {
        let exit = ExitSignal::new();
        let started = Instant::now();
        assert!(!exit.wait_timeout(Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
        exit.set();
        assert!(exit.wait_timeout(Duration::from_millis(30)));
    }

    #[test]
    fn exit_signal_keeps_the_first_reason() {
        let exit = ExitSignal::new();
        assert_eq!(exit.reason(), None);
        exit.set_with_reason(ExitReason::DeviceLost("pipe".into()));
        exit.set();
        assert!(exit.is_set());
        assert_eq!(exit.reason(), Some(ExitReason::DeviceLost("pipe".into())));
    }
}
