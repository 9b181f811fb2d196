pub mod action;
pub mod config;
pub mod devices;
pub mod dispatcher;
pub mod keymap;
pub mod remote;
pub mod scheduler;
pub mod signals;
pub mod usb;

mod service;

pub use action::{Action, ActionOutcome, ExitAction, PressArgs, RepeatCadence, RepeatingAction, SingleAction};
pub use config::{ConfigError, RemoteConfig};
pub use dispatcher::{EventDispatcher, RawEventSource};
pub use keymap::{KeyMap, SymbolicCommand, KEY_RELEASE};
pub use remote::{BlockingRemote, RemoteTarget, UniversalRemote};
pub use scheduler::{ActionScheduler, SchedulerHandle, SchedulerState};
pub use service::{RemoteService, ServiceError};
pub use signals::{ExitReason, ExitSignal, ReleaseSignal};
