//! questfarm - unattended quest automation
//!
//! Decision engine for automating game quests across many instances:
//! - `classifier`: quest text to structured intent, with online learning
//! - `farm`: the per-tick state machine and its action interface
//! - `ipc`: file-based command channel between controller and instance
//! - `status`: periodic status snapshots
//! - `session`: wires the above together behind one `tick` call

pub mod classifier;
pub mod cli;
pub mod config;
pub mod domain;
pub mod farm;
pub mod ipc;
pub mod locator;
pub mod logging;
pub mod scenario;
pub mod session;
pub mod status;
pub mod timer;

pub use classifier::QuestClassifier;
pub use config::Config;
pub use domain::{BotState, Observation, QuestAction, QuestInfo, QuestType};
pub use farm::{ActionOutcome, ActionSink, FarmAction, FarmState, FarmStateMachine, TickSignals};
pub use locator::{Locator, LocatorSink, UiHandle, UiRole};
pub use session::FarmSession;
