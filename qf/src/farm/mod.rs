//! Farm state machine and its action interface

mod actions;
mod machine;
mod state;

pub use actions::{ActionOutcome, ActionSink, FarmAction, RecordingSink};
pub use machine::{FarmStateMachine, TickSignals};
pub use state::{FarmCounters, FarmState, Transition, TransitionReason};
