//! Domain types shared across the classifier, state machine and channel

mod bot;
mod observation;
mod quest;

pub use bot::{AutomationFlags, BotState, Location, MAX_SPEED, SPEED_STEPS};
pub use observation::{BossSighting, Observation};
pub use quest::{ClassificationSource, QuestAction, QuestInfo, QuestType};
