//! Action vocabulary the state machine can invoke

use std::fmt;

use crate::domain::QuestAction;

/// A side-effecting request to the host
///
/// Fire-and-forget: the machine observes the effect on later ticks, never a
/// return value beyond whether the host managed to issue it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FarmAction {
    /// Carry out a quest action
    Perform(QuestAction),
    /// Click through the open NPC dialog
    AdvanceDialog,
    /// Re-trigger pathfinding after the avatar got stuck
    RetryPathfind,
}

impl FarmAction {
    /// The quest action this counts as when summarizing what was done
    pub fn summary(&self) -> Option<QuestAction> {
        match self {
            Self::Perform(action) => Some(*action),
            Self::AdvanceDialog => Some(QuestAction::PathfindAndTalkNpc),
            Self::RetryPathfind => None,
        }
    }
}

impl fmt::Display for FarmAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Perform(action) => write!(f, "{}", action),
            Self::AdvanceDialog => write!(f, "advance_dialog"),
            Self::RetryPathfind => write!(f, "retry_pathfind"),
        }
    }
}

/// Whether the host managed to issue an action this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Performed,
    /// The UI element was missing or refused the input
    NotPerformed,
}

/// Receives actions from the state machine
pub trait ActionSink {
    fn invoke(&mut self, action: FarmAction) -> ActionOutcome;
}

/// Sink that records every action and performs them all
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub actions: Vec<FarmAction>,
}

impl ActionSink for RecordingSink {
    fn invoke(&mut self, action: FarmAction) -> ActionOutcome {
        self.actions.push(action);
        ActionOutcome::Performed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary() {
        assert_eq!(
            FarmAction::Perform(QuestAction::ClickItem).summary(),
            Some(QuestAction::ClickItem)
        );
        assert_eq!(FarmAction::AdvanceDialog.summary(), Some(QuestAction::PathfindAndTalkNpc));
        assert_eq!(FarmAction::RetryPathfind.summary(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(FarmAction::Perform(QuestAction::PressSkillKey).to_string(), "press_skill_key");
        assert_eq!(FarmAction::RetryPathfind.to_string(), "retry_pathfind");
    }

    #[test]
    fn test_recording_sink() {
        let mut sink = RecordingSink::default();
        assert_eq!(sink.invoke(FarmAction::AdvanceDialog), ActionOutcome::Performed);
        assert_eq!(sink.actions, vec![FarmAction::AdvanceDialog]);
    }
}
