//! Completion judgment for finished quests

use tracing::trace;

use super::text::quest_key;
use crate::domain::QuestInfo;

/// Outcome of judging the previous quest when the quest text changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionVerdict {
    Completed,
    Failed,
    /// Not enough evidence either way; nothing is recorded
    Unknown,
}

/// Decides whether a quest that just left the quest slot was completed
///
/// The default judges on text change alone, which cannot tell completion
/// from abandonment or a server-side reset. Hosts with better evidence (a
/// reward popup, a completion sound cue) can supply their own.
pub trait CompletionOracle: Send {
    fn judge(&self, previous: &QuestInfo, new_text: &str) -> CompletionVerdict;
}

/// Treats any change of quest text as success of the previous quest
#[derive(Debug, Clone, Copy, Default)]
pub struct TextChangeOracle;

impl CompletionOracle for TextChangeOracle {
    fn judge(&self, previous: &QuestInfo, new_text: &str) -> CompletionVerdict {
        if previous.is_empty() {
            trace!("TextChangeOracle::judge: no previous quest");
            return CompletionVerdict::Unknown;
        }
        if quest_key(&previous.quest_text) != quest_key(new_text) {
            CompletionVerdict::Completed
        } else {
            CompletionVerdict::Unknown
        }
    }
}
