//! Farm state and transition types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Quest-progress phase; exactly one is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FarmState {
    #[default]
    Idle,
    Pathfinding,
    TalkingNpc,
    Killing,
    Collecting,
    Returning,
    TurningIn,
}

impl FarmState {
    /// States where the avatar is expected to be moving
    pub fn tracks_stuck(&self) -> bool {
        matches!(self, Self::Pathfinding | Self::Returning)
    }

    /// States that wait on an open NPC dialog
    pub fn in_dialog(&self) -> bool {
        matches!(self, Self::TalkingNpc | Self::TurningIn)
    }
}

impl fmt::Display for FarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Pathfinding => "Pathfinding",
            Self::TalkingNpc => "TalkingNpc",
            Self::Killing => "Killing",
            Self::Collecting => "Collecting",
            Self::Returning => "Returning",
            Self::TurningIn => "TurningIn",
        };
        write!(f, "{}", name)
    }
}

/// Why a transition happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionReason {
    /// A quest appeared in the slot
    QuestAssigned,
    DialogOpened,
    /// Kill counter present and below target
    KillProgress,
    CollectActive,
    /// Kill counter reached its target
    KillComplete,
    /// Quest slot emptied after the quest was worked on
    QuestCompleted,
    /// Quest text changed to a different quest
    QuestChanged,
    /// Dialog closed without changing the quest
    DialogClosed,
    /// Stuck retries exhausted
    StuckGaveUp { retries: u32 },
    /// Per-state budget expired
    Timeout { budget_secs: u32 },
    /// Forced from outside (automation switched off, etc.)
    Reset { reason: String },
}

impl TransitionReason {
    /// Whether this transition abandons the quest being worked on
    pub fn is_abandonment(&self) -> bool {
        matches!(self, Self::StuckGaveUp { .. } | Self::Timeout { .. })
    }
}

impl fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QuestAssigned => write!(f, "quest assigned"),
            Self::DialogOpened => write!(f, "dialog opened"),
            Self::KillProgress => write!(f, "kill progress"),
            Self::CollectActive => write!(f, "collect active"),
            Self::KillComplete => write!(f, "kill target reached"),
            Self::QuestCompleted => write!(f, "quest completed"),
            Self::QuestChanged => write!(f, "quest changed"),
            Self::DialogClosed => write!(f, "dialog closed"),
            Self::StuckGaveUp { retries } => write!(f, "stuck after {} retries", retries),
            Self::Timeout { budget_secs } => write!(f, "timeout after {}s", budget_secs),
            Self::Reset { reason } => write!(f, "reset: {}", reason),
        }
    }
}

/// One state change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: FarmState,
    pub to: FarmState,
    pub reason: TransitionReason,
}

/// Running totals for the session
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FarmCounters {
    pub quests_completed: u64,
    /// Accumulated tick time
    pub session_secs: f64,
    pub transitions: u64,
    /// Stuck retries issued
    pub retries_issued: u64,
    /// Actions the host could not perform
    pub actions_not_performed: u64,
}
