//! Quest intent types produced by the classifier

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What kind of objective a quest describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestType {
    #[default]
    Unknown,
    Move,
    Talk,
    Kill,
    UseItem,
    Collect,
    Join,
}

impl QuestType {
    pub const ALL: [QuestType; 7] = [
        Self::Unknown,
        Self::Move,
        Self::Talk,
        Self::Kill,
        Self::UseItem,
        Self::Collect,
        Self::Join,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Move => "move",
            Self::Talk => "talk",
            Self::Kill => "kill",
            Self::UseItem => "use_item",
            Self::Collect => "collect",
            Self::Join => "join",
        }
    }

    /// Action to take for this type when nothing more specific is known
    pub fn default_action(&self) -> QuestAction {
        match self {
            Self::Unknown => QuestAction::ClickQuestPanel,
            Self::Move => QuestAction::ClickQuestPanel,
            Self::Talk => QuestAction::PathfindAndTalkNpc,
            Self::Kill => QuestAction::WaitForKill,
            Self::UseItem => QuestAction::ClickItem,
            Self::Collect => QuestAction::ClickItem,
            Self::Join => QuestAction::WaitForUser,
        }
    }
}

impl fmt::Display for QuestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QuestType {
    type Err = eyre::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| eyre::eyre!("Unknown quest type: {}", s))
    }
}

/// The physical action that advances a quest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestAction {
    #[default]
    None,
    ClickQuestPanel,
    PathfindAndTalkNpc,
    PressMovementKeys,
    PressSkillKey,
    WaitForKill,
    WaitForUser,
    ClickItem,
}

impl QuestAction {
    pub const ALL: [QuestAction; 8] = [
        Self::None,
        Self::ClickQuestPanel,
        Self::PathfindAndTalkNpc,
        Self::PressMovementKeys,
        Self::PressSkillKey,
        Self::WaitForKill,
        Self::WaitForUser,
        Self::ClickItem,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ClickQuestPanel => "click_quest_panel",
            Self::PathfindAndTalkNpc => "pathfind_and_talk_npc",
            Self::PressMovementKeys => "press_movement_keys",
            Self::PressSkillKey => "press_skill_key",
            Self::WaitForKill => "wait_for_kill",
            Self::WaitForUser => "wait_for_user",
            Self::ClickItem => "click_item",
        }
    }

    /// Whether invoking this action moves the avatar on its own
    pub fn starts_movement(&self) -> bool {
        matches!(
            self,
            Self::ClickQuestPanel | Self::PathfindAndTalkNpc | Self::PressMovementKeys
        )
    }
}

impl fmt::Display for QuestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QuestAction {
    type Err = eyre::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| eyre::eyre!("Unknown quest action: {}", s))
    }
}

/// How a classification was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    /// No quest text
    #[default]
    Empty,
    /// Fixed keyword rule
    Rule,
    /// Pattern store
    Learned,
    /// Nothing matched
    Fallback,
}

impl fmt::Display for ClassificationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Empty => "empty",
            Self::Rule => "rule",
            Self::Learned => "learned",
            Self::Fallback => "fallback",
        };
        write!(f, "{}", name)
    }
}

/// Structured intent for one quest text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct QuestInfo {
    pub quest_type: QuestType,
    pub action: QuestAction,
    /// Raw quest text as observed
    pub quest_text: String,
    /// Extracted addressee or mob name (best effort)
    pub target: String,
    /// Parsed progress, 0 when absent
    pub current_count: u32,
    /// Parsed progress total, 0 when absent
    pub required_count: u32,
    /// 0.0 - 1.0
    pub confidence: f32,
    /// Keyword that produced the classification, empty for fallback
    pub matched_keyword: String,
    pub source: ClassificationSource,
}

impl QuestInfo {
    /// Classification for an empty quest slot
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.source == ClassificationSource::Empty
    }

    /// Whether a progress counter was found
    pub fn has_progress(&self) -> bool {
        self.required_count > 0
    }

    /// Kill progress as (current, required) while this is an active kill quest
    pub fn kill_progress(&self) -> Option<(u32, u32)> {
        (self.quest_type == QuestType::Kill && self.has_progress()).then_some((self.current_count, self.required_count))
    }
}
