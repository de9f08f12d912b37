//! Ordered keyword rule table
//!
//! The first rule whose keyword occurs in the quest text as whole words wins,
//! so order is priority: combat keywords sit above movement keywords because
//! "defeat the wolves then go to the camp" is a kill quest. Whole-word
//! matching keeps "kill" out of "skill" and "hunt" out of "Hunter".

use serde::{Deserialize, Serialize};

use crate::domain::{QuestAction, QuestType};

/// One keyword rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestRule {
    /// Lowercase keyword matched as whole words
    pub keyword: String,
    pub quest_type: QuestType,
    pub action: QuestAction,
    pub confidence: f32,
}

impl QuestRule {
    pub fn new(keyword: &str, quest_type: QuestType, action: QuestAction, confidence: f32) -> Self {
        Self {
            keyword: keyword.to_lowercase(),
            quest_type,
            action,
            confidence,
        }
    }
}

/// Confidence of a classification made by nothing but the fallback
pub const FALLBACK_CONFIDENCE: f32 = 0.1;

/// Learned classifications never reach this, so any rule beats them
pub const LEARNED_CONFIDENCE_CAP: f32 = 0.6;

/// Built-in rule table, highest priority first
pub fn default_rules() -> Vec<QuestRule> {
    use QuestAction as A;
    use QuestType as T;

    vec![
        QuestRule::new("use skill", T::UseItem, A::PressSkillKey, 0.85),
        QuestRule::new("kill", T::Kill, A::WaitForKill, 0.95),
        QuestRule::new("defeat", T::Kill, A::WaitForKill, 0.95),
        QuestRule::new("slay", T::Kill, A::WaitForKill, 0.9),
        QuestRule::new("hunt", T::Kill, A::WaitForKill, 0.85),
        QuestRule::new("eliminate", T::Kill, A::WaitForKill, 0.85),
        QuestRule::new("collect", T::Collect, A::ClickItem, 0.9),
        QuestRule::new("gather", T::Collect, A::ClickItem, 0.85),
        QuestRule::new("pick up", T::Collect, A::ClickItem, 0.8),
        QuestRule::new("talk to", T::Talk, A::PathfindAndTalkNpc, 0.95),
        QuestRule::new("speak with", T::Talk, A::PathfindAndTalkNpc, 0.9),
        QuestRule::new("speak to", T::Talk, A::PathfindAndTalkNpc, 0.9),
        QuestRule::new("report to", T::Talk, A::PathfindAndTalkNpc, 0.9),
        QuestRule::new("deliver", T::Talk, A::PathfindAndTalkNpc, 0.8),
        QuestRule::new("visit", T::Talk, A::PathfindAndTalkNpc, 0.8),
        QuestRule::new("use item", T::UseItem, A::ClickItem, 0.85),
        QuestRule::new("use the", T::UseItem, A::ClickItem, 0.8),
        QuestRule::new("equip", T::UseItem, A::ClickItem, 0.8),
        QuestRule::new("join", T::Join, A::WaitForUser, 0.8),
        QuestRule::new("go to", T::Move, A::ClickQuestPanel, 0.75),
        QuestRule::new("travel to", T::Move, A::ClickQuestPanel, 0.75),
        QuestRule::new("reach", T::Move, A::ClickQuestPanel, 0.7),
        QuestRule::new("move", T::Move, A::PressMovementKeys, 0.7),
        QuestRule::new("walk", T::Move, A::PressMovementKeys, 0.7),
    ]
}

/// First rule whose keyword occurs in `lowered` as whole words
pub fn first_match<'a>(rules: &'a [QuestRule], lowered: &str) -> Option<&'a QuestRule> {
    rules.iter().find(|r| contains_word(lowered, &r.keyword))
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whether `word` occurs in `text` with no word character on either side
fn contains_word(text: &str, word: &str) -> bool {
    if word.is_empty() {
        return false;
    }
    text.match_indices(word).any(|(start, found)| {
        let before = text[..start].chars().next_back();
        let after = text[start + found.len()..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}
