//! Quest classifier
//!
//! Turns raw quest text into a [`QuestInfo`]: rule table first, then the
//! pattern store, then a low-confidence fallback so the caller always has
//! something to do.

mod oracle;
mod rules;
pub mod text;

use eyre::Result;
use patternstore::{PatternStore, QuestPattern};
use tracing::{debug, info, trace, warn};

use crate::domain::{ClassificationSource, QuestAction, QuestInfo, QuestType};

pub use oracle::{CompletionOracle, CompletionVerdict, TextChangeOracle};
pub use rules::{FALLBACK_CONFIDENCE, LEARNED_CONFIDENCE_CAP, QuestRule, default_rules, first_match};

/// Rule-based quest classifier with an online learning store
pub struct QuestClassifier {
    rules: Vec<QuestRule>,
    store: PatternStore,
    oracle: Box<dyn CompletionOracle>,
    /// Classification of the quest currently in the slot
    current: QuestInfo,
}

impl QuestClassifier {
    /// Create a classifier with the built-in rules and the text-change oracle
    pub fn new(store: PatternStore) -> Self {
        debug!(patterns = store.len(), "QuestClassifier::new: called");
        Self {
            rules: default_rules(),
            store,
            oracle: Box::new(TextChangeOracle),
            current: QuestInfo::empty(),
        }
    }

    /// Replace the rule table
    pub fn with_rules(mut self, rules: Vec<QuestRule>) -> Self {
        debug!(count = rules.len(), "QuestClassifier::with_rules: called");
        self.rules = rules;
        self
    }

    /// Replace the completion oracle
    pub fn with_oracle(mut self, oracle: Box<dyn CompletionOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    /// Classify a quest text
    pub fn classify(&self, quest_text: &str) -> QuestInfo {
        if quest_text.trim().is_empty() {
            return QuestInfo::empty();
        }

        let clean = text::strip_markup(quest_text);
        let lowered = clean.to_lowercase();
        let (current_count, required_count) = text::extract_progress(quest_text).unwrap_or((0, 0));

        let mut info = QuestInfo {
            quest_text: quest_text.to_string(),
            current_count,
            required_count,
            ..QuestInfo::default()
        };

        if let Some(rule) = first_match(&self.rules, &lowered) {
            info.quest_type = rule.quest_type;
            info.action = rule.action;
            info.confidence = rule.confidence;
            info.matched_keyword = rule.keyword.clone();
            info.target = text::extract_target(&clean, &rule.keyword, rule.quest_type);
            info.source = ClassificationSource::Rule;
            trace!(keyword = %rule.keyword, quest_type = %rule.quest_type, "QuestClassifier::classify: rule match");
            return info;
        }

        if let Some((pattern, quest_type)) = self.learned_match(quest_text) {
            info.quest_type = quest_type;
            info.action = quest_type.default_action();
            info.confidence = (pattern.success_rate as f32).min(LEARNED_CONFIDENCE_CAP);
            info.matched_keyword = pattern.keyword.clone();
            info.source = ClassificationSource::Learned;
            trace!(keyword = %pattern.keyword, %quest_type, "QuestClassifier::classify: learned match");
            return info;
        }

        info.quest_type = QuestType::Unknown;
        info.action = QuestAction::ClickQuestPanel;
        info.confidence = FALLBACK_CONFIDENCE;
        info.source = ClassificationSource::Fallback;
        trace!("QuestClassifier::classify: fallback");
        info
    }

    /// Established pattern for `quest_text`, unless it does worse than the fallback would
    fn learned_match(&self, quest_text: &str) -> Option<(&QuestPattern, QuestType)> {
        let pattern = self.store.lookup(&text::quest_key(quest_text))?;
        if (pattern.success_rate as f32) < FALLBACK_CONFIDENCE {
            trace!(keyword = %pattern.keyword, rate = pattern.success_rate, "QuestClassifier::learned_match: below fallback");
            return None;
        }
        match pattern.inferred_type.parse::<QuestType>() {
            Ok(QuestType::Unknown) => None,
            Ok(quest_type) => Some((pattern, quest_type)),
            Err(e) => {
                warn!(keyword = %pattern.keyword, error = %e, "Ignoring pattern with unreadable type");
                None
            }
        }
    }

    /// Classification of the quest currently held
    pub fn current(&self) -> &QuestInfo {
        &self.current
    }

    /// Learning hook: the quest text changed since the previous tick
    ///
    /// Judges the previous quest with the oracle, records the verdict in the
    /// store and makes `new_text` the current quest.
    pub fn on_quest_changed(&mut self, new_text: &str, actions_taken: &[QuestAction]) -> CompletionVerdict {
        let verdict = self.oracle.judge(&self.current, new_text);
        debug!(?verdict, previous = %self.current.quest_text, new = %new_text, "QuestClassifier::on_quest_changed: called");

        match verdict {
            CompletionVerdict::Completed => self.learn(actions_taken, true),
            CompletionVerdict::Failed => self.learn(actions_taken, false),
            CompletionVerdict::Unknown => {}
        }

        self.current = self.classify(new_text);
        verdict
    }

    /// Refresh the current quest's raw text and counters without re-classifying
    ///
    /// For ticks where only the progress counter moved.
    pub fn refresh_progress(&mut self, quest_text: &str) {
        if self.current.is_empty() || self.current.quest_text == quest_text {
            return;
        }
        let (current_count, required_count) = text::extract_progress(quest_text).unwrap_or((0, 0));
        self.current.quest_text = quest_text.to_string();
        self.current.current_count = current_count;
        self.current.required_count = required_count;
    }

    /// Record a failure for the current quest after the state machine gave up on it
    pub fn record_abandoned(&mut self, actions_taken: &[QuestAction]) {
        if self.current.is_empty() {
            return;
        }
        debug!(quest = %self.current.quest_text, "QuestClassifier::record_abandoned: called");
        self.learn(actions_taken, false);
    }

    fn learn(&mut self, actions_taken: &[QuestAction], success: bool) {
        let Some(keyword) = learning_keyword(&self.current) else {
            return;
        };
        let quest_type = infer_type(&self.current, actions_taken);
        if quest_type == QuestType::Unknown {
            debug!(%keyword, "QuestClassifier::learn: type could not be inferred, skipping");
            return;
        }

        let actions: Vec<&str> = actions_taken.iter().map(|a| a.as_str()).collect();
        let pattern = self.store.record(&keyword, quest_type.as_str(), &actions, success);
        info!(
            keyword = %pattern.keyword,
            quest_type = %pattern.inferred_type,
            success,
            rate = pattern.success_rate,
            seen = pattern.seen_count,
            "Learned quest outcome"
        );
    }

    pub fn store(&self) -> &PatternStore {
        &self.store
    }

    /// Persist the store if it has unsaved changes
    pub fn save_if_dirty(&mut self) -> Result<bool> {
        if !self.store.is_dirty() || self.store.path().is_none() {
            return Ok(false);
        }
        self.store.save()?;
        Ok(true)
    }
}

/// Keyword under which a quest's outcome is learned
fn learning_keyword(info: &QuestInfo) -> Option<String> {
    if info.is_empty() {
        return None;
    }
    if !info.matched_keyword.is_empty() {
        return Some(info.matched_keyword.clone());
    }
    text::signature(&info.quest_text)
}

/// The classified type, or a guess from what was done while the quest was active
fn infer_type(info: &QuestInfo, actions_taken: &[QuestAction]) -> QuestType {
    if info.quest_type != QuestType::Unknown {
        return info.quest_type;
    }
    let took = |wanted: &[QuestAction]| actions_taken.iter().any(|a| wanted.contains(a));
    if took(&[QuestAction::WaitForKill, QuestAction::PressSkillKey]) {
        QuestType::Kill
    } else if took(&[QuestAction::ClickItem]) {
        QuestType::Collect
    } else if took(&[QuestAction::PathfindAndTalkNpc]) {
        QuestType::Talk
    } else if took(&[QuestAction::PressMovementKeys]) {
        QuestType::Move
    } else {
        QuestType::Unknown
    }
}
