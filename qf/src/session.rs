//! Per-instance session driver
//!
//! One [`FarmSession`] per game instance. The host calls [`FarmSession::tick`]
//! once per frame with what it observed; everything else (learning, command
//! handling, status publishing, store saving) hangs off that call behind
//! timer gates, on the same thread.

use std::time::Duration;

use eyre::{Context, Result};
use patternstore::PatternStore;
use tracing::{debug, info, warn};

use crate::classifier::QuestClassifier;
use crate::classifier::text::{extract_progress, quest_key};
use crate::config::Config;
use crate::domain::{BotState, Observation, QuestAction, QuestType};
use crate::farm::{ActionOutcome, ActionSink, FarmAction, FarmStateMachine, TickSignals, Transition};
use crate::ipc::{ChannelCommand, CommandChannel, HandlerContext, handle_command};
use crate::logging::LogTail;
use crate::status::StatusPublisher;
use crate::timer::TimerGate;

/// What happened during one tick
#[derive(Debug, Default)]
pub struct TickReport {
    pub transition: Option<Transition>,
    /// Consumed command token and the response written for it
    pub command: Option<(String, String)>,
    pub published: bool,
    pub saved: bool,
}

/// Owns all per-instance state
pub struct FarmSession {
    bot: BotState,
    classifier: QuestClassifier,
    machine: FarmStateMachine,
    channel: Option<CommandChannel>,
    channel_gate: TimerGate,
    publisher: Option<StatusPublisher>,
    save_gate: TimerGate,
    log_tail: Option<LogTail>,
    /// Normalized text of the quest the classifier currently holds
    quest_key: String,
    /// Actions performed while the current quest was active
    quest_actions: Vec<QuestAction>,
}

impl FarmSession {
    pub fn new(bot: BotState, classifier: QuestClassifier, machine: FarmStateMachine) -> Self {
        debug!(account = %bot.account_id, "FarmSession::new: called");
        let defaults = Config::default();
        Self {
            bot,
            classifier,
            machine,
            channel: None,
            channel_gate: TimerGate::new(defaults.channel.poll_interval()),
            publisher: None,
            save_gate: TimerGate::new(defaults.patterns.save_interval()),
            log_tail: None,
            quest_key: String::new(),
            quest_actions: Vec::new(),
        }
    }

    /// Build a fully wired session from configuration
    ///
    /// Opens (or creates) the shared pattern store and counts a new session in it.
    pub fn from_config(config: &Config, log_tail: Option<LogTail>) -> Result<Self> {
        debug!(account = %config.account.id, "FarmSession::from_config: called");
        let mut store = PatternStore::open(&config.patterns.path)
            .context(format!("Failed to open pattern store {}", config.patterns.path.display()))?;
        let sessions = store.begin_session();
        info!(
            account = %config.account.id,
            patterns = store.len(),
            sessions,
            "Starting farm session"
        );

        let mut session = Self::new(
            BotState::new(&config.account.id),
            QuestClassifier::new(store),
            FarmStateMachine::new(config.farm.clone()),
        )
        .with_channel(CommandChannel::new(config.account_channel_dir()), config.channel.poll_interval())
        .with_publisher(StatusPublisher::new(config.status_path(), config.status.interval()))
        .with_save_interval(config.patterns.save_interval());
        session.log_tail = log_tail;
        Ok(session)
    }

    pub fn with_channel(mut self, channel: CommandChannel, poll_interval: Duration) -> Self {
        self.channel = Some(channel);
        self.channel_gate = TimerGate::new(poll_interval);
        self
    }

    pub fn with_publisher(mut self, publisher: StatusPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_save_interval(mut self, interval: Duration) -> Self {
        self.save_gate = TimerGate::new(interval);
        self
    }

    pub fn with_log_tail(mut self, tail: LogTail) -> Self {
        self.log_tail = Some(tail);
        self
    }

    pub fn bot(&self) -> &BotState {
        &self.bot
    }

    pub fn bot_mut(&mut self) -> &mut BotState {
        &mut self.bot
    }

    pub fn machine(&self) -> &FarmStateMachine {
        &self.machine
    }

    pub fn classifier(&self) -> &QuestClassifier {
        &self.classifier
    }

    /// Actions performed for the current quest so far
    pub fn quest_actions(&self) -> &[QuestAction] {
        &self.quest_actions
    }

    /// Run one host frame
    pub fn tick(&mut self, obs: &Observation, dt: f32, sink: &mut dyn ActionSink) -> TickReport {
        let mut report = TickReport::default();
        self.bot.apply(obs);
        self.track_quest(&obs.quest_text);

        if self.bot.flags.auto_enabled {
            report.transition = self.run_machine(obs, dt, sink);
        } else {
            report.transition = self.machine.reset("automation disabled");
        }

        if self.channel_gate.tick(dt)
            && let Some((command, token, response)) = self.poll_channel()
        {
            if command.is_mutating()
                && let Some(publisher) = &mut self.publisher
            {
                debug!(%token, "FarmSession::tick: state changed by command, publishing now");
                report.published = publisher.publish(&self.bot, &self.machine);
            }
            report.command = Some((token, response));
        }

        if let Some(publisher) = &mut self.publisher {
            report.published |= publisher.tick(dt, &self.bot, &self.machine);
        }

        if self.save_gate.tick(dt) {
            report.saved = self.save_store();
        }

        report
    }

    /// Final save and snapshot; call once before exiting
    pub fn shutdown(&mut self) {
        info!(
            account = %self.bot.account_id,
            completed = self.machine.counters().quests_completed,
            "Stopping farm session"
        );
        self.save_store();
        if let Some(publisher) = &mut self.publisher {
            publisher.publish(&self.bot, &self.machine);
        }
    }

    /// Feed the learning hook when the quest changes
    fn track_quest(&mut self, quest_text: &str) {
        let key = quest_key(quest_text);
        if key == self.quest_key {
            self.classifier.refresh_progress(quest_text);
            return;
        }
        self.classifier.on_quest_changed(quest_text, &self.quest_actions);
        self.quest_actions.clear();
        self.quest_key = key;
    }

    fn run_machine(&mut self, obs: &Observation, dt: f32, sink: &mut dyn ActionSink) -> Option<Transition> {
        let quest = self.classifier.current();
        let kill_progress = if quest.quest_type == QuestType::Kill {
            extract_progress(&obs.quest_text).filter(|(_, required)| *required > 0)
        } else {
            None
        };
        let signals = TickSignals {
            quest_text: &obs.quest_text,
            quest,
            dialog_open: obs.dialog_open,
            kill_progress,
            collect_active: obs.collect_active,
            stationary: obs.stationary,
            dt,
        };

        let mut gated = SessionSink {
            inner: sink,
            attack_enabled: self.bot.flags.attack_enabled,
            performed: &mut self.quest_actions,
        };
        let transition = self.machine.update(&signals, &mut gated);

        if let Some(t) = &transition
            && t.reason.is_abandonment()
        {
            self.classifier.record_abandoned(&self.quest_actions);
            self.quest_actions.clear();
        }
        transition
    }

    fn poll_channel(&mut self) -> Option<(ChannelCommand, String, String)> {
        let channel = self.channel.as_ref()?;
        let token = channel.try_consume_command()?;
        let command = ChannelCommand::parse(&token);
        let ctx = HandlerContext {
            machine: &self.machine,
            classifier: &self.classifier,
            log_tail: self.log_tail.as_ref(),
        };
        let response = handle_command(&command, &mut self.bot, &ctx);
        channel.respond_to(&token, &response);
        Some((command, token, response))
    }

    fn save_store(&mut self) -> bool {
        match self.classifier.save_if_dirty() {
            Ok(saved) => saved,
            Err(e) => {
                warn!(error = %e, "FarmSession: failed to save pattern store");
                false
            }
        }
    }
}

/// Applies session toggles and records the quest's action summary
struct SessionSink<'s, 'q> {
    inner: &'s mut dyn ActionSink,
    attack_enabled: bool,
    performed: &'q mut Vec<QuestAction>,
}

impl ActionSink for SessionSink<'_, '_> {
    fn invoke(&mut self, action: FarmAction) -> ActionOutcome {
        if !self.attack_enabled && action == FarmAction::Perform(QuestAction::PressSkillKey) {
            debug!("SessionSink: attack disabled, skipping combat");
            return ActionOutcome::NotPerformed;
        }
        let outcome = self.inner.invoke(action);
        if outcome == ActionOutcome::Performed
            && let Some(summary) = action.summary()
        {
            self.performed.push(summary);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FarmConfig;
    use crate::farm::{FarmState, RecordingSink};
    use crate::ipc::{command_path, response_path};
    use crate::status::StatusSnapshot;
    use std::fs;
    use tempfile::TempDir;

    fn session() -> FarmSession {
        FarmSession::new(
            BotState::new("alt-07"),
            QuestClassifier::new(PatternStore::new()),
            FarmStateMachine::new(FarmConfig::default()),
        )
    }

    fn quest(text: &str) -> Observation {
        Observation {
            quest_text: text.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_tick_drives_machine() {
        let mut s = session();
        let mut sink = RecordingSink::default();

        let report = s.tick(&quest("Talk to Elder Wu"), 0.1, &mut sink);

        assert_eq!(report.transition.unwrap().to, FarmState::Pathfinding);
        assert_eq!(s.bot().quest_text, "Talk to Elder Wu");
        assert_eq!(s.quest_actions(), &[QuestAction::PathfindAndTalkNpc]);
    }

    #[test]
    fn test_quest_change_learns_previous_quest() {
        let mut s = session();
        let mut sink = RecordingSink::default();
        s.tick(&quest("Talk to Elder Wu"), 0.1, &mut sink);
        s.tick(&quest("Kill wolves (0/5)"), 0.1, &mut sink);

        let pattern = s.classifier().store().get("talk to").unwrap();
        assert_eq!(pattern.seen_count, 1);
        assert_eq!(pattern.success_rate, 1.0);
        assert_eq!(pattern.actions, vec!["pathfind_and_talk_npc"]);
    }

    #[test]
    fn test_kill_counter_tracks_without_relearning() {
        let mut s = session();
        let mut sink = RecordingSink::default();
        s.tick(&quest("Kill wolves (1/5)"), 0.1, &mut sink);
        s.tick(&quest("Kill wolves (1/5)"), 0.1, &mut sink);
        assert_eq!(s.machine().state(), FarmState::Killing);

        let report = s.tick(&quest("Kill wolves (5/5)"), 0.1, &mut sink);

        assert_eq!(report.transition.unwrap().to, FarmState::Returning);
        assert!(s.classifier().store().is_empty());
        assert_eq!(s.classifier().current().current_count, 5);
    }

    #[test]
    fn test_auto_disabled_resets_and_stops() {
        let mut s = session();
        let mut sink = RecordingSink::default();
        s.tick(&quest("Talk to Elder Wu"), 0.1, &mut sink);
        s.bot_mut().toggle_auto();
        sink.actions.clear();

        let report = s.tick(&quest("Talk to Elder Wu"), 0.1, &mut sink);
        assert_eq!(report.transition.unwrap().to, FarmState::Idle);

        assert!(s.tick(&quest("Talk to Elder Wu"), 0.1, &mut sink).transition.is_none());
        assert_eq!(s.machine().state(), FarmState::Idle);
        assert!(sink.actions.is_empty());
    }

    #[test]
    fn test_attack_disabled_blocks_combat() {
        let mut s = session();
        let mut sink = RecordingSink::default();
        s.bot_mut().toggle_attack();
        s.tick(&quest("Kill wolves (1/5)"), 0.1, &mut sink);
        sink.actions.clear();

        s.tick(&quest("Kill wolves (1/5)"), 0.1, &mut sink);

        assert_eq!(s.machine().state(), FarmState::Killing);
        assert!(sink.actions.is_empty());
        assert_eq!(s.machine().counters().actions_not_performed, 1);
    }

    #[test]
    fn test_timeout_records_abandonment() {
        let mut s = FarmSession::new(
            BotState::new("alt-07"),
            QuestClassifier::new(PatternStore::new()),
            FarmStateMachine::new(FarmConfig {
                state_timeout_secs: 1.0,
                ..FarmConfig::default()
            }),
        );
        let mut sink = RecordingSink::default();
        s.tick(&quest("Go to the harbor"), 0.1, &mut sink);

        let report = s.tick(&quest("Go to the harbor"), 1.0, &mut sink);

        assert!(report.transition.unwrap().reason.is_abandonment());
        let pattern = s.classifier().store().get("go to").unwrap();
        assert_eq!(pattern.success_rate, 0.0);
        assert!(s.quest_actions().is_empty());
    }

    #[test]
    fn test_channel_command_answered_on_poll() {
        let temp = TempDir::new().unwrap();
        let mut s = session().with_channel(CommandChannel::new(temp.path()), Duration::from_millis(500));
        let mut sink = RecordingSink::default();
        fs::write(command_path(temp.path()), "toggle auto\n").unwrap();

        assert!(s.tick(&quest(""), 0.2, &mut sink).command.is_none());
        let report = s.tick(&quest(""), 0.3, &mut sink);

        let (token, response) = report.command.unwrap();
        assert_eq!(token, "toggle auto");
        assert_eq!(response, "auto: off");
        assert_eq!(fs::read_to_string(response_path(temp.path())).unwrap(), "auto: off");
        assert!(!s.bot().flags.auto_enabled);

        // consumed: not processed again
        assert!(s.tick(&quest(""), 0.5, &mut sink).command.is_none());
        assert!(!s.bot().flags.auto_enabled);
    }

    #[test]
    fn test_mutating_command_publishes_immediately() {
        let temp = TempDir::new().unwrap();
        let status = temp.path().join("status.json");
        let mut s = session()
            .with_channel(CommandChannel::new(temp.path()), Duration::from_millis(100))
            .with_publisher(StatusPublisher::new(&status, Duration::from_secs(60)));
        let mut sink = RecordingSink::default();

        assert!(s.tick(&quest(""), 0.05, &mut sink).published);
        assert!(StatusSnapshot::load(&status).unwrap().flags.attack_enabled);

        fs::write(command_path(temp.path()), "toggle attack").unwrap();
        let report = s.tick(&quest(""), 0.2, &mut sink);
        assert_eq!(report.command.unwrap().1, "attack: off");
        assert!(report.published);
        assert!(!StatusSnapshot::load(&status).unwrap().flags.attack_enabled);

        fs::write(command_path(temp.path()), "status").unwrap();
        let report = s.tick(&quest(""), 0.2, &mut sink);
        assert!(report.command.is_some());
        assert!(!report.published);
    }

    #[test]
    fn test_store_saved_on_interval() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("patterns.json");
        let store = PatternStore::open(&path).unwrap();
        let mut s = FarmSession::new(
            BotState::new("alt-07"),
            QuestClassifier::new(store),
            FarmStateMachine::new(FarmConfig::default()),
        )
        .with_save_interval(Duration::from_secs(1));
        let mut sink = RecordingSink::default();

        s.tick(&quest("Talk to Elder Wu"), 0.5, &mut sink);
        let report = s.tick(&quest("Slay imps"), 0.5, &mut sink);

        assert!(report.saved);
        let reloaded = PatternStore::load(&path).unwrap();
        assert_eq!(reloaded.get("talk to").unwrap().seen_count, 1);
    }

    #[test]
    fn test_from_config_wires_everything() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.account.id = "alt-07".to_string();
        config.channel.dir = temp.path().join("channel");
        config.patterns.path = temp.path().join("patterns.json");

        let mut s = FarmSession::from_config(&config, Some(LogTail::new(10))).unwrap();
        let mut sink = RecordingSink::default();
        let report = s.tick(&quest("Talk to Elder Wu"), 0.1, &mut sink);

        assert!(report.published);
        assert!(config.status_path().exists());
        assert_eq!(s.classifier().store().total_sessions(), 1);

        s.shutdown();
        assert!(config.patterns.path.exists());
    }
}
