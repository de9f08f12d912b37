//! Farm state machine
//!
//! Sequences quest progress through pathfinding, dialog, combat and
//! collection phases. Driven one tick at a time by the host; never blocks,
//! never sleeps, never fails. Stalls are handled by bounded stuck retries and
//! per-state time budgets, both measured in accumulated tick time.

use tracing::{debug, info, trace};

use super::actions::{ActionOutcome, ActionSink, FarmAction};
use super::state::{FarmCounters, FarmState, Transition, TransitionReason};
use crate::classifier::text::quest_key;
use crate::config::FarmConfig;
use crate::domain::{QuestAction, QuestInfo};

/// Everything the machine reads on one tick
#[derive(Debug, Clone, Copy)]
pub struct TickSignals<'a> {
    /// Raw quest text, possibly empty
    pub quest_text: &'a str,
    /// Classification of `quest_text`
    pub quest: &'a QuestInfo,
    pub dialog_open: bool,
    /// `(current, required)` while a kill quest is active
    pub kill_progress: Option<(u32, u32)>,
    pub collect_active: bool,
    /// Avatar has not moved since the previous tick
    pub stationary: bool,
    /// Seconds since the previous tick
    pub dt: f32,
}

struct Next {
    to: FarmState,
    reason: TransitionReason,
    completes: bool,
}

impl Next {
    fn to(to: FarmState, reason: TransitionReason) -> Self {
        let completes = reason == TransitionReason::QuestCompleted;
        Self { to, reason, completes }
    }
}

/// The quest-automation control loop
#[derive(Debug)]
pub struct FarmStateMachine {
    config: FarmConfig,
    state: FarmState,
    state_time: f32,
    stuck_time: f32,
    dialog_time: f32,
    /// Normalized quest text recorded on entering Pathfinding
    snapshot: String,
    retries: u32,
    counters: FarmCounters,
}

impl FarmStateMachine {
    pub fn new(config: FarmConfig) -> Self {
        debug!(?config, "FarmStateMachine::new: called");
        Self {
            config,
            state: FarmState::Idle,
            state_time: 0.0,
            stuck_time: 0.0,
            dialog_time: 0.0,
            snapshot: String::new(),
            retries: 0,
            counters: FarmCounters::default(),
        }
    }

    pub fn state(&self) -> FarmState {
        self.state
    }

    pub fn counters(&self) -> &FarmCounters {
        &self.counters
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Seconds spent in the current state
    pub fn state_time(&self) -> f32 {
        self.state_time
    }

    pub fn stuck_time(&self) -> f32 {
        self.stuck_time
    }

    /// Normalized quest text captured on the last Pathfinding entry
    pub fn snapshot(&self) -> &str {
        &self.snapshot
    }

    pub fn config(&self) -> &FarmConfig {
        &self.config
    }

    /// Advance one tick
    ///
    /// Returns the transition taken, if any. Entry actions of the new state
    /// are issued through `sink` before returning.
    pub fn update(&mut self, signals: &TickSignals<'_>, sink: &mut dyn ActionSink) -> Option<Transition> {
        let dt = signals.dt.max(0.0);
        self.counters.session_secs += f64::from(dt);
        self.state_time += dt;

        if self.state.tracks_stuck() {
            if signals.stationary {
                self.stuck_time += dt;
            } else {
                self.stuck_time = 0.0;
            }
        }

        let key = quest_key(signals.quest_text);
        let next = match self.state {
            FarmState::Idle => self.from_idle(&key),
            FarmState::Pathfinding => self.from_pathfinding(signals, &key, sink),
            FarmState::TalkingNpc => self.from_talking(signals, &key),
            FarmState::Killing => self.from_killing(signals, &key),
            FarmState::Collecting => self.from_collecting(signals, &key),
            FarmState::Returning => self.from_returning(signals, sink),
            FarmState::TurningIn => self.from_turning_in(signals, &key),
        };

        match next {
            Some(next) => {
                let transition = self.apply(next, &key);
                self.enter(signals.quest, sink);
                Some(transition)
            }
            None => {
                if self.state.in_dialog() && signals.dialog_open {
                    self.dialog_time += dt;
                    if self.dialog_time >= self.config.dialog_advance_secs {
                        self.dialog_time = 0.0;
                        self.invoke(sink, FarmAction::AdvanceDialog);
                    }
                }
                None
            }
        }
    }

    /// Force the machine back to Idle
    pub fn reset(&mut self, reason: &str) -> Option<Transition> {
        if self.state == FarmState::Idle {
            return None;
        }
        let next = Next::to(
            FarmState::Idle,
            TransitionReason::Reset {
                reason: reason.to_string(),
            },
        );
        Some(self.apply(next, ""))
    }

    fn from_idle(&self, key: &str) -> Option<Next> {
        if key.is_empty() {
            return None;
        }
        Some(Next::to(FarmState::Pathfinding, TransitionReason::QuestAssigned))
    }

    fn from_pathfinding(&mut self, s: &TickSignals<'_>, key: &str, sink: &mut dyn ActionSink) -> Option<Next> {
        if s.dialog_open {
            return Some(Next::to(FarmState::TalkingNpc, TransitionReason::DialogOpened));
        }
        if let Some((current, required)) = s.kill_progress
            && current < required
        {
            return Some(Next::to(FarmState::Killing, TransitionReason::KillProgress));
        }
        if s.collect_active {
            return Some(Next::to(FarmState::Collecting, TransitionReason::CollectActive));
        }
        if key.is_empty() {
            return Some(Next::to(FarmState::Idle, TransitionReason::QuestCompleted));
        }
        if key != self.snapshot {
            return Some(Next {
                completes: true,
                ..Next::to(FarmState::Pathfinding, TransitionReason::QuestChanged)
            });
        }
        self.check_timeout().or_else(|| self.check_stuck(sink))
    }

    fn from_talking(&self, s: &TickSignals<'_>, key: &str) -> Option<Next> {
        if !s.dialog_open {
            let next = if key.is_empty() {
                Next::to(FarmState::Idle, TransitionReason::QuestCompleted)
            } else if key != self.snapshot {
                Next::to(FarmState::Pathfinding, TransitionReason::QuestChanged)
            } else {
                Next::to(FarmState::Pathfinding, TransitionReason::DialogClosed)
            };
            return Some(next);
        }
        self.check_timeout()
    }

    fn from_killing(&self, s: &TickSignals<'_>, key: &str) -> Option<Next> {
        if s.dialog_open {
            return Some(Next::to(FarmState::TalkingNpc, TransitionReason::DialogOpened));
        }
        match s.kill_progress {
            Some((current, required)) if current >= required => {
                return Some(Next::to(FarmState::Returning, TransitionReason::KillComplete));
            }
            None if key != self.snapshot => {
                return Some(Next::to(FarmState::Pathfinding, TransitionReason::QuestChanged));
            }
            _ => {}
        }
        self.check_timeout()
    }

    fn from_collecting(&self, s: &TickSignals<'_>, key: &str) -> Option<Next> {
        if s.dialog_open {
            return Some(Next::to(FarmState::TalkingNpc, TransitionReason::DialogOpened));
        }
        if key.is_empty() {
            return Some(Next::to(FarmState::Idle, TransitionReason::QuestCompleted));
        }
        if key != self.snapshot {
            return Some(Next::to(FarmState::Pathfinding, TransitionReason::QuestChanged));
        }
        self.check_timeout()
    }

    fn from_returning(&mut self, s: &TickSignals<'_>, sink: &mut dyn ActionSink) -> Option<Next> {
        if s.dialog_open {
            return Some(Next::to(FarmState::TurningIn, TransitionReason::DialogOpened));
        }
        self.check_timeout().or_else(|| self.check_stuck(sink))
    }

    fn from_turning_in(&self, s: &TickSignals<'_>, key: &str) -> Option<Next> {
        if !s.dialog_open {
            let next = if key.is_empty() || key != self.snapshot {
                Next::to(FarmState::Idle, TransitionReason::QuestCompleted)
            } else {
                Next::to(FarmState::Pathfinding, TransitionReason::DialogClosed)
            };
            return Some(next);
        }
        self.check_timeout()
    }

    /// Time budget for the current state
    fn budget(&self) -> f32 {
        match self.state {
            FarmState::Killing => self.config.state_timeout_secs * 2.0,
            _ => self.config.state_timeout_secs,
        }
    }

    fn check_timeout(&self) -> Option<Next> {
        let budget = self.budget();
        if self.state_time < budget {
            return None;
        }
        Some(Next::to(
            FarmState::Idle,
            TransitionReason::Timeout {
                budget_secs: budget.round() as u32,
            },
        ))
    }

    fn check_stuck(&mut self, sink: &mut dyn ActionSink) -> Option<Next> {
        if self.stuck_time < self.config.stuck_timeout_secs {
            return None;
        }
        if self.retries < self.config.max_retries {
            self.retries += 1;
            self.counters.retries_issued += 1;
            self.stuck_time = 0.0;
            info!(
                state = %self.state,
                retry = self.retries,
                max = self.config.max_retries,
                "FarmStateMachine: stuck, retrying pathfind"
            );
            self.invoke(sink, FarmAction::RetryPathfind);
            return None;
        }
        Some(Next::to(
            FarmState::Idle,
            TransitionReason::StuckGaveUp { retries: self.retries },
        ))
    }

    fn apply(&mut self, next: Next, key: &str) -> Transition {
        let from = self.state;
        self.state = next.to;
        self.state_time = 0.0;
        self.stuck_time = 0.0;
        self.dialog_time = 0.0;
        self.retries = 0;

        match next.to {
            FarmState::Pathfinding => self.snapshot = key.to_string(),
            FarmState::Idle => self.snapshot.clear(),
            _ => {}
        }

        self.counters.transitions += 1;
        if next.completes {
            self.counters.quests_completed += 1;
        }

        info!(
            "{} -> {} | {} | completed={} transitions={} session={:.0}s",
            from,
            next.to,
            next.reason,
            self.counters.quests_completed,
            self.counters.transitions,
            self.counters.session_secs
        );

        Transition {
            from,
            to: next.to,
            reason: next.reason,
        }
    }

    fn enter(&mut self, quest: &QuestInfo, sink: &mut dyn ActionSink) {
        let action = match self.state {
            FarmState::Idle => None,
            FarmState::Pathfinding => pathfind_action(quest.action).map(FarmAction::Perform),
            FarmState::TalkingNpc | FarmState::TurningIn => Some(FarmAction::AdvanceDialog),
            FarmState::Killing => Some(FarmAction::Perform(QuestAction::PressSkillKey)),
            FarmState::Collecting => Some(FarmAction::Perform(QuestAction::ClickItem)),
            FarmState::Returning => Some(FarmAction::Perform(QuestAction::ClickQuestPanel)),
        };
        if let Some(action) = action {
            self.invoke(sink, action);
        }
    }

    fn invoke(&mut self, sink: &mut dyn ActionSink, action: FarmAction) {
        match sink.invoke(action) {
            ActionOutcome::Performed => trace!(%action, state = %self.state, "FarmStateMachine::invoke: performed"),
            ActionOutcome::NotPerformed => {
                self.counters.actions_not_performed += 1;
                debug!(%action, state = %self.state, "FarmStateMachine::invoke: not performed");
            }
        }
    }
}

/// What to do on entering Pathfinding for a quest's action
///
/// Kill quests travel through the quest panel; quests that wait on the user
/// issue nothing and rely on the state budget.
fn pathfind_action(action: QuestAction) -> Option<QuestAction> {
    match action {
        QuestAction::None | QuestAction::WaitForUser => None,
        QuestAction::WaitForKill => Some(QuestAction::ClickQuestPanel),
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::QuestClassifier;
    use crate::farm::RecordingSink;
    use patternstore::PatternStore;

    struct Frame {
        text: String,
        quest: QuestInfo,
        dialog_open: bool,
        collect_active: bool,
        stationary: bool,
        dt: f32,
    }

    impl Frame {
        fn new(text: &str) -> Self {
            let classifier = QuestClassifier::new(PatternStore::new());
            Self {
                text: text.to_string(),
                quest: classifier.classify(text),
                dialog_open: false,
                collect_active: false,
                stationary: false,
                dt: 0.1,
            }
        }

        fn dialog(mut self) -> Self {
            self.dialog_open = true;
            self
        }

        fn collecting(mut self) -> Self {
            self.collect_active = true;
            self
        }

        fn stationary(mut self) -> Self {
            self.stationary = true;
            self
        }

        fn dt(mut self, dt: f32) -> Self {
            self.dt = dt;
            self
        }

        fn signals(&self) -> TickSignals<'_> {
            TickSignals {
                quest_text: &self.text,
                quest: &self.quest,
                dialog_open: self.dialog_open,
                kill_progress: self.quest.kill_progress(),
                collect_active: self.collect_active,
                stationary: self.stationary,
                dt: self.dt,
            }
        }
    }

    fn machine() -> FarmStateMachine {
        FarmStateMachine::new(FarmConfig::default())
    }

    fn step(machine: &mut FarmStateMachine, sink: &mut RecordingSink, frame: &Frame) -> Option<Transition> {
        machine.update(&frame.signals(), sink)
    }

    /// Machine already in Pathfinding for `text`
    fn pathfinding(text: &str) -> (FarmStateMachine, RecordingSink) {
        let mut m = machine();
        let mut sink = RecordingSink::default();
        step(&mut m, &mut sink, &Frame::new(text));
        assert_eq!(m.state(), FarmState::Pathfinding);
        sink.actions.clear();
        (m, sink)
    }

    #[test]
    fn test_idle_without_quest_stays_idle() {
        let mut m = machine();
        let mut sink = RecordingSink::default();
        assert!(step(&mut m, &mut sink, &Frame::new("")).is_none());
        assert!(step(&mut m, &mut sink, &Frame::new("   ")).is_none());
        assert_eq!(m.state(), FarmState::Idle);
        assert!(sink.actions.is_empty());
    }

    #[test]
    fn test_idle_with_quest_starts_pathfinding() {
        let mut m = machine();
        let mut sink = RecordingSink::default();

        let transition = step(&mut m, &mut sink, &Frame::new("Talk to <b>Elder Wu</b>")).unwrap();

        assert_eq!(transition.from, FarmState::Idle);
        assert_eq!(transition.to, FarmState::Pathfinding);
        assert_eq!(transition.reason, TransitionReason::QuestAssigned);
        assert_eq!(m.snapshot(), "talk to elder wu");
        assert_eq!(
            sink.actions,
            vec![FarmAction::Perform(QuestAction::PathfindAndTalkNpc)]
        );
    }

    #[test]
    fn test_kill_quest_pathfinds_through_panel() {
        let mut m = machine();
        let mut sink = RecordingSink::default();
        step(&mut m, &mut sink, &Frame::new("Slay imps"));
        assert_eq!(sink.actions, vec![FarmAction::Perform(QuestAction::ClickQuestPanel)]);
    }

    #[test]
    fn test_join_quest_issues_nothing() {
        let mut m = machine();
        let mut sink = RecordingSink::default();
        step(&mut m, &mut sink, &Frame::new("Join a guild"));
        assert_eq!(m.state(), FarmState::Pathfinding);
        assert!(sink.actions.is_empty());
    }

    #[test]
    fn test_dialog_has_priority() {
        let (mut m, mut sink) = pathfinding("Kill wolves (1/5)");

        let frame = Frame::new("Kill wolves (1/5)").dialog().collecting();
        let transition = step(&mut m, &mut sink, &frame).unwrap();

        assert_eq!(transition.to, FarmState::TalkingNpc);
        assert_eq!(sink.actions, vec![FarmAction::AdvanceDialog]);
    }

    #[test]
    fn test_kill_progress_enters_killing() {
        let (mut m, mut sink) = pathfinding("Kill wolves (1/5)");

        let transition = step(&mut m, &mut sink, &Frame::new("Kill wolves (1/5)")).unwrap();

        assert_eq!(transition.to, FarmState::Killing);
        assert_eq!(sink.actions, vec![FarmAction::Perform(QuestAction::PressSkillKey)]);
    }

    #[test]
    fn test_kill_counter_is_not_quest_change() {
        let (mut m, mut sink) = pathfinding("Kill wolves (1/5)");
        step(&mut m, &mut sink, &Frame::new("Kill wolves (1/5)"));

        assert!(step(&mut m, &mut sink, &Frame::new("Kill wolves (2/5)")).is_none());
        assert!(step(&mut m, &mut sink, &Frame::new("Kill wolves (4/5)")).is_none());
        assert_eq!(m.state(), FarmState::Killing);
    }

    #[test]
    fn test_kill_target_reached_returns() {
        let (mut m, mut sink) = pathfinding("Kill wolves (4/5)");
        step(&mut m, &mut sink, &Frame::new("Kill wolves (4/5)"));
        sink.actions.clear();

        let transition = step(&mut m, &mut sink, &Frame::new("Kill wolves (5/5)")).unwrap();

        assert_eq!(transition.from, FarmState::Killing);
        assert_eq!(transition.to, FarmState::Returning);
        assert_eq!(transition.reason, TransitionReason::KillComplete);
        assert_eq!(sink.actions, vec![FarmAction::Perform(QuestAction::ClickQuestPanel)]);
    }

    #[test]
    fn test_killing_quest_changed_without_counter() {
        let (mut m, mut sink) = pathfinding("Kill wolves (1/5)");
        step(&mut m, &mut sink, &Frame::new("Kill wolves (1/5)"));

        let transition = step(&mut m, &mut sink, &Frame::new("Talk to the ranger")).unwrap();
        assert_eq!(transition.to, FarmState::Pathfinding);
        assert_eq!(m.snapshot(), "talk to the ranger");
    }

    #[test]
    fn test_collect_flag_enters_collecting() {
        let (mut m, mut sink) = pathfinding("Gather herbs");

        let transition = step(&mut m, &mut sink, &Frame::new("Gather herbs").collecting()).unwrap();

        assert_eq!(transition.to, FarmState::Collecting);
        assert_eq!(sink.actions, vec![FarmAction::Perform(QuestAction::ClickItem)]);

        let transition = step(&mut m, &mut sink, &Frame::new("")).unwrap();
        assert_eq!(transition.to, FarmState::Idle);
        assert_eq!(m.counters().quests_completed, 1);
    }

    #[test]
    fn test_collecting_quest_changed_pathfinds() {
        let (mut m, mut sink) = pathfinding("Gather herbs");
        step(&mut m, &mut sink, &Frame::new("Gather herbs").collecting());
        sink.actions.clear();

        let transition = step(&mut m, &mut sink, &Frame::new("Talk to the herbalist")).unwrap();

        assert_eq!(transition.from, FarmState::Collecting);
        assert_eq!(transition.to, FarmState::Pathfinding);
        assert_eq!(transition.reason, TransitionReason::QuestChanged);
        assert_eq!(m.snapshot(), "talk to the herbalist");
        assert_eq!(m.counters().quests_completed, 0);
        assert_eq!(sink.actions, vec![FarmAction::Perform(QuestAction::PathfindAndTalkNpc)]);
    }

    #[test]
    fn test_pathfinding_quest_emptied_completes() {
        let (mut m, mut sink) = pathfinding("Go to the harbor");

        let transition = step(&mut m, &mut sink, &Frame::new("")).unwrap();

        assert_eq!(transition.to, FarmState::Idle);
        assert_eq!(transition.reason, TransitionReason::QuestCompleted);
        assert_eq!(m.counters().quests_completed, 1);
        assert_eq!(m.snapshot(), "");
    }

    #[test]
    fn test_pathfinding_quest_changed_restarts() {
        let (mut m, mut sink) = pathfinding("Go to the harbor");

        let transition = step(&mut m, &mut sink, &Frame::new("Talk to the harbor master")).unwrap();

        assert_eq!(transition.from, FarmState::Pathfinding);
        assert_eq!(transition.to, FarmState::Pathfinding);
        assert_eq!(transition.reason, TransitionReason::QuestChanged);
        assert_eq!(m.counters().quests_completed, 1);
        assert_eq!(m.snapshot(), "talk to the harbor master");
        assert_eq!(sink.actions, vec![FarmAction::Perform(QuestAction::PathfindAndTalkNpc)]);
    }

    #[test]
    fn test_dialog_closed_unchanged_resumes_pathfinding() {
        let (mut m, mut sink) = pathfinding("Talk to Elder Wu");
        step(&mut m, &mut sink, &Frame::new("Talk to Elder Wu").dialog());
        sink.actions.clear();

        let transition = step(&mut m, &mut sink, &Frame::new("Talk to Elder Wu")).unwrap();

        assert_eq!(transition.to, FarmState::Pathfinding);
        assert_eq!(transition.reason, TransitionReason::DialogClosed);
        assert_eq!(m.counters().quests_completed, 0);
        assert_eq!(sink.actions, vec![FarmAction::Perform(QuestAction::PathfindAndTalkNpc)]);
    }

    #[test]
    fn test_dialog_closed_empty_completes() {
        let (mut m, mut sink) = pathfinding("Talk to Elder Wu");
        step(&mut m, &mut sink, &Frame::new("Talk to Elder Wu").dialog());

        let transition = step(&mut m, &mut sink, &Frame::new("")).unwrap();

        assert_eq!(transition.from, FarmState::TalkingNpc);
        assert_eq!(transition.to, FarmState::Idle);
        assert_eq!(m.counters().quests_completed, 1);
    }

    #[test]
    fn test_dialog_readvanced_while_open() {
        let (mut m, mut sink) = pathfinding("Talk to Elder Wu");
        step(&mut m, &mut sink, &Frame::new("Talk to Elder Wu").dialog());
        assert_eq!(sink.actions, vec![FarmAction::AdvanceDialog]);

        let open = Frame::new("Talk to Elder Wu").dialog().dt(0.4);
        step(&mut m, &mut sink, &open);
        step(&mut m, &mut sink, &open);
        assert_eq!(sink.actions.len(), 1);

        step(&mut m, &mut sink, &open);
        assert_eq!(sink.actions, vec![FarmAction::AdvanceDialog, FarmAction::AdvanceDialog]);
        assert_eq!(m.state(), FarmState::TalkingNpc);
    }

    #[test]
    fn test_turn_in_completes_quest() {
        let (mut m, mut sink) = pathfinding("Kill wolves (4/5)");
        step(&mut m, &mut sink, &Frame::new("Kill wolves (4/5)"));
        step(&mut m, &mut sink, &Frame::new("Kill wolves (5/5)"));
        assert_eq!(m.state(), FarmState::Returning);

        let transition = step(&mut m, &mut sink, &Frame::new("Kill wolves (5/5)").dialog()).unwrap();
        assert_eq!(transition.to, FarmState::TurningIn);

        let transition = step(&mut m, &mut sink, &Frame::new("Talk to the ranger")).unwrap();
        assert_eq!(transition.from, FarmState::TurningIn);
        assert_eq!(transition.to, FarmState::Idle);
        assert_eq!(m.counters().quests_completed, 1);
    }

    #[test]
    fn test_turn_in_unchanged_resumes_pathfinding() {
        let (mut m, mut sink) = pathfinding("Kill wolves (4/5)");
        step(&mut m, &mut sink, &Frame::new("Kill wolves (4/5)"));
        step(&mut m, &mut sink, &Frame::new("Kill wolves (5/5)"));
        step(&mut m, &mut sink, &Frame::new("Kill wolves (5/5)").dialog());
        assert_eq!(m.state(), FarmState::TurningIn);
        sink.actions.clear();

        let transition = step(&mut m, &mut sink, &Frame::new("Kill wolves (5/5)")).unwrap();

        assert_eq!(transition.to, FarmState::Pathfinding);
        assert_eq!(transition.reason, TransitionReason::DialogClosed);
        assert_eq!(m.counters().quests_completed, 0);
        assert_eq!(sink.actions, vec![FarmAction::Perform(QuestAction::ClickQuestPanel)]);
    }

    #[test]
    fn test_finished_counter_does_not_enter_killing() {
        let (mut m, mut sink) = pathfinding("Kill wolves (5/5)");
        assert!(step(&mut m, &mut sink, &Frame::new("Kill wolves (5/5)")).is_none());
        assert_eq!(m.state(), FarmState::Pathfinding);
    }

    #[test]
    fn test_stuck_retries_then_gives_up() {
        let config = FarmConfig {
            stuck_timeout_secs: 1.0,
            max_retries: 3,
            ..FarmConfig::default()
        };
        let mut m = FarmStateMachine::new(config);
        let mut sink = RecordingSink::default();
        step(&mut m, &mut sink, &Frame::new("Go to the harbor"));
        sink.actions.clear();

        let frame = Frame::new("Go to the harbor").stationary().dt(0.5);
        let mut last = None;
        for _ in 0..8 {
            last = step(&mut m, &mut sink, &frame);
            if last.is_some() {
                break;
            }
        }

        let transition = last.unwrap();
        assert_eq!(transition.to, FarmState::Idle);
        assert_eq!(transition.reason, TransitionReason::StuckGaveUp { retries: 3 });
        assert_eq!(m.retries(), 0);
        assert_eq!(m.counters().retries_issued, 3);
        assert_eq!(
            sink.actions,
            vec![FarmAction::RetryPathfind, FarmAction::RetryPathfind, FarmAction::RetryPathfind]
        );
    }

    #[test]
    fn test_returning_stuck_retries_then_gives_up() {
        let config = FarmConfig {
            stuck_timeout_secs: 1.0,
            max_retries: 2,
            ..FarmConfig::default()
        };
        let mut m = FarmStateMachine::new(config);
        let mut sink = RecordingSink::default();
        step(&mut m, &mut sink, &Frame::new("Kill wolves (4/5)"));
        step(&mut m, &mut sink, &Frame::new("Kill wolves (4/5)"));
        step(&mut m, &mut sink, &Frame::new("Kill wolves (5/5)"));
        assert_eq!(m.state(), FarmState::Returning);
        sink.actions.clear();

        let frame = Frame::new("Kill wolves (5/5)").stationary().dt(0.5);
        for _ in 0..3 {
            assert!(step(&mut m, &mut sink, &frame).is_none());
        }
        assert_eq!(m.retries(), 1);
        assert_eq!(sink.actions, vec![FarmAction::RetryPathfind]);
        assert_eq!(m.state(), FarmState::Returning);

        let mut last = None;
        for _ in 0..4 {
            last = step(&mut m, &mut sink, &frame);
            if last.is_some() {
                break;
            }
        }

        let transition = last.unwrap();
        assert_eq!(transition.from, FarmState::Returning);
        assert_eq!(transition.to, FarmState::Idle);
        assert_eq!(transition.reason, TransitionReason::StuckGaveUp { retries: 2 });
        assert!(transition.reason.is_abandonment());
        assert_eq!(m.retries(), 0);
        assert_eq!(m.counters().retries_issued, 2);
        assert_eq!(sink.actions, vec![FarmAction::RetryPathfind, FarmAction::RetryPathfind]);
        assert_eq!(m.counters().quests_completed, 0);
    }

    #[test]
    fn test_movement_resets_stuck_timer() {
        let config = FarmConfig {
            stuck_timeout_secs: 1.0,
            ..FarmConfig::default()
        };
        let mut m = FarmStateMachine::new(config);
        let mut sink = RecordingSink::default();
        step(&mut m, &mut sink, &Frame::new("Go to the harbor"));

        let still = Frame::new("Go to the harbor").stationary().dt(0.6);
        let moving = Frame::new("Go to the harbor").dt(0.6);
        for _ in 0..5 {
            step(&mut m, &mut sink, &still);
            assert!(m.stuck_time() > 0.0);
            step(&mut m, &mut sink, &moving);
            assert_eq!(m.stuck_time(), 0.0);
        }
        assert_eq!(m.retries(), 0);
        assert_eq!(m.state(), FarmState::Pathfinding);
    }

    #[test]
    fn test_state_timeout_resets_to_idle() {
        let (mut m, mut sink) = pathfinding("Go to the harbor");

        let frame = Frame::new("Go to the harbor").dt(30.0);
        assert!(step(&mut m, &mut sink, &frame).is_none());
        let transition = step(&mut m, &mut sink, &frame).unwrap();

        assert_eq!(transition.to, FarmState::Idle);
        assert_eq!(transition.reason, TransitionReason::Timeout { budget_secs: 60 });
        assert!(transition.reason.is_abandonment());
    }

    #[test]
    fn test_talking_timeout_resets_to_idle() {
        let (mut m, mut sink) = pathfinding("Talk to Elder Wu");
        step(&mut m, &mut sink, &Frame::new("Talk to Elder Wu").dialog());
        assert_eq!(m.state(), FarmState::TalkingNpc);

        let frame = Frame::new("Talk to Elder Wu").dialog().dt(30.0);
        assert!(step(&mut m, &mut sink, &frame).is_none());
        let transition = step(&mut m, &mut sink, &frame).unwrap();

        assert_eq!(transition.from, FarmState::TalkingNpc);
        assert_eq!(transition.to, FarmState::Idle);
        assert_eq!(transition.reason, TransitionReason::Timeout { budget_secs: 60 });
        assert_eq!(m.counters().quests_completed, 0);
        assert_eq!(m.snapshot(), "");
    }

    #[test]
    fn test_collecting_timeout_resets_to_idle() {
        let (mut m, mut sink) = pathfinding("Gather herbs");
        step(&mut m, &mut sink, &Frame::new("Gather herbs").collecting());
        assert_eq!(m.state(), FarmState::Collecting);

        let frame = Frame::new("Gather herbs").collecting().dt(30.0);
        assert!(step(&mut m, &mut sink, &frame).is_none());
        let transition = step(&mut m, &mut sink, &frame).unwrap();

        assert_eq!(transition.from, FarmState::Collecting);
        assert_eq!(transition.to, FarmState::Idle);
        assert_eq!(transition.reason, TransitionReason::Timeout { budget_secs: 60 });
        assert_eq!(m.counters().quests_completed, 0);
    }

    #[test]
    fn test_killing_gets_double_budget() {
        let (mut m, mut sink) = pathfinding("Kill wolves (1/5)");
        step(&mut m, &mut sink, &Frame::new("Kill wolves (1/5)"));

        let frame = Frame::new("Kill wolves (1/5)").dt(30.0);
        for _ in 0..3 {
            assert!(step(&mut m, &mut sink, &frame).is_none());
        }
        let transition = step(&mut m, &mut sink, &frame).unwrap();
        assert_eq!(transition.reason, TransitionReason::Timeout { budget_secs: 120 });
    }

    #[test]
    fn test_not_performed_never_transitions() {
        struct Refusing;
        impl ActionSink for Refusing {
            fn invoke(&mut self, _action: FarmAction) -> ActionOutcome {
                ActionOutcome::NotPerformed
            }
        }

        let mut m = machine();
        let frame = Frame::new("Talk to Elder Wu");
        m.update(&frame.signals(), &mut Refusing);
        assert_eq!(m.state(), FarmState::Pathfinding);

        for _ in 0..10 {
            assert!(m.update(&frame.signals(), &mut Refusing).is_none());
        }
        assert_eq!(m.counters().actions_not_performed, 1);
    }

    #[test]
    fn test_transition_resets_timers() {
        let config = FarmConfig {
            stuck_timeout_secs: 1.0,
            ..FarmConfig::default()
        };
        let mut m = FarmStateMachine::new(config);
        let mut sink = RecordingSink::default();
        step(&mut m, &mut sink, &Frame::new("Talk to Elder Wu"));
        step(&mut m, &mut sink, &Frame::new("Talk to Elder Wu").stationary().dt(1.0));
        assert_eq!(m.retries(), 1);

        step(&mut m, &mut sink, &Frame::new("Talk to Elder Wu").dialog());
        assert_eq!(m.state(), FarmState::TalkingNpc);
        assert_eq!(m.retries(), 0);
        assert_eq!(m.state_time(), 0.0);
        assert_eq!(m.stuck_time(), 0.0);
    }

    #[test]
    fn test_reset_forces_idle() {
        let (mut m, _sink) = pathfinding("Go to the harbor");

        let transition = m.reset("automation disabled").unwrap();

        assert_eq!(transition.to, FarmState::Idle);
        assert_eq!(
            transition.reason,
            TransitionReason::Reset {
                reason: "automation disabled".to_string()
            }
        );
        assert_eq!(m.state(), FarmState::Idle);
        assert!(m.reset("again").is_none());
    }

    #[test]
    fn test_session_time_accumulates() {
        let mut m = machine();
        let mut sink = RecordingSink::default();
        let frame = Frame::new("").dt(0.25);
        for _ in 0..8 {
            step(&mut m, &mut sink, &frame);
        }
        assert!((m.counters().session_secs - 2.0).abs() < 1e-6);
    }
}
