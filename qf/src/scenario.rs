//! Scripted host for running a session without a game
//!
//! A scenario is a YAML list of observation frames, each repeated a number
//! of ticks, plus the UI roles the scripted locator pretends are missing.
//!
//! ```yaml
//! tick-ms: 100
//! missing-roles: [skill-button]
//! frames:
//!   - quest: "Talk to <color=yellow>Elder Wu</color>"
//!     repeat: 5
//!   - quest: "Talk to Elder Wu"
//!     dialog-open: true
//!     repeat: 3
//! ```

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::Observation;
use crate::farm::{FarmState, Transition};
use crate::locator::{Locator, LocatorSink, UiHandle, UiRole};
use crate::session::FarmSession;

/// Errors loading a scenario file
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Failed to read scenario {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse scenario: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Scenario has no frames")]
    NoFrames,

    #[error("tick-ms must be greater than zero")]
    ZeroTick,
}

fn default_tick_ms() -> u64 {
    100
}

fn default_repeat() -> u32 {
    1
}

/// One observation held for `repeat` ticks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioFrame {
    #[serde(flatten)]
    pub observation: Observation,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

/// A scripted run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Host frame time at speed 1x
    #[serde(default = "default_tick_ms", rename = "tick-ms")]
    pub tick_ms: u64,

    /// UI elements the scripted locator cannot find
    #[serde(default, rename = "missing-roles")]
    pub missing_roles: Vec<UiRole>,

    pub frames: Vec<ScenarioFrame>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        debug!(path = %path.display(), "Scenario::load: called");
        let content = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ScenarioError> {
        let scenario: Self = serde_yaml::from_str(content)?;
        if scenario.tick_ms == 0 {
            return Err(ScenarioError::ZeroTick);
        }
        if scenario.frames.iter().all(|f| f.repeat == 0) {
            return Err(ScenarioError::NoFrames);
        }
        Ok(scenario)
    }

    /// Total ticks the scenario runs
    pub fn total_ticks(&self) -> u64 {
        self.frames.iter().map(|f| u64::from(f.repeat)).sum()
    }

    fn tick_secs(&self) -> f32 {
        self.tick_ms as f32 / 1000.0
    }
}

/// Locator that finds every role except the configured missing ones
#[derive(Debug, Default, Clone)]
pub struct ScriptedLocator {
    missing: HashSet<UiRole>,
    activations: Rc<RefCell<Vec<UiRole>>>,
}

impl ScriptedLocator {
    pub fn new(missing: impl IntoIterator<Item = UiRole>) -> Self {
        Self {
            missing: missing.into_iter().collect(),
            activations: Rc::default(),
        }
    }

    /// Roles activated so far, in order
    pub fn activations(&self) -> Vec<UiRole> {
        self.activations.borrow().clone()
    }
}

struct ScriptedHandle {
    role: UiRole,
    activations: Rc<RefCell<Vec<UiRole>>>,
}

impl UiHandle for ScriptedHandle {
    fn activate(&self) -> bool {
        self.activations.borrow_mut().push(self.role);
        true
    }
}

impl Locator for ScriptedLocator {
    fn find_by_role(&self, role: UiRole) -> Option<Box<dyn UiHandle>> {
        if self.missing.contains(&role) {
            return None;
        }
        Some(Box::new(ScriptedHandle {
            role,
            activations: Rc::clone(&self.activations),
        }))
    }
}

/// Outcome of a scenario run
#[derive(Debug, Clone, Default)]
pub struct ScenarioSummary {
    pub ticks: u64,
    pub transitions: Vec<Transition>,
    /// Commands consumed from the channel during the run
    pub commands: Vec<(String, String)>,
    /// Activations per UI role
    pub activations: BTreeMap<String, usize>,
    pub final_state: FarmState,
    pub quests_completed: u64,
    pub actions_not_performed: u64,
    /// Simulated seconds, after the speed multiplier
    pub session_secs: f64,
}

/// Play `scenario` through `session`
///
/// The tick delta is the frame time scaled by the session's current speed
/// multiplier. With `realtime` each tick also waits one frame of wall time,
/// so a controller can talk to the run.
pub async fn run_scenario(session: &mut FarmSession, scenario: &Scenario, realtime: bool) -> ScenarioSummary {
    info!(
        frames = scenario.frames.len(),
        ticks = scenario.total_ticks(),
        realtime,
        "Running scenario"
    );
    let locator = ScriptedLocator::new(scenario.missing_roles.iter().copied());
    let mut sink = LocatorSink::new(locator.clone());
    let mut summary = ScenarioSummary::default();
    let frame_time = Duration::from_millis(scenario.tick_ms);

    for frame in &scenario.frames {
        for _ in 0..frame.repeat {
            let dt = scenario.tick_secs() * session.bot().speed;
            let report = session.tick(&frame.observation, dt, &mut sink);
            summary.ticks += 1;
            summary.transitions.extend(report.transition);
            summary.commands.extend(report.command);
            if realtime {
                tokio::time::sleep(frame_time).await;
            }
        }
    }

    for role in locator.activations() {
        *summary.activations.entry(role.to_string()).or_default() += 1;
    }
    let counters = session.machine().counters();
    summary.final_state = session.machine().state();
    summary.quests_completed = counters.quests_completed;
    summary.actions_not_performed = counters.actions_not_performed;
    summary.session_secs = counters.session_secs;
    summary
}
