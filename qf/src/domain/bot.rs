//! Mutable per-instance bot state
//!
//! One `BotState` is owned by the session and passed by reference into each
//! tick. The command handler may flip the toggles; everything else is
//! refreshed from host observations.

use serde::{Deserialize, Serialize};

use super::observation::{BossSighting, Observation};

/// Speed multipliers cycled by a bare `speed` command
pub const SPEED_STEPS: [f32; 3] = [1.0, 2.0, 3.0];

/// Largest accepted speed multiplier
pub const MAX_SPEED: f32 = 10.0;

/// Switches an external controller may flip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationFlags {
    /// Farm state machine runs
    pub auto_enabled: bool,
    /// Combat actions are allowed
    pub attack_enabled: bool,
    /// Instance runs without rendering
    pub headless_enabled: bool,
}

impl Default for AutomationFlags {
    fn default() -> Self {
        Self {
            auto_enabled: true,
            attack_enabled: true,
            headless_enabled: false,
        }
    }
}

/// Where the avatar currently is
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub scene: String,
    pub map_name: String,
    pub x: f32,
    pub y: f32,
}

impl Location {
    /// Position rounded to whole units
    pub fn rounded(&self) -> (i32, i32) {
        (self.x.round() as i32, self.y.round() as i32)
    }
}

/// Everything the instance knows about itself outside the state machine
#[derive(Debug, Clone, PartialEq)]
pub struct BotState {
    pub account_id: String,
    pub flags: AutomationFlags,
    /// Game speed multiplier
    pub speed: f32,
    pub location: Location,
    pub quest_text: String,
    pub quest_hint: String,
    pub collect_active: bool,
    /// Most recent boss sighting, kept until replaced
    pub last_boss: Option<BossSighting>,
}

impl BotState {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            flags: AutomationFlags::default(),
            speed: SPEED_STEPS[0],
            location: Location::default(),
            quest_text: String::new(),
            quest_hint: String::new(),
            collect_active: false,
            last_boss: None,
        }
    }

    /// Refresh observed fields from the host
    pub fn apply(&mut self, obs: &Observation) {
        self.location.scene.clone_from(&obs.scene);
        self.location.map_name.clone_from(&obs.map_name);
        self.location.x = obs.position.0;
        self.location.y = obs.position.1;
        self.quest_text.clone_from(&obs.quest_text);
        self.quest_hint.clone_from(&obs.quest_hint);
        self.collect_active = obs.collect_active;
        self.flags.headless_enabled = obs.headless;
        if let Some(boss) = &obs.boss {
            self.last_boss = Some(boss.clone());
        }
    }

    pub fn toggle_auto(&mut self) -> bool {
        self.flags.auto_enabled = !self.flags.auto_enabled;
        self.flags.auto_enabled
    }

    pub fn toggle_attack(&mut self) -> bool {
        self.flags.attack_enabled = !self.flags.attack_enabled;
        self.flags.attack_enabled
    }

    /// Advance to the next speed step, wrapping around
    ///
    /// A speed that is not one of the steps goes back to the first.
    pub fn cycle_speed(&mut self) -> f32 {
        let next = SPEED_STEPS
            .iter()
            .position(|s| (*s - self.speed).abs() < f32::EPSILON)
            .map(|i| SPEED_STEPS[(i + 1) % SPEED_STEPS.len()])
            .unwrap_or(SPEED_STEPS[0]);
        self.speed = next;
        next
    }

    /// Set an explicit multiplier in (0, MAX_SPEED]
    pub fn set_speed(&mut self, speed: f32) -> Option<f32> {
        if speed.is_finite() && speed > 0.0 && speed <= MAX_SPEED {
            self.speed = speed;
            Some(speed)
        } else {
            None
        }
    }
}
