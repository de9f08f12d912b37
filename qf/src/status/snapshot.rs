//! Status snapshot file format

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::{AutomationFlags, BossSighting, BotState};
use crate::farm::FarmState;

/// One published view of an instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub account_id: String,
    pub scene: String,
    #[serde(rename = "map")]
    pub map_name: String,
    /// Integer-rounded position
    pub position: (i32, i32),
    #[serde(rename = "quest")]
    pub quest_text: String,
    #[serde(rename = "hint")]
    pub quest_hint: String,
    pub flags: AutomationFlags,
    pub collect_active: bool,
    pub speed: f32,
    pub farm_state: FarmState,
    pub quests_completed: u64,
    pub boss: Option<BossSighting>,
    /// Unix milliseconds
    pub updated_at: i64,
}

impl StatusSnapshot {
    pub fn capture(bot: &BotState, farm_state: FarmState, quests_completed: u64, now_ms: i64) -> Self {
        Self {
            account_id: bot.account_id.clone(),
            scene: bot.location.scene.clone(),
            map_name: bot.location.map_name.clone(),
            position: bot.location.rounded(),
            quest_text: bot.quest_text.clone(),
            quest_hint: bot.quest_hint.clone(),
            flags: bot.flags,
            collect_active: bot.collect_active,
            speed: bot.speed,
            farm_state,
            quests_completed,
            boss: bot.last_boss.clone(),
            updated_at: now_ms,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).context(format!("Failed to read status snapshot {}", path.display()))?;
        serde_json::from_str(&content).context("Failed to parse status snapshot")
    }

    /// Time since the snapshot was written; zero if the clock went backwards
    pub fn age(&self, now_ms: i64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.updated_at).max(0) as u64)
    }

    pub fn is_stale(&self, now_ms: i64, freshness: Duration) -> bool {
        self.age(now_ms) > freshness
    }

    /// Human-readable view; stale snapshots render as offline
    pub fn render(&self, now_ms: i64, freshness: Duration) -> String {
        let age = self.age(now_ms).as_secs();
        if self.is_stale(now_ms, freshness) {
            return format!("account: {}\nstatus: offline (last update {}s ago)", self.account_id, age);
        }

        let mut out = String::new();
        let _ = writeln!(out, "account: {}", self.account_id);
        let _ = writeln!(out, "status: online ({}s ago)", age);
        let _ = writeln!(out, "state: {}", self.farm_state);
        let _ = writeln!(out, "quests completed: {}", self.quests_completed);
        let _ = writeln!(out, "auto: {}", on_off(self.flags.auto_enabled));
        let _ = writeln!(out, "attack: {}", on_off(self.flags.attack_enabled));
        let _ = writeln!(out, "headless: {}", on_off(self.flags.headless_enabled));
        let _ = writeln!(out, "collect quest: {}", on_off(self.collect_active));
        let _ = writeln!(out, "speed: {}x", self.speed);
        let _ = writeln!(
            out,
            "location: {} / {} ({}, {})",
            self.scene, self.map_name, self.position.0, self.position.1
        );
        let _ = write!(out, "quest: {}", if self.quest_text.is_empty() { "none" } else { &self.quest_text });
        if !self.quest_hint.is_empty() {
            let _ = write!(out, "\nhint: {}", self.quest_hint);
        }
        if let Some(boss) = &self.boss {
            let _ = write!(out, "\nboss: {} ({})", boss.text, boss.map_name);
        }
        out
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}
