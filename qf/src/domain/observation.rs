//! Per-tick signals supplied by the host

use serde::{Deserialize, Serialize};

/// A boss announcement seen by the instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BossSighting {
    pub text: String,
    #[serde(rename = "map")]
    pub map_name: String,
}

/// What the host reports each frame
///
/// The core never fetches these itself; the game binding layer fills them in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Observation {
    /// Active quest text, empty when no quest is assigned
    #[serde(rename = "quest")]
    pub quest_text: String,
    #[serde(rename = "hint")]
    pub quest_hint: String,
    #[serde(rename = "dialog-open")]
    pub dialog_open: bool,
    /// Avatar has not moved for longer than the host's threshold
    pub stationary: bool,
    #[serde(rename = "collect-active")]
    pub collect_active: bool,
    /// Game is running without rendering
    pub headless: bool,
    pub scene: String,
    #[serde(rename = "map")]
    pub map_name: String,
    pub position: (f32, f32),
    pub boss: Option<BossSighting>,
}
