//! PatternStore - online learning store for quest classification
//!
//! Tracks, per keyword, which quest type it resolved to, which actions were
//! taken while it was active and how often the quest completed. Classifiers
//! consult it only when their fixed rules are inconclusive.
//!
//! # File format
//!
//! ```text
//! {
//!   "total_sessions": 12,
//!   "last_updated": 1760000000000,
//!   "patterns": [
//!     { "keyword": "ancient relic", "inferred_type": "collect",
//!       "actions": ["click_item"], "success_rate": 0.75, "seen_count": 4 }
//!   ]
//! }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use patternstore::PatternStore;
//!
//! let mut store = PatternStore::open("patterns.json")?;
//! store.record("ancient relic", "collect", &["click_item"], true);
//! store.save()?;
//! let hit = store.lookup("Recover the Ancient Relic (0/3)");
//! ```

pub mod cli;
pub mod config;
mod store;

pub use store::{MAX_RECORDED_ACTIONS, MIN_OBSERVATIONS, PatternStore, QuestPattern, StoreStats};
