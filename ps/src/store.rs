//! Core PatternStore implementation

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Observations required before a pattern may influence classification
pub const MIN_OBSERVATIONS: u32 = 2;

/// Most recent actions kept per pattern
pub const MAX_RECORDED_ACTIONS: usize = 8;

/// Learned statistics for one keyword
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestPattern {
    /// Lowercased keyword matched as a substring of the quest key
    pub keyword: String,
    /// Quest type label the keyword was resolved to
    pub inferred_type: String,
    /// Actions that were taken while the quest was active, oldest first
    pub actions: Vec<String>,
    /// Running average of outcomes (1.0 = success, 0.0 = failure)
    pub success_rate: f64,
    /// Number of recorded outcomes
    pub seen_count: u32,
}

impl QuestPattern {
    fn new(keyword: &str, inferred_type: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            inferred_type: inferred_type.to_string(),
            actions: Vec::new(),
            success_rate: 0.0,
            seen_count: 0,
        }
    }

    /// Fold one outcome into the running average
    fn observe(&mut self, success: bool) {
        let outcome = if success { 1.0 } else { 0.0 };
        self.seen_count += 1;
        let n = self.seen_count as f64;
        self.success_rate = (self.success_rate * (n - 1.0) + outcome) / n;
    }

    fn push_actions<S: AsRef<str>>(&mut self, actions: &[S]) {
        for action in actions {
            self.actions.push(action.as_ref().to_string());
        }
        if self.actions.len() > MAX_RECORDED_ACTIONS {
            let excess = self.actions.len() - MAX_RECORDED_ACTIONS;
            self.actions.drain(..excess);
        }
    }

    /// Whether enough outcomes were seen for the pattern to be trusted
    pub fn is_established(&self) -> bool {
        self.seen_count >= MIN_OBSERVATIONS
    }

    /// Most frequently recorded action; ties go to the most recent one
    pub fn dominant_action(&self) -> Option<&str> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for action in &self.actions {
            *counts.entry(action.as_str()).or_default() += 1;
        }
        self.actions
            .iter()
            .map(|a| a.as_str())
            .max_by_key(|a| counts.get(a).copied().unwrap_or(0))
    }
}

/// Summary of a store's contents
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    /// Number of keywords tracked
    pub pattern_count: usize,
    /// Keywords with enough observations to influence classification
    pub established_count: usize,
    /// Sum of all observations
    pub total_observations: u64,
    /// Mean success rate across established patterns
    pub mean_success_rate: f64,
}

/// On-disk representation
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    total_sessions: u64,
    last_updated: i64,
    patterns: Vec<QuestPattern>,
}

impl StoreFile {
    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).context(format!("Failed to read pattern store: {}", path.display()))?;
        serde_json::from_str(&content).context(format!("Failed to parse pattern store: {}", path.display()))
    }

    fn into_map(self) -> HashMap<String, QuestPattern> {
        let mut patterns = HashMap::with_capacity(self.patterns.len());
        for pattern in self.patterns {
            if patterns.contains_key(&pattern.keyword) {
                warn!(keyword = %pattern.keyword, "PatternStore: duplicate keyword, keeping first");
                continue;
            }
            patterns.insert(pattern.keyword.clone(), pattern);
        }
        patterns
    }
}

/// Outcomes recorded for one keyword since the last save
#[derive(Debug, Clone)]
struct Outcomes {
    inferred_type: String,
    successes: u32,
    failures: u32,
    actions: Vec<String>,
}

impl Outcomes {
    /// Fold these outcomes into `pattern`
    fn absorb_into(&self, pattern: &mut QuestPattern) {
        if pattern.inferred_type.eq_ignore_ascii_case("unknown") {
            pattern.inferred_type = self.inferred_type.clone();
        }
        let before = pattern.seen_count as f64;
        pattern.seen_count += self.successes + self.failures;
        let after = pattern.seen_count as f64;
        if after > 0.0 {
            pattern.success_rate = (pattern.success_rate * before + self.successes as f64) / after;
        }
        pattern.push_actions(&self.actions);
    }
}

/// Changes not yet written, replayed onto the file's current contents on save
#[derive(Debug, Default)]
struct Pending {
    sessions: u64,
    outcomes: HashMap<String, Outcomes>,
    removed: HashSet<String>,
}

impl Pending {
    fn forget(&mut self, key: &str) {
        self.outcomes.remove(key);
        self.removed.insert(key.to_string());
    }
}

/// Store contents produced by a save
struct Merged {
    patterns: HashMap<String, QuestPattern>,
    total_sessions: u64,
    last_updated: i64,
}

/// Keyword to outcome statistics, persisted as JSON
#[derive(Debug, Default)]
pub struct PatternStore {
    /// Backing file, if any
    path: Option<PathBuf>,
    patterns: HashMap<String, QuestPattern>,
    total_sessions: u64,
    /// Unix milliseconds of the last recorded outcome
    last_updated: i64,
    pending: Pending,
    dirty: bool,
}

impl PatternStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the store at `path`, starting empty if the file does not exist yet
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut store = if path.exists() {
            Self::load(&path)?
        } else {
            debug!(?path, "PatternStore::open: no file yet, starting empty");
            Self::new()
        };
        store.path = Some(path);
        Ok(store)
    }

    /// Load a store from an existing file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = StoreFile::read(path)?;
        let total_sessions = file.total_sessions;
        let last_updated = file.last_updated;
        let patterns = file.into_map();

        info!(path = %path.display(), count = patterns.len(), "Loaded pattern store");
        Ok(Self {
            path: Some(path.to_path_buf()),
            patterns,
            total_sessions,
            last_updated,
            pending: Pending::default(),
            dirty: false,
        })
    }

    /// Save to the backing file
    ///
    /// Several instances may share one store file. Under an exclusive lock the
    /// file is re-read and only this store's changes since its last save are
    /// applied to it: new outcomes are added to whatever other instances
    /// recorded, and removed keywords stay removed. The merged result is
    /// written through a temp file and rename, then becomes this store's view.
    pub fn save(&mut self) -> Result<()> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| eyre::eyre!("Pattern store has no backing file"))?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).context("Failed to create pattern store directory")?;
        }

        let lock_path = path.with_extension("lock");
        let lock = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .context("Failed to open pattern store lock")?;
        fs2::FileExt::lock_exclusive(&lock).context("Failed to lock pattern store")?;

        let result = self.merge_and_write(&path);

        if let Err(e) = fs2::FileExt::unlock(&lock) {
            warn!(error = %e, "PatternStore::save: failed to release lock");
        }
        let merged = result?;

        debug!(path = %path.display(), count = merged.patterns.len(), "Saved pattern store");
        self.patterns = merged.patterns;
        self.total_sessions = merged.total_sessions;
        self.last_updated = merged.last_updated;
        self.pending = Pending::default();
        self.dirty = false;
        Ok(())
    }

    /// Apply pending changes to the file's current contents and write the result
    ///
    /// Caller holds the store lock.
    fn merge_and_write(&self, path: &Path) -> Result<Merged> {
        let (mut patterns, disk_sessions, disk_updated) = if path.exists() {
            let file = StoreFile::read(path)?;
            let (sessions, updated) = (file.total_sessions, file.last_updated);
            (file.into_map(), sessions, updated)
        } else {
            (HashMap::new(), 0, 0)
        };

        for key in &self.pending.removed {
            patterns.remove(key);
        }
        for (key, outcomes) in &self.pending.outcomes {
            let pattern = patterns
                .entry(key.clone())
                .or_insert_with(|| QuestPattern::new(key, &outcomes.inferred_type));
            outcomes.absorb_into(pattern);
        }

        let merged = Merged {
            patterns,
            total_sessions: disk_sessions + self.pending.sessions,
            last_updated: disk_updated.max(self.last_updated),
        };

        let file = StoreFile {
            total_sessions: merged.total_sessions,
            last_updated: merged.last_updated,
            patterns: merged.patterns.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let tmp_path = path.with_extension("tmp");
        let written = (|| -> Result<()> {
            let mut tmp = fs::File::create(&tmp_path)?;
            tmp.write_all(json.as_bytes())?;
            tmp.sync_all()?;
            fs::rename(&tmp_path, path)?;
            Ok(())
        })();
        written.context(format!("Failed to write pattern store: {}", path.display()))?;
        Ok(merged)
    }

    /// Record one outcome for `keyword`
    ///
    /// The keyword is lowercased. A known keyword keeps its inferred type
    /// unless the stored one is "unknown".
    pub fn record<S: AsRef<str>>(&mut self, keyword: &str, inferred_type: &str, actions: &[S], success: bool) -> &QuestPattern {
        let key = keyword.trim().to_lowercase();
        debug!(keyword = %key, inferred_type, success, "PatternStore::record: called");

        let pattern = self
            .patterns
            .entry(key.clone())
            .or_insert_with(|| QuestPattern::new(&key, inferred_type));
        if pattern.inferred_type.eq_ignore_ascii_case("unknown") {
            pattern.inferred_type = inferred_type.to_string();
        }
        pattern.observe(success);
        pattern.push_actions(actions);

        let outcomes = self.pending.outcomes.entry(key).or_insert_with(|| Outcomes {
            inferred_type: inferred_type.to_string(),
            successes: 0,
            failures: 0,
            actions: Vec::new(),
        });
        if outcomes.inferred_type.eq_ignore_ascii_case("unknown") {
            outcomes.inferred_type = inferred_type.to_string();
        }
        if success {
            outcomes.successes += 1;
        } else {
            outcomes.failures += 1;
        }
        outcomes.actions.extend(actions.iter().map(|a| a.as_ref().to_string()));
        if outcomes.actions.len() > MAX_RECORDED_ACTIONS {
            let excess = outcomes.actions.len() - MAX_RECORDED_ACTIONS;
            outcomes.actions.drain(..excess);
        }

        self.last_updated = chrono::Utc::now().timestamp_millis();
        self.dirty = true;
        pattern
    }

    /// Best established pattern whose keyword occurs in `text`
    ///
    /// Highest success rate wins, then the longest keyword.
    pub fn lookup(&self, text: &str) -> Option<&QuestPattern> {
        let text = text.to_lowercase();
        self.patterns
            .values()
            .filter(|p| p.is_established() && !p.keyword.is_empty() && text.contains(&p.keyword))
            .max_by(|a, b| {
                a.success_rate
                    .total_cmp(&b.success_rate)
                    .then_with(|| a.keyword.len().cmp(&b.keyword.len()))
            })
    }

    /// Get the pattern for an exact keyword
    pub fn get(&self, keyword: &str) -> Option<&QuestPattern> {
        self.patterns.get(&keyword.trim().to_lowercase())
    }

    /// Remove a keyword, returning its pattern
    pub fn remove(&mut self, keyword: &str) -> Option<QuestPattern> {
        let key = keyword.trim().to_lowercase();
        let removed = self.patterns.remove(&key);
        if removed.is_some() {
            self.pending.forget(&key);
            self.dirty = true;
        }
        removed
    }

    /// Drop established patterns whose success rate is below `min_rate`
    pub fn prune(&mut self, min_rate: f64) -> usize {
        let doomed: Vec<String> = self
            .patterns
            .values()
            .filter(|p| p.is_established() && p.success_rate < min_rate)
            .map(|p| p.keyword.clone())
            .collect();
        for key in &doomed {
            self.patterns.remove(key);
            self.pending.forget(key);
        }
        let removed = doomed.len();
        if removed > 0 {
            info!(removed, min_rate, "Pruned patterns");
            self.dirty = true;
        }
        removed
    }

    /// Count a new learning session
    pub fn begin_session(&mut self) -> u64 {
        self.total_sessions += 1;
        self.pending.sessions += 1;
        self.dirty = true;
        self.total_sessions
    }

    /// Iterate over all patterns (unordered)
    pub fn patterns(&self) -> impl Iterator<Item = &QuestPattern> {
        self.patterns.values()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether there are changes not yet saved
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn total_sessions(&self) -> u64 {
        self.total_sessions
    }

    pub fn last_updated(&self) -> i64 {
        self.last_updated
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Summarize the store
    pub fn stats(&self) -> StoreStats {
        let established: Vec<&QuestPattern> = self.patterns.values().filter(|p| p.is_established()).collect();
        let mean_success_rate = if established.is_empty() {
            0.0
        } else {
            established.iter().map(|p| p.success_rate).sum::<f64>() / established.len() as f64
        };
        StoreStats {
            pattern_count: self.patterns.len(),
            established_count: established.len(),
            total_observations: self.patterns.values().map(|p| p.seen_count as u64).sum(),
            mean_success_rate,
        }
    }
}
