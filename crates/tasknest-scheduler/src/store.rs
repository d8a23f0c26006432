//! List store — the in-memory title → list mapping and its JSON snapshot.
//! The snapshot file is the sole durable artifact: pending reminder jobs
//! are derived from the persisted timestamps and rebuilt at startup,
//! never persisted themselves.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use tasknest_core::error::{Result, TasknestError};

/// Persisted timestamp format (ISO-8601 local wall-clock, no zone).
pub const REMINDER_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A named to-do list. `reminder` is the raw persisted string — empty
/// means none. It stays a string rather than an `Option<NaiveDateTime>`
/// so that one malformed timestamp degrades that list alone instead of
/// failing the whole snapshot load; re-arming clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    pub tasks: Vec<String>,
    #[serde(default)]
    pub reminder: String,
}

impl TaskList {
    /// Parse the persisted reminder. None for empty or unparseable.
    pub fn reminder_at(&self) -> Option<NaiveDateTime> {
        if self.reminder.is_empty() {
            return None;
        }
        self.reminder.parse::<NaiveDateTime>().ok()
    }

    /// Whether a reminder string is present (parseable or not).
    pub fn has_reminder(&self) -> bool {
        !self.reminder.is_empty()
    }

    pub fn set_reminder(&mut self, at: NaiveDateTime) {
        self.reminder = at.format(REMINDER_FORMAT).to_string();
    }

    pub fn clear_reminder(&mut self) {
        self.reminder.clear();
    }
}

/// File-backed store of all lists.
pub struct ListStore {
    path: PathBuf,
    lists: BTreeMap<String, TaskList>,
}

impl ListStore {
    /// Open a store at the given snapshot path and load it. A missing
    /// file is an empty mapping; a malformed one is a warning and an
    /// empty mapping (recoverable, never fatal).
    pub fn open(path: &Path) -> Self {
        let mut store = Self {
            path: path.to_path_buf(),
            lists: BTreeMap::new(),
        };
        store.load();
        store
    }

    /// Default snapshot path (~/.tasknest/todo_data.json).
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".tasknest").join("todo_data.json")
    }

    /// (Re)load the mapping from disk, replacing in-memory state.
    pub fn load(&mut self) {
        self.lists = if !self.path.exists() {
            BTreeMap::new()
        } else {
            match std::fs::read_to_string(&self.path) {
                Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                    tracing::warn!("⚠️ Failed to parse {}: {e}", self.path.display());
                    BTreeMap::new()
                }),
                Err(e) => {
                    tracing::warn!("⚠️ Failed to read {}: {e}", self.path.display());
                    BTreeMap::new()
                }
            }
        };
    }

    /// Save the whole mapping to disk. In-memory state is untouched on
    /// failure; the caller decides whether to surface or swallow.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.lists)
            .map_err(|e| TasknestError::Serialize(e.to_string()))?;
        std::fs::write(&self.path, &json)?;
        tracing::debug!("💾 Saved {} lists to {}", self.lists.len(), self.path.display());
        Ok(())
    }

    pub fn contains(&self, title: &str) -> bool {
        self.lists.contains_key(title)
    }

    pub fn get(&self, title: &str) -> Option<&TaskList> {
        self.lists.get(title)
    }

    pub fn get_mut(&mut self, title: &str) -> Option<&mut TaskList> {
        self.lists.get_mut(title)
    }

    /// Insert a fresh empty list. Caller has already validated the title.
    pub fn insert(&mut self, title: &str) {
        self.lists.insert(title.to_string(), TaskList::default());
    }

    pub fn remove(&mut self, title: &str) -> Option<TaskList> {
        self.lists.remove(title)
    }

    /// Move a list to a new title, keeping tasks and reminder intact.
    /// Returns false if the old title does not exist.
    pub fn rename(&mut self, old: &str, new: &str) -> bool {
        match self.lists.remove(old) {
            Some(list) => {
                self.lists.insert(new.to_string(), list);
                true
            }
            None => false,
        }
    }

    pub fn titles(&self) -> Vec<String> {
        self.lists.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TaskList)> {
        self.lists.iter()
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}
