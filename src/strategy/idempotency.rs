use crate::domain::BetType;
use crate::error::{LineWatchError, Result};
use crate::persistence::{parse_stored_time, write_atomic};
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, Writer};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Which detector produced an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    ReverseLineMovement,
    Disagreement,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::ReverseLineMovement => "rlm",
            AlertKind::Disagreement => "dg",
        }
    }
}

/// Build the dedup key for an alert.
///
/// The line is normalized so `3.50` and `3.5` map to the same key.
pub fn notified_identifier(
    team: &str,
    bet_type: BetType,
    line: Decimal,
    bookmaker: &str,
    kind: AlertKind,
) -> String {
    format!(
        "{}_{}_{}_{}_{}",
        team,
        bet_type,
        line.normalize(),
        bookmaker,
        kind.as_str()
    )
}

/// Set of alerts that were already sent
///
/// Each identifier carries the start time of the game it belongs to, so
/// entries for finished games can be pruned.
pub trait NotifiedStore: Send + Sync {
    fn contains(&self, identifier: &str) -> bool;

    /// Record an identifier. Returns `false` if it was already present.
    fn insert(&mut self, identifier: String, time: DateTime<Utc>) -> bool;

    /// Drop identifiers whose game time is strictly before `now`
    fn prune_before(&mut self, now: DateTime<Utc>) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make the current contents durable
    fn flush(&mut self) -> Result<()>;
}

/// Notified set kept only for the life of the process
#[derive(Debug, Clone, Default)]
pub struct MemoryNotifiedStore {
    entries: HashMap<String, DateTime<Utc>>,
}

impl MemoryNotifiedStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries_sorted(&self) -> Vec<(&String, &DateTime<Utc>)> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)));
        entries
    }
}

impl NotifiedStore for MemoryNotifiedStore {
    fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    fn insert(&mut self, identifier: String, time: DateTime<Utc>) -> bool {
        if self.entries.contains_key(&identifier) {
            return false;
        }
        self.entries.insert(identifier, time);
        true
    }

    fn prune_before(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, time| *time >= now);
        before - self.entries.len()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Notified set backed by an `identifier,time` CSV file
#[derive(Debug)]
pub struct CsvNotifiedStore {
    path: PathBuf,
    inner: MemoryNotifiedStore,
    dirty: bool,
}

impl CsvNotifiedStore {
    /// Load the store from `path`. A missing file starts an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut inner = MemoryNotifiedStore::new();

        if path.exists() {
            let mut reader = ReaderBuilder::new().from_path(&path)?;
            for record in reader.records() {
                let record = record?;
                let identifier = record.get(0).unwrap_or("").trim();
                let raw_time = record.get(1).unwrap_or("").trim();
                if identifier.is_empty() {
                    continue;
                }
                let Some(time) = parse_stored_time(raw_time) else {
                    warn!(
                        "{}: unreadable time {:?} for {}, entry skipped",
                        path.display(),
                        raw_time,
                        identifier
                    );
                    continue;
                };
                inner.insert(identifier.to_string(), time);
            }
            debug!("Loaded {} notified identifiers from {}", inner.len(), path.display());
        } else {
            info!("No notified file at {}, starting empty", path.display());
        }

        Ok(Self {
            path,
            inner,
            dirty: false,
        })
    }

    /// Load the store and drop entries for games that already started
    pub fn open_pruned(path: impl Into<PathBuf>, now: DateTime<Utc>) -> Result<Self> {
        let mut store = Self::open(path)?;
        let removed = store.prune_before(now);
        if removed > 0 {
            info!("Pruned {} notified identifiers for past games", removed);
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NotifiedStore for CsvNotifiedStore {
    fn contains(&self, identifier: &str) -> bool {
        self.inner.contains(identifier)
    }

    fn insert(&mut self, identifier: String, time: DateTime<Utc>) -> bool {
        let inserted = self.inner.insert(identifier, time);
        self.dirty |= inserted;
        inserted
    }

    fn prune_before(&mut self, now: DateTime<Utc>) -> usize {
        let removed = self.inner.prune_before(now);
        self.dirty |= removed > 0;
        removed
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty && self.path.exists() {
            return Ok(());
        }

        let mut writer = Writer::from_writer(Vec::new());
        writer.write_record(["identifier", "time"])?;
        for (identifier, time) in self.inner.entries_sorted() {
            let time = time.to_rfc3339();
            writer.write_record([identifier.as_str(), time.as_str()])?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| LineWatchError::Io(e.into_error()))?;

        if let Err(e) = write_atomic(&self.path, &bytes) {
            warn!("Failed to write {}: {}", self.path.display(), e);
            return Err(e);
        }
        self.dirty = false;
        Ok(())
    }
}
