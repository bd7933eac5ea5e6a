//! The comparison scheduler: dispensing, smart reordering, exclusion and
//! removal, session switching, autosave, and history import.
//!
//! All per-session state (queue, cursor, last-shown item, exclusion set,
//! autosave counter, and the rating engine itself) lives in one [`Session`]
//! value
//! behind a single `Mutex`. Every operation takes the lock for its whole
//! read-modify-write sequence, so an outcome recorded before a reorder is
//! always reflected in the reorder's priorities. Switching sessions replaces
//! the whole value; no caller can observe a half-switched state.
//!
//! The only filesystem work done while holding the lock is the bounded
//! directory rescan a queue rebuild needs. Snapshot CSV writes are collected
//! under the lock and written after it is released.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rand::thread_rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::queue::{build_queue, Pair, PairQueue};
use crate::rating::{RatingEngine, SkillTracker};
use crate::scan::scan_items;
use crate::snapshot::{
    self, parse_history_csv, ImportError, SnapshotData, SnapshotError, SnapshotPaths,
    SnapshotRatingRow,
};

/// Outcomes recorded between automatic snapshots.
const AUTOSAVE_INTERVAL: u32 = 10;

/// Weight of the sample-count term in the smart-shuffle priority.
const COUNT_WEIGHT: f64 = 0.8;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("directory does not exist: {0}")]
    MissingRoot(PathBuf),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("session lock poisoned")]
    Poisoned,
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Comparison counter: outcomes recorded so far vs. live queue length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

/// An ordered pair ready for presentation. `first` is never the item shown
/// in the first slot of the immediately preceding draw.
#[derive(Debug, Clone, Serialize)]
pub struct DrawnPair {
    pub first: String,
    pub second: String,
    pub progress: Progress,
}

/// Full ranking table row, including tallies and the exclusion flag.
#[derive(Debug, Clone, Serialize)]
pub struct RankingRow {
    pub item: String,
    pub mean: f64,
    pub uncertainty: f64,
    pub count: u64,
    pub upvotes: u64,
    pub downvotes: u64,
    pub excluded: bool,
}

/// Everything bound to one root directory. Replaced wholesale on a session
/// switch.
struct Session<E> {
    root: PathBuf,
    queue: PairQueue,
    last_shown: Option<String>,
    excluded: HashSet<String>,
    engine: E,
    outcomes_since_autosave: u32,
}

impl<E: RatingEngine> Session<E> {
    fn fresh(root: PathBuf, engine: E) -> Self {
        let mut session = Self {
            root,
            queue: PairQueue::default(),
            last_shown: None,
            excluded: HashSet::new(),
            engine,
            outcomes_since_autosave: 0,
        };
        session.rebuild();
        session
    }

    /// Rescan the root and rebuild the queue from scratch. Cursor progress
    /// and any prior reorder are discarded.
    fn rebuild(&mut self) {
        let scan = scan_items(&self.root, &self.excluded, None);
        if !scan.complete {
            warn!(root = %self.root.display(), "rebuilding from an incomplete scan");
        }
        let pairs = build_queue(&scan.items, &self.excluded, &mut thread_rng());
        info!(items = scan.items.len(), pairs = pairs.len(), "queue rebuilt");
        self.queue = PairQueue::new(pairs);
    }

    fn progress(&self) -> Progress {
        Progress {
            completed: self.engine.history().len(),
            total: self.queue.len(),
        }
    }

    fn snapshot_data(&self) -> SnapshotData {
        let upvotes = self.engine.upvotes();
        let downvotes = self.engine.downvotes();
        let ratings = self
            .engine
            .ratings()
            .into_iter()
            .map(|row| SnapshotRatingRow {
                upvotes: upvotes.get(&row.item).copied().unwrap_or(0),
                downvotes: downvotes.get(&row.item).copied().unwrap_or(0),
                item: row.item,
                mean: row.mean,
                uncertainty: row.uncertainty,
            })
            .collect();
        SnapshotData {
            date: chrono::Local::now().format("%Y-%m-%d").to_string(),
            ratings,
            history: self.engine.history().to_vec(),
        }
    }
}

fn validate_root(root: &Path) -> Result<PathBuf, SchedulerError> {
    if !root.exists() {
        return Err(SchedulerError::MissingRoot(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(SchedulerError::NotADirectory(root.to_path_buf()));
    }
    Ok(root.to_path_buf())
}

/// Thread-safe comparison scheduler bound to one root directory at a time.
pub struct Scheduler<E: RatingEngine = SkillTracker> {
    session: Mutex<Session<E>>,
}

impl<E: RatingEngine + Default> Scheduler<E> {
    /// Open a scheduler for `root`, scanning it and building the initial
    /// queue. Fails without side effects when `root` is not a directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        Self::with_engine(root, E::default())
    }

    /// Bind the scheduler to a new root. The previous queue, cursor,
    /// exclusions, and in-memory ratings are discarded; prior ratings remain
    /// recoverable only through that session's on-disk snapshot.
    pub fn switch_session(&self, new_root: impl AsRef<Path>) -> Result<(), SchedulerError> {
        let root = validate_root(new_root.as_ref())?;
        let mut session = self.lock()?;
        info!(root = %root.display(), "switching session");
        *session = Session::fresh(root, E::default());
        Ok(())
    }
}

impl<E: RatingEngine> Scheduler<E> {
    /// Open a scheduler with a caller-supplied rating engine.
    pub fn with_engine(root: impl AsRef<Path>, engine: E) -> Result<Self, SchedulerError> {
        let root = validate_root(root.as_ref())?;
        Ok(Self {
            session: Mutex::new(Session::fresh(root, engine)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Session<E>>, SchedulerError> {
        self.session.lock().map_err(|_| SchedulerError::Poisoned)
    }

    /// Draw the next pair. `Ok(None)` is the terminal "no more pairs" state.
    ///
    /// The returned pair is the one at the cursor, reoriented so its first
    /// slot differs from the previous draw's first slot; orientation never
    /// skips or reorders which pair is drawn.
    pub fn next_pair(&self) -> Result<Option<DrawnPair>, SchedulerError> {
        let mut session = self.lock()?;
        let Some(pair) = session.queue.advance() else {
            debug!("queue exhausted");
            return Ok(None);
        };
        let ordered = match &session.last_shown {
            Some(last) if pair.first == *last => pair.swapped(),
            _ => pair,
        };
        session.last_shown = Some(ordered.first.clone());
        let progress = session.progress();
        Ok(Some(DrawnPair {
            first: ordered.first,
            second: ordered.second,
            progress,
        }))
    }

    /// Record a comparison outcome. With `exclude_loser`, the loser is also
    /// soft-excluded and the queue rebuilt.
    ///
    /// Every [`AUTOSAVE_INTERVAL`] outcomes a snapshot is collected under the
    /// lock and written to the session root after the lock is released; a
    /// failed write degrades durability, not availability, so it is logged
    /// and the call still succeeds.
    pub fn record_outcome(
        &self,
        winner: &str,
        loser: &str,
        exclude_loser: bool,
    ) -> Result<(), SchedulerError> {
        let pending = {
            let mut session = self.lock()?;
            session.engine.record_outcome(winner, loser);
            if exclude_loser {
                info!(item = loser, "excluding loser");
                session.excluded.insert(loser.to_string());
                session.rebuild();
            }
            session.outcomes_since_autosave += 1;
            if session.outcomes_since_autosave >= AUTOSAVE_INTERVAL {
                session.outcomes_since_autosave = 0;
                Some((session.root.clone(), session.snapshot_data()))
            } else {
                None
            }
        };

        if let Some((root, data)) = pending {
            if let Err(error) = snapshot::write_snapshot(&root, &data) {
                warn!(%error, "autosave failed, session continues");
            }
        }
        Ok(())
    }

    /// Smart shuffle: drop the consumed prefix and stable-sort the rest of
    /// the queue so close, under-sampled match-ups come first.
    ///
    /// Priority is `|mean(a) - mean(b)| + 0.8 * (count(a) + count(b))`,
    /// taking 0 for items the engine has never seen; lower sorts earlier.
    pub fn reorder(&self) -> Result<(), SchedulerError> {
        let mut session = self.lock()?;
        let means: HashMap<String, f64> = session
            .engine
            .ratings()
            .into_iter()
            .map(|row| (row.item, row.mean))
            .collect();
        let counts = session.engine.counts();

        let mean_of = |item: &str| means.get(item).copied().unwrap_or(0.0);
        let count_of = |item: &str| counts.get(item).copied().unwrap_or(0) as f64;
        session.queue.sort_remaining_by(|pair| {
            (mean_of(&pair.first) - mean_of(&pair.second)).abs()
                + COUNT_WEIGHT * (count_of(&pair.first) + count_of(&pair.second))
        });
        debug!(remaining = session.queue.len(), "queue reordered");
        Ok(())
    }

    /// Soft-exclude `item`: it can no longer be drawn, but its rating history
    /// is retained. Rebuilds the queue from the root.
    pub fn exclude_item(&self, item: &str) -> Result<(), SchedulerError> {
        let mut session = self.lock()?;
        info!(item, "excluding item");
        session.excluded.insert(item.to_string());
        session.rebuild();
        Ok(())
    }

    /// Drop all soft exclusions and rebuild the queue.
    pub fn clear_exclusions(&self) -> Result<(), SchedulerError> {
        let mut session = self.lock()?;
        info!(count = session.excluded.len(), "clearing exclusions");
        session.excluded.clear();
        session.rebuild();
        Ok(())
    }

    /// Hard-remove `item`: prune its pairs from the queue in place (no
    /// rebuild, cursor-relative order preserved), append a sentinel history
    /// row so the removal survives snapshot and import, and delete the
    /// engine's record irreversibly.
    pub fn remove_item(&self, item: &str) -> Result<(), SchedulerError> {
        let mut session = self.lock()?;
        info!(item, "removing item");
        session.queue.retain(|pair| !pair.touches(item));
        session.engine.record_removed(item);
        session.engine.delete_item(item);
        Ok(())
    }

    /// Merge an external comparison history log into the live state.
    ///
    /// The log is parsed in full before anything is applied, so a malformed
    /// row changes no state. With `append = false` the engine's history is
    /// cleared and ratings recomputed from empty before the batch applies.
    /// Imported outcomes are removed from the live queue in either
    /// orientation; sentinel losers lose their rating records and every
    /// queue pair touching them.
    pub fn import_history(&self, log: &str, append: bool) -> Result<(), SchedulerError> {
        let entries = parse_history_csv(log)?;

        let mut outcomes: Vec<(String, String)> = Vec::new();
        let mut removed: HashSet<String> = HashSet::new();
        let mut decided: HashSet<Pair> = HashSet::new();
        for entry in &entries {
            match &entry.winner {
                Some(winner) => {
                    decided.insert(Pair::new(winner.clone(), entry.loser.clone()));
                    outcomes.push((winner.clone(), entry.loser.clone()));
                }
                None => {
                    removed.insert(entry.loser.clone());
                }
            }
        }

        let mut session = self.lock()?;
        if !append {
            session.engine.clear_history();
            session.engine.recompute_from_history();
        }
        session.engine.record_outcomes(&outcomes);
        for loser in &removed {
            session.engine.record_removed(loser);
        }
        session.engine.delete_items(&removed);

        session.queue.retain(|pair| {
            !removed.contains(&pair.first)
                && !removed.contains(&pair.second)
                && !decided.contains(pair)
        });
        info!(
            outcomes = outcomes.len(),
            removed = removed.len(),
            append,
            "history imported"
        );
        Ok(())
    }

    pub fn progress(&self) -> Result<Progress, SchedulerError> {
        Ok(self.lock()?.progress())
    }

    /// Full ranking table, excluded items flagged.
    pub fn rankings(&self) -> Result<Vec<RankingRow>, SchedulerError> {
        let session = self.lock()?;
        let counts = session.engine.counts();
        let upvotes = session.engine.upvotes();
        let downvotes = session.engine.downvotes();
        Ok(session
            .engine
            .ratings()
            .into_iter()
            .map(|row| RankingRow {
                excluded: session.excluded.contains(&row.item),
                count: counts.get(&row.item).copied().unwrap_or(0),
                upvotes: upvotes.get(&row.item).copied().unwrap_or(0),
                downvotes: downvotes.get(&row.item).copied().unwrap_or(0),
                item: row.item,
                mean: row.mean,
                uncertainty: row.uncertainty,
            })
            .collect())
    }

    /// Ratings table as CSV, for export.
    pub fn export_ratings_csv(&self) -> Result<String, SchedulerError> {
        let data = self.lock()?.snapshot_data();
        Ok(snapshot::ratings_csv(&data.ratings)?)
    }

    /// Comparison history as CSV, for export.
    pub fn export_history_csv(&self) -> Result<String, SchedulerError> {
        let data = self.lock()?.snapshot_data();
        Ok(snapshot::history_csv(&data.history)?)
    }

    /// Write a snapshot immediately. The data is collected under the lock;
    /// the files are written after it is released.
    pub fn snapshot_now(&self) -> Result<SnapshotPaths, SchedulerError> {
        let (root, data) = {
            let session = self.lock()?;
            (session.root.clone(), session.snapshot_data())
        };
        Ok(snapshot::write_snapshot(&root, &data)?)
    }

    pub fn current_root(&self) -> Result<PathBuf, SchedulerError> {
        Ok(self.lock()?.root.clone())
    }

    pub fn exclusions(&self) -> Result<HashSet<String>, SchedulerError> {
        Ok(self.lock()?.excluded.clone())
    }
}
