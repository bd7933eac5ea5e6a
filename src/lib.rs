#![forbid(unsafe_code)]

//! # pairrank
//!
//! Drives pairwise comparisons between images to produce a relative ranking.
//!
//! Callers draw one ordered pair at a time from a [`Scheduler`], report a
//! winner, and a rating engine updates per-item skill estimates. The
//! scheduler's job is deciding *which pair to show next*: it builds an
//! initial pair sequence that covers every item early, hands pairs out from
//! behind a single lock, re-prioritizes the remaining backlog toward close
//! and under-sampled match-ups on demand ("smart shuffle"), and keeps the
//! live queue consistent with exclusions, removals, periodic CSV snapshots,
//! and merge-imported comparison logs.
//!
//! The rating math lives behind the [`RatingEngine`] trait; [`SkillTracker`]
//! is the default Gaussian skill model.

pub mod queue;
pub mod rating;
pub mod scan;
pub mod scheduler;
pub mod snapshot;

pub use queue::{build_queue, Pair, PairQueue};
pub use rating::{HistoryEntry, RatingEngine, RatingRow, SkillTracker};
pub use scan::{scan_items, ScanOutcome};
pub use scheduler::{DrawnPair, Progress, RankingRow, Scheduler, SchedulerError};
pub use snapshot::{
    parse_history_csv, write_snapshot, ImportError, SnapshotData, SnapshotError, SnapshotPaths,
};
