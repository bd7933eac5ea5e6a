//! Rating engine seam and the default Gaussian skill model.
//!
//! The scheduler treats the engine as a black box behind [`RatingEngine`]:
//! record outcomes, read back sorted ratings and per-item tallies, replay
//! the full comparison history. [`SkillTracker`] implements the trait with a
//! TrueSkill-style two-player update (mean + uncertainty per item).

use std::collections::{HashMap, HashSet};
use std::f64::consts::{PI, SQRT_2};

use serde::Serialize;
use statrs::function::erf::erf;

/// One recorded comparison. A `None` winner is the excluded sentinel: the
/// loser was dropped from the ranking without a direct comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub winner: Option<String>,
    pub loser: String,
}

/// Per-item rating as exposed to callers and snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct RatingRow {
    pub item: String,
    pub mean: f64,
    pub uncertainty: f64,
}

/// Per-item skill estimates plus comparison bookkeeping.
///
/// Engine calls are not internally synchronized; the scheduler serializes
/// them under its session lock.
pub trait RatingEngine: Send {
    /// Record a single winner/loser outcome and update both ratings.
    fn record_outcome(&mut self, winner: &str, loser: &str);

    /// Record a batch of outcomes in order.
    fn record_outcomes(&mut self, outcomes: &[(String, String)]) {
        for (winner, loser) in outcomes {
            self.record_outcome(winner, loser);
        }
    }

    /// Append an excluded-sentinel history row for `loser` (no rating change;
    /// pair with [`RatingEngine::delete_item`] for a hard removal).
    fn record_removed(&mut self, loser: &str);

    /// All ratings, sorted by mean descending.
    fn ratings(&self) -> Vec<RatingRow>;

    fn counts(&self) -> HashMap<String, u64>;
    fn upvotes(&self) -> HashMap<String, u64>;
    fn downvotes(&self) -> HashMap<String, u64>;

    /// Comparison history in recording order.
    fn history(&self) -> &[HistoryEntry];

    /// Delete every record of `item`: rating, tallies. History is untouched.
    fn delete_item(&mut self, item: &str);

    fn delete_items(&mut self, items: &HashSet<String>) {
        for item in items {
            self.delete_item(item);
        }
    }

    /// Drop the comparison history without touching ratings.
    fn clear_history(&mut self);

    /// Reset all ratings and tallies, then replay the current history.
    /// Sentinel rows replay as deletions.
    fn recompute_from_history(&mut self);
}

const DEFAULT_MEAN: f64 = 25.0;
const DEFAULT_SIGMA: f64 = 25.0 / 3.0;
/// Performance variability per comparison.
const BETA: f64 = DEFAULT_SIGMA / 2.0;
/// Dynamics noise added before each update so ratings never fully freeze.
const TAU: f64 = DEFAULT_SIGMA / 100.0;
const MIN_VARIANCE_SCALE: f64 = 1e-6;

#[derive(Debug, Clone, Copy)]
struct Rating {
    mean: f64,
    sigma: f64,
}

impl Default for Rating {
    fn default() -> Self {
        Self {
            mean: DEFAULT_MEAN,
            sigma: DEFAULT_SIGMA,
        }
    }
}

fn normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / (2.0 * PI).sqrt()
}

fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / SQRT_2))
}

/// Truncated-Gaussian correction terms for a win/loss observation.
fn v_and_w(t: f64) -> (f64, f64) {
    let denom = normal_cdf(t).max(1e-12);
    let v = normal_pdf(t) / denom;
    let w = v * (v + t);
    (v, w.clamp(0.0, 1.0))
}

/// Default [`RatingEngine`]: Gaussian skill per item, updated from win/loss
/// observations through the truncated-normal moment matching used by
/// TrueSkill-family models.
#[derive(Debug, Default)]
pub struct SkillTracker {
    ratings: HashMap<String, Rating>,
    counts: HashMap<String, u64>,
    upvotes: HashMap<String, u64>,
    downvotes: HashMap<String, u64>,
    history: Vec<HistoryEntry>,
}

impl SkillTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one outcome to the rating state without logging it.
    fn apply_outcome(&mut self, winner: &str, loser: &str) {
        let mut win = self
            .ratings
            .get(winner)
            .copied()
            .unwrap_or_default();
        let mut lose = self.ratings.get(loser).copied().unwrap_or_default();

        let win_var = win.sigma * win.sigma + TAU * TAU;
        let lose_var = lose.sigma * lose.sigma + TAU * TAU;
        let c2 = 2.0 * BETA * BETA + win_var + lose_var;
        let c = c2.sqrt();

        let t = (win.mean - lose.mean) / c;
        let (v, w) = v_and_w(t);

        win.mean += win_var / c * v;
        lose.mean -= lose_var / c * v;
        win.sigma = (win_var * (1.0 - win_var / c2 * w).max(MIN_VARIANCE_SCALE)).sqrt();
        lose.sigma = (lose_var * (1.0 - lose_var / c2 * w).max(MIN_VARIANCE_SCALE)).sqrt();

        self.ratings.insert(winner.to_string(), win);
        self.ratings.insert(loser.to_string(), lose);

        *self.counts.entry(winner.to_string()).or_insert(0) += 1;
        *self.counts.entry(loser.to_string()).or_insert(0) += 1;
        *self.upvotes.entry(winner.to_string()).or_insert(0) += 1;
        *self.downvotes.entry(loser.to_string()).or_insert(0) += 1;
    }
}

impl RatingEngine for SkillTracker {
    fn record_outcome(&mut self, winner: &str, loser: &str) {
        self.apply_outcome(winner, loser);
        self.history.push(HistoryEntry {
            winner: Some(winner.to_string()),
            loser: loser.to_string(),
        });
    }

    fn record_removed(&mut self, loser: &str) {
        self.history.push(HistoryEntry {
            winner: None,
            loser: loser.to_string(),
        });
    }

    fn ratings(&self) -> Vec<RatingRow> {
        let mut rows: Vec<RatingRow> = self
            .ratings
            .iter()
            .map(|(item, r)| RatingRow {
                item: item.clone(),
                mean: r.mean,
                uncertainty: r.sigma,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.mean
                .partial_cmp(&a.mean)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.item.cmp(&b.item))
        });
        rows
    }

    fn counts(&self) -> HashMap<String, u64> {
        self.counts.clone()
    }

    fn upvotes(&self) -> HashMap<String, u64> {
        self.upvotes.clone()
    }

    fn downvotes(&self) -> HashMap<String, u64> {
        self.downvotes.clone()
    }

    fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    fn delete_item(&mut self, item: &str) {
        self.ratings.remove(item);
        self.counts.remove(item);
        self.upvotes.remove(item);
        self.downvotes.remove(item);
    }

    fn clear_history(&mut self) {
        self.history.clear();
    }

    fn recompute_from_history(&mut self) {
        self.ratings.clear();
        self.counts.clear();
        self.upvotes.clear();
        self.downvotes.clear();
        let history = std::mem::take(&mut self.history);
        for entry in &history {
            match &entry.winner {
                Some(winner) => self.apply_outcome(winner, &entry.loser),
                None => self.delete_item(&entry.loser),
            }
        }
        self.history = history;
    }
}
