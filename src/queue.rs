//! Pair queue construction and mutation.
//!
//! The queue is the ordered backlog of comparisons: a ring that covers every
//! item early, followed by the rest of the combinatorial pair set, both
//! shuffled. A cursor marks the next undrawn pair; everything before it has
//! already been shown.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

/// Two distinct items offered for comparison.
///
/// Identity is unordered: `(a, b)` and `(b, a)` are the same pair. `first`
/// and `second` only matter at presentation time, when the dispenser may
/// swap them to avoid repeating the previously shown item.
#[derive(Debug, Clone)]
pub struct Pair {
    pub first: String,
    pub second: String,
}

impl Pair {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }

    /// Canonical key for duplicate detection (lexicographically ordered).
    pub fn key(&self) -> (&str, &str) {
        if self.first.as_str() <= self.second.as_str() {
            (&self.first, &self.second)
        } else {
            (&self.second, &self.first)
        }
    }

    pub fn touches(&self, item: &str) -> bool {
        self.first == item || self.second == item
    }

    pub fn swapped(&self) -> Pair {
        Pair {
            first: self.second.clone(),
            second: self.first.clone(),
        }
    }
}

impl PartialEq for Pair {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Pair {}

impl std::hash::Hash for Pair {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// Build the initial pair sequence for `items`.
///
/// Layout: a shuffled ring `(item[i], item[(i+1) mod n])` guaranteeing every
/// item appears in at least one early pair, then the remaining combinatorial
/// pairs shuffled independently. Duplicate detection is unordered, so the
/// n=2 ring contributes a single pair and the full result for n >= 2 always
/// holds exactly n*(n-1)/2 distinct pairs before exclusion filtering.
pub fn build_queue(
    items: &[String],
    excluded: &HashSet<String>,
    rng: &mut impl Rng,
) -> Vec<Pair> {
    let n = items.len();
    if n < 2 {
        return Vec::new();
    }

    let mut ring: Vec<Pair> = Vec::with_capacity(n);
    let mut ring_keys: HashSet<(String, String)> = HashSet::with_capacity(n);
    for i in 0..n {
        let pair = Pair::new(items[i].clone(), items[(i + 1) % n].clone());
        let (a, b) = pair.key();
        if !ring_keys.insert((a.to_string(), b.to_string())) {
            continue;
        }
        ring.push(pair);
    }
    ring.shuffle(rng);
    debug!(ring = ring.len(), "built ring pairs");

    let mut remaining: Vec<Pair> = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            let pair = Pair::new(items[i].clone(), items[j].clone());
            let (a, b) = pair.key();
            if ring_keys.contains(&(a.to_string(), b.to_string())) {
                continue;
            }
            remaining.push(pair);
        }
    }
    remaining.shuffle(rng);
    debug!(remaining = remaining.len(), "built combinatorial tail");

    let mut queue: Vec<Pair> = ring.into_iter().chain(remaining).collect();
    queue.retain(|p| !excluded.contains(&p.first) && !excluded.contains(&p.second));
    queue
}

/// The ordered backlog of pairs plus the cursor of the next undrawn pair.
#[derive(Debug, Default)]
pub struct PairQueue {
    pairs: Vec<Pair>,
    cursor: usize,
}

impl PairQueue {
    pub fn new(pairs: Vec<Pair>) -> Self {
        Self { pairs, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.pairs.len()
    }

    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    /// Draw the next pair and advance the cursor.
    pub fn advance(&mut self) -> Option<Pair> {
        let pair = self.pairs.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(pair)
    }

    /// Drop every pair failing `keep`, preserving cursor-relative order.
    ///
    /// Removals inside the consumed prefix pull the cursor back by the same
    /// amount, so the next undrawn pair is unchanged.
    pub fn retain(&mut self, mut keep: impl FnMut(&Pair) -> bool) {
        let mut removed_before_cursor = 0usize;
        let mut index = 0usize;
        let cursor = self.cursor;
        self.pairs.retain(|pair| {
            let kept = keep(pair);
            if !kept && index < cursor {
                removed_before_cursor += 1;
            }
            index += 1;
            kept
        });
        self.cursor -= removed_before_cursor;
    }

    /// Discard the consumed prefix and stable-sort the remainder ascending by
    /// `priority`. Ties keep their prior relative order; the cursor resets
    /// to zero.
    pub fn sort_remaining_by(&mut self, mut priority: impl FnMut(&Pair) -> f64) {
        self.pairs.drain(..self.cursor);
        self.cursor = 0;
        self.pairs.sort_by(|a, b| {
            priority(a)
                .partial_cmp(&priority(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
}
