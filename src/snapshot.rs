//! Dated CSV snapshots of ratings and comparison history, plus history-log
//! parsing for merge import.
//!
//! A snapshot is two artifacts in the session root, one pair per date;
//! re-snapshotting on the same date overwrites them:
//!
//! - `image_rankings_autosave_{YYYY-MM-DD}.csv`
//!   header `Image,ELO,Uncertainty,Upvotes,Downvotes`
//! - `comparisons_autosave_{YYYY-MM-DD}.csv`
//!   header `Winner,Loser`, with the literal token `None` marking rows whose
//!   loser was dropped without a direct comparison.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::rating::HistoryEntry;

/// Winner token for excluded-sentinel history rows.
const SENTINEL_WINNER: &str = "None";

/// Ratings table row as written to the snapshot artifact.
#[derive(Debug, Clone)]
pub struct SnapshotRatingRow {
    pub item: String,
    pub mean: f64,
    pub uncertainty: f64,
    pub upvotes: u64,
    pub downvotes: u64,
}

/// Everything needed to write one snapshot, collected under the scheduler
/// lock so the two artifacts describe a single consistent state.
#[derive(Debug, Clone)]
pub struct SnapshotData {
    /// Artifact date, `YYYY-MM-DD`.
    pub date: String,
    pub ratings: Vec<SnapshotRatingRow>,
    pub history: Vec<HistoryEntry>,
}

/// Paths of the two written artifacts.
#[derive(Debug, Clone)]
pub struct SnapshotPaths {
    pub ratings: PathBuf,
    pub history: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("malformed row {line}: expected 2 fields, got {fields}")]
    MalformedRow { line: usize, fields: usize },
    #[error("malformed row {line}: empty field")]
    EmptyField { line: usize },
}

/// Serialize the ratings table. Scores round to two decimals, matching the
/// on-disk format readers of these artifacts already expect.
pub fn ratings_csv(rows: &[SnapshotRatingRow]) -> Result<String, SnapshotError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["Image", "ELO", "Uncertainty", "Upvotes", "Downvotes"])?;
    for row in rows {
        writer.write_record([
            row.item.clone(),
            format!("{:.2}", row.mean),
            format!("{:.2}", row.uncertainty),
            row.upvotes.to_string(),
            row.downvotes.to_string(),
        ])?;
    }
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Serialize the comparison history log.
pub fn history_csv(entries: &[HistoryEntry]) -> Result<String, SnapshotError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["Winner", "Loser"])?;
    for entry in entries {
        let winner = entry.winner.as_deref().unwrap_or(SENTINEL_WINNER);
        writer.write_record([winner, entry.loser.as_str()])?;
    }
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Write both snapshot artifacts into `root`, overwriting any prior snapshot
/// for the same date.
pub fn write_snapshot(root: &Path, data: &SnapshotData) -> Result<SnapshotPaths, SnapshotError> {
    let ratings_path = root.join(format!("image_rankings_autosave_{}.csv", data.date));
    let history_path = root.join(format!("comparisons_autosave_{}.csv", data.date));

    std::fs::write(&ratings_path, ratings_csv(&data.ratings)?)?;
    std::fs::write(&history_path, history_csv(&data.history)?)?;

    info!(
        ratings = %ratings_path.display(),
        history = %history_path.display(),
        "snapshot written"
    );
    Ok(SnapshotPaths {
        ratings: ratings_path,
        history: history_path,
    })
}

/// Parse a comparison history log (header row plus `Winner,Loser` rows).
///
/// Parsing is all-or-nothing: any malformed row fails the whole log so an
/// import never applies a partial batch.
pub fn parse_history_csv(text: &str) -> Result<Vec<HistoryEntry>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut entries = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let line = index + 2; // 1-based, after the header
        let record = record?;
        if record.len() != 2 {
            return Err(ImportError::MalformedRow {
                line,
                fields: record.len(),
            });
        }
        let winner = record[0].trim();
        let loser = record[1].trim();
        if winner.is_empty() || loser.is_empty() {
            return Err(ImportError::EmptyField { line });
        }
        entries.push(HistoryEntry {
            winner: (winner != SENTINEL_WINNER).then(|| winner.to_string()),
            loser: loser.to_string(),
        });
    }
    Ok(entries)
}
