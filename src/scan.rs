//! Item set loading: recursive image discovery under a root directory.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// File extensions treated as comparable images (matched case-insensitively).
const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "jfif", "avif", "heic", "heif",
];

/// Result of an item scan.
///
/// `complete` is false only when a wall-clock budget expired mid-walk; a
/// successful scan of an empty or unreadable directory is complete with zero
/// items. Callers must treat an empty set as "nothing to compare", not as an
/// error.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub items: Vec<String>,
    pub complete: bool,
}

fn is_image(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let lower = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}

/// Enumerate eligible image paths under `root`, skipping `excluded` identifiers.
///
/// Walk errors (permissions, dangling symlinks) are logged and skipped rather
/// than aborting the scan, so an unreadable root yields an empty set.
pub fn scan_items(
    root: &std::path::Path,
    excluded: &HashSet<String>,
    budget: Option<Duration>,
) -> ScanOutcome {
    debug!(root = %root.display(), "scanning for images");
    let started = Instant::now();
    let mut items = Vec::new();
    let mut complete = true;

    for entry in WalkDir::new(root).follow_links(false) {
        if let Some(limit) = budget {
            if started.elapsed() >= limit {
                warn!(
                    root = %root.display(),
                    found = items.len(),
                    "scan budget exhausted, returning partial item set"
                );
                complete = false;
                break;
            }
        }
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_image(entry.path()) {
            continue;
        }
        let path = entry.path().to_string_lossy().into_owned();
        if excluded.contains(&path) {
            continue;
        }
        debug!(image = %path, "found image");
        items.push(path);
    }

    if items.is_empty() {
        warn!(root = %root.display(), "no images found");
    } else {
        info!(count = items.len(), root = %root.display(), "scan finished");
    }

    ScanOutcome { items, complete }
}
