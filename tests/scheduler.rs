use std::collections::HashSet;
use std::path::Path;

use pairrank::{Scheduler, SchedulerError};
use tempfile::TempDir;

fn image_dir(names: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for name in names {
        std::fs::write(dir.path().join(name), b"img").unwrap();
    }
    dir
}

fn item(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).to_string_lossy().into_owned()
}

fn key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

#[test]
fn three_items_draw_three_unique_pairs_then_terminal() {
    let dir = image_dir(&["a.png", "b.png", "c.png"]);
    let scheduler: Scheduler = Scheduler::open(dir.path()).unwrap();

    let mut seen = HashSet::new();
    for _ in 0..3 {
        let drawn = scheduler.next_pair().unwrap().expect("queue too short");
        assert_eq!(drawn.progress.total, 3);
        assert!(
            seen.insert(key(&drawn.first, &drawn.second)),
            "pair repeated"
        );
    }
    assert!(scheduler.next_pair().unwrap().is_none());
    assert!(scheduler.next_pair().unwrap().is_none());
}

#[test]
fn queue_covers_full_combinatorial_set() {
    let dir = image_dir(&["a.png", "b.png", "c.png", "d.png", "e.png"]);
    let scheduler: Scheduler = Scheduler::open(dir.path()).unwrap();

    let mut seen = HashSet::new();
    while let Some(drawn) = scheduler.next_pair().unwrap() {
        assert_ne!(drawn.first, drawn.second);
        assert!(seen.insert(key(&drawn.first, &drawn.second)));
    }
    assert_eq!(seen.len(), 10); // C(5,2)
}

#[test]
fn first_slot_never_repeats_back_to_back() {
    let dir = image_dir(&["a.png", "b.png", "c.png", "d.png"]);
    let scheduler: Scheduler = Scheduler::open(dir.path()).unwrap();

    let mut previous_first: Option<String> = None;
    while let Some(drawn) = scheduler.next_pair().unwrap() {
        if let Some(prev) = &previous_first {
            assert_ne!(&drawn.first, prev, "same item led twice in a row");
        }
        previous_first = Some(drawn.first);
    }
}

#[test]
fn progress_counts_recorded_outcomes_not_draws() {
    let dir = image_dir(&["a.png", "b.png", "c.png"]);
    let scheduler: Scheduler = Scheduler::open(dir.path()).unwrap();

    let first = scheduler.next_pair().unwrap().unwrap();
    assert_eq!(first.progress.completed, 0);

    scheduler
        .record_outcome(&first.first, &first.second, false)
        .unwrap();
    let second = scheduler.next_pair().unwrap().unwrap();
    assert_eq!(second.progress.completed, 1);

    let progress = scheduler.progress().unwrap();
    assert_eq!(progress.completed, 1);
    assert_eq!(progress.total, 3);
}

#[test]
fn reorder_sorts_remaining_pairs_by_priority() {
    let dir = image_dir(&["a.png", "b.png", "c.png", "d.png", "e.png", "f.png"]);
    let scheduler: Scheduler = Scheduler::open(dir.path()).unwrap();

    // Skew ratings and counts so priorities differ between pairs.
    let a = item(&dir, "a.png");
    let b = item(&dir, "b.png");
    let c = item(&dir, "c.png");
    for _ in 0..3 {
        scheduler.record_outcome(&a, &b, false).unwrap();
        scheduler.record_outcome(&a, &c, false).unwrap();
    }

    // Consume a few pairs, then reorder the tail.
    scheduler.next_pair().unwrap().unwrap();
    scheduler.next_pair().unwrap().unwrap();
    let before = scheduler.progress().unwrap();
    scheduler.reorder().unwrap();
    let after = scheduler.progress().unwrap();
    assert_eq!(after.total, before.total - 2);

    let rows = scheduler.rankings().unwrap();
    let mean = |name: &str| {
        rows.iter()
            .find(|r| r.item == name)
            .map(|r| r.mean)
            .unwrap_or(0.0)
    };
    let count = |name: &str| {
        rows.iter()
            .find(|r| r.item == name)
            .map(|r| r.count)
            .unwrap_or(0) as f64
    };
    let priority =
        |x: &str, y: &str| (mean(x) - mean(y)).abs() + 0.8 * (count(x) + count(y));

    // Ratings stay fixed while draining, so drawn-order priorities must be
    // non-decreasing.
    let mut last = f64::NEG_INFINITY;
    while let Some(drawn) = scheduler.next_pair().unwrap() {
        let p = priority(&drawn.first, &drawn.second);
        assert!(
            p >= last - 1e-9,
            "priority regressed: {p} after {last}"
        );
        last = p;
    }
}

#[test]
fn exclude_item_rebuilds_queue_without_it() {
    let dir = image_dir(&["a.png", "b.png", "c.png", "d.png"]);
    let scheduler: Scheduler = Scheduler::open(dir.path()).unwrap();
    let b = item(&dir, "b.png");

    scheduler.exclude_item(&b).unwrap();
    assert!(scheduler.exclusions().unwrap().contains(&b));

    let progress = scheduler.progress().unwrap();
    assert_eq!(progress.total, 3); // C(3,2) over the remaining items
    while let Some(drawn) = scheduler.next_pair().unwrap() {
        assert_ne!(drawn.first, b);
        assert_ne!(drawn.second, b);
    }
}

#[test]
fn clear_exclusions_restores_full_queue() {
    let dir = image_dir(&["a.png", "b.png", "c.png"]);
    let scheduler: Scheduler = Scheduler::open(dir.path()).unwrap();
    let a = item(&dir, "a.png");

    scheduler.exclude_item(&a).unwrap();
    assert_eq!(scheduler.progress().unwrap().total, 1);

    scheduler.clear_exclusions().unwrap();
    assert!(scheduler.exclusions().unwrap().is_empty());
    assert_eq!(scheduler.progress().unwrap().total, 3);
}

#[test]
fn remove_item_prunes_queue_and_rating_record() {
    let dir = image_dir(&["a.png", "b.png", "c.png", "d.png"]);
    let scheduler: Scheduler = Scheduler::open(dir.path()).unwrap();
    let a = item(&dir, "a.png");
    let c = item(&dir, "c.png");

    scheduler.record_outcome(&a, &c, false).unwrap();
    scheduler.remove_item(&c).unwrap();

    assert!(scheduler.rankings().unwrap().iter().all(|r| r.item != c));
    while let Some(drawn) = scheduler.next_pair().unwrap() {
        assert_ne!(drawn.first, c);
        assert_ne!(drawn.second, c);
    }

    // The sentinel row makes the removal part of the durable history.
    let history = scheduler.export_history_csv().unwrap();
    assert!(history.lines().any(|l| l == format!("None,{c}")));
}

#[test]
fn exclude_loser_on_outcome_rebuilds_immediately() {
    let dir = image_dir(&["a.png", "b.png", "c.png"]);
    let scheduler: Scheduler = Scheduler::open(dir.path()).unwrap();
    let a = item(&dir, "a.png");
    let b = item(&dir, "b.png");

    scheduler.record_outcome(&a, &b, true).unwrap();

    assert!(scheduler.exclusions().unwrap().contains(&b));
    while let Some(drawn) = scheduler.next_pair().unwrap() {
        assert!(!drawn.first.ends_with("b.png"));
        assert!(!drawn.second.ends_with("b.png"));
    }
    // Soft exclusion keeps the rating record.
    assert!(scheduler.rankings().unwrap().iter().any(|r| r.item == b));
}

#[test]
fn switch_session_resets_queue_engine_and_exclusions() {
    let old = image_dir(&["a.png", "b.png", "c.png"]);
    let new = image_dir(&["x.png", "y.png", "z.png", "w.png"]);
    let scheduler: Scheduler = Scheduler::open(old.path()).unwrap();

    let a = item(&old, "a.png");
    let b = item(&old, "b.png");
    scheduler.record_outcome(&a, &b, false).unwrap();
    scheduler.exclude_item(&b).unwrap();

    scheduler.switch_session(new.path()).unwrap();

    assert_eq!(scheduler.current_root().unwrap(), new.path());
    assert!(scheduler.rankings().unwrap().is_empty());
    assert!(scheduler.exclusions().unwrap().is_empty());
    let progress = scheduler.progress().unwrap();
    assert_eq!(progress.completed, 0);
    assert_eq!(progress.total, 6); // C(4,2)
}

#[test]
fn switch_session_rejects_bad_roots_without_state_change() {
    let dir = image_dir(&["a.png", "b.png"]);
    let scheduler: Scheduler = Scheduler::open(dir.path()).unwrap();

    let missing = dir.path().join("nope");
    assert!(matches!(
        scheduler.switch_session(&missing),
        Err(SchedulerError::MissingRoot(_))
    ));

    let file = dir.path().join("a.png");
    assert!(matches!(
        scheduler.switch_session(&file),
        Err(SchedulerError::NotADirectory(_))
    ));

    assert_eq!(scheduler.current_root().unwrap(), dir.path());
    assert_eq!(scheduler.progress().unwrap().total, 1);
}

#[test]
fn empty_directory_is_a_terminal_state_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler: Scheduler = Scheduler::open(dir.path()).unwrap();
    assert!(scheduler.next_pair().unwrap().is_none());
    assert_eq!(scheduler.progress().unwrap().total, 0);
}

#[test]
fn open_rejects_missing_root() {
    let dir = tempfile::tempdir().unwrap();
    let missing: &Path = &dir.path().join("missing");
    assert!(matches!(
        Scheduler::<pairrank::SkillTracker>::open(missing),
        Err(SchedulerError::MissingRoot(_))
    ));
}
