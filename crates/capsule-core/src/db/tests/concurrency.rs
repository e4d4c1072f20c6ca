use std::sync::{Arc, Barrier};
use std::thread;

use super::named;
use crate::capsule::UpsertOutcome;
use crate::config::StoreConfig;
use crate::db::Database;

const WRITERS: usize = 8;

#[test]
fn test_concurrent_upserts_leave_one_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capsules.db");
    let config = StoreConfig::default();

    // Create the schema before the race
    let db = Database::open(&path, &config).unwrap();

    let barrier = Arc::new(Barrier::new(WRITERS));
    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let path = path.clone();
            let config = config.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let db = Database::open(&path, &config).unwrap();
                let capsule = named("team", "shared", &format!("writer {}", i));
                barrier.wait();
                db.upsert(&capsule).unwrap()
            })
        })
        .collect();

    let results: Vec<(String, UpsertOutcome)> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    let inserted = results
        .iter()
        .filter(|(_, outcome)| *outcome == UpsertOutcome::Inserted)
        .count();
    assert_eq!(inserted, 1);

    let winner = &results[0].0;
    assert!(results.iter().all(|(id, _)| id == winner));

    let rows: i64 = db
        .conn
        .query_row(
            "SELECT COUNT(*) FROM capsules WHERE name_norm = 'shared'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(rows, 1);
    assert_eq!(db.get_by_name("team", "shared", false).unwrap().id, *winner);
}

#[test]
fn test_concurrent_inserts_report_name_exists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capsules.db");
    let config = StoreConfig::default();
    let db = Database::open(&path, &config).unwrap();

    let barrier = Arc::new(Barrier::new(WRITERS));
    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let path = path.clone();
            let config = config.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let db = Database::open(&path, &config).unwrap();
                let capsule = named("team", "shared", &format!("writer {}", i));
                barrier.wait();
                db.insert(&capsule)
            })
        })
        .collect();

    let mut ok = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(()) => ok += 1,
            Err(e) => assert!(
                matches!(e, crate::error::CapsuleError::NameExists { .. }),
                "{:?}",
                e
            ),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(db.stats(Some("team")).unwrap().active, 1);
}
