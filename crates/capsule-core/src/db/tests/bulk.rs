use super::{named, open_temp};
use crate::cancel::CancelToken;
use crate::capsule::{BulkUpdate, Patch};
use crate::config::StoreConfig;
use crate::db::Database;
use crate::error::CapsuleError;
use crate::query::CapsuleFilter;

#[test]
fn test_bulk_mutations_refuse_empty_filter() {
    let (_dir, db) = open_temp();
    db.insert(&named("team", "a", "a")).unwrap();

    let err = db.bulk_soft_delete(&CapsuleFilter::new()).unwrap_err();
    assert!(matches!(err, CapsuleError::InvalidRequest(_)));

    let update = BulkUpdate {
        phase: Patch::Set("done".to_string()),
        ..Default::default()
    };
    let err = db.bulk_update(&CapsuleFilter::new(), &update).unwrap_err();
    assert!(matches!(err, CapsuleError::InvalidRequest(_)));

    assert_eq!(db.stats(None).unwrap().active, 1);
}

#[test]
fn test_bulk_mutations_refuse_blank_filters() {
    let (_dir, db) = open_temp();
    db.insert(&named("team", "a", "a")).unwrap();
    db.insert(&named("other", "b", "b")).unwrap();

    let blank = CapsuleFilter::new()
        .with_name_prefix(Some("  "))
        .with_workspace(Some(" "));

    let err = db.bulk_soft_delete(&blank).unwrap_err();
    assert!(matches!(err, CapsuleError::InvalidRequest(_)), "{:?}", err);

    let update = BulkUpdate {
        role: Patch::Set("archived".to_string()),
        ..Default::default()
    };
    let err = db.bulk_update(&blank, &update).unwrap_err();
    assert!(matches!(err, CapsuleError::InvalidRequest(_)), "{:?}", err);

    assert_eq!(db.stats(None).unwrap().active, 2);
    assert_eq!(db.get_by_name("team", "a", false).unwrap().role, None);
}

#[test]
fn test_bulk_update_refuses_empty_update() {
    let (_dir, db) = open_temp();
    let err = db
        .bulk_update(&CapsuleFilter::for_workspace("team"), &BulkUpdate::default())
        .unwrap_err();
    assert!(matches!(err, CapsuleError::InvalidRequest(_)));
}

#[test]
fn test_bulk_soft_delete_by_tag() {
    let (_dir, db) = open_temp();
    let a = named("team", "a", "a")
        .with_tags(["stale"])
        .with_timestamps(100, 100);
    let b = named("team", "b", "b")
        .with_tags(["stale", "keep"])
        .with_timestamps(100, 100);
    let c = named("team", "c", "c")
        .with_tags(["fresh"])
        .with_timestamps(100, 100);
    let d = named("other", "d", "d").with_tags(["stale"]);
    for capsule in [&a, &b, &c, &d] {
        db.insert(capsule).unwrap();
    }

    let filter = CapsuleFilter::for_workspace("team").with_tag(Some("stale"));
    assert_eq!(db.bulk_soft_delete(&filter).unwrap(), 2);
    // Already deleted rows are not counted again
    assert_eq!(db.bulk_soft_delete(&filter).unwrap(), 0);

    for id in [&a.id, &b.id] {
        let deleted = db.get_by_id(id, true).unwrap();
        let deleted_at = deleted.deleted_at.unwrap();
        assert!(deleted_at > 100);
        assert_eq!(deleted.updated_at, deleted_at);
        assert_eq!(deleted.created_at, 100);
    }
    let kept = db.get_by_id(&c.id, true).unwrap();
    assert!(!kept.is_deleted());
    assert_eq!(kept.updated_at, 100);
    assert!(!db.get_by_id(&d.id, true).unwrap().is_deleted());
}

#[test]
fn test_bulk_update_distinguishes_clear_and_keep() {
    let (_dir, db) = open_temp();
    let a = named("team", "a", "a")
        .with_run_id("run-1")
        .with_source("planner")
        .with_role("coder")
        .with_timestamps(100, 100);
    let b = named("team", "b", "b")
        .with_run_id("run-1")
        .with_source("planner")
        .with_timestamps(100, 100);
    let c = named("team", "c", "c").with_run_id("run-2").with_source("planner");
    for capsule in [&a, &b, &c] {
        db.insert(capsule).unwrap();
    }

    let update = BulkUpdate {
        source: Patch::Clear,
        phase: Patch::Set("done".to_string()),
        tags: Patch::from_tags(Some(vec!["archived".into()])),
        ..Default::default()
    };
    let filter = CapsuleFilter::new().with_run_id(Some("run-1"));
    assert_eq!(db.bulk_update(&filter, &update).unwrap(), 2);

    let stored = db.get_by_id(&a.id, false).unwrap();
    assert_eq!(stored.source, None);
    assert_eq!(stored.phase.as_deref(), Some("done"));
    assert_eq!(stored.tags, Some(vec!["archived".to_string()]));
    assert_eq!(stored.role.as_deref(), Some("coder"));
    assert_eq!(stored.run_id.as_deref(), Some("run-1"));
    assert!(stored.updated_at > 100);
    assert_eq!(stored.created_at, 100);

    let untouched = db.get_by_id(&c.id, false).unwrap();
    assert_eq!(untouched.source.as_deref(), Some("planner"));
    assert_eq!(untouched.phase, None);
}

#[test]
fn test_bulk_update_clears_tags() {
    let (_dir, db) = open_temp();
    let a = named("team", "a", "a").with_tags(["x"]);
    db.insert(&a).unwrap();

    let update = BulkUpdate {
        tags: Patch::from_tags(Some(vec![])),
        ..Default::default()
    };
    db.bulk_update(&CapsuleFilter::for_workspace("team"), &update)
        .unwrap();

    assert_eq!(db.get_by_id(&a.id, false).unwrap().tags, None);
}

#[test]
fn test_bulk_update_skips_deleted_rows() {
    let (_dir, db) = open_temp();
    let a = named("team", "a", "a");
    db.insert(&a).unwrap();
    db.soft_delete(&a.id).unwrap();

    let update = BulkUpdate {
        role: Patch::Set("reviewer".to_string()),
        ..Default::default()
    };
    assert_eq!(
        db.bulk_update(&CapsuleFilter::for_workspace("team"), &update)
            .unwrap(),
        0
    );
}

#[test]
fn test_find_unique_name_probes_suffixes() {
    let (_dir, db) = open_temp();
    let cancel = CancelToken::new();

    assert_eq!(db.find_unique_name("team", "auth", &cancel).unwrap(), "auth");

    db.insert(&named("team", "auth", "a")).unwrap();
    db.insert(&named("team", "AUTH-1", "b")).unwrap();
    assert_eq!(
        db.find_unique_name("team", "auth", &cancel).unwrap(),
        "auth-2"
    );

    // Other workspaces do not count
    assert_eq!(
        db.find_unique_name("other", "auth", &cancel).unwrap(),
        "auth"
    );
}

#[test]
fn test_find_unique_name_ignores_deleted_names() {
    let (_dir, db) = open_temp();
    let a = named("team", "auth", "a");
    db.insert(&a).unwrap();
    db.soft_delete(&a.id).unwrap();

    assert_eq!(
        db.find_unique_name("team", "auth", &CancelToken::new())
            .unwrap(),
        "auth"
    );
}

#[test]
fn test_find_unique_name_exhaustion_is_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        unique_name_attempts: 2,
        ..StoreConfig::default()
    };
    let db = Database::open(&dir.path().join("capsules.db"), &config).unwrap();
    db.insert(&named("team", "auth", "a")).unwrap();
    db.insert(&named("team", "auth-1", "b")).unwrap();

    let err = db
        .find_unique_name("team", "auth", &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, CapsuleError::Conflict { .. }), "{:?}", err);
}

#[test]
fn test_find_unique_name_observes_cancellation() {
    let (_dir, db) = open_temp();
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = db.find_unique_name("team", "auth", &cancel).unwrap_err();
    assert!(matches!(err, CapsuleError::Cancelled));
}

#[test]
fn test_find_unique_name_rejects_blank_input() {
    let (_dir, db) = open_temp();
    let cancel = CancelToken::new();
    assert!(matches!(
        db.find_unique_name("", "auth", &cancel),
        Err(CapsuleError::InvalidRequest(_))
    ));
    assert!(matches!(
        db.find_unique_name("team", "  ", &cancel),
        Err(CapsuleError::InvalidRequest(_))
    ));
}
