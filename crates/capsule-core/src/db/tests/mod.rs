mod bulk;
mod concurrency;

use crate::capsule::Capsule;
use crate::config::StoreConfig;
use crate::db::Database;
use tempfile::TempDir;

/// A capsule body with all six canonical sections filled in
pub(super) fn handoff_text(objective: &str) -> String {
    format!(
        "## Objective\n{}\n\n## Status\nSchema drafted\n\n## Decisions\nUse SQLite\n\n\
         ## Next Actions\nWrite the migration\n\n## Locations\nsrc/db/schema.rs\n\n\
         ## Open Questions\nShould purge run nightly?\n",
        objective
    )
}

/// Fresh on-disk database in its own temp dir; keep the dir alive
pub(super) fn open_temp() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("capsules.db"), &StoreConfig::default()).unwrap();
    (dir, db)
}

pub(super) fn named(workspace: &str, name: &str, objective: &str) -> Capsule {
    Capsule::new(workspace, Some(name), handoff_text(objective)).unwrap()
}
