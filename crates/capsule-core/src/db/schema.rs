//! SQLite schema and forward migrations
//!
//! The schema version is a single integer stored in `store_meta`. Migrations
//! run in order inside one transaction each and are idempotent, so a partially
//! applied migration can be re-run safely.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::error::{CapsuleError, Result};
use crate::map_db_err;

pub const CURRENT_SCHEMA_VERSION: i64 = 2;

const META_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS store_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Version 1: capsule table, identity and listing indexes, full-text index
const V1_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS capsules (
    id TEXT PRIMARY KEY,
    workspace_raw TEXT NOT NULL,
    workspace_norm TEXT NOT NULL,
    name_raw TEXT,
    name_norm TEXT,
    title TEXT,
    text TEXT NOT NULL,
    char_count INTEGER NOT NULL,
    token_estimate INTEGER NOT NULL,
    tags TEXT,
    source TEXT,
    run_id TEXT,
    phase TEXT,
    role TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    deleted_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_capsules_workspace_updated
    ON capsules(workspace_norm, updated_at DESC)
    WHERE deleted_at IS NULL;

-- Names are unique among active rows only; deleting frees the name
CREATE UNIQUE INDEX IF NOT EXISTS idx_capsules_identity
    ON capsules(workspace_norm, name_norm)
    WHERE name_norm IS NOT NULL AND deleted_at IS NULL;

CREATE VIRTUAL TABLE IF NOT EXISTS capsules_fts USING fts5(
    text,
    title,
    content='capsules',
    content_rowid='rowid',
    tokenize='porter unicode61'
);

CREATE TRIGGER IF NOT EXISTS capsules_fts_insert AFTER INSERT ON capsules BEGIN
    INSERT INTO capsules_fts(rowid, text, title) VALUES (new.rowid, new.text, new.title);
END;

CREATE TRIGGER IF NOT EXISTS capsules_fts_delete AFTER DELETE ON capsules BEGIN
    INSERT INTO capsules_fts(capsules_fts, rowid, text, title)
        VALUES ('delete', old.rowid, old.text, old.title);
END;

CREATE TRIGGER IF NOT EXISTS capsules_fts_update AFTER UPDATE OF text, title ON capsules BEGIN
    INSERT INTO capsules_fts(capsules_fts, rowid, text, title)
        VALUES ('delete', old.rowid, old.text, old.title);
    INSERT INTO capsules_fts(rowid, text, title) VALUES (new.rowid, new.text, new.title);
END;
"#;

/// Version 2: filter-acceleration and purge indexes
const V2_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_capsules_run_id ON capsules(run_id) WHERE run_id IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_capsules_phase ON capsules(phase) WHERE phase IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_capsules_role ON capsules(role) WHERE role IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_capsules_deleted
    ON capsules(deleted_at)
    WHERE deleted_at IS NOT NULL;
"#;

const MIGRATIONS: &[(i64, &str)] = &[(1, V1_SQL), (2, V2_SQL)];

/// Current schema version, 0 for a fresh database
pub fn read_version(conn: &Connection) -> Result<i64> {
    conn.execute_batch(META_SQL)
        .map_err(|e| map_db_err!("create store_meta", e))?;

    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM store_meta WHERE key = 'schema_version'",
            [],
            |r| r.get(0),
        )
        .optional()
        .map_err(|e| map_db_err!("read schema version", e))?;

    match value {
        None => Ok(0),
        Some(v) => v
            .parse()
            .map_err(|e| CapsuleError::internal("parse schema version", e)),
    }
}

/// Apply every migration newer than the stored version
pub fn migrate(conn: &Connection) -> Result<()> {
    let current = read_version(conn)?;

    if current > CURRENT_SCHEMA_VERSION {
        return Err(CapsuleError::InvalidRequest(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_SCHEMA_VERSION
        )));
    }

    for (version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        let tx = rusqlite::Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
            .map_err(|e| map_db_err!("begin migration", e))?;

        // Another connection may have migrated while we waited for the lock
        if read_version(&tx)? >= *version {
            tx.commit().map_err(|e| map_db_err!("commit migration", e))?;
            continue;
        }

        tx.execute_batch(sql)
            .map_err(|e| map_db_err!("apply migration", e))?;
        tx.execute(
            "INSERT INTO store_meta (key, value) VALUES ('schema_version', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![version.to_string()],
        )
        .map_err(|e| map_db_err!("record schema version", e))?;
        tx.commit().map_err(|e| map_db_err!("commit migration", e))?;

        tracing::info!(
            from = current,
            to = version,
            "Database schema migrated"
        );
    }

    Ok(())
}
