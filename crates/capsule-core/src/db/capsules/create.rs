use std::time::Instant;

use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde::Serialize;

use super::{capsule_values, classify_write_error};
use crate::capsule::{Capsule, UpsertOutcome};
use crate::error::Result;
use crate::records::CapsuleRecord;
use crate::trace_time;

const INSERT_SQL: &str = "INSERT INTO capsules (id, workspace_raw, workspace_norm, name_raw, \
     name_norm, title, text, char_count, token_estimate, tags, source, run_id, phase, role, \
     created_at, updated_at, deleted_at) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)";

/// Replace-on-identity. The conflict target must repeat the partial index
/// predicate or SQLite will not match it.
const UPSERT_SUFFIX: &str = " ON CONFLICT(workspace_norm, name_norm) \
     WHERE name_norm IS NOT NULL AND deleted_at IS NULL DO UPDATE SET \
     title = excluded.title, \
     text = excluded.text, \
     char_count = excluded.char_count, \
     token_estimate = excluded.token_estimate, \
     tags = excluded.tags, \
     source = excluded.source, \
     run_id = excluded.run_id, \
     phase = excluded.phase, \
     role = excluded.role, \
     updated_at = MAX(excluded.updated_at, capsules.updated_at) \
     RETURNING id";

/// What `import_record` did with a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportOutcome {
    Inserted,
    Replaced,
}

/// Copy of `capsule` with every derived column recomputed
pub(super) fn prepared(capsule: &Capsule) -> Result<Capsule> {
    let mut capsule = capsule.clone();
    capsule.refresh_derived()?;
    Ok(capsule)
}

pub(super) fn insert_row(conn: &Connection, capsule: &Capsule) -> Result<()> {
    let values = capsule_values(capsule)?;
    conn.execute(INSERT_SQL, params_from_iter(values.iter()))
        .map_err(|e| classify_write_error("insert capsule", capsule, e))?;
    Ok(())
}

impl super::super::Database {
    /// Insert a new capsule. An active capsule with the same workspace and
    /// name yields `NameExists`; a reused id yields `Conflict`.
    #[tracing::instrument(skip(self, capsule), fields(id = %capsule.id))]
    pub fn insert(&self, capsule: &Capsule) -> Result<()> {
        let start = Instant::now();
        let capsule = prepared(capsule)?;

        insert_row(&self.conn, &capsule)?;

        tracing::debug!(
            workspace = %capsule.workspace_norm,
            name = ?capsule.name_norm,
            "capsule inserted"
        );
        trace_time!(start, "insert");
        Ok(())
    }

    /// Insert, or replace the content and metadata of the active capsule
    /// holding the same identity, in a single statement.
    ///
    /// Returns the id of the stored row. On replace the existing id,
    /// `created_at`, and raw identity are kept.
    #[tracing::instrument(skip(self, capsule), fields(id = %capsule.id))]
    pub fn upsert(&self, capsule: &Capsule) -> Result<(String, UpsertOutcome)> {
        let start = Instant::now();
        let capsule = prepared(capsule)?;
        let values = capsule_values(&capsule)?;

        let sql = format!("{}{}", INSERT_SQL, UPSERT_SUFFIX);
        let id: String = self
            .conn
            .query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))
            .map_err(|e| classify_write_error("upsert capsule", &capsule, e))?;

        let outcome = if id == capsule.id {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Updated
        };

        tracing::debug!(stored_id = %id, ?outcome, "capsule upserted");
        trace_time!(start, "upsert");
        Ok((id, outcome))
    }

    /// Restore one exported record. Derived columns are recomputed; an
    /// existing id is replaced in full, otherwise the row is inserted with
    /// the record's own timestamps.
    pub fn import_record(&self, record: CapsuleRecord) -> Result<ImportOutcome> {
        let capsule = record.into_capsule()?;
        let tx = self.write_tx()?;

        let exists = tx
            .query_row(
                "SELECT 1 FROM capsules WHERE id = ?1",
                [&capsule.id],
                |_| Ok(()),
            )
            .optional()
            .map_err(|e| crate::map_db_err!("check capsule id", e))?
            .is_some();

        let outcome = if exists {
            super::update::replace_row(&tx, &capsule)?;
            ImportOutcome::Replaced
        } else {
            insert_row(&tx, &capsule)?;
            ImportOutcome::Inserted
        };
        super::super::commit(tx)?;

        tracing::debug!(id = %capsule.id, ?outcome, "capsule record imported");
        Ok(outcome)
    }
}
