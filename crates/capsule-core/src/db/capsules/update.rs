use std::time::Instant;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

use super::create::prepared;
use super::read::find_by_id;
use super::{capsule_values, classify_write_error};
use crate::bail_invalid;
use crate::capsule::{now_secs, Capsule, CapsuleUpdate, Patch};
use crate::error::{CapsuleError, Result};
use crate::map_db_err;
use crate::text::normalize;
use crate::trace_time;

const SECONDS_PER_DAY: i64 = 86_400;

const REPLACE_SQL: &str = "UPDATE capsules SET workspace_raw = ?2, workspace_norm = ?3, \
     name_raw = ?4, name_norm = ?5, title = ?6, text = ?7, char_count = ?8, \
     token_estimate = ?9, tags = ?10, source = ?11, run_id = ?12, phase = ?13, role = ?14, \
     created_at = ?15, updated_at = ?16, deleted_at = ?17 \
     WHERE id = ?1";

/// Overwrite every column of the row with `capsule.id`; returns rows changed
pub(super) fn replace_row(conn: &Connection, capsule: &Capsule) -> Result<usize> {
    let values = capsule_values(capsule)?;
    conn.execute(REPLACE_SQL, params_from_iter(values.iter()))
        .map_err(|e| classify_write_error("replace capsule", capsule, e))
}

fn apply<T: Clone>(patch: &Patch<T>, field: &mut Option<T>) {
    if !patch.is_keep() {
        *field = patch.value().cloned();
    }
}

/// Bind value for a patched column: NULL to clear, the value to set
pub(super) fn patch_value(patch: &Patch<String>) -> Value {
    Value::from(patch.value().cloned())
}

impl super::super::Database {
    /// Apply a partial update to an active capsule and return the stored row.
    /// `id`, `created_at`, and identity are never changed.
    #[tracing::instrument(skip(self, update))]
    pub fn update_by_id(&self, id: &str, update: &CapsuleUpdate) -> Result<Capsule> {
        if update.is_empty() {
            bail_invalid!("update for capsule {} changes nothing", id);
        }
        let start = Instant::now();

        let tx = self.write_tx()?;
        let mut capsule =
            find_by_id(&tx, id, false)?.ok_or_else(|| CapsuleError::not_found(id))?;

        if let Some(text) = &update.text {
            capsule.text = text.clone();
            capsule.refresh_metrics();
        }
        apply(&update.title, &mut capsule.title);
        apply(&update.tags, &mut capsule.tags);
        apply(&update.source, &mut capsule.source);
        apply(&update.run_id, &mut capsule.run_id);
        apply(&update.phase, &mut capsule.phase);
        apply(&update.role, &mut capsule.role);
        capsule.updated_at = capsule.updated_at.max(now_secs());

        replace_row(&tx, &capsule)?;
        super::super::commit(tx)?;

        tracing::debug!(id, "capsule updated");
        trace_time!(start, "update_by_id");
        Ok(capsule)
    }

    /// Replace a whole row, identity and timestamps included, trusting the
    /// caller's timestamps. Derived columns are recomputed.
    #[tracing::instrument(skip(self, capsule), fields(id = %capsule.id))]
    pub fn update_full(&self, capsule: &Capsule) -> Result<()> {
        let capsule = prepared(capsule)?;
        if capsule.updated_at < capsule.created_at {
            bail_invalid!("capsule {} has updated_at before created_at", capsule.id);
        }

        let changed = replace_row(&self.conn, &capsule)?;
        if changed == 0 {
            return Err(CapsuleError::not_found(&capsule.id));
        }

        tracing::debug!("capsule replaced");
        Ok(())
    }

    /// Mark an active capsule deleted. Its name becomes free immediately.
    #[tracing::instrument(skip(self))]
    pub fn soft_delete(&self, id: &str) -> Result<()> {
        let now = now_secs();
        let changed = self
            .conn
            .execute(
                "UPDATE capsules SET deleted_at = ?2, updated_at = MAX(?2, updated_at) \
                 WHERE id = ?1 AND deleted_at IS NULL",
                params![id, now],
            )
            .map_err(|e| map_db_err!("soft delete capsule", e))?;

        if changed == 0 {
            return Err(CapsuleError::not_found(id));
        }

        tracing::debug!(id, "capsule soft-deleted");
        Ok(())
    }

    /// Permanently remove soft-deleted capsules, optionally only in one
    /// workspace and only those deleted at least `older_than_days` ago.
    /// Returns the number of rows removed.
    #[tracing::instrument(skip(self))]
    pub fn purge_deleted(
        &self,
        workspace: Option<&str>,
        older_than_days: Option<u32>,
    ) -> Result<usize> {
        let mut sql = String::from("DELETE FROM capsules WHERE deleted_at IS NOT NULL");
        let mut values: Vec<Value> = Vec::new();

        if let Some(ws) = workspace {
            let norm = normalize(ws);
            if norm.is_empty() {
                bail_invalid!("workspace must not be empty");
            }
            values.push(Value::from(norm));
            sql.push_str(&format!(" AND workspace_norm = ?{}", values.len()));
        }
        if let Some(days) = older_than_days {
            let cutoff = now_secs() - i64::from(days) * SECONDS_PER_DAY;
            values.push(Value::from(cutoff));
            sql.push_str(&format!(" AND deleted_at <= ?{}", values.len()));
        }

        let purged = self
            .conn
            .execute(&sql, params_from_iter(values.iter()))
            .map_err(|e| map_db_err!("purge deleted capsules", e))?;

        tracing::debug!(purged, "deleted capsules purged");
        Ok(purged)
    }
}
