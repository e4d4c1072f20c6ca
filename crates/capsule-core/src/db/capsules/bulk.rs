use std::time::Instant;

use rusqlite::types::Value;
use rusqlite::{params, OptionalExtension};

use super::update::patch_value;
use super::{tags_to_json, WhereClause};
use crate::bail_invalid;
use crate::cancel::CancelToken;
use crate::capsule::{now_secs, BulkUpdate, Patch};
use crate::error::{CapsuleError, Result};
use crate::map_db_err;
use crate::query::CapsuleFilter;
use crate::text::normalize;
use crate::trace_time;

/// Refuse filter-less bulk mutation
fn require_filters(operation: &str, filter: &CapsuleFilter) -> Result<()> {
    if filter.is_empty() {
        tracing::warn!(operation, "bulk mutation rejected: no filters given");
        bail_invalid!("{} requires at least one filter", operation);
    }
    Ok(())
}

impl super::super::Database {
    /// Soft-delete every active capsule matching `filter`; returns the count
    #[tracing::instrument(skip(self, filter), fields(filter = %filter.describe()))]
    pub fn bulk_soft_delete(&self, filter: &CapsuleFilter) -> Result<usize> {
        require_filters("bulk delete", filter)?;
        let start = Instant::now();

        let mut clause = WhereClause::from_filter(filter, false);
        let now = clause.bind(Value::from(now_secs()));
        let sql = format!(
            "UPDATE capsules AS c SET deleted_at = {now}, updated_at = MAX({now}, c.updated_at){}",
            clause.sql(),
            now = now
        );

        let deleted = self
            .conn
            .execute(&sql, clause.params())
            .map_err(|e| map_db_err!("bulk soft delete", e))?;

        tracing::debug!(deleted, "capsules bulk soft-deleted");
        trace_time!(start, "bulk_soft_delete");
        Ok(deleted)
    }

    /// Apply metadata changes to every active capsule matching `filter`.
    /// `Patch::Keep` fields are untouched, `Patch::Clear` fields become NULL.
    #[tracing::instrument(skip(self, filter, update), fields(filter = %filter.describe()))]
    pub fn bulk_update(&self, filter: &CapsuleFilter, update: &BulkUpdate) -> Result<usize> {
        require_filters("bulk update", filter)?;
        if update.is_empty() {
            bail_invalid!("bulk update changes nothing");
        }
        let start = Instant::now();

        let mut clause = WhereClause::from_filter(filter, false);
        let mut assignments = Vec::new();

        if !update.tags.is_keep() {
            let json = match &update.tags {
                Patch::Set(tags) => tags_to_json(Some(tags))?,
                _ => None,
            };
            assignments.push(format!("tags = {}", clause.bind(Value::from(json))));
        }
        for (column, patch) in [
            ("source", &update.source),
            ("run_id", &update.run_id),
            ("phase", &update.phase),
            ("role", &update.role),
        ] {
            if !patch.is_keep() {
                let param = clause.bind(patch_value(patch));
                assignments.push(format!("{} = {}", column, param));
            }
        }
        let now = clause.bind(Value::from(now_secs()));
        assignments.push(format!("updated_at = MAX({}, c.updated_at)", now));

        let sql = format!(
            "UPDATE capsules AS c SET {}{}",
            assignments.join(", "),
            clause.sql()
        );
        let updated = self
            .conn
            .execute(&sql, clause.params())
            .map_err(|e| map_db_err!("bulk update", e))?;

        tracing::debug!(updated, "capsules bulk updated");
        trace_time!(start, "bulk_update");
        Ok(updated)
    }

    /// First free name among `base`, `base-1`, `base-2`, ... in `workspace`.
    ///
    /// Probes at most `unique_name_attempts` candidates, checking the token
    /// before each, and fails with `Conflict` when all are taken. The answer
    /// is advisory: a concurrent writer may claim the name before it is used.
    pub fn find_unique_name(
        &self,
        workspace: &str,
        base: &str,
        cancel: &CancelToken,
    ) -> Result<String> {
        let workspace_norm = normalize(workspace);
        if workspace_norm.is_empty() {
            bail_invalid!("workspace must not be empty");
        }
        let base = base.trim();
        if normalize(base).is_empty() {
            bail_invalid!("base name must not be empty");
        }

        let mut stmt = self
            .conn
            .prepare(
                "SELECT 1 FROM capsules \
                 WHERE workspace_norm = ?1 AND name_norm = ?2 AND deleted_at IS NULL",
            )
            .map_err(|e| map_db_err!("prepare name probe", e))?;

        for attempt in 0..self.config.unique_name_attempts {
            cancel.check()?;
            let candidate = if attempt == 0 {
                base.to_string()
            } else {
                format!("{}-{}", base, attempt)
            };

            let taken = stmt
                .query_row(params![workspace_norm, normalize(&candidate)], |_| Ok(()))
                .optional()
                .map_err(|e| map_db_err!("probe capsule name", e))?
                .is_some();
            if !taken {
                return Ok(candidate);
            }
        }

        tracing::warn!(
            workspace,
            base,
            attempts = self.config.unique_name_attempts,
            "no free capsule name"
        );
        Err(CapsuleError::conflict("unique name", base))
    }
}
