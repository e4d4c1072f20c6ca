use std::time::Instant;

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::{capsule_from_row, summary_from_row, WhereClause, CAPSULE_COLUMNS, SUMMARY_COLUMNS};
use crate::bail_invalid;
use crate::cancel::CancelToken;
use crate::capsule::{Capsule, CapsuleAddress, CapsuleSummary};
use crate::error::{CapsuleError, Result};
use crate::map_db_err;
use crate::query::CapsuleFilter;
use crate::text::normalize;
use crate::trace_time;

/// Row counts by lifecycle state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub active: i64,
    pub deleted: i64,
}

impl StoreStats {
    pub fn total(&self) -> i64 {
        self.active + self.deleted
    }
}

pub(super) fn find_by_id(
    conn: &Connection,
    id: &str,
    include_deleted: bool,
) -> Result<Option<Capsule>> {
    let visibility = if include_deleted {
        ""
    } else {
        " AND c.deleted_at IS NULL"
    };
    let sql = format!(
        "SELECT {} FROM capsules c WHERE c.id = ?1{}",
        CAPSULE_COLUMNS, visibility
    );

    conn.query_row(&sql, params![id], capsule_from_row)
        .optional()
        .map_err(|e| map_db_err!("get capsule by id", e))
}

fn require_norm(field: &str, value: &str) -> Result<String> {
    let norm = normalize(value);
    if norm.is_empty() {
        bail_invalid!("{} must not be empty", field);
    }
    Ok(norm)
}

impl super::super::Database {
    /// Fetch a capsule by id
    pub fn get_by_id(&self, id: &str, include_deleted: bool) -> Result<Capsule> {
        find_by_id(&self.conn, id, include_deleted)?.ok_or_else(|| CapsuleError::not_found(id))
    }

    /// Fetch a capsule by workspace and name.
    ///
    /// With `include_deleted`, an active row still wins over deleted rows of
    /// the same name; otherwise the most recently deleted row is returned.
    pub fn get_by_name(&self, workspace: &str, name: &str, include_deleted: bool) -> Result<Capsule> {
        let workspace_norm = require_norm("workspace", workspace)?;
        let name_norm = require_norm("name", name)?;

        let visibility = if include_deleted {
            ""
        } else {
            " AND c.deleted_at IS NULL"
        };
        let sql = format!(
            "SELECT {} FROM capsules c \
             WHERE c.workspace_norm = ?1 AND c.name_norm = ?2{} \
             ORDER BY (c.deleted_at IS NOT NULL), c.deleted_at DESC, c.id DESC \
             LIMIT 1",
            CAPSULE_COLUMNS, visibility
        );

        self.conn
            .query_row(&sql, params![workspace_norm, name_norm], capsule_from_row)
            .optional()
            .map_err(|e| map_db_err!("get capsule by name", e))?
            .ok_or_else(|| CapsuleError::not_found(format!("{}/{}", workspace, name)))
    }

    /// Fetch the capsule an address points at. The address must name either
    /// an id or a workspace and name, never both.
    pub fn resolve(&self, address: &CapsuleAddress, include_deleted: bool) -> Result<Capsule> {
        match (&address.id, &address.workspace, &address.name) {
            (Some(id), None, None) => self.get_by_id(id, include_deleted),
            (None, Some(workspace), Some(name)) => {
                self.get_by_name(workspace, name, include_deleted)
            }
            (Some(_), _, _) => Err(CapsuleError::Ambiguous(
                "address gives both an id and a name; use one".to_string(),
            )),
            (None, _, _) => Err(CapsuleError::Ambiguous(
                "address needs an id, or a workspace and a name".to_string(),
            )),
        }
    }

    /// Fetch several capsules by id, in the order given. Unknown ids are
    /// skipped. The token is checked before each lookup.
    pub fn get_many(
        &self,
        ids: &[String],
        include_deleted: bool,
        cancel: &CancelToken,
    ) -> Result<Vec<Capsule>> {
        let start = Instant::now();
        let mut capsules = Vec::with_capacity(ids.len());

        for id in ids {
            cancel.check()?;
            if let Some(capsule) = find_by_id(&self.conn, id, include_deleted)? {
                capsules.push(capsule);
            }
        }

        trace_time!(start, "get_many", requested = ids.len(), found = capsules.len());
        Ok(capsules)
    }

    /// Most recently updated summary in `workspace` matching `filter`, or
    /// `None` when nothing matches
    pub fn get_latest_summary(
        &self,
        workspace: &str,
        filter: &CapsuleFilter,
        include_deleted: bool,
    ) -> Result<Option<CapsuleSummary>> {
        require_norm("workspace", workspace)?;
        let filter = filter.clone().with_workspace(Some(workspace));
        let clause = WhereClause::from_filter(&filter, include_deleted);

        let sql = format!(
            "SELECT {} FROM capsules c{} ORDER BY c.updated_at DESC, c.id DESC LIMIT 1",
            SUMMARY_COLUMNS,
            clause.sql()
        );
        self.conn
            .query_row(&sql, clause.params(), summary_from_row)
            .optional()
            .map_err(|e| map_db_err!("get latest capsule", e))
    }

    /// Full-text variant of [`get_latest_summary`](Self::get_latest_summary)
    pub fn get_latest_full(
        &self,
        workspace: &str,
        filter: &CapsuleFilter,
        include_deleted: bool,
    ) -> Result<Option<Capsule>> {
        require_norm("workspace", workspace)?;
        let filter = filter.clone().with_workspace(Some(workspace));
        let clause = WhereClause::from_filter(&filter, include_deleted);

        let sql = format!(
            "SELECT {} FROM capsules c{} ORDER BY c.updated_at DESC, c.id DESC LIMIT 1",
            CAPSULE_COLUMNS,
            clause.sql()
        );
        self.conn
            .query_row(&sql, clause.params(), capsule_from_row)
            .optional()
            .map_err(|e| map_db_err!("get latest capsule", e))
    }

    /// Active and deleted counts, optionally for one workspace
    pub fn stats(&self, workspace: Option<&str>) -> Result<StoreStats> {
        let base = "SELECT COALESCE(SUM(deleted_at IS NULL), 0), \
                    COALESCE(SUM(deleted_at IS NOT NULL), 0) FROM capsules";
        let map = |row: &rusqlite::Row| {
            Ok(StoreStats {
                active: row.get(0)?,
                deleted: row.get(1)?,
            })
        };

        let stats = match workspace {
            Some(ws) => {
                let norm = require_norm("workspace", ws)?;
                self.conn.query_row(
                    &format!("{} WHERE workspace_norm = ?1", base),
                    params![norm],
                    map,
                )
            }
            None => self.conn.query_row(base, [], map),
        };
        stats.map_err(|e| map_db_err!("count capsules", e))
    }
}
