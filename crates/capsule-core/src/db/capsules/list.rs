use std::time::Instant;

use rusqlite::types::Value;

use super::{capsule_from_row, summary_from_row, WhereClause, CAPSULE_COLUMNS, SUMMARY_COLUMNS};
use crate::bail_invalid;
use crate::capsule::{CapsuleSummary, Page};
use crate::error::Result;
use crate::map_db_err;
use crate::query::{CapsuleFilter, PageRequest};
use crate::records::CapsuleRecord;
use crate::text::normalize;
use crate::trace_time;

impl super::super::Database {
    /// One page of summaries in `workspace`, newest first
    pub fn list_by_workspace(
        &self,
        workspace: &str,
        filter: &CapsuleFilter,
        page: PageRequest,
    ) -> Result<Page<CapsuleSummary>> {
        if normalize(workspace).is_empty() {
            bail_invalid!("workspace must not be empty");
        }
        let filter = filter.clone().with_workspace(Some(workspace));
        self.list_all(&filter, page)
    }

    /// One page of summaries across workspaces, newest first.
    ///
    /// Rows with equal `updated_at` are ordered by id descending, so paging
    /// without concurrent writes visits every row exactly once. The total is
    /// counted in the same read transaction as the page.
    pub fn list_all(&self, filter: &CapsuleFilter, page: PageRequest) -> Result<Page<CapsuleSummary>> {
        let start = Instant::now();
        let limit = self.config.page_limit(page.limit);
        let mut clause = WhereClause::from_filter(filter, page.include_deleted);
        let where_sql = clause.sql();

        let tx = self.read_tx()?;

        let total: i64 = tx
            .query_row(
                &format!("SELECT COUNT(*) FROM capsules c{}", where_sql),
                clause.params(),
                |row| row.get(0),
            )
            .map_err(|e| map_db_err!("count capsules", e))?;

        let limit_param = clause.bind(Value::from(i64::from(limit)));
        let offset_param = clause.bind(Value::from(i64::from(page.offset)));
        let sql = format!(
            "SELECT {} FROM capsules c{} ORDER BY c.updated_at DESC, c.id DESC LIMIT {} OFFSET {}",
            SUMMARY_COLUMNS, where_sql, limit_param, offset_param
        );

        let items = {
            let mut stmt = tx
                .prepare(&sql)
                .map_err(|e| map_db_err!("prepare capsule list", e))?;
            let rows = stmt
                .query_map(clause.params(), summary_from_row)
                .map_err(|e| map_db_err!("list capsules", e))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| map_db_err!("read capsule row", e))?
        };
        tx.finish().map_err(|e| map_db_err!("end read transaction", e))?;

        trace_time!(start, "list_capsules", total = total, rows = items.len());
        Ok(Page {
            items,
            total,
            limit,
            offset: page.offset,
        })
    }

    /// Every capsule matching `filter` as export records, oldest first
    pub fn export_records(
        &self,
        filter: &CapsuleFilter,
        include_deleted: bool,
    ) -> Result<Vec<CapsuleRecord>> {
        let clause = WhereClause::from_filter(filter, include_deleted);
        let sql = format!(
            "SELECT {} FROM capsules c{} ORDER BY c.created_at, c.id",
            CAPSULE_COLUMNS,
            clause.sql()
        );

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| map_db_err!("prepare capsule export", e))?;
        let capsules = stmt
            .query_map(clause.params(), capsule_from_row)
            .map_err(|e| map_db_err!("export capsules", e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| map_db_err!("read capsule row", e))?;

        Ok(capsules.iter().map(CapsuleRecord::from).collect())
    }
}
