use std::time::Instant;

use rusqlite::types::Value;

use super::{summary_from_row, WhereClause, SUMMARY_COLUMNS};
use crate::bail_invalid;
use crate::capsule::{Page, SearchResult};
use crate::error::{CapsuleError, Result};
use crate::query::{CapsuleFilter, PageRequest};
use crate::trace_time;

const SNIPPET_OPEN: &str = "**";
const SNIPPET_CLOSE: &str = "**";
const SNIPPET_ELLIPSIS: &str = "...";

/// Fragments of SQLite error messages caused by malformed MATCH input
const QUERY_SYNTAX_MARKERS: &[&str] = &[
    "fts5:",
    "unterminated string",
    "no such column",
    "unknown special query",
];

/// Separate caller syntax mistakes from real storage failures
fn classify_search_error(query: &str, op: &str, err: rusqlite::Error) -> CapsuleError {
    let message = err.to_string().to_lowercase();
    if QUERY_SYNTAX_MARKERS.iter().any(|m| message.contains(m)) {
        tracing::debug!(query, error = %err, "malformed search query");
        return CapsuleError::InvalidRequest(format!("malformed search query: {}", query));
    }
    CapsuleError::internal(op, err)
}

fn title_weight(configured: f64) -> f64 {
    if configured.is_finite() && configured > 0.0 {
        configured
    } else {
        1.0
    }
}

impl super::super::Database {
    /// Ranked full-text search over title and text.
    ///
    /// Results are ordered by bm25 with the title weighted above the body,
    /// then by recency. Each hit carries a short highlighted snippet. The
    /// total and the page come from one read snapshot.
    pub fn search_full_text(
        &self,
        query: &str,
        filter: &CapsuleFilter,
        page: PageRequest,
    ) -> Result<Page<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            bail_invalid!("search query must not be empty");
        }
        let start = Instant::now();
        let limit = self.config.page_limit(page.limit);

        let mut clause = WhereClause::default();
        clause.push("capsules_fts MATCH ?", Value::from(query.to_string()));
        let mut clause = clause.with_filter(filter, page.include_deleted);
        let where_sql = clause.sql();
        let from_sql = "FROM capsules_fts JOIN capsules c ON c.rowid = capsules_fts.rowid";

        let tx = self.read_tx()?;

        let total: i64 = tx
            .query_row(
                &format!("SELECT COUNT(*) {}{}", from_sql, where_sql),
                clause.params(),
                |row| row.get(0),
            )
            .map_err(|e| classify_search_error(query, "count search results", e))?;

        let limit_param = clause.bind(Value::from(i64::from(limit)));
        let offset_param = clause.bind(Value::from(i64::from(page.offset)));
        let sql = format!(
            "SELECT {columns}, \
             snippet(capsules_fts, -1, '{open}', '{close}', '{ellipsis}', {tokens}), \
             bm25(capsules_fts, 1.0, {weight:.4}) AS rank \
             {from}{filters} \
             ORDER BY rank, c.updated_at DESC, c.id DESC \
             LIMIT {limit} OFFSET {offset}",
            columns = SUMMARY_COLUMNS,
            open = SNIPPET_OPEN,
            close = SNIPPET_CLOSE,
            ellipsis = SNIPPET_ELLIPSIS,
            tokens = self.config.snippet_tokens(),
            weight = title_weight(self.config.title_weight),
            from = from_sql,
            filters = where_sql,
            limit = limit_param,
            offset = offset_param,
        );

        let items = {
            let mut stmt = tx
                .prepare(&sql)
                .map_err(|e| classify_search_error(query, "prepare search", e))?;
            let rows = stmt
                .query_map(clause.params(), |row| {
                    Ok(SearchResult {
                        capsule: summary_from_row(row)?,
                        snippet: row.get(14)?,
                        rank: row.get(15)?,
                    })
                })
                .map_err(|e| classify_search_error(query, "search capsules", e))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| classify_search_error(query, "read search row", e))?
        };
        tx.finish()
            .map_err(|e| CapsuleError::internal("end read transaction", e))?;

        trace_time!(start, "search", total = total, rows = items.len());
        Ok(Page {
            items,
            total,
            limit,
            offset: page.offset,
        })
    }
}
