//! Capsule table operations, split by concern

mod bulk;
mod create;
mod list;
mod read;
mod search;
mod update;

use rusqlite::types::{Type, Value};
use rusqlite::{ffi, params_from_iter, ErrorCode, ParamsFromIter, Row};

use crate::capsule::{Capsule, CapsuleSummary};
use crate::error::{CapsuleError, Result};
use crate::query::CapsuleFilter;

pub use create::ImportOutcome;
pub use read::StoreStats;

/// Full-row column list, in `capsule_from_row` order
pub(super) const CAPSULE_COLUMNS: &str = "c.id, c.workspace_raw, c.workspace_norm, c.name_raw, \
     c.name_norm, c.title, c.text, c.char_count, c.token_estimate, c.tags, c.source, c.run_id, \
     c.phase, c.role, c.created_at, c.updated_at, c.deleted_at";

/// Summary column list, in `summary_from_row` order
pub(super) const SUMMARY_COLUMNS: &str = "c.id, c.workspace_raw, c.name_raw, c.title, \
     c.char_count, c.token_estimate, c.tags, c.source, c.run_id, c.phase, c.role, \
     c.created_at, c.updated_at, c.deleted_at";

fn parse_tags(row: &Row, idx: usize) -> rusqlite::Result<Option<Vec<String>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|json| {
        serde_json::from_str(&json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn tags_to_json(tags: Option<&Vec<String>>) -> Result<Option<String>> {
    tags.map(|t| serde_json::to_string(t).map_err(CapsuleError::from))
        .transpose()
}

pub(super) fn capsule_from_row(row: &Row) -> rusqlite::Result<Capsule> {
    Ok(Capsule {
        id: row.get(0)?,
        workspace_raw: row.get(1)?,
        workspace_norm: row.get(2)?,
        name_raw: row.get(3)?,
        name_norm: row.get(4)?,
        title: row.get(5)?,
        text: row.get(6)?,
        char_count: row.get(7)?,
        token_estimate: row.get(8)?,
        tags: parse_tags(row, 9)?,
        source: row.get(10)?,
        run_id: row.get(11)?,
        phase: row.get(12)?,
        role: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
        deleted_at: row.get(16)?,
    })
}

pub(super) fn summary_from_row(row: &Row) -> rusqlite::Result<CapsuleSummary> {
    Ok(CapsuleSummary {
        id: row.get(0)?,
        workspace: row.get(1)?,
        name: row.get(2)?,
        title: row.get(3)?,
        char_count: row.get(4)?,
        token_estimate: row.get(5)?,
        tags: parse_tags(row, 6)?,
        source: row.get(7)?,
        run_id: row.get(8)?,
        phase: row.get(9)?,
        role: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
        deleted_at: row.get(13)?,
    })
}

/// Classify a failed write of `capsule`: id and active-name collisions are
/// domain errors, everything else is internal
pub(super) fn classify_write_error(op: &str, capsule: &Capsule, err: rusqlite::Error) -> CapsuleError {
    if let rusqlite::Error::SqliteFailure(code, msg) = &err {
        if code.code == ErrorCode::ConstraintViolation {
            if code.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY {
                return CapsuleError::conflict("capsule id", &capsule.id);
            }
            let is_identity = code.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                && msg.as_deref().is_some_and(|m| m.contains("name_norm"));
            if is_identity {
                return CapsuleError::name_exists(
                    &capsule.workspace_raw,
                    capsule.name_raw.as_deref().unwrap_or_default(),
                );
            }
        }
    }
    CapsuleError::internal(op, err)
}

/// Bind values for every capsule column, in `CAPSULE_COLUMNS` order
pub(super) fn capsule_values(capsule: &Capsule) -> Result<Vec<Value>> {
    Ok(vec![
        Value::from(capsule.id.clone()),
        Value::from(capsule.workspace_raw.clone()),
        Value::from(capsule.workspace_norm.clone()),
        Value::from(capsule.name_raw.clone()),
        Value::from(capsule.name_norm.clone()),
        Value::from(capsule.title.clone()),
        Value::from(capsule.text.clone()),
        Value::from(capsule.char_count),
        Value::from(capsule.token_estimate),
        Value::from(tags_to_json(capsule.tags.as_ref())?),
        Value::from(capsule.source.clone()),
        Value::from(capsule.run_id.clone()),
        Value::from(capsule.phase.clone()),
        Value::from(capsule.role.clone()),
        Value::from(capsule.created_at),
        Value::from(capsule.updated_at),
        Value::from(capsule.deleted_at),
    ])
}

/// SQL `WHERE` fragment with numbered parameters, built from filters.
/// Conditions refer to the capsules table as `c`.
#[derive(Debug, Default)]
pub(super) struct WhereClause {
    conditions: Vec<String>,
    params: Vec<Value>,
}

impl WhereClause {
    pub(super) fn from_filter(filter: &CapsuleFilter, include_deleted: bool) -> Self {
        WhereClause::default().with_filter(filter, include_deleted)
    }

    /// Append the conditions for `filter` (and visibility) to this clause
    pub(super) fn with_filter(mut self, filter: &CapsuleFilter, include_deleted: bool) -> Self {
        if !include_deleted {
            self.conditions.push("c.deleted_at IS NULL".to_string());
        }
        if let Some(workspace) = filter.workspace_norm() {
            self.push("c.workspace_norm = ?", Value::from(workspace));
        }
        if let Some(tag) = filter.tag_value() {
            self.push(
                "EXISTS (SELECT 1 FROM json_each(c.tags) WHERE json_each.value = ?)",
                Value::from(tag.to_string()),
            );
        }
        if let Some(prefix) = filter.name_prefix_norm() {
            let len = prefix.chars().count() as i64;
            self.push(
                &format!("substr(c.name_norm, 1, {}) = ?", len),
                Value::from(prefix),
            );
        }
        if let Some(run_id) = filter.run_id_value() {
            self.push("c.run_id = ?", Value::from(run_id.to_string()));
        }
        if let Some(phase) = filter.phase_value() {
            self.push("c.phase = ?", Value::from(phase.to_string()));
        }
        if let Some(role) = filter.role_value() {
            self.push("c.role = ?", Value::from(role.to_string()));
        }
        self
    }

    /// Add a condition with one `?` placeholder; it is numbered in order
    pub(super) fn push(&mut self, condition: &str, value: Value) {
        self.params.push(value);
        let placeholder = format!("?{}", self.params.len());
        self.conditions.push(condition.replacen('?', &placeholder, 1));
    }

    /// Claim the next parameter number for `value` outside the clause
    /// (SET lists, LIMIT, OFFSET)
    pub(super) fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        format!("?{}", self.params.len())
    }

    /// ` WHERE a AND b`, or an empty string with no conditions
    pub(super) fn sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub(super) fn params(&self) -> ParamsFromIter<std::slice::Iter<'_, Value>> {
        params_from_iter(self.params.iter())
    }
}
