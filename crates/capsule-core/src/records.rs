//! Line-delimited JSON record shape for capsule import and export
//!
//! A record carries every durable column. On import the derived columns
//! (`workspace_norm`, `name_norm`, `char_count`, `token_estimate`) are
//! recomputed from the raw fields, so a hand-edited or stale file cannot
//! introduce drift.

use serde::{Deserialize, Serialize};

use crate::bail_invalid;
use crate::capsule::Capsule;
use crate::error::{CapsuleError, Result};

/// One capsule as it appears on a JSONL line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapsuleRecord {
    pub id: String,
    #[serde(alias = "workspace")]
    pub workspace_raw: String,
    #[serde(default)]
    pub workspace_norm: Option<String>,
    #[serde(default, alias = "name")]
    pub name_raw: Option<String>,
    #[serde(default)]
    pub name_norm: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub text: String,
    #[serde(default)]
    pub char_count: Option<i64>,
    #[serde(default)]
    pub token_estimate: Option<i64>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub deleted_at: Option<i64>,
}

impl From<&Capsule> for CapsuleRecord {
    fn from(c: &Capsule) -> Self {
        CapsuleRecord {
            id: c.id.clone(),
            workspace_raw: c.workspace_raw.clone(),
            workspace_norm: Some(c.workspace_norm.clone()),
            name_raw: c.name_raw.clone(),
            name_norm: c.name_norm.clone(),
            title: c.title.clone(),
            text: c.text.clone(),
            char_count: Some(c.char_count),
            token_estimate: Some(c.token_estimate),
            tags: c.tags.clone(),
            source: c.source.clone(),
            run_id: c.run_id.clone(),
            phase: c.phase.clone(),
            role: c.role.clone(),
            created_at: c.created_at,
            updated_at: c.updated_at,
            deleted_at: c.deleted_at,
        }
    }
}

impl CapsuleRecord {
    /// Parse one JSONL line
    pub fn from_json_line(line: &str) -> Result<Self> {
        serde_json::from_str(line.trim())
            .map_err(|e| CapsuleError::InvalidRequest(format!("invalid capsule record: {}", e)))
    }

    /// Serialize as one JSONL line (no trailing newline)
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Convert to a capsule, recomputing all derived columns.
    /// Values of the derived fields in the record are ignored.
    pub fn into_capsule(self) -> Result<Capsule> {
        if self.id.trim().is_empty() {
            bail_invalid!("capsule record has an empty id");
        }
        if self.updated_at < self.created_at {
            bail_invalid!(
                "capsule record {} has updated_at before created_at",
                self.id
            );
        }

        let mut capsule = Capsule {
            id: self.id,
            workspace_raw: self.workspace_raw,
            workspace_norm: String::new(),
            name_raw: self.name_raw,
            name_norm: None,
            title: self.title,
            text: self.text,
            char_count: 0,
            token_estimate: 0,
            tags: self.tags,
            source: self.source,
            run_id: self.run_id,
            phase: self.phase,
            role: self.role,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        };
        capsule.refresh_derived()?;
        Ok(capsule)
    }
}
