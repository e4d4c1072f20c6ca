//! The capsule record and its read-side shapes

mod patch;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::bail_invalid;
use crate::error::Result;
use crate::text::{count_chars, estimate_tokens, normalize};

pub use patch::{BulkUpdate, CapsuleUpdate, Patch};

/// Current time in unix seconds
pub fn now_secs() -> i64 {
    Utc::now().timestamp()
}

/// Generate a new capsule id (ULID: sortable, globally unique)
pub fn new_id() -> String {
    ulid::Ulid::new().to_string()
}

/// Sort and deduplicate a tag list; blank tags are dropped
pub fn normalize_tags(tags: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut tags: Vec<String> = tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    tags.sort();
    tags.dedup();
    tags
}

/// A stored handoff document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capsule {
    pub id: String,
    pub workspace_raw: String,
    pub workspace_norm: String,
    pub name_raw: Option<String>,
    pub name_norm: Option<String>,
    pub title: Option<String>,
    pub text: String,
    pub char_count: i64,
    pub token_estimate: i64,
    /// Unordered set, kept sorted. `None` and `Some(vec![])` are distinct.
    pub tags: Option<Vec<String>>,
    pub source: Option<String>,
    pub run_id: Option<String>,
    pub phase: Option<String>,
    pub role: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

fn require_workspace(workspace: &str) -> Result<String> {
    let norm = normalize(workspace);
    if norm.is_empty() {
        bail_invalid!("workspace must not be empty");
    }
    Ok(norm)
}

fn optional_name(name: Option<&str>) -> Result<Option<String>> {
    match name {
        None => Ok(None),
        Some(raw) => {
            let norm = normalize(raw);
            if norm.is_empty() {
                bail_invalid!("name must not be blank when provided");
            }
            Ok(Some(norm))
        }
    }
}

impl Capsule {
    /// Build a new capsule with a fresh id and current timestamps
    pub fn new(workspace: &str, name: Option<&str>, text: impl Into<String>) -> Result<Self> {
        let workspace_norm = require_workspace(workspace)?;
        let name_norm = optional_name(name)?;
        let now = now_secs();

        let mut capsule = Capsule {
            id: new_id(),
            workspace_raw: workspace.to_string(),
            workspace_norm,
            name_raw: name.map(str::to_string),
            name_norm,
            title: None,
            text: text.into(),
            char_count: 0,
            token_estimate: 0,
            tags: None,
            source: None,
            run_id: None,
            phase: None,
            role: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        capsule.refresh_metrics();
        Ok(capsule)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(normalize_tags(tags.into_iter().map(Into::into)));
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Override both timestamps (restores and tests)
    pub fn with_timestamps(mut self, created_at: i64, updated_at: i64) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }

    /// Recompute char count and token estimate from `text`
    pub fn refresh_metrics(&mut self) {
        self.char_count = count_chars(&self.text) as i64;
        self.token_estimate = estimate_tokens(&self.text) as i64;
    }

    /// Recompute every derived column from the raw fields.
    /// Fails if the raw workspace or name normalize to nothing.
    pub fn refresh_derived(&mut self) -> Result<()> {
        self.workspace_norm = require_workspace(&self.workspace_raw)?;
        self.name_norm = optional_name(self.name_raw.as_deref())?;
        if let Some(tags) = self.tags.take() {
            self.tags = Some(normalize_tags(tags));
        }
        self.refresh_metrics();
        Ok(())
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// `workspace/name` when named, otherwise the id
    pub fn display_ref(&self) -> String {
        match &self.name_raw {
            Some(name) => format!("{}/{}", self.workspace_raw, name),
            None => self.id.clone(),
        }
    }

    pub fn summary(&self) -> CapsuleSummary {
        CapsuleSummary {
            id: self.id.clone(),
            workspace: self.workspace_raw.clone(),
            name: self.name_raw.clone(),
            title: self.title.clone(),
            char_count: self.char_count,
            token_estimate: self.token_estimate,
            tags: self.tags.clone(),
            source: self.source.clone(),
            run_id: self.run_id.clone(),
            phase: self.phase.clone(),
            role: self.role.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }
}

/// Capsule metadata without the text body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapsuleSummary {
    pub id: String,
    pub workspace: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub char_count: i64,
    pub token_estimate: i64,
    pub tags: Option<Vec<String>>,
    pub source: Option<String>,
    pub run_id: Option<String>,
    pub phase: Option<String>,
    pub role: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

/// A summary paired with a highlighted excerpt of the matching text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub capsule: CapsuleSummary,
    pub snippet: String,
    /// bm25 score, lower is more relevant
    pub rank: f64,
}

/// One page of results plus the total under the same filters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: u32,
    pub offset: u32,
}

impl<T> Page<T> {
    /// Whether rows remain past this page
    pub fn has_more(&self) -> bool {
        (self.offset as i64 + self.items.len() as i64) < self.total
    }
}

/// Whether `upsert` created a row or replaced an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// How a caller identifies one capsule: by id, or by workspace and name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapsuleAddress {
    pub id: Option<String>,
    pub workspace: Option<String>,
    pub name: Option<String>,
}

impl CapsuleAddress {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn by_name(workspace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            workspace: Some(workspace.into()),
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CapsuleError;

    #[test]
    fn test_new_capsule_derives_fields() {
        let capsule = Capsule::new("  Team  A ", Some("Auth Flow"), "one two three").unwrap();
        assert_eq!(capsule.workspace_raw, "  Team  A ");
        assert_eq!(capsule.workspace_norm, "team a");
        assert_eq!(capsule.name_raw.as_deref(), Some("Auth Flow"));
        assert_eq!(capsule.name_norm.as_deref(), Some("auth flow"));
        assert_eq!(capsule.char_count, 13);
        assert_eq!(capsule.token_estimate, 4);
        assert_eq!(capsule.created_at, capsule.updated_at);
        assert!(!capsule.is_deleted());
        assert_eq!(capsule.id.len(), 26);
    }

    #[test]
    fn test_blank_workspace_rejected() {
        let err = Capsule::new("   ", None, "x").unwrap_err();
        assert!(matches!(err, CapsuleError::InvalidRequest(_)));
    }

    #[test]
    fn test_blank_name_rejected() {
        let err = Capsule::new("team", Some(" \t"), "x").unwrap_err();
        assert!(matches!(err, CapsuleError::InvalidRequest(_)));
    }

    #[test]
    fn test_ids_are_unique_and_sortable() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 26);
    }

    #[test]
    fn test_tags_are_a_sorted_set() {
        let capsule = Capsule::new("w", None, "")
            .unwrap()
            .with_tags(["b", "a", "b", " ", "c "]);
        assert_eq!(
            capsule.tags,
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );

        let empty = Capsule::new("w", None, "").unwrap().with_tags(Vec::<String>::new());
        assert_eq!(empty.tags, Some(vec![]));
    }

    #[test]
    fn test_refresh_derived_recomputes_stale_values() {
        let mut capsule = Capsule::new("Team", Some("Auth"), "a b").unwrap();
        capsule.workspace_norm = "stale".to_string();
        capsule.name_norm = None;
        capsule.char_count = 999;
        capsule.token_estimate = 999;

        capsule.refresh_derived().unwrap();
        assert_eq!(capsule.workspace_norm, "team");
        assert_eq!(capsule.name_norm.as_deref(), Some("auth"));
        assert_eq!(capsule.char_count, 3);
        assert_eq!(capsule.token_estimate, 3);
    }

    #[test]
    fn test_summary_omits_text() {
        let capsule = Capsule::new("team", Some("auth"), "secret body")
            .unwrap()
            .with_title("Auth");
        let json = serde_json::to_string(&capsule.summary()).unwrap();
        assert!(!json.contains("secret body"));
        assert!(json.contains("\"title\":\"Auth\""));
    }

    #[test]
    fn test_page_has_more() {
        let page = Page {
            items: vec![1, 2],
            total: 5,
            limit: 2,
            offset: 2,
        };
        assert!(page.has_more());

        let last = Page {
            items: vec![5],
            total: 5,
            limit: 2,
            offset: 4,
        };
        assert!(!last.has_more());
    }
}
