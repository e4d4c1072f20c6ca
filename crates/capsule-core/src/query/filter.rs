//! Capsule filtering utilities

use crate::text::normalize;

/// AND-combined optional filters over capsule metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapsuleFilter {
    /// Workspace, compared after normalization
    pub workspace: Option<String>,
    /// Capsule carries this tag
    pub tag: Option<String>,
    /// Normalized name starts with this normalized prefix
    pub name_prefix: Option<String>,
    pub run_id: Option<String>,
    pub phase: Option<String>,
    pub role: Option<String>,
}

impl CapsuleFilter {
    /// Create a filter with nothing set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a filter scoped to one workspace
    pub fn for_workspace(workspace: &str) -> Self {
        Self::new().with_workspace(Some(workspace))
    }

    pub fn with_workspace(mut self, workspace: Option<&str>) -> Self {
        self.workspace = workspace.map(str::to_string);
        self
    }

    pub fn with_tag(mut self, tag: Option<&str>) -> Self {
        self.tag = tag.map(str::to_string);
        self
    }

    pub fn with_name_prefix(mut self, prefix: Option<&str>) -> Self {
        self.name_prefix = prefix.map(str::to_string);
        self
    }

    pub fn with_run_id(mut self, run_id: Option<&str>) -> Self {
        self.run_id = run_id.map(str::to_string);
        self
    }

    pub fn with_phase(mut self, phase: Option<&str>) -> Self {
        self.phase = phase.map(str::to_string);
        self
    }

    pub fn with_role(mut self, role: Option<&str>) -> Self {
        self.role = role.map(str::to_string);
        self
    }

    /// Workspace in identity form; `None` when absent or blank
    pub fn workspace_norm(&self) -> Option<String> {
        present(&self.workspace).map(normalize)
    }

    /// Name prefix in identity form; `None` when absent or blank
    pub fn name_prefix_norm(&self) -> Option<String> {
        present(&self.name_prefix).map(normalize)
    }

    pub fn tag_value(&self) -> Option<&str> {
        present(&self.tag).map(str::trim)
    }

    pub fn run_id_value(&self) -> Option<&str> {
        present(&self.run_id)
    }

    pub fn phase_value(&self) -> Option<&str> {
        present(&self.phase)
    }

    pub fn role_value(&self) -> Option<&str> {
        present(&self.role)
    }

    /// Number of filters that constrain anything. Blank values do not count.
    pub fn active_count(&self) -> usize {
        self.fields()
            .iter()
            .filter(|(_, value)| present(value).is_some())
            .count()
    }

    fn fields(&self) -> [(&'static str, &Option<String>); 6] {
        [
            ("workspace", &self.workspace),
            ("tag", &self.tag),
            ("name_prefix", &self.name_prefix),
            ("run_id", &self.run_id),
            ("phase", &self.phase),
            ("role", &self.role),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.active_count() == 0
    }

    /// `key=value` pairs for the filters that are set, for logs and errors
    pub fn describe(&self) -> String {
        let pairs: Vec<String> = self
            .fields()
            .iter()
            .filter_map(|(key, value)| present(value).map(|v| format!("{}={}", key, v)))
            .collect();

        if pairs.is_empty() {
            "(none)".to_string()
        } else {
            pairs.join(" ")
        }
    }
}

/// A filter value, or `None` when absent or whitespace only
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Page window and visibility for list and search calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// Zero selects the configured default page size
    pub limit: u32,
    pub offset: u32,
    pub include_deleted: bool,
}

impl PageRequest {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit,
            offset,
            include_deleted: false,
        }
    }

    pub fn with_deleted(mut self, include_deleted: bool) -> Self {
        self.include_deleted = include_deleted;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter() {
        let filter = CapsuleFilter::new();
        assert!(filter.is_empty());
        assert_eq!(filter.describe(), "(none)");
    }

    #[test]
    fn test_active_count_and_describe() {
        let filter = CapsuleFilter::for_workspace("Team")
            .with_tag(Some("auth"))
            .with_phase(Some("review"));
        assert_eq!(filter.active_count(), 3);
        assert_eq!(filter.describe(), "workspace=Team tag=auth phase=review");
    }

    #[test]
    fn test_blank_values_are_not_filters() {
        let filter = CapsuleFilter::new()
            .with_name_prefix(Some("  "))
            .with_workspace(Some(""))
            .with_tag(Some("\t"))
            .with_role(Some(" "));
        assert!(filter.is_empty());
        assert_eq!(filter.active_count(), 0);
        assert_eq!(filter.name_prefix_norm(), None);
        assert_eq!(filter.workspace_norm(), None);
        assert_eq!(filter.tag_value(), None);
        assert_eq!(filter.describe(), "(none)");
    }

    #[test]
    fn test_normalized_accessors() {
        let filter = CapsuleFilter::for_workspace("  My   Team ").with_name_prefix(Some("Auth "));
        assert_eq!(filter.workspace_norm().as_deref(), Some("my team"));
        assert_eq!(filter.name_prefix_norm().as_deref(), Some("auth"));
    }
}
