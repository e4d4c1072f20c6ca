//! Partial-update descriptions

/// A three-state field change: leave as is, clear to NULL, or set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    #[default]
    Keep,
    Clear,
    Set(T),
}

impl<T> Patch<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Patch::Keep)
    }

    /// The value to store, or `None` for NULL. Only meaningful when not `Keep`.
    pub fn value(&self) -> Option<&T> {
        match self {
            Patch::Set(v) => Some(v),
            _ => None,
        }
    }
}

impl Patch<String> {
    /// Map transport input: absent keeps, empty string clears, else sets
    pub fn from_input(input: Option<&str>) -> Self {
        match input {
            None => Patch::Keep,
            Some(v) if v.trim().is_empty() => Patch::Clear,
            Some(v) => Patch::Set(v.to_string()),
        }
    }
}

impl Patch<Vec<String>> {
    /// Map transport input: absent keeps, an empty list clears, else sets
    /// the normalized tag set
    pub fn from_tags(input: Option<Vec<String>>) -> Self {
        match input {
            None => Patch::Keep,
            Some(tags) => {
                let tags = super::normalize_tags(tags);
                if tags.is_empty() {
                    Patch::Clear
                } else {
                    Patch::Set(tags)
                }
            }
        }
    }
}

/// Content and metadata changes for a single active capsule
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapsuleUpdate {
    /// New text; metrics are recomputed when present
    pub text: Option<String>,
    pub title: Patch<String>,
    pub tags: Patch<Vec<String>>,
    pub source: Patch<String>,
    pub run_id: Patch<String>,
    pub phase: Patch<String>,
    pub role: Patch<String>,
}

impl CapsuleUpdate {
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.title.is_keep()
            && self.tags.is_keep()
            && self.source.is_keep()
            && self.run_id.is_keep()
            && self.phase.is_keep()
            && self.role.is_keep()
    }
}

/// Metadata changes applied to every capsule matching a filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkUpdate {
    pub tags: Patch<Vec<String>>,
    pub source: Patch<String>,
    pub run_id: Patch<String>,
    pub phase: Patch<String>,
    pub role: Patch<String>,
}

impl BulkUpdate {
    pub fn is_empty(&self) -> bool {
        self.tags.is_keep()
            && self.source.is_keep()
            && self.run_id.is_keep()
            && self.phase.is_keep()
            && self.role.is_keep()
    }
}
