//! Error types for capsule storage and validation
//!
//! Domain failures keep structured detail (identifiers, filter values,
//! missing sections) because it is safe to show a caller. Unexpected storage
//! failures collapse to [`CapsuleError::Internal`], whose `Display` is generic;
//! the underlying detail is only written to the local log.

mod macros;

use thiserror::Error;

/// Stable classification of a [`CapsuleError`] for transport formatters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidRequest,
    Ambiguous,
    NotFound,
    NameExists,
    Conflict,
    TooLarge,
    TooThin,
    Cancelled,
    Internal,
}

impl ErrorKind {
    /// Snake-case identifier used in structured error output
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Ambiguous => "ambiguous",
            ErrorKind::NotFound => "not_found",
            ErrorKind::NameExists => "name_exists",
            ErrorKind::Conflict => "conflict",
            ErrorKind::TooLarge => "too_large",
            ErrorKind::TooThin => "too_thin",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }

    /// True for failures caused by caller input rather than store state
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidRequest
                | ErrorKind::Ambiguous
                | ErrorKind::TooLarge
                | ErrorKind::TooThin
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during capsule operations
#[derive(Error, Debug)]
pub enum CapsuleError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("ambiguous capsule address: {0}")]
    Ambiguous(String),

    #[error("capsule not found: {target}")]
    NotFound { target: String },

    #[error("capsule name already exists in workspace '{workspace}': {name}")]
    NameExists { workspace: String, name: String },

    #[error("{context} already exists: {value}")]
    Conflict { context: String, value: String },

    #[error("capsule too large: {actual} chars exceeds limit of {limit}")]
    TooLarge { actual: usize, limit: usize },

    #[error("capsule is missing canonical sections: {}", missing.join(", "))]
    TooThin { missing: Vec<String> },

    #[error("operation cancelled")]
    Cancelled,

    /// Unexpected storage failure. `detail` never reaches `Display`.
    #[error("internal storage error")]
    Internal { operation: String, detail: String },
}

impl CapsuleError {
    /// Wrap an unexpected failure, logging its detail locally
    pub fn internal(operation: &str, error: impl std::fmt::Display) -> Self {
        let detail = error.to_string();
        tracing::error!(operation, detail = %detail, "internal storage failure");
        CapsuleError::Internal {
            operation: operation.to_string(),
            detail,
        }
    }

    /// Create an error for a capsule that does not exist
    pub fn not_found(target: impl std::fmt::Display) -> Self {
        CapsuleError::NotFound {
            target: target.to_string(),
        }
    }

    /// Create an error for an active name collision
    pub fn name_exists(workspace: &str, name: &str) -> Self {
        CapsuleError::NameExists {
            workspace: workspace.to_string(),
            name: name.to_string(),
        }
    }

    /// Create an error for a non-name conflict
    pub fn conflict(context: &str, value: impl std::fmt::Display) -> Self {
        CapsuleError::Conflict {
            context: context.to_string(),
            value: value.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CapsuleError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            CapsuleError::Ambiguous(_) => ErrorKind::Ambiguous,
            CapsuleError::NotFound { .. } => ErrorKind::NotFound,
            CapsuleError::NameExists { .. } => ErrorKind::NameExists,
            CapsuleError::Conflict { .. } => ErrorKind::Conflict,
            CapsuleError::TooLarge { .. } => ErrorKind::TooLarge,
            CapsuleError::TooThin { .. } => ErrorKind::TooThin,
            CapsuleError::Cancelled => ErrorKind::Cancelled,
            CapsuleError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Diagnostic detail for internal failures, for local logging only
    pub fn internal_detail(&self) -> Option<&str> {
        match self {
            CapsuleError::Internal { detail, .. } => Some(detail),
            _ => None,
        }
    }

    /// Convert error to JSON for structured transport output.
    /// Internal failures expose only their kind and generic message.
    pub fn to_json(&self) -> serde_json::Value {
        let mut error_obj = serde_json::json!({
            "type": self.kind().as_str(),
            "message": self.to_string(),
        });

        match self {
            CapsuleError::NotFound { target } => {
                error_obj["target"] = serde_json::json!(target);
            }
            CapsuleError::NameExists { workspace, name } => {
                error_obj["workspace"] = serde_json::json!(workspace);
                error_obj["name"] = serde_json::json!(name);
            }
            CapsuleError::TooLarge { actual, limit } => {
                error_obj["actual_chars"] = serde_json::json!(actual);
                error_obj["max_chars"] = serde_json::json!(limit);
            }
            CapsuleError::TooThin { missing } => {
                error_obj["missing_sections"] = serde_json::json!(missing);
            }
            _ => {}
        }

        serde_json::json!({ "error": error_obj })
    }
}

impl From<rusqlite::Error> for CapsuleError {
    fn from(err: rusqlite::Error) -> Self {
        CapsuleError::internal("database", err)
    }
}

impl From<serde_json::Error> for CapsuleError {
    fn from(err: serde_json::Error) -> Self {
        CapsuleError::internal("json", err)
    }
}

impl From<std::io::Error> for CapsuleError {
    fn from(err: std::io::Error) -> Self {
        CapsuleError::internal("io", err)
    }
}

/// Result type alias for capsule operations
pub type Result<T> = std::result::Result<T, CapsuleError>;
