//! Store configuration for capsule-core
//!
//! Configuration is an optional TOML file; every field has a default so an
//! empty or partial file is valid.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CapsuleError, Result};

/// File name of the default database inside the data directory
pub const DEFAULT_DB_FILE: &str = "capsules.db";

/// Directory name under the platform data directory
pub const DATA_DIR_NAME: &str = "capsule";

/// Largest snippet length FTS5 accepts
pub const MAX_SNIPPET_TOKENS: u32 = 64;

/// Store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// How long a blocked writer waits for the lock before failing
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Probe bound for unique-name generation (`base`, `base-1`, ...)
    #[serde(default = "default_unique_name_attempts")]
    pub unique_name_attempts: u32,

    /// Default character budget for validation (0 = unlimited)
    #[serde(default)]
    pub max_chars: i64,

    /// Maximum tokens in a search snippet
    #[serde(default = "default_snippet_tokens")]
    pub snippet_tokens: u32,

    /// bm25 weight for the title column (body is 1.0)
    #[serde(default = "default_title_weight")]
    pub title_weight: f64,

    /// Page size used when a caller passes a zero limit
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Upper bound on any page size
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_unique_name_attempts() -> u32 {
    100
}

fn default_snippet_tokens() -> u32 {
    16
}

fn default_title_weight() -> f64 {
    5.0
}

fn default_page_size() -> u32 {
    50
}

fn default_max_page_size() -> u32 {
    500
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: default_busy_timeout_ms(),
            unique_name_attempts: default_unique_name_attempts(),
            max_chars: 0,
            snippet_tokens: default_snippet_tokens(),
            title_weight: default_title_weight(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: StoreConfig = toml::from_str(&content).map_err(|e| {
            CapsuleError::InvalidRequest(format!("invalid config {}: {}", path.display(), e))
        })?;

        if config.unique_name_attempts == 0 {
            tracing::warn!("unique_name_attempts is 0; find_unique_name will always conflict");
        }

        Ok(config)
    }

    /// Load configuration if the file exists, otherwise use defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CapsuleError::internal("serialize config", e))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Default database location: `<data dir>/capsule/capsules.db`
    pub fn default_db_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join(DATA_DIR_NAME).join(DEFAULT_DB_FILE))
    }

    /// Snippet length clamped to what FTS5 supports
    pub fn snippet_tokens(&self) -> u32 {
        self.snippet_tokens.clamp(1, MAX_SNIPPET_TOKENS)
    }

    /// Resolve a caller-supplied page limit against the configured bounds
    pub fn page_limit(&self, requested: u32) -> u32 {
        let limit = if requested == 0 {
            self.default_page_size
        } else {
            requested
        };
        limit.min(self.max_page_size.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.busy_timeout_ms, 5_000);
        assert_eq!(config.unique_name_attempts, 100);
        assert_eq!(config.max_chars, 0);
        assert_eq!(config.title_weight, 5.0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("capsule.toml");

        let config = StoreConfig {
            unique_name_attempts: 7,
            max_chars: 12_000,
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = StoreConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("capsule.toml");
        fs::write(&path, "busy_timeout_ms = 250\n").unwrap();

        let loaded = StoreConfig::load(&path).unwrap();
        assert_eq!(loaded.busy_timeout_ms, 250);
        assert_eq!(loaded.unique_name_attempts, 100);
        assert_eq!(loaded.snippet_tokens, 16);
    }

    #[test]
    fn test_invalid_file_is_invalid_request() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("capsule.toml");
        fs::write(&path, "busy_timeout_ms = \"soon\"\n").unwrap();

        let err = StoreConfig::load(&path).unwrap_err();
        assert!(matches!(err, CapsuleError::InvalidRequest(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempdir().unwrap();
        let loaded = StoreConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, StoreConfig::default());
    }

    #[test]
    fn test_page_limit_clamps() {
        let config = StoreConfig::default();
        assert_eq!(config.page_limit(0), 50);
        assert_eq!(config.page_limit(10), 10);
        assert_eq!(config.page_limit(10_000), 500);
    }

    #[test]
    fn test_snippet_tokens_clamped() {
        let config = StoreConfig {
            snippet_tokens: 500,
            ..Default::default()
        };
        assert_eq!(config.snippet_tokens(), MAX_SNIPPET_TOKENS);
    }
}
