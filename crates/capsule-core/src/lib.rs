//! Capsule Core Library
//!
//! Parsing, validation, and storage for agent handoff capsules: short
//! structured documents covering objective, status, decisions, next actions,
//! locations, and open questions, kept in a namespaced SQLite store with
//! full-text search.

pub mod cancel;
pub mod capsule;
pub mod config;
pub mod db;
pub mod error;
pub mod lint;
pub mod logging;
pub mod query;
pub mod records;
pub mod sections;
pub mod text;

pub use cancel::CancelToken;
pub use capsule::{Capsule, CapsuleAddress, CapsuleSummary, CapsuleUpdate, Page, Patch};
pub use config::StoreConfig;
pub use db::Database;
pub use error::{CapsuleError, ErrorKind, Result};
