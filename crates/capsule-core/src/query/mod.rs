//! Filtering and pagination inputs for listing, search, and bulk mutation

pub mod filter;

pub use filter::{CapsuleFilter, PageRequest};
