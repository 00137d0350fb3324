//! Git operations module
//!
//! Provides:
//! - The `diff-tree` command used to list pull request changes
//! - Parsing of its `--name-status` output

pub mod diff;

pub use diff::{DiffLine, DiffStatus, DiffTree};
