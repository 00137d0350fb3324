//! changed-files - pull request file detection
//!
//! Lists the files a pull request adds or modifies so CI steps can run on
//! just those files:
//! - `git diff-tree` against the pull request base, streamed line by line
//! - Glob filtering (`*.php`, `src/**/*.{php,phtml}`)
//! - Files deleted from the working tree are left out
//!
//! Resolution is best effort: failures are reported on stderr and produce
//! an empty result.

pub mod changes;
pub mod config;
pub mod error;
pub mod git;
pub mod github;
pub mod glob;
pub mod matcher;

pub use changes::{collect_changes, resolve, ChangedFileResolver, ChangedFiles};
pub use config::{Config, FileConfig};
pub use error::ResolveError;
pub use matcher::FileMatcher;
