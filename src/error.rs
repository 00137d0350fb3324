//! Errors raised while resolving changed files

use std::time::Duration;

use thiserror::Error;

/// Failure of a single resolution attempt.
///
/// None of these reach callers of [`crate::changes::ChangedFileResolver::resolve`];
/// they are logged and replaced by an empty result.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no base commit in the pull request payload (is this a pull_request event?)")]
    MissingBaseSha,

    #[error("invalid file pattern `{pattern}`: {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read diff output: {0}")]
    Read(#[source] std::io::Error),

    #[error("diff did not finish within {}ms", .0.as_millis())]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, ResolveError>;
