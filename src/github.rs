//! GitHub Actions context

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::changes::ChangedFiles;

/// The part of the webhook payload we care about.
///
/// Everything else in the event is ignored; `pull_request` is absent for
/// non-PR events such as `push`.
#[derive(Debug, Default, Deserialize)]
pub struct PullRequestEvent {
    #[serde(default)]
    pub pull_request: Option<PullRequest>,
}

#[derive(Debug, Deserialize)]
pub struct PullRequest {
    pub base: CommitRef,
}

#[derive(Debug, Deserialize)]
pub struct CommitRef {
    pub sha: String,
}

impl PullRequestEvent {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read event payload: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse event payload")
    }

    pub fn base_sha(&self) -> Option<&str> {
        self.pull_request
            .as_ref()
            .map(|pr| pr.base.sha.as_str())
            .filter(|sha| !sha.is_empty())
    }
}

/// Base commit from the payload at `path`.
///
/// An unreadable payload is reported and treated as having no base, which
/// later makes resolution come back empty.
pub fn base_sha_from_event(path: &Path) -> Option<String> {
    match PullRequestEvent::load(path) {
        Ok(event) => event.base_sha().map(str::to_string),
        Err(e) => {
            eprintln!("{} {:#}", "warning:".yellow().bold(), e);
            None
        }
    }
}

/// Query the hosting service for the pull request's files.
///
/// Not implemented: token mode always reports no changes.
pub async fn changed_files_from_api(_token: &str, _patterns: &[String]) -> ChangedFiles {
    ChangedFiles::default()
}
