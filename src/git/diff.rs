//! `git diff-tree` invocation and output parsing

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

/// Status letter reported by `--name-status`.
///
/// Deletions are filtered out by the command itself (`--diff-filter=d`)
/// so there is no variant for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffStatus {
    Added,
    Copied,
    Modified,
    Renamed,
}

impl DiffStatus {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'A' => Some(Self::Added),
            'C' => Some(Self::Copied),
            'M' => Some(Self::Modified),
            'R' => Some(Self::Renamed),
            _ => None,
        }
    }

    /// Whether the file counts as new in the pull request
    pub fn is_addition(self) -> bool {
        matches!(self, Self::Added | Self::Copied | Self::Renamed)
    }
}

/// One parsed line of `--name-status` output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub status: DiffStatus,
    pub path: String,
}

impl DiffLine {
    /// Parse a line like `M\tsrc/Foo.php`.
    ///
    /// The line must be a single status letter, at least one whitespace
    /// character, then exactly one whitespace-free path token. Anything else
    /// (scored renames such as `R100`, paths with spaces, trailing blanks)
    /// returns `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut chars = line.chars();
        let status = DiffStatus::from_char(chars.next()?)?;

        let rest = chars.as_str();
        let path = rest.trim_start();
        if path.len() == rest.len() || path.is_empty() {
            return None;
        }
        if path.chars().any(char::is_whitespace) {
            return None;
        }

        Some(Self {
            status,
            path: path.to_string(),
        })
    }
}

/// The diff command comparing the pull request base against HEAD
#[derive(Debug, Clone)]
pub struct DiffTree {
    program: String,
    base_sha: String,
}

impl DiffTree {
    pub fn new(program: impl Into<String>, base_sha: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            base_sha: base_sha.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to git; the open-ended range compares against HEAD
    pub fn args(&self) -> Vec<String> {
        vec![
            "--no-pager".to_string(),
            "diff-tree".to_string(),
            "--no-commit-id".to_string(),
            "--name-status".to_string(),
            "--diff-filter=d".to_string(),
            "-r".to_string(),
            format!("{}..", self.base_sha),
        ]
    }

    /// Build the command with stdout piped and everything else detached.
    /// The child is killed if its handle is dropped, which is how a timeout
    /// terminates it.
    pub fn command(&self, cwd: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args())
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}
