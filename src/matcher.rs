//! Glob and on-disk filtering of changed paths

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::glob::Glob;

/// Decides whether a reported path is relevant.
///
/// A path passes when it matches at least one pattern and the file still
/// exists under `root`. A pattern (or brace alternative) without a `/` is
/// matched against the file name, so `*.php` picks up `src/Foo.php`.
#[derive(Debug, Clone)]
pub struct FileMatcher {
    globs: Vec<Glob>,
    root: PathBuf,
}

impl FileMatcher {
    pub fn new(patterns: &[String], root: &Path) -> Result<Self> {
        let mut globs = Vec::new();
        for pattern in patterns {
            globs.extend(Glob::compile(pattern)?);
        }

        Ok(Self {
            globs,
            root: root.to_path_buf(),
        })
    }

    /// Glob check only
    pub fn matches_pattern(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.globs.iter().any(|glob| glob.is_match(path))
    }

    /// Whether the file is still present in the working tree
    pub fn exists(&self, path: &str) -> bool {
        self.root.join(path).exists()
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.matches_pattern(path) && self.exists(path)
    }
}

/// Remove leading ./
fn normalize_path(path: &str) -> &str {
    path.trim_start_matches("./")
}
