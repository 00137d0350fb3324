//! Changed file resolution
//!
//! Runs `git diff-tree` against the pull request base, streams its output
//! and sorts every relevant path into `added` or `modified`.

use colored::Colorize;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::time::timeout;

use crate::config::Config;
use crate::error::{ResolveError, Result};
use crate::git::{DiffLine, DiffTree};
use crate::github;
use crate::matcher::FileMatcher;

/// Files touched by the pull request, in diff order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangedFiles {
    pub added: Vec<String>,
    pub modified: Vec<String>,
}

impl ChangedFiles {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len()
    }

    /// Added files followed by modified files
    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.added
            .iter()
            .chain(self.modified.iter())
            .map(String::as_str)
    }

    fn push(&mut self, line: DiffLine) {
        if line.status.is_addition() {
            self.added.push(line.path);
        } else {
            self.modified.push(line.path);
        }
    }
}

/// Resolves the changed files for the current pull request
pub struct ChangedFileResolver<'a> {
    config: &'a Config,
}

impl<'a> ChangedFileResolver<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Resolve changed files, never failing.
    ///
    /// Any error is reported on stderr and replaced by an empty result, so
    /// an empty list can mean either "nothing changed" or "could not tell".
    pub async fn resolve(&self) -> ChangedFiles {
        match self.try_resolve().await {
            Ok(files) => files,
            Err(e) => {
                eprintln!("{} {}", "warning:".yellow().bold(), e);
                ChangedFiles::default()
            }
        }
    }

    /// Same as [`resolve`](Self::resolve) but surfaces the failure
    pub async fn try_resolve(&self) -> Result<ChangedFiles> {
        if self.config.uses_token() {
            return Ok(github::changed_files_from_api(&self.config.token, &self.config.patterns).await);
        }

        let base_sha = self
            .config
            .base_sha
            .as_deref()
            .ok_or(ResolveError::MissingBaseSha)?;

        let matcher = FileMatcher::new(&self.config.patterns, &self.config.working_dir)?;
        let diff = DiffTree::new(&self.config.git_program, base_sha);

        match timeout(self.config.timeout, self.run_diff(&diff, &matcher)).await {
            Ok(result) => result,
            // dropping the future drops the child, which kills it
            Err(_) => Err(ResolveError::Timeout(self.config.timeout)),
        }
    }

    async fn run_diff(&self, diff: &DiffTree, matcher: &FileMatcher) -> Result<ChangedFiles> {
        let mut child = diff
            .command(&self.config.working_dir)
            .spawn()
            .map_err(|source| ResolveError::Spawn {
                program: diff.program().to_string(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            ResolveError::Read(std::io::Error::other("stdout was not captured"))
        })?;

        let result = collect_changes(BufReader::new(stdout), matcher, self.config.verbose).await?;

        let status = child.wait().await.map_err(ResolveError::Read)?;
        if !status.success() && self.config.verbose {
            eprintln!(
                "{} {} exited with {}",
                "note:".dimmed(),
                diff.program(),
                status
            );
        }

        Ok(result)
    }
}

/// Consume `--name-status` output line by line until end of stream.
///
/// Malformed lines (including ones that are not UTF-8) and paths rejected
/// by `matcher` are skipped silently, or with a note when `verbose` is set.
pub async fn collect_changes<R>(mut reader: R, matcher: &FileMatcher, verbose: bool) -> Result<ChangedFiles>
where
    R: AsyncBufRead + Unpin,
{
    let mut result = ChangedFiles::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await.map_err(ResolveError::Read)? == 0 {
            break;
        }

        let Ok(line) = std::str::from_utf8(trim_line_ending(&buf)) else {
            if verbose {
                eprintln!(
                    "{} skipping non UTF-8 line: {}",
                    "note:".dimmed(),
                    String::from_utf8_lossy(&buf).trim_end()
                );
            }
            continue;
        };

        let Some(parsed) = DiffLine::parse(line) else {
            if verbose && !line.is_empty() {
                eprintln!("{} skipping unrecognized line: {}", "note:".dimmed(), line);
            }
            continue;
        };

        if !matcher.matches_pattern(&parsed.path) {
            continue;
        }

        if !matcher.exists(&parsed.path) {
            if verbose {
                eprintln!("{} {} no longer exists", "note:".dimmed(), parsed.path);
            }
            continue;
        }

        result.push(parsed);
    }

    Ok(result)
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Resolve changed files for `config`; see [`ChangedFileResolver::resolve`]
pub async fn resolve(config: &Config) -> ChangedFiles {
    ChangedFileResolver::new(config).resolve().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    fn touch(root: &Path, path: &str) {
        let full = root.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, "<?php\n").unwrap();
    }

    fn php_matcher(root: &Path) -> FileMatcher {
        FileMatcher::new(&["*.php".to_string()], root).unwrap()
    }

    #[tokio::test]
    async fn test_collect_sorts_into_buckets() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/Foo.php");
        touch(dir.path(), "src/Bar.php");

        let output = "A\tsrc/Foo.php\nM\tsrc/Bar.php\nD\tsrc/Old.php\n";
        let result = collect_changes(output.as_bytes(), &php_matcher(dir.path()), false)
            .await
            .unwrap();

        assert_eq!(result.added, vec!["src/Foo.php"]);
        assert_eq!(result.modified, vec!["src/Bar.php"]);
    }

    #[tokio::test]
    async fn test_collect_keeps_diff_order() {
        let dir = tempfile::tempdir().unwrap();
        for f in ["c.php", "a.php", "b.php", "m2.php", "m1.php"] {
            touch(dir.path(), f);
        }

        let output = "R\tc.php\nM\tm2.php\nA\ta.php\nM\tm1.php\nC\tb.php";
        let result = collect_changes(output.as_bytes(), &php_matcher(dir.path()), false)
            .await
            .unwrap();

        assert_eq!(result.added, vec!["c.php", "a.php", "b.php"]);
        assert_eq!(result.modified, vec!["m2.php", "m1.php"]);
        assert_eq!(result.len(), 5);
        assert_eq!(
            result.all().collect::<Vec<_>>(),
            vec!["c.php", "a.php", "b.php", "m2.php", "m1.php"]
        );
    }

    #[tokio::test]
    async fn test_collect_filters_patterns_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/Foo.php");
        touch(dir.path(), "src/app.js");

        let output = "A\tsrc/app.js\nA\tsrc/Missing.php\nM\tsrc/Foo.php\r\n";
        let result = collect_changes(output.as_bytes(), &php_matcher(dir.path()), true)
            .await
            .unwrap();

        assert!(result.added.is_empty());
        assert_eq!(result.modified, vec!["src/Foo.php"]);
    }

    #[tokio::test]
    async fn test_collect_ignores_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/Foo.php");

        let output = "\nm\tsrc/Foo.php\nMsrc/Foo.php\nX\tsrc/Foo.php\nR100\tsrc/Old.php\tsrc/Foo.php\nwarning: something\n";
        let result = collect_changes(output.as_bytes(), &php_matcher(dir.path()), false)
            .await
            .unwrap();

        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_collect_skips_non_utf8_lines() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Foo.php");

        let output: &[u8] = b"A\tFoo.php\nM\tb\xe9.php\nM\tFoo.php\n";
        let result = collect_changes(output, &php_matcher(dir.path()), true)
            .await
            .unwrap();

        assert_eq!(result.added, vec!["Foo.php"]);
        assert_eq!(result.modified, vec!["Foo.php"]);
    }

    #[tokio::test]
    async fn test_token_mode_is_always_empty() {
        let config = Config::default()
            .with_token("ghp_example")
            .with_base_sha("abc")
            .with_git_program("definitely-not-a-real-program");

        let result = resolve(&config).await;
        assert_eq!(result, ChangedFiles::default());
        assert!(ChangedFileResolver::new(&config).try_resolve().await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_base_sha_degrades_to_empty() {
        let config = Config::default();
        let err = ChangedFileResolver::new(&config).try_resolve().await.unwrap_err();
        assert!(matches!(err, ResolveError::MissingBaseSha));
        assert!(resolve(&config).await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_pattern_degrades_to_empty() {
        let config = Config::default()
            .with_patterns(vec!["src/[".to_string()])
            .with_base_sha("abc");
        let err = ChangedFileResolver::new(&config).try_resolve().await.unwrap_err();
        assert!(matches!(err, ResolveError::Pattern { .. }));
        assert!(resolve(&config).await.is_empty());
    }

    #[tokio::test]
    async fn test_spawn_failure_degrades_to_empty() {
        let config = Config::default()
            .with_base_sha("abc")
            .with_git_program("definitely-not-a-real-program");

        let err = ChangedFileResolver::new(&config).try_resolve().await.unwrap_err();
        assert!(matches!(err, ResolveError::Spawn { .. }));
        assert!(resolve(&config).await.is_empty());
    }

    /// Write a script that ignores its git arguments and behaves as `body`
    #[cfg(unix)]
    fn fake_git(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-git.sh");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_resolve_with_stand_in_git() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("work");
        touch(&work, "src/Foo.php");
        touch(&work, "src/Bar.php");
        touch(&work, "README.md");

        let git = fake_git(
            dir.path(),
            "printf 'A\\tsrc/Foo.php\\nM\\tsrc/Bar.php\\nM\\tREADME.md\\nA\\tsrc/Gone.php\\n'",
        );
        let config = Config::default()
            .with_base_sha("abc")
            .with_working_dir(&work)
            .with_git_program(git);

        let result = resolve(&config).await;
        assert_eq!(result.added, vec!["src/Foo.php"]);
        assert_eq!(result.modified, vec!["src/Bar.php"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_keeps_output() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Foo.php");

        let git = fake_git(dir.path(), "printf 'M\\tFoo.php\\n'\nexit 3");
        let config = Config::default()
            .with_base_sha("abc")
            .with_working_dir(dir.path())
            .with_git_program(git)
            .with_verbose(true);

        let result = resolve(&config).await;
        assert_eq!(result.modified, vec!["Foo.php"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Foo.php");

        let git = fake_git(dir.path(), "printf 'A\\tFoo.php\\n'\nexec sleep 10");
        let config = Config::default()
            .with_base_sha("abc")
            .with_working_dir(dir.path())
            .with_git_program(git)
            .with_timeout(Duration::from_millis(200));

        let err = ChangedFileResolver::new(&config).try_resolve().await.unwrap_err();
        assert!(matches!(err, ResolveError::Timeout(_)));
        assert!(resolve(&config).await.is_empty());
    }

    /// Gone, or a zombie waiting to be reaped
    #[cfg(target_os = "linux")]
    fn process_ended(pid: &str) -> bool {
        match fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .and_then(|rest| rest.trim_start().chars().next())
                == Some('Z'),
            Err(_) => true,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_kills_diff_process() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("git.pid");

        let git = fake_git(
            dir.path(),
            &format!("echo $$ > '{}'\nexec sleep 30", pid_file.display()),
        );
        let config = Config::default()
            .with_base_sha("abc")
            .with_working_dir(dir.path())
            .with_git_program(git)
            .with_timeout(Duration::from_millis(300));

        let err = ChangedFileResolver::new(&config).try_resolve().await.unwrap_err();
        assert!(matches!(err, ResolveError::Timeout(_)));

        let pid = fs::read_to_string(&pid_file).unwrap().trim().to_string();
        let mut ended = false;
        for _ in 0..40 {
            if process_ended(&pid) {
                ended = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(ended, "diff process {} still running after timeout", pid);
    }
}
