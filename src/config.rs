use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::github;

pub const CONFIG_FILE: &str = "changed-files.toml";
pub const DEFAULT_PATTERN: &str = "*.php";
pub const DEFAULT_GIT_PROGRAM: &str = "git";
pub const DIFF_TIMEOUT: Duration = Duration::from_millis(5000);

/// Optional on-disk settings (`changed-files.toml`)
///
/// A relative `working-directory` is taken relative to the directory that
/// holds the config file.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: FileConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        if let (Some(dir), Some(parent)) = (&config.working_directory, path.parent()) {
            if dir.is_relative() {
                config.working_directory = Some(parent.join(dir));
            }
        }

        Ok(config)
    }

    /// Load `path` if it exists; a missing file means no settings
    pub fn load_optional(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Raw inputs from the command line and the action environment
#[derive(Debug, Default)]
pub struct Inputs {
    pub files: Option<String>,
    pub repo_token: Option<String>,
    pub event_path: Option<PathBuf>,
    /// Explicit base commit, preferred over the event payload
    pub base: Option<String>,
    pub working_directory: Option<PathBuf>,
    /// Config file named on the command line; must exist
    pub config_file: Option<PathBuf>,
    pub verbose: bool,
}

/// Everything one resolution needs
#[derive(Clone)]
pub struct Config {
    /// Glob patterns, never empty
    pub patterns: Vec<String>,
    /// Access token; empty means the local git diff is used
    pub token: String,
    /// Pull request base commit
    pub base_sha: Option<String>,
    /// Directory git runs in and paths are checked against
    pub working_dir: PathBuf,
    pub git_program: String,
    pub timeout: Duration,
    /// Report skipped lines and git's exit status
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            patterns: vec![DEFAULT_PATTERN.to_string()],
            token: String::new(),
            base_sha: None,
            working_dir: PathBuf::from("."),
            git_program: DEFAULT_GIT_PROGRAM.to_string(),
            timeout: DIFF_TIMEOUT,
            verbose: false,
        }
    }
}

impl Config {
    /// Merge the config file with CLI/action inputs; inputs win
    pub fn from_sources(
        file: FileConfig,
        files_input: Option<&str>,
        token: Option<String>,
        working_dir: Option<PathBuf>,
    ) -> Self {
        let mut config = Self::default();

        let from_input = files_input.map(parse_patterns).unwrap_or_default();
        let file_patterns: Vec<String> = file
            .files
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        if !from_input.is_empty() {
            config.patterns = from_input;
        } else if !file_patterns.is_empty() {
            config.patterns = file_patterns;
        }

        if let Some(token) = token {
            config.token = token;
        }

        if let Some(dir) = working_dir.or(file.working_directory) {
            config.working_dir = dir;
        }

        config
    }

    /// Build the configuration for a run: config file, then inputs, then
    /// the base commit from `--base` or the event payload
    pub fn from_inputs(inputs: Inputs) -> Result<Self> {
        let file = match inputs.config_file {
            Some(ref path) => FileConfig::load(path)
                .with_context(|| format!("Could not load {}", path.display()))?,
            None => {
                let dir = inputs
                    .working_directory
                    .clone()
                    .unwrap_or_else(|| PathBuf::from("."));
                FileConfig::load_optional(&dir.join(CONFIG_FILE))?
            }
        };

        let mut config = Self::from_sources(
            file,
            inputs.files.as_deref(),
            inputs.repo_token,
            inputs.working_directory,
        )
        .with_verbose(inputs.verbose);

        let base = inputs
            .base
            .filter(|sha| !sha.is_empty())
            .or_else(|| inputs.event_path.as_deref().and_then(github::base_sha_from_event));
        config.base_sha = base;

        Ok(config)
    }

    pub fn with_patterns(mut self, patterns: Vec<String>) -> Self {
        self.patterns = if patterns.is_empty() {
            vec![DEFAULT_PATTERN.to_string()]
        } else {
            patterns
        };
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    pub fn with_base_sha(mut self, sha: impl Into<String>) -> Self {
        self.base_sha = Some(sha.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_git_program(mut self, program: impl Into<String>) -> Self {
        self.git_program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn uses_token(&self) -> bool {
        !self.token.is_empty()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("patterns", &self.patterns)
            .field("token", &if self.uses_token() { "***" } else { "" })
            .field("base_sha", &self.base_sha)
            .field("working_dir", &self.working_dir)
            .field("git_program", &self.git_program)
            .field("timeout", &self.timeout)
            .field("verbose", &self.verbose)
            .finish()
    }
}

/// Split the comma-separated `files` input
pub fn parse_patterns(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
