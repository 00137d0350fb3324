use anyhow::Result;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

use changed_files::config::Inputs;
use changed_files::{ChangedFileResolver, ChangedFiles, Config};

#[derive(Parser)]
#[command(name = "changed-files")]
#[command(about = "List files added or modified by a pull request")]
#[command(version)]
struct Cli {
    /// Comma-separated glob patterns (default: *.php)
    #[arg(long, env = "INPUT_FILES")]
    files: Option<String>,

    /// Access token; switches to the API lookup, which reports no files
    #[arg(long, env = "INPUT_REPO-TOKEN", hide_env_values = true)]
    repo_token: Option<String>,

    /// Pull request event payload
    #[arg(long, env = "GITHUB_EVENT_PATH")]
    event_path: Option<PathBuf>,

    /// Base commit to diff against (overrides the event payload)
    #[arg(long)]
    base: Option<String>,

    /// Repository checkout to inspect
    #[arg(short = 'C', long, env = "GITHUB_WORKSPACE")]
    working_directory: Option<PathBuf>,

    /// Path to config file (default: changed-files.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Explain skipped diff lines
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Text,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

#[tokio::main]
async fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.format;

    let config = Config::from_inputs(cli.into_inputs())?;
    let files = ChangedFileResolver::new(&config).resolve().await;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&files)?),
        Format::Text => print_text(&files),
    }

    Ok(())
}

impl Cli {
    fn into_inputs(self) -> Inputs {
        Inputs {
            files: self.files,
            repo_token: self.repo_token,
            event_path: self.event_path,
            base: self.base,
            working_directory: self.working_directory,
            config_file: self.config,
            verbose: self.verbose,
        }
    }
}

fn print_text(files: &ChangedFiles) {
    println!("{} ({})", "Added".bold(), files.added.len());
    for file in &files.added {
        println!("  {} {}", "+".green(), file);
    }

    println!("{} ({})", "Modified".bold(), files.modified.len());
    for file in &files.modified {
        println!("  {} {}", "~".yellow(), file);
    }
}
