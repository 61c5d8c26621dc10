// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{ensure, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use hubfetch::api::HubClient;
use hubfetch::auth;
use hubfetch::download::{
    download_repo, DownloadOptions, DownloadReport, ProgressDisplay, SilentDisplay,
    TerminalDisplay, DEFAULT_PARALLELISM,
};
use hubfetch::error::DownloadError;
use hubfetch::utils::format_size;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit codes following sysexits.h conventions
/// These provide meaningful exit status to calling processes and scripts
mod exit_codes {
    /// Success - operation completed successfully
    pub const SUCCESS: i32 = 0;
    /// Usage error - invalid command line arguments
    pub const USAGE: i32 = 64;
    /// Service unavailable - the hub could not be listed
    pub const UNAVAILABLE: i32 = 69;
    /// I/O error - network or file operation failed
    pub const IO_ERR: i32 = 74;
}

use exit_codes::*;

/// hubfetch - parallel downloader for model-hub repositories.
#[derive(Parser)]
#[command(name = "hubfetch")]
#[command(version = VERSION)]
#[command(about = "Parallel downloader for model-hub repositories.")]
#[command(long_about = "hubfetch - parallel downloader for model-hub repositories\n\n\
    Whole repo:          hubfetch download openai/whisper-tiny\n\
    Just the JSON:       hubfetch download openai/whisper-tiny -f \"*.json\"\n\
    Pinned revision:     hubfetch download openai/whisper-tiny -r refs/pr/4\n\
    Scripted (no bars):  hubfetch download openai/whisper-tiny --quiet\n\n\
    Files download smallest-first under a bounded worker pool; progress\n\
    rows are recycled so the display never outgrows the terminal.")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a repository's files
    ///
    /// Examples:
    ///   hubfetch download openai/whisper-tiny
    ///   hubfetch download openai/whisper-tiny --filter "*.safetensors"
    ///   hubfetch download openai/whisper-tiny --dest ./models --jobs 4
    Download {
        /// Repository identifier, e.g. "openai/whisper-tiny"
        repo_id: String,

        /// Destination directory (default: last segment of the repo id)
        #[arg(short, long)]
        dest: Option<PathBuf>,

        /// Branch, tag, or commit to download from
        #[arg(short, long, default_value = "main")]
        revision: String,

        /// Glob pattern; repeatable, only matching files are downloaded
        #[arg(short, long = "filter")]
        filter: Vec<String>,

        /// Suppress the progress display
        #[arg(short, long)]
        quiet: bool,

        /// Maximum concurrent downloads
        #[arg(short, long, default_value_t = DEFAULT_PARALLELISM)]
        jobs: usize,

        /// Label progress rows with bare filenames instead of full paths
        #[arg(long)]
        bare_labels: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Download {
            repo_id,
            dest,
            revision,
            filter,
            quiet,
            jobs,
            bare_labels,
        } => {
            if let Err(error) = validate_repo_id(&repo_id) {
                eprintln!("{} {}", "[✗]".red(), error);
                std::process::exit(USAGE);
            }

            let dest = dest.unwrap_or_else(|| default_dest(&repo_id));
            let options = DownloadOptions {
                revision,
                filters: filter,
                parallelism: jobs,
                bare_labels,
            };
            run_download(&repo_id, dest, options, quiet).await
        }
    };

    std::process::exit(code);
}

/// A repo id is "owner/name"; anything else turns into a confusing hub 404
/// or a destination path outside the working directory, so reject it early.
fn validate_repo_id(repo_id: &str) -> Result<()> {
    let parts: Vec<&str> = repo_id.split('/').collect();
    ensure!(
        parts.len() == 2 && parts.iter().all(|p| !p.is_empty() && *p != "." && *p != ".."),
        "repository id must look like 'owner/name', got '{}'",
        repo_id
    );
    Ok(())
}

/// Default destination: the repo id's last path segment, in the cwd.
fn default_dest(repo_id: &str) -> PathBuf {
    PathBuf::from(repo_id.rsplit('/').next().unwrap_or(repo_id))
}

async fn run_download(
    repo_id: &str,
    dest: PathBuf,
    options: DownloadOptions,
    quiet: bool,
) -> i32 {
    let client = HubClient::new(auth::resolve_token());
    let display: Arc<dyn ProgressDisplay> = if quiet {
        Arc::new(SilentDisplay)
    } else {
        Arc::new(TerminalDisplay::new())
    };

    match download_repo(&client, repo_id, &dest, &options, display).await {
        Ok(report) => {
            print_summary(repo_id, &dest, &report);
            SUCCESS
        }
        Err(error) => {
            print_failure(&error);
            match error {
                DownloadError::Pattern(_) => USAGE,
                DownloadError::Listing(_) => UNAVAILABLE,
                DownloadError::Io(_) | DownloadError::Transfer { .. } => IO_ERR,
            }
        }
    }
}

fn print_summary(repo_id: &str, dest: &std::path::Path, report: &DownloadReport) {
    if report.is_empty() {
        println!(
            "{} nothing in {} matched the filters",
            "[OK]".green(),
            repo_id
        );
        return;
    }

    println!(
        "{} {} files ({}) -> {}",
        "[OK]".green(),
        report.downloaded.len(),
        format_size(report.total_bytes()),
        dest.display()
    );
    for path in &report.skipped {
        println!("  {} {} vanished upstream, skipped", "[!]".yellow(), path);
    }
}

fn print_failure(error: &DownloadError) {
    eprintln!("{} {}", "[✗]".red(), error);
    if let DownloadError::Transfer { failures, .. } = error {
        for (path, cause) in failures {
            eprintln!("  {} {}: {}", "[✗]".red(), path, cause);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_repo_id() {
        assert!(validate_repo_id("openai/whisper-tiny").is_ok());
        assert!(validate_repo_id("whisper-tiny").is_err());
        assert!(validate_repo_id("a/b/c").is_err());
        assert!(validate_repo_id("../b").is_err());
        assert!(validate_repo_id("a/").is_err());
    }

    #[test]
    fn test_default_dest_is_last_segment() {
        assert_eq!(default_dest("openai/whisper-tiny"), PathBuf::from("whisper-tiny"));
    }
}
