//! ferry - copy, move and delete file trees with conflict prompts.
//!
//! Usage:
//!   ferry copy <SOURCES>... <DEST>   Copy files and directories
//!   ferry move <SOURCES>... <DEST>   Move files and directories
//!   ferry delete <TARGETS>...        Delete files and directories
//!   ferry --help                     Show help

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::validator::Validation;
use inquire::{Confirm, Select, Text};
use serde_json::json;

use ferryfile_core::{
    EngineConfig, Entry, FsEntry, HaltReason, PresetResponse, UserResponse, suggest_free_name,
    validate_file_name,
};
use ferryfile_ops::{
    ChannelObserver, Engine, HaltEvent, OperationEvent, OperationRequest, OperationSummary, Outcome,
    ProgressSnapshot, Responder,
};

#[derive(Parser)]
#[command(
    name = "ferry",
    version,
    about = "Copy, move and delete file trees",
    long_about = "ferry copies, moves and deletes whole file trees. Whenever an item \
                  cannot be processed (name clash, read-only file, missing source) it \
                  asks what to do instead of giving up on the whole operation."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// What to do when a target already exists
    #[arg(long, global = true, value_enum, default_value = "ask")]
    on_conflict: ConflictPolicy,

    /// Proceed past read-only files without asking (and skip the delete confirmation)
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    /// Never prompt: skip every item that would need a decision
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Bytes copied per step (e.g., "512KB", "5MB")
    #[arg(long, global = true)]
    chunk_size: Option<String>,

    /// Print one JSON object per event on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Engine configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log engine activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Copy files and directories
    Copy {
        /// Sources followed by the destination
        #[arg(required = true, num_args = 2..)]
        paths: Vec<PathBuf>,
    },

    /// Move files and directories
    Move {
        /// Sources followed by the destination
        #[arg(required = true, num_args = 2..)]
        paths: Vec<PathBuf>,
    },

    /// Delete files and directories, including their contents
    Delete {
        /// Files and directories to delete
        #[arg(required = true)]
        targets: Vec<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum ConflictPolicy {
    #[default]
    Ask,
    Skip,
    Overwrite,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    if cli.verbose {
        init_logging()?;
    }

    let config = build_config(&cli)?;
    let request = match &cli.command {
        Command::Copy { paths } => {
            let (sources, destination) = split_destination(paths)?;
            OperationRequest::copy(sources, destination)
        }
        Command::Move { paths } => {
            let (sources, destination) = split_destination(paths)?;
            OperationRequest::move_to(sources, destination)
        }
        Command::Delete { targets } => {
            if !cli.yes && !cli.non_interactive && !confirm_delete(targets)? {
                eprintln!("Nothing deleted.");
                return Ok(());
            }
            OperationRequest::delete(targets.iter().map(FsEntry::new).collect())
        }
    };

    let summary = run(request, config, cli.json)?;
    if cli.json {
        println!("{}", json!({ "event": "finished", "summary": summary }));
    } else {
        eprintln!(
            "{} ({} in {:.2}s)",
            summary.summary(),
            format_size(summary.bytes_transferred),
            summary.elapsed.as_secs_f64()
        );
    }

    if summary.outcome != Outcome::Completed {
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging() -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Engine config from the config file (if any) plus command-line overrides.
fn build_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };

    if let Some(size) = &cli.chunk_size {
        config.chunk_size = parse_size(size).with_context(|| format!("Invalid chunk size '{size}'"))?;
    }

    let mut preset = |reason, response| {
        config
            .preset_responses
            .push(PresetResponse::new(reason, response));
    };
    match cli.on_conflict {
        ConflictPolicy::Ask => {}
        ConflictPolicy::Skip => preset(HaltReason::DestinationExists, UserResponse::SkipAll),
        ConflictPolicy::Overwrite => {
            preset(HaltReason::DestinationExists, UserResponse::ProceedAll);
            preset(HaltReason::DestinationReadOnly, UserResponse::ProceedAll);
        }
    }
    if cli.yes {
        preset(HaltReason::SourceReadOnly, UserResponse::ProceedAll);
        preset(HaltReason::DestinationReadOnly, UserResponse::ProceedAll);
    }

    if cli.non_interactive {
        // Skip whatever is still unanswered.
        let answered = config.preset_map();
        config.preset_responses.extend(
            EngineConfig::unattended()
                .preset_responses
                .into_iter()
                .filter(|p| !answered.contains_key(&p.reason)),
        );
    }

    config.validate().map_err(|e| eyre!(e))?;
    Ok(config)
}

fn load_config(path: &Path) -> Result<EngineConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Invalid config file {}", path.display()))
}

fn split_destination(paths: &[PathBuf]) -> Result<(Vec<FsEntry>, PathBuf)> {
    let (destination, sources) = paths
        .split_last()
        .ok_or_else(|| eyre!("A destination is required"))?;
    if sources.is_empty() {
        return Err(eyre!("At least one source is required"));
    }
    Ok((sources.iter().map(FsEntry::new).collect(), destination.clone()))
}

fn confirm_delete(targets: &[PathBuf]) -> Result<bool> {
    let prompt = match targets {
        [single] => format!("Delete {} and everything in it?", single.display()),
        _ => format!("Delete {} items and everything in them?", targets.len()),
    };
    Ok(Confirm::new(&prompt).with_default(false).prompt()?)
}

/// Drive the engine to completion, rendering events and answering halts.
fn run(request: OperationRequest<FsEntry>, config: EngineConfig, json: bool) -> Result<OperationSummary> {
    let (observer, mut events) = ChannelObserver::new();
    let mut engine = Engine::new(request, config, Arc::new(observer));
    let responder: Responder = engine.control();
    engine.start().context("Failed to start the operation")?;

    let bar = if json { ProgressBar::hidden() } else { progress_bar()? };
    let mut summary = None;

    while let Some(event) = events.blocking_recv() {
        match event {
            OperationEvent::CurrentItem(name) => bar.set_message(name),
            OperationEvent::Progress(progress) => {
                if json {
                    println!("{}", json!({ "event": "progress", "progress": progress }));
                } else {
                    render_progress(&bar, &progress);
                }
            }
            OperationEvent::Halted(halt) => {
                if json {
                    println!("{}", halt_json(&halt));
                }
                let response = bar.suspend(|| ask(&halt));
                let response = match response {
                    Ok(response) => response,
                    Err(e) => {
                        // Prompt closed (Ctrl-C, no terminal): stop the operation.
                        tracing::warn!(error = %e, "prompt failed, cancelling");
                        responder.cancel();
                        continue;
                    }
                };
                responder
                    .deliver_user_response(halt.reason, response)
                    .context("Failed to answer the engine")?;
            }
            OperationEvent::Finished(done) => {
                bar.finish_and_clear();
                summary = Some(done);
            }
        }
    }

    engine.wait()?;
    summary.ok_or_else(|| eyre!("The operation ended without a summary"))
}

fn progress_bar() -> Result<ProgressBar> {
    let bar = ProgressBar::new(100);
    let style = ProgressStyle::default_bar()
        .template("{msg:30!} [{bar:40.cyan/blue}] {pos:>3}% {prefix}")?
        .progress_chars("=> ");
    bar.set_style(style);
    Ok(bar)
}

fn render_progress(bar: &ProgressBar, progress: &ProgressSnapshot) {
    bar.set_position(progress.total_percent.round() as u64);
    bar.set_prefix(format!(
        "{}/{} {}/s, {}s left",
        progress.current_index + 1,
        progress.total_items,
        format_size(progress.throughput as u64),
        progress.eta_seconds
    ));
}

fn halt_json(halt: &HaltEvent<FsEntry>) -> serde_json::Value {
    json!({
        "event": "halted",
        "reason": halt.reason,
        "source": halt.source.path(),
        "destination": halt.destination.as_ref().map(|d| d.path().to_path_buf()),
        "message": halt.message,
    })
}

/// One answer offered at a halt prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Proceed,
    ProceedAll,
    Rename,
    Skip,
    SkipAll,
    Retry,
    Abort,
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Proceed => "Proceed",
            Self::ProceedAll => "Proceed for all",
            Self::Rename => "Rename",
            Self::Skip => "Skip",
            Self::SkipAll => "Skip all",
            Self::Retry => "Retry",
            Self::Abort => "Abort",
        };
        f.write_str(label)
    }
}

fn ask(halt: &HaltEvent<FsEntry>) -> Result<UserResponse> {
    let mut choices = Vec::new();
    if halt.reason.allows_proceed() {
        choices.extend([Choice::Proceed, Choice::ProceedAll]);
    }
    if halt.reason.allows_rename() {
        choices.push(Choice::Rename);
    }
    choices.extend([Choice::Skip, Choice::SkipAll, Choice::Retry, Choice::Abort]);

    let mut prompt = format!("{}: {}", halt.reason, halt.source.path().display());
    if let Some(destination) = &halt.destination {
        prompt.push_str(&format!(" -> {}", destination.path().display()));
    }
    if !halt.message.is_empty() {
        prompt.push_str(&format!(" ({})", halt.message));
    }

    let response = match Select::new(&prompt, choices).prompt()? {
        Choice::Proceed => UserResponse::ProceedThis,
        Choice::ProceedAll => UserResponse::ProceedAll,
        Choice::Rename => UserResponse::Rename(ask_new_name(halt)?),
        Choice::Skip => UserResponse::SkipThis,
        Choice::SkipAll => UserResponse::SkipAll,
        Choice::Retry => UserResponse::Retry,
        Choice::Abort => UserResponse::Abort,
    };
    Ok(response)
}

fn ask_new_name(halt: &HaltEvent<FsEntry>) -> Result<String> {
    let suggestion = halt
        .destination
        .as_ref()
        .map(|d| suggest_free_name(d.path()))
        .unwrap_or_else(|| halt.source.name());

    let name = Text::new("New name:")
        .with_initial_value(&suggestion)
        .with_validator(|input: &str| -> Result<Validation, inquire::CustomUserError> {
            Ok(match validate_file_name(input) {
                Ok(()) => Validation::Valid,
                Err(e) => Validation::Invalid(e.to_string().into()),
            })
        })
        .prompt()?;
    Ok(name)
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Parse a size string (e.g., "512KB", "5MB", "1GB").
fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_uppercase();
    let number = |s: &str| -> Result<f64> {
        Ok(s.trim_end_matches(|c: char| !c.is_ascii_digit() && c != '.').parse()?)
    };

    let bytes = if s.ends_with("GB") || s.ends_with('G') {
        number(&s)? * 1024.0 * 1024.0 * 1024.0
    } else if s.ends_with("MB") || s.ends_with('M') {
        number(&s)? * 1024.0 * 1024.0
    } else if s.ends_with("KB") || s.ends_with('K') {
        number(&s)? * 1024.0
    } else {
        number(&s)?
    };

    Ok(bytes as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("512").unwrap(), 512);
        assert_eq!(parse_size("1KB").unwrap(), 1024);
        assert_eq!(parse_size("5mb").unwrap(), 5 * 1024 * 1024);
        assert_eq!(parse_size("1.5K").unwrap(), 1536);
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn test_split_destination() {
        let paths = vec![PathBuf::from("a"), PathBuf::from("b"), PathBuf::from("dst")];
        let (sources, destination) = split_destination(&paths).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(destination, PathBuf::from("dst"));
        assert!(split_destination(&paths[..1]).is_err());
    }

    #[test]
    fn test_non_interactive_keeps_explicit_choices() {
        let cli = Cli::parse_from(["ferry", "--non-interactive", "--on-conflict", "overwrite", "delete", "x"]);
        let presets = build_config(&cli).unwrap().preset_map();
        assert_eq!(presets.get(&HaltReason::DestinationExists), Some(&UserResponse::ProceedAll));
        assert_eq!(presets.get(&HaltReason::FailedToDelete), Some(&UserResponse::SkipAll));
        assert_eq!(presets.len(), 8);
    }

    #[test]
    fn test_config_file_is_toml() {
        let config: EngineConfig = toml::from_str(
            r#"
            chunk_size = 65536

            [[preset_responses]]
            reason = "destination-exists"
            response = "skip-all"
            "#,
        )
        .unwrap();
        assert_eq!(config.chunk_size, 65536);
        assert_eq!(
            config.preset_map().get(&HaltReason::DestinationExists),
            Some(&UserResponse::SkipAll)
        );
    }
}
