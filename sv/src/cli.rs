//! CLI command definitions and subcommands

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::config::Config;

/// selfverify - synthesize programs from examples and verify them before accepting
#[derive(Parser)]
#[command(
    name = "sv",
    about = "Self-verifying program synthesis loop for input/output example tasks",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Attempt every task in a range under a shared call budget
    Run(RunArgs),

    /// Re-validate a saved solution against a task's examples
    Check {
        /// Task number (e.g. 7 for task007.json)
        task: u32,

        /// Solution file (defaults to <output-dir>/taskNNN.py)
        #[arg(short, long)]
        solution: Option<PathBuf>,

        /// Also check the test examples
        #[arg(long)]
        include_test: bool,

        /// Directory containing task files
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Summarize the progress log
    Stats {
        /// Directory containing progress.jsonl
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
}

/// Options for `sv run`; each one overrides the matching config value
#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// First task number (inclusive)
    #[arg(long)]
    pub start: Option<u32>,

    /// Last task number (inclusive)
    #[arg(long)]
    pub end: Option<u32>,

    /// Maximum oracle calls for the whole run
    #[arg(long)]
    pub max_calls: Option<u32>,

    /// Attempts per task
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Model identifier passed to the provider
    #[arg(long)]
    pub model: Option<String>,

    /// Directory containing task files
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Directory for accepted solutions
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Directory for the progress log
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Pause between tasks in milliseconds
    #[arg(long)]
    pub task_delay_ms: Option<u64>,

    /// Re-attempt tasks that already have a saved solution
    #[arg(long)]
    pub no_skip_solved: bool,
}

impl RunArgs {
    /// Apply command-line overrides on top of the loaded config
    pub fn apply(&self, config: &mut Config) {
        debug!(?self, "RunArgs::apply: called");
        let run = &mut config.run;
        if let Some(start) = self.start {
            run.start = start;
        }
        if let Some(end) = self.end {
            run.end = end;
        }
        if let Some(max_calls) = self.max_calls {
            run.max_calls = max_calls;
        }
        if let Some(max_attempts) = self.max_attempts {
            run.max_attempts = max_attempts;
        }
        if let Some(dir) = &self.data_dir {
            run.data_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            run.output_dir = dir.clone();
        }
        if let Some(dir) = &self.log_dir {
            run.log_dir = dir.clone();
        }
        if let Some(delay) = self.task_delay_ms {
            run.task_delay_ms = delay;
        }
        if self.no_skip_solved {
            run.skip_solved = false;
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
    }
}

/// Tool availability check result
#[derive(Debug, Clone)]
pub struct ToolCheck {
    pub name: String,
    pub available: bool,
    pub version: Option<String>,
}

impl ToolCheck {
    /// Check if a tool is available and get its version
    pub fn check(name: &str, version_args: &[&str]) -> Self {
        debug!(name, ?version_args, "ToolCheck::check: called");
        match std::process::Command::new(name).args(version_args).output() {
            Ok(output) if output.status.success() => {
                // Older Pythons print the version on stderr
                let text = format!(
                    "{} {}",
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr)
                );
                Self {
                    name: name.to_string(),
                    available: true,
                    version: Some(parse_version(&text)),
                }
            }
            _ => {
                debug!(name, "ToolCheck::check: tool not available");
                Self {
                    name: name.to_string(),
                    available: false,
                    version: None,
                }
            }
        }
    }
}

/// Parse version from command output (extracts first version-like string)
fn parse_version(output: &str) -> String {
    for word in output.split_whitespace() {
        let word = word.trim_start_matches('v');
        if word.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            let version: String = word.chars().take_while(|c| c.is_ascii_digit() || *c == '.').collect();
            if !version.is_empty() {
                return version;
            }
        }
    }
    "unknown".to_string()
}

/// Path of the application log file
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("selfverify")
        .join("logs")
        .join("selfverify.log")
}

/// after_help text: interpreter status and where logs go
pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    let python = ToolCheck::check("python3", &["--version"]);
    let icon = if python.available { "\u{2705}" } else { "\u{274C}" };
    let version = python.version.as_deref().unwrap_or("not found");

    let mut help = String::new();
    help.push_str("Required Tools:\n");
    help.push_str(&format!("  {} {:<10} {}\n", icon, python.name, version));
    help.push('\n');
    help.push_str(&format!("Logs are written to: {}\n", get_log_path().display()));
    help
}
