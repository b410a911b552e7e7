//! selfverify - Self-Verifying Program Synthesis Loop
//!
//! CLI entry point for runs, solution checks and progress statistics.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches};
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use selfverify::cli::{Cli, Command, RunArgs, generate_after_help};
use selfverify::config::Config;
use selfverify::domain::{CallBudget, TaskId, Verdict};
use selfverify::feedback::FeedbackContextBuilder;
use selfverify::llm::create_client;
use selfverify::oracle::LlmOracle;
use selfverify::prompts::{PromptBuilder, PromptLoader};
use selfverify::r#loop::{AttemptOrchestrator, RunDriver, RunSettings, TaskReport};
use selfverify::recorder::{FileRecorder, OutcomeStatus, ProgressStats, progress_log_path, read_records, solution_path};
use selfverify::tasks::TaskCatalog;
use selfverify::validation::{CodeValidator, PythonRuntime};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("selfverify")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("selfverify.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(model = %config.llm.model, provider = %config.llm.provider, "selfverify loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run(args) => {
            debug!("main: matched Run command");
            cmd_run(config, &args).await
        }
        Command::Check {
            task,
            solution,
            include_test,
            data_dir,
        } => {
            debug!(task, ?solution, include_test, "main: matched Check command");
            cmd_check(&config, TaskId(task), solution, include_test, data_dir).await
        }
        Command::Stats { log_dir } => {
            debug!(?log_dir, "main: matched Stats command");
            cmd_stats(&config, log_dir)
        }
    }
}

async fn cmd_run(mut config: Config, args: &RunArgs) -> Result<()> {
    args.apply(&mut config);
    config.validate()?;

    let runtime = PythonRuntime::new(&config.sandbox);
    let version = runtime
        .probe()
        .await
        .context(format!("Python interpreter '{}' is not usable", config.sandbox.interpreter))?;
    info!(%version, "Python interpreter ready");

    let client = create_client(&config.llm)?;
    let loader = PromptLoader::new(".");
    let system_prompt = loader.system_prompt()?;
    let prompts = PromptBuilder::new(loader, config.sandbox.entry_point.clone());
    prompts.verify().context("Prompt templates are not usable")?;
    let oracle = Arc::new(
        LlmOracle::new(client, system_prompt, config.llm.max_tokens).with_temperature(config.llm.temperature),
    );

    let orchestrator = AttemptOrchestrator::new(
        oracle,
        CodeValidator::new(Arc::new(runtime)),
        prompts,
        FeedbackContextBuilder::new(config.sandbox.entry_point.clone(), config.feedback.max_value_chars),
    );
    let recorder = Arc::new(FileRecorder::new(&config.run.output_dir, &config.run.log_dir)?);
    let driver = RunDriver::new(
        TaskCatalog::new(config.run.data_dir.clone()),
        orchestrator,
        recorder,
        RunSettings::from(&config.run),
    );

    println!(
        "Run {} | tasks {}-{} | model {} | budget {} calls",
        driver.run_id().to_string().cyan(),
        config.run.start,
        config.run.end,
        config.llm.model,
        config.run.max_calls
    );

    let mut budget = CallBudget::new(config.run.max_calls);
    let summary = driver.run(&mut budget, print_report).await?;

    println!();
    println!(
        "{} accepted, {} exhausted, {} budget-limited, {} not attempted, {} skipped, {} load errors",
        summary.count(OutcomeStatus::Success).to_string().green(),
        summary.count(OutcomeStatus::Exhausted).to_string().red(),
        summary.count(OutcomeStatus::BudgetExhausted),
        summary.count(OutcomeStatus::NotAttempted),
        summary.count(OutcomeStatus::Skipped),
        summary.count(OutcomeStatus::LoadError)
    );
    println!("Calls used: {}/{}", summary.calls_used, summary.call_ceiling);
    println!("Progress log: {}", progress_log_path(&config.run.log_dir).display());
    Ok(())
}

fn print_report(report: &TaskReport) {
    let label = match report.status {
        OutcomeStatus::Success => "✓".green(),
        OutcomeStatus::Exhausted => "✗".red(),
        OutcomeStatus::BudgetExhausted | OutcomeStatus::NotAttempted => "…".yellow(),
        OutcomeStatus::Skipped => "-".dimmed(),
        OutcomeStatus::LoadError => "!".red(),
    };
    let mut line = format!("{} {} {}", label, report.task_id, report.status.to_string().bold());
    if report.attempts > 0 {
        line.push_str(&format!(" ({} attempts, {} calls)", report.attempts, report.calls_used));
    }
    if let Some(len) = report.code_length {
        line.push_str(&format!(" {} bytes", len));
    }
    if let Some(detail) = &report.detail {
        line.push_str(&format!(" {}", detail.dimmed()));
    }
    println!("{}", line);
}

async fn cmd_check(
    config: &Config,
    task_id: TaskId,
    solution: Option<PathBuf>,
    include_test: bool,
    data_dir: Option<PathBuf>,
) -> Result<()> {
    let catalog = TaskCatalog::new(data_dir.unwrap_or_else(|| config.run.data_dir.clone()));
    let mut examples = catalog.load(task_id)?;
    if include_test {
        examples = examples.with_test_as_train();
    }

    let path = solution.unwrap_or_else(|| solution_path(&config.run.output_dir, task_id));
    let source = fs::read_to_string(&path).context(format!("Failed to read solution {}", path.display()))?;

    let validator = CodeValidator::new(Arc::new(PythonRuntime::new(&config.sandbox)));
    let verdict = validator.validate(&source, examples.train()).await;
    info!(%task_id, verdict = verdict.tag(), "Checked solution");

    println!("{} ({} bytes, {} examples)", path.display(), source.len(), examples.train().len());
    match &verdict {
        Verdict::Success => {
            println!("{} {}", "✓".green(), verdict.summary());
            Ok(())
        }
        Verdict::Mismatch { expected, actual, .. } => {
            println!("{} {}", "✗".red(), verdict.summary());
            println!("  expected: {}", expected);
            println!("  actual:   {}", actual);
            Err(eyre::eyre!("{} failed validation", task_id))
        }
        _ => {
            println!("{} {}", "✗".red(), verdict.summary());
            Err(eyre::eyre!("{} failed validation", task_id))
        }
    }
}

fn cmd_stats(config: &Config, log_dir: Option<PathBuf>) -> Result<()> {
    let log_dir = log_dir.unwrap_or_else(|| config.run.log_dir.clone());
    let path = progress_log_path(&log_dir);
    let records = read_records(&path)?;
    if records.is_empty() {
        println!("No progress records found at: {}", path.display());
        return Ok(());
    }

    let stats = ProgressStats::from_records(&records);
    println!("Progress Stats");
    println!("--------------");
    println!("Log: {}", path.display());
    println!("Runs: {}", stats.runs);
    println!("Solved tasks: {}", stats.solved.to_string().green());
    if let Some(mean) = stats.mean_solution_length {
        println!("Mean solution length: {:.1} bytes", mean);
    }

    println!();
    println!("Task outcomes:");
    for (status, count) in &stats.task_counts {
        println!("  {:<18} {}", status, count);
    }
    println!();
    println!("Attempt verdicts:");
    for (tag, count) in &stats.attempt_counts {
        println!("  {:<18} {}", tag, count);
    }
    Ok(())
}
