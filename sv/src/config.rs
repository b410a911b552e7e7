//! selfverify configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main selfverify configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Run-level options (task range, budget, attempts, paths)
    pub run: RunConfig,

    /// Candidate execution limits
    pub sandbox: SandboxConfig,

    /// Refinement feedback rendering
    pub feedback: FeedbackConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that required environment variables are set. Call this early in
    /// startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        if self.run.max_attempts == 0 {
            return Err(eyre::eyre!("run.max-attempts must be at least 1"));
        }
        if self.run.start > self.run.end {
            return Err(eyre::eyre!(
                "run.start ({}) is greater than run.end ({})",
                self.run.start,
                self.run.end
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    ///
    /// 1. Explicit path (errors are fatal)
    /// 2. `./.selfverify.yml`
    /// 3. `~/.config/selfverify/selfverify.yml`
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::search_paths() {
            if candidate.exists() {
                match Self::load_from_file(&candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", candidate.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialised
    ///
    /// Errors are swallowed: a broken config is reported properly by `load`.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = match config_path {
            Some(p) => p.clone(),
            None => Self::search_paths().into_iter().find(|p| p.exists())?,
        };
        Self::load_from_file(&path).ok().and_then(|c| c.log_level)
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".selfverify.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("selfverify").join("selfverify.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("openai" or "groq"; both speak chat completions)
    pub provider: String,

    /// Model identifier, passed through to the provider untouched
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL (without the `/v1/...` suffix)
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Sampling temperature
    pub temperature: f32,

    /// HTTP-level retries inside one oracle call (0 = one request per call)
    #[serde(rename = "max-retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "openai/gpt-oss-20b".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            base_url: "https://api.groq.com/openai".to_string(),
            max_tokens: 8000,
            timeout_ms: 300_000,
            temperature: 0.2,
            max_retries: 0,
        }
    }
}

/// Run-level options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory containing `taskNNN.json` files
    #[serde(rename = "data-dir")]
    pub data_dir: PathBuf,

    /// Directory for accepted solutions (failed attempts go to `failed/` inside it)
    #[serde(rename = "output-dir")]
    pub output_dir: PathBuf,

    /// Directory for the progress log
    #[serde(rename = "log-dir")]
    pub log_dir: PathBuf,

    /// First task id (inclusive)
    pub start: u32,

    /// Last task id (inclusive)
    pub end: u32,

    /// Maximum oracle calls for the whole run
    #[serde(rename = "max-calls")]
    pub max_calls: u32,

    /// Attempts per task
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Pause between tasks in milliseconds
    #[serde(rename = "task-delay-ms")]
    pub task_delay_ms: u64,

    /// Skip tasks that already have a saved solution
    #[serde(rename = "skip-solved")]
    pub skip_solved: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/google-code-golf-2025"),
            output_dir: PathBuf::from("output"),
            log_dir: PathBuf::from("logs"),
            start: 1,
            end: 10,
            max_calls: 100,
            max_attempts: 3,
            task_delay_ms: 2000,
            skip_solved: true,
        }
    }
}

/// Candidate execution limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Python interpreter used to run candidates
    pub interpreter: String,

    /// Wall-clock limit per candidate process in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Address-space limit per candidate process in MB (0 = unlimited)
    #[serde(rename = "memory-limit-mb")]
    pub memory_limit_mb: u64,

    /// Name of the function candidates must define
    #[serde(rename = "entry-point")]
    pub entry_point: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            timeout_ms: 5_000,
            memory_limit_mb: 1024,
            entry_point: "p".to_string(),
        }
    }
}

/// Refinement feedback rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Maximum characters of each expected/actual value shown on mismatch
    #[serde(rename = "max-value-chars")]
    pub max_value_chars: usize,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self { max_value_chars: 600 }
    }
}
