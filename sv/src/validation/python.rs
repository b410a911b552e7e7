//! Python subprocess runtime
//!
//! Every call starts `python3 -I -c <harness>` in its own scratch directory
//! with an empty environment (only `PATH` is passed through), an address-space
//! limit, and a wall-clock timeout. The request goes in on stdin as JSON and
//! the harness answers with one JSON line on stdout. The interpreter leads its
//! own process group, and the whole group is killed once the answer is in.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::runtime::{CandidateRuntime, InvokeOutcome, LoadOutcome, ParseOutcome, SandboxError};
use crate::config::SandboxConfig;

const HARNESS: &str = include_str!("../../runtime/harness.py");

/// Stderr kept in error messages
const STDERR_TAIL_CHARS: usize = 500;

/// How long to wait for exit status and stderr after the exchange ends
const EXIT_GRACE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum Mode {
    Parse,
    Load,
    Invoke,
}

#[derive(Debug, Serialize)]
struct HarnessRequest<'a> {
    mode: Mode,
    source: &'a str,
    entry_point: &'a str,
    input: Value,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum HarnessResponse {
    Ok {
        #[serde(default)]
        output: Value,
    },
    SyntaxError {
        detail: String,
    },
    MissingEntryPoint {
        detail: String,
    },
    Error {
        detail: String,
    },
}

/// Runs candidates with a local Python interpreter
#[derive(Debug, Clone)]
pub struct PythonRuntime {
    interpreter: String,
    timeout: Duration,
    memory_limit_mb: u64,
    entry_point: String,
}

impl PythonRuntime {
    pub fn new(config: &SandboxConfig) -> Self {
        debug!(interpreter = %config.interpreter, timeout_ms = config.timeout_ms, "PythonRuntime::new: called");
        Self {
            interpreter: config.interpreter.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            memory_limit_mb: config.memory_limit_mb,
            entry_point: config.entry_point.clone(),
        }
    }

    /// Check the interpreter starts; returns its version string
    pub async fn probe(&self) -> Result<String, SandboxError> {
        debug!(interpreter = %self.interpreter, "PythonRuntime::probe: called");
        let output = tokio::time::timeout(
            self.timeout.max(Duration::from_secs(5)),
            Command::new(&self.interpreter)
                .arg("-I")
                .arg("-c")
                .arg("import sys; print('%d.%d.%d' % sys.version_info[:3])")
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| SandboxError::Timeout(self.timeout))?
        .map_err(|source| SandboxError::Spawn {
            interpreter: self.interpreter.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(SandboxError::NoResponse {
                code: output.status.code(),
                stderr: tail(&String::from_utf8_lossy(&output.stderr)),
            });
        }

        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!(interpreter = %self.interpreter, %version, "Python interpreter available");
        Ok(version)
    }

    async fn run(&self, mode: Mode, source: &str, input: Value) -> Result<HarnessResponse, SandboxError> {
        debug!(?mode, source_len = source.len(), "PythonRuntime::run: called");
        let scratch = TempDir::new()?;
        let payload = serde_json::to_vec(&HarnessRequest {
            mode,
            source,
            entry_point: &self.entry_point,
            input,
        })?;

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg("-I")
            .arg("-c")
            .arg(HARNESS)
            .current_dir(scratch.path())
            .env_clear()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = std::env::var_os("PATH") {
            cmd.env("PATH", path);
        }
        self.apply_limits(&mut cmd);

        let mut child = cmd.spawn().map_err(|source| SandboxError::Spawn {
            interpreter: self.interpreter.clone(),
            source,
        })?;
        let pid = child.id();
        let (Some(mut stdin), Some(stdout), Some(mut stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            kill_group(pid);
            return Err(SandboxError::MalformedResponse("child pipes unavailable".to_string()));
        };

        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            buf
        });

        // The harness answers with exactly one line; anything still running after it is discarded
        let exchange = async move {
            stdin.write_all(&payload).await?;
            drop(stdin);
            let mut line = String::new();
            BufReader::new(stdout).read_line(&mut line).await?;
            Ok::<_, std::io::Error>(line)
        };

        let line = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(line)) => line,
            Ok(Err(e)) => {
                kill_group(pid);
                stderr_task.abort();
                return Err(e.into());
            }
            Err(_) => {
                debug!(?mode, "PythonRuntime::run: timed out");
                kill_group(pid);
                stderr_task.abort();
                return Err(SandboxError::Timeout(self.timeout));
            }
        };

        if line.trim().is_empty() {
            let code = match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
                Ok(Ok(status)) => status.code(),
                _ => None,
            };
            kill_group(pid);
            let stderr = collect_stderr(stderr_task).await;
            debug!(?code, "PythonRuntime::run: no response line");
            return Err(SandboxError::NoResponse {
                code,
                stderr: tail(&stderr),
            });
        }

        kill_group(pid);
        stderr_task.abort();
        let line = line.trim();
        serde_json::from_str(line).map_err(|e| SandboxError::MalformedResponse(format!("{}: {}", e, tail(line))))
    }

    #[cfg(unix)]
    fn apply_limits(&self, cmd: &mut Command) {
        cmd.process_group(0);
        if self.memory_limit_mb == 0 {
            return;
        }
        let bytes = self.memory_limit_mb.saturating_mul(1024 * 1024);
        // SAFETY: the closure runs in the forked child before exec and only
        // calls setrlimit, which is async-signal-safe.
        unsafe {
            cmd.pre_exec(move || {
                use nix::sys::resource::{Resource, setrlimit};
                setrlimit(Resource::RLIMIT_AS, bytes, bytes).map_err(std::io::Error::from)
            });
        }
    }

    #[cfg(not(unix))]
    fn apply_limits(&self, _cmd: &mut Command) {}
}

/// SIGKILL the interpreter's process group, including anything the candidate spawned
#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    if let Some(pid) = pid
        && let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL)
    {
        // ESRCH once every member has exited
        debug!(pid, error = %e, "kill_group: killpg failed");
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

async fn collect_stderr(task: JoinHandle<Vec<u8>>) -> String {
    let abort = task.abort_handle();
    match tokio::time::timeout(EXIT_GRACE, task).await {
        Ok(Ok(buf)) => String::from_utf8_lossy(&buf).into_owned(),
        _ => {
            abort.abort();
            String::new()
        }
    }
}

fn tail(text: &str) -> String {
    let text = text.trim();
    let count = text.chars().count();
    if count <= STDERR_TAIL_CHARS {
        return text.to_string();
    }
    text.chars().skip(count - STDERR_TAIL_CHARS).collect()
}

#[async_trait]
impl CandidateRuntime for PythonRuntime {
    async fn parse(&self, source: &str) -> Result<ParseOutcome, SandboxError> {
        match self.run(Mode::Parse, source, Value::Null).await? {
            HarnessResponse::Ok { .. } => Ok(ParseOutcome::Valid),
            HarnessResponse::SyntaxError { detail } | HarnessResponse::Error { detail } => {
                Ok(ParseOutcome::Invalid(detail))
            }
            HarnessResponse::MissingEntryPoint { detail } => Err(SandboxError::MalformedResponse(format!(
                "unexpected entry point result while parsing: {}",
                detail
            ))),
        }
    }

    async fn load(&self, source: &str) -> Result<LoadOutcome, SandboxError> {
        match self.run(Mode::Load, source, Value::Null).await {
            Ok(HarnessResponse::Ok { .. }) => Ok(LoadOutcome::Ready),
            Ok(HarnessResponse::MissingEntryPoint { detail }) => Ok(LoadOutcome::MissingEntryPoint(detail)),
            Ok(HarnessResponse::SyntaxError { detail } | HarnessResponse::Error { detail }) => {
                Ok(LoadOutcome::Failed(detail))
            }
            Err(SandboxError::Timeout(limit)) => Ok(LoadOutcome::Failed(format!(
                "module load timed out after {}ms",
                limit.as_millis()
            ))),
            Err(e) => Err(e),
        }
    }

    async fn invoke(&self, source: &str, input: Value) -> Result<InvokeOutcome, SandboxError> {
        match self.run(Mode::Invoke, source, input).await {
            Ok(HarnessResponse::Ok { output }) => Ok(InvokeOutcome::Returned(output)),
            Ok(
                HarnessResponse::Error { detail }
                | HarnessResponse::SyntaxError { detail }
                | HarnessResponse::MissingEntryPoint { detail },
            ) => Ok(InvokeOutcome::Raised(detail)),
            Err(SandboxError::Timeout(limit)) => Ok(InvokeOutcome::TimedOut(limit)),
            Err(e) => Err(e),
        }
    }
}
