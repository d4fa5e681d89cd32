//! # Execution Sandbox
//!
//! Runs generated Python in a fresh interpreter process and turns every
//! outcome into text the model can read.
//!
//! Each call gets its own process group, its own empty working directory
//! and its own evaluation scope, so nothing survives between calls. The
//! process runs in isolated mode (`-I`) with a cleared environment. When the
//! interpreter exits or the time limit is reached, the whole group is
//! killed, including anything the code started in the background. It still
//! runs with the privileges of the host user: output capture and a time
//! limit are the only guarantees.
//!
//! The code goes to a small harness over stdin. The harness `exec`s it with
//! unbuffered stdout, so the pipe carries everything the program printed in
//! the order it was written. The outcome (ok, import error, other error)
//! is written as JSON to a report file outside the working directory.

use crate::config::SandboxConfig;
use codeact_error::{Error, ErrorKind, Result};
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

/// Returned when the code ran cleanly but printed nothing.
pub const NO_OUTPUT_MESSAGE: &str = "Code executed successfully but produced no output (stdout was empty). \
Make sure the code ends by calling its function and printing the result with print().";

/// Returned when the code failed to import a module.
pub const MISSING_DEPENDENCY_MESSAGE: &str = "Execution error: a required library is missing. \
The code tried to import a module that is not installed.";

const HARNESS: &str = r#"
import importlib, json, sys, traceback

_code = sys.stdin.read()
_report_path = sys.argv[2]
_report = {"status": "ok", "error": ""}
try:
    _scope = {"__builtins__": __builtins__, "__name__": "__main__"}
    for _name in json.loads(sys.argv[1]):
        _scope[_name] = importlib.import_module(_name)
    exec(compile(_code, "<generated>", "exec"), _scope)
except ImportError:
    _report["status"] = "import_error"
except SystemExit:
    pass
except Exception as _e:
    _report["status"] = "error"
    _report["error"] = "Runtime Error: " + str(_e) + "\n" + traceback.format_exc()
try:
    sys.stdout.flush()
except Exception:
    pass
with open(_report_path, "w", encoding="utf-8") as _f:
    json.dump(_report, _f)
"#;

/// Max stderr characters quoted when the interpreter dies without reporting
const STDERR_TAIL_CHARS: usize = 2000;

/// How long to keep reading the pipes once the process group is gone
const PIPE_GRACE: Duration = Duration::from_millis(500);

/// Anything that can run a piece of generated code.
///
/// Implementations never fail: every problem comes back as descriptive text.
/// Successful output is everything the program wrote to stdout, including
/// direct writes to the file descriptor and output of child processes, in
/// the order it was written.
#[allow(async_fn_in_trait)]
pub trait CodeExecutor: Send + Sync {
    async fn execute(&self, code: &str) -> String;
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum ReportStatus {
    Ok,
    ImportError,
    Error,
}

#[derive(Debug, Deserialize)]
struct Report {
    status: ReportStatus,
    #[serde(default)]
    error: String,
}

/// Python sandbox backed by one interpreter process per execution
#[derive(Debug, Clone, Default)]
pub struct PythonSandbox {
    config: SandboxConfig,
}

impl PythonSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Run the harness and return the rendered result, or why the harness
    /// itself could not produce one.
    async fn run(&self, code: &str) -> Result<String> {
        let scratch = tempfile::Builder::new().prefix("codeact-exec-").tempdir()?;
        let workdir = scratch.path().join("work");
        tokio::fs::create_dir(&workdir).await?;
        let report_path = scratch.path().join("report.json");
        let preload = serde_json::to_string(&self.config.preload)
            .map_err(|e| Error::unexpected("failed to encode preload list").set_source(e))?;

        let mut command = Command::new(&self.config.python);
        command
            .args(["-I", "-B", "-u", "-X", "utf8", "-c"])
            .arg(HARNESS)
            .arg(preload)
            .arg(&report_path)
            .current_dir(&workdir)
            .env_clear()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = std::env::var_os("PATH") {
            command.env("PATH", path);
        }
        #[cfg(unix)]
        command.process_group(0);

        let python = self.config.python.display().to_string();
        let mut child = command.spawn().map_err(|e| {
            Error::sandbox_unavailable(&python, format!("failed to start '{}': {}", python, e))
                .with_operation("sandbox::run")
                .set_source(e)
        })?;
        let group = ProcessGroup::new(child.id());

        // Background processes inherit the pipes, so they are read
        // concurrently and the interpreter's own exit decides when we stop.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        let stdin = child.stdin.take();

        let wait = async {
            if let Some(mut stdin) = stdin {
                match stdin.write_all(code.as_bytes()).await {
                    // The interpreter died before reading; its stderr says why.
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                    other => other?,
                }
            }
            child.wait().await
        };
        let exited = tokio::time::timeout(self.config.timeout, wait).await;
        group.kill();

        let status = match exited {
            Ok(result) => result.map_err(|e| {
                Error::execution_failed(format!("failed waiting for interpreter: {}", e))
                    .with_operation("sandbox::run")
                    .set_source(e)
            })?,
            Err(_) => {
                return Err(Error::execution_timeout(self.config.timeout)
                    .with_operation("sandbox::run"));
            }
        };

        let stdout = collect(stdout).await;
        let report = match read_report(&report_path).await? {
            Some(report) => report,
            None => {
                let stderr = collect(stderr).await;
                let stderr = String::from_utf8_lossy(&stderr);
                return Err(Error::execution_failed(format!(
                    "interpreter exited ({}) before reporting a result\n{}",
                    status,
                    tail(stderr.trim(), STDERR_TAIL_CHARS)
                ))
                .with_operation("sandbox::run"));
            }
        };

        Ok(render(report.status, &String::from_utf8_lossy(&stdout), &report.error))
    }
}

/// `None` when the harness never got to write its report.
async fn read_report(path: &Path) -> Result<Option<Report>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::from(e).with_operation("sandbox::read_report")),
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let report = serde_json::from_str(&raw).map_err(|e| {
        Error::parse_failed(format!("malformed harness report: {}", e))
            .with_operation("sandbox::read_report")
            .set_source(e)
    })?;
    Ok(Some(report))
}

fn drain<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            // Whatever was read before an error is still worth returning.
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    })
}

/// Output of a drained pipe. A writer that escaped the process group can
/// hold the pipe open forever, so reading gives up after [`PIPE_GRACE`].
async fn collect(handle: JoinHandle<Vec<u8>>) -> Vec<u8> {
    let abort = handle.abort_handle();
    match tokio::time::timeout(PIPE_GRACE, handle).await {
        Ok(Ok(buf)) => buf,
        Ok(Err(_)) => Vec::new(),
        Err(_) => {
            abort.abort();
            tracing::warn!("sandbox pipe still open after the process group was killed");
            Vec::new()
        }
    }
}

/// The interpreter's process group. Killed explicitly once the interpreter
/// is done and again on drop, so a cancelled execution leaves nothing behind.
struct ProcessGroup {
    #[cfg_attr(not(unix), allow(dead_code))]
    leader: Option<u32>,
}

impl ProcessGroup {
    fn new(leader: Option<u32>) -> Self {
        Self { leader }
    }

    #[cfg(unix)]
    fn kill(&self) {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let Some(leader) = self.leader.and_then(|pid| i32::try_from(pid).ok()) else {
            return;
        };
        match killpg(Pid::from_raw(leader), Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => tracing::debug!(pgid = leader, error = %e, "killpg failed"),
        }
    }

    /// Without process groups only the interpreter is killed, via `kill_on_drop`.
    #[cfg(not(unix))]
    fn kill(&self) {}
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

impl CodeExecutor for PythonSandbox {
    async fn execute(&self, code: &str) -> String {
        let started_at = Instant::now();
        tracing::debug!(
            python = %self.config.python.display(),
            code_bytes = code.len(),
            timeout_ms = self.config.timeout.as_millis() as u64,
            "sandbox_execution_started"
        );

        let text = match self.run(code).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(error = %err, "sandbox_execution_failed");
                describe_failure(&err)
            }
        };

        tracing::debug!(
            duration_ms = started_at.elapsed().as_millis() as u64,
            output_bytes = text.len(),
            "sandbox_execution_finished"
        );
        text
    }
}

fn render(status: ReportStatus, captured: &str, error: &str) -> String {
    match status {
        ReportStatus::Ok => {
            let trimmed = captured.trim_end();
            if trimmed.trim_start().is_empty() {
                NO_OUTPUT_MESSAGE.to_string()
            } else {
                trimmed.to_string()
            }
        }
        ReportStatus::ImportError => MISSING_DEPENDENCY_MESSAGE.to_string(),
        ReportStatus::Error => error.trim_end().to_string(),
    }
}

/// Linearize a harness failure into text for the conversation.
fn describe_failure(err: &Error) -> String {
    match err.kind() {
        ErrorKind::SandboxUnavailable => format!(
            "Execution error: the code sandbox is unavailable ({}).",
            err.message()
        ),
        ErrorKind::ExecutionTimeout => format!(
            "Execution error: the code did not finish within the time limit ({}) and was stopped. \
             Avoid infinite loops and long blocking calls.",
            err.message()
        ),
        _ => format!("Execution error: {}", err.message()),
    }
}

fn tail(s: &str, max_chars: usize) -> &str {
    let count = s.chars().count();
    if count <= max_chars {
        return s;
    }
    match s.char_indices().nth(count - max_chars) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}
