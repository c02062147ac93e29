//! ScriptRunner - run a sandboxed script as a child process with a hard timeout

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use super::{ToolContext, ToolError};

/// Default wall-clock budget for one script run
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Result text when a script exits cleanly without printing anything
pub const NO_OUTPUT: &str = "No output produced.";

/// What happened to a script run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The process exited on its own (with any exit code)
    Completed {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    /// The process exceeded its budget and was killed
    TimedOut { timeout: Duration },
}

impl ExecutionOutcome {
    /// Whether the process ran to completion with exit code 0
    pub fn success(&self) -> bool {
        matches!(self, ExecutionOutcome::Completed { exit_code: 0, .. })
    }

    /// Text handed back to the model for `script`
    ///
    /// A completed run is always output, whatever its exit code. A timeout
    /// is a [`ToolError::Timeout`].
    pub fn into_tool_output(self, script: &str) -> Result<String, ToolError> {
        match self {
            ExecutionOutcome::Completed {
                exit_code,
                stdout,
                stderr,
            } => Ok(format_completed(exit_code, &stdout, &stderr)),
            ExecutionOutcome::TimedOut { timeout } => Err(ToolError::Timeout {
                path: script.to_string(),
                timeout_secs: timeout.as_secs(),
            }),
        }
    }
}

fn format_completed(exit_code: i32, stdout: &str, stderr: &str) -> String {
    if stdout.is_empty() && stderr.is_empty() && exit_code == 0 {
        return NO_OUTPUT.to_string();
    }

    let mut parts = Vec::new();
    if !stdout.is_empty() {
        parts.push(format!("STDOUT: {}", stdout));
    }
    if !stderr.is_empty() {
        parts.push(format!("STDERR: {}", stderr));
    }
    if exit_code != 0 {
        parts.push(format!("Process exited with code {}", exit_code));
    }
    parts.join("\n")
}

/// Exit code of a finished child; a signal death is reported as `-signo`
fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    status.code().unwrap_or(-1)
}

/// Runs scripts of one kind (e.g. `.py` through `python3`) inside the sandbox
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    interpreter: String,
    extension: String,
    timeout: Duration,
}

impl ScriptRunner {
    /// Create a runner for scripts with `extension`, executed by `interpreter`
    pub fn new(interpreter: impl Into<String>, extension: impl Into<String>, timeout: Duration) -> Self {
        let interpreter = interpreter.into();
        let extension = extension.into().trim_start_matches('.').to_string();
        debug!(%interpreter, %extension, ?timeout, "ScriptRunner::new: called");
        Self {
            interpreter,
            extension,
            timeout,
        }
    }

    /// Python runner with the default budget
    pub fn python() -> Self {
        Self::new("python3", "py", Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Human-readable name of the supported script kind
    pub fn kind(&self) -> String {
        match self.extension.as_str() {
            "py" => "Python".to_string(),
            "sh" => "shell".to_string(),
            other => format!(".{}", other),
        }
    }

    /// Supported file extension (without the dot)
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Wall-clock budget
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Validate and run `script` with `args`, working directory = sandbox root
    ///
    /// Checks run in order and short-circuit: containment, existence, file
    /// kind. A non-zero exit is a normal [`ExecutionOutcome::Completed`].
    pub async fn run(&self, ctx: &ToolContext, script: &str, args: &[String]) -> Result<ExecutionOutcome, ToolError> {
        debug!(%script, ?args, "ScriptRunner::run: called");
        let full_path = ctx.resolve(script)?;

        if !tokio::fs::try_exists(&full_path).await.unwrap_or(false) {
            debug!(?full_path, "ScriptRunner::run: script does not exist");
            return Err(ToolError::FileNotFound {
                path: script.to_string(),
            });
        }

        if Path::new(script).extension().and_then(|e| e.to_str()) != Some(self.extension.as_str()) {
            debug!(%script, "ScriptRunner::run: unsupported file type");
            return Err(ToolError::UnsupportedFileType {
                path: script.to_string(),
                kind: self.kind(),
            });
        }

        let mut command = Command::new(&self.interpreter);
        command
            .arg(&full_path)
            .args(args)
            .current_dir(ctx.root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn()?;
        let _group = ProcessGroupGuard::new(child.id());
        debug!(pid = ?child.id(), "ScriptRunner::run: child spawned");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let collected = tokio::time::timeout(self.timeout, async {
            tokio::try_join!(child.wait(), read_stream(stdout), read_stream(stderr))
        })
        .await;

        match collected {
            Ok(Ok((status, stdout, stderr))) => {
                debug!(?status, "ScriptRunner::run: child exited");
                Ok(ExecutionOutcome::Completed {
                    exit_code: exit_code(status),
                    stdout: String::from_utf8_lossy(&stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&stderr).into_owned(),
                })
            }
            Ok(Err(e)) => {
                debug!(%e, "ScriptRunner::run: failed while waiting for child");
                Err(ToolError::Io(e))
            }
            Err(_) => {
                warn!(%script, timeout_secs = self.timeout.as_secs(), "Script timed out, killing");
                if let Err(e) = child.kill().await {
                    debug!(%e, "ScriptRunner::run: kill after timeout failed");
                }
                Ok(ExecutionOutcome::TimedOut { timeout: self.timeout })
            }
        }
    }
}

async fn read_stream<R: AsyncRead + Unpin>(stream: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        stream.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Kills the child's whole process group when dropped
///
/// The child is spawned as the leader of its own group, so this also takes
/// down anything the script forked. Runs on every exit path: normal
/// completion, timeout, error, and the run future being dropped.
struct ProcessGroupGuard {
    pgid: Option<u32>,
}

impl ProcessGroupGuard {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{Signal, killpg};
            use nix::unistd::Pid;

            if let Some(pgid) = self.pgid {
                // ESRCH just means the group is already gone
                let result = killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL);
                debug!(pgid, ?result, "ProcessGroupGuard::drop: group killed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Sandbox;
    use std::fs;
    use tempfile::tempdir;

    fn sh_runner(timeout: Duration) -> ScriptRunner {
        ScriptRunner::new("sh", "sh", timeout)
    }

    fn ctx_for(path: &Path) -> ToolContext {
        ToolContext::new(Sandbox::new(path).unwrap(), "test")
    }

    #[tokio::test]
    async fn test_run_captures_stdout_and_stderr_separately() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("hello.sh"), "echo out\necho err >&2\n").unwrap();
        let ctx = ctx_for(temp.path());

        let outcome = sh_runner(Duration::from_secs(10))
            .run(&ctx, "hello.sh", &[])
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ExecutionOutcome::Completed {
                exit_code: 0,
                stdout: "out\n".to_string(),
                stderr: "err\n".to_string(),
            }
        );
        assert_eq!(
            outcome.into_tool_output("hello.sh").unwrap(),
            "STDOUT: out\n\nSTDERR: err\n"
        );
    }

    #[tokio::test]
    async fn test_run_passes_args_and_uses_root_as_cwd() {
        let temp = tempdir().unwrap();
        fs::create_dir(temp.path().join("pkg")).unwrap();
        fs::write(temp.path().join("pkg/args.sh"), "echo \"$1-$2\"\ncat data.txt\n").unwrap();
        fs::write(temp.path().join("data.txt"), "from-root").unwrap();
        let ctx = ctx_for(temp.path());

        let outcome = sh_runner(Duration::from_secs(10))
            .run(&ctx, "pkg/args.sh", &["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        let text = outcome.into_tool_output("pkg/args.sh").unwrap();
        assert!(text.contains("a-b"));
        assert!(text.contains("from-root"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_an_outcome() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("fail.sh"), "echo partial\nexit 3\n").unwrap();
        let ctx = ctx_for(temp.path());

        let outcome = sh_runner(Duration::from_secs(10))
            .run(&ctx, "fail.sh", &[])
            .await
            .unwrap();

        assert!(!outcome.success());
        let text = outcome.into_tool_output("fail.sh").unwrap();
        assert!(text.contains("STDOUT: partial"));
        assert!(text.contains("Process exited with code 3"));
    }

    #[tokio::test]
    async fn test_silent_script_reports_sentinel() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("quiet.sh"), "true\n").unwrap();
        let ctx = ctx_for(temp.path());

        let outcome = sh_runner(Duration::from_secs(10))
            .run(&ctx, "quiet.sh", &[])
            .await
            .unwrap();

        assert!(outcome.success());
        assert_eq!(outcome.into_tool_output("quiet.sh").unwrap(), NO_OUTPUT);
    }

    #[tokio::test]
    async fn test_prechecks_in_order() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("notes.txt"), "not a script").unwrap();
        let ctx = ctx_for(temp.path());
        let runner = sh_runner(Duration::from_secs(10));

        // containment before existence
        assert!(matches!(
            runner.run(&ctx, "../missing.txt", &[]).await,
            Err(ToolError::OutsideSandbox { .. })
        ));
        // existence before file kind
        assert!(matches!(
            runner.run(&ctx, "missing.txt", &[]).await,
            Err(ToolError::FileNotFound { .. })
        ));
        assert!(matches!(
            runner.run(&ctx, "notes.txt", &[]).await,
            Err(ToolError::UnsupportedFileType { .. })
        ));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("slow.sh"), "sleep 30\n").unwrap();
        let ctx = ctx_for(temp.path());

        let started = std::time::Instant::now();
        let outcome = sh_runner(Duration::from_millis(300))
            .run(&ctx, "slow.sh", &[])
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ExecutionOutcome::TimedOut {
                timeout: Duration::from_millis(300)
            }
        );
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    /// True while `pid` exists and is not a zombie
    #[cfg(target_os = "linux")]
    fn is_alive(pid: &str) -> bool {
        match fs::read_to_string(format!("/proc/{}/status", pid)) {
            Ok(status) => !status
                .lines()
                .any(|l| l.starts_with("State:") && (l.contains('Z') || l.contains('X'))),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_kills_forked_descendants() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("fork.sh"),
            "sleep 30 &\necho $! > child.pid\nwait\n",
        )
        .unwrap();
        let ctx = ctx_for(temp.path());

        let outcome = sh_runner(Duration::from_millis(500))
            .run(&ctx, "fork.sh", &[])
            .await
            .unwrap();
        assert!(matches!(outcome, ExecutionOutcome::TimedOut { .. }));

        let pid = fs::read_to_string(temp.path().join("child.pid")).unwrap();
        let pid = pid.trim().to_string();

        let mut alive = true;
        for _ in 0..50 {
            if !is_alive(&pid) {
                alive = false;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!alive, "forked child {} survived the timeout", pid);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ScriptRunner::python().kind(), "Python");
        assert_eq!(ScriptRunner::new("sh", ".sh", Duration::from_secs(1)).extension(), "sh");
        assert_eq!(ScriptRunner::new("ruby", "rb", Duration::from_secs(1)).kind(), ".rb");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_signal_death_reports_negative_signal() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("killed.sh"), "kill -9 $$\n").unwrap();
        let ctx = ctx_for(temp.path());

        let outcome = sh_runner(Duration::from_secs(10))
            .run(&ctx, "killed.sh", &[])
            .await
            .unwrap();

        assert!(matches!(outcome, ExecutionOutcome::Completed { exit_code: -9, .. }));
        assert_eq!(
            outcome.into_tool_output("killed.sh").unwrap(),
            "Process exited with code -9"
        );
    }

    #[test]
    fn test_timed_out_becomes_timeout_error() {
        let outcome = ExecutionOutcome::TimedOut {
            timeout: Duration::from_secs(30),
        };
        let err = outcome.into_tool_output("slow.py").unwrap_err();
        assert_eq!(err.to_string(), "Script \"slow.py\" timed out after 30s and was killed");
    }
}
