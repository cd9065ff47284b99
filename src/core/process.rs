/// External process execution
///
/// Runs one executable to completion, draining stdout and stderr while it
/// runs, and kills it when the optional hard timeout expires.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::core::error::ToolError;

/// One invocation: program plus its argument list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program_display(&self) -> String {
        self.program.display().to_string()
    }

    /// Arguments joined by spaces, for logs and error messages
    pub fn args_display(&self) -> String {
        self.args.join(" ")
    }
}

/// Result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ToolOutput {
    /// Only exit code 0 counts as success
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn exit_display(&self) -> String {
        match self.exit_code {
            Some(code) => code.to_string(),
            None => "signal".to_string(),
        }
    }
}

/// Seam between the dump tool logic and the operating system
#[allow(async_fn_in_trait)]
pub trait ToolRunner {
    /// Run to completion. A nonzero exit is a normal `Ok` result; `Err` means
    /// the process could not be started or did not finish in time.
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput, ToolError>;
}

/// Runs commands as real child processes
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl ToolRunner for ProcessRunner {
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput, ToolError> {
        let start = tokio::time::Instant::now();

        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Spawn {
                program: command.program_display(),
                source,
            })?;

        debug!(pid = ?child.id(), program = %command.program_display(), "Process started");

        // wait_with_output reads both pipes to the end while waiting, so a
        // chatty child cannot block on a full pipe buffer
        let wait = child.wait_with_output();

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(result) => result,
                // Dropping the future drops the child, which kills it
                Err(_) => {
                    return Err(ToolError::TimedOut {
                        program: command.program_display(),
                        timeout: limit,
                    })
                }
            },
            None => wait.await,
        }
        .map_err(|source| ToolError::Spawn {
            program: command.program_display(),
            source,
        })?;

        Ok(ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            elapsed: start.elapsed(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ToolCommand {
        ToolCommand::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let runner = ProcessRunner::new(Some(Duration::from_secs(10)));

        let ok = runner.run(&sh("echo exported; echo warn >&2")).await.unwrap();
        assert!(ok.success());
        assert_eq!(ok.stdout.trim(), "exported");
        assert_eq!(ok.stderr.trim(), "warn");

        let failed = runner.run(&sh("echo boom; exit 3")).await.unwrap();
        assert!(!failed.success());
        assert_eq!(failed.exit_code, Some(3));
        assert_eq!(failed.exit_display(), "3");
    }

    #[tokio::test]
    async fn test_large_output_does_not_deadlock() {
        let runner = ProcessRunner::default();
        // Well past a pipe buffer
        let out = runner
            .run(&sh("i=0; while [ $i -lt 20000 ]; do echo line-$i; i=$((i+1)); done"))
            .await
            .unwrap();

        assert!(out.success());
        assert_eq!(out.stdout.lines().count(), 20000);
    }

    #[tokio::test]
    async fn test_timeout_kills_the_process() {
        let runner = ProcessRunner::new(Some(Duration::from_millis(200)));
        let started = std::time::Instant::now();

        let err = runner.run(&sh("sleep 30")).await.unwrap_err();

        assert!(matches!(err, ToolError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_program_is_a_spawn_error() {
        let runner = ProcessRunner::default();
        let err = runner
            .run(&ToolCommand::new("/definitely/not/here/dump-tool"))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::Spawn { .. }));
    }

    #[test]
    fn test_command_display() {
        let cmd = ToolCommand::new("/opt/tool").args(["in", "http://x/"]).arg("--database=a");
        assert_eq!(cmd.args_display(), "in http://x/ --database=a");
        assert_eq!(cmd.program_display(), "/opt/tool");
    }
}
