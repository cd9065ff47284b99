/// Export/import through the external dump tool
///
/// Builds the tool's command line for one database and drives it through
/// the retry policy. Every logical operation ends with the cooldown pause,
/// whether it succeeded or not.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::core::error::ToolError;
use crate::core::process::{ToolCommand, ToolOutput, ToolRunner};
use crate::core::retry::RetryPolicy;
use crate::utils::{
    artifact_path, format_duration, DEFAULT_COOLDOWN, DEFAULT_DUMP_EXTENSION, EXPORT_ACTION,
    IMPORT_ACTION, IMPORT_VERIFICATION_FILTER,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Export,
    Import,
}

impl TransferMode {
    pub fn action(&self) -> &'static str {
        match self {
            TransferMode::Export => EXPORT_ACTION,
            TransferMode::Import => IMPORT_ACTION,
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::Export => write!(f, "export"),
            TransferMode::Import => write!(f, "import"),
        }
    }
}

/// Successful transfer
#[derive(Debug, Clone)]
pub struct TransferReport {
    /// Invocations it took, including the successful one
    pub attempts: u32,
    pub output: ToolOutput,
}

pub struct DumpTool<R> {
    runner: R,
    program: PathBuf,
    server_url: String,
    backup_dir: PathBuf,
    extension: String,
    retry: RetryPolicy,
    cooldown: Duration,
    export_args: Vec<String>,
    import_args: Vec<String>,
}

impl<R: ToolRunner> DumpTool<R> {
    pub fn new(runner: R, program: impl Into<PathBuf>, server_url: impl Into<String>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            program: program.into(),
            server_url: server_url.into(),
            backup_dir: backup_dir.into(),
            extension: DEFAULT_DUMP_EXTENSION.to_string(),
            retry: RetryPolicy::default(),
            cooldown: DEFAULT_COOLDOWN,
            export_args: Vec::new(),
            import_args: Vec::new(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_export_args(mut self, args: Vec<String>) -> Self {
        self.export_args = args;
        self
    }

    pub fn with_import_args(mut self, args: Vec<String>) -> Self {
        self.import_args = args;
        self
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Dump file for `database`
    pub fn artifact_path(&self, database: &str) -> PathBuf {
        artifact_path(&self.backup_dir, database, &self.extension)
    }

    /// Full command line for one transfer against the database's default dump file
    pub fn command(&self, mode: TransferMode, database: &str) -> ToolCommand {
        self.command_for(mode, database, &self.artifact_path(database))
    }

    /// Full command line for one transfer against `file`
    pub fn command_for(&self, mode: TransferMode, database: &str, file: &Path) -> ToolCommand {
        let command = ToolCommand::new(&self.program)
            .arg(mode.action())
            .arg(&self.server_url)
            .arg(file.display().to_string())
            .arg(format!("--database={}", database));

        match mode {
            TransferMode::Export => command.args(self.export_args.iter().cloned()),
            TransferMode::Import => command
                .arg(IMPORT_VERIFICATION_FILTER)
                .args(self.import_args.iter().cloned()),
        }
    }

    pub async fn export(&self, database: &str) -> Result<TransferReport, ToolError> {
        let command = self.command(TransferMode::Export, database);
        self.transfer(TransferMode::Export, database, command).await
    }

    pub async fn import(&self, database: &str) -> Result<TransferReport, ToolError> {
        let command = self.command(TransferMode::Import, database);
        self.transfer(TransferMode::Import, database, command).await
    }

    /// Import `database` from a dump file found on disk
    pub async fn import_from(&self, database: &str, file: &Path) -> Result<TransferReport, ToolError> {
        let command = self.command_for(TransferMode::Import, database, file);
        self.transfer(TransferMode::Import, database, command).await
    }

    async fn transfer(&self, mode: TransferMode, database: &str, command: ToolCommand) -> Result<TransferReport, ToolError> {
        info!(database = %database, "Starting {} with {}", mode, self.program.display());

        let result = self.run_with_retry(database, &command).await;

        match &result {
            Ok(report) if report.attempts > 1 => {
                info!(database = %database, attempts = report.attempts, "{} succeeded after retrying", mode)
            }
            Ok(_) => info!(database = %database, "{} succeeded", mode),
            Err(e) => error!(database = %database, "{} failed: {}", mode, e),
        }

        if !self.cooldown.is_zero() {
            tokio::time::sleep(self.cooldown).await;
        }

        result
    }

    async fn run_with_retry(&self, database: &str, command: &ToolCommand) -> Result<TransferReport, ToolError> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            info!(
                database = %database,
                attempt,
                "Running {} {}",
                command.program_display(),
                command.args_display()
            );

            let last_exit = match self.runner.run(command).await {
                Ok(output) if output.success() => {
                    info!(database = %database, elapsed = %format_duration(output.elapsed), "Process output = {}", output.stdout.trim_end());
                    return Ok(TransferReport { attempts: attempt, output });
                }
                Ok(output) => {
                    warn!(
                        database = %database,
                        exit_code = %output.exit_display(),
                        "Process {} didn't work with arguments {}",
                        command.program_display(),
                        command.args_display()
                    );
                    warn!(database = %database, "Process output = {}", output.stdout.trim_end());
                    if !output.stderr.trim().is_empty() {
                        warn!(database = %database, "Process error output = {}", output.stderr.trim_end());
                    }
                    output.exit_display()
                }
                Err(e @ ToolError::TimedOut { .. }) => {
                    warn!(database = %database, "{}", e);
                    "timeout".to_string()
                }
                // Nothing to retry when the tool cannot be started at all
                Err(e) => return Err(e),
            };

            match self.retry.delay_after(attempt) {
                Some(delay) => {
                    warn!(
                        database = %database,
                        "Attempt {} of {} failed, sleeping {} before trying again",
                        attempt,
                        self.retry.max_attempts,
                        format_duration(delay)
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    return Err(ToolError::Exhausted {
                        program: command.program_display(),
                        args: command.args_display(),
                        attempts: attempt,
                        last_exit,
                    })
                }
            }
        }
    }
}
