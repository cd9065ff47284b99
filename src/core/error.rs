/// Error types for the admin API, the dump tool and the orchestrator

use std::time::Duration;
use thiserror::Error;

use crate::core::orchestrator::RunReport;

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url} returned HTTP {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("Database document for {0} not found")]
    DocumentNotFound(String),

    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),
}

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not exit within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("{program} failed {attempts} time(s) with arguments {args}, last exit code {last_exit}")]
    Exhausted {
        program: String,
        args: String,
        attempts: u32,
        last_exit: String,
    },
}

impl ToolError {
    /// Invocations made before the operation gave up
    pub fn attempts(&self) -> u32 {
        match self {
            ToolError::Exhausted { attempts, .. } => *attempts,
            _ => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Admin API error: {0}")]
    Admin(#[from] AdminError),

    /// An admin call failed mid-batch; `report` holds what was done so far
    #[error("Run aborted after {} database(s): {source}", .report.outcomes.len())]
    Aborted {
        report: Box<RunReport>,
        #[source]
        source: AdminError,
    },

    #[error("Backup directory {path}: {source}")]
    BackupDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl OrchestratorError {
    /// Outcomes recorded before the run stopped
    pub fn partial_report(&self) -> Option<&RunReport> {
        match self {
            OrchestratorError::Aborted { report, .. } => Some(report.as_ref()),
            _ => None,
        }
    }
}
