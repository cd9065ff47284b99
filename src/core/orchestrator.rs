/// Export and import workflows over a fleet of databases
///
/// Everything runs strictly in sequence: one database is exported, or
/// created, imported and finalized, before the next one starts. A dump tool
/// failure only marks that database as failed; admin API errors outside the
/// retry-protected tool calls abort the run and hand back the partial report.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::core::admin::AdminApi;
use crate::core::bundles::BundleRules;
use crate::core::dump_tool::DumpTool;
use crate::core::enumerator::{list_active_databases, NameFilter};
use crate::core::error::{AdminError, OrchestratorError};
use crate::core::finalizer::{FinalizeReport, PostImportFinalizer};
use crate::core::lifecycle::DatabaseLifecycle;
use crate::core::process::ToolRunner;
use crate::utils::{database_name_from_file, ensure_dir, is_blank, DEFAULT_DATA_DIR_PREFIX, DEFAULT_PAGE_SIZE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OutcomeStatus {
    Succeeded,
    Skipped { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseOutcome {
    pub database: String,
    #[serde(flatten)]
    pub status: OutcomeStatus,
    /// Dump tool invocations made for this database
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalize: Option<FinalizeReport>,
}

impl DatabaseOutcome {
    fn skipped(database: &str, reason: &str) -> Self {
        Self {
            database: database.to_string(),
            status: OutcomeStatus::Skipped {
                reason: reason.to_string(),
            },
            attempts: 0,
            finalize: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Succeeded
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Export,
    Import,
}

/// Per-database results of one workflow, in processing order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub operation: Operation,
    pub outcomes: Vec<DatabaseOutcome>,
}

impl RunReport {
    fn new(operation: Operation) -> Self {
        Self {
            operation,
            outcomes: Vec::new(),
        }
    }

    pub fn databases(&self) -> Vec<&str> {
        self.outcomes.iter().map(|o| o.database.as_str()).collect()
    }

    pub fn outcome(&self, database: &str) -> Option<&DatabaseOutcome> {
        self.outcomes.iter().find(|o| o.database == database)
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.succeeded() - self.failed()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }
}

/// A dump file found in the backup directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    pub database: String,
    pub path: PathBuf,
}

/// Knobs shared by the lifecycle manager, enumerator and finalizer
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub page_size: usize,
    pub default_bundles: Vec<String>,
    pub data_dir_prefix: String,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            default_bundles: crate::utils::DEFAULT_BUNDLES.iter().map(|s| s.to_string()).collect(),
            data_dir_prefix: DEFAULT_DATA_DIR_PREFIX.to_string(),
        }
    }
}

pub struct RestoreOrchestrator<A, R> {
    admin: A,
    tool: DumpTool<R>,
    rules: BundleRules,
    options: OrchestratorOptions,
}

impl<A: AdminApi, R: ToolRunner> RestoreOrchestrator<A, R> {
    pub fn new(admin: A, tool: DumpTool<R>, rules: BundleRules) -> Self {
        Self {
            admin,
            tool,
            rules,
            options: OrchestratorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn admin(&self) -> &A {
        &self.admin
    }

    fn lifecycle(&self) -> DatabaseLifecycle<'_, A> {
        DatabaseLifecycle::new(&self.admin, &self.options.default_bundles, &self.options.data_dir_prefix)
    }

    fn backup_dir(&self) -> PathBuf {
        let dir = self.tool.backup_dir();
        if dir.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            dir.to_path_buf()
        }
    }

    /// Export every active database passing `filter` (all of them when `None`)
    pub async fn export_all(&self, filter: Option<NameFilter<'_>>) -> Result<RunReport, OrchestratorError> {
        self.ensure_backup_dir()?;

        let databases = list_active_databases(&self.admin, self.options.page_size, filter).await?;
        info!("Total databases to back up = {}", databases.len());

        let mut report = RunReport::new(Operation::Export);
        for database in &databases {
            report.outcomes.push(self.export_database(database).await);
        }

        Ok(report)
    }

    pub async fn export_one(&self, database: &str) -> Result<RunReport, OrchestratorError> {
        let mut report = RunReport::new(Operation::Export);

        if is_blank(database) {
            warn!("Database name is blank, nothing to export");
            report.outcomes.push(DatabaseOutcome::skipped(database, "blank database name"));
            return Ok(report);
        }

        self.ensure_backup_dir()?;
        report.outcomes.push(self.export_database(database.trim()).await);

        Ok(report)
    }

    /// Restore every dump file in the backup directory whose database name
    /// passes `filter` (all of them when `None`)
    pub async fn import_all(&self, filter: Option<NameFilter<'_>>) -> Result<RunReport, OrchestratorError> {
        let artifacts = self.discover_artifacts(filter)?;
        info!("Total databases to restore = {}", artifacts.len());

        self.import_batch(&artifacts).await
    }

    pub async fn import_one(&self, database: &str) -> Result<RunReport, OrchestratorError> {
        if is_blank(database) {
            warn!("Database name is blank, nothing to import");
            let mut report = RunReport::new(Operation::Import);
            report.outcomes.push(DatabaseOutcome::skipped(database, "blank database name"));
            return Ok(report);
        }

        let database = database.trim();
        let artifacts = self.discover_artifacts(Some(&|name: &str| name == database))?;
        if artifacts.is_empty() {
            warn!(
                database = %database,
                "No dump file at {}, leaving the database alone",
                self.tool.artifact_path(database).display()
            );
            let mut report = RunReport::new(Operation::Import);
            report.outcomes.push(DatabaseOutcome::skipped(database, "dump file not found"));
            return Ok(report);
        }

        self.import_batch(&artifacts).await
    }

    /// Database names of the dump files at the top of the backup directory,
    /// sorted
    pub fn backup_artifacts(&self, filter: Option<NameFilter<'_>>) -> Result<Vec<String>, OrchestratorError> {
        Ok(self
            .discover_artifacts(filter)?
            .into_iter()
            .map(|artifact| artifact.database)
            .collect())
    }

    /// Dump files at the top of the backup directory, sorted by database name.
    /// Each keeps the path it was found at, which is what the tool is given.
    pub fn discover_artifacts(&self, filter: Option<NameFilter<'_>>) -> Result<Vec<BackupArtifact>, OrchestratorError> {
        let dir = self.backup_dir();
        let entries = fs::read_dir(&dir).map_err(|source| backup_dir_error(&dir, source))?;

        let mut artifacts = Vec::new();
        for entry in entries {
            let path = entry.map_err(|source| backup_dir_error(&dir, source))?.path();
            if !path.is_file() {
                continue;
            }

            let Some(database) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| database_name_from_file(n, self.tool.extension()))
            else {
                continue;
            };

            if filter.map_or(true, |f| f(&database)) {
                artifacts.push(BackupArtifact { database, path });
            }
        }

        artifacts.sort_by(|a, b| a.database.cmp(&b.database));
        Ok(artifacts)
    }

    /// Delete every target first, then create, import and finalize them one by one.
    /// An admin error stops the batch and comes back with the outcomes so far.
    async fn import_batch(&self, artifacts: &[BackupArtifact]) -> Result<RunReport, OrchestratorError> {
        let lifecycle = self.lifecycle();
        let mut report = RunReport::new(Operation::Import);

        for artifact in artifacts {
            if let Err(source) = lifecycle.delete(&artifact.database).await {
                return Err(abort(report, &artifact.database, source));
            }
        }
        info!("Done deleting {} database(s)", artifacts.len());

        for artifact in artifacts {
            let database = artifact.database.as_str();
            info!(database = %database, "The database to restore = {}", database);
            match self.import_database(&lifecycle, artifact).await {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(source) => return Err(abort(report, database, source)),
            }
        }

        Ok(report)
    }

    async fn import_database(
        &self,
        lifecycle: &DatabaseLifecycle<'_, A>,
        artifact: &BackupArtifact,
    ) -> Result<DatabaseOutcome, AdminError> {
        let database = artifact.database.as_str();
        lifecycle.create(database, &self.rules.create_bundles(database)).await?;

        let outcome = match self.tool.import_from(database, &artifact.path).await {
            Ok(transfer) => {
                let finalizer = PostImportFinalizer::new(&self.admin, lifecycle, self.options.page_size);
                let finalize = finalizer
                    .finalize(database, &self.rules.activate_bundles(database))
                    .await;
                if !finalize.is_clean() {
                    warn!(database = %database, "Imported with repair problems: {}", finalize.problems());
                }

                DatabaseOutcome {
                    database: database.to_string(),
                    status: OutcomeStatus::Succeeded,
                    attempts: transfer.attempts,
                    finalize: Some(finalize),
                }
            }
            Err(e) => DatabaseOutcome {
                database: database.to_string(),
                attempts: e.attempts(),
                status: OutcomeStatus::Failed { reason: e.to_string() },
                finalize: None,
            },
        };

        Ok(outcome)
    }

    async fn export_database(&self, database: &str) -> DatabaseOutcome {
        match self.tool.export(database).await {
            Ok(transfer) => DatabaseOutcome {
                database: database.to_string(),
                status: OutcomeStatus::Succeeded,
                attempts: transfer.attempts,
                finalize: None,
            },
            Err(e) => DatabaseOutcome {
                database: database.to_string(),
                attempts: e.attempts(),
                status: OutcomeStatus::Failed { reason: e.to_string() },
                finalize: None,
            },
        }
    }

    fn ensure_backup_dir(&self) -> Result<(), OrchestratorError> {
        let dir = self.tool.backup_dir();
        ensure_dir(dir).map_err(|source| backup_dir_error(dir, source))
    }
}

/// The failing database is recorded before the report is handed back
fn abort(mut report: RunReport, database: &str, source: AdminError) -> OrchestratorError {
    error!(database = %database, "Stopping the run: {}", source);
    report.outcomes.push(DatabaseOutcome {
        database: database.to_string(),
        status: OutcomeStatus::Failed {
            reason: source.to_string(),
        },
        attempts: 0,
        finalize: None,
    });
    OrchestratorError::Aborted {
        report: Box::new(report),
        source,
    }
}

fn backup_dir_error(dir: &Path, source: std::io::Error) -> OrchestratorError {
    OrchestratorError::BackupDir {
        path: dir.display().to_string(),
        source,
    }
}
