pub mod admin;
pub mod bundles;
pub mod dump_tool;
pub mod enumerator;
pub mod error;
pub mod finalizer;
pub mod lifecycle;
pub mod orchestrator;
pub mod process;
pub mod ravendb;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

pub use admin::{AdminApi, DatabaseDocument, IndexInfo};
pub use bundles::{BundleRules, FeatureBundleSet};
pub use dump_tool::{DumpTool, TransferMode};
pub use enumerator::{list_active_databases, NameFilter};
pub use error::{AdminError, OrchestratorError, ToolError};
pub use finalizer::FinalizeReport;
pub use orchestrator::{
    BackupArtifact, DatabaseOutcome, Operation, OrchestratorOptions, OutcomeStatus, RestoreOrchestrator, RunReport,
};
pub use process::{ProcessRunner, ToolRunner};
pub use ravendb::RavenAdminClient;
pub use retry::{Backoff, RetryPolicy};
