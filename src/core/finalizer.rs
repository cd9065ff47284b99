/// Post-import repair
///
/// An import does not leave indexes fresh, so every non-compiled index is
/// reset. Rule-derived bundles are activated afterwards because activation
/// can itself change indexes. No step stops the ones after it.

use serde::Serialize;
use tracing::{error, info};

use crate::core::admin::AdminApi;
use crate::core::lifecycle::{BundleActivation, DatabaseLifecycle};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FinalizeReport {
    pub indexes_reset: Vec<String>,
    /// (index, reason)
    pub index_failures: Vec<(String, String)>,
    /// Set when the index listing itself failed
    pub listing_error: Option<String>,
    pub bundles_activated: Vec<String>,
    /// (bundle, reason)
    pub bundle_failures: Vec<(String, String)>,
}

impl FinalizeReport {
    pub fn is_clean(&self) -> bool {
        self.index_failures.is_empty() && self.listing_error.is_none() && self.bundle_failures.is_empty()
    }

    /// One line summary of what went wrong, empty when clean
    pub fn problems(&self) -> String {
        let mut problems = Vec::new();
        if let Some(e) = &self.listing_error {
            problems.push(format!("index listing failed: {}", e));
        }
        for (index, reason) in &self.index_failures {
            problems.push(format!("reset of {} failed: {}", index, reason));
        }
        for (bundle, reason) in &self.bundle_failures {
            problems.push(format!("bundle {} failed: {}", bundle, reason));
        }
        problems.join("; ")
    }
}

pub struct PostImportFinalizer<'a, A> {
    lifecycle: &'a DatabaseLifecycle<'a, A>,
    admin: &'a A,
    page_size: usize,
}

impl<'a, A: AdminApi> PostImportFinalizer<'a, A> {
    pub fn new(admin: &'a A, lifecycle: &'a DatabaseLifecycle<'a, A>, page_size: usize) -> Self {
        Self {
            lifecycle,
            admin,
            page_size: page_size.max(1),
        }
    }

    pub async fn finalize(&self, database: &str, activate_bundles: &[String]) -> FinalizeReport {
        let mut report = FinalizeReport::default();

        self.reset_indexes(database, &mut report).await;

        for bundle in activate_bundles {
            match self.lifecycle.activate_bundle(bundle, database).await {
                BundleActivation::Activated | BundleActivation::AlreadyActive => {
                    report.bundles_activated.push(bundle.clone())
                }
                BundleActivation::Failed(reason) => report.bundle_failures.push((bundle.clone(), reason)),
            }
        }

        report
    }

    async fn reset_indexes(&self, database: &str, report: &mut FinalizeReport) {
        info!(database = %database, "Resetting indexes");

        let mut start = 0;
        loop {
            let page = match self.admin.indexes(database, start, self.page_size).await {
                Ok(page) => page,
                Err(e) => {
                    error!(database = %database, "Unable to list indexes: {}", e);
                    report.listing_error = Some(e.to_string());
                    return;
                }
            };
            if page.is_empty() {
                return;
            }
            start += page.len();

            for index in page.into_iter().filter(|i| !i.is_compiled) {
                info!(database = %database, "Resetting index: {}", index.name);
                match self.admin.reset_index(database, &index.name).await {
                    Ok(()) => report.indexes_reset.push(index.name),
                    Err(e) => {
                        error!(database = %database, "Unable to reset index {}: {}", index.name, e);
                        report.index_failures.push((index.name, e.to_string()));
                    }
                }
            }
        }
    }
}
