/// Database lifecycle: existence checks, creation with bundles and a fresh
/// encryption key, hard deletion, and bundle activation on a live database

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use std::fmt;
use tracing::{error, info, warn};

use crate::core::admin::{AdminApi, DatabaseDocument};
use crate::core::bundles::FeatureBundleSet;
use crate::core::error::AdminError;
use crate::utils::*;

/// Random symmetric key for one database, base64 encoded
pub struct EncryptionMaterial {
    key: String,
}

impl EncryptionMaterial {
    pub fn generate() -> Self {
        let mut bytes = [0u8; ENCRYPTION_KEY_BITS / 8];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self {
            key: BASE64.encode(bytes),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Secured settings entries carrying the key
    fn secured_settings(&self) -> [(&'static str, String); 4] {
        [
            (ENCRYPTION_KEY_SETTING, self.key.clone()),
            (ENCRYPTION_ALGORITHM_SETTING, ENCRYPTION_ALGORITHM.to_string()),
            (ENCRYPTION_KEY_BITS_SETTING, ENCRYPTION_KEY_BITS.to_string()),
            (ENCRYPT_INDEXES_SETTING, "True".to_string()),
        ]
    }
}

impl fmt::Debug for EncryptionMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionMaterial").field("key", &"<redacted>").finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleActivation {
    Activated,
    AlreadyActive,
    Failed(String),
}

impl BundleActivation {
    pub fn is_failure(&self) -> bool {
        matches!(self, BundleActivation::Failed(_))
    }
}

pub struct DatabaseLifecycle<'a, A> {
    admin: &'a A,
    default_bundles: &'a [String],
    data_dir_prefix: &'a str,
}

impl<'a, A: AdminApi> DatabaseLifecycle<'a, A> {
    pub fn new(admin: &'a A, default_bundles: &'a [String], data_dir_prefix: &'a str) -> Self {
        Self {
            admin,
            default_bundles,
            data_dir_prefix,
        }
    }

    pub async fn exists(&self, name: &str) -> Result<bool, AdminError> {
        self.admin.database_exists(name).await
    }

    /// Create `name` unless it already exists. Existing databases are left
    /// untouched, their bundles are not merged.
    pub async fn create(&self, name: &str, additional_bundles: &[String]) -> Result<CreateOutcome, AdminError> {
        if self.exists(name).await? {
            warn!(database = %name, "Database {} already exists", name);
            return Ok(CreateOutcome::AlreadyExists);
        }

        let bundles = FeatureBundleSet::union(self.default_bundles, additional_bundles);
        let material = EncryptionMaterial::generate();

        let mut document = DatabaseDocument::new(name);
        document.settings.insert(
            DATA_DIR_SETTING.to_string(),
            format!("{}{}", self.data_dir_prefix, name),
        );
        document.set_active_bundles(bundles.as_slice());
        for (key, value) in material.secured_settings() {
            document.secured_settings.insert(key.to_string(), value);
        }

        info!(database = %name, bundles = %bundles.as_slice().join(", "), "Creating database");
        self.admin.create_database(&document).await?;

        Ok(CreateOutcome::Created)
    }

    /// Hard delete `name` if it exists
    pub async fn delete(&self, name: &str) -> Result<DeleteOutcome, AdminError> {
        if !self.exists(name).await? {
            warn!(database = %name, "Database {} does not exist", name);
            return Ok(DeleteOutcome::Missing);
        }

        info!(database = %name, "Deleting database");
        self.admin.delete_database(name, true).await?;
        info!(database = %name, "Deletion complete");

        Ok(DeleteOutcome::Deleted)
    }

    /// Make sure `bundle` is in the active bundles of `name`.
    /// Errors are logged and reported in the result, never returned.
    pub async fn activate_bundle(&self, bundle: &str, name: &str) -> BundleActivation {
        info!(database = %name, "Activating {} bundle", bundle);

        match self.try_activate_bundle(bundle, name).await {
            Ok(activation) => {
                info!(database = %name, "Bundle {} active", bundle);
                activation
            }
            Err(e) => {
                error!(database = %name, "An error occurred while trying to activate bundle {}: {}", bundle, e);
                BundleActivation::Failed(e.to_string())
            }
        }
    }

    async fn try_activate_bundle(&self, bundle: &str, name: &str) -> Result<BundleActivation, AdminError> {
        let mut document = self
            .admin
            .database_document(name)
            .await?
            .ok_or_else(|| AdminError::DocumentNotFound(name.to_string()))?;

        let mut bundles = FeatureBundleSet::union(document.active_bundles(), Vec::<String>::new());
        let activation = if bundles.insert(bundle) {
            BundleActivation::Activated
        } else {
            BundleActivation::AlreadyActive
        };
        document.set_active_bundles(bundles.as_slice());

        self.admin.save_database_document(&document, true).await?;

        Ok(activation)
    }
}
