/// Administrative API contract and the documents it exchanges
///
/// Everything the orchestrator needs from the database server goes through
/// [`AdminApi`]. The HTTP implementation lives in `ravendb.rs`; tests use
/// the in-memory fake from `testing.rs`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::error::AdminError;
use crate::utils::{ACTIVE_BUNDLES_SETTING, BUNDLE_SEPARATOR};

/// Database document as stored under `Raven/Databases/<name>`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatabaseDocument {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    #[serde(default)]
    pub secured_settings: BTreeMap<String, String>,
    #[serde(default)]
    pub disabled: bool,
}

impl DatabaseDocument {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Bundles listed in `Raven/ActiveBundles`, empty entries dropped
    pub fn active_bundles(&self) -> Vec<String> {
        self.settings
            .get(ACTIVE_BUNDLES_SETTING)
            .map(|value| {
                value
                    .split(BUNDLE_SEPARATOR)
                    .map(str::trim)
                    .filter(|b| !b.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_active_bundles(&mut self, bundles: &[String]) {
        self.settings.insert(
            ACTIVE_BUNDLES_SETTING.to_string(),
            bundles.join(&BUNDLE_SEPARATOR.to_string()),
        );
    }
}

/// Index summary as returned by the index listing endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default, alias = "IsCompiled", alias = "isCompiled")]
    pub is_compiled: bool,
}

impl IndexInfo {
    pub fn new(name: impl Into<String>, is_compiled: bool) -> Self {
        Self {
            name: name.into(),
            is_compiled,
        }
    }
}

/// Narrow view of the server's administrative surface.
///
/// All calls are awaited one at a time by the orchestrator, so
/// implementations do not need to be `Send`.
#[allow(async_fn_in_trait)]
pub trait AdminApi {
    /// One page of database names, `start` is an offset into the directory
    async fn database_names(&self, start: usize, page_size: usize) -> Result<Vec<String>, AdminError>;

    /// True when the server holds a database document for `name`
    async fn database_exists(&self, name: &str) -> Result<bool, AdminError>;

    /// The database document, `None` when the database is unknown
    async fn database_document(&self, name: &str) -> Result<Option<DatabaseDocument>, AdminError>;

    async fn create_database(&self, document: &DatabaseDocument) -> Result<(), AdminError>;

    /// Delete a database; `hard_delete` removes the data files as well
    async fn delete_database(&self, name: &str, hard_delete: bool) -> Result<(), AdminError>;

    /// Overwrite the database document, optionally allowing bundle changes
    async fn save_database_document(
        &self,
        document: &DatabaseDocument,
        allow_bundles_change: bool,
    ) -> Result<(), AdminError>;

    async fn indexes(
        &self,
        database: &str,
        start: usize,
        page_size: usize,
    ) -> Result<Vec<IndexInfo>, AdminError>;

    async fn reset_index(&self, database: &str, index: &str) -> Result<(), AdminError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_bundles_parsing() {
        let mut doc = DatabaseDocument::new("orders");
        assert!(doc.active_bundles().is_empty());

        doc.settings.insert(
            ACTIVE_BUNDLES_SETTING.to_string(),
            "Encryption; Compression;;".to_string(),
        );
        assert_eq!(doc.active_bundles(), vec!["Encryption", "Compression"]);

        doc.set_active_bundles(&["A".to_string(), "B".to_string()]);
        assert_eq!(doc.settings[ACTIVE_BUNDLES_SETTING], "A;B");
    }

    #[test]
    fn test_document_wire_format() {
        let json = r#"{"Id":"Raven/Databases/orders","Settings":{"Raven/DataDir":"~\\orders"},"Disabled":true}"#;
        let doc: DatabaseDocument = serde_json::from_str(json).unwrap();

        assert!(doc.disabled);
        assert!(doc.secured_settings.is_empty());
        assert_eq!(doc.settings["Raven/DataDir"], "~\\orders");

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["SecuredSettings"], serde_json::json!({}));
    }

    #[test]
    fn test_index_info_aliases() {
        let index: IndexInfo = serde_json::from_str(r#"{"Name":"Orders/ByDate","IsCompiled":true}"#).unwrap();
        assert_eq!(index, IndexInfo::new("Orders/ByDate", true));

        let index: IndexInfo = serde_json::from_str(r#"{"name":"Raven/DocumentsByEntityName"}"#).unwrap();
        assert!(!index.is_compiled);
    }
}
