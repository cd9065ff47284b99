/// HTTP implementation of the admin API against a RavenDB 3.x server

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::core::admin::{AdminApi, DatabaseDocument, IndexInfo};
use crate::core::error::AdminError;
use crate::utils::{ALLOW_BUNDLES_CHANGE_HEADER, DATABASE_DOC_PREFIX};

pub struct RavenAdminClient {
    client: Client,
    base: Url,
}

impl RavenAdminClient {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self, AdminError> {
        let base = Url::parse(server_url).map_err(|e| AdminError::InvalidUrl(format!("{}: {}", server_url, e)))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(AdminError::InvalidUrl(server_url.to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| AdminError::Transport {
                url: server_url.to_string(),
                source,
            })?;

        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Base URL extended with `segments`, each one percent-encoded, plus `query`
    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, AdminError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| AdminError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn document_url(&self, database: &str) -> Result<Url, AdminError> {
        let id = format!("{}{}", DATABASE_DOC_PREFIX, database);
        self.endpoint(&["docs"], &[("id", id.as_str())])
    }

    fn admin_database_url(&self, database: &str, hard_delete: bool) -> Result<Url, AdminError> {
        let query: &[(&str, &str)] = if hard_delete { &[("hard-delete", "true")] } else { &[] };
        self.endpoint(&["admin", "databases", database], query)
    }

    /// Index names may contain `/`, which the server routes as path segments
    fn index_url(&self, database: &str, index: &str) -> Result<Url, AdminError> {
        let mut segments = vec!["databases", database, "indexes"];
        segments.extend(index.split('/'));
        self.endpoint(&segments, &[])
    }

    async fn send(&self, method: &Method, url: &Url, request: RequestBuilder) -> Result<Response, AdminError> {
        debug!("{} {}", method, url);
        request.send().await.map_err(|source| AdminError::Transport {
            url: url.to_string(),
            source,
        })
    }

    /// Send and fail on any non-success status
    async fn expect_success(&self, method: Method, url: Url, request: RequestBuilder) -> Result<Response, AdminError> {
        let response = self.send(&method, &url, request).await?;
        if response.status().is_success() {
            return Ok(response);
        }
        Err(status_error(&method, &url, response).await)
    }

    async fn decode<T: DeserializeOwned>(url: &Url, response: Response) -> Result<T, AdminError> {
        let body = response.text().await.map_err(|source| AdminError::Transport {
            url: url.to_string(),
            source,
        })?;
        serde_json::from_str(&body).map_err(|e| AdminError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

async fn status_error(method: &Method, url: &Url, response: Response) -> AdminError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    AdminError::Status {
        method: method.to_string(),
        url: url.to_string(),
        status,
        body: body.trim().to_string(),
    }
}

/// The server nests index flags under `definition`; flat entries are accepted too
fn index_from_json(value: &Value) -> Option<IndexInfo> {
    let field = |v: &Value, names: &[&str]| names.iter().find_map(|n| v.get(*n).cloned());

    let name = field(value, &["name", "Name"])
        .or_else(|| value.get("definition").and_then(|d| field(d, &["Name"])))?
        .as_str()?
        .to_string();

    let is_compiled = field(value, &["isCompiled", "IsCompiled"])
        .or_else(|| value.get("definition").and_then(|d| field(d, &["IsCompiled"])))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    Some(IndexInfo::new(name, is_compiled))
}

fn database_name(document: &DatabaseDocument) -> &str {
    document.id.strip_prefix(DATABASE_DOC_PREFIX).unwrap_or(&document.id)
}

impl AdminApi for RavenAdminClient {
    async fn database_names(&self, start: usize, page_size: usize) -> Result<Vec<String>, AdminError> {
        let (start, page_size) = (start.to_string(), page_size.to_string());
        let url = self.endpoint(&["databases"], &[("start", start.as_str()), ("pageSize", page_size.as_str())])?;

        let response = self
            .expect_success(Method::GET, url.clone(), self.client.get(url.clone()))
            .await?;
        Self::decode(&url, response).await
    }

    async fn database_exists(&self, name: &str) -> Result<bool, AdminError> {
        let url = self.document_url(name)?;
        let response = self.send(&Method::HEAD, &url, self.client.head(url.clone())).await?;

        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(status_error(&Method::HEAD, &url, response).await),
        }
    }

    async fn database_document(&self, name: &str) -> Result<Option<DatabaseDocument>, AdminError> {
        let url = self.document_url(name)?;
        let response = self.send(&Method::GET, &url, self.client.get(url.clone())).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(&Method::GET, &url, response).await);
        }

        let mut document: DatabaseDocument = Self::decode(&url, response).await?;
        document.id = name.to_string();
        Ok(Some(document))
    }

    async fn create_database(&self, document: &DatabaseDocument) -> Result<(), AdminError> {
        let url = self.admin_database_url(database_name(document), false)?;
        let request = self.client.put(url.clone()).json(document);
        self.expect_success(Method::PUT, url, request).await?;
        Ok(())
    }

    async fn delete_database(&self, name: &str, hard_delete: bool) -> Result<(), AdminError> {
        let url = self.admin_database_url(name, hard_delete)?;
        let request = self.client.delete(url.clone());
        self.expect_success(Method::DELETE, url, request).await?;
        Ok(())
    }

    async fn save_database_document(
        &self,
        document: &DatabaseDocument,
        allow_bundles_change: bool,
    ) -> Result<(), AdminError> {
        let url = self.document_url(database_name(document))?;
        let mut request = self.client.put(url.clone()).json(document);
        if allow_bundles_change {
            request = request.header(ALLOW_BUNDLES_CHANGE_HEADER, "true");
        }
        self.expect_success(Method::PUT, url, request).await?;
        Ok(())
    }

    async fn indexes(&self, database: &str, start: usize, page_size: usize) -> Result<Vec<IndexInfo>, AdminError> {
        let (start, page_size) = (start.to_string(), page_size.to_string());
        let url = self.endpoint(
            &["databases", database, "indexes"],
            &[("start", start.as_str()), ("pageSize", page_size.as_str())],
        )?;

        let response = self
            .expect_success(Method::GET, url.clone(), self.client.get(url.clone()))
            .await?;
        let entries: Vec<Value> = Self::decode(&url, response).await?;

        entries
            .iter()
            .map(|entry| {
                index_from_json(entry).ok_or_else(|| AdminError::Decode {
                    url: url.to_string(),
                    reason: format!("index entry without a name: {}", entry),
                })
            })
            .collect()
    }

    async fn reset_index(&self, database: &str, index: &str) -> Result<(), AdminError> {
        let method = Method::from_bytes(b"RESET").map_err(|e| AdminError::InvalidUrl(e.to_string()))?;
        let url = self.index_url(database, index)?;
        let request = self.client.request(method.clone(), url.clone());
        self.expect_success(method, url, request).await?;
        Ok(())
    }
}
