//! Remote document-store source for the reference set.
//!
//! The client is built once from an explicit [`DocumentStoreConfig`] at
//! startup and reused for every refresh; nothing here lives in a global.
//! Documents are listed page by page from
//! `{endpoint}/databases/{database_id}/collections/{collection_id}/documents`
//! and handed to [`normalize_documents`] like any other source.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ingest::{normalize_documents, IngestConfig, IngestReport, RawDocument};
use crate::StoreError;

/// Connection settings for the remote document store.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentStoreConfig {
    /// Base API URL, e.g. `https://cloud.example.com/v1`.
    pub endpoint: String,
    pub project_id: String,
    pub api_key: String,
    pub database_id: String,
    pub collection_id: String,
    /// Attribute that holds the embedding on each document.
    #[serde(default = "default_embedding_field")]
    pub embedding_field: String,
    /// Documents requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl fmt::Debug for DocumentStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStoreConfig")
            .field("endpoint", &self.endpoint)
            .field("project_id", &self.project_id)
            .field("api_key", &"<redacted>")
            .field("database_id", &self.database_id)
            .field("collection_id", &self.collection_id)
            .field("embedding_field", &self.embedding_field)
            .field("page_size", &self.page_size)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl DocumentStoreConfig {
    pub fn validate(&self) -> Result<(), StoreError> {
        let required = [
            ("endpoint", &self.endpoint),
            ("project_id", &self.project_id),
            ("api_key", &self.api_key),
            ("database_id", &self.database_id),
            ("collection_id", &self.collection_id),
            ("embedding_field", &self.embedding_field),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(StoreError::Remote(format!("{name} must not be empty")));
            }
        }
        if self.page_size == 0 {
            return Err(StoreError::Remote("page_size must be greater than zero".into()));
        }
        Ok(())
    }

    fn documents_url(&self) -> String {
        format!(
            "{}/databases/{}/collections/{}/documents",
            self.endpoint.trim_end_matches('/'),
            self.database_id,
            self.collection_id
        )
    }
}

fn default_embedding_field() -> String {
    "embedding".to_string()
}

fn default_page_size() -> usize {
    100
}

fn default_timeout_secs() -> u64 {
    30
}

/// HTTP client for listing reference documents.
#[derive(Debug, Clone)]
pub struct DocumentStoreClient {
    http: reqwest::Client,
    cfg: DocumentStoreConfig,
}

impl DocumentStoreClient {
    pub fn new(cfg: DocumentStoreConfig) -> Result<Self, StoreError> {
        cfg.validate()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| StoreError::Remote(e.to_string()))?;
        Ok(Self { http, cfg })
    }

    pub fn config(&self) -> &DocumentStoreConfig {
        &self.cfg
    }

    /// List every document in the collection.
    pub async fn fetch_documents(&self) -> Result<Vec<RawDocument>, StoreError> {
        let url = self.cfg.documents_url();
        let mut documents = Vec::new();

        loop {
            let offset = documents.len();
            let body: Value = self
                .http
                .get(&url)
                .header("X-Appwrite-Project", &self.cfg.project_id)
                .header("X-Appwrite-Key", &self.cfg.api_key)
                .query(&[
                    ("queries[]", format!("limit({})", self.cfg.page_size)),
                    ("queries[]", format!("offset({offset})")),
                ])
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| StoreError::Remote(e.to_string()))?
                .json()
                .await
                .map_err(|e| StoreError::Remote(e.to_string()))?;

            let (total, page) = parse_documents_page(&body, &self.cfg.embedding_field)?;
            let fetched = page.len();
            documents.extend(page);
            log::debug!(
                "fetched {} documents from {} ({} of {})",
                fetched,
                url,
                documents.len(),
                total
            );

            if fetched == 0 || documents.len() >= total {
                break;
            }
        }

        Ok(documents)
    }

    /// Fetch and normalize the collection into a store.
    pub async fn load(&self, ingest: &IngestConfig) -> Result<IngestReport, StoreError> {
        let documents = self.fetch_documents().await?;
        normalize_documents(documents, ingest)
    }
}

/// Parse one document-list response into `(total, documents)`.
///
/// The response looks like `{ "total": 2, "documents": [{ "$id": "...", "<field>": ... }] }`.
pub fn parse_documents_page(
    body: &Value,
    embedding_field: &str,
) -> Result<(usize, Vec<RawDocument>), StoreError> {
    let documents = body
        .get("documents")
        .and_then(Value::as_array)
        .ok_or_else(|| StoreError::MalformedDocument("response has no documents array".into()))?;
    let total = body
        .get("total")
        .and_then(Value::as_u64)
        .map(|t| t as usize)
        .unwrap_or(documents.len());

    let page = documents
        .iter()
        .map(|doc| {
            RawDocument::from_parts(
                doc.get("$id")
                    .or_else(|| doc.get("id"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                doc.get(embedding_field).cloned(),
            )
        })
        .collect();

    Ok((total, page))
}
