//! YAML Configuration File Support for imgmatch
//!
//! This module loads the pipeline configuration (where the reference set comes
//! from and how queries are ranked) from a single YAML file.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "gallery"
//!
//! store:
//!   source: "file"            # reference | inline | file | document_store
//!   path: "data/reference.json"
//!   expected_dimension: 512
//!   strict: false
//!   refresh_interval_secs: 300
//!
//! ranker:
//!   top_k: 3
//!   min_similarity: 0.2
//! ```
//!
//! With the `remote` feature, `source: "document_store"` reads the reference
//! set from a remote document collection:
//!
//! ```yaml
//! store:
//!   source: "document_store"
//!   document_store:
//!     endpoint: "https://cloud.example.com/v1"
//!     project_id: "gallery"
//!     api_key: "..."
//!     database_id: "main"
//!     collection_id: "images"
//!     embedding_field: "embedding"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use ranker::RankConfig;
use serde::{Deserialize, Serialize};
use store::{IngestConfig, RawDocument};
use thiserror::Error;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),

    #[error("missing required field: {0}")]
    MissingField(String),
}

/// Top-level YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ImgmatchConfig {
    /// Configuration format version
    #[serde(default = "default_version")]
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    /// Reference-set source and ingestion policy
    #[serde(default)]
    pub store: StoreYamlConfig,

    /// Ranking policy
    #[serde(default)]
    pub ranker: RankConfig,
}

impl ImgmatchConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: ImgmatchConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.store.validate()?;
        self.ranker
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("ranker: {e}")))?;
        Ok(())
    }
}

impl Default for ImgmatchConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            name: None,
            store: StoreYamlConfig::default(),
            ranker: RankConfig::default(),
        }
    }
}

/// Where the reference set is read from, resolved from [`StoreYamlConfig`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreSource {
    /// The built-in three-image reference set.
    Reference,
    /// Documents listed directly in the YAML file.
    Inline(Vec<RawDocument>),
    /// A JSON array of documents on disk.
    File(PathBuf),
    /// A remote document collection.
    #[cfg(feature = "remote")]
    DocumentStore(store::DocumentStoreConfig),
}

impl StoreSource {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreSource::Reference => "reference",
            StoreSource::Inline(_) => "inline",
            StoreSource::File(_) => "file",
            #[cfg(feature = "remote")]
            StoreSource::DocumentStore(_) => "document_store",
        }
    }
}

/// Store YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreYamlConfig {
    #[serde(default = "default_source")]
    pub source: String,

    /// JSON file path, for `source: "file"`
    #[serde(default)]
    pub path: Option<String>,

    /// Documents, for `source: "inline"`
    #[serde(default)]
    pub records: Vec<RawDocument>,

    #[cfg(feature = "remote")]
    #[serde(default)]
    pub document_store: Option<store::DocumentStoreConfig>,

    #[serde(default)]
    pub expected_dimension: Option<usize>,

    /// Fail the load on the first invalid document instead of skipping it
    #[serde(default)]
    pub strict: bool,

    /// Reload the source on this interval; 0 disables refreshing
    #[serde(default)]
    pub refresh_interval_secs: u64,
}

impl StoreYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        self.source().map(|_| ())?;
        if self.expected_dimension == Some(0) {
            return Err(ConfigLoadError::Validation(
                "store.expected_dimension must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the configured source.
    pub fn source(&self) -> Result<StoreSource, ConfigLoadError> {
        match self.source.as_str() {
            "reference" => Ok(StoreSource::Reference),
            "inline" => Ok(StoreSource::Inline(self.records.clone())),
            "file" => self
                .path
                .as_ref()
                .filter(|p| !p.trim().is_empty())
                .map(|p| StoreSource::File(PathBuf::from(p)))
                .ok_or_else(|| ConfigLoadError::MissingField("store.path".to_string())),
            #[cfg(feature = "remote")]
            "document_store" => {
                let cfg = self.document_store.clone().ok_or_else(|| {
                    ConfigLoadError::MissingField("store.document_store".to_string())
                })?;
                cfg.validate()
                    .map_err(|e| ConfigLoadError::Validation(format!("store.document_store: {e}")))?;
                Ok(StoreSource::DocumentStore(cfg))
            }
            #[cfg(not(feature = "remote"))]
            "document_store" => Err(ConfigLoadError::Validation(
                "store.source 'document_store' requires the `remote` feature".to_string(),
            )),
            other => Err(ConfigLoadError::Validation(format!(
                "store.source must be one of: reference, inline, file, document_store (got '{other}')"
            ))),
        }
    }

    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            expected_dimension: self.expected_dimension,
            strict: self.strict,
        }
    }
}

impl Default for StoreYamlConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            path: None,
            records: Vec::new(),
            #[cfg(feature = "remote")]
            document_store: None,
            expected_dimension: None,
            strict: false,
            refresh_interval_secs: 0,
        }
    }
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_source() -> String {
    "reference".to_string()
}
