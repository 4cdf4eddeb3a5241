//! Normalization of raw reference documents into a validated store.
//!
//! Sources hand over loosely-typed documents: the id may sit under `id` or a
//! document-store style `$id`, and the embedding may be a JSON array or a
//! string holding one. [`normalize_documents`] turns them into
//! [`EmbeddingRecord`]s and builds a [`StaticStore`], either failing on the
//! first bad document (`strict`) or skipping it with a warning.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::backend::validate_record;
use crate::{EmbeddingRecord, EmbeddingStore, StaticStore, StoreError};

/// A reference document as delivered by a source, before validation.
///
/// Reading one never fails on its own. A document that cannot be interpreted
/// (not an object, a non-string id, both `id` and `$id`, both `embedding` and
/// `vector`) keeps its defect and is rejected during normalization as
/// [`StoreError::MalformedDocument`], so lenient ingestion can skip it without
/// losing the rest of the batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct RawDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Value>,
    #[serde(skip)]
    defect: Option<String>,
}

impl RawDocument {
    pub fn new(id: impl Into<String>, embedding: Value) -> Self {
        Self::from_parts(Some(id.into()), Some(embedding))
    }

    pub(crate) fn from_parts(id: Option<String>, embedding: Option<Value>) -> Self {
        Self {
            id,
            embedding,
            defect: None,
        }
    }

    fn malformed(id: Option<String>, reason: String) -> Self {
        let defect = match &id {
            Some(id) => format!("document '{id}': {reason}"),
            None => reason,
        };
        Self {
            id,
            embedding: None,
            defect: Some(defect),
        }
    }

    /// Why this document cannot be ingested, if it was unreadable.
    pub fn defect(&self) -> Option<&str> {
        self.defect.as_deref()
    }
}

impl From<Value> for RawDocument {
    fn from(value: Value) -> Self {
        let mut fields = match value {
            Value::Object(fields) => fields,
            other => {
                return Self::malformed(None, format!("document must be an object, got {other}"))
            }
        };

        let id = match take_aliased(&mut fields, "id", "$id") {
            Ok(None | Some(Value::Null)) => None,
            Ok(Some(Value::String(id))) => Some(id),
            Ok(Some(other)) => {
                return Self::malformed(None, format!("document id must be a string, got {other}"))
            }
            Err(reason) => return Self::malformed(None, reason),
        };

        match take_aliased(&mut fields, "embedding", "vector") {
            Ok(embedding) => Self::from_parts(id, embedding.filter(|v| !v.is_null())),
            Err(reason) => Self::malformed(id, reason),
        }
    }
}

fn take_aliased(
    fields: &mut Map<String, Value>,
    key: &str,
    alias: &str,
) -> Result<Option<Value>, String> {
    match (fields.remove(key), fields.remove(alias)) {
        (Some(_), Some(_)) => Err(format!("document has both '{key}' and '{alias}'")),
        (value, None) | (None, value) => Ok(value),
    }
}

/// Ingestion policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Required dimensionality. When unset the first accepted record sets it.
    #[serde(default)]
    pub expected_dimension: Option<usize>,
    /// Fail the whole batch on the first invalid document instead of skipping it.
    #[serde(default)]
    pub strict: bool,
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub store: StaticStore,
    pub accepted: usize,
    pub skipped: usize,
}

/// Validate raw documents and build a store from the ones that pass.
pub fn normalize_documents(
    docs: Vec<RawDocument>,
    cfg: &IngestConfig,
) -> Result<IngestReport, StoreError> {
    let total = docs.len();
    let mut records = Vec::with_capacity(total);
    let mut seen: HashSet<String> = HashSet::with_capacity(total);
    let mut dimension = cfg.expected_dimension;
    let mut skipped = 0usize;

    for (position, doc) in docs.into_iter().enumerate() {
        let outcome = to_record(doc).and_then(|record| {
            validate_record(&record, dimension)?;
            if seen.contains(&record.id) {
                return Err(StoreError::DuplicateId(record.id));
            }
            Ok(record)
        });

        match outcome {
            Ok(record) => {
                dimension.get_or_insert(record.dimension());
                seen.insert(record.id.clone());
                records.push(record);
            }
            Err(err) if !cfg.strict && err.is_record_level() => {
                log::warn!("skipping reference document #{position}: {err}");
                skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }

    let store = StaticStore::new(records)?;
    log::info!(
        "ingested {} of {} reference documents (dimension {:?})",
        store.len(),
        total,
        store.dimension()
    );

    Ok(IngestReport {
        accepted: store.len(),
        skipped,
        store,
    })
}

/// Read a JSON array of raw documents from `path` and normalize it.
pub fn load_json_file(path: impl AsRef<Path>, cfg: &IngestConfig) -> Result<IngestReport, StoreError> {
    let path = path.as_ref();
    log::debug!("loading reference documents from {}", path.display());
    let contents = fs::read_to_string(path)?;
    let docs: Vec<RawDocument> = serde_json::from_str(&contents)?;
    normalize_documents(docs, cfg)
}

fn to_record(doc: RawDocument) -> Result<EmbeddingRecord, StoreError> {
    if let Some(defect) = doc.defect {
        return Err(StoreError::MalformedDocument(defect));
    }
    let id = doc.id.ok_or_else(|| StoreError::MalformedDocument("missing id".into()))?;
    let vector = match doc.embedding {
        Some(value) => parse_embedding(&id, &value)?,
        None => {
            return Err(StoreError::MalformedDocument(format!(
                "document '{id}' has no embedding"
            )))
        }
    };
    Ok(EmbeddingRecord::new(id, vector))
}

/// Accept a JSON array of numbers, or a string containing one.
pub(crate) fn parse_embedding(id: &str, value: &Value) -> Result<Vec<f64>, StoreError> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_f64().ok_or_else(|| {
                    StoreError::MalformedDocument(format!(
                        "document '{id}' has a non-numeric embedding component: {item}"
                    ))
                })
            })
            .collect(),
        Value::String(encoded) => serde_json::from_str::<Vec<f64>>(encoded).map_err(|err| {
            StoreError::MalformedDocument(format!(
                "document '{id}' has an unparseable embedding string: {err}"
            ))
        }),
        other => Err(StoreError::MalformedDocument(format!(
            "document '{id}' embedding must be an array, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn docs(values: Value) -> Vec<RawDocument> {
        serde_json::from_value(values).expect("raw documents")
    }

    #[test]
    fn accepts_arrays_strings_and_document_store_ids() {
        let raw = docs(json!([
            { "id": "image1", "embedding": [0.1, 0.2, 0.3] },
            { "$id": "image2", "embedding": "[0.4, 0.5, 0.6]" },
            { "id": "image3", "vector": [0.7, 0.8, 0.9] }
        ]));

        let report = normalize_documents(raw, &IngestConfig::default()).expect("ingest");
        assert_eq!(report.accepted, 3);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.store.dimension(), Some(3));

        let ids: Vec<_> = report.store.all().iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec!["image1", "image2", "image3"]);
        assert_eq!(
            report.store.get("image2").map(|r| r.vector.clone()),
            Some(vec![0.4, 0.5, 0.6])
        );
    }

    #[test]
    fn lenient_mode_skips_invalid_documents() {
        let raw = docs(json!([
            { "id": "ok-1", "embedding": [1.0, 0.0] },
            { "id": "ragged", "embedding": [1.0, 0.0, 0.0] },
            { "id": "text", "embedding": ["a", "b"] },
            { "embedding": [0.0, 1.0] },
            { "id": "ok-1", "embedding": [0.5, 0.5] },
            { "id": "missing" },
            { "id": "ok-2", "embedding": [0.0, 1.0] }
        ]));

        let report = normalize_documents(raw, &IngestConfig::default()).expect("ingest");
        assert_eq!(report.accepted, 2);
        assert_eq!(report.skipped, 5);
        assert!(report.store.get("ok-1").is_some());
        assert!(report.store.get("ok-2").is_some());
    }

    #[test]
    fn unreadable_documents_are_skipped_not_fatal() {
        let raw = docs(json!([
            { "id": "a", "embedding": [1.0, 0.0] },
            { "id": 7, "embedding": [0.0, 1.0] },
            { "id": "b", "$id": "b", "embedding": [0.0, 1.0] },
            { "id": "c", "embedding": [0.0, 1.0], "vector": [1.0, 0.0] },
            "not a document",
            { "$id": "d", "vector": [0.0, 1.0] }
        ]));
        assert!(raw[1].defect().is_some());
        assert!(raw[3].defect().is_some_and(|d| d.contains("'c'")));
        assert!(raw[5].defect().is_none());

        let report = normalize_documents(raw, &IngestConfig::default()).expect("ingest");
        assert_eq!(report.accepted, 2);
        assert_eq!(report.skipped, 4);
        assert!(report.store.get("a").is_some());
        assert!(report.store.get("d").is_some());
    }

    #[test]
    fn strict_mode_rejects_unreadable_documents() {
        let raw = docs(json!([
            { "id": "a", "embedding": [1.0, 0.0] },
            { "id": 7, "embedding": [0.0, 1.0] }
        ]));
        let cfg = IngestConfig {
            strict: true,
            ..Default::default()
        };

        let err = normalize_documents(raw, &cfg).unwrap_err();
        assert!(matches!(err, StoreError::MalformedDocument(msg) if msg.contains("string")));
    }

    #[test]
    fn json_file_with_one_bad_document_still_loads() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"[{{"id": "a", "embedding": [1.0, 2.0]}}, {{"id": 7, "embedding": [0.0, 1.0]}}]"#
        )
        .expect("write fixture");

        let report = load_json_file(file.path(), &IngestConfig::default()).expect("load");
        assert_eq!(report.accepted, 1);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn strict_mode_fails_on_first_invalid_document() {
        let raw = docs(json!([
            { "id": "a", "embedding": [1.0, 0.0] },
            { "id": "b", "embedding": [1.0] }
        ]));
        let cfg = IngestConfig {
            strict: true,
            ..Default::default()
        };

        let err = normalize_documents(raw, &cfg).unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn expected_dimension_overrides_first_record() {
        let raw = docs(json!([
            { "id": "short", "embedding": [1.0, 0.0] },
            { "id": "right", "embedding": [1.0, 0.0, 0.0] }
        ]));
        let cfg = IngestConfig {
            expected_dimension: Some(3),
            strict: false,
        };

        let report = normalize_documents(raw, &cfg).expect("ingest");
        assert_eq!(report.accepted, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.store.dimension(), Some(3));
    }

    #[test]
    fn empty_input_yields_empty_store() {
        let report = normalize_documents(Vec::new(), &IngestConfig::default()).expect("ingest");
        assert_eq!(report.accepted, 0);
        assert!(report.store.is_empty());
    }

    #[test]
    fn loads_documents_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"[{{"id": "a", "embedding": [1.0, 2.0]}}, {{"id": "b", "embedding": [3.0, 4.0]}}]"#
        )
        .expect("write fixture");

        let report = load_json_file(file.path(), &IngestConfig::default()).expect("load");
        assert_eq!(report.accepted, 2);
        assert_eq!(report.store.dimension(), Some(2));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_json_file("/definitely/not/here.json", &IngestConfig::default()).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
