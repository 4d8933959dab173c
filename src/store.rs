//! Response stores.
//!
//! A store hands out raw, unfiltered response records. The engine never
//! talks to a backend directly; it is given a store and asks it for
//! records whenever it (re)loads.

use crate::models::{ResponseRecord, ResponseType};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while acquiring response records.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The export could not be read.
    #[error("Failed to read responses from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The export is not a valid JSON array of response records.
    #[error("Failed to parse responses from {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Source of raw survey responses.
pub trait ResponseStore {
    /// List records, optionally restricted to one response type.
    fn list_responses(
        &self,
        response_type: Option<ResponseType>,
    ) -> Result<Vec<ResponseRecord>, StoreError>;
}

fn filter_by_type(
    records: &[ResponseRecord],
    response_type: Option<ResponseType>,
) -> Vec<ResponseRecord> {
    records
        .iter()
        .filter(|r| response_type.map_or(true, |rt| r.response_type == rt))
        .cloned()
        .collect()
}

/// A store over records already held in memory.
#[allow(dead_code)] // Embedding hosts and tests construct stores directly
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    records: Vec<ResponseRecord>,
}

#[allow(dead_code)]
impl InMemoryStore {
    pub fn new(records: Vec<ResponseRecord>) -> Self {
        Self { records }
    }

    /// Replace the held records; the next reload picks them up.
    pub fn replace(&mut self, records: Vec<ResponseRecord>) {
        self.records = records;
    }
}

impl ResponseStore for InMemoryStore {
    fn list_responses(
        &self,
        response_type: Option<ResponseType>,
    ) -> Result<Vec<ResponseRecord>, StoreError> {
        Ok(filter_by_type(&self.records, response_type))
    }
}

/// A store backed by a JSON export file (an array of records).
///
/// The file is read again on every listing, so a reload sees the export as
/// it is on disk now.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    record_count: usize,
}

impl JsonFileStore {
    /// Read and parse the export once up front, failing early on a bad file.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let records = parse_records(path, &content)?;
        info!("Loaded {} responses from {}", records.len(), path.display());

        Ok(Self {
            path: path.to_path_buf(),
            record_count: records.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records in the export when it was opened.
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    fn read_records(&self) -> Result<Vec<ResponseRecord>, StoreError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        parse_records(&self.path, &content)
    }
}

impl ResponseStore for JsonFileStore {
    fn list_responses(
        &self,
        response_type: Option<ResponseType>,
    ) -> Result<Vec<ResponseRecord>, StoreError> {
        let records = filter_by_type(&self.read_records()?, response_type);
        debug!("Store {} returned {} records", self.path.display(), records.len());
        Ok(records)
    }
}

fn parse_records(path: &Path, content: &str) -> Result<Vec<ResponseRecord>, StoreError> {
    serde_json::from_str(content).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const EXPORT: &str = r#"[
        {"id": "c1", "responseType": "church", "scores": {"preaching": 4}, "attributes": {"country": "Kenya"}},
        {"id": "i1", "responseType": "institution", "scores": {"faculty": 3},
         "location": {"latitude": 6.52, "longitude": 3.38}}
    ]"#;

    fn write_export(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_open_json_export() {
        let file = write_export(EXPORT);
        let store = tokio_test::block_on(JsonFileStore::open(file.path())).unwrap();

        assert_eq!(store.record_count(), 2);
        assert_eq!(store.path(), file.path());
        assert_eq!(store.list_responses(None).unwrap().len(), 2);

        let institutions = store.list_responses(Some(ResponseType::Institution)).unwrap();
        assert_eq!(institutions.len(), 1);
        assert_eq!(institutions[0].id, "i1");
    }

    #[test]
    fn test_listing_rereads_the_export() {
        let file = write_export(EXPORT);
        let store = tokio_test::block_on(JsonFileStore::open(file.path())).unwrap();

        std::fs::write(
            file.path(),
            r#"[{"id": "c9", "responseType": "church", "scores": {"prayer": 2}}]"#,
        )
        .unwrap();

        let records = store.list_responses(None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "c9");
        assert_eq!(store.record_count(), 2);

        std::fs::write(file.path(), "not json").unwrap();
        assert!(matches!(
            store.list_responses(None),
            Err(StoreError::Parse { .. })
        ));
    }

    #[test]
    fn test_unknown_response_type_is_a_parse_error() {
        let file = write_export(r#"[{"id": "x", "responseType": "mosque"}]"#);
        let err = tokio_test::block_on(JsonFileStore::open(file.path())).unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = tokio_test::block_on(JsonFileStore::open(&dir.path().join("missing.json")))
            .unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn test_in_memory_store_filters_by_type() {
        let records: Vec<ResponseRecord> = serde_json::from_str(EXPORT).unwrap();
        let mut store = InMemoryStore::new(records);
        assert_eq!(store.list_responses(Some(ResponseType::Church)).unwrap().len(), 1);
        assert!(store
            .list_responses(Some(ResponseType::NonFormal))
            .unwrap()
            .is_empty());

        store.replace(Vec::new());
        assert!(store.list_responses(None).unwrap().is_empty());
    }
}
