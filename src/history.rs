//! Requested-URL history, persisted as a JSON file under the data dir.

use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub const HISTORY_CAP: usize = 2_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlRecord {
    pub url: String,
    pub timestamp: DateTime<Utc>,
}

pub async fn load(path: &Path) -> Result<Vec<UrlRecord>, ApiError> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => {
            let mut records: Vec<UrlRecord> = serde_json::from_str(&contents)
                .map_err(|error| ApiError::internal(format!("could not read url history: {error}")))?;
            records.truncate(HISTORY_CAP);
            Ok(records)
        }
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(error) => Err(ApiError::internal(format!(
            "could not open url history: {error}"
        ))),
    }
}

pub async fn persist(path: &Path, records: &[UrlRecord]) -> Result<(), ApiError> {
    let payload = serde_json::to_string_pretty(records)
        .map_err(|error| ApiError::internal(format!("could not serialize url history: {error}")))?;

    tokio::fs::write(path, payload)
        .await
        .map_err(|error| ApiError::internal(format!("could not save url history: {error}")))
}

/// Newest first, capped.
pub fn push(records: &mut Vec<UrlRecord>, url: &str) {
    records.insert(
        0,
        UrlRecord {
            url: url.to_string(),
            timestamp: Utc::now(),
        },
    );
    records.truncate(HISTORY_CAP);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_missing_file_yields_empty_history() {
        let dir = tempfile::tempdir().expect("tempdir");
        let records = load(&dir.path().join("urls.json")).await.expect("load");
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn persist_then_load_roundtrips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("urls.json");

        let mut records = Vec::new();
        push(&mut records, "https://x.test/a");
        push(&mut records, "https://x.test/b");
        persist(&path, &records).await.expect("persist");

        let loaded = load(&path).await.expect("load");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].url, "https://x.test/b");
        assert_eq!(loaded[1].url, "https://x.test/a");
    }

    #[tokio::test]
    async fn load_rejects_malformed_history() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("urls.json");
        std::fs::write(&path, b"not json").expect("write");
        assert!(load(&path).await.is_err());
    }

    #[test]
    fn push_keeps_newest_first_and_caps_the_list() {
        let mut records = Vec::new();
        for i in 0..HISTORY_CAP + 5 {
            push(&mut records, &format!("https://x.test/{i}"));
        }
        assert_eq!(records.len(), HISTORY_CAP);
        assert_eq!(records[0].url, format!("https://x.test/{}", HISTORY_CAP + 4));
    }
}
