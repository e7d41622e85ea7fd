//! Conversation log sinks.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use phonefinder_model::ResolutionRecord;
use tokio::io::AsyncWriteExt;

use crate::{ConversationLog, LogError};

/// Keeps resolution records in memory.
#[derive(Debug, Default)]
pub struct MemoryConversationLog {
    records: Mutex<Vec<ResolutionRecord>>,
}

impl MemoryConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far.
    pub fn records(&self) -> Vec<ResolutionRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl ConversationLog for MemoryConversationLog {
    async fn append(&self, record: &ResolutionRecord) -> Result<(), LogError> {
        self.records
            .lock()
            .map_err(|_| LogError::Unavailable)?
            .push(record.clone());
        Ok(())
    }
}

/// Appends resolution records to a file, one JSON document per line.
#[derive(Debug, Clone)]
pub struct JsonlConversationLog {
    path: PathBuf,
}

impl JsonlConversationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConversationLog for JsonlConversationLog {
    async fn append(&self, record: &ResolutionRecord) -> Result<(), LogError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phonefinder_model::{CanonicalQuery, ConversationId, Field, Predicate, Scalar};

    fn record(id: &str) -> ResolutionRecord {
        let mut query = CanonicalQuery::new();
        query.insert(Field::Ram, Predicate::Exact(Scalar::Int(8)));
        ResolutionRecord::new(ConversationId::from(id), &query, Some("8gb phones".into())).unwrap()
    }

    #[tokio::test]
    async fn test_memory_log_keeps_order() {
        let log = MemoryConversationLog::new();
        log.append(&record("a")).await.unwrap();
        log.append(&record("b")).await.unwrap();

        let ids: Vec<_> = log
            .records()
            .into_iter()
            .map(|r| r.conversation_id.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_jsonl_log_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlConversationLog::new(dir.path().join("resolutions.jsonl"));

        log.append(&record("first")).await.unwrap();
        log.append(&record("second")).await.unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let parsed: Vec<ResolutionRecord> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(parsed, vec![record("first"), record("second")]);
        assert!(contents.contains("\"conversationId\":\"first\""));
    }

    #[tokio::test]
    async fn test_jsonl_log_reports_io_errors() {
        let log = JsonlConversationLog::new("/nonexistent-dir/resolutions.jsonl");
        assert!(matches!(log.append(&record("x")).await, Err(LogError::Io(_))));
    }
}
