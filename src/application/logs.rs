//! Activity log entries written by the admin UI.

use std::sync::Arc;

use perpus_api_types::LogResponse;
use thiserror::Error;
use tracing::info;

use crate::application::repos::{LogsRepo, RepoError};
use crate::domain::entities::LogRecord;
use crate::domain::error::DomainError;

const ACTION_REQUIRED_MESSAGE: &str = "Action is required.";

#[derive(Debug, Error)]
pub enum LogServiceError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct LogService {
    repo: Arc<dyn LogsRepo>,
}

impl LogService {
    pub fn new(repo: Arc<dyn LogsRepo>) -> Self {
        Self { repo }
    }

    pub async fn list(&self) -> Result<Vec<LogResponse>, LogServiceError> {
        let records = self.repo.list_logs().await?;
        Ok(records.into_iter().map(log_response).collect())
    }

    pub async fn create(
        &self,
        action: Option<&str>,
        details: Option<&str>,
    ) -> Result<LogResponse, LogServiceError> {
        let action = action
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| DomainError::validation(ACTION_REQUIRED_MESSAGE))?;

        let record = self.repo.append_log(action, details).await?;
        Ok(log_response(record))
    }

    pub async fn clear(&self) -> Result<u64, LogServiceError> {
        let removed = self.repo.clear_logs().await?;
        info!(removed, "activity log cleared");
        Ok(removed)
    }
}

fn log_response(record: LogRecord) -> LogResponse {
    LogResponse {
        id: record.id,
        action: record.action,
        details: record.details,
        created_at: record.created_at,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::*;

    #[derive(Default)]
    struct MemoryLogs {
        entries: Mutex<Vec<LogRecord>>,
    }

    #[async_trait]
    impl LogsRepo for MemoryLogs {
        async fn list_logs(&self) -> Result<Vec<LogRecord>, RepoError> {
            let mut entries = self.entries.lock().expect("logs lock").clone();
            entries.reverse();
            Ok(entries)
        }

        async fn append_log(
            &self,
            action: &str,
            details: Option<&str>,
        ) -> Result<LogRecord, RepoError> {
            let record = LogRecord {
                id: Uuid::new_v4(),
                action: action.to_string(),
                details: details.map(str::to_string),
                created_at: OffsetDateTime::UNIX_EPOCH,
            };
            self.entries.lock().expect("logs lock").push(record.clone());
            Ok(record)
        }

        async fn clear_logs(&self) -> Result<u64, RepoError> {
            let mut entries = self.entries.lock().expect("logs lock");
            let removed = entries.len() as u64;
            entries.clear();
            Ok(removed)
        }
    }

    #[tokio::test]
    async fn blank_action_is_rejected() {
        let service = LogService::new(Arc::new(MemoryLogs::default()));

        for action in [None, Some(""), Some("   ")] {
            let err = service.create(action, None).await.expect_err("rejected");
            assert_eq!(err.to_string(), ACTION_REQUIRED_MESSAGE);
        }
        assert!(service.list().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn entries_list_newest_first_and_clear() {
        let service = LogService::new(Arc::new(MemoryLogs::default()));
        service.create(Some("login"), None).await.expect("first");
        service
            .create(Some("upload"), Some("Bumi Manusia"))
            .await
            .expect("second");

        let listed = service.list().await.expect("list");
        assert_eq!(listed[0].action, "upload");
        assert_eq!(listed[0].details.as_deref(), Some("Bumi Manusia"));
        assert_eq!(listed[1].action, "login");

        assert_eq!(service.clear().await.expect("clear"), 2);
        assert!(service.list().await.expect("list").is_empty());
    }
}
