use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{LogsRepo, RepoError},
    domain::entities::LogRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct LogRow {
    id: Uuid,
    action: String,
    details: Option<String>,
    created_at: OffsetDateTime,
}

impl From<LogRow> for LogRecord {
    fn from(row: LogRow) -> Self {
        Self {
            id: row.id,
            action: row.action,
            details: row.details,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl LogsRepo for PostgresRepositories {
    async fn list_logs(&self) -> Result<Vec<LogRecord>, RepoError> {
        let rows = sqlx::query_as::<_, LogRow>(
            r#"
            SELECT id, action, details, created_at
            FROM logs
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(LogRecord::from).collect())
    }

    async fn append_log(
        &self,
        action: &str,
        details: Option<&str>,
    ) -> Result<LogRecord, RepoError> {
        let row = sqlx::query_as::<_, LogRow>(
            r#"
            INSERT INTO logs (id, action, details)
            VALUES ($1, $2, $3)
            RETURNING id, action, details, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(action)
        .bind(details)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn clear_logs(&self) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM logs")
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
