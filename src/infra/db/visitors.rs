use async_trait::async_trait;
use time::Date;
use uuid::Uuid;

use crate::{
    application::repos::{RepoError, VisitorsRepo},
    domain::entities::DailyVisitorRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct DailyVisitorRow {
    id: Uuid,
    date: Date,
    count: i64,
}

#[async_trait]
impl VisitorsRepo for PostgresRepositories {
    async fn record_visit(&self, date: Date) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO daily_visitors (id, date, count)
            VALUES ($1, $2, 1)
            ON CONFLICT (date) DO UPDATE SET count = daily_visitors.count + 1
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(date)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<DailyVisitorRecord>, RepoError> {
        let rows = sqlx::query_as::<_, DailyVisitorRow>(
            r#"
            SELECT id, date, count
            FROM daily_visitors
            ORDER BY date DESC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| DailyVisitorRecord {
                id: row.id,
                date: row.date,
                count: row.count,
            })
            .collect())
    }

    async fn total_visits(&self) -> Result<u64, RepoError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(count), 0)::BIGINT FROM daily_visitors")
                .fetch_one(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        Self::convert_count(total)
    }
}
