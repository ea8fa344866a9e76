use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::sync::Arc;

use crate::error::DatabaseError;

#[derive(Debug, Clone, FromRow)]
pub struct LessonProgressRow {
    pub id: i32,
    pub index: i32,
    pub title: String,
    pub progress: f32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TimeSpentRow {
    pub weekday: i32,
    pub vocabulary: i64,
    pub grammar: i64,
    pub listening: i64,
    pub writing: i64,
    /// Start of the day the totals belong to.
    pub ts: DateTime<Utc>,
}

#[async_trait]
pub trait LessonStore: Send + Sync {
    async fn lesson_progress(&self, user_id: &str) -> Result<Vec<LessonProgressRow>, DatabaseError>;
}

#[async_trait]
pub trait TimeSpentStore: Send + Sync {
    async fn week_time_spent(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<TimeSpentRow>, DatabaseError>;
}

pub struct PgLearningStore {
    pool: Arc<PgPool>,
}

impl PgLearningStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LessonStore for PgLearningStore {
    async fn lesson_progress(&self, user_id: &str) -> Result<Vec<LessonProgressRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, LessonProgressRow>(
            r#"
            SELECT lp.id, l."index", l."name" AS title, lp.progress, lp.created_at
            FROM lesson_progress lp
            JOIN lesson l ON l.id = lp.lesson_id
            WHERE lp.user_id = $1
            ORDER BY l."index" ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }
}

#[async_trait]
impl TimeSpentStore for PgLearningStore {
    async fn week_time_spent(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<TimeSpentRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, TimeSpentRow>(
            r#"
            SELECT
                EXTRACT(ISODOW FROM date_trunc('day', ts))::INT - 1 AS weekday,
                SUM(vocabulary)::BIGINT AS vocabulary,
                SUM(grammar)::BIGINT AS grammar,
                SUM(listening)::BIGINT AS listening,
                SUM(writing)::BIGINT AS writing,
                date_trunc('day', ts) AS ts
            FROM lesson_time_spent
            WHERE user_id = $1
              AND date_trunc('week', ts) = date_trunc('week', $2::TIMESTAMPTZ)
            GROUP BY date_trunc('day', ts)
            ORDER BY 6 ASC
            "#,
        )
        .bind(user_id)
        .bind(at)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }
}
