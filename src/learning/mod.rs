//! Lesson progress and weekly learning time for the signed-in user.

pub mod handlers;
mod store;

pub use store::{LessonProgressRow, LessonStore, PgLearningStore, TimeSpentRow, TimeSpentStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonProgress {
    pub id: i32,
    pub index: i32,
    pub title: String,
    pub progress: f32,
    /// Milliseconds since the unix epoch.
    pub timestamp: i64,
}

impl From<LessonProgressRow> for LessonProgress {
    fn from(row: LessonProgressRow) -> Self {
        Self {
            id: row.id,
            index: row.index,
            title: row.title,
            progress: row.progress,
            timestamp: row.created_at.timestamp_millis(),
        }
    }
}

/// Minutes spent per skill on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpent {
    /// Monday is 0.
    pub weekday: i32,
    pub vocabulary: i64,
    pub grammar: i64,
    pub listening: i64,
    pub writing: i64,
    /// Milliseconds since the unix epoch.
    pub timestamp: i64,
}

impl From<TimeSpentRow> for TimeSpent {
    fn from(row: TimeSpentRow) -> Self {
        Self {
            weekday: row.weekday,
            vocabulary: row.vocabulary,
            grammar: row.grammar,
            listening: row.listening,
            writing: row.writing,
            timestamp: row.ts.timestamp_millis(),
        }
    }
}

pub struct LearningService {
    lessons: Arc<dyn LessonStore>,
    time_spent: Arc<dyn TimeSpentStore>,
}

impl LearningService {
    pub fn new(lessons: Arc<dyn LessonStore>, time_spent: Arc<dyn TimeSpentStore>) -> Self {
        Self { lessons, time_spent }
    }

    pub async fn lesson_progress(&self, user_id: &str) -> Result<Vec<LessonProgress>, AppError> {
        let rows = self.lessons.lesson_progress(user_id).await?;
        Ok(rows.into_iter().map(LessonProgress::from).collect())
    }

    /// Daily totals for the ISO week containing `at`, oldest first.
    pub async fn week_time_spent(&self, user_id: &str, at: DateTime<Utc>) -> Result<Vec<TimeSpent>, AppError> {
        let rows = self.time_spent.week_time_spent(user_id, at).await?;
        Ok(rows.into_iter().map(TimeSpent::from).collect())
    }
}
