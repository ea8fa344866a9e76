use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::auth::Claims;
use crate::error::{AppError, FieldError};
use crate::AppState;

const PARAMS_TITLE: &str = "Failed to validate params";

#[derive(Debug, Deserialize)]
pub struct TimeSpentQuery {
    pub ts: Option<String>,
}

pub async fn lesson_progress(claims: Claims, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let progress = state.learning.lesson_progress(&claims.subject_id).await?;
    Ok(HttpResponse::Ok().json(progress))
}

pub async fn time_spent(
    claims: Claims,
    query: web::Query<TimeSpentQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let at = parse_ts(query.ts.as_deref())?;
    let totals = state.learning.week_time_spent(&claims.subject_id, at).await?;
    Ok(HttpResponse::Ok().json(totals))
}

fn parse_ts(raw: Option<&str>) -> Result<DateTime<Utc>, AppError> {
    let invalid = |reason: String| AppError::ValidationError {
        title: PARAMS_TITLE.into(),
        params: vec![FieldError::new("ts", reason)],
    };

    let raw = raw
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid("ts should not be empty".into()))?;
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| invalid(format!("ts must be in RFC3339 layout, {}", e)))
}
