use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::warn;

use crate::AppState;

/// 200 when both stores answer, 503 otherwise.
pub async fn healthz(state: web::Data<AppState>) -> HttpResponse {
    let database = state.credentials.ping().await;
    let revocations = state.revocations.ping().await;

    if let Err(e) = &database {
        warn!(error = %e, "credential store unhealthy");
    }
    if let Err(e) = &revocations {
        warn!(error = %e, "revocation store unhealthy");
    }

    let body = json!({
        "status": if database.is_ok() && revocations.is_ok() { "healthy" } else { "unhealthy" },
        "database": database.is_ok(),
        "kv": revocations.is_ok(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    if database.is_ok() && revocations.is_ok() {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}
