//! App-wide request pipeline.
//!
//! Registered outermost first: request id, panic recovery, access log,
//! CORS, request deadline. See `main.rs` for the wiring.

use actix_cors::Cors;
use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::error::InternalError;
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::middleware::Next;
use actix_web::{web, Error, ResponseError};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::CorsConfig;
use crate::error::AppError;
use crate::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const HEALTH_PATH: &str = "/healthz";
const MAX_REQUEST_ID_LEN: usize = 128;

tokio::task_local! {
    static TRACE_ID: String;
}

/// The request id of the request being served on this task, if any.
pub fn current_trace_id() -> Option<String> {
    TRACE_ID.try_with(|id| id.clone()).ok()
}

/// Honours an incoming `X-Request-Id` or mints one, and echoes it back.
pub async fn request_id(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut res = TRACE_ID.scope(id.clone(), next.call(req)).await?;
    if let Ok(value) = HeaderValue::from_str(&id) {
        res.headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    Ok(res)
}

/// Turns errors and panics from anything below into JSON error responses.
///
/// The response is rendered here, inside the trace id scope, and handed up
/// as a precomputed error. No `HttpRequest` handle may be held across
/// `next.call`: the router needs sole ownership to record path matches.
pub async fn recover(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let method = req.method().clone();
    let path = req.path().to_string();

    match AssertUnwindSafe(async move { next.call(req).await })
        .catch_unwind()
        .await
    {
        Ok(Ok(res)) => Ok(res),
        Ok(Err(err)) => Err(rendered(err.as_response_error())),
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(
                %method,
                %path,
                trace_id = current_trace_id().as_deref().unwrap_or("-"),
                panic = %message,
                "recovered from panic"
            );
            Err(rendered(&AppError::InternalError(message)))
        }
    }
}

fn rendered(err: &dyn ResponseError) -> Error {
    let mut res = err.error_response();
    if let Some(id) = current_trace_id() {
        if let Ok(value) = HeaderValue::from_str(&id) {
            res.headers_mut()
                .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
        }
    }
    InternalError::from_response(err.to_string(), res).into()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub async fn log_request(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    if req.path() == HEALTH_PATH {
        return next.call(req).await;
    }

    let method = req.method().clone();
    let path = req.path().to_string();
    let client = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("-")
        .to_string();
    let started = Instant::now();

    let res = next.call(req).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    let trace_id = current_trace_id().unwrap_or_default();
    match &res {
        Ok(res) => debug!(
            %method,
            %path,
            %client,
            status = res.status().as_u16(),
            elapsed_ms,
            %trace_id,
            "request completed"
        ),
        Err(err) => debug!(
            %method,
            %path,
            %client,
            status = err.as_response_error().status_code().as_u16(),
            elapsed_ms,
            %trace_id,
            "request failed"
        ),
    }
    res
}

/// Abandons the request once the configured deadline passes. Dropping the
/// inner future cancels whatever store call it was awaiting.
pub async fn request_timeout(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let limit = req
        .app_data::<web::Data<AppState>>()
        .and_then(|state| state.config.request_timeout());

    let Some(limit) = limit else {
        return next.call(req).await;
    };

    let path = req.path().to_string();
    match tokio::time::timeout(limit, next.call(req)).await {
        Ok(res) => res,
        Err(_) => {
            warn!(%path, timeout_secs = limit.as_secs(), "request timed out");
            Err(AppError::RequestTimeout.into())
        }
    }
}

pub fn cors(config: &CorsConfig) -> Cors {
    if !config.enabled {
        return Cors::default();
    }

    let cors = if config.allow_any_origin {
        Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .expose_any_header()
            .supports_credentials()
    } else {
        config
            .allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec!["Authorization", "Content-Type", "X-Request-Id"])
            .expose_headers(vec!["X-Request-Id"])
            .supports_credentials()
    };

    cors.max_age(config.max_age as usize)
}
