//! Session verification and rotation for protected routes.
//!
//! Wrap a scope with `refresh_session` first and `verify_session` second so
//! verification runs outermost:
//!
//! ```ignore
//! web::scope("/lesson")
//!     .wrap(from_fn(refresh_session))
//!     .wrap(from_fn(verify_session))
//! ```

use actix_web::body::{EitherBody, MessageBody};
use actix_web::cookie::Cookie;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::{web, Error, HttpMessage, HttpRequest};
use tracing::debug;

use crate::auth::token::Claims;
use crate::error::{AppError, AuthError};
use crate::AppState;

pub(crate) fn app_state(req: &ServiceRequest) -> Result<web::Data<AppState>, AppError> {
    req.app_data::<web::Data<AppState>>()
        .cloned()
        .ok_or_else(|| AppError::InternalError("application state is not registered".into()))
}

/// Resolves the caller's claims. Revoked, invalid and expired tokens are all
/// plain `Unauthorized`; a failing revocation store is an internal error.
pub async fn authorize(state: &AppState, req: &HttpRequest) -> Result<Claims, AppError> {
    let token = state
        .tokens
        .extract(req)
        .map_err(|_| AuthError::Unauthorized)?;

    if state.revocations.exists(&token).await? {
        debug!("revoked token presented");
        return Err(AuthError::Unauthorized.into());
    }

    let claims = state
        .tokens
        .validate(&token)
        .map_err(|_| AuthError::Unauthorized)?;

    if state.tokens.time_remaining(&claims).is_zero() {
        debug!(user_id = %claims.subject_id, "expired token presented");
        return Err(AuthError::Unauthorized.into());
    }

    Ok(claims)
}

/// Rejections are rendered here, while the trace id is still in scope, so
/// nothing above sees an `Err` for an ordinary 401.
pub async fn verify_session<B: MessageBody>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error> {
    let claims = match app_state(&req) {
        Ok(state) => authorize(&state, req.request()).await,
        Err(err) => Err(err),
    };
    match claims {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.call(req).await.map(ServiceResponse::map_into_left_body)
        }
        Err(err) => Ok(req.error_response(err).map_into_right_body()),
    }
}

/// Reissues the session cookie once the token is inside the refresh
/// threshold. Requests without verified claims pass through untouched.
pub async fn refresh_session<B: MessageBody>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error> {
    let rotated = match rotate(&req) {
        Ok(rotated) => rotated,
        Err(err) => return Ok(req.error_response(err).map_into_right_body()),
    };

    let mut res = next.call(req).await?;
    if let Some(cookie) = rotated {
        res.response_mut().add_cookie(&cookie)?;
    }
    Ok(res.map_into_left_body())
}

fn rotate(req: &ServiceRequest) -> Result<Option<Cookie<'static>>, AppError> {
    let state = app_state(req)?;
    let Some(claims) = req.extensions().get::<Claims>().cloned() else {
        return Ok(None);
    };
    if state.tokens.time_remaining(&claims) >= state.config.refresh_threshold() {
        return Ok(None);
    }

    let refreshed = state.tokens.refresh(&claims);
    let token = state.tokens.sign(&refreshed)?;
    let cookie = state.tokens.session_cookie(&token)?;
    debug!(user_id = %refreshed.subject_id, expires_at = refreshed.expires_at, "session refreshed");
    req.extensions_mut().insert(refreshed);
    Ok(Some(cookie))
}
