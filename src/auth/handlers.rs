use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use tracing::{info, warn};
use validator::Validate;

use crate::error::{AppError, AuthError, FieldError};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Username or email.
    #[validate(length(min = 6, max = 64))]
    pub username: String,
    #[validate(length(min = 6))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(length(min = 6, max = 31))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ExistsQuery {
    #[validate(length(min = 6, max = 64))]
    pub username: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}

impl ExistsQuery {
    fn normalized(self) -> Self {
        Self {
            username: self.username.filter(|s| !s.is_empty()),
            email: self.email.filter(|s| !s.is_empty()),
        }
    }
}

/// Sets the session cookie on success. The body stays empty.
pub async fn login(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    req.validate()
        .map_err(|e| AppError::validation("Failed to validate credentials", &e))?;

    let (_, token) = match state.auth.sign_in(&req.username, &req.password).await {
        Ok(signed_in) => signed_in,
        Err(e) => {
            warn!(credential = %req.username, error = %e, "sign-in failed");
            return Err(e);
        }
    };

    let cookie = state.tokens.session_cookie(&token)?;
    Ok(HttpResponse::Ok().cookie(cookie).finish())
}

pub async fn sign_up(
    req: web::Json<SignUpRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    req.validate()
        .map_err(|e| AppError::validation("Failed to validate fields", &e))?;

    let user = state
        .auth
        .sign_up(&req.username, &req.email, &req.password)
        .await?;
    info!(user_id = %user.id, "registration completed");
    Ok(HttpResponse::Ok().finish())
}

/// Clears the cookie and blacklists the token. Without a token there is
/// nothing to do.
pub async fn sign_out(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let token = match state.tokens.extract(&req) {
        Ok(token) => token,
        Err(AuthError::TokenNotFound) => return Ok(HttpResponse::Ok().finish()),
        Err(e) => return Err(e.into()),
    };

    state.auth.sign_out(&token).await?;
    Ok(HttpResponse::Ok().cookie(state.tokens.cleared_cookie()).finish())
}

pub async fn exists(
    query: web::Query<ExistsQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner().normalized();
    if query.username.is_none() && query.email.is_none() {
        return Err(AppError::ValidationError {
            title: "Failed to validate params".into(),
            params: vec![FieldError::new(
                "username,email",
                "One of the fields should not be empty",
            )],
        });
    }
    query
        .validate()
        .map_err(|e| AppError::validation("Failed to validate fields", &e))?;

    let found = state
        .auth
        .exists(query.username.as_deref(), query.email.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(found))
}
