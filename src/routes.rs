use actix_web::error::JsonPayloadError;
use actix_web::middleware::from_fn;
use actix_web::{web, HttpRequest, HttpResponse};

use crate::auth::handlers as user;
use crate::auth::middleware::{refresh_session, verify_session};
use crate::error::AppError;
use crate::learning::handlers as learning;
use crate::{health, ws};

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::UnprocessableEntity(err.to_string()).into()
}

/// Registers every route. Shared by the server and the integration tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .route("/healthz", web::get().to(health::healthz))
        .service(
            web::scope("/api/v1")
                .service(
                    web::scope("/user")
                        .route("/login", web::post().to(user::login))
                        .route("/sign-out", web::put().to(user::sign_out))
                        .route("/sign-up", web::post().to(user::sign_up))
                        .route("/exists", web::get().to(user::exists)),
                )
                .service(
                    web::scope("/lesson")
                        .wrap(from_fn(refresh_session))
                        .wrap(from_fn(verify_session))
                        .route("/progress", web::get().to(learning::lesson_progress)),
                )
                .service(
                    web::scope("/time-spent")
                        .wrap(from_fn(refresh_session))
                        .wrap(from_fn(verify_session))
                        .route("/", web::get().to(learning::time_spent)),
                )
                .route("/ws/echo", web::get().to(ws::echo)),
        );
}

pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().finish()
}
