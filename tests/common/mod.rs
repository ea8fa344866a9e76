#![allow(dead_code)]

use actix_web::body::MessageBody;
use actix_web::cookie::Cookie;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::middleware::from_fn;
use actix_web::http::header::HeaderMap;
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use lessonhub_server::clock::ManualClock;
use lessonhub_server::db::MemoryCredentialStore;
use lessonhub_server::error::DatabaseError;
use lessonhub_server::kv::{MemoryRevocationStore, RevocationStore};
use lessonhub_server::learning::{LessonProgressRow, LessonStore, TimeSpentRow, TimeSpentStore};
use lessonhub_server::middleware::{cors, log_request, recover, request_id, request_timeout};
use lessonhub_server::{routes, AppState, Settings};
use serde_json::{json, Value};
use std::sync::Arc;

pub const USERNAME: &str = "alice01";
pub const EMAIL: &str = "a@x.com";
pub const PASSWORD: &str = "secret1";

/// Canned learning data, the same for every user.
pub struct StubLearningStore;

#[async_trait]
impl LessonStore for StubLearningStore {
    async fn lesson_progress(&self, _user_id: &str) -> Result<Vec<LessonProgressRow>, DatabaseError> {
        Ok(vec![LessonProgressRow {
            id: 1,
            index: 1,
            title: "Greetings".into(),
            progress: 0.5,
            created_at: Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap(),
        }])
    }
}

#[async_trait]
impl TimeSpentStore for StubLearningStore {
    async fn week_time_spent(
        &self,
        _user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<TimeSpentRow>, DatabaseError> {
        Ok(vec![TimeSpentRow {
            weekday: 2,
            vocabulary: 10,
            grammar: 5,
            listening: 0,
            writing: 3,
            ts: at,
        }])
    }
}

/// A revocation store whose backend is always down.
pub struct DownRevocationStore;

#[async_trait]
impl RevocationStore for DownRevocationStore {
    async fn set_with_expiry(
        &self,
        _key: &str,
        _value: &str,
        _ttl: std::time::Duration,
    ) -> Result<(), lessonhub_server::error::RevocationError> {
        Err(lessonhub_server::error::RevocationError::Unavailable("connection refused".into()))
    }

    async fn exists(&self, _key: &str) -> Result<bool, lessonhub_server::error::RevocationError> {
        Err(lessonhub_server::error::RevocationError::Unavailable("connection refused".into()))
    }

    async fn ping(&self) -> Result<(), lessonhub_server::error::RevocationError> {
        Err(lessonhub_server::error::RevocationError::Unavailable("connection refused".into()))
    }
}

pub struct TestContext {
    pub state: web::Data<AppState>,
    pub clock: Arc<ManualClock>,
    pub credentials: MemoryCredentialStore,
    pub revocations: MemoryRevocationStore,
}

pub fn context() -> TestContext {
    context_with(Settings::new_for_test().expect("Failed to load test config"))
}

pub fn context_with(settings: Settings) -> TestContext {
    let clock = Arc::new(ManualClock::default());
    let credentials = MemoryCredentialStore::new();
    let revocations = MemoryRevocationStore::new(clock.clone());
    let learning = Arc::new(StubLearningStore);

    let state = AppState::with_stores(
        settings,
        Arc::new(credentials.clone()),
        Arc::new(revocations.clone()),
        learning.clone(),
        learning,
        clock.clone(),
    )
    .expect("Failed to build app state");

    TestContext {
        state: web::Data::new(state),
        clock,
        credentials,
        revocations,
    }
}

/// The application exactly as `main` assembles it.
pub fn app(
    state: web::Data<AppState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let cors_config = state.config.cors.clone();
    App::new()
        .app_data(state)
        .wrap(from_fn(request_timeout))
        .wrap(cors(&cors_config))
        .wrap(from_fn(log_request))
        .wrap(from_fn(recover))
        .wrap(from_fn(request_id))
        .configure(routes::configure)
        .default_service(web::to(routes::not_found))
}

pub fn sign_up_request() -> test::TestRequest {
    test::TestRequest::post()
        .uri("/api/v1/user/sign-up")
        .set_json(json!({ "username": USERNAME, "email": EMAIL, "password": PASSWORD }))
}

pub fn login_request(username: &str, password: &str) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/api/v1/user/login")
        .set_json(json!({ "username": username, "password": password }))
}

pub fn session_cookie<B>(res: &ServiceResponse<B>, name: &str) -> Option<Cookie<'static>> {
    res.response()
        .cookies()
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.into_owned())
}

/// Unpacks an error that escaped the service as the response actix would
/// have written for it.
pub async fn error_parts(err: actix_web::Error) -> (StatusCode, HeaderMap, Value) {
    let res = err.error_response();
    let status = res.status();
    let headers = res.headers().clone();
    let body = actix_web::body::to_bytes(res.into_body())
        .await
        .expect("Failed to read error body");
    (status, headers, serde_json::from_slice(&body).expect("Error body is not JSON"))
}
