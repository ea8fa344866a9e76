use actix_web::middleware::from_fn;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use lessonhub_server::middleware::{cors, log_request, recover, request_id, request_timeout};
use lessonhub_server::{routes, telemetry, AppState, Settings};
use std::net::TcpListener;
use tracing::info;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Settings::new().context("failed to load configuration")?;
    telemetry::init(&config);
    info!(environment = %config.environment, "configuration loaded");

    let state = AppState::new(config.clone())
        .await
        .context("failed to initialise application state")?;
    let state = web::Data::new(state);

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&address).with_context(|| format!("failed to bind {}", address))?;
    info!(%address, workers = config.server.workers, "starting server");

    let cors_config = config.cors.clone();
    let app_state = state.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(from_fn(request_timeout))
            .wrap(cors(&cors_config))
            .wrap(from_fn(log_request))
            .wrap(from_fn(recover))
            .wrap(from_fn(request_id))
            .configure(routes::configure)
            .default_service(web::to(routes::not_found))
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run()
    .await?;

    state.shutdown().await;
    info!("server stopped");
    Ok(())
}
