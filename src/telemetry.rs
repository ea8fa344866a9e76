use tracing_subscriber::EnvFilter;

use crate::config::Settings;

/// Installs the global subscriber: pretty output in development, JSON lines
/// in production. `RUST_LOG` wins over `logging.level` when set.
pub fn init(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},sqlx=warn", settings.logging.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    let result = if settings.is_production() {
        builder.json().with_current_span(false).try_init()
    } else {
        builder
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("tracing subscriber already installed: {}", e);
    }
}
