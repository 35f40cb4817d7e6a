use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::info;

use vidgate::config::ServerConfig;
use vidgate::error::ApiError;
use vidgate::server::AppState;
use vidgate::{fetch, history, server};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "vidgate=info,tower_http=info".to_string()),
        )
        .init();

    if let Err(error) = run().await {
        eprintln!("Server error: {}", error.message);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ApiError> {
    let config = ServerConfig::from_env();

    tokio::fs::create_dir_all(&config.tmp_dir)
        .await
        .map_err(|error| ApiError::internal(format!("could not create temp dir: {error}")))?;
    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .map_err(|error| ApiError::internal(format!("could not create data dir: {error}")))?;

    fetch::sweep_stale(&config.tmp_dir, fetch::STALE_FILE_AGE).await;

    let records = history::load(&config.history_path()).await?;
    let state = AppState {
        history: Arc::new(Mutex::new(records)),
        history_path: config.history_path(),
        tmp_dir: config.tmp_dir.clone(),
        admin_password: config.admin_password.clone(),
    };

    let app = server::router(state);

    let listener = TcpListener::bind(&config.bind_addr).await.map_err(|error| {
        ApiError::internal(format!("could not bind {}: {error}", config.bind_addr))
    })?;

    info!("vidgate listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .map_err(|error| ApiError::internal(format!("server error: {error}")))
}
