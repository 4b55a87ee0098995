//! Pitch Server
//!
//! Hosts rooms of a 2D team-sport game. Every room owns an authoritative
//! physics simulation stepped on its own tokio task; players connect over
//! WebSocket, send key changes and receive state diffs.

mod app;
mod config;
mod game;
mod http;
mod util;
mod ws;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::app::AppState;
use crate::config::Config;
use crate::http::build_router;
use crate::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    init_tracing(&config);
    init_server_time();

    info!(
        addr = %config.server_addr,
        tick_rate = config.tick_rate,
        send_rate = config.send_rate,
        max_steps_per_run = config.max_steps_per_run,
        default_map_size = %config.default_map_size,
        room_idle_secs = config.room_idle_timeout.as_secs(),
        "Starting pitch server"
    );

    let addr = config.server_addr;
    let router = build_router(AppState::new(config));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "Listening; rooms at /rooms, sockets at /ws?room=<id>");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over `LOG_LEVEL`; `LOG_FORMAT=json` switches to JSON lines
fn init_tracing(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

/// Resolves on Ctrl+C or SIGTERM; open rooms are dropped with the runtime
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(signal = "ctrl_c", "Shutting down"),
        _ = terminate => info!(signal = "sigterm", "Shutting down"),
    }
}
