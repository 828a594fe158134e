//! smartlab-relay server entry point.
//!
//! Starts the Axum HTTP server with the REST routes and the `/ws` push
//! channel, and runs the liveness sweeper until shutdown.

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use smartlab_relay::api;
use smartlab_relay::app_state::AppState;
use smartlab_relay::config::RelayConfig;
use smartlab_relay::persistence::InMemoryStore;
use smartlab_relay::ws::ConnectionRegistry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = RelayConfig::from_env()?;
    tracing::info!(
        addr = %config.listen_addr,
        heartbeat = ?config.heartbeat_interval,
        "starting smartlab-relay"
    );

    let registry = Arc::new(ConnectionRegistry::new(config.session_buffer));
    let store = Arc::new(InMemoryStore::seeded());
    let app_state = AppState::new(store, Arc::clone(&registry));
    let sweeper = registry.start_liveness_sweeper(config.heartbeat_interval);

    // Router::layer applies layers inside-out: Cors is outermost, then Trace, then Timeout.
    let app = api::build_router()
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&registry)))
        .await?;

    sweeper.stop();
    tracing::info!("server stopped");

    Ok(())
}

/// Resolves on SIGINT/SIGTERM after closing every observer session, so
/// upgraded sockets do not hold the server open.
async fn shutdown_signal(registry: Arc<ConnectionRegistry>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
    registry.shutdown().await;
}
