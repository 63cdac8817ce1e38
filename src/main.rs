//! Feedback Box - HTTP backend for anonymous feedback.
//!
//! This binary reads configuration, connects to MongoDB, and serves the API
//! until it receives Ctrl+C or SIGTERM.

use std::net::SocketAddr;
use std::process::ExitCode;

use clap::Parser;
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feedback_box::{
    config::Config,
    server::create_router,
    store::{FeedbackStore, MongoFeedbackStore},
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // Initialize logging
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    // Print startup banner and info
    print_banner();
    log_configuration(&config);

    // Connect to MongoDB
    info!("");
    info!("Connecting to MongoDB...");
    let store = match MongoFeedbackStore::connect(&config.mongo_settings()).await {
        Ok(store) => store,
        Err(e) => {
            error!("  Invalid MongoDB configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = store.ping().await {
        error!("  Failed to reach MongoDB: {}", e);
        error!("");
        error!("  Please check:");
        error!("    - MONGODB_URI points at a running server");
        error!("    - The credentials in the URI are valid");
        error!("    - This host is allowed to connect (network access list)");
        return ExitCode::FAILURE;
    }
    info!("  Connected successfully");

    // Create router
    let router = create_router(store.clone(), config.router_config());

    // Bind and serve
    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/api/health", addr);
    info!("    curl http://{}/api/feedback", addr);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    let served = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    store.close().await;

    if let Err(e) = served {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Shutdown complete");
    ExitCode::SUCCESS
}

/// Print the startup banner.
fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    info!("");
    info!("╔══════════════════════════════════════════╗");
    info!("║                                          ║");
    info!("║     F E E D B A C K   ·   B O X          ║");
    info!("║                                          ║");
    info!("╚══════════════════════════════════════════╝");
    info!("                                     v{}", version);
}

/// Log the effective configuration. Never logs the URI or the session secret.
fn log_configuration(config: &Config) {
    info!("Configuration:");
    info!("  Environment: {}", config.environment);
    info!("  Database: {}/{}", config.database, config.collection);
    info!(
        "  Pool: max {} connections, idle {}ms, write timeout {}ms",
        config.max_pool_size, config.max_idle_ms, config.write_timeout_ms
    );
    info!("  CORS origins: {}", config.cors_origins.join(", "));
    info!(
        "  Rate limits: {} writes/{}s, {} reads/{}s",
        config.write_limit, config.write_window_secs, config.read_limit, config.read_window_secs
    );
    info!("  Body limit: {} bytes", config.body_limit);
    info!("  List limit: {}", config.list_limit);

    if config.session_secret.is_none() {
        warn!("  Session secret: random (sessions reset on restart)");
        warn!("        Set SESSION_SECRET to keep sessions across restarts");
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "feedback_box=debug,tower_http=debug"
    } else {
        "feedback_box=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
