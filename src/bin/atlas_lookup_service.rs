//! Atlas Lookup Service Binary
//!
//! Serves point-in-polygon district lookups against a committed snapshot
//! archive over a REST API:
//! - Structured JSON logging
//! - Request tracing with latency fields
//! - Graceful shutdown handling
//! - Health check endpoint
//!
//! ## Configuration
//!
//! Environment variables:
//! - `ATLAS_ARCHIVE_DIR`: Snapshot archive directory (required)
//! - `PORT`: Service port (default: 8002)
//! - `HOST`: Service host (default: 0.0.0.0)
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! ## Usage
//!
//! ```bash
//! ATLAS_ARCHIVE_DIR=./snapshots/current cargo run --bin atlas_lookup_service --features service
//! ```

use std::net::SocketAddr;
use std::time::Instant;

use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use civic_atlas_kernel::lookup::{LookupService, PointCacheConfig};
use civic_atlas_kernel::service::{create_router, ServiceState};

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "atlas_lookup_service=info,tower_http=info".into());

    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_span_events(FmtSpan::CLOSE))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .flatten_event(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let version = env!("CARGO_PKG_VERSION");
    info!(version = version, "Starting Atlas Lookup Service");

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8002);
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

    let archive_dir = match std::env::var("ATLAS_ARCHIVE_DIR") {
        Ok(dir) if !dir.is_empty() => dir,
        _ => {
            error!("ATLAS_ARCHIVE_DIR not set; nothing to serve");
            return Err("ATLAS_ARCHIVE_DIR is required".into());
        }
    };

    // Load and verify the snapshot archive before accepting traffic.
    info!(archive_dir = %archive_dir, "Loading snapshot archive...");
    let load_start = Instant::now();
    let lookup = LookupService::new(PointCacheConfig::default());
    if let Err(e) = lookup.load_snapshot_from(std::path::Path::new(&archive_dir)) {
        error!(error = %e, "Failed to load snapshot archive");
        return Err(e.into());
    }
    let snapshot = lookup.snapshot().expect("snapshot just loaded");
    info!(
        latency_ms = load_start.elapsed().as_millis() as u64,
        snapshot = %snapshot.snapshot_id,
        merkle_root = %snapshot.merkle_root,
        boundaries = snapshot.leaf_count,
        "Snapshot archive loaded"
    );

    let state = ServiceState::new(lookup);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!(address = %addr, version = version, "Atlas Lookup Service listening");

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
            _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
        }
    };

    info!("Ready to accept connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Atlas Lookup Service shutdown complete");

    Ok(())
}
