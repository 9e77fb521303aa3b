//! # Whisper Upload Server - Main Application Entry Point
//!
//! A single-endpoint HTTP service: clients POST an audio file to
//! `/transcribe`, we save it, run the `whisper` CLI on it and hand back the
//! JSON transcript the tool writes next to the upload.
//!
//! ## Application Architecture:
//! - **config**: Application configuration (TOML file + environment variables)
//! - **multipart**: Byte-level decoder that pulls the uploaded file out of the body
//! - **pipeline**: Stores the upload, runs the transcription tool, finds its output
//! - **state**: Shared state handed to every request handler
//! - **middleware**: Request logging and metrics
//! - **handlers**: HTTP request handlers
//! - **error**: Error types and their HTTP responses

mod config;
mod error;
mod handlers;
mod middleware;
mod multipart;
mod pipeline;
mod state;

use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::{Context, Result};
use crate::config::AppConfig;
use crate::state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Set by the signal handler task once SIGINT or SIGTERM arrives.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

/// The main application entry point.
///
/// ## What this function does:
/// 1. **Loads configuration** from files and environment variables
/// 2. **Sets up logging**
/// 3. **Creates the upload directory** if it doesn't exist yet
/// 4. **Configures the HTTP server** with middleware and routes
/// 5. **Handles graceful shutdown** when receiving system signals
#[actix_web::main]
async fn main() -> Result<()> {
    // .ok(): it's fine if there's no .env file
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting whisper-upload-server v{}", env!("CARGO_PKG_VERSION"));

    tokio::fs::create_dir_all(&config.storage.upload_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create upload directory {}",
                config.storage.upload_dir.display()
            )
        })?;

    let app_state = AppState::new(config.clone());
    let bind_addr = config.bind_addr();
    let max_upload_bytes = config.server.max_upload_bytes;

    info!(
        upload_dir = %app_state.pipeline.upload_dir().display(),
        executable = %app_state.config.transcriber.executable,
        model = %app_state.config.transcriber.model,
        "Transcription pipeline ready"
    );

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server_state = app_state.clone();
    let server = HttpServer::new(move || {
        // middleware runs in reverse registration order for responses
        App::new()
            .app_data(web::Data::new(server_state.clone()))
            .app_data(web::PayloadConfig::new(max_upload_bytes))
            .wrap(Logger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .configure(handlers::configure)
    })
    .bind(&bind_addr)
    .with_context(|| format!("failed to bind {}", bind_addr))?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    log_metrics_summary(&app_state);
    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize the tracing (logging) system.
///
/// ## Environment Variables:
/// - `RUST_LOG`: Controls what gets logged (e.g., "debug", "whisper_upload_server=debug")
/// - If not set, defaults to "whisper_upload_server=debug,actix_web=info"
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "whisper_upload_server=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("failed to initialize tracing")?;

    Ok(())
}

/// Listen for SIGTERM and SIGINT and flip the global shutdown flag.
fn setup_signal_handlers() {
    tokio::spawn(async {
        let (mut sigterm, mut sigint) = match (
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()),
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()),
        ) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(e), _) | (_, Err(e)) => {
                error!("Failed to install signal handlers: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

/// Poll the shutdown flag every 100ms.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}

fn log_metrics_summary(state: &AppState) {
    let metrics = state.get_metrics_snapshot();

    for (endpoint, metric) in &metrics.endpoint_metrics {
        info!(
            endpoint = %endpoint,
            requests = metric.request_count,
            errors = metric.error_count,
            average_duration_ms = metric.average_duration_ms(),
            "Endpoint summary"
        );
    }

    match serde_json::to_string(&metrics) {
        Ok(json) => info!(
            started_at = %state.started_at.to_rfc3339(),
            uptime_seconds = state.get_uptime_seconds(),
            metrics = %json,
            "Request metrics"
        ),
        Err(e) => error!("Failed to serialize metrics: {}", e),
    }
}
