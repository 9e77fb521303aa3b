//! # Application State Management
//!
//! State shared by every request handler. Actix builds one `App` per worker
//! thread, so everything in here is cheap to clone and safe to share.
//!
//! ## What's shared:
//! - **config**: read-only after startup, so a plain `Arc` is enough
//! - **pipeline**: holds no mutable state of its own; concurrent requests
//!   only meet on the filesystem
//! - **metrics**: counters updated by [`MetricsMiddleware`](crate::middleware::MetricsMiddleware),
//!   behind an `RwLock`

use crate::config::AppConfig;
use crate::pipeline::TranscriptionPipeline;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<TranscriptionPipeline>,
    pub metrics: Arc<RwLock<AppMetrics>>,
    /// Monotonic start time, for uptime
    pub start_time: Instant,
    /// Wall-clock start time, for the shutdown summary
    pub started_at: DateTime<Utc>,
}

/// Request counters collected across all requests.
#[derive(Debug, Default, Clone, Serialize)]
pub struct AppMetrics {
    /// Total number of HTTP requests seen since startup
    pub request_count: u64,

    /// Requests that ended in a 4xx/5xx
    pub error_count: u64,

    /// Keyed by "METHOD /path"
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    /// Build the state from a validated configuration.
    ///
    /// The pipeline gets its upload directory from `config.storage`; tests
    /// that want an isolated directory use [`AppState::with_pipeline`].
    pub fn new(config: AppConfig) -> Self {
        let pipeline = TranscriptionPipeline::new(
            config.storage.upload_dir.clone(),
            config.transcriber.clone(),
        );
        Self::with_pipeline(config, pipeline)
    }

    pub fn with_pipeline(config: AppConfig, pipeline: TranscriptionPipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Increment the total request counter (called by middleware for every request).
    pub fn increment_request_count(&self) {
        if let Ok(mut metrics) = self.metrics.write() {
            metrics.request_count += 1;
        }
    }

    /// Record the outcome of one request against its endpoint.
    ///
    /// The first time we see an endpoint, a zeroed entry is created.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        if let Ok(mut metrics) = self.metrics.write() {
            if is_error {
                metrics.error_count += 1;
            }

            let endpoint_metric = metrics
                .endpoint_metrics
                .entry(endpoint.to_string())
                .or_default();
            endpoint_metric.request_count += 1;
            endpoint_metric.total_duration_ms += duration_ms;
            if is_error {
                endpoint_metric.error_count += 1;
            }
        }
    }

    /// Copy of the current counters, so the lock isn't held while logging.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics
            .read()
            .map(|metrics| metrics.clone())
            .unwrap_or_default()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
