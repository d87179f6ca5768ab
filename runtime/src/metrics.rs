//! Prometheus metrics for the RSVP engine.
//!
//! This module provides metric collection for:
//! - Accepted responses by resulting status
//! - Rejections by error kind
//! - Waitlist promotions and demotions
//! - Reconciliation runs and admission latency
//!
//! # Example
//!
//! ```rust,no_run
//! use rsvp_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! if let Some(text) = server.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use rsvp_core::{ErrorKind, ResponseStatus, StatusChange};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// Installs the global recorder in-process and renders the scrape text on
/// demand. No listener is bound: exposing [`render`](Self::render) at
/// [`addr`](Self::addr) is left to the embedding binary.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address the embedding binary should expose the scrape text on (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a metrics recorder is already installed (e.g., in tests), this logs a
    /// warning and succeeds without a render handle.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(
                    addr = %self.addr,
                    "Prometheus recorder installed; scrape text is rendered in-process"
                );
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Address configured for the scrape endpoint (not bound by this type)
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if server hasn't been started.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "rsvp_responses_total",
        "Total number of accepted responses, labelled by resulting status"
    );
    describe_counter!(
        "rsvp_rejections_total",
        "Total number of rejected requests, labelled by error kind"
    );
    describe_counter!(
        "rsvp_waitlist_changes_total",
        "Total number of responses promoted from or demoted to the waitlist"
    );
    describe_counter!(
        "rsvp_reconciliations_total",
        "Total number of waitlist reconciliation runs"
    );
    describe_histogram!(
        "rsvp_admission_duration_seconds",
        "Time taken to admit a response, including lock wait and commit"
    );
}

/// Engine metrics recorder.
pub struct RsvpMetrics;

impl RsvpMetrics {
    /// Record an accepted response and its end-to-end latency.
    pub fn record_response(status: ResponseStatus, duration: Duration) {
        counter!("rsvp_responses_total", "status" => status.as_str()).increment(1);
        histogram!("rsvp_admission_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a rejected request.
    pub fn record_rejection(kind: ErrorKind) {
        counter!("rsvp_rejections_total", "kind" => kind.as_str()).increment(1);
    }

    /// Record one reconciliation run and the flags it flipped.
    pub fn record_reconciliation(changes: &[StatusChange]) {
        counter!("rsvp_reconciliations_total").increment(1);

        let promoted = changes.iter().filter(|c| c.is_promotion()).count() as u64;
        let demoted = changes.len() as u64 - promoted;
        if promoted > 0 {
            counter!("rsvp_waitlist_changes_total", "direction" => "promoted").increment(promoted);
        }
        if demoted > 0 {
            counter!("rsvp_waitlist_changes_total", "direction" => "demoted").increment(demoted);
        }
    }
}
