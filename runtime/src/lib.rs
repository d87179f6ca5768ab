//! # RSVP Runtime
//!
//! Imperative shell around the pure decisions in `rsvp-core`.
//!
//! This crate owns everything with side effects: the admission guard that
//! serializes mutations, the transaction boundary around each mutation,
//! structured logging and Prometheus metrics.
//!
//! ## Core Components
//!
//! - **`RsvpService`**: entry points (`handle_response`, `change_capacity`,
//!   `on_capacity_changed`, `event_detail`)
//! - **`AdmissionGuard`**: per-event (or process-wide) lock table
//! - **`EngineConfig`**: attendee ceiling and lock scope, loaded from the environment
//! - **`metrics`**: metric descriptions, recorder and Prometheus exporter
//!
//! ## Example
//!
//! ```ignore
//! use rsvp_runtime::{EngineConfig, RespondRequest, RsvpService};
//!
//! let service = RsvpService::new(store, access, clock, EngineConfig::from_env());
//!
//! service
//!     .handle_response(RespondRequest { event_id, user_id, attendee_count: 2 })
//!     .await?;
//!
//! // Capacity edited by an organiser: persist and reconcile atomically
//! let changes = service.change_capacity(event_id, Capacity::new(50)).await?;
//! ```

/// Engine configuration
pub mod config;

/// Per-event admission locks
pub mod guard;

/// Prometheus metrics for observability
pub mod metrics;

/// Admission and reconciliation entry points
pub mod service;

pub use config::{EngineConfig, LockScope};
pub use guard::{AdmissionGuard, AdmissionPermit};
pub use service::{RespondRequest, ResponseOutcome, RsvpService};
