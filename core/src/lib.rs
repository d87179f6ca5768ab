//! # RSVP Core
//!
//! Core types, traits and pure decision logic for the RSVP capacity engine.
//!
//! Users submit an *attendee count* (themselves plus optional plus-ones) against an
//! event with a fixed capacity. Responses that do not fit are queued on a strict
//! first-in-first-out waitlist, and the waitlist is re-derived whenever the
//! confirmed/waitlisted boundary may have moved.
//!
//! ## Core Concepts
//!
//! - **Admission**: Pure decision `(Event, existing response, new count) → Decision`
//! - **Reconciliation**: Pure plan `(capacity, responses in FIFO order) → status changes`
//! - **Persistence Adapter**: [`store::ResponseStore`] / [`store::ResponseTransaction`]
//! - **Access Collaborator**: [`access::AccessPolicy`]
//! - **Environment**: [`environment::Clock`] for deterministic time
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell: this crate performs no I/O. The
//!   `rsvp-runtime` crate owns locking, transactions and logging.
//! - Explicit collaborators: every external dependency is a trait object.
//!
//! ## Example
//!
//! ```
//! use rsvp_core::admission;
//! use rsvp_core::types::{Capacity, Event, EventId, ResponseStatus};
//! use chrono::Utc;
//!
//! let mut event = Event::new(EventId::new(), Capacity::new(2), Utc::now());
//! event.confirmed_attendee_count = 2;
//!
//! // The event is full, so a single attendee lands on the waitlist.
//! let decision = admission::decide(&event, None, 1).unwrap();
//! assert_eq!(decision.next, ResponseStatus::Waitlisted);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod access;
pub mod admission;
pub mod environment;
pub mod error;
pub mod reconcile;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use error::{ErrorKind, Result, RsvpError, ValidationError};
pub use smallvec::{smallvec, SmallVec};
pub use types::{
    Capacity, Event, EventDetail, EventId, EventResponse, GroupId, ResponseStatus, StatusChange,
    UserId,
};
