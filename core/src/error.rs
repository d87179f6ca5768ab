//! Error types for admission and reconciliation.

use crate::types::{EventId, UserId};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, RsvpError>;

/// Error taxonomy for the RSVP engine.
///
/// Every failure is reported synchronously to the caller and is recoverable at the
/// call boundary. Nothing is retried internally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RsvpError {
    /// The request itself is invalid.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The event does not exist or has been soft-deleted.
    #[error("Event not found: {event_id}")]
    NotFound {
        /// Event that was looked up
        event_id: EventId,
    },

    /// The event has already started; responses are closed.
    #[error("Event {event_id} already started at {start}")]
    PastEvent {
        /// Event that was responded to
        event_id: EventId,
        /// When the event started
        start: DateTime<Utc>,
    },

    /// The user is not allowed to see this event (group visibility).
    #[error("User {user_id} cannot access event {event_id}")]
    AccessDenied {
        /// Event that was requested
        event_id: EventId,
        /// User that was denied
        user_id: UserId,
    },

    /// The backing store failed (begin, query, or commit).
    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Reasons a request is rejected before any state changes.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Attendee counts cannot be negative.
    #[error("cannot have less than 0 attendees (requested {requested})")]
    NegativeAttendeeCount {
        /// Count that was submitted
        requested: i32,
    },

    /// More plus-ones than the configured ceiling allows.
    #[error("maximum of {max_plus_ones} plus one(s) allowed (requested {requested} attendees)")]
    TooManyPlusOnes {
        /// Count that was submitted
        requested: i32,
        /// Plus-ones allowed on top of the user themselves
        max_plus_ones: u32,
    },

    /// The response would land on the waitlist but carries plus-ones.
    #[error("no plus ones when adding to waitlist (requested {requested} attendees)")]
    PlusOnesWhileWaitlisted {
        /// Count that was submitted
        requested: u32,
    },

    /// Capacity edits must stay positive.
    #[error("capacity must be greater than zero")]
    NonPositiveCapacity,
}

/// Fieldless discriminant of [`RsvpError`] for callers that branch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`RsvpError::Validation`]
    Validation,
    /// See [`RsvpError::NotFound`]
    NotFound,
    /// See [`RsvpError::PastEvent`]
    PastEvent,
    /// See [`RsvpError::AccessDenied`]
    AccessDenied,
    /// See [`RsvpError::Persistence`]
    Persistence,
}

impl ErrorKind {
    /// Stable lowercase label, used for metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::PastEvent => "past_event",
            Self::AccessDenied => "access_denied",
            Self::Persistence => "persistence",
        }
    }
}

impl RsvpError {
    /// The kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::PastEvent { .. } => ErrorKind::PastEvent,
            Self::AccessDenied { .. } => ErrorKind::AccessDenied,
            Self::Persistence(_) => ErrorKind::Persistence,
        }
    }

    /// Wrap a storage failure with a short description of what was attempted.
    pub fn persistence(context: &str, error: impl std::fmt::Display) -> Self {
        Self::Persistence(format!("{context}: {error}"))
    }
}
