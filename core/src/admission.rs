//! Admission decision for a single response mutation.
//!
//! Pure functions only: the runtime reads the event snapshot and the caller's
//! existing response inside a transaction, asks [`decide`] what to write, and
//! writes it.
//!
//! # Decision Rules
//!
//! ```text
//! delta        = new_count - existing_count (0 if no response)
//! count == 0   → delete the response (withdrawal, never an error)
//! claimed      = new_count if waitlisted, delta otherwise
//! on_waitlist  = spots_left - claimed < 0
//! on_waitlist with plus-ones → rejected
//! ```
//!
//! A confirmed response that shrinks or disappears frees capacity; the runtime
//! then reconciles the event so queued responses move up. Capacity released by a
//! response that was itself waitlisted never triggers promotion.

use crate::error::{Result, RsvpError, ValidationError};
use crate::types::{Event, EventResponse, ResponseStatus};
use chrono::{DateTime, Utc};

/// Default attendee ceiling: the user plus one guest.
pub const DEFAULT_MAX_ATTENDEE_COUNT: u32 = 2;

/// Row-level write an admission decision calls for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseWrite {
    /// Remove the caller's response row (count set to 0).
    Delete,
    /// Insert or update the caller's response row.
    Upsert {
        /// Attendee count to store
        attendee_count: u32,
        /// Waitlist flag to store
        on_waitlist: bool,
    },
}

/// Outcome of [`decide`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decision {
    /// What to write
    pub write: ResponseWrite,
    /// Change in the caller's attendee count
    pub delta: i64,
    /// Status before the write
    pub previous: ResponseStatus,
    /// Status after the write
    pub next: ResponseStatus,
    /// Whether a confirmed response released capacity, so the event needs reconciling
    pub frees_confirmed_capacity: bool,
}

/// Validate a submitted attendee count against the configured ceiling.
///
/// # Errors
///
/// - [`ValidationError::NegativeAttendeeCount`] if `requested < 0`
/// - [`ValidationError::TooManyPlusOnes`] if `requested > max_attendee_count`
pub fn validate_attendee_count(
    requested: i32,
    max_attendee_count: u32,
) -> std::result::Result<u32, ValidationError> {
    let count =
        u32::try_from(requested).map_err(|_| ValidationError::NegativeAttendeeCount { requested })?;

    if count > max_attendee_count {
        return Err(ValidationError::TooManyPlusOnes {
            requested,
            max_plus_ones: max_attendee_count.saturating_sub(1),
        });
    }

    Ok(count)
}

/// Check that an event still accepts responses.
///
/// # Errors
///
/// - [`RsvpError::NotFound`] if the snapshot is soft-deleted
/// - [`RsvpError::PastEvent`] if the event started before `now`
pub fn ensure_open(event: &Event, now: DateTime<Utc>) -> Result<()> {
    if event.is_deleted {
        return Err(RsvpError::NotFound { event_id: event.id });
    }

    if event.is_past(now) {
        return Err(RsvpError::PastEvent {
            event_id: event.id,
            start: event.start,
        });
    }

    Ok(())
}

/// Decide what a new attendee count means for the caller's response.
///
/// `event` must be the snapshot read in the same transaction as `existing`.
///
/// # Errors
///
/// Returns [`ValidationError::PlusOnesWhileWaitlisted`] when the response would be
/// (or already is) waitlisted but represents more than one person.
pub fn decide(
    event: &Event,
    existing: Option<&EventResponse>,
    attendee_count: u32,
) -> std::result::Result<Decision, ValidationError> {
    let previous = ResponseStatus::of(existing);
    let existing_count = existing.map_or(0, |r| r.attendee_count);
    let delta = i64::from(attendee_count) - i64::from(existing_count);
    let frees_confirmed_capacity = previous == ResponseStatus::Confirmed && delta < 0;

    if attendee_count == 0 {
        return Ok(Decision {
            write: ResponseWrite::Delete,
            delta,
            previous,
            next: ResponseStatus::Absent,
            frees_confirmed_capacity,
        });
    }

    // A waitlisted response holds no confirmed units, so all of it must fit
    let claimed = match previous {
        ResponseStatus::Waitlisted => i64::from(attendee_count),
        ResponseStatus::Absent | ResponseStatus::Confirmed => delta,
    };
    let on_waitlist = event.spots_left() - claimed < 0;

    if on_waitlist && attendee_count > 1 {
        return Err(ValidationError::PlusOnesWhileWaitlisted {
            requested: attendee_count,
        });
    }

    Ok(Decision {
        write: ResponseWrite::Upsert {
            attendee_count,
            on_waitlist,
        },
        delta,
        previous,
        next: if on_waitlist {
            ResponseStatus::Waitlisted
        } else {
            ResponseStatus::Confirmed
        },
        frees_confirmed_capacity,
    })
}
