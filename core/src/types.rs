//! Domain types for the RSVP capacity engine.
//!
//! Identifiers, the event snapshot the admission decision works against, the stored
//! response row, and the status changes produced by reconciliation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a user
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random `UserId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `UserId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a user group (visibility scope of an event)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(Uuid);

impl GroupId {
    /// Creates a new random `GroupId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `GroupId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Value Objects
// ============================================================================

/// Maximum number of confirmed attendee units an event admits
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Capacity(pub u32);

impl Capacity {
    /// Creates a new `Capacity`
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the capacity value
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a single user's response sits for an event.
///
/// ```text
/// Absent ──submit──▶ Confirmed ◀──promote── Waitlisted
///    ▲                   │ ──demote──────────▶ │
///    └──── count 0 ──────┴─────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseStatus {
    /// No stored response (never responded, or withdrew with a count of 0)
    Absent,
    /// Counted against the event's capacity
    Confirmed,
    /// Queued until capacity frees up
    Waitlisted,
}

impl ResponseStatus {
    /// Status for a stored response, or `Absent` when there is none.
    #[must_use]
    pub fn of(response: Option<&EventResponse>) -> Self {
        response.map_or(Self::Absent, EventResponse::status)
    }

    /// Stable lowercase label, used for logs and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Confirmed => "confirmed",
            Self::Waitlisted => "waitlisted",
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Entities
// ============================================================================

/// Event snapshot as read inside an admission transaction.
///
/// `confirmed_attendee_count` is derived by the store: the sum of `attendee_count`
/// over the event's responses with `on_waitlist = false`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event identity
    pub id: EventId,
    /// Visibility group; `None` means the event is public
    pub group_id: Option<GroupId>,
    /// Maximum confirmed attendee units
    pub capacity: Capacity,
    /// When the event starts; responses close once this has passed
    pub start: DateTime<Utc>,
    /// Soft-delete flag
    pub is_deleted: bool,
    /// Confirmed attendee units as of the snapshot
    pub confirmed_attendee_count: u32,
}

impl Event {
    /// Creates a public, not-deleted event with no confirmed attendees
    #[must_use]
    pub const fn new(id: EventId, capacity: Capacity, start: DateTime<Utc>) -> Self {
        Self {
            id,
            group_id: None,
            capacity,
            start,
            is_deleted: false,
            confirmed_attendee_count: 0,
        }
    }

    /// Restrict the event to members of a group
    #[must_use]
    pub const fn with_group(mut self, group_id: GroupId) -> Self {
        self.group_id = Some(group_id);
        self
    }

    /// Remaining admission budget: `capacity - confirmed_attendee_count`.
    ///
    /// Signed so that a snapshot violating the capacity invariant is visible rather
    /// than wrapping around.
    #[must_use]
    pub fn spots_left(&self) -> i64 {
        i64::from(self.capacity.value()) - i64::from(self.confirmed_attendee_count)
    }

    /// Whether the event has already started as of `now`
    #[must_use]
    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        now > self.start
    }
}

/// A user's stored response to an event. At most one per `(event_id, user_id)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResponse {
    /// Event responded to
    pub event_id: EventId,
    /// Responding user
    pub user_id: UserId,
    /// People this response represents, including the user
    pub attendee_count: u32,
    /// Whether the response is queued rather than counted against capacity
    pub on_waitlist: bool,
    /// First insert time; the FIFO ordering key, never updated
    pub created_at: DateTime<Utc>,
    /// Last write time
    pub updated_at: DateTime<Utc>,
}

impl EventResponse {
    /// Number of guests beyond the user themselves
    #[must_use]
    pub const fn plus_ones(&self) -> u32 {
        self.attendee_count.saturating_sub(1)
    }

    /// `Confirmed` or `Waitlisted` depending on the stored flag
    #[must_use]
    pub const fn status(&self) -> ResponseStatus {
        if self.on_waitlist {
            ResponseStatus::Waitlisted
        } else {
            ResponseStatus::Confirmed
        }
    }
}

/// A response whose waitlist flag reconciliation flipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusChange {
    /// Event the response belongs to
    pub event_id: EventId,
    /// User who owns the response
    pub user_id: UserId,
    /// New value of the waitlist flag
    pub on_waitlist: bool,
}

impl StatusChange {
    /// `true` when the change moves a response off the waitlist
    #[must_use]
    pub const fn is_promotion(&self) -> bool {
        !self.on_waitlist
    }
}

/// Event with its full response list and the caller's own response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetail {
    /// Event snapshot
    pub event: Event,
    /// All responses in FIFO (creation) order
    pub responses: Vec<EventResponse>,
    /// The requesting user's response, if any
    pub user_response: Option<EventResponse>,
}

impl EventDetail {
    /// Confirmed responses, in FIFO order
    pub fn attendees(&self) -> impl Iterator<Item = &EventResponse> {
        self.responses.iter().filter(|r| !r.on_waitlist)
    }

    /// Waitlisted responses, in FIFO order
    pub fn waitlist(&self) -> impl Iterator<Item = &EventResponse> {
        self.responses.iter().filter(|r| r.on_waitlist)
    }
}
