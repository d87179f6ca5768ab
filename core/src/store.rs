//! Persistence Adapter traits.
//!
//! The engine never touches event or response rows outside a transaction:
//! `spots_left` is only meaningful as of a consistent snapshot. A
//! [`ResponseStore`] hands out [`ResponseTransaction`]s, and every read and
//! write of one admission decision goes through the same transaction.
//!
//! # Implementations
//!
//! - `PostgresResponseStore` (in `rsvp-postgres`): production implementation
//! - `InMemoryResponseStore` (in `rsvp-testing`): fast, deterministic testing
//!
//! # Dyn Compatibility
//!
//! Methods return explicit `Pin<Box<dyn Future>>` instead of `async fn` so the
//! traits can be used as `Arc<dyn ResponseStore>` and `Box<dyn ResponseTransaction>`.

use crate::error::Result;
use crate::types::{Capacity, Event, EventId, EventResponse, StatusChange, UserId};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

/// Boxed, sendable future returned by the persistence traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Insert-or-update of a single response row.
///
/// On insert, `created_at` and `updated_at` are both set to `now`. On conflict
/// only `attendee_count`, `on_waitlist` and `updated_at` change; the original
/// `created_at` (the FIFO key) is kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseUpsert {
    /// Event responded to
    pub event_id: EventId,
    /// Responding user
    pub user_id: UserId,
    /// New attendee count (always > 0; a count of 0 is a delete)
    pub attendee_count: u32,
    /// New waitlist flag
    pub on_waitlist: bool,
    /// Write timestamp
    pub now: DateTime<Utc>,
}

/// Source of transactions over Event and `EventResponse` rows.
pub trait ResponseStore: Send + Sync {
    /// Begin a new transaction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RsvpError::Persistence`] if no transaction can be opened.
    fn begin(&self) -> BoxFuture<'_, Result<Box<dyn ResponseTransaction>>>;
}

/// One open transaction.
///
/// Dropping a transaction without calling [`commit`](Self::commit) discards its
/// writes, exactly like an explicit [`rollback`](Self::rollback).
pub trait ResponseTransaction: Send {
    /// Load the event snapshot, including its confirmed attendee count.
    ///
    /// Implementations backed by a shared database should lock the event row
    /// for the rest of the transaction.
    ///
    /// # Errors
    ///
    /// - [`crate::RsvpError::NotFound`] if the event is missing or soft-deleted
    /// - [`crate::RsvpError::Persistence`] if the query fails
    fn get_event(&mut self, event_id: EventId) -> BoxFuture<'_, Result<Event>>;

    /// Load one user's response, if any.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RsvpError::Persistence`] if the query fails.
    fn get_user_response(
        &mut self,
        event_id: EventId,
        user_id: UserId,
    ) -> BoxFuture<'_, Result<Option<EventResponse>>>;

    /// Insert or update a response row.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RsvpError::Persistence`] if the write fails.
    fn upsert_response(&mut self, upsert: ResponseUpsert) -> BoxFuture<'_, Result<()>>;

    /// Delete a response row. Deleting a missing row is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RsvpError::Persistence`] if the write fails.
    fn delete_response(&mut self, event_id: EventId, user_id: UserId)
    -> BoxFuture<'_, Result<()>>;

    /// All responses of an event ordered by `created_at` ascending.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RsvpError::Persistence`] if the query fails.
    fn list_responses(&mut self, event_id: EventId) -> BoxFuture<'_, Result<Vec<EventResponse>>>;

    /// Apply a batch of waitlist flag changes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RsvpError::Persistence`] if any write fails.
    fn update_waitlist_flags(&mut self, changes: Vec<StatusChange>) -> BoxFuture<'_, Result<()>>;

    /// Persist a new capacity for the event.
    ///
    /// # Errors
    ///
    /// - [`crate::RsvpError::NotFound`] if the event is missing or soft-deleted
    /// - [`crate::RsvpError::Persistence`] if the write fails
    fn update_capacity(&mut self, event_id: EventId, capacity: Capacity)
    -> BoxFuture<'_, Result<()>>;

    /// Make every write of this transaction durable.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RsvpError::Persistence`] if the commit fails; nothing was applied.
    fn commit(self: Box<Self>) -> BoxFuture<'static, Result<()>>;

    /// Discard every write of this transaction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RsvpError::Persistence`] if the backend reports a failure.
    fn rollback(self: Box<Self>) -> BoxFuture<'static, Result<()>>;
}
