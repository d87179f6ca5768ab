//! # RSVP Testing
//!
//! Testing utilities for the RSVP capacity engine.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`SteppingClock`])
//! - [`InMemoryResponseStore`]: transactional in-memory persistence with fault injection
//! - [`StaticAccessPolicy`]: group membership from a fixed table
//! - Fixture helpers for events and responses
//!
//! ## Example
//!
//! ```
//! use rsvp_testing::{helpers, InMemoryResponseStore};
//! use rsvp_core::Capacity;
//!
//! let store = InMemoryResponseStore::new();
//! let event = helpers::upcoming_event(Capacity::new(2));
//! store.insert_event(event.clone());
//!
//! assert_eq!(store.confirmed_attendee_count(event.id), 0);
//! ```

use chrono::{DateTime, Utc};
use rsvp_core::environment::Clock;

mod in_memory_store;

pub use in_memory_store::{FailPoint, InMemoryResponseStore};

/// Mock implementations of environment traits and collaborators.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use rsvp_core::access::AccessPolicy;
    use rsvp_core::store::BoxFuture;
    use rsvp_core::{GroupId, Result, RsvpError, UserId};
    use std::collections::HashSet;
    use std::sync::{Mutex, PoisonError, RwLock};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use rsvp_testing::mocks::FixedClock;
    /// use rsvp_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that advances by a fixed step on every read.
    ///
    /// Responses written through the engine get strictly increasing
    /// `created_at` values, so FIFO order equals submission order.
    #[derive(Debug)]
    pub struct SteppingClock {
        next: Mutex<DateTime<Utc>>,
        step: chrono::Duration,
    }

    impl SteppingClock {
        /// Start at `start`, advancing by `step` after each `now()`
        #[must_use]
        pub const fn new(start: DateTime<Utc>, step: chrono::Duration) -> Self {
            Self {
                next: Mutex::new(start),
                step,
            }
        }

        /// Move the clock forward without reading it
        pub fn advance(&self, by: chrono::Duration) {
            let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
            *next += by;
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
            let now = *next;
            *next += self.step;
            now
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(super::helpers::base_time())
    }

    /// Stepping clock starting at [`test_clock`]'s time, one second per read
    #[must_use]
    pub fn stepping_clock() -> SteppingClock {
        SteppingClock::new(super::helpers::base_time(), chrono::Duration::seconds(1))
    }

    /// Group membership backed by a fixed set of `(group, user)` pairs.
    ///
    /// Can be switched into a failing mode to exercise persistence errors
    /// raised by the access collaborator.
    #[derive(Debug, Default)]
    pub struct StaticAccessPolicy {
        members: RwLock<HashSet<(GroupId, UserId)>>,
        failing: RwLock<bool>,
    }

    impl StaticAccessPolicy {
        /// Policy with no memberships
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Add `user_id` to `group_id`
        #[must_use]
        pub fn with_member(self, group_id: GroupId, user_id: UserId) -> Self {
            self.grant(group_id, user_id);
            self
        }

        /// Add `user_id` to `group_id`
        pub fn grant(&self, group_id: GroupId, user_id: UserId) {
            self.members
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert((group_id, user_id));
        }

        /// Remove `user_id` from `group_id`
        pub fn revoke(&self, group_id: GroupId, user_id: UserId) {
            self.members
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&(group_id, user_id));
        }

        /// Make every membership lookup fail
        pub fn set_failing(&self, failing: bool) {
            *self.failing.write().unwrap_or_else(PoisonError::into_inner) = failing;
        }
    }

    impl AccessPolicy for StaticAccessPolicy {
        fn is_member(&self, group_id: GroupId, user_id: UserId) -> BoxFuture<'_, Result<bool>> {
            let failing = *self.failing.read().unwrap_or_else(PoisonError::into_inner);
            let member = self
                .members
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(&(group_id, user_id));

            Box::pin(async move {
                if failing {
                    return Err(RsvpError::Persistence(
                        "membership lookup unavailable".to_string(),
                    ));
                }
                Ok(member)
            })
        }
    }
}

/// Fixture builders for events and responses.
pub mod helpers {
    use super::{DateTime, Utc};
    use rsvp_core::{Capacity, Event, EventId, EventResponse, GroupId, UserId};

    /// 2025-01-01 00:00:00 UTC, the epoch of every test clock
    #[must_use]
    pub fn base_time() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default()
    }

    /// Public event starting a week after [`base_time`]
    #[must_use]
    pub fn upcoming_event(capacity: Capacity) -> Event {
        Event::new(EventId::new(), capacity, base_time() + chrono::Duration::days(7))
    }

    /// Public event that started a day before [`base_time`]
    #[must_use]
    pub fn past_event(capacity: Capacity) -> Event {
        Event::new(EventId::new(), capacity, base_time() - chrono::Duration::days(1))
    }

    /// Group-restricted event starting a week after [`base_time`]
    #[must_use]
    pub fn group_event(capacity: Capacity, group_id: GroupId) -> Event {
        upcoming_event(capacity).with_group(group_id)
    }

    /// Stored response created `offset_secs` after [`base_time`]
    #[must_use]
    pub fn response(
        event_id: EventId,
        attendee_count: u32,
        on_waitlist: bool,
        offset_secs: i64,
    ) -> EventResponse {
        let at = base_time() + chrono::Duration::seconds(offset_secs);
        EventResponse {
            event_id,
            user_id: UserId::new(),
            attendee_count,
            on_waitlist,
            created_at: at,
            updated_at: at,
        }
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, StaticAccessPolicy, SteppingClock, stepping_clock, test_clock};
