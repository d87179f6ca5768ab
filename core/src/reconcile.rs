//! Waitlist reconciliation.
//!
//! The confirmed/waitlisted partition of an event is a pure function of its
//! capacity and its responses in FIFO order:
//!
//! ```text
//! running = 0
//! for response in responses ordered by created_at:
//!     running += response.attendee_count
//!     response.on_waitlist = running > capacity
//! ```
//!
//! [`plan`] compares that partition with the stored flags and returns only the
//! rows that differ. Applying the plan and planning again yields nothing, so
//! reconciliation can run after any mutation without side effects of its own.

use crate::types::{Capacity, EventResponse, StatusChange};
use smallvec::SmallVec;
use std::cmp::Ordering;

/// Status changes produced by one reconciliation (usually a handful).
pub type StatusChanges = SmallVec<[StatusChange; 4]>;

/// FIFO order: `created_at` ascending, ties broken by `user_id`.
///
/// Every store must return responses in this order so the partition is the
/// same no matter which store computed it.
#[must_use]
pub fn fifo_order(a: &EventResponse, b: &EventResponse) -> Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.user_id.cmp(&b.user_id))
}

/// Sort responses into FIFO order in place.
pub fn sort_fifo(responses: &mut [EventResponse]) {
    responses.sort_by(fifo_order);
}

/// Compute the status changes that bring `responses` in line with `capacity`.
///
/// `responses` must already be in FIFO order (see [`sort_fifo`]).
#[must_use]
pub fn plan(capacity: Capacity, responses: &[EventResponse]) -> StatusChanges {
    let capacity = u64::from(capacity.value());
    let mut running: u64 = 0;

    responses
        .iter()
        .filter_map(|response| {
            running += u64::from(response.attendee_count);
            let on_waitlist = running > capacity;

            (on_waitlist != response.on_waitlist).then_some(StatusChange {
                event_id: response.event_id,
                user_id: response.user_id,
                on_waitlist,
            })
        })
        .collect()
}

/// Apply status changes to an in-memory response list.
pub fn apply(responses: &mut [EventResponse], changes: &[StatusChange]) {
    for change in changes {
        if let Some(response) = responses
            .iter_mut()
            .find(|r| r.event_id == change.event_id && r.user_id == change.user_id)
        {
            response.on_waitlist = change.on_waitlist;
        }
    }
}

/// Sum of `attendee_count` over confirmed responses.
#[must_use]
pub fn confirmed_attendee_count(responses: &[EventResponse]) -> u32 {
    responses
        .iter()
        .filter(|r| !r.on_waitlist)
        .map(|r| r.attendee_count)
        .sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;
    use crate::types::{EventId, UserId};
    use chrono::{DateTime, Duration, Utc};
    use proptest::prelude::*;

    fn base_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    /// Responses created one second apart, in the given (count, on_waitlist) order.
    fn responses(event_id: EventId, rows: &[(u32, bool)]) -> Vec<EventResponse> {
        rows.iter()
            .enumerate()
            .map(|(i, &(attendee_count, on_waitlist))| {
                let at = base_time() + Duration::seconds(i64::try_from(i).unwrap());
                EventResponse {
                    event_id,
                    user_id: UserId::new(),
                    attendee_count,
                    on_waitlist,
                    created_at: at,
                    updated_at: at,
                }
            })
            .collect()
    }

    #[test]
    fn test_consistent_partition_needs_no_changes() {
        let rows = responses(EventId::new(), &[(1, false), (1, false), (1, true)]);

        assert!(plan(Capacity::new(2), &rows).is_empty());
    }

    #[test]
    fn test_capacity_increase_promotes_earliest() {
        let rows = responses(EventId::new(), &[(1, false), (1, true), (1, true)]);

        let changes = plan(Capacity::new(2), &rows);

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].user_id, rows[1].user_id);
        assert!(changes[0].is_promotion());
    }

    #[test]
    fn test_capacity_decrease_demotes_latest() {
        let rows = responses(EventId::new(), &[(1, false), (2, false)]);

        let changes = plan(Capacity::new(2), &rows);

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].user_id, rows[1].user_id);
        assert!(changes[0].on_waitlist);
    }

    #[test]
    fn test_withdrawal_gap_promotes_next_in_line() {
        // u2 withdrew: [u1 confirmed, u3 waitlisted, u4 waitlisted], capacity 2
        let rows = responses(EventId::new(), &[(1, false), (1, true), (1, true)]);

        let changes = plan(Capacity::new(2), &rows);

        assert_eq!(changes.as_slice(), &[StatusChange {
            event_id: rows[1].event_id,
            user_id: rows[1].user_id,
            on_waitlist: false,
        }]);
    }

    #[test]
    fn test_running_sum_includes_waitlisted_rows() {
        // Once the running sum passes capacity every later row is waitlisted,
        // even a single attendee that would fit in the remaining spot.
        let rows = responses(EventId::new(), &[(1, false), (2, true), (1, false)]);

        let changes = plan(Capacity::new(2), &rows);

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].user_id, rows[2].user_id);
        assert!(changes[0].on_waitlist);
    }

    #[test]
    fn test_sort_fifo_breaks_ties_by_user() {
        let event_id = EventId::new();
        let mut rows = responses(event_id, &[(1, false), (1, false), (1, false)]);
        for row in &mut rows {
            row.created_at = base_time();
        }
        let mut expected: Vec<UserId> = rows.iter().map(|r| r.user_id).collect();
        expected.sort();

        rows.reverse();
        sort_fifo(&mut rows);

        let actual: Vec<UserId> = rows.iter().map(|r| r.user_id).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_apply_and_confirmed_count() {
        let mut rows = responses(EventId::new(), &[(2, false), (1, false), (1, true)]);
        assert_eq!(confirmed_attendee_count(&rows), 3);

        let changes = plan(Capacity::new(2), &rows);
        apply(&mut rows, &changes);

        assert_eq!(confirmed_attendee_count(&rows), 2);
        assert!(rows[1].on_waitlist);
    }

    fn rows_strategy() -> impl Strategy<Value = Vec<(u32, bool)>> {
        prop::collection::vec((1u32..=3, any::<bool>()), 0..40)
    }

    proptest! {
        #[test]
        fn prop_reconciliation_is_idempotent(rows in rows_strategy(), capacity in 1u32..20) {
            let mut rows = responses(EventId::new(), &rows);
            let changes = plan(Capacity::new(capacity), &rows);
            apply(&mut rows, &changes);

            prop_assert!(plan(Capacity::new(capacity), &rows).is_empty());
        }

        #[test]
        fn prop_reconciled_events_never_exceed_capacity(rows in rows_strategy(), capacity in 1u32..20) {
            let mut rows = responses(EventId::new(), &rows);
            let changes = plan(Capacity::new(capacity), &rows);
            apply(&mut rows, &changes);

            prop_assert!(confirmed_attendee_count(&rows) <= capacity);
        }

        #[test]
        fn prop_confirmed_responses_form_a_fifo_prefix(rows in rows_strategy(), capacity in 1u32..20) {
            let mut rows = responses(EventId::new(), &rows);
            let changes = plan(Capacity::new(capacity), &rows);
            apply(&mut rows, &changes);

            let first_waitlisted = rows.iter().position(|r| r.on_waitlist).unwrap_or(rows.len());
            prop_assert!(rows[first_waitlisted..].iter().all(|r| r.on_waitlist));
        }

        #[test]
        fn prop_only_differing_rows_are_reported(rows in rows_strategy(), capacity in 1u32..20) {
            let rows = responses(EventId::new(), &rows);
            let changes = plan(Capacity::new(capacity), &rows);

            for change in &changes {
                let stored = rows.iter().find(|r| r.user_id == change.user_id).unwrap();
                prop_assert_ne!(stored.on_waitlist, change.on_waitlist);
            }
        }
    }
}
