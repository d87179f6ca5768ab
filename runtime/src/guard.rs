//! Admission guard: serializes read-modify-write sequences per event.
//!
//! Two submissions to the same event must never both observe the same
//! `spots_left`. The guard hands out an [`AdmissionPermit`] per event (or one
//! process-wide permit with [`LockScope::Global`]); the runtime holds it from
//! before the transaction begins until after it commits or rolls back.
//!
//! Per-event locks live in a table keyed by [`EventId`]. An entry is created on
//! first use and removed when the last permit for that event is released, so
//! the table only ever holds events with in-flight mutations.

use crate::config::LockScope;
use rsvp_core::EventId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockTable = Mutex<HashMap<EventId, Arc<AsyncMutex<()>>>>;

/// Hands out exclusive admission permits.
#[derive(Debug)]
pub struct AdmissionGuard {
    scope: LockScope,
    global: Arc<AsyncMutex<()>>,
    events: Arc<LockTable>,
}

/// Exclusive right to mutate one event (or every event, under a global guard).
///
/// Released on drop.
#[derive(Debug)]
#[must_use = "the permit is released as soon as it is dropped"]
pub struct AdmissionPermit {
    guard: Option<OwnedMutexGuard<()>>,
    release: Option<(Arc<LockTable>, EventId)>,
}

impl AdmissionGuard {
    /// Create a guard with the given scope
    #[must_use]
    pub fn new(scope: LockScope) -> Self {
        Self {
            scope,
            global: Arc::new(AsyncMutex::new(())),
            events: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Lock scope this guard was built with
    #[must_use]
    pub const fn scope(&self) -> LockScope {
        self.scope
    }

    /// Wait until no other permit covers `event_id`, then take one.
    pub async fn acquire(&self, event_id: EventId) -> AdmissionPermit {
        match self.scope {
            LockScope::Global => AdmissionPermit {
                guard: Some(Arc::clone(&self.global).lock_owned().await),
                release: None,
            },
            LockScope::PerEvent => {
                let lock = {
                    let mut table = self.events.lock().unwrap_or_else(PoisonError::into_inner);
                    Arc::clone(table.entry(event_id).or_default())
                };
                let guard = lock.lock_owned().await;
                tracing::trace!(%event_id, "Acquired admission permit");

                AdmissionPermit {
                    guard: Some(guard),
                    release: Some((Arc::clone(&self.events), event_id)),
                }
            }
        }
    }

    /// Number of events with a held or awaited permit
    #[must_use]
    pub fn tracked_events(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for AdmissionGuard {
    fn default() -> Self {
        Self::new(LockScope::default())
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        let Some((table, event_id)) = self.release.take() else {
            return;
        };

        // Hold the table lock while releasing so no waiter can clone the entry
        // between the release and the strong-count check.
        let mut table = table.lock().unwrap_or_else(PoisonError::into_inner);
        drop(self.guard.take());

        if table
            .get(&event_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            table.remove(&event_id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    const SHORT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_same_event_is_exclusive() {
        let guard = AdmissionGuard::new(LockScope::PerEvent);
        let event_id = EventId::new();

        let permit = guard.acquire(event_id).await;
        assert!(timeout(SHORT, guard.acquire(event_id)).await.is_err());

        drop(permit);
        assert!(timeout(SHORT, guard.acquire(event_id)).await.is_ok());
    }

    #[tokio::test]
    async fn test_different_events_run_in_parallel() {
        let guard = AdmissionGuard::new(LockScope::PerEvent);

        let _first = guard.acquire(EventId::new()).await;
        assert!(timeout(SHORT, guard.acquire(EventId::new())).await.is_ok());
    }

    #[tokio::test]
    async fn test_global_scope_blocks_every_event() {
        let guard = AdmissionGuard::new(LockScope::Global);

        let _first = guard.acquire(EventId::new()).await;
        assert!(timeout(SHORT, guard.acquire(EventId::new())).await.is_err());
        assert_eq!(guard.tracked_events(), 0);
    }

    #[tokio::test]
    async fn test_released_events_leave_the_table() {
        let guard = AdmissionGuard::new(LockScope::PerEvent);
        let event_id = EventId::new();

        let permit = guard.acquire(event_id).await;
        assert_eq!(guard.tracked_events(), 1);

        drop(permit);
        assert_eq!(guard.tracked_events(), 0);
    }

    #[tokio::test]
    async fn test_entry_survives_while_a_waiter_is_queued() {
        let guard = Arc::new(AdmissionGuard::new(LockScope::PerEvent));
        let event_id = EventId::new();
        let permit = guard.acquire(event_id).await;

        let waiter = {
            let guard = Arc::clone(&guard);
            tokio::spawn(async move {
                let _permit = guard.acquire(event_id).await;
            })
        };
        // Let the waiter register on the lock
        tokio::time::sleep(SHORT).await;

        drop(permit);
        assert_eq!(guard.tracked_events(), 1);

        waiter.await.unwrap();
        assert_eq!(guard.tracked_events(), 0);
    }
}
