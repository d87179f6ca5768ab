//! In-memory persistence for fast, deterministic engine tests.
//!
//! [`InMemoryResponseStore`] implements [`ResponseStore`] with real
//! transaction semantics: a transaction works on a private copy of the
//! tables, and only [`commit`](ResponseTransaction::commit) publishes the
//! events it wrote. Dropping or rolling back a transaction discards the copy.
//!
//! Commit publishes whole events (the event row plus all of its responses),
//! which is correct as long as writers to one event are serialized, as the
//! engine's admission guard does.

use rsvp_core::reconcile;
use rsvp_core::store::{BoxFuture, ResponseStore, ResponseTransaction, ResponseUpsert};
use rsvp_core::{
    Capacity, Event, EventId, EventResponse, Result, RsvpError, StatusChange, UserId,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Store operation at which a failure can be injected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// [`ResponseStore::begin`]
    Begin,
    /// [`ResponseTransaction::get_event`]
    GetEvent,
    /// [`ResponseTransaction::get_user_response`]
    GetUserResponse,
    /// [`ResponseTransaction::upsert_response`]
    Upsert,
    /// [`ResponseTransaction::delete_response`]
    Delete,
    /// [`ResponseTransaction::list_responses`]
    ListResponses,
    /// [`ResponseTransaction::update_waitlist_flags`]
    UpdateWaitlistFlags,
    /// [`ResponseTransaction::update_capacity`]
    UpdateCapacity,
    /// [`ResponseTransaction::commit`]
    Commit,
}

#[derive(Clone, Debug, Default)]
struct Tables {
    events: HashMap<EventId, Event>,
    responses: HashMap<EventId, BTreeMap<UserId, EventResponse>>,
}

impl Tables {
    /// Event row with its confirmed count derived from the responses.
    fn event(&self, event_id: EventId) -> Option<Event> {
        let mut event = self.events.get(&event_id)?.clone();
        event.confirmed_attendee_count = self
            .responses
            .get(&event_id)
            .map_or(0, |rows| {
                rows.values()
                    .filter(|r| !r.on_waitlist)
                    .map(|r| r.attendee_count)
                    .sum()
            });
        Some(event)
    }

    fn live_event(&self, event_id: EventId) -> Result<Event> {
        self.event(event_id)
            .filter(|event| !event.is_deleted)
            .ok_or(RsvpError::NotFound { event_id })
    }

    fn responses(&self, event_id: EventId) -> Vec<EventResponse> {
        let mut rows: Vec<EventResponse> = self
            .responses
            .get(&event_id)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default();
        reconcile::sort_fifo(&mut rows);
        rows
    }

    fn response(&self, event_id: EventId, user_id: UserId) -> Option<EventResponse> {
        self.responses.get(&event_id)?.get(&user_id).cloned()
    }
}

#[derive(Debug, Default)]
struct Inner {
    tables: RwLock<Tables>,
    failures: RwLock<HashSet<FailPoint>>,
    begun: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

impl Inner {
    fn check(&self, point: FailPoint) -> Result<()> {
        if self
            .failures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&point)
        {
            return Err(RsvpError::Persistence(format!(
                "injected failure at {point:?}"
            )));
        }
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        f(&self.tables.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        f(&mut self.tables.write().unwrap_or_else(PoisonError::into_inner))
    }
}

/// In-memory [`ResponseStore`] with transactions and fault injection.
///
/// # Example
///
/// ```
/// use rsvp_testing::{helpers, FailPoint, InMemoryResponseStore};
/// use rsvp_core::store::ResponseStore;
/// use rsvp_core::Capacity;
///
/// # async fn example() -> rsvp_core::Result<()> {
/// let store = InMemoryResponseStore::new();
/// let event = helpers::upcoming_event(Capacity::new(10));
/// store.insert_event(event.clone());
///
/// let mut tx = store.begin().await?;
/// assert_eq!(tx.get_event(event.id).await?.capacity, Capacity::new(10));
/// tx.rollback().await?;
///
/// store.fail_on(FailPoint::Begin);
/// assert!(store.begin().await.is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryResponseStore {
    inner: Arc<Inner>,
}

impl InMemoryResponseStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an event row. Its `confirmed_attendee_count` is ignored;
    /// the store always derives it from the responses.
    pub fn insert_event(&self, event: Event) {
        self.inner.write(|tables| {
            tables.events.insert(event.id, event);
        });
    }

    /// Insert or replace a response row as-is, bypassing admission.
    pub fn insert_response(&self, response: EventResponse) {
        self.inner.write(|tables| {
            tables
                .responses
                .entry(response.event_id)
                .or_default()
                .insert(response.user_id, response);
        });
    }

    /// Change an event's capacity directly, the way an out-of-band edit would.
    ///
    /// Does not reconcile; follow up with the engine's capacity-changed hook.
    pub fn set_capacity(&self, event_id: EventId, capacity: Capacity) {
        self.inner.write(|tables| {
            if let Some(event) = tables.events.get_mut(&event_id) {
                event.capacity = capacity;
            }
        });
    }

    /// Soft-delete an event.
    pub fn soft_delete(&self, event_id: EventId) {
        self.inner.write(|tables| {
            if let Some(event) = tables.events.get_mut(&event_id) {
                event.is_deleted = true;
            }
        });
    }

    /// Committed event row (deleted or not) with its derived confirmed count.
    #[must_use]
    pub fn event(&self, event_id: EventId) -> Option<Event> {
        self.inner.read(|tables| tables.event(event_id))
    }

    /// Committed responses of an event in FIFO order.
    #[must_use]
    pub fn responses(&self, event_id: EventId) -> Vec<EventResponse> {
        self.inner.read(|tables| tables.responses(event_id))
    }

    /// Committed response of one user.
    #[must_use]
    pub fn response(&self, event_id: EventId, user_id: UserId) -> Option<EventResponse> {
        self.inner.read(|tables| tables.response(event_id, user_id))
    }

    /// Committed sum of confirmed attendee counts.
    #[must_use]
    pub fn confirmed_attendee_count(&self, event_id: EventId) -> u32 {
        self.inner
            .read(|tables| reconcile::confirmed_attendee_count(&tables.responses(event_id)))
    }

    /// Make `point` fail until [`clear_failures`](Self::clear_failures).
    pub fn fail_on(&self, point: FailPoint) {
        self.inner
            .failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(point);
    }

    /// Remove every injected failure.
    pub fn clear_failures(&self) {
        self.inner
            .failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Transactions opened so far
    #[must_use]
    pub fn begin_count(&self) -> usize {
        self.inner.begun.load(Ordering::SeqCst)
    }

    /// Transactions committed so far
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.inner.commits.load(Ordering::SeqCst)
    }

    /// Transactions explicitly rolled back so far
    #[must_use]
    pub fn rollback_count(&self) -> usize {
        self.inner.rollbacks.load(Ordering::SeqCst)
    }
}

impl ResponseStore for InMemoryResponseStore {
    fn begin(&self) -> BoxFuture<'_, Result<Box<dyn ResponseTransaction>>> {
        Box::pin(async move {
            self.inner.check(FailPoint::Begin)?;
            self.inner.begun.fetch_add(1, Ordering::SeqCst);

            let working = self.inner.read(Clone::clone);
            Ok(Box::new(InMemoryTransaction {
                inner: Arc::clone(&self.inner),
                working,
                touched: HashSet::new(),
            }) as Box<dyn ResponseTransaction>)
        })
    }
}

struct InMemoryTransaction {
    inner: Arc<Inner>,
    working: Tables,
    touched: HashSet<EventId>,
}

impl ResponseTransaction for InMemoryTransaction {
    fn get_event(&mut self, event_id: EventId) -> BoxFuture<'_, Result<Event>> {
        let result = self
            .inner
            .check(FailPoint::GetEvent)
            .and_then(|()| self.working.live_event(event_id));
        Box::pin(async move { result })
    }

    fn get_user_response(
        &mut self,
        event_id: EventId,
        user_id: UserId,
    ) -> BoxFuture<'_, Result<Option<EventResponse>>> {
        let result = self
            .inner
            .check(FailPoint::GetUserResponse)
            .map(|()| self.working.response(event_id, user_id));
        Box::pin(async move { result })
    }

    fn upsert_response(&mut self, upsert: ResponseUpsert) -> BoxFuture<'_, Result<()>> {
        let result = self.inner.check(FailPoint::Upsert).map(|()| {
            let rows = self.working.responses.entry(upsert.event_id).or_default();
            rows.entry(upsert.user_id)
                .and_modify(|row| {
                    row.attendee_count = upsert.attendee_count;
                    row.on_waitlist = upsert.on_waitlist;
                    row.updated_at = upsert.now;
                })
                .or_insert_with(|| EventResponse {
                    event_id: upsert.event_id,
                    user_id: upsert.user_id,
                    attendee_count: upsert.attendee_count,
                    on_waitlist: upsert.on_waitlist,
                    created_at: upsert.now,
                    updated_at: upsert.now,
                });
            self.touched.insert(upsert.event_id);
        });
        Box::pin(async move { result })
    }

    fn delete_response(
        &mut self,
        event_id: EventId,
        user_id: UserId,
    ) -> BoxFuture<'_, Result<()>> {
        let result = self.inner.check(FailPoint::Delete).map(|()| {
            if let Some(rows) = self.working.responses.get_mut(&event_id) {
                rows.remove(&user_id);
            }
            self.touched.insert(event_id);
        });
        Box::pin(async move { result })
    }

    fn list_responses(&mut self, event_id: EventId) -> BoxFuture<'_, Result<Vec<EventResponse>>> {
        let result = self
            .inner
            .check(FailPoint::ListResponses)
            .map(|()| self.working.responses(event_id));
        Box::pin(async move { result })
    }

    fn update_waitlist_flags(&mut self, changes: Vec<StatusChange>) -> BoxFuture<'_, Result<()>> {
        let result = self.inner.check(FailPoint::UpdateWaitlistFlags).map(|()| {
            for change in changes {
                if let Some(row) = self
                    .working
                    .responses
                    .get_mut(&change.event_id)
                    .and_then(|rows| rows.get_mut(&change.user_id))
                {
                    row.on_waitlist = change.on_waitlist;
                }
                self.touched.insert(change.event_id);
            }
        });
        Box::pin(async move { result })
    }

    fn update_capacity(
        &mut self,
        event_id: EventId,
        capacity: Capacity,
    ) -> BoxFuture<'_, Result<()>> {
        let result = self.inner.check(FailPoint::UpdateCapacity).and_then(|()| {
            match self.working.events.get_mut(&event_id) {
                Some(event) if !event.is_deleted => {
                    event.capacity = capacity;
                    self.touched.insert(event_id);
                    Ok(())
                }
                _ => Err(RsvpError::NotFound { event_id }),
            }
        });
        Box::pin(async move { result })
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move {
            let Self {
                inner,
                mut working,
                touched,
            } = *self;
            inner.check(FailPoint::Commit)?;

            inner.write(|tables| {
                for event_id in touched {
                    if let Some(event) = working.events.remove(&event_id) {
                        tables.events.insert(event_id, event);
                    }
                    match working.responses.remove(&event_id) {
                        Some(rows) => {
                            tables.responses.insert(event_id, rows);
                        }
                        None => {
                            tables.responses.remove(&event_id);
                        }
                    }
                }
            });
            inner.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn rollback(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move {
            self.inner.rollbacks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}
