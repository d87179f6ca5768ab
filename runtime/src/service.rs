//! The RSVP service: admission and reconciliation inside a guarded transaction.
//!
//! Every mutating entry point follows the same shape:
//!
//! ```text
//! validate request ─▶ acquire permit ─▶ begin ─▶ read / decide / write ─▶ commit
//!                                          └──────── any error ─────────▶ rollback
//! ```
//!
//! The permit is held until the transaction has committed or rolled back, so
//! no other mutation of the same event can observe a stale `spots_left`.

use crate::config::EngineConfig;
use crate::guard::AdmissionGuard;
use crate::metrics::RsvpMetrics;
use rsvp_core::access::{self, AccessPolicy};
use rsvp_core::admission::{self, ResponseWrite};
use rsvp_core::environment::Clock;
use rsvp_core::reconcile::{self, StatusChanges};
use rsvp_core::store::{ResponseStore, ResponseTransaction, ResponseUpsert};
use rsvp_core::{
    Capacity, EventDetail, EventId, ResponseStatus, Result, RsvpError, UserId, ValidationError,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A user's attendance submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RespondRequest {
    /// Event responded to
    pub event_id: EventId,
    /// Responding user
    pub user_id: UserId,
    /// People attending including the user; `0` withdraws
    pub attendee_count: i32,
}

/// What a successful submission did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseOutcome {
    /// Caller's status before the submission
    pub previous: ResponseStatus,
    /// Caller's status after the submission
    pub current: ResponseStatus,
    /// Change in the caller's attendee count
    pub delta: i64,
    /// Other responses promoted or demoted as a consequence
    pub status_changes: StatusChanges,
}

/// Capacity allocation and waitlist engine.
///
/// Cheap to clone; clones share the store, the access policy and the admission
/// guard.
///
/// # Example
///
/// ```ignore
/// let service = RsvpService::new(store, access, clock, EngineConfig::from_env());
///
/// let outcome = service
///     .handle_response(RespondRequest { event_id, user_id, attendee_count: 1 })
///     .await?;
///
/// if outcome.current == ResponseStatus::Waitlisted {
///     // tell the user they are queued
/// }
/// ```
#[derive(Clone)]
pub struct RsvpService {
    store: Arc<dyn ResponseStore>,
    access: Arc<dyn AccessPolicy>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    guard: Arc<AdmissionGuard>,
}

impl RsvpService {
    /// Create a service over the given collaborators
    #[must_use]
    pub fn new(
        store: Arc<dyn ResponseStore>,
        access: Arc<dyn AccessPolicy>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            access,
            clock,
            config,
            guard: Arc::new(AdmissionGuard::new(config.lock_scope)),
        }
    }

    /// Configuration the service was built with
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Submit, change or withdraw (`attendee_count == 0`) a response.
    ///
    /// # Errors
    ///
    /// - [`RsvpError::Validation`] for a negative count, too many plus-ones, or
    ///   plus-ones on a response that would be waitlisted
    /// - [`RsvpError::NotFound`] if the event is missing or soft-deleted
    /// - [`RsvpError::PastEvent`] if the event has started
    /// - [`RsvpError::AccessDenied`] if the user cannot see the event
    /// - [`RsvpError::Persistence`] if the store fails; nothing was written
    #[tracing::instrument(
        skip(self, request),
        name = "rsvp_handle_response",
        fields(
            event_id = %request.event_id,
            user_id = %request.user_id,
            attendee_count = request.attendee_count,
        )
    )]
    pub async fn handle_response(&self, request: RespondRequest) -> Result<ResponseOutcome> {
        let started = Instant::now();

        match self.respond(request).await {
            Ok(outcome) => {
                RsvpMetrics::record_response(outcome.current, started.elapsed());
                info!(
                    previous = %outcome.previous,
                    current = %outcome.current,
                    delta = outcome.delta,
                    status_changes = outcome.status_changes.len(),
                    "Response recorded"
                );
                Ok(outcome)
            }
            Err(error) => {
                RsvpMetrics::record_rejection(error.kind());
                info!(%error, kind = error.kind().as_str(), "Response rejected");
                Err(error)
            }
        }
    }

    /// Reconcile an event whose capacity was persisted by the caller.
    ///
    /// Returns the responses whose waitlist flag changed.
    ///
    /// # Errors
    ///
    /// - [`RsvpError::NotFound`] if the event is missing or soft-deleted
    /// - [`RsvpError::Persistence`] if the store fails; nothing was written
    #[tracing::instrument(skip(self), name = "rsvp_on_capacity_changed", fields(%event_id))]
    pub async fn on_capacity_changed(&self, event_id: EventId) -> Result<StatusChanges> {
        let _permit = self.guard.acquire(event_id).await;
        let mut tx = self.store.begin().await?;

        let result = async {
            let event = tx.get_event(event_id).await?;
            reconcile_event(tx.as_mut(), event_id, event.capacity).await
        }
        .await;

        let changes = finish(tx, result).await?;
        info!(status_changes = changes.len(), "Capacity change reconciled");
        Ok(changes)
    }

    /// Persist a new capacity and reconcile the event in one transaction.
    ///
    /// Returns the responses whose waitlist flag changed.
    ///
    /// # Errors
    ///
    /// - [`RsvpError::Validation`] if `capacity` is zero
    /// - [`RsvpError::NotFound`] if the event is missing or soft-deleted
    /// - [`RsvpError::Persistence`] if the store fails; nothing was written
    #[tracing::instrument(skip(self), name = "rsvp_change_capacity", fields(%event_id, %capacity))]
    pub async fn change_capacity(
        &self,
        event_id: EventId,
        capacity: Capacity,
    ) -> Result<StatusChanges> {
        if capacity.value() == 0 {
            return Err(RsvpError::from(ValidationError::NonPositiveCapacity));
        }

        let _permit = self.guard.acquire(event_id).await;
        let mut tx = self.store.begin().await?;

        let result = async {
            let event = tx.get_event(event_id).await?;
            debug!(old_capacity = %event.capacity, "Updating capacity");
            tx.update_capacity(event_id, capacity).await?;
            reconcile_event(tx.as_mut(), event_id, capacity).await
        }
        .await;

        let changes = finish(tx, result).await?;
        info!(status_changes = changes.len(), "Capacity changed");
        Ok(changes)
    }

    /// Event snapshot, all responses in FIFO order, and the caller's own response.
    ///
    /// Reads inside a transaction that is always rolled back.
    ///
    /// # Errors
    ///
    /// - [`RsvpError::NotFound`] if the event is missing or soft-deleted
    /// - [`RsvpError::AccessDenied`] if the user cannot see the event
    /// - [`RsvpError::Persistence`] if the store fails
    #[tracing::instrument(skip(self), name = "rsvp_event_detail", fields(%event_id, %user_id))]
    pub async fn event_detail(&self, event_id: EventId, user_id: UserId) -> Result<EventDetail> {
        let mut tx = self.store.begin().await?;

        let result = async {
            let event = tx.get_event(event_id).await?;
            access::ensure_access(self.access.as_ref(), &event, user_id).await?;
            let responses = tx.list_responses(event_id).await?;
            let user_response = responses.iter().find(|r| r.user_id == user_id).cloned();

            Ok::<_, RsvpError>(EventDetail {
                event,
                responses,
                user_response,
            })
        }
        .await;

        if let Err(error) = tx.rollback().await {
            warn!(%error, "Failed to release read transaction");
        }
        result
    }

    async fn respond(&self, request: RespondRequest) -> Result<ResponseOutcome> {
        let attendee_count =
            admission::validate_attendee_count(request.attendee_count, self.config.max_attendee_count)?;

        let _permit = self.guard.acquire(request.event_id).await;
        let mut tx = self.store.begin().await?;

        let result = self
            .admit(tx.as_mut(), request.event_id, request.user_id, attendee_count)
            .await;

        finish(tx, result).await
    }

    async fn admit(
        &self,
        tx: &mut dyn ResponseTransaction,
        event_id: EventId,
        user_id: UserId,
        attendee_count: u32,
    ) -> Result<ResponseOutcome> {
        let event = tx.get_event(event_id).await?;
        let now = self.clock.now();
        admission::ensure_open(&event, now)?;
        access::ensure_access(self.access.as_ref(), &event, user_id).await?;

        let existing = tx.get_user_response(event_id, user_id).await?;
        let decision = admission::decide(&event, existing.as_ref(), attendee_count)?;
        debug!(
            delta = decision.delta,
            spots_left = event.spots_left(),
            previous = %decision.previous,
            next = %decision.next,
            "Admission decided"
        );

        match decision.write {
            ResponseWrite::Delete => tx.delete_response(event_id, user_id).await?,
            ResponseWrite::Upsert {
                attendee_count,
                on_waitlist,
            } => {
                tx.upsert_response(ResponseUpsert {
                    event_id,
                    user_id,
                    attendee_count,
                    on_waitlist,
                    now,
                })
                .await?;
            }
        }

        let status_changes = if decision.frees_confirmed_capacity {
            reconcile_event(tx, event_id, event.capacity).await?
        } else {
            StatusChanges::new()
        };

        Ok(ResponseOutcome {
            previous: decision.previous,
            current: decision.next,
            delta: decision.delta,
            status_changes,
        })
    }
}

/// Re-derive the waitlist of one event and write the flags that changed.
async fn reconcile_event(
    tx: &mut dyn ResponseTransaction,
    event_id: EventId,
    capacity: Capacity,
) -> Result<StatusChanges> {
    let responses = tx.list_responses(event_id).await?;
    let changes = reconcile::plan(capacity, &responses);

    if !changes.is_empty() {
        tx.update_waitlist_flags(changes.to_vec()).await?;
    }

    RsvpMetrics::record_reconciliation(&changes);
    debug!(
        %capacity,
        responses = responses.len(),
        promoted = changes.iter().filter(|c| c.is_promotion()).count(),
        demoted = changes.iter().filter(|c| !c.is_promotion()).count(),
        "Waitlist reconciled"
    );
    Ok(changes)
}

/// Commit on success; roll back and return the original error on failure.
async fn finish<T>(tx: Box<dyn ResponseTransaction>, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = tx.rollback().await {
                warn!(%error, %rollback_error, "Rollback failed");
            }
            Err(error)
        }
    }
}

impl std::fmt::Debug for RsvpService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsvpService")
            .field("config", &self.config)
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}
