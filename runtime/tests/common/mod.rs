//! Shared harness for `RsvpService` integration tests.

#![allow(dead_code)] // Not every test binary uses every helper
#![allow(clippy::expect_used)]

use rsvp_core::{Capacity, Event, EventId, ResponseStatus, UserId};
use rsvp_runtime::{EngineConfig, RespondRequest, RsvpService};
use rsvp_testing::{InMemoryResponseStore, StaticAccessPolicy, helpers, stepping_clock};
use std::sync::Arc;

pub struct Harness {
    pub service: RsvpService,
    pub store: InMemoryResponseStore,
    pub access: Arc<StaticAccessPolicy>,
    pub event: Event,
}

impl Harness {
    pub fn new(capacity: u32) -> Self {
        Self::with_config(capacity, EngineConfig::default())
    }

    pub fn with_config(capacity: u32, config: EngineConfig) -> Self {
        let event = helpers::upcoming_event(Capacity::new(capacity));
        Self::with_event(event, config)
    }

    pub fn with_event(event: Event, config: EngineConfig) -> Self {
        let store = InMemoryResponseStore::new();
        store.insert_event(event.clone());
        let access = Arc::new(StaticAccessPolicy::new());

        let service = RsvpService::new(
            Arc::new(store.clone()),
            access.clone(),
            Arc::new(stepping_clock()),
            config,
        );

        Self {
            service,
            store,
            access,
            event,
        }
    }

    pub fn event_id(&self) -> EventId {
        self.event.id
    }

    pub fn request(&self, user_id: UserId, attendee_count: i32) -> RespondRequest {
        RespondRequest {
            event_id: self.event.id,
            user_id,
            attendee_count,
        }
    }

    /// Submit a response that must be accepted.
    pub async fn respond(&self, user_id: UserId, attendee_count: i32) -> ResponseStatus {
        self.service
            .handle_response(self.request(user_id, attendee_count))
            .await
            .expect("response should be accepted")
            .current
    }

    /// Committed status of one user's response.
    pub fn status(&self, user_id: UserId) -> ResponseStatus {
        ResponseStatus::of(self.store.response(self.event.id, user_id).as_ref())
    }

    pub fn confirmed(&self) -> u32 {
        self.store.confirmed_attendee_count(self.event.id)
    }
}

/// `n` fresh user ids
pub fn users(n: usize) -> Vec<UserId> {
    (0..n).map(|_| UserId::new()).collect()
}
