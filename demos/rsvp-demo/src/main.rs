//! RSVP Demo - scripted admission scenario over `PostgreSQL`
//!
//! Seeds one event and walks it through the interesting transitions:
//! filling up, waitlisting, a withdrawal that promotes the next in line,
//! and a capacity cut that demotes the most recent attendee.
//!
//! # Running the Example
//!
//! ```bash
//! docker run -d -p 5432:5432 -e POSTGRES_PASSWORD=postgres -e POSTGRES_DB=rsvp postgres:16
//! cargo run -p rsvp-demo
//! ```
//!
//! Settings are read from the environment (or a `.env` file): `DATABASE_URL`,
//! `RSVP_MAX_ATTENDEE_COUNT`, `RSVP_LOCK_SCOPE`, `RUST_LOG`, `METRICS_HOST`,
//! `METRICS_PORT`.

#![allow(missing_docs)]

mod config;

use anyhow::Context;
use chrono::{Duration, Utc};
use config::Config;
use rsvp_core::environment::SystemClock;
use rsvp_core::{Capacity, Event, EventId, RsvpError, UserId};
use rsvp_postgres::{PostgresGroupAccess, PostgresResponseStore};
use rsvp_runtime::metrics::MetricsServer;
use rsvp_runtime::{RespondRequest, RsvpService};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // 1. Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.server.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        max_attendee_count = config.engine.max_attendee_count,
        lock_scope = %config.engine.lock_scope,
        "Starting RSVP demo"
    );

    // 2. Metrics recorder
    let mut metrics = MetricsServer::new(config.server.metrics_addr());
    metrics.start().context("Failed to start metrics")?;

    // 3. Storage
    let pool = config.postgres.connect().await?;
    let store = PostgresResponseStore::from_pool(pool.clone());
    store.migrate().await?;
    info!("✓ Database ready");

    let service = RsvpService::new(
        Arc::new(store.clone()),
        Arc::new(PostgresGroupAccess::new(pool)),
        Arc::new(SystemClock),
        config.engine,
    );

    // 4. Scenario
    let event = Event::new(EventId::new(), Capacity::new(3), Utc::now() + Duration::days(7));
    store.insert_event(&event).await?;
    info!(event_id = %event.id, capacity = event.capacity.value(), "✓ Event seeded");

    let users: Vec<UserId> = (0..5).map(|_| UserId::new()).collect();
    let script = [
        (users[0], 1),
        (users[1], 2),
        (users[2], 1),
        (users[3], 1),
        // Plus-ones are refused on the waitlist
        (users[4], 2),
        (users[4], 1),
        // Frees two spots for the two earliest waitlisted responses
        (users[1], 0),
    ];

    for (user_id, attendee_count) in script {
        let request = RespondRequest {
            event_id: event.id,
            user_id,
            attendee_count,
        };
        match service.handle_response(request).await {
            Ok(outcome) => info!(
                %user_id,
                attendee_count,
                previous = %outcome.previous,
                current = %outcome.current,
                promoted_or_demoted = outcome.status_changes.len(),
                "Response accepted"
            ),
            Err(RsvpError::Validation(reason)) => {
                warn!(%user_id, attendee_count, %reason, "Response refused");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let demoted = service.change_capacity(event.id, Capacity::new(2)).await?;
    info!(demoted = demoted.len(), "✓ Capacity reduced to 2");

    let detail = service.event_detail(event.id, users[0]).await?;
    info!(
        confirmed = detail.event.confirmed_attendee_count,
        capacity = detail.event.capacity.value(),
        attendees = detail.attendees().count(),
        waitlisted = detail.waitlist().count(),
        "Final state"
    );
    for (position, response) in detail.responses.iter().enumerate() {
        info!(
            position,
            user_id = %response.user_id,
            attendee_count = response.attendee_count,
            status = %response.status(),
            "  response"
        );
    }

    // 5. Metrics snapshot
    if let Some(text) = metrics.render() {
        println!("{text}");
    }

    info!("Demo complete");
    Ok(())
}
