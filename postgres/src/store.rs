//! `PostgreSQL` implementation of the Persistence Adapter.

use chrono::{DateTime, Utc};
use rsvp_core::store::{BoxFuture, ResponseStore, ResponseTransaction, ResponseUpsert};
use rsvp_core::{
    Capacity, Event, EventId, EventResponse, GroupId, Result, RsvpError, StatusChange, UserId,
};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

type EventRow = (Uuid, Option<Uuid>, i32, DateTime<Utc>, bool);
type ResponseRow = (Uuid, Uuid, i32, bool, DateTime<Utc>, DateTime<Utc>);

const RESPONSE_COLUMNS: &str =
    "event_id, user_id, attendee_count, on_waitlist, created_at, updated_at";

/// `PostgreSQL`-backed [`ResponseStore`].
///
/// # Example
///
/// ```no_run
/// use rsvp_postgres::PostgresResponseStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = PostgresResponseStore::connect("postgres://localhost/rsvp").await?;
/// store.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct PostgresResponseStore {
    pool: PgPool,
}

impl PostgresResponseStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with default pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`RsvpError::Persistence`] if the database is unreachable.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| RsvpError::persistence("Failed to connect", e))?;
        Ok(Self::from_pool(pool))
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns [`RsvpError::Persistence`] if migrations fail.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RsvpError::persistence("Migration failed", e))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert an event row.
    ///
    /// Event administration lives outside the engine; this exists for seeding
    /// and tests. The snapshot's `confirmed_attendee_count` is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RsvpError::Persistence`] if the insert fails.
    pub async fn insert_event(&self, event: &Event) -> Result<()> {
        sqlx::query(
            "INSERT INTO events (id, group_id, capacity, start_at, is_deleted)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(event.id.as_uuid())
        .bind(event.group_id.map(|g| *g.as_uuid()))
        .bind(to_db_count(event.capacity.value())?)
        .bind(event.start)
        .bind(event.is_deleted)
        .execute(&self.pool)
        .await
        .map_err(|e| RsvpError::persistence("Failed to insert event", e))?;

        Ok(())
    }

    /// Soft-delete an event.
    ///
    /// # Errors
    ///
    /// Returns [`RsvpError::Persistence`] if the update fails.
    pub async fn soft_delete_event(&self, event_id: EventId) -> Result<()> {
        sqlx::query("UPDATE events SET is_deleted = TRUE WHERE id = $1")
            .bind(event_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| RsvpError::persistence("Failed to delete event", e))?;

        Ok(())
    }

    /// Committed responses of an event in FIFO order, outside any engine transaction.
    ///
    /// # Errors
    ///
    /// Returns [`RsvpError::Persistence`] if the query fails.
    pub async fn responses(&self, event_id: EventId) -> Result<Vec<EventResponse>> {
        let rows: Vec<ResponseRow> = sqlx::query_as(&format!(
            "SELECT {RESPONSE_COLUMNS} FROM event_responses
             WHERE event_id = $1
             ORDER BY created_at, user_id"
        ))
        .bind(event_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RsvpError::persistence("Failed to list responses", e))?;

        rows.into_iter().map(response_from_row).collect()
    }
}

impl ResponseStore for PostgresResponseStore {
    fn begin(&self) -> BoxFuture<'_, Result<Box<dyn ResponseTransaction>>> {
        Box::pin(async move {
            let tx = self
                .pool
                .begin()
                .await
                .map_err(|e| RsvpError::persistence("Failed to start transaction", e))?;

            Ok(Box::new(PostgresTransaction { tx }) as Box<dyn ResponseTransaction>)
        })
    }
}

/// One open `PostgreSQL` transaction. Dropping it without commit rolls back.
struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

impl ResponseTransaction for PostgresTransaction {
    fn get_event(&mut self, event_id: EventId) -> BoxFuture<'_, Result<Event>> {
        Box::pin(async move {
            // Row lock: concurrent admissions for this event queue here
            let row: Option<EventRow> = sqlx::query_as(
                "SELECT id, group_id, capacity, start_at, is_deleted
                 FROM events
                 WHERE id = $1
                 FOR UPDATE",
            )
            .bind(event_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| RsvpError::persistence("Failed to load event", e))?;

            let Some((id, group_id, capacity, start, is_deleted)) = row else {
                return Err(RsvpError::NotFound { event_id });
            };
            if is_deleted {
                return Err(RsvpError::NotFound { event_id });
            }

            let (confirmed,): (i64,) = sqlx::query_as(
                "SELECT COALESCE(SUM(attendee_count), 0)::BIGINT
                 FROM event_responses
                 WHERE event_id = $1 AND NOT on_waitlist",
            )
            .bind(event_id.as_uuid())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| RsvpError::persistence("Failed to count confirmed attendees", e))?;

            Ok(Event {
                id: EventId::from_uuid(id),
                group_id: group_id.map(GroupId::from_uuid),
                capacity: Capacity::new(from_db_count(i64::from(capacity))?),
                start,
                is_deleted,
                confirmed_attendee_count: from_db_count(confirmed)?,
            })
        })
    }

    fn get_user_response(
        &mut self,
        event_id: EventId,
        user_id: UserId,
    ) -> BoxFuture<'_, Result<Option<EventResponse>>> {
        Box::pin(async move {
            let row: Option<ResponseRow> = sqlx::query_as(&format!(
                "SELECT {RESPONSE_COLUMNS} FROM event_responses
                 WHERE event_id = $1 AND user_id = $2"
            ))
            .bind(event_id.as_uuid())
            .bind(user_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| RsvpError::persistence("Failed to load response", e))?;

            row.map(response_from_row).transpose()
        })
    }

    fn upsert_response(&mut self, upsert: ResponseUpsert) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO event_responses
                     (event_id, user_id, attendee_count, on_waitlist, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $5)
                 ON CONFLICT (event_id, user_id) DO UPDATE
                 SET attendee_count = EXCLUDED.attendee_count,
                     on_waitlist = EXCLUDED.on_waitlist,
                     updated_at = EXCLUDED.updated_at",
            )
            .bind(upsert.event_id.as_uuid())
            .bind(upsert.user_id.as_uuid())
            .bind(to_db_count(upsert.attendee_count)?)
            .bind(upsert.on_waitlist)
            .bind(upsert.now)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| RsvpError::persistence("Failed to upsert response", e))?;

            Ok(())
        })
    }

    fn delete_response(
        &mut self,
        event_id: EventId,
        user_id: UserId,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            sqlx::query("DELETE FROM event_responses WHERE event_id = $1 AND user_id = $2")
                .bind(event_id.as_uuid())
                .bind(user_id.as_uuid())
                .execute(&mut *self.tx)
                .await
                .map_err(|e| RsvpError::persistence("Failed to delete response", e))?;

            Ok(())
        })
    }

    fn list_responses(&mut self, event_id: EventId) -> BoxFuture<'_, Result<Vec<EventResponse>>> {
        Box::pin(async move {
            let rows: Vec<ResponseRow> = sqlx::query_as(&format!(
                "SELECT {RESPONSE_COLUMNS} FROM event_responses
                 WHERE event_id = $1
                 ORDER BY created_at, user_id"
            ))
            .bind(event_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| RsvpError::persistence("Failed to list responses", e))?;

            rows.into_iter().map(response_from_row).collect()
        })
    }

    fn update_waitlist_flags(&mut self, changes: Vec<StatusChange>) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if changes.is_empty() {
                return Ok(());
            }

            let event_ids: Vec<Uuid> = changes.iter().map(|c| *c.event_id.as_uuid()).collect();
            let user_ids: Vec<Uuid> = changes.iter().map(|c| *c.user_id.as_uuid()).collect();
            let flags: Vec<bool> = changes.iter().map(|c| c.on_waitlist).collect();

            let result = sqlx::query(
                "UPDATE event_responses AS r
                 SET on_waitlist = c.on_waitlist
                 FROM UNNEST($1::uuid[], $2::uuid[], $3::bool[]) AS c(event_id, user_id, on_waitlist)
                 WHERE r.event_id = c.event_id AND r.user_id = c.user_id",
            )
            .bind(event_ids)
            .bind(user_ids)
            .bind(flags)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| RsvpError::persistence("Failed to update waitlist flags", e))?;

            tracing::debug!(
                requested = changes.len(),
                updated = result.rows_affected(),
                "Waitlist flags updated"
            );
            Ok(())
        })
    }

    fn update_capacity(
        &mut self,
        event_id: EventId,
        capacity: Capacity,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let result = sqlx::query(
                "UPDATE events SET capacity = $2 WHERE id = $1 AND NOT is_deleted",
            )
            .bind(event_id.as_uuid())
            .bind(to_db_count(capacity.value())?)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| RsvpError::persistence("Failed to update capacity", e))?;

            if result.rows_affected() == 0 {
                return Err(RsvpError::NotFound { event_id });
            }
            Ok(())
        })
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move {
            self.tx
                .commit()
                .await
                .map_err(|e| RsvpError::persistence("Failed to commit transaction", e))
        })
    }

    fn rollback(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move {
            self.tx
                .rollback()
                .await
                .map_err(|e| RsvpError::persistence("Failed to roll back transaction", e))
        })
    }
}

fn response_from_row(row: ResponseRow) -> Result<EventResponse> {
    let (event_id, user_id, attendee_count, on_waitlist, created_at, updated_at) = row;

    Ok(EventResponse {
        event_id: EventId::from_uuid(event_id),
        user_id: UserId::from_uuid(user_id),
        attendee_count: from_db_count(i64::from(attendee_count))?,
        on_waitlist,
        created_at,
        updated_at,
    })
}

fn to_db_count(value: u32) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| RsvpError::Persistence(format!("Count {value} exceeds INTEGER range")))
}

fn from_db_count(value: i64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| RsvpError::Persistence(format!("Invalid stored count: {value}")))
}
