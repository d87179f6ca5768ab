//! Group-membership visibility backed by the `user_group_members` table.

use rsvp_core::access::AccessPolicy;
use rsvp_core::store::BoxFuture;
use rsvp_core::{GroupId, Result, RsvpError, UserId};
use sqlx::PgPool;

/// `PostgreSQL`-backed [`AccessPolicy`].
#[derive(Clone, Debug)]
pub struct PostgresGroupAccess {
    pool: PgPool,
}

impl PostgresGroupAccess {
    /// Create a new access policy over the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Add a user to a group. Adding an existing member is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RsvpError::Persistence`] if the insert fails.
    pub async fn add_member(&self, group_id: GroupId, user_id: UserId) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_group_members (group_id, user_id)
             VALUES ($1, $2)
             ON CONFLICT (group_id, user_id) DO NOTHING",
        )
        .bind(group_id.as_uuid())
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| RsvpError::persistence("Failed to add group member", e))?;

        Ok(())
    }

    /// Remove a user from a group.
    ///
    /// # Errors
    ///
    /// Returns [`RsvpError::Persistence`] if the delete fails.
    pub async fn remove_member(&self, group_id: GroupId, user_id: UserId) -> Result<()> {
        sqlx::query("DELETE FROM user_group_members WHERE group_id = $1 AND user_id = $2")
            .bind(group_id.as_uuid())
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| RsvpError::persistence("Failed to remove group member", e))?;

        Ok(())
    }
}

impl AccessPolicy for PostgresGroupAccess {
    fn is_member(&self, group_id: GroupId, user_id: UserId) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            let (member,): (bool,) = sqlx::query_as(
                "SELECT EXISTS(
                     SELECT 1 FROM user_group_members
                     WHERE group_id = $1 AND user_id = $2
                 )",
            )
            .bind(group_id.as_uuid())
            .bind(user_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RsvpError::persistence("Failed to check group membership", e))?;

            Ok(member)
        })
    }
}
