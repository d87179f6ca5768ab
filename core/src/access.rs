//! Access Collaborator: group-membership visibility, consumed as a yes/no check.

use crate::error::{Result, RsvpError};
use crate::store::BoxFuture;
use crate::types::{Event, GroupId, UserId};

/// Answers whether a user may see (and therefore respond to) a group's events.
pub trait AccessPolicy: Send + Sync {
    /// Whether `user_id` is a member of `group_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RsvpError::Persistence`] if membership cannot be determined.
    fn is_member(&self, group_id: GroupId, user_id: UserId) -> BoxFuture<'_, Result<bool>>;
}

/// `CanAccess`: public events (no group) are always accessible, group events
/// only to members.
///
/// # Errors
///
/// Propagates failures from [`AccessPolicy::is_member`].
pub async fn can_access(
    policy: &dyn AccessPolicy,
    group_id: Option<GroupId>,
    user_id: UserId,
) -> Result<bool> {
    match group_id {
        None => Ok(true),
        Some(group_id) => policy.is_member(group_id, user_id).await,
    }
}

/// `CanAccessError`: like [`can_access`] but turns a denial into
/// [`RsvpError::AccessDenied`].
///
/// # Errors
///
/// - [`RsvpError::AccessDenied`] if the user may not see the event
/// - Failures from [`AccessPolicy::is_member`]
pub async fn ensure_access(policy: &dyn AccessPolicy, event: &Event, user_id: UserId) -> Result<()> {
    if can_access(policy, event.group_id, user_id).await? {
        Ok(())
    } else {
        Err(RsvpError::AccessDenied {
            event_id: event.id,
            user_id,
        })
    }
}
