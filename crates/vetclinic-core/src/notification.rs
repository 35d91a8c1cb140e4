//! In-app notifications produced by the reminder sweep, and their feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, store::ClinicStore, user::User};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
  pub notification_id: Uuid,
  pub user_id:         Uuid,
  pub appointment_id:  Uuid,
  pub message:         String,
  pub read:            bool,
  pub created_at:      DateTime<Utc>,
}

/// A user's most recent notifications and how many of all of theirs are
/// unread.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationFeed {
  pub notifications: Vec<Notification>,
  pub unread_count:  u64,
}

/// Most notifications returned by [`feed`].
pub const FEED_LIMIT: usize = 50;

/// The user's newest notifications.
pub async fn feed<S: ClinicStore>(store: &S, user: &User) -> Result<NotificationFeed> {
  store
    .list_notifications(user.user_id, FEED_LIMIT)
    .await
    .map_err(Error::internal)
}

/// Mark one of the user's notifications as read.
pub async fn mark_read<S: ClinicStore>(store: &S, user: &User, id: Uuid) -> Result<Notification> {
  let existing = store
    .get_notification(id)
    .await
    .map_err(Error::internal)?
    .ok_or_else(|| Error::not_found("notification not found"))?;
  if existing.user_id != user.user_id {
    return Err(Error::forbidden("not your notification"));
  }
  store
    .mark_notification_read(id)
    .await
    .map_err(Error::internal)?
    .ok_or_else(|| Error::not_found("notification not found"))
}
