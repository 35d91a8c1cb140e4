//! The reminder sweep: notify clients of accepted appointments coming up.
//!
//! Each appointment is reminded at most once. The flag flip and the
//! notification insert are a single conditional write in the store, so a
//! sweep may overlap with another sweep or with booking traffic.

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

use crate::{
  Error, Result,
  notification::Notification,
  realtime::{Event, Notifier},
  store::{ClinicStore, DueReminder},
  time::format_local,
};

#[derive(Debug, Clone, Copy)]
pub struct ReminderPolicy {
  /// How far ahead the scanned range starts.
  pub lead: TimeDelta,
  /// Length of the scanned range.
  pub span: TimeDelta,
  /// Zone the appointment date is rendered in.
  pub zone: Tz,
}

impl Default for ReminderPolicy {
  fn default() -> Self {
    Self {
      lead: TimeDelta::hours(24),
      span: TimeDelta::hours(1),
      zone: chrono_tz::Africa::Tunis,
    }
  }
}

/// Remind every due appointment in `[now + lead, now + lead + span]`.
/// Returns how many reminders this sweep sent.
pub async fn run_sweep<S, N>(
  store: &S,
  notifier: &N,
  policy: &ReminderPolicy,
  now: DateTime<Utc>,
) -> Result<usize>
where
  S: ClinicStore,
  N: Notifier,
{
  let from = now + policy.lead;
  let to = from + policy.span;
  let due = store.due_reminders(from, to).await.map_err(Error::internal)?;
  tracing::info!(due = due.len(), %from, %to, "reminder sweep");

  let mut sent = 0;
  for item in due {
    let appointment_id = item.appointment.appointment_id;
    let notification = reminder_for(&item, policy.zone, now);
    match store.claim_reminder(appointment_id, notification.clone()).await {
      Ok(true) => {
        notifier.emit(notification.user_id, Event::Notification { notification }.into());
        sent += 1;
      }
      Ok(false) => {
        tracing::debug!(%appointment_id, "reminder already claimed");
      }
      Err(e) => {
        tracing::warn!(%appointment_id, error = %e, "failed to record reminder");
      }
    }
  }
  Ok(sent)
}

fn reminder_for(item: &DueReminder, zone: Tz, now: DateTime<Utc>) -> Notification {
  Notification {
    notification_id: Uuid::new_v4(),
    user_id:         item.client.user_id,
    appointment_id:  item.appointment.appointment_id,
    message:         format!(
      "Hello {}, your appointment for {} is scheduled on {}.",
      item.client.full_name(),
      item.animal.name,
      format_local(item.appointment.date, zone),
    ),
    read:            false,
    created_at:      now,
  }
}
