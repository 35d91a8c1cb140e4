//! Appointment types: a booking request between a client and a
//! veterinarian for one of the client's animals.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

// ─── Enums ───────────────────────────────────────────────────────────────────

/// Where the visit takes place.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AppointmentKind {
  Household,
  Clinic,
}

/// Booking status. `Pending` is the only non-terminal state.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AppointmentStatus {
  Pending,
  Accepted,
  Rejected,
}

// ─── Appointment ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
  pub appointment_id:   Uuid,
  pub date:             DateTime<Utc>,
  pub client_id:        Uuid,
  pub veterinarian_id:  Uuid,
  pub animal_id:        Uuid,
  #[serde(rename = "type")]
  pub kind:             AppointmentKind,
  pub status:           AppointmentStatus,
  pub services:         Vec<String>,
  pub case_description: String,
  pub reminder_sent:    bool,
  pub created_at:       DateTime<Utc>,
  pub updated_at:       DateTime<Utc>,
}

/// Validated input to [`crate::store::ClinicStore::book_appointment`].
/// Identity, status and timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewAppointment {
  pub date:             DateTime<Utc>,
  pub client_id:        Uuid,
  pub veterinarian_id:  Uuid,
  pub animal_id:        Uuid,
  pub kind:             AppointmentKind,
  pub services:         Vec<String>,
  pub case_description: String,
}

/// Validated field changes a client may apply to a pending appointment.
#[derive(Debug, Clone, Default)]
pub struct AppointmentChanges {
  pub date:             Option<DateTime<Utc>>,
  pub animal_id:        Option<Uuid>,
  pub kind:             Option<AppointmentKind>,
  pub services:         Option<Vec<String>>,
  pub case_description: Option<String>,
}

impl AppointmentChanges {
  pub fn is_empty(&self) -> bool {
    self.date.is_none()
      && self.animal_id.is_none()
      && self.kind.is_none()
      && self.services.is_none()
      && self.case_description.is_none()
  }
}

// ─── Conflict window ─────────────────────────────────────────────────────────

/// The protected interval around a booking date. Another appointment whose
/// date falls inside it is a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictWindow {
  pub radius:        TimeDelta,
  /// Whether `date + radius` itself is inside the window. The start bound is
  /// always inclusive.
  pub end_inclusive: bool,
  /// Only appointments already `Accepted` count as conflicts.
  pub accepted_only: bool,
  /// Only the booked veterinarian's appointments count as conflicts.
  pub same_veterinarian: bool,
}

impl ConflictWindow {
  /// Policy applied when a client books: ±`minutes`, both ends inclusive,
  /// accepted appointments of the same veterinarian only.
  pub fn creation(minutes: i64) -> Self {
    Self {
      radius:            TimeDelta::minutes(minutes),
      end_inclusive:     true,
      accepted_only:     true,
      same_veterinarian: true,
    }
  }

  /// Policy applied when a client moves a pending appointment:
  /// `[date - minutes, date + minutes)`, any status, any veterinarian.
  pub fn update(minutes: i64) -> Self {
    Self {
      radius:            TimeDelta::minutes(minutes),
      end_inclusive:     false,
      accepted_only:     false,
      same_veterinarian: false,
    }
  }

  pub fn bounds(&self, at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    (at - self.radius, at + self.radius)
  }

  /// Whether an appointment at `other` (with `other_status`) collides with a
  /// booking at `at`.
  pub fn collides(
    &self,
    at: DateTime<Utc>,
    other: DateTime<Utc>,
    other_status: AppointmentStatus,
  ) -> bool {
    if self.accepted_only && other_status != AppointmentStatus::Accepted {
      return false;
    }
    let (start, end) = self.bounds(at);
    other >= start && (other < end || (self.end_inclusive && other == end))
  }
}

// ─── Listing ─────────────────────────────────────────────────────────────────

/// Order an owner's appointments for display: pending ones by creation time,
/// then accepted ones by appointment date. Rejected appointments are dropped.
pub fn agenda_order(all: Vec<Appointment>) -> Vec<Appointment> {
  let (mut pending, mut accepted): (Vec<_>, Vec<_>) = all
    .into_iter()
    .filter(|a| a.status != AppointmentStatus::Rejected)
    .partition(|a| a.status == AppointmentStatus::Pending);
  pending.sort_by_key(|a| a.created_at);
  accepted.sort_by_key(|a| a.date);
  pending.extend(accepted);
  pending
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, h, m, 0).unwrap()
  }

  fn appt(status: AppointmentStatus, date: DateTime<Utc>, created: DateTime<Utc>) -> Appointment {
    Appointment {
      appointment_id:   Uuid::new_v4(),
      date,
      client_id:        Uuid::nil(),
      veterinarian_id:  Uuid::nil(),
      animal_id:        Uuid::nil(),
      kind:             AppointmentKind::Clinic,
      status,
      services:         vec![],
      case_description: String::new(),
      reminder_sent:    false,
      created_at:       created,
      updated_at:       created,
    }
  }

  #[test]
  fn creation_window_is_inclusive_on_both_ends() {
    let w = ConflictWindow::creation(29);
    let accepted = AppointmentStatus::Accepted;
    assert!(w.collides(at(10, 0), at(10, 29), accepted));
    assert!(w.collides(at(10, 0), at(9, 31), accepted));
    assert!(!w.collides(at(10, 0), at(10, 30), accepted));
    assert!(!w.collides(at(10, 0), at(10, 15), AppointmentStatus::Pending));
  }

  #[test]
  fn update_window_excludes_its_end_and_ignores_status() {
    let w = ConflictWindow::update(20);
    assert!(w.collides(at(10, 0), at(9, 40), AppointmentStatus::Pending));
    assert!(w.collides(at(10, 0), at(10, 19), AppointmentStatus::Rejected));
    assert!(!w.collides(at(10, 0), at(10, 20), AppointmentStatus::Accepted));
  }

  #[test]
  fn agenda_lists_pending_first_then_accepted_by_date() {
    let p_late = appt(AppointmentStatus::Pending, at(8, 0), at(2, 0));
    let p_early = appt(AppointmentStatus::Pending, at(7, 0), at(1, 0));
    let a_late = appt(AppointmentStatus::Accepted, at(12, 0), at(0, 0));
    let a_early = appt(AppointmentStatus::Accepted, at(11, 0), at(3, 0));
    let rejected = appt(AppointmentStatus::Rejected, at(9, 0), at(0, 0));

    let ordered = agenda_order(vec![
      a_late.clone(),
      rejected,
      p_late.clone(),
      a_early.clone(),
      p_early.clone(),
    ]);
    let ids: Vec<_> = ordered.iter().map(|a| a.appointment_id).collect();
    assert_eq!(ids, vec![
      p_early.appointment_id,
      p_late.appointment_id,
      a_early.appointment_id,
      a_late.appointment_id,
    ]);
  }
}
