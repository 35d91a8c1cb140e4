//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 UTC with microseconds and a `Z` suffix, so every
//! stored instant has the same width and compares correctly as text. UUIDs
//! are hyphenated lowercase strings. Lists are compact JSON.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::Row;
use uuid::Uuid;
use vetclinic_core::{
  appointment::Appointment,
  chat::{Chat, Message},
  notification::Notification,
  user::{Animal, User, UserSummary},
};

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_opt_uuid(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

/// Parse a strum-backed enum column.
pub fn decode_enum<T: FromStr>(column: &'static str, value: &str) -> Result<T> {
  T::from_str(value).map_err(|_| Error::UnknownVariant {
    column,
    value: value.to_owned(),
  })
}

pub fn encode_list(items: &[String]) -> Result<String> {
  Ok(serde_json::to_string(items)?)
}

// ─── Users & animals ─────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str =
  "user_id, role, first_name, last_name, veterinarian_id, created_at";

/// Raw strings read from a `users` row.
pub struct RawUser {
  pub user_id:         String,
  pub role:            String,
  pub first_name:      String,
  pub last_name:       String,
  pub veterinarian_id: Option<String>,
  pub created_at:      String,
}

impl RawUser {
  /// Read the [`USER_COLUMNS`] starting at column `base`.
  pub fn from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:         row.get(base)?,
      role:            row.get(base + 1)?,
      first_name:      row.get(base + 2)?,
      last_name:       row.get(base + 3)?,
      veterinarian_id: row.get(base + 4)?,
      created_at:      row.get(base + 5)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:         decode_uuid(&self.user_id)?,
      role:            decode_enum("role", &self.role)?,
      first_name:      self.first_name,
      last_name:       self.last_name,
      veterinarian_id: decode_opt_uuid(self.veterinarian_id.as_deref())?,
      created_at:      decode_dt(&self.created_at)?,
    })
  }

  pub fn into_summary(self) -> Result<UserSummary> {
    Ok(UserSummary {
      user_id:    decode_uuid(&self.user_id)?,
      role:       decode_enum("role", &self.role)?,
      first_name: self.first_name,
      last_name:  self.last_name,
    })
  }
}

pub const ANIMAL_COLUMNS: &str = "animal_id, owner_id, name, species, birth_date";

pub struct RawAnimal {
  pub animal_id:  String,
  pub owner_id:   String,
  pub name:       String,
  pub species:    Option<String>,
  pub birth_date: Option<String>,
}

impl RawAnimal {
  pub fn from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      animal_id:  row.get(base)?,
      owner_id:   row.get(base + 1)?,
      name:       row.get(base + 2)?,
      species:    row.get(base + 3)?,
      birth_date: row.get(base + 4)?,
    })
  }

  pub fn into_animal(self) -> Result<Animal> {
    Ok(Animal {
      animal_id:  decode_uuid(&self.animal_id)?,
      owner_id:   decode_uuid(&self.owner_id)?,
      name:       self.name,
      species:    self.species,
      birth_date: self.birth_date.as_deref().map(decode_date).transpose()?,
    })
  }
}

// ─── Appointments ────────────────────────────────────────────────────────────

pub const APPOINTMENT_COLUMNS: &str = "appointment_id, date, client_id, veterinarian_id, \
   animal_id, kind, status, services, case_description, reminder_sent, created_at, updated_at";

pub struct RawAppointment {
  pub appointment_id:   String,
  pub date:             String,
  pub client_id:        String,
  pub veterinarian_id:  String,
  pub animal_id:        String,
  pub kind:             String,
  pub status:           String,
  pub services:         String,
  pub case_description: String,
  pub reminder_sent:    bool,
  pub created_at:       String,
  pub updated_at:       String,
}

impl RawAppointment {
  pub fn from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      appointment_id:   row.get(base)?,
      date:             row.get(base + 1)?,
      client_id:        row.get(base + 2)?,
      veterinarian_id:  row.get(base + 3)?,
      animal_id:        row.get(base + 4)?,
      kind:             row.get(base + 5)?,
      status:           row.get(base + 6)?,
      services:         row.get(base + 7)?,
      case_description: row.get(base + 8)?,
      reminder_sent:    row.get(base + 9)?,
      created_at:       row.get(base + 10)?,
      updated_at:       row.get(base + 11)?,
    })
  }

  pub fn into_appointment(self) -> Result<Appointment> {
    Ok(Appointment {
      appointment_id:   decode_uuid(&self.appointment_id)?,
      date:             decode_dt(&self.date)?,
      client_id:        decode_uuid(&self.client_id)?,
      veterinarian_id:  decode_uuid(&self.veterinarian_id)?,
      animal_id:        decode_uuid(&self.animal_id)?,
      kind:             decode_enum("kind", &self.kind)?,
      status:           decode_enum("status", &self.status)?,
      services:         serde_json::from_str(&self.services)?,
      case_description: self.case_description,
      reminder_sent:    self.reminder_sent,
      created_at:       decode_dt(&self.created_at)?,
      updated_at:       decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Chats & messages ────────────────────────────────────────────────────────

pub const CHAT_COLUMNS: &str =
  "chat_id, veterinarian_id, is_group, name, last_message_id, created_at, updated_at";

/// A `chats` row plus its participant ids in canonical order.
pub struct RawChat {
  pub chat_id:         String,
  pub veterinarian_id: Option<String>,
  pub is_group:        bool,
  pub name:            String,
  pub last_message_id: Option<String>,
  pub created_at:      String,
  pub updated_at:      String,
  pub participants:    Vec<String>,
}

impl RawChat {
  /// Reads the chat columns; `participants` is filled in separately.
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      chat_id:         row.get(0)?,
      veterinarian_id: row.get(1)?,
      is_group:        row.get(2)?,
      name:            row.get(3)?,
      last_message_id: row.get(4)?,
      created_at:      row.get(5)?,
      updated_at:      row.get(6)?,
      participants:    Vec::new(),
    })
  }

  pub fn into_chat(self) -> Result<Chat> {
    Ok(Chat {
      chat_id:         decode_uuid(&self.chat_id)?,
      participants:    self
        .participants
        .iter()
        .map(|p| decode_uuid(p))
        .collect::<Result<_>>()?,
      veterinarian_id: decode_opt_uuid(self.veterinarian_id.as_deref())?,
      is_group:        self.is_group,
      name:            self.name,
      last_message_id: decode_opt_uuid(self.last_message_id.as_deref())?,
      created_at:      decode_dt(&self.created_at)?,
      updated_at:      decode_dt(&self.updated_at)?,
    })
  }
}

/// Message columns of `messages m`, followed by the read-by set as a JSON
/// array.
pub const MESSAGE_COLUMNS: &str = "m.message_id, m.chat_id, m.sender_id, m.kind, m.content, \
   m.created_at, m.updated_at, \
   (SELECT json_group_array(r.user_id) FROM message_reads r WHERE r.message_id = m.message_id)";

pub struct RawMessage {
  pub message_id: String,
  pub chat_id:    String,
  pub sender_id:  String,
  pub kind:       String,
  pub content:    String,
  pub created_at: String,
  pub updated_at: String,
  pub read_by:    String,
}

impl RawMessage {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      message_id: row.get(0)?,
      chat_id:    row.get(1)?,
      sender_id:  row.get(2)?,
      kind:       row.get(3)?,
      content:    row.get(4)?,
      created_at: row.get(5)?,
      updated_at: row.get(6)?,
      read_by:    row.get(7)?,
    })
  }

  pub fn into_message(self) -> Result<Message> {
    let read_by: Vec<String> = serde_json::from_str(&self.read_by)?;
    let mut read_by = read_by
      .iter()
      .map(|id| decode_uuid(id))
      .collect::<Result<Vec<_>>>()?;
    read_by.sort();

    Ok(Message {
      message_id: decode_uuid(&self.message_id)?,
      chat_id: decode_uuid(&self.chat_id)?,
      sender_id: decode_uuid(&self.sender_id)?,
      kind: decode_enum("message kind", &self.kind)?,
      content: self.content,
      read_by,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Notifications ───────────────────────────────────────────────────────────

pub const NOTIFICATION_COLUMNS: &str =
  "notification_id, user_id, appointment_id, message, read, created_at";

pub struct RawNotification {
  pub notification_id: String,
  pub user_id:         String,
  pub appointment_id:  String,
  pub message:         String,
  pub read:            bool,
  pub created_at:      String,
}

impl RawNotification {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      notification_id: row.get(0)?,
      user_id:         row.get(1)?,
      appointment_id:  row.get(2)?,
      message:         row.get(3)?,
      read:            row.get(4)?,
      created_at:      row.get(5)?,
    })
  }

  pub fn into_notification(self) -> Result<Notification> {
    Ok(Notification {
      notification_id: decode_uuid(&self.notification_id)?,
      user_id:         decode_uuid(&self.user_id)?,
      appointment_id:  decode_uuid(&self.appointment_id)?,
      message:         self.message,
      read:            self.read,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn timestamps_have_a_fixed_width() {
    let whole = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
    let fractional = whole + chrono::TimeDelta::microseconds(1);
    let a = encode_dt(whole);
    let b = encode_dt(fractional);
    assert_eq!(a.len(), b.len());
    assert!(a < b);
    assert_eq!(a, "2025-03-01T09:00:00.000000Z");
    assert_eq!(decode_dt(&b).unwrap(), fractional);
  }

  #[test]
  fn unknown_enum_values_name_their_column() {
    let err = decode_enum::<vetclinic_core::user::Role>("role", "owner").unwrap_err();
    assert!(err.to_string().contains("role"));
  }
}
