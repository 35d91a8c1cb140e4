//! [`SqliteStore`], the SQLite implementation of [`ClinicStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;
use vetclinic_core::{
  appointment::{
    Appointment, AppointmentChanges, AppointmentStatus, ConflictWindow, NewAppointment,
  },
  chat::{Chat, ChatOverview, Message, NewChat, NewMessage, participant_key},
  notification::{Notification, NotificationFeed},
  store::{
    AgendaOwner, AmendOutcome, BookingOutcome, ClinicStore, DueReminder, TransitionOutcome,
  },
  user::{Animal, Role, User},
};

use crate::{
  Result,
  encode::{
    ANIMAL_COLUMNS, APPOINTMENT_COLUMNS, CHAT_COLUMNS, MESSAGE_COLUMNS, NOTIFICATION_COLUMNS,
    RawAnimal, RawAppointment, RawChat, RawMessage, RawNotification, RawUser, USER_COLUMNS,
    decode_enum, decode_uuid, encode_dt, encode_list, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A clinic store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Number of chats stored; used to check find-or-create under contention.
  pub async fn chat_count(&self) -> Result<u64> {
    let n: u64 = self
      .conn
      .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM chats", [], |r| r.get(0))?))
      .await?;
    Ok(n)
  }
}

// ─── Statement helpers ───────────────────────────────────────────────────────
//
// These run inside `Connection::call` closures, on the database thread.

/// Ids of the appointments inside `window` around `at`, ignoring `exclude`.
/// Scoped to `veterinarian_id` when the window says so.
fn find_conflicts(
  conn: &Connection,
  veterinarian_id: &str,
  window: ConflictWindow,
  at: DateTime<Utc>,
  exclude: &str,
) -> rusqlite::Result<Vec<String>> {
  let (start, end) = window.bounds(at);
  let mut stmt = conn.prepare(
    "SELECT appointment_id FROM appointments
     WHERE (NOT ?7 OR veterinarian_id = ?1)
       AND date >= ?2
       AND (date < ?3 OR (?4 AND date = ?3))
       AND (NOT ?5 OR status = 'accepted')
       AND appointment_id != ?6
     ORDER BY date",
  )?;
  let ids = stmt
    .query_map(
      rusqlite::params![
        veterinarian_id,
        encode_dt(start),
        encode_dt(end),
        window.end_inclusive,
        window.accepted_only,
        exclude,
        window.same_veterinarian,
      ],
      |r| r.get(0),
    )?
    .collect::<rusqlite::Result<Vec<String>>>()?;
  Ok(ids)
}

fn select_appointment(conn: &Connection, id: &str) -> rusqlite::Result<Option<RawAppointment>> {
  conn
    .query_row(
      &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE appointment_id = ?1"),
      rusqlite::params![id],
      |row| RawAppointment::from_row(row, 0),
    )
    .optional()
}

fn select_status(conn: &Connection, id: &str) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      "SELECT status FROM appointments WHERE appointment_id = ?1",
      rusqlite::params![id],
      |r| r.get(0),
    )
    .optional()
}

/// A chat row selected by `column = value`, with its participants.
fn select_chat(conn: &Connection, column: &str, value: &str) -> rusqlite::Result<Option<RawChat>> {
  let chat = conn
    .query_row(
      &format!("SELECT {CHAT_COLUMNS} FROM chats WHERE {column} = ?1"),
      rusqlite::params![value],
      RawChat::from_row,
    )
    .optional()?;
  let Some(mut chat) = chat else {
    return Ok(None);
  };
  let mut stmt =
    conn.prepare("SELECT user_id FROM chat_participants WHERE chat_id = ?1 ORDER BY user_id")?;
  chat.participants = stmt
    .query_map(rusqlite::params![chat.chat_id], |r| r.get(0))?
    .collect::<rusqlite::Result<_>>()?;
  Ok(Some(chat))
}

fn select_message(conn: &Connection, id: &str) -> rusqlite::Result<Option<RawMessage>> {
  conn
    .query_row(
      &format!("SELECT {MESSAGE_COLUMNS} FROM messages m WHERE m.message_id = ?1"),
      rusqlite::params![id],
      RawMessage::from_row,
    )
    .optional()
}

fn select_notification(conn: &Connection, id: &str) -> rusqlite::Result<Option<RawNotification>> {
  conn
    .query_row(
      &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE notification_id = ?1"),
      rusqlite::params![id],
      RawNotification::from_row,
    )
    .optional()
}

// Closure results for the conditional appointment writes, decoded on the
// async side.

enum RawAmend {
  Amended(RawAppointment),
  NotFound,
  NotPending(String),
  Conflict(Vec<String>),
}

enum RawTransition {
  Transitioned(RawAppointment),
  NotFound,
  NotPending(String),
}

struct RawOverview {
  chat:         RawChat,
  others:       Vec<RawUser>,
  last_message: Option<RawMessage>,
  unread:       u64,
}

fn decode_ids(ids: Vec<String>) -> Result<Vec<Uuid>> {
  ids.iter().map(|s| decode_uuid(s)).collect()
}

// ─── ClinicStore impl ────────────────────────────────────────────────────────

impl ClinicStore for SqliteStore {
  type Error = crate::Error;

  // ── Directory ─────────────────────────────────────────────────────────────

  async fn put_user(&self, user: User) -> Result<()> {
    let id      = encode_uuid(user.user_id);
    let role    = user.role.as_ref().to_owned();
    let vet     = user.veterinarian_id.map(encode_uuid);
    let created = encode_dt(user.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, role, first_name, last_name, veterinarian_id, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT (user_id) DO UPDATE SET
             role = excluded.role,
             first_name = excluded.first_name,
             last_name = excluded.last_name,
             veterinarian_id = excluded.veterinarian_id",
          rusqlite::params![id, role, user.first_name, user.last_name, vet, created],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn put_animal(&self, animal: Animal) -> Result<()> {
    let id    = encode_uuid(animal.animal_id);
    let owner = encode_uuid(animal.owner_id);
    let birth = animal.birth_date.map(|d| d.format("%Y-%m-%d").to_string());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO animals (animal_id, owner_id, name, species, birth_date)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (animal_id) DO UPDATE SET
             owner_id = excluded.owner_id,
             name = excluded.name,
             species = excluded.species,
             birth_date = excluded.birth_date",
          rusqlite::params![id, owner, animal.name, animal.species, birth],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
              rusqlite::params![id_str],
              |row| RawUser::from_row(row, 0),
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawUser::into_user).transpose()
  }

  async fn exists_with_role(&self, id: Uuid, role: Role) -> Result<bool> {
    let id_str   = encode_uuid(id);
    let role_str = role.as_ref().to_owned();
    let found = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM users WHERE user_id = ?1 AND role = ?2",
              rusqlite::params![id_str, role_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(found)
  }

  async fn secretaries_of(&self, veterinarian_id: Uuid) -> Result<Vec<Uuid>> {
    let vet = encode_uuid(veterinarian_id);
    let ids: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT user_id FROM users WHERE role = 'secretary' AND veterinarian_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![vet], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    decode_ids(ids)
  }

  async fn find_owned_animal(&self, animal_id: Uuid, owner_id: Uuid) -> Result<Option<Animal>> {
    let animal = encode_uuid(animal_id);
    let owner  = encode_uuid(owner_id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {ANIMAL_COLUMNS} FROM animals WHERE animal_id = ?1 AND owner_id = ?2"),
              rusqlite::params![animal, owner],
              |row| RawAnimal::from_row(row, 0),
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawAnimal::into_animal).transpose()
  }

  // ── Appointments ──────────────────────────────────────────────────────────

  async fn book_appointment(
    &self,
    input: NewAppointment,
    window: ConflictWindow,
  ) -> Result<BookingOutcome> {
    let now = Utc::now();
    let appointment = Appointment {
      appointment_id:   Uuid::new_v4(),
      date:             input.date,
      client_id:        input.client_id,
      veterinarian_id:  input.veterinarian_id,
      animal_id:        input.animal_id,
      kind:             input.kind,
      status:           AppointmentStatus::Pending,
      services:         input.services,
      case_description: input.case_description,
      reminder_sent:    false,
      created_at:       now,
      updated_at:       now,
    };

    let id       = encode_uuid(appointment.appointment_id);
    let date     = encode_dt(appointment.date);
    let client   = encode_uuid(appointment.client_id);
    let vet      = encode_uuid(appointment.veterinarian_id);
    let animal   = encode_uuid(appointment.animal_id);
    let kind     = appointment.kind.as_ref().to_owned();
    let status   = appointment.status.as_ref().to_owned();
    let services = encode_list(&appointment.services)?;
    let case     = appointment.case_description.clone();
    let stamp    = encode_dt(now);
    let at       = appointment.date;

    let conflicts: Vec<String> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let conflicts = find_conflicts(&tx, &vet, window, at, "")?;
        if !conflicts.is_empty() {
          return Ok(conflicts);
        }
        tx.execute(
          &format!(
            "INSERT INTO appointments ({APPOINTMENT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10, ?10)"
          ),
          rusqlite::params![id, date, client, vet, animal, kind, status, services, case, stamp],
        )?;
        tx.commit()?;
        Ok(conflicts)
      })
      .await?;

    if conflicts.is_empty() {
      Ok(BookingOutcome::Booked(appointment))
    } else {
      Ok(BookingOutcome::Conflict(decode_ids(conflicts)?))
    }
  }

  async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(select_appointment(conn, &id_str)?))
      .await?;
    raw.map(RawAppointment::into_appointment).transpose()
  }

  async fn amend_appointment(
    &self,
    id: Uuid,
    changes: AppointmentChanges,
    window: ConflictWindow,
  ) -> Result<AmendOutcome> {
    let id_str   = encode_uuid(id);
    let new_date = changes.date;
    let date     = changes.date.map(encode_dt);
    let animal   = changes.animal_id.map(encode_uuid);
    let kind     = changes.kind.map(|k| k.as_ref().to_owned());
    let services = changes.services.as_deref().map(encode_list).transpose()?;
    let case     = changes.case_description;
    let stamp    = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: Option<(String, String)> = tx
          .query_row(
            "SELECT status, veterinarian_id FROM appointments WHERE appointment_id = ?1",
            rusqlite::params![id_str],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;
        let Some((status, vet)) = current else {
          return Ok(RawAmend::NotFound);
        };
        if status != AppointmentStatus::Pending.as_ref() {
          return Ok(RawAmend::NotPending(status));
        }

        if let Some(at) = new_date {
          let conflicts = find_conflicts(&tx, &vet, window, at, &id_str)?;
          if !conflicts.is_empty() {
            return Ok(RawAmend::Conflict(conflicts));
          }
        }

        tx.execute(
          "UPDATE appointments SET
             date = COALESCE(?2, date),
             animal_id = COALESCE(?3, animal_id),
             kind = COALESCE(?4, kind),
             services = COALESCE(?5, services),
             case_description = COALESCE(?6, case_description),
             updated_at = ?7
           WHERE appointment_id = ?1",
          rusqlite::params![id_str, date, animal, kind, services, case, stamp],
        )?;
        let updated = select_appointment(&tx, &id_str)?;
        tx.commit()?;
        Ok(updated.map_or(RawAmend::NotFound, RawAmend::Amended))
      })
      .await?;

    Ok(match raw {
      RawAmend::Amended(r) => AmendOutcome::Amended(r.into_appointment()?),
      RawAmend::NotFound => AmendOutcome::NotFound,
      RawAmend::NotPending(s) => AmendOutcome::NotPending(decode_enum("status", &s)?),
      RawAmend::Conflict(ids) => AmendOutcome::Conflict(decode_ids(ids)?),
    })
  }

  async fn transition_appointment(
    &self,
    id: Uuid,
    to: AppointmentStatus,
  ) -> Result<TransitionOutcome> {
    let id_str = encode_uuid(id);
    let to_str = to.as_ref().to_owned();
    let stamp  = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE appointments SET status = ?2, updated_at = ?3
           WHERE appointment_id = ?1 AND status = 'pending'",
          rusqlite::params![id_str, to_str, stamp],
        )?;
        let outcome = if changed == 1 {
          select_appointment(&tx, &id_str)?.map_or(RawTransition::NotFound, RawTransition::Transitioned)
        } else {
          select_status(&tx, &id_str)?.map_or(RawTransition::NotFound, RawTransition::NotPending)
        };
        tx.commit()?;
        Ok(outcome)
      })
      .await?;

    Ok(match raw {
      RawTransition::Transitioned(r) => TransitionOutcome::Transitioned(r.into_appointment()?),
      RawTransition::NotFound => TransitionOutcome::NotFound,
      RawTransition::NotPending(s) => TransitionOutcome::NotPending(decode_enum("status", &s)?),
    })
  }

  async fn delete_appointment(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM appointments WHERE appointment_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    Ok(n > 0)
  }

  async fn list_agenda(&self, owner: AgendaOwner) -> Result<Vec<Appointment>> {
    let (column, id) = match owner {
      AgendaOwner::Client(id) => ("client_id", id),
      AgendaOwner::Veterinarian(id) => ("veterinarian_id", id),
    };
    let id_str = encode_uuid(id);

    let raws: Vec<RawAppointment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {APPOINTMENT_COLUMNS} FROM appointments
           WHERE {column} = ?1 AND status IN ('pending', 'accepted')"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| RawAppointment::from_row(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAppointment::into_appointment).collect()
  }

  async fn clients_with_accepted(&self, veterinarian_id: Uuid) -> Result<Vec<User>> {
    let vet = encode_uuid(veterinarian_id);
    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT u.user_id, u.role, u.first_name, u.last_name, u.veterinarian_id, u.created_at
           FROM users u
           WHERE u.role = 'client'
             AND EXISTS (
               SELECT 1 FROM appointments a
               WHERE a.client_id = u.user_id
                 AND a.veterinarian_id = ?1
                 AND a.status = 'accepted'
             )
           ORDER BY u.last_name, u.first_name",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![vet], |row| RawUser::from_row(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn animals_with_accepted(
    &self,
    veterinarian_id: Uuid,
    client_id: Uuid,
  ) -> Result<Vec<Animal>> {
    let vet    = encode_uuid(veterinarian_id);
    let client = encode_uuid(client_id);
    let raws: Vec<RawAnimal> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ANIMAL_COLUMNS} FROM animals
           WHERE owner_id = ?2
             AND EXISTS (
               SELECT 1 FROM appointments a
               WHERE a.animal_id = animals.animal_id
                 AND a.client_id = ?2
                 AND a.veterinarian_id = ?1
                 AND a.status = 'accepted'
             )
           ORDER BY name, animal_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![vet, client], |row| RawAnimal::from_row(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawAnimal::into_animal).collect()
  }

  async fn due_reminders(
    &self,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
  ) -> Result<Vec<DueReminder>> {
    let from_str = encode_dt(from);
    let to_str   = encode_dt(to);

    let raws: Vec<(RawAppointment, RawUser, RawAnimal)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT a.appointment_id, a.date, a.client_id, a.veterinarian_id, a.animal_id,
                  a.kind, a.status, a.services, a.case_description, a.reminder_sent,
                  a.created_at, a.updated_at,
                  u.user_id, u.role, u.first_name, u.last_name, u.veterinarian_id, u.created_at,
                  n.animal_id, n.owner_id, n.name, n.species, n.birth_date
           FROM appointments a
           JOIN users u   ON u.user_id = a.client_id
           JOIN animals n ON n.animal_id = a.animal_id
           WHERE a.status = 'accepted'
             AND a.reminder_sent = 0
             AND a.date >= ?1
             AND a.date <= ?2
           ORDER BY a.date",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![from_str, to_str], |row| {
            Ok((
              RawAppointment::from_row(row, 0)?,
              RawUser::from_row(row, 12)?,
              RawAnimal::from_row(row, 18)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(a, u, n)| {
        Ok(DueReminder {
          appointment: a.into_appointment()?,
          client:      u.into_user()?,
          animal:      n.into_animal()?,
        })
      })
      .collect()
  }

  async fn claim_reminder(&self, appointment_id: Uuid, notification: Notification) -> Result<bool> {
    let appt    = encode_uuid(appointment_id);
    let id      = encode_uuid(notification.notification_id);
    let user    = encode_uuid(notification.user_id);
    let created = encode_dt(notification.created_at);
    let message = notification.message;
    let read    = notification.read;

    let claimed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let flipped = tx.execute(
          "UPDATE appointments SET reminder_sent = 1
           WHERE appointment_id = ?1 AND reminder_sent = 0",
          rusqlite::params![appt],
        )?;
        if flipped == 0 {
          return Ok(false);
        }
        tx.execute(
          &format!("INSERT INTO notifications ({NOTIFICATION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
          rusqlite::params![id, user, appt, message, read, created],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;
    Ok(claimed)
  }

  // ── Chats ─────────────────────────────────────────────────────────────────

  async fn find_or_create_chat(&self, input: NewChat) -> Result<(Chat, bool)> {
    let key          = participant_key(&input.participants);
    let chat_id      = encode_uuid(Uuid::new_v4());
    let vet          = encode_uuid(input.veterinarian_id);
    let participants: Vec<String> = input.participants.iter().copied().map(encode_uuid).collect();
    let name         = input.name;
    let stamp        = encode_dt(Utc::now());

    let (raw, created) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let inserted = tx.execute(
          "INSERT INTO chats (chat_id, participant_key, veterinarian_id, is_group, name,
                              last_message_id, created_at, updated_at)
           VALUES (?1, ?2, ?3, 1, ?4, NULL, ?5, ?5)
           ON CONFLICT (participant_key) DO NOTHING",
          rusqlite::params![chat_id, key, vet, name, stamp],
        )?;
        let created = inserted == 1;
        if created {
          let mut stmt =
            tx.prepare("INSERT INTO chat_participants (chat_id, user_id) VALUES (?1, ?2)")?;
          for p in &participants {
            stmt.execute(rusqlite::params![chat_id, p])?;
          }
        }
        let raw = select_chat(&tx, "participant_key", &key)?
          .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok((raw, created))
      })
      .await?;

    Ok((raw.into_chat()?, created))
  }

  async fn get_chat(&self, id: Uuid) -> Result<Option<Chat>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(select_chat(conn, "chat_id", &id_str)?))
      .await?;
    raw.map(RawChat::into_chat).transpose()
  }

  async fn append_message(&self, input: NewMessage) -> Result<Message> {
    let now = Utc::now();
    let message = Message {
      message_id: Uuid::new_v4(),
      chat_id:    input.chat_id,
      sender_id:  input.sender_id,
      kind:       input.kind,
      content:    input.content,
      read_by:    vec![input.sender_id],
      created_at: now,
      updated_at: now,
    };

    let id      = encode_uuid(message.message_id);
    let chat    = encode_uuid(message.chat_id);
    let sender  = encode_uuid(message.sender_id);
    let kind    = message.kind.as_ref().to_owned();
    let content = message.content.clone();
    let stamp   = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO messages (message_id, chat_id, sender_id, kind, content, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
          rusqlite::params![id, chat, sender, kind, content, stamp],
        )?;
        tx.execute(
          "INSERT INTO message_reads (message_id, user_id, read_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![id, sender, stamp],
        )?;
        tx.execute(
          "UPDATE chats SET last_message_id = ?2, updated_at = ?3 WHERE chat_id = ?1",
          rusqlite::params![chat, id, stamp],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(message)
  }

  async fn list_messages(
    &self,
    chat_id: Uuid,
    limit: usize,
    offset: usize,
  ) -> Result<(Vec<Message>, usize)> {
    let chat   = encode_uuid(chat_id);
    let limit  = i64::try_from(limit).unwrap_or(i64::MAX);
    let offset = i64::try_from(offset).unwrap_or(i64::MAX);

    let (mut raws, total): (Vec<RawMessage>, i64) = self
      .conn
      .call(move |conn| {
        let total: i64 = conn.query_row(
          "SELECT COUNT(*) FROM messages WHERE chat_id = ?1",
          rusqlite::params![chat],
          |r| r.get(0),
        )?;
        let mut stmt = conn.prepare(&format!(
          "SELECT {MESSAGE_COLUMNS} FROM messages m
           WHERE m.chat_id = ?1
           ORDER BY m.created_at DESC, m.rowid DESC
           LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![chat, limit, offset], RawMessage::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((rows, total))
      })
      .await?;

    raws.reverse();
    let messages = raws
      .into_iter()
      .map(RawMessage::into_message)
      .collect::<Result<_>>()?;
    Ok((messages, usize::try_from(total).unwrap_or_default()))
  }

  async fn mark_read(&self, chat_id: Uuid, user_id: Uuid, message_ids: Vec<Uuid>) -> Result<u64> {
    let chat  = encode_uuid(chat_id);
    let user  = encode_uuid(user_id);
    let ids: Vec<String> = message_ids.into_iter().map(encode_uuid).collect();
    let stamp = encode_dt(Utc::now());

    let modified = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut modified = 0u64;
        {
          let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO message_reads (message_id, user_id, read_at)
             SELECT message_id, ?2, ?3 FROM messages
             WHERE message_id = ?1 AND chat_id = ?4 AND sender_id != ?2",
          )?;
          for id in &ids {
            modified += stmt.execute(rusqlite::params![id, user, stamp, chat])? as u64;
          }
        }
        tx.commit()?;
        Ok(modified)
      })
      .await?;
    Ok(modified)
  }

  async fn chat_overviews(&self, user_id: Uuid) -> Result<Vec<ChatOverview>> {
    let user = encode_uuid(user_id);

    let raws: Vec<RawOverview> = self
      .conn
      .call(move |conn| {
        let chat_ids: Vec<String> = {
          let mut stmt = conn.prepare(
            "SELECT c.chat_id FROM chats c
             JOIN chat_participants p ON p.chat_id = c.chat_id
             WHERE p.user_id = ?1
             ORDER BY c.updated_at DESC",
          )?;
          let ids = stmt
            .query_map(rusqlite::params![user], |r| r.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
          ids
        };

        let mut others_stmt = conn.prepare(
          "SELECT u.user_id, u.role, u.first_name, u.last_name, u.veterinarian_id, u.created_at
           FROM chat_participants p
           JOIN users u ON u.user_id = p.user_id
           WHERE p.chat_id = ?1 AND p.user_id != ?2
           ORDER BY u.user_id",
        )?;
        let mut unread_stmt = conn.prepare(
          "SELECT COUNT(*) FROM messages m
           WHERE m.chat_id = ?1
             AND m.sender_id != ?2
             AND NOT EXISTS (
               SELECT 1 FROM message_reads r
               WHERE r.message_id = m.message_id AND r.user_id = ?2
             )",
        )?;

        let mut out = Vec::with_capacity(chat_ids.len());
        for id in chat_ids {
          let Some(chat) = select_chat(conn, "chat_id", &id)? else {
            continue;
          };
          let others = others_stmt
            .query_map(rusqlite::params![id, user], |row| RawUser::from_row(row, 0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          let last_message = match &chat.last_message_id {
            Some(m) => select_message(conn, m)?,
            None => None,
          };
          let unread: i64 = unread_stmt.query_row(rusqlite::params![id, user], |r| r.get(0))?;
          out.push(RawOverview { chat, others, last_message, unread: unread as u64 });
        }
        Ok(out)
      })
      .await?;

    raws
      .into_iter()
      .map(|raw| {
        let chat = raw.chat.into_chat()?;
        Ok(ChatOverview {
          chat_id:      chat.chat_id,
          name:         chat.name,
          participants: raw
            .others
            .into_iter()
            .map(RawUser::into_summary)
            .collect::<Result<_>>()?,
          last_message: raw.last_message.map(RawMessage::into_message).transpose()?,
          unread_count: raw.unread,
          updated_at:   chat.updated_at,
        })
      })
      .collect()
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  async fn list_notifications(&self, user_id: Uuid, limit: usize) -> Result<NotificationFeed> {
    let user  = encode_uuid(user_id);
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let (raws, unread): (Vec<RawNotification>, i64) = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {NOTIFICATION_COLUMNS} FROM notifications
           WHERE user_id = ?1
           ORDER BY created_at DESC
           LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user, limit], RawNotification::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        let unread = conn.query_row(
          "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read = 0",
          rusqlite::params![user],
          |r| r.get(0),
        )?;
        Ok((rows, unread))
      })
      .await?;

    Ok(NotificationFeed {
      notifications: raws
        .into_iter()
        .map(RawNotification::into_notification)
        .collect::<Result<_>>()?,
      unread_count:  unread as u64,
    })
  }

  async fn get_notification(&self, id: Uuid) -> Result<Option<Notification>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(select_notification(conn, &id_str)?))
      .await?;
    raw.map(RawNotification::into_notification).transpose()
  }

  async fn mark_notification_read(&self, id: Uuid) -> Result<Option<Notification>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE notifications SET read = 1 WHERE notification_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(select_notification(conn, &id_str)?)
      })
      .await?;
    raw.map(RawNotification::into_notification).transpose()
  }
}
