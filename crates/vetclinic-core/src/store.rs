//! The `ClinicStore` trait and the outcome types of its conditional writes.
//!
//! The trait is implemented by storage backends (e.g.
//! `vetclinic-store-sqlite`). The scheduler, the conversation resolver and the
//! HTTP layer depend on this abstraction, not on a concrete backend.
//!
//! Every check-then-act sequence the domain needs (book if the slot is free,
//! create a chat unless one exists for the same participants, claim a reminder
//! once) is a single method here, so a backend can run it atomically.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  appointment::{
    Appointment, AppointmentChanges, AppointmentStatus, ConflictWindow,
    NewAppointment,
  },
  chat::{Chat, ChatOverview, Message, NewChat, NewMessage},
  notification::{Notification, NotificationFeed},
  user::{Animal, Role, User},
};

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Result of [`ClinicStore::book_appointment`].
#[derive(Debug, Clone)]
pub enum BookingOutcome {
  Booked(Appointment),
  /// Ids of the appointments occupying the window.
  Conflict(Vec<Uuid>),
}

/// Result of [`ClinicStore::amend_appointment`].
#[derive(Debug, Clone)]
pub enum AmendOutcome {
  Amended(Appointment),
  NotFound,
  NotPending(AppointmentStatus),
  Conflict(Vec<Uuid>),
}

/// Result of [`ClinicStore::transition_appointment`].
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
  Transitioned(Appointment),
  NotFound,
  NotPending(AppointmentStatus),
}

/// Whose agenda to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgendaOwner {
  Client(Uuid),
  Veterinarian(Uuid),
}

/// An accepted appointment due for a reminder, with what the message needs.
#[derive(Debug, Clone)]
pub struct DueReminder {
  pub appointment: Appointment,
  pub client:      User,
  pub animal:      Animal,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a clinic store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ClinicStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Directory ─────────────────────────────────────────────────────────

  /// Insert or replace a user record.
  fn put_user(
    &self,
    user: User,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Insert or replace an animal record.
  fn put_animal(
    &self,
    animal: Animal,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn exists_with_role(
    &self,
    id: Uuid,
    role: Role,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Ids of the secretaries currently attached to `veterinarian_id`.
  fn secretaries_of(
    &self,
    veterinarian_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  /// The animal `animal_id`, only if it belongs to `owner_id`.
  fn find_owned_animal(
    &self,
    animal_id: Uuid,
    owner_id: Uuid,
  ) -> impl Future<Output = Result<Option<Animal>, Self::Error>> + Send + '_;

  // ── Appointments ──────────────────────────────────────────────────────

  /// Insert a `Pending` appointment unless another appointment of the same
  /// veterinarian lies inside `window` around its date. Check and insert are
  /// one atomic step.
  fn book_appointment(
    &self,
    input: NewAppointment,
    window: ConflictWindow,
  ) -> impl Future<Output = Result<BookingOutcome, Self::Error>> + Send + '_;

  fn get_appointment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Appointment>, Self::Error>> + Send + '_;

  /// Apply `changes` to a `Pending` appointment. When the date changes, other
  /// appointments of the same veterinarian inside `window` around the new
  /// date block the update. Status check, conflict check and write are one
  /// atomic step.
  fn amend_appointment(
    &self,
    id: Uuid,
    changes: AppointmentChanges,
    window: ConflictWindow,
  ) -> impl Future<Output = Result<AmendOutcome, Self::Error>> + Send + '_;

  /// Move a `Pending` appointment to `to`.
  fn transition_appointment(
    &self,
    id: Uuid,
    to: AppointmentStatus,
  ) -> impl Future<Output = Result<TransitionOutcome, Self::Error>> + Send + '_;

  /// Hard-delete. Returns `false` if nothing was deleted.
  fn delete_appointment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// All `Pending` and `Accepted` appointments of `owner`, unordered.
  fn list_agenda(
    &self,
    owner: AgendaOwner,
  ) -> impl Future<Output = Result<Vec<Appointment>, Self::Error>> + Send + '_;

  /// Distinct clients with at least one `Accepted` appointment with the
  /// veterinarian.
  fn clients_with_accepted(
    &self,
    veterinarian_id: Uuid,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  /// Distinct animals of `client_id` with at least one `Accepted`
  /// appointment with the veterinarian.
  fn animals_with_accepted(
    &self,
    veterinarian_id: Uuid,
    client_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Animal>, Self::Error>> + Send + '_;

  /// Accepted, not-yet-reminded appointments dated within `[from, to]`.
  fn due_reminders(
    &self,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<DueReminder>, Self::Error>> + Send + '_;

  /// Flip the appointment's reminder flag and persist `notification`, but only
  /// if the flag was still unset. Returns whether this call claimed it.
  fn claim_reminder(
    &self,
    appointment_id: Uuid,
    notification: Notification,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Chats ─────────────────────────────────────────────────────────────

  /// Return the chat whose participant set equals `input.participants`,
  /// creating it if none exists. The flag is `true` when this call created
  /// it. Concurrent calls for the same set yield the same chat.
  fn find_or_create_chat(
    &self,
    input: NewChat,
  ) -> impl Future<Output = Result<(Chat, bool), Self::Error>> + Send + '_;

  fn get_chat(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Chat>, Self::Error>> + Send + '_;

  /// Persist a message (read by its sender) and make it the chat's last
  /// message.
  fn append_message(
    &self,
    input: NewMessage,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_;

  /// A window of a chat's messages counted from the newest, returned in
  /// ascending creation order, plus the chat's total message count.
  fn list_messages(
    &self,
    chat_id: Uuid,
    limit: usize,
    offset: usize,
  ) -> impl Future<Output = Result<(Vec<Message>, usize), Self::Error>> + Send + '_;

  /// Add `user_id` to the read-by set of each listed message of the chat that
  /// the user neither sent nor already read. Returns how many changed.
  fn mark_read(
    &self,
    chat_id: Uuid,
    user_id: Uuid,
    message_ids: Vec<Uuid>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Every chat `user_id` takes part in, most recently updated first.
  fn chat_overviews(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ChatOverview>, Self::Error>> + Send + '_;

  // ── Notifications ─────────────────────────────────────────────────────

  fn list_notifications(
    &self,
    user_id: Uuid,
    limit: usize,
  ) -> impl Future<Output = Result<NotificationFeed, Self::Error>> + Send + '_;

  fn get_notification(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Notification>, Self::Error>> + Send + '_;

  fn mark_notification_read(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Notification>, Self::Error>> + Send + '_;
}
