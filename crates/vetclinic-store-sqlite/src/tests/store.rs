use chrono::{TimeDelta, TimeZone, Utc};
use uuid::Uuid;
use vetclinic_core::{
  appointment::{AppointmentKind, AppointmentStatus, ConflictWindow, NewAppointment},
  chat::{MessageKind, NewChat, NewMessage, canonical_participants},
  store::{AmendOutcome, BookingOutcome, ClinicStore, TransitionOutcome},
  user::Role,
};

use super::fixtures::{clinic, store, user};

fn new_appointment(c: &super::fixtures::Clinic, hour: u32, minute: u32) -> NewAppointment {
  NewAppointment {
    date:             Utc.with_ymd_and_hms(2025, 3, 1, hour, minute, 0).unwrap(),
    client_id:        c.client.user_id,
    veterinarian_id:  c.vet.user_id,
    animal_id:        c.rex.animal_id,
    kind:             AppointmentKind::Clinic,
    services:         vec!["vaccination".into()],
    case_description: "annual shots".into(),
  }
}

async fn booked(c: &super::fixtures::Clinic, hour: u32, minute: u32) -> Uuid {
  match c
    .store
    .book_appointment(new_appointment(c, hour, minute), ConflictWindow::creation(29))
    .await
    .unwrap()
  {
    BookingOutcome::Booked(a) => a.appointment_id,
    BookingOutcome::Conflict(ids) => panic!("unexpected conflict with {ids:?}"),
  }
}

// ─── Directory ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn put_and_get_user() {
  let s = store().await;
  let u = user(Role::Secretary, "Nour", "Haddad", Some(Uuid::new_v4()));
  s.put_user(u.clone()).await.unwrap();

  let fetched = s.get_user(u.user_id).await.unwrap().unwrap();
  assert_eq!(fetched.role, Role::Secretary);
  assert_eq!(fetched.veterinarian_id, u.veterinarian_id);
  assert!(s.get_user(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn put_user_updates_in_place() {
  let s = store().await;
  let mut u = user(Role::Client, "Amel", "Trabelsi", None);
  s.put_user(u.clone()).await.unwrap();
  u.last_name = "Jebali".into();
  s.put_user(u.clone()).await.unwrap();

  let fetched = s.get_user(u.user_id).await.unwrap().unwrap();
  assert_eq!(fetched.last_name, "Jebali");
}

#[tokio::test]
async fn role_lookup_and_secretaries() {
  let c = clinic().await;
  assert!(c.store.exists_with_role(c.vet.user_id, Role::Veterinarian).await.unwrap());
  assert!(!c.store.exists_with_role(c.client.user_id, Role::Veterinarian).await.unwrap());

  let secs = c.store.secretaries_of(c.vet.user_id).await.unwrap();
  assert_eq!(secs, vec![c.secretary.user_id]);
  assert!(c.store.secretaries_of(c.client.user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn animals_are_found_only_for_their_owner() {
  let c = clinic().await;
  let found = c
    .store
    .find_owned_animal(c.rex.animal_id, c.client.user_id)
    .await
    .unwrap();
  assert_eq!(found.unwrap().name, "Rex");
  assert!(
    c.store
      .find_owned_animal(c.rex.animal_id, c.other_client.user_id)
      .await
      .unwrap()
      .is_none()
  );
}

// ─── Appointments ────────────────────────────────────────────────────────────

#[tokio::test]
async fn booking_roundtrips_every_field() {
  let c = clinic().await;
  let id = booked(&c, 9, 0).await;

  let a = c.store.get_appointment(id).await.unwrap().unwrap();
  assert_eq!(a.status, AppointmentStatus::Pending);
  assert_eq!(a.kind, AppointmentKind::Clinic);
  assert_eq!(a.services, vec!["vaccination".to_owned()]);
  assert_eq!(a.case_description, "annual shots");
  assert!(!a.reminder_sent);
  assert_eq!(a.date, Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap());
}

#[tokio::test]
async fn creation_window_counts_only_accepted_appointments() {
  let c = clinic().await;
  let first = booked(&c, 9, 0).await;
  // Pending neighbours do not block.
  booked(&c, 9, 10).await;

  c.store
    .transition_appointment(first, AppointmentStatus::Accepted)
    .await
    .unwrap();

  let outcome = c
    .store
    .book_appointment(new_appointment(&c, 9, 29), ConflictWindow::creation(29))
    .await
    .unwrap();
  assert!(matches!(outcome, BookingOutcome::Conflict(ids) if ids == vec![first]));

  let outcome = c
    .store
    .book_appointment(new_appointment(&c, 9, 30), ConflictWindow::creation(29))
    .await
    .unwrap();
  assert!(matches!(outcome, BookingOutcome::Booked(_)));
}

#[tokio::test]
async fn conflicts_are_scoped_to_the_veterinarian() {
  let c = clinic().await;
  let first = booked(&c, 9, 0).await;
  c.store
    .transition_appointment(first, AppointmentStatus::Accepted)
    .await
    .unwrap();

  let mut other = new_appointment(&c, 9, 0);
  other.veterinarian_id = c.other_vet.user_id;
  let outcome = c
    .store
    .book_appointment(other, ConflictWindow::creation(29))
    .await
    .unwrap();
  assert!(matches!(outcome, BookingOutcome::Booked(_)));
}

#[tokio::test]
async fn amend_checks_status_and_window_but_not_itself() {
  let c = clinic().await;
  let a = booked(&c, 9, 0).await;
  let b = booked(&c, 11, 0).await;
  let window = ConflictWindow::update(20);

  // Moving by a few minutes does not collide with itself.
  let changes = vetclinic_core::appointment::AppointmentChanges {
    date: Some(Utc.with_ymd_and_hms(2025, 3, 1, 9, 5, 0).unwrap()),
    ..Default::default()
  };
  let outcome = c.store.amend_appointment(a, changes, window).await.unwrap();
  assert!(matches!(outcome, AmendOutcome::Amended(ref x) if x.date.format("%H:%M").to_string() == "09:05"));

  let changes = vetclinic_core::appointment::AppointmentChanges {
    date: Some(Utc.with_ymd_and_hms(2025, 3, 1, 9, 20, 0).unwrap()),
    ..Default::default()
  };
  let outcome = c.store.amend_appointment(b, changes, window).await.unwrap();
  assert!(matches!(outcome, AmendOutcome::Conflict(ids) if ids == vec![a]));

  c.store
    .transition_appointment(b, AppointmentStatus::Rejected)
    .await
    .unwrap();
  let changes = vetclinic_core::appointment::AppointmentChanges {
    case_description: Some("changed".into()),
    ..Default::default()
  };
  let outcome = c.store.amend_appointment(b, changes.clone(), window).await.unwrap();
  assert!(matches!(outcome, AmendOutcome::NotPending(AppointmentStatus::Rejected)));

  let outcome = c
    .store
    .amend_appointment(Uuid::new_v4(), changes, window)
    .await
    .unwrap();
  assert!(matches!(outcome, AmendOutcome::NotFound));
}

#[tokio::test]
async fn transitions_only_leave_pending() {
  let c = clinic().await;
  let id = booked(&c, 9, 0).await;

  let first = c
    .store
    .transition_appointment(id, AppointmentStatus::Accepted)
    .await
    .unwrap();
  assert!(matches!(first, TransitionOutcome::Transitioned(ref a) if a.status == AppointmentStatus::Accepted));

  let second = c
    .store
    .transition_appointment(id, AppointmentStatus::Rejected)
    .await
    .unwrap();
  assert!(matches!(second, TransitionOutcome::NotPending(AppointmentStatus::Accepted)));

  let missing = c
    .store
    .transition_appointment(Uuid::new_v4(), AppointmentStatus::Accepted)
    .await
    .unwrap();
  assert!(matches!(missing, TransitionOutcome::NotFound));
}

#[tokio::test]
async fn delete_reports_whether_a_row_went_away() {
  let c = clinic().await;
  let id = booked(&c, 9, 0).await;
  assert!(c.store.delete_appointment(id).await.unwrap());
  assert!(!c.store.delete_appointment(id).await.unwrap());
  assert!(c.store.get_appointment(id).await.unwrap().is_none());
}

// ─── Chats & messages ────────────────────────────────────────────────────────

#[tokio::test]
async fn find_or_create_returns_the_same_chat_for_the_same_set() {
  let c = clinic().await;
  let participants = canonical_participants([c.client.user_id, c.vet.user_id]);
  let input = NewChat {
    participants:    participants.clone(),
    veterinarian_id: c.vet.user_id,
    name:            "client→veterinarian discussion".into(),
  };

  let (first, created) = c.store.find_or_create_chat(input.clone()).await.unwrap();
  assert!(created);
  assert_eq!(first.participants, participants);
  assert!(first.is_group);

  let (second, created) = c.store.find_or_create_chat(input).await.unwrap();
  assert!(!created);
  assert_eq!(second.chat_id, first.chat_id);
  assert_eq!(c.store.chat_count().await.unwrap(), 1);
}

#[tokio::test]
async fn messages_page_from_the_newest_and_read_oldest_first() {
  let c = clinic().await;
  let (chat, _) = c
    .store
    .find_or_create_chat(NewChat {
      participants:    canonical_participants([c.client.user_id, c.vet.user_id]),
      veterinarian_id: c.vet.user_id,
      name:            "chat".into(),
    })
    .await
    .unwrap();

  for i in 0..5 {
    c.store
      .append_message(NewMessage {
        chat_id:   chat.chat_id,
        sender_id: c.client.user_id,
        kind:      MessageKind::Text,
        content:   format!("m{i}"),
      })
      .await
      .unwrap();
  }

  let (newest, total) = c.store.list_messages(chat.chat_id, 2, 0).await.unwrap();
  assert_eq!(total, 5);
  let contents: Vec<_> = newest.iter().map(|m| m.content.as_str()).collect();
  assert_eq!(contents, vec!["m3", "m4"]);
  assert_eq!(newest[0].read_by, vec![c.client.user_id]);

  let (oldest, _) = c.store.list_messages(chat.chat_id, 2, 4).await.unwrap();
  assert_eq!(oldest.len(), 1);
  assert_eq!(oldest[0].content, "m0");

  let (beyond, total) = c.store.list_messages(chat.chat_id, 2, usize::MAX).await.unwrap();
  assert!(beyond.is_empty());
  assert_eq!(total, 5);
  let (all, _) = c.store.list_messages(chat.chat_id, usize::MAX, 0).await.unwrap();
  assert_eq!(all.len(), 5);

  let chat = c.store.get_chat(chat.chat_id).await.unwrap().unwrap();
  assert_eq!(chat.last_message_id, Some(newest[1].message_id));
}

#[tokio::test]
async fn notifications_cascade_with_their_appointment() {
  let c = clinic().await;
  let id = booked(&c, 9, 0).await;
  let n = vetclinic_core::notification::Notification {
    notification_id: Uuid::new_v4(),
    user_id:         c.client.user_id,
    appointment_id:  id,
    message:         "hello".into(),
    read:            false,
    created_at:      Utc::now() - TimeDelta::minutes(1),
  };
  assert!(c.store.claim_reminder(id, n.clone()).await.unwrap());
  assert!(c.store.get_notification(n.notification_id).await.unwrap().is_some());

  c.store.delete_appointment(id).await.unwrap();
  assert!(c.store.get_notification(n.notification_id).await.unwrap().is_none());
}
