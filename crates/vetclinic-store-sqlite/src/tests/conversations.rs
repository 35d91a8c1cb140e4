use std::sync::Arc;

use uuid::Uuid;
use vetclinic_core::{
  Error,
  chat::{Attachment, MAX_TEXT_LEN, MessageKind, canonical_participants},
  conversation::{ConversationResolver, SendMessageRequest},
  store::ClinicStore,
  user::Role,
};

use super::fixtures::{Clinic, RecordingNotifier, clinic, user};
use crate::SqliteStore;

type Resolver = ConversationResolver<SqliteStore, Arc<RecordingNotifier>>;

fn resolver(c: &Clinic) -> (Resolver, Arc<RecordingNotifier>) {
  let notifier = Arc::new(RecordingNotifier::default());
  (ConversationResolver::new(c.store.clone(), notifier.clone()), notifier)
}

fn text_to(receiver: Uuid, body: &str) -> SendMessageRequest {
  SendMessageRequest {
    receiver_id: Some(receiver.to_string()),
    content: Some(body.into()),
    ..Default::default()
  }
}

// ─── Participants ────────────────────────────────────────────────────────────

#[tokio::test]
async fn every_side_resolves_to_the_same_set() {
  let c = clinic().await;
  let (r, _) = resolver(&c);

  let from_client = r
    .resolve_participants(&c.client, Some(c.vet.user_id), None)
    .await
    .unwrap();
  let from_vet = r
    .resolve_participants(&c.vet, Some(c.client.user_id), None)
    .await
    .unwrap();
  let from_secretary = r
    .resolve_participants(&c.secretary, Some(c.client.user_id), Some(c.vet.user_id))
    .await
    .unwrap();

  let expected =
    canonical_participants([c.secretary.user_id, c.vet.user_id, c.client.user_id]);
  assert_eq!(from_client.participants, expected);
  assert_eq!(from_vet.participants, expected);
  assert_eq!(from_secretary.participants, expected);
  assert_eq!(from_vet.client_id, c.client.user_id);
}

#[tokio::test]
async fn canonical_set_does_not_depend_on_secretary_enumeration() {
  let c = clinic().await;
  let second = user(Role::Secretary, "Ines", "Chaabane", Some(c.vet.user_id));
  c.store.put_user(second.clone()).await.unwrap();
  let (r, _) = resolver(&c);

  let resolved = r
    .resolve_participants(&c.client, Some(c.vet.user_id), None)
    .await
    .unwrap();
  let reversed = canonical_participants([
    second.user_id,
    c.secretary.user_id,
    c.client.user_id,
    c.vet.user_id,
  ]);
  assert_eq!(resolved.participants, reversed);
  assert_eq!(resolved.participants.len(), 4);
}

#[tokio::test]
async fn secretary_cannot_write_for_another_veterinarian() {
  let c = clinic().await;
  let (r, _) = resolver(&c);

  let mut req = text_to(c.client.user_id, "hello");
  req.veterinarian_id = Some(c.vet.user_id.to_string());
  let err = r.send_message(&c.outsider, req).await.unwrap_err();
  assert!(matches!(err, Error::Forbidden(_)), "{err:?}");

  let unassigned = user(Role::Secretary, "No", "Body", None);
  c.store.put_user(unassigned.clone()).await.unwrap();
  let err = r
    .send_message(&unassigned, text_to(c.client.user_id, "hello"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Forbidden(_)));

  let err = r
    .send_message(&c.admin, text_to(c.client.user_id, "hello"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Forbidden(_)));
  assert_eq!(c.store.chat_count().await.unwrap(), 0);
}

#[tokio::test]
async fn counterpart_must_exist_with_the_right_role() {
  let c = clinic().await;
  let (r, _) = resolver(&c);

  let err = r
    .send_message(&c.client, text_to(c.other_client.user_id, "hi"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound(_)));

  let err = r
    .send_message(&c.client, SendMessageRequest {
      content: Some("hi".into()),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidInput(_)));

  let err = r
    .send_message(&c.vet, SendMessageRequest {
      receiver_id: Some("not-an-id".into()),
      content: Some("hi".into()),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidInput(_)));
}

// ─── Sending ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_first_messages_share_one_chat() {
  let c = clinic().await;
  let (r, _) = resolver(&c);

  let (a, b) = tokio::join!(
    r.send_message(&c.client, text_to(c.vet.user_id, "from client")),
    r.send_message(&c.vet, text_to(c.client.user_id, "from vet")),
  );
  let (a, b) = (a.unwrap(), b.unwrap());

  assert_eq!(a.chat.chat_id, b.chat.chat_id);
  assert!(a.created ^ b.created);
  assert_eq!(c.store.chat_count().await.unwrap(), 1);

  let history = r.messages(&c.secretary, a.chat.chat_id, 1).await.unwrap();
  assert_eq!(history.total, 2);
}

#[tokio::test]
async fn send_notifies_others_and_announces_new_chats_once() {
  let c = clinic().await;
  let (r, events) = resolver(&c);

  let sent = r
    .send_message(&c.client, text_to(c.vet.user_id, "  Rex is limping  "))
    .await
    .unwrap();
  assert!(sent.created);
  assert_eq!(sent.message.content, "Rex is limping");
  assert_eq!(sent.message.kind, MessageKind::Text);
  assert_eq!(sent.message.read_by, vec![c.client.user_id]);
  assert_eq!(sent.chat.last_message_id, Some(sent.message.message_id));
  assert_eq!(sent.chat.name, "client→veterinarian discussion");

  assert_eq!(events.names_for(c.client.user_id), vec!["new_chat"]);
  assert_eq!(events.names_for(c.vet.user_id), vec!["new_message", "new_chat"]);
  assert_eq!(events.names_for(c.secretary.user_id), vec!["new_message", "new_chat"]);
  assert!(events.names_for(c.other_vet.user_id).is_empty());

  events.clear();
  let reply = r
    .send_message(&c.secretary, text_to(c.client.user_id, "Come by at 10"))
    .await
    .unwrap();
  assert!(!reply.created);
  assert_eq!(reply.chat.chat_id, sent.chat.chat_id);
  assert_eq!(events.names_for(c.client.user_id), vec!["new_message"]);
  assert!(events.names_for(c.secretary.user_id).is_empty());
}

#[tokio::test]
async fn empty_or_oversized_text_is_rejected() {
  let c = clinic().await;
  let (r, _) = resolver(&c);

  let err = r
    .send_message(&c.client, text_to(c.vet.user_id, "   "))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidInput(_)));

  let long = "a".repeat(MAX_TEXT_LEN + 1);
  let err = r
    .send_message(&c.client, text_to(c.vet.user_id, &long))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidInput(_)));

  assert_eq!(c.store.chat_count().await.unwrap(), 0);

  let exact = "a".repeat(MAX_TEXT_LEN);
  r.send_message(&c.client, text_to(c.vet.user_id, &exact))
    .await
    .unwrap();
}

#[tokio::test]
async fn attachments_pick_their_kind_from_the_content_type() {
  let c = clinic().await;
  let (r, _) = resolver(&c);

  let sent = r
    .send_message(&c.client, SendMessageRequest {
      receiver_id: Some(c.vet.user_id.to_string()),
      content: Some("ignored caption".into()),
      attachment: Some(Attachment {
        url:          "/uploads/chats/xray.png".into(),
        content_type: "image/png".into(),
        stored_path:  None,
      }),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(sent.message.kind, MessageKind::Image);
  assert_eq!(sent.message.content, "/uploads/chats/xray.png");
}

#[tokio::test]
async fn rejected_uploads_are_removed() {
  let c = clinic().await;
  let (r, _) = resolver(&c);

  let path = std::env::temp_dir().join(format!("vetclinic-upload-{}", Uuid::new_v4()));
  tokio::fs::write(&path, b"bytes").await.unwrap();

  let err = r
    .send_message(&c.client, SendMessageRequest {
      receiver_id: Some(c.vet.user_id.to_string()),
      attachment: Some(Attachment {
        url:          "  ".into(),
        content_type: "application/pdf".into(),
        stored_path:  Some(path.clone()),
      }),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidInput(_)));
  assert!(!path.exists());
}

// ─── Reading ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn mark_as_read_is_idempotent() {
  let c = clinic().await;
  let (r, events) = resolver(&c);

  let first = r
    .send_message(&c.client, text_to(c.vet.user_id, "one"))
    .await
    .unwrap();
  let second = r
    .send_message(&c.client, text_to(c.vet.user_id, "two"))
    .await
    .unwrap();
  let chat_id = first.chat.chat_id;
  let ids = vec![first.message.message_id, second.message.message_id];
  events.clear();

  let receipt = r.mark_as_read(&c.vet, chat_id, ids.clone()).await.unwrap();
  assert_eq!(receipt.modified, 2);
  let after_first = r.messages(&c.vet, chat_id, 1).await.unwrap();

  let receipt = r.mark_as_read(&c.vet, chat_id, ids.clone()).await.unwrap();
  assert_eq!(receipt.modified, 0);
  let after_second = r.messages(&c.vet, chat_id, 1).await.unwrap();

  let read_sets = |p: &vetclinic_core::page::Page<vetclinic_core::chat::Message>| {
    p.items.iter().map(|m| m.read_by.clone()).collect::<Vec<_>>()
  };
  assert_eq!(read_sets(&after_first), read_sets(&after_second));
  assert!(after_second.items.iter().all(|m| m.read_by.contains(&c.vet.user_id)));

  // The sender's own messages are never counted.
  let receipt = r.mark_as_read(&c.client, chat_id, ids).await.unwrap();
  assert_eq!(receipt.modified, 0);

  assert_eq!(events.names_for(c.client.user_id), vec!["messages_read", "messages_read"]);
  assert!(!events.names_for(c.vet.user_id).is_empty());
}

#[tokio::test]
async fn only_participants_read_a_chat() {
  let c = clinic().await;
  let (r, _) = resolver(&c);
  let sent = r
    .send_message(&c.client, text_to(c.vet.user_id, "private"))
    .await
    .unwrap();

  let err = r
    .mark_as_read(&c.other_client, sent.chat.chat_id, vec![sent.message.message_id])
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Forbidden(_)));

  let err = r.messages(&c.outsider, sent.chat.chat_id, 1).await.unwrap_err();
  assert!(matches!(err, Error::Forbidden(_)));

  let err = r.mark_as_read(&c.vet, Uuid::new_v4(), vec![]).await.unwrap_err();
  assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn message_pages_start_from_the_newest() {
  let c = clinic().await;
  let (r, _) = resolver(&c);
  let mut chat_id = None;
  for i in 0..25 {
    let sent = r
      .send_message(&c.client, text_to(c.vet.user_id, &format!("m{i:02}")))
      .await
      .unwrap();
    chat_id = Some(sent.chat.chat_id);
  }
  let chat_id = chat_id.unwrap();

  let first = r.messages(&c.vet, chat_id, 1).await.unwrap();
  assert_eq!(first.items.len(), 20);
  assert_eq!(first.items.first().unwrap().content, "m05");
  assert_eq!(first.items.last().unwrap().content, "m24");
  assert_eq!(first.total_pages, 2);

  let second = r.messages(&c.vet, chat_id, 2).await.unwrap();
  let contents: Vec<_> = second.items.iter().map(|m| m.content.as_str()).collect();
  assert_eq!(contents, vec!["m00", "m01", "m02", "m03", "m04"]);

  let far = r.messages(&c.vet, chat_id, usize::MAX).await.unwrap();
  assert!(far.items.is_empty());
  assert_eq!(far.total, 25);
}

#[tokio::test]
async fn conversations_carry_unread_counts_and_filter_by_name() {
  let c = clinic().await;
  let (r, _) = resolver(&c);

  r.send_message(&c.client, text_to(c.vet.user_id, "hello"))
    .await
    .unwrap();
  r.send_message(&c.client, text_to(c.other_vet.user_id, "hello too"))
    .await
    .unwrap();
  r.send_message(&c.vet, text_to(c.client.user_id, "welcome"))
    .await
    .unwrap();

  let mine = r.conversations(&c.client, None, 1).await.unwrap();
  assert_eq!(mine.total, 2);
  // Most recently active first.
  let top = &mine.items[0];
  assert!(top.participants.iter().any(|p| p.user_id == c.vet.user_id));
  assert!(top.participants.iter().all(|p| p.user_id != c.client.user_id));
  assert_eq!(top.unread_count, 1);
  assert_eq!(top.last_message.as_ref().unwrap().content, "welcome");

  let vets_view = r.conversations(&c.vet, None, 1).await.unwrap();
  assert_eq!(vets_view.items[0].unread_count, 1);

  let by_last = r.conversations(&c.client, Some("mansour"), 1).await.unwrap();
  assert_eq!(by_last.total, 1);
  let by_full = r.conversations(&c.client, Some("Sami Gharbi"), 1).await.unwrap();
  assert_eq!(by_full.total, 1);
  // Secretaries are searchable from the client side.
  let by_secretary = r.conversations(&c.client, Some("haddad"), 1).await.unwrap();
  assert_eq!(by_secretary.total, 1);

  // Staff search among clients only.
  let staff_search = r.conversations(&c.vet, Some("haddad"), 1).await.unwrap();
  assert_eq!(staff_search.total, 0);
  let staff_hit = r.conversations(&c.secretary, Some("amel"), 1).await.unwrap();
  assert_eq!(staff_hit.total, 1);
}
