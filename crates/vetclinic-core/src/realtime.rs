//! Outbound realtime events and the [`Notifier`] seam.
//!
//! Delivery is best-effort: a notifier never reports failure back to the
//! operation that produced the event. The persisted record stays the source
//! of truth.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::{
  chat::{Chat, Message},
  notification::Notification,
};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Event {
  NewMessage {
    chat_id: Uuid,
    message: Message,
  },
  NewChat {
    chat: Chat,
  },
  MessagesRead {
    chat_id:     Uuid,
    message_ids: Vec<Uuid>,
    read_by:     Uuid,
  },
  Notification {
    notification: Notification,
  },
}

impl Event {
  pub fn name(&self) -> &'static str {
    match self {
      Self::NewMessage { .. } => "new_message",
      Self::NewChat { .. } => "new_chat",
      Self::MessagesRead { .. } => "messages_read",
      Self::Notification { .. } => "notification",
    }
  }
}

/// Fire-and-forget sink for realtime events.
pub trait Notifier: Send + Sync {
  fn emit(&self, recipient: Uuid, event: Arc<Event>);

  fn emit_all(&self, recipients: &[Uuid], event: Event) {
    let event = Arc::new(event);
    for &r in recipients {
      self.emit(r, Arc::clone(&event));
    }
  }
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
  fn emit(&self, recipient: Uuid, event: Arc<Event>) {
    (**self).emit(recipient, event)
  }
}
