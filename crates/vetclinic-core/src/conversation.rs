//! The conversation resolver: who a message is for, which chat it lands in,
//! and who hears about it.
//!
//! A chat is keyed by its participant set. Sending never names a chat; the
//! resolver derives the set from the sender's role and the counterpart, then
//! finds or creates the one chat with exactly that set.

use std::{path::Path, sync::Arc};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  chat::{
    Attachment, Chat, ChatOverview, MAX_TEXT_LEN, Message, MessageKind, NewChat,
    NewMessage, canonical_participants,
  },
  id::parse_opt_id,
  page::Page,
  realtime::{Event, Notifier},
  store::ClinicStore,
  user::{Role, User},
};

pub const CONVERSATIONS_PAGE_SIZE: usize = 10;
pub const MESSAGES_PAGE_SIZE: usize = 20;

// ─── Requests & results ──────────────────────────────────────────────────────

/// A message as submitted by a sender.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendMessageRequest {
  /// The veterinarian when a client writes; the client when staff write.
  pub receiver_id:     Option<String>,
  /// Veterinarian a staff member speaks for. Must be their own when given.
  pub veterinarian_id: Option<String>,
  pub content:         Option<String>,
  pub attachment:      Option<Attachment>,
}

/// The participant set a send resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedParticipants {
  pub client_id:       Uuid,
  pub veterinarian_id: Uuid,
  /// Canonical order.
  pub participants:    Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SentMessage {
  pub message: Message,
  pub chat:    Chat,
  /// Whether this send created the chat.
  pub created: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadReceipt {
  pub modified: u64,
}

// ─── Resolver ────────────────────────────────────────────────────────────────

pub struct ConversationResolver<S, N> {
  store:    Arc<S>,
  notifier: N,
}

impl<S: ClinicStore, N: Notifier> ConversationResolver<S, N> {
  pub fn new(store: Arc<S>, notifier: N) -> Self {
    Self { store, notifier }
  }

  /// Derive the canonical participant set for a message from `sender`.
  ///
  /// The set is the client, the veterinarian anchor, and every secretary
  /// currently attached to that veterinarian.
  pub async fn resolve_participants(
    &self,
    sender: &User,
    counterpart: Option<Uuid>,
    on_behalf_of: Option<Uuid>,
  ) -> Result<ResolvedParticipants> {
    let (client_id, veterinarian_id) = match sender.role {
      Role::Client => {
        let vet = counterpart.ok_or_else(|| Error::invalid("veterinarian id required"))?;
        self.require_role(vet, Role::Veterinarian).await?;
        (sender.user_id, vet)
      }
      Role::Veterinarian | Role::Secretary => {
        let anchor = match sender.role {
          Role::Veterinarian => sender.user_id,
          _ => sender
            .veterinarian_id
            .ok_or_else(|| Error::forbidden("secretary is not assigned to a veterinarian"))?,
        };
        if on_behalf_of.is_some_and(|v| v != anchor) {
          return Err(Error::forbidden("you cannot write on behalf of this veterinarian"));
        }
        let client = counterpart.ok_or_else(|| Error::invalid("client id required"))?;
        self.require_role(client, Role::Client).await?;
        (client, anchor)
      }
      Role::Admin => return Err(Error::forbidden("role not allowed to send messages")),
    };

    let secretaries = self
      .store
      .secretaries_of(veterinarian_id)
      .await
      .map_err(Error::internal)?;
    let participants =
      canonical_participants([client_id, veterinarian_id].into_iter().chain(secretaries));

    Ok(ResolvedParticipants { client_id, veterinarian_id, participants })
  }

  /// The chat for `resolved`, created if needed. The flag tells whether this
  /// call created it.
  pub async fn find_or_create(
    &self,
    sender: &User,
    resolved: &ResolvedParticipants,
  ) -> Result<(Chat, bool)> {
    let name = match sender.role {
      Role::Client => "client→veterinarian discussion",
      _ => "veterinarian→client discussion",
    };
    self
      .store
      .find_or_create_chat(NewChat {
        participants:    resolved.participants.clone(),
        veterinarian_id: resolved.veterinarian_id,
        name:            name.to_owned(),
      })
      .await
      .map_err(Error::internal)
  }

  /// Persist a message and notify the other participants.
  ///
  /// On failure, a stored attachment file is removed.
  pub async fn send_message(&self, sender: &User, req: SendMessageRequest) -> Result<SentMessage> {
    let stored = req.attachment.as_ref().and_then(|a| a.stored_path.clone());
    let result = self.deliver(sender, req).await;
    if let (Err(_), Some(path)) = (&result, stored) {
      discard_upload(&path).await;
    }
    result
  }

  async fn deliver(&self, sender: &User, req: SendMessageRequest) -> Result<SentMessage> {
    let (kind, content) = match &req.attachment {
      Some(a) => (MessageKind::from_content_type(&a.content_type), a.url.trim().to_owned()),
      None => (
        MessageKind::Text,
        req.content.as_deref().map(str::trim).unwrap_or_default().to_owned(),
      ),
    };
    if content.is_empty() {
      return Err(Error::invalid("message content is empty"));
    }
    if kind == MessageKind::Text && content.chars().count() > MAX_TEXT_LEN {
      return Err(Error::invalid(format!(
        "message exceeds {MAX_TEXT_LEN} characters"
      )));
    }

    let counterpart = parse_opt_id(req.receiver_id.as_deref(), "receiver")?;
    let on_behalf_of = parse_opt_id(req.veterinarian_id.as_deref(), "veterinarian")?;

    let resolved = self.resolve_participants(sender, counterpart, on_behalf_of).await?;
    let (chat, created) = self.find_or_create(sender, &resolved).await?;

    let message = self
      .store
      .append_message(NewMessage {
        chat_id: chat.chat_id,
        sender_id: sender.user_id,
        kind,
        content,
      })
      .await
      .map_err(Error::internal)?;

    // Reflect the append in the returned chat without a second read.
    let chat = Chat {
      last_message_id: Some(message.message_id),
      updated_at: message.created_at,
      ..chat
    };

    let others: Vec<Uuid> = chat
      .participants
      .iter()
      .copied()
      .filter(|p| *p != sender.user_id)
      .collect();
    self.notifier.emit_all(&others, Event::NewMessage {
      chat_id: chat.chat_id,
      message: message.clone(),
    });
    if created {
      tracing::info!(chat_id = %chat.chat_id, participants = chat.participants.len(), "chat created");
      self
        .notifier
        .emit_all(&chat.participants, Event::NewChat { chat: chat.clone() });
    }

    Ok(SentMessage { message, chat, created })
  }

  /// Mark `message_ids` of the chat as read by `user`. Messages the user sent
  /// or already read are left alone.
  pub async fn mark_as_read(
    &self,
    user: &User,
    chat_id: Uuid,
    message_ids: Vec<Uuid>,
  ) -> Result<ReadReceipt> {
    let chat = self.participant_chat(user, chat_id).await?;

    let modified = self
      .store
      .mark_read(chat_id, user.user_id, message_ids.clone())
      .await
      .map_err(Error::internal)?;

    let others: Vec<Uuid> = chat
      .participants
      .iter()
      .copied()
      .filter(|p| *p != user.user_id)
      .collect();
    self.notifier.emit_all(&others, Event::MessagesRead {
      chat_id,
      message_ids,
      read_by: user.user_id,
    });

    Ok(ReadReceipt { modified })
  }

  /// The user's chats, most recently active first.
  ///
  /// `search` keeps chats where a counterpart's first, last or full name
  /// contains the term, ignoring case. Clients search among staff, staff
  /// among clients.
  pub async fn conversations(
    &self,
    user: &User,
    search: Option<&str>,
    page: usize,
  ) -> Result<Page<ChatOverview>> {
    let mut all = self
      .store
      .chat_overviews(user.user_id)
      .await
      .map_err(Error::internal)?;

    if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
      let term = term.to_lowercase();
      let wanted = |role: Role| match user.role {
        Role::Client => role.is_staff(),
        Role::Veterinarian | Role::Secretary => role == Role::Client,
        Role::Admin => true,
      };
      all.retain(|overview| {
        overview.participants.iter().any(|p| {
          wanted(p.role)
            && [&p.first_name, &p.last_name, &format!("{} {}", p.first_name, p.last_name)]
              .iter()
              .any(|n| n.to_lowercase().contains(&term))
        })
      });
    }

    Ok(Page::slice(all, page, CONVERSATIONS_PAGE_SIZE))
  }

  /// One page of a chat's history. Page 1 holds the newest messages; each
  /// page reads oldest to newest.
  pub async fn messages(&self, user: &User, chat_id: Uuid, page: usize) -> Result<Page<Message>> {
    self.participant_chat(user, chat_id).await?;
    let (items, total) = self
      .store
      .list_messages(chat_id, MESSAGES_PAGE_SIZE, Page::<Message>::offset(page, MESSAGES_PAGE_SIZE))
      .await
      .map_err(Error::internal)?;
    Ok(Page::from_parts(items, page, MESSAGES_PAGE_SIZE, total))
  }

  async fn participant_chat(&self, user: &User, chat_id: Uuid) -> Result<Chat> {
    let chat = self
      .store
      .get_chat(chat_id)
      .await
      .map_err(Error::internal)?
      .ok_or_else(|| Error::not_found("chat not found"))?;
    if !chat.has_participant(user.user_id) {
      return Err(Error::forbidden("not a participant of this chat"));
    }
    Ok(chat)
  }

  async fn require_role(&self, id: Uuid, role: Role) -> Result<()> {
    let ok = self
      .store
      .exists_with_role(id, role)
      .await
      .map_err(Error::internal)?;
    if ok {
      Ok(())
    } else {
      Err(Error::not_found(format!("{} not found", role.as_ref())))
    }
  }
}

async fn discard_upload(path: &Path) {
  if let Err(e) = tokio::fs::remove_file(path).await {
    tracing::warn!(path = %path.display(), error = %e, "failed to remove rejected upload");
  }
}
