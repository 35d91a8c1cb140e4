//! Chats and messages.
//!
//! A chat is identified by its participant set: a client, a veterinarian and
//! every secretary of that veterinarian. The canonical (sorted, deduplicated)
//! form of the set is hashed into a key the store keeps unique.

use std::{collections::BTreeSet, path::PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

use crate::user::UserSummary;

/// Longest accepted body of a `text` message, in characters.
pub const MAX_TEXT_LEN: usize = 2000;

// ─── Participants ────────────────────────────────────────────────────────────

/// Deduplicate and sort participant ids. `Uuid` ordering is byte order, which
/// matches the ordering of their lowercase hyphenated string form.
pub fn canonical_participants(ids: impl IntoIterator<Item = Uuid>) -> Vec<Uuid> {
  ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

/// Lookup key of a canonical participant list: SHA-256 hex digest of the
/// comma-joined hyphenated ids.
pub fn participant_key(canonical: &[Uuid]) -> String {
  let mut hasher = Sha256::new();
  for (i, id) in canonical.iter().enumerate() {
    if i > 0 {
      hasher.update(b",");
    }
    hasher.update(id.hyphenated().to_string().as_bytes());
  }
  hex::encode(hasher.finalize())
}

// ─── Chat ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
  pub chat_id:         Uuid,
  /// Canonical order.
  pub participants:    Vec<Uuid>,
  pub veterinarian_id: Option<Uuid>,
  pub is_group:        bool,
  pub name:            String,
  pub last_message_id: Option<Uuid>,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

impl Chat {
  pub fn has_participant(&self, user_id: Uuid) -> bool {
    self.participants.contains(&user_id)
  }
}

/// Input to [`crate::store::ClinicStore::find_or_create_chat`].
#[derive(Debug, Clone)]
pub struct NewChat {
  /// Must already be canonical.
  pub participants:    Vec<Uuid>,
  pub veterinarian_id: Uuid,
  pub name:            String,
}

/// One row of a user's conversation list.
#[derive(Debug, Clone, Serialize)]
pub struct ChatOverview {
  pub chat_id:      Uuid,
  pub name:         String,
  /// Everyone but the user the overview was built for.
  pub participants: Vec<UserSummary>,
  pub last_message: Option<Message>,
  pub unread_count: u64,
  pub updated_at:   DateTime<Utc>,
}

// ─── Message ─────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageKind {
  Text,
  Image,
  Video,
  Audio,
  File,
}

impl MessageKind {
  /// Classify an attachment by its declared MIME type.
  pub fn from_content_type(content_type: &str) -> Self {
    let ct = content_type.trim().to_ascii_lowercase();
    if ct.starts_with("image/") {
      Self::Image
    } else if ct.starts_with("video/") {
      Self::Video
    } else if ct.starts_with("audio/") {
      Self::Audio
    } else {
      Self::File
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
  pub message_id: Uuid,
  pub chat_id:    Uuid,
  pub sender_id:  Uuid,
  #[serde(rename = "type")]
  pub kind:       MessageKind,
  /// Text body, or the media URL for non-text kinds.
  pub content:    String,
  pub read_by:    Vec<Uuid>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Input to [`crate::store::ClinicStore::append_message`].
#[derive(Debug, Clone)]
pub struct NewMessage {
  pub chat_id:   Uuid,
  pub sender_id: Uuid,
  pub kind:      MessageKind,
  pub content:   String,
}

/// Media already written by the upload layer.
#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
  pub url:          String,
  pub content_type: String,
  /// Local file backing `url`; removed if the message is rejected. Never
  /// read from a request body: the upload layer in front of the resolver
  /// sets it after writing the file. JSON-only senders leave it empty.
  #[serde(skip)]
  pub stored_path:  Option<PathBuf>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn canonical_form_ignores_input_order_and_duplicates() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let c = Uuid::new_v4();
    let one = canonical_participants([c, a, b, a]);
    let two = canonical_participants([b, c, a]);
    assert_eq!(one, two);
    assert_eq!(one.len(), 3);
  }

  #[test]
  fn uuid_order_matches_string_order() {
    let ids: Vec<Uuid> = (0..32).map(|_| Uuid::new_v4()).collect();
    let by_uuid = canonical_participants(ids.clone());
    let mut by_str = ids;
    by_str.sort_by_key(|id| id.to_string());
    assert_eq!(by_uuid, by_str);
  }

  #[test]
  fn key_depends_on_the_exact_set() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let c = Uuid::new_v4();
    let ab = participant_key(&canonical_participants([a, b]));
    let ba = participant_key(&canonical_participants([b, a]));
    let abc = participant_key(&canonical_participants([a, b, c]));
    assert_eq!(ab, ba);
    assert_ne!(ab, abc);
    assert_eq!(ab.len(), 64);
  }

  #[test]
  fn content_types_map_to_kinds() {
    assert_eq!(MessageKind::from_content_type("image/png"), MessageKind::Image);
    assert_eq!(MessageKind::from_content_type("Video/MP4"), MessageKind::Video);
    assert_eq!(MessageKind::from_content_type("audio/ogg"), MessageKind::Audio);
    assert_eq!(MessageKind::from_content_type("application/pdf"), MessageKind::File);
  }

  #[test]
  fn request_bodies_cannot_name_a_stored_file() {
    let a: Attachment = serde_json::from_value(serde_json::json!({
      "url": "https://cdn.example/x.png",
      "content_type": "image/png",
      "stored_path": "/etc/passwd",
    }))
    .unwrap();
    assert_eq!(a.stored_path, None);
  }
}
