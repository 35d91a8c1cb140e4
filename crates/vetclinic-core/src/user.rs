//! Directory records: users and the animals they own.
//!
//! Accounts and pet records are owned by the account service; this crate only
//! reads them to decide who may do what.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use uuid::Uuid;

/// The role a user holds in the clinic.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  Client,
  Veterinarian,
  Secretary,
  Admin,
}

impl Role {
  /// Veterinarians and secretaries work on the clinic side of a conversation.
  pub fn is_staff(self) -> bool {
    matches!(self, Self::Veterinarian | Self::Secretary)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:         Uuid,
  pub role:            Role,
  pub first_name:      String,
  pub last_name:       String,
  /// For secretaries, the veterinarian they work for.
  pub veterinarian_id: Option<Uuid>,
  pub created_at:      DateTime<Utc>,
}

impl User {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
  }

  /// Whether this user may act on behalf of `veterinarian_id`.
  pub fn acts_for(&self, veterinarian_id: Uuid) -> bool {
    match self.role {
      Role::Veterinarian => self.user_id == veterinarian_id,
      Role::Secretary => self.veterinarian_id == Some(veterinarian_id),
      Role::Admin => true,
      Role::Client => false,
    }
  }
}

/// Public display data for a participant or a counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
  pub user_id:    Uuid,
  pub role:       Role,
  pub first_name: String,
  pub last_name:  String,
}

impl From<&User> for UserSummary {
  fn from(u: &User) -> Self {
    Self {
      user_id:    u.user_id,
      role:       u.role,
      first_name: u.first_name.clone(),
      last_name:  u.last_name.clone(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Animal {
  pub animal_id:  Uuid,
  pub owner_id:   Uuid,
  pub name:       String,
  pub species:    Option<String>,
  pub birth_date: Option<NaiveDate>,
}
