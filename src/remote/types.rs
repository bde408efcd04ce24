use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Identifier issued by the auth backend for a newly created identity.
pub type IdentityId = String;

/// Profile record for a user. Credentials never live here.
///
/// Field names on the wire match the records already stored under `users/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  #[serde(rename = "uid", default)]
  pub id: String,
  #[serde(rename = "fullName", default)]
  pub full_name: String,
  #[serde(default)]
  pub email: String,
  #[serde(rename = "number", default)]
  pub phone_number: String,
  /// Epoch milliseconds. Zero means unknown (e.g. rebuilt from the session cache).
  #[serde(rename = "createdAt", default)]
  pub created_at: i64,
}

impl User {
  /// Build a fresh record stamped with the current time.
  pub fn new(id: IdentityId, full_name: &str, email: &str, phone_number: &str) -> Self {
    Self {
      id,
      full_name: full_name.to_string(),
      email: email.to_string(),
      phone_number: phone_number.to_string(),
      created_at: Utc::now().timestamp_millis(),
    }
  }
}

/// How a profile record is located in the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKey {
  /// Direct lookup by identity id
  Id(String),
  /// Query on the `email` child
  EmailEquals(String),
}

impl std::fmt::Display for RecordKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Id(id) => write!(f, "id {}", id),
      Self::EmailEquals(email) => write!(f, "email {}", email),
    }
  }
}
