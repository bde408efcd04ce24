//! Core types for the local session cache.

use color_eyre::Result;

use crate::remote::{RecordKey, User};

/// Keys held in the session cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKey {
  UserId,
  FullName,
  Email,
  PhoneNumber,
  IsLoggedIn,
}

impl SessionKey {
  pub const ALL: [SessionKey; 5] = [
    SessionKey::UserId,
    SessionKey::FullName,
    SessionKey::Email,
    SessionKey::PhoneNumber,
    SessionKey::IsLoggedIn,
  ];

  /// Name used in durable storage
  pub fn as_str(self) -> &'static str {
    match self {
      Self::UserId => "userId",
      Self::FullName => "fullName",
      Self::Email => "email",
      Self::PhoneNumber => "phoneNumber",
      Self::IsLoggedIn => "isLoggedIn",
    }
  }
}

/// Local projection of the signed-in user. Absent keys read as empty / false.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
  pub user_id: String,
  pub full_name: String,
  pub email: String,
  pub phone_number: String,
  pub is_logged_in: bool,
}

impl SessionSnapshot {
  /// Snapshot for a user that just signed in.
  pub fn logged_in(user: &User) -> Self {
    Self {
      user_id: user.id.clone(),
      full_name: user.full_name.clone(),
      email: user.email.clone(),
      phone_number: user.phone_number.clone(),
      is_logged_in: true,
    }
  }

  /// Rebuild from raw key/value pairs.
  pub fn from_lookup(mut lookup: impl FnMut(SessionKey) -> Option<String>) -> Self {
    let mut text = |key| lookup(key).unwrap_or_default();
    let user_id = text(SessionKey::UserId);
    let full_name = text(SessionKey::FullName);
    let email = text(SessionKey::Email);
    let phone_number = text(SessionKey::PhoneNumber);
    let is_logged_in = text(SessionKey::IsLoggedIn) == "true";
    Self {
      user_id,
      full_name,
      email,
      phone_number,
      is_logged_in,
    }
  }

  pub fn entries(&self) -> [(SessionKey, String); 5] {
    [
      (SessionKey::UserId, self.user_id.clone()),
      (SessionKey::FullName, self.full_name.clone()),
      (SessionKey::Email, self.email.clone()),
      (SessionKey::PhoneNumber, self.phone_number.clone()),
      (SessionKey::IsLoggedIn, self.is_logged_in.to_string()),
    ]
  }

  /// How to find the authoritative record: by id when cached, else by email.
  /// None when the cache holds no session.
  pub fn lookup_key(&self) -> Option<RecordKey> {
    if !self.is_logged_in {
      return None;
    }
    if !self.user_id.is_empty() {
      Some(RecordKey::Id(self.user_id.clone()))
    } else if !self.email.is_empty() {
      Some(RecordKey::EmailEquals(self.email.clone()))
    } else {
      None
    }
  }

  /// Cached fields as a user record. The creation time is not cached.
  pub fn provisional_user(&self) -> User {
    User {
      id: self.user_id.clone(),
      full_name: self.full_name.clone(),
      email: self.email.clone(),
      phone_number: self.phone_number.clone(),
      created_at: 0,
    }
  }
}

/// Durable local key/value store for the session.
///
/// Only the sync controller writes to it.
pub trait SessionCache: Send + Sync + 'static {
  fn snapshot(&self) -> Result<SessionSnapshot>;

  /// Replace every key with the snapshot's values.
  fn store(&self, snapshot: &SessionSnapshot) -> Result<()>;

  fn set_field(&self, key: SessionKey, value: &str) -> Result<()>;

  /// Remove every key.
  fn clear(&self) -> Result<()>;

  /// Release the underlying store. Further calls fail.
  fn teardown(&self) -> Result<()>;
}
