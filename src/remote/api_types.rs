//! Serde types matching the Firebase Auth and Realtime Database REST payloads.
//!
//! Kept separate from the domain types so the wire format can drift without
//! touching the sync logic.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::store::AuthError;
use super::types::User;

// ============================================================================
// Identity Toolkit (Auth)
// ============================================================================

/// Body for `accounts:signUp` and `accounts:signInWithPassword`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPasswordRequest<'a> {
  pub email: &'a str,
  pub password: &'a str,
  pub return_secure_token: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDeleteRequest<'a> {
  pub id_token: &'a str,
}

/// Body for `accounts:update`. Absent fields are left unchanged.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUpdateRequest<'a> {
  pub id_token: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email: Option<&'a str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub password: Option<&'a str>,
  pub return_secure_token: bool,
}

/// Successful response from the password endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiIdentityResponse {
  pub local_id: String,
  #[serde(default)]
  pub id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiAuthErrorResponse {
  pub error: ApiAuthErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiAuthErrorBody {
  #[serde(default)]
  pub message: String,
}

impl ApiAuthErrorBody {
  /// Error code without the optional human-readable suffix
  /// (e.g. `WEAK_PASSWORD : Password should be at least 6 characters`).
  pub fn code(&self) -> &str {
    self
      .message
      .split(" : ")
      .next()
      .unwrap_or_default()
      .trim()
  }

  pub fn into_auth_error(self) -> AuthError {
    match self.code() {
      "EMAIL_EXISTS" => AuthError::EmailExists,
      // Never tell the caller whether the email exists.
      "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "USER_DISABLED" => {
        AuthError::InvalidCredentials
      }
      _ => AuthError::Failed(self.message),
    }
  }
}

// ============================================================================
// Realtime Database
// ============================================================================

/// Result of an `orderBy`/`equalTo` query: child key to record.
pub type ApiQueryResponse = HashMap<String, User>;

#[derive(Debug, Deserialize)]
pub struct ApiDatabaseError {
  #[serde(default)]
  pub error: String,
}

/// Pick the first record out of a query response, backfilling its id from the child key
/// when the stored record predates the `uid` field.
pub fn first_record(response: ApiQueryResponse) -> Option<User> {
  let mut entries: Vec<(String, User)> = response.into_iter().collect();
  entries.sort_by(|a, b| a.0.cmp(&b.0));
  entries.into_iter().next().map(|(key, mut user)| {
    if user.id.is_empty() {
      user.id = key;
    }
    user
  })
}
