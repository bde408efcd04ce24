//! Contract for the authoritative user store.

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

use super::types::{IdentityId, RecordKey, User};

/// Failure from the identity (auth) side of the store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
  /// Email/password pair rejected. Deliberately does not say which half was wrong.
  #[error("invalid email or password")]
  InvalidCredentials,

  #[error("an identity with this email already exists")]
  EmailExists,

  #[error("{0}")]
  Failed(String),
}

/// Failure from the record (database) side of the store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct StoreError(pub String);

/// Authoritative user store: identities plus profile records keyed by identity id.
///
/// Every call resolves exactly once. Timeouts are the implementation's concern.
#[async_trait]
pub trait RemoteUserStore: Send + Sync + 'static {
  async fn create_identity(
    &self,
    email: &str,
    password: &SecretString,
  ) -> Result<IdentityId, AuthError>;

  async fn verify_identity(
    &self,
    email: &str,
    password: &SecretString,
  ) -> Result<IdentityId, AuthError>;

  /// Best-effort removal, used to compensate a failed signup.
  async fn delete_identity(&self, id: &str) -> Result<(), AuthError>;

  /// Change the sign-in email and/or password of identity `id` in one call.
  ///
  /// Fails with `EmailExists` if another identity already holds `email`.
  async fn update_identity(
    &self,
    id: &str,
    email: Option<&str>,
    password: Option<&SecretString>,
  ) -> Result<(), AuthError>;

  async fn get_record(&self, key: &RecordKey) -> Result<Option<User>, StoreError>;

  /// Full overwrite of the record at `id`.
  async fn put_record(&self, id: &str, user: &User) -> Result<(), StoreError>;

  async fn exists_by_field(&self, field: &str, value: &str) -> Result<bool, StoreError>;
}
