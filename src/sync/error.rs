//! Error taxonomy for session and profile operations.

use thiserror::Error;

use crate::validation::ValidationError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
  /// Bad input, caught before any network call.
  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error("Number already registered, please use a different number")]
  DuplicatePhone,

  #[error("Email already registered, please use a different email")]
  DuplicateEmail,

  #[error("Invalid email or password")]
  InvalidCredentials,

  /// Signed in, but no profile record exists for the identity.
  #[error("User profile not found")]
  ProfileNotFound,

  #[error("Authentication failed: {0}")]
  RemoteAuthFailure(String),

  #[error("Failed to save profile: {0}")]
  RemoteWriteFailure(String),

  #[error("Database error: {0}")]
  Store(String),

  #[error("Not logged in")]
  NotLoggedIn,

  /// The local session store itself failed.
  #[error("Session cache error: {0}")]
  Cache(String),
}

impl SyncError {
  /// Whether the caller can fix this by changing the input.
  pub fn is_input_error(&self) -> bool {
    matches!(
      self,
      Self::Validation(_) | Self::DuplicatePhone | Self::DuplicateEmail | Self::InvalidCredentials
    )
  }
}

pub type SyncResult<T> = Result<T, SyncError>;
