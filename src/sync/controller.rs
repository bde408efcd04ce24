//! Sync controller: the only path between user actions, the session cache and the remote store.

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::remote::{AuthError, RecordKey, RemoteUserStore, User};
use crate::session::{SessionCache, SessionKey, SessionSnapshot};
use crate::validation;

use super::error::{SyncError, SyncResult};
use super::load::ProfileLoad;

/// Store field holding the phone number.
const PHONE_FIELD: &str = "number";
const EMAIL_FIELD: &str = "email";

/// New profile values for `update_profile`.
pub struct ProfileUpdate {
  pub full_name: String,
  pub email: String,
  pub phone_number: String,
  /// New password and its confirmation; None keeps the current one.
  pub password: Option<(SecretString, SecretString)>,
}

/// Mediates signup, login, profile reads/writes and logout.
///
/// Remote writes always land before the cache is touched, so the cache never
/// claims a change the remote store rejected. Concurrent calls are not
/// coalesced: the last completion to write the cache wins.
pub struct SyncController<R: RemoteUserStore, C: SessionCache> {
  remote: Arc<R>,
  cache: Arc<C>,
}

impl<R: RemoteUserStore, C: SessionCache> SyncController<R, C> {
  pub fn new(remote: R, cache: C) -> Self {
    Self::from_shared(Arc::new(remote), Arc::new(cache))
  }

  pub fn from_shared(remote: Arc<R>, cache: Arc<C>) -> Self {
    Self { remote, cache }
  }

  /// Cached session, for read-only display.
  pub fn current_session(&self) -> SyncResult<SessionSnapshot> {
    self.cache.snapshot().map_err(cache_error)
  }

  pub async fn sign_up(
    &self,
    full_name: &str,
    email: &str,
    phone_number: &str,
    password: &SecretString,
    confirm_password: &SecretString,
  ) -> SyncResult<User> {
    let full_name = full_name.trim();
    let email = email.trim();
    let phone_number = phone_number.trim();
    let password = SecretString::from(password.expose_secret().trim().to_string());
    let confirm_password = confirm_password.expose_secret().trim();

    validation::validate_signup(
      full_name,
      email,
      phone_number,
      password.expose_secret(),
      confirm_password,
    )?;

    debug!(field = PHONE_FIELD, "checking for existing record");
    if self
      .remote
      .exists_by_field(PHONE_FIELD, phone_number)
      .await
      .map_err(|e| SyncError::Store(e.0))?
    {
      return Err(SyncError::DuplicatePhone);
    }

    let id = self
      .remote
      .create_identity(email, &password)
      .await
      .map_err(|e| match e {
        AuthError::EmailExists => SyncError::DuplicateEmail,
        other @ AuthError::InvalidCredentials => SyncError::RemoteAuthFailure(other.to_string()),
        AuthError::Failed(reason) => SyncError::RemoteAuthFailure(reason),
      })?;

    let user = User::new(id, full_name, email, phone_number);
    if let Err(e) = self.remote.put_record(&user.id, &user).await {
      warn!(id = %user.id, error = %e, "profile write failed, removing new identity");
      if let Err(delete_err) = self.remote.delete_identity(&user.id).await {
        warn!(id = %user.id, error = %delete_err, "identity left orphaned");
      }
      return Err(SyncError::RemoteWriteFailure(e.0));
    }

    self
      .cache
      .store(&SessionSnapshot::logged_in(&user))
      .map_err(cache_error)?;

    info!(id = %user.id, "account created");
    Ok(user)
  }

  pub async fn login(&self, email: &str, password: &SecretString) -> SyncResult<User> {
    let email = email.trim();
    let password = SecretString::from(password.expose_secret().trim().to_string());

    validation::validate_login(email, password.expose_secret())?;

    let id = self
      .remote
      .verify_identity(email, &password)
      .await
      .map_err(|e| match e {
        AuthError::InvalidCredentials => SyncError::InvalidCredentials,
        other @ AuthError::EmailExists => SyncError::RemoteAuthFailure(other.to_string()),
        AuthError::Failed(reason) => SyncError::RemoteAuthFailure(reason),
      })?;

    let mut user = self
      .remote
      .get_record(&RecordKey::Id(id.clone()))
      .await
      .map_err(|e| SyncError::Store(e.0))?
      .ok_or_else(|| {
        warn!(%id, "identity has no profile record");
        SyncError::ProfileNotFound
      })?;
    if user.id.is_empty() {
      user.id = id;
    }

    self
      .cache
      .store(&SessionSnapshot::logged_in(&user))
      .map_err(cache_error)?;

    info!(id = %user.id, "logged in");
    Ok(user)
  }

  /// Read-through profile load.
  ///
  /// Returns immediately with the cached profile; the authoritative record is
  /// fetched on a background task and, if it arrives, replaces the cache.
  /// A failed refresh leaves the cached profile as the final answer.
  ///
  /// Must be called from within a tokio runtime.
  pub fn load_profile(&self) -> SyncResult<ProfileLoad> {
    let snapshot = self.current_session()?;
    let key = snapshot.lookup_key().ok_or(SyncError::NotLoggedIn)?;

    let (tx, rx) = oneshot::channel();
    let remote = Arc::clone(&self.remote);
    let cache = Arc::clone(&self.cache);

    tokio::spawn(async move {
      let outcome = match remote.get_record(&key).await {
        Ok(Some(user)) => {
          refresh_session(cache.as_ref(), &key, &user);
          Some(user)
        }
        Ok(None) => {
          warn!(%key, "profile record missing, keeping cached profile");
          None
        }
        Err(e) => {
          warn!(%key, error = %e, "profile refresh failed, keeping cached profile");
          None
        }
      };
      // Receiver may have been dropped
      let _ = tx.send(outcome);
    });

    Ok(ProfileLoad::new(snapshot.provisional_user(), rx))
  }

  /// Write-through profile update; replaces the whole record.
  pub async fn update_profile(&self, id: &str, update: ProfileUpdate) -> SyncResult<User> {
    let full_name = update.full_name.trim();
    let email = update.email.trim();
    let phone_number = update.phone_number.trim();
    let password = update
      .password
      .as_ref()
      .map(|(p, c)| (p.expose_secret(), c.expose_secret()));

    validation::validate_profile_update(full_name, email, phone_number, password)?;

    if id.is_empty() {
      return Err(SyncError::ProfileNotFound);
    }

    let existing = self
      .remote
      .get_record(&RecordKey::Id(id.to_string()))
      .await
      .map_err(|e| SyncError::Store(e.0))?
      .ok_or(SyncError::ProfileNotFound)?;

    if existing.email != email
      && self
        .remote
        .exists_by_field(EMAIL_FIELD, email)
        .await
        .map_err(|e| SyncError::Store(e.0))?
    {
      return Err(SyncError::DuplicateEmail);
    }

    let user = User {
      id: id.to_string(),
      full_name: full_name.to_string(),
      email: email.to_string(),
      phone_number: phone_number.to_string(),
      created_at: existing.created_at,
    };

    self
      .remote
      .put_record(id, &user)
      .await
      .map_err(|e| SyncError::RemoteWriteFailure(e.0))?;

    // Sign-in credentials follow the record; undo the record if they can't.
    let new_email = (existing.email != email).then_some(email);
    let new_password = update.password.as_ref().map(|(p, _)| p);
    if new_email.is_some() || new_password.is_some() {
      if let Err(e) = self
        .remote
        .update_identity(id, new_email, new_password)
        .await
      {
        warn!(%id, error = %e, "credential update failed, restoring previous record");
        if let Err(revert_err) = self.remote.put_record(id, &existing).await {
          warn!(%id, error = %revert_err, "record left ahead of credentials");
        }
        return Err(match e {
          AuthError::EmailExists => SyncError::DuplicateEmail,
          other @ AuthError::InvalidCredentials => SyncError::RemoteAuthFailure(other.to_string()),
          AuthError::Failed(reason) => SyncError::RemoteAuthFailure(reason),
        });
      }
    }

    match self.current_session() {
      Ok(snapshot) if owns_session(&snapshot, id, &existing.email) => {
        if let Err(e) = self.cache.store(&SessionSnapshot::logged_in(&user)) {
          // The remote write stands; the next load refreshes the cache.
          warn!(%id, error = %e, "failed to refresh session after update");
        }
      }
      Ok(_) => debug!(%id, "updated profile is not the cached session"),
      Err(e) => warn!(%id, error = %e, "failed to read session after update"),
    }

    info!(%id, "profile updated");
    Ok(user)
  }

  /// Confirm the signed-in user's password with the remote store.
  ///
  /// Credential changes and authenticated reads need a fresh sign-in in the
  /// current process. The session cache is left as is.
  pub async fn reauthenticate(&self, password: &SecretString) -> SyncResult<()> {
    let session = self.current_session()?;
    if !session.is_logged_in || session.email.is_empty() {
      return Err(SyncError::NotLoggedIn);
    }

    let password = SecretString::from(password.expose_secret().trim().to_string());
    validation::validate_login(&session.email, password.expose_secret())?;

    let id = self
      .remote
      .verify_identity(&session.email, &password)
      .await
      .map_err(|e| match e {
        AuthError::InvalidCredentials => SyncError::InvalidCredentials,
        other @ AuthError::EmailExists => SyncError::RemoteAuthFailure(other.to_string()),
        AuthError::Failed(reason) => SyncError::RemoteAuthFailure(reason),
      })?;

    if !session.user_id.is_empty() && session.user_id != id {
      warn!(%id, cached = %session.user_id, "cached session belongs to another identity");
      return Err(SyncError::InvalidCredentials);
    }
    debug!(%id, "reauthenticated");
    Ok(())
  }

  /// Refresh a single cached field a screen has observed a newer value for.
  pub fn observe_field(&self, key: SessionKey, value: &str) -> SyncResult<()> {
    if matches!(key, SessionKey::UserId | SessionKey::IsLoggedIn) {
      debug!(key = key.as_str(), "ignoring observed session-control field");
      return Ok(());
    }

    if !self.current_session()?.is_logged_in {
      return Err(SyncError::NotLoggedIn);
    }
    self.cache.set_field(key, value).map_err(cache_error)
  }

  /// Clear the session. Local only, never fails.
  pub fn logout(&self) {
    match self.cache.clear() {
      Ok(()) => info!("logged out"),
      Err(e) => warn!(error = %e, "failed to clear session cache"),
    }
  }

  /// Release the session cache.
  pub fn teardown(&self) -> SyncResult<()> {
    self.cache.teardown().map_err(cache_error)
  }
}

impl<R: RemoteUserStore, C: SessionCache> Clone for SyncController<R, C> {
  fn clone(&self) -> Self {
    Self {
      remote: Arc::clone(&self.remote),
      cache: Arc::clone(&self.cache),
    }
  }
}

fn cache_error(e: color_eyre::Report) -> SyncError {
  SyncError::Cache(e.to_string())
}

/// Whether the cached session belongs to the user with `id` (or, for sessions
/// cached without an id, to `email`).
fn owns_session(snapshot: &SessionSnapshot, id: &str, email: &str) -> bool {
  snapshot.is_logged_in
    && (snapshot.user_id == id || (snapshot.user_id.is_empty() && snapshot.email == email))
}

/// Overwrite the cache with a fetched record, unless the session it was
/// fetched for has since ended or changed hands.
fn refresh_session<C: SessionCache>(cache: &C, key: &RecordKey, user: &User) {
  let current = match cache.snapshot() {
    Ok(snapshot) => snapshot,
    Err(e) => {
      warn!(error = %e, "failed to read session before refresh");
      return;
    }
  };

  if current.lookup_key().as_ref() != Some(key) {
    debug!(%key, "session changed during refresh, dropping result");
    return;
  }

  let mut snapshot = SessionSnapshot::logged_in(user);
  if snapshot.user_id.is_empty() {
    snapshot.user_id = current.user_id;
  }
  if let Err(e) = cache.store(&snapshot) {
    warn!(error = %e, "failed to refresh session cache");
  }
}
