//! Recording in-memory store for controller tests.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::store::{AuthError, RemoteUserStore, StoreError};
use super::types::{IdentityId, RecordKey, User};

/// One observed call, without credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
  CreateIdentity { email: String },
  VerifyIdentity { email: String },
  DeleteIdentity { id: String },
  UpdateIdentity {
    id: String,
    email: Option<String>,
    password_changed: bool,
  },
  GetRecord(RecordKey),
  PutRecord { id: String },
  ExistsByField { field: String, value: String },
}

#[derive(Default)]
struct MockState {
  identities: HashMap<String, (String, String)>,
  records: HashMap<String, User>,
  calls: Vec<Call>,
  next_id: u32,
  fail_create: Option<AuthError>,
  fail_get: Option<StoreError>,
  fail_put: Option<StoreError>,
  fail_delete: Option<AuthError>,
  fail_update_identity: Option<AuthError>,
  get_delay: Option<Duration>,
}

#[derive(Clone, Default)]
pub struct MockUserStore {
  state: Arc<Mutex<MockState>>,
}

impl MockUserStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Seed an identity and its profile record.
  pub fn with_user(self, user: User, password: &str) -> Self {
    {
      let mut state = self.state.lock().expect("mock lock");
      state
        .identities
        .insert(user.id.clone(), (user.email.clone(), password.to_string()));
      state.records.insert(user.id.clone(), user);
    }
    self
  }

  /// Seed an identity with no profile record.
  pub fn with_identity_only(self, id: &str, email: &str, password: &str) -> Self {
    self
      .state
      .lock()
      .expect("mock lock")
      .identities
      .insert(id.to_string(), (email.to_string(), password.to_string()));
    self
  }

  pub fn fail_create(&self, error: AuthError) {
    self.state.lock().expect("mock lock").fail_create = Some(error);
  }

  pub fn fail_get(&self, error: StoreError) {
    self.state.lock().expect("mock lock").fail_get = Some(error);
  }

  pub fn fail_put(&self, error: StoreError) {
    self.state.lock().expect("mock lock").fail_put = Some(error);
  }

  pub fn fail_delete(&self, error: AuthError) {
    self.state.lock().expect("mock lock").fail_delete = Some(error);
  }

  pub fn fail_update_identity(&self, error: AuthError) {
    self.state.lock().expect("mock lock").fail_update_identity = Some(error);
  }

  pub fn delay_get(&self, delay: Duration) {
    self.state.lock().expect("mock lock").get_delay = Some(delay);
  }

  pub fn calls(&self) -> Vec<Call> {
    self.state.lock().expect("mock lock").calls.clone()
  }

  pub fn record(&self, id: &str) -> Option<User> {
    self.state.lock().expect("mock lock").records.get(id).cloned()
  }

  pub fn has_identity(&self, id: &str) -> bool {
    self.state.lock().expect("mock lock").identities.contains_key(id)
  }

  pub fn email_of(&self, id: &str) -> Option<String> {
    self
      .state
      .lock()
      .expect("mock lock")
      .identities
      .get(id)
      .map(|(email, _)| email.clone())
  }

  pub fn password_of(&self, id: &str) -> Option<String> {
    self
      .state
      .lock()
      .expect("mock lock")
      .identities
      .get(id)
      .map(|(_, password)| password.clone())
  }

  fn push(&self, call: Call) {
    self.state.lock().expect("mock lock").calls.push(call);
  }
}

#[async_trait]
impl RemoteUserStore for MockUserStore {
  async fn create_identity(
    &self,
    email: &str,
    password: &SecretString,
  ) -> Result<IdentityId, AuthError> {
    self.push(Call::CreateIdentity {
      email: email.to_string(),
    });
    let mut state = self.state.lock().expect("mock lock");
    if let Some(error) = state.fail_create.clone() {
      return Err(error);
    }
    if state.identities.values().any(|(e, _)| e == email) {
      return Err(AuthError::EmailExists);
    }
    state.next_id += 1;
    let id = format!("uid-{}", state.next_id);
    state.identities.insert(
      id.clone(),
      (email.to_string(), password.expose_secret().to_string()),
    );
    Ok(id)
  }

  async fn verify_identity(
    &self,
    email: &str,
    password: &SecretString,
  ) -> Result<IdentityId, AuthError> {
    self.push(Call::VerifyIdentity {
      email: email.to_string(),
    });
    let state = self.state.lock().expect("mock lock");
    state
      .identities
      .iter()
      .find(|(_, (e, p))| e == email && p == password.expose_secret())
      .map(|(id, _)| id.clone())
      .ok_or(AuthError::InvalidCredentials)
  }

  async fn delete_identity(&self, id: &str) -> Result<(), AuthError> {
    self.push(Call::DeleteIdentity { id: id.to_string() });
    let mut state = self.state.lock().expect("mock lock");
    if let Some(error) = state.fail_delete.clone() {
      return Err(error);
    }
    state.identities.remove(id);
    Ok(())
  }

  async fn update_identity(
    &self,
    id: &str,
    email: Option<&str>,
    password: Option<&SecretString>,
  ) -> Result<(), AuthError> {
    self.push(Call::UpdateIdentity {
      id: id.to_string(),
      email: email.map(String::from),
      password_changed: password.is_some(),
    });
    let mut state = self.state.lock().expect("mock lock");
    if let Some(error) = state.fail_update_identity.clone() {
      return Err(error);
    }
    if let Some(email) = email {
      let taken = state
        .identities
        .iter()
        .any(|(other, (e, _))| other != id && e == email);
      if taken {
        return Err(AuthError::EmailExists);
      }
    }

    let identity = state
      .identities
      .get_mut(id)
      .ok_or_else(|| AuthError::Failed(format!("no identity {}", id)))?;
    if let Some(email) = email {
      identity.0 = email.to_string();
    }
    if let Some(password) = password {
      identity.1 = password.expose_secret().to_string();
    }
    Ok(())
  }

  async fn get_record(&self, key: &RecordKey) -> Result<Option<User>, StoreError> {
    self.push(Call::GetRecord(key.clone()));
    let delay = self.state.lock().expect("mock lock").get_delay;
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }

    let state = self.state.lock().expect("mock lock");
    if let Some(error) = state.fail_get.clone() {
      return Err(error);
    }
    Ok(match key {
      RecordKey::Id(id) => state.records.get(id).cloned(),
      RecordKey::EmailEquals(email) => state.records.values().find(|u| &u.email == email).cloned(),
    })
  }

  async fn put_record(&self, id: &str, user: &User) -> Result<(), StoreError> {
    self.push(Call::PutRecord { id: id.to_string() });
    let mut state = self.state.lock().expect("mock lock");
    if let Some(error) = state.fail_put.clone() {
      return Err(error);
    }
    state.records.insert(id.to_string(), user.clone());
    Ok(())
  }

  async fn exists_by_field(&self, field: &str, value: &str) -> Result<bool, StoreError> {
    self.push(Call::ExistsByField {
      field: field.to_string(),
      value: value.to_string(),
    });
    let state = self.state.lock().expect("mock lock");
    Ok(state.records.values().any(|user| match field {
      "email" => user.email == value,
      "number" => user.phone_number == value,
      "fullName" => user.full_name == value,
      _ => false,
    }))
  }
}
