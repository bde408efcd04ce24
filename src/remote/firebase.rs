//! Remote user store backed by Firebase Auth and the Realtime Database REST APIs.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::FirebaseConfig;

use super::api_types::{
  first_record, ApiAuthErrorResponse, ApiDatabaseError, ApiDeleteRequest, ApiIdentityResponse,
  ApiPasswordRequest, ApiQueryResponse, ApiUpdateRequest,
};
use super::store::{AuthError, RemoteUserStore, StoreError};
use super::types::{IdentityId, RecordKey, User};

/// ID tokens issued to identities during this process.
#[derive(Default)]
struct TokenStore {
  by_id: HashMap<String, SecretString>,
  latest: Option<String>,
}

/// Firebase-backed user store
pub struct FirebaseUserStore {
  http: reqwest::Client,
  api_key: SecretString,
  auth_url: Url,
  database_url: Url,
  users_path: String,
  tokens: Mutex<TokenStore>,
}

impl FirebaseUserStore {
  pub fn new(config: &FirebaseConfig, api_key: SecretString) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    let auth_url = Url::parse(&config.auth_url)
      .map_err(|e| eyre!("Invalid auth URL {}: {}", config.auth_url, e))?;
    let database_url = Url::parse(&config.database_url)
      .map_err(|e| eyre!("Invalid database URL {}: {}", config.database_url, e))?;

    Ok(Self {
      http,
      api_key,
      auth_url,
      database_url,
      users_path: config.users_path.trim_matches('/').to_string(),
      tokens: Mutex::new(TokenStore::default()),
    })
  }

  /// `{auth_url}/accounts:{action}?key=…`
  fn auth_endpoint(&self, action: &str) -> std::result::Result<Url, String> {
    let mut url = self.auth_url.clone();
    url
      .path_segments_mut()
      .map_err(|_| format!("Auth URL cannot be a base: {}", self.auth_url))?
      .pop_if_empty()
      .push(&format!("accounts:{}", action));
    url
      .query_pairs_mut()
      .append_pair("key", self.api_key.expose_secret());
    Ok(url)
  }

  /// `{database_url}/{users_path}[/{id}].json`
  fn record_url(&self, id: Option<&str>) -> std::result::Result<Url, String> {
    let mut url = self.database_url.clone();
    {
      let mut segments = url
        .path_segments_mut()
        .map_err(|_| format!("Database URL cannot be a base: {}", self.database_url))?;
      segments.pop_if_empty();
      match id {
        Some(id) => {
          segments.push(&self.users_path);
          segments.push(&format!("{}.json", id));
        }
        None => {
          segments.push(&format!("{}.json", self.users_path));
        }
      }
    }
    Ok(url)
  }

  /// Query URL for records whose `field` equals `value`.
  fn query_url(&self, field: &str, value: &str) -> std::result::Result<Url, String> {
    let mut url = self.record_url(None)?;
    // Realtime Database expects JSON-quoted query parameters.
    let order_by = serde_json::to_string(field).map_err(|e| e.to_string())?;
    let equal_to = serde_json::to_string(value).map_err(|e| e.to_string())?;
    url
      .query_pairs_mut()
      .append_pair("orderBy", &order_by)
      .append_pair("equalTo", &equal_to);
    Ok(url)
  }

  fn remember_token(&self, id: &str, token: Option<String>) {
    let Some(token) = token else { return };
    if let Ok(mut tokens) = self.tokens.lock() {
      tokens.by_id.insert(id.to_string(), SecretString::from(token));
      tokens.latest = Some(id.to_string());
    }
  }

  fn forget_token(&self, id: &str) {
    if let Ok(mut tokens) = self.tokens.lock() {
      tokens.by_id.remove(id);
      if tokens.latest.as_deref() == Some(id) {
        tokens.latest = None;
      }
    }
  }

  /// Token for `id`, or the most recently issued one.
  fn token_for(&self, id: Option<&str>) -> Option<String> {
    let tokens = self.tokens.lock().ok()?;
    let key = id
      .filter(|id| tokens.by_id.contains_key(*id))
      .map(String::from)
      .or_else(|| tokens.latest.clone())?;
    tokens
      .by_id
      .get(&key)
      .map(|token| token.expose_secret().to_string())
  }

  fn with_auth(&self, request: RequestBuilder, id: Option<&str>) -> RequestBuilder {
    match self.token_for(id) {
      Some(token) => request.query(&[("auth", token)]),
      None => request,
    }
  }

  async fn auth_call<B, T>(&self, action: &str, body: &B) -> std::result::Result<T, AuthError>
  where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    let url = self.auth_endpoint(action).map_err(AuthError::Failed)?;
    debug!(action, "auth request");

    let response = self
      .http
      .post(url)
      .json(body)
      .send()
      .await
      .map_err(|e| AuthError::Failed(format!("accounts:{} request failed: {}", action, e)))?;

    let status = response.status();
    if status.is_success() {
      return response
        .json::<T>()
        .await
        .map_err(|e| AuthError::Failed(format!("Failed to parse accounts:{} response: {}", action, e)));
    }

    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ApiAuthErrorResponse>(&text) {
      Ok(body) => Err(body.error.into_auth_error()),
      Err(_) => Err(AuthError::Failed(format!(
        "accounts:{} returned {}",
        action, status
      ))),
    }
  }

  async fn database_get<T: DeserializeOwned>(
    &self,
    url: Url,
    id: Option<&str>,
  ) -> std::result::Result<T, StoreError> {
    debug!(%url, "database read");
    let response = self
      .with_auth(self.http.get(url), id)
      .send()
      .await
      .map_err(|e| StoreError(format!("Database read failed: {}", e)))?;

    let response = check_database_status(response).await?;
    response
      .json::<T>()
      .await
      .map_err(|e| StoreError(format!("Failed to parse database response: {}", e)))
  }
}

async fn check_database_status(
  response: reqwest::Response,
) -> std::result::Result<reqwest::Response, StoreError> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }

  let text = response.text().await.unwrap_or_default();
  let reason = serde_json::from_str::<ApiDatabaseError>(&text)
    .ok()
    .map(|e| e.error)
    .filter(|e| !e.is_empty())
    .unwrap_or_else(|| status_reason(status));
  Err(StoreError(reason))
}

fn status_reason(status: StatusCode) -> String {
  format!(
    "Database returned {}",
    status.canonical_reason().unwrap_or(status.as_str())
  )
}

#[async_trait]
impl RemoteUserStore for FirebaseUserStore {
  async fn create_identity(
    &self,
    email: &str,
    password: &SecretString,
  ) -> std::result::Result<IdentityId, AuthError> {
    let body = ApiPasswordRequest {
      email,
      password: password.expose_secret(),
      return_secure_token: true,
    };
    let response: ApiIdentityResponse = self.auth_call("signUp", &body).await?;
    self.remember_token(&response.local_id, response.id_token);
    Ok(response.local_id)
  }

  async fn verify_identity(
    &self,
    email: &str,
    password: &SecretString,
  ) -> std::result::Result<IdentityId, AuthError> {
    let body = ApiPasswordRequest {
      email,
      password: password.expose_secret(),
      return_secure_token: true,
    };
    let response: ApiIdentityResponse = self.auth_call("signInWithPassword", &body).await?;
    self.remember_token(&response.local_id, response.id_token);
    Ok(response.local_id)
  }

  async fn delete_identity(&self, id: &str) -> std::result::Result<(), AuthError> {
    let token = self
      .tokens
      .lock()
      .ok()
      .and_then(|tokens| tokens.by_id.get(id).map(|t| t.expose_secret().to_string()))
      .ok_or_else(|| AuthError::Failed(format!("No session token held for identity {}", id)))?;

    let _: serde_json::Value = self
      .auth_call("delete", &ApiDeleteRequest { id_token: &token })
      .await?;
    self.forget_token(id);
    Ok(())
  }

  async fn update_identity(
    &self,
    id: &str,
    email: Option<&str>,
    password: Option<&SecretString>,
  ) -> std::result::Result<(), AuthError> {
    if email.is_none() && password.is_none() {
      return Ok(());
    }

    let token = self
      .tokens
      .lock()
      .ok()
      .and_then(|tokens| tokens.by_id.get(id).map(|t| t.expose_secret().to_string()))
      .ok_or_else(|| {
        AuthError::Failed("Sign in again before changing the email or password".to_string())
      })?;

    let body = ApiUpdateRequest {
      id_token: &token,
      email,
      password: password.map(|p| p.expose_secret()),
      return_secure_token: true,
    };
    let response: ApiIdentityResponse = self.auth_call("update", &body).await?;
    // Credential changes revoke older tokens.
    self.remember_token(id, response.id_token);
    Ok(())
  }

  async fn get_record(&self, key: &RecordKey) -> std::result::Result<Option<User>, StoreError> {
    match key {
      RecordKey::Id(id) => {
        let url = self.record_url(Some(id.as_str())).map_err(StoreError)?;
        let record: Option<User> = self.database_get(url, Some(id.as_str())).await?;
        Ok(record.map(|mut user| {
          if user.id.is_empty() {
            user.id = id.clone();
          }
          user
        }))
      }
      RecordKey::EmailEquals(email) => {
        let url = self.query_url("email", email).map_err(StoreError)?;
        let records: Option<ApiQueryResponse> = self.database_get(url, None).await?;
        Ok(records.and_then(first_record))
      }
    }
  }

  async fn put_record(&self, id: &str, user: &User) -> std::result::Result<(), StoreError> {
    let url = self.record_url(Some(id)).map_err(StoreError)?;
    debug!(%url, "database write");

    let response = self
      .with_auth(self.http.put(url), Some(id))
      .json(user)
      .send()
      .await
      .map_err(|e| StoreError(format!("Database write failed: {}", e)))?;

    check_database_status(response).await?;
    Ok(())
  }

  async fn exists_by_field(&self, field: &str, value: &str) -> std::result::Result<bool, StoreError> {
    let url = self.query_url(field, value).map_err(StoreError)?;
    let records: Option<ApiQueryResponse> = self.database_get(url, None).await?;
    Ok(records.is_some_and(|records| !records.is_empty()))
  }
}
