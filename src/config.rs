use color_eyre::{eyre::eyre, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Realtime Database instance the app was provisioned in.
const DEFAULT_DATABASE_URL: &str =
  "https://aquallera-default-rtdb.asia-southeast1.firebasedatabase.app";
const DEFAULT_AUTH_URL: &str = "https://identitytoolkit.googleapis.com/v1";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub firebase: FirebaseConfig,
  #[serde(default)]
  pub session: SessionConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FirebaseConfig {
  #[serde(default = "default_database_url")]
  pub database_url: String,
  #[serde(default = "default_auth_url")]
  pub auth_url: String,
  /// Root node holding profile records
  #[serde(default = "default_users_path")]
  pub users_path: String,
  /// Per-request timeout in seconds
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for FirebaseConfig {
  fn default() -> Self {
    Self {
      database_url: default_database_url(),
      auth_url: default_auth_url(),
      users_path: default_users_path(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

fn default_database_url() -> String {
  DEFAULT_DATABASE_URL.to_string()
}

fn default_auth_url() -> String {
  DEFAULT_AUTH_URL.to_string()
}

fn default_users_path() -> String {
  "users".to_string()
}

fn default_timeout_secs() -> u64 {
  15
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
  /// Session database location (default: $XDG_DATA_HOME/aquallera/session.db)
  pub path: Option<PathBuf>,
  /// When false the session only lives for this process
  #[serde(default = "default_true")]
  pub persist: bool,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      path: None,
      persist: true,
    }
  }
}

fn default_true() -> bool {
  true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
  /// Log to stderr instead of the rolling file
  #[serde(default)]
  pub stderr: bool,
  /// Log directory (default: $XDG_DATA_HOME/aquallera/logs)
  pub directory: Option<PathBuf>,
}

impl Config {
  /// Load configuration.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./aquallera.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/aquallera/config.yaml
  ///
  /// Without any file the defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("aquallera.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("aquallera").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file deserializes to null, not to an empty mapping.
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  /// Get the Firebase Web API key from environment variables.
  ///
  /// Checks AQUALLERA_FIREBASE_API_KEY first, then FIREBASE_API_KEY as fallback.
  pub fn get_api_key() -> Result<SecretString> {
    std::env::var("AQUALLERA_FIREBASE_API_KEY")
      .or_else(|_| std::env::var("FIREBASE_API_KEY"))
      .map(SecretString::from)
      .map_err(|_| {
        eyre!(
          "Firebase API key not found. Set AQUALLERA_FIREBASE_API_KEY or FIREBASE_API_KEY environment variable."
        )
      })
  }
}

/// Application data directory, shared by the session database and logs.
pub fn data_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("aquallera"))
}
