mod config;
mod logging;
mod remote;
mod session;
mod sync;
mod validation;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::Result;
use secrecy::SecretString;
use std::path::PathBuf;
use tracing::warn;

use remote::{FirebaseUserStore, RemoteUserStore, User};
use session::{MemorySessionCache, SessionCache, SessionKey, SqliteSessionCache};
use sync::{ProfileSource, ProfileUpdate, SyncController, SyncError, SyncResult};

#[derive(Parser, Debug)]
#[command(name = "aquallera")]
#[command(about = "Account and session management for Aquallera water-refill ordering")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/aquallera/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Create an account and start a session
  Signup {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    /// 11-digit mobile number
    #[arg(long)]
    phone: String,
    #[arg(long, env = "AQUALLERA_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long)]
    confirm_password: String,
  },
  /// Start a session with an existing account
  Login {
    #[arg(long)]
    email: String,
    #[arg(long, env = "AQUALLERA_PASSWORD", hide_env_values = true)]
    password: String,
  },
  /// Show the profile: cached first, then refreshed from the server
  ///
  /// Databases that require authenticated reads need `--password`, since each
  /// invocation starts without a sign-in token.
  Profile {
    #[arg(long, env = "AQUALLERA_PASSWORD", hide_env_values = true)]
    password: Option<String>,
  },
  /// Replace the signed-in user's profile
  Update {
    /// Current password, confirmed before anything is written
    #[arg(long, env = "AQUALLERA_PASSWORD", hide_env_values = true)]
    current_password: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone: String,
    /// New password (optional)
    #[arg(long, requires = "confirm_password")]
    new_password: Option<String>,
    #[arg(long)]
    confirm_password: Option<String>,
  },
  /// Record a newer value seen elsewhere for one cached field
  Observe {
    #[arg(value_enum)]
    field: ObservedField,
    value: String,
  },
  /// End the session
  Logout,
  /// Show the cached session without contacting the server
  Status,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ObservedField {
  Name,
  Email,
  Phone,
}

impl From<ObservedField> for SessionKey {
  fn from(field: ObservedField) -> Self {
    match field {
      ObservedField::Name => SessionKey::FullName,
      ObservedField::Email => SessionKey::Email,
      ObservedField::Phone => SessionKey::PhoneNumber,
    }
  }
}

impl Command {
  fn needs_remote(&self) -> bool {
    !matches!(
      self,
      Command::Logout | Command::Status | Command::Observe { .. }
    )
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let config = config::Config::load(args.config.as_deref())?;
  let log_guard = logging::init(&config.logging)?;

  // Local-only commands work without credentials
  let api_key = if args.command.needs_remote() {
    config::Config::get_api_key()?
  } else {
    SecretString::from(String::new())
  };
  let remote = FirebaseUserStore::new(&config.firebase, api_key)?;

  let outcome = if config.session.persist {
    let cache = match &config.session.path {
      Some(path) => SqliteSessionCache::init(path)?,
      None => SqliteSessionCache::open_default()?,
    };
    run(SyncController::new(remote, cache), args.command).await
  } else {
    run(
      SyncController::new(remote, MemorySessionCache::new()),
      args.command,
    )
    .await
  };

  match outcome {
    Ok(()) => Ok(()),
    Err(e) if e.is_input_error() => {
      eprintln!("{}", e);
      drop(log_guard);
      std::process::exit(2);
    }
    Err(e) => Err(e.into()),
  }
}

async fn run<R: RemoteUserStore, C: SessionCache>(
  controller: SyncController<R, C>,
  command: Command,
) -> SyncResult<()> {
  let result = execute(&controller, command).await;
  if let Err(e) = controller.teardown() {
    match &result {
      Ok(()) => return Err(e),
      Err(_) => warn!(error = %e, "session cache teardown failed"),
    }
  }
  result
}

async fn execute<R: RemoteUserStore, C: SessionCache>(
  controller: &SyncController<R, C>,
  command: Command,
) -> SyncResult<()> {
  match command {
    Command::Signup {
      name,
      email,
      phone,
      password,
      confirm_password,
    } => {
      let user = controller
        .sign_up(
          &name,
          &email,
          &phone,
          &SecretString::from(password),
          &SecretString::from(confirm_password),
        )
        .await?;
      println!("Account created successfully");
      print_user(&user);
    }
    Command::Login { email, password } => {
      let user = controller
        .login(&email, &SecretString::from(password))
        .await?;
      println!("Login successful!");
      print_user(&user);
    }
    Command::Profile { password } => {
      if let Some(password) = password {
        controller
          .reauthenticate(&SecretString::from(password))
          .await?;
      }
      let mut load = controller.load_profile()?;
      print_user(load.provisional());
      if !load.poll() && load.is_loading() {
        println!("Refreshing...");
      }

      let loaded = load.finish().await;
      match loaded.source {
        ProfileSource::Remote => {
          println!("Up to date:");
          print_user(&loaded.user);
        }
        ProfileSource::Cached => println!("Offline, showing saved profile"),
      }
    }
    Command::Update {
      current_password,
      name,
      email,
      phone,
      new_password,
      confirm_password,
    } => {
      let session = controller.current_session()?;
      if !session.is_logged_in {
        return Err(SyncError::NotLoggedIn);
      }

      controller
        .reauthenticate(&SecretString::from(current_password))
        .await?;

      let password = new_password.map(|p| {
        (
          SecretString::from(p),
          SecretString::from(confirm_password.unwrap_or_default()),
        )
      });
      let update = ProfileUpdate {
        full_name: name,
        email,
        phone_number: phone,
        password,
      };
      let user = controller.update_profile(&session.user_id, update).await?;
      println!("Profile updated successfully");
      print_user(&user);
    }
    Command::Observe { field, value } => {
      controller.observe_field(field.into(), &value)?;
      println!("Saved");
    }
    Command::Logout => {
      controller.logout();
      println!("Logged out");
    }
    Command::Status => {
      let session = controller.current_session()?;
      if session.is_logged_in {
        println!("Logged in as {} <{}>", session.full_name, session.email);
      } else {
        println!("Not logged in");
      }
    }
  }

  Ok(())
}

fn print_user(user: &User) {
  println!("  Name:   {}", user.full_name);
  println!("  Email:  {}", user.email);
  println!("  Number: {}", user.phone_number);
  // Profiles rebuilt from the session cache carry no creation time
  if user.created_at > 0 {
    if let Some(created) = chrono::DateTime::from_timestamp_millis(user.created_at) {
      println!("  Member since {}", created.format("%B %-d, %Y"));
    }
  }
}
