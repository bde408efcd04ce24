//! Input rules for signup, login and profile edits. Pure, no I/O.

use once_cell::sync::Lazy;
use regex::Regex;

pub const PHONE_LENGTH: usize = 11;
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Same shape as the platform email matcher the app shipped with.
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
  Regex::new(
    r"^[a-zA-Z0-9+._%\-]{1,256}@[a-zA-Z0-9][a-zA-Z0-9\-]{0,64}(\.[a-zA-Z0-9][a-zA-Z0-9\-]{0,25})+$",
  )
  .expect("email pattern is valid")
});

/// Input field a validation rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
  FullName,
  Email,
  PhoneNumber,
  Password,
  ConfirmPassword,
}

impl std::fmt::Display for Field {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      Self::FullName => "full name",
      Self::Email => "email",
      Self::PhoneNumber => "phone number",
      Self::Password => "password",
      Self::ConfirmPassword => "password confirmation",
    };
    f.write_str(name)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
  Required,
  Format,
  Mismatch,
  TooShort,
}

/// A single failed rule, specific enough to render a per-field message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationError {
  pub field: Field,
  pub rule: Rule,
}

impl ValidationError {
  pub fn new(field: Field, rule: Rule) -> Self {
    Self { field, rule }
  }

  pub fn message(&self) -> String {
    match (self.field, self.rule) {
      (field, Rule::Required) => format!("{} is required", capitalize(&field.to_string())),
      (Field::Email, Rule::Format) => "Enter a valid email address".to_string(),
      (Field::PhoneNumber, Rule::Format) => {
        format!("Phone number must be exactly {} digits", PHONE_LENGTH)
      }
      (_, Rule::Mismatch) => "Passwords do not match".to_string(),
      (_, Rule::TooShort) => format!(
        "Password must be at least {} characters",
        MIN_PASSWORD_LENGTH
      ),
      (field, Rule::Format) => format!("Invalid {}", field),
    }
  }
}

impl std::fmt::Display for ValidationError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.message())
  }
}

impl std::error::Error for ValidationError {}

fn capitalize(s: &str) -> String {
  let mut chars = s.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

pub fn is_valid_email(s: &str) -> bool {
  EMAIL_PATTERN.is_match(s)
}

/// Exactly 11 ASCII digits.
pub fn is_valid_phone(s: &str) -> bool {
  s.len() == PHONE_LENGTH && s.bytes().all(|b| b.is_ascii_digit())
}

pub fn is_non_empty(s: &str) -> bool {
  !s.trim().is_empty()
}

pub fn passwords_match(p: &str, q: &str) -> bool {
  p.as_bytes() == q.as_bytes()
}

pub fn is_strong_enough_password(p: &str) -> bool {
  p.chars().count() >= MIN_PASSWORD_LENGTH
}

fn require(field: Field, value: &str) -> Result<(), ValidationError> {
  if is_non_empty(value) {
    Ok(())
  } else {
    Err(ValidationError::new(field, Rule::Required))
  }
}

/// Signup rules, first failure wins:
/// required fields, email format, password match, phone format, password strength.
pub fn validate_signup(
  full_name: &str,
  email: &str,
  phone: &str,
  password: &str,
  confirm_password: &str,
) -> Result<(), ValidationError> {
  require(Field::FullName, full_name)?;
  require(Field::Email, email)?;
  require(Field::PhoneNumber, phone)?;
  require(Field::Password, password)?;
  require(Field::ConfirmPassword, confirm_password)?;

  if !is_valid_email(email) {
    return Err(ValidationError::new(Field::Email, Rule::Format));
  }
  if !passwords_match(password, confirm_password) {
    return Err(ValidationError::new(Field::ConfirmPassword, Rule::Mismatch));
  }
  if !is_valid_phone(phone) {
    return Err(ValidationError::new(Field::PhoneNumber, Rule::Format));
  }
  if !is_strong_enough_password(password) {
    return Err(ValidationError::new(Field::Password, Rule::TooShort));
  }
  Ok(())
}

pub fn validate_login(email: &str, password: &str) -> Result<(), ValidationError> {
  require(Field::Email, email)?;
  require(Field::Password, password)?;

  if !is_valid_email(email) {
    return Err(ValidationError::new(Field::Email, Rule::Format));
  }
  Ok(())
}

/// Profile edit rules. Password rules only apply when a new password is given.
pub fn validate_profile_update(
  full_name: &str,
  email: &str,
  phone: &str,
  password: Option<(&str, &str)>,
) -> Result<(), ValidationError> {
  require(Field::FullName, full_name)?;
  require(Field::Email, email)?;
  if !is_valid_email(email) {
    return Err(ValidationError::new(Field::Email, Rule::Format));
  }
  require(Field::PhoneNumber, phone)?;
  if !is_valid_phone(phone) {
    return Err(ValidationError::new(Field::PhoneNumber, Rule::Format));
  }

  if let Some((password, confirm)) = password {
    if !is_strong_enough_password(password) {
      return Err(ValidationError::new(Field::Password, Rule::TooShort));
    }
    if !passwords_match(password, confirm) {
      return Err(ValidationError::new(Field::ConfirmPassword, Rule::Mismatch));
    }
  }
  Ok(())
}
