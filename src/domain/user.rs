use crate::error::{LibraryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StaffRole {
    Admin,
    Assistant,
}

impl StaffRole {
    pub fn as_str(self) -> &'static str {
        match self {
            StaffRole::Admin => "ADMIN",
            StaffRole::Assistant => "ASSISTANT",
        }
    }
}

impl FromStr for StaffRole {
    type Err = LibraryError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(StaffRole::Admin),
            "ASSISTANT" => Ok(StaffRole::Assistant),
            other => Err(LibraryError::ValidationError(format!(
                "Unknown staff role: '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A staff account operating the library.
///
/// Only the bcrypt hash of the password is kept, and it never leaves the
/// process in serialized output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: StaffRole,
    pub is_active: bool,
}

impl User {
    pub fn validate(&self) -> Result<()> {
        validate_username(&self.username)
    }
}

/// Registration data for a staff account, holding the plain password until it
/// is hashed.
#[derive(Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub role: StaffRole,
}

impl NewUser {
    pub fn new(username: impl Into<String>, password: impl Into<String>, role: StaffRole) -> Self {
        Self {
            username: username.into().trim().to_string(),
            password: password.into(),
            role,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_username(&self.username)?;
        validate_password(&self.password)
    }
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() {
        return Err(LibraryError::ValidationError(
            "Username must not be empty".to_string(),
        ));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(LibraryError::ValidationError(format!(
            "Username must not contain whitespace: '{}'",
            username
        )));
    }
    Ok(())
}

pub(crate) fn validate_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(LibraryError::ValidationError(
            "Password must not be empty".to_string(),
        ));
    }
    Ok(())
}
