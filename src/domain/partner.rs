use crate::error::{LibraryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartnerId(pub i64);

impl fmt::Display for PartnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A library member eligible to borrow books while active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    pub id: PartnerId,
    pub name: String,
    pub email: String,
    pub is_active: bool,
}

/// Registration data for a partner; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPartner {
    pub name: String,
    pub email: String,
}

impl NewPartner {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            email: email.into().trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_contact(&self.name, &self.email)
    }
}

impl Partner {
    pub fn validate(&self) -> Result<()> {
        validate_contact(&self.name, &self.email)
    }
}

fn validate_contact(name: &str, email: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LibraryError::ValidationError(
            "Partner name must not be empty".to_string(),
        ));
    }
    if !email.contains('@') {
        return Err(LibraryError::ValidationError(format!(
            "Invalid email address: '{}'",
            email
        )));
    }
    Ok(())
}
