//! User actions against the data store and identity provider.
//!
//! # Responsibility
//! - Validate form input, then perform the writes an action implies.
//! - Enforce ownership and role rules before mutating shared documents.
//!
//! # Invariants
//! - Validation failures happen before any store call.
//! - No action retries; failures are returned to the caller as-is.

use crate::identity::AuthError;
use crate::store::StoreError;
use crate::tenant::RegistryError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod account;
pub mod admin;
pub mod analytics;
pub mod catalog;
pub mod feedback;
pub mod insight;
pub mod lesson;
pub mod profile;
pub mod validation;

pub use validation::{Attachment, MediaRule, ValidationError};

pub type ActionResult<T> = Result<T, ActionError>;

/// Failure of a user action, shown to the user through its `Display` text.
#[derive(Debug)]
pub enum ActionError {
    Auth(AuthError),
    Validation(ValidationError),
    Write(StoreError),
    NotSignedIn,
    /// The session's role or ownership does not allow the action.
    Forbidden(&'static str),
    NotFound(String),
    Registry(RegistryError),
    Export(String),
}

impl ActionError {
    /// Stable metadata tag for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::Validation(_) => "validation",
            Self::Write(_) => "write",
            Self::NotSignedIn => "not_signed_in",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Registry(_) => "registry",
            Self::Export(_) => "export",
        }
    }
}

impl Display for ActionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auth(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Write(err) => write!(f, "Save failed: {err}"),
            Self::NotSignedIn => write!(f, "You need to sign in first."),
            Self::Forbidden(action) => write!(f, "You are not allowed to {action}."),
            Self::NotFound(what) => write!(f, "{what} was not found."),
            Self::Registry(err) => write!(f, "{err}"),
            Self::Export(message) => write!(f, "Export failed: {message}"),
        }
    }
}

impl Error for ActionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Auth(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Write(err) => Some(err),
            Self::Registry(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AuthError> for ActionError {
    fn from(value: AuthError) -> Self {
        Self::Auth(value)
    }
}

impl From<ValidationError> for ActionError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for ActionError {
    fn from(value: StoreError) -> Self {
        Self::Write(value)
    }
}

impl From<RegistryError> for ActionError {
    fn from(value: RegistryError) -> Self {
        match value {
            RegistryError::Store(err) => Self::Write(err),
            other => Self::Registry(other),
        }
    }
}

impl From<csv::Error> for ActionError {
    fn from(value: csv::Error) -> Self {
        Self::Export(value.to_string())
    }
}

/// ISO-8601 UTC timestamp with millisecond precision, as stored in records.
pub fn iso_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
