//! Identity collaborator contract and the local account implementation.
//!
//! # Responsibility
//! - Define the sign-in/sign-up/session surface the session guard observes.
//! - Keep secrets out of every other module: only providers see them.
//!
//! # Invariants
//! - `on_session_change` delivers the current user immediately, then once
//!   per transition, until its disposer is released.
//! - A successful `sign_up` leaves the new user signed in.

use crate::db::DbError;
use crate::store::Disposer;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

mod local;

pub use local::LocalIdentity;

pub type AuthResult<T> = Result<T, AuthError>;

/// Callback receiving the signed-in user, or `None` after sign-out.
pub type SessionCallback = Box<dyn Fn(Option<&AuthUser>)>;

/// Authenticated account as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
}

/// Registration form submitted from the entry page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignUpRequest {
    pub full_name: String,
    pub email: String,
    pub secret: String,
    pub contact: String,
    pub country: String,
}

/// Provider-side authentication failures, surfaced to the user verbatim.
#[derive(Debug)]
pub enum AuthError {
    InvalidCredentials,
    EmailInUse,
    InvalidEmail,
    WeakPassword { min_len: usize },
    NotSignedIn,
    Hash(String),
    Db(DbError),
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCredentials => write!(f, "invalid email or password"),
            Self::EmailInUse => write!(f, "email address is already in use"),
            Self::InvalidEmail => write!(f, "email address is badly formatted"),
            Self::WeakPassword { min_len } => {
                write!(f, "password should be at least {min_len} characters")
            }
            Self::NotSignedIn => write!(f, "no user is signed in"),
            Self::Hash(message) => write!(f, "password hashing failed: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AuthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for AuthError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for AuthError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Authentication service used by the entry page and the session guard.
pub trait IdentityProvider {
    fn current_user(&self) -> Option<AuthUser>;

    /// Live session observation; see the module invariants.
    fn on_session_change(&self, callback: SessionCallback) -> Disposer;

    fn sign_in(&self, email: &str, secret: &str) -> AuthResult<AuthUser>;

    /// Creates the account and signs it in.
    fn sign_up(&self, request: &SignUpRequest) -> AuthResult<AuthUser>;

    fn sign_out(&self) -> AuthResult<()>;

    /// Confirms the current user's secret before a sensitive operation.
    fn reauthenticate(&self, secret: &str) -> AuthResult<()>;

    fn update_password(&self, new_secret: &str) -> AuthResult<()>;

    /// Deletes the signed-in account and ends the session.
    fn delete_current_user(&self) -> AuthResult<()>;
}

impl<T: IdentityProvider + ?Sized> IdentityProvider for Rc<T> {
    fn current_user(&self) -> Option<AuthUser> {
        (**self).current_user()
    }

    fn on_session_change(&self, callback: SessionCallback) -> Disposer {
        (**self).on_session_change(callback)
    }

    fn sign_in(&self, email: &str, secret: &str) -> AuthResult<AuthUser> {
        (**self).sign_in(email, secret)
    }

    fn sign_up(&self, request: &SignUpRequest) -> AuthResult<AuthUser> {
        (**self).sign_up(request)
    }

    fn sign_out(&self) -> AuthResult<()> {
        (**self).sign_out()
    }

    fn reauthenticate(&self, secret: &str) -> AuthResult<()> {
        (**self).reauthenticate(secret)
    }

    fn update_password(&self, new_secret: &str) -> AuthResult<()> {
        (**self).update_password(new_secret)
    }

    fn delete_current_user(&self) -> AuthResult<()> {
        (**self).delete_current_user()
    }
}

impl<T: IdentityProvider + ?Sized> IdentityProvider for &T {
    fn current_user(&self) -> Option<AuthUser> {
        (**self).current_user()
    }

    fn on_session_change(&self, callback: SessionCallback) -> Disposer {
        (**self).on_session_change(callback)
    }

    fn sign_in(&self, email: &str, secret: &str) -> AuthResult<AuthUser> {
        (**self).sign_in(email, secret)
    }

    fn sign_up(&self, request: &SignUpRequest) -> AuthResult<AuthUser> {
        (**self).sign_up(request)
    }

    fn sign_out(&self) -> AuthResult<()> {
        (**self).sign_out()
    }

    fn reauthenticate(&self, secret: &str) -> AuthResult<()> {
        (**self).reauthenticate(secret)
    }

    fn update_password(&self, new_secret: &str) -> AuthResult<()> {
        (**self).update_password(new_secret)
    }

    fn delete_current_user(&self) -> AuthResult<()> {
        (**self).delete_current_user()
    }
}
