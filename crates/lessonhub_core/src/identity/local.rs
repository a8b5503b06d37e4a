//! Local accounts stored in the `accounts` table with argon2 hashes.

use super::{AuthError, AuthResult, AuthUser, IdentityProvider, SessionCallback, SignUpRequest};
use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::store::Disposer;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::{Rc, Weak};
use uuid::Uuid;

/// Minimum secret length accepted by the hosted provider.
pub const DEFAULT_MIN_SECRET_LEN: usize = 6;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

type SharedSessionCallback = Rc<dyn Fn(Option<&AuthUser>)>;

#[derive(Default)]
struct SessionListeners {
    next_id: u64,
    entries: BTreeMap<u64, SharedSessionCallback>,
}

/// [`IdentityProvider`] over a SQLite accounts table.
pub struct LocalIdentity {
    conn: Connection,
    min_secret_len: usize,
    current: RefCell<Option<AuthUser>>,
    listeners: Rc<RefCell<SessionListeners>>,
}

impl LocalIdentity {
    pub fn new(conn: Connection, min_secret_len: usize) -> Self {
        Self {
            conn,
            min_secret_len,
            current: RefCell::new(None),
            listeners: Rc::new(RefCell::new(SessionListeners::default())),
        }
    }

    pub fn open(db_path: impl AsRef<Path>, min_secret_len: usize) -> DbResult<Self> {
        Ok(Self::new(open_db(db_path)?, min_secret_len))
    }

    pub fn open_in_memory(min_secret_len: usize) -> DbResult<Self> {
        Ok(Self::new(open_db_in_memory()?, min_secret_len))
    }

    fn check_secret(&self, secret: &str) -> AuthResult<()> {
        if secret.chars().count() < self.min_secret_len {
            return Err(AuthError::WeakPassword {
                min_len: self.min_secret_len,
            });
        }
        Ok(())
    }

    fn find_by_email(&self, email: &str) -> AuthResult<Option<(AuthUser, String)>> {
        let found = self
            .conn
            .query_row(
                "SELECT uid, email, display_name, password_hash
                 FROM accounts WHERE email = ?1;",
                [email.trim()],
                |row| {
                    Ok((
                        AuthUser {
                            uid: row.get(0)?,
                            email: row.get(1)?,
                            display_name: row.get(2)?,
                        },
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        Ok(found)
    }

    fn stored_hash(&self, uid: &str) -> AuthResult<String> {
        self.conn
            .query_row(
                "SELECT password_hash FROM accounts WHERE uid = ?1;",
                [uid],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(AuthError::NotSignedIn)
    }

    fn signed_in_uid(&self) -> AuthResult<String> {
        self.current
            .borrow()
            .as_ref()
            .map(|user| user.uid.clone())
            .ok_or(AuthError::NotSignedIn)
    }

    fn set_current(&self, user: Option<AuthUser>) {
        *self.current.borrow_mut() = user.clone();
        let callbacks: Vec<(u64, SharedSessionCallback)> = self
            .listeners
            .borrow()
            .entries
            .iter()
            .map(|(id, callback)| (*id, Rc::clone(callback)))
            .collect();
        for (id, callback) in callbacks {
            if self.listeners.borrow().entries.contains_key(&id) {
                callback(user.as_ref());
            }
        }
    }
}

impl IdentityProvider for LocalIdentity {
    fn current_user(&self) -> Option<AuthUser> {
        self.current.borrow().clone()
    }

    fn on_session_change(&self, callback: SessionCallback) -> Disposer {
        let callback: SharedSessionCallback = Rc::from(callback);
        let id = {
            let mut listeners = self.listeners.borrow_mut();
            listeners.next_id += 1;
            let id = listeners.next_id;
            listeners.entries.insert(id, Rc::clone(&callback));
            id
        };

        let current = self.current_user();
        callback(current.as_ref());

        let weak: Weak<RefCell<SessionListeners>> = Rc::downgrade(&self.listeners);
        Disposer::new(move || {
            if let Some(listeners) = weak.upgrade() {
                listeners.borrow_mut().entries.remove(&id);
            }
        })
    }

    fn sign_in(&self, email: &str, secret: &str) -> AuthResult<AuthUser> {
        let Some((user, hash)) = self.find_by_email(email)? else {
            warn!("event=auth_sign_in module=identity status=error reason=unknown_account");
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_secret(secret, &hash)? {
            warn!("event=auth_sign_in module=identity status=error reason=bad_secret");
            return Err(AuthError::InvalidCredentials);
        }
        info!("event=auth_sign_in module=identity status=ok");
        self.set_current(Some(user.clone()));
        Ok(user)
    }

    fn sign_up(&self, request: &SignUpRequest) -> AuthResult<AuthUser> {
        let email = request.email.trim();
        if !EMAIL_RE.is_match(email) {
            return Err(AuthError::InvalidEmail);
        }
        self.check_secret(&request.secret)?;
        if self.find_by_email(email)?.is_some() {
            return Err(AuthError::EmailInUse);
        }

        let user = AuthUser {
            uid: Uuid::new_v4().simple().to_string(),
            email: email.to_string(),
            display_name: Some(request.full_name.trim().to_string())
                .filter(|name| !name.is_empty()),
        };
        let hash = hash_secret(&request.secret)?;
        self.conn.execute(
            "INSERT INTO accounts (uid, email, display_name, password_hash)
             VALUES (?1, ?2, ?3, ?4);",
            params![user.uid, user.email, user.display_name, hash],
        )?;
        info!("event=auth_sign_up module=identity status=ok");
        self.set_current(Some(user.clone()));
        Ok(user)
    }

    fn sign_out(&self) -> AuthResult<()> {
        if self.current.borrow().is_none() {
            return Ok(());
        }
        info!("event=auth_sign_out module=identity status=ok");
        self.set_current(None);
        Ok(())
    }

    fn reauthenticate(&self, secret: &str) -> AuthResult<()> {
        let uid = self.signed_in_uid()?;
        let hash = self.stored_hash(&uid)?;
        if verify_secret(secret, &hash)? {
            Ok(())
        } else {
            warn!("event=auth_reauthenticate module=identity status=error");
            Err(AuthError::InvalidCredentials)
        }
    }

    fn update_password(&self, new_secret: &str) -> AuthResult<()> {
        let uid = self.signed_in_uid()?;
        self.check_secret(new_secret)?;
        let hash = hash_secret(new_secret)?;
        self.conn.execute(
            "UPDATE accounts SET password_hash = ?1 WHERE uid = ?2;",
            params![hash, uid],
        )?;
        info!("event=auth_update_password module=identity status=ok");
        Ok(())
    }

    fn delete_current_user(&self) -> AuthResult<()> {
        let uid = self.signed_in_uid()?;
        self.conn
            .execute("DELETE FROM accounts WHERE uid = ?1;", [uid.as_str()])?;
        info!("event=auth_delete_user module=identity status=ok");
        self.set_current(None);
        Ok(())
    }
}

fn hash_secret(secret: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Hash(err.to_string()))
}

fn verify_secret(secret: &str, hash: &str) -> AuthResult<bool> {
    let parsed = PasswordHash::new(hash).map_err(|err| AuthError::Hash(err.to_string()))?;
    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok())
}
