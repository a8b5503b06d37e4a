//! Session guard: turns identity and profile changes into session events.
//!
//! # Responsibility
//! - Observe the identity provider and, for a signed-in user, their
//!   `students/<uid>` record.
//! - Derive the [`Session`] the rest of the app renders with.
//!
//! # Invariants
//! - At most one profile subscription is active, always for the current user.
//! - `Ready` is emitted once per provisioned sign-in; later profile changes
//!   for the same user emit `Updated`.
//! - Failures are reported once as `Failed`; the guard never retries.

use crate::identity::{AuthUser, IdentityProvider};
use crate::model::session::{resolve_avatar_url, Session};
use crate::model::student::StudentRecord;
use crate::store::{path, DataStore, Disposer};
use log::{info, warn};
use std::cell::RefCell;
use std::rc::Rc;

/// Message shown while a signed-in user has no profile record.
pub const NOT_PROVISIONED_MESSAGE: &str =
    "⚠️ Your profile isn't fully set up yet. Please wait or contact support.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// No user is signed in; the host must load `redirect`.
    SignedOut { redirect: String },
    /// Signed in, but `students/<uid>` does not exist.
    NotProvisioned,
    Ready(Session),
    /// Profile of the ready user changed.
    Updated(Session),
    /// The profile could not be observed.
    Failed(String),
}

pub type SessionListener = Rc<dyn Fn(SessionEvent)>;

#[derive(Debug, Default)]
struct GuardState {
    ready_uid: Option<String>,
}

pub struct SessionGuard {
    identity: Rc<dyn IdentityProvider>,
    store: Rc<dyn DataStore>,
    entry_page: String,
    default_avatar_url: String,
    state: Rc<RefCell<GuardState>>,
    profile: Rc<RefCell<Option<Disposer>>>,
    auth: RefCell<Option<Disposer>>,
}

impl SessionGuard {
    pub fn new(
        identity: Rc<dyn IdentityProvider>,
        store: Rc<dyn DataStore>,
        entry_page: impl Into<String>,
        default_avatar_url: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            store,
            entry_page: entry_page.into(),
            default_avatar_url: default_avatar_url.into(),
            state: Rc::new(RefCell::new(GuardState::default())),
            profile: Rc::new(RefCell::new(None)),
            auth: RefCell::new(None),
        }
    }

    /// Starts observing. The first event is delivered before this returns.
    pub fn start(&self, listener: SessionListener) {
        self.stop();
        let store = Rc::clone(&self.store);
        let state = Rc::clone(&self.state);
        let profile = Rc::clone(&self.profile);
        let entry_page = self.entry_page.clone();
        let default_avatar_url = self.default_avatar_url.clone();

        let disposer = self.identity.on_session_change(Box::new(move |user| {
            let previous = profile.borrow_mut().take();
            drop(previous);

            let Some(user) = user else {
                state.borrow_mut().ready_uid = None;
                info!("event=session_redirect module=session status=ok reason=signed_out");
                listener(SessionEvent::SignedOut {
                    redirect: entry_page.clone(),
                });
                return;
            };

            let user = user.clone();
            let state_for_profile = Rc::clone(&state);
            let listener_for_profile = Rc::clone(&listener);
            let default_avatar_url = default_avatar_url.clone();
            let subscribed = store.subscribe(
                &path::student(&user.uid),
                Box::new(move |record| {
                    let Some(record) = record.filter(|value| value.is_object()) else {
                        state_for_profile.borrow_mut().ready_uid = None;
                        warn!("event=session_ready module=session status=not_provisioned");
                        listener_for_profile(SessionEvent::NotProvisioned);
                        return;
                    };
                    let student = StudentRecord::from_value(&user.uid, record);
                    let session = derive_session(&user, &student, &default_avatar_url);
                    let already_ready = {
                        let mut state = state_for_profile.borrow_mut();
                        let already = state.ready_uid.as_deref() == Some(user.uid.as_str());
                        state.ready_uid = Some(user.uid.clone());
                        already
                    };
                    if already_ready {
                        listener_for_profile(SessionEvent::Updated(session));
                    } else {
                        info!(
                            "event=session_ready module=session status=ok role={}",
                            session.role
                        );
                        listener_for_profile(SessionEvent::Ready(session));
                    }
                }),
            );
            match subscribed {
                Ok(disposer) => {
                    *profile.borrow_mut() = Some(disposer);
                }
                Err(err) => {
                    warn!("event=session_ready module=session status=error");
                    listener(SessionEvent::Failed(err.to_string()));
                }
            }
        }));
        *self.auth.borrow_mut() = Some(disposer);
    }

    /// Detaches from the identity provider and the profile record.
    pub fn stop(&self) {
        let auth = self.auth.borrow_mut().take();
        drop(auth);
        let profile = self.profile.borrow_mut().take();
        drop(profile);
        self.state.borrow_mut().ready_uid = None;
    }

    pub fn is_observing_profile(&self) -> bool {
        self.profile.borrow().is_some()
    }
}

/// Builds the session for `user` from their profile record.
///
/// Display name falls back from `fullName` to the identity display name, the
/// email local part and finally `User`.
pub fn derive_session(user: &AuthUser, record: &StudentRecord, default_avatar_url: &str) -> Session {
    let email = if record.email.trim().is_empty() {
        user.email.clone()
    } else {
        record.email.clone()
    };
    let local_part = email.split('@').next().unwrap_or_default().trim().to_string();
    let display_name = [
        Some(record.full_name.trim().to_string()),
        user.display_name.as_deref().map(|name| name.trim().to_string()),
        Some(local_part),
    ]
    .into_iter()
    .flatten()
    .find(|name| !name.is_empty())
    .unwrap_or_else(|| "User".to_string());

    let avatar = record.photo.as_deref().unwrap_or(default_avatar_url);
    Session {
        user_id: user.uid.clone(),
        role: record.role,
        display_name,
        avatar_url: resolve_avatar_url(Some(avatar)),
        email,
    }
}
