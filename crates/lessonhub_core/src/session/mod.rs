//! Authentication-driven session lifecycle.

pub mod guard;

pub use guard::{derive_session, SessionEvent, SessionGuard, SessionListener, NOT_PROVISIONED_MESSAGE};
