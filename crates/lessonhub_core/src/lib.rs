//! Core logic for LessonHub.
//! Session, navigation and data-binding state of the web client, kept free
//! of any DOM so it can be driven and tested headless.

pub mod app;
pub mod config;
pub mod db;
pub mod feed;
pub mod identity;
pub mod logging;
pub mod model;
pub mod nav;
pub mod render;
pub mod service;
pub mod session;
pub mod store;
pub mod tenant;

pub use app::App;
pub use config::{AppConfig, ConfigError};
pub use feed::{create_notification, NotificationFeed};
pub use identity::{AuthError, AuthUser, IdentityProvider, LocalIdentity, SignUpRequest};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::session::{resolve_avatar_url, Role, Session};
pub use nav::{BackPolicy, NavOutcome, NavRequest, NavigationError, ViewHistory, ViewId};
pub use render::Surface;
pub use service::{ActionError, ActionResult};
pub use session::{SessionEvent, SessionGuard};
pub use store::{DataStore, Disposer, SqliteDataStore, StoreError, StoreResult};
pub use tenant::{Backend, BackendConfig, BackendRegistry, RegistryError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
