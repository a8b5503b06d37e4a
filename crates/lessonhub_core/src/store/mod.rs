//! Data-store collaborator contract and the local SQLite implementation.
//!
//! # Responsibility
//! - Define the narrow read/subscribe/write surface every view binds to.
//! - Keep the hierarchical path space (`students/<id>`, `lessons/<id>`, ...)
//!   byte-compatible with the hosted store.
//!
//! # Invariants
//! - A `null` (or empty object) value is indistinguishable from "absent".
//! - Live callbacks run after a mutation is committed and never while the
//!   store holds an internal borrow, so callbacks may call back into the store.

use crate::db::DbError;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

mod listeners;
pub mod path;
mod sqlite_store;

pub use sqlite_store::SqliteDataStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Callback receiving the value at a subscribed path (`None` when absent).
pub type SnapshotCallback = Box<dyn Fn(Option<&Value>)>;

/// Errors surfaced by data-store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Path is malformed or addresses something that cannot be written.
    InvalidPath(String),
    /// Persisted payload cannot be decoded.
    InvalidData(String),
    /// Backend refused the mutation.
    Rejected(String),
    Db(DbError),
}

impl StoreError {
    /// Stable metadata tag for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidPath(_) => "invalid_path",
            Self::InvalidData(_) => "invalid_data",
            Self::Rejected(_) => "rejected",
            Self::Db(_) => "db",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPath(message) => write!(f, "invalid store path: {message}"),
            Self::InvalidData(message) => write!(f, "invalid stored data: {message}"),
            Self::Rejected(message) => write!(f, "write rejected: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidData(value.to_string())
    }
}

/// Releases one live subscription.
///
/// Dropping a disposer releases the subscription as well, so a view that
/// forgets its disposers cannot leak callbacks into detached content.
#[must_use = "dropping a disposer ends the subscription immediately"]
pub struct Disposer {
    release: Option<Box<dyn FnOnce()>>,
}

impl Disposer {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Disposer for a binding that holds no resources.
    pub fn noop() -> Self {
        Self { release: None }
    }

    pub fn dispose(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Disposer {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for Disposer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disposer")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// Hierarchical key-value store addressed by slash-separated paths.
pub trait DataStore {
    /// One-shot read of the value at `path`.
    fn read(&self, path: &str) -> StoreResult<Option<Value>>;

    /// Live subscription: `callback` receives the current value immediately
    /// and again after every committed change at, above or below `path`.
    fn subscribe(&self, path: &str, callback: SnapshotCallback) -> StoreResult<Disposer>;

    /// Replaces the value at `path`; `Value::Null` removes it.
    fn write(&self, path: &str, value: Value) -> StoreResult<()>;

    /// Writes each entry of `partial` as a child of `path`.
    ///
    /// Keys may themselves be slash-separated relative paths, which allows a
    /// single batched update rooted at `""`.
    fn patch(&self, path: &str, partial: Map<String, Value>) -> StoreResult<()>;

    fn delete(&self, path: &str) -> StoreResult<()> {
        self.write(path, Value::Null)
    }

    /// Stores `record` under a freshly generated child key and returns it.
    fn append(&self, path: &str, record: Value) -> StoreResult<String>;
}

impl<T: DataStore + ?Sized> DataStore for Rc<T> {
    fn read(&self, path: &str) -> StoreResult<Option<Value>> {
        (**self).read(path)
    }

    fn subscribe(&self, path: &str, callback: SnapshotCallback) -> StoreResult<Disposer> {
        (**self).subscribe(path, callback)
    }

    fn write(&self, path: &str, value: Value) -> StoreResult<()> {
        (**self).write(path, value)
    }

    fn patch(&self, path: &str, partial: Map<String, Value>) -> StoreResult<()> {
        (**self).patch(path, partial)
    }

    fn delete(&self, path: &str) -> StoreResult<()> {
        (**self).delete(path)
    }

    fn append(&self, path: &str, record: Value) -> StoreResult<String> {
        (**self).append(path, record)
    }
}

impl<T: DataStore + ?Sized> DataStore for &T {
    fn read(&self, path: &str) -> StoreResult<Option<Value>> {
        (**self).read(path)
    }

    fn subscribe(&self, path: &str, callback: SnapshotCallback) -> StoreResult<Disposer> {
        (**self).subscribe(path, callback)
    }

    fn write(&self, path: &str, value: Value) -> StoreResult<()> {
        (**self).write(path, value)
    }

    fn patch(&self, path: &str, partial: Map<String, Value>) -> StoreResult<()> {
        (**self).patch(path, partial)
    }

    fn delete(&self, path: &str) -> StoreResult<()> {
        (**self).delete(path)
    }

    fn append(&self, path: &str, record: Value) -> StoreResult<String> {
        (**self).append(path, record)
    }
}
