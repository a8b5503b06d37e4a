//! Multi-tenant backend registry.
//!
//! # Responsibility
//! - Hold named backends (`default`, `app_<creatorUid>`) and the active one.
//! - Resolve which backend a sign-in or sign-up must use, from the pointer a
//!   creator published in the default store.
//!
//! # Invariants
//! - `default` is always registered and selectable.
//! - Resolution never fails because of a missing or broken creator backend;
//!   it falls back to `default`.
//! - Saving and resetting a creator config are two independent writes.

use crate::identity::{IdentityProvider, LocalIdentity};
use crate::model::text;
use crate::store::{path, DataStore, SqliteDataStore, StoreError, StoreResult};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::rc::Rc;

pub const DEFAULT_BACKEND: &str = "default";

/// Connection settings a creator publishes for their own backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendConfig {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub storage_bucket: String,
    pub messaging_sender_id: String,
    pub app_id: String,
    #[serde(rename = "databaseURL")]
    pub database_url: String,
}

impl BackendConfig {
    pub fn from_value(record: &Value) -> Self {
        Self {
            api_key: text(record, "apiKey"),
            auth_domain: text(record, "authDomain"),
            project_id: text(record, "projectId"),
            storage_bucket: text(record, "storageBucket"),
            messaging_sender_id: text(record, "messagingSenderId"),
            app_id: text(record, "appId"),
            database_url: text(record, "databaseURL"),
        }
    }

    pub fn validate(&self) -> Result<(), RegistryError> {
        for (field, value) in [
            ("apiKey", &self.api_key),
            ("authDomain", &self.auth_domain),
            ("projectId", &self.project_id),
        ] {
            if value.trim().is_empty() {
                return Err(RegistryError::MissingField(field));
            }
        }
        Ok(())
    }

    pub fn to_value(&self) -> Value {
        json!({
            "apiKey": self.api_key.trim(),
            "authDomain": self.auth_domain.trim(),
            "projectId": self.project_id.trim(),
            "storageBucket": self.storage_bucket.trim(),
            "messagingSenderId": self.messaging_sender_id.trim(),
            "appId": self.app_id.trim(),
            "databaseURL": self.database_url.trim(),
        })
    }
}

#[derive(Debug)]
pub enum RegistryError {
    InvalidName(String),
    DuplicateName(String),
    UnknownBackend(String),
    MissingField(&'static str),
    /// A factory could not open a creator backend.
    Open(String),
    Store(StoreError),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(name) => write!(f, "backend name `{name}` is invalid"),
            Self::DuplicateName(name) => write!(f, "backend `{name}` is already registered"),
            Self::UnknownBackend(name) => write!(f, "backend `{name}` is not registered"),
            Self::MissingField(field) => write!(f, "{field} is required"),
            Self::Open(message) => write!(f, "backend could not be opened: {message}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for RegistryError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// A data store and identity provider pair.
#[derive(Clone)]
pub struct Backend {
    name: String,
    config: Option<BackendConfig>,
    store: Rc<dyn DataStore>,
    identity: Rc<dyn IdentityProvider>,
}

impl Backend {
    pub fn new(
        name: impl Into<String>,
        store: Rc<dyn DataStore>,
        identity: Rc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            name: name.into(),
            config: None,
            store,
            identity,
        }
    }

    pub fn with_config(mut self, config: BackendConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> Option<&BackendConfig> {
        self.config.as_ref()
    }

    pub fn store(&self) -> Rc<dyn DataStore> {
        Rc::clone(&self.store)
    }

    pub fn identity(&self) -> Rc<dyn IdentityProvider> {
        Rc::clone(&self.identity)
    }

    pub fn summary(&self) -> BackendSummary {
        BackendSummary {
            name: self.name.clone(),
            custom: self.name != DEFAULT_BACKEND,
            project_id: self
                .config
                .as_ref()
                .map(|config| config.project_id.clone())
                .filter(|value| !value.is_empty()),
            auth_domain: self
                .config
                .as_ref()
                .map(|config| config.auth_domain.clone())
                .filter(|value| !value.is_empty()),
        }
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// What the profile page shows about the active backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSummary {
    pub name: String,
    pub custom: bool,
    pub project_id: Option<String>,
    pub auth_domain: Option<String>,
}

impl BackendSummary {
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![format!("Backend: {}", self.name)];
        if let Some(project_id) = &self.project_id {
            lines.push(format!("Project: {project_id}"));
        }
        if let Some(auth_domain) = &self.auth_domain {
            lines.push(format!("Auth domain: {auth_domain}"));
        }
        lines
    }
}

/// Opens a creator backend from its published config.
pub trait BackendFactory {
    fn open(&self, name: &str, config: &BackendConfig) -> Result<Backend, RegistryError>;
}

/// Opens creator backends as local SQLite databases named after the backend.
#[derive(Debug, Clone)]
pub struct SqliteBackendFactory {
    /// Directory for `<name>.sqlite3` files; in-memory when unset.
    root: Option<PathBuf>,
    min_secret_len: usize,
}

impl SqliteBackendFactory {
    pub fn new(root: Option<PathBuf>, min_secret_len: usize) -> Self {
        Self {
            root,
            min_secret_len,
        }
    }
}

impl BackendFactory for SqliteBackendFactory {
    fn open(&self, name: &str, config: &BackendConfig) -> Result<Backend, RegistryError> {
        let opened = match &self.root {
            Some(root) => {
                let file = root.join(format!("{name}.sqlite3"));
                SqliteDataStore::open(&file).and_then(|store| {
                    LocalIdentity::open(&file, self.min_secret_len)
                        .map(|identity| (store, identity))
                        .map_err(StoreError::from)
                })
            }
            None => SqliteDataStore::open_in_memory().and_then(|store| {
                LocalIdentity::open_in_memory(self.min_secret_len)
                    .map(|identity| (store, identity))
                    .map_err(StoreError::from)
            }),
        };
        let (store, identity) = opened.map_err(|err| RegistryError::Open(err.to_string()))?;
        Ok(Backend::new(name, Rc::new(store), Rc::new(identity)).with_config(config.clone()))
    }
}

pub struct BackendRegistry {
    default: Backend,
    creators: BTreeMap<String, Backend>,
    active: String,
    factory: Option<Box<dyn BackendFactory>>,
}

impl BackendRegistry {
    /// Registry holding `default` as its only, active backend.
    pub fn new(store: Rc<dyn DataStore>, identity: Rc<dyn IdentityProvider>) -> Self {
        Self {
            default: Backend::new(DEFAULT_BACKEND, store, identity),
            creators: BTreeMap::new(),
            active: DEFAULT_BACKEND.to_string(),
            factory: None,
        }
    }

    pub fn with_factory(mut self, factory: Box<dyn BackendFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn register(&mut self, backend: Backend) -> Result<(), RegistryError> {
        let name = backend.name().trim();
        if name.is_empty() || name.contains('/') {
            return Err(RegistryError::InvalidName(backend.name().to_string()));
        }
        if name == DEFAULT_BACKEND || self.creators.contains_key(name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }
        self.creators.insert(name.to_string(), backend);
        Ok(())
    }

    pub fn select(&mut self, name: &str) -> Result<(), RegistryError> {
        if self.get(name).is_none() {
            return Err(RegistryError::UnknownBackend(name.to_string()));
        }
        self.active = name.to_string();
        Ok(())
    }

    pub fn names(&self) -> Vec<String> {
        std::iter::once(DEFAULT_BACKEND.to_string())
            .chain(self.creators.keys().cloned())
            .collect()
    }

    pub fn active_name(&self) -> &str {
        &self.active
    }

    pub fn get(&self, name: &str) -> Option<&Backend> {
        if name == DEFAULT_BACKEND {
            Some(&self.default)
        } else {
            self.creators.get(name)
        }
    }

    pub fn active(&self) -> &Backend {
        self.get(&self.active).unwrap_or(&self.default)
    }

    pub fn default_backend(&self) -> &Backend {
        &self.default
    }

    pub fn describe_active(&self) -> BackendSummary {
        self.active().summary()
    }

    /// Selects the backend sign-in and sign-up must use.
    ///
    /// Reads `metadata/activeCreator/uid` and that creator's published config
    /// from the default store. Store errors propagate; a missing pointer, a
    /// missing config or a backend that cannot be opened selects `default`.
    pub fn resolve_for_sign_in(&mut self) -> Result<&Backend, RegistryError> {
        let default_store = self.default.store();
        let target = match load_active_creator(&*default_store)? {
            Some(uid) => match load_backend_config(&*default_store, &uid)? {
                Some(config) => self.ensure_creator_backend(&uid, &config),
                None => DEFAULT_BACKEND.to_string(),
            },
            None => DEFAULT_BACKEND.to_string(),
        };
        self.active = target;
        let kind = if self.active == DEFAULT_BACKEND {
            "default"
        } else {
            "creator"
        };
        info!("event=backend_select module=tenant status=ok kind={kind}");
        Ok(self.active())
    }

    fn ensure_creator_backend(&mut self, uid: &str, config: &BackendConfig) -> String {
        let name = app_name(uid);
        if self.creators.contains_key(&name) {
            return name;
        }
        let Some(factory) = &self.factory else {
            warn!("event=backend_select module=tenant status=fallback reason=no_factory");
            return DEFAULT_BACKEND.to_string();
        };
        match factory.open(&name, config) {
            Ok(backend) => {
                self.creators.insert(name.clone(), backend);
                name
            }
            Err(err) => {
                warn!(
                    "event=backend_select module=tenant status=fallback reason=open_failed error_kind={}",
                    error_kind(&err)
                );
                DEFAULT_BACKEND.to_string()
            }
        }
    }
}

fn error_kind(err: &RegistryError) -> &'static str {
    match err {
        RegistryError::InvalidName(_) => "invalid_name",
        RegistryError::DuplicateName(_) => "duplicate_name",
        RegistryError::UnknownBackend(_) => "unknown_backend",
        RegistryError::MissingField(_) => "missing_field",
        RegistryError::Open(_) => "open",
        RegistryError::Store(_) => "store",
    }
}

/// Registry name of a creator's backend.
pub fn app_name(uid: &str) -> String {
    format!("app_{uid}")
}

pub fn load_active_creator(store: &dyn DataStore) -> StoreResult<Option<String>> {
    Ok(store
        .read(path::active_creator_uid())?
        .and_then(|value| value.as_str().map(str::trim).map(str::to_string))
        .filter(|uid| !uid.is_empty()))
}

pub fn load_backend_config(store: &dyn DataStore, uid: &str) -> StoreResult<Option<BackendConfig>> {
    Ok(store
        .read(&path::backend_config(uid))?
        .filter(Value::is_object)
        .map(|record| BackendConfig::from_value(&record)))
}

/// Publishes `config` for `uid` and points new sign-ins at it.
pub fn save_backend_config(
    store: &dyn DataStore,
    uid: &str,
    config: &BackendConfig,
) -> Result<(), RegistryError> {
    config.validate()?;
    let mut settings = Map::new();
    settings.insert("firebaseConfig".to_string(), config.to_value());
    store.patch(&path::user_settings(uid), settings)?;

    let mut pointer = Map::new();
    pointer.insert("uid".to_string(), json!(uid));
    store.patch(path::active_creator(), pointer)?;
    info!("event=backend_config_save module=tenant status=ok");
    Ok(())
}

/// Removes the published config and the active-creator pointer.
pub fn reset_backend_config(store: &dyn DataStore, uid: &str) -> StoreResult<()> {
    store.delete(&path::backend_config(uid))?;
    store.delete(path::active_creator())?;
    info!("event=backend_config_reset module=tenant status=ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{BackendConfig, RegistryError};
    use serde_json::json;

    #[test]
    fn config_requires_the_connection_fields() {
        let mut config = BackendConfig {
            api_key: "key".to_string(),
            auth_domain: "demo.example.test".to_string(),
            ..BackendConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RegistryError::MissingField("projectId"))
        ));
        config.project_id = "demo".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_uses_camel_case_on_the_wire() {
        let config: BackendConfig = serde_json::from_value(json!({
            "apiKey": "k",
            "authDomain": "d",
            "projectId": "p",
            "databaseURL": "https://db.example.test"
        }))
        .expect("decode");
        assert_eq!(config.database_url, "https://db.example.test");
        assert_eq!(BackendConfig::from_value(&config.to_value()), config);
    }
}
