//! Deployment configuration loaded from TOML.
//!
//! # Invariants
//! - Every key is optional; an empty document yields [`AppConfig::default`].
//! - Unknown keys are rejected so typos surface at startup.

use crate::logging::{default_log_level, init_logging, normalize_level};
use crate::nav::BackPolicy;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DEFAULT_ENTRY_PAGE: &str = "index.html";
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 5 * 1024 * 1024;
pub const DEFAULT_MIN_PASSWORD_LEN: usize = 6;
pub const DEFAULT_AVATAR_URL: &str = "https://cdn-icons-png.flaticon.com/512/149/149071.png";

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config TOML: {err}"),
            Self::Invalid(message) => write!(f, "invalid config value: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Page unauthenticated visitors are sent to.
    pub entry_page: String,
    pub log_level: String,
    /// Absolute log directory; logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    /// SQLite file for the local store; in-memory when unset.
    pub database_path: Option<PathBuf>,
    pub max_attachment_bytes: u64,
    pub min_password_len: usize,
    pub back_policy: BackPolicy,
    /// Avatar for profiles without a photo.
    pub default_avatar_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            entry_page: DEFAULT_ENTRY_PAGE.to_string(),
            log_level: default_log_level().to_string(),
            log_dir: None,
            database_path: None,
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            min_password_len: DEFAULT_MIN_PASSWORD_LEN,
            back_policy: BackPolicy::default(),
            default_avatar_url: DEFAULT_AVATAR_URL.to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        normalize_level(&self.log_level).map_err(ConfigError::Invalid)?;
        if self.max_attachment_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_attachment_bytes must be greater than zero".to_string(),
            ));
        }
        if self.min_password_len == 0 {
            return Err(ConfigError::Invalid(
                "min_password_len must be greater than zero".to_string(),
            ));
        }
        if self.entry_page.trim().is_empty() {
            return Err(ConfigError::Invalid("entry_page cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Logout target: the entry page with the auth form opened.
    pub fn logout_redirect(&self) -> String {
        format!("{}?showAuth=1", self.entry_page)
    }

    /// Starts file logging when `log_dir` is configured.
    ///
    /// Returns `Ok(false)` when logging is disabled by configuration.
    pub fn start_logging(&self) -> Result<bool, String> {
        let Some(dir) = &self.log_dir else {
            return Ok(false);
        };
        let dir = dir
            .to_str()
            .ok_or_else(|| format!("log_dir `{}` is not valid UTF-8", dir.display()))?;
        init_logging(&self.log_level, dir)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError};
    use crate::nav::BackPolicy;

    #[test]
    fn empty_document_yields_defaults() {
        let config = AppConfig::from_toml_str("").expect("empty config");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.logout_redirect(), "index.html?showAuth=1");
        assert_eq!(config.start_logging(), Ok(false));
    }

    #[test]
    fn overrides_are_applied() {
        let config = AppConfig::from_toml_str(
            r#"
            entry_page = "login.html"
            max_attachment_bytes = 1024
            back_policy = "restore_previous"
            "#,
        )
        .expect("valid config");
        assert_eq!(config.entry_page, "login.html");
        assert_eq!(config.max_attachment_bytes, 1024);
        assert_eq!(config.back_policy, BackPolicy::RestorePrevious);
    }

    #[test]
    fn invalid_values_and_unknown_keys_are_rejected() {
        assert!(matches!(
            AppConfig::from_toml_str("max_attachment_bytes = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AppConfig::from_toml_str("log_level = \"loud\""),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AppConfig::from_toml_str("colour = \"red\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_reads_files_and_reports_missing_ones() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("lessonhub.toml");
        std::fs::write(&path, "min_password_len = 8\n").expect("write config");
        let config = AppConfig::load(&path).expect("load config");
        assert_eq!(config.min_password_len, 8);

        let missing = AppConfig::load(dir.path().join("absent.toml")).expect_err("missing file");
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
