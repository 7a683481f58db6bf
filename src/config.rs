// Settings module: the strings a user types once (tenant, account, user,
// container) plus endpoint and concurrency knobs. Writes happen only when
// `save` is called; editing a field in memory never touches disk. The
// password is deliberately absent and lives in `auth::Credentials` for
// the duration of a session.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, TransferError};

pub const TRACING_TARGET: &str = "tcstore_cli::config";

pub const DEFAULT_IDENTITY_ENDPOINT: &str =
    "https://api-compute.cloud.toast.com/identity/v2.0/tokens";
pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://api-storage.cloud.toast.com/v1";
pub const DEFAULT_MAX_IN_FLIGHT: usize = 16;
pub const DEFAULT_LIST_PAGE_SIZE: usize = 10_000;

/// Environment variable overriding the identity endpoint.
pub const IDENTITY_URL_ENV: &str = "TCSTORE_IDENTITY_URL";
/// Environment variable overriding the storage endpoint.
pub const STORAGE_URL_ENV: &str = "TCSTORE_STORAGE_URL";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub tenant_name: String,
    pub user_name: String,
    pub account: String,
    pub container_name: String,
    pub identity_endpoint: String,
    pub storage_endpoint: String,
    /// Upper bound on concurrent per-object requests in one batch.
    pub max_in_flight: usize,
    /// `limit` sent with each container listing page.
    pub list_page_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            tenant_name: String::new(),
            user_name: String::new(),
            account: String::new(),
            container_name: String::new(),
            identity_endpoint: DEFAULT_IDENTITY_ENDPOINT.into(),
            storage_endpoint: DEFAULT_STORAGE_ENDPOINT.into(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            list_page_size: DEFAULT_LIST_PAGE_SIZE,
        }
    }
}

impl Settings {
    /// `<config dir>/tcstore/settings.json`, falling back to the current
    /// directory when the platform has no config dir.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tcstore")
            .join("settings.json")
    }

    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    path = %path.display(),
                    "No settings file, using defaults"
                );
                return Ok(Settings::default());
            }
            Err(e) => return Err(TransferError::io(path, e)),
        };
        serde_json::from_str(&data)
            .map_err(|e| TransferError::Settings(format!("{}: {}", path.display(), e)))
    }

    /// Persist to `path`, creating the parent directory when needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TransferError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| TransferError::Settings(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| TransferError::io(path, e))?;
        tracing::debug!(target: TRACING_TARGET, path = %path.display(), "Settings saved");
        Ok(())
    }

    /// Apply endpoint overrides from the environment.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(IDENTITY_URL_ENV) {
            self.identity_endpoint = url;
        }
        if let Ok(url) = std::env::var(STORAGE_URL_ENV) {
            self.storage_endpoint = url;
        }
    }

    /// Names of the fields a workflow needs but that are still empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("tenant name", &self.tenant_name),
            ("user name", &self.user_name),
            ("account", &self.account),
            ("container name", &self.container_name),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Concurrency cap actually used; zero is treated as one.
    pub fn effective_max_in_flight(&self) -> usize {
        self.max_in_flight.max(1)
    }

    pub fn effective_list_page_size(&self) -> usize {
        if self.list_page_size == 0 {
            DEFAULT_LIST_PAGE_SIZE
        } else {
            self.list_page_size
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.storage_endpoint, DEFAULT_STORAGE_ENDPOINT);
    }

    #[test]
    fn save_then_load_keeps_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            tenant_name: "tenant".into(),
            user_name: "me@example.com".into(),
            account: "AUTH_abc".into(),
            container_name: "backups".into(),
            max_in_flight: 4,
            ..Default::default()
        };
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn saved_file_has_no_password_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        Settings::default().save(&path).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("password"));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"account":"AUTH_x"}"#).unwrap();
        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.account, "AUTH_x");
        assert_eq!(loaded.max_in_flight, DEFAULT_MAX_IN_FLIGHT);
    }

    #[test]
    fn malformed_file_is_a_settings_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Settings::load(&path),
            Err(TransferError::Settings(_))
        ));
    }

    #[test]
    fn missing_fields_lists_blank_strings() {
        let settings = Settings {
            tenant_name: "t".into(),
            account: "  ".into(),
            ..Default::default()
        };
        assert_eq!(
            settings.missing_fields(),
            vec!["user name", "account", "container name"]
        );
    }

    #[test]
    fn zero_knobs_fall_back() {
        let settings = Settings {
            max_in_flight: 0,
            list_page_size: 0,
            ..Default::default()
        };
        assert_eq!(settings.effective_max_in_flight(), 1);
        assert_eq!(settings.effective_list_page_size(), DEFAULT_LIST_PAGE_SIZE);
    }

    // Only test in the crate that touches these variables.
    #[test]
    fn env_overrides_endpoints_when_set() {
        std::env::set_var(IDENTITY_URL_ENV, "http://127.0.0.1:9/identity/v2.0");
        std::env::set_var(STORAGE_URL_ENV, "http://127.0.0.1:9/v1");
        let mut settings = Settings {
            tenant_name: "tenant".into(),
            ..Default::default()
        };
        settings.apply_env();
        assert_eq!(settings.identity_endpoint, "http://127.0.0.1:9/identity/v2.0");
        assert_eq!(settings.storage_endpoint, "http://127.0.0.1:9/v1");
        assert_eq!(settings.tenant_name, "tenant");

        std::env::remove_var(IDENTITY_URL_ENV);
        std::env::remove_var(STORAGE_URL_ENV);
        let mut untouched = Settings::default();
        untouched.apply_env();
        assert_eq!(untouched.identity_endpoint, DEFAULT_IDENTITY_ENDPOINT);
        assert_eq!(untouched.storage_endpoint, DEFAULT_STORAGE_ENDPOINT);
    }
}
