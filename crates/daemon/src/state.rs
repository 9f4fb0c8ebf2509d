use std::{fs, path::PathBuf};

use serde::{Deserialize, Serialize};

use common::quota::DEFAULT_AGENT_QUOTA_BYTES;

use crate::ipfs::DEFAULT_IPFS_API_URL;

pub const APP_NAME: &str = "pinsvc";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DB_FILE_NAME: &str = "db.sqlite";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Port for the API server
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Kubo RPC endpoint
    #[serde(default = "default_ipfs_api_url")]
    pub ipfs_api_url: String,
    #[serde(default = "default_ipfs_timeout_secs")]
    pub ipfs_timeout_secs: u64,
    #[serde(default = "default_ipfs_max_retries")]
    pub ipfs_max_retries: u32,
    /// Upper bound on a single backend pin call
    #[serde(default = "default_pin_timeout_secs")]
    pub pin_timeout_secs: u64,
    /// How often the worker looks for pins stuck in `pinning`
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
    /// Quota given to principals registered without an explicit one
    #[serde(default = "default_quota_bytes")]
    pub default_quota_bytes: u64,
    /// Directory for log files (stdout only if not set)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

fn default_api_port() -> u16 {
    3000
}

fn default_ipfs_api_url() -> String {
    DEFAULT_IPFS_API_URL.to_string()
}

fn default_ipfs_timeout_secs() -> u64 {
    30
}

fn default_ipfs_max_retries() -> u32 {
    3
}

fn default_pin_timeout_secs() -> u64 {
    30 * 60
}

fn default_reap_interval_secs() -> u64 {
    60
}

fn default_quota_bytes() -> u64 {
    DEFAULT_AGENT_QUOTA_BYTES
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            ipfs_api_url: default_ipfs_api_url(),
            ipfs_timeout_secs: default_ipfs_timeout_secs(),
            ipfs_max_retries: default_ipfs_max_retries(),
            pin_timeout_secs: default_pin_timeout_secs(),
            reap_interval_secs: default_reap_interval_secs(),
            default_quota_bytes: default_quota_bytes(),
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the pinsvc directory (~/.pinsvc)
    pub pinsvc_dir: PathBuf,
    /// Path to the SQLite database
    pub db_path: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the pinsvc directory path (custom or default ~/.pinsvc)
    pub fn pinsvc_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new state directory
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let pinsvc_dir = Self::pinsvc_dir(custom_path)?;

        if pinsvc_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&pinsvc_dir)?;

        let config = config.unwrap_or_default();
        let config_path = pinsvc_dir.join(CONFIG_FILE_NAME);
        fs::write(&config_path, toml::to_string_pretty(&config)?)?;

        // the daemon creates the schema on first start
        let db_path = pinsvc_dir.join(DB_FILE_NAME);
        fs::write(&db_path, "")?;

        Ok(Self {
            pinsvc_dir,
            db_path,
            config_path,
            config,
        })
    }

    /// Load existing state from the pinsvc directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let pinsvc_dir = Self::pinsvc_dir(custom_path)?;

        if !pinsvc_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let db_path = pinsvc_dir.join(DB_FILE_NAME);
        let config_path = pinsvc_dir.join(CONFIG_FILE_NAME);

        if !db_path.exists() {
            return Err(StateError::MissingFile(DB_FILE_NAME.to_string()));
        }
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config: AppConfig = toml::from_str(&fs::read_to_string(&config_path)?)?;

        Ok(Self {
            pinsvc_dir,
            db_path,
            config_path,
            config,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("pinsvc directory not initialized. Run 'pinsvc init' first")]
    NotInitialized,

    #[error("pinsvc directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state");

        let config = AppConfig {
            api_port: 4000,
            ..Default::default()
        };
        let state = AppState::init(Some(path.clone()), Some(config.clone())).unwrap();
        assert!(state.db_path.exists());

        let loaded = AppState::load(Some(path.clone())).unwrap();
        assert_eq!(loaded.config, config);
        assert_eq!(loaded.db_path, state.db_path);

        assert!(matches!(
            AppState::init(Some(path), None),
            Err(StateError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_load_uninitialized() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AppState::load(Some(dir.path().join("missing"))),
            Err(StateError::NotInitialized)
        ));
    }

    #[test]
    fn test_load_missing_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state");
        let state = AppState::init(Some(path.clone()), None).unwrap();
        fs::remove_file(&state.db_path).unwrap();

        assert!(matches!(
            AppState::load(Some(path)),
            Err(StateError::MissingFile(f)) if f == DB_FILE_NAME
        ));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AppConfig = toml::from_str("api_port = 8123\n").unwrap();
        assert_eq!(config.api_port, 8123);
        assert_eq!(config.pin_timeout_secs, 1800);
        assert_eq!(config.ipfs_api_url, DEFAULT_IPFS_API_URL);
        assert_eq!(config.default_quota_bytes, DEFAULT_AGENT_QUOTA_BYTES);
    }
}
