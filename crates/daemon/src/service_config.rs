use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use common::prelude::OrchestratorConfig;

use crate::ipfs::KuboConfig;
use crate::state::AppConfig;

#[derive(Debug, Clone)]
pub struct Config {
    // http server configuration
    /// Port for the API HTTP server
    pub api_port: u16,

    // data store configuration
    /// a path to a sqlite database, if not set then an
    ///  in-memory database will be used
    pub sqlite_path: Option<PathBuf>,

    // pinning configuration
    /// Kubo RPC endpoint and request policy
    pub ipfs: KuboConfig,
    /// Pin timeout and stalled-pin reaping
    pub orchestrator: OrchestratorConfig,

    // logging
    pub log_level: tracing::Level,
    /// Directory for log files (optional, logs to stdout only if not set)
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// Build the service configuration from a loaded `config.toml`
    pub fn from_app_config(
        app_config: &AppConfig,
        sqlite_path: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let mut ipfs = KuboConfig::new(Url::parse(&app_config.ipfs_api_url)?);
        ipfs.timeout = Duration::from_secs(app_config.ipfs_timeout_secs);
        ipfs.max_retries = app_config.ipfs_max_retries;

        if app_config.pin_timeout_secs == 0 {
            return Err(ConfigError::ZeroDuration("pin_timeout_secs"));
        }
        if app_config.reap_interval_secs == 0 {
            return Err(ConfigError::ZeroDuration("reap_interval_secs"));
        }

        Ok(Self {
            api_port: app_config.api_port,
            sqlite_path,
            ipfs,
            orchestrator: OrchestratorConfig {
                pin_timeout: Duration::from_secs(app_config.pin_timeout_secs),
                reap_interval: Duration::from_secs(app_config.reap_interval_secs),
            },
            log_level: tracing::Level::INFO,
            log_dir: app_config.log_dir.clone(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid ipfs_api_url: {0}")]
    IpfsUrl(#[from] url::ParseError),
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_app_config() {
        let app_config = AppConfig {
            ipfs_api_url: "http://kubo:5001".into(),
            ipfs_max_retries: 5,
            pin_timeout_secs: 120,
            reap_interval_secs: 10,
            ..Default::default()
        };
        let config = Config::from_app_config(&app_config, None).unwrap();

        assert_eq!(config.api_port, 3000);
        assert_eq!(config.ipfs.api_url.host_str(), Some("kubo"));
        assert_eq!(config.ipfs.max_retries, 5);
        assert_eq!(
            config.orchestrator.stall_threshold(),
            Duration::from_secs(130)
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad_url = AppConfig {
            ipfs_api_url: "not a url".into(),
            ..Default::default()
        };
        assert!(matches!(
            Config::from_app_config(&bad_url, None),
            Err(ConfigError::IpfsUrl(_))
        ));

        let zero_interval = AppConfig {
            reap_interval_secs: 0,
            ..Default::default()
        };
        assert!(matches!(
            Config::from_app_config(&zero_interval, None),
            Err(ConfigError::ZeroDuration("reap_interval_secs"))
        ));
    }
}
