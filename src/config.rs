//! Runtime configuration, loaded the way the teacher's own `config.rs`
//! does: an environment variable carrying inline JSON takes priority,
//! then a `config.json` file on disk, falling back to [`Default`].

use log::LevelFilter;
use serde::Deserialize;
use std::{env, fs::read_to_string, path::PathBuf};

/// The server version extracted from the Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable key to load the config from.
const CONFIG_ENV_KEY: &str = "CHANNEL_CONFIG_JSON";
const CONFIG_FILE_PATH: &str = "config.json";

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Ordered data-store search paths; the last entry is the writable
    /// overlay.
    pub data_store_paths: Vec<PathBuf>,
    pub port: u16,
    /// Worker pool size for the session dispatcher; `None` defaults to
    /// available parallelism at boot.
    pub worker_threads: Option<usize>,
    pub keep_alive_interval_secs: u64,
    pub keep_alive_timeout_secs: u64,
    pub logging: LevelFilter,
    pub log_file: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            data_store_paths: vec![PathBuf::from("data")],
            port: 14666,
            worker_threads: None,
            keep_alive_interval_secs: 10,
            keep_alive_timeout_secs: 30,
            logging: LevelFilter::Info,
            log_file: Some("channel.log".to_string()),
        }
    }
}

/// Loads configuration, falling back to [`Default`] and logging (to
/// stderr, since the logger is not initialized yet) why a present source
/// was rejected.
pub fn load_config() -> RuntimeConfig {
    if let Ok(env) = env::var(CONFIG_ENV_KEY) {
        return match serde_json::from_str(&env) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("failed to parse {CONFIG_ENV_KEY} (using defaults): {err}");
                RuntimeConfig::default()
            }
        };
    }

    let path = PathBuf::from(CONFIG_FILE_PATH);
    if !path.exists() {
        return RuntimeConfig::default();
    }

    match read_to_string(&path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("failed to parse config.json (using defaults): {err}");
                RuntimeConfig::default()
            }
        },
        Err(err) => {
            eprintln!("failed to read config.json (using defaults): {err}");
            RuntimeConfig::default()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = RuntimeConfig::default();
        assert_eq!(config.keep_alive_interval_secs, 10);
        assert_eq!(config.keep_alive_timeout_secs, 30);
        assert!(config.data_store_paths.len() == 1);
    }
}
