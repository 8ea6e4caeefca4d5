//! Daemon configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

pub const WORKSPACE_ENV: &str = "REPORTCARDD_WORKSPACE";
pub const LOG_ENV: &str = "REPORTCARDD_LOG";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Workspace opened before the first request is read. Without one the
    /// host must send `workspace.select`.
    pub workspace: Option<PathBuf>,
    /// `tracing_subscriber::EnvFilter` directive for stderr logging.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Reads `REPORTCARDD_WORKSPACE` and `REPORTCARDD_LOG`, after loading a
    /// `.env` file from the working directory if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let workspace = match lookup(WORKSPACE_ENV) {
            None => None,
            Some(v) if v.trim().is_empty() => None,
            Some(v) => {
                let p = PathBuf::from(v.trim());
                if p.is_file() {
                    return Err(ConfigError::InvalidValue(
                        WORKSPACE_ENV,
                        format!("{} is a file, expected a directory", p.display()),
                    ));
                }
                Some(p)
            }
        };

        let log_filter = match lookup(LOG_ENV) {
            None => DEFAULT_LOG_FILTER.to_string(),
            Some(v) if v.trim().is_empty() => DEFAULT_LOG_FILTER.to_string(),
            Some(v) => {
                let v = v.trim().to_string();
                tracing_subscriber::EnvFilter::try_new(&v)
                    .map_err(|e| ConfigError::InvalidValue(LOG_ENV, e.to_string()))?;
                v
            }
        };

        Ok(Config {
            workspace,
            log_filter,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
