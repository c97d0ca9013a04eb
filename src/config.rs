//! Client configuration parsed from environment variables.

use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

const SESSION_DIR: &str = "taskdesk";
const SESSION_FILE: &str = "session.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} is not a number of seconds")]
    InvalidNumber { var: &'static str, value: String },
    #[error("{var} must not be empty")]
    Empty { var: &'static str },
    #[error("no config directory available; set TASKDESK_SESSION_FILE")]
    NoSessionPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API root, e.g. `https://tasks.example.com/api`, without a trailing slash.
    pub api_url: String,
    pub timeouts: Timeouts,
    /// Where the access/refresh token pair is persisted between runs.
    pub session_file: PathBuf,
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `TASKDESK_API_URL`: default `http://127.0.0.1:8000/api`
    /// - `TASKDESK_REQUEST_TIMEOUT_SECS`: default 30
    /// - `TASKDESK_CONNECT_TIMEOUT_SECS`: default 10
    /// - `TASKDESK_SESSION_FILE`: default `<config dir>/taskdesk/session.json`
    ///
    /// # Errors
    ///
    /// Returns an error if a timeout is not a number, the URL is blank, or no
    /// session file location can be determined.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = parse_api_url(std::env::var("TASKDESK_API_URL").ok().as_deref())?;
        let timeouts = Timeouts {
            request_secs: env_parse_secs("TASKDESK_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect_secs: env_parse_secs("TASKDESK_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
        };
        let session_file = match std::env::var_os("TASKDESK_SESSION_FILE") {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => default_session_file().ok_or(ConfigError::NoSessionPath)?,
        };

        Ok(Self { api_url, timeouts, session_file })
    }
}

fn parse_api_url(raw: Option<&str>) -> Result<String, ConfigError> {
    let url = raw.unwrap_or(DEFAULT_API_URL).trim().trim_end_matches('/');
    if url.is_empty() {
        return Err(ConfigError::Empty { var: "TASKDESK_API_URL" });
    }
    Ok(url.to_owned())
}

fn env_parse_secs(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { var, value: raw }),
        _ => Ok(default),
    }
}

/// `<config dir>/taskdesk/session.json`, if the platform has a config dir.
#[must_use]
pub fn default_session_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(SESSION_DIR).join(SESSION_FILE))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
