//! Database connection settings.

use serde::Deserialize;

use crate::{Error, Result};

const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Where the mapping database lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    #[serde(alias = "url")]
    pub database_url: String,
    pub auth_token: Option<String>,
    pub timeout_ms: u64,
}

impl ConnectionConfig {
    pub fn in_memory() -> Self {
        Self {
            database_url: ":memory:".to_string(),
            auth_token: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn local(path: impl Into<String>) -> Self {
        Self {
            database_url: path.into(),
            ..Self::in_memory()
        }
    }

    pub fn remote(url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            database_url: url.into(),
            auth_token: Some(auth_token.into()),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Whether the URL points at a libsql server rather than a file.
    pub fn is_remote(&self) -> bool {
        let url = self.database_url.trim();
        url.starts_with("libsql://") || url.starts_with("https://") || url.starts_with("http://")
    }

    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty URL, a zero timeout, or a remote
    /// URL without an auth token.
    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(Error::Config {
                details: "database_url must be provided".to_string(),
            });
        }
        if self.timeout_ms == 0 {
            return Err(Error::Config {
                details: "timeout_ms must be greater than zero".to_string(),
            });
        }
        if self.is_remote() && self.auth_token.is_none() {
            return Err(Error::Config {
                details: "auth_token is required for remote databases".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}
