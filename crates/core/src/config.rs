//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses.

use crate::constants::{DEFAULT_DATABASE_URL, DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_PAGE_SIZE};
use crate::{RecordsError, RecordsResult};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    database_url: String,
    max_connections: u32,
    max_page_size: u32,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(
        database_url: String,
        max_connections: u32,
        max_page_size: u32,
    ) -> RecordsResult<Self> {
        if database_url.trim().is_empty() {
            return Err(RecordsError::InvalidConfig(
                "database_url cannot be empty".into(),
            ));
        }
        if max_connections == 0 {
            return Err(RecordsError::InvalidConfig(
                "max_connections must be at least 1".into(),
            ));
        }
        if max_page_size == 0 {
            return Err(RecordsError::InvalidConfig(
                "max_page_size must be at least 1".into(),
            ));
        }

        Ok(Self {
            database_url,
            max_connections,
            max_page_size,
        })
    }

    /// Build a configuration from optional raw values, as read from the environment.
    ///
    /// Missing or blank values fall back to the crate defaults; values that are present but
    /// unparseable are rejected rather than silently replaced.
    pub fn from_env_values(
        database_url: Option<String>,
        max_connections: Option<String>,
        max_page_size: Option<String>,
    ) -> RecordsResult<Self> {
        let database_url = non_blank(database_url).unwrap_or_else(|| DEFAULT_DATABASE_URL.into());
        let max_connections =
            parse_u32("DATABASE_MAX_CONNECTIONS", max_connections)?.unwrap_or(DEFAULT_MAX_CONNECTIONS);
        let max_page_size =
            parse_u32("MOBILEMED_MAX_PAGE_SIZE", max_page_size)?.unwrap_or(DEFAULT_MAX_PAGE_SIZE);

        Self::new(database_url, max_connections, max_page_size)
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn max_connections(&self) -> u32 {
        self.max_connections
    }

    pub fn max_page_size(&self) -> u32 {
        self.max_page_size
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_u32(name: &str, value: Option<String>) -> RecordsResult<Option<u32>> {
    non_blank(value)
        .map(|v| {
            v.parse::<u32>().map_err(|_| {
                RecordsError::InvalidConfig(format!("{name} must be a non-negative integer, got '{v}'"))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_values_use_defaults() {
        let cfg = CoreConfig::from_env_values(None, None, Some("  ".into())).unwrap();
        assert_eq!(cfg.database_url(), DEFAULT_DATABASE_URL);
        assert_eq!(cfg.max_connections(), DEFAULT_MAX_CONNECTIONS);
        assert_eq!(cfg.max_page_size(), DEFAULT_MAX_PAGE_SIZE);
    }

    #[test]
    fn explicit_values_are_parsed() {
        let cfg = CoreConfig::from_env_values(
            Some("sqlite::memory:".into()),
            Some("2".into()),
            Some("50".into()),
        )
        .unwrap();
        assert_eq!(cfg.database_url(), "sqlite::memory:");
        assert_eq!(cfg.max_connections(), 2);
        assert_eq!(cfg.max_page_size(), 50);
    }

    #[test]
    fn rejects_garbage_and_zero() {
        assert!(matches!(
            CoreConfig::from_env_values(None, Some("many".into()), None),
            Err(RecordsError::InvalidConfig(_))
        ));
        assert!(matches!(
            CoreConfig::from_env_values(None, Some("0".into()), None),
            Err(RecordsError::InvalidConfig(_))
        ));
        assert!(matches!(
            CoreConfig::new("sqlite://x.db".into(), 1, 0),
            Err(RecordsError::InvalidConfig(_))
        ));
    }
}
