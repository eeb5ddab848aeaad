//! Repository configuration.
//!
//! Every component receives a [`RepositoryConfig`] at construction instead of
//! reading ambient settings. Values can be built in code or loaded from
//! environment variables (`DOCREPO_*` prefixed).
//!
//! # Example
//!
//! ```rust
//! use docrepo_core::config::RepositoryConfig;
//!
//! let config = RepositoryConfig::default().with_page_size(50);
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::defaults;
use crate::error::{Error, Result};

/// Settings shared by the engine components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// REST namespace the platform exposes the document routes under.
    pub api_namespace: String,
    /// Documents per list page.
    pub page_size: u32,
    /// Auto-dismiss delay for transient notices.
    pub notice_duration_ms: u64,
    /// Largest accepted upload in bytes.
    pub upload_max_bytes: u64,
    /// MIME types the upload flow accepts.
    pub allowed_mime_types: Vec<String>,
    /// Event bus buffer capacity.
    pub event_capacity: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            api_namespace: defaults::API_NAMESPACE.to_string(),
            page_size: defaults::PAGE_SIZE,
            notice_duration_ms: defaults::NOTICE_DURATION_MS,
            upload_max_bytes: defaults::UPLOAD_MAX_BYTES,
            allowed_mime_types: defaults::ALLOWED_MIME_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            event_capacity: defaults::EVENT_CAPACITY,
        }
    }
}

impl RepositoryConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DOCREPO_API_NAMESPACE` | `wp/v2` | REST namespace |
    /// | `DOCREPO_PAGE_SIZE` | `20` | Documents per page |
    /// | `DOCREPO_NOTICE_DURATION_MS` | `5000` | Notice auto-dismiss delay |
    /// | `DOCREPO_UPLOAD_MAX_BYTES` | `52428800` | Upload size limit |
    /// | `DOCREPO_ALLOWED_MIME_TYPES` | `application/pdf` | Comma-separated list |
    /// | `DOCREPO_EVENT_CAPACITY` | `256` | Event bus buffer |
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let base = Self::default();

        let api_namespace = std::env::var("DOCREPO_API_NAMESPACE")
            .ok()
            .map(|v| v.trim().trim_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(base.api_namespace);

        let page_size = env_parse("DOCREPO_PAGE_SIZE").unwrap_or(base.page_size);
        let notice_duration_ms =
            env_parse("DOCREPO_NOTICE_DURATION_MS").unwrap_or(base.notice_duration_ms);
        let upload_max_bytes =
            env_parse("DOCREPO_UPLOAD_MAX_BYTES").unwrap_or(base.upload_max_bytes);
        let event_capacity = env_parse("DOCREPO_EVENT_CAPACITY").unwrap_or(base.event_capacity);

        let allowed_mime_types = std::env::var("DOCREPO_ALLOWED_MIME_TYPES")
            .ok()
            .map(|v| parse_list(&v))
            .filter(|list| !list.is_empty())
            .unwrap_or(base.allowed_mime_types);

        let config = Self {
            api_namespace,
            page_size,
            notice_duration_ms,
            upload_max_bytes,
            allowed_mime_types,
            event_capacity,
        };
        debug!(?config, "Loaded repository config from environment");
        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.api_namespace.trim().is_empty() {
            return Err(Error::Config("api_namespace cannot be empty".to_string()));
        }
        if self.page_size == 0 {
            return Err(Error::Config("page_size must be at least 1".to_string()));
        }
        if self.notice_duration_ms > defaults::NOTICE_DURATION_MAX_MS {
            return Err(Error::Config(format!(
                "notice_duration_ms must be at most {}",
                defaults::NOTICE_DURATION_MAX_MS
            )));
        }
        if self.allowed_mime_types.is_empty() {
            return Err(Error::Config(
                "allowed_mime_types must list at least one type".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn with_api_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.api_namespace = namespace.into();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_notice_duration_ms(mut self, ms: u64) -> Self {
        self.notice_duration_ms = ms;
        self
    }

    pub fn with_upload_max_bytes(mut self, bytes: u64) -> Self {
        self.upload_max_bytes = bytes;
        self
    }

    pub fn with_allowed_mime_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_mime_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Whether the upload flow accepts this MIME type.
    pub fn accepts_mime_type(&self, mime_type: &str) -> bool {
        self.allowed_mime_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(mime_type.trim()))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RepositoryConfig::default();
        assert_eq!(config.api_namespace, "wp/v2");
        assert_eq!(config.page_size, defaults::PAGE_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(RepositoryConfig::default()
            .with_api_namespace(" ")
            .validate()
            .is_err());
        assert!(RepositoryConfig::default()
            .with_page_size(0)
            .validate()
            .is_err());
        assert!(RepositoryConfig::default()
            .with_allowed_mime_types(Vec::<String>::new())
            .validate()
            .is_err());
        assert!(matches!(
            RepositoryConfig::default().with_event_capacity(0).validate(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_notice_duration_is_bounded() {
        assert!(RepositoryConfig::default()
            .with_notice_duration_ms(defaults::NOTICE_DURATION_MAX_MS)
            .validate()
            .is_ok());
        assert!(RepositoryConfig::default()
            .with_notice_duration_ms(0)
            .validate()
            .is_ok());
        assert!(matches!(
            RepositoryConfig::default()
                .with_notice_duration_ms(1 << 60)
                .validate(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_accepts_mime_type() {
        let config = RepositoryConfig::default()
            .with_allowed_mime_types(["application/pdf", "text/plain"]);
        assert!(config.accepts_mime_type("APPLICATION/PDF"));
        assert!(config.accepts_mime_type("text/plain"));
        assert!(!config.accepts_mime_type("image/png"));
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            parse_list(" application/pdf, ,text/csv "),
            vec!["application/pdf".to_string(), "text/csv".to_string()]
        );
    }

    // All env access lives in one test so parallel tests never race on the
    // same variables.
    #[test]
    fn test_from_env() {
        std::env::set_var("DOCREPO_API_NAMESPACE", "/docs/v1/");
        std::env::set_var("DOCREPO_PAGE_SIZE", "50");
        std::env::set_var("DOCREPO_NOTICE_DURATION_MS", "not-a-number");
        std::env::set_var("DOCREPO_ALLOWED_MIME_TYPES", "application/pdf,application/msword");

        let config = RepositoryConfig::from_env();
        assert_eq!(config.api_namespace, "docs/v1");
        assert_eq!(config.page_size, 50);
        assert_eq!(config.notice_duration_ms, defaults::NOTICE_DURATION_MS);
        assert_eq!(config.allowed_mime_types.len(), 2);

        std::env::remove_var("DOCREPO_API_NAMESPACE");
        std::env::remove_var("DOCREPO_PAGE_SIZE");
        std::env::remove_var("DOCREPO_NOTICE_DURATION_MS");
        std::env::remove_var("DOCREPO_ALLOWED_MIME_TYPES");

        let config = RepositoryConfig::from_env();
        assert_eq!(config, RepositoryConfig::default());
    }
}
