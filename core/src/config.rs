//! Client configuration.
//!
//! # Design
//! The service is reached under one base URL. Everything else the transport
//! needs (versioned prefix, CSRF cookie and header names) is fixed by the
//! service contract, so only the base URL is read from the environment.

use thiserror::Error;
use url::Url;

/// Environment variable holding the service base URL.
pub const API_URL_ENV: &str = "TRUSTADMIN_API_URL";

/// Base URL used when the environment does not provide one.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Errors raised while building a `ClientConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid API url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Connection settings shared by every request of an `AdminClient`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    api_url: Url,
    api_prefix: String,
    csrf_cookie: String,
    csrf_header: String,
}

impl ClientConfig {
    pub fn new(api_url: &str) -> Result<Self, ConfigError> {
        let parsed = Url::parse(api_url).map_err(|e| ConfigError::InvalidUrl {
            url: api_url.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() || !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: api_url.to_string(),
                reason: "expected an http or https base url".to_string(),
            });
        }
        Ok(Self {
            api_url: parsed,
            api_prefix: "api/v1".to_string(),
            csrf_cookie: "csrftoken".to_string(),
            csrf_header: "X-CSRFToken".to_string(),
        })
    }

    /// Reads the base URL from `TRUSTADMIN_API_URL`, falling back to
    /// `http://localhost:8000`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var(API_URL_ENV).unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Self::new(&url)
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    /// Versioned path prefix without surrounding slashes.
    pub fn api_prefix(&self) -> &str {
        &self.api_prefix
    }

    pub fn csrf_cookie(&self) -> &str {
        &self.csrf_cookie
    }

    pub fn csrf_header(&self) -> &str {
        &self.csrf_header
    }
}
