//! Client configuration.
//!
//! Loaded from environment variables with defaults suitable for a local
//! signing service. Command-line flags override individual fields.

use std::time::Duration;

/// Default service location when `SIGDESK_API_URL` is unset.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Settings for talking to the signing service.
#[derive(Clone)]
pub struct ClientConfig {
    /// Service base URL, without a trailing slash (default: http://localhost:8000)
    pub api_url: String,
    /// Per-request timeout (default: 60s)
    pub timeout: Duration,
    /// Retry attempts for idempotent reads (default: 3)
    pub max_retries: u32,
    /// Initial backoff interval for retried reads (default: 200ms)
    pub initial_interval: Duration,
    /// Maximum backoff interval for retried reads (default: 2s)
    pub max_interval: Duration,
    /// Bearer token sent with every request
    pub access_token: Option<String>,
    /// Refresh token used to rotate the access token on 401
    pub refresh_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 3,
            initial_interval: Duration::from_millis(200),
            max_interval: Duration::from_secs(2),
            access_token: None,
            refresh_token: None,
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |token: &Option<String>| token.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("initial_interval", &self.initial_interval)
            .field("max_interval", &self.max_interval)
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads `SIGDESK_API_URL`, `SIGDESK_TIMEOUT_SECS`, `SIGDESK_MAX_RETRIES`,
    /// `SIGDESK_ACCESS_TOKEN` and `SIGDESK_REFRESH_TOKEN`. Unparseable numbers
    /// fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_url = non_empty("SIGDESK_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_url);

        let timeout = non_empty("SIGDESK_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        let max_retries = non_empty("SIGDESK_MAX_RETRIES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_retries);

        Self {
            api_url,
            timeout,
            max_retries,
            access_token: non_empty("SIGDESK_ACCESS_TOKEN"),
            refresh_token: non_empty("SIGDESK_REFRESH_TOKEN"),
            ..defaults
        }
    }

    /// Absolute URL for an API path such as `/api/v1/pdf/sign`.
    pub fn endpoint(&self, path: &str) -> String {
        let base = self.api_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ClientConfig::from_lookup(lookup(&[]));
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.max_retries, 3);
        assert!(config.access_token.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("SIGDESK_API_URL", "https://sign.example.com/"),
            ("SIGDESK_TIMEOUT_SECS", "5"),
            ("SIGDESK_MAX_RETRIES", "not-a-number"),
            ("SIGDESK_ACCESS_TOKEN", "tok"),
            ("SIGDESK_REFRESH_TOKEN", "  "),
        ]));
        assert_eq!(config.api_url, "https://sign.example.com");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.access_token.as_deref(), Some("tok"));
        assert!(config.refresh_token.is_none());
        assert_eq!(
            config.endpoint("/api/v1/pdf/sign"),
            "https://sign.example.com/api/v1/pdf/sign"
        );
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let config = ClientConfig {
            access_token: Some("very-secret".into()),
            ..ClientConfig::default()
        };
        assert!(!format!("{config:?}").contains("very-secret"));
    }
}
