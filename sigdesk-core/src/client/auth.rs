//! Access-token capability injected into the HTTP backend.

use async_trait::async_trait;

/// Supplies bearer tokens to outgoing requests.
///
/// Passed to [`HttpSigningBackend::new`](super::HttpSigningBackend::new);
/// there is no process-wide token state.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current access token, if signed in.
    fn access_token(&self) -> Option<String>;

    /// Obtain a new access token after a 401. `None` means the session is gone.
    async fn refresh(&self) -> Option<String> {
        None
    }

    /// Called when a 401 could not be recovered by refreshing.
    fn on_unauthorized(&self) {}
}

/// Fixed token (or none), e.g. from `SIGDESK_ACCESS_TOKEN`.
#[derive(Clone, Default)]
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    fn access_token(&self) -> Option<String> {
        self.token.clone()
    }
}

#[cfg(feature = "network")]
pub use refreshing::RefreshingTokenProvider;

#[cfg(feature = "network")]
mod refreshing {
    use std::sync::{Mutex, MutexGuard, PoisonError};

    use async_trait::async_trait;
    use reqwest::Client;
    use serde::{Deserialize, Serialize};
    use tracing::{debug, instrument, warn};

    use super::TokenProvider;

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[derive(Default)]
    struct TokenPair {
        access: Option<String>,
        refresh: Option<String>,
    }

    #[derive(Serialize)]
    struct RefreshRequest<'a> {
        refresh_token: &'a str,
    }

    #[derive(Deserialize)]
    struct TokenResponse {
        access_token: String,
        #[serde(default)]
        refresh_token: Option<String>,
    }

    /// Token pair that rotates itself through `POST {base}/api/v1/auth/refresh`.
    pub struct RefreshingTokenProvider {
        client: Client,
        refresh_url: String,
        tokens: Mutex<TokenPair>,
    }

    impl RefreshingTokenProvider {
        pub fn new(
            client: Client,
            api_base_url: &str,
            access_token: Option<String>,
            refresh_token: String,
        ) -> Self {
            Self {
                client,
                refresh_url: format!("{}/api/v1/auth/refresh", api_base_url.trim_end_matches('/')),
                tokens: Mutex::new(TokenPair {
                    access: access_token,
                    refresh: Some(refresh_token),
                }),
            }
        }

        fn clear(&self) {
            *lock(&self.tokens) = TokenPair::default();
        }
    }

    impl std::fmt::Debug for RefreshingTokenProvider {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("RefreshingTokenProvider")
                .field("refresh_url", &self.refresh_url)
                .field("tokens", &"[REDACTED]")
                .finish()
        }
    }

    #[async_trait]
    impl TokenProvider for RefreshingTokenProvider {
        fn access_token(&self) -> Option<String> {
            lock(&self.tokens).access.clone()
        }

        #[instrument(level = "debug", skip(self), fields(url = %self.refresh_url))]
        async fn refresh(&self) -> Option<String> {
            let refresh_token = lock(&self.tokens).refresh.clone()?;

            let response = match self
                .client
                .post(&self.refresh_url)
                .json(&RefreshRequest {
                    refresh_token: &refresh_token,
                })
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, "Token refresh request failed");
                    return None;
                }
            };

            if !response.status().is_success() {
                warn!(status = %response.status(), "Token refresh rejected");
                self.clear();
                return None;
            }

            let body: TokenResponse = match response.json().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(error = %e, "Malformed token refresh response");
                    return None;
                }
            };

            let mut tokens = lock(&self.tokens);
            tokens.access = Some(body.access_token.clone());
            if let Some(rotated) = body.refresh_token {
                tokens.refresh = Some(rotated);
            }
            debug!("Access token refreshed");
            Some(body.access_token)
        }

        fn on_unauthorized(&self) {
            warn!("Session expired, clearing stored tokens");
            self.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_provider_ignores_blank_token() {
        assert_eq!(StaticTokenProvider::new(Some("  ".into())).access_token(), None);
        assert_eq!(
            StaticTokenProvider::new(Some("abc".into())).access_token(),
            Some("abc".to_string())
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let provider = StaticTokenProvider::new(Some("secret-token".into()));
        let debug = format!("{provider:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("REDACTED"));
    }

    #[tokio::test]
    async fn test_static_provider_cannot_refresh() {
        assert_eq!(StaticTokenProvider::anonymous().refresh().await, None);
    }
}
