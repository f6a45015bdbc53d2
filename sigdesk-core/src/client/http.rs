//! reqwest implementation of [`SigningBackend`].
//!
//! Signing and verification are sent exactly once. Only the seal listing,
//! which is a plain read, is retried with exponential backoff.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::auth::{RefreshingTokenProvider, StaticTokenProvider, TokenProvider};
use super::filename::{filename_from_disposition, sanitize_filename, signed_filename_for};
use super::wire::{extract_error_message, SealListResponse};
use super::{
    BatchSignReport, BatchSignRequest, SealSummary, SignRequest, SignedPdf, SignedPdfMetadata,
    SigningBackend, VerificationReport,
};
use crate::config::ClientConfig;
use crate::error::{Result, SigdeskError, GENERIC_SIGN_FAILURE};

const SIGN_PATH: &str = "/api/v1/pdf/sign";
const BATCH_SIGN_PATH: &str = "/api/v1/pdf/sign/batch";
const VERIFY_PATH: &str = "/api/v1/pdf/verify";
const SEALS_PATH: &str = "/api/v1/pdf/seals";

const GENERIC_BATCH_FAILURE: &str = "Failed to sign documents.";
const GENERIC_VERIFY_FAILURE: &str = "Failed to verify document.";
const GENERIC_SEALS_FAILURE: &str = "Failed to load seal images.";

const PDF_MIME: &str = "application/pdf";

/// Client for the remote signing service.
pub struct HttpSigningBackend {
    client: Client,
    config: ClientConfig,
    tokens: Arc<dyn TokenProvider>,
    /// Serializes token refreshes so concurrent 401s trigger a single refresh.
    refresh_gate: Mutex<()>,
}

impl HttpSigningBackend {
    /// Create a backend with an explicit token provider.
    pub fn new(config: ClientConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let client = build_client(&config)?;
        Ok(Self {
            client,
            config,
            tokens,
            refresh_gate: Mutex::new(()),
        })
    }

    /// Create a backend whose token provider is derived from the config:
    /// rotating when a refresh token is present, static otherwise.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let client = build_client(&config)?;
        let tokens: Arc<dyn TokenProvider> = match config.refresh_token.clone() {
            Some(refresh) => Arc::new(RefreshingTokenProvider::new(
                client.clone(),
                &config.api_url,
                config.access_token.clone(),
                refresh,
            )),
            None => Arc::new(StaticTokenProvider::new(config.access_token.clone())),
        };
        Ok(Self {
            client,
            config,
            tokens,
            refresh_gate: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a request with the current bearer token, refreshing once on 401.
    ///
    /// `build` is called again for the retry because multipart bodies cannot
    /// be cloned.
    async fn send_authorized<F>(&self, build: F) -> Result<Response>
    where
        F: Fn() -> Result<RequestBuilder> + Send + Sync,
    {
        let token = self.tokens.access_token();
        let response = with_bearer(build()?, token.as_deref()).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!("Request unauthorized, refreshing access token");
        match self.refreshed_token(token.as_deref()).await {
            Some(fresh) => Ok(with_bearer(build()?, Some(&fresh)).send().await?),
            None => {
                self.tokens.on_unauthorized();
                Ok(response)
            }
        }
    }

    async fn refreshed_token(&self, rejected: Option<&str>) -> Option<String> {
        let _gate = self.refresh_gate.lock().await;
        // Another request may have refreshed while this one waited.
        if let Some(current) = self.tokens.access_token() {
            if rejected != Some(current.as_str()) {
                return Some(current);
            }
        }
        self.tokens.refresh().await
    }

    async fn fetch_seals_once(
        &self,
        url: &str,
    ) -> std::result::Result<Vec<SealSummary>, backoff::Error<SigdeskError>> {
        let start = Instant::now();

        let response = self
            .send_authorized(|| Ok(self.client.get(url)))
            .await
            .map_err(|err| {
                let latency_ms = start.elapsed().as_millis() as u64;
                match &err {
                    SigdeskError::HttpError(e) if is_transient_error(e) => {
                        warn!(error = %e, latency_ms, "Transient error, will retry");
                        backoff::Error::transient(err)
                    }
                    _ => {
                        warn!(error = %err, latency_ms, "Permanent error, aborting");
                        backoff::Error::permanent(err)
                    }
                }
            })?;

        let status = response.status();
        debug!(status = %status, "Received HTTP response");

        if !status.is_success() {
            let latency_ms = start.elapsed().as_millis() as u64;
            let transient = is_transient_status(status);
            let err = error_from(response, GENERIC_SEALS_FAILURE).await;
            return if transient {
                warn!(status = %status, latency_ms, "Transient HTTP status, will retry");
                Err(backoff::Error::transient(err))
            } else {
                Err(backoff::Error::permanent(err))
            };
        }

        let parsed: SealListResponse = response.json().await.map_err(|e| {
            warn!(error = %e, "Failed to parse seal listing");
            backoff::Error::permanent(SigdeskError::SerializationError(format!(
                "Failed to parse seal listing: {e}"
            )))
        })?;

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            seals = parsed.seals.len(),
            "Request completed successfully"
        );
        Ok(parsed.seals)
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            max_elapsed_time: Some(self.config.timeout * self.config.max_retries),
            ..Default::default()
        }
    }
}

#[async_trait]
impl SigningBackend for HttpSigningBackend {
    #[instrument(
        skip(self, request),
        fields(
            filename = %request.filename,
            bytes = request.pdf.len(),
            visibility = %request.params.visibility
        )
    )]
    async fn sign(&self, request: SignRequest) -> Result<SignedPdf> {
        let start = Instant::now();
        let url = self.config.endpoint(SIGN_PATH);
        let upload_name = sanitize_filename(&request.filename);

        let response = self
            .send_authorized(|| {
                let part = Part::bytes(request.pdf.clone())
                    .file_name(upload_name.clone())
                    .mime_str(PDF_MIME)?;
                let form = request
                    .params
                    .form_fields()
                    .into_iter()
                    .fold(Form::new().part("pdf_file", part), |form, (name, value)| {
                        form.text(name, value)
                    });
                Ok(self.client.post(&url).multipart(form))
            })
            .await?;

        if !response.status().is_success() {
            return Err(error_from(response, GENERIC_SIGN_FAILURE).await);
        }

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
        };
        let content_type = header("content-type").unwrap_or(PDF_MIME).to_string();
        let filename = header("content-disposition")
            .and_then(filename_from_disposition)
            .map(|name| sanitize_filename(&name))
            .unwrap_or_else(|| signed_filename_for(&request.filename));
        let metadata = SignedPdfMetadata::from_headers(header);

        let bytes = response.bytes().await?.to_vec();
        info!(
            latency_ms = start.elapsed().as_millis() as u64,
            signed_filename = %filename,
            size = bytes.len(),
            "Document signed"
        );

        Ok(SignedPdf {
            bytes,
            filename,
            content_type,
            metadata,
        })
    }

    #[instrument(skip(self, request), fields(files = request.files.len()))]
    async fn batch_sign(&self, request: BatchSignRequest) -> Result<BatchSignReport> {
        let url = self.config.endpoint(BATCH_SIGN_PATH);

        let response = self
            .send_authorized(|| {
                let mut form = Form::new();
                for (index, file) in request.files.iter().enumerate() {
                    let name = if file.filename.trim().is_empty() {
                        format!("document-{}.pdf", index + 1)
                    } else {
                        sanitize_filename(&file.filename)
                    };
                    let part = Part::bytes(file.pdf.clone())
                        .file_name(name)
                        .mime_str(PDF_MIME)?;
                    form = form.part("pdf_files", part);
                }
                for (name, value) in request.params.form_fields() {
                    form = form.text(name, value);
                }
                Ok(self.client.post(&url).multipart(form))
            })
            .await?;

        if !response.status().is_success() {
            return Err(error_from(response, GENERIC_BATCH_FAILURE).await);
        }

        let report: BatchSignReport = response.json().await.map_err(|e| {
            SigdeskError::SerializationError(format!("Failed to parse batch report: {e}"))
        })?;
        info!(
            total = report.total,
            successful = report.successful,
            failed = report.failed,
            "Batch signing finished"
        );
        Ok(report)
    }

    #[instrument(skip(self, pdf), fields(bytes = pdf.len()))]
    async fn verify(&self, pdf: Vec<u8>, filename: &str) -> Result<VerificationReport> {
        let url = self.config.endpoint(VERIFY_PATH);
        let upload_name = if filename.trim().is_empty() {
            "document.pdf".to_string()
        } else {
            sanitize_filename(filename)
        };

        let response = self
            .send_authorized(|| {
                let part = Part::bytes(pdf.clone())
                    .file_name(upload_name.clone())
                    .mime_str(PDF_MIME)?;
                Ok(self
                    .client
                    .post(&url)
                    .multipart(Form::new().part("pdf_file", part)))
            })
            .await?;

        if !response.status().is_success() {
            return Err(error_from(response, GENERIC_VERIFY_FAILURE).await);
        }

        let report: VerificationReport = response.json().await.map_err(|e| {
            SigdeskError::SerializationError(format!("Failed to parse verification report: {e}"))
        })?;
        debug!(
            signatures = report.total_signatures,
            valid = report.valid_signatures,
            "Verification finished"
        );
        Ok(report)
    }

    #[instrument(skip(self))]
    async fn list_seals(&self) -> Result<Vec<SealSummary>> {
        let url = self.config.endpoint(SEALS_PATH);
        retry_notify(
            self.build_backoff(),
            || self.fetch_seals_once(&url),
            |err: SigdeskError, duration: Duration| {
                warn!(
                    error = %err,
                    retry_after_ms = duration.as_millis() as u64,
                    "Retry scheduled"
                );
            },
        )
        .await
    }
}

fn build_client(config: &ClientConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.timeout)
        .user_agent(concat!("sigdesk/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| SigdeskError::Config(format!("Failed to create HTTP client: {e}")))
}

fn with_bearer(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}

/// Turn a non-success response into a backend error with a user-facing message.
async fn error_from(response: Response, fallback: &str) -> SigdeskError {
    let status = response.status();
    let body = response.bytes().await.unwrap_or_default();
    let message = extract_error_message(&body, fallback);
    warn!(status = %status, message = %message, "Signing service returned an error");
    SigdeskError::backend(Some(status.as_u16()), message)
}

/// Check if a reqwest error is transient and should be retried.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Check if an HTTP status code indicates a transient error.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_status_codes() {
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_transient_status(StatusCode::UNPROCESSABLE_ENTITY));
        assert!(!is_transient_status(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_from_config_builds_without_tokens() {
        let backend = HttpSigningBackend::from_config(ClientConfig::default()).unwrap();
        assert_eq!(backend.config().api_url, crate::config::DEFAULT_API_URL);
    }
}
