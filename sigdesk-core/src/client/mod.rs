//! Signing service collaborator surface.
//!
//! [`SigningBackend`] is the seam between the orchestrator and the remote
//! signing/verification service. [`HttpSigningBackend`] talks to the real
//! service; [`MockSigningBackend`] records calls for tests and dry runs.

mod auth;
mod filename;
mod mock;
mod wire;

#[cfg(feature = "network")]
mod http;

pub use auth::{StaticTokenProvider, TokenProvider};
#[cfg(feature = "network")]
pub use auth::RefreshingTokenProvider;
pub use filename::{filename_from_disposition, sanitize_filename, signed_filename_for};
#[cfg(feature = "network")]
pub use http::HttpSigningBackend;
pub use mock::{MockSigningBackend, RecordedCall};
pub use wire::{
    extract_error_message, parse_timestamp, BatchSignItem, BatchSignReport, SealSummary,
    SignatureCheck, VerificationReport,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geometry::PointPlacement;
use crate::workspace::{SignatureMetadata, Visibility};

/// Options shared by single and batch signing.
#[derive(Debug, Clone, PartialEq)]
pub struct SignParameters {
    pub certificate_id: String,
    pub seal_id: Option<String>,
    pub visibility: Visibility,
    /// Point-space rectangle; only sent for visible signatures.
    pub coordinates: Option<PointPlacement>,
    pub metadata: SignatureMetadata,
    /// Include an RFC 3161 timestamp.
    pub use_tsa: bool,
    /// Embed long-term-validation material.
    pub embed_ltv: bool,
}

impl SignParameters {
    /// Text fields of the multipart form, in submission order.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("certificate_id", self.certificate_id.clone())];

        if let Some(seal_id) = self.seal_id.as_deref().filter(|id| !id.is_empty()) {
            fields.push(("seal_id", seal_id.to_string()));
        }

        fields.push(("visibility", self.visibility.as_str().to_string()));

        if let (Visibility::Visible, Some(coords)) = (self.visibility, self.coordinates) {
            fields.push(("page", coords.page.to_string()));
            fields.push(("x", coords.x.to_string()));
            fields.push(("y", coords.y.to_string()));
            fields.push(("width", coords.width.to_string()));
            fields.push(("height", coords.height.to_string()));
        }

        let metadata = [
            ("reason", &self.metadata.reason),
            ("location", &self.metadata.location),
            ("contact_info", &self.metadata.contact_info),
        ];
        for (name, value) in metadata {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                fields.push((name, value.to_string()));
            }
        }

        if self.use_tsa {
            fields.push(("use_tsa", "true".to_string()));
        }
        if self.embed_ltv {
            fields.push(("embed_ltv", "true".to_string()));
        }
        fields
    }
}

/// One signature application on one PDF.
#[derive(Debug, Clone, PartialEq)]
pub struct SignRequest {
    pub pdf: Vec<u8>,
    /// Name of the input file; sanitized before upload.
    pub filename: String,
    pub params: SignParameters,
}

/// Metadata the service returns alongside a signed PDF, via response headers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignedPdfMetadata {
    pub document_id: Option<String>,
    pub signed_at: Option<DateTime<Utc>>,
    pub certificate_id: Option<String>,
    pub seal_id: Option<String>,
    pub visibility: Option<Visibility>,
    pub tsa_used: Option<bool>,
    pub ltv_embedded: Option<bool>,
}

impl SignedPdfMetadata {
    /// Read the `x-*` response headers through a case-insensitive lookup.
    pub fn from_headers<'a>(header: impl Fn(&str) -> Option<&'a str>) -> Self {
        let text = |name: &str| header(name).filter(|v| !v.is_empty()).map(str::to_string);
        Self {
            document_id: text("x-document-id"),
            signed_at: header("x-signed-at").and_then(parse_timestamp),
            certificate_id: text("x-certificate-id"),
            seal_id: text("x-seal-id"),
            visibility: header("x-visibility").and_then(Visibility::parse),
            tsa_used: header("x-tsa-used").and_then(strict_bool),
            ltv_embedded: header("x-ltv-embedded").and_then(strict_bool),
        }
    }
}

fn strict_bool(value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// A signed PDF as returned by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedPdf {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
    pub metadata: SignedPdfMetadata,
}

/// One file in a batch upload.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFile {
    pub filename: String,
    pub pdf: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchSignRequest {
    pub files: Vec<BatchFile>,
    pub params: SignParameters,
}

/// Remote signing, verification and seal catalogue.
///
/// Implementations never retry a signing call; a single call either returns
/// the signed binary or an error carrying a user-facing message.
#[async_trait]
pub trait SigningBackend: Send + Sync {
    /// Apply one signature to a PDF.
    async fn sign(&self, request: SignRequest) -> Result<SignedPdf>;

    /// Apply the same signature settings to several PDFs in one call.
    async fn batch_sign(&self, request: BatchSignRequest) -> Result<BatchSignReport>;

    /// Validate every signature in a PDF.
    async fn verify(&self, pdf: Vec<u8>, filename: &str) -> Result<VerificationReport>;

    /// Seal images available for visible signatures.
    async fn list_seals(&self) -> Result<Vec<SealSummary>>;
}
