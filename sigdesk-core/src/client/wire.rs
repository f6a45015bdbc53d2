//! JSON shapes exchanged with the signing service.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::workspace::Visibility;

/// Parse a service timestamp: RFC 3339, or a naive ISO-8601 value taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

/// Reduce an error response body to a user-facing message.
///
/// Order: JSON `detail` string, JSON `message` string, the trimmed body
/// when it is not JSON, then `fallback`.
pub fn extract_error_message(body: &[u8], fallback: &str) -> String {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return fallback.to_string();
    }

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(json) => ["detail", "message"]
            .iter()
            .find_map(|key| {
                json.get(key)
                    .and_then(|v| v.as_str())
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
            })
            .map(str::to_string)
            .unwrap_or_else(|| fallback.to_string()),
        Err(_) => trimmed.to_string(),
    }
}

/// Per-file outcome of a batch signing call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSignItem {
    pub filename: String,
    pub success: bool,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub signed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSignReport {
    pub total: u32,
    pub successful: u32,
    pub failed: u32,
    pub results: Vec<BatchSignItem>,
    pub certificate_id: String,
    #[serde(default)]
    pub seal_id: Option<String>,
    pub visibility: Visibility,
    pub tsa_used: bool,
    pub ltv_embedded: bool,
}

/// Verification result for one signature field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureCheck {
    pub field_name: String,
    pub valid: bool,
    pub trusted: bool,
    /// Whether the document's modifications respect its DocMDP permissions.
    #[serde(default)]
    pub docmdp_ok: Option<bool>,
    #[serde(default)]
    pub modification_level: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub signing_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub signer_common_name: Option<String>,
    #[serde(default)]
    pub signer_serial_number: Option<String>,
    pub summary: String,
    #[serde(default)]
    pub timestamp_trusted: Option<bool>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub timestamp_summary: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub total_signatures: u32,
    pub valid_signatures: u32,
    pub trusted_signatures: u32,
    pub all_signatures_valid: bool,
    pub all_signatures_trusted: bool,
    pub signatures: Vec<SignatureCheck>,
}

/// A seal image stored by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SealSummary {
    #[serde(rename = "seal_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub content_type: String,
    pub size_bytes: u64,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub download_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SealListResponse {
    pub seals: Vec<SealSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const FALLBACK: &str = "Failed to sign document.";

    #[test]
    fn test_error_message_precedence() {
        assert_eq!(
            extract_error_message(br#"{"detail": " Certificate revoked ", "message": "x"}"#, FALLBACK),
            "Certificate revoked"
        );
        assert_eq!(
            extract_error_message(
                br#"{"code": "INVALID_FILE", "message": "File is not a valid PDF"}"#,
                FALLBACK
            ),
            "File is not a valid PDF"
        );
        assert_eq!(
            extract_error_message(b"  Bad Gateway \n", FALLBACK),
            "Bad Gateway"
        );
        assert_eq!(extract_error_message(br#"{"detail": []}"#, FALLBACK), FALLBACK);
        assert_eq!(extract_error_message(b"", FALLBACK), FALLBACK);
    }

    #[test]
    fn test_timestamps() {
        assert!(parse_timestamp("2024-05-01T10:00:00Z").is_some());
        assert!(parse_timestamp("2024-05-01T10:00:00.123456").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_verification_report_tolerates_bad_dates() {
        let json = r#"{
            "total_signatures": 1,
            "valid_signatures": 1,
            "trusted_signatures": 0,
            "all_signatures_valid": true,
            "all_signatures_trusted": false,
            "signatures": [{
                "field_name": "Signature1",
                "valid": true,
                "trusted": false,
                "docmdp_ok": null,
                "modification_level": "FORM_FILLING",
                "signing_time": "not a date",
                "signer_common_name": "Jane Signer",
                "signer_serial_number": "0A1B",
                "summary": "INTACT:UNTRUSTED",
                "timestamp_trusted": null,
                "timestamp_time": "2024-05-01T10:00:00+02:00",
                "timestamp_summary": null,
                "error": null
            }]
        }"#;
        let report: VerificationReport = serde_json::from_str(json).unwrap();
        let check = &report.signatures[0];
        assert_eq!(check.signing_time, None);
        assert_eq!(
            check.timestamp_time.unwrap().to_rfc3339(),
            "2024-05-01T08:00:00+00:00"
        );
        assert_eq!(check.docmdp_ok, None);
    }
}
