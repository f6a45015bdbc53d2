//! Upload and download filename handling.

const DEFAULT_FILENAME: &str = "document.pdf";

/// Reduce a user-supplied name to a safe upload filename.
///
/// Keeps the last path segment and replaces every run of characters outside
/// `[A-Za-z0-9_. -]` with a single `_`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.trim().rsplit(['/', '\\']).next().unwrap_or_default();

    let mut cleaned = String::with_capacity(base.len());
    let mut in_run = false;
    for ch in base.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-' | ' ') {
            cleaned.push(ch);
            in_run = false;
        } else if !in_run {
            cleaned.push('_');
            in_run = true;
        }
    }

    if cleaned.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        cleaned
    }
}

/// Name used for a signed file when the service does not suggest one.
pub fn signed_filename_for(name: &str) -> String {
    let sanitized = sanitize_filename(name);
    let stem = strip_pdf_extension(&sanitized).trim();
    let stem = if stem.is_empty() { "document" } else { stem };
    format!("{stem}-signed.pdf")
}

fn strip_pdf_extension(name: &str) -> &str {
    let split = name.len().saturating_sub(4);
    match (name.get(..split), name.get(split..)) {
        (Some(stem), Some(ext)) if ext.eq_ignore_ascii_case(".pdf") => stem,
        _ => name,
    }
}

/// Extract the filename from a `Content-Disposition` header value.
///
/// An RFC 5987 `filename*=UTF-8''…` parameter wins over a plain
/// `filename="…"` parameter.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    if let Some(encoded) = parameter_value(header, "filename*=utf-8''") {
        let encoded = encoded.split(';').next().unwrap_or_default().trim();
        if !encoded.is_empty() {
            if let Ok(decoded) = urlencoding::decode(encoded) {
                return Some(decoded.into_owned());
            }
        }
    }

    let raw = parameter_value(header, "filename=")?;
    let raw = raw.strip_prefix('"').unwrap_or(raw);
    let value: String = raw.chars().take_while(|c| *c != '"' && *c != ';').collect();
    (!value.is_empty()).then_some(value)
}

/// Text following the first case-insensitive occurrence of `prefix`.
fn parameter_value<'a>(header: &'a str, prefix: &str) -> Option<&'a str> {
    let lower = header.to_ascii_lowercase();
    let start = lower.find(prefix)? + prefix.len();
    header.get(start..)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_keeps_last_segment() {
        assert_eq!(sanitize_filename("  C:\\Users\\me\\Contract (v2).pdf "), "Contract _v2_.pdf");
        assert_eq!(sanitize_filename("/tmp/a/b/report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("été$$plan.pdf"), "_t_plan.pdf");
        assert_eq!(sanitize_filename(""), "document.pdf");
        assert_eq!(sanitize_filename("folder/"), "document.pdf");
    }

    #[test]
    fn test_signed_filename() {
        assert_eq!(signed_filename_for("contract.PDF"), "contract-signed.pdf");
        assert_eq!(signed_filename_for("notes"), "notes-signed.pdf");
        assert_eq!(signed_filename_for(".pdf"), "document-signed.pdf");
    }

    #[test]
    fn test_disposition_prefers_utf8_parameter() {
        let header = "attachment; filename=\"fallback.pdf\"; filename*=UTF-8''contrat%20sign%C3%A9.pdf";
        assert_eq!(
            filename_from_disposition(header).as_deref(),
            Some("contrat signé.pdf")
        );
    }

    #[test]
    fn test_disposition_plain_and_bare_forms() {
        assert_eq!(
            filename_from_disposition("attachment; filename=\"contract-signed.pdf\"").as_deref(),
            Some("contract-signed.pdf")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=contract-signed.pdf; size=10").as_deref(),
            Some("contract-signed.pdf")
        );
        assert_eq!(filename_from_disposition("inline"), None);
    }
}
