//! Local checks run on files before they are queued or uploaded.
//!
//! The checks mirror what the signing service accepts so obviously bad input
//! is rejected without a round trip.

/// Largest PDF accepted into the queue.
pub const MAX_PDF_BYTES: usize = 50 * 1024 * 1024;

/// Largest seal image accepted for upload.
pub const MAX_SEAL_BYTES: usize = 5 * 1024 * 1024;

/// Shown when a selection contains no usable PDF at all.
pub const NO_PDF_SELECTED: &str = "Select PDF files to add them to the workspace queue.";

const PDF_MAGIC: &[u8] = b"%PDF";

/// Validate a candidate PDF by size, content header and extension.
///
/// Returns the user-facing rejection message, if any.
pub fn validate_pdf(name: &str, bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() > MAX_PDF_BYTES {
        return Some("PDF file size exceeds 50MB limit");
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Some("File must be a PDF");
    }
    if !name.to_lowercase().ends_with(".pdf") {
        return Some("File must be a PDF (*.pdf)");
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealImageKind {
    Png,
    Svg,
}

impl SealImageKind {
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Svg => "image/svg+xml",
        }
    }
}

/// Validate a seal image, returning its detected kind.
pub fn validate_seal_image(name: &str, bytes: &[u8]) -> Result<SealImageKind, &'static str> {
    if bytes.len() > MAX_SEAL_BYTES {
        return Err("Seal image size exceeds 5MB limit");
    }

    let kind = if image::guess_format(bytes).ok() == Some(image::ImageFormat::Png) {
        SealImageKind::Png
    } else if looks_like_svg(bytes) {
        SealImageKind::Svg
    } else {
        return Err("Seal image must be PNG or SVG");
    };

    let extension = name.rsplit('.').next().map(str::to_lowercase);
    match extension.as_deref() {
        Some("png") | Some("svg") if name.contains('.') => Ok(kind),
        _ => Err("Seal image must be PNG or SVG (*.png, *.svg)"),
    }
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    String::from_utf8_lossy(head).contains("<svg")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn test_valid_pdf_passes() {
        assert_eq!(validate_pdf("Contract.PDF", b"%PDF-1.7\n..."), None);
    }

    #[test]
    fn test_pdf_rejections_in_order() {
        let oversized = vec![0u8; MAX_PDF_BYTES + 1];
        assert_eq!(
            validate_pdf("big.pdf", &oversized),
            Some("PDF file size exceeds 50MB limit")
        );
        assert_eq!(
            validate_pdf("notes.pdf", b"hello"),
            Some("File must be a PDF")
        );
        assert_eq!(
            validate_pdf("contract.txt", b"%PDF-1.4"),
            Some("File must be a PDF (*.pdf)")
        );
    }

    #[test]
    fn test_seal_image_checks() {
        assert_eq!(validate_seal_image("seal.png", PNG_HEADER), Ok(SealImageKind::Png));
        assert_eq!(
            validate_seal_image("seal.SVG", b"<?xml version=\"1.0\"?><svg></svg>"),
            Ok(SealImageKind::Svg)
        );
        assert_eq!(
            validate_seal_image("seal.jpg", PNG_HEADER),
            Err("Seal image must be PNG or SVG (*.png, *.svg)")
        );
        assert_eq!(
            validate_seal_image("seal", PNG_HEADER),
            Err("Seal image must be PNG or SVG (*.png, *.svg)")
        );
        assert_eq!(
            validate_seal_image("seal.png", b"GIF89a"),
            Err("Seal image must be PNG or SVG")
        );
    }
}
