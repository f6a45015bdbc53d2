use std::fmt;

use serde::{Deserialize, Serialize};

use crate::client::SignedPdfMetadata;
use crate::geometry::{NormalizedPlacement, PageDimension};
use crate::ids::{DocumentId, OverlayId};

/// Whether a signature carries a visible stamp on a page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Visible,
    Invisible,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Visible => "visible",
            Self::Invisible => "invisible",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "visible" => Some(Self::Visible),
            "invisible" => Some(Self::Invisible),
            _ => None,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Draft -> Signing -> {Signed | Error}` within one signing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Draft,
    Signing,
    Signed,
    Error,
}

impl DocumentStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Signing => "Signing…",
            Self::Signed => "Signed",
            Self::Error => "Error",
        }
    }
}

/// Optional descriptive fields embedded in a signature.
///
/// Blank values are stored as `None` so they are never sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    Reason,
    Location,
    ContactInfo,
}

impl SignatureMetadata {
    pub fn set(&mut self, field: MetadataField, value: &str) {
        let slot = match field {
            MetadataField::Reason => &mut self.reason,
            MetadataField::Location => &mut self.location,
            MetadataField::ContactInfo => &mut self.contact_info,
        };
        *slot = non_blank(value);
    }

    /// Re-apply blank normalization, e.g. after deserializing user input.
    pub fn normalized(self) -> Self {
        Self {
            reason: self.reason.as_deref().and_then(non_blank),
            location: self.location.as_deref().and_then(non_blank),
            contact_info: self.contact_info.as_deref().and_then(non_blank),
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// One signature to apply to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureOverlay {
    pub id: OverlayId,
    pub label: String,
    pub visibility: Visibility,
    pub seal_id: Option<String>,
    pub metadata: SignatureMetadata,
    /// Required when `visibility` is `Visible`.
    pub placement: Option<NormalizedPlacement>,
}

impl SignatureOverlay {
    /// A visible overlay labelled by its 1-based position, placed at the
    /// default rectangle on `page`.
    pub fn new(ordinal: usize, page: u32) -> Self {
        Self {
            id: OverlayId::generate(),
            label: format!("Signature {ordinal}"),
            visibility: Visibility::Visible,
            seal_id: None,
            metadata: SignatureMetadata::default(),
            placement: Some(NormalizedPlacement::default_for_page(page)),
        }
    }
}

/// A PDF in the signing queue.
#[derive(Debug, Clone)]
pub struct SigningDocument {
    pub id: DocumentId,
    pub name: String,
    /// The file as it was added to the queue.
    pub payload: Vec<u8>,
    pub overlays: Vec<SignatureOverlay>,
    pub status: DocumentStatus,
    pub error: Option<String>,
    /// Metrics for the current binary; empty until the preview has loaded.
    pub page_dimensions: Vec<PageDimension>,
    pub signed_payload: Option<Vec<u8>>,
    pub signed_filename: Option<String>,
    /// Response metadata of the last signature applied.
    pub last_signature: Option<SignedPdfMetadata>,
}

impl SigningDocument {
    pub fn new(name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: DocumentId::generate(),
            name: name.into(),
            payload,
            overlays: Vec::new(),
            status: DocumentStatus::Draft,
            error: None,
            page_dimensions: Vec::new(),
            signed_payload: None,
            signed_filename: None,
            last_signature: None,
        }
    }

    pub fn overlay(&self, overlay_id: &OverlayId) -> Option<&SignatureOverlay> {
        self.overlays.iter().find(|overlay| &overlay.id == overlay_id)
    }

    pub fn overlay_mut(&mut self, overlay_id: &OverlayId) -> Option<&mut SignatureOverlay> {
        self.overlays
            .iter_mut()
            .find(|overlay| &overlay.id == overlay_id)
    }

    /// Page new overlays are placed on: the first measured page, else page 1.
    pub fn default_page(&self) -> u32 {
        self.page_dimensions
            .first()
            .map(|page| page.page_number)
            .unwrap_or(1)
    }

    /// Binary the next signature should be applied to.
    pub fn current_payload(&self) -> &[u8] {
        self.signed_payload.as_deref().unwrap_or(&self.payload)
    }

    pub fn is_signing(&self) -> bool {
        self.status == DocumentStatus::Signing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_metadata_is_absent() {
        let mut metadata = SignatureMetadata::default();
        metadata.set(MetadataField::Reason, "   ");
        metadata.set(MetadataField::Location, " Paris ");
        assert_eq!(metadata.reason, None);
        assert_eq!(metadata.location.as_deref(), Some(" Paris "));

        let normalized = SignatureMetadata {
            contact_info: Some("\t".into()),
            ..metadata
        }
        .normalized();
        assert_eq!(normalized.contact_info, None);
    }

    #[test]
    fn test_new_overlay_defaults() {
        let overlay = SignatureOverlay::new(3, 2);
        assert_eq!(overlay.label, "Signature 3");
        assert_eq!(overlay.visibility, Visibility::Visible);
        assert_eq!(
            overlay.placement,
            Some(NormalizedPlacement::default_for_page(2))
        );
    }

    #[test]
    fn test_visibility_wire_format() {
        assert_eq!(serde_json::to_string(&Visibility::Invisible).unwrap(), "\"invisible\"");
        assert_eq!(Visibility::parse("visible"), Some(Visibility::Visible));
        assert_eq!(Visibility::parse("Visible"), None);
    }
}
