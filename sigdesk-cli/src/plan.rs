//! Signing plans: which overlays go on which documents.
//!
//! A plan is a JSON file. Document paths are resolved relative to the plan's
//! own directory.
//!
//! ```json
//! {
//!   "certificate_id": "cert-123",
//!   "documents": [{
//!     "file": "contract.pdf",
//!     "overlays": [
//!       { "page": 1, "placement": { "left": 0.1, "top": 0.7, "width": 0.3, "height": 0.1 } },
//!       { "visibility": "invisible", "reason": "Approved" },
//!       { "page": 2, "points": { "x": 72, "y": 72, "width": 180, "height": 60 } }
//!     ]
//!   }]
//! }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use sigdesk_core::geometry::PointField;
use sigdesk_core::workspace::MetadataField;
use sigdesk_core::{DocumentId, NormalizedPlacement, OverlayId, Visibility, Workspace};
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigningPlan {
    #[serde(default)]
    pub certificate_id: Option<String>,
    #[serde(default)]
    pub use_tsa: Option<bool>,
    #[serde(default)]
    pub embed_ltv: Option<bool>,
    pub documents: Vec<PlannedDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannedDocument {
    pub file: PathBuf,
    #[serde(default)]
    pub overlays: Vec<PlannedOverlay>,
}

/// One overlay. `placement` (page fractions, top-left origin) and `points`
/// (PDF points, bottom-left origin) are alternatives; without either a
/// visible overlay keeps the default rectangle.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannedOverlay {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub seal_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub contact_info: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub placement: Option<PlannedArea>,
    #[serde(default)]
    pub points: Option<PlannedPoints>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannedArea {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannedPoints {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl SigningPlan {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan: {}", path.display()))?;
        let mut plan: SigningPlan = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid signing plan: {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for document in &mut plan.documents {
            if document.file.is_relative() {
                document.file = base.join(&document.file);
            }
        }
        debug!(documents = plan.documents.len(), "Loaded signing plan");
        Ok(plan)
    }
}

impl PlannedOverlay {
    /// Add this overlay to `document` and apply every field.
    ///
    /// Page metrics must already be loaded when `points` is used.
    pub fn apply(&self, workspace: &mut Workspace, document: &DocumentId) -> Result<OverlayId> {
        let overlay = workspace.add_overlay(document)?;

        if let Some(label) = self.label.as_deref() {
            workspace.set_overlay_label(document, &overlay, label)?;
        }
        workspace.set_visibility(document, &overlay, self.visibility)?;
        workspace.set_seal(document, &overlay, self.seal_id.as_deref())?;

        let metadata = [
            (MetadataField::Reason, &self.reason),
            (MetadataField::Location, &self.location),
            (MetadataField::ContactInfo, &self.contact_info),
        ];
        for (field, value) in metadata {
            if let Some(value) = value.as_deref() {
                workspace.set_metadata_field(document, &overlay, field, value)?;
            }
        }

        let page = self.page.unwrap_or(1);
        if page == 0 {
            bail!("Page numbers start at 1");
        }
        if self.page.is_some() {
            workspace.set_page(document, &overlay, page)?;
        }

        match (self.placement, self.points) {
            (Some(_), Some(_)) => bail!("Use either \"placement\" or \"points\" for an overlay, not both"),
            (Some(area), None) => {
                workspace.set_placement(
                    document,
                    &overlay,
                    NormalizedPlacement::new(page, area.left, area.top, area.width, area.height),
                )?;
            }
            (None, Some(points)) => {
                // Size first: position bounds depend on the final size.
                let edits = [
                    (PointField::Width, points.width),
                    (PointField::Height, points.height),
                    (PointField::X, points.x),
                    (PointField::Y, points.y),
                ];
                for (field, value) in edits {
                    if !workspace.set_placement_field(document, &overlay, field, value)? {
                        bail!("Cannot place signature on page {page}: page metrics unavailable");
                    }
                }
            }
            (None, None) => {}
        }

        Ok(overlay)
    }
}
