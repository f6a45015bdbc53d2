//! The signing queue and everything the user edits before signing.
//!
//! A [`Workspace`] owns the queued documents, the active document/overlay
//! selection, the single active gesture, and the preview registry. Removing
//! a document releases its preview renderer in the same call.

mod document;

pub use document::{
    DocumentStatus, MetadataField, SignatureMetadata, SignatureOverlay, SigningDocument,
    Visibility,
};

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Result, SigdeskError};
use crate::geometry::{
    GestureMode, GestureTracker, Interaction, NormalizedPlacement, PageDimension, PointField,
};
use crate::ids::{DocumentId, OverlayId};
use crate::render::{OutlineRasterizer, PageRasterizer, PreviewRegistry, PreviewState};
use crate::validation::{validate_pdf, NO_PDF_SELECTED};

/// Message for edits attempted while a document's signatures are being applied.
pub const LOCKED_WHILE_SIGNING: &str = "Signatures cannot be edited while the document is signing.";

/// A file picked for the queue.
#[derive(Debug, Clone)]
pub struct PdfUpload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl PdfUpload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Result of adding a selection of files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddFilesOutcome {
    pub added: Vec<DocumentId>,
    /// First rejection in the selection, if any. Valid files are still added.
    pub error: Option<String>,
}

pub struct Workspace {
    documents: Vec<SigningDocument>,
    active_document: Option<DocumentId>,
    active_overlay: Option<OverlayId>,
    gestures: GestureTracker,
    previews: PreviewRegistry,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new(Arc::new(OutlineRasterizer::default()))
    }
}

impl Workspace {
    pub fn new(rasterizer: Arc<dyn PageRasterizer>) -> Self {
        Self {
            documents: Vec::new(),
            active_document: None,
            active_overlay: None,
            gestures: GestureTracker::new(),
            previews: PreviewRegistry::new(rasterizer),
        }
    }

    pub fn documents(&self) -> &[SigningDocument] {
        &self.documents
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn document(&self, document_id: &DocumentId) -> Option<&SigningDocument> {
        self.documents.iter().find(|doc| &doc.id == document_id)
    }

    pub(crate) fn document_mut(&mut self, document_id: &DocumentId) -> Option<&mut SigningDocument> {
        self.documents.iter_mut().find(|doc| &doc.id == document_id)
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    /// Preview state of a document, `Idle` when no preview was ever loaded.
    pub fn preview_state(&self, document_id: &DocumentId) -> PreviewState {
        self.previews
            .get(document_id)
            .map(|renderer| renderer.state())
            .unwrap_or(PreviewState::Idle)
    }

    // ---------------------------------------------------------------------
    // Queue
    // ---------------------------------------------------------------------

    /// Validate and queue a selection of files.
    ///
    /// Rejected files are skipped; the first rejection message is reported.
    /// The first added document becomes active if nothing was active.
    pub fn add_files(&mut self, files: impl IntoIterator<Item = PdfUpload>) -> AddFilesOutcome {
        let mut outcome = AddFilesOutcome::default();

        for file in files {
            if let Some(message) = validate_pdf(&file.name, &file.bytes) {
                debug!(file = %file.name, reason = message, "Rejected file");
                outcome.error.get_or_insert_with(|| message.to_string());
                continue;
            }
            let document = SigningDocument::new(file.name, file.bytes);
            info!(document = %document.id, name = %document.name, "Queued document");
            outcome.added.push(document.id.clone());
            self.documents.push(document);
        }

        if outcome.added.is_empty() {
            outcome.error.get_or_insert_with(|| NO_PDF_SELECTED.to_string());
            return outcome;
        }

        if self.active_document.is_none() {
            self.active_document = outcome.added.first().cloned();
        }
        self.active_overlay = None;
        self.sync_active_overlay();
        outcome
    }

    /// Remove a document and release its preview resources.
    pub fn remove_document(&mut self, document_id: &DocumentId) -> bool {
        let Some(index) = self.documents.iter().position(|doc| &doc.id == document_id) else {
            return false;
        };
        self.documents.remove(index);
        self.previews.release(document_id);

        if self.active_document.as_ref() == Some(document_id) {
            self.gestures.end();
            self.active_document = self.documents.first().map(|doc| doc.id.clone());
            self.active_overlay = None;
        }
        self.sync_active_overlay();
        info!(document = %document_id, "Removed document");
        true
    }

    pub fn active_document(&self) -> Option<&SigningDocument> {
        self.active_document
            .as_ref()
            .and_then(|id| self.document(id))
    }

    pub fn select_document(&mut self, document_id: &DocumentId) -> bool {
        if self.document(document_id).is_none() {
            return false;
        }
        if self.active_document.as_ref() != Some(document_id) {
            self.gestures.end();
            self.active_document = Some(document_id.clone());
            self.active_overlay = None;
        }
        self.sync_active_overlay();
        true
    }

    pub fn active_overlay_id(&self) -> Option<&OverlayId> {
        self.active_overlay.as_ref()
    }

    /// Select an overlay of the active document without starting a gesture.
    pub fn activate_overlay(&mut self, overlay_id: &OverlayId) -> bool {
        let exists = self
            .active_document()
            .is_some_and(|doc| doc.overlay(overlay_id).is_some());
        if exists {
            self.active_overlay = Some(overlay_id.clone());
        }
        exists
    }

    /// Keep the active overlay pointing at an overlay of the active document,
    /// falling back to its first overlay.
    fn sync_active_overlay(&mut self) {
        let Some(doc) = self.active_document() else {
            self.active_overlay = None;
            return;
        };
        let still_valid = self
            .active_overlay
            .as_ref()
            .is_some_and(|id| doc.overlay(id).is_some());
        if !still_valid {
            self.active_overlay = doc.overlays.first().map(|overlay| overlay.id.clone());
        }
    }

    // ---------------------------------------------------------------------
    // Overlays
    // ---------------------------------------------------------------------

    /// Add a visible overlay at the default placement and make it active.
    pub fn add_overlay(&mut self, document_id: &DocumentId) -> Result<OverlayId> {
        let doc = editable(&mut self.documents, document_id)?;
        let overlay = SignatureOverlay::new(doc.overlays.len() + 1, doc.default_page());
        let overlay_id = overlay.id.clone();
        doc.overlays.push(overlay);
        debug!(document = %document_id, overlay = %overlay_id, "Added overlay");

        if self.active_document.as_ref() == Some(document_id) {
            self.active_overlay = Some(overlay_id.clone());
        }
        Ok(overlay_id)
    }

    pub fn remove_overlay(&mut self, document_id: &DocumentId, overlay_id: &OverlayId) -> Result<()> {
        let doc = editable(&mut self.documents, document_id)?;
        let before = doc.overlays.len();
        doc.overlays.retain(|overlay| &overlay.id != overlay_id);
        if doc.overlays.len() == before {
            return Err(unknown_overlay(overlay_id));
        }

        if self
            .gestures
            .active()
            .is_some_and(|gesture| &gesture.overlay_id == overlay_id)
        {
            self.gestures.end();
        }
        self.sync_active_overlay();
        Ok(())
    }

    pub fn set_overlay_label(
        &mut self,
        document_id: &DocumentId,
        overlay_id: &OverlayId,
        label: &str,
    ) -> Result<()> {
        self.edit_overlay(document_id, overlay_id, |overlay, _| {
            overlay.label = label.to_string();
        })
    }

    pub fn set_visibility(
        &mut self,
        document_id: &DocumentId,
        overlay_id: &OverlayId,
        visibility: Visibility,
    ) -> Result<()> {
        self.edit_overlay(document_id, overlay_id, |overlay, _| {
            overlay.visibility = visibility;
        })
    }

    /// Choose a seal image; an empty id clears the selection.
    pub fn set_seal(
        &mut self,
        document_id: &DocumentId,
        overlay_id: &OverlayId,
        seal_id: Option<&str>,
    ) -> Result<()> {
        let seal_id = seal_id.filter(|id| !id.is_empty()).map(str::to_string);
        self.edit_overlay(document_id, overlay_id, |overlay, _| {
            overlay.seal_id = seal_id;
        })
    }

    pub fn set_metadata_field(
        &mut self,
        document_id: &DocumentId,
        overlay_id: &OverlayId,
        field: MetadataField,
        value: &str,
    ) -> Result<()> {
        self.edit_overlay(document_id, overlay_id, |overlay, _| {
            overlay.metadata.set(field, value);
        })
    }

    /// Move an overlay to another page, creating the default placement if it
    /// had none.
    ///
    /// Once the document's pages are measured, a page outside the document is
    /// a validation error and the overlay is left untouched.
    pub fn set_page(
        &mut self,
        document_id: &DocumentId,
        overlay_id: &OverlayId,
        page_number: u32,
    ) -> Result<()> {
        let mut outcome = Ok(());
        self.edit_overlay(document_id, overlay_id, |overlay, pages| {
            if !pages.is_empty() && PageDimension::find(pages, page_number).is_none() {
                outcome = Err(SigdeskError::validation(format!(
                    "Page {page_number} does not exist in this document ({} pages).",
                    pages.len()
                )));
                return;
            }
            overlay.placement = Some(match overlay.placement {
                Some(placement) => placement.on_page(page_number),
                None => NormalizedPlacement::default_for_page(page_number),
            });
        })?;
        outcome
    }

    /// Replace a placement wholesale. The rectangle is clamped into the page.
    pub fn set_placement(
        &mut self,
        document_id: &DocumentId,
        overlay_id: &OverlayId,
        placement: NormalizedPlacement,
    ) -> Result<()> {
        self.edit_overlay(document_id, overlay_id, |overlay, _| {
            overlay.placement = Some(placement.clamped());
        })
    }

    /// Edit one point-space field of a placement.
    ///
    /// Returns `Ok(false)` when the edit was dropped: the overlay has no
    /// placement, its page is not measured yet, or the value is not finite.
    pub fn set_placement_field(
        &mut self,
        document_id: &DocumentId,
        overlay_id: &OverlayId,
        field: PointField,
        value: f64,
    ) -> Result<bool> {
        let mut applied = false;
        self.edit_overlay(document_id, overlay_id, |overlay, pages| {
            let next = overlay.placement.and_then(|placement| {
                let page = PageDimension::find(pages, placement.page)?;
                placement.with_point_field(field, value, page)
            });
            match next {
                Some(placement) => {
                    overlay.placement = Some(placement);
                    applied = true;
                }
                None => debug!(overlay = %overlay.id, ?field, value, "Dropped placement edit"),
            }
        })?;
        Ok(applied)
    }

    fn edit_overlay<F>(&mut self, document_id: &DocumentId, overlay_id: &OverlayId, edit: F) -> Result<()>
    where
        F: FnOnce(&mut SignatureOverlay, &[PageDimension]),
    {
        let doc = editable(&mut self.documents, document_id)?;
        let pages = &doc.page_dimensions;
        let overlay = doc
            .overlays
            .iter_mut()
            .find(|overlay| &overlay.id == overlay_id)
            .ok_or_else(|| unknown_overlay(overlay_id))?;
        edit(overlay, pages);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Page metrics
    // ---------------------------------------------------------------------

    /// Replace a document's page metrics with a freshly measured batch.
    pub fn apply_page_metrics(&mut self, document_id: &DocumentId, pages: Vec<PageDimension>) -> bool {
        match self.document_mut(document_id) {
            Some(doc) => {
                debug!(document = %document_id, pages = pages.len(), "Applied page metrics");
                doc.page_dimensions = pages;
                true
            }
            None => false,
        }
    }

    /// Load (or reload) a document's preview and adopt its page metrics.
    ///
    /// A parse failure leaves the previous metrics untouched and marks the
    /// preview as failed.
    pub async fn load_preview(&mut self, document_id: &DocumentId) -> Result<Vec<PageDimension>> {
        let bytes = self
            .document(document_id)
            .map(|doc| doc.current_payload().to_vec())
            .ok_or_else(|| unknown_document(document_id))?;

        let renderer = self.previews.acquire(document_id);
        let pages = renderer.load(document_id, bytes).await?;
        self.apply_page_metrics(document_id, pages.clone());
        Ok(pages)
    }

    // ---------------------------------------------------------------------
    // Gestures
    // ---------------------------------------------------------------------

    pub fn is_dragging(&self) -> bool {
        self.gestures.is_dragging()
    }

    pub fn gesture(&self) -> Option<&Interaction> {
        self.gestures.active()
    }

    /// Pointer-down on an overlay body (`Move`) or its resize handle
    /// (`Resize`). Also makes the document and overlay active.
    ///
    /// Returns `Ok(false)` when the overlay has no placement to drag.
    pub fn begin_gesture(
        &mut self,
        document_id: &DocumentId,
        overlay_id: &OverlayId,
        mode: GestureMode,
        x: f64,
        y: f64,
    ) -> Result<bool> {
        let doc = self
            .document(document_id)
            .ok_or_else(|| unknown_document(document_id))?;
        if doc.is_signing() {
            return Err(SigdeskError::validation(LOCKED_WHILE_SIGNING));
        }
        let overlay = doc
            .overlay(overlay_id)
            .ok_or_else(|| unknown_overlay(overlay_id))?;
        let placement = overlay.placement;

        self.select_document(document_id);
        self.active_overlay = Some(overlay_id.clone());

        let Some(placement) = placement else {
            debug!(overlay = %overlay_id, "Overlay has no placement to drag");
            return Ok(false);
        };
        self.gestures.begin(Interaction {
            overlay_id: overlay_id.clone(),
            page_number: placement.page,
            start_x: x,
            start_y: y,
            initial_placement: placement,
            mode,
        });
        Ok(true)
    }

    /// Pointer-move. Returns whether a placement changed.
    pub fn update_gesture(&mut self, x: f64, y: f64) -> bool {
        let Some(document_id) = self.active_document.clone() else {
            return false;
        };
        let Some(doc) = self.documents.iter_mut().find(|doc| doc.id == document_id) else {
            return false;
        };
        if doc.is_signing() {
            warn!(document = %document_id, "Ignoring drag on a document that is signing");
            return false;
        }

        let Some((overlay_id, placement)) = self.gestures.update(x, y, &doc.page_dimensions) else {
            return false;
        };
        match doc.overlay_mut(&overlay_id) {
            Some(overlay) => {
                overlay.placement = Some(placement);
                true
            }
            None => false,
        }
    }

    /// Pointer-up, wherever it happens.
    pub fn end_gesture(&mut self) -> Option<Interaction> {
        self.gestures.end()
    }
}

fn editable<'a>(
    documents: &'a mut [SigningDocument],
    document_id: &DocumentId,
) -> Result<&'a mut SigningDocument> {
    let doc = documents
        .iter_mut()
        .find(|doc| &doc.id == document_id)
        .ok_or_else(|| unknown_document(document_id))?;
    if doc.is_signing() {
        return Err(SigdeskError::validation(LOCKED_WHILE_SIGNING));
    }
    Ok(doc)
}

fn unknown_document(document_id: &DocumentId) -> SigdeskError {
    SigdeskError::validation(format!("Unknown document {document_id}"))
}

fn unknown_overlay(overlay_id: &OverlayId) -> SigdeskError {
    SigdeskError::validation(format!("Unknown signature overlay {overlay_id}"))
}
