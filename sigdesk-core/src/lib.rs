//! Sigdesk Core - signature placement and sequential signing for PDF documents
//!
//! This crate holds the client side of a remote PDF signing service: a
//! workspace of queued documents, the signature overlays placed on them, the
//! geometry that turns on-screen rectangles into PDF point coordinates, and
//! an orchestrator that signs every document by chaining one service call per
//! overlay.
//!
//! # Features
//!
//! - Normalized overlay placement, clamped to the page and to a minimum size
//! - Page metrics measured from the PDF itself (MediaBox/CropBox, rotation)
//! - Cancellable preview rendering behind the [`PageRasterizer`] trait
//! - Per-document failure isolation when signing a queue
//! - HTTP backend with token refresh, plus an in-memory mock backend
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sigdesk_core::{
//!     MockSigningBackend, PdfUpload, SignOptions, SigningOrchestrator, Workspace,
//! };
//!
//! # async fn example(pdf: Vec<u8>) -> sigdesk_core::Result<()> {
//! let mut workspace = Workspace::default();
//! let added = workspace.add_files([PdfUpload::new("contract.pdf", pdf)]).added;
//! let document = &added[0];
//!
//! workspace.load_preview(document).await?;
//! workspace.add_overlay(document)?;
//!
//! let orchestrator = SigningOrchestrator::new(Arc::new(MockSigningBackend::new()));
//! let report = orchestrator
//!     .sign_queue(
//!         &mut workspace,
//!         &SignOptions {
//!             certificate_id: "cert-123".into(),
//!             use_tsa: true,
//!             embed_ltv: true,
//!         },
//!     )
//!     .await?;
//! assert_eq!(report.signed(), 1);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod geometry;
pub mod ids;
pub mod orchestrator;
pub mod render;
pub mod validation;
pub mod workspace;

// Re-export main types for convenience
pub use client::{
    BatchFile, BatchSignReport, BatchSignRequest, MockSigningBackend, SealSummary, SignParameters,
    SignRequest, SignedPdf, SignedPdfMetadata, SigningBackend, StaticTokenProvider, TokenProvider,
    VerificationReport,
};
pub use config::ClientConfig;
pub use error::{Result, SigdeskError};
pub use geometry::{
    placement_to_points, GestureMode, NormalizedPlacement, PageDimension, PointPlacement,
};
pub use ids::{DocumentId, OverlayId};
pub use orchestrator::{
    DocumentOutcome, DocumentReport, DownloadSink, QueueReport, SignOptions, SigningObserver,
    SigningOrchestrator,
};
pub use render::{OutlineRasterizer, PageRasterizer, PageRenderer, PreviewState};
pub use workspace::{
    DocumentStatus, PdfUpload, SignatureMetadata, SignatureOverlay, SigningDocument, Visibility,
    Workspace,
};

#[cfg(feature = "network")]
pub use client::{HttpSigningBackend, RefreshingTokenProvider};
