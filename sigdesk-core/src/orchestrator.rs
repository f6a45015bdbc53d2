//! Signing queue orchestration.
//!
//! Documents are signed one at a time in queue order. Within a document the
//! overlays are applied in stored order as a pipeline: each signing call
//! receives the binary and filename returned by the previous one. A failure
//! ends that document's chain only; the queue always runs to the end.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::client::{SignParameters, SignRequest, SignedPdfMetadata, SigningBackend};
use crate::error::{Result, SigdeskError, GENERIC_SIGN_FAILURE};
use crate::geometry::{placement_to_points, PageDimension};
use crate::ids::DocumentId;
use crate::render::{measure_pages, PreviewState};
use crate::workspace::{DocumentStatus, SigningDocument, Visibility, Workspace};

pub const MISSING_CERTIFICATE: &str = "Provide a certificate ID before submitting signing requests.";
pub const EMPTY_QUEUE: &str = "Add at least one PDF document to the queue before signing.";
pub const NO_OVERLAYS: &str = "Add at least one signature overlay before signing this document.";
pub const MISSING_PLACEMENT: &str = "Visible signatures require placement coordinates.";

/// Settings applied to every signature in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignOptions {
    pub certificate_id: String,
    pub use_tsa: bool,
    pub embed_ltv: bool,
}

/// Receives advisory progress while a queue is being signed.
pub trait SigningObserver: Send + Sync {
    /// e.g. `"Signing contract.pdf (2/3)…"`.
    fn on_progress(&self, _message: &str) {}

    /// A document changed status.
    fn on_status(&self, _document: &SigningDocument) {}

    fn on_finished(&self, _report: &QueueReport) {}
}

/// Hands a fully signed document to the user.
pub trait DownloadSink: Send + Sync {
    fn deliver(&self, filename: &str, bytes: &[u8]) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    Signed { filename: String },
    Failed { message: String },
    /// Already signed before this run.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReport {
    pub document_id: DocumentId,
    pub name: String,
    pub outcome: DocumentOutcome,
}

/// What happened to every document in one `sign_queue` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueReport {
    pub documents: Vec<DocumentReport>,
    /// Signed documents whose download could not be delivered.
    pub download_errors: Vec<String>,
}

impl QueueReport {
    pub fn signed(&self) -> usize {
        self.count(|outcome| matches!(outcome, DocumentOutcome::Signed { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, DocumentOutcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, DocumentOutcome::Skipped))
    }

    fn count(&self, predicate: impl Fn(&DocumentOutcome) -> bool) -> usize {
        self.documents
            .iter()
            .filter(|doc| predicate(&doc.outcome))
            .count()
    }
}

/// Output of a successful overlay chain.
struct ChainResult {
    bytes: Vec<u8>,
    filename: String,
    metadata: SignedPdfMetadata,
    pages: Vec<PageDimension>,
}

pub struct SigningOrchestrator {
    backend: Arc<dyn SigningBackend>,
    observer: Option<Arc<dyn SigningObserver>>,
    downloads: Option<Arc<dyn DownloadSink>>,
}

impl SigningOrchestrator {
    pub fn new(backend: Arc<dyn SigningBackend>) -> Self {
        Self {
            backend,
            observer: None,
            downloads: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SigningObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_download_sink(mut self, sink: Arc<dyn DownloadSink>) -> Self {
        self.downloads = Some(sink);
        self
    }

    /// Sign every queued document.
    ///
    /// Fails up front, without any network call, when the certificate id is
    /// blank or the queue is empty. Per-document failures are recorded on
    /// the document and in the report and never stop the run.
    #[instrument(skip_all, fields(documents = workspace.documents().len()))]
    pub async fn sign_queue(&self, workspace: &mut Workspace, options: &SignOptions) -> Result<QueueReport> {
        let certificate_id = options.certificate_id.trim();
        if certificate_id.is_empty() {
            return Err(SigdeskError::validation(MISSING_CERTIFICATE));
        }
        if workspace.is_empty() {
            return Err(SigdeskError::validation(EMPTY_QUEUE));
        }

        let queue: Vec<DocumentId> = workspace.documents().iter().map(|doc| doc.id.clone()).collect();
        let mut report = QueueReport::default();

        for document_id in queue {
            let Some(document) = workspace.document(&document_id).cloned() else {
                continue;
            };

            if document.status == DocumentStatus::Signed {
                info!(document = %document_id, "Already signed, skipping");
                report.push(&document, DocumentOutcome::Skipped);
                continue;
            }

            if document.overlays.is_empty() {
                self.fail(workspace, &document, NO_OVERLAYS.to_string(), &mut report);
                continue;
            }

            if let PreviewState::Failed(message) = workspace.preview_state(&document_id) {
                self.fail(workspace, &document, message, &mut report);
                continue;
            }

            self.transition(workspace, &document_id, |doc| {
                doc.status = DocumentStatus::Signing;
                doc.error = None;
            });

            match self.sign_chain(&document, certificate_id, options).await {
                Ok(chain) => {
                    if let Some(sink) = &self.downloads {
                        if let Err(err) = sink.deliver(&chain.filename, &chain.bytes) {
                            warn!(document = %document_id, error = %err, "Failed to deliver signed document");
                            report.download_errors.push(
                                err.user_message("Failed to trigger signed document download."),
                            );
                        }
                    }

                    info!(document = %document_id, signed_filename = %chain.filename, "Document signed");
                    report.push(
                        &document,
                        DocumentOutcome::Signed {
                            filename: chain.filename.clone(),
                        },
                    );
                    self.transition(workspace, &document_id, |doc| {
                        doc.status = DocumentStatus::Signed;
                        doc.signed_payload = Some(chain.bytes);
                        doc.signed_filename = Some(chain.filename);
                        doc.last_signature = Some(chain.metadata);
                        doc.page_dimensions = chain.pages;
                    });
                }
                Err(err) => {
                    let message = err.user_message(GENERIC_SIGN_FAILURE);
                    warn!(document = %document_id, error = %err, "Document signing failed");
                    self.fail(workspace, &document, message, &mut report);
                }
            }
        }

        info!(
            signed = report.signed(),
            failed = report.failed(),
            skipped = report.skipped(),
            "Signing queue finished"
        );
        if let Some(observer) = &self.observer {
            observer.on_finished(&report);
        }
        Ok(report)
    }

    /// Apply every overlay of `document` in order, feeding each output forward.
    async fn sign_chain(
        &self,
        document: &SigningDocument,
        certificate_id: &str,
        options: &SignOptions,
    ) -> Result<ChainResult> {
        let total = document.overlays.len();
        let mut chain = ChainResult {
            bytes: document.payload.clone(),
            filename: document.name.clone(),
            metadata: SignedPdfMetadata::default(),
            pages: document.page_dimensions.clone(),
        };

        for (index, overlay) in document.overlays.iter().enumerate() {
            let progress = format!("Signing {} ({}/{})…", document.name, index + 1, total);
            info!(document = %document.id, overlay = %overlay.id, "{progress}");
            if let Some(observer) = &self.observer {
                observer.on_progress(&progress);
            }

            let coordinates = match (overlay.visibility, overlay.placement) {
                (Visibility::Visible, None) => {
                    return Err(SigdeskError::validation(MISSING_PLACEMENT));
                }
                (Visibility::Visible, Some(placement)) => {
                    Some(placement_to_points(&placement, &chain.pages)?)
                }
                (Visibility::Invisible, _) => None,
            };

            let signed = self
                .backend
                .sign(SignRequest {
                    pdf: std::mem::take(&mut chain.bytes),
                    filename: chain.filename.clone(),
                    params: SignParameters {
                        certificate_id: certificate_id.to_string(),
                        seal_id: overlay.seal_id.clone(),
                        visibility: overlay.visibility,
                        coordinates,
                        metadata: overlay.metadata.clone(),
                        use_tsa: options.use_tsa,
                        embed_ltv: options.embed_ltv,
                    },
                })
                .await?;

            // The service may change page geometry; later overlays are
            // converted against the binary they will actually be applied to.
            match measure_pages(&signed.bytes) {
                Ok(pages) => chain.pages = pages,
                Err(err) => {
                    warn!(document = %document.id, error = %err, "Could not re-measure signed PDF, keeping previous page metrics");
                }
            }

            chain.bytes = signed.bytes;
            chain.filename = signed.filename;
            chain.metadata = signed.metadata;
        }

        Ok(chain)
    }

    fn fail(
        &self,
        workspace: &mut Workspace,
        document: &SigningDocument,
        message: String,
        report: &mut QueueReport,
    ) {
        report.push(
            document,
            DocumentOutcome::Failed {
                message: message.clone(),
            },
        );
        self.transition(workspace, &document.id, |doc| {
            doc.status = DocumentStatus::Error;
            doc.error = Some(message);
            doc.signed_payload = None;
        });
    }

    fn transition(
        &self,
        workspace: &mut Workspace,
        document_id: &DocumentId,
        update: impl FnOnce(&mut SigningDocument),
    ) {
        let Some(doc) = workspace.document_mut(document_id) else {
            return;
        };
        update(doc);
        if let Some(observer) = &self.observer {
            observer.on_status(doc);
        }
    }
}

impl QueueReport {
    fn push(&mut self, document: &SigningDocument, outcome: DocumentOutcome) {
        self.documents.push(DocumentReport {
            document_id: document.id.clone(),
            name: document.name.clone(),
            outcome,
        });
    }
}
