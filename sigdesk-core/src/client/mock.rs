//! In-memory signing backend for tests and dry runs.
//!
//! Does not sign anything: a "signed" PDF is the input with a marker comment
//! appended, which is enough to tell consecutive pipeline stages apart.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use super::filename::signed_filename_for;
use super::{
    BatchSignItem, BatchSignReport, BatchSignRequest, SealSummary, SignRequest, SignedPdf,
    SignedPdfMetadata, SigningBackend, VerificationReport,
};
use crate::error::{Result, SigdeskError};

/// A call received by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Sign(SignRequest),
    BatchSign(BatchSignRequest),
    Verify { pdf: Vec<u8>, filename: String },
    ListSeals,
}

enum Scripted {
    Respond(SignedPdf),
    Fail { status: Option<u16>, message: String },
}

#[derive(Default)]
pub struct MockSigningBackend {
    calls: Mutex<Vec<RecordedCall>>,
    scripted: Mutex<VecDeque<Scripted>>,
    failing_files: Mutex<HashMap<String, String>>,
    seals: Mutex<Vec<SealSummary>>,
    verification: Mutex<Option<VerificationReport>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockSigningBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next unscripted sign call with `response`.
    pub fn push_response(&self, response: SignedPdf) -> &Self {
        lock(&self.scripted).push_back(Scripted::Respond(response));
        self
    }

    /// Fail the next unscripted sign call.
    pub fn push_failure(&self, status: Option<u16>, message: impl Into<String>) -> &Self {
        lock(&self.scripted).push_back(Scripted::Fail {
            status,
            message: message.into(),
        });
        self
    }

    /// Fail every sign call whose input filename is `filename`.
    pub fn fail_file(&self, filename: impl Into<String>, message: impl Into<String>) -> &Self {
        lock(&self.failing_files).insert(filename.into(), message.into());
        self
    }

    pub fn set_seals(&self, seals: Vec<SealSummary>) -> &Self {
        *lock(&self.seals) = seals;
        self
    }

    pub fn set_verification(&self, report: VerificationReport) -> &Self {
        *lock(&self.verification) = Some(report);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Sign requests only, in order.
    pub fn sign_calls(&self) -> Vec<SignRequest> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                RecordedCall::Sign(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: RecordedCall) {
        lock(&self.calls).push(call);
    }

    fn file_failure(&self, filename: &str) -> Option<String> {
        lock(&self.failing_files).get(filename).cloned()
    }

    fn stamp(request: &SignRequest) -> SignedPdf {
        let mut bytes = request.pdf.clone();
        bytes.extend_from_slice(
            format!("\n% sigdesk-mock signature: {}\n", request.params.certificate_id).as_bytes(),
        );
        SignedPdf {
            bytes,
            filename: signed_filename_for(&request.filename),
            content_type: "application/pdf".to_string(),
            metadata: SignedPdfMetadata {
                document_id: Some(uuid::Uuid::new_v4().to_string()),
                signed_at: Some(Utc::now()),
                certificate_id: Some(request.params.certificate_id.clone()),
                seal_id: request.params.seal_id.clone(),
                visibility: Some(request.params.visibility),
                tsa_used: Some(request.params.use_tsa),
                ltv_embedded: Some(request.params.embed_ltv),
            },
        }
    }
}

#[async_trait]
impl SigningBackend for MockSigningBackend {
    async fn sign(&self, request: SignRequest) -> Result<SignedPdf> {
        self.record(RecordedCall::Sign(request.clone()));

        if let Some(message) = self.file_failure(&request.filename) {
            return Err(SigdeskError::backend(Some(422), message));
        }

        let next = lock(&self.scripted).pop_front();
        match next {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail { status, message }) => Err(SigdeskError::backend(status, message)),
            None => Ok(Self::stamp(&request)),
        }
    }

    async fn batch_sign(&self, request: BatchSignRequest) -> Result<BatchSignReport> {
        self.record(RecordedCall::BatchSign(request.clone()));

        let results: Vec<BatchSignItem> = request
            .files
            .iter()
            .map(|file| {
                let failure = self.file_failure(&file.filename);
                BatchSignItem {
                    filename: file.filename.clone(),
                    success: failure.is_none(),
                    document_id: failure
                        .is_none()
                        .then(|| uuid::Uuid::new_v4().to_string()),
                    signed_at: failure.is_none().then(Utc::now),
                    file_size: failure.is_none().then_some(file.pdf.len() as u64),
                    error: failure,
                }
            })
            .collect();
        let successful = results.iter().filter(|item| item.success).count() as u32;

        Ok(BatchSignReport {
            total: results.len() as u32,
            successful,
            failed: results.len() as u32 - successful,
            results,
            certificate_id: request.params.certificate_id,
            seal_id: request.params.seal_id,
            visibility: request.params.visibility,
            tsa_used: request.params.use_tsa,
            ltv_embedded: request.params.embed_ltv,
        })
    }

    async fn verify(&self, pdf: Vec<u8>, filename: &str) -> Result<VerificationReport> {
        self.record(RecordedCall::Verify {
            pdf,
            filename: filename.to_string(),
        });
        Ok(lock(&self.verification)
            .clone()
            .unwrap_or(VerificationReport {
                total_signatures: 0,
                valid_signatures: 0,
                trusted_signatures: 0,
                all_signatures_valid: false,
                all_signatures_trusted: false,
                signatures: Vec::new(),
            }))
    }

    async fn list_seals(&self) -> Result<Vec<SealSummary>> {
        self.record(RecordedCall::ListSeals);
        Ok(lock(&self.seals).clone())
    }
}
