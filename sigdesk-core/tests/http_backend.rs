//! HTTP backend tests against an in-process mock signing service.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use lopdf::{dictionary, Document, Object};

use sigdesk_core::client::{SignParameters, SignRequest};
use sigdesk_core::{
    ClientConfig, DocumentStatus, HttpSigningBackend, PdfUpload, SigdeskError, SignOptions,
    SignatureMetadata, SigningBackend, SigningOrchestrator, StaticTokenProvider, TokenProvider,
    Visibility, Workspace,
};

// ============================================================================
// Mock service
// ============================================================================

#[derive(Debug, Clone)]
struct Captured {
    path: String,
    authorization: Option<String>,
    fields: Vec<(String, String)>,
    files: Vec<(String, String, Vec<u8>)>,
}

impl Captured {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

struct Scripted {
    status: StatusCode,
    headers: Vec<(&'static str, String)>,
    body: Vec<u8>,
}

impl Scripted {
    fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    fn header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }
}

#[derive(Clone, Default)]
struct MockService {
    captured: Arc<Mutex<Vec<Captured>>>,
    scripted: Arc<Mutex<VecDeque<Scripted>>>,
    /// When set, any other bearer gets a 401 without consuming a response.
    required_bearer: Arc<Mutex<Option<String>>>,
}

impl MockService {
    fn script(&self, response: Scripted) -> &Self {
        self.scripted.lock().unwrap().push_back(response);
        self
    }

    fn require_bearer(&self, token: &str) {
        *self.required_bearer.lock().unwrap() = Some(format!("Bearer {token}"));
    }

    fn captured(&self) -> Vec<Captured> {
        self.captured.lock().unwrap().clone()
    }

    fn respond(&self, captured: Captured) -> Response {
        let required = self.required_bearer.lock().unwrap().clone();
        let authorized = required.is_none() || required == captured.authorization;
        self.captured.lock().unwrap().push(captured);

        if !authorized {
            return (StatusCode::UNAUTHORIZED, r#"{"detail": "Not authenticated"}"#).into_response();
        }

        let Some(scripted) = self.scripted.lock().unwrap().pop_front() else {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        };
        let mut response = (scripted.status, scripted.body).into_response();
        for (name, value) in scripted.headers {
            response.headers_mut().insert(
                HeaderName::from_static(name),
                HeaderValue::from_str(&value).unwrap(),
            );
        }
        response
    }
}

fn authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn multipart_handler(
    State(service): State<MockService>,
    uri: Uri,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let mut fields = Vec::new();
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => files.push((name, file_name, field.bytes().await.unwrap().to_vec())),
            None => fields.push((name, field.text().await.unwrap())),
        }
    }
    service.respond(Captured {
        path: uri.path().to_string(),
        authorization: authorization(&headers),
        fields,
        files,
    })
}

async fn plain_handler(State(service): State<MockService>, uri: Uri, headers: HeaderMap) -> Response {
    service.respond(Captured {
        path: uri.path().to_string(),
        authorization: authorization(&headers),
        fields: Vec::new(),
        files: Vec::new(),
    })
}

async fn spawn_service() -> (MockService, String) {
    let service = MockService::default();
    let router = Router::new()
        .route("/api/v1/pdf/sign", post(multipart_handler))
        .route("/api/v1/pdf/sign/batch", post(multipart_handler))
        .route("/api/v1/pdf/verify", post(multipart_handler))
        .route("/api/v1/pdf/seals", get(plain_handler))
        .with_state(service.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (service, format!("http://{addr}"))
}

fn config(base_url: &str) -> ClientConfig {
    ClientConfig {
        api_url: base_url.to_string(),
        timeout: Duration::from_secs(5),
        initial_interval: Duration::from_millis(10),
        max_interval: Duration::from_millis(50),
        ..ClientConfig::default()
    }
}

fn backend(base_url: &str, token: Option<&str>) -> HttpSigningBackend {
    HttpSigningBackend::new(
        config(base_url),
        Arc::new(StaticTokenProvider::new(token.map(str::to_string))),
    )
    .unwrap()
}

fn invisible_request(filename: &str) -> SignRequest {
    SignRequest {
        pdf: b"%PDF-1.7 input".to_vec(),
        filename: filename.to_string(),
        params: SignParameters {
            certificate_id: "cert-123".into(),
            seal_id: None,
            visibility: Visibility::Invisible,
            coordinates: None,
            metadata: SignatureMetadata::default(),
            use_tsa: false,
            embed_ltv: false,
        },
    }
}

/// Single-page PDF with the given MediaBox size in points.
fn single_page_pdf(width: f32, height: f32) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), Object::Real(width), Object::Real(height)],
    });
    let kids: Vec<Object> = vec![page_id.into()];
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

// ============================================================================
// Signing
// ============================================================================

#[tokio::test]
async fn test_sign_reads_filename_and_metadata_headers() {
    let (service, url) = spawn_service().await;
    service.script(
        Scripted::new(200, b"%PDF-signed".to_vec())
            .header("content-type", "application/pdf")
            .header("content-disposition", r#"attachment; filename="report-signed.pdf""#)
            .header("x-document-id", "doc-42")
            .header("x-signed-at", "2024-05-01T10:00:00Z")
            .header("x-certificate-id", "cert-123")
            .header("x-visibility", "invisible")
            .header("x-tsa-used", "true")
            .header("x-ltv-embedded", "yes"),
    );

    let signed = backend(&url, Some("tok-1"))
        .sign(invisible_request("report.pdf"))
        .await
        .unwrap();

    assert_eq!(signed.bytes, b"%PDF-signed".to_vec());
    assert_eq!(signed.filename, "report-signed.pdf");
    assert_eq!(signed.metadata.document_id.as_deref(), Some("doc-42"));
    assert!(signed.metadata.signed_at.is_some());
    assert_eq!(signed.metadata.visibility, Some(Visibility::Invisible));
    assert_eq!(signed.metadata.tsa_used, Some(true));
    assert_eq!(signed.metadata.ltv_embedded, None);

    let calls = service.captured();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].path, "/api/v1/pdf/sign");
    assert_eq!(calls[0].authorization.as_deref(), Some("Bearer tok-1"));
    assert_eq!(calls[0].files[0].0, "pdf_file");
    assert_eq!(calls[0].files[0].1, "report.pdf");
    assert_eq!(calls[0].field("visibility"), Some("invisible"));
    assert_eq!(calls[0].field("page"), None);
    assert_eq!(calls[0].field("use_tsa"), None);
}

#[tokio::test]
async fn test_sign_without_disposition_derives_filename() {
    let (service, url) = spawn_service().await;
    service.script(Scripted::new(200, b"%PDF-signed".to_vec()));

    let signed = backend(&url, None)
        .sign(invisible_request("Quarterly Report.PDF"))
        .await
        .unwrap();

    assert_eq!(signed.filename, "Quarterly Report-signed.pdf");
    assert_eq!(service.captured()[0].authorization, None);
}

#[tokio::test]
async fn test_sign_errors_carry_service_message() {
    let (service, url) = spawn_service().await;
    service
        .script(Scripted::new(422, r#"{"detail": "Certificate not found"}"#))
        .script(Scripted::new(400, r#"{"code": "BAD_PDF", "message": "File is not a valid PDF"}"#))
        .script(Scripted::new(502, "  upstream unavailable  "))
        .script(Scripted::new(500, ""));
    let backend = backend(&url, None);

    let mut messages = Vec::new();
    for _ in 0..4 {
        let err = backend.sign(invisible_request("a.pdf")).await.unwrap_err();
        messages.push(err.user_message("unused"));
        if messages.len() == 1 {
            assert!(matches!(err, SigdeskError::Backend { status: Some(422), .. }));
        }
    }

    assert_eq!(
        messages,
        vec![
            "Certificate not found",
            "File is not a valid PDF",
            "upstream unavailable",
            "Failed to sign document.",
        ]
    );
    // Signing is never retried.
    assert_eq!(service.captured().len(), 4);
}

// ============================================================================
// Authorization
// ============================================================================

struct RotatingTokens {
    current: Mutex<Option<String>>,
    next: Option<String>,
    refreshes: AtomicUsize,
    expired: AtomicBool,
}

impl RotatingTokens {
    fn new(current: &str, next: Option<&str>) -> Self {
        Self {
            current: Mutex::new(Some(current.to_string())),
            next: next.map(str::to_string),
            refreshes: AtomicUsize::new(0),
            expired: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl TokenProvider for RotatingTokens {
    fn access_token(&self) -> Option<String> {
        self.current.lock().unwrap().clone()
    }

    async fn refresh(&self) -> Option<String> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let next = self.next.clone()?;
        *self.current.lock().unwrap() = Some(next.clone());
        Some(next)
    }

    fn on_unauthorized(&self) {
        self.expired.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_unauthorized_request_is_retried_after_refresh() {
    let (service, url) = spawn_service().await;
    service.require_bearer("fresh");
    service.script(Scripted::new(200, b"%PDF-signed".to_vec()));

    let tokens = Arc::new(RotatingTokens::new("stale", Some("fresh")));
    let backend = HttpSigningBackend::new(config(&url), tokens.clone()).unwrap();

    backend.sign(invisible_request("a.pdf")).await.unwrap();

    let calls = service.captured();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].authorization.as_deref(), Some("Bearer stale"));
    assert_eq!(calls[1].authorization.as_deref(), Some("Bearer fresh"));
    assert_eq!(tokens.refreshes.load(Ordering::SeqCst), 1);
    assert!(!tokens.expired.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_failed_refresh_reports_unauthorized() {
    let (service, url) = spawn_service().await;
    service.require_bearer("never-issued");

    let tokens = Arc::new(RotatingTokens::new("stale", None));
    let backend = HttpSigningBackend::new(config(&url), tokens.clone()).unwrap();

    let err = backend.sign(invisible_request("a.pdf")).await.unwrap_err();

    assert_eq!(err.to_string(), "Not authenticated");
    assert!(matches!(err, SigdeskError::Backend { status: Some(401), .. }));
    assert_eq!(service.captured().len(), 1);
    assert!(tokens.expired.load(Ordering::SeqCst));
}

// ============================================================================
// Seals, batch and verification
// ============================================================================

const SEALS_JSON: &str = r#"{
    "seals": [{
        "seal_id": "seal-1",
        "name": "Company stamp",
        "description": null,
        "content_type": "image/png",
        "size_bytes": 2048,
        "created_at": "2024-05-01T10:00:00",
        "updated_at": null,
        "download_url": "/api/v1/pdf/seals/seal-1/image"
    }]
}"#;

#[tokio::test]
async fn test_list_seals_retries_transient_failures() {
    let (service, url) = spawn_service().await;
    service
        .script(Scripted::new(503, "busy"))
        .script(Scripted::new(502, ""))
        .script(Scripted::new(200, SEALS_JSON).header("content-type", "application/json"));

    let seals = backend(&url, None).list_seals().await.unwrap();

    assert_eq!(service.captured().len(), 3);
    assert_eq!(seals.len(), 1);
    assert_eq!(seals[0].id, "seal-1");
    assert!(seals[0].created_at.is_some());
}

#[tokio::test]
async fn test_list_seals_does_not_retry_client_errors() {
    let (service, url) = spawn_service().await;
    service.script(Scripted::new(403, r#"{"detail": "Seal access denied"}"#));

    let err = backend(&url, None).list_seals().await.unwrap_err();

    assert_eq!(err.to_string(), "Seal access denied");
    assert_eq!(service.captured().len(), 1);
}

#[tokio::test]
async fn test_batch_sign_uploads_every_file() {
    let (service, url) = spawn_service().await;
    service.script(
        Scripted::new(
            200,
            r#"{
                "total": 2, "successful": 1, "failed": 1,
                "results": [
                    {"filename": "a.pdf", "success": true, "document_id": "d1",
                     "signed_at": "2024-05-01T10:00:00Z", "file_size": 10, "error": null},
                    {"filename": "document-2.pdf", "success": false, "error": "Corrupt PDF"}
                ],
                "certificate_id": "cert-123", "seal_id": null,
                "visibility": "invisible", "tsa_used": false, "ltv_embedded": false
            }"#,
        )
        .header("content-type", "application/json"),
    );

    let request = invisible_request("unused.pdf");
    let report = backend(&url, None)
        .batch_sign(sigdesk_core::BatchSignRequest {
            files: vec![
                sigdesk_core::BatchFile {
                    filename: "a.pdf".into(),
                    pdf: b"%PDF-a".to_vec(),
                },
                sigdesk_core::BatchFile {
                    filename: " ".into(),
                    pdf: b"%PDF-b".to_vec(),
                },
            ],
            params: request.params,
        })
        .await
        .unwrap();

    assert_eq!((report.successful, report.failed), (1, 1));
    assert_eq!(report.results[1].error.as_deref(), Some("Corrupt PDF"));

    let call = &service.captured()[0];
    assert_eq!(call.path, "/api/v1/pdf/sign/batch");
    let names: Vec<&str> = call.files.iter().map(|(_, name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["a.pdf", "document-2.pdf"]);
    assert!(call.files.iter().all(|(field, _, _)| field == "pdf_files"));
}

#[tokio::test]
async fn test_verify_parses_report() {
    let (service, url) = spawn_service().await;
    service.script(
        Scripted::new(
            200,
            r#"{
                "total_signatures": 1, "valid_signatures": 1, "trusted_signatures": 1,
                "all_signatures_valid": true, "all_signatures_trusted": true,
                "signatures": [{
                    "field_name": "Signature1", "valid": true, "trusted": true,
                    "summary": "INTACT:TRUSTED", "signer_common_name": "Jane Signer"
                }]
            }"#,
        )
        .header("content-type", "application/json"),
    );

    let report = backend(&url, None)
        .verify(b"%PDF-signed".to_vec(), "signed.pdf")
        .await
        .unwrap();

    assert!(report.all_signatures_trusted);
    assert_eq!(report.signatures[0].signer_common_name.as_deref(), Some("Jane Signer"));
    assert_eq!(service.captured()[0].files[0].1, "signed.pdf");
}

// ============================================================================
// End to end
// ============================================================================

#[tokio::test]
async fn test_contract_is_signed_with_one_visible_signature() {
    let (service, url) = spawn_service().await;
    service.script(
        Scripted::new(200, b"%PDF-1.7 signed contract".to_vec())
            .header("content-type", "application/pdf")
            .header("content-disposition", r#"attachment; filename="contract-signed.pdf""#),
    );

    let mut workspace = Workspace::default();
    let id = workspace
        .add_files([PdfUpload::new("contract.pdf", single_page_pdf(400.0, 533.33))])
        .added
        .remove(0);
    let pages = workspace.load_preview(&id).await.unwrap();
    assert!((pages[0].width - 600.0).abs() < 1e-3);
    workspace.add_overlay(&id).unwrap();

    let orchestrator = SigningOrchestrator::new(Arc::new(backend(&url, None)));
    let report = orchestrator
        .sign_queue(
            &mut workspace,
            &SignOptions {
                certificate_id: "cert-123".into(),
                use_tsa: true,
                embed_ltv: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(report.signed(), 1);

    let calls = service.captured();
    assert_eq!(calls.len(), 1);
    let call = &calls[0];
    assert_eq!(call.field("certificate_id"), Some("cert-123"));
    assert_eq!(call.field("visibility"), Some("visible"));
    assert_eq!(call.field("page"), Some("1"));
    assert_eq!(call.field("use_tsa"), Some("true"));
    assert_eq!(call.field("embed_ltv"), Some("true"));

    let number = |name: &str| call.field(name).unwrap().parse::<f64>().unwrap();
    assert!((number("x") - 80.0).abs() < 1e-2);
    assert!((number("y") - 330.66).abs() < 1e-2);
    assert!((number("width") - 120.0).abs() < 1e-2);
    assert!((number("height") - 96.0).abs() < 1e-2);

    let doc = workspace.document(&id).unwrap();
    assert_eq!(doc.status, DocumentStatus::Signed);
    assert_eq!(doc.signed_filename.as_deref(), Some("contract-signed.pdf"));
    assert_eq!(
        doc.signed_payload.as_deref(),
        Some(&b"%PDF-1.7 signed contract"[..])
    );
}
