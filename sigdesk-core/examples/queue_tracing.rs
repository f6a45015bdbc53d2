//! Example demonstrating signing-queue tracing instrumentation.
//!
//! Signs a generated two-page PDF with two overlays against the in-memory
//! backend, so every pipeline stage shows up in the log.
//!
//! Run with: cargo run -p sigdesk-core --example queue_tracing

use std::sync::Arc;

use lopdf::{dictionary, Document, Object};
use sigdesk_core::{
    MockSigningBackend, PdfUpload, SignOptions, SigningOrchestrator, Visibility, Workspace,
};
use tracing_subscriber::{fmt, EnvFilter};

fn sample_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::new();
    for (width, height) in [(612.0, 792.0), (792.0, 612.0)] {
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(width), Object::Real(height)],
        });
        kids.push(page_id.into());
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => 2,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    if let Err(e) = doc.save_to(&mut bytes) {
        eprintln!("Failed to build sample PDF: {e}");
    }
    bytes
}

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(EnvFilter::new("sigdesk_core=debug,info"))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    println!("=== Signing Queue Tracing Demo ===\n");

    let mut workspace = Workspace::default();
    let added = workspace
        .add_files([PdfUpload::new("agreement.pdf", sample_pdf())])
        .added;
    let Some(document) = added.first().cloned() else {
        println!("Sample PDF was rejected");
        return;
    };

    match workspace.load_preview(&document).await {
        Ok(pages) => println!("Measured {} pages\n", pages.len()),
        Err(e) => println!("Preview failed: {e}\n"),
    }

    let first = workspace.add_overlay(&document);
    let second = workspace.add_overlay(&document);
    if let (Ok(_), Ok(second)) = (first, second) {
        let _ = workspace.set_page(&document, &second, 2);
        let _ = workspace.set_visibility(&document, &second, Visibility::Visible);
    }

    let backend = Arc::new(MockSigningBackend::new());
    let orchestrator = SigningOrchestrator::new(backend.clone());
    let options = SignOptions {
        certificate_id: "demo-certificate".into(),
        use_tsa: true,
        embed_ltv: false,
    };

    match orchestrator.sign_queue(&mut workspace, &options).await {
        Ok(report) => {
            println!("\nSigned: {}, failed: {}", report.signed(), report.failed());
            for call in backend.sign_calls() {
                println!(
                    "  {} -> {:?}",
                    call.filename,
                    call.params.coordinates.map(|c| (c.page, c.x, c.y))
                );
            }
        }
        Err(e) => println!("\nSigning failed: {e}"),
    }
}
