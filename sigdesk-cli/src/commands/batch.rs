//! Batch-sign command: one request, many files, the same signature settings.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use sigdesk_core::client::sanitize_filename;
use sigdesk_core::{BatchFile, BatchSignRequest, SignParameters, SignatureMetadata, Visibility};
use tracing::info;

use super::ServiceArgs;
use crate::exit_codes::DataFailure;
use crate::utils::{format_timestamp, read_pdf};

#[derive(Debug, Clone, Default)]
pub struct BatchArgs {
    pub files: Vec<PathBuf>,
    pub certificate: String,
    pub seal: Option<String>,
    pub reason: Option<String>,
    pub location: Option<String>,
    pub contact: Option<String>,
    pub no_tsa: bool,
    pub ltv: bool,
    pub json: bool,
    pub dry_run: bool,
}

pub async fn execute(args: BatchArgs, service: &ServiceArgs, quiet: bool) -> Result<()> {
    let certificate_id = args.certificate.trim();
    if certificate_id.is_empty() {
        return Err(sigdesk_core::SigdeskError::validation(
            sigdesk_core::orchestrator::MISSING_CERTIFICATE,
        )
        .into());
    }

    let files = args
        .files
        .iter()
        .map(|path| {
            read_pdf(path).map(|upload| BatchFile {
                filename: sanitize_filename(&upload.name),
                pdf: upload.bytes,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let metadata = SignatureMetadata {
        reason: args.reason.clone(),
        location: args.location.clone(),
        contact_info: args.contact.clone(),
    }
    .normalized();

    // Batch signatures carry no placement, so they are always invisible.
    let request = BatchSignRequest {
        files,
        params: SignParameters {
            certificate_id: certificate_id.to_string(),
            seal_id: args.seal.clone(),
            visibility: Visibility::Invisible,
            coordinates: None,
            metadata,
            use_tsa: !args.no_tsa,
            embed_ltv: args.ltv,
        },
    };

    let report = service
        .backend(args.dry_run)?
        .batch_sign(request)
        .await
        .context("Batch signing failed")?;
    info!(
        total = report.total,
        successful = report.successful,
        failed = report.failed,
        "Batch finished"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !quiet {
        println!();
        for item in &report.results {
            if item.success {
                println!(
                    "   {} {} {}",
                    "Signed:".green(),
                    item.filename,
                    format!("({})", format_timestamp(item.signed_at)).dimmed()
                );
            } else {
                println!(
                    "   {} {}: {}",
                    "Failed:".red(),
                    item.filename,
                    item.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        println!();
        println!(
            "{} of {} signed",
            report.successful.to_string().green().bold(),
            report.total
        );
    }

    if report.failed > 0 {
        return Err(DataFailure(format!(
            "{} of {} documents failed to sign",
            report.failed, report.total
        ))
        .into());
    }
    Ok(())
}
