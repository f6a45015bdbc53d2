//! Sign command: place overlays and sign every queued document in order.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use sigdesk_core::{DocumentOutcome, SignOptions, SigningOrchestrator};
use tracing::info;

use super::{build_queue, OverlayArgs, ServiceArgs};
use crate::exit_codes::DataFailure;
use crate::utils::{ConsoleObserver, DirectorySink};

/// Flags that only apply to signing.
#[derive(Debug, Clone, Default)]
pub struct SignArgs {
    pub files: Vec<PathBuf>,
    pub plan: Option<PathBuf>,
    pub certificate: Option<String>,
    pub overlay: OverlayArgs,
    pub no_tsa: bool,
    pub ltv: bool,
    pub output: PathBuf,
    pub dry_run: bool,
}

pub async fn execute(args: SignArgs, service: &ServiceArgs, quiet: bool) -> Result<()> {
    let mut queue = build_queue(&args.files, args.plan.as_deref(), &args.overlay, quiet).await?;

    let plan = queue.plan.as_ref();
    let options = SignOptions {
        certificate_id: args
            .certificate
            .clone()
            .or_else(|| plan.and_then(|p| p.certificate_id.clone()))
            .unwrap_or_default(),
        use_tsa: !args.no_tsa && plan.and_then(|p| p.use_tsa).unwrap_or(true),
        embed_ltv: args.ltv || plan.and_then(|p| p.embed_ltv).unwrap_or(false),
    };

    let sink = Arc::new(DirectorySink::new(&args.output)?);
    let orchestrator = SigningOrchestrator::new(service.backend(args.dry_run)?)
        .with_observer(Arc::new(ConsoleObserver::new(quiet)))
        .with_download_sink(sink.clone());

    let report = orchestrator.sign_queue(&mut queue.workspace, &options).await?;
    info!(
        signed = report.signed(),
        failed = report.failed(),
        skipped = report.skipped(),
        "Signing finished"
    );

    if !quiet {
        println!();
        for document in &report.documents {
            match &document.outcome {
                DocumentOutcome::Signed { filename } => println!(
                    "   {} {} {} {}",
                    "Signed:".green(),
                    document.name,
                    "→".dimmed(),
                    sink.path_for(filename).display()
                ),
                DocumentOutcome::Failed { message } => {
                    println!("   {} {}: {}", "Failed:".red(), document.name, message)
                }
                DocumentOutcome::Skipped => {
                    println!("   {} {}", "Skipped:".yellow(), document.name)
                }
            }
        }
        for error in &report.download_errors {
            println!("   {} {}", "Download failed:".red(), error);
        }
        println!();
        println!(
            "{} signed, {} failed",
            report.signed().to_string().green().bold(),
            report.failed().to_string().red().bold()
        );
    }

    if report.failed() > 0 {
        return Err(DataFailure(format!(
            "{} of {} documents failed to sign",
            report.failed(),
            report.documents.len()
        ))
        .into());
    }
    if !report.download_errors.is_empty() {
        return Err(DataFailure(report.download_errors.join("; ")).into());
    }
    Ok(())
}
