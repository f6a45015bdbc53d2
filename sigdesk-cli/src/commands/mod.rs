//! Subcommand implementations and the queue setup they share.

pub mod batch;
pub mod pages;
pub mod preview;
pub mod seals;
pub mod sign;
pub mod verify;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use sigdesk_core::{
    ClientConfig, DocumentId, HttpSigningBackend, MockSigningBackend, SigningBackend, Visibility,
    Workspace,
};
use tracing::{info, warn};

use crate::plan::{PlannedOverlay, PlannedPoints, SigningPlan};
use crate::utils::read_pdf;

/// Connection settings shared by every command that talks to the service.
#[derive(Debug, Clone, Default)]
pub struct ServiceArgs {
    pub api_url: Option<String>,
    pub access_token: Option<String>,
}

impl ServiceArgs {
    /// Environment configuration with command-line overrides applied.
    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::from_env();
        if let Some(url) = self.api_url.as_deref() {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(token) = self.access_token.as_deref() {
            config.access_token = Some(token.to_string());
        }
        config
    }

    pub fn backend(&self, dry_run: bool) -> Result<Arc<dyn SigningBackend>> {
        if dry_run {
            warn!("Dry run: documents are stamped locally, not signed");
            return Ok(Arc::new(MockSigningBackend::new()));
        }
        let config = self.config();
        info!(api_url = %config.api_url, "Using signing service");
        let backend =
            HttpSigningBackend::from_config(config).context("Failed to create signing client")?;
        Ok(Arc::new(backend))
    }
}

/// One overlay described on the command line.
#[derive(Args, Debug, Clone, Default)]
pub struct OverlayArgs {
    /// Apply an invisible signature (no placement on the page)
    #[arg(long)]
    pub invisible: bool,

    /// Page of the visible signature (1-based)
    #[arg(long, value_name = "N")]
    pub page: Option<u32>,

    /// Signature rectangle in PDF points, bottom-left origin
    #[arg(long, value_name = "X,Y,W,H", value_parser = parse_rect)]
    pub rect: Option<PlannedPoints>,

    /// Seal image id to stamp into the visible signature
    #[arg(long, value_name = "SEAL_ID")]
    pub seal: Option<String>,

    /// Reason embedded in the signature
    #[arg(long)]
    pub reason: Option<String>,

    /// Location embedded in the signature
    #[arg(long)]
    pub location: Option<String>,

    /// Contact information embedded in the signature
    #[arg(long)]
    pub contact: Option<String>,
}

impl OverlayArgs {
    pub fn visibility(&self) -> Visibility {
        if self.invisible {
            Visibility::Invisible
        } else {
            Visibility::Visible
        }
    }

    pub fn to_planned(&self) -> PlannedOverlay {
        PlannedOverlay {
            label: None,
            visibility: self.visibility(),
            seal_id: self.seal.clone(),
            reason: self.reason.clone(),
            location: self.location.clone(),
            contact_info: self.contact.clone(),
            page: self.page,
            placement: None,
            points: self.rect,
        }
    }
}

fn parse_rect(value: &str) -> std::result::Result<PlannedPoints, String> {
    let numbers: Vec<f64> = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| format!("invalid number in rectangle: {e}"))?;
    match numbers[..] {
        [x, y, width, height] => Ok(PlannedPoints {
            x,
            y,
            width,
            height,
        }),
        _ => Err("expected four comma-separated numbers: X,Y,WIDTH,HEIGHT".to_string()),
    }
}

/// A workspace loaded from files or a plan, with every document measured.
pub struct Queue {
    pub workspace: Workspace,
    pub documents: Vec<DocumentId>,
    pub plan: Option<SigningPlan>,
}

/// Queue `files` with one overlay each from `overlay`, or every document of
/// the plan at `plan` with its own overlays.
///
/// A document whose pages cannot be read stays queued; signing reports the
/// parse error for it.
pub async fn build_queue(
    files: &[PathBuf],
    plan: Option<&Path>,
    overlay: &OverlayArgs,
    quiet: bool,
) -> Result<Queue> {
    let plan = plan.map(SigningPlan::load).transpose()?;
    let entries: Vec<(PathBuf, Vec<PlannedOverlay>)> = match &plan {
        Some(plan) => plan
            .documents
            .iter()
            .map(|doc| (doc.file.clone(), doc.overlays.clone()))
            .collect(),
        None => files
            .iter()
            .map(|file| (file.clone(), vec![overlay.to_planned()]))
            .collect(),
    };

    let mut workspace = Workspace::default();
    let mut documents = Vec::with_capacity(entries.len());

    for (path, overlays) in entries {
        let outcome = workspace.add_files([read_pdf(&path)?]);
        if let Some(error) = outcome.error {
            bail!("Failed to read file: {}: {error}", path.display());
        }
        let Some(document) = outcome.added.into_iter().next() else {
            continue;
        };

        let measured = match workspace.load_preview(&document).await {
            Ok(pages) => {
                info!(path = %path.display(), pages = pages.len(), "Measured pages");
                true
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Unable to read PDF pages");
                if !quiet {
                    eprintln!("{} {}: {err}", "warning:".yellow().bold(), path.display());
                }
                false
            }
        };

        for planned in overlays {
            // Point placement needs page metrics; signing will report the
            // parse error for this document instead.
            let planned = if measured {
                planned
            } else {
                PlannedOverlay {
                    points: None,
                    ..planned
                }
            };
            planned
                .apply(&mut workspace, &document)
                .with_context(|| format!("Invalid overlay for {}", path.display()))?;
        }
        documents.push(document);
    }

    Ok(Queue {
        workspace,
        documents,
        plan,
    })
}
