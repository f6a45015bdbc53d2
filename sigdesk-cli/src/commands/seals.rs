//! Seals command: list stored seal images, or check one locally.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use sigdesk_core::validation::validate_seal_image;
use tracing::info;

use super::ServiceArgs;
use crate::exit_codes::DataFailure;
use crate::utils::format_timestamp;

pub async fn execute(
    check: Option<PathBuf>,
    json: bool,
    service: &ServiceArgs,
    quiet: bool,
) -> Result<()> {
    if let Some(path) = check {
        return check_image(path, quiet);
    }

    let seals = service
        .backend(false)?
        .list_seals()
        .await
        .context("Failed to list seals")?;
    info!(seals = seals.len(), "Listed seals");

    if json {
        println!("{}", serde_json::to_string_pretty(&seals)?);
        return Ok(());
    }
    if quiet {
        return Ok(());
    }

    if seals.is_empty() {
        println!("{}", "No seal images stored".dimmed());
        return Ok(());
    }
    println!();
    for seal in &seals {
        println!(
            "   {}  {}  {}",
            seal.id.bold(),
            seal.name,
            format!(
                "{}, {} bytes, added {}",
                seal.content_type,
                seal.size_bytes,
                format_timestamp(seal.created_at)
            )
            .dimmed()
        );
    }
    Ok(())
}

fn check_image(path: PathBuf, quiet: bool) -> Result<()> {
    let bytes =
        std::fs::read(&path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();

    match validate_seal_image(name, &bytes) {
        Ok(kind) => {
            if !quiet {
                println!(
                    "{} {} ({})",
                    "Seal image OK:".green().bold(),
                    path.display(),
                    kind.content_type()
                );
            }
            Ok(())
        }
        Err(message) => Err(DataFailure(format!("{}: {message}", path.display())).into()),
    }
}
