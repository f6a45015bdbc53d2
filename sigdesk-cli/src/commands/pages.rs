//! Pages command: print the page metrics the placement math works with.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use sigdesk_core::render::measure_pages;
use sigdesk_core::PageDimension;
use tracing::debug;

use crate::utils::read_pdf;

#[derive(Serialize)]
struct FilePages<'a> {
    file: String,
    pages: &'a [PageDimension],
}

pub async fn execute(files: Vec<PathBuf>, json: bool, quiet: bool) -> Result<()> {
    let mut measured = Vec::with_capacity(files.len());
    for file in &files {
        let upload = read_pdf(file)?;
        let pages = tokio::task::spawn_blocking(move || measure_pages(&upload.bytes))
            .await
            .context("Page measurement task failed")?
            .with_context(|| format!("Failed to read PDF pages: {}", file.display()))?;
        debug!(path = %file.display(), pages = pages.len(), "Measured pages");
        measured.push((file.display().to_string(), pages));
    }

    if json {
        let output: Vec<FilePages> = measured
            .iter()
            .map(|(file, pages)| FilePages {
                file: file.clone(),
                pages,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if quiet {
        return Ok(());
    }

    for (file, pages) in &measured {
        println!();
        println!("{} {}", file.bold(), format!("({} pages)", pages.len()).dimmed());
        for page in pages {
            println!(
                "   {} {:>8.2} x {:<8.2} pt   {} {:.0} x {:.0} px",
                format!("Page {:>3}:", page.page_number).dimmed(),
                page.width_points,
                page.height_points,
                "display".dimmed(),
                page.width,
                page.height,
            );
        }
    }
    Ok(())
}
