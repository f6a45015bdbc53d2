//! Preview command: render placement previews as PNG images.
//!
//! Pages are drawn as outlines at display scale with every visible overlay
//! painted on top, so placements can be checked before signing.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use image::Rgba;
use sigdesk_core::render::paint_placement;
use sigdesk_core::{PageDimension, SigningDocument, Visibility};
use tracing::{debug, info};

use super::{build_queue, OverlayArgs};
use crate::utils::file_stem;

const OVERLAY_COLORS: [Rgba<u8>; 4] = [
    Rgba([37, 99, 235, 255]),
    Rgba([22, 163, 74, 255]),
    Rgba([217, 119, 6, 255]),
    Rgba([147, 51, 234, 255]),
];

pub async fn execute(
    files: Vec<PathBuf>,
    plan: Option<PathBuf>,
    overlay: OverlayArgs,
    output: PathBuf,
    quiet: bool,
) -> Result<()> {
    let queue = build_queue(&files, plan.as_deref(), &overlay, quiet).await?;
    std::fs::create_dir_all(&output)
        .with_context(|| format!("Failed to create output directory: {}", output.display()))?;

    let mut written = Vec::new();
    for document_id in &queue.documents {
        let Some(document) = queue.workspace.document(document_id) else {
            continue;
        };
        let Some(renderer) = queue.workspace.previews().get(document_id) else {
            continue;
        };

        renderer.render_all()?;
        renderer.settle().await;

        for page in &document.page_dimensions {
            let Some(mut surface) = renderer.surface(page.page_number) else {
                debug!(page = page.page_number, "Page left blank");
                continue;
            };
            paint_overlays(&mut surface, document, page);

            let path = page_path(&output, &document.name, page.page_number);
            surface
                .save(&path)
                .with_context(|| format!("Failed to write preview: {}", path.display()))?;
            info!(path = %path.display(), "Wrote preview");
            written.push(path);
        }
    }

    if !quiet {
        println!();
        println!("{}", "Placement previews rendered".green().bold());
        println!();
        for path in &written {
            println!("   {} {}", "Preview:".dimmed(), path.display());
        }
    }
    Ok(())
}

fn paint_overlays(surface: &mut image::RgbaImage, document: &SigningDocument, page: &PageDimension) {
    for (index, overlay) in document.overlays.iter().enumerate() {
        if overlay.visibility != Visibility::Visible {
            continue;
        }
        let Some(placement) = overlay.placement.filter(|p| p.page == page.page_number) else {
            continue;
        };
        let color = OVERLAY_COLORS[index % OVERLAY_COLORS.len()];
        paint_placement(surface, placement.to_pixels(page), color);
    }
}

fn page_path(dir: &Path, document_name: &str, page_number: u32) -> PathBuf {
    dir.join(format!("{}-page-{page_number}.png", file_stem(document_name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_path() {
        assert_eq!(
            page_path(Path::new("out"), "contract.pdf", 2),
            PathBuf::from("out/contract-page-2.png")
        );
    }
}
