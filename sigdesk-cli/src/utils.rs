//! Common utility functions shared across CLI commands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use sigdesk_core::{
    DocumentStatus, DownloadSink, PdfUpload, SigdeskError, SigningDocument, SigningObserver,
};
use tracing::{debug, info};

/// Read a PDF from disk as a queue upload named after the file.
pub fn read_pdf(path: &Path) -> Result<PdfUpload> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("document.pdf")
        .to_string();
    info!(path = %path.display(), bytes = bytes.len(), "Read file");
    Ok(PdfUpload::new(name, bytes))
}

/// Stem of a file name without its extension, for derived output names.
pub fn file_stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("document")
}

/// Format an optional service timestamp for display.
pub fn format_timestamp(timestamp: Option<DateTime<Utc>>) -> String {
    match timestamp {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "unknown".to_string(),
    }
}

/// Writes signed documents into a directory.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }
}

impl DownloadSink for DirectorySink {
    fn deliver(&self, filename: &str, bytes: &[u8]) -> sigdesk_core::Result<()> {
        let path = self.path_for(filename);
        std::fs::write(&path, bytes).map_err(SigdeskError::Io)?;
        debug!(path = %path.display(), bytes = bytes.len(), "Wrote signed document");
        Ok(())
    }
}

/// Prints signing progress to stderr.
pub struct ConsoleObserver {
    quiet: bool,
}

impl ConsoleObserver {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl SigningObserver for ConsoleObserver {
    fn on_progress(&self, message: &str) {
        if !self.quiet {
            eprintln!("{}", message.dimmed());
        }
    }

    fn on_status(&self, document: &SigningDocument) {
        if self.quiet {
            return;
        }
        match document.status {
            DocumentStatus::Signed => eprintln!(
                "   {} {}",
                "✓".green().bold(),
                document.signed_filename.as_deref().unwrap_or(&document.name)
            ),
            DocumentStatus::Error => eprintln!(
                "   {} {}: {}",
                "✗".red().bold(),
                document.name,
                document.error.as_deref().unwrap_or_default().red()
            ),
            DocumentStatus::Draft | DocumentStatus::Signing => {}
        }
    }
}
