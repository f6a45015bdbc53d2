//! Verify command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use sigdesk_core::VerificationReport;
use tracing::{info, warn};

use super::ServiceArgs;
use crate::exit_codes::DataFailure;
use crate::utils::{format_timestamp, read_pdf};

/// Execute the verify command.
pub async fn execute(file: PathBuf, json: bool, service: &ServiceArgs, quiet: bool) -> Result<()> {
    let upload = read_pdf(&file)?;

    let report = service
        .backend(false)?
        .verify(upload.bytes, &upload.name)
        .await
        .context("Verification failed")?;

    info!(
        signatures = report.total_signatures,
        valid = report.valid_signatures,
        trusted = report.trusted_signatures,
        "Verification finished"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !quiet {
        print_report(&report);
    }

    if report.total_signatures == 0 {
        warn!("Document carries no signatures");
        return Err(DataFailure("Verification failed: no signatures found".into()).into());
    }
    if !report.all_signatures_valid {
        return Err(DataFailure(format!(
            "Verification failed: {} of {} signatures are invalid",
            report.total_signatures - report.valid_signatures,
            report.total_signatures
        ))
        .into());
    }
    Ok(())
}

fn print_report(report: &VerificationReport) {
    println!();
    let banner = if report.total_signatures == 0 {
        "NO SIGNATURES".yellow().bold()
    } else if report.all_signatures_valid && report.all_signatures_trusted {
        "VALID AND TRUSTED".green().bold()
    } else if report.all_signatures_valid {
        "VALID (UNTRUSTED)".yellow().bold()
    } else {
        "INVALID".red().bold()
    };
    println!("{banner}");
    println!(
        "   {} {} total, {} valid, {} trusted",
        "Signatures:".dimmed(),
        report.total_signatures,
        report.valid_signatures,
        report.trusted_signatures
    );

    for signature in &report.signatures {
        println!();
        let validity = if signature.valid {
            "valid".green()
        } else {
            "invalid".red()
        };
        let trust = if signature.trusted {
            "trusted".green()
        } else {
            "untrusted".yellow()
        };
        println!("   {} ({validity}, {trust})", signature.field_name.bold());
        if let Some(signer) = signature.signer_common_name.as_deref() {
            println!("      {} {signer}", "Signer:".dimmed());
        }
        println!(
            "      {} {}",
            "Signed at:".dimmed(),
            format_timestamp(signature.signing_time)
        );
        if let Some(level) = signature.modification_level.as_deref() {
            println!("      {} {level}", "Modifications:".dimmed());
        }
        if signature.docmdp_ok == Some(false) {
            println!("      {}", "Changes violate the document's permissions".red());
        }
        if signature.timestamp_time.is_some() {
            let trusted = match signature.timestamp_trusted {
                Some(true) => "trusted".green(),
                Some(false) => "untrusted".yellow(),
                None => "unknown".dimmed(),
            };
            println!(
                "      {} {} ({trusted})",
                "Timestamp:".dimmed(),
                format_timestamp(signature.timestamp_time)
            );
        }
        println!("      {} {}", "Summary:".dimmed(), signature.summary);
        if let Some(error) = signature.error.as_deref() {
            println!("      {} {}", "Error:".dimmed(), error.red());
        }
    }
}
