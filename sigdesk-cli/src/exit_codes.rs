//! Exit codes following sysexits.h conventions.
//!
//! Scripts can tell a rejected document apart from an unreachable signing
//! service or a bad command line.

use sigdesk_core::SigdeskError;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments, missing certificate id).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Data error: a document failed to sign or a signature did not verify.
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Cannot open or parse an input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Signing service unreachable.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const NETWORK_ERROR: i32 = 69;

/// I/O error (cannot write output file).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Marker error for runs that completed but left documents unsigned or
/// signatures unverified.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct DataFailure(pub String);

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        let classified = err.chain().find_map(|cause| {
            if cause.is::<DataFailure>() {
                return Some(DATA_ERROR);
            }
            match cause.downcast_ref::<SigdeskError>()? {
                SigdeskError::Validation(_) => Some(USAGE_ERROR),
                SigdeskError::Backend { .. } => Some(DATA_ERROR),
                SigdeskError::PdfParse(_) => Some(INPUT_ERROR),
                SigdeskError::HttpError(_) => Some(NETWORK_ERROR),
                SigdeskError::Io(_) => Some(IO_ERROR),
                _ => None,
            }
        });

        // Errors raised by the CLI itself carry their class in the context.
        let code = classified.unwrap_or_else(|| {
            if message.contains("Failed to read") || message.contains("Invalid signing plan") {
                INPUT_ERROR
            } else if message.contains("Failed to write") || message.contains("Failed to create") {
                IO_ERROR
            } else {
                GENERAL_ERROR
            }
        });

        Self {
            code,
            message: Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn test_classifies_core_errors_through_context() {
        let err = anyhow::Error::new(SigdeskError::validation("Provide a certificate ID"))
            .context("Signing aborted");
        assert_eq!(ExitCode::from_anyhow(&err).code, USAGE_ERROR);

        let err = anyhow::Error::new(SigdeskError::PdfParse("no pages".into()));
        assert_eq!(ExitCode::from_anyhow(&err).code, INPUT_ERROR);
    }

    #[test]
    fn test_classifies_cli_errors_by_message() {
        let err: anyhow::Error = std::fs::read("/nonexistent/contract.pdf")
            .context("Failed to read file: /nonexistent/contract.pdf")
            .unwrap_err();
        assert_eq!(ExitCode::from_anyhow(&err).code, INPUT_ERROR);

        let err = anyhow::Error::new(DataFailure("1 document failed to sign".into()));
        let exit = ExitCode::from_anyhow(&err);
        assert_eq!(exit.code, DATA_ERROR);
        assert_eq!(exit.message.as_deref(), Some("1 document failed to sign"));
    }

    #[test]
    fn test_data_failure_survives_added_context() {
        let err = anyhow::Error::new(DataFailure("No signatures found".into()))
            .context("Verification failed");

        assert_eq!(DataFailure("x".into()).to_string(), "x");
        let exit = ExitCode::from_anyhow(&err);
        assert_eq!(exit.code, DATA_ERROR);
        assert_eq!(
            exit.message.as_deref(),
            Some("Verification failed: No signatures found")
        );
    }
}
