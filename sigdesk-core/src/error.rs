use thiserror::Error;

/// Generic message used when a signing failure carries no usable detail.
pub const GENERIC_SIGN_FAILURE: &str = "Failed to sign document.";

#[derive(Error, Debug)]
pub enum SigdeskError {
    /// Input rejected before any network call was made.
    #[error("{0}")]
    Validation(String),

    /// Non-success response from the signing service, already reduced to a
    /// user-facing message.
    #[error("{message}")]
    Backend { status: Option<u16>, message: String },

    #[error("Unable to read PDF: {0}")]
    PdfParse(String),

    #[error("Render error: {0}")]
    Render(String),

    /// A load or render was superseded by `cancel()` or a newer load.
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "network")]
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl SigdeskError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn backend(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Backend {
            status,
            message: message.into(),
        }
    }

    /// Message suitable for display next to the owning document.
    ///
    /// Transport failures collapse to `fallback` so connection internals never
    /// reach the user.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Validation(message) | Self::Backend { message, .. } => message.clone(),
            Self::PdfParse(_) | Self::Render(_) | Self::Cancelled | Self::Config(_) => {
                self.to_string()
            }
            _ => fallback.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SigdeskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_keeps_backend_detail() {
        let err = SigdeskError::backend(Some(422), "Certificate has been revoked");
        assert_eq!(
            err.user_message(GENERIC_SIGN_FAILURE),
            "Certificate has been revoked"
        );
    }

    #[test]
    fn test_user_message_hides_io_internals() {
        let err = SigdeskError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset by peer (os error 104)",
        ));
        assert_eq!(err.user_message(GENERIC_SIGN_FAILURE), GENERIC_SIGN_FAILURE);
    }
}
