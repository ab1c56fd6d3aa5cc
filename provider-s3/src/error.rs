//! Error types for the S3 provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// S3 provider errors
#[derive(Error, Debug)]
pub enum S3Error {
    /// The store refused the credentials or returned no buckets for them
    #[error("Credentials rejected by target host: {0}")]
    CredentialsRejected(String),

    /// A request failed after retries
    #[error("S3 {operation} failed: {message}")]
    Request {
        operation: &'static str,
        message: String,
    },

    /// Object does not exist
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Client could not be configured
    #[error("Invalid S3 configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl S3Error {
    /// Wrap an SDK error, keeping the whole source chain in the message
    pub(crate) fn request<E>(operation: &'static str, error: E) -> Self
    where
        E: std::error::Error,
    {
        S3Error::Request {
            operation,
            message: aws_sdk_s3::error::DisplayErrorContext(error).to_string(),
        }
    }
}

/// Result type for S3 operations
pub type Result<T> = std::result::Result<T, S3Error>;

impl From<S3Error> for BridgeError {
    fn from(error: S3Error) -> Self {
        match error {
            S3Error::CredentialsRejected(msg) => BridgeError::CredentialsRejected(msg),
            S3Error::Request { operation, message } => {
                BridgeError::OperationFailed(format!("S3 {} failed: {}", operation, message))
            }
            S3Error::NotFound { bucket, key } => BridgeError::NotFound { bucket, key },
            S3Error::InvalidConfiguration(msg) => {
                BridgeError::NotAvailable(format!("Invalid S3 configuration: {}", msg))
            }
            S3Error::Io(err) => BridgeError::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_bridge_not_found() {
        let bridge: BridgeError = S3Error::NotFound {
            bucket: "media".to_string(),
            key: "a.jpg".to_string(),
        }
        .into();
        assert!(bridge.is_not_found());
    }

    #[test]
    fn test_request_error_keeps_operation() {
        let err = S3Error::request(
            "CopyObject",
            std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        );
        let bridge: BridgeError = err.into();
        let message = bridge.to_string();
        assert!(message.contains("CopyObject"));
        assert!(message.contains("boom"));
    }

    #[test]
    fn test_credentials_rejected_passes_through() {
        let bridge: BridgeError = S3Error::CredentialsRejected("no buckets".to_string()).into();
        assert!(matches!(bridge, BridgeError::CredentialsRejected(_)));
    }
}
