//! Error types for the payment service.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for payment operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PaymentError {
    /// Entity not found.
    #[error("entity not found")]
    NotFound,

    /// Malformed request or failed referential precondition.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A mandatory payload field is empty.
    #[error("attribute {0} is missing")]
    MissingRequiredAttribute(&'static str),

    /// Caller's role is not allowed to perform the operation.
    #[error("user does not have required access privilege")]
    NoAccess,

    /// Resource already exists (e.g. second account for one owner).
    #[error("entity already existed")]
    DuplicatedResource,

    /// Sender cannot cover nominal plus fee.
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Decimal, available: Decimal },

    /// Keyed-hash stamp mismatch or undecryptable field.
    #[error("{0} data integrity is compromised")]
    DataIntegrity(String),

    /// Catch-all failure.
    #[error("internal server error: {0}")]
    Unknown(String),

    /// Database failure.
    #[error("database error: {0}")]
    Database(String),

    /// Failure talking to another service or the event bus.
    #[error("transport error: {0}")]
    Transport(String),
}

/// The closed set of error kinds surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    BadRequest,
    NoAccess,
    DuplicatedResource,
    InsufficientBalance,
    DataIntegrity,
    Unknown,
}

impl PaymentError {
    /// Shorthand for a bad request with a reason.
    pub fn bad_request(reason: impl Into<String>) -> Self {
        PaymentError::BadRequest(reason.into())
    }

    /// Shorthand for an integrity violation on an entity.
    pub fn integrity(entity: impl Into<String>) -> Self {
        PaymentError::DataIntegrity(entity.into())
    }

    /// Classify into the public taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::NotFound => ErrorKind::NotFound,
            PaymentError::BadRequest(_) | PaymentError::MissingRequiredAttribute(_) => {
                ErrorKind::BadRequest
            }
            PaymentError::NoAccess => ErrorKind::NoAccess,
            PaymentError::DuplicatedResource => ErrorKind::DuplicatedResource,
            PaymentError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            PaymentError::DataIntegrity(_) => ErrorKind::DataIntegrity,
            PaymentError::Unknown(_) | PaymentError::Database(_) | PaymentError::Transport(_) => {
                ErrorKind::Unknown
            }
        }
    }

    /// Numeric error code: HTTP status, category and id packed as `SSSCCI`.
    pub fn error_code(&self) -> u32 {
        match self {
            PaymentError::MissingRequiredAttribute(_) => 400018,
            other => match other.kind() {
                ErrorKind::Unknown => 500011,
                ErrorKind::BadRequest => 400012,
                ErrorKind::NoAccess => 403013,
                ErrorKind::DuplicatedResource => 400015,
                ErrorKind::NotFound => 404017,
                ErrorKind::InsufficientBalance => 400024,
                ErrorKind::DataIntegrity => 500999,
            },
        }
    }

    /// HTTP status a transport layer should answer with.
    pub fn http_status(&self) -> u16 {
        u16::try_from(self.error_code() / 1000).unwrap_or(500)
    }

    /// Check if the error came from infrastructure rather than the domain.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            PaymentError::Unknown(_) | PaymentError::Database(_) | PaymentError::Transport(_)
        )
    }
}

/// Result type alias for payment operations.
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Error body handed to the transport layer. Infrastructure details never leak.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status.
    pub status: u16,
    /// Numeric error code.
    pub code: u32,
    /// Public kind.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
}

impl From<&PaymentError> for ErrorResponse {
    fn from(err: &PaymentError) -> Self {
        let message = if err.is_infrastructure() {
            "internal server error".to_string()
        } else {
            err.to_string()
        };

        Self {
            status: err.http_status(),
            code: err.error_code(),
            kind: err.kind(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_and_codes() {
        assert_eq!(PaymentError::NotFound.error_code(), 404017);
        assert_eq!(PaymentError::NoAccess.http_status(), 403);
        assert_eq!(
            PaymentError::MissingRequiredAttribute("pin").kind(),
            ErrorKind::BadRequest
        );
        assert_eq!(
            PaymentError::MissingRequiredAttribute("pin").error_code(),
            400018
        );
        assert_eq!(PaymentError::integrity("accounts").error_code(), 500999);
        assert_eq!(
            PaymentError::Database("connection reset".into()).kind(),
            ErrorKind::Unknown
        );
    }

    #[test]
    fn test_response_masks_infrastructure() {
        let err = PaymentError::Database("password authentication failed".into());
        let resp = ErrorResponse::from(&err);

        assert_eq!(resp.status, 500);
        assert_eq!(resp.kind, ErrorKind::Unknown);
        assert!(!resp.message.contains("password"));

        let err = PaymentError::integrity("customer");
        let resp = ErrorResponse::from(&err);
        assert_eq!(resp.message, "customer data integrity is compromised");
    }
}
