/// Unified error types for the DID registry
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Input validation failures for DID strings, documents and request payloads
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// DID string does not match `did:<method>:<authority>:<identifier>`
    #[error("Invalid DID format: {0}")]
    InvalidDid(String),

    /// `document.id` differs from the DID being registered
    #[error("Document id '{document_id}' does not match DID '{did}'")]
    IdentifierMismatch { did: String, document_id: String },

    /// Document carries no verification method
    #[error("Document must contain at least one verification method")]
    MissingVerificationMethod,

    /// Verification method entry with an empty required field
    #[error("Invalid verification method at index {index}: {reason}")]
    InvalidVerificationMethod { index: usize, reason: String },

    /// Service entry with an empty required field
    #[error("Invalid service at index {index}: {reason}")]
    InvalidService { index: usize, reason: String },

    /// Owner address is not `0x` followed by 40 hex characters
    #[error("Invalid owner address: {0}")]
    InvalidOwnerAddress(String),

    /// Request payload rejected by field rules
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let codes: Vec<String> = errs.iter().map(|e| e.code.to_string()).collect();
                format!("{} ({})", field, codes.join(", "))
            })
            .collect();
        fields.sort();
        ValidationError::InvalidRequest(fields.join("; "))
    }
}

/// Main error type for the registry
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Malformed DID, document, address or request
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// DID (or DID version) already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unknown record id or DID
    #[error("Not found: {0}")]
    NotFound(String),

    /// Ownership or role check failed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Lifecycle rule violated
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Credential missing, expired or invalid
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Document store failure
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] sqlx::Error),

    /// Notification channel failure
    #[error("Notification error: {0}")]
    Notification(String),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error payload handed to untrusted callers
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl RegistryError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::Validation(_) => "ValidationError",
            RegistryError::Conflict(_) => "Conflict",
            RegistryError::NotFound(_) => "NotFound",
            RegistryError::Forbidden(_) => "Forbidden",
            RegistryError::InvalidTransition(_) => "InvalidTransition",
            RegistryError::Authentication(_) => "AuthenticationRequired",
            RegistryError::StorageUnavailable(_) => "StorageUnavailable",
            RegistryError::Notification(_)
            | RegistryError::Config(_)
            | RegistryError::Internal(_)
            | RegistryError::Io(_) => "InternalServerError",
        }
    }

    /// Only collaborator failures are worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, RegistryError::StorageUnavailable(_))
    }

    /// Message safe to show a caller. Storage and internal detail is only
    /// exposed when `expose_internal` is set (development deployments).
    pub fn public_message(&self, expose_internal: bool) -> String {
        match self {
            RegistryError::StorageUnavailable(_) if !expose_internal => {
                "Storage temporarily unavailable, please retry".to_string()
            }
            RegistryError::Notification(_)
            | RegistryError::Config(_)
            | RegistryError::Internal(_)
            | RegistryError::Io(_)
                if !expose_internal =>
            {
                "Internal server error".to_string() // Don't leak details
            }
            _ => self.to_string(),
        }
    }

    /// Convert into the caller-facing payload
    pub fn to_response(&self, expose_internal: bool) -> ErrorResponse {
        ErrorResponse {
            error: self.code().to_string(),
            message: self.public_message(expose_internal),
        }
    }
}

/// Result type alias for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Returns true when a storage error is a uniqueness violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
