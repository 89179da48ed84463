//! Error taxonomy for engine operations.
//!
//! Every engine call ends in exactly one `Result`; nothing here is retried
//! or swallowed. Presentation of these errors is the caller's business.

use thiserror::Error;

use crate::adapters::TransportError;

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Descriptor had an unrecognized or explicitly-unset field
    #[error("Invalid query field '{field}': {reason}")]
    InvalidQuery { field: String, reason: String },

    #[error("No storage registered for domain '{domain}'")]
    UnknownDomain { domain: String },

    #[error("Invalid object id: {id}")]
    InvalidId { id: String },

    #[error("Transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Unsupported record type '{tag}'")]
    UnsupportedType { tag: String },

    #[error("Object not found: {id}")]
    NotFound { id: String },

    /// A redirect pointed at an object the backend no longer has
    #[error("Redirect from {source_id} to {target} could not be resolved")]
    UnresolvedRedirect { source_id: String, target: String },

    #[error("Redirect chain exceeded {hops} hops")]
    RedirectLoop { hops: u32 },

    #[error("Operation cancelled")]
    Cancelled,
}

impl EngineError {
    /// Whether the failure happened before any request was issued
    pub fn is_pre_flight(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidQuery { .. }
                | EngineError::UnknownDomain { .. }
                | EngineError::InvalidId { .. }
        )
    }
}
