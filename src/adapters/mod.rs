//! Transport adapters for the search backend.
//!
//! The engine only knows the `Transport` trait. Cancellation is enforced at
//! this boundary by `send_cancellable`, so individual transports just send.

pub mod http;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::compiler::CompiledRequest;
use crate::core::error::EngineError;

pub use http::HttpTransport;

/// Failure reported by a transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("backend returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),
}

/// Sends compiled requests to the search backend
#[async_trait]
pub trait Transport: Send + Sync {
    /// Human-readable transport name
    fn name(&self) -> &str;

    /// Send a request and return the raw response body
    async fn send(&self, request: &CompiledRequest) -> Result<String, TransportError>;
}

/// Send `request` unless `cancel` fires first.
///
/// An already-cancelled token never reaches the transport. Cancelling
/// mid-flight drops the transport future, which aborts the request.
pub async fn send_cancellable(
    transport: &dyn Transport,
    request: &CompiledRequest,
    cancel: &CancellationToken,
) -> Result<String, EngineError> {
    if cancel.is_cancelled() {
        debug!(transport = transport.name(), "Skipping send, already cancelled");
        return Err(EngineError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(transport = transport.name(), "Request cancelled in flight");
            Err(EngineError::Cancelled)
        }
        result = transport.send(request) => result.map_err(EngineError::from),
    }
}
