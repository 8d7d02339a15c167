use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad failure class reported across the RPC boundary.
///
/// The bootstrap path treats every class the same way (degrade to a safe
/// default); the split exists for logging and user-facing messages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RpcErrorCategory {
    /// Transport failure: backend unreachable, timeout, malformed response.
    Network,
    /// Credential rejected or missing.
    Auth,
    /// Invalid input or unsupported request.
    Config,
    /// Backend bug or invariant break.
    Internal,
}

/// Stable error payload returned by backend procedures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct RpcError {
    /// High-level failure class.
    pub category: RpcErrorCategory,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl RpcError {
    /// Construct a new RPC error.
    pub fn new(
        category: RpcErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Transport-level failure with a stable code.
    pub fn network(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(RpcErrorCategory::Network, code, message)
    }

    /// Credential failure with a stable code.
    pub fn auth(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(RpcErrorCategory::Auth, code, message)
    }
}
