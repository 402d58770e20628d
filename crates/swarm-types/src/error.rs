//! The closed error-code set the core surfaces to external callers (§6 Error codes).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of error codes the runtime surfaces (§6 Error codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// A construction-time configuration value was invalid.
    InvalidConfig,
    /// A capacity bound (agents, tier size, ...) was reached.
    CapacityExceeded,
    /// The referenced entity does not exist.
    NotFound,
    /// The pool is not in a state that accepts dispatch.
    PoolInactive,
    /// No worker/agent candidate could be found for the request.
    NoWorkersAvailable,
    /// The worker has in-flight work and cannot be removed/terminated.
    WorkerBusy,
    /// No LLM provider in the fallback chain is currently healthy.
    LlmUnavailable,
    /// The LLM provider rejected the request on authentication grounds.
    LlmAuth,
    /// The LLM provider rate-limited the request.
    LlmRateLimit,
    /// Every provider in the fallback chain failed.
    AllProvidersFailed,
    /// Checkpoint creation or persistence failed.
    CheckpointFailed,
}

impl ErrorCode {
    /// Machine-readable code string, matching spec.md's `SCREAMING_SNAKE_CASE` naming.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::CapacityExceeded => "CAPACITY_EXCEEDED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::PoolInactive => "POOL_INACTIVE",
            ErrorCode::NoWorkersAvailable => "NO_WORKERS_AVAILABLE",
            ErrorCode::WorkerBusy => "WORKER_BUSY",
            ErrorCode::LlmUnavailable => "LLM_UNAVAILABLE",
            ErrorCode::LlmAuth => "LLM_AUTH",
            ErrorCode::LlmRateLimit => "LLM_RATE_LIMIT",
            ErrorCode::AllProvidersFailed => "ALL_PROVIDERS_FAILED",
            ErrorCode::CheckpointFailed => "CHECKPOINT_FAILED",
        }
    }
}

/// Top-level error type surfaced by the runtime's public operations.
///
/// Internal crates define their own narrower error enums (see
/// `swarm-pool::PoolError`, `swarm-llm::RouterError`, ...) and map them onto
/// this closed set at the crate boundary, the way `toka-agent-runtime`'s
/// internal errors are distinct from the kernel's `KernelError`.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
#[error("{code:?}: {message}")]
pub struct SwarmError {
    /// The closed error code.
    pub code: ErrorCode,
    /// Human-readable detail.
    pub message: String,
}

impl SwarmError {
    /// Construct a new typed error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_strings_match_spec() {
        assert_eq!(ErrorCode::InvalidConfig.as_str(), "INVALID_CONFIG");
        assert_eq!(ErrorCode::AllProvidersFailed.as_str(), "ALL_PROVIDERS_FAILED");
    }

    #[test]
    fn swarm_error_displays_code_and_message() {
        let err = SwarmError::new(ErrorCode::NotFound, "session s1 not found");
        let rendered = err.to_string();
        assert!(rendered.contains("NotFound"));
        assert!(rendered.contains("session s1 not found"));
    }
}
