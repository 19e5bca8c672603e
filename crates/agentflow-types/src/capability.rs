//! Capability provider contract types.
//!
//! The orchestrator treats every AI/ML backend as a black box satisfying a
//! single `execute(kind, model, input) -> result` contract. These are the
//! wire types of that contract; the trait itself lives in agentflow-core.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// CapabilityKind
// ---------------------------------------------------------------------------

/// The modality a provider is asked to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Llm,
    Vision,
    Audio,
    VectorDb,
    Finetune,
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CapabilityKind::Llm => "llm",
            CapabilityKind::Vision => "vision",
            CapabilityKind::Audio => "audio",
            CapabilityKind::VectorDb => "vectordb",
            CapabilityKind::Finetune => "finetune",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// CapabilityRequest
// ---------------------------------------------------------------------------

/// The fully rendered input handed to a provider for one step attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityRequest {
    pub kind: CapabilityKind,
    /// Provider name from the step (e.g. "openai"), if declared.
    pub provider: Option<String>,
    /// Model identifier, possibly compound (`vendor/model:tag`).
    pub model: Option<String>,
    /// Rendered kind-specific payload (prompt text, vectordb operation, ...).
    pub input: Value,
}

// ---------------------------------------------------------------------------
// ProviderError
// ---------------------------------------------------------------------------

/// Categorized provider failure.
///
/// `AuthFailure` and `InvalidInput` are not retryable -- repeating the same
/// request cannot change the outcome. The rest are transient.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum ProviderError {
    #[error("authentication failed: {0}")]
    AuthFailure(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("provider timed out: {0}")]
    Timeout(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Whether a retry can reasonably change the outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited(_)
                | ProviderError::Timeout(_)
                | ProviderError::Unavailable(_)
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability() {
        assert!(ProviderError::RateLimited("slow down".into()).is_retryable());
        assert!(ProviderError::Unavailable("503".into()).is_retryable());
        assert!(!ProviderError::AuthFailure("bad key".into()).is_retryable());
        assert!(!ProviderError::InvalidInput("empty prompt".into()).is_retryable());
    }

    #[test]
    fn kind_display() {
        assert_eq!(CapabilityKind::VectorDb.to_string(), "vectordb");
        assert_eq!(CapabilityKind::Llm.to_string(), "llm");
    }
}
