//! Capability provider contract.
//!
//! Every AI/ML modality (llm, vision, audio, vectordb, finetune) reaches
//! the outside world through this single trait. Concrete providers live
//! outside this crate; tests use in-memory stubs.

use agentflow_types::capability::{CapabilityRequest, ProviderError};
use serde_json::Value;

/// A black-box backend serving capability requests.
///
/// Uses RPITIT async methods, consistent with the Rust 2024 edition
/// approach used across the workspace.
pub trait CapabilityProvider: Send + Sync {
    /// Execute one fully rendered request.
    fn execute(
        &self,
        request: CapabilityRequest,
    ) -> impl std::future::Future<Output = Result<Value, ProviderError>> + Send;
}
