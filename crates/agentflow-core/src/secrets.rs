//! Secret resolution contract.
//!
//! The orchestrator consumes a resolved name -> value map and never sees
//! the resolution mechanism. The environment-backed resolver lives in
//! agentflow-infra; tests use in-memory maps.

use std::collections::HashMap;

use agentflow_types::ast::SecretDecl;

/// A declared secret could not be resolved.
#[derive(Debug, thiserror::Error)]
#[error("secret '{name}' could not be resolved ({reason})")]
pub struct SecretError {
    pub name: String,
    pub reason: String,
}

/// Resolves an agent's declared secrets into concrete values.
pub trait SecretResolver: Send + Sync {
    fn resolve(
        &self,
        decls: &[SecretDecl],
    ) -> impl std::future::Future<Output = Result<HashMap<String, String>, SecretError>> + Send;
}
