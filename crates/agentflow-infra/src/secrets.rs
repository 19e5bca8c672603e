//! Environment-backed secret resolution.

use std::collections::HashMap;

use agentflow_core::secrets::{SecretError, SecretResolver};
use agentflow_types::ast::{SecretDecl, SecretSource};

/// Resolves `env:` secrets from process environment variables. Literal
/// declarations pass through unchanged.
#[derive(Debug, Default, Clone)]
pub struct EnvSecretResolver;

impl SecretResolver for EnvSecretResolver {
    async fn resolve(
        &self,
        decls: &[SecretDecl],
    ) -> Result<HashMap<String, String>, SecretError> {
        let mut resolved = HashMap::with_capacity(decls.len());
        for decl in decls {
            let value = match &decl.source {
                SecretSource::Env { var } => {
                    std::env::var(var).map_err(|_| SecretError {
                        name: decl.name.clone(),
                        reason: format!("environment variable '{var}' is not set"),
                    })?
                }
                SecretSource::Literal { value } => value.clone(),
            };
            resolved.insert(decl.name.clone(), value);
        }
        Ok(resolved)
    }
}
