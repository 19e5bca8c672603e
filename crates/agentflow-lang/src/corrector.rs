//! Safe-default auto-correction.
//!
//! `correct` builds a new definition with unambiguous defaults filled in,
//! never touching values the author wrote explicitly. Running it twice
//! produces no new changes.

use agentflow_types::ast::{AgentDef, StepKind};

/// Default provider for llm steps that declare none.
pub const DEFAULT_PROVIDER: &str = "openai";
/// Default retry count filled by the corrector.
pub const DEFAULT_RETRIES: u32 = 3;
/// Default per-attempt timeout filled by the corrector.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;
/// Default HTTP method for http steps that declare none.
pub const DEFAULT_HTTP_METHOD: &str = "POST";

const CONTENT_TYPE: &str = "Content-Type";

/// A corrected definition plus a human-readable change log.
#[derive(Debug, Clone)]
pub struct Correction {
    pub def: AgentDef,
    /// One entry per applied fix, e.g. `steps.s: set retries to 3`.
    pub changes: Vec<String>,
}

/// Fill safe defaults into a new definition.
pub fn correct(def: &AgentDef) -> Correction {
    let mut def = def.clone();
    let mut changes = Vec::new();

    for step in &mut def.steps {
        let id = step.id.clone();
        match &mut step.kind {
            StepKind::Llm { provider, .. } => {
                if provider.is_none() {
                    *provider = Some(DEFAULT_PROVIDER.to_string());
                    changes.push(format!("steps.{id}: set provider to '{DEFAULT_PROVIDER}'"));
                }
            }
            StepKind::Http {
                method, headers, ..
            } => {
                if method.is_none() {
                    *method = Some(DEFAULT_HTTP_METHOD.to_string());
                    changes.push(format!("steps.{id}: set method to {DEFAULT_HTTP_METHOD}"));
                }
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE.to_string(), "application/json".to_string());
                    changes.push(format!(
                        "steps.{id}: set {CONTENT_TYPE} header to application/json"
                    ));
                }
            }
            _ => {}
        }
        if step.save.is_none() {
            let save = format!("{id}_result");
            step.save = Some(save.clone());
            changes.push(format!("steps.{id}: set save to '{save}'"));
        }
        if step.retries.is_none() {
            step.retries = Some(DEFAULT_RETRIES);
            changes.push(format!("steps.{id}: set retries to {DEFAULT_RETRIES}"));
        }
        if step.timeout_ms.is_none() {
            step.timeout_ms = Some(DEFAULT_TIMEOUT_MS);
            changes.push(format!("steps.{id}: set timeout to {DEFAULT_TIMEOUT_MS}"));
        }
    }

    Correction { def, changes }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
