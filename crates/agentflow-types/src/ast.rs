//! The agent AST: the canonical in-memory representation of an agent
//! definition.
//!
//! Both source dialects (declarative block syntax and terse line syntax)
//! converge on `AgentDef`. Values are immutable once parsed; the corrector
//! builds a new `AgentDef` rather than mutating in place.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// AgentDef
// ---------------------------------------------------------------------------

/// One parsed agent workflow definition.
///
/// `secrets`, `vars`, and `outputs` are declaration-ordered lists rather
/// than maps so that serialization and diagnostics preserve source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDef {
    /// Agent identifier (mandatory).
    pub id: String,
    /// Positive version number (`v1` -> 1).
    pub version: u32,
    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// How the agent is invoked (mandatory).
    pub trigger: Trigger,
    /// Declared secrets in source order.
    #[serde(default)]
    pub secrets: Vec<SecretDecl>,
    /// Declared variables in source order.
    #[serde(default)]
    pub vars: Vec<VarDecl>,
    /// Ordered list of steps.
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Output name -> template string, in source order.
    #[serde(default)]
    pub outputs: Vec<OutputDecl>,
}

impl AgentDef {
    /// Look up a declared variable by name.
    pub fn var(&self, name: &str) -> Option<&VarDecl> {
        self.vars.iter().find(|v| v.name == name)
    }

    /// Look up a declared secret by name.
    pub fn secret(&self, name: &str) -> Option<&SecretDecl> {
        self.secrets.iter().find(|s| s.name == name)
    }

    /// Look up a step by id.
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }
}

/// How an agent is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    /// Trigger type (e.g. "http", "cron", "manual"). Empty means missing.
    pub trigger_type: String,
    /// HTTP method for http triggers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Endpoint path for http triggers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Trigger {
    /// A placeholder trigger for definitions that never declared one.
    /// The validator flags this as a missing-field error.
    pub fn missing() -> Self {
        Self {
            trigger_type: String::new(),
            method: None,
            path: None,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.trigger_type.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Secrets and variables
// ---------------------------------------------------------------------------

/// One declared secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretDecl {
    pub name: String,
    pub source: SecretSource,
}

/// Where a secret value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SecretSource {
    /// Resolved from an environment variable at execution time.
    Env { var: String },
    /// An inline literal (the linter flags these).
    Literal { value: String },
}

/// One declared variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarDecl {
    pub name: String,
    pub source: VarSource,
    /// Missing required variables fail the execution before any step runs.
    #[serde(default = "default_true")]
    pub required: bool,
    /// Fallback when the source yields nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Where a variable value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VarSource {
    /// Dotted path into the caller-supplied input (`input.message.text`).
    Input { path: String },
    /// Process environment variable.
    Env { name: String },
    /// Inline literal.
    Literal { value: String },
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// One unit of work in an agent's execution list.
///
/// `retries` and `timeout_ms` stay `None` until the user (or the corrector)
/// sets them; the orchestrator falls back to 0 retries / 60000 ms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Unique within one definition.
    pub id: String,
    /// Kind-specific payload.
    pub kind: StepKind,
    /// Condition template; a falsy rendering skips the step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    /// Context name the step result is bound to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save: Option<String>,
    /// Extra attempts after the first failure (default 0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    /// Per-attempt timeout in milliseconds (default 60000).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Default retry count when a step does not declare one.
pub const DEFAULT_RETRIES: u32 = 0;

/// Default per-attempt timeout when a step does not declare one.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

impl Step {
    /// Effective retry count.
    pub fn retries(&self) -> u32 {
        self.retries.unwrap_or(DEFAULT_RETRIES)
    }

    /// Effective per-attempt timeout.
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    /// All template-bearing string fields of this step, as
    /// `(field_name, text)` pairs. Used by the validator's cross-reference
    /// pass and by the orchestrator's rendering.
    pub fn template_fields(&self) -> Vec<(&'static str, &str)> {
        let mut fields = Vec::new();
        if let Some(when) = &self.when {
            fields.push(("when", when.as_str()));
        }
        match &self.kind {
            StepKind::Llm { prompt, .. } => {
                fields.push(("prompt", prompt.as_str()));
            }
            StepKind::Http { url, body, headers, .. } => {
                fields.push(("url", url.as_str()));
                if let Some(body) = body {
                    fields.push(("body", body.as_str()));
                }
                for (_, v) in headers {
                    fields.push(("headers", v.as_str()));
                }
            }
            StepKind::Function { args, .. } => {
                for arg in args {
                    fields.push(("args", arg.as_str()));
                }
            }
            StepKind::Vision { prompt, image, .. } => {
                fields.push(("prompt", prompt.as_str()));
                if let Some(image) = image {
                    fields.push(("image", image.as_str()));
                }
            }
            StepKind::Audio { prompt, source, .. } => {
                if let Some(prompt) = prompt {
                    fields.push(("prompt", prompt.as_str()));
                }
                if let Some(source) = source {
                    fields.push(("source", source.as_str()));
                }
            }
            StepKind::VectorDb { payload, .. } => {
                if let Some(payload) = payload {
                    fields.push(("payload", payload.as_str()));
                }
            }
            StepKind::Finetune { dataset, .. } => {
                fields.push(("dataset", dataset.as_str()));
            }
        }
        fields
    }
}

/// The closed set of step kinds.
///
/// A tagged enum so dispatch is an exhaustive match: adding a kind without
/// a handler is a compile error, not a runtime surprise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    /// Language model completion.
    Llm {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        prompt: String,
    },
    /// Outbound HTTP request.
    Http {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<String>,
        /// Ordered header name -> template pairs.
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        headers: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
    },
    /// Built-in helper function.
    Function {
        name: String,
        #[serde(default)]
        args: Vec<String>,
    },
    /// Image-understanding capability.
    Vision {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        prompt: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image: Option<String>,
    },
    /// Audio transcription/generation capability.
    Audio {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    /// Vector database operation.
    VectorDb {
        operation: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        backend: Option<String>,
        collection: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<String>,
    },
    /// Fine-tuning job submission.
    Finetune {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        dataset: String,
    },
}

impl StepKind {
    /// The kind name as it appears in source text.
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::Llm { .. } => "llm",
            StepKind::Http { .. } => "http",
            StepKind::Function { .. } => "function",
            StepKind::Vision { .. } => "vision",
            StepKind::Audio { .. } => "audio",
            StepKind::VectorDb { .. } => "vectordb",
            StepKind::Finetune { .. } => "finetune",
        }
    }

    /// All kind names accepted in source.
    pub const NAMES: [&'static str; 7] = [
        "llm", "http", "function", "vision", "audio", "vectordb", "finetune",
    ];
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// One declared output: a name and the template that produces its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDecl {
    pub name: String,
    /// Template rendered against the final execution context.
    pub template: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
