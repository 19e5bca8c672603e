//! Pieces shared by both dialect parsers: step property accumulation and
//! small text helpers.

use std::collections::BTreeMap;

use agentflow_types::ast::{Step, StepKind, VarSource};
use agentflow_types::diagnostic::{Diagnostic, ValidationResult};

// ---------------------------------------------------------------------------
// StepProps
// ---------------------------------------------------------------------------

/// Accumulates step properties as they are parsed, in any order, then
/// builds the typed `Step`. Field-level omissions are left for the
/// validator; only an unusable `kind` sinks the step here.
#[derive(Default)]
pub(crate) struct StepProps {
    pub kind: Option<(String, u32)>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub prompt: Option<String>,
    pub url: Option<String>,
    pub method: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub when: Option<String>,
    pub save: Option<String>,
    pub retries: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub function_name: Option<String>,
    pub args: Vec<String>,
    pub image: Option<String>,
    pub source: Option<String>,
    pub operation: Option<String>,
    pub backend: Option<String>,
    pub collection: Option<String>,
    pub payload: Option<String>,
    pub dataset: Option<String>,
}

impl StepProps {
    pub(crate) fn into_step(
        self,
        id: String,
        vr: &mut ValidationResult,
        step_line: u32,
    ) -> Option<Step> {
        let (kind_name, kind_line) = match &self.kind {
            Some((name, line)) => (name.clone(), *line),
            None => {
                vr.error(
                    Diagnostic::new(format!("step '{id}' is missing 'kind'"))
                        .at(step_line, 1)
                        .suggest(format!(
                            "add 'kind <one of: {}>'",
                            StepKind::NAMES.join(", ")
                        )),
                );
                return None;
            }
        };

        let kind = match kind_name.as_str() {
            "llm" => StepKind::Llm {
                provider: self.provider,
                model: self.model,
                prompt: self.prompt.unwrap_or_default(),
            },
            "http" => StepKind::Http {
                url: self.url.unwrap_or_default(),
                method: self.method,
                headers: self.headers,
                body: self.body,
            },
            "function" => StepKind::Function {
                name: self.function_name.unwrap_or_default(),
                args: self.args,
            },
            "vision" => StepKind::Vision {
                provider: self.provider,
                model: self.model,
                prompt: self.prompt.unwrap_or_default(),
                image: self.image,
            },
            "audio" => StepKind::Audio {
                provider: self.provider,
                model: self.model,
                prompt: self.prompt,
                source: self.source,
            },
            "vectordb" => StepKind::VectorDb {
                operation: self.operation.unwrap_or_default(),
                backend: self.backend,
                collection: self.collection.unwrap_or_default(),
                payload: self.payload,
            },
            "finetune" => StepKind::Finetune {
                provider: self.provider,
                model: self.model,
                dataset: self.dataset.unwrap_or_default(),
            },
            other => {
                vr.error(
                    Diagnostic::new(format!("unknown step kind '{other}'"))
                        .at(kind_line, 1)
                        .suggest(format!("valid kinds: {}", StepKind::NAMES.join(", "))),
                );
                return None;
            }
        };

        Some(Step {
            id,
            kind,
            when: self.when,
            save: self.save,
            retries: self.retries,
            timeout_ms: self.timeout_ms,
        })
    }
}

// ---------------------------------------------------------------------------
// Text helpers
// ---------------------------------------------------------------------------

/// Strip one layer of matching quotes, if present.
pub(crate) fn unquote(s: &str) -> &str {
    let s = s.trim();
    if s.len() >= 2 {
        let bytes = s.as_bytes();
        if (bytes[0] == b'"' && bytes[s.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[s.len() - 1] == b'\'')
        {
            return &s[1..s.len() - 1];
        }
    }
    s
}

pub(crate) fn is_bare_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Classify the right-hand side of a var declaration.
pub(crate) fn parse_var_source(value: &str) -> VarSource {
    if let Some(path) = value.strip_prefix("input.") {
        VarSource::Input {
            path: path.to_string(),
        }
    } else if value == "input" {
        VarSource::Input {
            path: String::new(),
        }
    } else if let Some(name) = value.strip_prefix("env.") {
        VarSource::Env {
            name: name.to_string(),
        }
    } else {
        VarSource::Literal {
            value: unquote(value).to_string(),
        }
    }
}

/// Remove up to `indent` leading spaces from a captured block line.
pub(crate) fn dedent(line: &str, indent: usize) -> String {
    let mut stripped = line;
    let mut removed = 0;
    while removed < indent {
        match stripped.strip_prefix(' ') {
            Some(rest) => {
                stripped = rest;
                removed += 1;
            }
            None => break,
        }
    }
    stripped.to_string()
}
