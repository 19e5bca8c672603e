//! Advisory lint rules over parsed agent definitions.
//!
//! Rules are plain functions collected in a pluggable list; each returns
//! zero or more issues and a panicking rule is isolated so the remaining
//! rules still run. Lint issues never block execution.

use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};

use agentflow_types::ast::{AgentDef, SecretSource, StepKind};
use agentflow_types::diagnostic::{Location, Severity};
use agentflow_types::template::placeholders;
use serde::Serialize;

// ---------------------------------------------------------------------------
// LintIssue
// ---------------------------------------------------------------------------

/// One advisory finding from a single rule.
#[derive(Debug, Clone, Serialize)]
pub struct LintIssue {
    /// Stable rule name, e.g. `no-literal-secrets`.
    pub rule: &'static str,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl LintIssue {
    fn warning(rule: &'static str, message: impl Into<String>) -> Self {
        Self {
            rule,
            severity: Severity::Warning,
            message: message.into(),
            location: None,
        }
    }

    fn error(rule: &'static str, message: impl Into<String>) -> Self {
        Self {
            rule,
            severity: Severity::Error,
            message: message.into(),
            location: None,
        }
    }

    fn at_field(mut self, path: impl Into<String>) -> Self {
        self.location = Some(Location::Field(path.into()));
        self
    }
}

/// A lint rule: inspects a definition, returns its findings.
pub type Rule = fn(&AgentDef) -> Vec<LintIssue>;

// ---------------------------------------------------------------------------
// Linter
// ---------------------------------------------------------------------------

/// Runs a list of rules over a definition, isolating panics per rule.
pub struct Linter {
    rules: Vec<Rule>,
}

impl Default for Linter {
    fn default() -> Self {
        Self {
            rules: vec![
                no_literal_secrets,
                llm_step_completeness,
                http_step_url,
                step_resilience,
                unused_vars,
            ],
        }
    }
}

impl Linter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty rule list; add rules with [`Linter::with_rule`].
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Run every rule. A panicking rule contributes nothing but does not
    /// abort the others.
    pub fn run(&self, def: &AgentDef) -> Vec<LintIssue> {
        let mut issues = Vec::new();
        for rule in &self.rules {
            match catch_unwind(AssertUnwindSafe(|| rule(def))) {
                Ok(found) => issues.extend(found),
                Err(_) => {
                    tracing::warn!(agent = %def.id, "lint rule panicked, skipping it");
                }
            }
        }
        issues
    }
}

// ---------------------------------------------------------------------------
// Built-in rules
// ---------------------------------------------------------------------------

/// Secrets should come from the environment, not be pasted into source.
fn no_literal_secrets(def: &AgentDef) -> Vec<LintIssue> {
    def.secrets
        .iter()
        .filter(|s| matches!(s.source, SecretSource::Literal { .. }))
        .map(|s| {
            LintIssue::warning(
                "no-literal-secrets",
                format!("secret '{}' has a literal value in source", s.name),
            )
            .at_field(format!("secrets.{}", s.name))
        })
        .collect()
}

/// LLM steps without provider/model/save usually indicate an unfinished step.
fn llm_step_completeness(def: &AgentDef) -> Vec<LintIssue> {
    let mut issues = Vec::new();
    for step in &def.steps {
        let StepKind::Llm {
            provider, model, ..
        } = &step.kind
        else {
            continue;
        };
        let mut missing = Vec::new();
        if provider.is_none() {
            missing.push("provider");
        }
        if model.is_none() {
            missing.push("model");
        }
        if step.save.is_none() {
            missing.push("save");
        }
        if !missing.is_empty() {
            issues.push(
                LintIssue::warning(
                    "llm-step-completeness",
                    format!("llm step '{}' is missing {}", step.id, missing.join(", ")),
                )
                .at_field(format!("steps.{}", step.id)),
            );
        }
    }
    issues
}

fn http_step_url(def: &AgentDef) -> Vec<LintIssue> {
    def.steps
        .iter()
        .filter(|s| matches!(&s.kind, StepKind::Http { url, .. } if url.is_empty()))
        .map(|s| {
            LintIssue::error(
                "http-step-url",
                format!("http step '{}' has no url", s.id),
            )
            .at_field(format!("steps.{}.url", s.id))
        })
        .collect()
}

/// Steps without explicit retries/timeout fall back to the runtime
/// defaults, which is rarely what production agents want.
fn step_resilience(def: &AgentDef) -> Vec<LintIssue> {
    let mut issues = Vec::new();
    for step in &def.steps {
        if step.retries.is_none() {
            issues.push(
                LintIssue::warning(
                    "step-resilience",
                    format!("step '{}' declares no retries", step.id),
                )
                .at_field(format!("steps.{}.retries", step.id)),
            );
        }
        if step.timeout_ms.is_none() {
            issues.push(
                LintIssue::warning(
                    "step-resilience",
                    format!("step '{}' declares no timeout", step.id),
                )
                .at_field(format!("steps.{}.timeout", step.id)),
            );
        }
    }
    issues
}

fn unused_vars(def: &AgentDef) -> Vec<LintIssue> {
    let mut used: HashSet<String> = HashSet::new();
    for step in &def.steps {
        for (_, text) in step.template_fields() {
            for ph in placeholders(text) {
                used.insert(ph.root().to_string());
            }
        }
    }
    for output in &def.outputs {
        for ph in placeholders(&output.template) {
            used.insert(ph.root().to_string());
        }
    }
    def.vars
        .iter()
        .filter(|v| !used.contains(&v.name))
        .map(|v| {
            LintIssue::warning("unused-vars", format!("var '{}' is never used", v.name))
                .at_field(format!("vars.{}", v.name))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
