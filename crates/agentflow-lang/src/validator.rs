//! Semantic validation of parsed agent definitions.
//!
//! Two passes over the AST: a schema pass (required fields, enum
//! membership, numeric ranges, duplicate step ids) and a cross-reference
//! pass (every `{name}` placeholder must resolve to a declared var, a
//! declared secret, an `input.`-prefixed path, or a `save` bound by an
//! earlier step). Diagnostics are collected, never thrown, so callers see
//! the complete set at once.

use std::collections::HashSet;

use agentflow_types::ast::{AgentDef, Step, StepKind};
use agentflow_types::diagnostic::{Diagnostic, ValidationResult};
use agentflow_types::template::placeholders;

/// Retry counts above this are almost certainly a typo.
const RETRIES_WARN_THRESHOLD: u32 = 10;

/// Validate a definition, producing errors and warnings.
pub fn validate(def: &AgentDef) -> ValidationResult {
    let mut vr = ValidationResult::new();
    check_header(def, &mut vr);
    check_steps(def, &mut vr);
    check_references(def, &mut vr);
    vr
}

// ---------------------------------------------------------------------------
// Schema checks
// ---------------------------------------------------------------------------

fn check_header(def: &AgentDef, vr: &mut ValidationResult) {
    if def.id.is_empty() {
        vr.error(
            Diagnostic::new("agent has no id")
                .at_field("id")
                .suggest("declare one with '@agent <id> v1' or 'agent: <id>'"),
        );
    }
    if def.version == 0 {
        vr.error(
            Diagnostic::new("version must be at least 1").at_field("version"),
        );
    }
    if def.trigger.is_missing() {
        vr.error(
            Diagnostic::new("agent has no trigger")
                .at_field("trigger")
                .suggest("declare one, e.g. 'trigger http POST /path' or 'trigger manual'"),
        );
    }
    if def.steps.is_empty() {
        vr.warning(
            Diagnostic::new("agent declares no steps")
                .at_field("steps")
                .suggest("an agent without steps produces no results"),
        );
    }
}

fn check_steps(def: &AgentDef, vr: &mut ValidationResult) {
    let mut seen: HashSet<&str> = HashSet::new();
    for step in &def.steps {
        if !seen.insert(&step.id) {
            vr.error(
                Diagnostic::new(format!("duplicate step id '{}'", step.id))
                    .at_field(format!("steps.{}", step.id))
                    .suggest("step ids must be unique within one agent"),
            );
        }
        check_step_fields(step, vr);
        if let Some(retries) = step.retries {
            if retries > RETRIES_WARN_THRESHOLD {
                vr.warning(
                    Diagnostic::new(format!(
                        "step '{}' declares {retries} retries",
                        step.id
                    ))
                    .at_field(format!("steps.{}.retries", step.id)),
                );
            }
        }
        if step.timeout_ms == Some(0) {
            vr.error(
                Diagnostic::new(format!("step '{}' has a zero timeout", step.id))
                    .at_field(format!("steps.{}.timeout", step.id))
                    .suggest("timeout is in milliseconds and must be positive"),
            );
        }
    }
}

fn check_step_fields(step: &Step, vr: &mut ValidationResult) {
    let id = &step.id;
    let mut require = |present: bool, field: &str| {
        if !present {
            vr.error(
                Diagnostic::new(format!("{} step '{id}' is missing '{field}'", step.kind.name()))
                    .at_field(format!("steps.{id}.{field}")),
            );
        }
    };
    match &step.kind {
        StepKind::Llm {
            provider,
            model,
            prompt,
        } => {
            require(provider.is_some(), "provider");
            require(model.is_some(), "model");
            require(!prompt.is_empty(), "prompt");
        }
        StepKind::Http { url, .. } => require(!url.is_empty(), "url"),
        StepKind::Function { name, .. } => require(!name.is_empty(), "name"),
        StepKind::Vision { prompt, .. } => require(!prompt.is_empty(), "prompt"),
        StepKind::Audio { .. } => {}
        StepKind::VectorDb {
            operation,
            collection,
            ..
        } => {
            require(!operation.is_empty(), "operation");
            require(!collection.is_empty(), "collection");
        }
        StepKind::Finetune { dataset, .. } => require(!dataset.is_empty(), "dataset"),
    }
}

// ---------------------------------------------------------------------------
// Cross-reference checks
// ---------------------------------------------------------------------------

fn check_references(def: &AgentDef, vr: &mut ValidationResult) {
    let vars: HashSet<&str> = def.vars.iter().map(|v| v.name.as_str()).collect();
    let secrets: HashSet<&str> = def.secrets.iter().map(|s| s.name.as_str()).collect();
    let all_saves: HashSet<&str> = def
        .steps
        .iter()
        .filter_map(|s| s.save.as_deref())
        .collect();

    let mut bound: HashSet<&str> = HashSet::new();
    let mut used: HashSet<String> = HashSet::new();

    for step in &def.steps {
        for (field, text) in step.template_fields() {
            for ph in placeholders(text) {
                let root = ph.root();
                used.insert(root.to_string());
                if root == "input" || vars.contains(root) || secrets.contains(root) {
                    continue;
                }
                if bound.contains(root) {
                    continue;
                }
                let location = format!("steps.{}.{field}", step.id);
                if all_saves.contains(root) {
                    vr.error(
                        Diagnostic::new(format!(
                            "step '{}' references '{{{root}}}' before it is saved",
                            step.id
                        ))
                        .at_field(location)
                        .suggest("reorder the steps so the saving step runs first"),
                    );
                } else {
                    vr.error(
                        Diagnostic::new(format!(
                            "step '{}' references unknown '{{{root}}}'",
                            step.id
                        ))
                        .at_field(location)
                        .suggest("declare it as a var or secret, or save it in an earlier step"),
                    );
                }
            }
        }
        if let Some(save) = step.save.as_deref() {
            bound.insert(save);
        }
    }

    // Output templates render after every step has run, so all saves count.
    for output in &def.outputs {
        for ph in placeholders(&output.template) {
            let root = ph.root();
            used.insert(root.to_string());
            if root == "input"
                || vars.contains(root)
                || secrets.contains(root)
                || all_saves.contains(root)
            {
                continue;
            }
            vr.error(
                Diagnostic::new(format!(
                    "output '{}' references unknown '{{{root}}}'",
                    output.name
                ))
                .at_field(format!("outputs.{}", output.name))
                .suggest("declare it as a var or secret, or save it in a step"),
            );
        }
    }

    for step in &def.steps {
        if let Some(save) = step.save.as_deref() {
            if !used.contains(save) {
                vr.warning(
                    Diagnostic::new(format!(
                        "step '{}' saves '{save}' but nothing references it",
                        step.id
                    ))
                    .at_field(format!("steps.{}.save", step.id)),
                );
            }
        }
    }
    for var in &def.vars {
        if !used.contains(&var.name) {
            vr.warning(
                Diagnostic::new(format!("var '{}' is never referenced", var.name))
                    .at_field(format!("vars.{}", var.name)),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn validate_src(source: &str) -> ValidationResult {
        let result = parser::parse(source);
        assert!(
            result.validation.valid(),
            "parse errors: {:?}",
            result.validation.errors
        );
        validate(&result.def)
    }

    const HELLO: &str = "@agent hi v1\n\
                         trigger http POST /hi\n\
                         var m = input.message\n\
                         step s:\n  \
                           kind llm\n  \
                           provider openai\n  \
                           model gpt-4o\n  \
                           prompt \"\"\"Hello {m}\"\"\"\n  \
                           save r\n\
                         output result = {r}\n\
                         @end\n";

    #[test]
    fn hello_agent_is_valid() {
        let vr = validate_src(HELLO);
        assert!(vr.valid(), "unexpected errors: {:?}", vr.errors);
        assert!(vr.warnings.is_empty(), "unexpected warnings: {:?}", vr.warnings);
    }

    #[test]
    fn missing_trigger_references_the_field() {
        let src = "@agent a v1\n\
                   step s:\n  \
                     kind function\n  \
                     name now\n\
                   @end\n";
        let vr = validate_src(src);
        assert!(!vr.valid());
        let err = vr
            .errors
            .iter()
            .find(|e| e.message.contains("trigger"))
            .unwrap();
        assert_eq!(format!("{}", err.location.as_ref().unwrap()), "trigger");
    }

    #[test]
    fn duplicate_step_ids_are_errors() {
        let src = "@agent a v1\ntrigger manual\n\
                   step s:\n  kind function\n  name now\n\
                   step s:\n  kind function\n  name now\n\
                   @end\n";
        let vr = validate_src(src);
        assert!(vr.errors.iter().any(|e| e.message.contains("duplicate step id 's'")));
    }

    #[test]
    fn forward_reference_to_a_later_save_is_an_error() {
        let src = "@agent a v1\ntrigger manual\n\
                   step first:\n  \
                     kind llm\n  provider openai\n  model gpt-4o\n  \
                     prompt \"\"\"use {later}\"\"\"\n\
                   step second:\n  \
                     kind function\n  name now\n  save later\n\
                   output result = {later}\n\
                   @end\n";
        let vr = validate_src(src);
        assert!(!vr.valid());
        assert!(
            vr.errors
                .iter()
                .any(|e| e.message.contains("before it is saved"))
        );
    }

    #[test]
    fn unknown_placeholder_is_an_error() {
        let src = "@agent a v1\ntrigger manual\n\
                   step s:\n  \
                     kind llm\n  provider openai\n  model gpt-4o\n  \
                     prompt \"\"\"hi {nobody}\"\"\"\n  save r\n\
                   output result = {r}\n\
                   @end\n";
        let vr = validate_src(src);
        assert!(
            vr.errors
                .iter()
                .any(|e| e.message.contains("unknown '{nobody}'"))
        );
    }

    #[test]
    fn unused_save_and_var_warn() {
        let src = "@agent a v1\ntrigger manual\n\
                   var ghost = input.ghost\n\
                   step s:\n  \
                     kind function\n  name now\n  save unused\n\
                   @end\n";
        let vr = validate_src(src);
        assert!(vr.valid());
        assert!(vr.warnings.iter().any(|w| w.message.contains("saves 'unused'")));
        assert!(vr.warnings.iter().any(|w| w.message.contains("var 'ghost'")));
    }

    #[test]
    fn llm_step_requires_provider_model_prompt() {
        let src = "@agent a v1\ntrigger manual\n\
                   step s:\n  kind llm\n  save r\n\
                   output result = {r}\n\
                   @end\n";
        let vr = validate_src(src);
        let fields: Vec<String> = vr
            .errors
            .iter()
            .filter_map(|e| e.location.as_ref().map(|l| format!("{l}")))
            .collect();
        assert!(fields.contains(&"steps.s.provider".to_string()));
        assert!(fields.contains(&"steps.s.model".to_string()));
        assert!(fields.contains(&"steps.s.prompt".to_string()));
    }

    #[test]
    fn input_prefixed_paths_always_resolve() {
        let src = "@agent a v1\ntrigger manual\n\
                   step s:\n  \
                     kind llm\n  provider openai\n  model gpt-4o\n  \
                     prompt \"\"\"hi {input.user.name}\"\"\"\n  save r\n\
                   output result = {r}\n\
                   @end\n";
        let vr = validate_src(src);
        assert!(vr.valid(), "unexpected errors: {:?}", vr.errors);
    }

    #[test]
    fn empty_steps_warn() {
        let src = "@agent a v1\ntrigger manual\n@end\n";
        let vr = validate_src(src);
        assert!(vr.valid());
        assert!(vr.warnings.iter().any(|w| w.message.contains("no steps")));
    }
}
