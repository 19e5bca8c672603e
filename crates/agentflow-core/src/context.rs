//! Per-execution state and template rendering.
//!
//! An `ExecutionContext` is created fresh for one orchestrator invocation,
//! mutated as variables resolve and steps save results, and discarded with
//! the run. Rendering substitutes `{name}` / `{name.path}` placeholders by
//! looking up, in order: saved step state, resolved variables, secrets,
//! then the raw caller input. Unresolved references are left literal so
//! partial templates stay debuggable.

use std::collections::HashMap;

use agentflow_types::template::placeholders;
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ExecutionContext
// ---------------------------------------------------------------------------

/// Mutable state for one execution.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub run_id: Uuid,
    pub agent_id: String,
    /// Caller-supplied structured input.
    pub input: Value,
    /// Resolved variable values, keyed by declared name.
    pub vars: HashMap<String, Value>,
    /// Step results, keyed by each step's `save` name.
    pub state: HashMap<String, Value>,
    /// Resolved secret values.
    pub secrets: HashMap<String, String>,
}

impl ExecutionContext {
    pub fn new(agent_id: impl Into<String>, run_id: Uuid, input: Value) -> Self {
        Self {
            run_id,
            agent_id: agent_id.into(),
            input,
            vars: HashMap::new(),
            state: HashMap::new(),
            secrets: HashMap::new(),
        }
    }

    /// Substitute every resolvable placeholder in `template`. Never fails:
    /// unknown references stay as written.
    pub fn render(&self, template: &str) -> String {
        let found = placeholders(template);
        if found.is_empty() {
            return template.to_string();
        }
        let mut out = String::with_capacity(template.len());
        let mut cursor = 0;
        for ph in found {
            out.push_str(&template[cursor..ph.start]);
            match self.resolve(&ph.path) {
                Some(value) => out.push_str(&render_value(&value)),
                None => out.push_str(&template[ph.start..ph.end]),
            }
            cursor = ph.end;
        }
        out.push_str(&template[cursor..]);
        out
    }

    /// Look up a dotted reference. First match wins across state, vars,
    /// secrets, and the raw input.
    fn resolve(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let root = segments.next()?;
        let rest: Vec<&str> = segments.collect();

        if root == "input" {
            return descend(&self.input, &rest).cloned();
        }
        if let Some(value) = self.state.get(root) {
            return descend(value, &rest).cloned();
        }
        if let Some(value) = self.vars.get(root) {
            return descend(value, &rest).cloned();
        }
        if let Some(secret) = self.secrets.get(root) {
            if rest.is_empty() {
                return Some(Value::String(secret.clone()));
            }
            return None;
        }
        // Bare top-level input keys resolve too: `{message}` against
        // input {"message": ...}.
        descend(&self.input, &std::iter::once(root).chain(rest).collect::<Vec<_>>()).cloned()
    }
}

/// Walk object fields by segment. A non-object mid-path ends the lookup.
fn descend<'a>(value: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for segment in segments {
        current = current.as_object()?.get(*segment)?;
    }
    Some(current)
}

/// Scalars render bare, arrays/objects as compact JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Truthiness of a rendered `when` clause: empty string, "false" and "0"
/// are falsy, everything else is truthy.
pub fn is_falsy(rendered: &str) -> bool {
    matches!(rendered.trim(), "" | "false" | "0")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ctx(input: Value) -> ExecutionContext {
        ExecutionContext::new("test", Uuid::now_v7(), input)
    }

    #[test]
    fn state_wins_over_vars_and_input() {
        let mut ctx = ctx(json!({"x": "from-input"}));
        ctx.vars.insert("x".into(), json!("from-vars"));
        ctx.state.insert("x".into(), json!("from-state"));
        assert_eq!(ctx.render("{x}"), "from-state");
    }

    #[test]
    fn dotted_input_paths_resolve() {
        let ctx = ctx(json!({"user": {"name": "ada"}}));
        assert_eq!(ctx.render("hi {input.user.name}"), "hi ada");
        assert_eq!(ctx.render("hi {user.name}"), "hi ada");
    }

    #[test]
    fn unresolved_placeholders_stay_literal() {
        let ctx = ctx(json!({}));
        assert_eq!(ctx.render("hi {nobody.here}"), "hi {nobody.here}");
    }

    #[test]
    fn json_braces_are_not_placeholders() {
        let mut ctx = ctx(json!({}));
        ctx.vars.insert("city".into(), json!("paris"));
        assert_eq!(
            ctx.render(r#"{"city": "{city}", "n": 1}"#),
            r#"{"city": "paris", "n": 1}"#
        );
    }

    #[test]
    fn objects_render_as_compact_json() {
        let mut ctx = ctx(json!({}));
        ctx.state.insert("r".into(), json!({"a": 1}));
        assert_eq!(ctx.render("{r}"), r#"{"a":1}"#);
    }

    #[test]
    fn secrets_resolve_after_vars() {
        let mut ctx = ctx(json!({}));
        ctx.secrets.insert("KEY".into(), "sk-123".into());
        assert_eq!(ctx.render("Bearer {KEY}"), "Bearer sk-123");
    }

    #[test]
    fn falsy_values() {
        assert!(is_falsy(""));
        assert!(is_falsy("false"));
        assert!(is_falsy("0"));
        assert!(is_falsy("  0  "));
        assert!(!is_falsy("true"));
        assert!(!is_falsy("no"));
    }
}
