//! AST-to-source rendering in the terse dialect.
//!
//! `serialize` produces text the terse parser accepts back into an equal
//! definition, which is what the corrector hands users after applying
//! fixes. Free-text fields (prompts, bodies, payloads) are rendered as
//! `"""` blocks so embedded braces and quotes survive the trip.

use std::fmt::Write;

use agentflow_types::ast::{AgentDef, SecretSource, Step, StepKind, VarSource};

/// Render a definition as terse-dialect source text.
pub fn serialize(def: &AgentDef) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "@agent {} v{}", def.id, def.version);
    if let Some(description) = &def.description {
        // The terse dialect keeps descriptions on one line.
        let _ = writeln!(out, "description {}", description.replace('\n', " "));
    }
    if !def.trigger.is_missing() {
        let _ = write!(out, "trigger {}", def.trigger.trigger_type);
        if let Some(method) = &def.trigger.method {
            let _ = write!(out, " {method}");
        }
        if let Some(path) = &def.trigger.path {
            let _ = write!(out, " {path}");
        }
        out.push('\n');
    }
    for secret in &def.secrets {
        match &secret.source {
            SecretSource::Env { var } => {
                let _ = writeln!(out, "secret {}=env:{var}", secret.name);
            }
            SecretSource::Literal { value } => {
                let _ = writeln!(out, "secret {}={value}", secret.name);
            }
        }
    }
    for var in &def.vars {
        let source = match &var.source {
            VarSource::Input { path } if path.is_empty() => "input".to_string(),
            VarSource::Input { path } => format!("input.{path}"),
            VarSource::Env { name } => format!("env.{name}"),
            VarSource::Literal { value } => format!("\"{value}\""),
        };
        let _ = writeln!(out, "var {} = {source}", var.name);
    }
    for step in &def.steps {
        write_step(&mut out, step);
    }
    for output in &def.outputs {
        let _ = writeln!(out, "output {} = {}", output.name, output.template);
    }
    out.push_str("@end\n");
    out
}

fn write_step(out: &mut String, step: &Step) {
    let _ = writeln!(out, "step {}:", step.id);
    let _ = writeln!(out, "  kind {}", step.kind.name());
    match &step.kind {
        StepKind::Llm {
            provider,
            model,
            prompt,
        } => {
            write_opt(out, "provider", provider.as_deref());
            write_opt(out, "model", model.as_deref());
            write_text(out, "prompt", prompt);
        }
        StepKind::Http {
            url,
            method,
            headers,
            body,
        } => {
            let _ = writeln!(out, "  url {url}");
            write_opt(out, "method", method.as_deref());
            for (name, value) in headers {
                let _ = writeln!(out, "  header {name}: {value}");
            }
            if let Some(body) = body {
                write_text(out, "body", body);
            }
        }
        StepKind::Function { name, args } => {
            let _ = writeln!(out, "  name {name}");
            for arg in args {
                let _ = writeln!(out, "  arg {arg}");
            }
        }
        StepKind::Vision {
            provider,
            model,
            prompt,
            image,
        } => {
            write_opt(out, "provider", provider.as_deref());
            write_opt(out, "model", model.as_deref());
            write_text(out, "prompt", prompt);
            write_opt(out, "image", image.as_deref());
        }
        StepKind::Audio {
            provider,
            model,
            prompt,
            source,
        } => {
            write_opt(out, "provider", provider.as_deref());
            write_opt(out, "model", model.as_deref());
            if let Some(prompt) = prompt {
                write_text(out, "prompt", prompt);
            }
            write_opt(out, "source", source.as_deref());
        }
        StepKind::VectorDb {
            operation,
            backend,
            collection,
            payload,
        } => {
            let _ = writeln!(out, "  operation {operation}");
            write_opt(out, "backend", backend.as_deref());
            let _ = writeln!(out, "  collection {collection}");
            if let Some(payload) = payload {
                write_text(out, "payload", payload);
            }
        }
        StepKind::Finetune {
            provider,
            model,
            dataset,
        } => {
            write_opt(out, "provider", provider.as_deref());
            write_opt(out, "model", model.as_deref());
            let _ = writeln!(out, "  dataset {dataset}");
        }
    }
    if let Some(when) = &step.when {
        let _ = writeln!(out, "  when {when}");
    }
    if let Some(save) = &step.save {
        let _ = writeln!(out, "  save {save}");
    }
    if let Some(retries) = step.retries {
        let _ = writeln!(out, "  retries {retries}");
    }
    if let Some(timeout) = step.timeout_ms {
        let _ = writeln!(out, "  timeout {timeout}");
    }
}

fn write_opt(out: &mut String, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        let _ = writeln!(out, "  {key} {value}");
    }
}

/// Free text goes into a `"""` block: inline for one line, fenced with the
/// property's indentation otherwise.
fn write_text(out: &mut String, key: &str, text: &str) {
    if text.contains('\n') {
        let _ = writeln!(out, "  {key} \"\"\"");
        for line in text.lines() {
            let _ = writeln!(out, "  {line}");
        }
        out.push_str("  \"\"\"\n");
    } else {
        let _ = writeln!(out, "  {key} \"\"\"{text}\"\"\"");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corrector::correct;
    use crate::parser;

    fn parse_def(source: &str) -> AgentDef {
        let result = parser::parse(source);
        assert!(result.validation.valid(), "{:?}", result.validation.errors);
        result.def
    }

    #[test]
    fn round_trips_the_hello_agent() {
        let def = parse_def(
            "@agent hi v1\ntrigger http POST /hi\n\
             var m = input.message\n\
             step s:\n  kind llm\n  provider openai\n  model gpt-4o\n  \
             prompt \"\"\"Hello {m}\"\"\"\n  save r\n\
             output result = {r}\n\
             @end\n",
        );
        let reparsed = parse_def(&serialize(&def));
        assert_eq!(def, reparsed);
    }

    #[test]
    fn round_trips_corrected_definitions() {
        let def = parse_def(
            "@agent a v2\ntrigger http POST /go\n\
             secret KEY=env:API_KEY\n\
             var city = input.city\n\
             step fetch:\n  kind http\n  url https://example.com/api\n  \
             body \"\"\"{\"city\": \"{city}\"}\"\"\"\n  save data\n\
             step summarize:\n  kind llm\n  model gpt-4o\n  \
             prompt \"\"\"Summarize {data}\"\"\"\n  save summary\n\
             output result = {summary}\n\
             @end\n",
        );
        let corrected = correct(&def).def;
        let reparsed = parse_def(&serialize(&corrected));
        assert_eq!(corrected, reparsed);
    }

    #[test]
    fn multi_line_prompts_survive() {
        let def = parse_def(
            "@agent a v1\ntrigger manual\n\
             step s:\n  kind llm\n  provider openai\n  model gpt-4o\n  \
             prompt \"\"\"\n  First line\n  Second line\n  \"\"\"\n  save r\n\
             output result = {r}\n\
             @end\n",
        );
        let reparsed = parse_def(&serialize(&def));
        assert_eq!(def, reparsed);
        match &reparsed.steps[0].kind {
            StepKind::Llm { prompt, .. } => {
                assert_eq!(prompt, "First line\nSecond line");
            }
            other => panic!("wrong kind: {other:?}"),
        }
    }

    #[test]
    fn conditionals_and_function_args_survive() {
        let def = parse_def(
            "@agent a v1\ntrigger manual\n\
             var flag = input.flag\n\
             step s:\n  kind function\n  name add\n  arg {flag}\n  arg 2\n  \
             when {flag}\n  save sum\n\
             output result = {sum}\n\
             @end\n",
        );
        let reparsed = parse_def(&serialize(&def));
        assert_eq!(def, reparsed);
    }
}
