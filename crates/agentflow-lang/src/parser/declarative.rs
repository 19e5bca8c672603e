//! Block-structured declarative dialect.
//!
//! Sections are introduced by a keyword and colon (`trigger:`, `secrets:`,
//! `vars:`, `steps:`, `outputs:`) with two-space indented properties. A `|`
//! pipe value collects the following deeper-indented lines into one
//! multi-line string until the indentation drops back.
//!
//! The parser works directly on raw source lines: line structure comes
//! from indentation, and values keep their exact spelling, so prose in
//! descriptions, prompts, and pipe blocks passes through untouched.

use agentflow_types::ast::{AgentDef, OutputDecl, SecretDecl, SecretSource, Trigger, VarDecl};
use agentflow_types::diagnostic::{Diagnostic, ValidationResult};

use super::common::{StepProps, is_bare_ident, parse_var_source, unquote};

/// Parse declarative-dialect source into a definition plus diagnostics.
///
/// Error recovery: a malformed line or unknown section records a diagnostic
/// and skips to the next line at the same or shallower indentation.
pub fn parse(source: &str) -> (AgentDef, ValidationResult) {
    let parser = DeclParser::new(source);
    parser.run()
}

// ---------------------------------------------------------------------------
// Line model
// ---------------------------------------------------------------------------

/// One significant source line: blank and comment-only lines are skipped
/// during line collection.
#[derive(Clone, Copy)]
struct Line<'a> {
    number: u32,
    indent: usize,
    raw: &'a str,
}

impl<'a> Line<'a> {
    /// Split `key: value` at the first colon. Returns `None` for lines
    /// without one.
    fn key_value(&self) -> Option<(&'a str, &'a str)> {
        let (key, value) = self.raw.trim().split_once(':')?;
        Some((key.trim(), value.trim()))
    }
}

// ---------------------------------------------------------------------------
// DeclParser
// ---------------------------------------------------------------------------

struct DeclParser<'a> {
    src_lines: Vec<&'a str>,
    lines: Vec<Line<'a>>,
    pos: usize,
    def: AgentDef,
    vr: ValidationResult,
}

impl<'a> DeclParser<'a> {
    fn new(source: &'a str) -> Self {
        let src_lines: Vec<&str> = source.lines().collect();
        let mut lines: Vec<Line<'a>> = Vec::new();
        for (index, raw) in src_lines.iter().copied().enumerate() {
            let trimmed = raw.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            lines.push(Line {
                number: index as u32 + 1,
                indent: raw.chars().take_while(|c| c.is_whitespace()).count(),
                raw,
            });
        }
        Self {
            src_lines,
            lines,
            pos: 0,
            def: super::empty_def(),
            vr: ValidationResult::new(),
        }
    }

    fn run(mut self) -> (AgentDef, ValidationResult) {
        while self.pos < self.lines.len() {
            let line = self.lines[self.pos];
            if line.indent != 0 {
                self.vr.error(
                    Diagnostic::new("unexpected indented line outside a section")
                        .at(line.number, line.indent as u32 + 1)
                        .suggest("indented lines belong under a section header"),
                );
                self.pos += 1;
                continue;
            }
            let Some((key, value)) = line.key_value() else {
                self.vr.error(
                    Diagnostic::new(format!("expected 'key:' but found '{}'", line.raw.trim()))
                        .at(line.number, 1)
                        .suggest("declarative lines take the form 'key: value'"),
                );
                self.pos += 1;
                continue;
            };
            let number = line.number;
            let value = value.to_string();
            match key {
                "agent" | "id" => {
                    self.def.id = unquote(&value).to_string();
                    self.pos += 1;
                }
                "version" => {
                    self.parse_version(&value, number);
                    self.pos += 1;
                }
                "description" => self.parse_description(&value),
                "trigger" => self.parse_trigger(&value, number),
                "secrets" | "secret" => self.parse_secrets(),
                "vars" | "variables" | "var" => self.parse_vars(),
                "steps" | "step" => self.parse_steps(),
                "outputs" | "output" => self.parse_outputs(),
                other => {
                    self.vr.error(
                        Diagnostic::new(format!("unknown section '{other}'"))
                            .at(number, 1)
                            .suggest(
                                "known sections: agent, version, description, trigger, \
                                 secrets, vars, steps, outputs",
                            ),
                    );
                    self.pos += 1;
                    self.skip_deeper(0);
                }
            }
        }
        (self.def, self.vr)
    }

    // -- sections ----------------------------------------------------------

    fn parse_version(&mut self, value: &str, number: u32) {
        let digits = value.strip_prefix('v').unwrap_or(value);
        match digits.parse::<u32>() {
            Ok(v) => self.def.version = v,
            Err(_) => self.vr.error(
                Diagnostic::new(format!("invalid version '{value}'"))
                    .at(number, 1)
                    .suggest("use a positive integer, e.g. 'version: 1'"),
            ),
        }
    }

    fn parse_description(&mut self, value: &str) {
        self.pos += 1;
        let text = if value == "|" {
            self.collect_block(0)
        } else {
            unquote(value).to_string()
        };
        if !text.is_empty() {
            self.def.description = Some(text);
        }
    }

    /// Either inline (`trigger: http POST /hi`) or a nested block with
    /// `type:` / `method:` / `path:` keys.
    fn parse_trigger(&mut self, value: &str, number: u32) {
        self.pos += 1;
        if !value.is_empty() {
            let mut parts = value.split_whitespace();
            let trigger_type = parts.next().unwrap_or_default().to_string();
            self.def.trigger = Trigger {
                trigger_type,
                method: parts.next().map(str::to_string),
                path: parts.next().map(str::to_string),
            };
            return;
        }
        let mut trigger = Trigger::missing();
        while let Some(line) = self.peek_deeper(0) {
            let number = line.number;
            let indent = line.indent as u32 + 1;
            match line.key_value() {
                Some(("type", v)) => trigger.trigger_type = v.to_string(),
                Some(("method", v)) => trigger.method = Some(v.to_string()),
                Some(("path", v)) => trigger.path = Some(v.to_string()),
                Some((other, _)) => self.vr.error(
                    Diagnostic::new(format!("unknown trigger property '{other}'"))
                        .at(number, indent)
                        .suggest("trigger properties: type, method, path"),
                ),
                None => self.vr.error(
                    Diagnostic::new("expected 'key: value' inside trigger").at(number, indent),
                ),
            }
            self.pos += 1;
        }
        if trigger.is_missing() {
            self.vr.error(
                Diagnostic::new("trigger block is missing 'type'")
                    .at(number, 1)
                    .suggest("add 'type: http' (or cron, manual)"),
            );
        }
        self.def.trigger = trigger;
    }

    /// Entries like `API_KEY: env:OPENAI_API_KEY` or `TOKEN: literal-value`.
    fn parse_secrets(&mut self) {
        self.pos += 1;
        while let Some(line) = self.peek_deeper(0) {
            let number = line.number;
            let indent = line.indent as u32 + 1;
            match line.key_value() {
                Some((name, value)) => {
                    let source = match value.strip_prefix("env:") {
                        Some(var) => SecretSource::Env {
                            var: var.trim().to_string(),
                        },
                        None => SecretSource::Literal {
                            value: unquote(value).to_string(),
                        },
                    };
                    self.def.secrets.push(SecretDecl {
                        name: name.to_string(),
                        source,
                    });
                }
                None => self.vr.error(
                    Diagnostic::new("expected 'NAME: env:VAR' inside secrets")
                        .at(number, indent)
                        .suggest("e.g. 'API_KEY: env:OPENAI_API_KEY'"),
                ),
            }
            self.pos += 1;
        }
    }

    /// Inline entries (`m: input.message`) or nested blocks with `source:`,
    /// `required:` and `default:` keys.
    fn parse_vars(&mut self) {
        self.pos += 1;
        while let Some(line) = self.peek_deeper(0) {
            let entry_indent = line.indent;
            let number = line.number;
            let Some((name, value)) = line.key_value() else {
                self.vr.error(
                    Diagnostic::new("expected 'name: source' inside vars")
                        .at(number, entry_indent as u32 + 1)
                        .suggest("e.g. 'message: input.message'"),
                );
                self.pos += 1;
                continue;
            };
            let name = name.to_string();
            let value = value.to_string();
            self.pos += 1;
            if !value.is_empty() {
                self.def.vars.push(VarDecl {
                    name,
                    source: parse_var_source(&value),
                    required: true,
                    default: None,
                });
                continue;
            }
            let mut source = None;
            let mut required = None;
            let mut default = None;
            while let Some(prop) = self.peek_deeper(entry_indent) {
                let number = prop.number;
                let indent = prop.indent as u32 + 1;
                match prop.key_value() {
                    Some(("source", v)) => source = Some(parse_var_source(v)),
                    Some(("required", v)) => required = Some(v == "true"),
                    Some(("default", v)) => default = Some(unquote(v).to_string()),
                    Some((other, _)) => self.vr.error(
                        Diagnostic::new(format!("unknown var property '{other}'"))
                            .at(number, indent)
                            .suggest("var properties: source, required, default"),
                    ),
                    None => self.vr.error(
                        Diagnostic::new("expected 'key: value' inside var block")
                            .at(number, indent),
                    ),
                }
                self.pos += 1;
            }
            let Some(source) = source else {
                self.vr.error(
                    Diagnostic::new(format!("var '{name}' is missing 'source'"))
                        .at(number, entry_indent as u32 + 1)
                        .suggest("add 'source: input.<path>', 'source: env.<NAME>' or a literal"),
                );
                continue;
            };
            let required = required.unwrap_or(default.is_none());
            self.def.vars.push(VarDecl {
                name,
                source,
                required,
                default,
            });
        }
    }

    fn parse_steps(&mut self) {
        self.pos += 1;
        while let Some(line) = self.peek_deeper(0) {
            let entry_indent = line.indent;
            let number = line.number;
            let column = entry_indent as u32 + 1;
            let id = match line.key_value() {
                Some((id, "")) if is_bare_ident(id) => id.to_string(),
                _ => {
                    self.vr.error(
                        Diagnostic::new(format!(
                            "expected a step id followed by ':' but found '{}'",
                            line.raw.trim()
                        ))
                        .at(number, column)
                        .suggest("step entries take the form 'id:' with indented properties"),
                    );
                    self.pos += 1;
                    self.skip_deeper(entry_indent);
                    continue;
                }
            };
            self.pos += 1;
            let props = self.parse_step_props(entry_indent);
            if let Some(step) = props.into_step(id, &mut self.vr, number) {
                self.def.steps.push(step);
            }
        }
    }

    fn parse_step_props(&mut self, entry_indent: usize) -> StepProps {
        let mut props = StepProps::default();
        while let Some(line) = self.peek_deeper(entry_indent) {
            let prop_indent = line.indent;
            let number = line.number;
            let column = prop_indent as u32 + 1;
            let Some((key, value)) = line.key_value() else {
                self.vr.error(
                    Diagnostic::new("expected 'key: value' inside step")
                        .at(number, column)
                        .suggest("step properties take the form 'key: value'"),
                );
                self.pos += 1;
                continue;
            };
            let key = key.to_string();
            let value = value.to_string();
            self.pos += 1;
            match key.as_str() {
                "kind" => props.kind = Some((value, number)),
                "provider" => props.provider = Some(value),
                "model" => props.model = Some(value),
                "prompt" => props.prompt = Some(self.text_value(&value, prop_indent)),
                "url" => props.url = Some(value),
                "method" => props.method = Some(value),
                "body" => props.body = Some(self.text_value(&value, prop_indent)),
                "when" => props.when = Some(unquote(&value).to_string()),
                "save" => props.save = Some(value),
                "retries" => match value.parse::<u32>() {
                    Ok(n) => props.retries = Some(n),
                    Err(_) => self.vr.error(
                        Diagnostic::new(format!("invalid retries value '{value}'"))
                            .at(number, column)
                            .suggest("retries takes a non-negative integer"),
                    ),
                },
                "timeout" => match value.parse::<u64>() {
                    Ok(ms) if ms > 0 => props.timeout_ms = Some(ms),
                    _ => self.vr.error(
                        Diagnostic::new(format!("invalid timeout value '{value}'"))
                            .at(number, column)
                            .suggest("timeout takes a positive integer of milliseconds"),
                    ),
                },
                "headers" => self.parse_headers(&mut props, &value, number, prop_indent),
                "name" => props.function_name = Some(value),
                "args" => {
                    props.args = value
                        .split(',')
                        .map(|a| unquote(a.trim()).to_string())
                        .filter(|a| !a.is_empty())
                        .collect();
                }
                "image" => props.image = Some(value),
                "source" => props.source = Some(value),
                "operation" => props.operation = Some(value),
                "backend" => props.backend = Some(value),
                "collection" => props.collection = Some(value),
                "payload" => props.payload = Some(self.text_value(&value, prop_indent)),
                "dataset" => props.dataset = Some(value),
                other => self.vr.error(
                    Diagnostic::new(format!("unknown step property '{other}'"))
                        .at(number, column)
                        .suggest(
                            "step properties: kind, provider, model, prompt, url, method, \
                             headers, body, when, save, retries, timeout, name, args, image, \
                             source, operation, backend, collection, payload, dataset",
                        ),
                ),
            }
        }
        props
    }

    fn parse_headers(&mut self, props: &mut StepProps, value: &str, number: u32, indent: usize) {
        if !value.is_empty() {
            self.vr.error(
                Diagnostic::new("headers takes a nested block, not an inline value")
                    .at(number, indent as u32 + 1)
                    .suggest("write 'headers:' with 'Name: value' lines indented below"),
            );
            return;
        }
        while let Some(line) = self.peek_deeper(indent) {
            match line.key_value() {
                Some((name, v)) => {
                    props.headers.insert(name.to_string(), v.to_string());
                }
                None => self.vr.error(
                    Diagnostic::new("expected 'Name: value' inside headers")
                        .at(line.number, line.indent as u32 + 1),
                ),
            }
            self.pos += 1;
        }
    }

    fn parse_outputs(&mut self) {
        self.pos += 1;
        while let Some(line) = self.peek_deeper(0) {
            let entry_indent = line.indent;
            let number = line.number;
            match line.key_value() {
                Some((name, value)) => {
                    let name = name.to_string();
                    let value = value.to_string();
                    self.pos += 1;
                    let template = self.text_value(&value, entry_indent);
                    self.def.outputs.push(OutputDecl { name, template });
                }
                None => {
                    self.vr.error(
                        Diagnostic::new("expected 'name: template' inside outputs")
                            .at(number, entry_indent as u32 + 1)
                            .suggest("e.g. 'result: \"{r}\"'"),
                    );
                    self.pos += 1;
                }
            }
        }
    }

    // -- plumbing ----------------------------------------------------------

    /// The next line if it is indented deeper than `indent`.
    fn peek_deeper(&self, indent: usize) -> Option<Line<'a>> {
        self.lines.get(self.pos).filter(|l| l.indent > indent).copied()
    }

    fn skip_deeper(&mut self, indent: usize) {
        while self.peek_deeper(indent).is_some() {
            self.pos += 1;
        }
    }

    /// An inline value, or a `|` pipe block collected from the lines below.
    fn text_value(&mut self, value: &str, indent: usize) -> String {
        if value == "|" {
            self.collect_block(indent)
        } else {
            unquote(value).to_string()
        }
    }

    /// Collect the raw source lines indented deeper than `indent` into one
    /// string, dedented by the first content line's indentation. Blank
    /// lines inside the block are preserved.
    fn collect_block(&mut self, indent: usize) -> String {
        let Some(first) = self.peek_deeper(indent) else {
            return String::new();
        };
        let (first_number, block_indent) = (first.number, first.indent);
        let mut last_number = first_number;
        while let Some(line) = self.peek_deeper(indent) {
            last_number = line.number;
            self.pos += 1;
        }
        self.src_lines[first_number as usize - 1..last_number as usize]
            .iter()
            .map(|raw| super::common::dedent(raw, block_indent))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use agentflow_types::ast::{StepKind, VarSource};

    use super::*;

    fn parse_src(source: &str) -> (AgentDef, ValidationResult) {
        parse(source)
    }

    const HELLO: &str = "\
agent: hi
version: 1
description: Greets the caller
trigger: http POST /hi
vars:
  m: input.message
steps:
  s:
    kind: llm
    provider: openai
    model: gpt-4o
    prompt: |
      Hello {m}
    save: r
outputs:
  result: \"{r}\"
";

    #[test]
    fn parses_a_full_agent() {
        let (def, vr) = parse_src(HELLO);
        assert!(vr.valid(), "unexpected errors: {:?}", vr.errors);
        assert_eq!(def.id, "hi");
        assert_eq!(def.version, 1);
        assert_eq!(def.description.as_deref(), Some("Greets the caller"));
        assert_eq!(def.trigger.trigger_type, "http");
        assert_eq!(def.trigger.method.as_deref(), Some("POST"));
        assert_eq!(def.trigger.path.as_deref(), Some("/hi"));
        assert_eq!(def.vars.len(), 1);
        assert_eq!(def.steps.len(), 1);
        let step = &def.steps[0];
        assert_eq!(step.id, "s");
        assert_eq!(step.save.as_deref(), Some("r"));
        match &step.kind {
            StepKind::Llm {
                provider,
                model,
                prompt,
            } => {
                assert_eq!(provider.as_deref(), Some("openai"));
                assert_eq!(model.as_deref(), Some("gpt-4o"));
                assert_eq!(prompt, "Hello {m}");
            }
            other => panic!("wrong kind: {other:?}"),
        }
        assert_eq!(def.outputs.len(), 1);
        assert_eq!(def.outputs[0].name, "result");
        assert_eq!(def.outputs[0].template, "{r}");
    }

    #[test]
    fn nested_trigger_block() {
        let src = "\
agent: a
trigger:
  type: http
  method: GET
  path: /status
steps:
  s:
    kind: function
    name: now
";
        let (def, vr) = parse_src(src);
        assert!(vr.valid(), "unexpected errors: {:?}", vr.errors);
        assert_eq!(def.trigger.trigger_type, "http");
        assert_eq!(def.trigger.method.as_deref(), Some("GET"));
        assert_eq!(def.trigger.path.as_deref(), Some("/status"));
    }

    #[test]
    fn nested_var_with_default_is_optional() {
        let src = "\
agent: a
trigger: manual
vars:
  greeting:
    source: input.greeting
    default: hello
steps:
  s:
    kind: function
    name: now
";
        let (def, vr) = parse_src(src);
        assert!(vr.valid(), "unexpected errors: {:?}", vr.errors);
        let var = &def.vars[0];
        assert!(!var.required);
        assert_eq!(var.default.as_deref(), Some("hello"));
        assert_eq!(
            var.source,
            VarSource::Input {
                path: "greeting".to_string()
            }
        );
    }

    #[test]
    fn secrets_env_and_literal() {
        let src = "\
agent: a
trigger: manual
secrets:
  API_KEY: env:OPENAI_API_KEY
  TOKEN: abc123
steps:
  s:
    kind: function
    name: now
";
        let (def, vr) = parse_src(src);
        assert!(vr.valid(), "unexpected errors: {:?}", vr.errors);
        assert_eq!(
            def.secrets[0].source,
            SecretSource::Env {
                var: "OPENAI_API_KEY".to_string()
            }
        );
        assert_eq!(
            def.secrets[1].source,
            SecretSource::Literal {
                value: "abc123".to_string()
            }
        );
    }

    #[test]
    fn http_step_with_nested_headers_and_body_block() {
        let src = "\
agent: a
trigger: manual
steps:
  post:
    kind: http
    url: https://example.com/api
    method: POST
    headers:
      Content-Type: application/json
      X-Token: \"{TOKEN}\"
    body: |
      {\"message\": \"{m}\"}
";
        let (def, vr) = parse_src(src);
        assert!(vr.valid(), "unexpected errors: {:?}", vr.errors);
        match &def.steps[0].kind {
            StepKind::Http {
                url,
                method,
                headers,
                body,
            } => {
                assert_eq!(url, "https://example.com/api");
                assert_eq!(method.as_deref(), Some("POST"));
                assert_eq!(
                    headers.get("Content-Type").map(String::as_str),
                    Some("application/json")
                );
                assert_eq!(
                    headers.get("X-Token").map(String::as_str),
                    Some("\"{TOKEN}\"")
                );
                assert_eq!(body.as_deref(), Some("{\"message\": \"{m}\"}"));
            }
            other => panic!("wrong kind: {other:?}"),
        }
    }

    #[test]
    fn unknown_section_recovers() {
        let src = "\
agent: a
trigger: manual
bogus:
  nested: junk
steps:
  s:
    kind: function
    name: now
";
        let (def, vr) = parse_src(src);
        assert_eq!(vr.errors.len(), 1);
        assert!(vr.errors[0].message.contains("unknown section 'bogus'"));
        assert_eq!(def.steps.len(), 1);
    }

    #[test]
    fn invalid_retries_and_timeout_are_diagnosed() {
        let src = "\
agent: a
trigger: manual
steps:
  s:
    kind: function
    name: now
    retries: many
    timeout: 0
";
        let (def, vr) = parse_src(src);
        assert_eq!(vr.errors.len(), 2);
        let step = &def.steps[0];
        assert_eq!(step.retries, None);
        assert_eq!(step.timeout_ms, None);
    }

    #[test]
    fn prose_punctuation_survives_in_free_text() {
        let src = "\
agent: a
description: Isn't this nice? (It is!)
trigger: manual
steps:
  s:
    kind: llm
    provider: openai
    model: gpt-4o
    prompt: |
      What's the weather like today? (Answer briefly!)
    save: r
outputs:
  result: \"{r}\"
";
        let (def, vr) = parse_src(src);
        assert!(vr.valid(), "unexpected errors: {:?}", vr.errors);
        assert_eq!(def.id, "a");
        assert_eq!(
            def.description.as_deref(),
            Some("Isn't this nice? (It is!)")
        );
        match &def.steps[0].kind {
            StepKind::Llm { prompt, .. } => {
                assert_eq!(prompt, "What's the weather like today? (Answer briefly!)");
            }
            other => panic!("wrong kind: {other:?}"),
        }
    }

    #[test]
    fn multi_line_description_block() {
        let src = "\
agent: a
description: |
  Line one
  Line two
trigger: manual
steps:
  s:
    kind: function
    name: now
";
        let (def, vr) = parse_src(src);
        assert!(vr.valid(), "unexpected errors: {:?}", vr.errors);
        assert_eq!(def.description.as_deref(), Some("Line one\nLine two"));
    }

    #[test]
    fn matches_terse_dialect_shape() {
        let terse = "\
@agent hi v1
trigger http POST /hi
var m = input.message
step s:
  kind llm
  provider openai
  model gpt-4o
  prompt \"\"\"Hello {m}\"\"\"
  save r
output result = {r}
@end
";
        let (terse_def, terse_vr) = crate::parser::terse::parse(terse);
        let (decl_def, decl_vr) = parse_src(HELLO);
        assert!(terse_vr.valid() && decl_vr.valid());
        assert_eq!(terse_def.id, decl_def.id);
        assert_eq!(terse_def.steps.len(), decl_def.steps.len());
        let terse_outputs: Vec<_> = terse_def.outputs.iter().map(|o| &o.name).collect();
        let decl_outputs: Vec<_> = decl_def.outputs.iter().map(|o| &o.name).collect();
        assert_eq!(terse_outputs, decl_outputs);
    }
}
