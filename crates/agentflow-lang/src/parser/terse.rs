//! Line-oriented parser for the terse dialect.
//!
//! One statement per line between `@agent` and `@end`:
//!
//! ```text
//! @agent greeter v1
//! trigger http POST /greet
//! secret API_KEY=env:OPENAI_API_KEY
//! var m = input.message
//! step s:
//!   kind llm
//!   provider openai
//!   model gpt-4o
//!   prompt """Hello {m}"""
//!   save r
//! output r
//! @end
//! ```
//!
//! Indented lines belong to the preceding `step` block. Recovery policy: a
//! malformed statement records a diagnostic and the parser moves on to the
//! next line.

use agentflow_types::ast::{AgentDef, OutputDecl, SecretDecl, SecretSource, Trigger, VarDecl};
use agentflow_types::diagnostic::{Diagnostic, ValidationResult};

use super::common::{StepProps, dedent, is_bare_ident, parse_var_source, unquote};
use super::empty_def;

/// Parse terse-dialect source. Always returns an AST; problems are
/// collected into the accompanying `ValidationResult`.
pub fn parse(source: &str) -> (AgentDef, ValidationResult) {
    TerseParser::new(source).run()
}

struct TerseParser<'a> {
    lines: Vec<&'a str>,
    pos: usize,
    def: AgentDef,
    vr: ValidationResult,
}

impl<'a> TerseParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines().collect(),
            pos: 0,
            def: empty_def(),
            vr: ValidationResult::new(),
        }
    }

    fn run(mut self) -> (AgentDef, ValidationResult) {
        let mut ended = false;
        while self.pos < self.lines.len() {
            let raw = self.lines[self.pos];
            let line_no = self.pos as u32 + 1;
            let trimmed = raw.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') {
                self.pos += 1;
                continue;
            }

            if ended {
                self.vr.warning(
                    Diagnostic::new("content after @end is ignored").at(line_no, column_of(raw)),
                );
                self.pos += 1;
                continue;
            }

            if raw.starts_with(' ') || raw.starts_with('\t') {
                self.vr.error(
                    Diagnostic::new("indented line outside a step block")
                        .at(line_no, column_of(raw))
                        .suggest("step properties must follow a 'step <id>:' line"),
                );
                self.pos += 1;
                continue;
            }

            let keyword = trimmed.split_whitespace().next().unwrap_or_default();
            match keyword {
                "@agent" => self.parse_header(trimmed, line_no),
                "@end" => ended = true,
                "description" => {
                    self.def.description =
                        Some(rest_after(trimmed, "description").to_string());
                }
                "trigger" => self.parse_trigger(trimmed, line_no),
                "secret" | "secrets" => self.parse_secret(trimmed, keyword, line_no),
                "var" => self.parse_var(trimmed, line_no),
                "step" => {
                    self.parse_step(trimmed, line_no);
                    continue; // parse_step advanced past the block
                }
                "output" => self.parse_output(trimmed, line_no),
                other => {
                    self.vr.error(
                        Diagnostic::new(format!("unexpected statement '{other}'"))
                            .at(line_no, column_of(raw))
                            .suggest(
                                "expected one of: @agent, description, trigger, secret, var, \
                                 step, output, @end",
                            ),
                    );
                }
            }
            self.pos += 1;
        }
        (self.def, self.vr)
    }

    /// `@agent <id> v<N>`
    fn parse_header(&mut self, line: &str, line_no: u32) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.get(1) {
            Some(id) => self.def.id = (*id).to_string(),
            None => {
                self.vr.error(
                    Diagnostic::new("@agent is missing an identifier")
                        .at(line_no, 1)
                        .suggest("write '@agent <id> v1'"),
                );
                return;
            }
        }
        match parts.get(2) {
            Some(v) => {
                let digits = v.strip_prefix('v').unwrap_or(v);
                match digits.parse::<u32>() {
                    Ok(n) if n >= 1 => self.def.version = n,
                    _ => self.vr.error(
                        Diagnostic::new(format!("invalid version '{v}'"))
                            .at(line_no, 1)
                            .suggest("version must be a positive integer like 'v1'"),
                    ),
                }
            }
            None => {
                self.vr.warning(
                    Diagnostic::new("missing version, assuming v1").at(line_no, 1),
                );
            }
        }
    }

    /// `trigger <type> [method] [path]`
    fn parse_trigger(&mut self, line: &str, line_no: u32) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.get(1) {
            Some(kind) => {
                self.def.trigger = Trigger {
                    trigger_type: (*kind).to_string(),
                    method: parts.get(2).map(|s| s.to_string()),
                    path: parts.get(3).map(|s| s.to_string()),
                };
            }
            None => self.vr.error(
                Diagnostic::new("trigger is missing its type")
                    .at(line_no, 1)
                    .suggest("write 'trigger http POST /path'"),
            ),
        }
    }

    /// `secret NAME=env:VAR` or `secret NAME=value`
    fn parse_secret(&mut self, line: &str, keyword: &str, line_no: u32) {
        let rest = rest_after(line, keyword);
        let Some((name, value)) = rest.split_once('=') else {
            self.vr.error(
                Diagnostic::new("secret declaration is missing '='")
                    .at(line_no, 1)
                    .suggest("write 'secret NAME=env:VAR_NAME'"),
            );
            return;
        };
        let name = name.trim().to_string();
        let value = value.trim();
        let source = match value.strip_prefix("env:") {
            Some(var) => SecretSource::Env {
                var: var.to_string(),
            },
            None => SecretSource::Literal {
                value: unquote(value).to_string(),
            },
        };
        self.def.secrets.push(SecretDecl { name, source });
    }

    /// `var NAME = input.path | env.NAME | "literal"`
    fn parse_var(&mut self, line: &str, line_no: u32) {
        let rest = rest_after(line, "var");
        let Some((name, value)) = rest.split_once('=') else {
            self.vr.error(
                Diagnostic::new("var declaration is missing '='")
                    .at(line_no, 1)
                    .suggest("write 'var name = input.path'"),
            );
            return;
        };
        let name = name.trim().to_string();
        let value = value.trim();
        let source = parse_var_source(value);
        self.def.vars.push(VarDecl {
            name,
            source,
            required: true,
            default: None,
        });
    }

    /// `step <id>:` followed by an indented property block.
    fn parse_step(&mut self, line: &str, line_no: u32) {
        let id = line
            .split_whitespace()
            .nth(1)
            .map(|s| s.trim_end_matches(':').to_string())
            .unwrap_or_default();
        if id.is_empty() {
            self.vr.error(
                Diagnostic::new("step is missing an identifier")
                    .at(line_no, 1)
                    .suggest("write 'step <id>:'"),
            );
        }
        self.pos += 1;

        let mut props = StepProps::default();
        while self.pos < self.lines.len() {
            let raw = self.lines[self.pos];
            let prop_line_no = self.pos as u32 + 1;
            if raw.trim().is_empty() {
                self.pos += 1;
                continue;
            }
            if !raw.starts_with(' ') && !raw.starts_with('\t') {
                break;
            }
            self.parse_step_property(raw, prop_line_no, &mut props);
            self.pos += 1;
        }

        if !id.is_empty() {
            if let Some(step) = props.into_step(id, &mut self.vr, line_no) {
                self.def.steps.push(step);
            }
        }
    }

    fn parse_step_property(&mut self, raw: &str, line_no: u32, props: &mut StepProps) {
        let trimmed = raw.trim();
        let indent = column_of(raw) as usize - 1;
        let Some(key_word) = trimmed.split_whitespace().next() else {
            return;
        };
        let key = key_word.trim_end_matches(':');
        let value = trimmed[key_word.len()..]
            .trim_start()
            .trim_start_matches(':')
            .trim();

        match key {
            "kind" => props.kind = Some((value.to_string(), line_no)),
            "provider" => props.provider = Some(value.to_string()),
            "model" => props.model = Some(value.to_string()),
            "prompt" => props.prompt = Some(self.collect_text(value, indent)),
            "url" => props.url = Some(unquote(value).to_string()),
            "method" => props.method = Some(value.to_string()),
            "body" => props.body = Some(self.collect_text(value, indent)),
            "header" => match value.split_once(':') {
                Some((name, v)) => {
                    props
                        .headers
                        .insert(name.trim().to_string(), v.trim().to_string());
                }
                None => self.vr.error(
                    Diagnostic::new("header is missing ':'")
                        .at(line_no, column_of(raw))
                        .suggest("write 'header Content-Type: application/json'"),
                ),
            },
            "when" => props.when = Some(unquote(value).to_string()),
            "save" => props.save = Some(value.to_string()),
            "retries" => match value.parse::<u32>() {
                Ok(n) => props.retries = Some(n),
                Err(_) => self.vr.error(
                    Diagnostic::new(format!("invalid retries value '{value}'"))
                        .at(line_no, column_of(raw))
                        .suggest("retries must be a non-negative integer"),
                ),
            },
            "timeout" => match value.parse::<u64>() {
                Ok(n) if n > 0 => props.timeout_ms = Some(n),
                _ => self.vr.error(
                    Diagnostic::new(format!("invalid timeout value '{value}'"))
                        .at(line_no, column_of(raw))
                        .suggest("timeout must be a positive integer (milliseconds)"),
                ),
            },
            "name" => props.function_name = Some(value.to_string()),
            "arg" | "args" => props.args.push(unquote(value).to_string()),
            "image" => props.image = Some(unquote(value).to_string()),
            "source" => props.source = Some(unquote(value).to_string()),
            "operation" => props.operation = Some(value.to_string()),
            "backend" => props.backend = Some(value.to_string()),
            "collection" => props.collection = Some(value.to_string()),
            "payload" => props.payload = Some(self.collect_text(value, indent)),
            "dataset" => props.dataset = Some(unquote(value).to_string()),
            other => self.vr.error(
                Diagnostic::new(format!("unknown step property '{other}'"))
                    .at(line_no, column_of(raw))
                    .suggest("valid properties include kind, provider, model, prompt, url, \
                              method, header, body, when, save, retries, timeout"),
            ),
        }
    }

    /// A free-text value, honoring `"""` multi-line blocks. The closing
    /// `"""` may share the final content line or sit on its own line.
    fn collect_text(&mut self, value: &str, indent: usize) -> String {
        if let Some(inner) = value.strip_prefix("\"\"\"") {
            if let Some(inline) = inner.strip_suffix("\"\"\"") {
                if !inner.is_empty() && inner.len() >= 3 {
                    return inline.to_string();
                }
            }
            // Multi-line block: consume following lines until the closer.
            let mut collected: Vec<String> = Vec::new();
            if !inner.is_empty() {
                collected.push(inner.to_string());
            }
            while self.pos + 1 < self.lines.len() {
                self.pos += 1;
                let raw = self.lines[self.pos];
                let trimmed_end = raw.trim_end();
                if trimmed_end.trim() == "\"\"\"" {
                    break;
                }
                if let Some(content) = trimmed_end.strip_suffix("\"\"\"") {
                    collected.push(dedent(content, indent));
                    break;
                }
                collected.push(dedent(trimmed_end, indent));
            }
            collected.join("\n")
        } else {
            unquote(value).to_string()
        }
    }

    /// `output name = template` or `output <expr>`
    fn parse_output(&mut self, line: &str, line_no: u32) {
        let rest = rest_after(line, "output");
        if rest.is_empty() {
            self.vr.error(
                Diagnostic::new("output is missing a value")
                    .at(line_no, 1)
                    .suggest("write 'output <saved-name>' or 'output name = {template}'"),
            );
            return;
        }
        let (name, template) = match rest.split_once('=') {
            Some((name, template)) if is_bare_ident(name.trim()) => (
                name.trim().to_string(),
                unquote(template.trim()).to_string(),
            ),
            _ => {
                let expr = rest.trim();
                // Bare identifiers become the default `result` output.
                let template = if is_bare_ident(expr) {
                    format!("{{{expr}}}")
                } else {
                    expr.to_string()
                };
                ("result".to_string(), template)
            }
        };
        self.def.outputs.push(OutputDecl { name, template });
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn column_of(raw: &str) -> u32 {
    (raw.len() - raw.trim_start().len()) as u32 + 1
}

fn rest_after<'a>(line: &'a str, keyword: &str) -> &'a str {
    line[keyword.len()..].trim()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
