//! Dual-dialect parser producing `AgentDef` ASTs.
//!
//! Two source dialects are supported and auto-detected by a cheap structural
//! probe:
//! - **Declarative**: block-structured `section:` syntax with indented
//!   properties and `|` multi-line values.
//! - **Terse**: one statement per line between `@agent` and `@end`.
//!
//! Both parsers are line-oriented over raw source text, so free-form prose
//! in descriptions, prompts, and pipe blocks passes through untouched.
//!
//! Both parsers practice error recovery: an unexpected statement records a
//! diagnostic and skips to the next recognizable boundary, so one malformed
//! section never aborts the whole parse. The AST is always returned, paired
//! with the collected diagnostics.

mod common;
pub mod declarative;
pub mod terse;

use agentflow_types::ast::AgentDef;
use agentflow_types::diagnostic::ValidationResult;

// ---------------------------------------------------------------------------
// Dialect
// ---------------------------------------------------------------------------

/// The two supported source dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Block-structured `section:` syntax.
    Declarative,
    /// Line-oriented `@agent ... @end` syntax.
    Terse,
}

/// Section markers whose presence selects the declarative dialect.
const DECLARATIVE_MARKERS: [&str; 5] =
    ["description:", "secrets:", "vars:", "steps:", "outputs:"];

/// Probe source text for its dialect.
///
/// The probe is structural: a line that *is* one of the declarative section
/// markers (marker alone, or `description:` followed by prose) means the
/// declarative dialect; otherwise the terse dialect is assumed.
pub fn detect_dialect(source: &str) -> Dialect {
    for line in source.lines() {
        let trimmed = line.trim();
        for marker in DECLARATIVE_MARKERS {
            if trimmed == marker || trimmed.starts_with(&format!("{marker} ")) {
                return Dialect::Declarative;
            }
        }
    }
    Dialect::Terse
}

// ---------------------------------------------------------------------------
// ParseResult
// ---------------------------------------------------------------------------

/// The outcome of one parse: the AST (possibly partial), the diagnostics
/// collected along the way, and which dialect was used.
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub def: AgentDef,
    pub validation: ValidationResult,
    pub dialect: Dialect,
}

/// Parse agent source text, auto-detecting the dialect.
///
/// Never fails outright: the AST is always returned alongside whatever
/// diagnostics were collected.
pub fn parse(source: &str) -> ParseResult {
    let dialect = detect_dialect(source);
    tracing::debug!(?dialect, bytes = source.len(), "parsing agent source");
    let (def, validation) = match dialect {
        Dialect::Terse => terse::parse(source),
        Dialect::Declarative => declarative::parse(source),
    };
    ParseResult {
        def,
        validation,
        dialect,
    }
}

/// Parse and run the semantic validator, merging its diagnostics.
pub fn parse_and_validate(source: &str) -> ParseResult {
    let mut result = parse(source);
    let semantic = crate::validator::validate(&result.def);
    result.validation.merge(semantic);
    result
}

/// An empty definition used when nothing could be parsed. The validator
/// flags its missing pieces.
pub(crate) fn empty_def() -> AgentDef {
    AgentDef {
        id: String::new(),
        version: 1,
        description: None,
        trigger: agentflow_types::ast::Trigger::missing(),
        secrets: Vec::new(),
        vars: Vec::new(),
        steps: Vec::new(),
        outputs: Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
