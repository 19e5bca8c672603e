//! Token types produced by the tokenizer.
//!
//! Tokens are immutable value objects carrying their source position so
//! that every later stage (parser, validator) can attach line/column
//! information to diagnostics.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TokenKind
// ---------------------------------------------------------------------------

/// The lexical class of a token.
///
/// Reserved words get dedicated kinds; anything unrecognized stays `Ident`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// `@agent` header marker.
    AtAgent,
    /// `@end` footer marker.
    AtEnd,
    /// Section keywords: `description`, `trigger`, `secrets`/`secret`,
    /// `vars`/`variables`/`var`, `steps`/`step`, `outputs`/`output`.
    Description,
    Trigger,
    Secret,
    Var,
    Step,
    Output,
    /// Step property keywords.
    Kind,
    Provider,
    Model,
    Prompt,
    Url,
    Method,
    Headers,
    Body,
    When,
    Save,
    Retries,
    Timeout,
    /// A bare or compound identifier (`gpt-4o`, `vendor/model:tag`).
    Ident,
    /// An integer literal.
    Number,
    /// A quoted string with escapes already unescaped.
    Str,
    /// A `"""..."""` multi-line block, raw contents.
    MultilineStr,
    /// Punctuation.
    Colon,
    Equals,
    Pipe,
    Comma,
    LBrace,
    RBrace,
    /// End-of-line marker (significant for line-oriented sections).
    Newline,
    /// End of input.
    Eof,
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// One lexical token with its source position (1-based line/column).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    /// The literal text (for strings, the unescaped contents).
    pub literal: String,
    pub line: u32,
    pub column: u32,
}

impl Token {
    pub fn new(kind: TokenKind, literal: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            kind,
            literal: literal.into(),
            line,
            column,
        }
    }

    /// Classify a word as a keyword kind, or `Ident` if unrecognized.
    pub fn keyword_kind(word: &str) -> TokenKind {
        match word {
            "@agent" => TokenKind::AtAgent,
            "@end" => TokenKind::AtEnd,
            "description" => TokenKind::Description,
            "trigger" => TokenKind::Trigger,
            "secrets" | "secret" => TokenKind::Secret,
            "vars" | "variables" | "var" => TokenKind::Var,
            "steps" | "step" => TokenKind::Step,
            "outputs" | "output" => TokenKind::Output,
            "kind" => TokenKind::Kind,
            "provider" => TokenKind::Provider,
            "model" => TokenKind::Model,
            "prompt" => TokenKind::Prompt,
            "url" => TokenKind::Url,
            "method" => TokenKind::Method,
            "headers" => TokenKind::Headers,
            "body" => TokenKind::Body,
            "when" => TokenKind::When,
            "save" => TokenKind::Save,
            "retries" => TokenKind::Retries,
            "timeout" => TokenKind::Timeout,
            _ => TokenKind::Ident,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
