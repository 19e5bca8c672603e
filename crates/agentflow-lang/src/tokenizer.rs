//! Hand-written tokenizer for agent source text.
//!
//! Produces a flat `Token` stream with 1-based line/column positions.
//! Whitespace and `#` comments are skipped, but `Newline` tokens are emitted
//! because both dialects are line-oriented. Compound model identifiers
//! (`vendor/model-name:tag`) survive as single tokens: `:`, `/`, `.`, `-`
//! join into the identifier whenever the following character is
//! alphanumeric.

use agentflow_types::token::{Token, TokenKind};

// ---------------------------------------------------------------------------
// LexError
// ---------------------------------------------------------------------------

/// Hard tokenizer failures. Carries position and a fix suggestion so the
/// parser can fold it into a `ValidationResult`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LexError {
    #[error("unrecognized character '{ch}' at {line}:{column}")]
    UnexpectedChar { ch: char, line: u32, column: u32 },

    #[error("unterminated string literal starting at {line}:{column}")]
    UnterminatedString { line: u32, column: u32 },

    #[error("unterminated \"\"\" block starting at {line}:{column}")]
    UnterminatedBlock { line: u32, column: u32 },
}

impl LexError {
    /// Source position of the failure.
    pub fn position(&self) -> (u32, u32) {
        match self {
            LexError::UnexpectedChar { line, column, .. }
            | LexError::UnterminatedString { line, column }
            | LexError::UnterminatedBlock { line, column } => (*line, *column),
        }
    }

    /// A human-oriented fix suggestion.
    pub fn suggestion(&self) -> String {
        match self {
            LexError::UnexpectedChar { ch, .. } => {
                format!("remove or quote the character '{ch}'")
            }
            LexError::UnterminatedString { .. } => "add a closing quote".to_string(),
            LexError::UnterminatedBlock { .. } => "add a closing \"\"\"".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// tokenize
// ---------------------------------------------------------------------------

/// Tokenize agent source text into a flat token stream.
///
/// The stream always ends with an `Eof` token on success.
pub fn tokenize(text: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(text).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        while self.pos < self.chars.len() {
            let before = self.pos;
            self.scan_one()?;
            // Anti-hang guard: every iteration must consume input. This
            // should be unreachable; if a scan arm ever fails to advance,
            // skip one character so tokenization still terminates.
            if self.pos == before {
                tracing::warn!(
                    line = self.line,
                    column = self.column,
                    ch = ?self.chars[self.pos],
                    "tokenizer made no progress, skipping one character"
                );
                self.advance();
            }
        }
        self.tokens
            .push(Token::new(TokenKind::Eof, "", self.line, self.column));
        Ok(self.tokens)
    }

    fn scan_one(&mut self) -> Result<(), LexError> {
        let c = self.chars[self.pos];
        match c {
            ' ' | '\t' | '\r' => {
                self.advance();
                Ok(())
            }
            '#' => {
                while self.pos < self.chars.len() && self.chars[self.pos] != '\n' {
                    self.advance();
                }
                Ok(())
            }
            '\n' => {
                self.tokens
                    .push(Token::new(TokenKind::Newline, "\n", self.line, self.column));
                self.pos += 1;
                self.line += 1;
                self.column = 1;
                Ok(())
            }
            '"' if self.lookahead_is("\"\"\"") => self.scan_block(),
            '"' | '\'' => self.scan_string(c),
            ':' => self.punct(TokenKind::Colon, ":"),
            '=' => self.punct(TokenKind::Equals, "="),
            '|' => self.punct(TokenKind::Pipe, "|"),
            ',' => self.punct(TokenKind::Comma, ","),
            '{' => self.punct(TokenKind::LBrace, "{"),
            '}' => self.punct(TokenKind::RBrace, "}"),
            c if c.is_ascii_digit() => {
                self.scan_number();
                Ok(())
            }
            c if c.is_alphabetic() || c == '_' || c == '@' || c == '/' => {
                self.scan_word();
                Ok(())
            }
            other => Err(LexError::UnexpectedChar {
                ch: other,
                line: self.line,
                column: self.column,
            }),
        }
    }

    fn punct(&mut self, kind: TokenKind, literal: &str) -> Result<(), LexError> {
        self.tokens
            .push(Token::new(kind, literal, self.line, self.column));
        self.advance();
        Ok(())
    }

    /// Scan an identifier or keyword. Joiners (`:`, `/`, `.`, `-`) are
    /// absorbed only when the next character is alphanumeric, so
    /// `vendor/model-name:tag` is one token but the `:` in `steps:` is not.
    fn scan_word(&mut self) {
        let (line, column) = (self.line, self.column);
        let mut word = String::new();
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            let absorbed = c.is_alphanumeric()
                || c == '_'
                || (word.is_empty() && (c == '@' || c == '/'))
                || (matches!(c, ':' | '/' | '.' | '-') && self.next_is_alphanumeric());
            if !absorbed {
                break;
            }
            word.push(c);
            self.advance();
        }
        let kind = Token::keyword_kind(&word);
        self.tokens.push(Token::new(kind, word, line, column));
    }

    /// Scan an integer literal. Falls back to a compound identifier when a
    /// word character follows the digits (`2x`, `4.1-preview`).
    fn scan_number(&mut self) {
        let (line, column) = (self.line, self.column);
        let mut literal = String::new();
        while self.pos < self.chars.len() && self.chars[self.pos].is_ascii_digit() {
            literal.push(self.chars[self.pos]);
            self.advance();
        }
        let continues_as_word = self.pos < self.chars.len() && {
            let c = self.chars[self.pos];
            c.is_alphanumeric()
                || c == '_'
                || (matches!(c, ':' | '/' | '.' | '-') && self.next_is_alphanumeric())
        };
        if continues_as_word {
            while self.pos < self.chars.len() {
                let c = self.chars[self.pos];
                let absorbed = c.is_alphanumeric()
                    || c == '_'
                    || (matches!(c, ':' | '/' | '.' | '-') && self.next_is_alphanumeric());
                if !absorbed {
                    break;
                }
                literal.push(c);
                self.advance();
            }
            self.tokens
                .push(Token::new(TokenKind::Ident, literal, line, column));
        } else {
            self.tokens
                .push(Token::new(TokenKind::Number, literal, line, column));
        }
    }

    /// Scan a quoted string, processing escape sequences.
    fn scan_string(&mut self, quote: char) -> Result<(), LexError> {
        let (line, column) = (self.line, self.column);
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            if self.pos >= self.chars.len() || self.chars[self.pos] == '\n' {
                return Err(LexError::UnterminatedString { line, column });
            }
            let c = self.chars[self.pos];
            if c == quote {
                self.advance();
                break;
            }
            if c == '\\' {
                self.advance();
                if self.pos >= self.chars.len() {
                    return Err(LexError::UnterminatedString { line, column });
                }
                let escaped = self.chars[self.pos];
                value.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    '\\' => '\\',
                    '"' => '"',
                    '\'' => '\'',
                    other => other,
                });
                self.advance();
            } else {
                value.push(c);
                self.advance();
            }
        }
        self.tokens
            .push(Token::new(TokenKind::Str, value, line, column));
        Ok(())
    }

    /// Scan a `"""..."""` block, keeping the raw contents (templates inside
    /// stay literal). A leading newline directly after the opening marker is
    /// dropped.
    fn scan_block(&mut self) -> Result<(), LexError> {
        let (line, column) = (self.line, self.column);
        for _ in 0..3 {
            self.advance();
        }
        let mut value = String::new();
        loop {
            if self.pos >= self.chars.len() {
                return Err(LexError::UnterminatedBlock { line, column });
            }
            if self.lookahead_is("\"\"\"") {
                for _ in 0..3 {
                    self.advance();
                }
                break;
            }
            let c = self.chars[self.pos];
            if c == '\n' {
                self.pos += 1;
                self.line += 1;
                self.column = 1;
            } else {
                self.pos += 1;
                self.column += 1;
            }
            value.push(c);
        }
        let value = value.strip_prefix('\n').unwrap_or(&value).to_string();
        let value = value.strip_suffix('\n').unwrap_or(&value).to_string();
        self.tokens
            .push(Token::new(TokenKind::MultilineStr, value, line, column));
        Ok(())
    }

    fn advance(&mut self) {
        if self.pos < self.chars.len() {
            if self.chars[self.pos] == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.pos += 1;
        }
    }

    fn lookahead_is(&self, s: &str) -> bool {
        let mut i = self.pos;
        for expected in s.chars() {
            if i >= self.chars.len() || self.chars[i] != expected {
                return false;
            }
            i += 1;
        }
        true
    }

    fn next_is_alphanumeric(&self) -> bool {
        self.chars
            .get(self.pos + 1)
            .is_some_and(|c| c.is_alphanumeric())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
