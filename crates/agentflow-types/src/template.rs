//! Placeholder scanning for `{name}` / `{name.path}` template strings.
//!
//! Shared by the validator (cross-reference checks) and the orchestrator
//! (rendering), so both agree on what counts as a placeholder.

// ---------------------------------------------------------------------------
// Placeholder
// ---------------------------------------------------------------------------

/// One `{...}` occurrence in a template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// The full reference between the braces (`user.name`).
    pub path: String,
    /// Byte offset of the opening brace.
    pub start: usize,
    /// Byte offset one past the closing brace.
    pub end: usize,
}

impl Placeholder {
    /// The leading identifier (`user` for `user.name`).
    pub fn root(&self) -> &str {
        self.path.split('.').next().unwrap_or(&self.path)
    }
}

/// Scan a template for `{identifier}` / `{identifier.path}` occurrences.
///
/// Only well-formed references are returned: the text between braces must be
/// a dotted chain of identifiers (`[A-Za-z_][A-Za-z0-9_]*`). Anything else
/// (JSON braces, empty braces) is left alone, which keeps JSON bodies safe
/// to use as templates.
pub fn placeholders(template: &str) -> Vec<Placeholder> {
    let bytes = template.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'{' {
            i += 1;
            continue;
        }
        let start = i;
        let mut j = i + 1;
        while j < bytes.len() && bytes[j] != b'}' && bytes[j] != b'{' {
            j += 1;
        }
        if j >= bytes.len() || bytes[j] != b'}' {
            i += 1;
            continue;
        }
        let inner = &template[start + 1..j];
        if is_reference(inner) {
            found.push(Placeholder {
                path: inner.to_string(),
                start,
                end: j + 1,
            });
            i = j + 1;
        } else {
            i += 1;
        }
    }

    found
}

/// Whether a brace body is a dotted identifier chain.
fn is_reference(body: &str) -> bool {
    if body.is_empty() {
        return false;
    }
    body.split('.').all(|segment| {
        let mut chars = segment.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_placeholder() {
        let found = placeholders("Hello {name}!");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "name");
        assert_eq!(&"Hello {name}!"[found[0].start..found[0].end], "{name}");
    }

    #[test]
    fn dotted_path() {
        let found = placeholders("{input.message.text}");
        assert_eq!(found[0].path, "input.message.text");
        assert_eq!(found[0].root(), "input");
    }

    #[test]
    fn json_braces_ignored() {
        let found = placeholders(r#"{"key": "value"}"#);
        assert!(found.is_empty());
    }

    #[test]
    fn mixed_json_and_references() {
        let found = placeholders(r#"{"message": "{m}", "count": 3}"#);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "m");
    }

    #[test]
    fn unterminated_brace_ignored() {
        assert!(placeholders("open {brace").is_empty());
    }

    #[test]
    fn multiple_references() {
        let found = placeholders("{a} and {b.c}");
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].path, "b.c");
    }

    #[test]
    fn empty_and_invalid_bodies_ignored() {
        assert!(placeholders("{}").is_empty());
        assert!(placeholders("{1abc}").is_empty());
        assert!(placeholders("{a b}").is_empty());
    }
}
