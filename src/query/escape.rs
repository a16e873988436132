//! Escaping for delimited literals
//!
//! Quoted values (`"..."`), angle-bracket values (`<...>`) and curly-brace
//! sub-queries (`{...}`) may contain their own delimiters when those are
//! preceded by a backslash. A literal backslash is written as `\\`.

use serde::{Deserialize, Serialize};

/// Which delimiter family a literal uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscapeKind {
    /// Double-quoted literal: escapes `"`
    Quote,
    /// Angle-bracket literal: escapes `<` and `>`
    Angle,
    /// Curly-brace literal: escapes `{` and `}`
    Curly,
}

impl EscapeKind {
    /// Delimiter characters for this kind
    pub fn delimiters(&self) -> &'static [char] {
        match self {
            Self::Quote => &['"'],
            Self::Angle => &['<', '>'],
            Self::Curly => &['{', '}'],
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "quote" | "quotes" | "\"" => Some(Self::Quote),
            "angle" | "angles" | "<>" => Some(Self::Angle),
            "curly" | "curlies" | "{}" => Some(Self::Curly),
            _ => None,
        }
    }
}

impl std::fmt::Display for EscapeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quote => write!(f, "quote"),
            Self::Angle => write!(f, "angle"),
            Self::Curly => write!(f, "curly"),
        }
    }
}

/// Escape `text` so it can be embedded in a literal of the given kind
pub fn escape(kind: EscapeKind, text: &str) -> String {
    let delimiters = kind.delimiters();
    let mut out = String::with_capacity(text.len());

    for c in text.chars() {
        if c == '\\' || delimiters.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }

    out
}

/// Remove the escaping that [`escape`] adds
///
/// Backslashes in front of anything other than a delimiter of `kind` or
/// another backslash are kept, so regex-like bodies survive unchanged.
pub fn unescape(kind: EscapeKind, text: &str) -> String {
    if !text.contains('\\') {
        return text.to_string();
    }

    let delimiters = kind.delimiters();
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some(&next) if next == '\\' || delimiters.contains(&next) => {
                    out.push(next);
                    chars.next();
                }
                _ => out.push(c),
            }
        } else {
            out.push(c);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape_quote() {
        assert_eq!(unescape(EscapeKind::Quote, r#"say \"hi\""#), r#"say "hi""#);
        assert_eq!(unescape(EscapeKind::Quote, r"a\\b"), r"a\b");
    }

    #[test]
    fn test_unescape_keeps_foreign_escapes() {
        // \d and \< are not quote escapes
        assert_eq!(unescape(EscapeKind::Quote, r"\d+\<"), r"\d+\<");
        assert_eq!(unescape(EscapeKind::Angle, r"\<b\>"), "<b>");
        assert_eq!(unescape(EscapeKind::Curly, r"\{Foo\}"), "{Foo}");
    }

    #[test]
    fn test_unescape_trailing_backslash() {
        assert_eq!(unescape(EscapeKind::Quote, "abc\\"), "abc\\");
    }

    #[test]
    fn test_unescape_without_backslashes_is_identity() {
        let text = r#"plain "text" <with> {braces}"#;
        for kind in [EscapeKind::Quote, EscapeKind::Angle, EscapeKind::Curly] {
            assert_eq!(unescape(kind, text), text);
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape(EscapeKind::Quote, r#"a"b\c"#), r#"a\"b\\c"#);
        assert_eq!(escape(EscapeKind::Angle, "<x>"), r"\<x\>");
        assert_eq!(escape(EscapeKind::Curly, "{x}"), r"\{x\}");
    }

    #[test]
    fn test_round_trip() {
        let samples = [r"\", r"\\", r#"\""#, r"a\b\{", "{<\"mixed\">}"];
        for kind in [EscapeKind::Quote, EscapeKind::Angle, EscapeKind::Curly] {
            for s in samples {
                assert_eq!(unescape(kind, &escape(kind, s)), s, "kind {}", kind);
            }
        }
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!(EscapeKind::from_str("Quote"), Some(EscapeKind::Quote));
        assert_eq!(EscapeKind::from_str("<>"), Some(EscapeKind::Angle));
        assert_eq!(EscapeKind::from_str("curly"), Some(EscapeKind::Curly));
        assert_eq!(EscapeKind::from_str("square"), None);
    }
}
