//! Sub-selector splitting
//!
//! Finds the top-level parenthesized groups of a query in one left-to-right
//! pass. Double-quoted literals and `<{...}>` reference bodies are opaque:
//! parens inside them never open or close a group.
//!
//! ```text
//! name=x (|a=1 a=2) (!<archived>)
//!        ^^^^^^^^^^ ^^^^^^^^^^^^^   two groups, remainder "name=x"
//! ```

use std::ops::Range;

use crate::query::ast::SelectorType;

/// A top-level parenthesized group
#[derive(Debug, Clone, PartialEq)]
pub struct Group<'a> {
    /// Byte span of the group, parens included
    pub span: Range<usize>,
    /// Combinator from the leading marker
    pub kind: SelectorType,
    /// Group content with the marker removed
    pub body: &'a str,
}

/// Result of splitting a query
#[derive(Debug, Clone, PartialEq)]
pub struct Split<'a> {
    /// Groups in order of appearance
    pub groups: Vec<Group<'a>>,
    /// Query text with every group replaced by a space
    pub remainder: String,
}

/// Split `input` into its top-level groups and the text around them
pub fn split_groups(input: &str) -> Split<'_> {
    let bytes = input.as_bytes();
    let mut spans: Vec<Range<usize>> = Vec::new();

    let mut escaped = false;
    let mut in_quote = false;
    let mut curly_depth = 0usize;
    let mut paren_depth = 0usize;
    let mut group_start: Option<usize> = None;

    for (i, &b) in bytes.iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }

        match b {
            b'\\' => escaped = true,
            b'"' if curly_depth == 0 => in_quote = !in_quote,
            _ if in_quote => {}
            b'{' if curly_depth > 0 => curly_depth += 1,
            b'{' if i > 0 && bytes[i - 1] == b'<' => curly_depth = 1,
            b'}' if curly_depth > 0 => curly_depth -= 1,
            _ if curly_depth > 0 => {}
            b'(' => match group_start {
                None => group_start = Some(i),
                Some(_) => paren_depth += 1,
            },
            b')' => match group_start {
                // Orphan closer, left as literal text
                None => {}
                Some(start) if paren_depth == 0 => {
                    spans.push(start..i + 1);
                    group_start = None;
                }
                Some(_) => paren_depth -= 1,
            },
            _ => {}
        }
    }

    let mut remainder = String::with_capacity(input.len());
    let mut last = 0;
    for span in &spans {
        remainder.push_str(&input[last..span.start]);
        remainder.push(' ');
        last = span.end;
    }
    remainder.push_str(&input[last..]);

    let groups = spans
        .into_iter()
        .map(|span| {
            let content = &input[span.start + 1..span.end - 1];
            let (kind, body) = split_marker(content);
            Group { span, kind, body }
        })
        .collect();

    Split { groups, remainder }
}

/// Split a group's leading type marker from its body
fn split_marker(content: &str) -> (SelectorType, &str) {
    let content = content.trim_start();
    for marker in ["!&", "!|", "&", "|", "!"] {
        if let Some(body) = content.strip_prefix(marker) {
            if let Some(kind) = SelectorType::from_marker(marker) {
                return (kind, body);
            }
        }
    }
    (SelectorType::And, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_groups() {
        let split = split_groups("name=x age>3");
        assert!(split.groups.is_empty());
        assert_eq!(split.remainder, "name=x age>3");
    }

    #[test]
    fn test_markers() {
        let split = split_groups("(a=1) (&b=2) (|c=3) (!d=4) (!&e=5) (!|f=6)");
        let kinds: Vec<_> = split.groups.iter().map(|g| g.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SelectorType::And,
                SelectorType::And,
                SelectorType::Or,
                SelectorType::NotAnd,
                SelectorType::NotAnd,
                SelectorType::NotOr,
            ]
        );
        let bodies: Vec<_> = split.groups.iter().map(|g| g.body).collect();
        assert_eq!(bodies, vec!["a=1", "b=2", "c=3", "d=4", "e=5", "f=6"]);
        assert!(split.remainder.trim().is_empty());
    }

    #[test]
    fn test_marker_after_leading_whitespace() {
        let split = split_groups("( |a=1 a=2) (  !b=1)");
        let kinds: Vec<_> = split.groups.iter().map(|g| g.kind).collect();
        assert_eq!(kinds, vec![SelectorType::Or, SelectorType::NotAnd]);
        assert_eq!(split.groups[0].body, "a=1 a=2");
        assert_eq!(split.groups[1].body, "b=1");
    }

    #[test]
    fn test_nested_groups_stay_in_body() {
        let split = split_groups("x=1 (|a=1 (!b=2)) y=2");
        assert_eq!(split.groups.len(), 1);
        assert_eq!(split.groups[0].body, "a=1 (!b=2)");
        assert_eq!(split.groups[0].span, 4..17);
        assert_eq!(split.remainder, "x=1   y=2");
    }

    #[test]
    fn test_quoted_parens_ignored() {
        let split = split_groups(r#"name="a (b" (c=")" d=1)"#);
        assert_eq!(split.groups.len(), 1);
        assert_eq!(split.groups[0].body, r#"c=")" d=1"#);
        assert_eq!(split.remainder, r#"name="a (b"  "#);
    }

    #[test]
    fn test_escaped_quote_inside_literal() {
        let split = split_groups(r#"name="say \"(hi" (a=1)"#);
        assert_eq!(split.groups.len(), 1);
        assert_eq!(split.groups[0].body, "a=1");
    }

    #[test]
    fn test_reference_bodies_are_opaque() {
        let split = split_groups("owner<{User (name=x)}> (a=1)");
        assert_eq!(split.groups.len(), 1);
        assert_eq!(split.groups[0].body, "a=1");
        assert!(split.remainder.starts_with("owner<{User (name=x)}>"));
    }

    #[test]
    fn test_orphan_closer_ignored() {
        let split = split_groups("a=1) (b=2)");
        assert_eq!(split.groups.len(), 1);
        assert_eq!(split.groups[0].body, "b=2");
        assert_eq!(split.remainder, "a=1)  ");
    }

    #[test]
    fn test_unclosed_group_left_in_remainder() {
        let split = split_groups("a=1 (b=2 c=3");
        assert!(split.groups.is_empty());
        assert_eq!(split.remainder, "a=1 (b=2 c=3");
    }

    #[test]
    fn test_adjacent_groups_separated() {
        let split = split_groups("a=1(b=2)c=3");
        assert_eq!(split.groups.len(), 1);
        assert_eq!(split.remainder, "a=1 c=3");
    }
}
