//! Property-based tests for the query compiler.

use entity_query::query::{escape, unescape, Comparison, EntityClass, EscapeKind, QueryParser};
use proptest::prelude::*;
use serde_json::json;

fn kinds() -> impl Strategy<Value = EscapeKind> {
    prop_oneof![
        Just(EscapeKind::Quote),
        Just(EscapeKind::Angle),
        Just(EscapeKind::Curly),
    ]
}

proptest! {
    /// unescape(escape(x)) == x
    #[test]
    fn prop_escape_round_trip(kind in kinds(), text in any::<String>()) {
        prop_assert_eq!(unescape(kind, &escape(kind, &text)), text);
    }

    /// Text without backslashes is unchanged by unescape
    #[test]
    fn prop_unescape_identity_without_backslash(
        kind in kinds(),
        text in "[^\\\\]{0,40}",
    ) {
        prop_assert_eq!(unescape(kind, &text), text);
    }

    /// Parsing never panics and always yields options plus a selector
    #[test]
    fn prop_parse_total(input in any::<String>()) {
        let parser = QueryParser::new().register(EntityClass::new("User"));
        let query = parser.parse(&input, &EntityClass::new("User"));

        prop_assert_eq!(query.options.class.as_str(), "User");
        prop_assert!(!query.selectors.is_empty());
        prop_assert!(query.selectors.len() <= 2);
    }

    /// Punctuation-heavy input exercises every extractor without panicking
    #[test]
    fn prop_parse_total_query_alphabet(input in r#"[a-z0-9 =!<>~/"{}()\[\]|&%_:\\.-]{0,60}"#) {
        let parser = QueryParser::new().register(EntityClass::new("User"));
        let query = parser.parse(&input, &EntityClass::new("User"));
        prop_assert!(!query.selectors.is_empty());
        prop_assert!(query.to_json().is_ok());
    }

    /// `f=v` lands in `equal`, `f!=v` in `!equal`, never both
    #[test]
    fn prop_equal_placement(
        field in "[a-z][a-z0-9_]{0,8}",
        value in "v[a-z0-9]{0,8}",
        negated in any::<bool>(),
    ) {
        let op = if negated { "!=" } else { "=" };
        let query = QueryParser::new().parse(&format!("{}{}{}", field, op, value), &EntityClass::new("User"));
        let selector = &query.selectors[0];
        let expected = vec![(field, json!(value))];

        if negated {
            prop_assert_eq!(&selector.not_equal, &expected);
            prop_assert!(selector.equal.is_empty());
        } else {
            prop_assert_eq!(&selector.equal, &expected);
            prop_assert!(selector.not_equal.is_empty());
        }
    }

    /// Numeric operands become absolute comparisons
    #[test]
    fn prop_number_gt(n in any::<i32>()) {
        let query = QueryParser::new().parse(&format!("age>{}", n), &EntityClass::new("User"));
        prop_assert_eq!(&query.selectors[0].gt, &vec![Comparison::absolute("age", n)]);
    }

    /// A lone word is searched across the default fields
    #[test]
    fn prop_bare_word(word in "[a-z]{1,12}") {
        let query = QueryParser::new().parse(&word, &EntityClass::new("User"));
        prop_assert_eq!(query.selectors.len(), 1);
        prop_assert_eq!(
            &query.selectors[0].ilike,
            &vec![("name".to_string(), format!("%{}%", word))]
        );
    }
}
