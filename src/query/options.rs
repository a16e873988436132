//! Query option directives
//!
//! `limit:N`, `offset:N`, `sort:FIELD` and `reverse:true|false|1|0` are read
//! from the outermost query text only. The first occurrence of each wins;
//! every occurrence is removed.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::query::ast::{Options, SortField};
use crate::query::extract::{strip_tokens, token};

static LIMIT_RE: Lazy<Regex> = Lazy::new(|| token(r"limit:(?P<value>\d+)"));
static OFFSET_RE: Lazy<Regex> = Lazy::new(|| token(r"offset:(?P<value>\d+)"));
static SORT_RE: Lazy<Regex> = Lazy::new(|| token(r"sort:(?P<value>\w+)"));
static REVERSE_RE: Lazy<Regex> = Lazy::new(|| token(r"reverse:(?P<value>true|false|1|0)"));

/// Move every directive in `text` into `options`, returning the rest
pub fn extract_options(text: &str, options: &mut Options) -> String {
    let text = strip_tokens(&LIMIT_RE, text, |caps| {
        if options.limit.is_none() {
            options.limit = caps["value"].parse().ok();
        }
        true
    });

    let text = strip_tokens(&OFFSET_RE, &text, |caps| {
        if options.offset.is_none() {
            options.offset = caps["value"].parse().ok();
        }
        true
    });

    let mut sort_seen = false;
    let text = strip_tokens(&SORT_RE, &text, |caps| {
        if !sort_seen {
            sort_seen = true;
            options.sort = SortField::from_str(&caps["value"]);
            if options.sort.is_none() {
                tracing::debug!(sort = &caps["value"], "ignoring unsortable field");
            }
        }
        true
    });

    strip_tokens(&REVERSE_RE, &text, |caps| {
        if options.reverse.is_none() {
            options.reverse = Some(matches!(&caps["value"], "true" | "1"));
        }
        true
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> (String, Options) {
        let mut options = Options::new("User");
        let rest = extract_options(text, &mut options);
        (rest, options)
    }

    #[test]
    fn test_all_directives() {
        let (rest, options) = extract("a=1 limit:10 offset:20 sort:mdate reverse:true");
        assert_eq!(rest.trim(), "a=1");
        assert_eq!(options.limit, Some(10));
        assert_eq!(options.offset, Some(20));
        assert_eq!(options.sort, Some(SortField::Mdate));
        assert_eq!(options.reverse, Some(true));
    }

    #[test]
    fn test_first_match_wins_and_all_are_stripped() {
        let (rest, options) = extract("limit:5 limit:7 reverse:0 reverse:1");
        assert!(rest.trim().is_empty());
        assert_eq!(options.limit, Some(5));
        assert_eq!(options.reverse, Some(false));
    }

    #[test]
    fn test_unknown_sort_is_stripped_and_ignored() {
        let (rest, options) = extract("sort:name sort:cdate");
        assert!(rest.trim().is_empty());
        assert_eq!(options.sort, None);
    }

    #[test]
    fn test_directives_need_word_boundaries() {
        let (rest, options) = extract("xlimit:5 limit:5x limit:-1 reverse:yes");
        assert_eq!(rest, "xlimit:5 limit:5x limit:-1 reverse:yes");
        assert_eq!(options, Options::new("User"));
    }

    #[test]
    fn test_oversized_limit_dropped() {
        let (rest, options) = extract("limit:99999999999999999999999");
        assert!(rest.trim().is_empty());
        assert_eq!(options.limit, None);
    }
}
