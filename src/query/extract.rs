//! Clause extraction
//!
//! Each extractor claims every whitespace-delimited occurrence of one clause
//! syntax, records it on the selector being built, and returns the text with
//! those occurrences removed. Extractors run in a fixed order: earlier
//! patterns are more specific and must claim their syntax before broader
//! patterns see it.
//!
//! ```text
//! qref → equal → ref → contain → match → like → guid → truthy → tag
//!      → gt → gte → lt → lte   (absolute numbers before relative times)
//! ```

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Number, Value};
use std::ops::Range;

use crate::query::ast::{Comparison, Selector};
use crate::query::escape::{unescape, EscapeKind};
use crate::query::parser::QueryParser;

/// Field name followed by an optional negation mark
const FIELD: &str = r"(?P<field>[\w$.-]+)(?P<not>!)?";

/// Double-quoted literal, possibly empty
const QUOTED: &str = r#""(?:\\.|[^"\\])*""#;

/// Double-quoted literal with at least one character
const QUOTED_NONEMPTY: &str = r#""(?:\\.|[^"\\])+""#;

const NUMBER: &str = r"-?\d+(?:\.\d+)?";

/// Wrap a clause pattern so it only matches a whole whitespace-delimited token
pub(crate) fn token(pattern: &str) -> Regex {
    let full = format!(r"(?:^|\s)(?P<tok>{})(?:\s|$)", pattern);
    Regex::new(&full).unwrap()
}

static LITERAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#"[=~<>]{}[i>]?(?:\s|$)|~/(?:\\.|[^\\/])+/i?(?:\s|$)"#,
        QUOTED
    ))
    .unwrap()
});

static QREF_RE: Lazy<Regex> =
    Lazy::new(|| token(&format!(r"{}<\{{(?P<body>(?:\\.|[^\\}}])+)\}}>", FIELD)));

static EQUAL_RE: Lazy<Regex> =
    Lazy::new(|| token(&format!(r#"{}=(?P<value>{}|[^\s"]\S*)"#, FIELD, QUOTED)));

static REF_RE: Lazy<Regex> =
    Lazy::new(|| token(&format!(r"{}<\{{(?P<guid>[0-9a-fA-F]{{24}})\}}>", FIELD)));

static GUID_ONLY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{24}$").unwrap());

static CONTAIN_RE: Lazy<Regex> =
    Lazy::new(|| token(&format!(r"{}<(?P<value>(?:\\.|[^\\<>])+)>", FIELD)));

static MATCH_RE: Lazy<Regex> = Lazy::new(|| {
    token(&format!(
        r"{}~/(?P<pattern>(?:\\.|[^\\/])+)/(?P<insensitive>i)?",
        FIELD
    ))
});

static LIKE_RE: Lazy<Regex> = Lazy::new(|| {
    token(&format!(
        r#"{}~(?:(?P<quoted>""|{})(?P<insensitive>i)?|(?P<bare>[^\s"]\S*))"#,
        FIELD, QUOTED_NONEMPTY
    ))
});

static GUID_RE: Lazy<Regex> =
    Lazy::new(|| token(r"\{(?P<not>!)?(?P<guid>[0-9a-fA-F]{24})\}"));

static TRUTHY_RE: Lazy<Regex> = Lazy::new(|| token(r"\[(?P<not>!)?(?P<field>[\w$.-]+)\]"));

static TAG_RE: Lazy<Regex> = Lazy::new(|| token(r"<(?P<not>!)?(?P<tag>[^\s<>!][^\s<>]*)>"));

static GT_RE: Lazy<Regex> =
    Lazy::new(|| token(&format!(r"{}>(?P<value>{})", FIELD, NUMBER)));
static GT_RELATIVE_RE: Lazy<Regex> = Lazy::new(|| {
    token(&format!(
        r#"{}>(?P<value>{}|[^\s"=]\S*)"#,
        FIELD, QUOTED_NONEMPTY
    ))
});

static GTE_RE: Lazy<Regex> =
    Lazy::new(|| token(&format!(r"{}>=(?P<value>{})", FIELD, NUMBER)));
static GTE_RELATIVE_RE: Lazy<Regex> = Lazy::new(|| {
    token(&format!(
        r#"{}>=(?P<value>{}|[^\s"]\S*)"#,
        FIELD, QUOTED_NONEMPTY
    ))
});

static LT_RE: Lazy<Regex> =
    Lazy::new(|| token(&format!(r"{}<(?P<value>{})", FIELD, NUMBER)));
static LT_RELATIVE_RE: Lazy<Regex> = Lazy::new(|| {
    token(&format!(
        r#"{}<(?P<value>{}|[^\s"=]\S*)"#,
        FIELD, QUOTED_NONEMPTY
    ))
});

static LTE_RE: Lazy<Regex> =
    Lazy::new(|| token(&format!(r"{}<=(?P<value>{})", FIELD, NUMBER)));
static LTE_RELATIVE_RE: Lazy<Regex> = Lazy::new(|| {
    token(&format!(
        r#"{}<=(?P<value>{}|[^\s"]\S*)"#,
        FIELD, QUOTED_NONEMPTY
    ))
});

/// State shared by the extractors of one parse level
pub(crate) struct Context<'a> {
    pub parser: &'a QueryParser,
    pub depth: usize,
}

/// One stage of the pipeline: `(text, node) -> text'`
pub(crate) type Extractor = fn(&str, &mut Selector, &Context<'_>) -> String;

/// Extractors in the order they must run
pub(crate) const PIPELINE: &[(&str, Extractor)] = &[
    ("qref", extract_qref),
    ("equal", extract_equal),
    ("ref", extract_ref),
    ("contain", extract_contain),
    ("match", extract_match),
    ("like", extract_like),
    ("guid", extract_guid),
    ("truthy", extract_truthy),
    ("tag", extract_tag),
    ("gt", extract_gt),
    ("gte", extract_gte),
    ("lt", extract_lt),
    ("lte", extract_lte),
];

/// Run every extractor over `text`, returning what none of them claimed
pub(crate) fn extract_clauses(text: &str, selector: &mut Selector, ctx: &Context<'_>) -> String {
    PIPELINE.iter().fold(text.to_string(), |remaining, (name, extractor)| {
        let next = extractor(&remaining, &mut *selector, ctx);
        tracing::trace!(stage = *name, remaining = %next.trim(), "clause stage");
        next
    })
}

/// Byte spans of quoted literals and regex bodies that follow an operator
///
/// A token starting inside one of these belongs to the literal, not to a
/// clause of its own (`name~"a b=c"` holds no `equal` clause). Only literals
/// that end a token count, so an unclosed `a~/x` masks nothing.
fn literal_spans(text: &str) -> Vec<Range<usize>> {
    LITERAL_RE
        .find_iter(text)
        .map(|m| m.start() + 1..m.end())
        .collect()
}

/// Claim every token matched by `re`
///
/// `on_match` returns whether it claimed the token. Claimed tokens are cut
/// out of the returned text; unclaimed ones stay for later extractors.
pub(crate) fn strip_tokens<F>(re: &Regex, text: &str, mut on_match: F) -> String
where
    F: FnMut(&Captures<'_>) -> bool,
{
    let literals = literal_spans(text);
    let mut claimed: Vec<Range<usize>> = Vec::new();
    let mut pos = 0;

    while pos <= text.len() {
        let Some(caps) = re.captures_at(text, pos) else {
            break;
        };
        let Some(tok) = caps.name("tok") else {
            break;
        };

        let inside_literal = literals
            .iter()
            .any(|lit| lit.start < tok.start() && tok.start() < lit.end);

        if inside_literal {
            // Resume one character into the token so its tail is still scanned
            let step = text[tok.start()..].chars().next().map_or(1, char::len_utf8);
            pos = tok.start() + step;
            continue;
        }

        if on_match(&caps) {
            claimed.push(tok.range());
        }
        pos = tok.end();
    }

    if claimed.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for span in claimed {
        out.push_str(&text[last..span.start]);
        out.push(' ');
        last = span.end;
    }
    out.push_str(&text[last..]);
    out
}

fn is_negated(caps: &Captures<'_>) -> bool {
    caps.name("not").is_some()
}

fn field(caps: &Captures<'_>) -> String {
    caps["field"].to_string()
}

/// Value of an `equal` or `contain` clause
///
/// Structured JSON literals (numbers, booleans, null, arrays, objects) are
/// kept as such; anything else becomes a string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Strip the surrounding quotes of a quoted literal and unescape it
fn unquote(raw: &str) -> Option<String> {
    let inner = raw.strip_prefix('"')?.strip_suffix('"')?;
    Some(unescape(EscapeKind::Quote, inner))
}

fn parse_number(raw: &str) -> Option<Number> {
    raw.parse::<i64>()
        .ok()
        .map(Number::from)
        .or_else(|| raw.parse::<f64>().ok().and_then(Number::from_f64))
}

fn push<T>(selector_lists: (&mut Vec<T>, &mut Vec<T>), negated: bool, item: T) {
    let (positive, negative) = selector_lists;
    if negated {
        negative.push(item);
    } else {
        positive.push(item);
    }
}

fn extract_qref(text: &str, selector: &mut Selector, ctx: &Context<'_>) -> String {
    strip_tokens(&QREF_RE, text, |caps| {
        let body = &caps["body"];
        if GUID_ONLY_RE.is_match(body) {
            // Literal reference, handled by the ref extractor
            return false;
        }

        let body = unescape(EscapeKind::Curly, body);
        let body = body.trim();
        let (class_name, subquery) = body
            .split_once(char::is_whitespace)
            .unwrap_or((body, ""));

        let Some(class) = ctx.parser.class(class_name) else {
            tracing::debug!(class = class_name, "dropping qref to unknown class");
            return true;
        };

        if ctx.parser.exceeds_depth(ctx.depth + 1) {
            tracing::debug!(class = class_name, "dropping qref nested too deeply");
            return true;
        }
        let query = ctx.parser.compile(subquery, class, ctx.depth + 1);

        push(
            (&mut selector.qref, &mut selector.not_qref),
            is_negated(caps),
            (field(caps), query),
        );
        true
    })
}

fn extract_equal(text: &str, selector: &mut Selector, _ctx: &Context<'_>) -> String {
    strip_tokens(&EQUAL_RE, text, |caps| {
        let raw = &caps["value"];
        let value = if raw.starts_with('"') {
            match unquote(raw) {
                Some(s) => Value::String(s),
                None => return true,
            }
        } else {
            parse_value(raw)
        };

        push(
            (&mut selector.equal, &mut selector.not_equal),
            is_negated(caps),
            (field(caps), value),
        );
        true
    })
}

fn extract_ref(text: &str, selector: &mut Selector, _ctx: &Context<'_>) -> String {
    strip_tokens(&REF_RE, text, |caps| {
        push(
            (&mut selector.refs, &mut selector.not_refs),
            is_negated(caps),
            (field(caps), caps["guid"].to_string()),
        );
        true
    })
}

fn extract_contain(text: &str, selector: &mut Selector, _ctx: &Context<'_>) -> String {
    strip_tokens(&CONTAIN_RE, text, |caps| {
        let raw = unescape(EscapeKind::Angle, &caps["value"]);
        push(
            (&mut selector.contain, &mut selector.not_contain),
            is_negated(caps),
            (field(caps), parse_value(&raw)),
        );
        true
    })
}

fn extract_match(text: &str, selector: &mut Selector, _ctx: &Context<'_>) -> String {
    strip_tokens(&MATCH_RE, text, |caps| {
        let pattern = caps["pattern"].replace(r"\/", "/");
        let item = (field(caps), pattern);
        let negated = is_negated(caps);

        if caps.name("insensitive").is_some() {
            push((&mut selector.imatch, &mut selector.not_imatch), negated, item);
        } else {
            push((&mut selector.matches, &mut selector.not_matches), negated, item);
        }
        true
    })
}

fn extract_like(text: &str, selector: &mut Selector, _ctx: &Context<'_>) -> String {
    strip_tokens(&LIKE_RE, text, |caps| {
        let value = match (caps.name("quoted"), caps.name("bare")) {
            (Some(quoted), _) => match unquote(quoted.as_str()) {
                Some(s) => s,
                None => return true,
            },
            (None, Some(bare)) => bare.as_str().to_string(),
            (None, None) => return true,
        };
        let item = (field(caps), value);
        let negated = is_negated(caps);

        if caps.name("insensitive").is_some() {
            push((&mut selector.ilike, &mut selector.not_ilike), negated, item);
        } else {
            push((&mut selector.like, &mut selector.not_like), negated, item);
        }
        true
    })
}

fn extract_guid(text: &str, selector: &mut Selector, _ctx: &Context<'_>) -> String {
    strip_tokens(&GUID_RE, text, |caps| {
        push(
            (&mut selector.guid, &mut selector.not_guid),
            is_negated(caps),
            caps["guid"].to_string(),
        );
        true
    })
}

fn extract_truthy(text: &str, selector: &mut Selector, _ctx: &Context<'_>) -> String {
    strip_tokens(&TRUTHY_RE, text, |caps| {
        push(
            (&mut selector.truthy, &mut selector.not_truthy),
            is_negated(caps),
            field(caps),
        );
        true
    })
}

fn extract_tag(text: &str, selector: &mut Selector, _ctx: &Context<'_>) -> String {
    strip_tokens(&TAG_RE, text, |caps| {
        push(
            (&mut selector.tag, &mut selector.not_tag),
            is_negated(caps),
            caps["tag"].to_string(),
        );
        true
    })
}

/// Absolute pass, then relative pass over what the absolute pass left
fn extract_comparison(
    text: &str,
    absolute: &Regex,
    relative: &Regex,
    lists: (&mut Vec<Comparison>, &mut Vec<Comparison>),
) -> String {
    let (positive, negative) = lists;

    let text = strip_tokens(absolute, text, |caps| {
        let Some(number) = parse_number(&caps["value"]) else {
            tracing::debug!(value = &caps["value"], "dropping unparseable number");
            return true;
        };
        let target = if is_negated(caps) { &mut *negative } else { &mut *positive };
        target.push(Comparison::Absolute(field(caps), number));
        true
    });

    strip_tokens(relative, &text, |caps| {
        let raw = &caps["value"];
        let expression = if raw.starts_with('"') {
            match unquote(raw) {
                Some(s) => s,
                None => return true,
            }
        } else {
            raw.to_string()
        };
        let target = if is_negated(caps) { &mut *negative } else { &mut *positive };
        target.push(Comparison::relative(field(caps), expression));
        true
    })
}

fn extract_gt(text: &str, selector: &mut Selector, _ctx: &Context<'_>) -> String {
    extract_comparison(
        text,
        &GT_RE,
        &GT_RELATIVE_RE,
        (&mut selector.gt, &mut selector.not_gt),
    )
}

fn extract_gte(text: &str, selector: &mut Selector, _ctx: &Context<'_>) -> String {
    extract_comparison(
        text,
        &GTE_RE,
        &GTE_RELATIVE_RE,
        (&mut selector.gte, &mut selector.not_gte),
    )
}

fn extract_lt(text: &str, selector: &mut Selector, _ctx: &Context<'_>) -> String {
    extract_comparison(
        text,
        &LT_RE,
        &LT_RELATIVE_RE,
        (&mut selector.lt, &mut selector.not_lt),
    )
}

fn extract_lte(text: &str, selector: &mut Selector, _ctx: &Context<'_>) -> String {
    extract_comparison(
        text,
        &LTE_RE,
        &LTE_RELATIVE_RE,
        (&mut selector.lte, &mut selector.not_lte),
    )
}
