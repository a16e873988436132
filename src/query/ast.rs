//! Selector Abstract Syntax Tree
//!
//! Defines the tree the query language compiles into. A compiled query is an
//! [`Options`] record followed by one or more [`Selector`] nodes, which is
//! exactly the shape a storage driver consumes:
//!
//! ```text
//! [
//!   {"class": "User", "limit": 10},
//!   {"type": "&", "equal": [["name", "Marty McFly"]], "gt": [["age", 18]]}
//! ]
//! ```
//!
//! Every clause kind has a positive list and a negated list (`equal` and
//! `!equal`). Empty lists are never serialized.

use chrono::{DateTime, Utc};
use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};
use std::fmt;

use crate::query::error::{QueryError, QueryResult};
use crate::query::relative;

/// Logical combinator of a selector node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectorType {
    /// All clauses must match
    #[serde(rename = "&")]
    And,
    /// At least one clause must match
    #[serde(rename = "|")]
    Or,
    /// All clauses must fail to match
    #[serde(rename = "!&")]
    NotAnd,
    /// At least one clause must fail to match
    #[serde(rename = "!|")]
    NotOr,
}

impl SelectorType {
    /// Whether this combinator negates its clauses
    pub fn is_negated(&self) -> bool {
        matches!(self, Self::NotAnd | Self::NotOr)
    }

    /// Parse a group marker (`&`, `|`, `!&`, `!|`, or a bare `!`)
    pub fn from_marker(s: &str) -> Option<Self> {
        match s {
            "&" => Some(Self::And),
            "|" => Some(Self::Or),
            "!&" | "!" => Some(Self::NotAnd),
            "!|" => Some(Self::NotOr),
            _ => None,
        }
    }

    /// Canonical marker text
    pub fn marker(&self) -> &'static str {
        match self {
            Self::And => "&",
            Self::Or => "|",
            Self::NotAnd => "!&",
            Self::NotOr => "!|",
        }
    }
}

impl Default for SelectorType {
    fn default() -> Self {
        Self::And
    }
}

impl fmt::Display for SelectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.marker())
    }
}

/// Relational operand for `gt`, `gte`, `lt` and `lte`
///
/// Serializes as `[field, number]` or `[field, null, expression]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Comparison {
    /// `age>18`
    Absolute(String, Number),
    /// `cdate>yesterday`; the middle slot is always null
    Relative(String, (), String),
}

impl Comparison {
    /// Create an absolute comparison
    pub fn absolute(field: impl Into<String>, value: impl Into<Number>) -> Self {
        Self::Absolute(field.into(), value.into())
    }

    /// Create a relative-time comparison
    pub fn relative(field: impl Into<String>, expression: impl Into<String>) -> Self {
        Self::Relative(field.into(), (), expression.into())
    }

    /// Field being compared
    pub fn field(&self) -> &str {
        match self {
            Self::Absolute(field, _) | Self::Relative(field, _, _) => field,
        }
    }

    /// Numeric value of the operand
    ///
    /// Relative expressions resolve to a Unix timestamp in milliseconds,
    /// measured from `now`.
    pub fn resolve(&self, now: DateTime<Utc>) -> QueryResult<f64> {
        match self {
            Self::Absolute(_, number) => number.as_f64().ok_or_else(|| {
                QueryError::Parse(format!("Number out of range: {}", number))
            }),
            Self::Relative(_, _, expression) => {
                relative::resolve(expression, now).map(|dt| dt.timestamp_millis() as f64)
            }
        }
    }
}

/// Built-in fields a query may sort on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    /// Creation date
    Cdate,
    /// Modification date
    Mdate,
    /// Entity identifier
    Guid,
}

impl SortField {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "cdate" => Some(Self::Cdate),
            "mdate" => Some(Self::Mdate),
            "guid" => Some(Self::Guid),
            _ => None,
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cdate => write!(f, "cdate"),
            Self::Mdate => write!(f, "mdate"),
            Self::Guid => write!(f, "guid"),
        }
    }
}

/// Entity class a query targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityClass {
    /// Class name as written in qref clauses
    pub name: String,
    /// Fields searched by bare text (falls back to the parser's defaults)
    #[serde(default)]
    pub search_fields: Vec<String>,
}

impl EntityClass {
    /// Create a class descriptor with no search fields of its own
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            search_fields: Vec::new(),
        }
    }

    /// Builder method: set the bare-text search fields
    pub fn search_fields(mut self, fields: &[&str]) -> Self {
        self.search_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }
}

/// Query-level directives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// Target entity class name
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse: Option<bool>,
}

impl Options {
    /// Options targeting a class, with no directives
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            limit: None,
            offset: None,
            sort: None,
            reverse: None,
        }
    }
}

/// A node in the selector tree
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Selector {
    #[serde(rename = "type")]
    pub kind: SelectorType,

    /// Entity identifiers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guid: Vec<String>,
    #[serde(rename = "!guid", default, skip_serializing_if = "Vec::is_empty")]
    pub not_guid: Vec<String>,

    /// Entity tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag: Vec<String>,
    #[serde(rename = "!tag", default, skip_serializing_if = "Vec::is_empty")]
    pub not_tag: Vec<String>,

    /// Fields that are set
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defined: Vec<String>,
    #[serde(rename = "!defined", default, skip_serializing_if = "Vec::is_empty")]
    pub not_defined: Vec<String>,

    /// Fields with a truthy value
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub truthy: Vec<String>,
    #[serde(rename = "!truthy", default, skip_serializing_if = "Vec::is_empty")]
    pub not_truthy: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub equal: Vec<(String, Value)>,
    #[serde(rename = "!equal", default, skip_serializing_if = "Vec::is_empty")]
    pub not_equal: Vec<(String, Value)>,

    /// Array fields containing a value
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contain: Vec<(String, Value)>,
    #[serde(rename = "!contain", default, skip_serializing_if = "Vec::is_empty")]
    pub not_contain: Vec<(String, Value)>,

    /// POSIX regular expressions
    #[serde(rename = "match", default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<(String, String)>,
    #[serde(rename = "!match", default, skip_serializing_if = "Vec::is_empty")]
    pub not_matches: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imatch: Vec<(String, String)>,
    #[serde(rename = "!imatch", default, skip_serializing_if = "Vec::is_empty")]
    pub not_imatch: Vec<(String, String)>,

    /// SQL LIKE patterns (`%` and `_` wildcards)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub like: Vec<(String, String)>,
    #[serde(rename = "!like", default, skip_serializing_if = "Vec::is_empty")]
    pub not_like: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ilike: Vec<(String, String)>,
    #[serde(rename = "!ilike", default, skip_serializing_if = "Vec::is_empty")]
    pub not_ilike: Vec<(String, String)>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gt: Vec<Comparison>,
    #[serde(rename = "!gt", default, skip_serializing_if = "Vec::is_empty")]
    pub not_gt: Vec<Comparison>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gte: Vec<Comparison>,
    #[serde(rename = "!gte", default, skip_serializing_if = "Vec::is_empty")]
    pub not_gte: Vec<Comparison>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lt: Vec<Comparison>,
    #[serde(rename = "!lt", default, skip_serializing_if = "Vec::is_empty")]
    pub not_lt: Vec<Comparison>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lte: Vec<Comparison>,
    #[serde(rename = "!lte", default, skip_serializing_if = "Vec::is_empty")]
    pub not_lte: Vec<Comparison>,

    /// References to another entity by identifier
    #[serde(rename = "ref", default, skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<(String, String)>,
    #[serde(rename = "!ref", default, skip_serializing_if = "Vec::is_empty")]
    pub not_refs: Vec<(String, String)>,

    /// References to any entity matching a sub-query
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qref: Vec<(String, Query)>,
    #[serde(rename = "!qref", default, skip_serializing_if = "Vec::is_empty")]
    pub not_qref: Vec<(String, Query)>,

    /// Nested selectors
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selector: Vec<Selector>,
    #[serde(rename = "!selector", default, skip_serializing_if = "Vec::is_empty")]
    pub not_selector: Vec<Selector>,
}

impl Selector {
    /// Create an empty selector of the given type
    pub fn new(kind: SelectorType) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// Total number of clauses across all kinds
    pub fn clause_count(&self) -> usize {
        let strings = [
            &self.guid,
            &self.not_guid,
            &self.tag,
            &self.not_tag,
            &self.defined,
            &self.not_defined,
            &self.truthy,
            &self.not_truthy,
        ];
        let values = [&self.equal, &self.not_equal, &self.contain, &self.not_contain];
        let pairs = [
            &self.matches,
            &self.not_matches,
            &self.imatch,
            &self.not_imatch,
            &self.like,
            &self.not_like,
            &self.ilike,
            &self.not_ilike,
            &self.refs,
            &self.not_refs,
        ];
        let comparisons = [
            &self.gt,
            &self.not_gt,
            &self.gte,
            &self.not_gte,
            &self.lt,
            &self.not_lt,
            &self.lte,
            &self.not_lte,
        ];

        strings.iter().map(|v| v.len()).sum::<usize>()
            + values.iter().map(|v| v.len()).sum::<usize>()
            + pairs.iter().map(|v| v.len()).sum::<usize>()
            + comparisons.iter().map(|v| v.len()).sum::<usize>()
            + self.qref.len()
            + self.not_qref.len()
            + self.selector.len()
            + self.not_selector.len()
    }

    /// Whether any clause has been added
    pub fn has_clauses(&self) -> bool {
        self.clause_count() > 0
    }

    /// Whether this node is just `{type}`
    pub fn is_empty(&self) -> bool {
        !self.has_clauses()
    }

    /// Collapse a positive node that only wraps one nested selector
    ///
    /// `{type: "&", selector: [child]}` becomes `child`. Negated nodes are
    /// returned unchanged.
    pub fn simplify(mut self) -> Self {
        if !self.kind.is_negated() && self.selector.len() == 1 && self.clause_count() == 1 {
            if let Some(child) = self.selector.pop() {
                return child;
            }
        }
        self
    }
}

/// A compiled query: `[Options, ...Selector]`
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub options: Options,
    pub selectors: Vec<Selector>,
}

impl Query {
    /// Create a query from its parts
    pub fn new(options: Options, selectors: Vec<Selector>) -> Self {
        Self { options, selectors }
    }

    /// Serialize to the JSON transport form
    pub fn to_json(&self) -> QueryResult<String> {
        serde_json::to_string(self).map_err(QueryError::from)
    }

    /// Deserialize from the JSON transport form
    pub fn from_json(json: &str) -> QueryResult<Self> {
        serde_json::from_str(json).map_err(QueryError::from)
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(1 + self.selectors.len()))?;
        seq.serialize_element(&self.options)?;
        for selector in &self.selectors {
            seq.serialize_element(selector)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Query {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(QueryVisitor)
    }
}

struct QueryVisitor;

impl<'de> Visitor<'de> for QueryVisitor {
    type Value = Query;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of options followed by selectors")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Query, A::Error> {
        let options: Options = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;

        let mut selectors = Vec::new();
        while let Some(selector) = seq.next_element::<Selector>()? {
            selectors.push(selector);
        }

        Ok(Query { options, selectors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_selector_type_markers() {
        assert_eq!(SelectorType::from_marker("&"), Some(SelectorType::And));
        assert_eq!(SelectorType::from_marker("!"), Some(SelectorType::NotAnd));
        assert_eq!(SelectorType::from_marker("!|"), Some(SelectorType::NotOr));
        assert_eq!(SelectorType::from_marker("?"), None);
        assert!(SelectorType::NotOr.is_negated());
        assert!(!SelectorType::Or.is_negated());
        assert_eq!(SelectorType::NotAnd.to_string(), "!&");
    }

    #[test]
    fn test_empty_selector_serializes_type_only() {
        let selector = Selector::new(SelectorType::And);
        assert_eq!(serde_json::to_value(&selector).unwrap(), json!({"type": "&"}));
        assert!(selector.is_empty());
    }

    #[test]
    fn test_selector_serializes_negated_keys() {
        let mut selector = Selector::new(SelectorType::Or);
        selector.not_equal.push(("age".to_string(), json!(5)));
        selector.gt.push(Comparison::absolute("age", 18));
        selector.lt.push(Comparison::relative("cdate", "yesterday"));
        selector.refs.push(("owner".to_string(), "a".repeat(24)));

        let value = serde_json::to_value(&selector).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "|",
                "!equal": [["age", 5]],
                "gt": [["age", 18]],
                "lt": [["cdate", null, "yesterday"]],
                "ref": [["owner", "a".repeat(24)]],
            })
        );
    }

    #[test]
    fn test_comparison_deserialize_both_forms() {
        let abs: Comparison = serde_json::from_value(json!(["age", 18])).unwrap();
        assert_eq!(abs, Comparison::absolute("age", 18));

        let rel: Comparison = serde_json::from_value(json!(["cdate", null, "2 days ago"])).unwrap();
        assert_eq!(rel, Comparison::relative("cdate", "2 days ago"));
        assert_eq!(rel.field(), "cdate");
    }

    #[test]
    fn test_comparison_resolve_absolute() {
        let now = Utc::now();
        let cmp = Comparison::absolute("age", Number::from_f64(1.5).unwrap());
        assert_eq!(cmp.resolve(now).unwrap(), 1.5);
    }

    #[test]
    fn test_simplify_collapses_positive_wrapper() {
        let mut child = Selector::new(SelectorType::Or);
        child.tag.push("x".to_string());

        let mut parent = Selector::new(SelectorType::And);
        parent.selector.push(child.clone());
        assert_eq!(parent.simplify(), child);
    }

    #[test]
    fn test_simplify_keeps_negated_wrapper() {
        let mut child = Selector::new(SelectorType::Or);
        child.tag.push("x".to_string());

        let mut parent = Selector::new(SelectorType::NotAnd);
        parent.selector.push(child);
        let simplified = parent.clone().simplify();
        assert_eq!(simplified, parent);
    }

    #[test]
    fn test_simplify_keeps_wrapper_with_other_clauses() {
        let mut parent = Selector::new(SelectorType::And);
        parent.selector.push(Selector::new(SelectorType::Or));
        parent.truthy.push("enabled".to_string());
        assert_eq!(parent.clone().simplify(), parent);
    }

    #[test]
    fn test_query_json_shape() {
        let mut options = Options::new("User");
        options.limit = Some(10);
        let mut selector = Selector::new(SelectorType::And);
        selector.tag.push("archived".to_string());

        let query = Query::new(options, vec![selector]);
        let json = query.to_json().unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(&json).unwrap(),
            json!([{"class": "User", "limit": 10}, {"type": "&", "tag": ["archived"]}])
        );

        assert_eq!(Query::from_json(&json).unwrap(), query);
    }

    #[test]
    fn test_query_from_json_requires_options() {
        assert!(Query::from_json("[]").is_err());
        assert!(Query::from_json("{}").is_err());
    }

    #[test]
    fn test_sort_field() {
        assert_eq!(SortField::from_str("mdate"), Some(SortField::Mdate));
        assert_eq!(SortField::from_str("name"), None);
        assert_eq!(SortField::Cdate.to_string(), "cdate");
    }
}
