//! Selector tree builder
//!
//! Compiles a query string into `[Options, ...Selector]`.
//!
//! # Pipeline
//!
//! ```text
//! split groups → build each group (recursively)
//!              → options (outermost level only)
//!              → clause extractors
//!              → bare-text fallback
//!              → simplify
//! ```
//!
//! # Examples
//!
//! ```rust
//! use entity_query::query::{EntityClass, QueryParser};
//!
//! let parser = QueryParser::new();
//! let query = parser.parse(r#"name="Marty McFly" age>18 limit:5"#, &EntityClass::new("User"));
//!
//! assert_eq!(query.options.limit, Some(5));
//! assert_eq!(query.selectors.len(), 1);
//! ```
//!
//! Parsing never fails. Malformed fragments are dropped or searched as bare
//! text, so any input yields at least `[Options, {"type": "&"}]`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ParserConfig;
use crate::query::ast::{EntityClass, Options, Query, Selector, SelectorType};
use crate::query::error::{QueryError, QueryResult};
use crate::query::extract::{extract_clauses, Context};
use crate::query::options::extract_options;
use crate::query::splitter::split_groups;

/// Strategy for text no clause extractor claimed
///
/// Closures with the same signature implement this trait.
pub trait BareHandler: Send + Sync {
    /// Build a selector for `text`, or `None` to ignore it
    fn handle(&self, text: &str, class: &EntityClass, default_fields: &[String])
        -> Option<Selector>;
}

impl<F> BareHandler for F
where
    F: Fn(&str, &EntityClass, &[String]) -> Option<Selector> + Send + Sync,
{
    fn handle(
        &self,
        text: &str,
        class: &EntityClass,
        default_fields: &[String],
    ) -> Option<Selector> {
        self(text, class, default_fields)
    }
}

/// Default bare-text strategy: case-insensitive LIKE across default fields
///
/// `hunter` becomes `{"type": "|", "ilike": [["name", "%hunter%"]]}`. Text
/// that already contains `%` or `_` is used as the pattern verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct IlikeBareHandler;

impl BareHandler for IlikeBareHandler {
    fn handle(
        &self,
        text: &str,
        _class: &EntityClass,
        default_fields: &[String],
    ) -> Option<Selector> {
        if default_fields.is_empty() {
            return None;
        }

        let pattern = if text.contains(['%', '_']) {
            text.to_string()
        } else {
            format!("%{}%", text)
        };

        let mut selector = Selector::new(SelectorType::Or);
        selector.ilike = default_fields
            .iter()
            .map(|field| (field.clone(), pattern.clone()))
            .collect();
        Some(selector)
    }
}

/// Default bare-text search fields
pub const DEFAULT_FIELDS: &[&str] = &["name"];

/// Default limit on group and qref nesting
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Query string compiler
///
/// Holds the classes qref clauses may target, the bare-text search fields,
/// and the bare-text strategy. A parser is immutable once built and can be
/// shared across threads.
#[derive(Clone)]
pub struct QueryParser {
    default_fields: Vec<String>,
    classes: HashMap<String, EntityClass>,
    bare_handler: Arc<dyn BareHandler>,
    max_depth: usize,
}

impl QueryParser {
    /// Create a parser with default settings and no registered classes
    pub fn new() -> Self {
        Self {
            default_fields: DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect(),
            classes: HashMap::new(),
            bare_handler: Arc::new(IlikeBareHandler),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Create a parser from configuration
    pub fn from_config(config: &ParserConfig) -> Self {
        let mut parser = Self::new();
        parser.default_fields = config.default_fields.clone();
        parser.max_depth = config.max_depth;
        for name in &config.classes {
            parser = parser.register(EntityClass::new(name.as_str()));
        }
        parser
    }

    /// Builder method: set the bare-text search fields
    pub fn default_fields(mut self, fields: &[&str]) -> Self {
        self.default_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Builder method: make a class available to qref clauses
    pub fn register(mut self, class: EntityClass) -> Self {
        self.classes.insert(class.name.clone(), class);
        self
    }

    /// Builder method: replace the bare-text strategy
    pub fn bare_handler(mut self, handler: impl BareHandler + 'static) -> Self {
        self.bare_handler = Arc::new(handler);
        self
    }

    /// Builder method: limit group and qref nesting
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Look up a registered class by name
    pub fn class(&self, name: &str) -> Option<&EntityClass> {
        self.classes.get(name)
    }

    /// Compile `query` against `class`
    pub fn parse(&self, query: &str, class: &EntityClass) -> Query {
        self.compile(query, class, 0)
    }

    /// Compile `query` against a registered class
    pub fn parse_for(&self, query: &str, class_name: &str) -> QueryResult<Query> {
        let class = self
            .class(class_name)
            .ok_or_else(|| QueryError::UnknownClass(class_name.to_string()))?;
        Ok(self.parse(query, class))
    }

    pub(crate) fn exceeds_depth(&self, depth: usize) -> bool {
        depth > self.max_depth
    }

    /// Compile a full query at the given nesting depth
    pub(crate) fn compile(&self, input: &str, class: &EntityClass, depth: usize) -> Query {
        let mut options = Options::new(class.name.as_str());
        let mut selector = Selector::new(SelectorType::And);

        let split = split_groups(input);
        for group in split.groups {
            if let Some(child) = self.build_group(group.body, group.kind, class, depth + 1) {
                selector.selector.push(child);
            }
        }

        let text = extract_options(&split.remainder, &mut options);
        let ctx = Context {
            parser: self,
            depth,
        };
        let rest = extract_clauses(&text, &mut selector, &ctx);

        let bare = bare_text(&rest)
            .and_then(|text| self.bare_handler.handle(&text, class, self.search_fields(class)));

        let selector = selector.simplify();
        let mut selectors = Vec::with_capacity(2);
        if selector.has_clauses() || bare.is_none() {
            selectors.push(selector);
        }
        selectors.extend(bare);

        tracing::debug!(
            class = %class.name,
            depth,
            selectors = selectors.len(),
            "compiled query"
        );

        Query::new(options, selectors)
    }

    /// Build the selector for one parenthesized group
    ///
    /// Bare text inside a group is nested under the group so the group's
    /// combinator applies to it. Groups that end up empty are dropped.
    fn build_group(
        &self,
        body: &str,
        kind: SelectorType,
        class: &EntityClass,
        depth: usize,
    ) -> Option<Selector> {
        if self.exceeds_depth(depth) {
            tracing::debug!(depth, "dropping group nested too deeply");
            return None;
        }

        let mut selector = Selector::new(kind);

        let split = split_groups(body);
        for group in split.groups {
            if let Some(child) = self.build_group(group.body, group.kind, class, depth + 1) {
                selector.selector.push(child);
            }
        }

        let ctx = Context {
            parser: self,
            depth,
        };
        let rest = extract_clauses(&split.remainder, &mut selector, &ctx);

        if let Some(text) = bare_text(&rest) {
            if let Some(bare) = self.bare_handler.handle(&text, class, self.search_fields(class)) {
                selector.selector.push(bare);
            }
        }

        if selector.is_empty() {
            tracing::debug!(kind = %kind, "dropping empty group");
            return None;
        }

        Some(selector.simplify())
    }

    /// Bare-text fields for `class`
    fn search_fields<'a>(&'a self, class: &'a EntityClass) -> &'a [String] {
        if class.search_fields.is_empty() {
            &self.default_fields
        } else {
            &class.search_fields
        }
    }
}

impl Default for QueryParser {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for QueryParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut classes: Vec<_> = self.classes.keys().collect();
        classes.sort();
        f.debug_struct("QueryParser")
            .field("default_fields", &self.default_fields)
            .field("classes", &classes)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

/// Leftover text with whitespace runs collapsed, if any remains
fn bare_text(rest: &str) -> Option<String> {
    let text = rest.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Compile `query` with a default parser
pub fn parse_query(query: &str, class: &EntityClass) -> Query {
    QueryParser::new().parse(query, class)
}
