//! Entity Query Compiler
//!
//! Compiles a compact query string into a selector tree for an entity
//! store driver:
//!
//! - **AST**: selector, option and comparison types
//! - **Splitter**: top-level parenthesized groups
//! - **Extractors**: one per clause syntax, run in a fixed order
//! - **Parser**: assembles the tree and handles bare text
//! - **Relative**: resolves relative-time operands
//!
//! # Query Language
//!
//! ```text
//! field=value          field!=value        equal
//! field<value>         field!<value>       contain
//! field~/re/[i]        field~"pat"[i]      match / like
//! field>N  field>=N  field<N  field<=N     relational (numbers or times)
//! field<{guid}>        field<{Class q}>    ref / qref
//! {guid}  [field]  <tag>                   guid / truthy / tag
//! (...) (&...) (|...) (!...) (!|...)       nested groups
//! limit:N offset:N sort:cdate reverse:1    options
//! ```
//!
//! Any text no clause claims is searched as a case-insensitive substring of
//! the class's default fields.
//!
//! # Examples
//!
//! ```rust
//! use entity_query::query::{EntityClass, QueryParser, SelectorType};
//!
//! let parser = QueryParser::new();
//! let query = parser.parse("(|tag<blue> tag<green>) [enabled]", &EntityClass::new("Item"));
//!
//! let root = &query.selectors[0];
//! assert_eq!(root.kind, SelectorType::And);
//! assert_eq!(root.selector[0].kind, SelectorType::Or);
//! ```

mod ast;
mod error;
pub mod escape;
mod extract;
mod options;
mod parser;
pub mod relative;
mod splitter;

pub use ast::{Comparison, EntityClass, Options, Query, Selector, SelectorType, SortField};
pub use error::{QueryError, QueryResult};
pub use escape::{escape, unescape, EscapeKind};
pub use parser::{
    parse_query, BareHandler, IlikeBareHandler, QueryParser, DEFAULT_FIELDS, DEFAULT_MAX_DEPTH,
};
