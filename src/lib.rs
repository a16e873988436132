//! # entity-query
//!
//! A selector-language compiler for entity stores. A query string such as
//!
//! ```text
//! name="Marty McFly" age>18 <archived> [enabled] limit:10
//! ```
//!
//! compiles to `[Options, ...Selector]`, the structure a storage driver
//! walks to find matching entities. The crate never touches storage itself.
//!
//! ## Modules
//!
//! - [`query`]: Parser, selector types and relative-time resolution
//! - [`config`]: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust
//! use entity_query::{EntityClass, QueryParser};
//!
//! let parser = QueryParser::new().register(EntityClass::new("Group"));
//! let query = parser.parse(
//!     r#"name="Marty McFly" group<{Group name=admins}> limit:10"#,
//!     &EntityClass::new("User"),
//! );
//!
//! assert_eq!(query.options.class, "User");
//! assert_eq!(query.options.limit, Some(10));
//! println!("{}", query.to_json().unwrap());
//! ```

pub mod config;
pub mod query;

// Re-export top-level types for convenience
pub use query::{
    parse_query, BareHandler, Comparison, EntityClass, EscapeKind, IlikeBareHandler, Options,
    Query, QueryError, QueryParser, QueryResult, Selector, SelectorType, SortField,
};

pub use config::{Config, ConfigError, LoggingConfig, ParserConfig};
