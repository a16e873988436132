//! entity-query CLI
//!
//! Command-line interface for the query compiler:
//! - Compile queries to selector JSON
//! - Escape and unescape literal text
//! - Resolve relative-time expressions
//! - Generate a config file

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use entity_query::config::{generate_default_config, Config, LoggingConfig};
use entity_query::query::{escape, relative, unescape, EscapeKind, QueryParser};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "entity-query")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile entity query strings into selector trees")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a query and print `[Options, ...Selector]` as JSON
    Parse {
        /// Query string
        query: String,
        /// Entity class the query targets
        #[arg(long, default_value = "Entity")]
        class: String,
        /// Bare-text search field (repeatable, overrides config)
        #[arg(short, long = "field")]
        fields: Vec<String>,
        /// Extra class that qref clauses may target (repeatable)
        #[arg(short = 'k', long = "known-class")]
        known_classes: Vec<String>,
        /// Pretty-print the JSON
        #[arg(short, long)]
        pretty: bool,
    },

    /// Escape text for use inside a literal
    Escape {
        text: String,
        /// Literal kind (quote, angle, curly)
        #[arg(long, default_value = "quote")]
        kind: String,
    },

    /// Reverse `escape`
    Unescape {
        text: String,
        /// Literal kind (quote, angle, curly)
        #[arg(long, default_value = "quote")]
        kind: String,
    },

    /// Resolve a relative-time expression such as "2 days ago"
    ResolveTime { expression: String },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_tracing(&config.logging);

    match cli.command {
        Commands::Parse {
            query,
            class,
            fields,
            known_classes,
            pretty,
        } => {
            let mut parser_config = config.parser.clone();
            if !fields.is_empty() {
                parser_config.default_fields = fields;
            }
            parser_config.classes.extend(known_classes);
            parser_config.classes.push(class.clone());

            let parser = QueryParser::from_config(&parser_config);
            let compiled = parser.parse_for(&query, &class)?;

            let json = if pretty {
                serde_json::to_string_pretty(&compiled)?
            } else {
                compiled.to_json()?
            };
            println!("{}", json);
        }

        Commands::Escape { text, kind } => {
            let kind = parse_kind(&kind)?;
            println!("{}", escape(kind, &text));
        }

        Commands::Unescape { text, kind } => {
            let kind = parse_kind(&kind)?;
            println!("{}", unescape(kind, &text));
        }

        Commands::ResolveTime { expression } => {
            let instant = relative::resolve(&expression, Utc::now())?;
            println!("{}\t{}", instant.timestamp_millis(), instant.to_rfc3339());
        }

        Commands::Config { output } => {
            let config = generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)
                        .with_context(|| format!("writing {:?}", path))?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

fn parse_kind(kind: &str) -> anyhow::Result<EscapeKind> {
    EscapeKind::from_str(kind)
        .with_context(|| format!("unknown escape kind {:?}, use quote, angle or curly", kind))
}

/// Logs go to stderr so stdout stays machine-readable
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("entity_query={}", logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
