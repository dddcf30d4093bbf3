//! relq - compiles declarative query models into resolved relational statements
//!
//! This crate turns a query model (generator clauses plus result operators) into one normalized
//! SELECT tree through:
//! - Preparation: clauses, expressions and result operators into a partially resolved statement
//! - Mapping resolution: tables, joins and members bound through a pluggable mapping resolver
//! - SQL context: boolean-as-integer emulation for targets without a boolean value type
//!
//! Rendering the tree into SQL text is left to a downstream consumer.

/// Debug print macro that only compiles in debug builds.
/// In release builds, this expands to nothing, so there's zero runtime cost.
#[macro_export]
macro_rules! debug_print {
    ($($arg:tt)*) => {
        #[cfg(debug_assertions)]
        eprintln!($($arg)*);
    };
}

pub mod utils;

pub mod config;
pub mod errors;
pub mod mapping;
pub mod preparation;
pub mod query_model;
pub mod sql_context;
pub mod sql_statement;
pub mod translator;

pub use config::TranslatorConfig;
pub use errors::{ErrorKind, TranslationError};
pub use mapping::{MappingResolver, MappingSchema};
pub use query_model::QueryModel;
pub use sql_statement::Statement;
pub use translator::QueryTranslator;
