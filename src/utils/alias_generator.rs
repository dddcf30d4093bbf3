//! Per-translation issuer of table aliases and table handles.
//!
//! One generator is created for each translation and threaded through both the preparation and
//! the mapping resolution stage, so aliases are unique across every nested statement of that
//! translation. Generators are never shared between translations.
//!
//! ## Naming Convention
//! Format: `{prefix}{counter}`, with an independent counter per prefix starting at 0.
//!
//! Examples:
//! - first mapped table → `"t0"`, second → `"t1"`
//! - first sub-statement table → `"q0"`

use std::collections::HashMap;

use crate::sql_statement::TableId;

pub const DEFAULT_TABLE_PREFIX: &str = "t";
pub const DEFAULT_SUB_STATEMENT_PREFIX: &str = "q";

#[derive(Debug, Clone)]
pub struct AliasGenerator {
    counters: HashMap<String, u32>,
    next_table_id: u32,
    table_prefix: String,
    sub_statement_prefix: String,
}

impl Default for AliasGenerator {
    fn default() -> Self {
        Self::with_prefixes(DEFAULT_TABLE_PREFIX, DEFAULT_SUB_STATEMENT_PREFIX)
    }
}

impl AliasGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefixes(table_prefix: &str, sub_statement_prefix: &str) -> Self {
        Self {
            counters: HashMap::new(),
            next_table_id: 0,
            table_prefix: table_prefix.to_string(),
            sub_statement_prefix: sub_statement_prefix.to_string(),
        }
    }

    /// Next identifier for `prefix`: `prefix0`, `prefix1`, ...
    pub fn unique_identifier(&mut self, prefix: &str) -> String {
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        let id = format!("{}{}", prefix, counter);
        *counter += 1;
        id
    }

    /// Alias for a mapped table (used by mapping resolvers).
    pub fn table_alias(&mut self) -> String {
        let prefix = self.table_prefix.clone();
        self.unique_identifier(&prefix)
    }

    /// Alias for a sub-statement table.
    pub fn sub_statement_alias(&mut self) -> String {
        let prefix = self.sub_statement_prefix.clone();
        self.unique_identifier(&prefix)
    }

    pub fn next_table_id(&mut self) -> TableId {
        let id = TableId(self.next_table_id);
        self.next_table_id += 1;
        id
    }
}
