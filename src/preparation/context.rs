//! Source→expression bindings used while preparing one query model.
//!
//! Each (sub-)query model gets its own context; nested contexts see the bindings of their
//! parents, so correlated sub-queries can refer to outer sources:
//!
//! ```text
//! from c in Cooks                       ← root context:  c → TABLE-REF(#0)
//! where (from a in c.Assistants         ← child context: a → TABLE-REF(#1), parent: root
//!        select a).Any()
//! ```

use std::collections::HashMap;

use crate::{
    query_model::{QueryExpr, SourceId},
    sql_statement::SqlExpr,
};

#[derive(Debug, Default)]
pub struct PreparationContext<'p> {
    parent: Option<&'p PreparationContext<'p>>,
    source_mappings: HashMap<SourceId, SqlExpr>,
    /// Whole-expression replacements, checked before an expression is prepared. Used to re-point
    /// the current item after it moved into a sub-statement.
    expression_mappings: Vec<(QueryExpr, SqlExpr)>,
}

impl<'p> PreparationContext<'p> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child<'c>(&'c self) -> PreparationContext<'c> {
        PreparationContext {
            parent: Some(self),
            source_mappings: HashMap::new(),
            expression_mappings: vec![],
        }
    }

    pub fn add_source_mapping(&mut self, source: SourceId, expr: SqlExpr) {
        self.source_mappings.insert(source, expr);
    }

    pub fn get_source_mapping(&self, source: SourceId) -> Option<&SqlExpr> {
        self.source_mappings
            .get(&source)
            .or_else(|| self.parent.and_then(|parent| parent.get_source_mapping(source)))
    }

    /// Adds or replaces the mapping for `original`.
    pub fn add_expression_mapping(&mut self, original: QueryExpr, replacement: SqlExpr) {
        match self
            .expression_mappings
            .iter_mut()
            .find(|(existing, _)| *existing == original)
        {
            Some((_, mapped)) => *mapped = replacement,
            None => self.expression_mappings.push((original, replacement)),
        }
    }

    pub fn get_expression_mapping(&self, original: &QueryExpr) -> Option<&SqlExpr> {
        self.expression_mappings
            .iter()
            .find(|(existing, _)| existing == original)
            .map(|(_, mapped)| mapped)
            .or_else(|| {
                self.parent
                    .and_then(|parent| parent.get_expression_mapping(original))
            })
    }
}
