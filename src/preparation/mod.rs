//! Preparation stage: query model → partially resolved [`Statement`].
//!
//! The stage walks the clauses of a [`QueryModel`] into a [`StatementBuilder`], prepares every
//! expression (null comparisons, conditionals, member pushdown, method transformers) and
//! dispatches result operators, left to right, to the handler registered for their kind.
//! Tables stay unresolved; member accesses on table items stay symbolic. The mapping resolution
//! stage finishes the job.
//!
//! ```text
//! QueryModel ──► QueryModelVisitor ──► StatementBuilder ──► Statement (unresolved)
//!                   │        ▲
//!                   ▼        │
//!          result operator handlers / expression preparer / transformer registry
//! ```

use log::debug;

use crate::{
    config::TranslatorConfig,
    query_model::QueryModel,
    sql_statement::Statement,
    utils::AliasGenerator,
};

pub mod context;
pub mod errors;
mod expression_preparer;
mod promotion;
pub mod query_model_visitor;
pub mod result_operators;
pub mod transformers;

pub use context::PreparationContext;
pub use errors::PreparationError;
pub use query_model_visitor::QueryModelVisitor;
pub use result_operators::{ResultOperatorHandler, ResultOperatorHandlerRegistry};
pub use transformers::MethodCallTransformerRegistry;

pub type PreparationResult<T> = Result<T, PreparationError>;

pub struct PreparationStage<'a> {
    pub(crate) generator: &'a mut AliasGenerator,
    pub(crate) transformers: &'a MethodCallTransformerRegistry,
    pub(crate) handlers: &'a ResultOperatorHandlerRegistry,
    pub(crate) config: &'a TranslatorConfig,
    depth: usize,
}

impl<'a> PreparationStage<'a> {
    pub fn new(
        generator: &'a mut AliasGenerator,
        transformers: &'a MethodCallTransformerRegistry,
        handlers: &'a ResultOperatorHandlerRegistry,
        config: &'a TranslatorConfig,
    ) -> Self {
        Self {
            generator,
            transformers,
            handlers,
            config,
            depth: 0,
        }
    }

    /// Prepares the outermost query model of a translation.
    pub fn prepare_sql_statement(&mut self, model: &QueryModel) -> PreparationResult<Statement> {
        let root = PreparationContext::new();
        let statement = self.prepare_query_model(model, &root)?;
        debug!("Prepared statement: {}", statement);
        Ok(statement)
    }

    /// Prepares a (sub-)query model in a child of `parent`.
    pub fn prepare_query_model(
        &mut self,
        model: &QueryModel,
        parent: &PreparationContext<'_>,
    ) -> PreparationResult<Statement> {
        if self.depth >= self.config.max_statement_depth {
            return Err(PreparationError::NestingTooDeep {
                max: self.config.max_statement_depth,
            });
        }
        self.depth += 1;
        let result = QueryModelVisitor::translate(self, model, parent);
        self.depth -= 1;
        result
    }
}
