//! Result operator handlers.
//!
//! Each handler rewrites the visitor's statement builder for one [`ResultOperatorKind`],
//! wrapping the statement built so far into a sub-statement whenever the operator cannot be
//! expressed on the same SELECT level (e.g. `Take(5).Count()` needs the TOP inside, the COUNT
//! outside).

use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::query_model::{ResultOperator, ResultOperatorKind};

use super::{PreparationError, PreparationResult, QueryModelVisitor};

mod aggregation;
mod distinct;
mod existence;
mod group;
mod paging;
mod type_operators;

pub use aggregation::AggregationHandler;
pub use distinct::DistinctHandler;
pub use existence::{AllHandler, AnyHandler, ContainsHandler};
pub use group::GroupHandler;
pub use paging::{FirstHandler, SingleHandler, SkipHandler, TakeHandler};
pub use type_operators::{CastHandler, DefaultIfEmptyHandler, OfTypeHandler};

pub trait ResultOperatorHandler: Send + Sync {
    fn handle(
        &self,
        operator: &ResultOperator,
        visitor: &mut QueryModelVisitor<'_, '_, '_>,
    ) -> PreparationResult<()>;
}

/// Handlers keyed by operator kind; unknown kinds are rejected by the visitor.
#[derive(Default)]
pub struct ResultOperatorHandlerRegistry {
    handlers: HashMap<ResultOperatorKind, Box<dyn ResultOperatorHandler>>,
}

impl ResultOperatorHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ResultOperatorKind::Take, TakeHandler);
        registry.register(ResultOperatorKind::Skip, SkipHandler);
        registry.register(ResultOperatorKind::First, FirstHandler);
        registry.register(ResultOperatorKind::Single, SingleHandler);
        registry.register(ResultOperatorKind::Distinct, DistinctHandler);
        for kind in [
            ResultOperatorKind::Count,
            ResultOperatorKind::LongCount,
            ResultOperatorKind::Sum,
            ResultOperatorKind::Min,
            ResultOperatorKind::Max,
            ResultOperatorKind::Average,
        ] {
            registry.register(kind, AggregationHandler);
        }
        registry.register(ResultOperatorKind::Any, AnyHandler);
        registry.register(ResultOperatorKind::All, AllHandler);
        registry.register(ResultOperatorKind::Contains, ContainsHandler);
        registry.register(ResultOperatorKind::Group, GroupHandler);
        registry.register(ResultOperatorKind::DefaultIfEmpty, DefaultIfEmptyHandler);
        registry.register(ResultOperatorKind::OfType, OfTypeHandler);
        registry.register(ResultOperatorKind::Cast, CastHandler);
        registry
    }

    /// Registers `handler` for `kind`, replacing any previous registration.
    pub fn register(
        &mut self,
        kind: ResultOperatorKind,
        handler: impl ResultOperatorHandler + 'static,
    ) {
        self.handlers.insert(kind, Box::new(handler));
    }

    pub fn get(&self, kind: ResultOperatorKind) -> Option<&dyn ResultOperatorHandler> {
        self.handlers.get(&kind).map(|handler| handler.as_ref())
    }

    pub fn supports(&self, kind: ResultOperatorKind) -> bool {
        self.handlers.contains_key(&kind)
    }
}

/// A handler registered under the wrong kind.
pub(crate) fn mismatched(operator: &ResultOperator) -> PreparationError {
    PreparationError::UnsupportedResultOperator(operator.kind())
}

lazy_static! {
    pub static ref DEFAULT_RESULT_OPERATOR_HANDLERS: ResultOperatorHandlerRegistry =
        ResultOperatorHandlerRegistry::with_defaults();
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{
        config::TranslatorConfig,
        preparation::{
            transformers::DEFAULT_METHOD_CALL_TRANSFORMERS, PreparationStage,
            ResultOperatorHandlerRegistry,
        },
        query_model::{
            ConstantValue, DataType, FromClause, MemberRef, QueryExpr, QueryModel,
            QueryModelBuilder, SourceIdGenerator,
        },
        sql_statement::{SqlExpr, Statement},
        utils::AliasGenerator,
    };

    use super::DEFAULT_RESULT_OPERATOR_HANDLERS;

    pub fn cook() -> DataType {
        DataType::entity("Cook")
    }

    pub fn cooks_from(ids: &mut SourceIdGenerator) -> FromClause {
        FromClause::new(ids.next_id(), "c", cook(), QueryExpr::queryable(cook()))
    }

    pub fn cook_member(name: &str, data_type: DataType) -> MemberRef {
        MemberRef::new("Cook", name, data_type)
    }

    /// What `QueryExpr::int(value)` prepares to.
    pub fn constant_int(value: i64) -> SqlExpr {
        SqlExpr::constant(ConstantValue::Integer(value), DataType::Int32)
    }

    pub fn prepare_with(
        model: &QueryModel,
        handlers: &ResultOperatorHandlerRegistry,
    ) -> Result<Statement, crate::preparation::PreparationError> {
        let mut generator = AliasGenerator::new();
        let config = TranslatorConfig::default();
        let mut stage = PreparationStage::new(
            &mut generator,
            &DEFAULT_METHOD_CALL_TRANSFORMERS,
            handlers,
            &config,
        );
        stage.prepare_sql_statement(model)
    }

    pub fn prepare(model: &QueryModel) -> Statement {
        prepare_with(model, &DEFAULT_RESULT_OPERATOR_HANDLERS).unwrap()
    }

    /// `from c in Cooks select c`
    pub fn cooks_model(ids: &mut SourceIdGenerator) -> QueryModelBuilder {
        QueryModelBuilder::new(cooks_from(ids))
    }
}
