use thiserror::Error;

use crate::{
    query_model::{DataType, ResultOperatorKind, SourceId, SymbolKey},
    sql_statement::StatementError,
};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PreparationError {
    #[error(transparent)]
    Statement(#[from] StatementError),

    #[error("Query source {0} is not in scope")]
    UnknownSource(SourceId),

    #[error("No handler registered for result operator `{0}`")]
    UnsupportedResultOperator(ResultOperatorKind),

    #[error("Result operator `{operator}` cannot follow an operator that produced a single scalar value")]
    OperatorAfterScalar { operator: ResultOperatorKind },

    #[error("A literal collection can only be used as the source of Contains, found `{usage}`")]
    LiteralCollectionUsage { usage: String },

    #[error("Expression of type `{data_type}` cannot be used as a query source")]
    UnsupportedFromExpression { data_type: DataType },

    #[error("Expression `{0}` is not supported in this position")]
    UnsupportedExpression(String),

    #[error("Method `{method}` expects {expected} argument(s), got {actual}")]
    ArgumentCount {
        method: SymbolKey,
        expected: String,
        actual: usize,
    },

    #[error("Sub-statements are nested deeper than the configured limit of {max}")]
    NestingTooDeep { max: usize },
}

impl PreparationError {
    /// Whether the failure comes from an operator/expression combination that has no relational
    /// counterpart (as opposed to an internal defect).
    pub fn is_unsupported_shape(&self) -> bool {
        !matches!(self, PreparationError::Statement(_))
    }
}
