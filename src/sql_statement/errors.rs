//! Construction invariant violations.
//!
//! These indicate an upstream defect (a stage or handler assembled an invalid statement), not a
//! problem with the user's query.

use thiserror::Error;

use crate::query_model::DataType;

use super::TableId;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StatementError {
    #[error("Statement has no result shape. The builder must set one before sealing.")]
    MissingResultShape,

    #[error("Statement has no select projection.")]
    MissingSelectProjection,

    #[error("WHERE condition must be boolean, found `{actual}`")]
    NonBooleanWhereCondition { actual: DataType },

    #[error("Join condition must be boolean, found `{actual}`")]
    NonBooleanJoinCondition { actual: DataType },

    #[error("A statement cannot carry both a TOP expression and the `{modifier}` aggregation; wrap the limited statement first")]
    TopWithAggregation { modifier: String },

    #[error("Foreign table of a resolved join must be resolved, found `{found}`")]
    UnresolvedForeignTable { found: String },

    #[error("Item type mismatch when replacing the source of table {table}: expected `{expected}`, got `{actual}`")]
    ItemTypeMismatch {
        table: TableId,
        expected: DataType,
        actual: DataType,
    },

    #[error("No table {0} in statement")]
    UnknownTable(TableId),
}
