use thiserror::Error;

use crate::{
    query_model::DataType,
    sql_statement::{StatementError, TableId},
};

/// Raised by a [`MappingResolver`](super::MappingResolver) when a domain item has no relational
/// counterpart.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MappingError {
    #[error("Type `{type_name}` is not mapped to a table")]
    UnmappedType { type_name: String },

    #[error("Member `{member}` of `{declaring_type}` is not mapped")]
    UnmappedMember {
        declaring_type: String,
        member: String,
    },

    #[error("Relationship `{member}` of `{declaring_type}` is not mapped")]
    UnmappedRelation {
        declaring_type: String,
        member: String,
    },

    #[error("Collection member `{member}` of `{declaring_type}` can only be used as a query source")]
    CollectionMemberAccess {
        declaring_type: String,
        member: String,
    },

    #[error("Constant of type `{data_type}` cannot be mapped: {reason}")]
    UnmappedConstant { data_type: DataType, reason: String },

    #[error("Cannot check `{source_type}` against `{target}`: no discriminator is mapped")]
    UnsupportedTypeCheck { source_type: DataType, target: DataType },
}

/// Errors of the mapping resolution stage.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolutionError {
    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Statement(#[from] StatementError),

    #[error("Unsupported query shape: {0}")]
    UnsupportedShape(String),

    #[error("Table {0} is referenced but not in scope")]
    UnknownTable(TableId),

    #[error("Statement still contains unresolved nodes after resolution: {0}")]
    UnresolvedNode(String),

    #[error("No statement is being resolved")]
    MissingStatementFrame,
}

/// Errors loading or validating a mapping schema file.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MappingConfigError {
    #[error("Failed to read mapping file `{path}`: {error}")]
    Read { path: String, error: String },

    #[error("Failed to parse mapping: {0}")]
    Parse(String),

    #[error("Invalid {kind} identifier `{value}`")]
    InvalidIdentifier { kind: &'static str, value: String },

    #[error("Entity `{0}` is mapped more than once")]
    DuplicateEntity(String),

    #[error("Entity `{entity}` references unknown entity `{referenced}`")]
    UnknownEntity { entity: String, referenced: String },

    #[error("Entity `{entity}` has no column mapped for member `{member}`")]
    UnknownColumn { entity: String, member: String },

    #[error("Entity `{0}` has no primary key column")]
    MissingPrimaryKey(String),

    #[error("Entity `{0}` has no table, neither its own nor a base entity's")]
    MissingTable(String),

    #[error("Inheritance of entity `{0}` is cyclic")]
    InheritanceCycle(String),

    #[error("Column `{column}` of entity `{entity}` must have a scalar type, found `{data_type}`")]
    NonScalarColumn {
        entity: String,
        column: String,
        data_type: DataType,
    },
}
