//! Top-level translation errors.
//!
//! Every stage has its own error enum; [`TranslationError`] wraps them so callers get one type
//! and can classify a failure with [`TranslationError::kind`].

use std::fmt;

use thiserror::Error;

use crate::{
    config::ConfigError,
    mapping::{MappingConfigError, MappingError, ResolutionError},
    preparation::PreparationError,
    sql_context::ContextError,
    sql_statement::StatementError,
};

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error(transparent)]
    Preparation(#[from] PreparationError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Statement(#[from] StatementError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    MappingConfig(#[from] MappingConfigError),
}

/// How a caller should read a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A type, relationship or member has no relational counterpart.
    UnmappedItem,
    /// Operators or expressions combine in a way a single relational statement cannot express.
    UnsupportedShape,
    /// A stage assembled an invalid statement; an internal defect, not a user error.
    InvariantViolation,
    /// Translator or mapping configuration is invalid.
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::UnmappedItem => "unmapped item",
            ErrorKind::UnsupportedShape => "unsupported shape",
            ErrorKind::InvariantViolation => "invariant violation",
            ErrorKind::Configuration => "configuration",
        };
        write!(f, "{}", name)
    }
}

impl TranslationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TranslationError::Preparation(error) if error.is_unsupported_shape() => {
                ErrorKind::UnsupportedShape
            }
            TranslationError::Preparation(_) | TranslationError::Statement(_) => {
                ErrorKind::InvariantViolation
            }
            TranslationError::Resolution(error) => match error {
                ResolutionError::Mapping(_) => ErrorKind::UnmappedItem,
                ResolutionError::UnsupportedShape(_) => ErrorKind::UnsupportedShape,
                ResolutionError::Statement(_)
                | ResolutionError::UnknownTable(_)
                | ResolutionError::UnresolvedNode(_)
                | ResolutionError::MissingStatementFrame => ErrorKind::InvariantViolation,
            },
            TranslationError::Mapping(_) => ErrorKind::UnmappedItem,
            TranslationError::Context(_) => ErrorKind::UnsupportedShape,
            TranslationError::Config(_) | TranslationError::MappingConfig(_) => {
                ErrorKind::Configuration
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        query_model::{DataType, ResultOperatorKind},
        sql_statement::TableId,
    };
    use test_case::test_case;

    #[test_case(
        ResolutionError::Mapping(MappingError::UnmappedType { type_name: "Cook".into() }).into(),
        ErrorKind::UnmappedItem;
        "unmapped type"
    )]
    #[test_case(
        ResolutionError::UnsupportedShape("grouping".into()).into(),
        ErrorKind::UnsupportedShape;
        "resolution shape"
    )]
    #[test_case(
        ResolutionError::UnknownTable(TableId(3)).into(),
        ErrorKind::InvariantViolation;
        "unknown table"
    )]
    #[test_case(
        PreparationError::UnsupportedResultOperator(ResultOperatorKind::Group).into(),
        ErrorKind::UnsupportedShape;
        "missing handler"
    )]
    #[test_case(
        PreparationError::Statement(StatementError::NonBooleanWhereCondition {
            actual: DataType::Int32
        }).into(),
        ErrorKind::InvariantViolation;
        "non boolean where"
    )]
    #[test_case(
        ContextError::ClientMethodOutsideProjection { method: "Cook.Format".into() }.into(),
        ErrorKind::UnsupportedShape;
        "client method"
    )]
    #[test_case(
        MappingConfigError::MissingPrimaryKey("Cook".into()).into(),
        ErrorKind::Configuration;
        "mapping config"
    )]
    fn test_error_kind(error: TranslationError, expected: ErrorKind) {
        assert_eq!(error.kind(), expected);
    }

    #[test]
    fn test_transparent_messages() {
        let error: TranslationError =
            MappingError::UnmappedType { type_name: "Cook".into() }.into();
        assert_eq!(error.to_string(), "Type `Cook` is not mapped to a table");
    }
}
