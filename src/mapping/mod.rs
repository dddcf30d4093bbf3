//! Mapping resolution stage: partially resolved [`Statement`](crate::sql_statement::Statement)
//! → fully resolved statement.
//!
//! Every unresolved table is bound to a mapped table or a resolved sub-statement, every member
//! access to a column, a join or a derived expression, and every entity-level operation
//! (equality, null test, type check, `IN`) to operations over identity columns. The metadata
//! comes from a [`MappingResolver`]; [`MappingSchema`] is the YAML-backed one.

pub mod errors;
pub mod resolver;
pub mod schema;
pub mod stage;
pub mod sub_statement_reference;

pub use errors::{MappingConfigError, MappingError, ResolutionError};
pub use resolver::MappingResolver;
pub use schema::{MappingSchema, MappingSchemaConfig};
pub use stage::MappingResolutionStage;

pub type ResolutionResult<T> = Result<T, ResolutionError>;
