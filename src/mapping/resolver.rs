use crate::{
    query_model::{ConstantValue, DataType, MemberRef},
    sql_statement::{
        sql_expr::EntityRefMember, ColumnExpr, EntityDefinition, EntityExpr, ResolvedJoin,
        ResolvedSimpleTable, SqlExpr, UnresolvedJoin, UnresolvedTable,
    },
    utils::AliasGenerator,
};

use super::errors::MappingError;

/// Boundary to the mapping metadata: how domain types, members and relationships map to
/// tables, columns and joins.
///
/// Implementations are built once and shared read-only between translations. Every alias a
/// resolver hands out must come from the translation's [`AliasGenerator`].
#[cfg_attr(test, mockall::automock)]
pub trait MappingResolver: Send + Sync {
    /// Table (name plus fresh alias) for a mapped type.
    fn resolve_table_info(
        &self,
        table: &UnresolvedTable,
        generator: &mut AliasGenerator,
    ) -> Result<ResolvedSimpleTable, MappingError>;

    /// Foreign table plus the boolean condition matching its keys to the originating entity.
    fn resolve_join_info(
        &self,
        join: &UnresolvedJoin,
        generator: &mut AliasGenerator,
    ) -> Result<ResolvedJoin, MappingError>;

    /// Full column list of a resolved table, primary key columns flagged.
    fn resolve_simple_table_info(
        &self,
        table: &ResolvedSimpleTable,
        generator: &mut AliasGenerator,
    ) -> Result<EntityDefinition, MappingError>;

    /// A column, a navigation marker ([`SqlExpr::EntityRefMember`]) or a derived expression.
    fn resolve_member_expression(
        &self,
        entity: &EntityExpr,
        member: &MemberRef,
    ) -> Result<SqlExpr, MappingError>;

    fn resolve_column_member_expression(
        &self,
        column: &ColumnExpr,
        member: &MemberRef,
    ) -> Result<SqlExpr, MappingError>;

    /// Entity values become [`SqlExpr::EntityConstant`]s carrying their identity; anything
    /// else passes through as a constant.
    fn resolve_constant_expression(
        &self,
        value: &ConstantValue,
        data_type: &DataType,
    ) -> Result<SqlExpr, MappingError>;

    /// Boolean test that `expr` is a `target`, or a constant when statically decidable.
    fn resolve_type_check(&self, expr: &SqlExpr, target: &DataType)
        -> Result<SqlExpr, MappingError>;

    /// Identity of the entity a navigation marker points to, if it can be read off the
    /// originating table (a foreign key column) without joining.
    fn try_resolve_optimized_identity(&self, _marker: &EntityRefMember) -> Option<SqlExpr> {
        None
    }
}
