use serde::{Deserialize, Serialize};

use crate::query_model::{DataType, MemberRef, SymbolKey};

use super::{
    entity::EntityExpr, errors::StatementError, sql_expr::SqlExpr, Statement, TableId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinSemantics {
    Inner,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    Many,
}

/// Table of a mapped domain type whose name and alias are not known yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedTable {
    pub item_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSimpleTable {
    pub item_type: DataType,
    pub table_name: String,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSubStatementTable {
    pub alias: String,
    pub statement: Box<Statement>,
}

/// A from source that iterates over a grouping produced elsewhere (`from x in g`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedGroupReferenceTable {
    pub referenced_group_source: TableId,
    pub item_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedJoin {
    pub originating: EntityExpr,
    pub member: MemberRef,
    pub cardinality: Cardinality,
}

/// Relationship collection of an outer item, e.g. `from a in c.Assistants`. The source
/// expression is resolved to an entity before the join itself is resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedCollectionJoin {
    pub source: Box<SqlExpr>,
    pub member: MemberRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedJoin {
    pub foreign: Box<TableSource>,
    pub condition: SqlExpr,
}

impl ResolvedJoin {
    /// The foreign table must already be resolved and the condition must be boolean.
    pub fn new(foreign: TableSource, condition: SqlExpr) -> Result<Self, StatementError> {
        if foreign.alias().is_none() {
            return Err(StatementError::UnresolvedForeignTable {
                found: foreign.kind_name().to_string(),
            });
        }
        let condition_type = condition.data_type();
        if !condition_type.is_boolean() {
            return Err(StatementError::NonBooleanJoinCondition {
                actual: condition_type,
            });
        }
        Ok(Self {
            foreign: Box::new(foreign),
            condition,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinInfo {
    Unresolved(UnresolvedJoin),
    UnresolvedCollection(UnresolvedCollectionJoin),
    Resolved(ResolvedJoin),
}

impl JoinInfo {
    pub fn item_type(&self) -> DataType {
        match self {
            JoinInfo::Unresolved(join) => element_or_self(&join.member.member_type),
            JoinInfo::UnresolvedCollection(join) => element_or_self(&join.member.member_type),
            JoinInfo::Resolved(join) => join.foreign.item_type(),
        }
    }
}

fn element_or_self(data_type: &DataType) -> DataType {
    data_type
        .element_type()
        .cloned()
        .unwrap_or_else(|| data_type.clone())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableSource {
    Unresolved(UnresolvedTable),
    Simple(ResolvedSimpleTable),
    SubStatement(ResolvedSubStatementTable),
    GroupReference(UnresolvedGroupReferenceTable),
    Joined(JoinInfo),
}

impl TableSource {
    pub fn item_type(&self) -> DataType {
        match self {
            TableSource::Unresolved(table) => table.item_type.clone(),
            TableSource::Simple(table) => table.item_type.clone(),
            TableSource::SubStatement(table) => element_or_self(&table.statement.data_type()),
            TableSource::GroupReference(table) => table.item_type.clone(),
            TableSource::Joined(join) => join.item_type(),
        }
    }

    /// Alias of a resolved source; `None` while unresolved.
    pub fn alias(&self) -> Option<&str> {
        match self {
            TableSource::Simple(table) => Some(&table.alias),
            TableSource::SubStatement(table) => Some(&table.alias),
            TableSource::Joined(JoinInfo::Resolved(join)) => join.foreign.alias(),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        match self {
            TableSource::Simple(_) => true,
            TableSource::SubStatement(table) => table.statement.is_resolved(),
            TableSource::Joined(JoinInfo::Resolved(join)) => join.foreign.is_resolved(),
            _ => false,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            TableSource::Unresolved(_) => "UnresolvedTable",
            TableSource::Simple(_) => "ResolvedSimpleTable",
            TableSource::SubStatement(_) => "ResolvedSubStatementTable",
            TableSource::GroupReference(_) => "UnresolvedGroupReferenceTable",
            TableSource::Joined(JoinInfo::Unresolved(_)) => "UnresolvedJoin",
            TableSource::Joined(JoinInfo::UnresolvedCollection(_)) => "UnresolvedCollectionJoin",
            TableSource::Joined(JoinInfo::Resolved(_)) => "ResolvedJoin",
        }
    }
}

/// A row origin of a statement together with the joins hanging off it.
///
/// Joins are cached by originating member: asking twice for the join over the same member
/// returns the same table handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlTable {
    pub id: TableId,
    pub source: TableSource,
    pub semantics: JoinSemantics,
    joins: Vec<(SymbolKey, SqlTable)>,
}

impl SqlTable {
    pub fn new(id: TableId, source: TableSource, semantics: JoinSemantics) -> Self {
        Self {
            id,
            source,
            semantics,
            joins: vec![],
        }
    }

    pub fn item_type(&self) -> DataType {
        self.source.item_type()
    }

    pub fn alias(&self) -> Option<&str> {
        self.source.alias()
    }

    pub fn joins(&self) -> impl Iterator<Item = &SqlTable> {
        self.joins.iter().map(|(_, table)| table)
    }

    pub fn joins_mut(&mut self) -> impl Iterator<Item = &mut SqlTable> {
        self.joins.iter_mut().map(|(_, table)| table)
    }

    pub fn cached_join(&self, key: &SymbolKey) -> Option<&SqlTable> {
        self.joins
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, table)| table)
    }

    /// Returns the joined table for `key`, creating it with `create` on first use. The flag
    /// reports whether a new join was added.
    pub fn get_or_add_left_join<E>(
        &mut self,
        key: SymbolKey,
        create: impl FnOnce() -> Result<SqlTable, E>,
    ) -> Result<(TableId, bool), E> {
        if let Some(existing) = self.cached_join(&key) {
            return Ok((existing.id, false));
        }
        let mut table = create()?;
        table.semantics = JoinSemantics::Left;
        let id = table.id;
        self.joins.push((key, table));
        Ok((id, true))
    }

    /// Replaces the source keeping the table's identity; the item type must not change.
    pub fn replace_source(&mut self, source: TableSource) -> Result<(), StatementError> {
        let expected = self.item_type();
        let actual = source.item_type();
        if expected != actual {
            return Err(StatementError::ItemTypeMismatch {
                table: self.id,
                expected,
                actual,
            });
        }
        self.source = source;
        Ok(())
    }

    /// Finds this table or one of its (transitive) joins by handle.
    pub fn find(&self, id: TableId) -> Option<&SqlTable> {
        if self.id == id {
            return Some(self);
        }
        self.joins().find_map(|join| join.find(id))
    }

    pub fn find_mut(&mut self, id: TableId) -> Option<&mut SqlTable> {
        if self.id == id {
            return Some(self);
        }
        self.joins_mut().find_map(|join| join.find_mut(id))
    }

    /// Handles of this table and all its joins, depth-first.
    pub fn ids(&self) -> Vec<TableId> {
        let mut ids = vec![self.id];
        for join in self.joins() {
            ids.extend(join.ids());
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cook_table(id: u32) -> SqlTable {
        SqlTable::new(
            TableId(id),
            TableSource::Unresolved(UnresolvedTable {
                item_type: DataType::entity("Cook"),
            }),
            JoinSemantics::Inner,
        )
    }

    #[test]
    fn test_join_cache_returns_same_table() {
        let mut table = cook_table(0);
        let key = SymbolKey::new("Cook", "Knife");
        let (first, created) = table
            .get_or_add_left_join::<StatementError>(key.clone(), || {
                Ok(SqlTable::new(
                    TableId(1),
                    TableSource::Unresolved(UnresolvedTable {
                        item_type: DataType::entity("Knife"),
                    }),
                    JoinSemantics::Inner,
                ))
            })
            .unwrap();
        assert!(created);
        let (second, created_again) = table
            .get_or_add_left_join::<StatementError>(key, || panic!("join must be cached"))
            .unwrap();
        assert!(!created_again);
        assert_eq!(first, second);
        assert_eq!(table.joins().count(), 1);
        assert_eq!(
            table.find(TableId(1)).map(|t| t.semantics),
            Some(JoinSemantics::Left)
        );
    }

    #[test]
    fn test_replace_source_rejects_item_type_change() {
        let mut table = cook_table(0);
        let err = table
            .replace_source(TableSource::Simple(ResolvedSimpleTable {
                item_type: DataType::entity("Kitchen"),
                table_name: "Kitchens".to_string(),
                alias: "t0".to_string(),
            }))
            .unwrap_err();
        assert!(matches!(err, StatementError::ItemTypeMismatch { .. }));
    }

    #[test]
    fn test_resolved_join_requires_resolved_foreign_table() {
        let err = ResolvedJoin::new(
            TableSource::Unresolved(UnresolvedTable {
                item_type: DataType::entity("Knife"),
            }),
            SqlExpr::literal_bool(true),
        )
        .unwrap_err();
        assert!(matches!(err, StatementError::UnresolvedForeignTable { .. }));

        let err = ResolvedJoin::new(
            TableSource::Simple(ResolvedSimpleTable {
                item_type: DataType::entity("Knife"),
                table_name: "Knives".to_string(),
                alias: "t1".to_string(),
            }),
            SqlExpr::literal_int(1),
        )
        .unwrap_err();
        assert!(matches!(err, StatementError::NonBooleanJoinCondition { .. }));
    }
}
