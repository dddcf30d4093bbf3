//! Column-backed representations of mapped domain objects.
//!
//! # Naming
//!
//! Projection names travel through rewriting via [`NamedExpr`] and entity names. When a
//! sub-statement exposes an entity named `Key` with a column `ID`, the column is visible to the
//! outer statement as `Key_ID`; see [`combine_names`].

use serde::{Deserialize, Serialize};

use crate::query_model::DataType;

use super::sql_expr::{NewExpr, NewMember, SqlExpr};

/// Joins an outer and an inner projection name with `_`; either side may be absent.
pub fn combine_names(outer: Option<&str>, inner: Option<&str>) -> Option<String> {
    match (outer, inner) {
        (None, None) => None,
        (Some(name), None) | (None, Some(name)) => Some(name.to_string()),
        (Some(outer), Some(inner)) => Some(format!("{}_{}", outer, inner)),
    }
}

/// A column of a resolved table. Two columns are equal only when alias, name, type and
/// primary-key flag all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnExpr {
    pub owning_alias: String,
    pub name: String,
    pub data_type: DataType,
    pub is_primary_key: bool,
}

impl ColumnExpr {
    pub fn new(
        owning_alias: impl Into<String>,
        name: impl Into<String>,
        data_type: DataType,
        is_primary_key: bool,
    ) -> Self {
        Self {
            owning_alias: owning_alias.into(),
            name: name.into(),
            data_type,
            is_primary_key,
        }
    }
}

/// An entity backed directly by the columns of a mapped table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub entity_type: String,
    pub table_alias: String,
    pub name: Option<String>,
    /// Column names forming the identity, in key order.
    pub identity_columns: Vec<String>,
    pub columns: Vec<ColumnExpr>,
}

/// An entity resurfacing under another alias, e.g. through a sub-statement table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityReference {
    pub entity_type: String,
    pub table_alias: String,
    pub name: Option<String>,
    pub referenced: Box<EntityExpr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityExpr {
    Definition(EntityDefinition),
    Reference(EntityReference),
}

impl EntityExpr {
    pub fn entity_type(&self) -> &str {
        match self {
            EntityExpr::Definition(def) => &def.entity_type,
            EntityExpr::Reference(reference) => &reference.entity_type,
        }
    }

    pub fn data_type(&self) -> DataType {
        DataType::entity(self.entity_type())
    }

    pub fn table_alias(&self) -> &str {
        match self {
            EntityExpr::Definition(def) => &def.table_alias,
            EntityExpr::Reference(reference) => &reference.table_alias,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            EntityExpr::Definition(def) => def.name.as_deref(),
            EntityExpr::Reference(reference) => reference.name.as_deref(),
        }
    }

    pub fn with_name(&self, name: Option<String>) -> EntityExpr {
        match self {
            EntityExpr::Definition(def) => EntityExpr::Definition(EntityDefinition {
                name,
                ..def.clone()
            }),
            EntityExpr::Reference(reference) => EntityExpr::Reference(EntityReference {
                name,
                ..reference.clone()
            }),
        }
    }

    /// Reference to this entity as seen through a table with `table_alias`.
    pub fn create_reference(&self, table_alias: impl Into<String>) -> EntityExpr {
        EntityExpr::Reference(EntityReference {
            entity_type: self.entity_type().to_string(),
            table_alias: table_alias.into(),
            name: None,
            referenced: Box::new(self.clone()),
        })
    }

    /// Rebases a column of the referenced level onto this reference's alias.
    fn rebase(&self, referenced: &EntityExpr, column: &ColumnExpr) -> ColumnExpr {
        let name = combine_names(referenced.name(), Some(&column.name))
            .unwrap_or_else(|| column.name.clone());
        ColumnExpr::new(
            self.table_alias(),
            name,
            column.data_type.clone(),
            column.is_primary_key,
        )
    }

    pub fn columns(&self) -> Vec<ColumnExpr> {
        match self {
            EntityExpr::Definition(def) => def.columns.clone(),
            EntityExpr::Reference(reference) => reference
                .referenced
                .columns()
                .iter()
                .map(|column| self.rebase(&reference.referenced, column))
                .collect(),
        }
    }

    /// Synthesizes a column of this entity.
    pub fn get_column(&self, data_type: DataType, name: &str, is_primary_key: bool) -> ColumnExpr {
        match self {
            EntityExpr::Definition(def) => {
                ColumnExpr::new(def.table_alias.clone(), name, data_type, is_primary_key)
            }
            EntityExpr::Reference(reference) => self.rebase(
                &reference.referenced,
                &ColumnExpr::new("", name, data_type, is_primary_key),
            ),
        }
    }

    pub fn identity_columns(&self) -> Vec<ColumnExpr> {
        match self {
            EntityExpr::Definition(def) => def
                .identity_columns
                .iter()
                .filter_map(|id| def.columns.iter().find(|c| &c.name == id).cloned())
                .collect(),
            EntityExpr::Reference(reference) => reference
                .referenced
                .identity_columns()
                .iter()
                .map(|column| self.rebase(&reference.referenced, column))
                .collect(),
        }
    }

    /// Expression identifying a row of this entity: its single key column, or a composite of
    /// all key columns. `None` when the entity has no identity.
    pub fn identity_expression(&self) -> Option<SqlExpr> {
        let mut columns = self.identity_columns();
        match columns.len() {
            0 => None,
            1 => columns.pop().map(SqlExpr::Column),
            _ => Some(SqlExpr::New(NewExpr {
                type_name: format!("{}Identity", self.entity_type()),
                members: columns
                    .into_iter()
                    .map(|column| NewMember {
                        name: column.name.clone(),
                        expr: SqlExpr::Column(column),
                    })
                    .collect(),
            })),
        }
    }
}
