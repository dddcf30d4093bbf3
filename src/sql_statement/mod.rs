//! Relational statement model.
//!
//! A [`Statement`] is one normalized SELECT. It is immutable once sealed by a
//! [`StatementBuilder`]; every change goes through a fresh builder
//! ([`StatementBuilder::from_statement`]).
//!
//! ```text
//! Statement
//! ├── shape            sequence / single value / scalar
//! ├── select_projection
//! ├── tables           SqlTable (+ cached joins)
//! ├── where_condition  boolean
//! ├── orderings
//! ├── top_expression   ─┐ mutually exclusive
//! ├── aggregation      ─┘
//! ├── is_distinct
//! └── group_by_expression
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::query_model::{DataType, OrderingDirection};

pub mod builder;
pub mod display;
pub mod entity;
pub mod errors;
pub mod sql_expr;
pub mod table;
pub mod transformed;

pub use builder::StatementBuilder;
pub use entity::{ColumnExpr, EntityDefinition, EntityExpr, EntityReference};
pub use errors::StatementError;
pub use sql_expr::SqlExpr;
pub use table::{
    Cardinality, JoinInfo, JoinSemantics, ResolvedJoin, ResolvedSimpleTable,
    ResolvedSubStatementTable, SqlTable, TableSource, UnresolvedCollectionJoin,
    UnresolvedGroupReferenceTable, UnresolvedJoin, UnresolvedTable,
};
pub use transformed::Transformed;

/// Handle of a table within one translation. Issued by the alias generator, stable across
/// resolution (resolving a table replaces its source, never its handle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ResultShape {
    Sequence {
        item_type: DataType,
    },
    /// At most one row (First/Single); the consumer decides what an empty result means.
    SingleValue {
        data_type: DataType,
        return_default_when_empty: bool,
    },
    /// Exactly one value (aggregates, Any, All, Contains).
    Scalar {
        data_type: DataType,
    },
}

impl ResultShape {
    pub fn data_type(&self) -> DataType {
        match self {
            ResultShape::Sequence { item_type } => DataType::sequence_of(item_type.clone()),
            ResultShape::SingleValue { data_type, .. } | ResultShape::Scalar { data_type } => {
                data_type.clone()
            }
        }
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, ResultShape::Sequence { .. })
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, ResultShape::Scalar { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationModifier {
    #[default]
    None,
    Count,
    Min,
    Max,
    Sum,
    Average,
}

impl fmt::Display for AggregationModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregationModifier::None => "NONE",
            AggregationModifier::Count => "COUNT",
            AggregationModifier::Min => "MIN",
            AggregationModifier::Max => "MAX",
            AggregationModifier::Sum => "SUM",
            AggregationModifier::Average => "AVG",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ordering {
    pub expression: SqlExpr,
    pub direction: OrderingDirection,
}

impl Ordering {
    pub fn new(expression: SqlExpr, direction: OrderingDirection) -> Self {
        Self {
            expression,
            direction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub(crate) shape: ResultShape,
    pub(crate) select_projection: SqlExpr,
    pub(crate) tables: Vec<SqlTable>,
    pub(crate) where_condition: Option<SqlExpr>,
    pub(crate) orderings: Vec<Ordering>,
    pub(crate) top_expression: Option<SqlExpr>,
    pub(crate) is_distinct: bool,
    pub(crate) aggregation_modifier: AggregationModifier,
    pub(crate) group_by_expression: Option<SqlExpr>,
}

impl Statement {
    pub fn shape(&self) -> &ResultShape {
        &self.shape
    }

    pub fn select_projection(&self) -> &SqlExpr {
        &self.select_projection
    }

    pub fn tables(&self) -> &[SqlTable] {
        &self.tables
    }

    pub fn where_condition(&self) -> Option<&SqlExpr> {
        self.where_condition.as_ref()
    }

    pub fn orderings(&self) -> &[Ordering] {
        &self.orderings
    }

    pub fn top_expression(&self) -> Option<&SqlExpr> {
        self.top_expression.as_ref()
    }

    pub fn is_distinct(&self) -> bool {
        self.is_distinct
    }

    pub fn aggregation_modifier(&self) -> AggregationModifier {
        self.aggregation_modifier
    }

    pub fn group_by_expression(&self) -> Option<&SqlExpr> {
        self.group_by_expression.as_ref()
    }

    pub fn data_type(&self) -> DataType {
        self.shape.data_type()
    }

    pub fn find_table(&self, id: TableId) -> Option<&SqlTable> {
        self.tables.iter().find_map(|table| table.find(id))
    }

    /// Whether no unresolved table, join or expression node remains anywhere in this statement
    /// (nested statements included).
    pub fn is_resolved(&self) -> bool {
        let mut expressions: Vec<&SqlExpr> = vec![&self.select_projection];
        expressions.extend(self.where_condition.iter());
        expressions.extend(self.top_expression.iter());
        expressions.extend(self.group_by_expression.iter());
        expressions.extend(self.orderings.iter().map(|o| &o.expression));

        fn table_resolved(table: &SqlTable) -> bool {
            let own = match &table.source {
                TableSource::Joined(JoinInfo::Resolved(join)) => {
                    join.foreign.is_resolved() && expr_resolved(&join.condition)
                }
                other => other.is_resolved(),
            };
            own && table.joins().all(table_resolved)
        }

        self.tables.iter().all(table_resolved) && expressions.into_iter().all(expr_resolved)
    }
}

fn expr_resolved(expr: &SqlExpr) -> bool {
    !expr.any_node(&|node| match node {
        SqlExpr::TableReference(_)
        | SqlExpr::Member(_)
        | SqlExpr::EntityRefMember(_)
        | SqlExpr::TypeCheck(_) => true,
        SqlExpr::EntityConstant(constant) => constant.identity.is_none(),
        SqlExpr::SubStatement(statement) => !statement.is_resolved(),
        _ => false,
    })
}
