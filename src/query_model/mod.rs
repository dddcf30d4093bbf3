//! Declarative query model: the translation input.
//!
//! A [`QueryModel`] is a main from clause, an ordered list of body clauses, a select clause and
//! an ordered list of result operators. The front-end that produces it is an external
//! collaborator; this module only defines the shape it hands over.
//!
//! ```text
//! from c in Cooks            ← main from clause
//! where c.FirstName == null  ← body clause
//! select c.Name              ← select clause
//! .Take(10).Count()          ← result operators, applied left to right
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod builder;
pub mod expr;
pub mod types;

pub use builder::QueryModelBuilder;
pub use expr::{
    BinaryOp, ConstantValue, EntityValue, MemberRef, MethodRef, QueryExpr, SourceId,
    SourceIdGenerator, SymbolKey, UnaryOp,
};
pub use types::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingDirection {
    Asc,
    Desc,
}

impl fmt::Display for OrderingDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderingDirection::Asc => write!(f, "ASC"),
            OrderingDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// A generator clause introducing a query source (`from x in <expr>`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FromClause {
    pub source_id: SourceId,
    pub item_name: String,
    pub item_type: DataType,
    pub from_expression: QueryExpr,
}

impl FromClause {
    pub fn new(
        source_id: SourceId,
        item_name: impl Into<String>,
        item_type: DataType,
        from_expression: QueryExpr,
    ) -> Self {
        Self {
            source_id,
            item_name: item_name.into(),
            item_type,
            from_expression,
        }
    }

    /// Expression referring to the items this clause produces.
    pub fn reference(&self) -> QueryExpr {
        QueryExpr::SourceRef {
            source: self.source_id,
            item_type: self.item_type.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereClause {
    pub predicate: QueryExpr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOrdering {
    pub expression: QueryExpr,
    pub direction: OrderingDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByClause {
    pub orderings: Vec<QueryOrdering>,
}

/// Inner equi-join: `join x in <inner_sequence> on <outer_key> equals <inner_key>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinClause {
    pub source_id: SourceId,
    pub item_name: String,
    pub item_type: DataType,
    pub inner_sequence: QueryExpr,
    pub outer_key_selector: QueryExpr,
    pub inner_key_selector: QueryExpr,
}

impl JoinClause {
    pub fn reference(&self) -> QueryExpr {
        QueryExpr::SourceRef {
            source: self.source_id,
            item_type: self.item_type.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "clause", rename_all = "snake_case")]
pub enum BodyClause {
    AdditionalFrom(FromClause),
    Where(WhereClause),
    OrderBy(OrderByClause),
    Join(JoinClause),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectClause {
    pub selector: QueryExpr,
}

/// Post-comprehension operators, applied in order after the select clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operator", rename_all = "snake_case")]
pub enum ResultOperator {
    Take { count: QueryExpr },
    Skip { count: QueryExpr },
    First { or_default: bool },
    Single { or_default: bool },
    Distinct,
    Count,
    LongCount,
    Sum,
    Min,
    Max,
    Average,
    Any,
    All { predicate: QueryExpr },
    Contains { item: QueryExpr },
    Group {
        key_selector: QueryExpr,
        element_selector: QueryExpr,
    },
    DefaultIfEmpty,
    OfType { target: DataType },
    Cast { target: DataType },
}

/// Symbolic tag of a result operator, used as the handler registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultOperatorKind {
    Take,
    Skip,
    First,
    Single,
    Distinct,
    Count,
    LongCount,
    Sum,
    Min,
    Max,
    Average,
    Any,
    All,
    Contains,
    Group,
    DefaultIfEmpty,
    OfType,
    Cast,
}

impl fmt::Display for ResultOperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl ResultOperator {
    pub fn kind(&self) -> ResultOperatorKind {
        match self {
            ResultOperator::Take { .. } => ResultOperatorKind::Take,
            ResultOperator::Skip { .. } => ResultOperatorKind::Skip,
            ResultOperator::First { .. } => ResultOperatorKind::First,
            ResultOperator::Single { .. } => ResultOperatorKind::Single,
            ResultOperator::Distinct => ResultOperatorKind::Distinct,
            ResultOperator::Count => ResultOperatorKind::Count,
            ResultOperator::LongCount => ResultOperatorKind::LongCount,
            ResultOperator::Sum => ResultOperatorKind::Sum,
            ResultOperator::Min => ResultOperatorKind::Min,
            ResultOperator::Max => ResultOperatorKind::Max,
            ResultOperator::Average => ResultOperatorKind::Average,
            ResultOperator::Any => ResultOperatorKind::Any,
            ResultOperator::All { .. } => ResultOperatorKind::All,
            ResultOperator::Contains { .. } => ResultOperatorKind::Contains,
            ResultOperator::Group { .. } => ResultOperatorKind::Group,
            ResultOperator::DefaultIfEmpty => ResultOperatorKind::DefaultIfEmpty,
            ResultOperator::OfType { .. } => ResultOperatorKind::OfType,
            ResultOperator::Cast { .. } => ResultOperatorKind::Cast,
        }
    }

    /// Output type of this operator given the type its input produces.
    pub fn output_data_type(&self, input: DataType) -> DataType {
        let item = input.element_type().cloned().unwrap_or_else(|| input.clone());
        match self {
            ResultOperator::Take { .. }
            | ResultOperator::Skip { .. }
            | ResultOperator::Distinct
            | ResultOperator::DefaultIfEmpty => input,
            ResultOperator::First { .. } | ResultOperator::Single { .. } => item,
            ResultOperator::Count => DataType::Int32,
            ResultOperator::LongCount => DataType::Int64,
            ResultOperator::Sum | ResultOperator::Min | ResultOperator::Max => item,
            ResultOperator::Average => average_type(&item),
            ResultOperator::Any | ResultOperator::All { .. } | ResultOperator::Contains { .. } => {
                DataType::Boolean
            }
            ResultOperator::Group {
                key_selector,
                element_selector,
            } => DataType::sequence_of(DataType::grouping(
                key_selector.data_type(),
                element_selector.data_type(),
            )),
            ResultOperator::OfType { target } | ResultOperator::Cast { target } => {
                DataType::sequence_of(target.clone())
            }
        }
    }
}

/// Average yields decimal for decimal operands and double for everything else.
pub fn average_type(operand: &DataType) -> DataType {
    match operand {
        DataType::Decimal => DataType::Decimal,
        _ => DataType::Double,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryModel {
    pub main_from_clause: FromClause,
    #[serde(default)]
    pub body_clauses: Vec<BodyClause>,
    pub select_clause: SelectClause,
    #[serde(default)]
    pub result_operators: Vec<ResultOperator>,
}

impl QueryModel {
    pub fn output_data_type(&self) -> DataType {
        let initial = DataType::sequence_of(self.select_clause.selector.data_type());
        self.result_operators
            .iter()
            .fold(initial, |acc, op| op.output_data_type(acc))
    }

    /// Whether the select clause simply returns the main from clause's items.
    pub fn selects_main_source(&self) -> bool {
        matches!(
            &self.select_clause.selector,
            QueryExpr::SourceRef { source, .. } if *source == self.main_from_clause.source_id
        )
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cooks(ids: &mut SourceIdGenerator) -> FromClause {
        FromClause::new(
            ids.next_id(),
            "c",
            DataType::entity("Cook"),
            QueryExpr::queryable(DataType::entity("Cook")),
        )
    }

    #[test]
    fn test_output_type_follows_result_operators() {
        let mut ids = SourceIdGenerator::default();
        let from = cooks(&mut ids);
        let model = QueryModelBuilder::new(from.clone())
            .result_operator(ResultOperator::Take {
                count: QueryExpr::int(5),
            })
            .result_operator(ResultOperator::Count)
            .build();
        assert_eq!(model.output_data_type(), DataType::Int32);

        let model = QueryModelBuilder::new(from)
            .result_operator(ResultOperator::First { or_default: true })
            .build();
        assert_eq!(model.output_data_type(), DataType::entity("Cook"));
    }

    #[test]
    fn test_query_model_json_roundtrip_preserves_operators() {
        let mut ids = SourceIdGenerator::default();
        let model = QueryModelBuilder::new(cooks(&mut ids))
            .result_operator(ResultOperator::Distinct)
            .build();
        let json = serde_json::to_string(&model).unwrap();
        let parsed = QueryModel::from_json(&json).unwrap();
        assert_eq!(parsed, model);
        assert!(parsed.selects_main_source());
    }
}
