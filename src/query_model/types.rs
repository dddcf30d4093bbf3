use serde::{Deserialize, Serialize};
use std::fmt;

/// Static type of a query or SQL expression.
///
/// Entities and anonymous projections are identified by name only; their shape is known to the
/// mapping layer (entities) or carried by the expression itself (anonymous `New` projections).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Boolean,
    Int32,
    Int64,
    Decimal,
    Double,
    String,
    Char,
    DateTime,
    Guid,
    /// Untyped value, e.g. a `NULL` literal whose target type is unknown.
    Object,
    /// A mapped domain type.
    Entity(String),
    /// A structural projection (`New`) or synthesized tuple.
    Anonymous(String),
    Sequence(Box<DataType>),
    Grouping {
        key: Box<DataType>,
        element: Box<DataType>,
    },
}

impl DataType {
    pub fn entity(name: impl Into<String>) -> Self {
        DataType::Entity(name.into())
    }

    pub fn sequence_of(item: DataType) -> Self {
        DataType::Sequence(Box::new(item))
    }

    pub fn grouping(key: DataType, element: DataType) -> Self {
        DataType::Grouping {
            key: Box::new(key),
            element: Box::new(element),
        }
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, DataType::Boolean)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Int32 | DataType::Int64 | DataType::Decimal | DataType::Double
        )
    }

    pub fn is_entity(&self) -> bool {
        matches!(self, DataType::Entity(_))
    }

    pub fn is_grouping(&self) -> bool {
        matches!(self, DataType::Grouping { .. })
    }

    /// Scalars are the types a single SQL column can hold.
    pub fn is_scalar(&self) -> bool {
        !matches!(
            self,
            DataType::Entity(_)
                | DataType::Anonymous(_)
                | DataType::Sequence(_)
                | DataType::Grouping { .. }
        )
    }

    pub fn entity_name(&self) -> Option<&str> {
        match self {
            DataType::Entity(name) => Some(name),
            _ => None,
        }
    }

    /// Item type of a sequence; `None` for every other type.
    pub fn element_type(&self) -> Option<&DataType> {
        match self {
            DataType::Sequence(item) => Some(item),
            _ => None,
        }
    }

    /// Result type of arithmetic between two operands: the wider numeric type wins, anything
    /// else keeps the left operand's type.
    pub fn widen(left: &DataType, right: &DataType) -> DataType {
        fn rank(t: &DataType) -> Option<u8> {
            match t {
                DataType::Int32 => Some(0),
                DataType::Int64 => Some(1),
                DataType::Decimal => Some(2),
                DataType::Double => Some(3),
                _ => None,
            }
        }
        match (rank(left), rank(right)) {
            (Some(l), Some(r)) if r > l => right.clone(),
            _ => left.clone(),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "bool"),
            DataType::Int32 => write!(f, "int32"),
            DataType::Int64 => write!(f, "int64"),
            DataType::Decimal => write!(f, "decimal"),
            DataType::Double => write!(f, "double"),
            DataType::String => write!(f, "string"),
            DataType::Char => write!(f, "char"),
            DataType::DateTime => write!(f, "datetime"),
            DataType::Guid => write!(f, "guid"),
            DataType::Object => write!(f, "object"),
            DataType::Entity(name) => write!(f, "{}", name),
            DataType::Anonymous(name) => write!(f, "<{}>", name),
            DataType::Sequence(item) => write!(f, "seq<{}>", item),
            DataType::Grouping { key, element } => write!(f, "grouping<{}, {}>", key, element),
        }
    }
}
