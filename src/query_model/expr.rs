//! Expression trees referenced by query-model clauses.
//!
//! These are produced by the front-end and consumed read-only by the preparation stage.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

use super::{types::DataType, QueryModel};

/// Identity of a query source (from clause, join clause) within one translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub u32);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Allocates [`SourceId`]s for hand-built query models.
#[derive(Debug, Default)]
pub struct SourceIdGenerator {
    next: u32,
}

impl SourceIdGenerator {
    pub fn next_id(&mut self) -> SourceId {
        let id = SourceId(self.next);
        self.next += 1;
        id
    }
}

/// Stable symbolic key of a member or method: declaring type plus name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolKey {
    pub declaring_type: String,
    pub name: String,
}

impl SymbolKey {
    pub fn new(declaring_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_type, self.name)
    }
}

/// A property or field of a domain type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberRef {
    pub declaring_type: String,
    pub name: String,
    pub member_type: DataType,
}

impl MemberRef {
    pub fn new(
        declaring_type: impl Into<String>,
        name: impl Into<String>,
        member_type: DataType,
    ) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            name: name.into(),
            member_type,
        }
    }

    pub fn key(&self) -> SymbolKey {
        SymbolKey::new(self.declaring_type.clone(), self.name.clone())
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_type, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    pub declaring_type: String,
    pub name: String,
}

impl MethodRef {
    pub fn new(declaring_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            name: name.into(),
        }
    }

    pub fn key(&self) -> SymbolKey {
        SymbolKey::new(self.declaring_type.clone(), self.name.clone())
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_type, self.name)
    }
}

/// An in-memory value of a mapped type, e.g. an entity instance captured by the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityValue {
    pub entity_type: String,
    pub fields: BTreeMap<String, ConstantValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstantValue {
    Null,
    Boolean(bool),
    Integer(i64),
    /// Decimal literals are kept in their textual form to avoid precision loss.
    Decimal(String),
    Double(f64),
    String(String),
    Char(char),
    DateTime(String),
    Collection(Vec<ConstantValue>),
    Entity(EntityValue),
}

impl ConstantValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ConstantValue::Null)
    }
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Null => write!(f, "NULL"),
            ConstantValue::Boolean(b) => write!(f, "{}", b),
            ConstantValue::Integer(i) => write!(f, "{}", i),
            ConstantValue::Decimal(d) => write!(f, "{}m", d),
            ConstantValue::Double(d) => write!(f, "{}", d),
            ConstantValue::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            ConstantValue::Char(c) => write!(f, "'{}'", c),
            ConstantValue::DateTime(s) => write!(f, "#{}#", s),
            ConstantValue::Collection(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            ConstantValue::Entity(value) => write!(f, "{}{{..}}", value.entity_type),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Negate,
    Convert(DataType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Equal => "=",
            BinaryOp::NotEqual => "<>",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryExpr {
    Constant {
        value: ConstantValue,
        data_type: DataType,
    },

    /// Root of a mapped table, e.g. `db.Cooks`.
    Queryable { item_type: DataType },

    /// Reference to the items of a from/join clause.
    SourceRef { source: SourceId, item_type: DataType },

    Member {
        expr: Box<QueryExpr>,
        member: MemberRef,
    },

    /// Static methods have no `object`.
    MethodCall {
        object: Option<Box<QueryExpr>>,
        method: MethodRef,
        args: Vec<QueryExpr>,
        result_type: DataType,
    },

    Unary {
        op: UnaryOp,
        operand: Box<QueryExpr>,
    },

    Binary {
        op: BinaryOp,
        left: Box<QueryExpr>,
        right: Box<QueryExpr>,
    },

    Conditional {
        test: Box<QueryExpr>,
        if_true: Box<QueryExpr>,
        if_false: Box<QueryExpr>,
    },

    Coalesce {
        left: Box<QueryExpr>,
        right: Box<QueryExpr>,
    },

    SubQuery { model: Box<QueryModel> },

    New {
        type_name: String,
        members: Vec<(String, QueryExpr)>,
    },

    TypeIs {
        expr: Box<QueryExpr>,
        target: DataType,
    },
}

impl QueryExpr {
    pub fn constant(value: ConstantValue, data_type: DataType) -> Self {
        QueryExpr::Constant { value, data_type }
    }

    pub fn null(data_type: DataType) -> Self {
        QueryExpr::constant(ConstantValue::Null, data_type)
    }

    pub fn int(value: i64) -> Self {
        QueryExpr::constant(ConstantValue::Integer(value), DataType::Int32)
    }

    pub fn string(value: impl Into<String>) -> Self {
        QueryExpr::constant(ConstantValue::String(value.into()), DataType::String)
    }

    pub fn boolean(value: bool) -> Self {
        QueryExpr::constant(ConstantValue::Boolean(value), DataType::Boolean)
    }

    pub fn queryable(item_type: DataType) -> Self {
        QueryExpr::Queryable { item_type }
    }

    pub fn member(self, member: MemberRef) -> Self {
        QueryExpr::Member {
            expr: Box::new(self),
            member,
        }
    }

    pub fn call(self, method: MethodRef, args: Vec<QueryExpr>, result_type: DataType) -> Self {
        QueryExpr::MethodCall {
            object: Some(Box::new(self)),
            method,
            args,
            result_type,
        }
    }

    pub fn binary(op: BinaryOp, left: QueryExpr, right: QueryExpr) -> Self {
        QueryExpr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn equal(self, other: QueryExpr) -> Self {
        QueryExpr::binary(BinaryOp::Equal, self, other)
    }

    pub fn not_equal(self, other: QueryExpr) -> Self {
        QueryExpr::binary(BinaryOp::NotEqual, self, other)
    }

    pub fn and(self, other: QueryExpr) -> Self {
        QueryExpr::binary(BinaryOp::And, self, other)
    }

    pub fn not(self) -> Self {
        QueryExpr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self),
        }
    }

    pub fn conditional(test: QueryExpr, if_true: QueryExpr, if_false: QueryExpr) -> Self {
        QueryExpr::Conditional {
            test: Box::new(test),
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
        }
    }

    pub fn coalesce(self, right: QueryExpr) -> Self {
        QueryExpr::Coalesce {
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    pub fn sub_query(model: QueryModel) -> Self {
        QueryExpr::SubQuery {
            model: Box::new(model),
        }
    }

    pub fn new_object(type_name: impl Into<String>, members: Vec<(String, QueryExpr)>) -> Self {
        QueryExpr::New {
            type_name: type_name.into(),
            members,
        }
    }

    pub fn type_is(self, target: DataType) -> Self {
        QueryExpr::TypeIs {
            expr: Box::new(self),
            target,
        }
    }

    pub fn is_null_constant(&self) -> bool {
        matches!(
            self,
            QueryExpr::Constant {
                value: ConstantValue::Null,
                ..
            }
        )
    }

    pub fn data_type(&self) -> DataType {
        match self {
            QueryExpr::Constant { data_type, .. } => data_type.clone(),
            QueryExpr::Queryable { item_type } => DataType::sequence_of(item_type.clone()),
            QueryExpr::SourceRef { item_type, .. } => item_type.clone(),
            QueryExpr::Member { member, .. } => member.member_type.clone(),
            QueryExpr::MethodCall { result_type, .. } => result_type.clone(),
            QueryExpr::Unary { op, operand } => match op {
                UnaryOp::Not => DataType::Boolean,
                UnaryOp::Negate => operand.data_type(),
                UnaryOp::Convert(target) => target.clone(),
            },
            QueryExpr::Binary { op, left, right } => {
                if op.is_comparison() || op.is_logical() {
                    DataType::Boolean
                } else {
                    DataType::widen(&left.data_type(), &right.data_type())
                }
            }
            QueryExpr::Conditional { if_true, .. } => if_true.data_type(),
            QueryExpr::Coalesce { left, .. } => left.data_type(),
            QueryExpr::SubQuery { model } => model.output_data_type(),
            QueryExpr::New { type_name, .. } => DataType::Anonymous(type_name.clone()),
            QueryExpr::TypeIs { .. } => DataType::Boolean,
        }
    }
}
