//! Relational expression tree.
//!
//! Preparation produces expressions that may still contain unresolved nodes
//! ([`SqlExpr::TableReference`], [`SqlExpr::Member`], [`SqlExpr::TypeCheck`], entity constants
//! without identity...). Mapping resolution replaces every one of them; the downstream renderer
//! only ever sees the resolved subset.

use serde::{Deserialize, Serialize};

use crate::query_model::{BinaryOp, ConstantValue, DataType, MemberRef, MethodRef};

use super::{
    entity::{combine_names, ColumnExpr, EntityExpr},
    AggregationModifier, Ordering, Statement, TableId,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlLiteral {
    pub value: ConstantValue,
    pub data_type: DataType,
}

/// A value captured by the query; rendered as a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlConstant {
    pub value: ConstantValue,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedExpr {
    pub name: Option<String>,
    pub expr: Box<SqlExpr>,
}

/// Reference to the items of a table of the enclosing (or an outer) statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableReference {
    pub table: TableId,
    pub item_type: DataType,
}

/// Member access not yet resolved against the mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberAccess {
    pub expr: Box<SqlExpr>,
    pub member: MemberRef,
}

/// Navigation marker: a relationship member of an entity. Becomes a join only when traversed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRefMember {
    pub entity: EntityExpr,
    pub member: MemberRef,
}

/// A constant of a mapped type together with the expression identifying it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConstant {
    pub entity_type: String,
    pub value: ConstantValue,
    pub identity: Option<Box<SqlExpr>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlUnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlUnary {
    pub op: SqlUnaryOp,
    pub operand: Box<SqlExpr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlConvert {
    pub operand: Box<SqlExpr>,
    pub target: DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlBinary {
    pub op: BinaryOp,
    pub left: Box<SqlExpr>,
    pub right: Box<SqlExpr>,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseWhen {
    pub when: SqlExpr,
    pub then: SqlExpr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseExpr {
    pub cases: Vec<CaseWhen>,
    pub else_value: Option<Box<SqlExpr>>,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoalesceExpr {
    pub left: Box<SqlExpr>,
    pub right: Box<SqlExpr>,
}

/// `item IN (set)` where `set` is a [`SqlExpr::Collection`] or a [`SqlExpr::SubStatement`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InExpr {
    pub item: Box<SqlExpr>,
    pub set: Box<SqlExpr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlCollection {
    pub items: Vec<SqlExpr>,
    pub item_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikeExpr {
    pub expr: Box<SqlExpr>,
    pub pattern: Box<SqlExpr>,
    pub escape: Option<char>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationExpr {
    pub modifier: AggregationModifier,
    pub expr: Box<SqlExpr>,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowNumberExpr {
    pub orderings: Vec<Ordering>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionExpr {
    pub name: String,
    pub args: Vec<SqlExpr>,
    pub data_type: DataType,
}

/// A call the target cannot evaluate; its object and arguments are selected as named values and
/// the call itself is applied by the consumer. Legal only in the outermost projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientMethodCall {
    pub object: Option<Box<SqlExpr>>,
    pub method: MethodRef,
    pub args: Vec<SqlExpr>,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMember {
    pub name: String,
    pub expr: SqlExpr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpr {
    pub type_name: String,
    pub members: Vec<NewMember>,
}

impl NewExpr {
    pub fn member(&self, name: &str) -> Option<&SqlExpr> {
        self.members
            .iter()
            .find(|m| m.name == name)
            .map(|m| &m.expr)
    }
}

/// Projection of a grouped statement: the key, the element, and the aggregations other
/// statements have requested over each group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingExpr {
    pub key: Box<SqlExpr>,
    pub element: Box<SqlExpr>,
    pub aggregations: Vec<SqlExpr>,
    pub data_type: DataType,
}

impl GroupingExpr {
    pub const KEY_NAME: &'static str = "key";
    pub const ELEMENT_NAME: &'static str = "element";

    pub fn create_with_names(key: SqlExpr, element: SqlExpr) -> Self {
        let data_type = DataType::grouping(key.data_type(), element.data_type());
        Self {
            key: Box::new(SqlExpr::named(Some(Self::KEY_NAME.to_string()), key)),
            element: Box::new(SqlExpr::named(Some(Self::ELEMENT_NAME.to_string()), element)),
            aggregations: vec![],
            data_type,
        }
    }

    pub fn aggregation_name(index: usize) -> String {
        format!("a{}", index)
    }

    /// Appends a named aggregation, returning the name it was given.
    pub fn add_aggregation(&mut self, aggregation: SqlExpr) -> String {
        let name = Self::aggregation_name(self.aggregations.len());
        self.aggregations
            .push(SqlExpr::named(Some(name.clone()), aggregation));
        name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeCheckExpr {
    pub expr: Box<SqlExpr>,
    pub target: DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlExpr {
    Literal(SqlLiteral),
    Constant(SqlConstant),
    Column(ColumnExpr),
    Entity(EntityExpr),
    Named(NamedExpr),
    TableReference(TableReference),
    Member(MemberAccess),
    EntityRefMember(EntityRefMember),
    EntityConstant(EntityConstant),
    Unary(SqlUnary),
    Convert(SqlConvert),
    Binary(SqlBinary),
    IsNull(Box<SqlExpr>),
    IsNotNull(Box<SqlExpr>),
    Case(CaseExpr),
    Coalesce(CoalesceExpr),
    In(InExpr),
    Collection(SqlCollection),
    Exists(Box<SqlExpr>),
    Like(LikeExpr),
    Aggregation(AggregationExpr),
    RowNumber(RowNumberExpr),
    Function(FunctionExpr),
    MethodCall(ClientMethodCall),
    SubStatement(Box<Statement>),
    New(NewExpr),
    Grouping(GroupingExpr),
    TypeCheck(TypeCheckExpr),
    /// A predicate evaluated in value context (`CASE WHEN p THEN 1 ELSE 0 END`), or a boolean
    /// literal rendered as 1/0.
    ConvertedBoolean(Box<SqlExpr>),
}

impl SqlExpr {
    pub fn literal(value: ConstantValue, data_type: DataType) -> Self {
        SqlExpr::Literal(SqlLiteral { value, data_type })
    }

    pub fn literal_int(value: i64) -> Self {
        SqlExpr::literal(ConstantValue::Integer(value), DataType::Int32)
    }

    pub fn literal_bool(value: bool) -> Self {
        SqlExpr::literal(ConstantValue::Boolean(value), DataType::Boolean)
    }

    pub fn literal_null(data_type: DataType) -> Self {
        SqlExpr::literal(ConstantValue::Null, data_type)
    }

    pub fn constant(value: ConstantValue, data_type: DataType) -> Self {
        SqlExpr::Constant(SqlConstant { value, data_type })
    }

    pub fn column(
        owning_alias: impl Into<String>,
        name: impl Into<String>,
        data_type: DataType,
        is_primary_key: bool,
    ) -> Self {
        SqlExpr::Column(ColumnExpr::new(
            owning_alias,
            name,
            data_type,
            is_primary_key,
        ))
    }

    /// Wraps `expr` with a projection name; nested names collapse into one.
    pub fn named(name: Option<String>, expr: SqlExpr) -> Self {
        match expr {
            SqlExpr::Named(inner) => SqlExpr::Named(NamedExpr {
                name: combine_names(name.as_deref(), inner.name.as_deref()),
                expr: inner.expr,
            }),
            other => SqlExpr::Named(NamedExpr {
                name,
                expr: Box::new(other),
            }),
        }
    }

    pub fn table_reference(table: TableId, item_type: DataType) -> Self {
        SqlExpr::TableReference(TableReference { table, item_type })
    }

    pub fn member(expr: SqlExpr, member: MemberRef) -> Self {
        SqlExpr::Member(MemberAccess {
            expr: Box::new(expr),
            member,
        })
    }

    pub fn binary(op: BinaryOp, left: SqlExpr, right: SqlExpr) -> Self {
        let data_type = if op.is_comparison() || op.is_logical() {
            DataType::Boolean
        } else {
            DataType::widen(&left.data_type(), &right.data_type())
        };
        SqlExpr::Binary(SqlBinary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            data_type,
        })
    }

    pub fn equal(left: SqlExpr, right: SqlExpr) -> Self {
        SqlExpr::binary(BinaryOp::Equal, left, right)
    }

    pub fn and(left: SqlExpr, right: SqlExpr) -> Self {
        SqlExpr::binary(BinaryOp::And, left, right)
    }

    pub fn or(left: SqlExpr, right: SqlExpr) -> Self {
        SqlExpr::binary(BinaryOp::Or, left, right)
    }

    pub fn not(operand: SqlExpr) -> Self {
        SqlExpr::Unary(SqlUnary {
            op: SqlUnaryOp::Not,
            operand: Box::new(operand),
        })
    }

    pub fn is_null(expr: SqlExpr) -> Self {
        SqlExpr::IsNull(Box::new(expr))
    }

    pub fn is_not_null(expr: SqlExpr) -> Self {
        SqlExpr::IsNotNull(Box::new(expr))
    }

    pub fn case(cases: Vec<CaseWhen>, else_value: Option<SqlExpr>, data_type: DataType) -> Self {
        SqlExpr::Case(CaseExpr {
            cases,
            else_value: else_value.map(Box::new),
            data_type,
        })
    }

    pub fn function(name: impl Into<String>, args: Vec<SqlExpr>, data_type: DataType) -> Self {
        SqlExpr::Function(FunctionExpr {
            name: name.into(),
            args,
            data_type,
        })
    }

    pub fn aggregation(modifier: AggregationModifier, expr: SqlExpr, data_type: DataType) -> Self {
        SqlExpr::Aggregation(AggregationExpr {
            modifier,
            expr: Box::new(expr),
            data_type,
        })
    }

    pub fn exists(sub_statement: SqlExpr) -> Self {
        SqlExpr::Exists(Box::new(sub_statement))
    }

    pub fn in_set(item: SqlExpr, set: SqlExpr) -> Self {
        SqlExpr::In(InExpr {
            item: Box::new(item),
            set: Box::new(set),
        })
    }

    /// Strips any projection name.
    pub fn unwrap_named(&self) -> &SqlExpr {
        match self {
            SqlExpr::Named(named) => named.expr.unwrap_named(),
            other => other,
        }
    }

    pub fn into_unnamed(self) -> SqlExpr {
        match self {
            SqlExpr::Named(named) => named.expr.into_unnamed(),
            other => other,
        }
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(
            self.unwrap_named(),
            SqlExpr::Literal(SqlLiteral {
                value: ConstantValue::Null,
                ..
            }) | SqlExpr::Constant(SqlConstant {
                value: ConstantValue::Null,
                ..
            })
        )
    }

    /// Whether this node is a predicate in SQL (as opposed to a value that happens to be
    /// boolean-typed, such as a bit column).
    pub fn is_predicate(&self) -> bool {
        match self {
            SqlExpr::Binary(binary) => binary.op.is_comparison() || binary.op.is_logical(),
            SqlExpr::Unary(unary) => unary.op == SqlUnaryOp::Not,
            SqlExpr::IsNull(_)
            | SqlExpr::IsNotNull(_)
            | SqlExpr::In(_)
            | SqlExpr::Exists(_)
            | SqlExpr::Like(_)
            | SqlExpr::TypeCheck(_) => true,
            SqlExpr::Named(named) => named.expr.is_predicate(),
            _ => false,
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            SqlExpr::Literal(literal) => literal.data_type.clone(),
            SqlExpr::Constant(constant) => constant.data_type.clone(),
            SqlExpr::Column(column) => column.data_type.clone(),
            SqlExpr::Entity(entity) => entity.data_type(),
            SqlExpr::Named(named) => named.expr.data_type(),
            SqlExpr::TableReference(reference) => reference.item_type.clone(),
            SqlExpr::Member(access) => access.member.member_type.clone(),
            SqlExpr::EntityRefMember(marker) => marker.member.member_type.clone(),
            SqlExpr::EntityConstant(constant) => DataType::entity(constant.entity_type.clone()),
            SqlExpr::Unary(unary) => match unary.op {
                SqlUnaryOp::Not => DataType::Boolean,
                SqlUnaryOp::Negate => unary.operand.data_type(),
            },
            SqlExpr::Convert(convert) => convert.target.clone(),
            SqlExpr::Binary(binary) => binary.data_type.clone(),
            SqlExpr::IsNull(_)
            | SqlExpr::IsNotNull(_)
            | SqlExpr::In(_)
            | SqlExpr::Exists(_)
            | SqlExpr::Like(_)
            | SqlExpr::TypeCheck(_)
            | SqlExpr::ConvertedBoolean(_) => DataType::Boolean,
            SqlExpr::Case(case) => case.data_type.clone(),
            SqlExpr::Coalesce(coalesce) => coalesce.left.data_type(),
            SqlExpr::Collection(collection) => {
                DataType::sequence_of(collection.item_type.clone())
            }
            SqlExpr::Aggregation(aggregation) => aggregation.data_type.clone(),
            SqlExpr::RowNumber(_) => DataType::Int64,
            SqlExpr::Function(function) => function.data_type.clone(),
            SqlExpr::MethodCall(call) => call.data_type.clone(),
            SqlExpr::SubStatement(statement) => statement.data_type(),
            SqlExpr::New(new) => DataType::Anonymous(new.type_name.clone()),
            SqlExpr::Grouping(grouping) => grouping.data_type.clone(),
        }
    }

    /// Applies `f` to every direct child expression, rebuilding this node. Nested statements are
    /// not entered.
    pub fn map_children<E>(
        self,
        f: &mut impl FnMut(SqlExpr) -> Result<SqlExpr, E>,
    ) -> Result<SqlExpr, E> {
        fn boxed<E>(
            expr: Box<SqlExpr>,
            f: &mut impl FnMut(SqlExpr) -> Result<SqlExpr, E>,
        ) -> Result<Box<SqlExpr>, E> {
            f(*expr).map(Box::new)
        }
        Ok(match self {
            SqlExpr::Named(named) => SqlExpr::Named(NamedExpr {
                name: named.name,
                expr: boxed(named.expr, f)?,
            }),
            SqlExpr::Member(access) => SqlExpr::Member(MemberAccess {
                expr: boxed(access.expr, f)?,
                member: access.member,
            }),
            SqlExpr::Unary(unary) => SqlExpr::Unary(SqlUnary {
                op: unary.op,
                operand: boxed(unary.operand, f)?,
            }),
            SqlExpr::Convert(convert) => SqlExpr::Convert(SqlConvert {
                operand: boxed(convert.operand, f)?,
                target: convert.target,
            }),
            SqlExpr::Binary(binary) => SqlExpr::Binary(SqlBinary {
                op: binary.op,
                left: boxed(binary.left, f)?,
                right: boxed(binary.right, f)?,
                data_type: binary.data_type,
            }),
            SqlExpr::IsNull(inner) => SqlExpr::IsNull(boxed(inner, f)?),
            SqlExpr::IsNotNull(inner) => SqlExpr::IsNotNull(boxed(inner, f)?),
            SqlExpr::Exists(inner) => SqlExpr::Exists(boxed(inner, f)?),
            SqlExpr::ConvertedBoolean(inner) => SqlExpr::ConvertedBoolean(boxed(inner, f)?),
            SqlExpr::Case(case) => {
                let mut cases = Vec::with_capacity(case.cases.len());
                for when_then in case.cases {
                    cases.push(CaseWhen {
                        when: f(when_then.when)?,
                        then: f(when_then.then)?,
                    });
                }
                let else_value = match case.else_value {
                    Some(value) => Some(boxed(value, f)?),
                    None => None,
                };
                SqlExpr::Case(CaseExpr {
                    cases,
                    else_value,
                    data_type: case.data_type,
                })
            }
            SqlExpr::Coalesce(coalesce) => SqlExpr::Coalesce(CoalesceExpr {
                left: boxed(coalesce.left, f)?,
                right: boxed(coalesce.right, f)?,
            }),
            SqlExpr::In(in_expr) => SqlExpr::In(InExpr {
                item: boxed(in_expr.item, f)?,
                set: boxed(in_expr.set, f)?,
            }),
            SqlExpr::Collection(collection) => SqlExpr::Collection(SqlCollection {
                items: collection
                    .items
                    .into_iter()
                    .map(|item| f(item))
                    .collect::<Result<_, _>>()?,
                item_type: collection.item_type,
            }),
            SqlExpr::Like(like) => SqlExpr::Like(LikeExpr {
                expr: boxed(like.expr, f)?,
                pattern: boxed(like.pattern, f)?,
                escape: like.escape,
            }),
            SqlExpr::Aggregation(aggregation) => SqlExpr::Aggregation(AggregationExpr {
                modifier: aggregation.modifier,
                expr: boxed(aggregation.expr, f)?,
                data_type: aggregation.data_type,
            }),
            SqlExpr::RowNumber(row_number) => {
                let mut orderings = Vec::with_capacity(row_number.orderings.len());
                for ordering in row_number.orderings {
                    orderings.push(Ordering {
                        expression: f(ordering.expression)?,
                        direction: ordering.direction,
                    });
                }
                SqlExpr::RowNumber(RowNumberExpr { orderings })
            }
            SqlExpr::Function(function) => SqlExpr::Function(FunctionExpr {
                name: function.name,
                args: function
                    .args
                    .into_iter()
                    .map(|arg| f(arg))
                    .collect::<Result<_, _>>()?,
                data_type: function.data_type,
            }),
            SqlExpr::MethodCall(call) => SqlExpr::MethodCall(ClientMethodCall {
                object: match call.object {
                    Some(object) => Some(boxed(object, f)?),
                    None => None,
                },
                method: call.method,
                args: call
                    .args
                    .into_iter()
                    .map(|arg| f(arg))
                    .collect::<Result<_, _>>()?,
                data_type: call.data_type,
            }),
            SqlExpr::New(new) => SqlExpr::New(NewExpr {
                type_name: new.type_name,
                members: new
                    .members
                    .into_iter()
                    .map(|member| {
                        Ok(NewMember {
                            name: member.name,
                            expr: f(member.expr)?,
                        })
                    })
                    .collect::<Result<_, E>>()?,
            }),
            SqlExpr::Grouping(grouping) => SqlExpr::Grouping(GroupingExpr {
                key: boxed(grouping.key, f)?,
                element: boxed(grouping.element, f)?,
                aggregations: grouping
                    .aggregations
                    .into_iter()
                    .map(|aggregation| f(aggregation))
                    .collect::<Result<_, _>>()?,
                data_type: grouping.data_type,
            }),
            SqlExpr::TypeCheck(check) => SqlExpr::TypeCheck(TypeCheckExpr {
                expr: boxed(check.expr, f)?,
                target: check.target,
            }),
            SqlExpr::EntityConstant(constant) => SqlExpr::EntityConstant(EntityConstant {
                entity_type: constant.entity_type,
                value: constant.value,
                identity: match constant.identity {
                    Some(identity) => Some(boxed(identity, f)?),
                    None => None,
                },
            }),
            leaf @ (SqlExpr::Literal(_)
            | SqlExpr::Constant(_)
            | SqlExpr::Column(_)
            | SqlExpr::Entity(_)
            | SqlExpr::TableReference(_)
            | SqlExpr::EntityRefMember(_)
            | SqlExpr::SubStatement(_)) => leaf,
        })
    }

    /// Visits this node and all descendants (nested statements excluded) in pre-order.
    pub fn any_node(&self, predicate: &impl Fn(&SqlExpr) -> bool) -> bool {
        if predicate(self) {
            return true;
        }
        let mut found = false;
        // map_children consumes; walk a clone only when a match is still possible.
        let _ = self.clone().map_children::<()>(&mut |child| {
            if !found && child.any_node(predicate) {
                found = true;
            }
            Ok(child)
        });
        found
    }
}
