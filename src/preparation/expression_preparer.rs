//! Query expression → relational expression.

use log::{debug, trace};

use crate::{
    query_model::{BinaryOp, ConstantValue, DataType, MemberRef, QueryExpr, UnaryOp},
    sql_statement::{
        sql_expr::{
            CaseWhen, ClientMethodCall, CoalesceExpr, NewExpr, NewMember, SqlCollection,
            SqlConvert, SqlUnary, SqlUnaryOp, TypeCheckExpr,
        },
        ResultShape, SqlExpr, Statement, StatementBuilder,
    },
};

use super::{
    context::PreparationContext, errors::PreparationError, transformers::PreparedMethodCall,
    PreparationResult, PreparationStage,
};

impl<'a> PreparationStage<'a> {
    /// Prepares `expr`. Sub-queries that must become tables are added to `builder`.
    pub fn prepare_expression(
        &mut self,
        expr: &QueryExpr,
        context: &PreparationContext<'_>,
        builder: &mut StatementBuilder,
    ) -> PreparationResult<SqlExpr> {
        if let Some(mapped) = context.get_expression_mapping(expr) {
            return Ok(mapped.clone());
        }

        match expr {
            QueryExpr::Constant { value, data_type } => Ok(prepare_constant(value, data_type)),
            QueryExpr::Queryable { item_type } => Err(PreparationError::UnsupportedExpression(
                format!("table root of `{}` outside a from clause", item_type),
            )),
            QueryExpr::SourceRef { source, .. } => context
                .get_source_mapping(*source)
                .cloned()
                .ok_or(PreparationError::UnknownSource(*source)),
            QueryExpr::Member { expr: inner, member } => {
                if let QueryExpr::SubQuery { model } = inner.as_ref() {
                    let statement = self.prepare_query_model(model, context)?;
                    if matches!(statement.shape(), ResultShape::SingleValue { .. }) {
                        let pushed = self.push_member_into_statement(statement, member)?;
                        return self.promote_sub_statement(pushed, builder);
                    }
                    let promoted = self.promote_sub_statement(statement, builder)?;
                    return self.member_access(promoted, member);
                }
                let prepared = self.prepare_expression(inner, context, builder)?;
                self.member_access(prepared, member)
            }
            QueryExpr::MethodCall {
                object,
                method,
                args,
                result_type,
            } => {
                let object = match object {
                    Some(object) => Some(self.prepare_expression(object, context, builder)?),
                    None => None,
                };
                let args = args
                    .iter()
                    .map(|arg| self.prepare_expression(arg, context, builder))
                    .collect::<PreparationResult<Vec<_>>>()?;

                if let Some(transform) = self.transformers.get_method(&method.key()) {
                    trace!("Transforming method call {}", method);
                    return transform(PreparedMethodCall {
                        method: method.clone(),
                        object,
                        args,
                        result_type: result_type.clone(),
                    });
                }

                debug!(
                    "No transformer for {}, selecting its operands for client evaluation",
                    method
                );
                Ok(SqlExpr::MethodCall(ClientMethodCall {
                    object: object
                        .map(|object| Box::new(SqlExpr::named(Some("Object".to_string()), object))),
                    method: method.clone(),
                    args: args
                        .into_iter()
                        .enumerate()
                        .map(|(i, arg)| SqlExpr::named(Some(format!("Arg{}", i)), arg))
                        .collect(),
                    data_type: result_type.clone(),
                }))
            }
            QueryExpr::Unary { op, operand } => {
                let operand = self.prepare_expression(operand, context, builder)?;
                Ok(match op {
                    UnaryOp::Not => SqlExpr::not(operand),
                    UnaryOp::Negate => SqlExpr::Unary(SqlUnary {
                        op: SqlUnaryOp::Negate,
                        operand: Box::new(operand),
                    }),
                    UnaryOp::Convert(target) => SqlExpr::Convert(SqlConvert {
                        operand: Box::new(operand),
                        target: target.clone(),
                    }),
                })
            }
            QueryExpr::Binary { op, left, right } => {
                if matches!(op, BinaryOp::Equal | BinaryOp::NotEqual) {
                    let compared = if right.is_null_constant() {
                        Some(left)
                    } else if left.is_null_constant() {
                        Some(right)
                    } else {
                        None
                    };
                    if let Some(compared) = compared {
                        let compared = self.prepare_expression(compared, context, builder)?;
                        return Ok(match op {
                            BinaryOp::Equal => SqlExpr::is_null(compared),
                            _ => SqlExpr::is_not_null(compared),
                        });
                    }
                }
                let left = self.prepare_expression(left, context, builder)?;
                let right = self.prepare_expression(right, context, builder)?;
                Ok(SqlExpr::binary(*op, left, right))
            }
            QueryExpr::Conditional {
                test,
                if_true,
                if_false,
            } => {
                let data_type = if_true.data_type();
                let when = self.prepare_expression(test, context, builder)?;
                let then = self.prepare_expression(if_true, context, builder)?;
                let else_value = self.prepare_expression(if_false, context, builder)?;
                Ok(SqlExpr::case(
                    vec![CaseWhen { when, then }],
                    Some(else_value),
                    data_type,
                ))
            }
            QueryExpr::Coalesce { left, right } => {
                let left = self.prepare_expression(left, context, builder)?;
                let right = self.prepare_expression(right, context, builder)?;
                Ok(SqlExpr::Coalesce(CoalesceExpr {
                    left: Box::new(left),
                    right: Box::new(right),
                }))
            }
            QueryExpr::SubQuery { model } => {
                let statement = self.prepare_query_model(model, context)?;
                self.promote_sub_statement(statement, builder)
            }
            QueryExpr::New { type_name, members } => {
                let members = members
                    .iter()
                    .map(|(name, member)| {
                        Ok(NewMember {
                            name: name.clone(),
                            expr: self.prepare_expression(member, context, builder)?,
                        })
                    })
                    .collect::<PreparationResult<Vec<_>>>()?;
                Ok(SqlExpr::New(NewExpr {
                    type_name: type_name.clone(),
                    members,
                }))
            }
            QueryExpr::TypeIs { expr, target } => {
                let expr = self.prepare_expression(expr, context, builder)?;
                Ok(SqlExpr::TypeCheck(TypeCheckExpr {
                    expr: Box::new(expr),
                    target: target.clone(),
                }))
            }
        }
    }

    /// Applies a member access to an already prepared expression, pushing it into conditional
    /// branches, constructed objects and single-value sub-statements where possible.
    pub(crate) fn member_access(
        &mut self,
        expr: SqlExpr,
        member: &MemberRef,
    ) -> PreparationResult<SqlExpr> {
        match expr {
            SqlExpr::Named(named) => self.member_access(*named.expr, member),
            SqlExpr::Case(case) => {
                let mut cases = Vec::with_capacity(case.cases.len());
                for when_then in case.cases {
                    cases.push(CaseWhen {
                        when: when_then.when,
                        then: self.member_access(when_then.then, member)?,
                    });
                }
                let else_value = match case.else_value {
                    Some(else_value) => Some(self.member_access(*else_value, member)?),
                    None => None,
                };
                Ok(SqlExpr::case(cases, else_value, member.member_type.clone()))
            }
            SqlExpr::Coalesce(coalesce) => {
                let left = *coalesce.left;
                let when = SqlExpr::is_not_null(left.clone());
                let then = self.member_access(left, member)?;
                let else_value = self.member_access(*coalesce.right, member)?;
                Ok(SqlExpr::case(
                    vec![CaseWhen { when, then }],
                    Some(else_value),
                    member.member_type.clone(),
                ))
            }
            SqlExpr::New(new) => {
                let type_name = new.type_name.clone();
                new.members
                    .into_iter()
                    .find(|m| m.name == member.name)
                    .map(|m| m.expr)
                    .ok_or_else(|| {
                        PreparationError::UnsupportedExpression(format!(
                            "member `{}` of constructed type `{}`",
                            member.name, type_name
                        ))
                    })
            }
            SqlExpr::Grouping(grouping) if member.name == "Key" => Ok(grouping.key.into_unnamed()),
            SqlExpr::SubStatement(statement)
                if matches!(statement.shape(), ResultShape::SingleValue { .. }) =>
            {
                let pushed = self.push_member_into_statement(*statement, member)?;
                Ok(SqlExpr::SubStatement(Box::new(pushed)))
            }
            other => match self.transformers.get_member(&member.key()) {
                Some(transform) => {
                    trace!("Transforming member {}", member);
                    Ok(transform(other, member))
                }
                None => Ok(SqlExpr::member(other, member.clone())),
            },
        }
    }

    /// `(SELECT TOP 1 x FROM ...).M` → `SELECT TOP 1 x.M FROM ...`
    fn push_member_into_statement(
        &mut self,
        statement: Statement,
        member: &MemberRef,
    ) -> PreparationResult<Statement> {
        let mut builder = StatementBuilder::from_statement(statement);
        let projection = builder
            .select_projection
            .take()
            .ok_or(crate::sql_statement::StatementError::MissingSelectProjection)?;
        builder.select_projection = Some(self.member_access(projection, member)?);
        if let Some(ResultShape::SingleValue {
            return_default_when_empty,
            ..
        }) = builder.shape.take()
        {
            builder.shape = Some(ResultShape::SingleValue {
                data_type: member.member_type.clone(),
                return_default_when_empty,
            });
        }
        Ok(builder.into_statement()?)
    }
}

pub(crate) fn prepare_constant(value: &ConstantValue, data_type: &DataType) -> SqlExpr {
    match value {
        ConstantValue::Null => SqlExpr::literal_null(data_type.clone()),
        ConstantValue::Collection(items) => {
            let item_type = data_type
                .element_type()
                .cloned()
                .unwrap_or(DataType::Object);
            SqlExpr::Collection(SqlCollection {
                items: items
                    .iter()
                    .map(|item| prepare_constant(item, &item_type))
                    .collect(),
                item_type,
            })
        }
        other => SqlExpr::constant(other.clone(), data_type.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::TranslatorConfig,
        preparation::{
            result_operators::DEFAULT_RESULT_OPERATOR_HANDLERS,
            transformers::DEFAULT_METHOD_CALL_TRANSFORMERS,
        },
        query_model::{MethodRef, SourceId},
        sql_statement::TableId,
        utils::AliasGenerator,
    };

    fn cook_ref() -> SqlExpr {
        SqlExpr::table_reference(TableId(0), DataType::entity("Cook"))
    }

    fn prepare(expr: &QueryExpr) -> SqlExpr {
        let mut generator = AliasGenerator::new();
        let config = TranslatorConfig::default();
        let mut stage = PreparationStage::new(
            &mut generator,
            &DEFAULT_METHOD_CALL_TRANSFORMERS,
            &DEFAULT_RESULT_OPERATOR_HANDLERS,
            &config,
        );
        let mut context = PreparationContext::new();
        context.add_source_mapping(SourceId(0), cook_ref());
        let mut builder = StatementBuilder::new();
        stage
            .prepare_expression(expr, &context, &mut builder)
            .unwrap()
    }

    fn cook() -> QueryExpr {
        QueryExpr::SourceRef {
            source: SourceId(0),
            item_type: DataType::entity("Cook"),
        }
    }

    fn first_name() -> MemberRef {
        MemberRef::new("Cook", "FirstName", DataType::String)
    }

    #[test]
    fn test_equality_with_null_becomes_is_null() {
        let expr = cook()
            .member(first_name())
            .equal(QueryExpr::null(DataType::String));
        assert_eq!(
            prepare(&expr),
            SqlExpr::is_null(SqlExpr::member(cook_ref(), first_name()))
        );

        let expr = QueryExpr::null(DataType::String).not_equal(cook().member(first_name()));
        assert_eq!(
            prepare(&expr),
            SqlExpr::is_not_null(SqlExpr::member(cook_ref(), first_name()))
        );
    }

    #[test]
    fn test_member_of_conditional_is_pushed_into_branches() {
        let knife = MemberRef::new("Cook", "Knife", DataType::entity("Knife"));
        let name = MemberRef::new("Knife", "Name", DataType::String);
        let expr = QueryExpr::conditional(
            QueryExpr::boolean(true),
            cook().member(knife.clone()),
            QueryExpr::null(DataType::entity("Knife")),
        )
        .member(name.clone());

        match prepare(&expr) {
            SqlExpr::Case(case) => {
                assert_eq!(
                    case.cases[0].then,
                    SqlExpr::member(SqlExpr::member(cook_ref(), knife), name.clone())
                );
                assert_eq!(
                    case.else_value.as_deref(),
                    Some(&SqlExpr::member(
                        SqlExpr::literal_null(DataType::entity("Knife")),
                        name
                    ))
                );
                assert_eq!(case.data_type, DataType::String);
            }
            other => panic!("expected CASE, got {:?}", other),
        }
    }

    #[test]
    fn test_member_of_coalesce_selects_non_null_branch() {
        let knife = MemberRef::new("Cook", "Knife", DataType::entity("Knife"));
        let spare = MemberRef::new("Cook", "SpareKnife", DataType::entity("Knife"));
        let name = MemberRef::new("Knife", "Name", DataType::String);
        let expr = cook()
            .member(knife.clone())
            .coalesce(cook().member(spare))
            .member(name);
        match prepare(&expr) {
            SqlExpr::Case(case) => {
                assert_eq!(
                    case.cases[0].when,
                    SqlExpr::is_not_null(SqlExpr::member(cook_ref(), knife))
                );
            }
            other => panic!("expected CASE, got {:?}", other),
        }
    }

    #[test]
    fn test_member_of_new_picks_member() {
        let expr = QueryExpr::new_object(
            "Pair",
            vec![
                ("A".to_string(), QueryExpr::int(1)),
                ("B".to_string(), QueryExpr::int(2)),
            ],
        )
        .member(MemberRef::new("Pair", "B", DataType::Int32));
        assert_eq!(
            prepare(&expr),
            SqlExpr::constant(ConstantValue::Integer(2), DataType::Int32)
        );
    }

    #[test]
    fn test_string_length_uses_member_transformer() {
        let expr = cook()
            .member(first_name())
            .member(MemberRef::new("String", "Length", DataType::Int32));
        assert_eq!(prepare(&expr).to_string(), "LEN(TABLE-REF(#0, Cook).FirstName)");
    }

    #[test]
    fn test_unknown_method_becomes_client_call_with_named_operands() {
        let expr = cook().member(first_name()).call(
            MethodRef::new("String", "Normalize"),
            vec![QueryExpr::int(3)],
            DataType::String,
        );
        match prepare(&expr) {
            SqlExpr::MethodCall(call) => {
                assert!(matches!(
                    call.object.as_deref(),
                    Some(SqlExpr::Named(named)) if named.name.as_deref() == Some("Object")
                ));
                assert!(matches!(
                    &call.args[0],
                    SqlExpr::Named(named) if named.name.as_deref() == Some("Arg0")
                ));
            }
            other => panic!("expected client method call, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_source_is_an_error() {
        let mut generator = AliasGenerator::new();
        let config = TranslatorConfig::default();
        let mut stage = PreparationStage::new(
            &mut generator,
            &DEFAULT_METHOD_CALL_TRANSFORMERS,
            &DEFAULT_RESULT_OPERATOR_HANDLERS,
            &config,
        );
        let context = PreparationContext::new();
        let mut builder = StatementBuilder::new();
        let err = stage
            .prepare_expression(&cook(), &context, &mut builder)
            .unwrap_err();
        assert_eq!(err, PreparationError::UnknownSource(SourceId(0)));
    }
}
