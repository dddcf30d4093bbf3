//! SQL context stage: boolean semantics for targets without a boolean value type.
//!
//! Every expression position is either a *value* or a *predicate* context.
//!
//! | position                                              | context   |
//! |-------------------------------------------------------|-----------|
//! | WHERE, join conditions, CASE tests, AND/OR/NOT operands | predicate |
//! | projection, orderings, TOP, group key, other operands  | value     |
//!
//! A predicate in a value context becomes [`SqlExpr::ConvertedBoolean`] (rendered
//! `CASE WHEN p THEN 1 ELSE 0 END`); a boolean value in a predicate context becomes `value = 1`.
//! The stage also rejects client-evaluated method calls anywhere but the outermost projection,
//! which it checks even when boolean emulation is off.

use std::mem;

use log::{debug, trace};
use thiserror::Error;

use crate::{
    config::TranslatorConfig,
    query_model::{BinaryOp, ConstantValue, DataType},
    sql_statement::{
        sql_expr::{
            CaseExpr, CaseWhen, NamedExpr, SqlBinary, SqlLiteral, SqlUnary, SqlUnaryOp,
        },
        JoinInfo, SqlExpr, SqlTable, Statement, TableSource, Transformed,
    },
};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ContextError {
    #[error("Method `{method}` has no SQL translation and can only be evaluated in the outermost projection")]
    ClientMethodOutsideProjection { method: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlContext {
    Value,
    Predicate,
}

pub struct SqlContextStage {
    emulate_boolean_as_integer: bool,
}

impl SqlContextStage {
    pub fn new(config: &TranslatorConfig) -> Self {
        Self {
            emulate_boolean_as_integer: config.emulate_boolean_as_integer,
        }
    }

    /// Applies contexts to the outermost statement of a translation.
    pub fn apply(&self, mut statement: Statement) -> Result<Statement, ContextError> {
        self.apply_statement(&mut statement, true)?;
        if self.emulate_boolean_as_integer {
            debug!("Applied SQL contexts: {}", statement);
        }
        Ok(statement)
    }

    fn apply_statement(
        &self,
        statement: &mut Statement,
        outermost: bool,
    ) -> Result<(), ContextError> {
        for table in statement.tables.iter_mut() {
            self.apply_table(table)?;
        }
        self.rewrite(&mut statement.select_projection, SqlContext::Value, outermost)?;
        if let Some(condition) = statement.where_condition.as_mut() {
            self.rewrite(condition, SqlContext::Predicate, false)?;
        }
        for ordering in statement.orderings.iter_mut() {
            self.rewrite(&mut ordering.expression, SqlContext::Value, false)?;
        }
        if let Some(top) = statement.top_expression.as_mut() {
            self.rewrite(top, SqlContext::Value, false)?;
        }
        if let Some(group_by) = statement.group_by_expression.as_mut() {
            self.rewrite(group_by, SqlContext::Value, false)?;
        }
        Ok(())
    }

    fn apply_table(&self, table: &mut SqlTable) -> Result<(), ContextError> {
        match &mut table.source {
            TableSource::SubStatement(sub) => self.apply_statement(&mut sub.statement, false)?,
            TableSource::Joined(JoinInfo::Resolved(join)) => {
                self.rewrite(&mut join.condition, SqlContext::Predicate, false)?;
            }
            _ => {}
        }
        for join in table.joins_mut() {
            self.apply_table(join)?;
        }
        Ok(())
    }

    fn rewrite(
        &self,
        slot: &mut SqlExpr,
        context: SqlContext,
        client_calls_allowed: bool,
    ) -> Result<(), ContextError> {
        let expr = mem::replace(slot, SqlExpr::literal_null(DataType::Object));
        *slot = self.apply_expr(expr, context, client_calls_allowed)?;
        Ok(())
    }

    fn apply_expr(
        &self,
        expr: SqlExpr,
        context: SqlContext,
        client_calls_allowed: bool,
    ) -> Result<SqlExpr, ContextError> {
        let allowed = client_calls_allowed;
        let expr = match expr {
            SqlExpr::Named(named) => {
                let inner = self.apply_expr(*named.expr, context, allowed)?;
                return Ok(SqlExpr::Named(NamedExpr {
                    name: named.name,
                    expr: Box::new(inner),
                }));
            }
            converted @ SqlExpr::ConvertedBoolean(_) => converted,
            SqlExpr::SubStatement(mut statement) => {
                self.apply_statement(&mut statement, false)?;
                SqlExpr::SubStatement(statement)
            }
            SqlExpr::MethodCall(call) if !allowed => {
                return Err(ContextError::ClientMethodOutsideProjection {
                    method: call.method.to_string(),
                });
            }
            SqlExpr::Binary(binary) if binary.op.is_logical() => {
                let op = binary.op;
                let left = self.apply_expr(*binary.left, SqlContext::Predicate, allowed)?;
                let right = self.apply_expr(*binary.right, SqlContext::Predicate, allowed)?;
                SqlExpr::Binary(SqlBinary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                    data_type: binary.data_type,
                })
            }
            SqlExpr::Unary(unary) if unary.op == SqlUnaryOp::Not => {
                let operand = self.apply_expr(*unary.operand, SqlContext::Predicate, allowed)?;
                SqlExpr::Unary(SqlUnary {
                    op: SqlUnaryOp::Not,
                    operand: Box::new(operand),
                })
            }
            SqlExpr::Case(case) => {
                let mut cases = Vec::with_capacity(case.cases.len());
                for when_then in case.cases {
                    cases.push(CaseWhen {
                        when: self.apply_expr(when_then.when, SqlContext::Predicate, allowed)?,
                        then: self.apply_expr(when_then.then, SqlContext::Value, allowed)?,
                    });
                }
                let else_value = match case.else_value {
                    Some(value) => Some(Box::new(self.apply_expr(
                        *value,
                        SqlContext::Value,
                        allowed,
                    )?)),
                    None => None,
                };
                SqlExpr::Case(CaseExpr {
                    cases,
                    else_value,
                    data_type: case.data_type,
                })
            }
            other => {
                other.map_children(&mut |child| self.apply_expr(child, SqlContext::Value, allowed))?
            }
        };

        if !self.emulate_boolean_as_integer {
            return Ok(expr);
        }
        let converted = convert_for_context(expr, context);
        if converted.is_yes() {
            trace!("Converted boolean for {:?} context", context);
        }
        Ok(converted.into_inner())
    }
}

/// Converts a single node (children already handled) for `context`.
fn convert_for_context(expr: SqlExpr, context: SqlContext) -> Transformed<SqlExpr> {
    match context {
        SqlContext::Value => match expr {
            predicate if predicate.is_predicate() => {
                Transformed::Yes(SqlExpr::ConvertedBoolean(Box::new(predicate)))
            }
            literal @ SqlExpr::Literal(SqlLiteral {
                value: ConstantValue::Boolean(_),
                ..
            }) => Transformed::Yes(SqlExpr::ConvertedBoolean(Box::new(literal))),
            other => Transformed::No(other),
        },
        SqlContext::Predicate => match expr {
            SqlExpr::ConvertedBoolean(inner) if inner.is_predicate() => Transformed::Yes(*inner),
            SqlExpr::Literal(SqlLiteral {
                value: ConstantValue::Boolean(value),
                ..
            }) => Transformed::Yes(SqlExpr::binary(
                BinaryOp::Equal,
                SqlExpr::literal_int(i64::from(value)),
                SqlExpr::literal_int(1),
            )),
            value if value.data_type().is_boolean() && !value.is_predicate() => {
                Transformed::Yes(SqlExpr::equal(value, SqlExpr::literal_int(1)))
            }
            other => Transformed::No(other),
        },
    }
}
