//! OfType, Cast and DefaultIfEmpty: operators that change how the current items are typed or
//! joined rather than which rows are produced.

use crate::{
    preparation::{PreparationResult, QueryModelVisitor},
    query_model::{DataType, ResultOperator},
    sql_statement::{sql_expr::TypeCheckExpr, JoinSemantics, ResultShape, SqlExpr},
};

use super::{mismatched, ResultOperatorHandler};

pub struct OfTypeHandler;

impl ResultOperatorHandler for OfTypeHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        visitor: &mut QueryModelVisitor<'_, '_, '_>,
    ) -> PreparationResult<()> {
        let ResultOperator::OfType { target } = operator else {
            return Err(mismatched(operator));
        };
        if visitor.builder.top_expression.is_some()
            || visitor.builder.row_number_selector.is_some()
        {
            visitor.seal_and_wrap(true)?;
        }
        let item = visitor.current_projection()?.clone().into_unnamed();
        visitor
            .builder
            .add_where_condition(SqlExpr::TypeCheck(TypeCheckExpr {
                expr: Box::new(item),
                target: target.clone(),
            }));
        retype_sequence(visitor, target);
        Ok(())
    }
}

/// Cast only changes the static item type; the rows are unchanged.
pub struct CastHandler;

impl ResultOperatorHandler for CastHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        visitor: &mut QueryModelVisitor<'_, '_, '_>,
    ) -> PreparationResult<()> {
        let ResultOperator::Cast { target } = operator else {
            return Err(mismatched(operator));
        };
        retype_sequence(visitor, target);
        Ok(())
    }
}

/// Moves the statement into a left-joined sub-statement table, so a from clause over it keeps
/// producing a (NULL) row when the statement is empty.
pub struct DefaultIfEmptyHandler;

impl ResultOperatorHandler for DefaultIfEmptyHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        visitor: &mut QueryModelVisitor<'_, '_, '_>,
    ) -> PreparationResult<()> {
        if !matches!(operator, ResultOperator::DefaultIfEmpty) {
            return Err(mismatched(operator));
        }
        visitor.seal_and_wrap_with_semantics(true, JoinSemantics::Left)
    }
}

fn retype_sequence(visitor: &mut QueryModelVisitor<'_, '_, '_>, target: &DataType) {
    if let Some(ResultShape::Sequence { item_type }) = &mut visitor.builder.shape {
        *item_type = target.clone();
    }
}
