//! Take, Skip, First and Single.
//!
//! SQL has TOP but no OFFSET in the targeted dialect, so Skip is emulated: the statement is
//! wrapped with a synthetic `ROW_NUMBER()` column and the outer statement filters on it. Once a
//! row number exists, later limits are expressed against it as well (`rn <= offset + n`).

use log::debug;
use std::mem;

use crate::{
    query_model::{BinaryOp, DataType, MemberRef, OrderingDirection, ResultOperator},
    sql_statement::{
        sql_expr::{NewExpr, NewMember, RowNumberExpr},
        AggregationModifier, JoinSemantics, Ordering, ResultShape, SqlExpr, StatementBuilder,
        StatementError,
    },
};

use super::{mismatched, ResultOperatorHandler};
use crate::preparation::{PreparationResult, QueryModelVisitor};

pub const ROW_NUMBERED_ITEM_TYPE: &str = "RowNumbered";
pub const ROW_NUMBERED_ITEM_KEY: &str = "key";

pub struct TakeHandler;

impl ResultOperatorHandler for TakeHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        visitor: &mut QueryModelVisitor<'_, '_, '_>,
    ) -> PreparationResult<()> {
        let ResultOperator::Take { count } = operator else {
            return Err(mismatched(operator));
        };
        let count = visitor.prepare(count)?;
        apply_limit(visitor, count)
    }
}

pub struct FirstHandler;

impl ResultOperatorHandler for FirstHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        visitor: &mut QueryModelVisitor<'_, '_, '_>,
    ) -> PreparationResult<()> {
        let ResultOperator::First { or_default } = operator else {
            return Err(mismatched(operator));
        };
        apply_single_value(visitor, 1, *or_default)
    }
}

/// Single asks for two rows so the consumer can tell "exactly one" from "more than one".
pub struct SingleHandler;

impl ResultOperatorHandler for SingleHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        visitor: &mut QueryModelVisitor<'_, '_, '_>,
    ) -> PreparationResult<()> {
        let ResultOperator::Single { or_default } = operator else {
            return Err(mismatched(operator));
        };
        apply_single_value(visitor, 2, *or_default)
    }
}

pub struct SkipHandler;

impl ResultOperatorHandler for SkipHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        visitor: &mut QueryModelVisitor<'_, '_, '_>,
    ) -> PreparationResult<()> {
        let ResultOperator::Skip { count } = operator else {
            return Err(mismatched(operator));
        };
        let count = visitor.prepare(count)?;

        let builder = &visitor.builder;
        if builder.top_expression.is_some()
            || builder.is_distinct
            || builder.aggregation_modifier != AggregationModifier::None
            || builder.group_by_expression.is_some()
        {
            visitor.seal_and_wrap(true)?;
        }

        if let Some(row_number) = visitor.builder.row_number_selector.clone() {
            let offset = match visitor.builder.current_row_number_offset.take() {
                Some(previous) => SqlExpr::binary(BinaryOp::Add, previous, count),
                None => count,
            };
            visitor.builder.add_where_condition(SqlExpr::binary(
                BinaryOp::GreaterThan,
                row_number,
                offset.clone(),
            ));
            visitor.builder.current_row_number_offset = Some(offset);
            return Ok(());
        }

        add_row_number_and_wrap(visitor, count)
    }
}

fn apply_single_value(
    visitor: &mut QueryModelVisitor<'_, '_, '_>,
    rows: i64,
    return_default_when_empty: bool,
) -> PreparationResult<()> {
    apply_limit(visitor, SqlExpr::literal_int(rows))?;
    let data_type = visitor.current_item_type()?;
    visitor.builder.shape = Some(ResultShape::SingleValue {
        data_type,
        return_default_when_empty,
    });
    Ok(())
}

fn apply_limit(visitor: &mut QueryModelVisitor<'_, '_, '_>, count: SqlExpr) -> PreparationResult<()> {
    if let Some(row_number) = visitor.builder.row_number_selector.clone() {
        let limit = match visitor.builder.current_row_number_offset.clone() {
            Some(offset) => SqlExpr::binary(BinaryOp::Add, offset, count),
            None => count,
        };
        visitor.builder.add_where_condition(SqlExpr::binary(
            BinaryOp::LessThanOrEqual,
            row_number,
            limit,
        ));
        return Ok(());
    }

    if visitor.builder.top_expression.is_some() {
        visitor.seal_and_wrap(true)?;
    }
    visitor.builder.top_expression = Some(count);
    Ok(())
}

/// Projects `{key: item, row_number: ROW_NUMBER() OVER (orderings)}`, wraps it, and continues
/// with `WHERE rn > count ORDER BY rn` in the outer statement.
fn add_row_number_and_wrap(
    visitor: &mut QueryModelVisitor<'_, '_, '_>,
    count: SqlExpr,
) -> PreparationResult<()> {
    let projection = visitor
        .builder
        .select_projection
        .take()
        .ok_or(StatementError::MissingSelectProjection)?;
    let item_type = projection.data_type();

    let mut orderings = mem::take(&mut visitor.builder.orderings);
    if orderings.is_empty() {
        orderings.push(Ordering::new(constant_ordering()?, OrderingDirection::Asc));
    }

    let row_number_name = visitor.config().row_number_column_name.clone();
    visitor.builder.select_projection = Some(SqlExpr::New(NewExpr {
        type_name: ROW_NUMBERED_ITEM_TYPE.to_string(),
        members: vec![
            NewMember {
                name: ROW_NUMBERED_ITEM_KEY.to_string(),
                expr: projection,
            },
            NewMember {
                name: row_number_name.clone(),
                expr: SqlExpr::RowNumber(RowNumberExpr { orderings }),
            },
        ],
    }));

    let (table, table_item_type) = visitor.seal_into_sub_statement_table(JoinSemantics::Inner)?;
    debug!("Skip wrapped the statement into row-numbered table {}", table);

    let reference = SqlExpr::table_reference(table, table_item_type);
    let item = SqlExpr::member(
        reference.clone(),
        MemberRef::new(ROW_NUMBERED_ITEM_TYPE, ROW_NUMBERED_ITEM_KEY, item_type.clone()),
    );
    let row_number = SqlExpr::member(
        reference,
        MemberRef::new(ROW_NUMBERED_ITEM_TYPE, row_number_name, DataType::Int64),
    );

    let builder = &mut visitor.builder;
    builder.add_where_condition(SqlExpr::binary(
        BinaryOp::GreaterThan,
        row_number.clone(),
        count.clone(),
    ));
    builder
        .orderings
        .push(Ordering::new(row_number.clone(), OrderingDirection::Asc));
    builder.row_number_selector = Some(row_number);
    builder.current_row_number_offset = Some(count);
    if let Some(ResultShape::Sequence { .. }) = builder.shape {
        builder.shape = Some(ResultShape::Sequence { item_type });
    }
    visitor.set_item_expression(item);
    Ok(())
}

/// `(SELECT 1)`: ROW_NUMBER() needs an ORDER BY even when the query has none.
fn constant_ordering() -> PreparationResult<SqlExpr> {
    let mut builder = StatementBuilder::new();
    builder.shape = Some(ResultShape::Scalar {
        data_type: DataType::Int32,
    });
    builder.select_projection = Some(SqlExpr::literal_int(1));
    Ok(SqlExpr::SubStatement(Box::new(builder.into_statement()?)))
}
