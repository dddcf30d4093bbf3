use log::debug;

use crate::{
    preparation::{
        query_model_visitor::into_sequence, PreparationResult, QueryModelVisitor,
    },
    query_model::ResultOperator,
    sql_statement::{
        sql_expr::GroupingExpr, JoinSemantics, ResultShape, SqlExpr, StatementBuilder,
    },
};

use super::{mismatched, ResultOperatorHandler};

/// `GroupBy(key, element)`: the statement's projection becomes a grouping of key and element,
/// grouped by the key.
///
/// Constant keys get a one-row sub-statement (`SELECT 'k' AS key`) as their own table, since
/// grouping by a literal is rejected by most dialects. Sub-query keys are joined as tables for
/// the same reason.
pub struct GroupHandler;

impl ResultOperatorHandler for GroupHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        visitor: &mut QueryModelVisitor<'_, '_, '_>,
    ) -> PreparationResult<()> {
        let ResultOperator::Group {
            key_selector,
            element_selector,
        } = operator
        else {
            return Err(mismatched(operator));
        };

        let builder = &visitor.builder;
        if builder.top_expression.is_some()
            || builder.group_by_expression.is_some()
            || builder.is_distinct
            || builder.row_number_selector.is_some()
        {
            visitor.seal_and_wrap(false)?;
        }
        visitor.builder.orderings.clear();

        let key = visitor.prepare(key_selector)?;
        let element = visitor.prepare(element_selector)?;
        let key = match key.into_unnamed() {
            constant @ (SqlExpr::Constant(_) | SqlExpr::Literal(_)) => {
                constant_key_table(visitor, constant)?
            }
            SqlExpr::SubStatement(statement) => {
                let item_type = statement.select_projection().data_type();
                let mut sub_builder = StatementBuilder::from_statement(into_sequence(*statement)?);
                sub_builder.select_projection = sub_builder
                    .select_projection
                    .take()
                    .map(|projection| visitor.ensure_named(projection));
                let table = visitor
                    .stage
                    .create_sub_statement_table(sub_builder.into_statement()?, JoinSemantics::Inner);
                let id = table.id;
                visitor.builder.add_table(table);
                SqlExpr::table_reference(id, item_type)
            }
            other => other,
        };

        let grouping = GroupingExpr::create_with_names(key.clone(), element);
        debug!("Grouping current statement by {}", key);
        visitor.builder.group_by_expression = Some(key);
        visitor.builder.shape = Some(ResultShape::Sequence {
            item_type: grouping.data_type.clone(),
        });
        visitor.set_item_expression(SqlExpr::Grouping(grouping));
        Ok(())
    }
}

fn constant_key_table(
    visitor: &mut QueryModelVisitor<'_, '_, '_>,
    constant: SqlExpr,
) -> PreparationResult<SqlExpr> {
    let item_type = constant.data_type();
    let mut builder = StatementBuilder::new();
    builder.shape = Some(ResultShape::Sequence {
        item_type: item_type.clone(),
    });
    builder.select_projection = Some(SqlExpr::named(
        Some(GroupingExpr::KEY_NAME.to_string()),
        constant,
    ));
    let table = visitor
        .stage
        .create_sub_statement_table(builder.into_statement()?, JoinSemantics::Inner);
    let id = table.id;
    visitor.builder.add_table(table);
    Ok(SqlExpr::table_reference(id, item_type))
}
