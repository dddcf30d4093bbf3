use crate::{
    preparation::{PreparationResult, QueryModelVisitor},
    query_model::ResultOperator,
    sql_statement::AggregationModifier,
};

use super::{mismatched, ResultOperatorHandler};

/// DISTINCT applies before TOP and before the row-number filter, so either of those (or an
/// aggregation) forces the statement built so far into a sub-statement first.
pub struct DistinctHandler;

impl ResultOperatorHandler for DistinctHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        visitor: &mut QueryModelVisitor<'_, '_, '_>,
    ) -> PreparationResult<()> {
        if !matches!(operator, ResultOperator::Distinct) {
            return Err(mismatched(operator));
        }

        let builder = &visitor.builder;
        if builder.aggregation_modifier != AggregationModifier::None
            || builder.top_expression.is_some()
            || builder.row_number_selector.is_some()
        {
            visitor.seal_and_wrap(true)?;
        }
        visitor.builder.is_distinct = true;
        Ok(())
    }
}
