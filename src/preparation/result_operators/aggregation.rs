use log::debug;

use crate::{
    preparation::{PreparationResult, QueryModelVisitor},
    query_model::{average_type, DataType, ResultOperator},
    sql_statement::{AggregationModifier, ResultShape, SqlExpr, StatementError},
};

use super::{mismatched, ResultOperatorHandler};

/// Count, LongCount, Sum, Min, Max and Average.
///
/// Aggregating a limited, grouped, distinct or already aggregated set needs the set as a
/// sub-statement. A limited set keeps its orderings inside that sub-statement; the aggregate
/// itself is never ordered.
pub struct AggregationHandler;

impl ResultOperatorHandler for AggregationHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        visitor: &mut QueryModelVisitor<'_, '_, '_>,
    ) -> PreparationResult<()> {
        let modifier = aggregation_modifier(operator).ok_or_else(|| mismatched(operator))?;

        let builder = &visitor.builder;
        if builder.top_expression.is_some()
            || builder.group_by_expression.is_some()
            || builder.is_distinct
            || builder.aggregation_modifier != AggregationModifier::None
        {
            visitor.seal_and_wrap(false)?;
        }
        visitor.builder.orderings.clear();

        let projection = visitor
            .builder
            .select_projection
            .take()
            .ok_or(StatementError::MissingSelectProjection)?;
        let data_type = aggregation_type(operator, &projection.data_type());
        debug!("Aggregating current projection with {} as {}", modifier, data_type);

        let builder = &mut visitor.builder;
        builder.aggregation_modifier = modifier;
        builder.select_projection = Some(SqlExpr::aggregation(
            modifier,
            projection,
            data_type.clone(),
        ));
        builder.shape = Some(ResultShape::Scalar { data_type });
        Ok(())
    }
}

pub fn aggregation_modifier(operator: &ResultOperator) -> Option<AggregationModifier> {
    match operator {
        ResultOperator::Count | ResultOperator::LongCount => Some(AggregationModifier::Count),
        ResultOperator::Sum => Some(AggregationModifier::Sum),
        ResultOperator::Min => Some(AggregationModifier::Min),
        ResultOperator::Max => Some(AggregationModifier::Max),
        ResultOperator::Average => Some(AggregationModifier::Average),
        _ => None,
    }
}

/// Output type per operator kind, never inferred from the aggregation node itself.
pub fn aggregation_type(operator: &ResultOperator, operand: &DataType) -> DataType {
    match operator {
        ResultOperator::Count => DataType::Int32,
        ResultOperator::LongCount => DataType::Int64,
        ResultOperator::Average => average_type(operand),
        _ => operand.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        preparation::result_operators::test_support::*,
        query_model::{OrderingDirection, QueryExpr, SourceIdGenerator},
        sql_statement::TableSource,
    };
    use test_case::test_case;

    #[test_case(ResultOperator::Count, DataType::Int32, DataType::Int32; "count is int32")]
    #[test_case(ResultOperator::LongCount, DataType::Int32, DataType::Int64; "long count is int64")]
    #[test_case(ResultOperator::Sum, DataType::Decimal, DataType::Decimal; "sum keeps operand type")]
    #[test_case(ResultOperator::Max, DataType::DateTime, DataType::DateTime; "max keeps operand type")]
    #[test_case(ResultOperator::Average, DataType::Int32, DataType::Double; "average of ints is double")]
    #[test_case(ResultOperator::Average, DataType::Decimal, DataType::Decimal; "average of decimals is decimal")]
    fn test_aggregation_output_type(operator: ResultOperator, operand: DataType, expected: DataType) {
        assert_eq!(aggregation_type(&operator, &operand), expected);
    }

    #[test]
    fn test_count_sets_modifier_and_scalar_shape() {
        let mut ids = SourceIdGenerator::default();
        let builder = cooks_model(&mut ids);
        let cook_ref = builder.main_source();
        let model = builder
            .order_by(
                cook_ref.member(cook_member("Name", DataType::String)),
                OrderingDirection::Asc,
            )
            .result_operator(ResultOperator::Count)
            .build();
        let statement = prepare(&model);

        assert_eq!(statement.aggregation_modifier(), AggregationModifier::Count);
        assert_eq!(
            statement.shape(),
            &ResultShape::Scalar {
                data_type: DataType::Int32
            }
        );
        assert!(statement.orderings().is_empty());
        assert!(matches!(
            statement.select_projection(),
            SqlExpr::Aggregation(_)
        ));
    }

    #[test]
    fn test_aggregate_after_take_wraps_limited_statement() {
        let mut ids = SourceIdGenerator::default();
        let builder = cooks_model(&mut ids);
        let age = builder
            .main_source()
            .member(cook_member("Age", DataType::Int32));
        let model = builder
            .select(age)
            .result_operator(ResultOperator::Take {
                count: QueryExpr::int(5),
            })
            .result_operator(ResultOperator::Sum)
            .build();
        let statement = prepare(&model);

        assert_eq!(statement.aggregation_modifier(), AggregationModifier::Sum);
        assert!(statement.top_expression().is_none());
        assert_eq!(statement.tables().len(), 1);
        let TableSource::SubStatement(inner) = &statement.tables()[0].source else {
            panic!("expected the limited statement to be wrapped");
        };
        assert_eq!(
            inner.statement.top_expression(),
            Some(&constant_int(5))
        );
        assert_eq!(inner.statement.aggregation_modifier(), AggregationModifier::None);
        assert!(matches!(
            inner.statement.select_projection(),
            SqlExpr::Named(named) if named.name.as_deref() == Some("value")
        ));
    }
}
