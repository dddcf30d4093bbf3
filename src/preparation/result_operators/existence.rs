//! Any, All and Contains: the statement built so far becomes the operand of an EXISTS or IN
//! test, and the outer statement selects just that boolean.

use log::debug;

use crate::{
    preparation::{PreparationError, PreparationResult, QueryModelVisitor},
    query_model::{DataType, ResultOperator},
    sql_statement::{ResultShape, SqlExpr, StatementError},
};

use super::{mismatched, ResultOperatorHandler};

pub struct AnyHandler;

impl ResultOperatorHandler for AnyHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        visitor: &mut QueryModelVisitor<'_, '_, '_>,
    ) -> PreparationResult<()> {
        if !matches!(operator, ResultOperator::Any) {
            return Err(mismatched(operator));
        }
        let exists = seal_into_exists(visitor)?;
        set_boolean_result(visitor, exists);
        Ok(())
    }
}

/// `All(p)` is `NOT EXISTS(... WHERE NOT p)`.
pub struct AllHandler;

impl ResultOperatorHandler for AllHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        visitor: &mut QueryModelVisitor<'_, '_, '_>,
    ) -> PreparationResult<()> {
        let ResultOperator::All { predicate } = operator else {
            return Err(mismatched(operator));
        };
        let predicate = visitor.prepare(predicate)?;
        visitor.builder.add_where_condition(SqlExpr::not(predicate));
        let exists = seal_into_exists(visitor)?;
        set_boolean_result(visitor, SqlExpr::not(exists));
        Ok(())
    }
}

pub struct ContainsHandler;

impl ResultOperatorHandler for ContainsHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        visitor: &mut QueryModelVisitor<'_, '_, '_>,
    ) -> PreparationResult<()> {
        let ResultOperator::Contains { item } = operator else {
            return Err(mismatched(operator));
        };

        if visitor.is_literal_collection_source() {
            let collection = match visitor.builder.select_projection.take() {
                Some(SqlExpr::Collection(collection)) => collection,
                _ => {
                    return Err(PreparationError::LiteralCollectionUsage {
                        usage: "projection of a literal collection".to_string(),
                    })
                }
            };
            let test = if collection.items.is_empty() {
                debug!("Contains on an empty collection is constant false");
                visitor.builder.tables.clear();
                visitor.builder.where_condition = None;
                SqlExpr::literal_bool(false)
            } else {
                let item = visitor.prepare(item)?;
                SqlExpr::in_set(item, SqlExpr::Collection(collection))
            };
            set_boolean_result(visitor, test);
            return Ok(());
        }

        visitor.builder.drop_unlimited_orderings();
        let statement = visitor.builder.get_statement_and_reset()?;
        let item = visitor.prepare(item)?;
        let test = SqlExpr::in_set(item, SqlExpr::SubStatement(Box::new(statement)));
        set_boolean_result(visitor, test);
        Ok(())
    }
}

fn seal_into_exists(visitor: &mut QueryModelVisitor<'_, '_, '_>) -> PreparationResult<SqlExpr> {
    visitor.builder.drop_unlimited_orderings();
    if visitor.builder.select_projection.is_none() {
        return Err(StatementError::MissingSelectProjection.into());
    }
    let statement = visitor.builder.get_statement_and_reset()?;
    Ok(SqlExpr::exists(SqlExpr::SubStatement(Box::new(statement))))
}

fn set_boolean_result(visitor: &mut QueryModelVisitor<'_, '_, '_>, test: SqlExpr) {
    visitor.builder.select_projection = Some(test);
    visitor.builder.shape = Some(ResultShape::Scalar {
        data_type: DataType::Boolean,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        preparation::result_operators::test_support::*,
        query_model::{
            ConstantValue, FromClause, QueryExpr, QueryModelBuilder, SourceIdGenerator,
        },
    };

    fn literal_ints(ids: &mut SourceIdGenerator, values: Vec<i64>) -> QueryModelBuilder {
        QueryModelBuilder::new(FromClause::new(
            ids.next_id(),
            "id",
            DataType::Int32,
            QueryExpr::constant(
                ConstantValue::Collection(values.into_iter().map(ConstantValue::Integer).collect()),
                DataType::sequence_of(DataType::Int32),
            ),
        ))
    }

    #[test]
    fn test_contains_on_empty_literal_collection_is_false() {
        let mut ids = SourceIdGenerator::default();
        let model = literal_ints(&mut ids, vec![])
            .result_operator(ResultOperator::Contains {
                item: QueryExpr::int(7),
            })
            .build();
        let statement = prepare(&model);
        assert_eq!(statement.select_projection(), &SqlExpr::literal_bool(false));
        assert!(statement.tables().is_empty());
        assert!(statement.where_condition().is_none());
        assert_eq!(
            statement.shape(),
            &ResultShape::Scalar {
                data_type: DataType::Boolean
            }
        );
    }

    #[test]
    fn test_contains_on_literal_collection_is_in_list() {
        let mut ids = SourceIdGenerator::default();
        let model = literal_ints(&mut ids, vec![1, 2])
            .result_operator(ResultOperator::Contains {
                item: QueryExpr::int(2),
            })
            .build();
        let statement = prepare(&model);
        let SqlExpr::In(in_expr) = statement.select_projection() else {
            panic!("expected an IN test");
        };
        let SqlExpr::Collection(collection) = in_expr.set.as_ref() else {
            panic!("expected a literal list");
        };
        assert_eq!(collection.items.len(), 2);
        assert!(statement.tables().is_empty());
    }

    #[test]
    fn test_literal_collection_rejects_other_operators() {
        let mut ids = SourceIdGenerator::default();
        let model = literal_ints(&mut ids, vec![1])
            .result_operator(ResultOperator::Count)
            .build();
        let result = prepare_with(
            &model,
            &crate::preparation::result_operators::DEFAULT_RESULT_OPERATOR_HANDLERS,
        );
        assert!(matches!(
            result,
            Err(PreparationError::LiteralCollectionUsage { .. })
        ));
    }

    #[test]
    fn test_contains_on_table_is_in_sub_statement() {
        let mut ids = SourceIdGenerator::default();
        let builder = cooks_model(&mut ids);
        let name = builder
            .main_source()
            .member(cook_member("Name", DataType::String));
        let model = builder
            .select(name)
            .result_operator(ResultOperator::Contains {
                item: QueryExpr::string("Hugo"),
            })
            .build();
        let statement = prepare(&model);
        assert!(statement.tables().is_empty());
        let SqlExpr::In(in_expr) = statement.select_projection() else {
            panic!("expected an IN test");
        };
        let SqlExpr::SubStatement(inner) = in_expr.set.as_ref() else {
            panic!("expected a sub-statement");
        };
        assert_eq!(inner.tables().len(), 1);
    }

    #[test]
    fn test_any_is_exists() {
        let mut ids = SourceIdGenerator::default();
        let model = cooks_model(&mut ids)
            .result_operator(ResultOperator::Any)
            .build();
        let statement = prepare(&model);
        assert!(matches!(statement.select_projection(), SqlExpr::Exists(_)));
        assert!(statement.tables().is_empty());
        assert!(statement.shape().is_scalar());
    }

    #[test]
    fn test_all_is_not_exists_with_negated_filter() {
        let mut ids = SourceIdGenerator::default();
        let builder = cooks_model(&mut ids);
        let is_star = builder
            .main_source()
            .member(cook_member("IsStarredCook", DataType::Boolean));
        let model = builder
            .result_operator(ResultOperator::All { predicate: is_star })
            .build();
        let statement = prepare(&model);

        let SqlExpr::Unary(not) = statement.select_projection() else {
            panic!("expected NOT EXISTS");
        };
        let SqlExpr::Exists(exists) = not.operand.as_ref() else {
            panic!("expected EXISTS under NOT");
        };
        let SqlExpr::SubStatement(inner) = exists.as_ref() else {
            panic!("expected a sub-statement");
        };
        assert!(matches!(inner.where_condition(), Some(SqlExpr::Unary(_))));
    }
}
