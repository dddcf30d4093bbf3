//! Result operators through the whole pipeline.

use relq::{
    query_model::{
        BinaryOp, ConstantValue, DataType, FromClause, MemberRef, OrderingDirection, QueryExpr,
        QueryModelBuilder, ResultOperator, SourceIdGenerator,
    },
    sql_statement::{
        sql_expr::{AggregationExpr, SqlBinary},
        AggregationModifier, Ordering, SqlExpr, Statement, TableSource,
    },
    ErrorKind,
};
use test_case::test_case;

use super::*;

fn binary_parts(expr: &SqlExpr) -> (BinaryOp, &SqlExpr, &SqlExpr) {
    match expr {
        SqlExpr::Binary(SqlBinary {
            op, left, right, ..
        }) => (*op, left.as_ref(), right.as_ref()),
        other => panic!("expected a binary expression, got {}", other),
    }
}

#[test]
fn test_skip_then_take_filters_row_number_window() {
    // (from c in Cooks select c.Name).Skip(2).Take(3)
    let mut ids = SourceIdGenerator::default();
    let builder = cooks(&mut ids);
    let name = builder
        .main_source()
        .member(cook_member("Name", DataType::String));
    let model = builder
        .select(name)
        .result_operator(ResultOperator::Skip {
            count: QueryExpr::int(2),
        })
        .result_operator(ResultOperator::Take {
            count: QueryExpr::int(3),
        })
        .build();

    let statement = translator().translate(&model).unwrap();

    let row_number = SqlExpr::column("q0", "row_number", DataType::Int64, false);
    let (op, lower, upper) = binary_parts(statement.where_condition().unwrap());
    assert_eq!(op, BinaryOp::And);

    let (op, column, _) = binary_parts(lower);
    assert_eq!(op, BinaryOp::GreaterThan);
    assert_eq!(column, &row_number);

    let (op, column, limit) = binary_parts(upper);
    assert_eq!(op, BinaryOp::LessThanOrEqual);
    assert_eq!(column, &row_number);
    assert_eq!(binary_parts(limit).0, BinaryOp::Add);

    assert_eq!(statement.orderings().len(), 1);
    assert_eq!(statement.orderings()[0].expression, row_number);
    assert_eq!(statement.orderings()[0].direction, OrderingDirection::Asc);
    assert!(statement.top_expression().is_none());
    assert_eq!(
        statement.select_projection().unwrap_named(),
        &SqlExpr::column("q0", "key", DataType::String, false)
    );

    let TableSource::SubStatement(inner) = &statement.tables()[0].source else {
        panic!("expected the row-numbered sub-statement");
    };
    assert!(inner.statement.orderings().is_empty());
    assert!(inner.statement.is_resolved());
}

fn int(value: i64) -> SqlExpr {
    SqlExpr::constant(ConstantValue::Integer(value), DataType::Int32)
}

fn name_ascending(alias: &str) -> Ordering {
    Ordering::new(
        SqlExpr::column(alias, "Name", DataType::String, false),
        OrderingDirection::Asc,
    )
}

fn sub_statement(statement: &Statement) -> (&str, &Statement) {
    match &statement.tables()[0].source {
        TableSource::SubStatement(sub) => (sub.alias.as_str(), sub.statement.as_ref()),
        other => panic!("expected a sub-statement table, got {:?}", other),
    }
}

/// `(from c in Cooks orderby c.Name select c.Name).Take(limit)` followed by `then`.
fn ordered_names_limited_to(limit: i64, then: Vec<ResultOperator>) -> relq::QueryModel {
    let mut ids = SourceIdGenerator::default();
    let builder = cooks(&mut ids);
    let name = builder
        .main_source()
        .member(cook_member("Name", DataType::String));
    let builder = builder
        .order_by(name.clone(), OrderingDirection::Asc)
        .select(name)
        .result_operator(ResultOperator::Take {
            count: QueryExpr::int(limit),
        });
    then.into_iter()
        .fold(builder, |builder, operator| builder.result_operator(operator))
        .build()
}

#[test]
fn test_take_after_take_orders_both_statements() {
    let model = ordered_names_limited_to(
        10,
        vec![ResultOperator::Take {
            count: QueryExpr::int(3),
        }],
    );

    let statement = translator().translate(&model).unwrap();

    let (alias, inner) = sub_statement(&statement);
    assert_eq!(inner.top_expression(), Some(&int(10)));
    assert_eq!(inner.orderings(), &[name_ascending("t0")]);

    assert_eq!(statement.top_expression(), Some(&int(3)));
    assert_eq!(
        statement.orderings(),
        &[Ordering::new(
            SqlExpr::column(alias, "o0", DataType::String, false),
            OrderingDirection::Asc
        )]
    );
    assert_eq!(
        statement.select_projection().unwrap_named(),
        &SqlExpr::column(alias, "key", DataType::String, false)
    );
}

#[test]
fn test_distinct_after_take_keeps_inner_orderings() {
    let model = ordered_names_limited_to(10, vec![ResultOperator::Distinct]);

    let statement = translator().translate(&model).unwrap();

    assert!(statement.is_distinct());
    assert!(statement.top_expression().is_none());
    let (_, inner) = sub_statement(&statement);
    assert!(!inner.is_distinct());
    assert_eq!(inner.top_expression(), Some(&int(10)));
    assert_eq!(inner.orderings(), &[name_ascending("t0")]);
}

#[test]
fn test_contains_after_take_keeps_inner_orderings() {
    let model = ordered_names_limited_to(
        3,
        vec![ResultOperator::Contains {
            item: QueryExpr::string("Bocuse"),
        }],
    );

    let statement = translator_without_emulation().translate(&model).unwrap();

    let SqlExpr::In(test) = statement.select_projection().unwrap_named() else {
        panic!("expected IN, got {}", statement.select_projection());
    };
    let SqlExpr::SubStatement(inner) = test.set.as_ref() else {
        panic!("expected IN over a sub-statement");
    };
    assert_eq!(inner.top_expression(), Some(&int(3)));
    assert_eq!(inner.orderings(), &[name_ascending("t0")]);
}

#[test]
fn test_skip_then_take_after_take_filters_row_number_window() {
    let model = ordered_names_limited_to(
        20,
        vec![
            ResultOperator::Skip {
                count: QueryExpr::int(5),
            },
            ResultOperator::Take {
                count: QueryExpr::int(3),
            },
        ],
    );

    let statement = translator().translate(&model).unwrap();

    let (numbered_alias, numbered) = sub_statement(&statement);
    let row_number = SqlExpr::column(numbered_alias, "row_number", DataType::Int64, false);
    assert_eq!(
        statement.where_condition(),
        Some(&SqlExpr::and(
            SqlExpr::binary(BinaryOp::GreaterThan, row_number.clone(), int(5)),
            SqlExpr::binary(
                BinaryOp::LessThanOrEqual,
                row_number.clone(),
                SqlExpr::binary(BinaryOp::Add, int(5), int(3)),
            ),
        ))
    );
    assert_eq!(
        statement.orderings(),
        &[Ordering::new(row_number, OrderingDirection::Asc)]
    );
    assert!(statement.top_expression().is_none());
    assert_eq!(
        statement.select_projection().unwrap_named(),
        &SqlExpr::column(numbered_alias, "key", DataType::String, false)
    );

    // The row number counts over the limited statement in its own order.
    let (limited_alias, limited) = sub_statement(numbered);
    let SqlExpr::New(projection) = numbered.select_projection().unwrap_named() else {
        panic!("expected the row-numbered projection");
    };
    let Some(SqlExpr::RowNumber(numbering)) = projection.member("row_number") else {
        panic!("expected a row number member");
    };
    assert_eq!(
        numbering.orderings,
        vec![Ordering::new(
            SqlExpr::column(limited_alias, "o0", DataType::String, false),
            OrderingDirection::Asc
        )]
    );
    assert_eq!(limited.top_expression(), Some(&int(20)));
    assert_eq!(limited.orderings(), &[name_ascending("t0")]);
}

#[test]
fn test_distinct_then_first_is_distinct_top_one() {
    // (from c in Cooks select new { c.FirstName, c.Name }).Distinct().First()
    let mut ids = SourceIdGenerator::default();
    let builder = cooks(&mut ids);
    let c = builder.main_source();
    let selector = QueryExpr::new_object(
        "CookName",
        vec![
            (
                "FirstName".to_string(),
                c.clone().member(cook_member("FirstName", DataType::String)),
            ),
            (
                "Name".to_string(),
                c.member(cook_member("Name", DataType::String)),
            ),
        ],
    );
    let model = builder
        .select(selector)
        .result_operator(ResultOperator::Distinct)
        .result_operator(ResultOperator::First { or_default: false })
        .build();

    let statement = translator().translate(&model).unwrap();

    assert!(statement.is_distinct());
    assert_eq!(statement.top_expression(), Some(&SqlExpr::literal_int(1)));
    assert_eq!(statement.tables().len(), 1);
    assert!(matches!(
        &statement.tables()[0].source,
        TableSource::Simple(simple) if simple.table_name == "Cooks"
    ));
    let SqlExpr::New(new) = statement.select_projection().unwrap_named() else {
        panic!("expected a member-wise projection");
    };
    assert_eq!(
        new.members
            .iter()
            .map(|member| member.expr.unwrap_named().clone())
            .collect::<Vec<_>>(),
        vec![
            SqlExpr::column("t0", "FirstName", DataType::String, false),
            SqlExpr::column("t0", "Name", DataType::String, false),
        ]
    );
}

#[test]
fn test_contains_on_empty_collection_is_constant_false() {
    let mut ids = SourceIdGenerator::default();
    let model = QueryModelBuilder::new(FromClause::new(
        ids.next_id(),
        "id",
        DataType::Int32,
        QueryExpr::constant(
            ConstantValue::Collection(vec![]),
            DataType::sequence_of(DataType::Int32),
        ),
    ))
    .result_operator(ResultOperator::Contains {
        item: QueryExpr::int(7),
    })
    .build();

    let plain = translator_without_emulation().translate(&model).unwrap();
    assert_eq!(plain.select_projection(), &SqlExpr::literal_bool(false));
    assert!(plain.tables().is_empty());

    let emulated = translator().translate(&model).unwrap();
    assert_eq!(
        emulated.select_projection(),
        &SqlExpr::ConvertedBoolean(Box::new(SqlExpr::literal_bool(false)))
    );
    assert!(emulated.tables().is_empty());
}

#[test_case(ResultOperator::Count, AggregationModifier::Count, DataType::Int32; "count")]
#[test_case(ResultOperator::LongCount, AggregationModifier::Count, DataType::Int64; "long count")]
#[test_case(ResultOperator::Sum, AggregationModifier::Sum, DataType::Double; "sum")]
#[test_case(ResultOperator::Max, AggregationModifier::Max, DataType::Double; "max")]
#[test_case(ResultOperator::Average, AggregationModifier::Average, DataType::Double; "average")]
fn test_aggregate_after_take_wraps_limited_statement(
    operator: ResultOperator,
    modifier: AggregationModifier,
    output: DataType,
) {
    // (from c in Cooks orderby c.Name select c.Weight).Take(5).<aggregate>()
    let mut ids = SourceIdGenerator::default();
    let builder = cooks(&mut ids);
    let c = builder.main_source();
    let model = builder
        .order_by(
            c.clone().member(cook_member("Name", DataType::String)),
            OrderingDirection::Asc,
        )
        .select(c.member(cook_member("Weight", DataType::Double)))
        .result_operator(ResultOperator::Take {
            count: QueryExpr::int(5),
        })
        .result_operator(operator)
        .build();

    let statement = translator().translate(&model).unwrap();

    assert_eq!(statement.aggregation_modifier(), modifier);
    assert!(statement.top_expression().is_none());
    assert!(statement.orderings().is_empty());
    assert_eq!(statement.data_type(), output);
    let SqlExpr::Aggregation(AggregationExpr { modifier: projected, .. }) =
        statement.select_projection().unwrap_named()
    else {
        panic!("expected an aggregation projection");
    };
    assert_eq!(*projected, modifier);

    let TableSource::SubStatement(inner) = &statement.tables()[0].source else {
        panic!("expected the limited statement as a sub-statement");
    };
    assert!(inner.statement.top_expression().is_some());
    assert_eq!(inner.statement.orderings(), &[name_ascending("t0")]);
}

#[test]
fn test_any_becomes_exists() {
    // (from c in Cooks where c.IsStarred select c).Any()
    let mut ids = SourceIdGenerator::default();
    let builder = cooks(&mut ids);
    let c = builder.main_source();
    let model = builder
        .where_clause(c.member(cook_member("IsStarred", DataType::Boolean)))
        .result_operator(ResultOperator::Any)
        .build();

    let statement = translator_without_emulation().translate(&model).unwrap();
    let SqlExpr::Exists(inner) = statement.select_projection() else {
        panic!("expected EXISTS, got {}", statement.select_projection());
    };
    let SqlExpr::SubStatement(sub) = inner.as_ref() else {
        panic!("expected a correlated sub-statement");
    };
    assert!(sub.where_condition().is_some());
    assert!(statement.shape().is_scalar());
}

#[test]
fn test_group_count_moves_into_grouping_statement() {
    // from g in (from c in Cooks group c by c.Name) select new { g.Key, Count = g.Count() }
    let mut ids = SourceIdGenerator::default();
    let inner = cooks(&mut ids);
    let c = inner.main_source();
    let grouping_type = DataType::grouping(DataType::String, cook());
    let inner = inner
        .result_operator(ResultOperator::Group {
            key_selector: c.clone().member(cook_member("Name", DataType::String)),
            element_selector: c,
        })
        .build();

    let outer_from = FromClause::new(
        ids.next_id(),
        "g",
        grouping_type.clone(),
        QueryExpr::sub_query(inner),
    );
    let g = outer_from.reference();
    let count = QueryModelBuilder::new(FromClause::new(
        ids.next_id(),
        "x",
        cook(),
        g.clone(),
    ))
    .result_operator(ResultOperator::Count)
    .build();
    let model = QueryModelBuilder::new(outer_from)
        .select(QueryExpr::new_object(
            "KeyCount",
            vec![
                (
                    "Key".to_string(),
                    g.member(MemberRef::new("Grouping", "Key", DataType::String)),
                ),
                ("Count".to_string(), QueryExpr::sub_query(count)),
            ],
        ))
        .build();

    let statement = translator().translate(&model).unwrap();

    assert_eq!(statement.tables().len(), 1);
    let TableSource::SubStatement(grouped) = &statement.tables()[0].source else {
        panic!("expected the grouping sub-statement");
    };
    let alias = grouped.alias.as_str();
    let SqlExpr::Grouping(grouping) = grouped.statement.select_projection().unwrap_named() else {
        panic!("expected a grouping projection");
    };
    assert_eq!(grouping.aggregations.len(), 1);

    let SqlExpr::New(new) = statement.select_projection().unwrap_named() else {
        panic!("expected a member-wise projection");
    };
    assert_eq!(
        new.members[0].expr.unwrap_named(),
        &SqlExpr::column(alias, "key", DataType::String, false)
    );
    assert_eq!(
        new.members[1].expr.unwrap_named(),
        &SqlExpr::column(alias, "a0", DataType::Int32, false)
    );
}

#[test]
fn test_operator_after_scalar_is_unsupported_shape() {
    let mut ids = SourceIdGenerator::default();
    let model = cooks(&mut ids)
        .result_operator(ResultOperator::Count)
        .result_operator(ResultOperator::Take {
            count: QueryExpr::int(1),
        })
        .build();

    let error = translator().translate(&model).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::UnsupportedShape);
}
