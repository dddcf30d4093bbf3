//! End-to-end translations of plain comprehensions (no result operators).

use relq::{
    query_model::{BinaryOp, DataType, MemberRef, QueryExpr, SourceIdGenerator},
    sql_statement::{sql_expr::SqlBinary, AggregationModifier, SqlExpr, TableSource},
    ErrorKind,
};

use super::*;

#[test]
fn test_cooks_without_first_name() {
    // from c in Cooks where c.FirstName == null select c.Name
    let mut ids = SourceIdGenerator::default();
    let builder = cooks(&mut ids);
    let c = builder.main_source();
    let model = builder
        .where_clause(
            c.clone()
                .member(cook_member("FirstName", DataType::String))
                .equal(QueryExpr::null(DataType::String)),
        )
        .select(c.member(cook_member("Name", DataType::String)))
        .build();

    let statement = translator().translate(&model).unwrap();

    assert_eq!(statement.tables().len(), 1);
    assert!(matches!(
        &statement.tables()[0].source,
        TableSource::Simple(simple) if simple.alias == "t0" && simple.table_name == "Cooks"
    ));
    assert_eq!(
        statement.where_condition(),
        Some(&SqlExpr::is_null(SqlExpr::column(
            "t0",
            "FirstName",
            DataType::String,
            false
        )))
    );
    assert_eq!(
        statement.select_projection().unwrap_named(),
        &SqlExpr::column("t0", "Name", DataType::String, false)
    );
    assert!(statement.top_expression().is_none());
    assert!(!statement.is_distinct());
    assert_eq!(statement.aggregation_modifier(), AggregationModifier::None);
    assert!(statement.group_by_expression().is_none());
    assert!(statement.orderings().is_empty());
}

#[test]
fn test_boolean_column_in_where_is_compared_to_one() {
    // from c in Cooks where c.IsStarred select c.Name
    let mut ids = SourceIdGenerator::default();
    let builder = cooks(&mut ids);
    let c = builder.main_source();
    let model = builder
        .where_clause(c.clone().member(cook_member("IsStarred", DataType::Boolean)))
        .select(c.member(cook_member("Name", DataType::String)))
        .build();

    let statement = translator().translate(&model).unwrap();
    let Some(SqlExpr::Binary(SqlBinary {
        op: BinaryOp::Equal,
        left,
        ..
    })) = statement.where_condition()
    else {
        panic!("expected `IsStarred = 1`, got {:?}", statement.where_condition());
    };
    assert_eq!(
        left.as_ref(),
        &SqlExpr::column("t0", "IsStarred", DataType::Boolean, false)
    );

    let plain = translator_without_emulation().translate(&model).unwrap();
    assert_eq!(
        plain.where_condition(),
        Some(&SqlExpr::column("t0", "IsStarred", DataType::Boolean, false))
    );
}

#[test]
fn test_navigation_projection_adds_left_join() {
    // from c in Cooks select c.Kitchen.Name
    let mut ids = SourceIdGenerator::default();
    let builder = cooks(&mut ids);
    let kitchen = builder
        .main_source()
        .member(cook_member("Kitchen", DataType::entity("Kitchen")));
    let model = builder
        .select(kitchen.member(MemberRef::new("Kitchen", "Name", DataType::String)))
        .build();

    let statement = translator().translate(&model).unwrap();
    assert_eq!(statement.tables()[0].joins().count(), 1);
    assert_eq!(
        statement.select_projection().unwrap_named(),
        &SqlExpr::column("t1", "Name", DataType::String, false)
    );
}

#[test]
fn test_unmapped_member_names_the_member() {
    let mut ids = SourceIdGenerator::default();
    let builder = cooks(&mut ids);
    let nickname = builder
        .main_source()
        .member(cook_member("Nickname", DataType::String));
    let model = builder.select(nickname).build();

    let error = translator().translate(&model).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::UnmappedItem);
    assert!(error.to_string().contains("Nickname"));
}

#[test]
fn test_derived_entity_type_check_uses_discriminator() {
    // from c in Cooks where c is Chef select c.Name
    let mut ids = SourceIdGenerator::default();
    let builder = cooks(&mut ids);
    let c = builder.main_source();
    let model = builder
        .where_clause(c.clone().type_is(DataType::entity("Chef")))
        .select(c.member(cook_member("Name", DataType::String)))
        .build();

    let statement = translator_without_emulation().translate(&model).unwrap();
    let condition = statement.where_condition().expect("type check filter");
    assert!(condition.to_string().contains("Kind"));
    assert!(statement.is_resolved());
}
