//! Re-traversing a relationship from the same table must reuse one join.

use std::sync::Arc;

use mockall::mock;
use relq::{
    mapping::MappingError,
    query_model::{ConstantValue, DataType, MemberRef, QueryExpr, SourceIdGenerator},
    sql_statement::{
        ColumnExpr, EntityDefinition, EntityExpr, ResolvedJoin, ResolvedSimpleTable, SqlExpr,
        UnresolvedJoin, UnresolvedTable,
    },
    utils::AliasGenerator,
    MappingResolver, MappingSchema, QueryTranslator, TranslatorConfig,
};

use super::*;

mock! {
    pub Resolver {}

    impl MappingResolver for Resolver {
        fn resolve_table_info(
            &self,
            table: &UnresolvedTable,
            generator: &mut AliasGenerator,
        ) -> Result<ResolvedSimpleTable, MappingError>;

        fn resolve_join_info(
            &self,
            join: &UnresolvedJoin,
            generator: &mut AliasGenerator,
        ) -> Result<ResolvedJoin, MappingError>;

        fn resolve_simple_table_info(
            &self,
            table: &ResolvedSimpleTable,
            generator: &mut AliasGenerator,
        ) -> Result<EntityDefinition, MappingError>;

        fn resolve_member_expression(
            &self,
            entity: &EntityExpr,
            member: &MemberRef,
        ) -> Result<SqlExpr, MappingError>;

        fn resolve_column_member_expression(
            &self,
            column: &ColumnExpr,
            member: &MemberRef,
        ) -> Result<SqlExpr, MappingError>;

        fn resolve_constant_expression(
            &self,
            value: &ConstantValue,
            data_type: &DataType,
        ) -> Result<SqlExpr, MappingError>;

        fn resolve_type_check(
            &self,
            expr: &SqlExpr,
            target: &DataType,
        ) -> Result<SqlExpr, MappingError>;
    }
}

/// Mock that forwards every call to the fixture schema, counting table and join lookups.
fn counting_resolver(tables: usize, joins: usize) -> MockResolver {
    let schema = Arc::new(kitchen_schema());
    let mut resolver = MockResolver::new();

    let s = Arc::clone(&schema);
    resolver
        .expect_resolve_table_info()
        .times(tables)
        .returning(move |table, generator| s.resolve_table_info(table, generator));
    let s = Arc::clone(&schema);
    resolver
        .expect_resolve_join_info()
        .times(joins)
        .returning(move |join, generator| s.resolve_join_info(join, generator));
    let s = Arc::clone(&schema);
    resolver
        .expect_resolve_simple_table_info()
        .returning(move |table, generator| s.resolve_simple_table_info(table, generator));
    let s = Arc::clone(&schema);
    resolver
        .expect_resolve_member_expression()
        .returning(move |entity, member| s.resolve_member_expression(entity, member));
    let s = Arc::clone(&schema);
    resolver
        .expect_resolve_column_member_expression()
        .returning(move |column, member| s.resolve_column_member_expression(column, member));
    let s = Arc::clone(&schema);
    resolver
        .expect_resolve_constant_expression()
        .returning(move |value, data_type| s.resolve_constant_expression(value, data_type));
    let s: Arc<MappingSchema> = schema;
    resolver
        .expect_resolve_type_check()
        .returning(move |expr, target| s.resolve_type_check(expr, target));
    resolver
}

#[test]
fn test_same_navigation_twice_resolves_one_join() {
    // from c in Cooks where c.Kitchen.Name != null select c.Kitchen.Name
    let mut ids = SourceIdGenerator::default();
    let builder = cooks(&mut ids);
    let kitchen_name = builder
        .main_source()
        .member(cook_member("Kitchen", DataType::entity("Kitchen")))
        .member(MemberRef::new("Kitchen", "Name", DataType::String));
    let model = builder
        .where_clause(
            kitchen_name
                .clone()
                .not_equal(QueryExpr::null(DataType::String)),
        )
        .select(kitchen_name)
        .build();

    let translator =
        QueryTranslator::new(Arc::new(counting_resolver(1, 1)), TranslatorConfig::default());
    let statement = translator.translate(&model).unwrap();

    assert_eq!(statement.tables().len(), 1);
    assert_eq!(statement.tables()[0].joins().count(), 1);
    assert_eq!(
        statement.where_condition(),
        Some(&SqlExpr::is_not_null(SqlExpr::column(
            "t1",
            "Name",
            DataType::String,
            false
        )))
    );
    // Dropping the translator drops the mock, which verifies the call counts.
}

#[test]
fn test_chained_navigation_joins_each_relationship_once() {
    // from c in Cooks select new { K = c.Kitchen.Name, R = c.Kitchen.Restaurant.Name }
    let mut ids = SourceIdGenerator::default();
    let builder = cooks(&mut ids);
    let kitchen = builder
        .main_source()
        .member(cook_member("Kitchen", DataType::entity("Kitchen")));
    let restaurant = kitchen.clone().member(MemberRef::new(
        "Kitchen",
        "Restaurant",
        DataType::entity("Restaurant"),
    ));
    let model = builder
        .select(QueryExpr::new_object(
            "Names",
            vec![
                (
                    "K".to_string(),
                    kitchen.member(MemberRef::new("Kitchen", "Name", DataType::String)),
                ),
                (
                    "R".to_string(),
                    restaurant.member(MemberRef::new("Restaurant", "Name", DataType::String)),
                ),
            ],
        ))
        .build();

    let translator =
        QueryTranslator::new(Arc::new(counting_resolver(1, 2)), TranslatorConfig::default());
    let statement = translator.translate(&model).unwrap();

    let kitchen_join = statement.tables()[0]
        .joins()
        .next()
        .expect("kitchen join");
    assert_eq!(kitchen_join.joins().count(), 1);
}
