//! Mapping and translator configuration loaded from files, then used for translation.

use std::{io::Write, sync::Arc};

use relq::{
    query_model::{DataType, FromClause, MemberRef, QueryExpr, QueryModelBuilder, SourceIdGenerator},
    sql_statement::{SqlExpr, TableSource},
    ErrorKind, MappingSchema, QueryTranslator, TranslationError, TranslatorConfig,
};
use tempfile::NamedTempFile;

use super::*;

fn temp_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_translate_with_file_based_mapping_and_config() {
    let mapping = temp_file(KITCHEN_MAPPING);
    let config = temp_file(
        r#"
max_statement_depth: 8
emulate_boolean_as_integer: false
table_alias_prefix: "tab"
"#,
    );

    let schema = MappingSchema::from_yaml_file(mapping.path()).unwrap();
    let config = TranslatorConfig::from_yaml_file(config.path()).unwrap();
    assert_eq!(config.sub_statement_alias_prefix, "q");
    let translator = QueryTranslator::new(Arc::new(schema), config);

    let mut ids = SourceIdGenerator::default();
    let builder = cooks(&mut ids);
    let name = builder
        .main_source()
        .member(cook_member("Name", DataType::String));
    let model = builder.select(name).build();

    let statement = translator.translate(&model).unwrap();
    assert_eq!(
        statement.select_projection().unwrap_named(),
        &SqlExpr::column("tab0", "Name", DataType::String, false)
    );
}

#[test]
fn test_derived_entity_reads_base_table_and_renamed_column() {
    // from c in Chefs select c.MichelinStars
    let chef = DataType::entity("Chef");
    let mut ids = SourceIdGenerator::default();
    let builder = QueryModelBuilder::new(FromClause::new(
        ids.next_id(),
        "c",
        chef.clone(),
        QueryExpr::queryable(chef),
    ));
    let stars = builder
        .main_source()
        .member(MemberRef::new("Chef", "MichelinStars", DataType::Int32));
    let model = builder.select(stars).build();

    let statement = translator().translate(&model).unwrap();
    assert!(matches!(
        &statement.tables()[0].source,
        TableSource::Simple(simple) if simple.table_name == "Cooks"
    ));
    assert_eq!(
        statement.select_projection().unwrap_named(),
        &SqlExpr::column("t0", "Stars", DataType::Int32, false)
    );
}

#[test]
fn test_invalid_mapping_is_a_configuration_error() {
    let mapping = temp_file(
        r#"
entities:
  - name: Cook
    table: Cooks
    columns:
      - { member: Name, type: string }
"#,
    );

    let error: TranslationError = MappingSchema::from_yaml_file(mapping.path())
        .unwrap_err()
        .into();
    assert_eq!(error.kind(), ErrorKind::Configuration);
    assert!(error.to_string().contains("Cook"));
}

#[test]
fn test_nesting_limit_from_config_is_enforced() {
    let config = TranslatorConfig {
        max_statement_depth: 1,
        ..Default::default()
    };
    let translator = QueryTranslator::new(Arc::new(kitchen_schema()), config);

    let mut ids = SourceIdGenerator::default();
    let inner = cooks(&mut ids).build();
    let model = QueryModelBuilder::new(FromClause::new(
        ids.next_id(),
        "x",
        cook(),
        QueryExpr::sub_query(inner),
    ))
    .build();

    let error = translator.translate(&model).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::UnsupportedShape);
}
