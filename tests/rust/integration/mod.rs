//! Integration tests - whole translations against the kitchen fixture mapping
//!
//! These tests drive query models through preparation, mapping resolution and the SQL context
//! stage, checking the resolved statement trees a renderer would receive.

mod join_deduplication_tests;
mod mapping_schema_tests;
mod result_operator_tests;
mod translation_tests;

use std::sync::Arc;

use relq::{
    query_model::{DataType, FromClause, MemberRef, QueryExpr, QueryModelBuilder, SourceIdGenerator},
    MappingSchema, QueryTranslator, TranslatorConfig,
};

pub const KITCHEN_MAPPING: &str = include_str!("../../fixtures/kitchen_mapping.yaml");

pub fn kitchen_schema() -> MappingSchema {
    MappingSchema::from_yaml_str(KITCHEN_MAPPING).expect("fixture mapping must load")
}

pub fn translator() -> QueryTranslator<'static> {
    QueryTranslator::new(Arc::new(kitchen_schema()), TranslatorConfig::default())
}

pub fn translator_without_emulation() -> QueryTranslator<'static> {
    let config = TranslatorConfig {
        emulate_boolean_as_integer: false,
        ..Default::default()
    };
    QueryTranslator::new(Arc::new(kitchen_schema()), config)
}

pub fn cook() -> DataType {
    DataType::entity("Cook")
}

/// `from c in Cooks`
pub fn cooks(ids: &mut SourceIdGenerator) -> QueryModelBuilder {
    QueryModelBuilder::new(FromClause::new(
        ids.next_id(),
        "c",
        cook(),
        QueryExpr::queryable(cook()),
    ))
}

pub fn cook_member(name: &str, data_type: DataType) -> MemberRef {
    MemberRef::new("Cook", name, data_type)
}
