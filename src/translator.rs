//! Translation facade.
//!
//! ```text
//! QueryModel ─► PreparationStage ─► MappingResolutionStage ─► SqlContextStage ─► Statement
//! ```
//!
//! A [`QueryTranslator`] is built once and shared; every call to
//! [`QueryTranslator::translate`] owns a fresh [`AliasGenerator`], so concurrent translations
//! never share mutable state.

use std::sync::Arc;

use log::{debug, info};

use crate::{
    config::TranslatorConfig,
    errors::TranslationError,
    mapping::{MappingResolutionStage, MappingResolver},
    preparation::{
        result_operators::DEFAULT_RESULT_OPERATOR_HANDLERS,
        transformers::DEFAULT_METHOD_CALL_TRANSFORMERS, MethodCallTransformerRegistry,
        PreparationStage, ResultOperatorHandlerRegistry,
    },
    query_model::QueryModel,
    sql_context::SqlContextStage,
    sql_statement::Statement,
    utils::AliasGenerator,
};

pub struct QueryTranslator<'r> {
    pub config: TranslatorConfig,
    pub transformers: &'r MethodCallTransformerRegistry,
    pub handlers: &'r ResultOperatorHandlerRegistry,
    pub resolver: Arc<dyn MappingResolver>,
}

impl QueryTranslator<'static> {
    /// Translator over the default transformer and result-operator registries.
    pub fn new(resolver: Arc<dyn MappingResolver>, config: TranslatorConfig) -> Self {
        Self {
            config,
            transformers: &DEFAULT_METHOD_CALL_TRANSFORMERS,
            handlers: &DEFAULT_RESULT_OPERATOR_HANDLERS,
            resolver,
        }
    }
}

impl<'r> QueryTranslator<'r> {
    pub fn with_registries(
        resolver: Arc<dyn MappingResolver>,
        config: TranslatorConfig,
        transformers: &'r MethodCallTransformerRegistry,
        handlers: &'r ResultOperatorHandlerRegistry,
    ) -> Self {
        Self {
            config,
            transformers,
            handlers,
            resolver,
        }
    }

    pub fn translate(&self, model: &QueryModel) -> Result<Statement, TranslationError> {
        info!(
            "Translating query over `{}`",
            model.main_from_clause.item_type
        );
        let mut generator = AliasGenerator::with_prefixes(
            &self.config.table_alias_prefix,
            &self.config.sub_statement_alias_prefix,
        );

        let prepared = PreparationStage::new(
            &mut generator,
            self.transformers,
            self.handlers,
            &self.config,
        )
        .prepare_sql_statement(model)?;
        crate::debug_print!("prepared:\n{}", prepared);

        let resolved =
            MappingResolutionStage::new(self.resolver.as_ref(), &mut generator, &self.config)
                .resolve_sql_statement(prepared)?;

        let statement = SqlContextStage::new(&self.config).apply(resolved)?;
        debug!("Translated statement: {}", statement);
        Ok(statement)
    }
}
