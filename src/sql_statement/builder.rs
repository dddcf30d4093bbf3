use std::mem;

use crate::query_model::DataType;

use super::{
    errors::StatementError, AggregationModifier, Ordering, ResultShape, SqlExpr, SqlTable,
    Statement, TableId,
};

/// Mutable staging area for one statement.
///
/// Owned by whichever stage or handler is currently assembling the statement. Sealing produces an
/// immutable [`Statement`]; [`StatementBuilder::get_statement_and_reset`] seals and clears in
/// one step when an operator must start over in a new outer statement.
#[derive(Debug, Clone, Default)]
pub struct StatementBuilder {
    pub shape: Option<ResultShape>,
    pub select_projection: Option<SqlExpr>,
    pub tables: Vec<SqlTable>,
    pub where_condition: Option<SqlExpr>,
    pub orderings: Vec<Ordering>,
    pub top_expression: Option<SqlExpr>,
    pub is_distinct: bool,
    pub aggregation_modifier: AggregationModifier,
    pub group_by_expression: Option<SqlExpr>,

    /// Synthetic row number of the wrapped statement, set by Skip.
    pub row_number_selector: Option<SqlExpr>,
    /// Rows already skipped through `row_number_selector`.
    pub current_row_number_offset: Option<SqlExpr>,
}

impl StatementBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pre-populated with a sealed statement's contents.
    pub fn from_statement(statement: Statement) -> Self {
        Self {
            shape: Some(statement.shape),
            select_projection: Some(statement.select_projection),
            tables: statement.tables,
            where_condition: statement.where_condition,
            orderings: statement.orderings,
            top_expression: statement.top_expression,
            is_distinct: statement.is_distinct,
            aggregation_modifier: statement.aggregation_modifier,
            group_by_expression: statement.group_by_expression,
            row_number_selector: None,
            current_row_number_offset: None,
        }
    }

    /// Conjoins `condition` onto any existing WHERE condition.
    pub fn add_where_condition(&mut self, condition: SqlExpr) {
        self.where_condition = Some(match self.where_condition.take() {
            Some(existing) => SqlExpr::and(existing, condition),
            None => condition,
        });
    }

    /// Clears the orderings unless TOP makes them select which rows are returned.
    pub fn drop_unlimited_orderings(&mut self) {
        if self.top_expression.is_none() {
            self.orderings.clear();
        }
    }

    pub fn add_table(&mut self, table: SqlTable) {
        self.tables.push(table);
    }

    pub fn find_table(&self, id: TableId) -> Option<&SqlTable> {
        self.tables.iter().find_map(|table| table.find(id))
    }

    pub fn find_table_mut(&mut self, id: TableId) -> Option<&mut SqlTable> {
        self.tables.iter_mut().find_map(|table| table.find_mut(id))
    }

    pub fn item_data_type(&self) -> Option<DataType> {
        self.select_projection.as_ref().map(SqlExpr::data_type)
    }

    /// Freezes a snapshot of the current contents.
    pub fn seal(&self) -> Result<Statement, StatementError> {
        self.clone().into_statement()
    }

    pub fn into_statement(self) -> Result<Statement, StatementError> {
        let shape = self.shape.ok_or(StatementError::MissingResultShape)?;
        let select_projection = self
            .select_projection
            .ok_or(StatementError::MissingSelectProjection)?;

        if let Some(condition) = &self.where_condition {
            let actual = condition.data_type();
            if !actual.is_boolean() {
                return Err(StatementError::NonBooleanWhereCondition { actual });
            }
        }
        if self.top_expression.is_some() && self.aggregation_modifier != AggregationModifier::None
        {
            return Err(StatementError::TopWithAggregation {
                modifier: self.aggregation_modifier.to_string(),
            });
        }

        Ok(Statement {
            shape,
            select_projection,
            tables: self.tables,
            where_condition: self.where_condition,
            orderings: self.orderings,
            top_expression: self.top_expression,
            is_distinct: self.is_distinct,
            aggregation_modifier: self.aggregation_modifier,
            group_by_expression: self.group_by_expression,
        })
    }

    /// Seals the current contents and leaves an empty builder behind.
    pub fn get_statement_and_reset(&mut self) -> Result<Statement, StatementError> {
        let statement = self.seal()?;
        mem::take(self);
        Ok(statement)
    }
}
