//! Turning a prepared sub-statement into something the enclosing statement can use.
//!
//! | sub-statement                                   | becomes                              |
//! |-------------------------------------------------|--------------------------------------|
//! | scalar without tables or filter                 | its projection, inlined              |
//! | scalar, sequence, single value of scalar type   | `SqlExpr::SubStatement`              |
//! | single value of entity / anonymous type         | left-joined sub-statement table      |
//!
//! The last row exists because a single row of several columns cannot be used as an expression;
//! joining it keeps NULL semantics when the sub-query yields nothing.

use log::debug;

use crate::sql_statement::{
    AggregationModifier, JoinSemantics, ResolvedSubStatementTable, ResultShape, SqlExpr,
    SqlTable, Statement, StatementBuilder, TableSource,
};

use super::{PreparationResult, PreparationStage};

impl<'a> PreparationStage<'a> {
    /// New sub-statement table with a fresh alias and handle.
    pub(crate) fn create_sub_statement_table(
        &mut self,
        statement: Statement,
        semantics: JoinSemantics,
    ) -> SqlTable {
        let alias = self.generator.sub_statement_alias();
        let id = self.generator.next_table_id();
        debug!("Creating sub-statement table {} ({})", alias, id);
        SqlTable::new(
            id,
            TableSource::SubStatement(ResolvedSubStatementTable {
                alias,
                statement: Box::new(statement),
            }),
            semantics,
        )
    }

    pub(crate) fn promote_sub_statement(
        &mut self,
        statement: Statement,
        builder: &mut StatementBuilder,
    ) -> PreparationResult<SqlExpr> {
        match statement.shape().clone() {
            ResultShape::Scalar { .. } if is_inlinable(&statement) => {
                Ok(statement.select_projection)
            }
            ResultShape::SingleValue { data_type, .. } if !data_type.is_scalar() => {
                let mut sub_builder = StatementBuilder::from_statement(statement);
                sub_builder.shape = Some(ResultShape::Sequence {
                    item_type: data_type.clone(),
                });
                let table = self.create_sub_statement_table(
                    sub_builder.into_statement()?,
                    JoinSemantics::Left,
                );
                let id = table.id;
                builder.add_table(table);
                Ok(SqlExpr::table_reference(id, data_type))
            }
            _ => Ok(SqlExpr::SubStatement(Box::new(statement))),
        }
    }
}

fn is_inlinable(statement: &Statement) -> bool {
    statement.tables().is_empty()
        && statement.where_condition().is_none()
        && statement.top_expression().is_none()
        && statement.group_by_expression().is_none()
        && statement.aggregation_modifier() == AggregationModifier::None
}
