//! Clause-by-clause translation of one query model into a statement builder.

use log::{debug, trace};
use std::mem;

use crate::{
    query_model::{
        BodyClause, ConstantValue, DataType, FromClause, JoinClause, MemberRef, OrderByClause,
        QueryExpr, QueryModel, ResultOperator, ResultOperatorKind,
    },
    sql_statement::{
        sql_expr::{NewExpr, NewMember},
        JoinInfo, JoinSemantics, Ordering, ResultShape, SqlExpr, SqlTable, Statement,
        StatementBuilder, StatementError, TableId, TableSource, UnresolvedCollectionJoin,
        UnresolvedGroupReferenceTable, UnresolvedTable,
    },
};

use super::{
    context::PreparationContext, errors::PreparationError, PreparationResult, PreparationStage,
};

/// Anonymous type carrying a wrapped item together with the orderings it was sorted by.
pub const ORDERED_ITEM_TYPE: &str = "OrderedItem";
pub const ORDERED_ITEM_KEY: &str = "key";

pub struct QueryModelVisitor<'s, 'a, 'p> {
    pub stage: &'s mut PreparationStage<'a>,
    pub context: PreparationContext<'p>,
    pub builder: StatementBuilder,
    /// The select clause's selector; result operator expressions refer to the current item
    /// through it.
    item_selector: Option<QueryExpr>,
    literal_collection_source: bool,
}

impl<'s, 'a, 'p> QueryModelVisitor<'s, 'a, 'p> {
    pub fn translate(
        stage: &'s mut PreparationStage<'a>,
        model: &QueryModel,
        parent: &'p PreparationContext<'p>,
    ) -> PreparationResult<Statement> {
        let mut visitor = QueryModelVisitor {
            stage,
            context: parent.child(),
            builder: StatementBuilder::new(),
            item_selector: None,
            literal_collection_source: false,
        };
        visitor.visit_query_model(model)?;
        Ok(visitor.builder.into_statement()?)
    }

    fn visit_query_model(&mut self, model: &QueryModel) -> PreparationResult<()> {
        self.visit_main_from_clause(&model.main_from_clause)?;

        for clause in &model.body_clauses {
            if self.literal_collection_source {
                return Err(PreparationError::LiteralCollectionUsage {
                    usage: body_clause_name(clause).to_string(),
                });
            }
            match clause {
                BodyClause::AdditionalFrom(from) => self.visit_additional_from_clause(from)?,
                BodyClause::Where(where_clause) => {
                    let predicate = self.prepare(&where_clause.predicate)?;
                    self.builder.add_where_condition(predicate);
                }
                BodyClause::OrderBy(order_by) => self.visit_order_by_clause(order_by)?,
                BodyClause::Join(join) => self.visit_join_clause(join)?,
            }
        }

        let selector = &model.select_clause.selector;
        let projection = self.prepare(selector)?;
        self.builder.shape = Some(ResultShape::Sequence {
            item_type: projection.data_type(),
        });
        self.builder.select_projection = Some(projection);
        self.item_selector = Some(selector.clone());

        if self.literal_collection_source && model.result_operators.is_empty() {
            return Err(PreparationError::LiteralCollectionUsage {
                usage: "select clause".to_string(),
            });
        }
        for operator in &model.result_operators {
            self.visit_result_operator(operator)?;
        }
        Ok(())
    }

    fn visit_main_from_clause(&mut self, from: &FromClause) -> PreparationResult<()> {
        if let QueryExpr::Constant {
            value: ConstantValue::Collection(_),
            ..
        } = &from.from_expression
        {
            let collection = self.prepare(&from.from_expression)?;
            self.context.add_source_mapping(from.source_id, collection);
            self.literal_collection_source = true;
            return Ok(());
        }
        self.visit_additional_from_clause(from)
    }

    fn visit_additional_from_clause(&mut self, from: &FromClause) -> PreparationResult<()> {
        let table = self.table_for_from_expression(&from.from_expression, &from.item_type)?;
        let reference = SqlExpr::table_reference(table.id, from.item_type.clone());
        trace!("Source {} bound to table {}", from.source_id, table.id);
        self.builder.add_table(table);
        self.context.add_source_mapping(from.source_id, reference);
        Ok(())
    }

    fn table_for_from_expression(
        &mut self,
        expr: &QueryExpr,
        item_type: &DataType,
    ) -> PreparationResult<SqlTable> {
        match expr {
            QueryExpr::Queryable { item_type } => Ok(SqlTable::new(
                self.stage.generator.next_table_id(),
                TableSource::Unresolved(UnresolvedTable {
                    item_type: item_type.clone(),
                }),
                JoinSemantics::Inner,
            )),
            QueryExpr::SubQuery { model } => {
                let statement = self.stage.prepare_query_model(model, &self.context)?;
                let statement = into_sequence(statement)?;
                Ok(self
                    .stage
                    .create_sub_statement_table(statement, JoinSemantics::Inner))
            }
            QueryExpr::Member {
                expr: owner,
                member,
            } if member.member_type.element_type().is_some() => {
                let source = self.prepare(owner)?;
                Ok(SqlTable::new(
                    self.stage.generator.next_table_id(),
                    TableSource::Joined(JoinInfo::UnresolvedCollection(
                        UnresolvedCollectionJoin {
                            source: Box::new(source),
                            member: member.clone(),
                        },
                    )),
                    JoinSemantics::Inner,
                ))
            }
            other => {
                let prepared = self.prepare(other)?;
                match prepared {
                    SqlExpr::TableReference(reference) if reference.item_type.is_grouping() => {
                        Ok(SqlTable::new(
                            self.stage.generator.next_table_id(),
                            TableSource::GroupReference(UnresolvedGroupReferenceTable {
                                referenced_group_source: reference.table,
                                item_type: item_type.clone(),
                            }),
                            JoinSemantics::Inner,
                        ))
                    }
                    SqlExpr::SubStatement(statement) => {
                        let statement = into_sequence(*statement)?;
                        Ok(self
                            .stage
                            .create_sub_statement_table(statement, JoinSemantics::Inner))
                    }
                    other => Err(PreparationError::UnsupportedFromExpression {
                        data_type: other.data_type(),
                    }),
                }
            }
        }
    }

    /// Later order-by clauses take precedence over earlier ones.
    fn visit_order_by_clause(&mut self, order_by: &OrderByClause) -> PreparationResult<()> {
        let mut orderings = Vec::with_capacity(order_by.orderings.len());
        for ordering in &order_by.orderings {
            orderings.push(Ordering::new(
                self.prepare(&ordering.expression)?,
                ordering.direction,
            ));
        }
        self.builder.orderings.splice(0..0, orderings);
        Ok(())
    }

    fn visit_join_clause(&mut self, join: &JoinClause) -> PreparationResult<()> {
        let table = self.table_for_from_expression(&join.inner_sequence, &join.item_type)?;
        let reference = SqlExpr::table_reference(table.id, join.item_type.clone());
        self.builder.add_table(table);
        self.context.add_source_mapping(join.source_id, reference);

        let outer_key = self.prepare(&join.outer_key_selector)?;
        let inner_key = self.prepare(&join.inner_key_selector)?;
        self.builder
            .add_where_condition(SqlExpr::equal(outer_key, inner_key));
        Ok(())
    }

    fn visit_result_operator(&mut self, operator: &ResultOperator) -> PreparationResult<()> {
        let kind = operator.kind();
        if self.builder.shape.as_ref().is_some_and(ResultShape::is_scalar) {
            return Err(PreparationError::OperatorAfterScalar { operator: kind });
        }
        if self.literal_collection_source && kind != ResultOperatorKind::Contains {
            return Err(PreparationError::LiteralCollectionUsage {
                usage: kind.to_string(),
            });
        }

        let handlers = self.stage.handlers;
        let handler = handlers
            .get(kind)
            .ok_or(PreparationError::UnsupportedResultOperator(kind))?;
        debug!("Handling result operator {}", kind);
        handler.handle(operator, self)
    }

    /// Prepares an expression against the current sources and item.
    pub fn prepare(&mut self, expr: &QueryExpr) -> PreparationResult<SqlExpr> {
        self.stage
            .prepare_expression(expr, &self.context, &mut self.builder)
    }

    pub fn is_literal_collection_source(&self) -> bool {
        self.literal_collection_source
    }

    pub fn config(&self) -> &crate::config::TranslatorConfig {
        self.stage.config
    }

    pub fn current_projection(&self) -> PreparationResult<&SqlExpr> {
        self.builder
            .select_projection
            .as_ref()
            .ok_or_else(|| StatementError::MissingSelectProjection.into())
    }

    pub fn current_item_type(&self) -> PreparationResult<DataType> {
        Ok(self.current_projection()?.data_type())
    }

    /// Replaces the current item; result operator expressions referring to the selector
    /// now see `item`.
    pub fn set_item_expression(&mut self, item: SqlExpr) {
        if let Some(selector) = &self.item_selector {
            self.context
                .add_expression_mapping(selector.clone(), item.clone());
        }
        self.builder.select_projection = Some(item);
    }

    /// Seals the builder into a sub-statement table of a fresh builder.
    pub fn seal_into_sub_statement_table(
        &mut self,
        semantics: JoinSemantics,
    ) -> PreparationResult<(TableId, DataType)> {
        let shape = self.builder.shape.clone();
        let statement = self.builder.get_statement_and_reset()?;
        let item_type = statement.select_projection().data_type();
        let statement = into_sequence(statement)?;
        let table = self.stage.create_sub_statement_table(statement, semantics);
        let id = table.id;
        debug!("Sealed statement into sub-statement table {}", id);
        self.builder.add_table(table);
        self.builder.shape = shape;
        Ok((id, item_type))
    }

    /// Freezes the current statement into a sub-statement table and continues in a fresh outer
    /// statement selecting from it. With `extract_orderings`, the orderings of the wrapped
    /// statement are projected alongside the item and re-applied outside. A wrapped statement
    /// with TOP keeps its own orderings as well.
    pub fn seal_and_wrap(&mut self, extract_orderings: bool) -> PreparationResult<()> {
        self.seal_and_wrap_with_semantics(extract_orderings, JoinSemantics::Inner)
    }

    pub fn seal_and_wrap_with_semantics(
        &mut self,
        extract_orderings: bool,
        semantics: JoinSemantics,
    ) -> PreparationResult<()> {
        let projection = self
            .builder
            .select_projection
            .take()
            .ok_or(StatementError::MissingSelectProjection)?;
        // A limited statement keeps its orderings so TOP picks the intended rows.
        let orderings = if self.builder.top_expression.is_some() {
            self.builder.orderings.clone()
        } else {
            mem::take(&mut self.builder.orderings)
        };
        let item_type = projection.data_type();

        let extracted = if extract_orderings { orderings } else { vec![] };
        if extracted.is_empty() {
            self.builder.select_projection = Some(self.ensure_named(projection));
        } else {
            let mut members = vec![NewMember {
                name: ORDERED_ITEM_KEY.to_string(),
                expr: projection,
            }];
            members.extend(extracted.iter().enumerate().map(|(i, ordering)| NewMember {
                name: ordering_member_name(i),
                expr: ordering.expression.clone(),
            }));
            self.builder.select_projection = Some(SqlExpr::New(NewExpr {
                type_name: ORDERED_ITEM_TYPE.to_string(),
                members,
            }));
        }

        let (table, table_item_type) = self.seal_into_sub_statement_table(semantics)?;
        let table_reference = SqlExpr::table_reference(table, table_item_type.clone());

        let item = if extracted.is_empty() {
            table_reference
        } else {
            for (i, ordering) in extracted.into_iter().enumerate() {
                let member = MemberRef::new(
                    ORDERED_ITEM_TYPE,
                    ordering_member_name(i),
                    ordering.expression.data_type(),
                );
                self.builder.orderings.push(Ordering::new(
                    SqlExpr::member(table_reference.clone(), member),
                    ordering.direction,
                ));
            }
            SqlExpr::member(
                table_reference,
                MemberRef::new(ORDERED_ITEM_TYPE, ORDERED_ITEM_KEY, item_type.clone()),
            )
        };

        if let Some(ResultShape::Sequence { .. }) | None = self.builder.shape {
            self.builder.shape = Some(ResultShape::Sequence {
                item_type: item_type.clone(),
            });
        }
        self.set_item_expression(item);
        Ok(())
    }

    /// Scalar sub-statement projections need a column name; entities and constructed objects
    /// carry their own.
    pub fn ensure_named(&self, projection: SqlExpr) -> SqlExpr {
        match projection {
            named @ SqlExpr::Named(_) => named,
            other if !other.data_type().is_scalar() => other,
            other => SqlExpr::named(
                Some(self.stage.config.default_projection_name.clone()),
                other,
            ),
        }
    }
}

pub fn ordering_member_name(index: usize) -> String {
    format!("o{}", index)
}

/// Sub-statement tables always iterate over a sequence.
pub(crate) fn into_sequence(statement: Statement) -> PreparationResult<Statement> {
    if statement.shape().is_sequence() {
        return Ok(statement);
    }
    let item_type = statement.select_projection().data_type();
    let mut builder = StatementBuilder::from_statement(statement);
    builder.shape = Some(ResultShape::Sequence { item_type });
    Ok(builder.into_statement()?)
}

fn body_clause_name(clause: &BodyClause) -> &'static str {
    match clause {
        BodyClause::AdditionalFrom(_) => "additional from clause",
        BodyClause::Where(_) => "where clause",
        BodyClause::OrderBy(_) => "order by clause",
        BodyClause::Join(_) => "join clause",
    }
}
