//! Statement-wide resolution of tables, members and entity semantics.
//!
//! Statements are resolved depth-first. The stage keeps a stack of builders for the statements
//! currently being resolved (outermost first) and a registry mapping every resolved table handle
//! to the expression its items resolve to. Navigation joins are attached to the table owning the
//! navigated entity, wherever in the stack (or in an already resolved sub-statement table) that
//! table lives.

use std::collections::HashMap;
use std::mem;

use log::{debug, trace};

use crate::{
    config::TranslatorConfig,
    query_model::{BinaryOp, ConstantValue, DataType, MemberRef, OrderingDirection},
    sql_statement::{
        sql_expr::{
            AggregationExpr, CaseWhen, EntityRefMember, GroupingExpr, InExpr, SqlCollection,
        },
        AggregationModifier, Cardinality, EntityExpr, JoinInfo, JoinSemantics, Ordering,
        ResolvedJoin, ResolvedSubStatementTable, ResultShape, SqlExpr, SqlTable, Statement,
        StatementBuilder, TableId, TableSource, UnresolvedJoin,
    },
    utils::AliasGenerator,
};

use super::{
    errors::ResolutionError,
    resolver::MappingResolver,
    sub_statement_reference::{create_sub_statement_reference, ensure_named_projection},
    ResolutionResult,
};

pub struct MappingResolutionStage<'a> {
    resolver: &'a dyn MappingResolver,
    generator: &'a mut AliasGenerator,
    config: &'a TranslatorConfig,
    /// Statements under resolution, outermost first.
    frames: Vec<StatementBuilder>,
    /// What the items of each resolved table look like.
    items: HashMap<TableId, SqlExpr>,
    /// Owning table of every alias handed out so far.
    aliases: HashMap<String, TableId>,
}

impl<'a> MappingResolutionStage<'a> {
    pub fn new(
        resolver: &'a dyn MappingResolver,
        generator: &'a mut AliasGenerator,
        config: &'a TranslatorConfig,
    ) -> Self {
        Self {
            resolver,
            generator,
            config,
            frames: vec![],
            items: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    /// Resolves the outermost statement of a translation.
    pub fn resolve_sql_statement(&mut self, statement: Statement) -> ResolutionResult<Statement> {
        let statement = self.resolve_statement(statement)?;
        if let SqlExpr::Grouping(_) = statement.select_projection().unwrap_named() {
            return Err(ResolutionError::UnsupportedShape(
                "a grouping cannot be returned as the query result; select its key or aggregates"
                    .to_string(),
            ));
        }
        if !statement.is_resolved() {
            return Err(ResolutionError::UnresolvedNode(statement.to_string()));
        }
        debug!("Resolved statement: {}", statement);
        Ok(statement)
    }

    fn resolve_statement(&mut self, statement: Statement) -> ResolutionResult<Statement> {
        self.frames.push(StatementBuilder::from_statement(statement));
        let result = self.resolve_frame();
        let builder = self
            .frames
            .pop()
            .ok_or(ResolutionError::MissingStatementFrame)?;
        result?;
        Ok(builder.into_statement()?)
    }

    fn frame(&mut self) -> ResolutionResult<&mut StatementBuilder> {
        self.frames
            .last_mut()
            .ok_or(ResolutionError::MissingStatementFrame)
    }

    fn resolve_frame(&mut self) -> ResolutionResult<()> {
        // Tables go back one by one so later tables can navigate from earlier ones.
        let tables = mem::take(&mut self.frame()?.tables);
        for table in tables {
            let table = self.resolve_table(table)?;
            self.frame()?.tables.push(table);
        }

        self.resolve_clause(|frame| &mut frame.select_projection)?;
        self.resolve_clause(|frame| &mut frame.where_condition)?;
        self.resolve_clause(|frame| &mut frame.top_expression)?;
        self.resolve_clause(|frame| &mut frame.group_by_expression)?;

        let orderings = mem::take(&mut self.frame()?.orderings);
        let mut resolved = Vec::with_capacity(orderings.len());
        for ordering in orderings {
            let direction = ordering.direction;
            let expression = self.resolve_expr(ordering.expression)?;
            resolved.extend(expand_ordering(expression, direction)?);
        }

        let nested = self.frames.len() > 1;
        let frame = self.frame()?;
        // Without TOP the order of a nested statement is unobservable.
        if nested && frame.top_expression.is_none() && !resolved.is_empty() {
            trace!("Dropping {} orderings of a nested statement", resolved.len());
            resolved.clear();
        }
        frame.orderings = resolved;
        Ok(())
    }

    /// Resolves one optional clause of the innermost frame in place.
    fn resolve_clause(
        &mut self,
        clause: fn(&mut StatementBuilder) -> &mut Option<SqlExpr>,
    ) -> ResolutionResult<()> {
        if let Some(expr) = clause(self.frame()?).take() {
            let expr = self.resolve_expr(expr)?;
            *clause(self.frame()?) = Some(expr);
        }
        Ok(())
    }

    fn register(&mut self, id: TableId, alias: &str, item: SqlExpr) {
        trace!("Registering table {} as {}: {}", id, alias, item);
        self.items.insert(id, item);
        self.aliases.insert(alias.to_string(), id);
    }

    fn resolve_table(&mut self, mut table: SqlTable) -> ResolutionResult<SqlTable> {
        match &table.source {
            TableSource::Unresolved(unresolved) => {
                let simple = self.resolver.resolve_table_info(unresolved, self.generator)?;
                let definition = self
                    .resolver
                    .resolve_simple_table_info(&simple, self.generator)?;
                debug!(
                    "Resolved table {} to {} AS {}",
                    table.id, simple.table_name, simple.alias
                );
                self.register(
                    table.id,
                    &simple.alias,
                    SqlExpr::Entity(EntityExpr::Definition(definition)),
                );
                table.replace_source(TableSource::Simple(simple))?;
            }
            TableSource::Simple(simple) => {
                let simple = simple.clone();
                let definition = self
                    .resolver
                    .resolve_simple_table_info(&simple, self.generator)?;
                self.register(
                    table.id,
                    &simple.alias,
                    SqlExpr::Entity(EntityExpr::Definition(definition)),
                );
            }
            TableSource::SubStatement(sub) => {
                let alias = sub.alias.clone();
                let nested = (*sub.statement).clone();
                let resolved = self.resolve_statement(nested)?;

                let config = self.config;
                let default_name = &config.default_projection_name;
                let mut builder = StatementBuilder::from_statement(resolved);
                builder.select_projection = builder
                    .select_projection
                    .take()
                    .map(|projection| ensure_named_projection(projection, default_name));
                let resolved = builder.into_statement()?;

                let item = create_sub_statement_reference(
                    resolved.select_projection(),
                    &alias,
                    default_name,
                );
                self.register(table.id, &alias, item);
                table.replace_source(TableSource::SubStatement(ResolvedSubStatementTable {
                    alias,
                    statement: Box::new(resolved),
                }))?;
            }
            TableSource::GroupReference(_) => {
                return Err(ResolutionError::UnsupportedShape(
                    "the elements of a grouping can only be queried through an aggregate such \
                     as Count or Sum"
                        .to_string(),
                ));
            }
            TableSource::Joined(JoinInfo::UnresolvedCollection(collection)) => {
                let member = collection.member.clone();
                let source = self.resolve_expr((*collection.source).clone())?;
                let SqlExpr::Entity(originating) = source.into_unnamed() else {
                    return Err(ResolutionError::UnsupportedShape(format!(
                        "collection `{}` of a value that is not a mapped entity",
                        member
                    )));
                };
                let join = UnresolvedJoin {
                    originating,
                    member,
                    cardinality: Cardinality::Many,
                };
                let resolved = self.resolver.resolve_join_info(&join, self.generator)?;
                self.register_join(table.id, &resolved)?;
                table.replace_source(TableSource::Joined(JoinInfo::Resolved(resolved)))?;
            }
            TableSource::Joined(JoinInfo::Unresolved(join)) => {
                let resolved = self.resolver.resolve_join_info(join, self.generator)?;
                self.register_join(table.id, &resolved)?;
                table.replace_source(TableSource::Joined(JoinInfo::Resolved(resolved)))?;
            }
            TableSource::Joined(JoinInfo::Resolved(join)) => {
                let join = join.clone();
                self.register_join(table.id, &join)?;
            }
        }
        Ok(table)
    }

    fn register_join(&mut self, id: TableId, join: &ResolvedJoin) -> ResolutionResult<SqlExpr> {
        let TableSource::Simple(simple) = join.foreign.as_ref() else {
            return Err(ResolutionError::UnsupportedShape(format!(
                "join to a {}",
                join.foreign.kind_name()
            )));
        };
        let definition = self
            .resolver
            .resolve_simple_table_info(simple, self.generator)?;
        let item = SqlExpr::Entity(EntityExpr::Definition(definition));
        self.register(id, &simple.alias, item.clone());
        Ok(item)
    }

    /// Resolves `expr` completely: navigation markers are traversed into joins.
    pub(crate) fn resolve_expr(&mut self, expr: SqlExpr) -> ResolutionResult<SqlExpr> {
        let resolved = self.resolve_raw(expr)?;
        self.materialize(resolved)
    }

    fn materialize(&mut self, expr: SqlExpr) -> ResolutionResult<SqlExpr> {
        match expr {
            SqlExpr::EntityRefMember(marker) => self.traverse(marker),
            other => Ok(other),
        }
    }

    /// Resolves `expr` but leaves a top-level navigation marker in place, so the caller can still
    /// read an identity off it without joining.
    fn resolve_raw(&mut self, expr: SqlExpr) -> ResolutionResult<SqlExpr> {
        match expr {
            SqlExpr::TableReference(reference) => self
                .items
                .get(&reference.table)
                .cloned()
                .ok_or(ResolutionError::UnknownTable(reference.table)),
            SqlExpr::Member(access) => {
                let owner = self.resolve_raw(*access.expr)?;
                self.resolve_member(owner, &access.member)
            }
            SqlExpr::Constant(constant)
                if constant.data_type.is_entity()
                    || matches!(constant.value, ConstantValue::Entity(_)) =>
            {
                Ok(self
                    .resolver
                    .resolve_constant_expression(&constant.value, &constant.data_type)?)
            }
            SqlExpr::IsNull(inner) => self.null_test(*inner, true),
            SqlExpr::IsNotNull(inner) => self.null_test(*inner, false),
            SqlExpr::Binary(binary)
                if matches!(binary.op, BinaryOp::Equal | BinaryOp::NotEqual)
                    && (binary.left.data_type().is_entity()
                        || binary.right.data_type().is_entity()) =>
            {
                let left = self.resolve_raw(*binary.left)?;
                let right = self.resolve_raw(*binary.right)?;
                let left = self.identity_of(left)?;
                let right = self.identity_of(right)?;
                compare_identities(binary.op, left, right)
            }
            SqlExpr::TypeCheck(check) => {
                let inner = self.resolve_expr(*check.expr)?;
                Ok(self.resolver.resolve_type_check(&inner, &check.target)?)
            }
            SqlExpr::SubStatement(statement) => {
                if let Some(column) = self.try_simplify_group_aggregate(&statement)? {
                    return Ok(column);
                }
                Ok(SqlExpr::SubStatement(Box::new(
                    self.resolve_statement(*statement)?,
                )))
            }
            SqlExpr::In(in_expr) => self.resolve_in(in_expr),
            SqlExpr::Aggregation(aggregation) => {
                let operand = self.resolve_expr(*aggregation.expr)?;
                if aggregation.modifier != AggregationModifier::Count
                    && !operand.data_type().is_scalar()
                {
                    return Err(ResolutionError::UnsupportedShape(format!(
                        "{} over `{}` values",
                        aggregation.modifier,
                        operand.data_type()
                    )));
                }
                Ok(SqlExpr::Aggregation(AggregationExpr {
                    modifier: aggregation.modifier,
                    expr: Box::new(operand),
                    data_type: aggregation.data_type,
                }))
            }
            other => other.map_children(&mut |child| self.resolve_expr(child)),
        }
    }

    fn resolve_member(&mut self, owner: SqlExpr, member: &MemberRef) -> ResolutionResult<SqlExpr> {
        trace!("Resolving member {} of {}", member, owner);
        match owner {
            SqlExpr::Named(named) => self.resolve_member(*named.expr, member),
            SqlExpr::Entity(entity) => {
                Ok(self.resolver.resolve_member_expression(&entity, member)?)
            }
            SqlExpr::EntityRefMember(marker) => {
                let entity = self.traverse(marker)?;
                self.resolve_member(entity, member)
            }
            SqlExpr::Column(column) => Ok(self
                .resolver
                .resolve_column_member_expression(&column, member)?),
            SqlExpr::New(new) => {
                let type_name = new.type_name.clone();
                new.members
                    .into_iter()
                    .find(|m| m.name == member.name)
                    .map(|m| m.expr)
                    .ok_or_else(|| {
                        ResolutionError::UnsupportedShape(format!(
                            "member `{}` of constructed type `{}`",
                            member.name, type_name
                        ))
                    })
            }
            SqlExpr::Grouping(grouping)
                if member.name == "Key" || member.name == GroupingExpr::KEY_NAME =>
            {
                Ok(grouping.key.into_unnamed())
            }
            SqlExpr::Case(case) => {
                let mut cases = Vec::with_capacity(case.cases.len());
                for when_then in case.cases {
                    let then = self.resolve_member(when_then.then, member)?;
                    cases.push(CaseWhen {
                        when: when_then.when,
                        then: self.materialize(then)?,
                    });
                }
                let else_value = match case.else_value {
                    Some(else_value) => {
                        let value = self.resolve_member(*else_value, member)?;
                        Some(self.materialize(value)?)
                    }
                    None => None,
                };
                Ok(SqlExpr::case(cases, else_value, member.member_type.clone()))
            }
            null if null.is_null_literal() => Ok(SqlExpr::literal_null(member.member_type.clone())),
            other => Err(ResolutionError::UnsupportedShape(format!(
                "member `{}` of `{}`",
                member, other
            ))),
        }
    }

    /// Joins the entity a navigation marker points to, reusing the join when the same member of
    /// the same table was traversed before.
    fn traverse(&mut self, marker: EntityRefMember) -> ResolutionResult<SqlExpr> {
        let owner = *self
            .aliases
            .get(marker.entity.table_alias())
            .ok_or_else(|| {
                ResolutionError::UnsupportedShape(format!(
                    "navigation `{}` from `{}`, which is not a table in scope",
                    marker.member,
                    marker.entity.table_alias()
                ))
            })?;
        let key = marker.member.key();

        let cached = find_table_mut(&mut self.frames, owner)
            .ok_or(ResolutionError::UnknownTable(owner))?
            .cached_join(&key)
            .map(|joined| joined.id);
        if let Some(joined) = cached {
            trace!("Reusing join {} for {}", joined, marker.member);
            return self
                .items
                .get(&joined)
                .cloned()
                .ok_or(ResolutionError::UnknownTable(joined));
        }

        let join = UnresolvedJoin {
            originating: marker.entity,
            member: marker.member,
            cardinality: Cardinality::One,
        };
        let resolved = self.resolver.resolve_join_info(&join, self.generator)?;
        let id = self.generator.next_table_id();
        let item = self.register_join(id, &resolved)?;
        let table = SqlTable::new(
            id,
            TableSource::Joined(JoinInfo::Resolved(resolved)),
            JoinSemantics::Left,
        );
        find_table_mut(&mut self.frames, owner)
            .ok_or(ResolutionError::UnknownTable(owner))?
            .get_or_add_left_join::<ResolutionError>(key, || Ok(table))?;
        debug!("Added left join {} for {}", id, join.member);
        Ok(item)
    }

    /// The scalar (or composite) expression identifying an entity-typed operand.
    fn identity_of(&mut self, expr: SqlExpr) -> ResolutionResult<SqlExpr> {
        match expr {
            SqlExpr::Named(named) => self.identity_of(*named.expr),
            null if null.is_null_literal() => Ok(null),
            SqlExpr::EntityRefMember(marker) => {
                if let Some(identity) = self.resolver.try_resolve_optimized_identity(&marker) {
                    trace!("Using foreign key identity for {}", marker.member);
                    return Ok(identity);
                }
                let entity = self.traverse(marker)?;
                self.identity_of(entity)
            }
            SqlExpr::Entity(entity) => entity.identity_expression().ok_or_else(|| {
                ResolutionError::UnsupportedShape(format!(
                    "entity `{}` has no identity to compare",
                    entity.entity_type()
                ))
            }),
            SqlExpr::EntityConstant(constant) => match constant.identity {
                Some(identity) => Ok(*identity),
                None => Err(ResolutionError::UnsupportedShape(format!(
                    "constant of `{}` has no identity to compare",
                    constant.entity_type
                ))),
            },
            SqlExpr::SubStatement(statement) => Ok(SqlExpr::SubStatement(Box::new(
                self.statement_identity(*statement)?,
            ))),
            other if other.data_type().is_scalar() => Ok(other),
            other => Err(ResolutionError::UnsupportedShape(format!(
                "comparison of `{}` values",
                other.data_type()
            ))),
        }
    }

    /// Replaces a resolved statement's entity projection by the entity's identity.
    fn statement_identity(&mut self, statement: Statement) -> ResolutionResult<Statement> {
        if statement.select_projection().data_type().is_scalar() {
            return Ok(statement);
        }
        let mut builder = StatementBuilder::from_statement(statement);
        let projection = builder
            .select_projection
            .take()
            .ok_or(ResolutionError::MissingStatementFrame)?;
        let identity = self.identity_of(projection)?;
        let data_type = identity.data_type();
        builder.shape = builder.shape.take().map(|shape| match shape {
            ResultShape::Sequence { .. } => ResultShape::Sequence {
                item_type: data_type.clone(),
            },
            ResultShape::SingleValue {
                return_default_when_empty,
                ..
            } => ResultShape::SingleValue {
                data_type: data_type.clone(),
                return_default_when_empty,
            },
            ResultShape::Scalar { .. } => ResultShape::Scalar {
                data_type: data_type.clone(),
            },
        });
        builder.select_projection = Some(identity);
        Ok(builder.into_statement()?)
    }

    fn null_test(&mut self, inner: SqlExpr, is_null: bool) -> ResolutionResult<SqlExpr> {
        let wrap = |expr: SqlExpr| {
            if is_null {
                SqlExpr::is_null(expr)
            } else {
                SqlExpr::is_not_null(expr)
            }
        };
        let raw = self.resolve_raw(inner)?;
        if !raw.data_type().is_entity() || raw.is_null_literal() {
            return Ok(wrap(self.materialize(raw)?));
        }
        match self.identity_of(raw)? {
            SqlExpr::New(composite) => composite
                .members
                .into_iter()
                .map(|member| wrap(member.expr))
                .reduce(SqlExpr::and)
                .ok_or_else(|| {
                    ResolutionError::UnsupportedShape("entity with an empty identity".to_string())
                }),
            identity => Ok(wrap(identity)),
        }
    }

    fn resolve_in(&mut self, in_expr: InExpr) -> ResolutionResult<SqlExpr> {
        let item = self.resolve_raw(*in_expr.item)?;
        let set = match *in_expr.set {
            SqlExpr::SubStatement(statement) => {
                SqlExpr::SubStatement(Box::new(self.resolve_statement(*statement)?))
            }
            other => self.resolve_expr(other)?,
        };
        if !item.data_type().is_entity() {
            return Ok(SqlExpr::in_set(self.materialize(item)?, set));
        }

        let item = self.identity_of(item)?;
        let set = match set {
            SqlExpr::SubStatement(statement) => {
                SqlExpr::SubStatement(Box::new(self.statement_identity(*statement)?))
            }
            SqlExpr::Collection(collection) => {
                let items = collection
                    .items
                    .into_iter()
                    .map(|member| self.identity_of(member))
                    .collect::<ResolutionResult<Vec<_>>>()?;
                SqlExpr::Collection(SqlCollection {
                    item_type: items
                        .first()
                        .map(SqlExpr::data_type)
                        .unwrap_or(DataType::Object),
                    items,
                })
            }
            other => other,
        };
        Ok(SqlExpr::in_set(item, set))
    }

    /// `(SELECT COUNT(*) FROM g)` where `g` is a grouping: the aggregate moves into the grouped
    /// statement and the expression becomes a column of that statement's table.
    fn try_simplify_group_aggregate(
        &mut self,
        statement: &Statement,
    ) -> ResolutionResult<Option<SqlExpr>> {
        let [table] = statement.tables() else {
            return Ok(None);
        };
        let TableSource::GroupReference(group_reference) = &table.source else {
            return Ok(None);
        };
        let SqlExpr::Aggregation(aggregation) = statement.select_projection().unwrap_named()
        else {
            return Err(unsupported_group_query());
        };
        let simple = statement.where_condition().is_none()
            && statement.top_expression().is_none()
            && statement.group_by_expression().is_none()
            && !statement.is_distinct()
            && statement.shape().is_scalar();
        if !simple {
            return Err(unsupported_group_query());
        }

        let group_source = group_reference.referenced_group_source;
        let (alias, element) = {
            let group_table = find_table_mut(&mut self.frames, group_source)
                .ok_or(ResolutionError::UnknownTable(group_source))?;
            let TableSource::SubStatement(sub) = &group_table.source else {
                return Err(unsupported_group_query());
            };
            let SqlExpr::Grouping(grouping) = sub.statement.select_projection().unwrap_named()
            else {
                return Err(unsupported_group_query());
            };
            (sub.alias.clone(), grouping.element.unwrap_named().clone())
        };

        // The aggregate is evaluated inside the grouped statement, against its element.
        self.items.insert(table.id, element);
        let resolved = self.resolve_expr(SqlExpr::Aggregation(aggregation.clone()));
        self.items.remove(&table.id);
        let resolved = resolved?;
        let data_type = resolved.data_type();

        let group_table = find_table_mut(&mut self.frames, group_source)
            .ok_or(ResolutionError::UnknownTable(group_source))?;
        let TableSource::SubStatement(sub) = &mut group_table.source else {
            return Err(unsupported_group_query());
        };
        let Some(grouping) = grouping_mut(&mut sub.statement.select_projection) else {
            return Err(unsupported_group_query());
        };
        let name = grouping.add_aggregation(resolved);
        debug!("Moved aggregate into grouping {} as {}", alias, name);
        Ok(Some(SqlExpr::column(alias, name, data_type, false)))
    }
}

fn unsupported_group_query() -> ResolutionError {
    ResolutionError::UnsupportedShape(
        "only a plain aggregate (Count, Sum, Min, Max, Average) can be computed over a grouping"
            .to_string(),
    )
}

fn grouping_mut(expr: &mut SqlExpr) -> Option<&mut GroupingExpr> {
    match expr {
        SqlExpr::Named(named) => grouping_mut(&mut named.expr),
        SqlExpr::Grouping(grouping) => Some(grouping),
        _ => None,
    }
}

fn compare_identities(op: BinaryOp, left: SqlExpr, right: SqlExpr) -> ResolutionResult<SqlExpr> {
    match (left, right) {
        (SqlExpr::New(left), SqlExpr::New(right)) => {
            if left.members.len() != right.members.len() {
                return Err(ResolutionError::UnsupportedShape(format!(
                    "comparison of identities `{}` and `{}` of different arity",
                    left.type_name, right.type_name
                )));
            }
            let combine: fn(SqlExpr, SqlExpr) -> SqlExpr = if op == BinaryOp::Equal {
                SqlExpr::and
            } else {
                SqlExpr::or
            };
            left.members
                .into_iter()
                .zip(right.members)
                .map(|(l, r)| SqlExpr::binary(op, l.expr, r.expr))
                .reduce(combine)
                .ok_or_else(|| {
                    ResolutionError::UnsupportedShape("entity with an empty identity".to_string())
                })
        }
        (SqlExpr::New(composite), null) | (null, SqlExpr::New(composite))
            if null.is_null_literal() =>
        {
            let test: fn(SqlExpr) -> SqlExpr = if op == BinaryOp::Equal {
                SqlExpr::is_null
            } else {
                SqlExpr::is_not_null
            };
            composite
                .members
                .into_iter()
                .map(|member| test(member.expr))
                .reduce(SqlExpr::and)
                .ok_or_else(|| {
                    ResolutionError::UnsupportedShape("entity with an empty identity".to_string())
                })
        }
        (left, right) => Ok(SqlExpr::binary(op, left, right)),
    }
}

/// An ordering by an entity orders by its identity columns.
fn expand_ordering(
    expression: SqlExpr,
    direction: OrderingDirection,
) -> ResolutionResult<Vec<Ordering>> {
    match expression.unwrap_named() {
        SqlExpr::Entity(entity) => match entity.identity_expression() {
            Some(SqlExpr::New(composite)) => Ok(composite
                .members
                .into_iter()
                .map(|member| Ordering::new(member.expr, direction))
                .collect()),
            Some(identity) => Ok(vec![Ordering::new(identity, direction)]),
            None => Err(ResolutionError::UnsupportedShape(format!(
                "ordering by entity `{}` without identity",
                entity.entity_type()
            ))),
        },
        _ => Ok(vec![Ordering::new(expression, direction)]),
    }
}

/// Finds a table by handle in the statements under resolution, including the statements of
/// sub-statement tables they contain.
fn find_table_mut(frames: &mut [StatementBuilder], id: TableId) -> Option<&mut SqlTable> {
    frames
        .iter_mut()
        .rev()
        .find_map(|frame| find_in_tables(&mut frame.tables, id))
}

fn find_in_tables(tables: &mut [SqlTable], id: TableId) -> Option<&mut SqlTable> {
    for table in tables.iter_mut() {
        if table.find(id).is_some() {
            return table.find_mut(id);
        }
        if let TableSource::SubStatement(sub) = &mut table.source {
            if let Some(found) = find_in_tables(&mut sub.statement.tables, id) {
                return Some(found);
            }
        }
    }
    None
}
