//! Human-readable rendering of statements for logs and the CLI.
//!
//! `Statement` prints as a tree; `SqlExpr` prints in a compact SQL-like notation. Neither is a
//! dialect renderer.

use std::fmt;

use super::{
    sql_expr::{SqlExpr, SqlUnaryOp},
    AggregationModifier, JoinInfo, SqlTable, Statement, TableSource,
};

fn join<T: fmt::Display>(items: impl IntoIterator<Item = T>, separator: &str) -> String {
    items
        .into_iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

impl fmt::Display for SqlExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlExpr::Literal(literal) => write!(f, "{}", literal.value),
            SqlExpr::Constant(constant) => write!(f, "@{}", constant.value),
            SqlExpr::Column(column) => write!(f, "[{}].[{}]", column.owning_alias, column.name),
            SqlExpr::Entity(entity) => match entity.name() {
                Some(name) => write!(f, "[{}].* AS {}", entity.table_alias(), name),
                None => write!(f, "[{}].*", entity.table_alias()),
            },
            SqlExpr::Named(named) => match &named.name {
                Some(name) => write!(f, "{} AS [{}]", named.expr, name),
                None => write!(f, "{}", named.expr),
            },
            SqlExpr::TableReference(reference) => {
                write!(f, "TABLE-REF({}, {})", reference.table, reference.item_type)
            }
            SqlExpr::Member(access) => write!(f, "{}.{}", access.expr, access.member.name),
            SqlExpr::EntityRefMember(marker) => write!(
                f,
                "ENTITY-REF-MEMBER([{}].{})",
                marker.entity.table_alias(),
                marker.member.name
            ),
            SqlExpr::EntityConstant(constant) => match &constant.identity {
                Some(identity) => write!(f, "ENTITY({})", identity),
                None => write!(f, "ENTITY({}: {})", constant.entity_type, constant.value),
            },
            SqlExpr::Unary(unary) => match unary.op {
                SqlUnaryOp::Not => write!(f, "NOT ({})", unary.operand),
                SqlUnaryOp::Negate => write!(f, "-({})", unary.operand),
            },
            SqlExpr::Convert(convert) => {
                write!(f, "CONVERT({}, {})", convert.target, convert.operand)
            }
            SqlExpr::Binary(binary) => write!(
                f,
                "({} {} {})",
                binary.left,
                binary.op.symbol(),
                binary.right
            ),
            SqlExpr::IsNull(inner) => write!(f, "{} IS NULL", inner),
            SqlExpr::IsNotNull(inner) => write!(f, "{} IS NOT NULL", inner),
            SqlExpr::Case(case) => {
                write!(f, "CASE")?;
                for when_then in &case.cases {
                    write!(f, " WHEN {} THEN {}", when_then.when, when_then.then)?;
                }
                if let Some(else_value) = &case.else_value {
                    write!(f, " ELSE {}", else_value)?;
                }
                write!(f, " END")
            }
            SqlExpr::Coalesce(coalesce) => {
                write!(f, "COALESCE({}, {})", coalesce.left, coalesce.right)
            }
            SqlExpr::In(in_expr) => write!(f, "{} IN {}", in_expr.item, in_expr.set),
            SqlExpr::Collection(collection) => {
                write!(f, "({})", join(&collection.items, ", "))
            }
            SqlExpr::Exists(inner) => write!(f, "EXISTS{}", inner),
            SqlExpr::Like(like) => {
                write!(f, "{} LIKE {}", like.expr, like.pattern)?;
                if let Some(escape) = like.escape {
                    write!(f, " ESCAPE '{}'", escape)?;
                }
                Ok(())
            }
            SqlExpr::Aggregation(aggregation) => match aggregation.modifier {
                AggregationModifier::Count => write!(f, "COUNT(*)"),
                modifier => write!(f, "{}({})", modifier, aggregation.expr),
            },
            SqlExpr::RowNumber(row_number) => {
                let orderings = join(
                    row_number
                        .orderings
                        .iter()
                        .map(|o| format!("{} {}", o.expression, o.direction)),
                    ", ",
                );
                write!(f, "ROW_NUMBER() OVER (ORDER BY {})", orderings)
            }
            SqlExpr::Function(function) => {
                write!(f, "{}({})", function.name, join(&function.args, ", "))
            }
            SqlExpr::MethodCall(call) => {
                let object = call
                    .object
                    .as_ref()
                    .map(|o| o.to_string())
                    .unwrap_or_else(|| call.method.declaring_type.clone());
                write!(
                    f,
                    "CLIENT {}.{}({})",
                    object,
                    call.method.name,
                    join(&call.args, ", ")
                )
            }
            SqlExpr::SubStatement(statement) => write!(f, "({})", statement.to_sql_like()),
            SqlExpr::New(new) => {
                let members = join(
                    new.members
                        .iter()
                        .map(|m| format!("{} AS [{}]", m.expr, m.name)),
                    ", ",
                );
                write!(f, "NEW {}({})", new.type_name, members)
            }
            SqlExpr::Grouping(grouping) => {
                write!(f, "GROUPING(KEY: {}, ELEMENT: {}", grouping.key, grouping.element)?;
                if !grouping.aggregations.is_empty() {
                    write!(f, ", AGGREGATIONS: {}", join(&grouping.aggregations, ", "))?;
                }
                write!(f, ")")
            }
            SqlExpr::TypeCheck(check) => write!(f, "{} IS {}", check.expr, check.target),
            SqlExpr::ConvertedBoolean(inner) => {
                if inner.is_predicate() {
                    write!(f, "CASE WHEN {} THEN 1 ELSE 0 END", inner)
                } else {
                    write!(f, "{}", inner)
                }
            }
        }
    }
}

impl Statement {
    /// Single-line SQL-like form, used when a statement is nested inside an expression.
    pub fn to_sql_like(&self) -> String {
        let mut sql = String::from("SELECT ");
        if self.is_distinct {
            sql.push_str("DISTINCT ");
        }
        if let Some(top) = &self.top_expression {
            sql.push_str(&format!("TOP ({}) ", top));
        }
        sql.push_str(&self.select_projection.to_string());
        if !self.tables.is_empty() {
            sql.push_str(" FROM ");
            sql.push_str(&join(self.tables.iter().map(table_label), ", "));
        }
        if let Some(condition) = &self.where_condition {
            sql.push_str(&format!(" WHERE {}", condition));
        }
        if let Some(group_by) = &self.group_by_expression {
            sql.push_str(&format!(" GROUP BY {}", group_by));
        }
        if !self.orderings.is_empty() {
            let orderings = join(
                self.orderings
                    .iter()
                    .map(|o| format!("{} {}", o.expression, o.direction)),
                ", ",
            );
            sql.push_str(&format!(" ORDER BY {}", orderings));
        }
        sql
    }

    fn fmt_with_tree(
        &self,
        f: &mut fmt::Formatter<'_>,
        prefix: &str,
        is_last: bool,
        is_root: bool,
    ) -> fmt::Result {
        let (branch, next_prefix) = tree_branch(is_last);
        let header = format!("Statement({:?})", self.shape);
        if is_root {
            writeln!(f, "\n{}", header)?;
        } else {
            writeln!(f, "{}{}{}", prefix, branch, header)?;
        }
        let child_prefix = if is_root {
            String::new()
        } else {
            format!("{}{}", prefix, next_prefix)
        };

        let mut lines: Vec<String> = vec![format!("projection: {}", self.select_projection)];
        if self.is_distinct {
            lines.push("distinct".to_string());
        }
        if let Some(top) = &self.top_expression {
            lines.push(format!("top: {}", top));
        }
        if self.aggregation_modifier != AggregationModifier::None {
            lines.push(format!("aggregation: {}", self.aggregation_modifier));
        }
        if let Some(condition) = &self.where_condition {
            lines.push(format!("where: {}", condition));
        }
        if let Some(group_by) = &self.group_by_expression {
            lines.push(format!("group by: {}", group_by));
        }
        for ordering in &self.orderings {
            lines.push(format!(
                "order by: {} {}",
                ordering.expression, ordering.direction
            ));
        }

        let total = lines.len() + self.tables.len();
        for (i, line) in lines.iter().enumerate() {
            let (branch, _) = tree_branch(i + 1 == total);
            writeln!(f, "{}{}{}", child_prefix, branch, line)?;
        }
        for (i, table) in self.tables.iter().enumerate() {
            fmt_table(f, table, &child_prefix, lines.len() + i + 1 == total)?;
        }
        Ok(())
    }
}

/// Branch glyph for a node and the prefix continuing below it.
fn tree_branch(is_last: bool) -> (&'static str, &'static str) {
    if is_last {
        ("└── ", "    ")
    } else {
        ("├── ", "│   ")
    }
}

fn table_label(table: &SqlTable) -> String {
    match &table.source {
        TableSource::Unresolved(unresolved) => format!("UNRESOLVED({})", unresolved.item_type),
        TableSource::Simple(simple) => format!("[{}] AS [{}]", simple.table_name, simple.alias),
        TableSource::SubStatement(sub) => {
            format!("({}) AS [{}]", sub.statement.to_sql_like(), sub.alias)
        }
        TableSource::GroupReference(group) => {
            format!("GROUP-REF({})", group.referenced_group_source)
        }
        TableSource::Joined(JoinInfo::Unresolved(join)) => format!(
            "UNRESOLVED-JOIN([{}].{})",
            join.originating.table_alias(),
            join.member.name
        ),
        TableSource::Joined(JoinInfo::UnresolvedCollection(join)) => {
            format!("UNRESOLVED-COLLECTION({}.{})", join.source, join.member.name)
        }
        TableSource::Joined(JoinInfo::Resolved(join)) => {
            let foreign = SqlTable::new(table.id, (*join.foreign).clone(), table.semantics);
            format!(
                "{:?} JOIN {} ON {}",
                table.semantics,
                table_label(&foreign),
                join.condition
            )
        }
    }
}

fn fmt_table(
    f: &mut fmt::Formatter<'_>,
    table: &SqlTable,
    prefix: &str,
    is_last: bool,
) -> fmt::Result {
    let (branch, next_prefix) = tree_branch(is_last);
    writeln!(f, "{}{}table {}: {}", prefix, branch, table.id, table_label(table))?;
    let joins: Vec<&SqlTable> = table.joins().collect();
    let n = joins.len();
    for (i, join) in joins.into_iter().enumerate() {
        fmt_table(f, join, &format!("{}{}", prefix, next_prefix), i + 1 == n)?;
    }
    Ok(())
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_with_tree(f, "", true, true)
    }
}
