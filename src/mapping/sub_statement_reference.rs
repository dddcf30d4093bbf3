//! What a sub-statement's projection looks like from the statement that selects from it.
//!
//! ```text
//! SELECT [t0].[Name] AS [value] ... ) AS [q0]     →  [q0].[value]
//! SELECT [t0].* (entity Cook, named key) ) AS [q0] →  Cook seen through q0, columns key_*
//! SELECT NEW(key = .., o0 = ..) ) AS [q0]           →  NEW(key = [q0]..., o0 = [q0].[o0])
//! ```

use crate::sql_statement::{
    entity::combine_names,
    sql_expr::{GroupingExpr, NewExpr, NewMember},
    SqlExpr,
};

/// Rebases `projection` (already named) onto `alias`. `default_name` covers an unnamed scalar.
pub fn create_sub_statement_reference(
    projection: &SqlExpr,
    alias: &str,
    default_name: &str,
) -> SqlExpr {
    reference(projection, None, alias, default_name)
}

fn reference(expr: &SqlExpr, name: Option<&str>, alias: &str, default_name: &str) -> SqlExpr {
    match expr {
        SqlExpr::Named(named) => {
            let combined = combine_names(name, named.name.as_deref());
            reference(&named.expr, combined.as_deref(), alias, default_name)
        }
        SqlExpr::Entity(entity) => SqlExpr::Entity(
            entity
                .with_name(combine_names(name, entity.name()))
                .create_reference(alias),
        ),
        SqlExpr::New(new) => SqlExpr::New(NewExpr {
            type_name: new.type_name.clone(),
            members: new
                .members
                .iter()
                .map(|member| NewMember {
                    name: member.name.clone(),
                    expr: reference(
                        &member.expr,
                        combine_names(name, Some(&member.name)).as_deref(),
                        alias,
                        default_name,
                    ),
                })
                .collect(),
        }),
        SqlExpr::Grouping(grouping) => SqlExpr::Grouping(GroupingExpr {
            key: Box::new(reference(&grouping.key, name, alias, default_name)),
            element: Box::new(reference(&grouping.element, name, alias, default_name)),
            aggregations: grouping
                .aggregations
                .iter()
                .map(|aggregation| reference(aggregation, name, alias, default_name))
                .collect(),
            data_type: grouping.data_type.clone(),
        }),
        other => SqlExpr::column(
            alias,
            name.unwrap_or(default_name),
            other.data_type(),
            false,
        ),
    }
}

/// Names an unnamed scalar projection so outer statements can address it as a column.
pub fn ensure_named_projection(projection: SqlExpr, default_name: &str) -> SqlExpr {
    match projection {
        named @ SqlExpr::Named(_) => named,
        other if other.data_type().is_scalar() => {
            SqlExpr::named(Some(default_name.to_string()), other)
        }
        other => other,
    }
}
