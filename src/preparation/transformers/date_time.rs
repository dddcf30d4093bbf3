use crate::{
    query_model::{ConstantValue, DataType, MemberRef},
    sql_statement::SqlExpr,
};

use super::MethodCallTransformerRegistry;

pub(super) fn register(registry: &mut MethodCallTransformerRegistry) {
    registry.register_member("DateTime", "Year", date_part);
    registry.register_member("DateTime", "Month", date_part);
    registry.register_member("DateTime", "Day", date_part);
    registry.register_member("DateTime", "Hour", date_part);
    registry.register_member("DateTime", "Minute", date_part);
    registry.register_member("DateTime", "Second", date_part);
    registry.register_member("DateTime", "Date", date);
}

fn part_token(part: &str) -> SqlExpr {
    SqlExpr::literal(ConstantValue::String(part.to_lowercase()), DataType::String)
}

fn date_part(object: SqlExpr, member: &MemberRef) -> SqlExpr {
    SqlExpr::function(
        "DATEPART",
        vec![part_token(&member.name), object],
        DataType::Int32,
    )
}

/// Truncates to midnight.
fn date(object: SqlExpr, _member: &MemberRef) -> SqlExpr {
    SqlExpr::function(
        "CONVERT",
        vec![part_token("DATE"), object],
        DataType::DateTime,
    )
}
