use crate::{
    query_model::{BinaryOp, ConstantValue, DataType, MemberRef},
    sql_statement::{
        sql_expr::{LikeExpr, SqlConstant},
        SqlExpr,
    },
};

use super::{MethodCallTransformerRegistry, PreparedMethodCall};
use crate::preparation::errors::PreparationError;

pub const LIKE_ESCAPE: char = '\\';

pub(super) fn register(registry: &mut MethodCallTransformerRegistry) {
    registry.register_method("String", "ToUpper", |call| unary_function(call, "UPPER"));
    registry.register_method("String", "ToLower", |call| unary_function(call, "LOWER"));
    registry.register_method("String", "TrimStart", |call| unary_function(call, "LTRIM"));
    registry.register_method("String", "TrimEnd", |call| unary_function(call, "RTRIM"));
    registry.register_method("String", "Trim", trim);
    registry.register_method("String", "Contains", |call| {
        like(call, |v| format!("%{}%", v), contains_fallback)
    });
    registry.register_method("String", "StartsWith", |call| {
        like(call, |v| format!("{}%", v), |object, arg| edge_fallback("LEFT", object, arg))
    });
    registry.register_method("String", "EndsWith", |call| {
        like(call, |v| format!("%{}", v), |object, arg| edge_fallback("RIGHT", object, arg))
    });
    registry.register_method("String", "Substring", substring);
    registry.register_method("String", "Replace", replace);
    registry.register_method("String", "IndexOf", index_of);
    registry.register_method("String", "IsNullOrEmpty", is_null_or_empty);
    registry.register_method("String", "Concat", concat);
    registry.register_method("String", "Equals", equals);

    registry.register_member("String", "Length", length);
}

fn length(object: SqlExpr, _member: &MemberRef) -> SqlExpr {
    SqlExpr::function("LEN", vec![object], DataType::Int32)
}

fn unary_function(mut call: PreparedMethodCall, name: &str) -> Result<SqlExpr, PreparationError> {
    call.expect_args(0, 0)?;
    let object = call.take_object()?;
    Ok(SqlExpr::function(name, vec![object], DataType::String))
}

fn trim(mut call: PreparedMethodCall) -> Result<SqlExpr, PreparationError> {
    call.expect_args(0, 0)?;
    let object = call.take_object()?;
    Ok(SqlExpr::function(
        "LTRIM",
        vec![SqlExpr::function("RTRIM", vec![object], DataType::String)],
        DataType::String,
    ))
}

/// Escapes LIKE wildcards in a literal pattern fragment.
pub fn escape_like_pattern(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '[' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

fn string_constant(expr: &SqlExpr) -> Option<&str> {
    match expr.unwrap_named() {
        SqlExpr::Constant(SqlConstant {
            value: ConstantValue::String(value),
            ..
        }) => Some(value),
        SqlExpr::Literal(literal) => match &literal.value {
            ConstantValue::String(value) => Some(value),
            _ => None,
        },
        _ => None,
    }
}

/// `x LIKE pattern` for constant arguments; `fallback` builds an equivalent test otherwise.
fn like(
    mut call: PreparedMethodCall,
    pattern: fn(&str) -> String,
    fallback: fn(SqlExpr, SqlExpr) -> SqlExpr,
) -> Result<SqlExpr, PreparationError> {
    call.expect_args(1, 1)?;
    let object = call.take_object()?;
    let arg = call.args.remove(0);
    match string_constant(&arg) {
        Some(value) => Ok(SqlExpr::Like(LikeExpr {
            expr: Box::new(object),
            pattern: Box::new(SqlExpr::constant(
                ConstantValue::String(pattern(&escape_like_pattern(value))),
                DataType::String,
            )),
            escape: Some(LIKE_ESCAPE),
        })),
        None => Ok(fallback(object, arg)),
    }
}

fn contains_fallback(object: SqlExpr, arg: SqlExpr) -> SqlExpr {
    SqlExpr::binary(
        BinaryOp::GreaterThan,
        SqlExpr::function("CHARINDEX", vec![arg, object], DataType::Int32),
        SqlExpr::literal_int(0),
    )
}

fn edge_fallback(function: &str, object: SqlExpr, arg: SqlExpr) -> SqlExpr {
    let arg_length = SqlExpr::function("LEN", vec![arg.clone()], DataType::Int32);
    SqlExpr::equal(
        SqlExpr::function(function, vec![object, arg_length], DataType::String),
        arg,
    )
}

/// Zero-based start index becomes one-based.
fn substring(mut call: PreparedMethodCall) -> Result<SqlExpr, PreparationError> {
    call.expect_args(1, 2)?;
    let object = call.take_object()?;
    let mut args = call.args.into_iter();
    let start = args.next().map(|start| {
        SqlExpr::binary(BinaryOp::Add, start, SqlExpr::literal_int(1))
    });
    let length = args
        .next()
        .unwrap_or_else(|| SqlExpr::function("LEN", vec![object.clone()], DataType::Int32));
    let mut function_args = vec![object];
    function_args.extend(start);
    function_args.push(length);
    Ok(SqlExpr::function("SUBSTRING", function_args, DataType::String))
}

fn replace(mut call: PreparedMethodCall) -> Result<SqlExpr, PreparationError> {
    call.expect_args(2, 2)?;
    let object = call.take_object()?;
    let mut args = vec![object];
    args.extend(call.args);
    Ok(SqlExpr::function("REPLACE", args, DataType::String))
}

fn index_of(mut call: PreparedMethodCall) -> Result<SqlExpr, PreparationError> {
    call.expect_args(1, 1)?;
    let object = call.take_object()?;
    let value = call.args.remove(0);
    Ok(SqlExpr::binary(
        BinaryOp::Subtract,
        SqlExpr::function("CHARINDEX", vec![value, object], DataType::Int32),
        SqlExpr::literal_int(1),
    ))
}

fn is_null_or_empty(mut call: PreparedMethodCall) -> Result<SqlExpr, PreparationError> {
    call.expect_args(1, 1)?;
    let value = call.args.remove(0);
    Ok(SqlExpr::or(
        SqlExpr::is_null(value.clone()),
        SqlExpr::equal(
            SqlExpr::function("LEN", vec![value], DataType::Int32),
            SqlExpr::literal_int(0),
        ),
    ))
}

fn concat(call: PreparedMethodCall) -> Result<SqlExpr, PreparationError> {
    call.expect_args(1, usize::MAX)?;
    let mut args = call.args.into_iter();
    let first = args
        .next()
        .unwrap_or_else(|| SqlExpr::literal(ConstantValue::String(String::new()), DataType::String));
    Ok(args.fold(first, |acc, arg| SqlExpr::binary(BinaryOp::Add, acc, arg)))
}

fn equals(mut call: PreparedMethodCall) -> Result<SqlExpr, PreparationError> {
    call.expect_args(1, 1)?;
    let other = call.args.remove(0);
    match call.object.take() {
        Some(object) => Ok(SqlExpr::equal(object, other)),
        None => Err(PreparationError::UnsupportedExpression(format!(
            "static call to {}",
            call.method
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_model::MethodRef;

    fn call(name: &str, args: Vec<SqlExpr>) -> PreparedMethodCall {
        PreparedMethodCall {
            method: MethodRef::new("String", name),
            object: Some(SqlExpr::column("t0", "Name", DataType::String, false)),
            args,
            result_type: DataType::Boolean,
        }
    }

    fn string(value: &str) -> SqlExpr {
        SqlExpr::constant(ConstantValue::String(value.to_string()), DataType::String)
    }

    #[test]
    fn test_escape_like_pattern() {
        assert_eq!(escape_like_pattern("50%_off[1]"), "50\\%\\_off\\[1]");
    }

    #[test]
    fn test_contains_with_constant_uses_like() {
        let mut registry = MethodCallTransformerRegistry::new();
        register(&mut registry);
        let transform = registry
            .get_method(&MethodRef::new("String", "Contains").key())
            .unwrap();
        match transform(call("Contains", vec![string("a%b")])).unwrap() {
            SqlExpr::Like(like) => {
                assert_eq!(*like.pattern, string("%a\\%b%"));
                assert_eq!(like.escape, Some('\\'));
            }
            other => panic!("expected LIKE, got {:?}", other),
        }
    }

    #[test]
    fn test_starts_with_column_argument_compares_prefix() {
        let argument = SqlExpr::column("t0", "Prefix", DataType::String, false);
        let mut registry = MethodCallTransformerRegistry::new();
        register(&mut registry);
        let transform = registry
            .get_method(&MethodRef::new("String", "StartsWith").key())
            .unwrap();
        let result = transform(call("StartsWith", vec![argument])).unwrap();
        assert!(result.is_predicate());
        assert!(result.to_string().starts_with("(LEFT("));
    }

    #[test]
    fn test_substring_shifts_start_index() {
        let result = substring(call("Substring", vec![SqlExpr::literal_int(2)])).unwrap();
        assert_eq!(
            result.to_string(),
            "SUBSTRING([t0].[Name], (2 + 1), LEN([t0].[Name]))"
        );
    }
}
