use crate::{preparation::errors::PreparationError, sql_statement::SqlExpr};

use super::{MethodCallTransformerRegistry, PreparedMethodCall};

pub(super) fn register(registry: &mut MethodCallTransformerRegistry) {
    registry.register_method("Math", "Abs", |call| function(call, "ABS", 1));
    registry.register_method("Math", "Floor", |call| function(call, "FLOOR", 1));
    registry.register_method("Math", "Ceiling", |call| function(call, "CEILING", 1));
    registry.register_method("Math", "Sqrt", |call| function(call, "SQRT", 1));
    registry.register_method("Math", "Pow", |call| function(call, "POWER", 2));
    registry.register_method("Math", "Round", round);
}

/// Static `Math.X(args)` → `X(args)`; the result keeps the call's declared type.
fn function(
    call: PreparedMethodCall,
    name: &str,
    arity: usize,
) -> Result<SqlExpr, PreparationError> {
    call.expect_args(arity, arity)?;
    Ok(SqlExpr::function(name, call.args, call.result_type))
}

/// `Round(x)` rounds to zero decimals.
fn round(call: PreparedMethodCall) -> Result<SqlExpr, PreparationError> {
    call.expect_args(1, 2)?;
    let result_type = call.result_type;
    let mut args = call.args;
    if args.len() == 1 {
        args.push(SqlExpr::literal_int(0));
    }
    Ok(SqlExpr::function("ROUND", args, result_type))
}
