//! Method/member transformer registry.
//!
//! Maps a method or member of the query language (keyed by declaring type and name) to the
//! relational fragment that evaluates it, e.g. `String.ToUpper()` → `UPPER(x)`. Calls without a
//! registered transformer fall back to a client-evaluated [`SqlExpr::MethodCall`].
//!
//! The registry is populated once, before the first translation, and is read-only afterwards.

use std::collections::HashMap;

use crate::{
    preparation::errors::PreparationError,
    query_model::{DataType, MemberRef, MethodRef, SymbolKey},
    sql_statement::SqlExpr,
};

mod date_time;
mod math;
mod string;

/// A method call whose object and arguments are already prepared.
#[derive(Debug, Clone)]
pub struct PreparedMethodCall {
    pub method: MethodRef,
    pub object: Option<SqlExpr>,
    pub args: Vec<SqlExpr>,
    pub result_type: DataType,
}

impl PreparedMethodCall {
    /// Fails unless the call has between `min` and `max` arguments.
    pub fn expect_args(&self, min: usize, max: usize) -> Result<(), PreparationError> {
        let actual = self.args.len();
        if actual < min || actual > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{}..={}", min, max)
            };
            return Err(PreparationError::ArgumentCount {
                method: self.method.key(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// The instance the method is called on; static calls have none.
    pub fn take_object(&mut self) -> Result<SqlExpr, PreparationError> {
        self.object.take().ok_or_else(|| {
            PreparationError::UnsupportedExpression(format!(
                "static call to instance method {}",
                self.method
            ))
        })
    }
}

pub type MethodTransform = fn(PreparedMethodCall) -> Result<SqlExpr, PreparationError>;
pub type MemberTransform = fn(SqlExpr, &MemberRef) -> SqlExpr;

#[derive(Clone, Default)]
pub struct MethodCallTransformerRegistry {
    methods: HashMap<SymbolKey, MethodTransform>,
    members: HashMap<SymbolKey, MemberTransform>,
}

impl MethodCallTransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the string, math and date/time transformers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        string::register(&mut registry);
        math::register(&mut registry);
        date_time::register(&mut registry);
        registry
    }

    pub fn register_method(&mut self, declaring_type: &str, name: &str, transform: MethodTransform) {
        self.methods
            .insert(SymbolKey::new(declaring_type, name), transform);
    }

    pub fn register_member(&mut self, declaring_type: &str, name: &str, transform: MemberTransform) {
        self.members
            .insert(SymbolKey::new(declaring_type, name), transform);
    }

    pub fn get_method(&self, key: &SymbolKey) -> Option<MethodTransform> {
        self.methods.get(key).copied()
    }

    pub fn get_member(&self, key: &SymbolKey) -> Option<MemberTransform> {
        self.members.get(key).copied()
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }
}

lazy_static::lazy_static! {
    pub static ref DEFAULT_METHOD_CALL_TRANSFORMERS: MethodCallTransformerRegistry =
        MethodCallTransformerRegistry::with_defaults();
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn call(declaring_type: &str, name: &str, object: Option<SqlExpr>, args: Vec<SqlExpr>) -> SqlExpr {
        let method = MethodRef::new(declaring_type, name);
        let transform = DEFAULT_METHOD_CALL_TRANSFORMERS
            .get_method(&method.key())
            .unwrap_or_else(|| panic!("no transformer for {}", method));
        transform(PreparedMethodCall {
            method,
            object,
            args,
            result_type: DataType::String,
        })
        .unwrap()
    }

    fn name_column() -> SqlExpr {
        SqlExpr::column("t0", "Name", DataType::String, false)
    }

    #[test_case("ToUpper", "UPPER" ; "upper")]
    #[test_case("ToLower", "LOWER" ; "lower")]
    #[test_case("TrimStart", "LTRIM" ; "trim start")]
    #[test_case("TrimEnd", "RTRIM" ; "trim end")]
    fn test_single_function_string_methods(method: &str, function: &str) {
        match call("String", method, Some(name_column()), vec![]) {
            SqlExpr::Function(f) => {
                assert_eq!(f.name, function);
                assert_eq!(f.args, vec![name_column()]);
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_method_is_not_registered() {
        let key = SymbolKey::new("String", "Normalize");
        assert!(DEFAULT_METHOD_CALL_TRANSFORMERS.get_method(&key).is_none());
        assert!(DEFAULT_METHOD_CALL_TRANSFORMERS.method_count() > 10);
    }

    #[test]
    fn test_wrong_argument_count_is_reported() {
        let method = MethodRef::new("String", "Replace");
        let transform = DEFAULT_METHOD_CALL_TRANSFORMERS
            .get_method(&method.key())
            .unwrap();
        let err = transform(PreparedMethodCall {
            method,
            object: Some(name_column()),
            args: vec![SqlExpr::literal_int(1)],
            result_type: DataType::String,
        })
        .unwrap_err();
        assert!(matches!(err, PreparationError::ArgumentCount { actual: 1, .. }));
    }
}
