//! Expression evaluation.

use std::borrow::Cow;

use stencil_relief::{CallExpr, Expr, Value};

use crate::{
    collaborators::SessionStore,
    context::Context,
    functions::FunctionRegistry,
    resolver::{lookup, resolve_variable},
};

/// Evaluates [`Expr`] trees against a [`Context`].
///
/// Evaluation never fails: anything that cannot be computed is null.
#[derive(Clone, Copy)]
pub struct Evaluator<'r> {
    functions: &'r FunctionRegistry,
    session: &'r dyn SessionStore,
}

impl<'r> Evaluator<'r> {
    pub fn new(functions: &'r FunctionRegistry, session: &'r dyn SessionStore) -> Self {
        Self { functions, session }
    }

    pub fn eval(&self, expr: &Expr, ctx: &Context) -> Value {
        match expr {
            Expr::Literal { value } => value.clone(),
            Expr::Array { items } => {
                Value::Array(items.iter().map(|item| self.eval(item, ctx)).collect())
            }
            Expr::Variable(var) => {
                let keys: Vec<Value> = var.accessors.iter().map(|a| self.eval(a, ctx)).collect();
                resolve_variable(&var.name, &keys, ctx)
            }
            Expr::Call(call) => self.eval_call(call, ctx),
            Expr::Not { .. } | Expr::Logical { .. } | Expr::Compare { .. } => {
                Value::Bool(self.eval_condition(expr, ctx))
            }
            Expr::Invalid { source } => {
                tracing::debug!(source = %source, "unparseable expression evaluates to null");
                Value::Null
            }
        }
    }

    /// Evaluate and convert to output text.
    pub fn eval_to_string(&self, expr: &Expr, ctx: &Context) -> String {
        to_output(&self.eval(expr, ctx)).into_owned()
    }

    fn eval_call(&self, call: &CallExpr, ctx: &Context) -> Value {
        let args: Vec<Value> = call.args.iter().map(|a| self.eval(a, ctx)).collect();
        match (call.name.as_str(), args.as_slice()) {
            ("count", [value]) => Value::from(count(value)),
            ("array_key_exists", [key, map]) => Value::Bool(lookup(map, key).is_some()),
            ("old", [key]) => self.session.old(&to_output(key), Value::Null),
            ("old", [key, default]) => self.session.old(&to_output(key), default.clone()),
            (name, args) => match self.functions.call(name, args) {
                Ok(value) => value,
                Err(error) => {
                    tracing::debug!(function = name, %error, "function call failed");
                    Value::Null
                }
            },
        }
    }
}

fn count(value: &Value) -> usize {
    match value {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        _ => 0,
    }
}

/// Convert a value to output text the way PHP casts to string.
///
/// Lists and maps have no text form and produce an empty string.
pub fn to_output(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null | Value::Bool(false) => Cow::Borrowed(""),
        Value::Bool(true) => Cow::Borrowed("1"),
        Value::String(s) => Cow::Borrowed(s),
        Value::Number(n) => match n.as_f64() {
            Some(float) if n.is_f64() => Cow::Owned(format_float(float)),
            _ => Cow::Owned(n.to_string()),
        },
        Value::Array(_) | Value::Object(_) => Cow::Borrowed(""),
    }
}

fn format_float(value: f64) -> String {
    if value == 0.0 {
        // Covers -0.0 as well.
        return "0".to_string();
    }
    format!("{value}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{EmptySession, MemorySession};
    use serde_json::json;
    use stencil_armature::parse_expression;

    fn ctx() -> Context {
        Context::from_value(json!({
            "name": "Ana",
            "user": {"roles": ["admin", "editor"], "id": 7},
            "idx": 1,
            "items": [1, 2, 3],
            "empty": [],
        }))
    }

    fn eval(src: &str) -> Value {
        let functions = FunctionRegistry::with_builtins();
        Evaluator::new(&functions, &EmptySession).eval(&parse_expression(src), &ctx())
    }

    #[test]
    fn test_literals_and_constants() {
        assert_eq!(eval("'hi'"), json!("hi"));
        assert_eq!(eval("42"), json!(42));
        assert_eq!(eval("2.5"), json!(2.5));
        assert_eq!(eval("TRUE"), json!(true));
        assert_eq!(eval("null"), Value::Null);
        assert_eq!(eval("PHP_EOL"), json!("\n"));
        assert_eq!(eval("PHP_INT_MAX"), json!(i64::MAX));
    }

    #[test]
    fn test_array_literal() {
        assert_eq!(eval("[a, 'b, c', 2, 2.5, $name]"), json!(["a", "b, c", 2, 2.5, "Ana"]));
    }

    #[test]
    fn test_variables() {
        assert_eq!(eval("$name"), json!("Ana"));
        assert_eq!(eval("$user['roles'][0]"), json!("admin"));
        assert_eq!(eval("$user['roles'][$idx]"), json!("editor"));
        assert_eq!(eval("$user['missing']['deeper']"), Value::Null);
    }

    #[test]
    fn test_fixed_functions() {
        assert_eq!(eval("count($items)"), json!(3));
        assert_eq!(eval("count($name)"), json!(0));
        assert_eq!(eval("array_key_exists('id', $user)"), json!(true));
        assert_eq!(eval("array_key_exists(5, $items)"), json!(false));
        assert_eq!(eval("array_key_exists(2, $items)"), json!(true));
    }

    #[test]
    fn test_old_input() {
        let functions = FunctionRegistry::with_builtins();
        let session = MemorySession::new().with_old("email", "a@b.c");
        let evaluator = Evaluator::new(&functions, &session);
        let ctx = Context::new();
        assert_eq!(evaluator.eval(&parse_expression("old('email')"), &ctx), json!("a@b.c"));
        assert_eq!(
            evaluator.eval(&parse_expression("old('name', 'Guest')"), &ctx),
            json!("Guest")
        );
        assert_eq!(evaluator.eval(&parse_expression("old('name')"), &ctx), Value::Null);
    }

    #[test]
    fn test_unknown_function_is_null() {
        assert_eq!(eval("system('ls')"), Value::Null);
        assert_eq!(eval("strtoupper()"), Value::Null);
        assert_eq!(eval("strtoupper($name)"), json!("ANA"));
    }

    #[test]
    fn test_conditions_as_values() {
        assert_eq!(eval("$idx == 1"), json!(true));
        assert_eq!(eval("!$empty"), json!(true));
        assert_eq!(eval("$name && $empty"), json!(false));
    }

    #[test]
    fn test_output_conversion() {
        assert_eq!(to_output(&Value::Null), "");
        assert_eq!(to_output(&json!(true)), "1");
        assert_eq!(to_output(&json!(false)), "");
        assert_eq!(to_output(&json!(-12)), "-12");
        assert_eq!(to_output(&json!(2.0)), "2");
        assert_eq!(to_output(&json!(0.25)), "0.25");
        assert_eq!(to_output(&json!(u64::MAX)), "18446744073709551615");
        assert_eq!(to_output(&json!([1])), "");
        assert_eq!(to_output(&json!({"a": 1})), "");
    }
}
