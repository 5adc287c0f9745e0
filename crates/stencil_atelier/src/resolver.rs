//! Variable resolution.
//!
//! `$user['address']['city']` is a base name followed by accessors. Each
//! accessor descends one level into a map (by key) or a list (by index).
//! A miss anywhere along the chain yields null; resolution never fails.

use stencil_relief::Value;

use crate::context::Context;

/// Resolve `name` followed by already-evaluated accessor keys.
pub fn resolve_variable(name: &str, accessors: &[Value], ctx: &Context) -> Value {
    let name = name.strip_prefix('$').unwrap_or(name);
    let Some(mut current) = ctx.get(name) else {
        return Value::Null;
    };
    for key in accessors {
        match lookup(current, key) {
            Some(next) => current = next,
            None => return Value::Null,
        }
    }
    current.clone()
}

/// Descend one level into `value` by `key`.
pub fn lookup<'v>(value: &'v Value, key: &Value) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(key_string(key)?.as_str()),
        Value::Array(items) => items.get(key_index(key)?),
        _ => None,
    }
}

/// Map keys are strings; integers and bools are accepted the way PHP casts
/// array keys.
fn key_string(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => match n.as_i64() {
            Some(int) => Some(int.to_string()),
            None => n.as_f64().map(|f| (f.trunc() as i64).to_string()),
        },
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        Value::Null => Some(String::new()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn key_index(key: &Value) -> Option<usize> {
    match key {
        Value::Number(n) => n.as_u64().and_then(|i| usize::try_from(i).ok()),
        Value::String(s) => s.parse::<usize>().ok(),
        Value::Bool(b) => Some(usize::from(*b)),
        _ => None,
    }
}
