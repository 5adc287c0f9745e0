//! Data context threaded through a render.

use stencil_relief::{Map, Value};

/// Names and values visible to template expressions.
///
/// One context is shared by `&mut` across includes and loop bodies, so
/// `@foreach` bindings stay visible to the caller after the loop ends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    vars: Map<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a JSON object. Anything else gives an empty
    /// context.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(vars) => Self { vars },
            _ => Self::default(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }

    pub fn vars(&self) -> &Map<String, Value> {
        &self.vars
    }
}

impl From<Map<String, Value>> for Context {
    fn from(vars: Map<String, Value>) -> Self {
        Self { vars }
    }
}

impl From<Value> for Context {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_keeps_order() {
        let ctx = Context::from_value(json!({"b": 1, "a": 2}));
        let keys: Vec<&String> = ctx.vars().keys().collect();
        assert_eq!(keys, ["b", "a"]);
    }

    #[test]
    fn test_non_object_is_empty() {
        assert_eq!(Context::from_value(json!([1, 2])), Context::new());
    }

    #[test]
    fn test_insert_and_remove() {
        let mut ctx: Context = [("name", "Ana")].into_iter().collect();
        ctx.insert("age", 30);
        assert_eq!(ctx.get("age"), Some(&json!(30)));
        assert_eq!(ctx.remove("name"), Some(json!("Ana")));
        assert!(!ctx.contains("name"));
    }
}
