//! Host functions callable from template expressions.
//!
//! Only names registered here can be called. The registry is built once
//! when the renderer is constructed; hosts can add their own functions on
//! top of the builtins.

use std::fmt;

use stencil_carton::{FxHashMap, String};
use stencil_relief::Value;

use crate::{condition::loose_eq, expression::to_output};

/// Failure raised by a host function.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FunctionError {
    #[error("unknown function `{0}`")]
    Unknown(String),

    #[error("`{name}` expects {expected} argument(s), got {got}")]
    Arity {
        name: &'static str,
        expected: &'static str,
        got: usize,
    },

    #[error("`{name}`: {message}")]
    Invalid {
        name: &'static str,
        message: std::string::String,
    },
}

pub type FunctionResult = Result<Value, FunctionError>;

type HostFunction = Box<dyn Fn(&[Value]) -> FunctionResult>;

/// Allow-list of callable functions.
pub struct FunctionRegistry {
    functions: FxHashMap<String, HostFunction>,
}

impl FunctionRegistry {
    /// A registry with no functions at all.
    pub fn empty() -> Self {
        Self {
            functions: FxHashMap::default(),
        }
    }

    /// A registry holding the builtin string and array helpers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("strtoupper", strtoupper);
        registry.register("strtolower", strtolower);
        registry.register("ucfirst", ucfirst);
        registry.register("trim", trim);
        registry.register("strlen", strlen);
        registry.register("implode", implode);
        registry.register("in_array", in_array);
        registry.register("json_encode", json_encode);
        registry.register("number_format", number_format);
        registry
    }

    /// Register or replace a function.
    pub fn register<F>(&mut self, name: &str, function: F)
    where
        F: Fn(&[Value]) -> FunctionResult + 'static,
    {
        self.functions.insert(String::from(name), Box::new(function));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn call(&self, name: &str, args: &[Value]) -> FunctionResult {
        match self.functions.get(name) {
            Some(function) => function(args),
            None => Err(FunctionError::Unknown(String::from(name))),
        }
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.functions.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}

fn expect_args<'a>(
    name: &'static str,
    expected: &'static str,
    args: &'a [Value],
    range: std::ops::RangeInclusive<usize>,
) -> Result<&'a [Value], FunctionError> {
    if range.contains(&args.len()) {
        Ok(args)
    } else {
        Err(FunctionError::Arity {
            name,
            expected,
            got: args.len(),
        })
    }
}

fn strtoupper(args: &[Value]) -> FunctionResult {
    let args = expect_args("strtoupper", "1", args, 1..=1)?;
    Ok(Value::from(to_output(&args[0]).to_uppercase()))
}

fn strtolower(args: &[Value]) -> FunctionResult {
    let args = expect_args("strtolower", "1", args, 1..=1)?;
    Ok(Value::from(to_output(&args[0]).to_lowercase()))
}

fn ucfirst(args: &[Value]) -> FunctionResult {
    let args = expect_args("ucfirst", "1", args, 1..=1)?;
    let text = to_output(&args[0]);
    let mut chars = text.chars();
    let result = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => std::string::String::new(),
    };
    Ok(Value::from(result))
}

fn trim(args: &[Value]) -> FunctionResult {
    let args = expect_args("trim", "1 or 2", args, 1..=2)?;
    let text = to_output(&args[0]);
    let trimmed = match args.get(1) {
        Some(chars) => {
            let chars = to_output(chars);
            text.trim_matches(|c: char| chars.contains(c)).to_string()
        }
        None => text.trim().to_string(),
    };
    Ok(Value::from(trimmed))
}

/// Length in bytes.
fn strlen(args: &[Value]) -> FunctionResult {
    let args = expect_args("strlen", "1", args, 1..=1)?;
    Ok(Value::from(to_output(&args[0]).len()))
}

/// `implode(separator, list)`, or `implode(list)` with an empty separator.
fn implode(args: &[Value]) -> FunctionResult {
    let (separator, pieces) = match args {
        [pieces] => (std::string::String::new(), pieces),
        [separator, pieces] => (to_output(separator).into_owned(), pieces),
        _ => {
            return Err(FunctionError::Arity {
                name: "implode",
                expected: "1 or 2",
                got: args.len(),
            })
        }
    };
    let parts: Vec<std::string::String> = match pieces {
        Value::Array(items) => items.iter().map(|v| to_output(v).into_owned()).collect(),
        Value::Object(map) => map.values().map(|v| to_output(v).into_owned()).collect(),
        _ => {
            return Err(FunctionError::Invalid {
                name: "implode",
                message: "argument must be a list or map".into(),
            })
        }
    };
    Ok(Value::from(parts.join(&separator)))
}

/// `in_array(needle, haystack)` with loose comparison.
fn in_array(args: &[Value]) -> FunctionResult {
    let args = expect_args("in_array", "2", args, 2..=2)?;
    let needle = &args[0];
    let found = match &args[1] {
        Value::Array(items) => items.iter().any(|v| loose_eq(v, needle)),
        Value::Object(map) => map.values().any(|v| loose_eq(v, needle)),
        _ => {
            return Err(FunctionError::Invalid {
                name: "in_array",
                message: "haystack must be a list or map".into(),
            })
        }
    };
    Ok(Value::Bool(found))
}

fn json_encode(args: &[Value]) -> FunctionResult {
    let args = expect_args("json_encode", "1", args, 1..=1)?;
    serde_json::to_string(&args[0])
        .map(Value::from)
        .map_err(|e| FunctionError::Invalid {
            name: "json_encode",
            message: e.to_string(),
        })
}

/// `number_format(number[, decimals])` with `,` thousands and `.` decimal
/// separators. Halves round away from zero.
fn number_format(args: &[Value]) -> FunctionResult {
    let args = expect_args("number_format", "1 or 2", args, 1..=2)?;
    let number = crate::condition::to_number(&args[0]).unwrap_or(0.0);
    let decimals = match args.get(1) {
        Some(d) => crate::condition::to_number(d).unwrap_or(0.0).max(0.0) as usize,
        None => 0,
    }
    .min(15);

    let scaled = (number.abs() * 10f64.powi(decimals as i32)).round();
    let mut digits = format!("{scaled:.0}");
    if digits.len() <= decimals {
        digits = format!("{}{digits}", "0".repeat(decimals + 1 - digits.len()));
    }
    let (int_part, frac_part) = digits.split_at(digits.len() - decimals);

    let mut out = std::string::String::with_capacity(digits.len() + digits.len() / 3 + 2);
    if number < 0.0 && scaled != 0.0 {
        out.push('-');
    }
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if decimals > 0 {
        out.push('.');
        out.push_str(frac_part);
    }
    Ok(Value::from(out))
}
