//! Condition evaluation and value comparison.
//!
//! Truthiness, numeric detection and the two equality flavours follow the
//! PHP 8 rules that template authors expect:
//!
//! - falsy: null, `""`, integer `0`, `false`, empty list or map
//! - `===` compares type and value, `==` coerces
//! - ordering is numeric when both sides look numeric, byte-wise otherwise

use std::cmp::Ordering;

use stencil_relief::{CompareOp, Expr, LogicalOp, Value};

use crate::{context::Context, expression::to_output, Evaluator};

/// Whether a value counts as true in a condition.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => match n.as_i64() {
            Some(int) => int != 0,
            None => n.as_u64().map_or(true, |u| u != 0),
        },
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Numbers, and strings holding a decimal or exponent number.
pub fn is_numeric(value: &Value) -> bool {
    to_number(value).is_some()
}

/// The numeric value of a numeric-like value.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_numeric_str(s),
        _ => None,
    }
}

fn parse_numeric_str(s: &str) -> Option<f64> {
    let s = s.trim_start().trim_end();
    if s.is_empty()
        || !s.bytes().any(|b| b.is_ascii_digit())
        || !s
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
    {
        return None;
    }
    s.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// `===`: same type and same value. Lists and maps compare deeply.
pub fn strict_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            let a_float = a.is_f64();
            if a_float != b.is_f64() {
                return false;
            }
            if a_float {
                a.as_f64() == b.as_f64()
            } else {
                a.as_i64() == b.as_i64() && a.as_u64() == b.as_u64()
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| strict_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b)
                    .all(|((ka, va), (kb, vb))| ka == kb && strict_eq(va, vb))
        }
        _ => left == right,
    }
}

/// `==`: numeric when both sides look numeric, then bool and null
/// coercion, then deep or string comparison.
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    if let (Some(a), Some(b)) = (to_number(left), to_number(right)) {
        return a == b;
    }
    match (left, right) {
        (Value::Bool(b), other) | (other, Value::Bool(b)) => *b == is_truthy(other),
        (Value::Null, other) | (other, Value::Null) => !is_truthy(other),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| loose_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| loose_eq(v, other)))
        }
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => false,
        _ => to_output(left) == to_output(right),
    }
}

/// Ordering used by `<`, `<=`, `>` and `>=`.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (to_number(left), to_number(right)) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => to_output(left).as_bytes().cmp(to_output(right).as_bytes()),
    }
}

/// Apply a comparison operator.
pub fn compare(op: CompareOp, left: &Value, right: &Value) -> bool {
    match op {
        CompareOp::StrictEq => strict_eq(left, right),
        CompareOp::StrictNe => !strict_eq(left, right),
        CompareOp::Eq => loose_eq(left, right),
        CompareOp::Ne => !loose_eq(left, right),
        CompareOp::Lt => compare_values(left, right) == Ordering::Less,
        CompareOp::Le => compare_values(left, right) != Ordering::Greater,
        CompareOp::Gt => compare_values(left, right) == Ordering::Greater,
        CompareOp::Ge => compare_values(left, right) != Ordering::Less,
    }
}

impl Evaluator<'_> {
    /// Evaluate an expression as a condition.
    ///
    /// `||` and `&&` short-circuit. Anything that is not a logical or
    /// comparison node is evaluated and truthy-checked; unparseable source
    /// is false.
    pub fn eval_condition(&self, expr: &Expr, ctx: &Context) -> bool {
        match expr {
            Expr::Logical { op, left, right } => match op {
                LogicalOp::Or => self.eval_condition(left, ctx) || self.eval_condition(right, ctx),
                LogicalOp::And => {
                    self.eval_condition(left, ctx) && self.eval_condition(right, ctx)
                }
            },
            Expr::Not { operand } => !self.eval_condition(operand, ctx),
            Expr::Compare { op, left, right } => {
                compare(*op, &self.eval(left, ctx), &self.eval(right, ctx))
            }
            Expr::Invalid { .. } => false,
            _ => is_truthy(&self.eval(expr, ctx)),
        }
    }
}
