//! Template data values.
//!
//! Data flowing through a render is plain JSON with insertion order kept,
//! so `@foreach` over a map visits keys in the order they were written.

pub use serde_json::{Map, Number, Value};

/// Parse a numeric literal: an integer when the text is an exact integer,
/// otherwise a float. Returns `None` for anything that is not a number.
pub fn parse_number(text: &str) -> Option<Value> {
    if let Ok(int) = text.parse::<i64>() {
        return Some(Value::from(int));
    }
    let float = text.parse::<f64>().ok()?;
    if !float.is_finite() {
        return None;
    }
    Number::from_f64(float).map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("42"), Some(Value::from(42)));
        assert_eq!(parse_number("-7"), Some(Value::from(-7)));
        assert_eq!(parse_number("2.5"), Some(Value::from(2.5)));
        assert_eq!(parse_number("1e3"), Some(Value::from(1000.0)));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("inf"), None);
    }
}
