use serde_json::{Number, Value};

/// Recursively turn numeric-looking strings into JSON numbers.
///
/// A string containing `.` is tried as a float, anything else as an integer.
/// Strings that fail to parse are returned unchanged.
pub fn str2num(value: Value) -> Value {
    match value {
        Value::String(s) => parse_number(&s).unwrap_or(Value::String(s)),
        Value::Array(items) => Value::Array(items.into_iter().map(str2num).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, str2num(v))).collect()),
        other => other,
    }
}

/// Parse one CSV cell the way [`str2num`] would.
pub fn coerce_cell(raw: &str) -> Value {
    parse_number(raw).unwrap_or_else(|| Value::String(raw.to_string()))
}

fn parse_number(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.contains('.') {
        let f = trimmed.parse::<f64>().ok()?;
        Number::from_f64(f).map(Value::Number)
    } else {
        trimmed.parse::<i64>().ok().map(Value::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_string() {
        assert_eq!(str2num(json!("3")), json!(3));
    }

    #[test]
    fn test_float_string() {
        assert_eq!(str2num(json!("3.5")), json!(3.5));
    }

    #[test]
    fn test_non_numeric_unchanged() {
        assert_eq!(str2num(json!("abc")), json!("abc"));
        assert_eq!(str2num(json!("1.2.3")), json!("1.2.3"));
        assert_eq!(str2num(json!("")), json!(""));
    }

    #[test]
    fn test_recursive() {
        let input = json!({
            "games": "38",
            "xG": "71.5",
            "team_title": "Arsenal",
            "history": [{"pts": "3"}, ["1", "x"]]
        });
        let expected = json!({
            "games": 38,
            "xG": 71.5,
            "team_title": "Arsenal",
            "history": [{"pts": 3}, [1, "x"]]
        });
        assert_eq!(str2num(input), expected);
    }

    #[test]
    fn test_non_string_scalars_untouched() {
        assert_eq!(str2num(json!(true)), json!(true));
        assert_eq!(str2num(json!(null)), json!(null));
        assert_eq!(str2num(json!(4.25)), json!(4.25));
    }

    #[test]
    fn test_coerce_cell() {
        assert_eq!(coerce_cell("-2"), json!(-2));
        assert_eq!(coerce_cell("Chelsea"), json!("Chelsea"));
    }
}
