//! The closed value type shared by the state store and the evaluator.

mod convert;
mod store;

pub use store::*;

use indexmap::IndexMap;
use std::fmt;

/// Insertion-ordered object map.
pub type Map = IndexMap<String, Value>;

/// Every value the state store can hold and an expression can produce.
///
/// `Undefined` is the sentinel for a missing path; it never comes from JSON.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(Map),
}

impl Value {
    /// Create a string value.
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Create an empty object.
    pub fn object() -> Self {
        Value::Object(Map::new())
    }

    /// Name of the variant, as `typeof` would report it.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Truthiness: `false`, `0`, `NaN`, `""`, `null` and `undefined` are falsy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    /// Numeric coercion. Unparsable strings, `undefined` and objects give NaN.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => parse_numeric_str(s),
            Value::Array(items) => match items.as_slice() {
                [] => 0.0,
                [single] => parse_numeric_str(&single.to_string()),
                _ => f64::NAN,
            },
            Value::Object(_) => f64::NAN,
        }
    }

    /// Numeric coercion where a NaN result falls back to zero.
    ///
    /// This is the policy compound assignments use.
    pub fn to_number_or_zero(&self) -> f64 {
        let n = self.to_number();
        if n.is_nan() {
            0.0
        } else {
            n
        }
    }

    /// Stringified form used as an object key or path segment.
    pub fn to_property_key(&self) -> String {
        self.to_string()
    }

    /// Strict equality (`===`). Containers compare structurally.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            _ => self == other,
        }
    }

    /// Loose equality (`==`) with the usual number/string/bool coercions.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
                self.to_number() == other.to_number()
            }
            (Value::Bool(_), _) => Value::Number(self.to_number()).loose_eq(other),
            (_, Value::Bool(_)) => self.loose_eq(&Value::Number(other.to_number())),
            (Value::Array(_) | Value::Object(_), Value::Number(_) | Value::String(_)) => {
                Value::String(self.to_string()).loose_eq(other)
            }
            (Value::Number(_) | Value::String(_), Value::Array(_) | Value::Object(_)) => {
                self.loose_eq(&Value::String(other.to_string()))
            }
            _ => self.strict_eq(other),
        }
    }

    /// Equality used to detect no-op writes: like `===` but NaN equals NaN.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_value(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).map(|w| v.same_value(w)).unwrap_or(false))
            }
            _ => self == other,
        }
    }

    /// Borrow a child of an object (by key) or array (by index).
    pub fn member_ref(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            Value::Array(items) => parse_index(key).and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Read a member, including the synthetic `length` of strings and arrays.
    pub fn member(&self, key: &str) -> Value {
        match self {
            Value::Array(items) if key == "length" => Value::Number(items.len() as f64),
            Value::String(s) if key == "length" => Value::Number(s.chars().count() as f64),
            Value::String(s) => parse_index(key)
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or(Value::Undefined),
            _ => self.member_ref(key).cloned().unwrap_or(Value::Undefined),
        }
    }
}

/// Parse a canonical non-negative array index (`"0"`, `"12"`, not `"01"`).
pub(crate) fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || (segment.len() > 1 && segment.starts_with('0')) {
        return None;
    }
    if !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

/// String to number the way the expression language does it.
fn parse_numeric_str(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16)
            .map(|n| n as f64)
            .unwrap_or(f64::NAN);
    }
    // Rust accepts "inf" and "nan" spellings that the language does not.
    let numeric_chars = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !numeric_chars {
        return f64::NAN;
    }
    trimmed.parse().unwrap_or(f64::NAN)
}

/// Format a number the way it is shown to readers: `15`, not `15.0`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n == 0.0 {
        // Covers -0 as well.
        "0".to_string()
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    if !item.is_nullish() {
                        write!(f, "{}", item)?;
                    }
                }
                Ok(())
            }
            Value::Object(_) => write!(f, "[object Object]"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Undefined.truthy());
        assert!(!Value::Null.truthy());
        assert!(!Value::Number(0.0).truthy());
        assert!(!Value::Number(f64::NAN).truthy());
        assert!(!Value::string("").truthy());
        assert!(Value::string("0").truthy());
        assert!(Value::Array(vec![]).truthy());
        assert!(Value::object().truthy());
    }

    #[test]
    fn test_to_number() {
        assert_eq!(Value::Null.to_number(), 0.0);
        assert_eq!(Value::Bool(true).to_number(), 1.0);
        assert_eq!(Value::string("  42 ").to_number(), 42.0);
        assert_eq!(Value::string("").to_number(), 0.0);
        assert_eq!(Value::string("0x10").to_number(), 16.0);
        assert_eq!(Value::string("-Infinity").to_number(), f64::NEG_INFINITY);
        assert!(Value::string("inf").to_number().is_nan());
        assert!(Value::string("ten").to_number().is_nan());
        assert!(Value::Undefined.to_number().is_nan());
        assert_eq!(Value::Array(vec![Value::string("7")]).to_number(), 7.0);
    }

    #[test]
    fn test_to_number_or_zero() {
        assert_eq!(Value::string("sword").to_number_or_zero(), 0.0);
        assert_eq!(Value::Undefined.to_number_or_zero(), 0.0);
        assert_eq!(Value::string("3").to_number_or_zero(), 3.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Number(15.0).to_string(), "15");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Number(-0.0).to_string(), "0");
        assert_eq!(Value::Number(f64::INFINITY).to_string(), "Infinity");
        assert_eq!(
            Value::Array(vec![1.into(), Value::Null, "x".into()]).to_string(),
            "1,,x"
        );
        assert_eq!(Value::object().to_string(), "[object Object]");
        assert_eq!(Value::Undefined.to_string(), "undefined");
    }

    #[test]
    fn test_equality() {
        assert!(Value::Number(1.0).loose_eq(&Value::string("1")));
        assert!(!Value::Number(1.0).strict_eq(&Value::string("1")));
        assert!(Value::Null.loose_eq(&Value::Undefined));
        assert!(!Value::Null.strict_eq(&Value::Undefined));
        assert!(!Value::Null.loose_eq(&Value::Number(0.0)));
        assert!(Value::Bool(true).loose_eq(&Value::Number(1.0)));
        assert!(!Value::Number(f64::NAN).strict_eq(&Value::Number(f64::NAN)));
        assert!(Value::Number(f64::NAN).same_value(&Value::Number(f64::NAN)));
    }

    #[test]
    fn test_member_access() {
        let mut map = Map::new();
        map.insert("gold".to_string(), 10.into());
        let obj = Value::Object(map);

        assert_eq!(obj.member("gold"), Value::Number(10.0));
        assert_eq!(obj.member("silver"), Value::Undefined);

        let list = Value::Array(vec!["a".into(), "b".into()]);
        assert_eq!(list.member("1"), Value::string("b"));
        assert_eq!(list.member("length"), Value::Number(2.0));
        assert_eq!(list.member("01"), Value::Undefined);

        assert_eq!(Value::string("héro").member("length"), Value::Number(4.0));
        assert_eq!(Value::Number(3.0).member("x"), Value::Undefined);
    }
}
