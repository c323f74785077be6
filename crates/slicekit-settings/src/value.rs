//! Typed setting values.
//!
//! Values are persisted as text; numeric settings accept a comma as decimal
//! separator and simple arithmetic such as `0.4*2`.

use slicekit_core::SettingValue;

/// Declared type of a setting
#[derive(Debug, Clone, PartialEq)]
pub enum SettingType {
    Bool,
    Int,
    Float,
    String,
    /// One of a fixed list of options.
    Enum(&'static [&'static str]),
}

/// Parsed setting value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Index into the option list.
    Enum(u16),
    String(String),
}

impl Value {
    /// Numeric view; booleans map to 0/1 and text to `None`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Enum(_) | Value::String(_) => None,
        }
    }
}

impl SettingType {
    /// Parse raw text as this type
    pub fn parse(&self, raw: &str) -> Result<Value, String> {
        match self {
            SettingType::Bool => parse_bool(raw)
                .map(Value::Bool)
                .ok_or_else(|| format!("\"{}\" is not True or False", raw)),
            SettingType::Int => evaluate(raw)
                .filter(|v| v.is_finite())
                .map(|v| Value::Int(v.trunc() as i64))
                .ok_or_else(|| format!("\"{}\" is not a valid whole number or expression", raw)),
            SettingType::Float => evaluate(raw)
                .filter(|v| v.is_finite())
                .map(Value::Float)
                .ok_or_else(|| format!("\"{}\" is not a valid number or expression", raw)),
            SettingType::Enum(options) => options
                .iter()
                .position(|o| *o == raw)
                .or_else(|| options.iter().position(|o| o.eq_ignore_ascii_case(raw)))
                .map(|i| Value::Enum(i as u16))
                .ok_or_else(|| format!("\"{}\" is not one of: {}", raw, options.join(", "))),
            SettingType::String => Ok(Value::String(raw.to_string())),
        }
    }

    /// Event payload for a parsed value
    pub fn to_event_value(&self, value: &Value) -> SettingValue {
        match (self, value) {
            (_, Value::Bool(b)) => SettingValue::Bool(*b),
            (_, Value::Int(i)) => SettingValue::Int(*i),
            (_, Value::Float(f)) => SettingValue::Float(*f),
            (SettingType::Enum(options), Value::Enum(i)) => SettingValue::String(
                options.get(*i as usize).copied().unwrap_or_default().to_string(),
            ),
            (_, Value::Enum(i)) => SettingValue::Int(*i as i64),
            (_, Value::String(s)) => SettingValue::String(s.clone()),
        }
    }
}

/// Accepts the `True`/`False` spelling used in profile files as well as
/// lowercase and `1`/`0`
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "True" | "true" | "1" => Some(true),
        "False" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// Canonical text for a boolean
pub fn format_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Evaluate a number or `+ - * /` expression with parentheses
pub fn evaluate(raw: &str) -> Option<f64> {
    let text = raw.replace(',', ".");
    let mut parser = ExprParser {
        chars: text.chars().filter(|c| !c.is_whitespace()).collect(),
        pos: 0,
    };
    if parser.chars.is_empty() {
        return None;
    }
    let value = parser.expression()?;
    (parser.pos == parser.chars.len()).then_some(value)
}

struct ExprParser {
    chars: Vec<char>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn expression(&mut self) -> Option<f64> {
        let mut value = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Some(value)
    }

    fn term(&mut self) -> Option<f64> {
        let mut value = self.factor()?;
        while let Some(op @ ('*' | '/')) = self.peek() {
            self.pos += 1;
            let rhs = self.factor()?;
            value = if op == '*' { value * rhs } else { value / rhs };
        }
        Some(value)
    }

    fn factor(&mut self) -> Option<f64> {
        match self.peek()? {
            '-' => {
                self.pos += 1;
                self.factor().map(|v| -v)
            }
            '+' => {
                self.pos += 1;
                self.factor()
            }
            '(' => {
                self.pos += 1;
                let value = self.expression()?;
                (self.peek() == Some(')')).then(|| {
                    self.pos += 1;
                    value
                })
            }
            _ => self.number(),
        }
    }

    fn number(&mut self) -> Option<f64> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            let exponent_sign = (c == '-' || c == '+')
                && self.pos > start
                && matches!(self.chars[self.pos - 1], 'e' | 'E');
            if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || exponent_sign {
                self.pos += 1;
            } else {
                break;
            }
        }
        let literal: String = self.chars[start..self.pos].iter().collect();
        literal.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_numbers() {
        assert_eq!(evaluate("0.1"), Some(0.1));
        assert_eq!(evaluate("0,25"), Some(0.25));
        assert_eq!(evaluate(" 45 "), Some(45.0));
        assert_eq!(evaluate("1e-3"), Some(0.001));
        assert_eq!(evaluate("-2"), Some(-2.0));
    }

    #[test]
    fn test_evaluate_expressions() {
        assert_eq!(evaluate("0.4*2"), Some(0.8));
        assert_eq!(evaluate("(1+2)*3"), Some(9.0));
        assert_eq!(evaluate("10/4-1"), Some(1.5));
    }

    #[test]
    fn test_evaluate_rejects_garbage() {
        assert_eq!(evaluate(""), None);
        assert_eq!(evaluate("abc"), None);
        assert_eq!(evaluate("1+"), None);
        assert_eq!(evaluate("(1"), None);
        assert_eq!(evaluate("1 2"), None);
    }

    #[test]
    fn test_parse_types() {
        assert_eq!(SettingType::Bool.parse("True"), Ok(Value::Bool(true)));
        assert_eq!(SettingType::Bool.parse("false"), Ok(Value::Bool(false)));
        assert!(SettingType::Bool.parse("maybe").is_err());

        assert_eq!(SettingType::Int.parse("20"), Ok(Value::Int(20)));
        assert_eq!(SettingType::Int.parse("2.7"), Ok(Value::Int(2)));
        assert!(SettingType::Float.parse("1/0").is_err());

        const SHAPES: &[&str] = &["rectangular", "elliptic"];
        assert_eq!(SettingType::Enum(SHAPES).parse("elliptic"), Ok(Value::Enum(1)));
        assert_eq!(SettingType::Enum(SHAPES).parse("Elliptic"), Ok(Value::Enum(1)));
        assert!(SettingType::Enum(SHAPES).parse("round").is_err());
    }

    #[test]
    fn test_event_value() {
        const FLAVORS: &[&str] = &["RepRap", "UltiGCode"];
        let kind = SettingType::Enum(FLAVORS);
        assert_eq!(
            kind.to_event_value(&Value::Enum(1)),
            SettingValue::String("UltiGCode".to_string())
        );
        assert_eq!(
            SettingType::Float.to_event_value(&Value::Float(0.2)),
            SettingValue::Float(0.2)
        );
    }
}
