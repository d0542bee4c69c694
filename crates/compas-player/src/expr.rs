//! Trigger argument expressions.
//!
//! Trigger descriptions carry their arguments as expression strings,
//! evaluated when the trigger fires. The evaluator is deliberately small:
//! literals (numbers, `'strings'`, booleans, null, `[beats, rem]`
//! timestamps), environment variable reads, the meta value `$` (the
//! argument of the event that caused a bind expansion), `rand`, unary
//! minus and the four arithmetic operators.
//!
//! Evaluation is pure except that `rand` advances the channel's random
//! state deterministically; the environment is read, never written.

use std::collections::HashMap;

use compas_core::position::PatInstRef;
use compas_core::random::Random;
use compas_core::tstamp::{BEAT_UNITS, Tstamp};
use compas_core::value::{Value, ValueType};
use compas_module::EnvVars;

/// Runtime copy of the module's environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvState {
    vars: HashMap<String, Value>,
}

impl EnvState {
    /// Creates runtime state from the module's declarations.
    pub fn new(decls: &EnvVars) -> Self {
        Self {
            vars: decls
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }

    /// Resets all variables to their declared initial values.
    pub fn reset(&mut self, decls: &EnvVars) {
        *self = Self::new(decls);
    }

    /// Reads a variable.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }
}

/// Evaluates an expression string.
pub fn evaluate(
    expr: &str,
    env: &EnvState,
    meta: Option<&Value>,
    rand: &mut Random,
) -> Result<Value, String> {
    let mut parser = Parser {
        chars: expr.chars().collect(),
        pos: 0,
        env,
        meta,
        rand,
    };
    let value = parser.parse_expr()?;
    parser.skip_ws();
    if parser.pos < parser.chars.len() {
        return Err(format!("trailing input at offset {}", parser.pos));
    }
    Ok(value)
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    env: &'a EnvState,
    meta: Option<&'a Value>,
    rand: &'a mut Random,
}

impl Parser<'_> {
    fn skip_ws(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, expected: char) -> Result<(), String> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(format!("expected `{expected}` at offset {}", self.pos))
        }
    }

    fn parse_expr(&mut self) -> Result<Value, String> {
        let mut acc = self.parse_term()?;
        loop {
            match self.peek() {
                Some('+') => {
                    self.pos += 1;
                    let rhs = self.parse_term()?;
                    acc = numeric_op(&acc, &rhs, |a, b| a + b, |a, b| a.checked_add(b))?;
                }
                Some('-') => {
                    self.pos += 1;
                    let rhs = self.parse_term()?;
                    acc = numeric_op(&acc, &rhs, |a, b| a - b, |a, b| a.checked_sub(b))?;
                }
                _ => return Ok(acc),
            }
        }
    }

    fn parse_term(&mut self) -> Result<Value, String> {
        let mut acc = self.parse_factor()?;
        loop {
            match self.peek() {
                Some('*') => {
                    self.pos += 1;
                    let rhs = self.parse_factor()?;
                    acc = numeric_op(&acc, &rhs, |a, b| a * b, |a, b| a.checked_mul(b))?;
                }
                Some('/') => {
                    self.pos += 1;
                    let rhs = self.parse_factor()?;
                    let a = as_float(&acc)?;
                    let b = as_float(&rhs)?;
                    if b == 0.0 {
                        return Err("division by zero".into());
                    }
                    acc = Value::Float(a / b);
                }
                _ => return Ok(acc),
            }
        }
    }

    fn parse_factor(&mut self) -> Result<Value, String> {
        if self.peek() == Some('-') {
            self.pos += 1;
            let inner = self.parse_factor()?;
            return match inner {
                Value::Int(i) => Ok(Value::Int(-i)),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(format!("cannot negate {:?}", other.value_type())),
            };
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Value, String> {
        match self.peek() {
            None => Err("unexpected end of expression".into()),
            Some('(') => {
                self.pos += 1;
                let inner = self.parse_expr()?;
                self.eat(')')?;
                Ok(inner)
            }
            Some('[') => self.parse_tstamp(),
            Some('\'') => self.parse_string(),
            Some('$') => {
                self.pos += 1;
                self.meta
                    .cloned()
                    .ok_or_else(|| "no meta value in this context".into())
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.parse_number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.parse_ident(),
            Some(c) => Err(format!("unexpected character `{c}`")),
        }
    }

    fn parse_tstamp(&mut self) -> Result<Value, String> {
        self.eat('[')?;
        let beats = self.parse_expr()?;
        self.eat(',')?;
        let rem = self.parse_expr()?;
        self.eat(']')?;

        match (beats, rem) {
            (Value::Int(beats), Value::Int(rem)) if (0..i64::from(BEAT_UNITS)).contains(&rem) => {
                Ok(Value::Tstamp(Tstamp::new(beats, rem as i32)))
            }
            _ => Err("timestamp components must be integers with a valid remainder".into()),
        }
    }

    fn parse_string(&mut self) -> Result<Value, String> {
        self.eat('\'')?;
        let mut out = String::new();
        while let Some(&c) = self.chars.get(self.pos) {
            self.pos += 1;
            if c == '\'' {
                return Ok(Value::String(out));
            }
            out.push(c);
        }
        Err("unterminated string".into())
    }

    fn parse_number(&mut self) -> Result<Value, String> {
        self.skip_ws();
        let start = self.pos;
        let mut is_float = false;
        while let Some(&c) = self.chars.get(self.pos) {
            if c.is_ascii_digit() {
                self.pos += 1;
            } else if c == '.' || c == 'e' || c == 'E' {
                is_float = true;
                self.pos += 1;
                // Allow an exponent sign directly after e/E.
                if (c == 'e' || c == 'E')
                    && matches!(self.chars.get(self.pos).copied(), Some('+' | '-'))
                {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        if is_float {
            text.parse::<f64>()
                .map(Value::Float)
                .map_err(|_| format!("bad number `{text}`"))
        } else {
            text.parse::<i64>()
                .map(Value::Int)
                .map_err(|_| format!("bad number `{text}`"))
        }
    }

    fn parse_ident(&mut self) -> Result<Value, String> {
        self.skip_ws();
        let start = self.pos;
        while let Some(&c) = self.chars.get(self.pos) {
            if c.is_alphanumeric() || c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let name: String = self.chars[start..self.pos].iter().collect();

        match name.as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            "null" => Ok(Value::None),
            "rand" => Ok(Value::Float(self.rand.next_f64())),
            _ => self
                .env
                .get(&name)
                .cloned()
                .ok_or_else(|| format!("undefined variable `{name}`")),
        }
    }
}

fn as_float(value: &Value) -> Result<f64, String> {
    match value {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        other => Err(format!("expected a number, got {:?}", other.value_type())),
    }
}

fn numeric_op(
    a: &Value,
    b: &Value,
    float_op: impl Fn(f64, f64) -> f64,
    int_op: impl Fn(i64, i64) -> Option<i64>,
) -> Result<Value, String> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => int_op(*x, *y)
            .map(Value::Int)
            .ok_or_else(|| "integer overflow".into()),
        _ => Ok(Value::Float(float_op(as_float(a)?, as_float(b)?))),
    }
}

/// Converts a JSON value to a typed [`Value`] according to the declared
/// parameter type. Used when parsing externally fired events.
pub fn value_from_json(json: &serde_json::Value, declared: ValueType) -> Result<Value, String> {
    use serde_json::Value as J;

    let realtime = |json: &J| -> Result<Value, String> {
        match json {
            J::Bool(b) => Ok(Value::Bool(*b)),
            J::Number(n) if n.is_i64() => Ok(Value::Int(n.as_i64().unwrap_or(0))),
            J::Number(n) => Ok(Value::Float(n.as_f64().unwrap_or(0.0))),
            J::Array(parts) => parse_tstamp_json(parts),
            other => Err(format!("not a realtime value: {other}")),
        }
    };

    match declared {
        ValueType::None => match json {
            J::Null => Ok(Value::None),
            other => Err(format!("expected null, got {other}")),
        },
        ValueType::Bool => match json {
            J::Bool(b) => Ok(Value::Bool(*b)),
            other => Err(format!("expected bool, got {other}")),
        },
        ValueType::Int => json
            .as_i64()
            .map(Value::Int)
            .ok_or_else(|| format!("expected int, got {json}")),
        ValueType::Float => json
            .as_f64()
            .map(Value::Float)
            .ok_or_else(|| format!("expected float, got {json}")),
        ValueType::Tstamp => match json {
            J::Array(parts) => parse_tstamp_json(parts),
            other => Err(format!("expected [beats, rem], got {other}")),
        },
        ValueType::String => match json {
            J::String(s) => Ok(Value::String(s.clone())),
            other => Err(format!("expected string, got {other}")),
        },
        ValueType::PatInstRef => match json {
            J::Array(parts) if parts.len() == 2 => {
                let pat = parts[0].as_i64().ok_or("bad pattern index")?;
                let inst = parts[1].as_i64().ok_or("bad instance index")?;
                Ok(Value::PatInstRef(PatInstRef::new(pat as i32, inst as i32)))
            }
            other => Err(format!("expected [pat, inst], got {other}")),
        },
        ValueType::Realtime => realtime(json),
        ValueType::MaybeString => match json {
            J::Null => Ok(Value::None),
            J::String(s) => Ok(Value::String(s.clone())),
            other => Err(format!("expected string or null, got {other}")),
        },
        ValueType::MaybeRealtime => match json {
            J::Null => Ok(Value::None),
            other => realtime(other),
        },
    }
}

fn parse_tstamp_json(parts: &[serde_json::Value]) -> Result<Value, String> {
    if parts.len() != 2 {
        return Err("timestamp needs two components".into());
    }
    let beats = parts[0].as_i64().ok_or("bad beat count")?;
    let rem = parts[1].as_i64().ok_or("bad remainder")?;
    if !(0..i64::from(BEAT_UNITS)).contains(&rem) {
        return Err("remainder out of range".into());
    }
    Ok(Value::Tstamp(Tstamp::new(beats, rem as i32)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &str) -> Result<Value, String> {
        let env = EnvState::default();
        let mut rand = Random::new(1);
        evaluate(expr, &env, None, &mut rand)
    }

    #[test]
    fn test_literals() {
        assert_eq!(eval("42"), Ok(Value::Int(42)));
        assert_eq!(eval("-3.5"), Ok(Value::Float(-3.5)));
        assert_eq!(eval("true"), Ok(Value::Bool(true)));
        assert_eq!(eval("null"), Ok(Value::None));
        assert_eq!(eval("'hi'"), Ok(Value::String("hi".into())));
        assert_eq!(eval("[1, 0]"), Ok(Value::Tstamp(Tstamp::new(1, 0))));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("2 + 3 * 4"), Ok(Value::Int(14)));
        assert_eq!(eval("(2 + 3) * 4"), Ok(Value::Int(20)));
        assert_eq!(eval("1 / 2"), Ok(Value::Float(0.5)));
        assert_eq!(eval("1.5 + 1"), Ok(Value::Float(2.5)));
    }

    #[test]
    fn test_env_lookup() {
        let mut decls = EnvVars::new();
        decls.declare("base", Value::Int(7));
        let env = EnvState::new(&decls);
        let mut rand = Random::new(1);

        assert_eq!(
            evaluate("base + 1", &env, None, &mut rand),
            Ok(Value::Int(8))
        );
        assert!(evaluate("missing", &env, None, &mut rand).is_err());
    }

    #[test]
    fn test_meta() {
        let env = EnvState::default();
        let mut rand = Random::new(1);
        let meta = Value::Float(2.0);

        assert_eq!(
            evaluate("$ * 2", &env, Some(&meta), &mut rand),
            Ok(Value::Float(4.0))
        );
        assert!(evaluate("$", &env, None, &mut rand).is_err());
    }

    #[test]
    fn test_rand_deterministic() {
        let env = EnvState::default();
        let mut r1 = Random::new(9);
        let mut r2 = Random::new(9);

        assert_eq!(
            evaluate("rand", &env, None, &mut r1),
            evaluate("rand", &env, None, &mut r2)
        );
    }

    #[test]
    fn test_errors() {
        assert!(eval("1 +").is_err());
        assert!(eval("1 / 0").is_err());
        assert!(eval("'open").is_err());
        assert!(eval("2 2").is_err());
    }

    #[test]
    fn test_value_from_json() {
        use serde_json::json;

        assert_eq!(
            value_from_json(&json!(1.5), ValueType::Float),
            Ok(Value::Float(1.5))
        );
        assert_eq!(
            value_from_json(&json!([2, 0]), ValueType::Tstamp),
            Ok(Value::Tstamp(Tstamp::new(2, 0)))
        );
        assert_eq!(
            value_from_json(&json!(null), ValueType::MaybeString),
            Ok(Value::None)
        );
        assert!(value_from_json(&json!("x"), ValueType::Int).is_err());
    }
}
