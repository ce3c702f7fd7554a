//! Interpreter for parsed template expressions.
//!
//! The only scope an expression can see is the data object handed to
//! [`evaluate`]. There are no functions, assignments or property writes.

use super::expr::{CompareOp, Expr, Literal, LogicalOp};
use super::EvalError;
use serde_json::{Map, Number, Value};

/// Evaluation settings
#[derive(Debug, Clone, Copy, Default)]
pub struct Scope<'a> {
    pub data: Option<&'a Map<String, Value>>,
    /// Missing fields are errors instead of `null`
    pub strict: bool,
}

pub fn evaluate(expr: &Expr, scope: &Scope<'_>) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(lit) => Ok(match lit {
            Literal::Str(s) => Value::String(s.clone()),
            Literal::Num(n) => number(*n),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Null => Value::Null,
        }),
        Expr::Field(path) => lookup(path, scope),
        Expr::Conditional {
            cond,
            then,
            otherwise,
        } => {
            if truthy(&evaluate(cond, scope)?) {
                evaluate(then, scope)
            } else {
                evaluate(otherwise, scope)
            }
        }
        Expr::Concat(lhs, rhs) => {
            let l = evaluate(lhs, scope)?;
            let r = evaluate(rhs, scope)?;
            if let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) {
                return Ok(number(a + b));
            }
            Ok(Value::String(stringify(&l)? + &stringify(&r)?))
        }
        Expr::Not(inner) => Ok(Value::Bool(!truthy(&evaluate(inner, scope)?))),
        Expr::Compare { op, lhs, rhs } => {
            let equal = loosely_equal(&evaluate(lhs, scope)?, &evaluate(rhs, scope)?);
            Ok(Value::Bool(match op {
                CompareOp::Eq => equal,
                CompareOp::Ne => !equal,
            }))
        }
        Expr::Logical { op, lhs, rhs } => {
            let l = evaluate(lhs, scope)?;
            match (op, truthy(&l)) {
                (LogicalOp::Or, true) | (LogicalOp::And, false) => Ok(l),
                _ => evaluate(rhs, scope),
            }
        }
    }
}

fn lookup(path: &[String], scope: &Scope<'_>) -> Result<Value, EvalError> {
    let missing = || {
        if scope.strict {
            Err(EvalError::MissingField(path.join(".")))
        } else {
            Ok(Value::Null)
        }
    };
    let Some((first, rest)) = path.split_first() else {
        return missing();
    };
    let Some(mut current) = scope.data.and_then(|data| data.get(first)) else {
        return missing();
    };
    for segment in rest {
        match current.as_object().and_then(|obj| obj.get(segment)) {
            Some(next) => current = next,
            None => return missing(),
        }
    }
    Ok(current.clone())
}

fn number(n: f64) -> Value {
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

/// JavaScript-style truthiness
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Number(x), Value::String(s)) | (Value::String(s), Value::Number(x)) => {
            s.trim().parse::<f64>().ok() == x.as_f64()
        }
        _ => a == b,
    }
}

/// String form of a value for substitution into markup
pub fn stringify(value: &Value) -> Result<String, EvalError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(format_number(n)),
        Value::Array(_) => Err(EvalError::UnexpectedType("array")),
        Value::Object(_) => Err(EvalError::UnexpectedType("object")),
    }
}

fn format_number(n: &Number) -> String {
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                return format!("{}", f as i64);
            }
        }
    }
    n.to_string()
}
