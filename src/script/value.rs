//! Runtime values for the expression language.

use super::ast::{BaseType, Expr, TypeAnn};
use super::library::Prim;
use std::cmp::Ordering;
use std::rc::Rc;

/// Immutable chain of local bindings, newest first.
#[derive(Debug, Clone, Default)]
pub struct Env(Option<Rc<Frame>>);

#[derive(Debug)]
struct Frame {
    name: String,
    value: Value,
    next: Env,
}

impl Env {
    pub fn bind(&self, name: &str, value: Value) -> Env {
        Env(Some(Rc::new(Frame {
            name: name.to_string(),
            value,
            next: self.clone(),
        })))
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let mut current = &self.0;
        while let Some(frame) = current {
            if frame.name == name {
                return Some(&frame.value);
            }
            current = &frame.next.0;
        }
        None
    }
}

#[derive(Debug)]
pub struct Closure {
    pub param: String,
    pub body: Rc<Expr>,
    pub env: Env,
    /// Set for `let rec` functions, which see themselves under this name.
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    Closure(Rc<Closure>),
    /// A library function and the arguments applied to it so far.
    Prim(Prim, Vec<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Closure(_) | Value::Prim(..) => "function",
        }
    }

    /// Text written to the output for a top-level result. Unit writes nothing;
    /// strings are raw and arrays put one element per line.
    pub fn render(&self) -> Option<String> {
        match self {
            Value::Unit => None,
            Value::Str(s) => Some(s.clone()),
            Value::Array(items) => Some(
                items
                    .iter()
                    .map(|item| match item {
                        Value::Str(s) => s.clone(),
                        other => other.display(),
                    })
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            other => Some(other.display()),
        }
    }

    /// Source-like rendering: strings quoted, arrays bracketed.
    pub fn display(&self) -> String {
        match self {
            Value::Str(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Value::Array(items) => {
                let inner: Vec<String> = items.iter().map(Value::display).collect();
                format!("[{}]", inner.join("; "))
            }
            other => other.plain(),
        }
    }

    /// Conversion used by `string` and `%s`.
    pub fn plain(&self) -> String {
        match self {
            Value::Unit => "()".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => s.clone(),
            Value::Array(_) => self.display(),
            Value::Closure(_) | Value::Prim(..) => "<fun>".to_string(),
        }
    }

    pub fn conforms_to(&self, ty: &TypeAnn) -> bool {
        if ty.depth > 0 {
            let inner = TypeAnn {
                base: ty.base,
                depth: ty.depth - 1,
            };
            return match self {
                Value::Array(items) => items.iter().all(|item| item.conforms_to(&inner)),
                _ => false,
            };
        }
        matches!(
            (self, ty.base),
            (Value::Str(_), BaseType::String)
                | (Value::Int(_), BaseType::Int)
                | (Value::Float(_), BaseType::Float)
                | (Value::Bool(_), BaseType::Bool)
                | (Value::Unit, BaseType::Unit)
        )
    }

    /// Structural equality; `None` when either side is a function.
    pub fn equals(&self, other: &Value) -> Option<bool> {
        Some(match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                if a.len() != b.len() {
                    return Some(false);
                }
                for (x, y) in a.iter().zip(b) {
                    if !x.equals(y)? {
                        return Some(false);
                    }
                }
                true
            }
            (Value::Closure(_) | Value::Prim(..), _) | (_, Value::Closure(_) | Value::Prim(..)) => {
                return None;
            }
            _ => false,
        })
    }

    /// Ordering for numbers, strings and booleans.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Whole floats keep a trailing `.0` so they read as floats.
pub fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}
