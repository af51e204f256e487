//! Functions available in every evaluation.

use super::ScriptError;
use super::ast::BinOp;
use super::eval::{self, Machine};
use super::value::Value;
use crate::sink::Sink;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prim {
    StringLength,
    StringToUpper,
    StringToLower,
    StringTrim,
    StringSplit,
    StringConcat,
    StringContains,
    StringStartsWith,
    StringReplace,
    ArrayLength,
    ArrayMap,
    ArrayFilter,
    ArrayRev,
    ArraySort,
    ArrayHead,
    ArraySum,
    ArrayFold,
    ArrayIter,
    ToString,
    ToInt,
    ToFloat,
    Not,
    Printfn,
    Sprintf,
    /// An operator used as a function, such as `(+)`.
    Op(BinOp),
}

const NAMES: [(&str, Prim); 24] = [
    ("String.length", Prim::StringLength),
    ("String.toUpper", Prim::StringToUpper),
    ("String.toLower", Prim::StringToLower),
    ("String.trim", Prim::StringTrim),
    ("String.split", Prim::StringSplit),
    ("String.concat", Prim::StringConcat),
    ("String.contains", Prim::StringContains),
    ("String.startsWith", Prim::StringStartsWith),
    ("String.replace", Prim::StringReplace),
    ("Array.length", Prim::ArrayLength),
    ("Array.map", Prim::ArrayMap),
    ("Array.filter", Prim::ArrayFilter),
    ("Array.rev", Prim::ArrayRev),
    ("Array.sort", Prim::ArraySort),
    ("Array.head", Prim::ArrayHead),
    ("Array.sum", Prim::ArraySum),
    ("Array.fold", Prim::ArrayFold),
    ("Array.iter", Prim::ArrayIter),
    ("string", Prim::ToString),
    ("int", Prim::ToInt),
    ("float", Prim::ToFloat),
    ("not", Prim::Not),
    ("printfn", Prim::Printfn),
    ("sprintf", Prim::Sprintf),
];

pub fn lookup(name: &str) -> Option<Prim> {
    NAMES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, p)| *p)
        .or_else(|| BinOp::from_section(name).map(Prim::Op))
}

impl Prim {
    pub fn name(self) -> &'static str {
        if let Prim::Op(op) = self {
            return op.symbol();
        }
        NAMES
            .iter()
            .find(|(_, p)| *p == self)
            .map(|(n, _)| *n)
            .unwrap_or("<prim>")
    }

    /// Number of arguments needed before the call happens. Formatting
    /// functions take one more argument per placeholder in the format.
    pub fn arity(self, args: &[Value]) -> usize {
        match self {
            Prim::Printfn | Prim::Sprintf => match args.first() {
                Some(Value::Str(format)) => 1 + placeholders(format),
                _ => 1,
            },
            Prim::StringSplit
            | Prim::StringConcat
            | Prim::StringContains
            | Prim::StringStartsWith
            | Prim::ArrayMap
            | Prim::ArrayFilter
            | Prim::ArrayIter
            | Prim::Op(_) => 2,
            Prim::StringReplace | Prim::ArrayFold => 3,
            _ => 1,
        }
    }
}

fn type_error(prim: Prim, expected: &str, got: &Value) -> ScriptError {
    ScriptError::Type(format!(
        "{} expected {} but got {}",
        prim.name(),
        expected,
        got.type_name()
    ))
}

fn string_arg(prim: Prim, value: &Value) -> Result<String, ScriptError> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        other => Err(type_error(prim, "a string", other)),
    }
}

fn array_arg(prim: Prim, value: Value) -> Result<Vec<Value>, ScriptError> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(type_error(prim, "an array", &other)),
    }
}

fn placeholders(format: &str) -> usize {
    let mut count = 0;
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c == '%' {
            match chars.next() {
                Some('s' | 'd' | 'i' | 'f' | 'A') => count += 1,
                _ => {}
            }
        }
    }
    count
}

fn format_with(format: &str, args: &[Value]) -> Result<String, ScriptError> {
    let mut text = String::new();
    let mut args = args.iter();
    let mut chars = format.chars();
    let mut next_arg = || {
        args.next()
            .ok_or_else(|| ScriptError::Runtime("missing format argument".to_string()))
    };
    while let Some(c) = chars.next() {
        if c != '%' {
            text.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => match next_arg()? {
                Value::Str(s) => text.push_str(s),
                other => return Err(type_error(Prim::Sprintf, "a string for %s", other)),
            },
            Some('d' | 'i') => match next_arg()? {
                Value::Int(n) => text.push_str(&n.to_string()),
                other => return Err(type_error(Prim::Sprintf, "an int for %d", other)),
            },
            Some('f') => match next_arg()? {
                Value::Float(f) => text.push_str(&format!("{:.6}", f)),
                Value::Int(n) => text.push_str(&format!("{:.6}", *n as f64)),
                other => return Err(type_error(Prim::Sprintf, "a float for %f", other)),
            },
            Some('A') => text.push_str(&next_arg()?.display()),
            Some('%') => text.push('%'),
            Some(other) => {
                text.push('%');
                text.push(other);
            }
            None => text.push('%'),
        }
    }
    Ok(text)
}

fn sort_values(prim: Prim, items: &mut [Value]) -> Result<(), ScriptError> {
    let mut failed = None;
    items.sort_by(|a, b| {
        a.compare(b).unwrap_or_else(|| {
            failed.get_or_insert_with(|| a.type_name());
            Ordering::Equal
        })
    });
    match failed {
        Some(name) => Err(ScriptError::Type(format!(
            "{} cannot order values of type {}",
            prim.name(),
            name
        ))),
        None => Ok(()),
    }
}

/// Run `prim` with exactly `prim.arity(&args)` arguments.
pub fn call(
    machine: &mut Machine,
    prim: Prim,
    mut args: Vec<Value>,
    out: &mut dyn Sink,
) -> Result<Value, ScriptError> {
    let last = args.pop().unwrap_or(Value::Unit);
    match prim {
        Prim::StringLength => Ok(Value::Int(string_arg(prim, &last)?.chars().count() as i64)),
        Prim::StringToUpper => Ok(Value::Str(string_arg(prim, &last)?.to_uppercase())),
        Prim::StringToLower => Ok(Value::Str(string_arg(prim, &last)?.to_lowercase())),
        Prim::StringTrim => Ok(Value::Str(string_arg(prim, &last)?.trim().to_string())),
        Prim::StringSplit => {
            let sep = string_arg(prim, &args[0])?;
            let text = string_arg(prim, &last)?;
            if sep.is_empty() {
                return Err(ScriptError::Runtime(
                    "String.split separator must not be empty".to_string(),
                ));
            }
            Ok(Value::Array(
                text.split(sep.as_str())
                    .map(|part| Value::Str(part.to_string()))
                    .collect(),
            ))
        }
        Prim::StringConcat => {
            let sep = string_arg(prim, &args[0])?;
            let parts = array_arg(prim, last)?
                .iter()
                .map(|v| string_arg(prim, v))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Str(parts.join(&sep)))
        }
        Prim::StringContains => {
            let needle = string_arg(prim, &args[0])?;
            Ok(Value::Bool(string_arg(prim, &last)?.contains(&needle)))
        }
        Prim::StringStartsWith => {
            let prefix = string_arg(prim, &args[0])?;
            Ok(Value::Bool(string_arg(prim, &last)?.starts_with(&prefix)))
        }
        Prim::StringReplace => {
            let from = string_arg(prim, &args[0])?;
            let to = string_arg(prim, &args[1])?;
            Ok(Value::Str(string_arg(prim, &last)?.replace(&from, &to)))
        }
        Prim::ArrayLength => Ok(Value::Int(array_arg(prim, last)?.len() as i64)),
        Prim::ArrayMap => {
            let f = args.remove(0);
            let mapped = array_arg(prim, last)?
                .into_iter()
                .map(|item| machine.apply(f.clone(), item, out))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(mapped))
        }
        Prim::ArrayFilter => {
            let f = args.remove(0);
            let mut kept = Vec::new();
            for item in array_arg(prim, last)? {
                match machine.apply(f.clone(), item.clone(), out)? {
                    Value::Bool(true) => kept.push(item),
                    Value::Bool(false) => {}
                    other => return Err(type_error(prim, "a predicate returning bool", &other)),
                }
            }
            Ok(Value::Array(kept))
        }
        Prim::ArrayRev => {
            let mut items = array_arg(prim, last)?;
            items.reverse();
            Ok(Value::Array(items))
        }
        Prim::ArraySort => {
            let mut items = array_arg(prim, last)?;
            sort_values(prim, &mut items)?;
            Ok(Value::Array(items))
        }
        Prim::ArrayHead => array_arg(prim, last)?
            .into_iter()
            .next()
            .ok_or_else(|| ScriptError::Runtime("Array.head of an empty array".to_string())),
        Prim::ArraySum => {
            let items = array_arg(prim, last)?;
            if items.iter().all(|v| matches!(v, Value::Int(_))) {
                let mut total: i64 = 0;
                for item in &items {
                    if let Value::Int(n) = item {
                        total = total.checked_add(*n).ok_or_else(|| {
                            ScriptError::Runtime("integer overflow in Array.sum".to_string())
                        })?;
                    }
                }
                return Ok(Value::Int(total));
            }
            let mut total = 0.0;
            for item in &items {
                total += match item {
                    Value::Int(n) => *n as f64,
                    Value::Float(f) => *f,
                    other => return Err(type_error(prim, "an array of numbers", other)),
                };
            }
            Ok(Value::Float(total))
        }
        Prim::ArrayFold => {
            let f = args.remove(0);
            let mut acc = args.remove(0);
            for item in array_arg(prim, last)? {
                let partial = machine.apply(f.clone(), acc, out)?;
                acc = machine.apply(partial, item, out)?;
            }
            Ok(acc)
        }
        Prim::ArrayIter => {
            let f = args.remove(0);
            for item in array_arg(prim, last)? {
                machine.apply(f.clone(), item, out)?;
            }
            Ok(Value::Unit)
        }
        Prim::ToString => Ok(Value::Str(last.plain())),
        Prim::ToInt => match last {
            Value::Int(n) => Ok(Value::Int(n)),
            Value::Float(f) => Ok(Value::Int(f.trunc() as i64)),
            Value::Str(s) => s.trim().parse().map(Value::Int).map_err(|_| {
                ScriptError::Runtime(format!("cannot convert \"{}\" to int", s))
            }),
            other => Err(type_error(prim, "a number or string", &other)),
        },
        Prim::ToFloat => match last {
            Value::Int(n) => Ok(Value::Float(n as f64)),
            Value::Float(f) => Ok(Value::Float(f)),
            Value::Str(s) => s.trim().parse().map(Value::Float).map_err(|_| {
                ScriptError::Runtime(format!("cannot convert \"{}\" to float", s))
            }),
            other => Err(type_error(prim, "a number or string", &other)),
        },
        Prim::Not => match last {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => Err(type_error(prim, "a bool", &other)),
        },
        Prim::Op(op) => eval::binary(op, args.remove(0), last),
        Prim::Printfn | Prim::Sprintf => {
            args.push(last);
            let format = string_arg(prim, &args[0])?;
            let text = format_with(&format, &args[1..])?;
            if prim == Prim::Printfn {
                out.write_out(&text);
                Ok(Value::Unit)
            } else {
                Ok(Value::Str(text))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_and_name_agree() {
        for (name, prim) in NAMES {
            assert_eq!(lookup(name), Some(prim));
            assert_eq!(prim.name(), name);
        }
        assert_eq!(lookup("String.nope"), None);
        assert_eq!(lookup("(^)"), Some(Prim::Op(BinOp::Concat)));
    }

    #[test]
    fn format_arity_counts_placeholders() {
        assert_eq!(placeholders("%s is %d%%"), 2);
        let fmt = Value::Str("%s=%A".into());
        assert_eq!(Prim::Sprintf.arity(&[fmt]), 3);
        assert_eq!(Prim::Printfn.arity(&[Value::Str("plain".into())]), 1);
    }

    #[test]
    fn format_fills_placeholders() {
        let text = format_with(
            "%s has %d items (%A) at %f%%",
            &[
                Value::Str("list".into()),
                Value::Int(2),
                Value::Array(vec![Value::Str("a".into())]),
                Value::Float(0.5),
            ],
        )
        .unwrap();
        assert_eq!(text, "list has 2 items ([\"a\"]) at 0.500000%");
    }

    #[test]
    fn format_checks_argument_types() {
        assert!(matches!(
            format_with("%d", &[Value::Str("x".into())]),
            Err(ScriptError::Type(_))
        ));
    }
}
