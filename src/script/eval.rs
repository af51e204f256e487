//! Tree-walking evaluation.

use super::ScriptError;
use super::ast::{BinOp, Binding, Expr};
use super::library;
use super::value::{Closure, Env, Value};
use crate::sink::Sink;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

/// Nested evaluations (sub-expressions and function bodies) allowed before
/// evaluation gives up.
pub const MAX_EVAL_DEPTH: usize = 400;

/// Evaluation state shared across interactions: top-level bindings and
/// the current evaluation depth.
#[derive(Debug, Default)]
pub struct Machine {
    pub globals: HashMap<String, Value>,
    depth: usize,
}

type EvalResult = Result<Value, ScriptError>;

impl Machine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate a binding's value; recursive closures learn their own name.
    pub fn bind(&mut self, binding: &Binding, env: &Env, out: &mut dyn Sink) -> EvalResult {
        if binding.recursive {
            if let Expr::Lambda { param, body } = &binding.value {
                return Ok(Value::Closure(Rc::new(Closure {
                    param: param.clone(),
                    body: Rc::clone(body),
                    env: env.clone(),
                    name: Some(binding.name.clone()),
                })));
            }
            return Err(ScriptError::Runtime(format!(
                "'let rec {}' must define a function",
                binding.name
            )));
        }
        self.eval(&binding.value, env, out)
    }

    pub fn eval(&mut self, expr: &Expr, env: &Env, out: &mut dyn Sink) -> EvalResult {
        if self.depth >= MAX_EVAL_DEPTH {
            return Err(ScriptError::Runtime(
                "maximum evaluation depth exceeded".to_string(),
            ));
        }
        self.depth += 1;
        let result = self.eval_node(expr, env, out);
        self.depth -= 1;
        result
    }

    fn eval_node(&mut self, expr: &Expr, env: &Env, out: &mut dyn Sink) -> EvalResult {
        match expr {
            Expr::Unit => Ok(Value::Unit),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(n) => Ok(Value::Int(*n)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Array(items) => items
                .iter()
                .map(|item| self.eval(item, env, out))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expr::Var(name) => self.lookup(name, env),
            Expr::Lambda { param, body } => Ok(Value::Closure(Rc::new(Closure {
                param: param.clone(),
                body: Rc::clone(body),
                env: env.clone(),
                name: None,
            }))),
            Expr::Apply(func, arg) => {
                let func = self.eval(func, env, out)?;
                let arg = self.eval(arg, env, out)?;
                self.apply(func, arg, out)
            }
            Expr::Binary(BinOp::And, lhs, rhs) => {
                if self.eval_bool(lhs, env, out, "&&")? {
                    self.eval_bool(rhs, env, out, "&&").map(Value::Bool)
                } else {
                    Ok(Value::Bool(false))
                }
            }
            Expr::Binary(BinOp::Or, lhs, rhs) => {
                if self.eval_bool(lhs, env, out, "||")? {
                    Ok(Value::Bool(true))
                } else {
                    self.eval_bool(rhs, env, out, "||").map(Value::Bool)
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs, env, out)?;
                let rhs = self.eval(rhs, env, out)?;
                binary(*op, lhs, rhs)
            }
            Expr::Negate(inner) => match self.eval(inner, env, out)? {
                Value::Int(n) => n
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(overflow),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(ScriptError::Type(format!(
                    "cannot negate a value of type {}",
                    other.type_name()
                ))),
            },
            Expr::If(cond, then, otherwise) => {
                if self.eval_bool(cond, env, out, "if")? {
                    self.eval(then, env, out)
                } else {
                    self.eval(otherwise, env, out)
                }
            }
            Expr::Annotated(inner, ty) => {
                let value = self.eval(inner, env, out)?;
                if value.conforms_to(ty) {
                    Ok(value)
                } else {
                    Err(ScriptError::Type(format!(
                        "expected {} but got {}",
                        ty,
                        value.type_name()
                    )))
                }
            }
            Expr::Let { binding, body } => {
                let value = self.bind(binding, env, out)?;
                let inner = env.bind(&binding.name, value);
                self.eval(body, &inner, out)
            }
        }
    }

    fn eval_bool(
        &mut self,
        expr: &Expr,
        env: &Env,
        out: &mut dyn Sink,
        context: &str,
    ) -> Result<bool, ScriptError> {
        match self.eval(expr, env, out)? {
            Value::Bool(b) => Ok(b),
            other => Err(ScriptError::Type(format!(
                "{} expects a bool but got {}",
                context,
                other.type_name()
            ))),
        }
    }

    fn lookup(&self, name: &str, env: &Env) -> EvalResult {
        if let Some(value) = env.lookup(name) {
            return Ok(value.clone());
        }
        if let Some(value) = self.globals.get(name) {
            return Ok(value.clone());
        }
        library::lookup(name)
            .map(|prim| Value::Prim(prim, Vec::new()))
            .ok_or_else(|| ScriptError::Unbound(name.to_string()))
    }

    pub fn apply(&mut self, func: Value, arg: Value, out: &mut dyn Sink) -> EvalResult {
        match func {
            Value::Closure(closure) => {
                let mut env = closure.env.clone();
                if let Some(name) = &closure.name {
                    env = env.bind(name, Value::Closure(Rc::clone(&closure)));
                }
                let env = env.bind(&closure.param, arg);
                self.eval(&closure.body, &env, out)
            }
            Value::Prim(prim, mut args) => {
                args.push(arg);
                if args.len() < prim.arity(&args) {
                    Ok(Value::Prim(prim, args))
                } else {
                    library::call(self, prim, args, out)
                }
            }
            other => Err(ScriptError::Type(format!(
                "a value of type {} is not a function",
                other.type_name()
            ))),
        }
    }
}

fn overflow() -> ScriptError {
    ScriptError::Runtime("integer overflow".to_string())
}

/// Apply a binary operator to two evaluated operands.
pub fn binary(op: BinOp, lhs: Value, rhs: Value) -> EvalResult {
    use Value::{Bool, Float, Int, Str};

    let mismatch = |lhs: &Value, rhs: &Value| {
        ScriptError::Type(format!(
            "operator {} cannot combine {} and {}",
            op.symbol(),
            lhs.type_name(),
            rhs.type_name()
        ))
    };

    match op {
        BinOp::Eq | BinOp::Ne => {
            let equal = lhs.equals(&rhs).ok_or_else(|| mismatch(&lhs, &rhs))?;
            Ok(Value::Bool(equal == (op == BinOp::Eq)))
        }
        BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
            let ordering = lhs.compare(&rhs).ok_or_else(|| mismatch(&lhs, &rhs))?;
            Ok(Value::Bool(match op {
                BinOp::Lt => ordering == Ordering::Less,
                BinOp::Gt => ordering == Ordering::Greater,
                BinOp::Le => ordering != Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinOp::Concat => match (lhs, rhs) {
            (Str(a), Str(b)) => Ok(Str(a + &b)),
            (lhs, rhs) => Err(mismatch(&lhs, &rhs)),
        },
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => {
            match (lhs, rhs) {
                (Str(a), Str(b)) if op == BinOp::Add => Ok(Str(a + &b)),
                (Int(a), Int(b)) => int_arith(op, a, b),
                (Int(a), Float(b)) => Ok(Float(float_arith(op, a as f64, b))),
                (Float(a), Int(b)) => Ok(Float(float_arith(op, a, b as f64))),
                (Float(a), Float(b)) => Ok(Float(float_arith(op, a, b))),
                (lhs, rhs) => Err(mismatch(&lhs, &rhs)),
            }
        }
        BinOp::And | BinOp::Or => match (lhs, rhs) {
            (Bool(a), Bool(b)) => Ok(Bool(if op == BinOp::And { a && b } else { a || b })),
            (lhs, rhs) => Err(mismatch(&lhs, &rhs)),
        },
    }
}

fn int_arith(op: BinOp, a: i64, b: i64) -> EvalResult {
    let result = match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Sub => a.checked_sub(b),
        BinOp::Mul => a.checked_mul(b),
        BinOp::Div | BinOp::Rem if b == 0 => return Err(ScriptError::DivideByZero),
        BinOp::Div => a.checked_div(b),
        _ => a.checked_rem(b),
    };
    result.map(Value::Int).ok_or_else(overflow)
}

fn float_arith(op: BinOp, a: f64, b: f64) -> f64 {
    match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        _ => a % b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parser::parse_expression;

    #[derive(Default)]
    struct Collect(Vec<String>);

    impl Sink for Collect {
        fn write_out(&mut self, text: &str) {
            self.0.push(text.to_string());
        }

        fn write_error(&mut self, text: &str) {
            self.0.push(format!("error: {}", text));
        }
    }

    fn run(src: &str) -> EvalResult {
        let expr = parse_expression(src)?;
        Machine::new().eval(&expr, &Env::default(), &mut Collect::default())
    }

    fn shown(src: &str) -> String {
        run(src).unwrap().display()
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(shown("1 + 2 * 3"), "7");
        assert_eq!(shown("(1 + 2) * 3"), "9");
        assert_eq!(shown("7 % 4 - -1"), "4");
        assert_eq!(shown("1 + 0.5"), "1.5");
        assert_eq!(shown("\"ab\" + \"cd\" ^ \"e\""), "\"abcde\"");
    }

    #[test]
    fn division_by_zero() {
        assert!(matches!(run("1 / 0"), Err(ScriptError::DivideByZero)));
        assert!(matches!(run("1 % 0"), Err(ScriptError::DivideByZero)));
    }

    #[test]
    fn logical_operators_short_circuit() {
        assert_eq!(shown("false && (1 / 0 = 1)"), "false");
        assert_eq!(shown("true || (1 / 0 = 1)"), "true");
        assert!(matches!(run("1 && true"), Err(ScriptError::Type(_))));
    }

    #[test]
    fn closures_capture_their_environment() {
        assert_eq!(shown("let n = 10 in let add x = x + n in add 5"), "15");
        assert_eq!(shown("let add a b = a + b in let inc = add 1 in inc 41"), "42");
    }

    #[test]
    fn recursive_functions() {
        assert_eq!(
            shown("let rec fact n = if n <= 1 then 1 else n * fact (n - 1) in fact 10"),
            "3628800"
        );
    }

    #[test]
    fn runaway_recursion_is_stopped() {
        assert!(matches!(
            run("let rec loop n = loop (n + 1) in loop 0"),
            Err(ScriptError::Runtime(_))
        ));
        let mut machine = Machine::new();
        let expr = parse_expression("let rec loop n = loop (n + 1) in loop 0").unwrap();
        let _ = machine.eval(&expr, &Env::default(), &mut Collect::default());
        assert_eq!(machine.depth, 0);
    }

    #[test]
    fn library_functions_curry() {
        assert_eq!(shown("\"a,b\" |> String.split \",\" |> Array.length"), "2");
        assert_eq!(
            shown("[1; 2; 3] |> Array.map (fun x -> x * x) |> Array.fold (fun a b -> a + b) 0"),
            "14"
        );
        assert_eq!(shown("sprintf \"%s-%d\" \"x\" 3"), "\"x-3\"");
    }

    #[test]
    fn printfn_writes_to_the_sink() {
        let expr = parse_expression("[\"a\"; \"b\"] |> Array.iter (printfn \"<%s>\")").unwrap();
        let mut out = Collect::default();
        let value = Machine::new()
            .eval(&expr, &Env::default(), &mut out)
            .unwrap();
        assert!(matches!(value, Value::Unit));
        assert_eq!(out.0, vec!["<a>", "<b>"]);
    }

    #[test]
    fn annotations_are_checked() {
        assert_eq!(shown("let s : string = \"x\" in s"), "\"x\"");
        assert!(matches!(
            run("let s : int = \"x\" in s"),
            Err(ScriptError::Type(_))
        ));
    }

    #[test]
    fn operators_as_functions() {
        assert_eq!(shown("+ 1 2"), "3");
        assert_eq!(shown("[1; 2; 3] |> Array.fold (*) 1"), "6");
        assert_eq!(shown("(&&) true false"), "false");
    }

    #[test]
    fn unbound_names() {
        assert!(matches!(run("nope 1"), Err(ScriptError::Unbound(name)) if name == "nope"));
    }
}
