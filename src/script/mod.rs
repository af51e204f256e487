//! A small ML-flavoured expression language used for `( ... )` code blocks.
//!
//! Bindings made with a top-level `let` persist for the rest of the session.
//! The last value of an interaction is rendered to the sink: strings as-is,
//! arrays one element per line, unit not at all.

mod ast;
mod eval;
mod lexer;
mod library;
mod parser;
mod value;

use crate::code::Evaluator;
use crate::sink::Sink;
use ast::Item;
use eval::Machine;
use log::debug;
use thiserror::Error;
use value::{Env, Value};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("lexical error at offset {pos}: {message}")]
    Lex { pos: usize, message: String },
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("unbound name '{0}'")]
    Unbound(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("division by zero")]
    DivideByZero,
    #[error("{0}")]
    Runtime(String),
}

#[derive(Debug, Default)]
pub struct ScriptEngine {
    machine: Machine,
}

impl ScriptEngine {
    pub fn new() -> Self {
        Self {
            machine: Machine::new(),
        }
    }

    fn interact(&mut self, source: &str, sink: &mut dyn Sink) -> Result<(), ScriptError> {
        for item in parser::parse_interaction(source)? {
            match item {
                Item::Bind(binding) => {
                    let value = self.machine.bind(&binding, &Env::default(), sink)?;
                    debug!("bound {} : {}", binding.name, value.type_name());
                    self.machine.globals.insert(binding.name, value);
                }
                Item::Expr(expr) => {
                    let value = self.machine.eval(&expr, &Env::default(), sink)?;
                    emit(&value, sink);
                }
            }
        }
        Ok(())
    }

    fn evaluate(&mut self, source: &str, sink: &mut dyn Sink) -> Result<(), ScriptError> {
        let expr = parser::parse_expression(source)?;
        let value = self.machine.eval(&expr, &Env::default(), sink)?;
        emit(&value, sink);
        Ok(())
    }
}

fn emit(value: &Value, sink: &mut dyn Sink) {
    if let Some(text) = value.render() {
        sink.write_out(&text);
    }
}

impl Evaluator for ScriptEngine {
    fn eval_interaction(&mut self, source: &str, sink: &mut dyn Sink) {
        if let Err(e) = self.interact(source, sink) {
            sink.write_error(&e.to_string());
        }
    }

    fn eval_expression(&mut self, source: &str, sink: &mut dyn Sink) {
        if let Err(e) = self.evaluate(source, sink) {
            sink.write_error(&e.to_string());
        }
    }
}
