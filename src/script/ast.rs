//! Syntax tree of the expression language.

use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Add,
    Sub,
    Concat,
    Mul,
    Div,
    Rem,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Or => "||",
            BinOp::And => "&&",
            BinOp::Eq => "=",
            BinOp::Ne => "<>",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Concat => "^",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
        }
    }

    /// Operators written as `(+)` name functions of two arguments.
    pub fn from_section(name: &str) -> Option<Self> {
        let symbol = name.strip_prefix('(')?.strip_suffix(')')?;
        ALL_OPS.iter().copied().find(|op| op.symbol() == symbol)
    }
}

const ALL_OPS: [BinOp; 14] = [
    BinOp::Or,
    BinOp::And,
    BinOp::Eq,
    BinOp::Ne,
    BinOp::Lt,
    BinOp::Gt,
    BinOp::Le,
    BinOp::Ge,
    BinOp::Add,
    BinOp::Sub,
    BinOp::Concat,
    BinOp::Mul,
    BinOp::Div,
    BinOp::Rem,
];

/// A type annotation: a base type plus one `[]` per array level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeAnn {
    pub base: BaseType,
    pub depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseType {
    String,
    Int,
    Float,
    Bool,
    Unit,
}

impl BaseType {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "string" => BaseType::String,
            "int" => BaseType::Int,
            "float" => BaseType::Float,
            "bool" => BaseType::Bool,
            "unit" => BaseType::Unit,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            BaseType::String => "string",
            BaseType::Int => "int",
            BaseType::Float => "float",
            BaseType::Bool => "bool",
            BaseType::Unit => "unit",
        }
    }
}

impl fmt::Display for TypeAnn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base.name())?;
        for _ in 0..self.depth {
            write!(f, "[]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Expr>),
    Var(String),
    Lambda { param: String, body: Rc<Expr> },
    Apply(Box<Expr>, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),
    If(Box<Expr>, Box<Expr>, Box<Expr>),
    Annotated(Box<Expr>, TypeAnn),
    Let { binding: Box<Binding>, body: Box<Expr> },
}

/// `let [rec] name = value`; parameters are already folded into `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub recursive: bool,
    pub value: Expr,
}

/// One top-level piece of an interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// A `let` without `in`: binds a name for later evaluations.
    Bind(Binding),
    Expr(Expr),
}
