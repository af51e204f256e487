//! Recursive-descent parser for the expression language.
//!
//! Precedence, loosest first: `let`/`fun`/`if`, `|>`, `||`, `&&`,
//! comparisons, `+ - ^`, `* / %`, unary minus, application.

use super::ScriptError;
use super::ast::{BaseType, BinOp, Binding, Expr, Item, TypeAnn};
use super::lexer::{Spanned, Tok, tokenize};
use std::rc::Rc;

/// Deepest syntax tree the parser builds. Chains of binary operators and
/// applications count one level per link.
pub const MAX_NESTING: usize = 200;

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Levels of the tree above the node being parsed.
    nesting: usize,
}

type ParseResult<T> = Result<T, ScriptError>;

/// Parse `;;`-separated items, as entered at the interactive prompt.
pub fn parse_interaction(src: &str) -> ParseResult<Vec<Item>> {
    let mut parser = Parser::new(src)?;
    let mut items = Vec::new();
    loop {
        while parser.eat(&Tok::SemiSemi) {}
        if parser.at_end() {
            break;
        }
        items.push(parser.parse_item()?);
        if !parser.at_end() && !parser.check(&Tok::SemiSemi) && !parser.check(&Tok::Let) {
            return Err(parser.unexpected());
        }
    }
    Ok(items)
}

/// Parse exactly one expression.
pub fn parse_expression(src: &str) -> ParseResult<Expr> {
    let mut parser = Parser::new(src)?;
    let expr = parser.parse_expr()?;
    if !parser.at_end() {
        return Err(parser.unexpected());
    }
    Ok(expr)
}

impl Parser {
    fn new(src: &str) -> ParseResult<Self> {
        Ok(Parser {
            tokens: tokenize(src)?,
            pos: 0,
            nesting: 0,
        })
    }

    /// Account for `levels` more tree levels below the current node.
    fn descend(&mut self, levels: usize) -> ParseResult<()> {
        self.nesting += levels;
        if self.nesting > MAX_NESTING {
            return Err(ScriptError::Syntax(
                "expression nested too deeply".to_string(),
            ));
        }
        Ok(())
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_n(&self, n: usize) -> Option<&Tok> {
        self.tokens.get(self.pos + n).map(|(t, _)| t)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn check(&self, tok: &Tok) -> bool {
        self.peek() == Some(tok)
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.check(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn advance(&mut self) -> Option<Tok> {
        let tok = self.peek().cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, tok: Tok) -> ParseResult<()> {
        if self.eat(&tok) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> ScriptError {
        match self.tokens.get(self.pos) {
            Some((tok, pos)) => {
                ScriptError::Syntax(format!("unexpected {:?} at offset {}", tok, pos))
            }
            None => ScriptError::Syntax("unexpected end of input".to_string()),
        }
    }

    fn parse_item(&mut self) -> ParseResult<Item> {
        if !self.check(&Tok::Let) {
            return Ok(Item::Expr(self.parse_expr()?));
        }
        let binding = self.parse_binding()?;
        if self.eat(&Tok::In) {
            let body = self.parse_expr()?;
            Ok(Item::Expr(Expr::Let {
                binding: Box::new(binding),
                body: Box::new(body),
            }))
        } else {
            Ok(Item::Bind(binding))
        }
    }

    /// `let [rec] name params [: type] = value`
    fn parse_binding(&mut self) -> ParseResult<Binding> {
        self.expect(Tok::Let)?;
        let recursive = self.eat(&Tok::Rec);
        let name = self.parse_name()?;

        let mut params = Vec::new();
        loop {
            match self.peek() {
                Some(Tok::Ident(_)) => params.push(self.parse_name()?),
                Some(Tok::LParen) if self.peek_n(1) == Some(&Tok::RParen) => {
                    self.pos += 2;
                    params.push("_".to_string());
                }
                _ => break,
            }
        }

        let annotation = if self.eat(&Tok::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(Tok::Eq)?;

        let outer = self.nesting;
        self.descend(params.len())?;
        let mut value = self.parse_expr()?;
        self.nesting = outer;
        if let Some(ty) = annotation {
            value = Expr::Annotated(Box::new(value), ty);
        }
        Ok(Binding {
            name,
            recursive,
            value: fold_lambda(params, value),
        })
    }

    fn parse_name(&mut self) -> ParseResult<String> {
        match self.peek() {
            Some(Tok::Ident(name)) if !name.contains('.') => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_type(&mut self) -> ParseResult<TypeAnn> {
        let base = match self.advance() {
            Some(Tok::Ident(name)) => BaseType::from_name(&name)
                .ok_or_else(|| ScriptError::Syntax(format!("unknown type '{}'", name)))?,
            _ => return Err(ScriptError::Syntax("expected a type name".to_string())),
        };
        let mut depth = 0;
        while self.check(&Tok::LBracket) && self.peek_n(1) == Some(&Tok::RBracket) {
            self.pos += 2;
            depth += 1;
        }
        Ok(TypeAnn { base, depth })
    }

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        let outer = self.nesting;
        self.descend(1)?;
        let expr = self.parse_keyword_expr()?;
        self.nesting = outer;
        Ok(expr)
    }

    fn parse_keyword_expr(&mut self) -> ParseResult<Expr> {
        match self.peek() {
            Some(Tok::Let) => {
                let binding = self.parse_binding()?;
                self.expect(Tok::In)?;
                let body = self.parse_expr()?;
                Ok(Expr::Let {
                    binding: Box::new(binding),
                    body: Box::new(body),
                })
            }
            Some(Tok::Fun) => {
                self.pos += 1;
                let mut params = vec![self.parse_name()?];
                while let Some(Tok::Ident(_)) = self.peek() {
                    params.push(self.parse_name()?);
                }
                self.expect(Tok::Arrow)?;
                let outer = self.nesting;
                self.descend(params.len())?;
                let body = self.parse_expr()?;
                self.nesting = outer;
                Ok(fold_lambda(params, body))
            }
            Some(Tok::If) => {
                self.pos += 1;
                let cond = self.parse_expr()?;
                self.expect(Tok::Then)?;
                let then = self.parse_expr()?;
                let otherwise = if self.eat(&Tok::Else) {
                    self.parse_expr()?
                } else {
                    Expr::Unit
                };
                Ok(Expr::If(Box::new(cond), Box::new(then), Box::new(otherwise)))
            }
            _ => self.parse_pipe(),
        }
    }

    /// `x |> f` is `f x`.
    fn parse_pipe(&mut self) -> ParseResult<Expr> {
        let outer = self.nesting;
        let mut lhs = self.parse_or()?;
        while self.eat(&Tok::PipeRight) {
            self.descend(1)?;
            let rhs = self.parse_or()?;
            lhs = Expr::Apply(Box::new(rhs), Box::new(lhs));
        }
        self.nesting = outer;
        Ok(lhs)
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let outer = self.nesting;
        let mut lhs = self.parse_and()?;
        while self.eat(&Tok::OrOr) {
            self.descend(1)?;
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        self.nesting = outer;
        Ok(lhs)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let outer = self.nesting;
        let mut lhs = self.parse_cmp()?;
        while self.eat(&Tok::AndAnd) {
            self.descend(1)?;
            let rhs = self.parse_cmp()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        self.nesting = outer;
        Ok(lhs)
    }

    fn parse_cmp(&mut self) -> ParseResult<Expr> {
        let outer = self.nesting;
        let mut lhs = self.parse_add()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Eq) => BinOp::Eq,
                Some(Tok::Ne) => BinOp::Ne,
                Some(Tok::Lt) => BinOp::Lt,
                Some(Tok::Gt) => BinOp::Gt,
                Some(Tok::Le) => BinOp::Le,
                Some(Tok::Ge) => BinOp::Ge,
                _ => break,
            };
            self.pos += 1;
            self.descend(1)?;
            let rhs = self.parse_add()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.nesting = outer;
        Ok(lhs)
    }

    fn parse_add(&mut self) -> ParseResult<Expr> {
        let outer = self.nesting;
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinOp::Add,
                Some(Tok::Minus) => BinOp::Sub,
                Some(Tok::Caret) => BinOp::Concat,
                _ => break,
            };
            self.pos += 1;
            self.descend(1)?;
            let rhs = self.parse_mul()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.nesting = outer;
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> ParseResult<Expr> {
        let outer = self.nesting;
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Star) => BinOp::Mul,
                Some(Tok::Slash) => BinOp::Div,
                Some(Tok::Percent) => BinOp::Rem,
                _ => break,
            };
            self.pos += 1;
            self.descend(1)?;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.nesting = outer;
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        match self.peek() {
            Some(Tok::Minus) => {
                self.pos += 1;
                let outer = self.nesting;
                self.descend(1)?;
                let inner = self.parse_unary()?;
                self.nesting = outer;
                Ok(Expr::Negate(Box::new(inner)))
            }
            // `a |> fun x -> ...` and friends
            Some(Tok::Let | Tok::Fun | Tok::If) => self.parse_expr(),
            _ => self.parse_application(),
        }
    }

    fn parse_application(&mut self) -> ParseResult<Expr> {
        let outer = self.nesting;
        let mut func = self.parse_atom()?;
        while self.starts_atom() {
            self.descend(1)?;
            let arg = self.parse_atom()?;
            func = Expr::Apply(Box::new(func), Box::new(arg));
        }
        self.nesting = outer;
        Ok(func)
    }

    fn starts_atom(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Tok::Int(_)
                    | Tok::Float(_)
                    | Tok::Str(_)
                    | Tok::Ident(_)
                    | Tok::True
                    | Tok::False
                    | Tok::LParen
                    | Tok::LBracket
            )
        )
    }

    fn parse_atom(&mut self) -> ParseResult<Expr> {
        let Some(tok) = self.advance() else {
            return Err(self.unexpected());
        };
        match tok {
            Tok::Int(n) => Ok(Expr::Int(n)),
            Tok::Float(f) => Ok(Expr::Float(f)),
            Tok::Str(s) => Ok(Expr::Str(s)),
            Tok::True => Ok(Expr::Bool(true)),
            Tok::False => Ok(Expr::Bool(false)),
            Tok::Ident(name) => Ok(Expr::Var(name)),
            Tok::LParen => {
                if self.eat(&Tok::RParen) {
                    return Ok(Expr::Unit);
                }
                if let Some(op) = self.peek().and_then(operator) {
                    if self.peek_n(1) == Some(&Tok::RParen) {
                        self.pos += 2;
                        return Ok(section(op));
                    }
                }
                let inner = self.parse_expr()?;
                self.expect(Tok::RParen)?;
                Ok(inner)
            }
            Tok::LBracket => {
                let mut items = Vec::new();
                while !self.check(&Tok::RBracket) {
                    items.push(self.parse_expr()?);
                    if !self.eat(&Tok::Semi) {
                        break;
                    }
                }
                self.expect(Tok::RBracket)?;
                Ok(Expr::Array(items))
            }
            // prefix use of an operator: `+ 1 2` is `(+) 1 2`
            tok => match operator(&tok) {
                Some(op) if op != BinOp::Sub => Ok(section(op)),
                _ => {
                    self.pos -= 1;
                    Err(self.unexpected())
                }
            },
        }
    }
}

fn operator(tok: &Tok) -> Option<BinOp> {
    Some(match tok {
        Tok::OrOr => BinOp::Or,
        Tok::AndAnd => BinOp::And,
        Tok::Eq => BinOp::Eq,
        Tok::Ne => BinOp::Ne,
        Tok::Lt => BinOp::Lt,
        Tok::Gt => BinOp::Gt,
        Tok::Le => BinOp::Le,
        Tok::Ge => BinOp::Ge,
        Tok::Plus => BinOp::Add,
        Tok::Minus => BinOp::Sub,
        Tok::Caret => BinOp::Concat,
        Tok::Star => BinOp::Mul,
        Tok::Slash => BinOp::Div,
        Tok::Percent => BinOp::Rem,
        _ => return None,
    })
}

fn section(op: BinOp) -> Expr {
    Expr::Var(format!("({})", op.symbol()))
}

/// `fun a b -> body` is `fun a -> fun b -> body`.
fn fold_lambda(params: Vec<String>, body: Expr) -> Expr {
    params.into_iter().rev().fold(body, |body, param| Expr::Lambda {
        param,
        body: Rc::new(body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Box<Expr> {
        Box::new(Expr::Var(name.to_string()))
    }

    #[test]
    fn application_binds_tighter_than_operators() {
        let expr = parse_expression("f x + 1").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinOp::Add,
                Box::new(Expr::Apply(var("f"), var("x"))),
                Box::new(Expr::Int(1)),
            )
        );
    }

    #[test]
    fn pipe_becomes_application() {
        let expr = parse_expression("xs |> Array.length").unwrap();
        assert_eq!(expr, Expr::Apply(var("Array.length"), var("xs")));
    }

    #[test]
    fn piped_binding_shape() {
        let expr =
            parse_expression(r#"let piped : string[] = ["a"; "b"] in (Array.length) piped"#)
                .unwrap();
        let Expr::Let { binding, body } = expr else {
            panic!("expected a let expression");
        };
        assert_eq!(binding.name, "piped");
        assert_eq!(
            binding.value,
            Expr::Annotated(
                Box::new(Expr::Array(vec![
                    Expr::Str("a".to_string()),
                    Expr::Str("b".to_string()),
                ])),
                TypeAnn {
                    base: BaseType::String,
                    depth: 1,
                },
            )
        );
        assert_eq!(*body, Expr::Apply(var("Array.length"), var("piped")));
    }

    #[test]
    fn function_binding_folds_parameters() {
        let items = parse_interaction("let add a b = a + b").unwrap();
        let [Item::Bind(binding)] = items.as_slice() else {
            panic!("expected one binding, got {:?}", items);
        };
        let Expr::Lambda { param, body } = &binding.value else {
            panic!("expected a lambda");
        };
        assert_eq!(param, "a");
        assert!(matches!(body.as_ref(), Expr::Lambda { param, .. } if param == "b"));
    }

    #[test]
    fn interaction_items_split_on_double_semicolon_and_let() {
        let items = parse_interaction("let x = 1 let y = 2;; x + y").unwrap();
        assert_eq!(items.len(), 3);
        assert!(matches!(items[2], Item::Expr(_)));
    }

    #[test]
    fn let_without_in_is_rejected_in_expressions() {
        assert!(matches!(
            parse_expression("let x = 1"),
            Err(ScriptError::Syntax(_))
        ));
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        assert!(matches!(
            parse_expression("1 + 2 )"),
            Err(ScriptError::Syntax(_))
        ));
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(matches!(
            parse_expression("let x : widget = 1 in x"),
            Err(ScriptError::Syntax(_))
        ));
    }

    #[test]
    fn operator_sections() {
        let add = Box::new(Expr::Var("(+)".to_string()));
        let expected = Expr::Apply(
            Box::new(Expr::Apply(add, Box::new(Expr::Int(1)))),
            Box::new(Expr::Int(2)),
        );
        assert_eq!(parse_expression("(+) 1 2").unwrap(), expected);
        assert_eq!(parse_expression("+ 1 2").unwrap(), expected);
        assert_eq!(
            parse_expression("(-)").unwrap(),
            Expr::Var("(-)".to_string())
        );
    }

    #[test]
    fn nesting_is_limited() {
        let shallow = format!("{}1{}", "(".repeat(50), ")".repeat(50));
        assert_eq!(parse_expression(&shallow).unwrap(), Expr::Int(1));

        let too_deep = [
            format!("{}1{}", "(".repeat(MAX_NESTING + 1), ")".repeat(MAX_NESTING + 1)),
            vec!["1"; MAX_NESTING + 2].join(" + "),
            format!("{}1", "-".repeat(MAX_NESTING + 1)),
            format!("f {}", vec!["x"; MAX_NESTING + 1].join(" ")),
        ];
        for src in &too_deep {
            match parse_expression(src) {
                Err(ScriptError::Syntax(message)) => {
                    assert_eq!(message, "expression nested too deeply")
                }
                other => panic!("expected a nesting error, got {:?}", other),
            }
        }
    }

    #[test]
    fn lambda_after_pipe() {
        let expr = parse_expression("3 |> fun x -> x * 2").unwrap();
        assert!(matches!(expr, Expr::Apply(ref f, _) if matches!(**f, Expr::Lambda { .. })));
    }
}
