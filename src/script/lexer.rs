//! Tokens of the expression language.

use super::ScriptError;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Int(i64),
    Float(f64),
    Str(String),
    /// A possibly dotted name such as `x` or `String.length`.
    Ident(String),
    Let,
    Rec,
    In,
    Fun,
    If,
    Then,
    Else,
    True,
    False,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Semi,
    SemiSemi,
    Arrow,
    Colon,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    PipeRight,
    AndAnd,
    OrOr,
}

/// A token with the character offset it starts at.
pub type Spanned = (Tok, usize);

fn keyword(word: &str) -> Option<Tok> {
    Some(match word {
        "let" => Tok::Let,
        "rec" => Tok::Rec,
        "in" => Tok::In,
        "fun" => Tok::Fun,
        "if" => Tok::If,
        "then" => Tok::Then,
        "else" => Tok::Else,
        "true" => Tok::True,
        "false" => Tok::False,
        _ => return None,
    })
}

const TWO_CHAR_OPS: [(&str, Tok); 8] = [
    ("|>", Tok::PipeRight),
    ("||", Tok::OrOr),
    ("&&", Tok::AndAnd),
    ("->", Tok::Arrow),
    ("<>", Tok::Ne),
    ("<=", Tok::Le),
    (">=", Tok::Ge),
    (";;", Tok::SemiSemi),
];

fn single_char_op(c: char) -> Option<Tok> {
    Some(match c {
        '(' => Tok::LParen,
        ')' => Tok::RParen,
        '[' => Tok::LBracket,
        ']' => Tok::RBracket,
        ';' => Tok::Semi,
        ':' => Tok::Colon,
        '=' => Tok::Eq,
        '<' => Tok::Lt,
        '>' => Tok::Gt,
        '+' => Tok::Plus,
        '-' => Tok::Minus,
        '*' => Tok::Star,
        '/' => Tok::Slash,
        '%' => Tok::Percent,
        '^' => Tok::Caret,
        _ => return None,
    })
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '\''
}

pub fn tokenize(src: &str) -> Result<Vec<Spanned>, ScriptError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // line comment
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        if c.is_ascii_digit() {
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let is_float = chars.get(i) == Some(&'.')
                && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit());
            if is_float {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().collect();
            let tok = if is_float {
                text.parse().map(Tok::Float).ok()
            } else {
                text.parse().map(Tok::Int).ok()
            };
            let tok = tok.ok_or_else(|| ScriptError::Lex {
                pos: start,
                message: format!("number out of range: {}", text),
            })?;
            tokens.push((tok, start));
            continue;
        }

        if is_ident_start(c) {
            i += 1;
            loop {
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                let dotted = chars.get(i) == Some(&'.')
                    && chars.get(i + 1).is_some_and(|&n| is_ident_start(n));
                if !dotted {
                    break;
                }
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            tokens.push((keyword(&word).unwrap_or(Tok::Ident(word)), start));
            continue;
        }

        if c == '"' {
            i += 1;
            let mut text = String::new();
            loop {
                match chars.get(i) {
                    None => {
                        return Err(ScriptError::Lex {
                            pos: start,
                            message: "unterminated string literal".to_string(),
                        });
                    }
                    Some('"') => {
                        i += 1;
                        break;
                    }
                    Some('\\') => {
                        match chars.get(i + 1) {
                            Some('"') => text.push('"'),
                            Some('\\') => text.push('\\'),
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some(&other) => {
                                text.push('\\');
                                text.push(other);
                            }
                            None => text.push('\\'),
                        }
                        i += 2;
                    }
                    Some(&ch) => {
                        text.push(ch);
                        i += 1;
                    }
                }
            }
            tokens.push((Tok::Str(text), start));
            continue;
        }

        let pair: String = chars[i..chars.len().min(i + 2)].iter().collect();
        if let Some((_, tok)) = TWO_CHAR_OPS.iter().find(|(op, _)| *op == pair) {
            tokens.push((tok.clone(), start));
            i += 2;
            continue;
        }

        match single_char_op(c) {
            Some(tok) => {
                tokens.push((tok, start));
                i += 1;
            }
            None => {
                return Err(ScriptError::Lex {
                    pos: start,
                    message: format!("unexpected character '{}'", c),
                });
            }
        }
    }

    Ok(tokens)
}
