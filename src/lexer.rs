//! Splits one entered line into pipeline [`Token`]s.

use crate::token::Token;
use std::fmt;

/// Errors that can occur while splitting a line into tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexingError {
    /// A closing quote (single or double) was not found.
    UnfinishedQuote,
    /// A `>` was not followed by a file name.
    MissingRedirectTarget,
}

impl fmt::Display for LexingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexingError::UnfinishedQuote => write!(f, "unfinished quote"),
            LexingError::MissingRedirectTarget => write!(f, "expected a file name after '>'"),
        }
    }
}

impl std::error::Error for LexingError {}

struct Lexer {
    input: Vec<char>,
    pos: usize,
    /// Words of the command currently being collected.
    words: Vec<String>,
}

impl Lexer {
    fn new(line: &str) -> Self {
        Lexer {
            input: line.trim().chars().collect(),
            pos: 0,
            words: Vec::new(),
        }
    }

    fn make_tokens(&mut self) -> Result<Vec<Token>, LexingError> {
        let mut out = Vec::new();

        while let Some(ch) = self.peek_char() {
            match ch {
                ' ' | '\t' => self.handle_blanks(&mut out),
                '|' => {
                    self.read_char();
                    self.finish_command(&mut out);
                    out.push(Token::Pipe);
                }
                '>' => {
                    self.read_char();
                    self.finish_command(&mut out);
                    let target = self.read_redirect_target()?;
                    out.push(Token::Out(target));
                }
                '(' => {
                    self.finish_command(&mut out);
                    out.push(Token::Code(self.read_code()));
                }
                '\n' | '\r' => {
                    self.read_char();
                    if ch == '\r' && self.peek_char() == Some('\n') {
                        self.read_char();
                    }
                    self.finish_command(&mut out);
                    out.push(Token::LineBreak);
                }
                _ => {
                    let word = self.read_word()?;
                    self.words.push(word);
                }
            }
        }

        self.finish_command(&mut out);
        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    /// Blanks between two words of a command only separate arguments;
    /// anywhere else they become a [`Token::Whitespace`].
    fn handle_blanks(&mut self, out: &mut Vec<Token>) {
        let mut run = String::new();
        while let Some(c @ (' ' | '\t')) = self.peek_char() {
            run.push(c);
            self.read_char();
        }
        match self.peek_char() {
            Some(c) if !self.words.is_empty() && starts_word(c) => {}
            _ => {
                self.finish_command(out);
                out.push(Token::Whitespace(run));
            }
        }
    }

    fn finish_command(&mut self, out: &mut Vec<Token>) {
        if self.words.is_empty() {
            return;
        }
        let mut words = std::mem::take(&mut self.words).into_iter();
        if let Some(name) = words.next() {
            out.push(Token::Command {
                name,
                args: words.collect(),
            });
        }
    }

    /// Reads one word, joining adjacent quoted and unquoted parts.
    fn read_word(&mut self) -> Result<String, LexingError> {
        let mut word = String::new();
        while let Some(ch) = self.peek_char() {
            match ch {
                '\'' => {
                    self.read_char();
                    self.read_single_quoted(&mut word)?;
                }
                '"' => {
                    self.read_char();
                    self.read_double_quoted(&mut word)?;
                }
                c if starts_word(c) || c == '(' => {
                    self.read_char();
                    word.push(c);
                }
                _ => break,
            }
        }
        Ok(word)
    }

    fn read_single_quoted(&mut self, word: &mut String) -> Result<(), LexingError> {
        while let Some(ch) = self.read_char() {
            match ch {
                '\'' => return Ok(()),
                c => word.push(c),
            }
        }
        Err(LexingError::UnfinishedQuote)
    }

    fn read_double_quoted(&mut self, word: &mut String) -> Result<(), LexingError> {
        while let Some(ch) = self.read_char() {
            match ch {
                '"' => return Ok(()),
                '\\' if matches!(self.peek_char(), Some('"' | '\\')) => {
                    if let Some(escaped) = self.read_char() {
                        word.push(escaped);
                    }
                }
                c => word.push(c),
            }
        }
        Err(LexingError::UnfinishedQuote)
    }

    fn read_redirect_target(&mut self) -> Result<String, LexingError> {
        while let Some(' ' | '\t') = self.peek_char() {
            self.read_char();
        }
        match self.peek_char() {
            Some(c) if starts_word(c) => {
                let target = self.read_word()?;
                if target.is_empty() {
                    Err(LexingError::MissingRedirectTarget)
                } else {
                    Ok(target)
                }
            }
            _ => Err(LexingError::MissingRedirectTarget),
        }
    }

    /// Collects a fenced code block including both fences.
    /// Nested parentheses and string literals are tracked; an unterminated
    /// block runs to the end of the input without a closing fence.
    fn read_code(&mut self) -> String {
        let mut code = String::new();
        let mut depth = 0usize;
        let mut in_string = false;
        while let Some(ch) = self.read_char() {
            code.push(ch);
            if in_string {
                match ch {
                    '\\' => {
                        if let Some(escaped) = self.read_char() {
                            code.push(escaped);
                        }
                    }
                    '"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match ch {
                '"' => in_string = true,
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
        }
        code
    }
}

fn starts_word(c: char) -> bool {
    !matches!(c, ' ' | '\t' | '|' | '>' | '(' | '\n' | '\r')
}

/// The main entry point to tokenize one entered line.
///
/// Blanks at either end of the line are not emitted, so the final token of a
/// non-empty result always carries meaning.
pub fn split_into_tokens(line: &str) -> Result<Vec<Token>, LexingError> {
    Lexer::new(line).make_tokens()
}
