//! A small interactive shell whose lines are pipelines of tokens.
//!
//! A line such as `ls | grep rs | (Array.length) > count.txt` is split into
//! tokens by [`lexer`], then run left to right by [`Shell`]. Every token's
//! output becomes the input of the next one: commands receive it as their
//! last argument, `( ... )` code blocks receive it as the bound name `piped`,
//! and `>` writes it to a file. Only the last token of a line prints to the
//! console.
//!
//! Commands are either built-ins implemented in Rust or external programs
//! launched from the current environment. Code blocks are handed to an
//! [`Evaluator`]; the bundled one is [`ScriptEngine`].

mod builtin;
pub mod code;
pub mod console;
mod dispatch;
pub mod editor;
pub mod env;
mod external;
mod interpreter;
pub mod lexer;
pub mod script;
pub mod sink;
pub mod token;

pub use code::Evaluator;
pub use console::Console;
pub use editor::{LineEditor, RustylineEditor};
pub use interpreter::Shell;
pub use script::ScriptEngine;
pub use token::{PipelineResult, Token};
