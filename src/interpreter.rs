use crate::code::{self, Evaluator};
use crate::console::Console;
use crate::dispatch;
use crate::editor::{EXIT_KEYWORD, LineEditor};
use crate::env::Environment;
use crate::lexer;
use crate::sink::{OutputSink, Sink};
use crate::token::{PipelineResult, Token};
use log::{debug, trace, warn};
use std::collections::VecDeque;
use std::fs;

/// An interactive shell that runs entered lines as token pipelines.
///
/// Each token's output is handed to the next token. Only the last token of a
/// line writes to the console; the others are captured.
///
/// Example
/// ```
/// use pipeshell::{Console, ScriptEngine, Shell};
/// let (console, captured) = Console::captured();
/// let mut sh = Shell::new(Box::new(ScriptEngine::new()), console);
/// sh.run_line("echo hello | echo world");
/// assert_eq!(captured.out.contents(), "world hello\n");
/// ```
pub struct Shell {
    env: Environment,
    evaluator: Box<dyn Evaluator>,
    console: Console,
}

impl Shell {
    pub fn new(evaluator: Box<dyn Evaluator>, console: Console) -> Self {
        Self {
            env: Environment::new(),
            evaluator,
            console,
        }
    }

    /// Run a token sequence, threading each result into the next token.
    ///
    /// Once a token fails the remaining ones are skipped. The returned value
    /// is the result of the final step.
    pub fn execute(&mut self, tokens: &[Token]) -> PipelineResult {
        let Some(last_index) = tokens.len().checked_sub(1) else {
            return PipelineResult::empty();
        };

        let mut result = PipelineResult::empty();
        for (index, token) in tokens.iter().enumerate() {
            if result.is_error() {
                trace!("skipping {:?}", token);
                continue;
            }
            if token.is_presentation() {
                continue;
            }
            result = self.execute_token(token, result.content(), index == last_index);
        }
        result
    }

    fn execute_token(&mut self, token: &Token, last: &str, is_last: bool) -> PipelineResult {
        let Self {
            env,
            evaluator,
            console,
        } = self;
        let console = &*console;
        let mut sink = OutputSink::new(is_last, console);

        match token {
            Token::Command { name, args } => {
                dispatch::run(name, args, last, env, console, &mut sink);
            }
            Token::Code(raw) => code::run_code(last, raw, evaluator.as_mut(), &mut sink),
            Token::Pipe => {
                if !last.is_empty() {
                    sink.write_out(last);
                }
            }
            Token::Out(path) => {
                let target = env.resolve(path);
                debug!("writing {} bytes to {}", last.len(), target.display());
                if let Err(e) = fs::write(&target, last) {
                    sink.write_error(&format!("{}: {}", path, e));
                }
            }
            Token::Whitespace(_) | Token::LineBreak => {}
        }

        sink.into_result()
    }

    /// Tokenize and run one entered line.
    pub fn run_line(&mut self, line: &str) {
        let tokens = match lexer::split_into_tokens(line) {
            Ok(tokens) => tokens,
            Err(e) => {
                self.console.print_error(&e.to_string());
                return;
            }
        };
        debug!("tokens = {:?}", tokens);

        if let PipelineResult::Error(message) = self.execute(&tokens) {
            warn!("line ended in error: {}", message);
        }
    }

    /// Prompt for lines and run them until the exit keyword is entered.
    pub fn repl(&mut self, editor: &mut dyn LineEditor) -> anyhow::Result<()> {
        let mut history: VecDeque<String> = VecDeque::new();

        loop {
            let prompt = self
                .console
                .prompt(&self.env.current_dir.to_string_lossy());
            let line = editor.read_line(&prompt, &history)?;
            if line.trim() == EXIT_KEYWORD {
                debug!("exit requested");
                return Ok(());
            }
            self.run_line(&line);
            history.push_front(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::Captured;
    use crate::script::ScriptEngine;

    fn shell() -> (Shell, Captured) {
        let (console, captured) = Console::captured();
        (Shell::new(Box::new(ScriptEngine::new()), console), captured)
    }

    fn shell_with_cursor() -> (Shell, Captured) {
        let (console, captured) = Console::captured_with_cursor();
        (Shell::new(Box::new(ScriptEngine::new()), console), captured)
    }

    fn output_of(line: &str) -> (String, String) {
        let (mut sh, captured) = shell();
        sh.run_line(line);
        (captured.out.contents(), captured.err.contents())
    }

    struct Scripted {
        lines: VecDeque<String>,
        seen_history: Vec<Vec<String>>,
    }

    impl Scripted {
        fn new(lines: &[&str]) -> Self {
            Self {
                lines: lines.iter().map(|l| l.to_string()).collect(),
                seen_history: Vec::new(),
            }
        }
    }

    impl LineEditor for Scripted {
        fn read_line(&mut self, _: &str, history: &VecDeque<String>) -> anyhow::Result<String> {
            self.seen_history.push(history.iter().cloned().collect());
            self.lines
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("script exhausted"))
        }
    }

    #[test]
    fn piped_output_becomes_last_argument() {
        assert_eq!(
            output_of("echo hello | echo world"),
            ("world hello\n".to_string(), String::new())
        );
    }

    #[test]
    fn only_the_last_of_identical_tokens_is_live() {
        let (mut sh, captured) = shell();
        let echo = Token::command("echo", &["same"]);
        let result = sh.execute(&[echo.clone(), echo]);
        assert_eq!(result, PipelineResult::empty());
        assert_eq!(captured.out.contents(), "same same\n");
    }

    #[test]
    fn blank_lines_do_nothing() {
        let (mut sh, captured) = shell();
        let tokens = [
            Token::Whitespace("  ".to_string()),
            Token::LineBreak,
            Token::Whitespace(" ".to_string()),
        ];
        assert_eq!(sh.execute(&tokens), PipelineResult::empty());
        sh.run_line("   ");
        assert!(captured.out.contents().is_empty());
        assert!(captured.err.contents().is_empty());
    }

    #[test]
    fn code_without_piped_text() {
        assert_eq!(output_of("(+ 1 2)").0, "3\n");
    }

    #[test]
    fn code_applied_to_piped_text() {
        assert_eq!(output_of("echo abc | (String.length)").0, "3\n");
        assert_eq!(
            output_of("echo hello world | (fun s -> String.toUpper s)").0,
            "HELLO WORLD\n"
        );
    }

    #[test]
    fn multi_line_output_is_piped_as_array() {
        let (mut sh, captured) = shell();
        sh.run_line(r#"(printfn "b";; printfn "a") | (Array.sort)"#);
        assert_eq!(captured.out.contents(), "a\nb\n");
    }

    #[test]
    fn star_evaluates_piped_text() {
        assert_eq!(output_of(r#"echo "6 * 7" | (*)"#).0, "42\n");
    }

    #[test]
    fn bindings_survive_between_lines() {
        let (mut sh, captured) = shell();
        sh.run_line("(let twice x = x * 2)");
        sh.run_line("(twice 21)");
        assert_eq!(captured.out.contents(), "42\n");
    }

    #[test]
    fn out_writes_the_previous_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let (mut sh, captured) = shell();
        sh.run_line(&format!("echo saved text > {}", path.display()));
        assert_eq!(fs::read_to_string(&path).unwrap(), "saved text");
        assert!(captured.out.contents().is_empty());
    }

    #[test]
    fn out_replaces_longer_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        fs::write(&path, "a much longer previous content\nover two lines").unwrap();
        let (mut sh, _) = shell();
        sh.run_line(&format!("echo x > {}", path.display()));
        assert_eq!(fs::read_to_string(&path).unwrap(), "x");
    }

    #[test]
    fn pipe_after_out_prints_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let (mut sh, captured) = shell();
        sh.run_line(&format!("echo a > {} |", path.display()));
        assert_eq!(fs::read_to_string(&path).unwrap(), "a");
        assert!(captured.out.contents().is_empty());
        assert!(captured.err.contents().is_empty());
    }

    #[test]
    fn negative_value_is_piped_into_builtin() {
        assert_eq!(output_of("(0 - 5) | echo").0, "-5\n");
    }

    #[test]
    fn deeply_nested_code_is_rejected() {
        let line = format!("{}1{}", "(".repeat(20_000), ")".repeat(20_000));
        let (out, err) = output_of(&line);
        assert!(out.is_empty());
        assert_eq!(err, "syntax error: expression nested too deeply\n");
    }

    #[test]
    fn out_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.txt");
        let (mut sh, captured) = shell();
        let result = sh.execute(&[
            Token::command("echo", &["x"]),
            Token::Out(path.display().to_string()),
        ]);
        assert!(result.is_error());
        assert!(captured.err.contents().starts_with(&path.display().to_string()));
    }

    #[test]
    fn failure_skips_the_rest_of_the_line() {
        let (mut sh, captured) = shell();
        let result = sh.execute(&[
            Token::command("help", &["no-such-topic"]),
            Token::Pipe,
            Token::command("echo", &["after"]),
        ]);
        assert!(result.is_error());
        assert!(captured.out.contents().is_empty());
        assert!(captured.err.contents().is_empty());
    }

    #[test]
    fn failing_last_token_is_shown() {
        let (out, err) = output_of("(1 / 0)");
        assert!(out.is_empty());
        assert_eq!(err, "division by zero\n");
    }

    #[test]
    fn lexing_errors_are_printed() {
        let (out, err) = output_of("echo \"unterminated");
        assert!(out.is_empty());
        assert!(!err.is_empty());
    }

    #[test]
    fn exit_is_matched_after_trimming() {
        let (mut sh, captured) = shell();
        let mut editor = Scripted::new(&["echo one", "echo two", " exit ", "echo never"]);
        sh.repl(&mut editor).unwrap();
        assert_eq!(captured.out.contents(), "one\ntwo\n");
        assert_eq!(
            editor.seen_history,
            vec![
                vec![],
                vec!["echo one".to_string()],
                vec!["echo two".to_string(), "echo one".to_string()],
            ]
        );
        assert_eq!(editor.lines.len(), 1);
    }

    #[test]
    fn prompt_leaves_the_cursor_alone() {
        let (mut sh, captured) = shell_with_cursor();
        let mut editor = Scripted::new(&["echo one", "exit"]);
        sh.repl(&mut editor).unwrap();
        assert_eq!(captured.out.contents(), "one\n");
        assert!(captured.term.contents().is_empty());
    }
}
