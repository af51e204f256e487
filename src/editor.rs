//! Reading lines from the user.

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::collections::VecDeque;

/// Word the core loop stops on.
pub const EXIT_KEYWORD: &str = "exit";

/// Source of entered lines.
pub trait LineEditor {
    /// Read one line. `history` holds earlier lines, newest first.
    fn read_line(&mut self, prompt: &str, history: &VecDeque<String>) -> anyhow::Result<String>;
}

/// Interactive editor backed by rustyline.
pub struct RustylineEditor {
    rl: DefaultEditor,
}

impl RustylineEditor {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            rl: DefaultEditor::new()?,
        })
    }
}

impl LineEditor for RustylineEditor {
    fn read_line(&mut self, prompt: &str, history: &VecDeque<String>) -> anyhow::Result<String> {
        // The shell owns history; the editor only gets a copy for recall.
        self.rl.clear_history()?;
        for line in history.iter().rev() {
            self.rl.add_history_entry(line.as_str())?;
        }

        match self.rl.readline(prompt) {
            Ok(line) => Ok(line),
            Err(ReadlineError::Interrupted) => Ok(String::new()),
            Err(ReadlineError::Eof) => Ok(EXIT_KEYWORD.to_string()),
            Err(err) => Err(err.into()),
        }
    }
}
