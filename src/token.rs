//! Tokens of one entered line and the value threaded between them.

/// One executable (or presentation-only) unit of a parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A built-in or external program invocation.
    Command { name: String, args: Vec<String> },
    /// A fenced expression block, fences included, e.g. `(String.length)`.
    Code(String),
    /// Forwards the previous result to the next token.
    Pipe,
    /// Writes the previous result to the file at the given path.
    Out(String),
    /// A run of blanks between two tokens.
    Whitespace(String),
    /// A line break inside the entered text.
    LineBreak,
}

impl Token {
    /// Builds a command token from string slices.
    pub fn command(name: impl Into<String>, args: &[&str]) -> Self {
        Token::Command {
            name: name.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Whitespace and line breaks carry no executable meaning.
    pub fn is_presentation(&self) -> bool {
        matches!(self, Token::Whitespace(_) | Token::LineBreak)
    }
}

/// Success or failure of one pipeline step, threaded into the next step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineResult {
    Ok(String),
    Error(String),
}

impl PipelineResult {
    pub fn empty() -> Self {
        PipelineResult::Ok(String::new())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PipelineResult::Error(_))
    }

    /// The carried text, output or error message alike.
    pub fn content(&self) -> &str {
        match self {
            PipelineResult::Ok(s) | PipelineResult::Error(s) => s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presentation_tokens() {
        assert!(Token::Whitespace("  ".into()).is_presentation());
        assert!(Token::LineBreak.is_presentation());
        assert!(!Token::Pipe.is_presentation());
        assert!(!Token::command("ls", &[]).is_presentation());
    }

    #[test]
    fn result_content_and_error_flag() {
        let ok = PipelineResult::Ok("out".into());
        let err = PipelineResult::Error("boom".into());
        assert!(!ok.is_error());
        assert!(err.is_error());
        assert_eq!(ok.content(), "out");
        assert_eq!(err.content(), "boom");
        assert_eq!(PipelineResult::empty(), PipelineResult::Ok(String::new()));
    }
}
