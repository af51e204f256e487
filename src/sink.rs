//! Per-token output capture.

use crate::console::Console;
use crate::token::PipelineResult;

/// Receiver of a unit's output and error text.
///
/// Built-ins, the process launcher and the expression evaluator all report
/// through this trait, never directly to the terminal.
pub trait Sink {
    fn write_out(&mut self, text: &str);
    fn write_error(&mut self, text: &str);
}

/// Streams to the console for the last token of a line, buffers otherwise.
///
/// A fresh sink is created for every token execution.
pub struct OutputSink<'c> {
    console: &'c Console,
    live: bool,
    output: String,
    error: Option<String>,
}

impl<'c> OutputSink<'c> {
    pub fn new(is_last_token: bool, console: &'c Console) -> Self {
        Self {
            console,
            live: is_last_token,
            output: String::new(),
            error: None,
        }
    }

    /// `Error` if anything was written to the error path, otherwise `Ok`
    /// with the buffered output (always empty for a live sink).
    pub fn into_result(self) -> PipelineResult {
        match self.error {
            Some(message) => PipelineResult::Error(message),
            None => PipelineResult::Ok(self.output),
        }
    }
}

fn append_line(buf: &mut String, text: &str) {
    if !buf.is_empty() {
        buf.push('\n');
    }
    buf.push_str(text);
}

impl Sink for OutputSink<'_> {
    fn write_out(&mut self, text: &str) {
        if self.live {
            self.console.print_out(text);
        } else {
            append_line(&mut self.output, text);
        }
    }

    fn write_error(&mut self, text: &str) {
        if self.live {
            self.console.print_error(text);
        }
        append_line(self.error.get_or_insert_with(String::new), text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffered_output_joins_lines() {
        let (console, captured) = Console::captured();
        let mut sink = OutputSink::new(false, &console);
        sink.write_out("a");
        sink.write_out("b");
        assert_eq!(sink.into_result(), PipelineResult::Ok("a\nb".to_string()));
        assert!(captured.out.contents().is_empty());
    }

    #[test]
    fn untouched_sink_is_empty_ok() {
        let (console, _) = Console::captured();
        let sink = OutputSink::new(false, &console);
        assert_eq!(sink.into_result(), PipelineResult::empty());
    }

    #[test]
    fn error_takes_precedence() {
        let (console, captured) = Console::captured();
        let mut sink = OutputSink::new(false, &console);
        sink.write_out("partial");
        sink.write_error("failed");
        sink.write_out("more");
        assert_eq!(
            sink.into_result(),
            PipelineResult::Error("failed".to_string())
        );
        assert!(captured.err.contents().is_empty());
    }

    #[test]
    fn live_sink_streams_immediately() {
        let (console, captured) = Console::captured();
        let mut sink = OutputSink::new(true, &console);
        sink.write_out("one");
        assert_eq!(captured.out.contents(), "one\n");
        sink.write_error("bad");
        assert_eq!(captured.err.contents(), "bad\n");
        assert_eq!(sink.into_result(), PipelineResult::Error("bad".to_string()));
    }

    #[test]
    fn live_output_is_not_retrievable() {
        let (console, _) = Console::captured();
        let mut sink = OutputSink::new(true, &console);
        sink.write_out("shown");
        assert_eq!(sink.into_result(), PipelineResult::empty());
    }
}
