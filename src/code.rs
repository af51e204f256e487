//! Feeding a previous result into a `( ... )` code block.

use crate::sink::Sink;
use log::debug;

pub const OPEN_FENCE: char = '(';
pub const CLOSE_FENCE: char = ')';

/// Code fragment that evaluates the piped text itself as source.
pub const EVAL_PIPED: &str = "*";

/// An embedded language the shell can hand code blocks to.
///
/// State such as bound names persists between calls.
pub trait Evaluator {
    /// Run statement-level source; may bind names for later evaluations.
    fn eval_interaction(&mut self, source: &str, sink: &mut dyn Sink);

    /// Evaluate a single expression and report its value.
    fn eval_expression(&mut self, source: &str, sink: &mut dyn Sink);
}

/// Drops the opening fence, and the closing one when present.
pub fn strip_fences(raw: &str) -> &str {
    let body = raw.strip_prefix(OPEN_FENCE).unwrap_or(raw);
    body.strip_suffix(CLOSE_FENCE).unwrap_or(body)
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Expression applying `code` to `last`, bound as `piped`.
///
/// Multi-line text becomes a `string[]` of its non-empty lines, anything
/// else a single `string`.
pub fn piped_source(last: &str, code: &str) -> String {
    if last.contains('\n') {
        let items: Vec<String> = last
            .lines()
            .filter(|line| !line.is_empty())
            .map(quote)
            .collect();
        format!(
            "let piped : string[] = [{}] in ({}) piped",
            items.join("; "),
            code
        )
    } else {
        format!("let piped : string = {} in ({}) piped", quote(last), code)
    }
}

/// Run one code token. `last` is the previous step's output, empty when
/// nothing was piped in.
pub fn run_code(last: &str, raw: &str, evaluator: &mut dyn Evaluator, sink: &mut dyn Sink) {
    let code = strip_fences(raw);
    if last.is_empty() {
        debug!("interaction: {}", code);
        evaluator.eval_interaction(code, sink);
    } else if code.trim() == EVAL_PIPED {
        debug!("evaluating piped text as source");
        evaluator.eval_expression(last, sink);
    } else {
        let source = piped_source(last, code);
        debug!("expression: {}", source);
        evaluator.eval_expression(&source, sink);
    }
}
