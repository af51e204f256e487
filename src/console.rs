//! The user-visible surface: where live output goes and how it looks.

use crossterm::style::Stylize;
use crossterm::{cursor, execute};
use std::cell::{Cell, RefCell};
use std::io::{self, Result as IoResult, Write};
use std::rc::Rc;

/// Memory-backed writer for capturing console output.
///
/// Clones share the same buffer, so a handle kept by the caller sees
/// everything written through the console.
#[derive(Clone, Default)]
pub struct MemWriter {
    buf: Rc<RefCell<Vec<u8>>>,
}

impl MemWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.borrow()).into_owned()
    }
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.buf.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

/// Handles to the buffers of a captured [`Console`].
#[derive(Clone)]
pub struct Captured {
    pub out: MemWriter,
    pub err: MemWriter,
    /// Cursor control sequences.
    pub term: MemWriter,
}

/// Rendering context handed to live sinks and the process launcher.
///
/// Colour and cursor handling are explicit settings of this value rather
/// than global terminal state.
pub struct Console {
    color: bool,
    manage_cursor: bool,
    /// Last visibility written to `term`. Terminals start with it shown.
    cursor_visible: Cell<bool>,
    out: RefCell<Box<dyn Write>>,
    err: RefCell<Box<dyn Write>>,
    /// Where cursor control sequences go.
    term: RefCell<Box<dyn Write>>,
}

impl Console {
    /// A console writing to the process's standard streams.
    pub fn stdio(color: bool, manage_cursor: bool) -> Self {
        Self {
            color,
            manage_cursor,
            cursor_visible: Cell::new(true),
            out: RefCell::new(Box::new(io::stdout())),
            err: RefCell::new(Box::new(io::stderr())),
            term: RefCell::new(Box::new(io::stdout())),
        }
    }

    /// A plain console whose output is kept in memory.
    pub fn captured() -> (Self, Captured) {
        let captured = Captured {
            out: MemWriter::new(),
            err: MemWriter::new(),
            term: MemWriter::new(),
        };
        let console = Self {
            color: false,
            manage_cursor: false,
            cursor_visible: Cell::new(true),
            out: RefCell::new(Box::new(captured.out.clone())),
            err: RefCell::new(Box::new(captured.err.clone())),
            term: RefCell::new(Box::new(captured.term.clone())),
        };
        (console, captured)
    }

    /// Like [`Console::captured`], with cursor management on.
    #[cfg(test)]
    pub(crate) fn captured_with_cursor() -> (Self, Captured) {
        let (mut console, captured) = Self::captured();
        console.manage_cursor = true;
        (console, captured)
    }

    /// Renders successful output as one line.
    pub fn print_out(&self, text: &str) {
        let mut out = self.out.borrow_mut();
        // A console that can't be written to has nowhere to report it.
        let _ = writeln!(out, "{}", text);
        let _ = out.flush();
    }

    /// Renders error output as one line, in red when colour is on.
    pub fn print_error(&self, text: &str) {
        let mut err = self.err.borrow_mut();
        let _ = if self.color {
            writeln!(err, "{}", text.red())
        } else {
            writeln!(err, "{}", text)
        };
        let _ = err.flush();
    }

    /// The prompt for the given working directory.
    pub fn prompt(&self, cwd: &str) -> String {
        if self.color {
            format!("{} > ", cwd.cyan())
        } else {
            format!("{} > ", cwd)
        }
    }

    /// Shows the text cursor until the returned guard is dropped, then puts
    /// back the visibility it had before.
    pub fn visible_cursor(&self) -> CursorGuard<'_> {
        let was_visible = self.cursor_visible.get();
        self.set_cursor_visible(true);
        CursorGuard {
            console: self,
            was_visible,
        }
    }

    fn set_cursor_visible(&self, visible: bool) {
        if !self.manage_cursor {
            return;
        }
        let mut term = self.term.borrow_mut();
        let _ = if visible {
            execute!(term, cursor::Show)
        } else {
            execute!(term, cursor::Hide)
        };
        self.cursor_visible.set(visible);
    }
}

/// Restores the cursor visibility seen by [`Console::visible_cursor`].
pub struct CursorGuard<'a> {
    console: &'a Console,
    was_visible: bool,
}

impl Drop for CursorGuard<'_> {
    fn drop(&mut self) {
        if !self.was_visible {
            self.console.set_cursor_visible(false);
        }
    }
}
