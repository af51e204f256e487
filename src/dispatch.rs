//! Resolves a command name to a built-in or an external program.

use crate::builtin::Builtin;
use crate::console::Console;
use crate::env::Environment;
use crate::external;
use crate::sink::Sink;
use log::debug;

/// Names that always reach the help built-in.
pub const HELP_NAMES: [&str; 2] = ["help", "?"];

/// Ends option parsing for built-ins.
const END_OF_OPTIONS: &str = "--";

/// Run `command` with `args`, the piped value (if any) appended as the
/// final argument.
///
/// A piped value starting with `-` is kept from being read as a flag by a
/// built-in: `--` goes in front of the first positional argument.
pub fn run(
    command: &str,
    args: &[String],
    piped: &str,
    env: &mut Environment,
    console: &Console,
    sink: &mut dyn Sink,
) {
    let builtin = if HELP_NAMES.contains(&command) {
        Some(Builtin::Help)
    } else {
        Builtin::lookup(command)
    };

    let mut args = args.to_vec();
    if !piped.is_empty() {
        if builtin.is_some() && piped.starts_with('-') {
            end_options(&mut args);
        }
        args.push(piped.to_string());
    }

    match builtin {
        Some(builtin) => {
            debug!("{} -> builtin {:?}", command, builtin);
            builtin.run(&args, sink, env);
        }
        None => {
            debug!("{} -> external", command);
            external::launch(command, &args, env, console, sink);
        }
    }
}

/// Built-ins only take switches, so the first word without a leading `-`
/// starts the positionals. Once a greedy positional has begun, argh keeps a
/// later `--` as text, hence the separator goes before it.
fn end_options(args: &mut Vec<String>) {
    if args.iter().any(|arg| arg == END_OF_OPTIONS) {
        return;
    }
    let at = args
        .iter()
        .position(|arg| !arg.starts_with('-'))
        .unwrap_or(args.len());
    args.insert(at, END_OF_OPTIONS.to_string());
}
