use argh::FromArgs;
use log::{LevelFilter, debug};
use pipeshell::{Console, RustylineEditor, ScriptEngine, Shell};
use std::env;

/// Interactive shell with pipelines of commands and inline expressions.
#[derive(FromArgs)]
struct Args {
    /// disable coloured output (also set by NO_COLOR)
    #[argh(switch)]
    no_color: bool,

    /// leave the terminal cursor alone
    #[argh(switch)]
    no_cursor: bool,

    /// run a single line and exit
    #[argh(option, short = 'c')]
    command: Option<String>,

    /// log what the shell is doing
    #[argh(switch, short = 'v')]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Error
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let color = !args.no_color && env::var_os("NO_COLOR").is_none();
    let console = Console::stdio(color, !args.no_cursor);
    let mut shell = Shell::new(Box::new(ScriptEngine::new()), console);

    match args.command {
        Some(line) => {
            debug!("running single line");
            shell.run_line(&line);
            Ok(())
        }
        None => {
            let mut editor = RustylineEditor::new()?;
            shell.repl(&mut editor)
        }
    }
}
