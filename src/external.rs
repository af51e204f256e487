//! Launching external programs.

use crate::console::Console;
use crate::env::Environment;
use crate::sink::Sink;
use log::{debug, warn};
use std::io::{self, BufRead, BufReader, Read};
use std::iter;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Sender};
use std::thread;

/// Program that opens a file with its associated application on Windows.
pub const ASSOCIATION_HELPER: &str = "explorer.exe";

/// `ERROR_BAD_EXE_FORMAT`
const WINDOWS_BAD_EXE_FORMAT: i32 = 193;
/// `ENOEXEC`
const UNIX_EXEC_FORMAT: i32 = 8;

/// Host operating system family, as far as launching is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }
}

/// Whether a start failure means "this file is not an executable format".
pub fn is_not_executable(err: &io::Error, platform: Platform) -> bool {
    matches!(
        (platform, err.raw_os_error()),
        (Platform::Windows, Some(WINDOWS_BAD_EXE_FORMAT)) | (Platform::Unix, Some(UNIX_EXEC_FORMAT))
    )
}

/// The retry to attempt after a failed start, if any.
///
/// Only a non-executable file on Windows is retried, through the
/// association helper with the file name as its first argument.
pub fn association_fallback(
    err: &io::Error,
    platform: Platform,
    file_name: &str,
    args: &[String],
) -> Option<(String, Vec<String>)> {
    if platform == Platform::Windows && is_not_executable(err, platform) {
        let helper_args = iter::once(file_name.to_string())
            .chain(args.iter().cloned())
            .collect();
        Some((ASSOCIATION_HELPER.to_string(), helper_args))
    } else {
        None
    }
}

/// Joins arguments into one command line. Nothing is quoted or escaped.
pub fn command_line(args: &[String]) -> String {
    args.join(" ")
}

enum Failure {
    Start(io::Error),
    Wait(io::Error),
}

#[derive(Clone, Copy)]
enum Stream {
    Out,
    Err,
}

/// Run `file_name` to completion, forwarding its output line by line.
///
/// Standard input stays attached to the terminal so interactive programs
/// work. Start failures are reported as `"<file_name>: <message>"`.
pub fn launch(
    file_name: &str,
    args: &[String],
    env: &Environment,
    console: &Console,
    sink: &mut dyn Sink,
) {
    let err = match run_to_exit(file_name, args, env, console, sink) {
        Ok(()) => return,
        Err(Failure::Wait(err)) => err,
        Err(Failure::Start(err)) => {
            match association_fallback(&err, Platform::current(), file_name, args) {
                Some((helper, helper_args)) => {
                    warn!("{} is not executable, retrying via {}", file_name, helper);
                    match run_to_exit(&helper, &helper_args, env, console, sink) {
                        Ok(()) => return,
                        Err(Failure::Start(err) | Failure::Wait(err)) => err,
                    }
                }
                None => err,
            }
        }
    };
    debug!("launch of {} failed: {}", file_name, err);
    sink.write_error(&format!("{}: {}", file_name, err));
}

fn build_command(file_name: &str, args: &[String], env: &Environment) -> Command {
    let line = command_line(args);
    let mut command = Command::new(file_name);
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        if !line.is_empty() {
            command.raw_arg(&line);
        }
    }
    #[cfg(not(windows))]
    command.args(line.split(' ').filter(|a| !a.is_empty()));
    command
        .envs(env.vars.iter())
        .current_dir(&env.current_dir)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    command
}

fn run_to_exit(
    file_name: &str,
    args: &[String],
    env: &Environment,
    console: &Console,
    sink: &mut dyn Sink,
) -> Result<(), Failure> {
    let mut child = build_command(file_name, args, env)
        .spawn()
        .map_err(Failure::Start)?;
    debug!("started {} (pid {})", file_name, child.id());

    let _cursor = console.visible_cursor();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (tx, rx) = mpsc::channel();

    thread::scope(|scope| {
        if let Some(out) = stdout {
            let tx = tx.clone();
            scope.spawn(move || forward_lines(out, Stream::Out, &tx));
        }
        if let Some(err) = stderr {
            let tx = tx.clone();
            scope.spawn(move || forward_lines(err, Stream::Err, &tx));
        }
        drop(tx);
        for (stream, line) in rx {
            match stream {
                Stream::Out => sink.write_out(&line),
                Stream::Err => sink.write_error(&line),
            }
        }
    });

    let status = child.wait().map_err(Failure::Wait)?;
    debug!("{} exited with {}", file_name, status);
    Ok(())
}

fn forward_lines(reader: impl Read, stream: Stream, tx: &Sender<(Stream, String)>) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']).to_string();
                if tx.send((stream, line)).is_err() {
                    break;
                }
            }
        }
    }
}
