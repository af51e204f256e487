use crate::env::Environment;
use crate::sink::Sink;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use regex::RegexBuilder;
use std::fs;
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process, reporting through the [`Sink`] they are given.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "ls" or "cd".
    fn name() -> &'static str;

    /// Executes the command. Errors are rendered on the sink's error path.
    fn execute(self, sink: &mut dyn Sink, env: &mut Environment) -> Result<()>;
}

/// Parse `args` for `T` and run it.
fn invoke<T: BuiltinCommand>(args: &[String], sink: &mut dyn Sink, env: &mut Environment) {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match T::from_args(&[T::name()], &args) {
        Ok(cmd) => {
            if let Err(e) = cmd.execute(sink, env) {
                sink.write_error(&format!("{:#}", e));
            }
        }
        Err(EarlyExit { output, status }) => match status {
            Ok(()) => sink.write_out(output.trim_end()),
            Err(()) => sink.write_error(output.trim_end()),
        },
    }
}

/// The usage text argh generates for `T`.
fn usage<T: BuiltinCommand>() -> String {
    match T::from_args(&[T::name()], &["--help"]) {
        Err(EarlyExit { output, .. }) => output.trim_end().to_string(),
        Ok(_) => String::new(),
    }
}

/// Registry of built-in commands, keyed by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Cd,
    Ls,
    Pwd,
    Echo,
    Grep,
    Help,
}

impl Builtin {
    pub const ALL: [Builtin; 6] = [
        Builtin::Cd,
        Builtin::Ls,
        Builtin::Pwd,
        Builtin::Echo,
        Builtin::Grep,
        Builtin::Help,
    ];

    pub fn lookup(name: &str) -> Option<Builtin> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Cd => Cd::name(),
            Builtin::Ls => Ls::name(),
            Builtin::Pwd => Pwd::name(),
            Builtin::Echo => Echo::name(),
            Builtin::Grep => Grep::name(),
            Builtin::Help => Help::name(),
        }
    }

    /// One-line description for the help listing.
    pub fn summary(self) -> &'static str {
        match self {
            Builtin::Cd => "change the working directory",
            Builtin::Ls => "list directory entries",
            Builtin::Pwd => "print the working directory",
            Builtin::Echo => "print the arguments",
            Builtin::Grep => "print lines matching a regular expression",
            Builtin::Help => "show this help, or the usage of one command",
        }
    }

    pub fn usage(self) -> String {
        match self {
            Builtin::Cd => usage::<Cd>(),
            Builtin::Ls => usage::<Ls>(),
            Builtin::Pwd => usage::<Pwd>(),
            Builtin::Echo => usage::<Echo>(),
            Builtin::Grep => usage::<Grep>(),
            Builtin::Help => usage::<Help>(),
        }
    }

    pub fn run(self, args: &[String], sink: &mut dyn Sink, env: &mut Environment) {
        match self {
            Builtin::Cd => invoke::<Cd>(args, sink, env),
            Builtin::Ls => invoke::<Ls>(args, sink, env),
            Builtin::Pwd => invoke::<Pwd>(args, sink, env),
            Builtin::Echo => invoke::<Echo>(args, sink, env),
            Builtin::Grep => invoke::<Grep>(args, sink, env),
            Builtin::Help => invoke::<Help>(args, sink, env),
        }
    }
}

#[derive(FromArgs)]
/// Print the current working directory.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(self, sink: &mut dyn Sink, env: &mut Environment) -> Result<()> {
        sink.write_out(&env.current_dir.to_string_lossy());
        Ok(())
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _sink: &mut dyn Sink, env: &mut Environment) -> Result<()> {
        let target = match &self.target {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => env
                .home()
                .ok_or_else(|| anyhow::anyhow!("cd: no target and HOME not set"))?,
        };

        env.change_dir(target).context("cd")
    }
}

#[derive(FromArgs)]
/// List the entries of a directory, directories marked with a trailing slash.
pub struct Ls {
    #[argh(switch, short = 'a')]
    /// include entries whose names start with a dot.
    pub all: bool,

    #[argh(positional)]
    /// directory to list; defaults to the current directory.
    pub dir: Option<String>,
}

impl BuiltinCommand for Ls {
    fn name() -> &'static str {
        "ls"
    }

    fn execute(self, sink: &mut dyn Sink, env: &mut Environment) -> Result<()> {
        let dir = env.resolve(self.dir.as_deref().unwrap_or("."));
        let entries = fs::read_dir(&dir)
            .with_context(|| format!("ls: cannot access {}", dir.display()))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("ls: cannot read {}", dir.display()))?;
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') && !self.all {
                continue;
            }
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                name.push('/');
            }
            names.push(name);
        }
        names.sort();

        if !names.is_empty() {
            sink.write_out(&names.join("\n"));
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// Write the arguments to the output, separated by spaces.
pub struct Echo {
    #[argh(positional, greedy)]
    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(self, sink: &mut dyn Sink, _env: &mut Environment) -> Result<()> {
        sink.write_out(&self.args.join(" "));
        Ok(())
    }
}

#[derive(FromArgs)]
/// Print the lines of the given text that match a pattern.
pub struct Grep {
    #[argh(switch, short = 'i')]
    /// ignore case distinctions
    pub ignore_case: bool,

    #[argh(switch, short = 'v')]
    /// select non-matching lines
    pub invert_match: bool,

    #[argh(positional)]
    /// the pattern to search for (a regular expression)
    pub pattern: String,

    #[argh(positional, greedy)]
    /// text to search; usually the piped value
    pub text: Vec<String>,
}

impl BuiltinCommand for Grep {
    fn name() -> &'static str {
        "grep"
    }

    fn execute(self, sink: &mut dyn Sink, _env: &mut Environment) -> Result<()> {
        let re = RegexBuilder::new(&self.pattern)
            .case_insensitive(self.ignore_case)
            .build()
            .with_context(|| format!("grep: invalid regex pattern: {}", self.pattern))?;

        let matched: Vec<&str> = self
            .text
            .iter()
            .flat_map(|t| t.lines())
            .filter(|line| re.is_match(line) != self.invert_match)
            .collect();

        if !matched.is_empty() {
            sink.write_out(&matched.join("\n"));
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// Show the built-in commands and the pipeline syntax.
pub struct Help {
    #[argh(positional)]
    /// command to show the usage of.
    pub topic: Option<String>,
}

const SYNTAX: &str = "\
Syntax:
  cmd args            run a built-in or an external program
  a | b               pass the output of a to b as its last argument
  (expr)              evaluate an expression; a piped value is bound to `piped`
  (*)                 evaluate the piped value itself as an expression
  a > file            write the output of a to file
  exit                leave the shell";

impl BuiltinCommand for Help {
    fn name() -> &'static str {
        "help"
    }

    fn execute(self, sink: &mut dyn Sink, _env: &mut Environment) -> Result<()> {
        match self.topic.as_deref() {
            None => {
                let mut text = String::from("Built-in commands:\n");
                for builtin in Builtin::ALL {
                    text.push_str(&format!("  {:<8}{}\n", builtin.name(), builtin.summary()));
                }
                text.push('\n');
                text.push_str(SYNTAX);
                sink.write_out(&text);
                Ok(())
            }
            Some("?") => {
                sink.write_out(&Builtin::Help.usage());
                Ok(())
            }
            Some(topic) => {
                let builtin = Builtin::lookup(topic)
                    .ok_or_else(|| anyhow::anyhow!("help: no help for '{}'", topic))?;
                sink.write_out(&builtin.usage());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::Console;
    use crate::sink::OutputSink;
    use crate::token::PipelineResult;
    use std::collections::HashMap;
    use std::env as stdenv;
    use std::sync::{Mutex, MutexGuard, OnceLock};

    fn lock_current_dir() -> MutexGuard<'static, ()> {
        static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        MUTEX
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn test_env(dir: PathBuf) -> Environment {
        Environment {
            vars: HashMap::new(),
            current_dir: dir,
        }
    }

    fn run(builtin: Builtin, args: &[&str], env: &mut Environment) -> PipelineResult {
        let (console, _) = Console::captured();
        let mut sink = OutputSink::new(false, &console);
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        builtin.run(&args, &mut sink, env);
        sink.into_result()
    }

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(Builtin::lookup("cd"), Some(Builtin::Cd));
        assert_eq!(Builtin::lookup("grep"), Some(Builtin::Grep));
        assert_eq!(Builtin::lookup("git"), None);
        for builtin in Builtin::ALL {
            assert_eq!(Builtin::lookup(builtin.name()), Some(builtin));
        }
    }

    #[test]
    fn test_pwd_prints_current_dir() {
        let cur = stdenv::current_dir().unwrap();
        let mut env = test_env(cur.clone());
        assert_eq!(
            run(Builtin::Pwd, &[], &mut env),
            PipelineResult::Ok(cur.to_string_lossy().into_owned())
        );
    }

    #[test]
    fn test_echo_joins_arguments() {
        let mut env = test_env(PathBuf::from("."));
        assert_eq!(
            run(Builtin::Echo, &["hello", "world"], &mut env),
            PipelineResult::Ok("hello world".to_string())
        );
    }

    #[test]
    fn test_unknown_flag_is_an_error() {
        let mut env = test_env(PathBuf::from("."));
        assert!(run(Builtin::Pwd, &["--bogus"], &mut env).is_error());
    }

    #[test]
    fn test_help_flag_is_output() {
        let mut env = test_env(PathBuf::from("."));
        match run(Builtin::Ls, &["--help"], &mut env) {
            PipelineResult::Ok(text) => assert!(text.contains("Usage: ls")),
            other => panic!("expected usage, got {:?}", other),
        }
    }

    #[test]
    fn test_ls_sorts_and_marks_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "").unwrap();
        fs::write(dir.path().join(".hidden"), "").unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        let mut env = test_env(dir.path().to_path_buf());

        assert_eq!(
            run(Builtin::Ls, &[], &mut env),
            PipelineResult::Ok("a/\nb.txt".to_string())
        );
        assert_eq!(
            run(Builtin::Ls, &["-a"], &mut env),
            PipelineResult::Ok(".hidden\na/\nb.txt".to_string())
        );
    }

    #[test]
    fn test_ls_missing_dir_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = test_env(dir.path().to_path_buf());
        assert!(run(Builtin::Ls, &["missing"], &mut env).is_error());
    }

    #[test]
    fn test_grep_filters_piped_lines() {
        let mut env = test_env(PathBuf::from("."));
        assert_eq!(
            run(Builtin::Grep, &["^b", "apple\nbanana\nblueberry"], &mut env),
            PipelineResult::Ok("banana\nblueberry".to_string())
        );
        assert_eq!(
            run(Builtin::Grep, &["-v", "-i", "^B", "apple\nbanana"], &mut env),
            PipelineResult::Ok("apple".to_string())
        );
    }

    #[test]
    fn test_grep_invalid_pattern_errors() {
        let mut env = test_env(PathBuf::from("."));
        match run(Builtin::Grep, &["(", "text"], &mut env) {
            PipelineResult::Error(message) => assert!(message.starts_with("grep: invalid regex")),
            other => panic!("expected an error, got {:?}", other),
        }
    }

    #[test]
    fn test_help_lists_builtins() {
        let mut env = test_env(PathBuf::from("."));
        match run(Builtin::Help, &[], &mut env) {
            PipelineResult::Ok(text) => {
                for builtin in Builtin::ALL {
                    assert!(text.contains(builtin.name()));
                }
                assert!(text.contains("(*)"));
            }
            other => panic!("expected help text, got {:?}", other),
        }
    }

    #[test]
    fn test_help_for_one_command() {
        let mut env = test_env(PathBuf::from("."));
        match run(Builtin::Help, &["grep"], &mut env) {
            PipelineResult::Ok(text) => assert!(text.contains("Usage: grep")),
            other => panic!("expected usage, got {:?}", other),
        }
        assert!(run(Builtin::Help, &["nope"], &mut env).is_error());
    }

    #[test]
    fn test_cd_to_absolute_path() {
        let _lock = lock_current_dir();
        let temp = tempfile::tempdir().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();
        let orig = stdenv::current_dir().unwrap();
        let mut env = test_env(orig.clone());

        let target = canonical_temp.to_string_lossy().into_owned();
        let result = run(Builtin::Cd, &[target.as_str()], &mut env);
        let new_cwd = fs::canonicalize(stdenv::current_dir().unwrap()).unwrap();
        stdenv::set_current_dir(&orig).expect("failed to restore cwd");

        assert_eq!(result, PipelineResult::empty());
        assert_eq!(new_cwd, canonical_temp);
        assert_eq!(env.current_dir, canonical_temp);
    }

    #[test]
    fn test_cd_to_home_when_none() {
        let _lock = lock_current_dir();
        let temp = tempfile::tempdir().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();
        let orig = stdenv::current_dir().unwrap();
        let mut env = test_env(orig.clone());
        env.vars.insert(
            "HOME".to_string(),
            canonical_temp.to_string_lossy().into_owned(),
        );

        let result = run(Builtin::Cd, &[], &mut env);
        stdenv::set_current_dir(&orig).expect("failed to restore cwd");

        assert_eq!(result, PipelineResult::empty());
        assert_eq!(env.current_dir, canonical_temp);
    }

    #[test]
    fn test_cd_nonexistent_path_errors() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();
        let mut env = test_env(orig.clone());

        let name = format!("nonexistent_dir_for_pipeshell_test_{}", std::process::id());
        let result = run(Builtin::Cd, &[name.as_str()], &mut env);

        assert!(result.is_error());
        assert_eq!(stdenv::current_dir().unwrap(), orig);
    }
}
