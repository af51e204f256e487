use anyhow::{Context, Result};
use std::collections::HashMap;
use std::env as stdenv;
use std::fs;
use std::path::{Path, PathBuf};

/// What launched programs and path-taking commands see of the shell.
///
/// `vars` is the environment handed to every launched program, captured
/// once at start-up. `current_dir` is where relative paths (built-in
/// arguments, `>` targets, program working directories) are resolved.
#[derive(Debug, Clone)]
pub struct Environment {
    pub vars: HashMap<String, String>,
    pub current_dir: PathBuf,
}

impl Environment {
    /// Snapshot of the process environment and working directory.
    pub fn new() -> Self {
        let vars = stdenv::vars().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { vars, current_dir }
    }

    /// The user's home directory, from `HOME` or else `USERPROFILE`.
    pub fn home(&self) -> Option<PathBuf> {
        ["HOME", "USERPROFILE"]
            .iter()
            .filter_map(|key| self.vars.get(*key))
            .find(|value| !value.is_empty())
            .map(PathBuf::from)
    }

    /// Resolve `path` against the current directory.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.current_dir.join(path)
        }
    }

    /// Make `target` the working directory of the shell and of the process.
    ///
    /// On failure neither is changed.
    pub fn change_dir(&mut self, target: impl AsRef<Path>) -> Result<()> {
        let target = self.resolve(target);
        let canonical = fs::canonicalize(&target)
            .with_context(|| format!("can't canonicalize {}", target.display()))?;
        stdenv::set_current_dir(&canonical)
            .with_context(|| format!("can't chdir to {}", canonical.display()))?;
        self.current_dir = canonical;
        Ok(())
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
