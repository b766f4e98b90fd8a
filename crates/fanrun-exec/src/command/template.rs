use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::{Captures, Regex};
use tracing::trace;

use fanrun_model::TaskDescriptor;

use super::{RenderedCommand, quote};
use crate::error::ExecError;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@(?:TASK|ARG(?:_(\d+))?)@").expect("placeholder pattern is valid")
});

enum Placeholder {
    Task,
    /// 0-based argument position.
    Arg(usize),
    /// `@ARG_0@` or an index that does not fit.
    Invalid,
}

impl Placeholder {
    fn of(caps: &Captures<'_>) -> Self {
        let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        if whole == "@TASK@" {
            return Placeholder::Task;
        }
        match caps.get(1) {
            None => Placeholder::Arg(0),
            Some(n) => match n.as_str().parse::<usize>() {
                Ok(i) if i > 0 => Placeholder::Arg(i - 1),
                _ => Placeholder::Invalid,
            },
        }
    }
}

/// Command template shared by every task of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    template: String,
    env_vars: Vec<String>,
}

impl CommandTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            env_vars: Vec::new(),
        }
    }

    /// Bind the i-th name to the i-th argument of argument tasks.
    ///
    /// Names beyond the available arguments are skipped; blank names are ignored.
    pub fn with_env_vars<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.env_vars = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        self
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.template
    }

    #[inline]
    pub fn env_vars(&self) -> &[String] {
        &self.env_vars
    }

    pub fn is_blank(&self) -> bool {
        self.template.trim().is_empty()
    }

    /// Verify that every placeholder can be filled for `task`, without touching the filesystem.
    pub fn check(&self, task: &TaskDescriptor) -> Result<(), ExecError> {
        let available = task.args().len();
        let unmatched = PLACEHOLDER
            .captures_iter(&self.template)
            .filter(|caps| match Placeholder::of(caps) {
                Placeholder::Task => false,
                Placeholder::Arg(i) => i >= available,
                Placeholder::Invalid => true,
            })
            .filter_map(|caps| caps.get(0).map(|m| m.as_str().to_string()))
            .collect::<Vec<_>>();

        if unmatched.is_empty() {
            Ok(())
        } else {
            Err(ExecError::UnmatchedPlaceholders(sort_unmatched(unmatched)))
        }
    }

    /// Check every task; returns the 0-based position and error of each one that fails.
    pub fn check_all(&self, tasks: &[TaskDescriptor]) -> Vec<(usize, ExecError)> {
        tasks
            .iter()
            .enumerate()
            .filter_map(|(i, t)| self.check(t).err().map(|e| (i, e)))
            .collect()
    }

    /// Render `task` into an argv vector plus environment bindings.
    ///
    /// Fails with [`ExecError::UnmatchedPlaceholders`] when an argument placeholder has no value and with
    /// [`ExecError::Security`] when the result cannot be split, is empty, or holds a token longer than
    /// `max_arg_len` characters.
    pub fn build(
        &self,
        task: &TaskDescriptor,
        max_arg_len: usize,
    ) -> Result<RenderedCommand, ExecError> {
        let task_path = absolute_path(task.source_path());
        let task_path = task_path.to_string_lossy();
        let args = task.args();

        let mut rendered = String::with_capacity(self.template.len() + task_path.len());
        let mut unmatched = Vec::new();
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(&self.template) {
            let Some(m) = caps.get(0) else { continue };
            rendered.push_str(&self.template[last..m.start()]);
            last = m.end();

            let value = match Placeholder::of(&caps) {
                Placeholder::Task => Some(task_path.as_ref()),
                Placeholder::Arg(i) => args.get(i).map(String::as_str),
                Placeholder::Invalid => None,
            };
            match value {
                Some(v) => rendered.push_str(&quote(v)?),
                None => unmatched.push(m.as_str().to_string()),
            }
        }
        rendered.push_str(&self.template[last..]);

        if !unmatched.is_empty() {
            return Err(ExecError::UnmatchedPlaceholders(sort_unmatched(unmatched)));
        }

        let argv = shlex::split(&rendered).ok_or_else(|| {
            ExecError::security("Invalid command syntax: unbalanced quotes or trailing escape")
        })?;
        if argv.is_empty() {
            return Err(ExecError::security("Empty command after parsing"));
        }
        for arg in &argv {
            if arg.contains('\0') {
                return Err(ExecError::security("argument contains a NUL byte"));
            }
            let len = arg.chars().count();
            if len > max_arg_len {
                return Err(ExecError::security(format!("Argument too long: {len} characters")));
            }
        }

        let env = self
            .env_vars
            .iter()
            .zip(args)
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        trace!(target: "fanrun.exec.command", task = %task.identity(), argc = argv.len(), "command rendered");
        Ok(RenderedCommand::new(argv, env))
    }
}

/// De-duplicate and order by length, then lexically: `@ARG@`, `@ARG_1@`, `@ARG_2@`, `@ARG_10@`.
fn sort_unmatched(mut list: Vec<String>) -> Vec<String> {
    list.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    list.dedup();
    list
}

/// Canonical path when it exists, otherwise the path made absolute against the current directory.
fn absolute_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
