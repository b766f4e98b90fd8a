//! Rendering of command templates into argv vectors.
//!
//! Placeholders:
//! - `@TASK@` absolute path of the task file (the template file for argument tasks);
//! - `@ARG@` first argument of an argument task;
//! - `@ARG_1@ .. @ARG_n@` n-th argument (1-based).
//!
//! Every substituted value is shell-quoted as one literal token before the string is split with POSIX rules,
//! so argument values can never inject extra words, redirections or commands.
mod template;
pub use template::CommandTemplate;

use std::borrow::Cow;

use crate::error::ExecError;

/// Argv vector and extra environment for one task, ready to spawn without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCommand {
    pub argv: Vec<String>,
    /// Bindings merged over the inherited environment.
    pub env: Vec<(String, String)>,
    /// Argv re-joined with every element shell-quoted; for logs and outcomes only.
    pub display: String,
}

impl RenderedCommand {
    pub(crate) fn new(argv: Vec<String>, env: Vec<(String, String)>) -> Self {
        let display = shlex::try_join(argv.iter().map(String::as_str))
            .unwrap_or_else(|_| argv.join(" "));
        Self { argv, env, display }
    }

    #[inline]
    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    #[inline]
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    /// `VAR=value ... argv` as it would be typed into a POSIX shell.
    pub fn dry_run_line(&self) -> String {
        let mut line = String::new();
        for (name, value) in &self.env {
            line.push_str(name);
            line.push('=');
            line.push_str(&quote(value).unwrap_or(Cow::Borrowed(value.as_str())));
            line.push(' ');
        }
        line.push_str(&self.display);
        line
    }
}

/// Quote `value` as a single POSIX shell word.
pub(crate) fn quote(value: &str) -> Result<Cow<'_, str>, ExecError> {
    shlex::try_quote(value).map_err(|_| ExecError::security("argument contains a NUL byte"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_each_element() {
        let cmd = RenderedCommand::new(
            vec!["echo".into(), "a b".into(), "; rm -rf /".into()],
            Vec::new(),
        );
        assert_eq!(cmd.program(), "echo");
        assert_eq!(cmd.args().len(), 2);
        assert_eq!(shlex::split(&cmd.display).unwrap(), cmd.argv);
    }

    #[test]
    fn dry_run_line_prefixes_env() {
        let cmd = RenderedCommand::new(
            vec!["run.sh".into(), "x".into()],
            vec![("HOST".into(), "db 1".into()), ("PORT".into(), "5432".into())],
        );
        let line = cmd.dry_run_line();
        assert!(line.starts_with("HOST="));
        assert_eq!(
            shlex::split(&line).unwrap(),
            ["HOST=db 1", "PORT=5432", "run.sh", "x"]
        );
    }

    #[test]
    fn nul_cannot_be_quoted() {
        assert!(matches!(quote("a\0b"), Err(ExecError::Security(_))));
        assert_eq!(quote("plain").unwrap(), "plain");
    }
}
