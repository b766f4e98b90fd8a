use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One immutable unit of work.
///
/// Descriptors are produced by a discovery phase outside the engine and are read-only afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TaskDescriptor {
    /// A task file rendered into the template through `@TASK@`.
    File {
        /// Path of the task file.
        path: PathBuf,
    },
    /// One argument tuple rendered against a shared template file.
    #[serde(rename_all = "camelCase")]
    Argument {
        /// Template file substituted for `@TASK@`.
        template: PathBuf,
        /// Positional values for `@ARG@` and `@ARG_n@`.
        #[serde(default)]
        args: Vec<String>,
        /// The raw line the arguments were parsed from.
        #[serde(default)]
        source_line: String,
        /// 1-based line number in the arguments source, if known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        line_number: Option<usize>,
    },
}

impl TaskDescriptor {
    /// Create a file task.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        TaskDescriptor::File { path: path.into() }
    }

    /// Create an argument task; the source line is the arguments joined by a single space.
    pub fn argument<I, S>(template: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let source_line = args.join(" ");
        TaskDescriptor::Argument {
            template: template.into(),
            args,
            source_line,
            line_number: None,
        }
    }

    /// Attach the originating line to an argument task. No-op for file tasks.
    pub fn with_source_line(mut self, line: impl Into<String>, number: usize) -> Self {
        if let TaskDescriptor::Argument {
            source_line,
            line_number,
            ..
        } = &mut self
        {
            *source_line = line.into();
            *line_number = Some(number);
        }
        self
    }

    /// The file whose size is validated and which `@TASK@` resolves to.
    pub fn source_path(&self) -> &Path {
        match self {
            TaskDescriptor::File { path } => path,
            TaskDescriptor::Argument { template, .. } => template,
        }
    }

    /// Positional arguments; empty for file tasks.
    pub fn args(&self) -> &[String] {
        match self {
            TaskDescriptor::File { .. } => &[],
            TaskDescriptor::Argument { args, .. } => args,
        }
    }

    /// Human-readable identity used in outcomes and logs.
    pub fn identity(&self) -> String {
        match self {
            TaskDescriptor::File { path } => path.display().to_string(),
            TaskDescriptor::Argument {
                template,
                source_line,
                line_number: Some(n),
                ..
            } => format!("{} [line {n}: {source_line}]", template.display()),
            TaskDescriptor::Argument {
                template,
                source_line,
                ..
            } => format!("{} [{source_line}]", template.display()),
        }
    }

    /// Short symbolic kind for logging: `"file"` or `"argument"`.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskDescriptor::File { .. } => "file",
            TaskDescriptor::Argument { .. } => "argument",
        }
    }
}
