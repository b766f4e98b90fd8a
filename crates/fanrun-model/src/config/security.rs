use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Longest allowed argv element, in characters.
    pub max_argument_length: usize,
    /// Largest allowed task (or template) file, in bytes.
    pub max_task_file_size: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_argument_length: 1000,
            max_task_file_size: 1024 * 1024,
        }
    }
}

impl SecurityConfig {
    pub(crate) fn collect_errors(&self, errors: &mut Vec<String>) {
        if self.max_argument_length == 0 {
            errors.push("max_argument_length must be positive".into());
        }
        if self.max_task_file_size == 0 {
            errors.push("max_task_file_size must be positive".into());
        }
    }
}
