//! [`ProcRunner`]: the production [`Runner`], one child process per task.
mod capture;
mod group;
mod monitor;
mod supervise;
mod terminate;

use std::{path::Path, process::Stdio, sync::Arc};

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use fanrun_core::{Dispatch, Runner, RunnerError, StopSignals};
use fanrun_model::{EngineConfig, TaskDescriptor, TaskOutcome, TaskStatus};

use crate::{
    command::{CommandTemplate, RenderedCommand},
    error::ExecError,
    utils::{attach_rlimits, resolve_workdir},
};
use terminate::Termination;

/// Runs every task as a child process rendered from one [`CommandTemplate`].
pub struct ProcRunner {
    template: CommandTemplate,
    cfg: Arc<EngineConfig>,
}

impl ProcRunner {
    pub fn new(template: CommandTemplate, cfg: EngineConfig) -> Self {
        Self {
            template,
            cfg: Arc::new(cfg),
        }
    }

    /// Render every task without executing anything: one `VAR=value ... argv` line per task.
    pub fn plan(&self, tasks: &[TaskDescriptor]) -> Result<Vec<String>, ExecError> {
        let max_arg_len = self.cfg.security.max_argument_length;
        tasks
            .iter()
            .map(|task| {
                self.template
                    .build(task, max_arg_len)
                    .map(|cmd| cmd.dry_run_line())
            })
            .collect()
    }

    async fn validate_source(&self, path: &Path) -> Result<(), ExecError> {
        let meta = tokio::fs::metadata(path).await.map_err(|_| {
            ExecError::security(format!("Cannot access task file: {}", path.display()))
        })?;
        if meta.len() > self.cfg.security.max_task_file_size {
            return Err(ExecError::security(format!(
                "Task file too large: {}",
                path.display()
            )));
        }
        Ok(())
    }

    fn spawn(&self, cmd: &RenderedCommand, workdir: &Path) -> Result<Child, ExecError> {
        let exec = &self.cfg.execution;

        let mut command = Command::new(cmd.program());
        command
            .args(cmd.args())
            .envs(cmd.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if exec.use_process_groups {
            group::detach(&mut command);
        }
        attach_rlimits(&mut command, &exec.rlimits);

        command
            .spawn()
            .map_err(|e| ExecError::Spawn(format!("{}: {e}", cmd.program())))
    }
}

#[async_trait]
impl Runner for ProcRunner {
    fn name(&self) -> &'static str {
        "proc"
    }

    fn check(&self, tasks: &[TaskDescriptor]) -> Result<(), RunnerError> {
        if self.template.is_blank() {
            return Err(RunnerError::InvalidTask("command template is empty".into()));
        }

        let failures = self.template.check_all(tasks);
        match failures.first() {
            None => Ok(()),
            Some((i, e)) => {
                let first = format!("{}: {e}", tasks[*i].identity());
                warn!(
                    target: "fanrun.exec.proc",
                    count = failures.len(),
                    %first,
                    "placeholder validation failed"
                );
                Err(RunnerError::Validation {
                    count: failures.len(),
                    first,
                })
            }
        }
    }

    async fn execute(&self, dispatch: Dispatch, signals: StopSignals) -> TaskOutcome {
        let Dispatch {
            descriptor,
            task_index,
            worker_id,
        } = dispatch;
        let mut outcome = TaskOutcome::started(&descriptor, task_index, worker_id);

        if signals.is_cancelled() {
            return outcome.finish(TaskStatus::Cancelled, "Task cancelled");
        }

        if let Err(e) = self.validate_source(descriptor.source_path()).await {
            warn!(target: "fanrun.exec.proc", task = %outcome.task, error = %e, "task rejected");
            return outcome.finish(TaskStatus::Error, e.outcome_message());
        }

        let cmd = match self
            .template
            .build(&descriptor, self.cfg.security.max_argument_length)
        {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!(target: "fanrun.exec.proc", task = %outcome.task, error = %e, "command rejected");
                return outcome.finish(TaskStatus::Error, e.outcome_message());
            }
        };
        outcome.command = cmd.display.clone();

        let workdir = match resolve_workdir(&self.cfg.execution, worker_id).await {
            Ok(dir) => dir,
            Err(e) => {
                let e = ExecError::from(e);
                warn!(target: "fanrun.exec.proc", task = %outcome.task, error = %e, "workspace unavailable");
                return outcome.finish(TaskStatus::Error, e.outcome_message());
            }
        };

        if signals.is_cancelled() {
            return outcome.finish(TaskStatus::Cancelled, "Task cancelled");
        }

        let child = match self.spawn(&cmd, &workdir) {
            Ok(child) => child,
            Err(e) => {
                warn!(target: "fanrun.exec.proc", task = %outcome.task, error = %e, "spawn failed");
                return outcome.finish(TaskStatus::Error, e.outcome_message());
            }
        };

        outcome.status = TaskStatus::Running;
        outcome.child_pid = child.id();
        debug!(
            target: "fanrun.exec.proc",
            worker_id,
            task_index,
            pid = ?outcome.child_pid,
            command = %cmd.display,
            workdir = %workdir.display(),
            "task started"
        );

        let term = Termination {
            use_groups: self.cfg.execution.use_process_groups,
            grace: self.cfg.execution.termination_grace(),
        };
        let outcome = supervise::supervise(child, outcome, &self.cfg.limits, term, &signals).await;

        debug!(
            target: "fanrun.exec.proc",
            worker_id,
            task_index,
            status = %outcome.status,
            exit_code = ?outcome.exit_code,
            duration_secs = outcome.duration_secs,
            "task finished"
        );
        outcome
    }
}
