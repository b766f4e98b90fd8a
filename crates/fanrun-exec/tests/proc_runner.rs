#![cfg(unix)]

use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use fanrun_core::{Dispatch, Runner, RunnerError, StopSignals};
use fanrun_exec::{CommandTemplate, ProcRunner};
use fanrun_model::{EngineConfig, TaskDescriptor, TaskOutcome, TaskStatus};

struct Fixture {
    dir: TempDir,
    cfg: EngineConfig,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = EngineConfig::default();
        cfg.limits.timeout_secs = 10;
        cfg.limits.wait_time_secs = 0.05;
        cfg.execution.workspace_root = dir.path().join("workspace");
        cfg.execution.termination_grace_secs = 1.0;
        Self { dir, cfg }
    }

    fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn runner(&self, template: &str) -> ProcRunner {
        ProcRunner::new(CommandTemplate::new(template), self.cfg.clone())
    }

    async fn run(&self, template: &str, task: TaskDescriptor) -> TaskOutcome {
        self.runner(template)
            .execute(dispatch(task), StopSignals::default())
            .await
    }
}

fn dispatch(descriptor: TaskDescriptor) -> Dispatch {
    Dispatch {
        descriptor,
        task_index: 1,
        worker_id: 1,
    }
}

fn process_alive(pid: i32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
}

#[tokio::test]
async fn success_captures_both_streams() {
    let fx = Fixture::new();
    let task = fx.script("ok.sh", "echo hello\necho oops >&2\n");

    let outcome = fx.run("sh @TASK@", TaskDescriptor::file(&task)).await;

    assert_eq!(outcome.status, TaskStatus::Success);
    assert_eq!(outcome.exit_code, Some(0));
    assert_eq!(outcome.stdout, "hello\n");
    assert_eq!(outcome.stderr, "oops\n");
    assert_eq!(outcome.error_message, "");
    assert!(outcome.child_pid.is_some());
    assert!(outcome.command.starts_with("sh "));
    assert!(outcome.end_time >= outcome.start_time);
}

#[tokio::test]
async fn non_zero_exit_is_failed() {
    let fx = Fixture::new();
    let task = fx.script("fail.sh", "echo partial\nexit 3\n");

    let outcome = fx.run("sh @TASK@", TaskDescriptor::file(&task)).await;

    assert_eq!(outcome.status, TaskStatus::Failed);
    assert_eq!(outcome.exit_code, Some(3));
    assert_eq!(outcome.error_message, "Exit code 3");
    assert_eq!(outcome.stdout, "partial\n");
}

#[tokio::test]
async fn killed_by_signal_has_no_exit_code() {
    let fx = Fixture::new();
    let task = fx.script("suicide.sh", "kill -9 $$\n");

    let outcome = fx.run("sh @TASK@", TaskDescriptor::file(&task)).await;

    assert_eq!(outcome.status, TaskStatus::Failed);
    assert_eq!(outcome.exit_code, None);
    assert_eq!(outcome.error_message, "Terminated by signal 9");
}

#[tokio::test]
async fn timeout_keeps_output_and_reports_deadline() {
    let mut fx = Fixture::new();
    fx.cfg.limits.timeout_secs = 1;
    let task = fx.script("slow.sh", "echo before\nsleep 30\n");

    let started = Instant::now();
    let outcome = fx.run("sh @TASK@", TaskDescriptor::file(&task)).await;

    assert_eq!(outcome.status, TaskStatus::Timeout);
    assert_eq!(outcome.error_message, "Timeout after 1s");
    assert_eq!(outcome.exit_code, None);
    assert_eq!(outcome.stdout, "before\n");
    assert!(started.elapsed() < Duration::from_secs(8));
    assert!(outcome.duration_secs >= 1.0);
}

#[tokio::test]
async fn output_is_truncated_to_tail() {
    let mut fx = Fixture::new();
    fx.cfg.limits.max_output_capture = 100;
    let task = fx.script(
        "loud.sh",
        "i=0\nwhile [ $i -lt 500 ]; do printf 0123456789; i=$((i+1)); done\nprintf END\n",
    );

    let outcome = fx.run("sh @TASK@", TaskDescriptor::file(&task)).await;

    assert_eq!(outcome.status, TaskStatus::Success);
    assert_eq!(outcome.stdout.chars().count(), 100);
    assert!(outcome.stdout.ends_with("456789END"));
}

#[tokio::test]
async fn argument_values_are_never_interpreted() {
    let fx = Fixture::new();
    let template = fx.script("tpl.txt", "");
    let marker = fx.dir.path().join("pwned");
    let payload = format!("x; touch {} && echo $(id)", marker.display());

    let task = TaskDescriptor::argument(&template, [payload.clone()]);
    let outcome = fx.run("printf %s @ARG@", task).await;

    assert_eq!(outcome.status, TaskStatus::Success);
    assert_eq!(outcome.stdout, payload);
    assert!(!marker.exists());
}

#[tokio::test]
async fn env_vars_are_bound_to_arguments() {
    let fx = Fixture::new();
    let template = fx.script("tpl.txt", "");
    let runner = ProcRunner::new(
        CommandTemplate::new(r#"sh -c 'printf "%s:%s" "$DB_HOST" "$DB_PORT"'"#)
            .with_env_vars(["DB_HOST", "DB_PORT"]),
        fx.cfg.clone(),
    );

    let task = TaskDescriptor::argument(&template, ["db1", "5432"]);
    let outcome = runner.execute(dispatch(task), StopSignals::default()).await;

    assert_eq!(outcome.status, TaskStatus::Success);
    assert_eq!(outcome.stdout, "db1:5432");
}

#[tokio::test]
async fn cancellation_terminates_running_task() {
    let fx = Fixture::new();
    let task = fx.script("hang.sh", "sleep 30\n");
    let runner = fx.runner("sh @TASK@");
    let signals = StopSignals::default();

    let started = Instant::now();
    let (outcome, _) = tokio::join!(
        runner.execute(dispatch(TaskDescriptor::file(&task)), signals.clone()),
        async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            signals.cancel();
        }
    );

    assert_eq!(outcome.status, TaskStatus::Cancelled);
    assert_eq!(outcome.error_message, "Task cancelled");
    assert_eq!(outcome.exit_code, None);
    assert!(started.elapsed() < Duration::from_secs(5));

    // cancelling a finished task changes nothing
    signals.cancel();
    assert_eq!(outcome.status, TaskStatus::Cancelled);
}

#[tokio::test]
async fn cancelled_before_start_spawns_nothing() {
    let fx = Fixture::new();
    let task = fx.script("never.sh", "echo no\n");
    let signals = StopSignals::default();
    signals.cancel();

    let outcome = fx
        .runner("sh @TASK@")
        .execute(dispatch(TaskDescriptor::file(&task)), signals)
        .await;

    assert_eq!(outcome.status, TaskStatus::Cancelled);
    assert_eq!(outcome.child_pid, None);
    assert_eq!(outcome.command, "");
}

#[tokio::test]
async fn termination_reaches_the_whole_group() {
    let mut fx = Fixture::new();
    fx.cfg.limits.timeout_secs = 1;
    let task = fx.script("tree.sh", "sleep 30 &\necho $!\nwait\n");

    let outcome = fx.run("sh @TASK@", TaskDescriptor::file(&task)).await;
    assert_eq!(outcome.status, TaskStatus::Timeout);

    let grandchild: i32 = outcome.stdout.trim().parse().unwrap();
    let deadline = Instant::now() + Duration::from_secs(3);
    while process_alive(grandchild) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!process_alive(grandchild));
}

#[tokio::test]
async fn stubborn_process_is_killed_after_grace() {
    let mut fx = Fixture::new();
    fx.cfg.execution.termination_grace_secs = 0.5;
    let task = fx.script("stubborn.sh", "trap '' TERM\nsleep 30\n");
    let runner = fx.runner("sh @TASK@");
    let signals = StopSignals::default();

    let started = Instant::now();
    let (outcome, _) = tokio::join!(
        runner.execute(dispatch(TaskDescriptor::file(&task)), signals.clone()),
        async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            signals.cancel();
        }
    );

    assert_eq!(outcome.status, TaskStatus::Cancelled);
    assert!(started.elapsed() >= Duration::from_millis(700));
    assert!(started.elapsed() < Duration::from_secs(8));
}

#[tokio::test]
async fn forced_stop_skips_grace_period() {
    let mut fx = Fixture::new();
    fx.cfg.execution.termination_grace_secs = 60.0;
    let task = fx.script("stubborn.sh", "trap '' TERM\nsleep 30\n");
    let runner = fx.runner("sh @TASK@");

    let cancel = CancellationToken::new();
    let force = CancellationToken::new();
    let signals = StopSignals::new(cancel.clone(), force.clone());

    let started = Instant::now();
    let (outcome, _) = tokio::join!(
        runner.execute(dispatch(TaskDescriptor::file(&task)), signals),
        async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            cancel.cancel();
            tokio::time::sleep(Duration::from_millis(300)).await;
            force.cancel();
        }
    );

    assert_eq!(outcome.status, TaskStatus::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn oversized_task_file_is_rejected() {
    let mut fx = Fixture::new();
    fx.cfg.security.max_task_file_size = 8;
    let task = fx.script("big.sh", "echo this is longer than eight bytes\n");

    let outcome = fx.run("sh @TASK@", TaskDescriptor::file(&task)).await;

    assert_eq!(outcome.status, TaskStatus::Error);
    assert!(outcome.error_message.starts_with("Security error: Task file too large"));
    assert_eq!(outcome.child_pid, None);
}

#[tokio::test]
async fn missing_task_file_is_rejected() {
    let fx = Fixture::new();
    let outcome = fx
        .run("sh @TASK@", TaskDescriptor::file(fx.dir.path().join("missing.sh")))
        .await;

    assert_eq!(outcome.status, TaskStatus::Error);
    assert!(outcome.error_message.starts_with("Security error: Cannot access task file"));
}

#[tokio::test]
async fn spawn_failure_is_an_error_outcome() {
    let fx = Fixture::new();
    let task = fx.script("any.sh", "true\n");

    let outcome = fx
        .run("/nonexistent/interpreter @TASK@", TaskDescriptor::file(&task))
        .await;

    assert_eq!(outcome.status, TaskStatus::Error);
    assert!(outcome.error_message.starts_with("Error: spawn failed"));
    assert!(!outcome.command.is_empty());
}

#[tokio::test]
async fn isolated_workspaces_are_per_worker() {
    let mut fx = Fixture::new();
    fx.cfg.execution.workspace_isolation = true;
    let task = fx.script("where.sh", "pwd\n");
    let runner = fx.runner("sh @TASK@");

    let mut dirs = Vec::new();
    for worker_id in [1, 2] {
        let d = Dispatch {
            descriptor: TaskDescriptor::file(&task),
            task_index: worker_id,
            worker_id,
        };
        let outcome = runner.execute(d, StopSignals::default()).await;
        assert_eq!(outcome.status, TaskStatus::Success);
        dirs.push(PathBuf::from(outcome.stdout.trim()));
    }

    let pid = std::process::id();
    assert!(dirs[0].ends_with(format!("pid{pid}_worker1")));
    assert!(dirs[1].ends_with(format!("pid{pid}_worker2")));
    assert!(Path::new(&dirs[0]).is_dir());
}

#[tokio::test]
async fn resources_are_sampled() {
    let fx = Fixture::new();
    let task = fx.script("busy.sh", "sleep 0.3\n");

    let outcome = fx.run("sh @TASK@", TaskDescriptor::file(&task)).await;

    assert_eq!(outcome.status, TaskStatus::Success);
    assert!(outcome.memory_mb > 0.0);
    assert!(outcome.cpu_percent >= 0.0);
}

#[test]
fn check_rejects_placeholders_beyond_arguments() {
    let fx = Fixture::new();
    let runner = fx.runner("run @ARG_1@ @ARG_5@");
    let tasks = vec![
        TaskDescriptor::argument("tpl", ["1", "2", "3", "4", "5"]),
        TaskDescriptor::argument("tpl", ["a", "b"]).with_source_line("a,b", 2),
    ];

    let err = runner.check(&tasks).unwrap_err();
    assert_eq!(
        err,
        RunnerError::Validation {
            count: 1,
            first: "tpl [line 2: a,b]: unmatched placeholders: @ARG_5@".into()
        }
    );
}

#[test]
fn check_rejects_blank_template() {
    let fx = Fixture::new();
    assert!(matches!(
        fx.runner("  ").check(&[]),
        Err(RunnerError::InvalidTask(_))
    ));
}

#[test]
fn plan_renders_without_running() {
    let fx = Fixture::new();
    let marker = fx.dir.path().join("created");
    let runner = ProcRunner::new(
        CommandTemplate::new(format!("touch {} @ARG@", marker.display())).with_env_vars(["NAME"]),
        fx.cfg.clone(),
    );

    let lines = runner
        .plan(&[TaskDescriptor::argument("tpl", ["a b"])])
        .unwrap();

    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("NAME="));
    assert_eq!(
        shlex::split(&lines[0]).unwrap(),
        ["NAME=a b".to_string(), "touch".into(), marker.display().to_string(), "a b".into()]
    );
    assert!(!marker.exists());
}
