//! Run a command template over a set of task files.
//!
//! ```text
//! fanrun-demo [--dry-run] '<template>' <task-file>...
//! fanrun-demo [--dry-run] --args <template-file> <args-file> '<template>'
//! ```
//!
//! `FANRUN_CONFIG` may point to a JSON engine configuration; `FANRUN_LOG` overrides the log filter.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, bail};
use tracing::info;

use fanrun_core::{ResultSink, Scheduler, ShutdownHandle, listen_for_signals};
use fanrun_exec::{CommandTemplate, ProcRunner};
use fanrun_model::{EngineConfig, TaskDescriptor};
use fanrun_observe::{LogSink, LoggerConfig, logger_init};

struct Invocation {
    dry_run: bool,
    template: String,
    tasks: Vec<TaskDescriptor>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1) Logger
    let mut log_cfg = LoggerConfig::default();
    if let Ok(level) = std::env::var("FANRUN_LOG") {
        log_cfg.level = level;
    }
    logger_init(&log_cfg)?;

    // 2) Engine configuration
    let cfg = load_config()?.clamped();
    cfg.validate()?;

    // 3) Tasks
    let inv = parse_args(std::env::args().skip(1).collect())?;
    let template = CommandTemplate::new(inv.template);
    let runner = ProcRunner::new(template, cfg.clone());

    if inv.dry_run {
        for line in runner.plan(&inv.tasks)? {
            println!("{line}");
        }
        return Ok(());
    }

    // 4) Scheduler wired to OS signals
    let shutdown = ShutdownHandle::new();
    let signals = listen_for_signals(shutdown.clone());
    let sinks: Vec<Arc<dyn ResultSink>> = vec![Arc::new(LogSink::new())];
    let scheduler = Scheduler::new(cfg, Arc::new(runner), sinks)?.with_shutdown(shutdown);

    info!(tasks = inv.tasks.len(), "starting run");
    let summary = scheduler.run(inv.tasks).await?;
    signals.abort();

    println!("{}", serde_json::to_string_pretty(&summary)?);
    if summary.failed > 0 || summary.stop_reason.is_early() {
        std::process::exit(1);
    }
    Ok(())
}

fn load_config() -> anyhow::Result<EngineConfig> {
    let Ok(path) = std::env::var("FANRUN_CONFIG") else {
        return Ok(EngineConfig::default());
    };
    let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))
}

fn parse_args(mut args: Vec<String>) -> anyhow::Result<Invocation> {
    let dry_run = take_flag(&mut args, "--dry-run");
    let argument_mode = take_flag(&mut args, "--args");

    if argument_mode {
        let [template_file, args_file, template] = args.as_slice() else {
            bail!("usage: fanrun-demo [--dry-run] --args <template-file> <args-file> '<template>'");
        };
        let tasks = read_argument_tasks(PathBuf::from(template_file), args_file)?;
        return Ok(Invocation {
            dry_run,
            template: template.clone(),
            tasks,
        });
    }

    let Some((template, files)) = args.split_first() else {
        bail!("usage: fanrun-demo [--dry-run] '<template>' <task-file>...");
    };
    Ok(Invocation {
        dry_run,
        template: template.clone(),
        tasks: files.iter().map(TaskDescriptor::file).collect(),
    })
}

fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    let before = args.len();
    args.retain(|a| a != flag);
    args.len() != before
}

/// One task per non-empty, non-comment line; values are comma separated.
fn read_argument_tasks(template: PathBuf, path: &str) -> anyhow::Result<Vec<TaskDescriptor>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let tasks = raw
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(i, line)| {
            let values = line.split(',').map(|v| v.trim().to_string());
            TaskDescriptor::argument(template.clone(), values).with_source_line(line.trim(), i + 1)
        })
        .collect();
    Ok(tasks)
}
