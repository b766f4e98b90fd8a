use std::{io, process::ExitStatus, time::Duration};

use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Child,
    time::{Instant, MissedTickBehavior, interval, sleep_until, timeout},
};
use tracing::{debug, trace};

use fanrun_core::StopSignals;
use fanrun_model::{LimitsConfig, MAX_TIMEOUT_SECS, TaskOutcome, TaskStatus};

use super::{
    capture::TailBuffer,
    monitor::ResourceMonitor,
    terminate::{Termination, terminate},
};
use crate::error::ExecError;

const CHUNK: usize = 4096;

/// How long to keep reading pipes once the process is gone; grandchildren may still hold them open.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

enum End {
    Exited(ExitStatus),
    WaitFailed(io::Error),
    Timeout,
    Cancelled,
}

struct Streams<O, E> {
    stdout: Option<O>,
    stderr: Option<E>,
    out: TailBuffer,
    err: TailBuffer,
}

impl<O, E> Streams<O, E>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    /// Read both pipes until EOF or until `DRAIN_TIMEOUT` elapses.
    async fn drain(&mut self) {
        let Streams {
            stdout,
            stderr,
            out,
            err,
        } = self;
        let drained = timeout(DRAIN_TIMEOUT, async {
            tokio::join!(drain_into(stdout, out), drain_into(stderr, err));
        })
        .await;
        if drained.is_err() {
            debug!(target: "fanrun.exec.proc", "output still open after exit, giving up on the rest");
        }
    }

    fn store(self, outcome: &mut TaskOutcome) {
        outcome.stdout = self.out.into_string();
        outcome.stderr = self.err.into_string();
    }
}

/// Drive a spawned child to a terminal outcome.
///
/// One select loop interleaves cancellation, exit, deadline, pipe reads and periodic resource sampling,
/// so output written right up to the deadline is still captured.
pub(crate) async fn supervise(
    mut child: Child,
    mut outcome: TaskOutcome,
    limits: &LimitsConfig,
    term: Termination,
    signals: &StopSignals,
) -> TaskOutcome {
    let mut streams = Streams {
        stdout: child.stdout.take(),
        stderr: child.stderr.take(),
        out: TailBuffer::new(limits.max_output_capture),
        err: TailBuffer::new(limits.max_output_capture),
    };
    let mut monitor = child.id().map(ResourceMonitor::new);

    let now = Instant::now();
    let deadline = now
        .checked_add(limits.timeout())
        .unwrap_or_else(|| now + Duration::from_secs(MAX_TIMEOUT_SECS));
    let mut tick = interval(limits.wait_time());
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut out_chunk = [0u8; CHUNK];
    let mut err_chunk = [0u8; CHUNK];

    let end = loop {
        tokio::select! {
            biased;

            _ = signals.cancelled() => break End::Cancelled,
            status = child.wait() => match status {
                Ok(status) => break End::Exited(status),
                Err(e) => break End::WaitFailed(e),
            },
            _ = sleep_until(deadline) => break End::Timeout,
            read = read_chunk(&mut streams.stdout, &mut out_chunk), if streams.stdout.is_some() => {
                match read {
                    Ok(0) => streams.stdout = None,
                    Ok(n) => streams.out.push(&out_chunk[..n]),
                    Err(e) => {
                        debug!(target: "fanrun.exec.proc", error = %e, "stdout read failed");
                        streams.stdout = None;
                    }
                }
            }
            read = read_chunk(&mut streams.stderr, &mut err_chunk), if streams.stderr.is_some() => {
                match read {
                    Ok(0) => streams.stderr = None,
                    Ok(n) => streams.err.push(&err_chunk[..n]),
                    Err(e) => {
                        debug!(target: "fanrun.exec.proc", error = %e, "stderr read failed");
                        streams.stderr = None;
                    }
                }
            }
            _ = tick.tick() => {
                if let Some(monitor) = monitor.as_mut() {
                    let (memory_mb, cpu_percent) = monitor.sample();
                    outcome.observe_resources(memory_mb, cpu_percent);
                }
            }
        }
    };

    match end {
        End::Exited(status) => {
            streams.drain().await;
            streams.store(&mut outcome);
            outcome.exit_code = status.code();
            let (status, message) = classify(status);
            trace!(target: "fanrun.exec.proc", task = %outcome.task, %status, "process exited");
            outcome.finish(status, message)
        }
        End::WaitFailed(e) => {
            terminate(&mut child, term, signals).await;
            streams.drain().await;
            streams.store(&mut outcome);
            outcome.finish(TaskStatus::Error, ExecError::from(e).outcome_message())
        }
        End::Timeout => {
            debug!(target: "fanrun.exec.proc", task = %outcome.task, timeout_secs = limits.timeout_secs, "deadline exceeded, terminating");
            terminate(&mut child, term, signals).await;
            streams.drain().await;
            streams.store(&mut outcome);
            outcome.finish(
                TaskStatus::Timeout,
                ExecError::Timeout(limits.timeout_secs).outcome_message(),
            )
        }
        End::Cancelled => {
            debug!(target: "fanrun.exec.proc", task = %outcome.task, "cancelled, terminating");
            terminate(&mut child, term, signals).await;
            streams.drain().await;
            streams.store(&mut outcome);
            outcome.finish(TaskStatus::Cancelled, "Task cancelled")
        }
    }
}

fn classify(status: ExitStatus) -> (TaskStatus, String) {
    match status.code() {
        Some(0) => (TaskStatus::Success, String::new()),
        Some(code) => (TaskStatus::Failed, format!("Exit code {code}")),
        None => (TaskStatus::Failed, terminated_message(status)),
    }
}

#[cfg(unix)]
fn terminated_message(status: ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(signal) => format!("Terminated by signal {signal}"),
        None => "Terminated without exit code".to_string(),
    }
}

#[cfg(not(unix))]
fn terminated_message(_status: ExitStatus) -> String {
    "Terminated without exit code".to_string()
}

async fn read_chunk<R: AsyncRead + Unpin>(
    reader: &mut Option<R>,
    buf: &mut [u8],
) -> io::Result<usize> {
    match reader {
        Some(r) => r.read(buf).await,
        None => std::future::pending().await,
    }
}

async fn drain_into<R: AsyncRead + Unpin>(reader: &mut Option<R>, sink: &mut TailBuffer) {
    let Some(r) = reader.as_mut() else {
        return;
    };
    let mut buf = [0u8; CHUNK];
    loop {
        match r.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => sink.push(&buf[..n]),
        }
    }
    *reader = None;
}
