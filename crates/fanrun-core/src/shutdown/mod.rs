use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Clonable handle that asks a running scheduler to stop.
///
/// The first [`request`](ShutdownHandle::request) starts a graceful shutdown: nothing new is dispatched and
/// in-flight tasks are terminated with their grace period. Any further request forces termination.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    graceful: CancellationToken,
    force: CancellationToken,
    requests: Arc<AtomicUsize>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one shutdown request and return whether it forced termination.
    pub fn request(&self) -> bool {
        let previous = self.requests.fetch_add(1, Ordering::SeqCst);
        self.graceful.cancel();
        if previous > 0 {
            self.force.cancel();
            return true;
        }
        false
    }

    /// Skip the graceful phase entirely.
    pub fn force(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.graceful.cancel();
        self.force.cancel();
    }

    #[inline]
    pub fn is_requested(&self) -> bool {
        self.graceful.is_cancelled()
    }

    #[inline]
    pub fn is_forced(&self) -> bool {
        self.force.is_cancelled()
    }

    pub async fn requested(&self) {
        self.graceful.cancelled().await
    }

    pub async fn forced(&self) {
        self.force.cancelled().await
    }

    /// Token cancelled by the first request; parent of every per-task cancel token.
    pub(crate) fn graceful_token(&self) -> &CancellationToken {
        &self.graceful
    }

    /// Token cancelled once termination is forced.
    pub(crate) fn force_token(&self) -> &CancellationToken {
        &self.force
    }
}

/// Map operator signals onto `handle` in a background task.
///
/// SIGINT and SIGTERM (Ctrl-C on Windows) each count as one shutdown request; SIGHUP is ignored so a
/// closing terminal does not kill the run. The task ends once termination is forced.
pub fn listen_for_signals(handle: ShutdownHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        cfg_signals::listen(handle).await;
    })
}

#[cfg(unix)]
mod cfg_signals {
    use tokio::signal::unix::{SignalKind, signal};

    use super::*;

    pub(super) async fn listen(handle: ShutdownHandle) {
        let (mut int, mut term, mut hup) = match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
            signal(SignalKind::hangup()),
        ) {
            (Ok(int), Ok(term), Ok(hup)) => (int, term, hup),
            (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
                warn!(target: "fanrun.core.shutdown", error = %e, "failed to install signal handlers");
                return;
            }
        };

        loop {
            let name = tokio::select! {
                _ = int.recv() => "SIGINT",
                _ = term.recv() => "SIGTERM",
                _ = hup.recv() => {
                    info!(target: "fanrun.core.shutdown", "received SIGHUP, ignoring");
                    continue;
                }
            };
            if on_request(&handle, name) {
                return;
            }
        }
    }
}

#[cfg(not(unix))]
mod cfg_signals {
    use super::*;

    pub(super) async fn listen(handle: ShutdownHandle) {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(target: "fanrun.core.shutdown", error = %e, "failed to listen for ctrl-c");
                return;
            }
            if on_request(&handle, "CTRL_C") {
                return;
            }
        }
    }
}

fn on_request(handle: &ShutdownHandle, signal: &str) -> bool {
    if handle.request() {
        warn!(target: "fanrun.core.shutdown", signal, "second shutdown request, forcing termination");
        true
    } else {
        info!(target: "fanrun.core.shutdown", signal, "shutdown requested, finishing running tasks");
        false
    }
}
