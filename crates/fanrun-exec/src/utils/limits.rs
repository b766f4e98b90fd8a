//! POSIX rlimits for spawned tasks.
//!
//! On Unix the limits are applied in a `pre_exec` hook, in the child after `fork()` and right before `execve()`,
//! so the task never runs without them. Elsewhere a non-empty configuration is logged and ignored.
use tokio::process::Command;
use tracing::warn;

use fanrun_model::RlimitConfig;

/// Attach the configured limits to `cmd`. No-op for an empty configuration.
pub fn attach_rlimits(cmd: &mut Command, config: &RlimitConfig) {
    if config.is_empty() {
        return;
    }

    #[cfg(unix)]
    {
        unix_impl::attach_rlimits(cmd, config);
    }

    #[cfg(not(unix))]
    {
        let _ = cmd;
        warn!(
            target: "fanrun.exec.limits",
            ?config,
            "rlimits requested on a non-Unix OS; limits will be ignored"
        );
    }
}

#[cfg(unix)]
mod unix_impl {
    use std::io;

    use tokio::process::Command;

    use super::{RlimitConfig, warn};

    // The resource constant type differs between libc targets, so the call is expanded in place.
    macro_rules! apply_rlimit {
        ($resource:expr, $value:expr) => {{
            let rlim = libc::rlimit {
                rlim_cur: $value as libc::rlim_t,
                rlim_max: $value as libc::rlim_t,
            };
            if libc::setrlimit($resource, &rlim) != 0 {
                return Err(io::Error::last_os_error());
            }
        }};
    }

    pub fn attach_rlimits(cmd: &mut Command, config: &RlimitConfig) {
        let max_open_files = config.max_open_files;
        let max_file_size_bytes = config.max_file_size_bytes;
        let address_space = config.memory_limit_bytes();
        let disable_core_dumps = config.disable_core_dumps;

        if address_space.is_some() && cfg!(target_os = "macos") {
            warn!(target: "fanrun.exec.limits", "RLIMIT_AS is not enforced on macOS");
        }

        // SAFETY: the hook only calls setrlimit, which is async-signal-safe.
        unsafe {
            cmd.pre_exec(move || {
                if let Some(nofile) = max_open_files {
                    apply_rlimit!(libc::RLIMIT_NOFILE, nofile);
                }
                if let Some(fsize) = max_file_size_bytes {
                    apply_rlimit!(libc::RLIMIT_FSIZE, fsize);
                }
                if let Some(bytes) = address_space {
                    apply_rlimit!(libc::RLIMIT_AS, bytes);
                }
                if disable_core_dumps {
                    apply_rlimit!(libc::RLIMIT_CORE, 0);
                }
                Ok(())
            });
        }
    }
}
