use tokio::process::Command;

/// Start the child as leader of its own process group so the whole subtree can be signalled at once.
///
/// Unix: `setsid()` in a `pre_exec` hook. Windows: `CREATE_NEW_PROCESS_GROUP`.
pub(crate) fn detach(cmd: &mut Command) {
    cfg_if::cfg_if! {
        if #[cfg(unix)] {
            // SAFETY: setsid is async-signal-safe and touches no memory of the parent.
            unsafe {
                cmd.pre_exec(|| {
                    if libc::setsid() == -1 {
                        return Err(std::io::Error::last_os_error());
                    }
                    Ok(())
                });
            }
        } else if #[cfg(windows)] {
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
        } else {
            let _ = cmd;
        }
    }
}
