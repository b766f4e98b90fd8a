use std::{
    io,
    path::{Path, PathBuf},
};

use fanrun_model::{ExecutionConfig, WorkerId};

/// Directory of one worker slot when workspaces are isolated: `<root>/pid<engine pid>_worker<id>`.
pub fn worker_dir(root: &Path, engine_pid: u32, worker_id: WorkerId) -> PathBuf {
    root.join(format!("pid{engine_pid}_worker{worker_id}"))
}

/// Working directory for a task on `worker_id`, created on demand.
///
/// Directories are never cleaned up by the engine.
pub async fn resolve_workdir(cfg: &ExecutionConfig, worker_id: WorkerId) -> io::Result<PathBuf> {
    let dir = if cfg.workspace_isolation {
        worker_dir(&cfg.workspace_root, std::process::id(), worker_id)
    } else {
        cfg.workspace_root.clone()
    };
    tokio::fs::create_dir_all(&dir).await?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shared_workspace_is_the_root() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = ExecutionConfig {
            workspace_root: tmp.path().join("ws"),
            ..Default::default()
        };

        let dir = resolve_workdir(&cfg, 3).await.unwrap();
        assert_eq!(dir, tmp.path().join("ws"));
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn isolated_workspace_per_worker() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = ExecutionConfig {
            workspace_root: tmp.path().to_path_buf(),
            workspace_isolation: true,
            ..Default::default()
        };

        let a = resolve_workdir(&cfg, 1).await.unwrap();
        let b = resolve_workdir(&cfg, 2).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(a, worker_dir(tmp.path(), std::process::id(), 1));
        assert!(a.is_dir() && b.is_dir());
        assert!(
            a.file_name()
                .unwrap()
                .to_string_lossy()
                .ends_with("_worker1")
        );
    }
}
