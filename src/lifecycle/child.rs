//! Supervision of the backend process launched alongside the proxy.
//!
//! # Responsibilities
//! - Spawn the trailing command given on the command line
//! - Stop the proxy when the child exits
//! - Kill the child when the proxy stops first

use std::process::ExitStatus;

use tokio::process::{Child, Command};

use crate::lifecycle::shutdown::Shutdown;

#[derive(Debug, thiserror::Error)]
pub enum ChildError {
    #[error("no command given")]
    Empty,
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
}

/// A running backend process.
#[derive(Debug)]
pub struct BackendProcess {
    program: String,
    child: Child,
}

impl BackendProcess {
    /// Spawn `argv[0]` with the remaining arguments. Stdio is inherited.
    pub fn spawn(argv: &[String]) -> Result<Self, ChildError> {
        let (program, args) = argv.split_first().ok_or(ChildError::Empty)?;
        let child = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ChildError::Spawn {
                program: program.clone(),
                source,
            })?;

        tracing::info!(program = %program, pid = ?child.id(), "Backend process started");
        Ok(Self {
            program: program.clone(),
            child,
        })
    }

    /// Run until the child exits or shutdown fires, whichever comes first.
    ///
    /// Child exit triggers shutdown; shutdown kills the child.
    /// Returns the exit status when the child exited by itself.
    pub async fn supervise(mut self, shutdown: Shutdown) -> Option<ExitStatus> {
        let mut stopped = shutdown.subscribe();
        let already_stopped = shutdown.is_triggered();
        let stop = async move {
            if !already_stopped {
                let _ = stopped.recv().await;
            }
        };
        tokio::select! {
            res = self.child.wait() => {
                let status = match res {
                    Ok(status) => {
                        tracing::warn!(program = %self.program, %status, "Backend process exited");
                        Some(status)
                    }
                    Err(e) => {
                        tracing::error!(program = %self.program, error = %e, "Failed to wait for backend process");
                        None
                    }
                };
                shutdown.trigger();
                status
            }
            _ = stop => {
                if let Err(e) = self.child.kill().await {
                    tracing::warn!(program = %self.program, error = %e, "Failed to kill backend process");
                } else {
                    tracing::info!(program = %self.program, "Backend process stopped");
                }
                None
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_command() {
        assert!(matches!(BackendProcess::spawn(&[]), Err(ChildError::Empty)));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = BackendProcess::spawn(&argv(&["/definitely/not/a/program"])).unwrap_err();
        assert!(matches!(err, ChildError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_child_exit_triggers_shutdown() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        let child = BackendProcess::spawn(&argv(&["sh", "-c", "exit 3"])).unwrap();

        let status = child.supervise(shutdown.clone()).await.unwrap();
        assert_eq!(status.code(), Some(3));
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_child_started_after_shutdown_is_killed() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let child = BackendProcess::spawn(&argv(&["sleep", "30"])).unwrap();

        let status = tokio::time::timeout(Duration::from_secs(5), child.supervise(shutdown))
            .await
            .unwrap();
        assert!(status.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_kills_child() {
        let shutdown = Shutdown::new();
        let child = BackendProcess::spawn(&argv(&["sleep", "30"])).unwrap();
        let task = tokio::spawn(child.supervise(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger();
        let status = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(status.is_none());
    }
}
