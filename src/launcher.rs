//! Launching the monitored command and watching for its exit.

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::sampler::{StopReason, StopSignal};

/// A running child process started by [`launch`].
#[derive(Debug)]
pub struct LaunchedCommand {
    pub pid: u32,
    pub program: String,
    child: Child,
}

/// Splits a command line on whitespace into program and arguments.
pub fn split_command_line(command_line: &str) -> Result<(String, Vec<String>), LaunchError> {
    let mut parts = command_line.split_whitespace().map(str::to_string);
    let program = parts.next().ok_or(LaunchError::EmptyCommand)?;
    Ok((program, parts.collect()))
}

/// Starts `program` with inherited stdout/stderr and returns immediately.
///
/// The child is killed if the returned handle is dropped before it exits.
pub fn launch(program: &str, args: &[String]) -> Result<LaunchedCommand, LaunchError> {
    info!("start of output from command:");
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| LaunchError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let pid = child.id().ok_or_else(|| LaunchError::NoPid {
        program: program.to_string(),
    })?;
    debug!("launched {} as pid {}", program, pid);

    Ok(LaunchedCommand {
        pid,
        program: program.to_string(),
        child,
    })
}

impl LaunchedCommand {
    /// Waits for the child in the background and triggers `stop` when it exits.
    pub fn watch(mut self, stop: StopSignal) -> JoinHandle<Option<i32>> {
        tokio::spawn(async move {
            let code = match self.child.wait().await {
                Ok(status) => status.code(),
                Err(e) => {
                    warn!("failed to wait for {} (pid {}): {}", self.program, self.pid, e);
                    None
                }
            };
            info!("end of output from command");
            stop.trigger(StopReason::CommandExited(code));
            code
        })
    }
}

/// Sends SIGTERM to `pid`. Failures are logged, since the process may
/// already be gone.
pub fn forward_terminate(pid: u32) {
    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
        debug!("could not forward SIGTERM to pid {}: {}", pid, e);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("a non-empty command must be specified")]
    EmptyCommand,

    #[error("failed to start command `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command `{program}` exited before its pid could be read")]
    NoPid { program: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_command_line() {
        let (program, args) = split_command_line("sleep  1 ").unwrap();
        assert_eq!(program, "sleep");
        assert_eq!(args, vec!["1".to_string()]);
        assert!(matches!(
            split_command_line("   "),
            Err(LaunchError::EmptyCommand)
        ));
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_launch() {
        let err = launch("/nonexistent/pstree-prof-cmd", &[]).unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { .. }));
        let chain = format!("{:#}", anyhow::Error::from(err));
        assert_eq!(chain.matches("os error").count(), 1);
    }

    #[tokio::test]
    async fn test_exit_triggers_stop() {
        let stop = StopSignal::new();
        let launched = launch("sh", &["-c".to_string(), "exit 3".to_string()]).unwrap();
        let code = launched.watch(stop.clone()).await.unwrap();
        assert_eq!(code, Some(3));
        assert_eq!(stop.reason(), Some(StopReason::CommandExited(Some(3))));
    }
}
