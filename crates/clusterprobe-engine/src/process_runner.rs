//! Process Runner: executes a single argv under a timeout, capturing
//! combined stdout+stderr.

use clusterprobe_core::{Error, Result};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::warn;

/// Run `argv` to completion, combining stdout and stderr, enforcing
/// `timeout_duration` against the whole invocation (spawn through exit).
///
/// Non-zero exit is not itself an error -- callers (e.g. the Power Probe)
/// classify output regardless of exit status, matching a command that
/// reports unreachable hosts via a non-zero exit and still-useful stderr.
/// Spawn failure and timeout are the only hard errors.
pub async fn run(argv: &[String], timeout_duration: Duration) -> Result<String> {
    let Some((program, args)) = argv.split_first() else {
        return Err(Error::InvalidTemplate("empty argv".to_string()));
    };

    let mut cmd = Command::new(program);
    cmd.args(args);

    let output = match timeout(timeout_duration, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            warn!(argv = ?argv, error = %e, "subprocess failed to spawn");
            return Err(Error::SubprocessFailure(format!(
                "failed to spawn {argv:?}: {e}"
            )));
        }
        Err(_) => {
            warn!(argv = ?argv, timeout = ?timeout_duration, "subprocess timed out");
            return Err(Error::Timeout);
        }
    };

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        warn!(
            argv = ?argv,
            status = ?output.status,
            output = %combined,
            "subprocess exited non-zero"
        );
    }

    Ok(combined)
}
