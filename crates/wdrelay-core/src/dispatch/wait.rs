use crate::models::{CommandResult, WaitUntil};
use std::fmt::Display;
use std::future::Future;
use tokio::time::Instant;
use tracing::debug;

/// Repeat `attempt` until its result satisfies `wait` or the deadline passes.
///
/// Attempt errors are ignored. The deadline is only checked after the poll
/// sleep, so a condition that is met on the first try always wins; once the
/// deadline has passed no further attempt is made and the local timeout
/// result (`status 1000`) is returned.
pub async fn poll_until<F, Fut, E>(wait: &WaitUntil, trace_id: &str, mut attempt: F) -> CommandResult
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<CommandResult, E>>,
    E: Display,
{
    let deadline = Instant::now() + wait.timeout;
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        match attempt().await {
            Ok(result) if wait.matches(result.status, &result.value) => {
                debug!(trace_id, attempts, "Wait-until condition met");
                return result;
            }
            Ok(result) => {
                debug!(trace_id, attempts, status = result.status, "Wait-until condition not met");
            }
            Err(err) => {
                debug!(trace_id, attempts, error = %err, "Wait-until attempt failed");
            }
        }

        tokio::time::sleep(wait.poll_interval).await;
        if Instant::now() > deadline {
            debug!(trace_id, attempts, "Wait-until timeout reached");
            return CommandResult::wait_timeout();
        }
    }
}
