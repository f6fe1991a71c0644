//! Readiness suspension points.

use std::time::Duration;

/// Suspend until `ready` reports true, re-checking every `poll_interval`.
///
/// There is no timeout: a collaborator that never becomes ready suspends
/// the caller indefinitely.
pub async fn wait_until<F>(ready: F, poll_interval: Duration)
where
    F: Fn() -> bool,
{
    while !ready() {
        tokio::time::sleep(poll_interval).await;
    }
}
