use std::{future::Future, time::Duration};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// How a resource is re-fetched while waiting for it to reach a terminal status.
///
/// The delay between attempts starts at `initial_delay` and is multiplied by `multiplier` after
/// every attempt, capped at `max_delay`. A multiplier of 1 gives a fixed interval. Once `timeout`
/// has elapsed without a terminal status, polling stops with [`Error::Timeout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: u32,
    pub timeout: Duration,
}

impl PollPolicy {
    /// Polls every `delay` for at most `timeout`.
    pub fn fixed(delay: Duration, timeout: Duration) -> Self {
        PollPolicy {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1,
            timeout,
        }
    }

    /// Doubles the delay after each attempt, from `initial` up to `max`.
    pub fn exponential(initial: Duration, max: Duration, timeout: Duration) -> Self {
        PollPolicy {
            initial_delay: initial,
            max_delay: max.max(initial),
            multiplier: 2,
            timeout,
        }
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        delay
            .saturating_mul(self.multiplier.max(1))
            .min(self.max_delay)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy::exponential(
            Duration::from_secs(1),
            Duration::from_secs(10),
            Duration::from_secs(5 * 60),
        )
    }
}

/// Calls `fetch` until `done` accepts the result, sleeping between attempts.
///
/// Sleeping is interrupted by `cancel`. Errors from `fetch` end polling immediately.
pub(crate) async fn poll_until<T, F, Fut>(
    policy: &PollPolicy,
    resource: &str,
    cancel: &CancellationToken,
    mut fetch: F,
    mut done: impl FnMut(&T) -> bool,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let mut delay = policy.initial_delay;

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let value = fetch().await?;

        if done(&value) {
            return Ok(value);
        }

        let waited = started.elapsed();
        if waited >= policy.timeout {
            return Err(Error::Timeout {
                resource: resource.to_owned(),
                waited,
            });
        }

        let sleep = delay.min(policy.timeout - waited);
        log::trace!("{resource} not done yet, polling again in {sleep:?}");

        tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            _ = tokio::time::sleep(sleep) => {}
        }

        delay = policy.next_delay(delay);
    }
}
