//! Deadline-bounded polling for asynchronous state transitions.
//!
//! Every driver wait funnels through [`wait_for_state`]: fetch the resource,
//! compare its state against a [`StateWait`] target, and sleep for the poll
//! interval until the target is met, the timeout elapses, or cancellation
//! is requested.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};

use crate::cancel::Cancellation;
use crate::driver::{DriverError, ResourceKind};

/// Default interval between state fetches.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default bound on every state wait.
pub const DEFAULT_STATE_TIMEOUT: Duration = Duration::from_secs(300);

/// Target of a state wait.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StateWait<S> {
    /// Satisfied once the observed state equals the value.
    Desired(S),
    /// Satisfied once the observed state differs from the value.
    Undesired(S),
}

impl<S: PartialEq> StateWait<S> {
    /// Reports whether `observed` satisfies the target.
    pub fn is_satisfied_by(&self, observed: &S) -> bool {
        match self {
            Self::Desired(state) => observed == state,
            Self::Undesired(state) => observed != state,
        }
    }
}

impl<S: fmt::Display> fmt::Display for StateWait<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Desired(state) => write!(f, "reach {state}"),
            Self::Undesired(state) => write!(f, "leave {state}"),
        }
    }
}

/// Timing parameters for state waits.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WaitOptions {
    /// Pause between fetches.
    pub poll_interval: Duration,
    /// Total time allowed before giving up.
    pub timeout: Duration,
}

impl WaitOptions {
    /// Uses the default poll interval with the given timeout.
    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout,
        }
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_STATE_TIMEOUT)
    }
}

/// Polls `fetch` until `state_of` reports a state satisfying `target`.
///
/// Returns the last fetched value on success. Fetch errors are returned
/// unchanged without retrying.
///
/// # Errors
///
/// Returns [`DriverError::StateTimeout`] carrying the last observed state
/// once `options.timeout` has elapsed, and [`DriverError::Cancelled`] as soon
/// as `cancellation` fires.
pub async fn wait_for_state<T, S, F, Fut, G>(
    resource: ResourceKind,
    id: &str,
    target: &StateWait<S>,
    options: WaitOptions,
    cancellation: &Cancellation,
    mut fetch: F,
    state_of: G,
) -> Result<T, DriverError>
where
    S: PartialEq + fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DriverError>>,
    G: Fn(&T) -> S,
{
    let started = Instant::now();
    let cancelled = || DriverError::Cancelled {
        resource,
        id: id.to_owned(),
    };

    loop {
        if cancellation.is_cancelled() {
            return Err(cancelled());
        }

        let value = fetch().await?;
        let state = state_of(&value);
        if target.is_satisfied_by(&state) {
            return Ok(value);
        }

        let elapsed = started.elapsed();
        if elapsed >= options.timeout {
            return Err(DriverError::StateTimeout {
                resource,
                id: id.to_owned(),
                target: target.to_string(),
                last_state: state.to_string(),
            });
        }

        tracing::debug!(%resource, id, %state, awaiting = %target, "waiting for state");
        let pause = options.poll_interval.min(options.timeout - elapsed);
        tokio::select! {
            () = sleep(pause) => {}
            () = cancellation.cancelled() => return Err(cancelled()),
        }
    }
}
