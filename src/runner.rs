//! Ordered step execution with reverse-order cleanup.
//!
//! The runner drives a list of [`Step`]s against one [`BuildContext`]. Each
//! step either continues or halts the build; once the last step finishes or
//! a step halts, every step that ran (the halting one included) is cleaned
//! up in reverse order. Cleanup always runs to completion: failures are
//! reported as warnings and the walk carries on.

use std::future::Future;
use std::pin::Pin;

use crate::context::BuildContext;
use crate::error::BuildError;

/// Future returned by step methods.
pub type StepFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of a single step.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StepAction {
    /// Proceed to the next step.
    Continue,
    /// Stop the build; the step has recorded its error in the context.
    Halt,
}

/// Final state of a run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunState {
    /// A step is executing.
    Running,
    /// A step halted or cancellation was observed.
    Halted,
    /// Every step continued.
    Completed,
}

/// One unit of build work with a compensating cleanup.
pub trait Step: Send + Sync {
    /// Short name used in logs and cleanup warnings.
    fn name(&self) -> &'static str;

    /// Performs the step's work.
    fn run<'a>(&'a self, ctx: &'a mut BuildContext) -> StepFuture<'a, StepAction>;

    /// Releases whatever `run` recorded in the context.
    ///
    /// Called exactly once for every step whose `run` was invoked, even when
    /// `run` halted before creating anything. Returns the failures it
    /// encountered; none of them stop the remaining cleanups.
    fn cleanup<'a>(&'a self, _ctx: &'a mut BuildContext) -> StepFuture<'a, Vec<BuildError>> {
        Box::pin(async { Vec::new() })
    }
}

/// Executes steps in order and cleans up in reverse.
#[derive(Default)]
pub struct StepRunner {
    steps: Vec<Box<dyn Step>>,
    state: Option<RunState>,
}

impl StepRunner {
    /// Creates a runner over `steps`.
    #[must_use]
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self { steps, state: None }
    }

    /// Names of the configured steps in execution order.
    #[must_use]
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// State of the most recent run, if any.
    #[must_use]
    pub const fn state(&self) -> Option<RunState> {
        self.state
    }

    /// Runs every step, then the cleanups, and returns the final state.
    ///
    /// Cancellation is checked before each step; observing it halts the
    /// build with [`BuildError::Cancelled`].
    pub async fn run(&mut self, ctx: &mut BuildContext) -> RunState {
        self.state = Some(RunState::Running);
        let mut ran = 0;
        let mut outcome = RunState::Completed;

        for step in &self.steps {
            if ctx.cancellation.is_cancelled() {
                ctx.halt(BuildError::Cancelled);
                outcome = RunState::Halted;
                break;
            }

            ran += 1;
            tracing::debug!(step = step.name(), "running step");
            if step.run(ctx).await == StepAction::Halt {
                if ctx.error.is_none() {
                    ctx.halt(BuildError::MissingState {
                        fact: "halting error",
                    });
                }
                tracing::debug!(step = step.name(), "step halted the build");
                outcome = RunState::Halted;
                break;
            }
        }

        for step in self.steps.iter().take(ran).rev() {
            tracing::debug!(step = step.name(), "cleaning up step");
            for err in step.cleanup(ctx).await {
                ctx.ui
                    .warn(&format!("cleanup of {} failed: {err}", step.name()));
            }
        }

        self.state = Some(outcome);
        outcome
    }
}
