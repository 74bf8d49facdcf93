//! Stops the build server so its disk can be templatized.

use std::sync::Arc;

use crate::context::BuildContext;
use crate::error::BuildError;
use crate::runner::{Step, StepAction, StepFuture};

/// Stops the server recorded by the create-server step.
#[derive(Clone, Copy, Debug, Default)]
pub struct StepStopServer;

impl Step for StepStopServer {
    fn name(&self) -> &'static str {
        "stop_server"
    }

    fn run<'a>(&'a self, ctx: &'a mut BuildContext) -> StepFuture<'a, StepAction> {
        Box::pin(async move {
            let Some(server_id) = ctx.server.as_ref().map(|server| server.uuid.clone()) else {
                return ctx.halt(BuildError::MissingState { fact: "server id" });
            };
            let driver = Arc::clone(&ctx.driver);

            ctx.ui.say(&format!("Stopping server {server_id}..."));
            match driver.stop_server(&server_id).await {
                Ok(()) => StepAction::Continue,
                Err(err) => ctx.halt(err),
            }
        })
    }
}
