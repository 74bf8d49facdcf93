//! Generates the temporary key pair used to reach the build server.

use std::sync::Arc;

use crate::context::BuildContext;
use crate::error::BuildError;
use crate::runner::{Step, StepAction, StepFuture};
use crate::ssh::{KeyGenerator, write_private_key};

/// Creates an ephemeral ed25519 key pair and stores it in the context.
///
/// When `debug_key_path` is configured the private key is also written
/// there so the server can be inspected by hand.
pub struct StepCreateSshKey {
    generator: Arc<dyn KeyGenerator>,
}

impl StepCreateSshKey {
    /// Creates the step around `generator`.
    #[must_use]
    pub fn new(generator: Arc<dyn KeyGenerator>) -> Self {
        Self { generator }
    }
}

impl Step for StepCreateSshKey {
    fn name(&self) -> &'static str {
        "create_ssh_key"
    }

    fn run<'a>(&'a self, ctx: &'a mut BuildContext) -> StepFuture<'a, StepAction> {
        Box::pin(async move {
            ctx.ui.say("Creating temporary SSH key pair...");
            let keys = match self.generator.generate().await {
                Ok(keys) => keys,
                Err(err) => {
                    return ctx.halt(BuildError::KeyGeneration {
                        message: err.to_string(),
                    });
                }
            };

            if let Some(path) = ctx.settings.debug_key_path.clone() {
                if let Err(err) = write_private_key(&path, &keys.private_key) {
                    return ctx.halt(BuildError::KeyGeneration {
                        message: err.to_string(),
                    });
                }
                ctx.ui.message(&format!("Saved private key to {path}"));
            }

            ctx.ssh_keys = Some(keys);
            StepAction::Continue
        })
    }
}
