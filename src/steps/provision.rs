//! Waits for SSH and hands the server to the provisioner.

use std::sync::Arc;
use std::time::Duration;

use crate::context::BuildContext;
use crate::error::BuildError;
use crate::runner::{Step, StepAction, StepFuture};
use crate::ssh::{
    DEFAULT_PROBE_INTERVAL, ProvisionError, ProvisionTarget, Provisioner, wait_for_port,
};

/// Runs the configured provisioner once the server's SSH port is open.
pub struct StepProvision {
    provisioner: Arc<dyn Provisioner>,
    probe_interval: Duration,
}

impl StepProvision {
    /// Creates the step around `provisioner`.
    #[must_use]
    pub fn new(provisioner: Arc<dyn Provisioner>) -> Self {
        Self {
            provisioner,
            probe_interval: DEFAULT_PROBE_INTERVAL,
        }
    }

    /// Overrides the interval between SSH port probes.
    #[must_use]
    pub const fn with_probe_interval(mut self, probe_interval: Duration) -> Self {
        self.probe_interval = probe_interval;
        self
    }
}

fn provisioning_error(err: ProvisionError) -> BuildError {
    match err {
        ProvisionError::Cancelled => BuildError::Cancelled,
        other => BuildError::ProvisioningFailed {
            message: other.to_string(),
        },
    }
}

impl Step for StepProvision {
    fn name(&self) -> &'static str {
        "provision"
    }

    fn run<'a>(&'a self, ctx: &'a mut BuildContext) -> StepFuture<'a, StepAction> {
        Box::pin(async move {
            let Some(host) = ctx
                .server
                .as_ref()
                .and_then(|server| server.address.clone())
            else {
                return ctx.halt(BuildError::MissingState {
                    fact: "server address",
                });
            };
            let Some(private_key) = ctx.ssh_keys.as_ref().map(|keys| keys.private_key.clone())
            else {
                return ctx.halt(BuildError::MissingState { fact: "ssh key pair" });
            };
            let settings = Arc::clone(&ctx.settings);

            ctx.ui
                .say(&format!("Waiting for SSH on {host}:{}...", settings.ssh_port));
            if let Err(err) = wait_for_port(
                &host,
                settings.ssh_port,
                settings.state_timeout,
                self.probe_interval,
                &ctx.cancellation,
            )
            .await
            {
                return ctx.halt(provisioning_error(err));
            }

            let target = ProvisionTarget {
                host,
                port: settings.ssh_port,
                username: settings.ssh_username.clone(),
                private_key,
            };
            ctx.ui.say("Provisioning server...");
            match self.provisioner.provision(&target).await {
                Ok(()) => StepAction::Continue,
                Err(err) => ctx.halt(provisioning_error(err)),
            }
        })
    }
}
