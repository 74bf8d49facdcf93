//! Entry point that assembles and runs the build pipeline.

use std::sync::Arc;

use crate::artifact::Artifact;
use crate::cancel::Cancellation;
use crate::config::BuildSettings;
use crate::context::BuildContext;
use crate::driver::Driver;
use crate::error::BuildError;
use crate::runner::{RunState, Step, StepRunner};
use crate::ssh::{KeyGenerator, Provisioner};
use crate::steps::{
    StepCreateServer, StepCreateSshKey, StepCreateTemplate, StepProvision, StepStopServer,
};
use crate::ui::{TracingUi, Ui};

/// Builds storage templates from a disposable server.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use kiln::{Builder, BuildSettings, Cancellation, SshKeygen, SshProvisioner, UpCloudDriver};
/// # async fn example(settings: BuildSettings, driver: UpCloudDriver) -> Result<(), kiln::BuildError> {
/// let builder = Builder::new(
///     settings,
///     Arc::new(driver),
///     Arc::new(SshKeygen::system()),
///     Arc::new(SshProvisioner::system(vec![String::from("apt-get -y upgrade")])),
/// );
/// let artifact = builder.run(Cancellation::never()).await?;
/// println!("{artifact}");
/// # Ok(())
/// # }
/// ```
pub struct Builder {
    settings: Arc<BuildSettings>,
    driver: Arc<dyn Driver>,
    cleanup_driver: Arc<dyn Driver>,
    keys: Arc<dyn KeyGenerator>,
    provisioner: Arc<dyn Provisioner>,
    ui: Arc<dyn Ui>,
}

impl Builder {
    /// Creates a builder reporting progress through [`TracingUi`].
    #[must_use]
    pub fn new(
        settings: BuildSettings,
        driver: Arc<dyn Driver>,
        keys: Arc<dyn KeyGenerator>,
        provisioner: Arc<dyn Provisioner>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            cleanup_driver: Arc::clone(&driver),
            driver,
            keys,
            provisioner,
            ui: Arc::new(TracingUi),
        }
    }

    /// Replaces the progress sink.
    #[must_use]
    pub fn with_ui(mut self, ui: Arc<dyn Ui>) -> Self {
        self.ui = ui;
        self
    }

    /// Uses `driver` for cleanups and for the artifact.
    ///
    /// Pass a driver that does not observe cancellation so teardown still
    /// completes after the build was interrupted.
    #[must_use]
    pub fn with_cleanup_driver(mut self, driver: Arc<dyn Driver>) -> Self {
        self.cleanup_driver = driver;
        self
    }

    /// The steps run by [`Builder::run`], in order.
    #[must_use]
    pub fn steps(&self) -> Vec<Box<dyn Step>> {
        vec![
            Box::new(StepCreateSshKey::new(Arc::clone(&self.keys))),
            Box::new(StepCreateServer),
            Box::new(StepProvision::new(Arc::clone(&self.provisioner))),
            Box::new(StepStopServer),
            Box::new(StepCreateTemplate),
        ]
    }

    /// Runs the pipeline and returns the produced templates.
    ///
    /// # Errors
    ///
    /// Returns the [`BuildError`] that halted the build. Cleanup has already
    /// run by the time the error is returned.
    pub async fn run(&self, cancellation: Cancellation) -> Result<Artifact, BuildError> {
        let mut ctx = BuildContext::new(
            Arc::clone(&self.settings),
            Arc::clone(&self.driver),
            Arc::clone(&self.ui),
            cancellation,
        )
        .with_cleanup_driver(Arc::clone(&self.cleanup_driver));
        let mut runner = StepRunner::new(self.steps());

        match runner.run(&mut ctx).await {
            RunState::Completed if ctx.templates.is_empty() => {
                Err(BuildError::MissingState { fact: "templates" })
            }
            RunState::Completed => Ok(Artifact::new(
                ctx.templates,
                ctx.generated,
                Arc::clone(&self.cleanup_driver),
            )),
            RunState::Halted | RunState::Running => Err(ctx
                .error
                .unwrap_or(BuildError::MissingState {
                    fact: "halting error",
                })),
        }
    }
}
