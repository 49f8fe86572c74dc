//! Entry point tying the reconcile pieces to one set of collaborators.

use charmctl_core::api::{AddMachineArgs, ControlPlane, ModelDirectory, ResourceClient};
use charmctl_core::{
    ApplicationDelta, ApplicationName, CreatedApplication, DesiredApplication, ModelName,
    ObservedApplication, Settings,
};

use crate::deploy::Deployer;
use crate::error::ReconcileError;
use crate::machines;
use crate::read::Reader;
use crate::retry::{CancelToken, Retrier, RetryPolicy};
use crate::update::Updater;

/// Create/read/update/destroy of applications against one control plane.
pub struct Applications<C, R, M> {
    control: C,
    resources: R,
    directory: M,
    retrier: Retrier,
    settings: Settings,
}

impl<C, R, M> Applications<C, R, M>
where
    C: ControlPlane,
    R: ResourceClient,
    M: ModelDirectory,
{
    pub fn new(control: C, resources: R, directory: M) -> Self {
        Self {
            control,
            resources,
            directory,
            retrier: Retrier::default(),
            settings: Settings::default(),
        }
    }

    /// Adopt `settings`, rebuilding the retry policy from them. The current
    /// cancellation token is kept.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        let policy = RetryPolicy::from(&settings.retry);
        self.retrier = Retrier::new(policy, self.retrier.cancel_token().clone());
        self.settings = settings;
        self
    }

    pub fn with_retrier(mut self, retrier: Retrier) -> Self {
        self.retrier = retrier;
        self
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    pub fn resource_client(&self) -> &R {
        &self.resources
    }

    /// Token that cancels in-flight retry loops of this instance.
    pub fn cancel_token(&self) -> &CancelToken {
        self.retrier.cancel_token()
    }

    pub fn create(&self, spec: &DesiredApplication) -> Result<CreatedApplication, ReconcileError> {
        Deployer {
            control: &self.control,
            resources: &self.resources,
            retrier: &self.retrier,
            default_architecture: &self.settings.default_architecture,
            repository_facade_version: self.settings.repository_facade_version,
        }
        .deploy(spec)
    }

    pub fn read(
        &self,
        model: &ModelName,
        name: &ApplicationName,
    ) -> Result<ObservedApplication, ReconcileError> {
        self.reader().read(model, name)
    }

    pub fn read_with_retry(
        &self,
        model: &ModelName,
        name: &ApplicationName,
    ) -> Result<Option<ObservedApplication>, ReconcileError> {
        self.reader().read_with_retry(model, name)
    }

    pub fn update(&self, delta: &ApplicationDelta) -> Result<(), ReconcileError> {
        Updater {
            control: &self.control,
            resources: &self.resources,
            directory: &self.directory,
        }
        .update(delta)
    }

    /// Destroy an application together with its storage.
    pub fn destroy(&self, model: &ModelName, name: &ApplicationName) -> Result<(), ReconcileError> {
        let results = self
            .control
            .destroy_applications(model, std::slice::from_ref(name), true)
            .map_err(|e| ReconcileError::remote("destroy application", e))?;
        if let Some(Err(err)) = results.into_iter().next() {
            return Err(ReconcileError::remote("destroy application", err));
        }
        tracing::info!(app = %name, model = %model, "application destroyed");
        Ok(())
    }

    pub fn create_machine(
        &self,
        model: &ModelName,
        args: &AddMachineArgs,
    ) -> Result<String, ReconcileError> {
        machines::create_machine(&self.control, model, args)
    }

    fn reader(&self) -> Reader<'_, C, R, M> {
        Reader {
            control: &self.control,
            resources: &self.resources,
            directory: &self.directory,
            retrier: &self.retrier,
        }
    }
}
