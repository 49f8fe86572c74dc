//! Observed-state reads and the convergence loop around them.
//!
//! A deploy returns before units are assigned to machines and before storage
//! is provisioned. [`Reader::read_with_retry`] polls until a snapshot is
//! complete, so callers never record a half-materialized application.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Utc;

use charmctl_core::api::{
    ApplicationInfo, ApplicationStatus, ControlPlane, ModelDirectory, ResourceClient,
    StatusFilter, StorageInstance,
};
use charmctl_core::types::{StorageSummary, TRUST_KEY};
use charmctl_core::{
    ApplicationName, ConfigEntry, ConfigValue, ErrorKind, ModelName, ModelType,
    ObservedApplication,
};

use crate::error::ReconcileError;
use crate::expose;
use crate::retry::{Retrier, RetryError};

pub struct Reader<'a, C: ?Sized, R: ?Sized, M: ?Sized> {
    pub control: &'a C,
    pub resources: &'a R,
    pub directory: &'a M,
    pub retrier: &'a Retrier,
}

/// Why one convergence attempt did not produce a final snapshot.
#[derive(Debug)]
enum Attempt {
    Read(ReconcileError),
    Unconverged(String),
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attempt::Read(err) => write!(f, "{err}"),
            Attempt::Unconverged(reason) => write!(f, "not converged: {reason}"),
        }
    }
}

impl<'a, C, R, M> Reader<'a, C, R, M>
where
    C: ControlPlane + ?Sized,
    R: ResourceClient + ?Sized,
    M: ModelDirectory + ?Sized,
{
    /// One fresh snapshot. Fails with NotFound when the application is
    /// unknown and StorageNotFound while its storage is still provisioning.
    pub fn read(
        &self,
        model: &ModelName,
        name: &ApplicationName,
    ) -> Result<ObservedApplication, ReconcileError> {
        tracing::debug!(app = %name, model = %model, "reading application");
        let model_type = self
            .directory
            .model_type(model)
            .map_err(|e| ReconcileError::remote("get model type", e))?;

        let info = self.application_info(model, name)?;

        let filter = StatusFilter {
            patterns: vec![name.0.clone()],
            include_storage: true,
        };
        let status = self
            .control
            .status(model, &filter)
            .map_err(|e| ReconcileError::remote("get status", e))?;
        let app_status = status
            .applications
            .get(&name.0)
            .ok_or_else(|| ReconcileError::ApplicationNotFound(name.clone()))?;
        let storage = summarize_storage(name, &status.storage)?;

        let config = self
            .control
            .get_config(model, name)
            .map_err(|e| ReconcileError::remote("get config", e))?;
        let charm = self
            .control
            .charm_url_origin(model, name)
            .map_err(|e| ReconcileError::remote("get charm origin", e))?;
        let model_config = self
            .control
            .model_config(model)
            .map_err(|e| ReconcileError::remote("get model config", e))?;
        let resources = self
            .resources
            .list_resources(model, name)
            .map_err(|e| ReconcileError::remote("list resources", e))?
            .into_iter()
            .map(|r| (r.name, r.revision))
            .collect();

        let units = match model_type {
            ModelType::Caas => app_status.scale,
            ModelType::Iaas => u32::try_from(app_status.units.len()).unwrap_or(u32::MAX),
        };

        Ok(ObservedApplication {
            name: name.clone(),
            model_type,
            charm: charm.url.name.clone(),
            revision: charm.origin.revision,
            channel: charm
                .origin
                .channel
                .as_ref()
                .map(ToString::to_string)
                .or_else(|| app_status.charm_channel.clone()),
            base: charm.origin.base.clone().or_else(|| app_status.base.clone()),
            units,
            principal: info.principal,
            trust: trust_of(&config.application_config),
            config: config.charm_config,
            placement: placement(app_status),
            storage,
            constraints: info.constraints.clone(),
            endpoint_bindings: non_default_bindings(
                &info.endpoint_bindings,
                &model_config.default_space,
            ),
            expose: expose::observed(info.exposed, &info.exposed_endpoints),
            resources,
            observed_at: Utc::now(),
        })
    }

    /// Poll [`read`](Self::read) until the snapshot is converged.
    ///
    /// NotFound, StorageNotFound, and unconverged snapshots are retried. Any
    /// other read error is logged and ends the loop with the last snapshot
    /// that was read successfully, if there was one.
    pub fn read_with_retry(
        &self,
        model: &ModelName,
        name: &ApplicationName,
    ) -> Result<Option<ObservedApplication>, ReconcileError> {
        let mut last_good: Option<ObservedApplication> = None;

        let result = self.retrier.call(
            |_| match self.read(model, name) {
                Ok(observed) => match check_converged(&observed) {
                    Ok(()) => Ok(Some(observed)),
                    Err(reason) => {
                        last_good = Some(observed);
                        Err(Attempt::Unconverged(reason))
                    }
                },
                Err(err)
                    if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::StorageNotFound) =>
                {
                    Err(Attempt::Read(err))
                }
                Err(err) => {
                    tracing::error!(app = %name, error = %err, "reading application failed");
                    Ok(last_good.take())
                }
            },
            |_| true,
            |attempt, state| {
                tracing::warn!(
                    app = %name,
                    attempt = state.attempt,
                    reason = %attempt,
                    "application not ready, retrying read"
                );
            },
        );

        match result {
            Ok(observed) => Ok(observed),
            Err(RetryError::Fatal(Attempt::Read(err))) => Err(err),
            Err(RetryError::Fatal(Attempt::Unconverged(reason))) => {
                Err(ReconcileError::NotConverged {
                    app: name.clone(),
                    reason,
                })
            }
            Err(RetryError::Exhausted { attempts, last }) => match last {
                Attempt::Read(err) => Err(ReconcileError::RetryExhausted {
                    attempts,
                    source: Box::new(err),
                }),
                Attempt::Unconverged(reason) => Err(ReconcileError::NotConverged {
                    app: name.clone(),
                    reason: format!("{reason} after {attempts} attempts"),
                }),
            },
            Err(RetryError::Cancelled { attempts }) => {
                Err(ReconcileError::Cancelled { attempts })
            }
        }
    }

    fn application_info(
        &self,
        model: &ModelName,
        name: &ApplicationName,
    ) -> Result<ApplicationInfo, ReconcileError> {
        let results = self
            .control
            .applications_info(model, std::slice::from_ref(name))
            .map_err(|e| ReconcileError::remote("get application info", e))?;
        match results.into_iter().next() {
            Some(Ok(info)) => Ok(info),
            Some(Err(err)) if err.kind() == ErrorKind::NotFound => {
                Err(ReconcileError::ApplicationNotFound(name.clone()))
            }
            Some(Err(err)) => Err(ReconcileError::remote("get application info", err)),
            None => Err(ReconcileError::ApplicationNotFound(name.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot assembly
// ---------------------------------------------------------------------------

/// Subordinates and empty applications are exempt; a principal IAAS
/// application needs one machine per unit.
pub fn check_converged(observed: &ObservedApplication) -> Result<(), String> {
    if !observed.principal || observed.model_type != ModelType::Iaas || observed.units == 0 {
        return Ok(());
    }
    let placed = observed.placement.len();
    if placed != observed.units as usize {
        return Err(format!(
            "{placed} of {} units assigned to machines",
            observed.units
        ));
    }
    Ok(())
}

/// Sorted machine ids of assigned units, without duplicates.
fn placement(status: &ApplicationStatus) -> Vec<String> {
    let mut machines: Vec<String> = status
        .units
        .values()
        .map(|u| u.machine.clone())
        .filter(|m| !m.is_empty())
        .collect();
    machines.sort();
    machines.dedup();
    machines
}

/// Aggregate storage instances of `app` by storage name. An instance
/// without a pool or size is still provisioning.
fn summarize_storage(
    app: &ApplicationName,
    instances: &[StorageInstance],
) -> Result<BTreeMap<String, StorageSummary>, ReconcileError> {
    let mut out: BTreeMap<String, StorageSummary> = BTreeMap::new();
    for instance in instances.iter().filter(|s| s.application() == app.0) {
        if instance.pool.is_empty() || instance.size_mb == 0 {
            return Err(ReconcileError::StorageNotFound(app.clone()));
        }
        let entry = out
            .entry(instance.storage_name().to_string())
            .or_insert_with(|| StorageSummary {
                pool: instance.pool.clone(),
                size_mb: instance.size_mb,
                count: 0,
            });
        entry.count += 1;
    }
    Ok(out)
}

fn trust_of(application_config: &BTreeMap<String, ConfigEntry>) -> bool {
    match application_config.get(TRUST_KEY).map(|e| &e.value) {
        Some(ConfigValue::Bool(b)) => *b,
        Some(ConfigValue::String(s)) => s == "true",
        _ => false,
    }
}

fn non_default_bindings(
    bindings: &BTreeMap<String, String>,
    default_space: &str,
) -> BTreeMap<String, String> {
    bindings
        .iter()
        .filter(|(_, space)| space.as_str() != default_space)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
