//! Deploy orchestration over two capability-versioned dialects.
//!
//! Newer control planes take the whole desired application in one
//! `DeployFromRepository` call and resolve everything server side. Older
//! ones need the client to resolve the charm, pin a base, add the charm,
//! register resources, and only then deploy; that sequence races with the
//! control plane's own bookkeeping, so it runs inside the retry executor.

use charmctl_core::api::{
    ControlPlane, DeployArgs, ModelConfig, RepositoryDeployArgs, ResourceClient,
    APPLICATION_FACADE,
};
use charmctl_core::charm::EntityKind;
use charmctl_core::{
    Base, Channel, CharmId, CharmUrl, CreatedApplication, DesiredApplication, ErrorKind, Origin,
    Platform,
};

use crate::config;
use crate::error::ReconcileError;
use crate::expose;
use crate::resolver::{self, BaseRequest, PlatformBases};
use crate::resources;
use crate::retry::Retrier;

/// Which deploy call sequence the control plane understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployDialect {
    Repository,
    Legacy,
}

impl DeployDialect {
    pub fn probe<C>(control: &C, repository_facade_version: u32) -> Self
    where
        C: ControlPlane + ?Sized,
    {
        let version = control.best_facade_version(APPLICATION_FACADE);
        if version >= repository_facade_version {
            DeployDialect::Repository
        } else {
            DeployDialect::Legacy
        }
    }
}

/// Charm reference after validation of its revision and channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSelection {
    pub url: CharmUrl,
    pub channel: Option<Channel>,
    pub revision: Option<i64>,
    pub base: Option<Base>,
}

impl PackageSelection {
    /// Reject a literal revision next to an explicit one, and a revision
    /// without a channel.
    pub fn from_spec(spec: &DesiredApplication) -> Result<Self, ReconcileError> {
        let url = CharmUrl::parse(&spec.charm.name)?;
        if url.revision.is_some() && spec.charm.revision.is_some() {
            return Err(ReconcileError::NotValid(format!(
                "charm {} carries a revision; do not also set a revision",
                spec.charm.name
            )));
        }
        let revision = spec.charm.revision.or(url.revision);
        let channel = spec
            .charm
            .channel
            .as_deref()
            .map(Channel::parse)
            .transpose()?;
        if revision.is_some() && channel.is_none() {
            return Err(ReconcileError::NotValid(
                "specifying a revision requires a channel for future upgrades".to_string(),
            ));
        }
        let base = spec.charm.base.as_deref().map(Base::parse).transpose()?;
        Ok(Self {
            url: url.with_revision(None),
            channel,
            revision,
            base,
        })
    }
}

pub struct Deployer<'a, C: ?Sized, R: ?Sized> {
    pub control: &'a C,
    pub resources: &'a R,
    pub retrier: &'a Retrier,
    pub default_architecture: &'a str,
    pub repository_facade_version: u32,
}

impl<'a, C, R> Deployer<'a, C, R>
where
    C: ControlPlane + ?Sized,
    R: ResourceClient + ?Sized,
{
    /// Deploy `spec` and then expose it once.
    ///
    /// An exposure failure is reported as [`ReconcileError::Expose`]; the
    /// deployed application is left in place.
    pub fn deploy(&self, spec: &DesiredApplication) -> Result<CreatedApplication, ReconcileError> {
        let selection = PackageSelection::from_spec(spec)?;
        let dialect = DeployDialect::probe(self.control, self.repository_facade_version);
        tracing::debug!(app = %spec.name, ?dialect, "deploying application");

        match dialect {
            DeployDialect::Repository => self.deploy_from_repository(spec, &selection)?,
            DeployDialect::Legacy => self.deploy_legacy(spec, &selection)?,
        }

        if let Some(spec_expose) = &spec.expose {
            expose::apply(self.control, &spec.model, &spec.name, spec_expose).map_err(|e| {
                ReconcileError::Expose {
                    app: spec.name.clone(),
                    source: Box::new(e),
                }
            })?;
        }

        tracing::info!(app = %spec.name, model = %spec.model, "application deployed");
        Ok(CreatedApplication {
            name: spec.name.clone(),
        })
    }

    fn deploy_from_repository(
        &self,
        spec: &DesiredApplication,
        selection: &PackageSelection,
    ) -> Result<(), ReconcileError> {
        let args = RepositoryDeployArgs {
            charm_name: selection.url.name.clone(),
            application: spec.name.clone(),
            base: selection.base.clone(),
            channel: selection.channel.as_ref().map(ToString::to_string),
            revision: selection.revision,
            num_units: spec.units,
            config_yaml: config::yaml_document(&spec.name.0, &spec.config)?,
            constraints: spec.constraints.clone(),
            placement: spec.placement.clone(),
            storage: spec.storage.clone(),
            endpoint_bindings: spec.endpoint_bindings.clone(),
            resources: spec.resources.clone().unwrap_or_default(),
            trust: spec.trust,
        };

        let outcome = self.control.deploy_from_repository(&spec.model, &args);
        if !outcome.errors.is_empty() {
            return Err(ReconcileError::Deploy {
                app: spec.name.clone(),
                errors: outcome.errors,
            });
        }
        if let Some(info) = &outcome.info {
            tracing::debug!(
                app = %spec.name,
                charm = %info.name,
                revision = info.revision,
                channel = %info.channel,
                "repository deploy accepted"
            );
        }
        resources::upload_pending(
            self.resources,
            &spec.model,
            &spec.name,
            &outcome.pending_uploads,
        )
    }

    fn deploy_legacy(
        &self,
        spec: &DesiredApplication,
        selection: &PackageSelection,
    ) -> Result<(), ReconcileError> {
        let model_config = self
            .control
            .model_config(&spec.model)
            .map_err(|e| ReconcileError::remote("get model config", e))?;
        let (url, origin) = self.resolve(spec, selection, &model_config)?;

        self.retrier
            .call(
                |state| {
                    tracing::debug!(app = %spec.name, attempt = state.attempt, "legacy deploy attempt");
                    self.add_and_deploy(spec, &url, &origin)
                },
                |err: &ReconcileError| {
                    matches!(err.kind(), ErrorKind::NotFound | ErrorKind::AlreadyExists)
                },
                |err, state| {
                    tracing::warn!(
                        app = %spec.name,
                        attempt = state.attempt,
                        delay_ms = state.next_delay.as_millis() as u64,
                        error = %err,
                        "deploy attempt failed, retrying"
                    );
                },
            )
            .map_err(ReconcileError::from)
    }

    /// Resolve the charm and pin its base.
    fn resolve(
        &self,
        spec: &DesiredApplication,
        selection: &PackageSelection,
        model_config: &ModelConfig,
    ) -> Result<(CharmUrl, Origin), ReconcileError> {
        let platform = Platform::from_constraints(
            spec.constraints.as_deref(),
            model_config.constraints.as_deref(),
            self.default_architecture,
            selection.base.clone(),
        );
        let requested = Origin::for_request(selection.channel.clone(), selection.revision, &platform);
        let resolved = self
            .control
            .resolve_charm(&spec.model, &selection.url, &requested)
            .map_err(|e| ReconcileError::remote("resolve charm", e))?;
        if resolved.origin.kind == EntityKind::Bundle {
            return Err(ReconcileError::NotValid(format!(
                "{} is a bundle; only charms can be deployed as applications",
                selection.url
            )));
        }

        let major = self
            .control
            .server_major_version(&spec.model)
            .map_err(|e| ReconcileError::remote("get server version", e))?;
        let platform_bases = PlatformBases::for_major_version(major)?;
        let base = resolver::select_base(
            &BaseRequest {
                user_base: selection.base.as_ref(),
                suggested: resolved.origin.base.as_ref(),
                model_default: model_config.default_base.as_ref(),
                charm_bases: &resolved.supported_bases,
            },
            &platform_bases,
        )?;
        tracing::debug!(app = %spec.name, %base, "base selected");

        let mut origin = resolved.origin;
        origin.base = Some(base);
        Ok((resolved.url, origin))
    }

    fn add_and_deploy(
        &self,
        spec: &DesiredApplication,
        url: &CharmUrl,
        origin: &Origin,
    ) -> Result<(), ReconcileError> {
        let origin = match self.control.add_charm(&spec.model, url, origin, false) {
            Ok(added) => added,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!(app = %spec.name, charm = %url, "charm already added");
                origin.clone()
            }
            Err(err) => return Err(ReconcileError::remote("add charm", err)),
        };
        let charm = CharmId {
            url: url.clone(),
            origin,
        };

        let info = self
            .control
            .charm_info(&spec.model, url)
            .map_err(|e| ReconcileError::remote("get charm info", e))?;
        let planned = resources::plan(&info.resources, spec.resources.as_ref());
        let registered =
            resources::register(self.resources, &spec.model, &spec.name, &charm, planned)?;

        let num_units = if info.subordinate { 0 } else { spec.units };
        let args = DeployArgs {
            charm,
            application: spec.name.clone(),
            num_units,
            config: config::normalize(&spec.config, spec.trust.then_some(true)),
            constraints: spec.constraints.clone(),
            placement: spec.placement.clone(),
            storage: spec.storage.clone(),
            endpoint_bindings: spec.endpoint_bindings.clone(),
            resources: resources::ids(&registered),
        };
        self.control
            .deploy(&spec.model, &args)
            .map_err(|e| ReconcileError::remote("deploy", e))
    }
}
