//! Contract of the remote control plane, as consumed by the reconciler.
//!
//! The RPC client behind these traits is an external collaborator. Every call
//! is a synchronous point operation against one model; none of them retry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::base::Base;
use crate::charm::{CharmId, CharmUrl, Origin};
use crate::error::ApiError;
use crate::types::{
    ApplicationName, ConfigEntry, ModelName, ModelType, PendingResource, ResourceMeta,
};

pub type ApiResult<T> = Result<T, ApiError>;

/// Facade whose version decides the deploy dialect.
pub const APPLICATION_FACADE: &str = "Application";

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Arguments of the legacy, locally resolved `Deploy` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployArgs {
    pub charm: CharmId,
    pub application: ApplicationName,
    pub num_units: u32,
    pub config: BTreeMap<String, String>,
    pub constraints: Option<String>,
    pub placement: Vec<String>,
    pub storage: BTreeMap<String, String>,
    pub endpoint_bindings: BTreeMap<String, String>,
    /// Resource name to pending resource id.
    pub resources: BTreeMap<String, String>,
}

/// Arguments of `DeployFromRepository`; the control plane resolves everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDeployArgs {
    pub charm_name: String,
    pub application: ApplicationName,
    pub base: Option<Base>,
    pub channel: Option<String>,
    pub revision: Option<i64>,
    pub num_units: u32,
    /// `{application: {key: value}}` as a YAML document.
    pub config_yaml: String,
    pub constraints: Option<String>,
    pub placement: Vec<String>,
    pub storage: BTreeMap<String, String>,
    pub endpoint_bindings: BTreeMap<String, String>,
    /// Resource name to revision string or local reference.
    pub resources: BTreeMap<String, String>,
    pub trust: bool,
}

/// Arguments of `SetCharm`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetCharmArgs {
    pub application: ApplicationName,
    pub charm: CharmId,
    pub resource_ids: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddUnitsArgs {
    pub application: ApplicationName,
    pub num_units: u32,
    pub placement: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AddMachineArgs {
    pub base: Option<Base>,
    pub constraints: Option<String>,
    pub placement: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddPendingResourcesArgs {
    pub application: ApplicationName,
    pub charm: CharmId,
    pub resources: Vec<PendingResource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StatusFilter {
    pub patterns: Vec<String>,
    pub include_storage: bool,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Outcome of `ResolveCharm`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCharm {
    pub url: CharmUrl,
    pub origin: Origin,
    pub supported_bases: Vec<Base>,
}

/// Metadata of a charm already added to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CharmInfo {
    pub name: String,
    pub subordinate: bool,
    pub resources: BTreeMap<String, ResourceMeta>,
}

/// A local upload requested by `DeployFromRepository`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUpload {
    pub name: String,
    /// Declared resource type as sent by the control plane.
    pub kind: String,
    pub reference: String,
    pub pending_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployInfo {
    pub name: String,
    pub revision: i64,
    pub channel: String,
    pub base: Option<Base>,
}

/// Everything `DeployFromRepository` hands back; errors are not fatal on
/// their own and may accompany partial info.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RepositoryDeployOutcome {
    pub info: Option<DeployInfo>,
    pub pending_uploads: Vec<PendingUpload>,
    pub errors: Vec<ApiError>,
}

/// Per-endpoint exposure parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ExposedEndpoint {
    pub spaces: Vec<String>,
    pub cidrs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ApplicationInfo {
    pub name: ApplicationName,
    pub charm: String,
    pub principal: bool,
    pub exposed: bool,
    pub exposed_endpoints: BTreeMap<String, ExposedEndpoint>,
    pub constraints: String,
    pub endpoint_bindings: BTreeMap<String, String>,
}

/// Application config split by namespace: charm settings and
/// application-level settings such as `trust`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConfigSnapshot {
    pub charm_config: BTreeMap<String, ConfigEntry>,
    pub application_config: BTreeMap<String, ConfigEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UnitStatus {
    /// Empty until the unit is assigned to a machine.
    pub machine: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ApplicationStatus {
    /// Charm URL of the running charm, e.g. `ch:amd64/postgresql-14`.
    pub charm: String,
    pub charm_channel: Option<String>,
    pub base: Option<Base>,
    pub scale: u32,
    pub units: BTreeMap<String, UnitStatus>,
}

/// One storage instance and its provisioned backing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StorageInstance {
    /// Instance id such as `pgdata/0`.
    pub id: String,
    /// Owning unit or application name, e.g. `pg/0` or `pg`.
    pub owner: String,
    pub pool: String,
    pub size_mb: u64,
}

impl StorageInstance {
    /// Storage name: the instance id without its `/N` suffix.
    pub fn storage_name(&self) -> &str {
        self.id.split_once('/').map_or(self.id.as_str(), |(name, _)| name)
    }

    /// Owning application: the owner without its `/N` unit suffix.
    pub fn application(&self) -> &str {
        self.owner.split_once('/').map_or(self.owner.as_str(), |(app, _)| app)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FullStatus {
    pub applications: BTreeMap<String, ApplicationStatus>,
    pub storage: Vec<StorageInstance>,
}

/// A resource as recorded against a deployed application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub name: String,
    pub kind: String,
    pub revision: i64,
}

/// Model settings relevant to reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ModelConfig {
    /// Default base, only when set explicitly on the model.
    pub default_base: Option<Base>,
    pub default_space: String,
    pub constraints: Option<String>,
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Point operations of the control plane's application API.
pub trait ControlPlane {
    /// Highest supported version of `facade`, 0 when unsupported.
    fn best_facade_version(&self, facade: &str) -> u32;

    /// Major version of the control plane agent.
    fn server_major_version(&self, model: &ModelName) -> ApiResult<u32>;

    fn model_config(&self, model: &ModelName) -> ApiResult<ModelConfig>;

    fn resolve_charm(
        &self,
        model: &ModelName,
        url: &CharmUrl,
        origin: &Origin,
    ) -> ApiResult<ResolvedCharm>;

    fn add_charm(
        &self,
        model: &ModelName,
        url: &CharmUrl,
        origin: &Origin,
        force: bool,
    ) -> ApiResult<Origin>;

    fn charm_info(&self, model: &ModelName, url: &CharmUrl) -> ApiResult<CharmInfo>;

    fn deploy(&self, model: &ModelName, args: &DeployArgs) -> ApiResult<()>;

    fn deploy_from_repository(
        &self,
        model: &ModelName,
        args: &RepositoryDeployArgs,
    ) -> RepositoryDeployOutcome;

    fn applications_info(
        &self,
        model: &ModelName,
        applications: &[ApplicationName],
    ) -> ApiResult<Vec<ApiResult<ApplicationInfo>>>;

    /// Config of the master generation.
    fn get_config(
        &self,
        model: &ModelName,
        application: &ApplicationName,
    ) -> ApiResult<ConfigSnapshot>;

    fn status(&self, model: &ModelName, filter: &StatusFilter) -> ApiResult<FullStatus>;

    fn charm_url_origin(
        &self,
        model: &ModelName,
        application: &ApplicationName,
    ) -> ApiResult<CharmId>;

    fn set_charm(&self, model: &ModelName, args: &SetCharmArgs) -> ApiResult<()>;

    fn set_config(
        &self,
        model: &ModelName,
        application: &ApplicationName,
        values: &BTreeMap<String, String>,
    ) -> ApiResult<()>;

    fn set_constraints(
        &self,
        model: &ModelName,
        application: &ApplicationName,
        constraints: &str,
    ) -> ApiResult<()>;

    fn merge_bindings(
        &self,
        model: &ModelName,
        application: &ApplicationName,
        bindings: &BTreeMap<String, String>,
    ) -> ApiResult<()>;

    fn expose(
        &self,
        model: &ModelName,
        application: &ApplicationName,
        endpoints: &BTreeMap<String, ExposedEndpoint>,
    ) -> ApiResult<()>;

    /// An empty `endpoints` slice unexposes every endpoint.
    fn unexpose(
        &self,
        model: &ModelName,
        application: &ApplicationName,
        endpoints: &[String],
    ) -> ApiResult<()>;

    fn scale_application(
        &self,
        model: &ModelName,
        application: &ApplicationName,
        scale: u32,
    ) -> ApiResult<()>;

    fn add_units(&self, model: &ModelName, args: &AddUnitsArgs) -> ApiResult<Vec<String>>;

    fn destroy_units(
        &self,
        model: &ModelName,
        units: &[String],
        destroy_storage: bool,
    ) -> ApiResult<()>;

    /// One result per requested application.
    fn destroy_applications(
        &self,
        model: &ModelName,
        applications: &[ApplicationName],
        destroy_storage: bool,
    ) -> ApiResult<Vec<ApiResult<()>>>;

    /// Returns the new machine id.
    fn add_machine(&self, model: &ModelName, args: &AddMachineArgs) -> ApiResult<String>;
}

/// Resource sub-client.
pub trait ResourceClient {
    /// Register store resources; returns one pending id per input, in order.
    fn add_pending_resources(
        &self,
        model: &ModelName,
        args: &AddPendingResourcesArgs,
    ) -> ApiResult<Vec<String>>;

    /// Register and upload local content in one step; returns the pending id.
    fn upload_pending_resource(
        &self,
        model: &ModelName,
        application: &ApplicationName,
        meta: &ResourceMeta,
        reference: &str,
    ) -> ApiResult<String>;

    /// Upload content for a pending id the control plane already allocated.
    fn upload(
        &self,
        model: &ModelName,
        application: &ApplicationName,
        name: &str,
        reference: &str,
        pending_id: &str,
    ) -> ApiResult<()>;

    fn list_resources(
        &self,
        model: &ModelName,
        application: &ApplicationName,
    ) -> ApiResult<Vec<ResourceRecord>>;
}

/// Model metadata cache owned by the connection layer.
pub trait ModelDirectory {
    fn model_type(&self, model: &ModelName) -> ApiResult<ModelType>;
}
