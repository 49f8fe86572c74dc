//! In-memory control plane shared by the integration tests.
//!
//! Every call is appended to `calls` by name so tests can assert ordering.
//! Responses are scripted through the public fields of [`State`].

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use charmctl_core::api::*;
use charmctl_core::charm::EntityKind;
use charmctl_core::types::ModelType;
use charmctl_core::{
    ApiError, ApplicationName, Base, CharmId, CharmUrl, DesiredApplication, ModelName, Origin,
    PackageRef, ResourceMeta,
};
use charmctl_reconcile::{Applications, CancelToken, Retrier, RetryPolicy};

#[derive(Default)]
pub struct State {
    pub calls: RefCell<Vec<&'static str>>,

    pub facade_version: Cell<u32>,
    pub major_version: Cell<u32>,
    pub model_type: Cell<ModelType>,
    pub model_config: RefCell<ModelConfig>,

    pub resolved: RefCell<Option<ResolvedCharm>>,
    pub add_charm_errors: RefCell<VecDeque<ApiError>>,
    pub charm_info: RefCell<CharmInfo>,
    pub deploy_errors: RefCell<VecDeque<ApiError>>,
    pub repository_outcome: RefCell<RepositoryDeployOutcome>,
    pub expose_error: RefCell<Option<ApiError>>,

    pub app_info: RefCell<ApplicationInfo>,
    pub app_info_error: RefCell<Option<ApiError>>,
    /// Status responses in order; the last one repeats.
    pub statuses: RefCell<VecDeque<ApiResult<FullStatus>>>,
    pub config: RefCell<ConfigSnapshot>,
    pub charm_id: RefCell<Option<CharmId>>,
    pub resource_records: RefCell<Vec<ResourceRecord>>,
    pub destroy_results: RefCell<Vec<ApiResult<()>>>,

    pub pending_resource_error: RefCell<Option<ApiError>>,
    pub next_pending_id: Cell<u32>,
    /// Answer `AddPendingResources` with one id fewer than requested.
    pub drop_pending_id: Cell<bool>,

    pub resolve_requests: RefCell<Vec<Origin>>,
    pub deploys: RefCell<Vec<DeployArgs>>,
    pub repository_deploys: RefCell<Vec<RepositoryDeployArgs>>,
    pub added_charms: RefCell<Vec<Origin>>,
    pub pending_resources: RefCell<Vec<AddPendingResourcesArgs>>,
    pub local_uploads: RefCell<Vec<(String, String)>>,
    pub uploads: RefCell<Vec<(String, String, String)>>,
    pub set_charms: RefCell<Vec<SetCharmArgs>>,
    pub set_configs: RefCell<Vec<BTreeMap<String, String>>>,
    pub constraints: RefCell<Vec<String>>,
    pub bindings: RefCell<Vec<BTreeMap<String, String>>>,
    pub exposes: RefCell<Vec<BTreeMap<String, ExposedEndpoint>>>,
    pub unexposes: RefCell<Vec<Vec<String>>>,
    pub scales: RefCell<Vec<u32>>,
    pub added_units: RefCell<Vec<AddUnitsArgs>>,
    pub destroyed_units: RefCell<Vec<(Vec<String>, bool)>>,
    pub destroyed_apps: RefCell<Vec<(Vec<ApplicationName>, bool)>>,
    pub machines: RefCell<Vec<AddMachineArgs>>,
}

/// Cheap handle; clones share one [`State`].
#[derive(Clone, Default)]
pub struct FakeControlPlane(pub Rc<State>);

impl std::ops::Deref for FakeControlPlane {
    type Target = State;

    fn deref(&self) -> &State {
        &self.0
    }
}

impl FakeControlPlane {
    /// A v3 control plane speaking the legacy dialect, with `pg` resolvable
    /// on the given charm bases.
    pub fn legacy(charm_bases: &[&str]) -> Self {
        let fake = Self::default();
        fake.facade_version.set(18);
        fake.major_version.set(3);
        fake.model_config.replace(ModelConfig {
            default_base: None,
            default_space: "alpha".into(),
            constraints: None,
        });
        fake.resolved.replace(Some(ResolvedCharm {
            url: CharmUrl::new("postgresql"),
            origin: Origin {
                architecture: "amd64".into(),
                ..Origin::default()
            },
            supported_bases: charm_bases.iter().copied().map(Base::ubuntu).collect(),
        }));
        fake.charm_info.replace(CharmInfo {
            name: "postgresql".into(),
            subordinate: false,
            resources: BTreeMap::new(),
        });
        fake
    }

    pub fn repository() -> Self {
        let fake = Self::legacy(&["22.04"]);
        fake.facade_version.set(19);
        fake
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.0.calls.borrow().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.0.calls.borrow().iter().filter(|c| **c == call).count()
    }

    pub fn push_status(&self, status: ApiResult<FullStatus>) {
        self.statuses.borrow_mut().push_back(status);
    }

    fn record(&self, call: &'static str) {
        self.0.calls.borrow_mut().push(call);
    }

    fn pending_id(&self) -> String {
        let n = self.next_pending_id.get() + 1;
        self.next_pending_id.set(n);
        format!("pending-{n}")
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Route reconciler logs through the test harness; `RUST_LOG=debug` shows them.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_test_writer()
        .try_init();
}

pub fn apps(fake: &FakeControlPlane) -> Applications<FakeControlPlane, FakeControlPlane, FakeControlPlane> {
    init_tracing();
    Applications::new(fake.clone(), fake.clone(), fake.clone())
        .with_retrier(Retrier::new(RetryPolicy::immediate(30), CancelToken::new()))
}

pub fn desired(name: &str, charm: &str) -> DesiredApplication {
    DesiredApplication {
        model: ModelName::from("prod"),
        name: ApplicationName::from(name),
        charm: PackageRef {
            name: charm.into(),
            channel: Some("14/stable".into()),
            revision: None,
            base: None,
        },
        units: 1,
        trust: false,
        config: BTreeMap::new(),
        placement: vec![],
        resources: None,
        endpoint_bindings: BTreeMap::new(),
        storage: BTreeMap::new(),
        constraints: None,
        expose: None,
    }
}

pub fn resource(name: &str, kind: charmctl_core::ResourceType) -> (String, ResourceMeta) {
    (
        name.to_string(),
        ResourceMeta {
            name: name.into(),
            kind,
            path: String::new(),
            description: String::new(),
        },
    )
}

/// Status with `pg` running units on the given machines ("" = unassigned).
pub fn status_for(app: &str, machines: &[&str]) -> FullStatus {
    let units = machines
        .iter()
        .enumerate()
        .map(|(i, m)| {
            (
                format!("{app}/{i}"),
                UnitStatus {
                    machine: m.to_string(),
                },
            )
        })
        .collect();
    FullStatus {
        applications: BTreeMap::from([(
            app.to_string(),
            ApplicationStatus {
                charm: format!("ch:amd64/{app}-14"),
                charm_channel: Some("14/stable".into()),
                base: Some(Base::ubuntu("22.04")),
                scale: machines.len() as u32,
                units,
            },
        )]),
        storage: vec![],
    }
}

/// Script a readable, principal application named `app`.
pub fn install_app(fake: &FakeControlPlane, app: &str) {
    fake.app_info.replace(ApplicationInfo {
        name: ApplicationName::from(app),
        charm: "postgresql".into(),
        principal: true,
        exposed: false,
        exposed_endpoints: BTreeMap::new(),
        constraints: "arch=amd64".into(),
        endpoint_bindings: BTreeMap::from([
            (String::new(), "alpha".to_string()),
            ("db".to_string(), "beta".to_string()),
        ]),
    });
    fake.charm_id.replace(Some(CharmId {
        url: CharmUrl::new("postgresql"),
        origin: Origin {
            revision: Some(14),
            channel: Some("14/stable".parse().expect("channel")),
            architecture: "amd64".into(),
            base: Some(Base::ubuntu("22.04")),
            id: Some("charm-id".into()),
            hash: Some("charm-hash".into()),
            ..Origin::default()
        },
    }));
}

// ---------------------------------------------------------------------------
// Trait impls
// ---------------------------------------------------------------------------

impl ControlPlane for FakeControlPlane {
    fn best_facade_version(&self, _facade: &str) -> u32 {
        self.record("BestFacadeVersion");
        self.facade_version.get()
    }

    fn server_major_version(&self, _model: &ModelName) -> ApiResult<u32> {
        self.record("ServerVersion");
        Ok(self.major_version.get())
    }

    fn model_config(&self, _model: &ModelName) -> ApiResult<ModelConfig> {
        self.record("ModelGet");
        Ok(self.model_config.borrow().clone())
    }

    fn resolve_charm(
        &self,
        _model: &ModelName,
        _url: &CharmUrl,
        origin: &Origin,
    ) -> ApiResult<ResolvedCharm> {
        self.record("ResolveCharm");
        self.resolve_requests.borrow_mut().push(origin.clone());
        let mut resolved = self
            .resolved
            .borrow()
            .clone()
            .ok_or_else(|| ApiError::new("charm not found"))?;
        resolved.origin.channel = origin.channel.clone();
        resolved.origin.revision = origin.revision.or(Some(14));
        if resolved.origin.base.is_none() {
            resolved.origin.base = origin.base.clone();
        }
        Ok(resolved)
    }

    fn add_charm(
        &self,
        _model: &ModelName,
        _url: &CharmUrl,
        origin: &Origin,
        _force: bool,
    ) -> ApiResult<Origin> {
        self.record("AddCharm");
        self.added_charms.borrow_mut().push(origin.clone());
        match self.add_charm_errors.borrow_mut().pop_front() {
            Some(err) => Err(err),
            None => Ok(origin.clone()),
        }
    }

    fn charm_info(&self, _model: &ModelName, _url: &CharmUrl) -> ApiResult<CharmInfo> {
        self.record("CharmInfo");
        Ok(self.charm_info.borrow().clone())
    }

    fn deploy(&self, _model: &ModelName, args: &DeployArgs) -> ApiResult<()> {
        self.record("Deploy");
        self.deploys.borrow_mut().push(args.clone());
        match self.deploy_errors.borrow_mut().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn deploy_from_repository(
        &self,
        _model: &ModelName,
        args: &RepositoryDeployArgs,
    ) -> RepositoryDeployOutcome {
        self.record("DeployFromRepository");
        self.repository_deploys.borrow_mut().push(args.clone());
        self.repository_outcome.borrow().clone()
    }

    fn applications_info(
        &self,
        _model: &ModelName,
        _applications: &[ApplicationName],
    ) -> ApiResult<Vec<ApiResult<ApplicationInfo>>> {
        self.record("ApplicationsInfo");
        match self.app_info_error.borrow().clone() {
            Some(err) => Ok(vec![Err(err)]),
            None => Ok(vec![Ok(self.app_info.borrow().clone())]),
        }
    }

    fn get_config(
        &self,
        _model: &ModelName,
        _application: &ApplicationName,
    ) -> ApiResult<ConfigSnapshot> {
        self.record("Get");
        Ok(self.config.borrow().clone())
    }

    fn status(&self, _model: &ModelName, _filter: &StatusFilter) -> ApiResult<FullStatus> {
        self.record("Status");
        let mut statuses = self.statuses.borrow_mut();
        if statuses.len() > 1 {
            statuses.pop_front().unwrap_or_else(|| Ok(FullStatus::default()))
        } else {
            statuses
                .front()
                .cloned()
                .unwrap_or_else(|| Ok(FullStatus::default()))
        }
    }

    fn charm_url_origin(
        &self,
        _model: &ModelName,
        _application: &ApplicationName,
    ) -> ApiResult<CharmId> {
        self.record("CharmURLOrigin");
        self.charm_id
            .borrow()
            .clone()
            .ok_or_else(|| ApiError::new("application not found"))
    }

    fn set_charm(&self, _model: &ModelName, args: &SetCharmArgs) -> ApiResult<()> {
        self.record("SetCharm");
        self.set_charms.borrow_mut().push(args.clone());
        Ok(())
    }

    fn set_config(
        &self,
        _model: &ModelName,
        _application: &ApplicationName,
        values: &BTreeMap<String, String>,
    ) -> ApiResult<()> {
        self.record("SetConfig");
        self.set_configs.borrow_mut().push(values.clone());
        Ok(())
    }

    fn set_constraints(
        &self,
        _model: &ModelName,
        _application: &ApplicationName,
        constraints: &str,
    ) -> ApiResult<()> {
        self.record("SetConstraints");
        self.constraints.borrow_mut().push(constraints.to_string());
        Ok(())
    }

    fn merge_bindings(
        &self,
        _model: &ModelName,
        _application: &ApplicationName,
        bindings: &BTreeMap<String, String>,
    ) -> ApiResult<()> {
        self.record("MergeBindings");
        self.bindings.borrow_mut().push(bindings.clone());
        Ok(())
    }

    fn expose(
        &self,
        _model: &ModelName,
        _application: &ApplicationName,
        endpoints: &BTreeMap<String, ExposedEndpoint>,
    ) -> ApiResult<()> {
        self.record("Expose");
        self.exposes.borrow_mut().push(endpoints.clone());
        match self.expose_error.borrow().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn unexpose(
        &self,
        _model: &ModelName,
        _application: &ApplicationName,
        endpoints: &[String],
    ) -> ApiResult<()> {
        self.record("Unexpose");
        self.unexposes.borrow_mut().push(endpoints.to_vec());
        Ok(())
    }

    fn scale_application(
        &self,
        _model: &ModelName,
        _application: &ApplicationName,
        scale: u32,
    ) -> ApiResult<()> {
        self.record("ScaleApplication");
        self.scales.borrow_mut().push(scale);
        Ok(())
    }

    fn add_units(&self, _model: &ModelName, args: &AddUnitsArgs) -> ApiResult<Vec<String>> {
        self.record("AddUnits");
        self.added_units.borrow_mut().push(args.clone());
        Ok((0..args.num_units).map(|i| format!("{}/{}", args.application, 100 + i)).collect())
    }

    fn destroy_units(
        &self,
        _model: &ModelName,
        units: &[String],
        destroy_storage: bool,
    ) -> ApiResult<()> {
        self.record("DestroyUnits");
        self.destroyed_units
            .borrow_mut()
            .push((units.to_vec(), destroy_storage));
        Ok(())
    }

    fn destroy_applications(
        &self,
        _model: &ModelName,
        applications: &[ApplicationName],
        destroy_storage: bool,
    ) -> ApiResult<Vec<ApiResult<()>>> {
        self.record("DestroyApplications");
        self.destroyed_apps
            .borrow_mut()
            .push((applications.to_vec(), destroy_storage));
        let scripted = self.destroy_results.borrow().clone();
        if scripted.is_empty() {
            Ok(applications.iter().map(|_| Ok(())).collect())
        } else {
            Ok(scripted)
        }
    }

    fn add_machine(&self, _model: &ModelName, args: &AddMachineArgs) -> ApiResult<String> {
        self.record("AddMachines");
        let mut machines = self.machines.borrow_mut();
        machines.push(args.clone());
        Ok((machines.len() - 1).to_string())
    }
}

impl ResourceClient for FakeControlPlane {
    fn add_pending_resources(
        &self,
        _model: &ModelName,
        args: &AddPendingResourcesArgs,
    ) -> ApiResult<Vec<String>> {
        self.record("AddPendingResources");
        self.pending_resources.borrow_mut().push(args.clone());
        if let Some(err) = self.pending_resource_error.borrow().clone() {
            return Err(err);
        }
        let mut ids: Vec<String> = args.resources.iter().map(|_| self.pending_id()).collect();
        if self.drop_pending_id.get() {
            ids.pop();
        }
        Ok(ids)
    }

    fn upload_pending_resource(
        &self,
        _model: &ModelName,
        _application: &ApplicationName,
        meta: &ResourceMeta,
        reference: &str,
    ) -> ApiResult<String> {
        self.record("UploadPendingResource");
        self.local_uploads
            .borrow_mut()
            .push((meta.name.clone(), reference.to_string()));
        Ok(self.pending_id())
    }

    fn upload(
        &self,
        _model: &ModelName,
        _application: &ApplicationName,
        name: &str,
        reference: &str,
        pending_id: &str,
    ) -> ApiResult<()> {
        self.record("Upload");
        self.uploads.borrow_mut().push((
            name.to_string(),
            reference.to_string(),
            pending_id.to_string(),
        ));
        Ok(())
    }

    fn list_resources(
        &self,
        _model: &ModelName,
        _application: &ApplicationName,
    ) -> ApiResult<Vec<ResourceRecord>> {
        self.record("ListResources");
        Ok(self.resource_records.borrow().clone())
    }
}

impl ModelDirectory for FakeControlPlane {
    fn model_type(&self, _model: &ModelName) -> ApiResult<ModelType> {
        Ok(self.model_type.get())
    }
}

/// Resolved origin kind for bundle tests.
pub fn make_bundle(fake: &FakeControlPlane) {
    if let Some(resolved) = fake.resolved.borrow_mut().as_mut() {
        resolved.origin.kind = EntityKind::Bundle;
    }
}
