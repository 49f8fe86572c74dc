//! Pending-resource planning, registration, and upload.
//!
//! A charm declares resources; the caller may pin each one to a store
//! revision or point it at local content. [`plan`] decides which is which,
//! [`register`] makes the control plane aware of them before a legacy deploy,
//! and [`upload_pending`] fulfils the uploads a repository deploy asks for.

use std::collections::BTreeMap;

use charmctl_core::api::{AddPendingResourcesArgs, PendingUpload, ResourceClient};
use charmctl_core::{
    ApplicationName, CharmId, ErrorKind, ModelName, PendingResource, ResourceMeta,
    ResourceSource, ResourceType,
};

use crate::error::ReconcileError;

/// Store revision meaning "whatever the channel currently ships".
pub const LATEST_REVISION: i64 = -1;

/// Registration outcome for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedResource {
    /// Pending id allocated by the control plane.
    pub id: String,
    /// Content was uploaded from a local reference rather than the store.
    pub pending_upload: bool,
}

/// Decide the source of every declared resource.
///
/// With no `requested` map every resource comes from the store at its latest
/// revision. With a map, resources it does not name are left alone, integer
/// values pin a store revision, and anything else is a local reference.
pub fn plan(
    declared: &BTreeMap<String, ResourceMeta>,
    requested: Option<&BTreeMap<String, String>>,
) -> Vec<PendingResource> {
    declared
        .values()
        .filter_map(|meta| {
            let source = match requested {
                None => ResourceSource::Store {
                    revision: LATEST_REVISION,
                },
                Some(map) => {
                    let value = map.get(&meta.name)?;
                    match value.trim().parse::<i64>() {
                        Ok(revision) => ResourceSource::Store { revision },
                        Err(_) => ResourceSource::Upload {
                            reference: value.clone(),
                        },
                    }
                }
            };
            Some(PendingResource {
                meta: meta.clone(),
                source,
            })
        })
        .collect()
}

/// Entries of `requested` that differ from the revisions currently in use.
///
/// Local references always count as changed; the control plane cannot tell
/// whether the content behind them moved.
pub fn changed(
    requested: &BTreeMap<String, String>,
    current: &BTreeMap<String, i64>,
) -> BTreeMap<String, String> {
    requested
        .iter()
        .filter(|(name, value)| match value.trim().parse::<i64>() {
            Ok(revision) => current.get(name.as_str()) != Some(&revision),
            Err(_) => true,
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Register a plan with the control plane.
///
/// Store entries go out in one batched call, where AlreadyExists counts as
/// success. Local entries are uploaded one by one and must be `oci-image`.
pub fn register<R>(
    client: &R,
    model: &ModelName,
    application: &ApplicationName,
    charm: &CharmId,
    planned: Vec<PendingResource>,
) -> Result<BTreeMap<String, PlannedResource>, ReconcileError>
where
    R: ResourceClient + ?Sized,
{
    let (store, local): (Vec<_>, Vec<_>) = planned
        .into_iter()
        .partition(|r| matches!(r.source, ResourceSource::Store { .. }));

    let mut out = BTreeMap::new();

    if !store.is_empty() {
        let names: Vec<String> = store.iter().map(|r| r.meta.name.clone()).collect();
        let args = AddPendingResourcesArgs {
            application: application.clone(),
            charm: charm.clone(),
            resources: store,
        };
        tracing::debug!(app = %application, count = names.len(), "adding pending store resources");
        match client.add_pending_resources(model, &args) {
            Ok(ids) => {
                if ids.len() != names.len() {
                    return Err(ReconcileError::Other(format!(
                        "control plane returned {} pending resource ids for {} resources",
                        ids.len(),
                        names.len()
                    )));
                }
                for (name, id) in names.into_iter().zip(ids) {
                    out.insert(
                        name,
                        PlannedResource {
                            id,
                            pending_upload: false,
                        },
                    );
                }
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!(app = %application, "store resources already registered");
            }
            Err(err) => return Err(ReconcileError::remote("add pending resources", err)),
        }
    }

    for resource in local {
        let ResourceSource::Upload { reference } = &resource.source else {
            continue;
        };
        let id = upload_local(client, model, application, &resource.meta, reference)?;
        out.insert(
            resource.meta.name.clone(),
            PlannedResource {
                id,
                pending_upload: true,
            },
        );
    }

    Ok(out)
}

/// Register and upload one local resource. Only `oci-image` is supported.
pub fn upload_local<R>(
    client: &R,
    model: &ModelName,
    application: &ApplicationName,
    meta: &ResourceMeta,
    reference: &str,
) -> Result<String, ReconcileError>
where
    R: ResourceClient + ?Sized,
{
    ensure_uploadable(&meta.name, meta.kind)?;
    tracing::debug!(app = %application, resource = %meta.name, "uploading local resource");
    client
        .upload_pending_resource(model, application, meta, reference)
        .map_err(|e| ReconcileError::remote("upload pending resource", e))
}

/// Upload content for pending ids a repository deploy handed back.
pub fn upload_pending<R>(
    client: &R,
    model: &ModelName,
    application: &ApplicationName,
    uploads: &[PendingUpload],
) -> Result<(), ReconcileError>
where
    R: ResourceClient + ?Sized,
{
    for upload in uploads {
        let kind = ResourceType::parse(&upload.kind)?;
        ensure_uploadable(&upload.name, kind)?;
        tracing::debug!(app = %application, resource = %upload.name, "uploading pending resource");
        client
            .upload(model, application, &upload.name, &upload.reference, &upload.pending_id)
            .map_err(|e| ReconcileError::remote("upload resource", e))?;
    }
    Ok(())
}

/// Resource-id map as sent on deploy and set-charm calls.
pub fn ids(planned: &BTreeMap<String, PlannedResource>) -> BTreeMap<String, String> {
    planned
        .iter()
        .map(|(name, p)| (name.clone(), p.id.clone()))
        .collect()
}

/// Only `oci-image` resources can be uploaded from a local reference.
pub fn ensure_uploadable(name: &str, kind: ResourceType) -> Result<(), ReconcileError> {
    match kind {
        ResourceType::OciImage => Ok(()),
        other => Err(ReconcileError::NotSupported(format!(
            "resource {name:?} has type {other}; only oci-image resources can be uploaded"
        ))),
    }
}
