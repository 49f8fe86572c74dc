//! Targeted reconciliation of mutable application fields.
//!
//! Each field of an [`ApplicationDelta`] that is `Some` maps to one remote
//! call, issued in a fixed order: charm, config, unexpose, expose,
//! constraints, bindings, units. Nothing is retried and nothing already
//! applied is rolled back when a later call fails.

use std::collections::BTreeMap;

use charmctl_core::api::{
    AddUnitsArgs, ControlPlane, ModelDirectory, ResourceClient, SetCharmArgs, StatusFilter,
};
use charmctl_core::{
    ApplicationDelta, ApplicationName, Channel, CharmId, ErrorKind, ModelName, ModelType,
};

use crate::config;
use crate::error::ReconcileError;
use crate::expose;
use crate::resources;

pub struct Updater<'a, C: ?Sized, R: ?Sized, M: ?Sized> {
    pub control: &'a C,
    pub resources: &'a R,
    pub directory: &'a M,
}

impl<'a, C, R, M> Updater<'a, C, R, M>
where
    C: ControlPlane + ?Sized,
    R: ResourceClient + ?Sized,
    M: ModelDirectory + ?Sized,
{
    pub fn update(&self, delta: &ApplicationDelta) -> Result<(), ReconcileError> {
        if delta.revision.is_some() && delta.channel.is_some() {
            return Err(ReconcileError::NotValid(
                "revision and channel cannot be changed in the same update".to_string(),
            ));
        }
        let model = &delta.model;
        let name = &delta.name;

        if delta.revision.is_some() || delta.channel.is_some() || delta.resources.is_some() {
            self.update_charm(delta)?;
        }

        if delta.config.is_some() || delta.trust.is_some() {
            let values = config::normalize(
                delta.config.as_ref().unwrap_or(&BTreeMap::new()),
                delta.trust,
            );
            if !values.is_empty() {
                tracing::debug!(app = %name, keys = values.len(), "setting config");
                self.control
                    .set_config(model, name, &values)
                    .map_err(|e| ReconcileError::remote("set config", e))?;
            }
        }

        if let Some(endpoints) = &delta.unexpose {
            tracing::debug!(app = %name, ?endpoints, "unexposing application");
            self.control
                .unexpose(model, name, endpoints)
                .map_err(|e| ReconcileError::remote("unexpose", e))?;
        }

        if let Some(spec) = &delta.expose {
            expose::apply(self.control, model, name, spec)?;
        }

        if let Some(constraints) = &delta.constraints {
            self.control
                .set_constraints(model, name, constraints)
                .map_err(|e| ReconcileError::remote("set constraints", e))?;
        }

        if let Some(requested) = &delta.endpoint_bindings {
            self.update_bindings(model, name, requested)?;
        }

        if let Some(units) = delta.units {
            self.update_units(model, name, units, &delta.placement)?;
        }

        tracing::info!(app = %name, model = %model, "application updated");
        Ok(())
    }

    /// Move to a new revision or channel, or re-register resources against
    /// the current charm.
    fn update_charm(&self, delta: &ApplicationDelta) -> Result<(), ReconcileError> {
        let model = &delta.model;
        let name = &delta.name;
        let charm_changed = delta.revision.is_some() || delta.channel.is_some();

        let requested = match &delta.resources {
            Some(requested) => {
                let in_use = self
                    .resources
                    .list_resources(model, name)
                    .map_err(|e| ReconcileError::remote("list resources", e))?
                    .into_iter()
                    .map(|r| (r.name, r.revision))
                    .collect();
                Some(resources::changed(requested, &in_use))
            }
            None => None,
        };
        if !charm_changed && requested.as_ref().is_some_and(BTreeMap::is_empty) {
            tracing::debug!(app = %name, "resources already at requested revisions");
            return Ok(());
        }

        let current = self
            .control
            .charm_url_origin(model, name)
            .map_err(|e| ReconcileError::remote("get charm origin", e))?;
        let charm = if charm_changed {
            self.resolve_upgrade(model, &current, delta)?
        } else {
            current
        };

        let info = self
            .control
            .charm_info(model, &charm.url)
            .map_err(|e| ReconcileError::remote("get charm info", e))?;
        let planned = resources::plan(&info.resources, requested.as_ref());
        let registered = resources::register(self.resources, model, name, &charm, planned)?;

        let args = SetCharmArgs {
            application: name.clone(),
            charm,
            resource_ids: resources::ids(&registered),
        };
        tracing::debug!(app = %name, charm = %args.charm.url, "setting charm");
        self.control
            .set_charm(model, &args)
            .map_err(|e| ReconcileError::remote("set charm", e))
    }

    /// Resolve the requested revision or channel and check that the result
    /// can replace the running charm in place.
    fn resolve_upgrade(
        &self,
        model: &ModelName,
        current: &CharmId,
        delta: &ApplicationDelta,
    ) -> Result<CharmId, ReconcileError> {
        let mut origin = current.origin.clone();
        if let Some(revision) = delta.revision {
            origin.revision = Some(revision);
        }
        if let Some(channel) = &delta.channel {
            origin.channel = Some(Channel::parse(channel)?);
            origin.revision = None;
        }
        origin.clear_content_identity();

        let url = current.url.with_revision(None);
        let resolved = self
            .control
            .resolve_charm(model, &url, &origin)
            .map_err(|e| ReconcileError::remote("resolve charm", e))?;

        if resolved.origin.architecture != current.origin.architecture {
            return Err(ReconcileError::NotSupported(format!(
                "cannot upgrade {} from architecture {} to {}",
                delta.name, current.origin.architecture, resolved.origin.architecture
            )));
        }
        if let Some(base) = &current.origin.base {
            if !resolved.supported_bases.iter().any(|b| b.is_compatible(base)) {
                return Err(ReconcileError::NotSupported(format!(
                    "the requested charm does not support the running base {base}"
                )));
            }
        }

        let mut upgraded = resolved.origin;
        upgraded.base = current.origin.base.clone();
        let origin = match self.control.add_charm(model, &resolved.url, &upgraded, false) {
            Ok(added) => added,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => upgraded,
            Err(err) => return Err(ReconcileError::remote("add charm", err)),
        };
        Ok(CharmId {
            url: resolved.url,
            origin,
        })
    }

    fn update_bindings(
        &self,
        model: &ModelName,
        name: &ApplicationName,
        requested: &BTreeMap<String, String>,
    ) -> Result<(), ReconcileError> {
        let info = self
            .control
            .applications_info(model, std::slice::from_ref(name))
            .map_err(|e| ReconcileError::remote("get application info", e))?
            .into_iter()
            .next()
            .ok_or_else(|| ReconcileError::ApplicationNotFound(name.clone()))?
            .map_err(|e| ReconcileError::remote("get application info", e))?;
        let model_config = self
            .control
            .model_config(model)
            .map_err(|e| ReconcileError::remote("get model config", e))?;

        let merged = merge_bindings(
            &info.endpoint_bindings,
            requested,
            &model_config.default_space,
        )?;
        self.control
            .merge_bindings(model, name, &merged)
            .map_err(|e| ReconcileError::remote("merge bindings", e))
    }

    fn update_units(
        &self,
        model: &ModelName,
        name: &ApplicationName,
        units: u32,
        placement: &[String],
    ) -> Result<(), ReconcileError> {
        let model_type = self
            .directory
            .model_type(model)
            .map_err(|e| ReconcileError::remote("get model type", e))?;
        if model_type == ModelType::Caas {
            return self
                .control
                .scale_application(model, name, units)
                .map_err(|e| ReconcileError::remote("scale application", e));
        }

        let filter = StatusFilter {
            patterns: vec![name.0.clone()],
            include_storage: false,
        };
        let status = self
            .control
            .status(model, &filter)
            .map_err(|e| ReconcileError::remote("get status", e))?;
        let app = status
            .applications
            .get(&name.0)
            .ok_or_else(|| ReconcileError::ApplicationNotFound(name.clone()))?;
        let current = app.units.len() as i64;
        let delta = i64::from(units) - current;

        if delta > 0 {
            let args = AddUnitsArgs {
                application: name.clone(),
                num_units: delta as u32,
                placement: placement.to_vec(),
            };
            let added = self
                .control
                .add_units(model, &args)
                .map_err(|e| ReconcileError::remote("add units", e))?;
            tracing::debug!(app = %name, ?added, "units added");
        } else if delta < 0 {
            let doomed: Vec<String> = app
                .units
                .keys()
                .take(delta.unsigned_abs() as usize)
                .cloned()
                .collect();
            tracing::debug!(app = %name, units = ?doomed, "destroying units");
            self.control
                .destroy_units(model, &doomed, true)
                .map_err(|e| ReconcileError::remote("destroy units", e))?;
        }
        Ok(())
    }
}

/// Compute the full binding set to send for a binding update.
///
/// `current` holds the resolved bindings, with the application default
/// under the empty key. A requested empty space means "the default". When
/// the request changes the default, bindings that followed the old default
/// follow the new one. Unknown endpoints are rejected.
pub fn merge_bindings(
    current: &BTreeMap<String, String>,
    requested: &BTreeMap<String, String>,
    model_default_space: &str,
) -> Result<BTreeMap<String, String>, ReconcileError> {
    if let Some(unknown) = requested.keys().find(|k| !current.contains_key(k.as_str())) {
        return Err(ReconcileError::NotValid(format!(
            "endpoint {unknown:?} is not bound by this application"
        )));
    }

    let old_default = current
        .get("")
        .map(String::as_str)
        .unwrap_or(model_default_space);
    let new_default = requested
        .get("")
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(old_default);

    let mut merged = BTreeMap::new();
    for (endpoint, space) in current {
        let space = match requested.get(endpoint) {
            Some(s) if s.is_empty() => new_default,
            Some(s) => s.as_str(),
            None if space == old_default => new_default,
            None => space.as_str(),
        };
        merged.insert(endpoint.clone(), space.to_string());
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_space_resets_to_default() {
        let merged = merge_bindings(
            &map(&[("", "alpha"), ("db", "beta")]),
            &map(&[("db", "")]),
            "alpha",
        )
        .unwrap();
        assert_eq!(merged, map(&[("", "alpha"), ("db", "alpha")]));
    }

    #[test]
    fn new_default_carries_followers() {
        let merged = merge_bindings(
            &map(&[("", "alpha"), ("db", "alpha"), ("admin", "beta")]),
            &map(&[("", "gamma")]),
            "alpha",
        )
        .unwrap();
        assert_eq!(
            merged,
            map(&[("", "gamma"), ("db", "gamma"), ("admin", "beta")])
        );
    }

    #[test]
    fn missing_default_key_keeps_application_default() {
        let merged = merge_bindings(
            &map(&[("", "beta"), ("db", "beta"), ("admin", "alpha")]),
            &map(&[("db", "")]),
            "alpha",
        )
        .unwrap();
        assert_eq!(
            merged,
            map(&[("", "beta"), ("db", "beta"), ("admin", "alpha")])
        );
    }

    #[test]
    fn unknown_endpoint_rejected() {
        let err = merge_bindings(&map(&[("", "alpha")]), &map(&[("web", "beta")]), "alpha")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotValid);
    }
}
