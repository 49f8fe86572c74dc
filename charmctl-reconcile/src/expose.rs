//! Application exposure.

use std::collections::BTreeMap;

use charmctl_core::api::{ControlPlane, ExposedEndpoint};
use charmctl_core::{ApplicationName, ExposeSpec, ModelName};

use crate::error::ReconcileError;

/// CIDRs meaning "open to everyone"; the control plane adds them when no
/// spaces or CIDRs are given, so reads drop them again.
pub const DEFAULT_CIDRS: [&str; 2] = ["0.0.0.0/0", "::/0"];

/// Per-endpoint expose parameters. No endpoints means every endpoint, keyed
/// by the empty string.
pub fn params(spec: &ExposeSpec) -> BTreeMap<String, ExposedEndpoint> {
    let endpoint = ExposedEndpoint {
        spaces: spec.spaces.clone(),
        cidrs: spec.cidrs.clone(),
    };
    if spec.endpoints.is_empty() {
        return BTreeMap::from([(String::new(), endpoint)]);
    }
    spec.endpoints
        .iter()
        .map(|name| (name.clone(), endpoint.clone()))
        .collect()
}

pub fn apply<C>(
    control: &C,
    model: &ModelName,
    application: &ApplicationName,
    spec: &ExposeSpec,
) -> Result<(), ReconcileError>
where
    C: ControlPlane + ?Sized,
{
    tracing::debug!(app = %application, endpoints = ?spec.endpoints, "exposing application");
    control
        .expose(model, application, &params(spec))
        .map_err(|e| ReconcileError::remote("expose", e))
}

/// Fold observed exposure back into one spec, dropping default CIDRs.
/// Returns `None` when the application is not exposed.
pub fn observed(
    exposed: bool,
    endpoints: &BTreeMap<String, ExposedEndpoint>,
) -> Option<ExposeSpec> {
    if !exposed {
        return None;
    }
    let mut spec = ExposeSpec::default();
    for (name, endpoint) in endpoints {
        if !name.is_empty() {
            spec.endpoints.push(name.clone());
        }
        push_unique(&mut spec.spaces, endpoint.spaces.iter());
        push_unique(
            &mut spec.cidrs,
            endpoint
                .cidrs
                .iter()
                .filter(|c| !DEFAULT_CIDRS.contains(&c.as_str())),
        );
    }
    Some(spec)
}

fn push_unique<'a>(into: &mut Vec<String>, items: impl Iterator<Item = &'a String>) {
    for item in items {
        if !into.contains(item) {
            into.push(item.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_endpoint_list_uses_wildcard_key() {
        let spec = ExposeSpec::from_csv("", "public", "");
        let p = params(&spec);
        assert_eq!(p.len(), 1);
        assert_eq!(p[""].spaces, vec!["public"]);
    }

    #[test]
    fn each_endpoint_gets_same_params() {
        let spec = ExposeSpec::from_csv("db,admin", "", "10.0.0.0/8");
        let p = params(&spec);
        assert_eq!(p.keys().collect::<Vec<_>>(), vec!["admin", "db"]);
        assert_eq!(p["db"].cidrs, vec!["10.0.0.0/8"]);
    }

    #[test]
    fn observed_filters_default_cidrs() {
        let endpoints = BTreeMap::from([(
            String::new(),
            ExposedEndpoint {
                spaces: vec![],
                cidrs: vec!["0.0.0.0/0".into(), "::/0".into(), "10.1.0.0/16".into()],
            },
        )]);
        let spec = observed(true, &endpoints).unwrap();
        assert!(spec.endpoints.is_empty());
        assert_eq!(spec.cidrs, vec!["10.1.0.0/16"]);
        assert!(observed(false, &endpoints).is_none());
    }
}
