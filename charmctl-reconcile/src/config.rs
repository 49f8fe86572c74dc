//! Conversion of typed config into the string forms the control plane takes.

use std::collections::BTreeMap;

use charmctl_core::types::TRUST_KEY;
use charmctl_core::ConfigValue;

use crate::error::ReconcileError;

/// Canonical string map. A `trust` value, when given, is folded in under the
/// reserved `trust` key and overrides any config entry of that name.
pub fn normalize(
    config: &BTreeMap<String, ConfigValue>,
    trust: Option<bool>,
) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = config
        .iter()
        .map(|(k, v)| (k.clone(), v.to_canonical_string()))
        .collect();
    if let Some(trust) = trust {
        out.insert(TRUST_KEY.to_string(), trust.to_string());
    }
    out
}

/// `{application: {key: value}}` as a YAML document.
pub fn yaml_document(
    application: &str,
    config: &BTreeMap<String, ConfigValue>,
) -> Result<String, ReconcileError> {
    let doc = BTreeMap::from([(application.to_string(), normalize(config, None))]);
    Ok(serde_yaml::to_string(&doc)?)
}
