//! Domain types for application reconciliation.
//!
//! Desired state comes in as [`DesiredApplication`] (create) or
//! [`ApplicationDelta`] (update); observed state goes out as
//! [`ObservedApplication`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::base::Base;
use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Name of the model an application lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct ModelName(pub String);

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ModelName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ModelName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Name of a deployed application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct ApplicationName(pub String);

impl fmt::Display for ApplicationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ApplicationName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ApplicationName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Machine-style (IAAS) or container-style (CAAS) model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    #[default]
    Iaas,
    Caas,
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelType::Iaas => write!(f, "iaas"),
            ModelType::Caas => write!(f, "caas"),
        }
    }
}

/// Reserved configuration key carrying the trust flag.
pub const TRUST_KEY: &str = "trust";

/// A typed configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ConfigValue {
    /// Canonical wire form: `true`/`false`, decimal integers, floats in
    /// fixed-point with no decimals, strings unchanged.
    pub fn to_canonical_string(&self) -> String {
        match self {
            ConfigValue::Bool(b) => b.to_string(),
            ConfigValue::Int(i) => i.to_string(),
            ConfigValue::Float(f) => format!("{f:.0}"),
            ConfigValue::String(s) => s.clone(),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        ConfigValue::Int(v)
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Float(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::String(v.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::String(v)
    }
}

/// A config entry as observed, with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub value: ConfigValue,
    /// `true` when the value is the charm default rather than set explicitly.
    pub is_default: bool,
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// Declared type of a charm resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    #[serde(rename = "file")]
    File,
    #[serde(rename = "oci-image")]
    OciImage,
}

impl ResourceType {
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "file" => Ok(ResourceType::File),
            "oci-image" => Ok(ResourceType::OciImage),
            other => Err(CoreError::InvalidResourceType(other.to_string())),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceType::File => write!(f, "file"),
            ResourceType::OciImage => write!(f, "oci-image"),
        }
    }
}

/// Resource metadata declared by a charm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ResourceType,
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Where a pending resource's content comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "origin")]
pub enum ResourceSource {
    /// Fetched by the control plane from the charm store; `-1` means latest.
    Store { revision: i64 },
    /// Uploaded by this client from a local reference (registry path, file).
    Upload { reference: String },
}

/// A resource that must be registered or uploaded around deploy time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingResource {
    pub meta: ResourceMeta,
    pub source: ResourceSource,
}

// ---------------------------------------------------------------------------
// Exposure and storage
// ---------------------------------------------------------------------------

/// Which endpoints are exposed, and to which spaces and CIDRs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ExposeSpec {
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub spaces: Vec<String>,
    #[serde(default)]
    pub cidrs: Vec<String>,
}

impl ExposeSpec {
    /// Build from comma separated lists, trimming blanks.
    pub fn from_csv(endpoints: &str, spaces: &str, cidrs: &str) -> Self {
        Self {
            endpoints: split_csv(endpoints),
            spaces: split_csv(spaces),
            cidrs: split_csv(cidrs),
        }
    }
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Storage as observed for one storage name of the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StorageSummary {
    pub pool: String,
    pub size_mb: u64,
    pub count: u32,
}

// ---------------------------------------------------------------------------
// Desired state
// ---------------------------------------------------------------------------

/// Which charm to deploy and how it is pinned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    /// Charm reference, optionally with a literal revision (`ch:name-7`).
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
}

/// Desired application as supplied to `create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredApplication {
    pub model: ModelName,
    pub name: ApplicationName,
    pub charm: PackageRef,
    pub units: u32,
    #[serde(default)]
    pub trust: bool,
    #[serde(default)]
    pub config: BTreeMap<String, ConfigValue>,
    #[serde(default)]
    pub placement: Vec<String>,
    /// Resource name to revision or local reference. `None` deploys the
    /// channel's default resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub endpoint_bindings: BTreeMap<String, String>,
    /// Storage name to directive (`pool,size,count`).
    #[serde(default)]
    pub storage: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expose: Option<ExposeSpec>,
}

/// Result of a successful create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedApplication {
    pub name: ApplicationName,
}

/// Partial desired state for `update`; `None` means unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ApplicationDelta {
    pub model: ModelName,
    pub name: ApplicationName,
    pub revision: Option<i64>,
    pub channel: Option<String>,
    pub units: Option<u32>,
    pub trust: Option<bool>,
    pub config: Option<BTreeMap<String, ConfigValue>>,
    pub expose: Option<ExposeSpec>,
    /// Endpoints to unexpose; an empty list unexposes every endpoint.
    pub unexpose: Option<Vec<String>>,
    pub constraints: Option<String>,
    pub endpoint_bindings: Option<BTreeMap<String, String>>,
    pub resources: Option<BTreeMap<String, String>>,
    /// Placement directives for units added by a scale-up.
    #[serde(default)]
    pub placement: Vec<String>,
}

impl ApplicationDelta {
    pub fn new(model: impl Into<ModelName>, name: impl Into<ApplicationName>) -> Self {
        Self {
            model: model.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Observed state
// ---------------------------------------------------------------------------

/// Snapshot of remote truth for one application. Rebuilt on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedApplication {
    pub name: ApplicationName,
    pub model_type: ModelType,
    pub charm: String,
    pub revision: Option<i64>,
    pub channel: Option<String>,
    pub base: Option<Base>,
    /// Scale for CAAS models, unit count otherwise.
    pub units: u32,
    pub principal: bool,
    pub trust: bool,
    pub config: BTreeMap<String, ConfigEntry>,
    /// Sorted, de-duplicated machine ids hosting the units.
    pub placement: Vec<String>,
    pub storage: BTreeMap<String, StorageSummary>,
    pub constraints: String,
    /// Only bindings whose space differs from the model default space.
    pub endpoint_bindings: BTreeMap<String, String>,
    pub expose: Option<ExposeSpec>,
    pub resources: BTreeMap<String, i64>,
    pub observed_at: DateTime<Utc>,
}
