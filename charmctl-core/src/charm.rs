//! Charm references, target platforms, and the pinned [`Origin`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::base::Base;
use crate::channel::Channel;
use crate::error::CoreError;

/// Architecture used when neither the application nor the model constrains it.
pub const DEFAULT_ARCHITECTURE: &str = "amd64";

/// A charm reference: `[ch:]name[-revision]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharmUrl {
    pub name: String,
    /// Revision encoded literally in the reference (`ch:postgresql-14`).
    pub revision: Option<i64>,
}

impl CharmUrl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            revision: None,
        }
    }

    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let invalid = |reason: &str| CoreError::InvalidCharmUrl {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        let body = match trimmed.split_once(':') {
            Some(("ch", rest)) => rest,
            Some((schema, _)) => {
                return Err(invalid(&format!(
                    "schema {schema:?} is not supported, only charmhub (ch:)"
                )))
            }
            None => trimmed,
        };
        if body.is_empty() {
            return Err(invalid("missing charm name"));
        }
        if body.contains('/') {
            return Err(invalid("charm names cannot contain '/'"));
        }

        if let Some((name, suffix)) = body.rsplit_once('-') {
            if !name.is_empty() && !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit())
            {
                let revision = suffix
                    .parse::<i64>()
                    .map_err(|_| invalid("revision out of range"))?;
                return Ok(Self {
                    name: name.to_string(),
                    revision: Some(revision),
                });
            }
        }
        Ok(Self::new(body))
    }

    pub fn with_revision(&self, revision: Option<i64>) -> Self {
        Self {
            name: self.name.clone(),
            revision,
        }
    }
}

impl fmt::Display for CharmUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch:{}", self.name)?;
        if let Some(rev) = self.revision {
            write!(f, "-{rev}")?;
        }
        Ok(())
    }
}

/// Where a charm build comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CharmSource {
    #[default]
    CharmHub,
    Local,
}

/// Kind of entity a reference resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    #[default]
    Charm,
    Bundle,
}

/// Target architecture and OS used to request a charm build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub architecture: String,
    pub base: Option<Base>,
}

impl Platform {
    /// Pick the architecture from the application constraints, then the model
    /// constraints, then `default_arch`.
    pub fn from_constraints(
        constraints: Option<&str>,
        model_constraints: Option<&str>,
        default_arch: &str,
        base: Option<Base>,
    ) -> Self {
        let architecture = constraints
            .and_then(arch_constraint)
            .or_else(|| model_constraints.and_then(arch_constraint))
            .unwrap_or(default_arch)
            .to_string();
        Self { architecture, base }
    }
}

/// Extract the value of `arch=` from a space separated constraints string.
pub fn arch_constraint(constraints: &str) -> Option<&str> {
    constraints
        .split_whitespace()
        .find_map(|c| c.strip_prefix("arch="))
        .filter(|a| !a.is_empty())
}

/// Identifies exactly which charm build is pinned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Origin {
    pub source: CharmSource,
    pub kind: EntityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<i64>,
    pub architecture: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<Base>,
    /// Content identity cached by the control plane for the resolved build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl Origin {
    /// Origin for a charmhub charm that has not been resolved yet.
    pub fn for_request(channel: Option<Channel>, revision: Option<i64>, platform: &Platform) -> Self {
        Self {
            source: CharmSource::CharmHub,
            kind: EntityKind::Charm,
            channel,
            revision,
            architecture: platform.architecture.clone(),
            base: platform.base.clone(),
            id: None,
            hash: None,
        }
    }

    /// Drop the cached content identity so the control plane re-resolves.
    pub fn clear_content_identity(&mut self) {
        self.id = None;
        self.hash = None;
    }
}

/// A charm URL paired with its pinned origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharmId {
    pub url: CharmUrl,
    pub origin: Origin,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_and_prefixed() {
        assert_eq!(CharmUrl::parse("postgresql").unwrap(), CharmUrl::new("postgresql"));
        assert_eq!(CharmUrl::parse("ch:postgresql").unwrap(), CharmUrl::new("postgresql"));
    }

    #[test]
    fn parse_literal_revision() {
        let url = CharmUrl::parse("ch:postgresql-14").unwrap();
        assert_eq!(url.name, "postgresql");
        assert_eq!(url.revision, Some(14));
        assert_eq!(url.to_string(), "ch:postgresql-14");
    }

    #[test]
    fn dashed_names_keep_non_numeric_suffix() {
        let url = CharmUrl::parse("postgresql-k8s").unwrap();
        assert_eq!(url.name, "postgresql-k8s");
        assert_eq!(url.revision, None);
    }

    #[test]
    fn rejects_other_schemas() {
        assert!(CharmUrl::parse("local:mycharm").is_err());
        assert!(CharmUrl::parse("ch:").is_err());
        assert!(CharmUrl::parse("cs:~user/foo").is_err());
    }

    #[test]
    fn platform_arch_precedence() {
        let p = Platform::from_constraints(Some("mem=4G arch=arm64"), Some("arch=s390x"), "amd64", None);
        assert_eq!(p.architecture, "arm64");
        let p = Platform::from_constraints(Some("mem=4G"), Some("arch=s390x"), "amd64", None);
        assert_eq!(p.architecture, "s390x");
        let p = Platform::from_constraints(None, None, "amd64", None);
        assert_eq!(p.architecture, "amd64");
    }

    #[test]
    fn clearing_identity_keeps_revision() {
        let mut origin = Origin {
            revision: Some(7),
            id: Some("abc".into()),
            hash: Some("deadbeef".into()),
            ..Origin::default()
        };
        origin.clear_content_identity();
        assert_eq!(origin.revision, Some(7));
        assert!(origin.id.is_none() && origin.hash.is_none());
    }
}
