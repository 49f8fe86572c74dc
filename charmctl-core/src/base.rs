//! OS bases (`ubuntu@22.04`, `ubuntu@22.04/stable`) and their compatibility rules.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Legacy series names the control plane still reports for older models.
const SERIES: &[(&str, &str, &str)] = &[
    ("bionic", "ubuntu", "18.04"),
    ("focal", "ubuntu", "20.04"),
    ("jammy", "ubuntu", "22.04"),
    ("noble", "ubuntu", "24.04"),
];

/// An OS + channel identifier used to select compatible charm builds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Base {
    pub os: String,
    /// Channel track, e.g. `22.04`.
    pub track: String,
    /// Channel risk, e.g. `stable`. Ignored by [`Base::is_compatible`].
    pub risk: Option<String>,
}

impl Base {
    pub fn new(os: impl Into<String>, track: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            track: track.into(),
            risk: None,
        }
    }

    pub fn ubuntu(track: impl Into<String>) -> Self {
        Self::new("ubuntu", track)
    }

    /// Parse `os@track[/risk]`, or a legacy series name such as `jammy`.
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let invalid = |reason: &str| CoreError::InvalidBase {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty base"));
        }
        let Some((os, channel)) = trimmed.split_once('@') else {
            return Self::from_series(trimmed)
                .ok_or_else(|| invalid("expected <os>@<channel>, e.g. ubuntu@22.04"));
        };
        if os.is_empty() {
            return Err(invalid("missing OS name"));
        }
        let (track, risk) = match channel.split_once('/') {
            Some((track, risk)) => (track, Some(risk)),
            None => (channel, None),
        };
        if track.is_empty() {
            return Err(invalid("missing channel track"));
        }
        if risk.is_some_and(str::is_empty) {
            return Err(invalid("empty channel risk"));
        }
        Ok(Self {
            os: os.to_ascii_lowercase(),
            track: track.to_string(),
            risk: risk.map(str::to_string),
        })
    }

    /// Map a series name (`focal`, `jammy`, ...) to its base.
    pub fn from_series(series: &str) -> Option<Self> {
        SERIES
            .iter()
            .find(|(name, _, _)| *name == series)
            .map(|(_, os, track)| Self::new(*os, *track))
    }

    /// Same OS and channel track; risk is ignored.
    pub fn is_compatible(&self, other: &Base) -> bool {
        self.os == other.os && self.track == other.track
    }

    /// Numeric components of the track, used for version ordering.
    fn version_key(&self) -> Vec<u64> {
        self.track
            .split('.')
            .map(|part| part.parse::<u64>().unwrap_or(0))
            .collect()
    }

    /// Deterministic preference order: OS ascending, then newest track first.
    pub fn preference_cmp(&self, other: &Base) -> Ordering {
        self.os
            .cmp(&other.os)
            .then_with(|| other.version_key().cmp(&self.version_key()))
            .then_with(|| self.track.cmp(&other.track))
            .then_with(|| self.risk.cmp(&other.risk))
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.os, self.track)?;
        if let Some(risk) = &self.risk {
            write!(f, "/{risk}")?;
        }
        Ok(())
    }
}

impl FromStr for Base {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Base {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Base> for String {
    fn from(base: Base) -> Self {
        base.to_string()
    }
}
