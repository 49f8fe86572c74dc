//! Charm channels: `[track/]risk[/branch]`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Release risk level of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Risk {
    Stable,
    Candidate,
    Beta,
    Edge,
}

impl Risk {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "stable" => Some(Risk::Stable),
            "candidate" => Some(Risk::Candidate),
            "beta" => Some(Risk::Beta),
            "edge" => Some(Risk::Edge),
            _ => None,
        }
    }
}

impl fmt::Display for Risk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Risk::Stable => write!(f, "stable"),
            Risk::Candidate => write!(f, "candidate"),
            Risk::Beta => write!(f, "beta"),
            Risk::Edge => write!(f, "edge"),
        }
    }
}

/// A parsed charm channel. The `latest` track is normalized to `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Channel {
    pub track: Option<String>,
    pub risk: Risk,
    pub branch: Option<String>,
}

impl Channel {
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let invalid = |reason: String| CoreError::InvalidChannel {
            input: input.to_string(),
            reason,
        };
        let risk_of = |name: &str| {
            Risk::from_name(name).ok_or_else(|| {
                invalid(format!(
                    "risk {name:?} must be one of stable, candidate, beta, edge"
                ))
            })
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty channel".to_string()));
        }
        let parts: Vec<&str> = trimmed.split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid("empty channel component".to_string()));
        }

        let (track, risk, branch) = match parts.as_slice() {
            [single] => match Risk::from_name(single) {
                Some(risk) => (None, risk, None),
                None => (Some(*single), Risk::Stable, None),
            },
            [first, second] => match Risk::from_name(first) {
                Some(risk) => (None, risk, Some(*second)),
                None => (Some(*first), risk_of(second)?, None),
            },
            [track, risk, branch] => (Some(*track), risk_of(risk)?, Some(*branch)),
            _ => return Err(invalid("too many components".to_string())),
        };

        Ok(Self {
            track: track.filter(|t| *t != "latest").map(str::to_string),
            risk,
            branch: branch.map(str::to_string),
        })
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(track) = &self.track {
            write!(f, "{track}/")?;
        }
        write!(f, "{}", self.risk)?;
        if let Some(branch) = &self.branch {
            write!(f, "/{branch}")?;
        }
        Ok(())
    }
}

impl FromStr for Channel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Channel {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Channel> for String {
    fn from(channel: Channel) -> Self {
        channel.to_string()
    }
}
