//! Platform/base resolution.
//!
//! [`select_base`] is pure: callers gather the candidate sets (one model
//! config fetch, one charm resolution) and hand them in.

use charmctl_core::Base;

use crate::error::ReconcileError;

/// Bases a control-plane major version can run, plus its LTS default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformBases {
    pub supported: Vec<Base>,
    pub lts_default: Base,
}

impl PlatformBases {
    pub fn for_major_version(major: u32) -> Result<Self, ReconcileError> {
        let (tracks, lts): (&[&str], &str) = match major {
            2 => (&["18.04", "20.04", "22.04"], "20.04"),
            3 => (&["20.04", "22.04", "24.04"], "22.04"),
            other => {
                return Err(ReconcileError::NotSupported(format!(
                    "control plane major version {other} is not supported"
                )))
            }
        };
        Ok(Self {
            supported: tracks.iter().copied().map(Base::ubuntu).collect(),
            lts_default: Base::ubuntu(lts),
        })
    }
}

/// Inputs of one base selection.
#[derive(Debug, Clone, Default)]
pub struct BaseRequest<'a> {
    pub user_base: Option<&'a Base>,
    pub suggested: Option<&'a Base>,
    pub model_default: Option<&'a Base>,
    pub charm_bases: &'a [Base],
}

/// Charm bases that some platform base is compatible with, in preference
/// order without duplicates.
pub fn intersect(charm_bases: &[Base], platform_bases: &[Base]) -> Vec<Base> {
    let mut out: Vec<Base> = charm_bases
        .iter()
        .filter(|b| platform_bases.iter().any(|p| p.is_compatible(b)))
        .cloned()
        .collect();
    out.sort_by(Base::preference_cmp);
    out.dedup_by(|a, b| a.is_compatible(b));
    out
}

/// Choose one base for a deploy.
///
/// Precedence inside the charm/platform intersection: user base (which is
/// never substituted), explicit model default, charm suggestion, platform LTS
/// default, then the most preferred remaining base.
pub fn select_base(
    request: &BaseRequest<'_>,
    platform: &PlatformBases,
) -> Result<Base, ReconcileError> {
    let candidates = intersect(request.charm_bases, &platform.supported);
    if candidates.is_empty() {
        return Err(ReconcileError::NotSupported(format!(
            "charm supports none of the control plane's bases ({})",
            join(&platform.supported)
        )));
    }
    let contains = |b: &Base| candidates.iter().any(|c| c.is_compatible(b));

    if let Some(user) = request.user_base {
        if contains(user) {
            return Ok(user.clone());
        }
        return Err(ReconcileError::NotSupported(format!(
            "base {user} is not supported, compatible bases: {}",
            join(&candidates)
        )));
    }

    let fallback = [request.model_default, request.suggested, Some(&platform.lts_default)];
    if let Some(found) = fallback.into_iter().flatten().find(|b| contains(*b)) {
        return Ok(found.clone());
    }
    Ok(candidates[0].clone())
}

fn join(bases: &[Base]) -> String {
    bases.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
