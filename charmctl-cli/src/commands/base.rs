//! `charmctl base`: run base selection without a control plane.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use charmctl_core::Base;
use charmctl_reconcile::resolver::intersect;
use charmctl_reconcile::{select_base, BaseRequest, PlatformBases};

/// Arguments for `charmctl base`.
#[derive(Args, Debug)]
pub struct BaseArgs {
    /// Bases the charm declares, comma separated (`ubuntu@22.04,focal`).
    #[arg(long = "charm-bases", value_delimiter = ',', required = true)]
    pub charm_bases: Vec<Base>,

    /// Control-plane major version.
    #[arg(long, default_value_t = 3)]
    pub major: u32,

    /// Base requested by the user. Never substituted.
    #[arg(long)]
    pub base: Option<Base>,

    /// Explicit `default-base` of the model.
    #[arg(long = "model-default")]
    pub model_default: Option<Base>,

    /// Base suggested by the charm resolution.
    #[arg(long)]
    pub suggested: Option<Base>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct Selection {
    base: Base,
    candidates: Vec<Base>,
    platform: Vec<Base>,
}

impl BaseArgs {
    pub fn run(self) -> Result<()> {
        let platform = PlatformBases::for_major_version(self.major)?;
        let request = BaseRequest {
            user_base: self.base.as_ref(),
            suggested: self.suggested.as_ref(),
            model_default: self.model_default.as_ref(),
            charm_bases: &self.charm_bases,
        };
        let chosen = select_base(&request, &platform)
            .with_context(|| format!("no base for control plane {}.x", self.major))?;
        tracing::debug!(base = %chosen, major = self.major, "base selected");

        let selection = Selection {
            base: chosen,
            candidates: intersect(&self.charm_bases, &platform.supported),
            platform: platform.supported,
        };
        if self.json {
            println!("{}", serde_json::to_string_pretty(&selection)?);
            return Ok(());
        }

        println!("{} {}", "base:".bold(), selection.base.to_string().green());
        println!("candidates: {}", join(&selection.candidates));
        println!("platform:   {}", join(&selection.platform).bright_black());
        Ok(())
    }
}

fn join(bases: &[Base]) -> String {
    bases
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
