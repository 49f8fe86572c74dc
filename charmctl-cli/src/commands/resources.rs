//! `charmctl resources`: show the pending-resource plan for a plan file.
//!
//! ```yaml
//! declared:
//!   - { name: image, type: oci-image }
//!   - { name: plugin, type: file }
//! requested:          # optional; absent means store-latest for everything
//!   image: registry.example/pg:14
//!   plugin: "7"
//! current:            # optional; revisions in use, only changes are planned
//!   plugin: 7
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tabled::{settings::Style, Table, Tabled};

use charmctl_core::{PendingResource, ResourceMeta, ResourceSource};
use charmctl_reconcile::resources::{self, LATEST_REVISION};

/// Arguments for `charmctl resources`.
#[derive(Args, Debug)]
pub struct ResourcesArgs {
    /// YAML plan file.
    pub plan: PathBuf,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Deserialize)]
struct PlanFile {
    declared: Vec<ResourceMeta>,
    #[serde(default)]
    requested: Option<BTreeMap<String, String>>,
    #[serde(default)]
    current: Option<BTreeMap<String, i64>>,
}

#[derive(Serialize)]
struct PlanEntry {
    #[serde(flatten)]
    resource: PendingResource,
    /// Why the entry cannot be applied, if it cannot.
    #[serde(skip_serializing_if = "Option::is_none")]
    problem: Option<String>,
}

#[derive(Tabled)]
struct PlanRow {
    resource: String,
    #[tabled(rename = "type")]
    kind: String,
    source: String,
    status: String,
}

impl ResourcesArgs {
    pub fn run(self) -> Result<()> {
        let raw = std::fs::read_to_string(&self.plan)
            .with_context(|| format!("failed to read {}", self.plan.display()))?;
        let file: PlanFile = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse {}", self.plan.display()))?;

        let declared: BTreeMap<String, ResourceMeta> = file
            .declared
            .into_iter()
            .map(|meta| (meta.name.clone(), meta))
            .collect();
        let requested = match (file.requested, file.current.as_ref()) {
            (Some(requested), Some(current)) => Some(resources::changed(&requested, current)),
            (requested, _) => requested,
        };

        let entries: Vec<PlanEntry> = resources::plan(&declared, requested.as_ref())
            .into_iter()
            .map(|resource| {
                let problem = match &resource.source {
                    ResourceSource::Upload { .. } => {
                        resources::ensure_uploadable(&resource.meta.name, resource.meta.kind)
                            .err()
                            .map(|e| e.to_string())
                    }
                    ResourceSource::Store { .. } => None,
                };
                PlanEntry { resource, problem }
            })
            .collect();
        tracing::debug!(planned = entries.len(), declared = declared.len(), "resource plan");

        if self.json {
            println!("{}", serde_json::to_string_pretty(&entries)?);
            return Ok(());
        }
        print_table(&entries);
        Ok(())
    }
}

fn print_table(entries: &[PlanEntry]) {
    if entries.is_empty() {
        println!("Nothing to register.");
        return;
    }

    let rows: Vec<PlanRow> = entries
        .iter()
        .map(|entry| PlanRow {
            resource: entry.resource.meta.name.clone(),
            kind: entry.resource.meta.kind.to_string(),
            source: describe(&entry.resource.source),
            status: match &entry.problem {
                None => "ok".green().to_string(),
                Some(_) => "not uploadable".red().to_string(),
            },
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    for problem in entries.iter().filter_map(|e| e.problem.as_deref()) {
        println!("{} {problem}", "!".yellow().bold());
    }
}

fn describe(source: &ResourceSource) -> String {
    match source {
        ResourceSource::Store {
            revision: LATEST_REVISION,
        } => "store (latest)".to_string(),
        ResourceSource::Store { revision } => format!("store r{revision}"),
        ResourceSource::Upload { reference } => format!("upload {reference}"),
    }
}
