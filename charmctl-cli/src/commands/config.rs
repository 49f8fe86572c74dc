//! `charmctl config`: canonical config strings for a YAML config file.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use charmctl_core::ConfigValue;
use charmctl_reconcile::config;

/// Arguments for `charmctl config`.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// YAML mapping of config keys to values.
    pub file: PathBuf,

    /// Fold a trust flag in under the `trust` key.
    #[arg(long)]
    pub trust: Option<bool>,

    /// Print the `{app: {key: value}}` document used by repository deploys.
    #[arg(long)]
    pub app: Option<String>,
}

impl ConfigArgs {
    pub fn run(self) -> Result<()> {
        let raw = std::fs::read_to_string(&self.file)
            .with_context(|| format!("failed to read {}", self.file.display()))?;
        let values: BTreeMap<String, ConfigValue> = if raw.trim().is_empty() {
            BTreeMap::new()
        } else {
            serde_yaml::from_str(&raw)
                .with_context(|| format!("failed to parse {}", self.file.display()))?
        };

        if let Some(app) = self.app.as_deref() {
            if self.trust.is_some() {
                anyhow::bail!("--trust is applied separately from the repository config document");
            }
            print!("{}", config::yaml_document(app, &values)?);
            return Ok(());
        }

        for (key, value) in config::normalize(&values, self.trust) {
            println!("{key}={value}");
        }
        Ok(())
    }
}
