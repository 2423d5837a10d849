use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::controls::policy::Policy;
use crate::controls::Severity;
use crate::error::Result;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".kubeposture.toml";

/// Top-level configuration from `.kubeposture.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub policy: Policy,
    #[serde(default)]
    pub cluster: ClusterConfig,
}

/// Where resources come from when no input patterns are given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Manifest dump standing in for the live cluster.
    #[serde(default)]
    pub snapshot: Option<PathBuf>,
}

impl Config {
    /// Load config from a TOML file. Returns default if file doesn't exist.
    ///
    /// A relative `cluster.snapshot` is taken relative to the config file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        if let (Some(snapshot), Some(dir)) = (config.cluster.snapshot.as_mut(), path.parent()) {
            if snapshot.is_relative() {
                *snapshot = dir.join(snapshot.as_path());
            }
        }
        tracing::debug!(path = %path.display(), snapshot = ?config.cluster.snapshot, "config loaded");
        Ok(config)
    }

    /// Apply a `--fail-on` value from the command line. Unknown severities
    /// leave the configured threshold in place.
    pub fn override_fail_on(&mut self, value: &str) {
        match Severity::from_str_lenient(value) {
            Some(severity) => self.policy.fail_on = Some(severity),
            None => {
                tracing::warn!(value, "unknown severity, using config default");
            }
        }
    }

    /// Generate a starter config file.
    pub fn starter_toml() -> &'static str {
        r#"# kubeposture configuration

[policy]
# Exit with status 1 when a failed control reaches this severity
# (info, low, medium, high, critical). Unset: always exit 0 on completion.
# fail_on = "high"

# Control IDs to ignore entirely.
# ignore_controls = ["C-0017"]

# Per-control severity overrides.
# [policy.overrides]
# "C-0009" = "low"

[cluster]
# Manifest dump scanned when no paths are given on the command line,
# e.g. the output of `kubectl get all -A -o yaml`.
# snapshot = "cluster.yaml"
"#
    }
}
