//! Configuration for entity discovery and export settings.
//!
//! Load order: `.metagraph/config.toml` → environment variables → defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level metagraph configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub discovery: DiscoveryConfig,
    pub output: OutputConfig,
}

/// Entity discovery configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Root entity types registered before member discovery runs.
    pub roots: Vec<String>,
    /// Treat skipped entity candidates as a failure instead of a warning.
    pub strict: bool,
}

/// Export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Pretty-print exported JSON.
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}

/// Helper to parse an env var and apply it to a config field.
fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

fn split_roots(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl GraphConfig {
    /// Load config from `.metagraph/config.toml` in the project root, with env var overrides.
    /// Falls back to defaults if no config file exists.
    pub fn load(project_root: &Path) -> Result<Self> {
        let config_path = project_root.join(".metagraph").join("config.toml");

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read {}", config_path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("failed to parse {}", config_path.display()))?
        } else {
            Self::default()
        };

        // Environment variable overrides
        if let Ok(roots) = std::env::var("METAGRAPH_ROOTS") {
            config.discovery.roots = split_roots(&roots);
        }
        env_override("METAGRAPH_STRICT", &mut config.discovery.strict);
        env_override("METAGRAPH_PRETTY", &mut config.output.pretty);

        config.validate()?;
        Ok(config)
    }

    /// Merge extra root names (e.g. from the command line) after the configured ones.
    pub fn with_roots<I, S>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for root in roots {
            let root = root.into();
            if !self.discovery.roots.contains(&root) {
                self.discovery.roots.push(root);
            }
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if let Some(blank) = self.discovery.roots.iter().position(|r| r.trim().is_empty()) {
            anyhow::bail!("discovery.roots[{blank}] is empty");
        }
        Ok(())
    }
}
