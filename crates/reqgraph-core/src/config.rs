//! Engine configuration, loaded from TOML

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, CatalogEntry, Catalogs};
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::model::{Link, Size};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Snapshots kept before the oldest is evicted. 0 is treated as 1.
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig {
            capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeDefaults {
    /// Links every new block starts with.
    pub default_links: Vec<Link>,
    pub default_size: Option<Size>,
}

impl Default for NodeDefaults {
    fn default() -> Self {
        NodeDefaults {
            default_links: (1..=4)
                .map(|i| Link::new(format!("Button {i}"), ""))
                .collect(),
            default_size: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub processes: Vec<CatalogEntry>,
    pub software: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub history: HistoryConfig,
    pub nodes: NodeDefaults,
    pub catalog: CatalogConfig,
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        toml::from_str(raw).context("parse engine config")
    }

    /// Read a config file. Unlike an absent `--config` flag, a missing
    /// file at an explicit path is an error.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config = Self::from_toml_str(&raw)
            .with_context(|| format!("load config {}", path.display()))?;
        tracing::debug!("Engine config loaded from: {}", path.display());
        Ok(config)
    }

    /// Shared catalog handles built from the configured tables.
    pub fn catalogs(&self) -> Catalogs {
        Catalogs::new(
            Arc::new(Catalog::new(self.catalog.processes.clone())),
            Arc::new(Catalog::new(self.catalog.software.clone())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_new_block_template() {
        let config = EngineConfig::default();
        assert_eq!(config.history.capacity, 200);
        assert_eq!(config.nodes.default_links.len(), 4);
        assert_eq!(config.nodes.default_links[0], Link::new("Button 1", ""));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
[history]
capacity = 16

[[catalog.processes]]
id = "cnc"
name = "CNC milling"
"#,
        )
        .unwrap();
        assert_eq!(config.history.capacity, 16);
        assert_eq!(config.nodes.default_links.len(), 4);
        assert_eq!(config.catalog.processes.len(), 1);
        assert!(config.catalog.software.is_empty());
        assert!(config.catalogs().processes.lookup("cnc").is_some());
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reqgraph.toml");
        std::fs::write(
            &path,
            "[nodes]\ndefault_links = []\ndefault_size = { width = 120.0, height = 60.0 }\n",
        )
        .unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert!(config.nodes.default_links.is_empty());
        assert_eq!(config.nodes.default_size, Some(Size { width: 120.0, height: 60.0 }));

        assert!(EngineConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
