//! Tool discovery
//!
//! Scans a directory for `*.json` manifests and turns every entry into a
//! [`ToolDefinition`] through the factory registered for its `kind`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{RestToolFactory, ToolDefinition, ToolHandler, ToolManifest};
use crate::config::GatewayConfig;

#[derive(Debug, Error)]
pub enum ToolLoadError {
    #[error("failed to read tools directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Builds a handler for one manifest entry
pub trait ToolFactory: Send + Sync {
    fn create(
        &self,
        manifest: &ToolManifest,
        config: &GatewayConfig,
    ) -> anyhow::Result<Arc<dyn ToolHandler>>;
}

/// Factories keyed by manifest `kind`
#[derive(Clone)]
pub struct ToolFactories {
    factories: HashMap<String, Arc<dyn ToolFactory>>,
}

impl ToolFactories {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register(&mut self, kind: impl Into<String>, factory: Arc<dyn ToolFactory>) {
        self.factories.insert(kind.into(), factory);
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<dyn ToolFactory>> {
        self.factories.get(kind)
    }
}

impl Default for ToolFactories {
    fn default() -> Self {
        let mut factories = Self::empty();
        factories.register("rest", Arc::new(RestToolFactory));
        factories
    }
}

impl std::fmt::Debug for ToolFactories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.factories.keys().collect();
        kinds.sort();
        f.debug_struct("ToolFactories").field("kinds", &kinds).finish()
    }
}

/// Load every tool described under `dir`
///
/// A missing directory yields no tools. Files and entries that fail to parse
/// or build are logged and skipped. Files are visited in name order, so when
/// two entries share a name the one loaded last wins at registration.
pub async fn load_tools(
    config: &GatewayConfig,
    dir: &Path,
    factories: &ToolFactories,
) -> Result<Vec<ToolDefinition>, ToolLoadError> {
    let mut tools = Vec::new();

    if !dir.exists() {
        debug!("Tools directory {} does not exist", dir.display());
        return Ok(tools);
    }

    let read_err = |source| ToolLoadError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await.map_err(read_err)?;
    while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            files.push(path);
        }
    }
    files.sort();

    for path in files {
        match load_file(config, &path, factories).await {
            Ok(mut loaded) => tools.append(&mut loaded),
            Err(e) => warn!("Failed to load tool file {}: {:#}", path.display(), e),
        }
    }

    info!("Loaded {} tools from {}", tools.len(), dir.display());
    Ok(tools)
}

async fn load_file(
    config: &GatewayConfig,
    path: &Path,
    factories: &ToolFactories,
) -> anyhow::Result<Vec<ToolDefinition>> {
    let content = tokio::fs::read_to_string(path).await?;
    let manifests = ToolManifest::parse_document(&content)?;

    let mut tools = Vec::with_capacity(manifests.len());
    for manifest in manifests {
        match build_tool(config, &manifest, factories) {
            Ok(tool) => tools.push(tool),
            Err(e) => warn!(
                "Skipping tool '{}' from {}: {:#}",
                manifest.name,
                path.display(),
                e
            ),
        }
    }
    Ok(tools)
}

fn build_tool(
    config: &GatewayConfig,
    manifest: &ToolManifest,
    factories: &ToolFactories,
) -> anyhow::Result<ToolDefinition> {
    let factory = factories
        .get(&manifest.kind)
        .ok_or_else(|| anyhow::anyhow!("no factory for tool kind '{}'", manifest.kind))?;
    let handler = factory.create(manifest, config)?;
    ToolDefinition::new(manifest.name.clone(), manifest.metadata(), handler)
}
