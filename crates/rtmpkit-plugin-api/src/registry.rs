//! Registry of validated plugins, in registration order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::PluginResult;
use crate::plugin::{OptionSpec, Plugin, PluginInfo};

/// Where a registered plugin came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "lowercase")]
pub enum PluginSource {
    /// Compiled into the host
    Builtin,
    /// Loaded from a native module
    Module(PathBuf),
}

impl fmt::Display for PluginSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginSource::Builtin => write!(f, "builtin"),
            PluginSource::Module(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A plugin accepted into the registry.
///
/// Instances refer back to their plugin through an `Arc` of this entry, and
/// identity comparisons use the `Arc` pointer, never the name.
pub struct RegisteredPlugin {
    plugin: Box<dyn Plugin>,
    source: PluginSource,
}

impl RegisteredPlugin {
    pub fn plugin(&self) -> &dyn Plugin {
        self.plugin.as_ref()
    }

    pub fn info(&self) -> &PluginInfo {
        self.plugin.info()
    }

    pub fn name(&self) -> &str {
        &self.plugin.info().name
    }

    /// Option table up to, not including, the first empty-named entry.
    pub fn options(&self) -> &[OptionSpec] {
        let options = self.plugin.options();
        let end = options
            .iter()
            .position(|o| o.name.is_empty())
            .unwrap_or(options.len());
        &options[..end]
    }

    pub fn source(&self) -> &PluginSource {
        &self.source
    }
}

impl fmt::Debug for RegisteredPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredPlugin")
            .field("name", &self.name())
            .field("version", &self.info().version)
            .field("options", &self.options().len())
            .field("source", &self.source)
            .finish()
    }
}

/// Result of [`PluginRegistry::register`].
#[derive(Debug)]
pub enum Registration {
    Added(Arc<RegisteredPlugin>),
    /// A plugin with the same name was already registered; the new one was
    /// dropped, which closes its module.
    Duplicate,
}

/// Summary of one registered plugin, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSummary {
    #[serde(flatten)]
    pub info: PluginInfo,
    pub options: Vec<OptionSpec>,
    pub source: PluginSource,
}

/// Append-only, name-deduplicated collection of plugins.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<RegisteredPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `plugin` unless its name is taken. The first registration
    /// of a name always wins.
    ///
    /// # Errors
    ///
    /// Returns `PluginError::Allocation` if the registry cannot grow; nothing
    /// is registered in that case.
    pub fn register(
        &mut self,
        plugin: Box<dyn Plugin>,
        source: PluginSource,
    ) -> PluginResult<Registration> {
        let name = plugin.info().name.as_str();
        if self.get(name).is_some() {
            warn!(
                plugin = %name,
                version = %plugin.info().version,
                source = %source,
                "Trying to load duplicate plugin"
            );
            return Ok(Registration::Duplicate);
        }

        self.plugins.try_reserve(1)?;
        debug!(plugin = %name, source = %source, "Registered plugin");
        let entry = Arc::new(RegisteredPlugin { plugin, source });
        self.plugins.push(Arc::clone(&entry));
        Ok(Registration::Added(entry))
    }

    /// Looks up a plugin by exact name.
    pub fn get(&self, name: &str) -> Option<&Arc<RegisteredPlugin>> {
        self.plugins.iter().find(|p| p.name() == name)
    }

    /// Plugins in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<RegisteredPlugin>> {
        self.plugins.iter()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn summaries(&self) -> Vec<PluginSummary> {
        self.plugins
            .iter()
            .map(|p| PluginSummary {
                info: p.info().clone(),
                options: p.options().to_vec(),
                source: p.source().clone(),
            })
            .collect()
    }
}
