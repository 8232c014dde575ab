//! Host-facing entry point of the plugin subsystem.

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;
use rtmpkit_core::config::PluginConfig;
use tracing::{error, info, Level};

use crate::discovery::{discover, DiscoveryReport};
use crate::dispatch::{self, DispatchOutcome};
use crate::error::PluginResult;
use crate::instance::Connection;
use crate::loader::{LibraryLoader, ModuleLoader};
use crate::plugin::Plugin;
use crate::registry::{PluginRegistry, PluginSource, PluginSummary, Registration};
use crate::usage;

static GLOBAL: Lazy<PluginHost> = Lazy::new(PluginHost::from_env);

struct Loaded {
    registry: PluginRegistry,
    report: DiscoveryReport,
}

/// Owns the plugin registry and builds it on first use.
///
/// The build (builtin registration plus directory discovery) runs at most
/// once per host; concurrent first callers wait for it to finish. After that
/// the registry is read-only.
pub struct PluginHost {
    config: PluginConfig,
    loader: Box<dyn ModuleLoader>,
    builtins: Mutex<Vec<Box<dyn Plugin>>>,
    loaded: OnceCell<Loaded>,
}

impl PluginHost {
    pub fn builder() -> PluginHostBuilder {
        PluginHostBuilder::default()
    }

    /// A host searching the directories named by the process environment.
    pub fn from_env() -> Self {
        Self::builder().build()
    }

    /// The process-wide host.
    pub fn global() -> &'static PluginHost {
        &GLOBAL
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Builds the registry if that has not happened yet.
    pub fn ensure_loaded(&self) -> &PluginRegistry {
        &self.loaded().registry
    }

    /// Same as [`ensure_loaded`](Self::ensure_loaded).
    pub fn registry(&self) -> &PluginRegistry {
        self.ensure_loaded()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }

    /// Outcome of discovery, once it has run.
    pub fn discovery_report(&self) -> Option<&DiscoveryReport> {
        self.loaded.get().map(|l| &l.report)
    }

    /// Routes one connection-setup option; see [`dispatch::dispatch`].
    pub fn dispatch(
        &self,
        connection: &mut Connection,
        name: &str,
        value: &str,
    ) -> PluginResult<DispatchOutcome> {
        dispatch::dispatch(self.ensure_loaded(), connection, name, value)
    }

    /// Tears down every plugin instance of `connection`.
    pub fn delete_all_instances(&self, connection: &mut Connection) {
        connection.delete_all_instances();
    }

    pub fn option_usage(&self) -> Vec<String> {
        usage::option_usage(self.ensure_loaded())
    }

    pub fn print_option_usage(&self, level: Level) {
        usage::print_option_usage(self.ensure_loaded(), level);
    }

    pub fn plugins(&self) -> Vec<PluginSummary> {
        self.ensure_loaded().summaries()
    }

    fn loaded(&self) -> &Loaded {
        self.loaded.get_or_init(|| self.build())
    }

    fn build(&self) -> Loaded {
        let mut registry = PluginRegistry::new();

        for plugin in std::mem::take(&mut *self.builtins.lock()) {
            let name = plugin.name().to_string();
            match registry.register(plugin, PluginSource::Builtin) {
                Ok(Registration::Added(_)) | Ok(Registration::Duplicate) => {}
                Err(e) => error!(plugin = %name, error = %e, "Failed to register builtin plugin"),
            }
        }

        let report = discover(&mut registry, self.loader.as_ref(), &self.config);
        info!(plugins = registry.len(), "Plugin registry ready");

        Loaded { registry, report }
    }
}

impl std::fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHost")
            .field("config", &self.config)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Builder for [`PluginHost`].
#[derive(Default)]
pub struct PluginHostBuilder {
    config: Option<PluginConfig>,
    loader: Option<Box<dyn ModuleLoader>>,
    builtins: Vec<Box<dyn Plugin>>,
}

impl PluginHostBuilder {
    pub fn config(mut self, config: PluginConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replaces the dynamic-linker loader.
    pub fn loader(mut self, loader: impl ModuleLoader + 'static) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    /// Registers an in-process plugin ahead of anything discovered on disk.
    pub fn with_builtin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.builtins.push(Box::new(plugin));
        self
    }

    pub fn build(self) -> PluginHost {
        PluginHost {
            config: self.config.unwrap_or_else(PluginConfig::from_env),
            loader: self.loader.unwrap_or_else(|| Box::new(LibraryLoader::new())),
            builtins: Mutex::new(self.builtins),
            loaded: OnceCell::new(),
        }
    }
}
