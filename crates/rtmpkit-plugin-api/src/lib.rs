// rtmpkit Plugin API
// Native plugin modules: discovery, per-connection instances and option dispatch

pub mod abi;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod instance;
pub mod loader;
pub mod native;
pub mod plugin;
pub mod registry;
pub mod usage;

pub use abi::{AVal, PluginDescriptor, PluginOption, PLUGIN_API_VERSION, PLUGIN_INIT_SYMBOL};
pub use discovery::{discover, DiscoveryReport};
pub use dispatch::{dispatch, find_plugin_by_option, DispatchOutcome};
pub use error::{PluginError, PluginResult};
pub use host::{PluginHost, PluginHostBuilder};
pub use instance::{Connection, Instance, InstanceManager};
pub use loader::{LibraryLoader, Module, ModuleLoader};
pub use native::{load_module, NativePlugin};
pub use plugin::{
    state_mut, ConnectionContext, HostHandle, OptionSpec, Plugin, PluginInfo, PluginState,
};
pub use registry::{PluginRegistry, PluginSource, PluginSummary, RegisteredPlugin, Registration};
pub use usage::{option_usage, print_option_usage};

// Re-export core types that hosts interact with
pub use rtmpkit_core::{ConnectionId, PluginConfig};
