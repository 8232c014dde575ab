//! Routes connection-setup options to the plugin that claims them.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::error::PluginResult;
use crate::instance::Connection;
use crate::plugin::OptionSpec;
use crate::registry::{PluginRegistry, RegisteredPlugin};

/// Whether a plugin took the option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    Handled,
    /// No plugin claims the option; the host may interpret it itself.
    NotHandled,
}

impl DispatchOutcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, DispatchOutcome::Handled)
    }
}

/// Finds the first plugin, in registration order, declaring an option named
/// `name` (ASCII case-insensitive). Later plugins declaring the same name are
/// never consulted.
pub fn find_plugin_by_option<'r>(
    registry: &'r PluginRegistry,
    name: &str,
) -> Option<(&'r Arc<RegisteredPlugin>, &'r OptionSpec)> {
    registry.iter().find_map(|plugin| {
        plugin
            .options()
            .iter()
            .find(|option| option.matches(name))
            .map(|option| (plugin, option))
    })
}

/// Hands `value` to the plugin owning option `name`, instantiating the plugin
/// on `connection` first if this is its first option there.
///
/// # Errors
///
/// Fails only if a new instance cannot be allocated.
pub fn dispatch(
    registry: &PluginRegistry,
    connection: &mut Connection,
    name: &str,
    value: &str,
) -> PluginResult<DispatchOutcome> {
    let Some((plugin, option)) = find_plugin_by_option(registry, name) else {
        return Ok(DispatchOutcome::NotHandled);
    };

    debug!(
        connection = %connection.id(),
        plugin = %plugin.name(),
        option = %name,
        "Plugin will handle option"
    );

    let (ctx, instances) = connection.split_mut();
    let instance = instances.get_or_create(ctx, plugin)?;

    if option.has_parser {
        plugin
            .plugin()
            .parse_option(option, name, value, instance.state_mut());
    }

    Ok(DispatchOutcome::Handled)
}
