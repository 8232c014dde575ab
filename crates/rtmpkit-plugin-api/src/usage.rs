//! Help-screen listing of the options plugins provide.

use tracing::Level;

use crate::registry::PluginRegistry;

/// Usage lines for every plugin with at least one option: a header naming
/// the plugin, then one `name type  usage` line per option.
pub fn option_usage(registry: &PluginRegistry) -> Vec<String> {
    let mut lines = Vec::new();
    for plugin in registry.iter() {
        let options = plugin.options();
        if options.is_empty() {
            continue;
        }

        lines.push(format!(
            "Options provided by {} {} plugin:",
            plugin.name(),
            plugin.info().version
        ));
        for option in options {
            lines.push(format!(
                "{:>10} {:<7}  {}",
                option.name, option.type_label, option.usage
            ));
        }
    }
    lines
}

/// Emits [`option_usage`] through `tracing` at `level`.
pub fn print_option_usage(registry: &PluginRegistry, level: Level) {
    for line in option_usage(registry) {
        if level == Level::ERROR {
            tracing::error!("{line}");
        } else if level == Level::WARN {
            tracing::warn!("{line}");
        } else if level == Level::INFO {
            tracing::info!("{line}");
        } else if level == Level::DEBUG {
            tracing::debug!("{line}");
        } else {
            tracing::trace!("{line}");
        }
    }
}
