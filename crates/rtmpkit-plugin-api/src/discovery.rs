//! Scans the plugin directories and loads every module found there.

use rtmpkit_core::config::PluginConfig;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::loader::ModuleLoader;
use crate::native::load_module;
use crate::registry::{PluginRegistry, PluginSource, Registration};

/// What one discovery pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
    /// Directories scanned, in order
    pub directories: Vec<PathBuf>,
    /// Module files attempted
    pub candidates: usize,
    /// Plugins added to the registry
    pub registered: usize,
    /// Modules rejected while loading
    pub rejected: usize,
    /// Valid plugins dropped because their name was taken
    pub duplicates: usize,
}

/// Loads every module under the configured directories into `registry`.
///
/// Directories are scanned in [`PluginConfig::search_dirs`] order and every
/// directory is scanned to completion; a bad module only costs itself.
pub fn discover(
    registry: &mut PluginRegistry,
    loader: &dyn ModuleLoader,
    config: &PluginConfig,
) -> DiscoveryReport {
    let mut report = DiscoveryReport::default();

    if let Err(e) = loader.init() {
        error!(error = %e, "Failed to load plugins");
        return report;
    }

    for dir in config.search_dirs() {
        for path in scan_dir(&dir, &config.module_suffix) {
            report.candidates += 1;
            load_into(registry, loader, &path, &mut report);
        }
        report.directories.push(dir);
    }

    info!(
        registered = report.registered,
        rejected = report.rejected,
        duplicates = report.duplicates,
        "Plugin discovery finished"
    );
    report
}

fn load_into(
    registry: &mut PluginRegistry,
    loader: &dyn ModuleLoader,
    path: &Path,
    report: &mut DiscoveryReport,
) {
    let plugin = match load_module(loader, path) {
        Ok(plugin) => plugin,
        Err(e) => {
            error!(error = %e, "Rejected plugin module");
            report.rejected += 1;
            return;
        }
    };

    match registry.register(Box::new(plugin), PluginSource::Module(path.to_path_buf())) {
        Ok(Registration::Added(_)) => report.registered += 1,
        Ok(Registration::Duplicate) => report.duplicates += 1,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to register plugin");
            report.rejected += 1;
        }
    }
}

/// Lists module files directly inside `dir`, sorted by file name.
///
/// A missing or unreadable directory yields nothing.
pub fn scan_dir(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    debug!(dir = %dir.display(), "Loading plugins");

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Can not read plugin dir");
            return Vec::new();
        }
    };

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(suffix))
        .filter(|entry| !entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|entry| entry.path())
        .collect();

    candidates.sort();
    candidates
}
