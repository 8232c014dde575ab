use std::collections::TryReserveError;
use thiserror::Error;

/// Plugin system error types
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Failed to initialize module loader: {0}")]
    LoaderInit(String),

    #[error("Failed to open plugin {path}: {reason}")]
    OpenFailed { path: String, reason: String },

    #[error("Plugin {path} has no initializer: {reason}")]
    MissingInitializer { path: String, reason: String },

    #[error("Plugin {path} initializer failed")]
    InitializerFailed { path: String },

    #[error("Incompatible API version on plugin {path} (plugin: {plugin}, host: {host})")]
    ApiVersionMismatch { path: String, plugin: u32, host: u32 },

    #[error("Invalid descriptor in plugin {path}: {reason}")]
    InvalidDescriptor { path: String, reason: String },

    #[error("Failed to close plugin {path}: {reason}")]
    CloseFailed { path: String, reason: String },

    #[error("Allocation failed: {0}")]
    Allocation(#[from] TryReserveError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type PluginResult<T> = Result<T, PluginError>;
