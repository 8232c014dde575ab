//! # rtmpkit core
//!
//! Shared building blocks for the rtmpkit streaming client crates:
//!
//! - **Types**: `ConnectionId`, the identifier every connection-scoped log
//!   line carries.
//! - **Errors**: `thiserror` enums for configuration and I/O failures.
//! - **Configuration**: YAML files with `RTMPKIT__*` environment overrides,
//!   including where plugin modules are searched for.
//!
//! ## Example
//!
//! ```
//! use rtmpkit_core::config::PluginConfig;
//!
//! let plugins = PluginConfig::with_dirs(None, "/opt/rtmpkit/plugins");
//! assert!(plugins.validate().is_ok());
//! assert_eq!(plugins.search_dirs().len(), 1);
//! ```

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, LogFormat, LoggingConfig, PluginConfig};
pub use error::{ConfigError, Result, RtmpkitError};
pub use types::ConnectionId;
