//! Native module loading.
//!
//! The registry needs three things from the platform: open a module by path,
//! resolve the plugin initializer in it, and close it again. [`ModuleLoader`]
//! and [`Module`] capture exactly that, so discovery can be exercised against
//! scripted loaders in tests. [`LibraryLoader`] is the real implementation on
//! top of `libloading`.

use libloading::Library;
use std::path::{Path, PathBuf};

use crate::abi::PluginInitFn;
use crate::error::{PluginError, PluginResult};

/// Opens native modules.
pub trait ModuleLoader: Send + Sync {
    /// Prepares the loading facility. Discovery is abandoned if this fails.
    fn init(&self) -> PluginResult<()> {
        Ok(())
    }

    fn open(&self, path: &Path) -> PluginResult<Box<dyn Module>>;
}

/// An opened native module. Dropping it without [`close`](Module::close)
/// still unloads it, but loses the error report.
pub trait Module: Send + Sync {
    fn path(&self) -> &Path;

    /// Resolves the plugin initializer exported under `symbol`.
    fn resolve_initializer(&self, symbol: &str) -> PluginResult<PluginInitFn>;

    fn close(self: Box<Self>) -> PluginResult<()>;
}

/// Loads modules through the platform dynamic linker.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibraryLoader;

impl LibraryLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ModuleLoader for LibraryLoader {
    fn open(&self, path: &Path) -> PluginResult<Box<dyn Module>> {
        // SAFETY: loading runs the module's static constructors. Plugin
        // directories are trusted by whoever installed files into them.
        let library = unsafe { Library::new(path) }.map_err(|e| PluginError::OpenFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(Box::new(LibraryModule {
            path: path.to_path_buf(),
            library,
        }))
    }
}

/// A module opened by [`LibraryLoader`].
#[derive(Debug)]
pub struct LibraryModule {
    path: PathBuf,
    library: Library,
}

impl Module for LibraryModule {
    fn path(&self) -> &Path {
        &self.path
    }

    fn resolve_initializer(&self, symbol: &str) -> PluginResult<PluginInitFn> {
        let mut name = Vec::with_capacity(symbol.len() + 1);
        name.extend_from_slice(symbol.as_bytes());
        name.push(0);

        // SAFETY: the symbol is declared with the initializer signature by
        // the ABI contract; a module lying about it is undefined behaviour
        // we cannot detect.
        let initializer = unsafe { self.library.get::<PluginInitFn>(&name) }.map_err(|e| {
            PluginError::MissingInitializer {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(*initializer)
    }

    fn close(self: Box<Self>) -> PluginResult<()> {
        let path = self.path;
        self.library.close().map_err(|e| PluginError::CloseFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}
