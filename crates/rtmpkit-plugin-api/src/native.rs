//! Adapter from a native module's C descriptor to [`Plugin`].

use std::ffi::c_void;
use std::path::Path;
use tracing::{debug, warn};

use crate::abi::{
    AVal, CreateHook, DeleteHook, ParseHook, PluginDescriptor, MAX_PLUGIN_OPTIONS,
    PLUGIN_API_VERSION, PLUGIN_INIT_SYMBOL,
};
use crate::error::{PluginError, PluginResult};
use crate::loader::{Module, ModuleLoader};
use crate::plugin::{ConnectionContext, OptionSpec, Plugin, PluginInfo, PluginState};

/// State pointer returned by a native create hook.
struct NativeState(*mut c_void);

// SAFETY: the pointer is owned by the plugin instance and only handed back
// to the plugin's own hooks, on the thread driving the connection.
unsafe impl Send for NativeState {}

/// A plugin living in a native module.
///
/// Descriptor fields are copied at load time; the hooks are plain function
/// pointers into the module, which is kept open for as long as this value
/// lives.
pub struct NativePlugin {
    info: PluginInfo,
    options: Vec<OptionSpec>,
    parsers: Vec<Option<ParseHook>>,
    create: Option<CreateHook>,
    delete: Option<DeleteHook>,
    module: Option<Box<dyn Module>>,
}

impl NativePlugin {
    /// Copies and validates `descriptor`, taking ownership of `module`.
    ///
    /// On error the module is handed back so the caller can close it.
    ///
    /// # Safety
    ///
    /// `descriptor` must have been returned by `module`'s initializer, and
    /// its strings and option table must be valid while `module` is open.
    pub unsafe fn from_descriptor(
        descriptor: &PluginDescriptor,
        module: Box<dyn Module>,
    ) -> Result<Self, (PluginError, Box<dyn Module>)> {
        let path = module.path().display().to_string();
        let invalid = |reason: String| PluginError::InvalidDescriptor {
            path: path.clone(),
            reason,
        };

        // SAFETY: forwarded from the caller.
        let name = match unsafe { utf8_field(&descriptor.name) } {
            Some(name) if !name.is_empty() => name,
            Some(_) => return Err((invalid("empty plugin name".into()), module)),
            None => return Err((invalid("plugin name is not UTF-8".into()), module)),
        };

        let info = PluginInfo {
            name,
            // SAFETY: forwarded from the caller.
            version: unsafe { lossy_field(&descriptor.version) },
            author: unsafe { lossy_field(&descriptor.author) },
            homepage: unsafe { lossy_field(&descriptor.homepage) },
        };

        let mut options = Vec::new();
        let mut parsers = Vec::new();
        // SAFETY: forwarded from the caller.
        for option in unsafe { descriptor.option_table() } {
            let Some(option_name) = (unsafe { utf8_field(&option.name) }) else {
                return Err((invalid("option name is not UTF-8".into()), module));
            };
            options.push(OptionSpec {
                name: option_name,
                type_label: unsafe { lossy_field(&option.type_label) },
                usage: unsafe { lossy_field(&option.usage) },
                has_parser: option.parse.is_some(),
            });
            parsers.push(option.parse);
        }
        // The table walk stops at the bound, so reaching it means the
        // sentinel was never seen.
        if options.len() == MAX_PLUGIN_OPTIONS {
            return Err((
                invalid(format!(
                    "option table has no terminator within {MAX_PLUGIN_OPTIONS} entries"
                )),
                module,
            ));
        }

        Ok(Self {
            info,
            options,
            parsers,
            create: descriptor.create,
            delete: descriptor.delete,
            module: Some(module),
        })
    }

    /// Path of the module this plugin was loaded from.
    pub fn path(&self) -> Option<&Path> {
        self.module.as_ref().map(|m| m.path())
    }

    /// Closes the module, reporting failure.
    pub fn close(mut self) -> PluginResult<()> {
        match self.module.take() {
            Some(module) => module.close(),
            None => Ok(()),
        }
    }

    fn parser_for(&self, option: &OptionSpec) -> Option<ParseHook> {
        self.options
            .iter()
            .position(|o| std::ptr::eq(o, option) || o == option)
            .and_then(|i| self.parsers[i])
    }
}

impl Drop for NativePlugin {
    fn drop(&mut self) {
        if let Some(module) = self.module.take() {
            let path = module.path().display().to_string();
            if let Err(e) = module.close() {
                warn!(path = %path, error = %e, "Failed to close plugin module");
            }
        }
    }
}

impl Plugin for NativePlugin {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    fn options(&self) -> &[OptionSpec] {
        &self.options
    }

    fn create(&self, ctx: &mut ConnectionContext) -> Option<PluginState> {
        let create = self.create?;
        // SAFETY: hook pointer comes from a validated descriptor of a module
        // that is still open.
        let state = unsafe { create(ctx.host_handle().as_ptr()) };
        Some(Box::new(NativeState(state)))
    }

    fn delete(&self, ctx: &mut ConnectionContext, state: Option<PluginState>) {
        let Some(delete) = self.delete else {
            return;
        };
        let raw = state
            .and_then(|s| s.downcast::<NativeState>().ok())
            .map_or(std::ptr::null_mut(), |s| s.0);
        // SAFETY: see `create`; `raw` is what the create hook returned.
        unsafe { delete(ctx.host_handle().as_ptr(), raw) };
    }

    fn parse_option(
        &self,
        option: &OptionSpec,
        name: &str,
        value: &str,
        state: Option<&mut PluginState>,
    ) {
        let Some(parse) = self.parser_for(option) else {
            return;
        };
        let raw = state
            .and_then(|s| s.downcast_mut::<NativeState>())
            .map_or(std::ptr::null_mut(), |s| s.0);

        // C plugins may treat the values as C strings; the NUL is not
        // counted in `len`.
        let name = nul_terminated(name);
        let value = nul_terminated(value);
        let name = AVal {
            val: name.as_ptr(),
            len: name.len() - 1,
        };
        let value = AVal {
            val: value.as_ptr(),
            len: value.len() - 1,
        };

        // SAFETY: see `create`; the AVals borrow buffers alive for the call.
        unsafe { parse(&name, &value, raw) };
    }
}

/// Opens `path`, resolves its initializer and validates the descriptor.
///
/// Every failure after a successful open closes the module again.
pub fn load_module(loader: &dyn ModuleLoader, path: &Path) -> PluginResult<NativePlugin> {
    debug!(path = %path.display(), "Loading plugin");

    let module = loader.open(path)?;
    let display = path.display().to_string();

    let initializer = match module.resolve_initializer(PLUGIN_INIT_SYMBOL) {
        Ok(initializer) => initializer,
        Err(e) => return Err(abandon(module, e)),
    };

    // SAFETY: the initializer takes no arguments and returns a pointer to a
    // static descriptor, per the ABI contract.
    let descriptor = unsafe { initializer() };
    if descriptor.is_null() {
        return Err(abandon(module, PluginError::InitializerFailed { path: display }));
    }
    // SAFETY: non-null and static for as long as the module is open.
    let descriptor = unsafe { &*descriptor };

    if descriptor.required_api_version != PLUGIN_API_VERSION {
        return Err(abandon(
            module,
            PluginError::ApiVersionMismatch {
                path: display,
                plugin: descriptor.required_api_version,
                host: PLUGIN_API_VERSION,
            },
        ));
    }

    // SAFETY: descriptor came from this module's initializer.
    unsafe { NativePlugin::from_descriptor(descriptor, module) }
        .map_err(|(e, module)| abandon(module, e))
}

fn abandon(module: Box<dyn Module>, error: PluginError) -> PluginError {
    let path = module.path().display().to_string();
    if let Err(e) = module.close() {
        debug!(path = %path, error = %e, "Failed to close rejected plugin module");
    }
    error
}

unsafe fn utf8_field(field: &AVal) -> Option<String> {
    // SAFETY: forwarded from the caller.
    let bytes = unsafe { field.as_bytes() };
    std::str::from_utf8(bytes).ok().map(str::to_owned)
}

unsafe fn lossy_field(field: &AVal) -> String {
    // SAFETY: forwarded from the caller.
    String::from_utf8_lossy(unsafe { field.as_bytes() }).into_owned()
}

fn nul_terminated(s: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(s.len() + 1);
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
    buf
}
