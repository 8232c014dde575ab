//! C ABI shared between the host and native plugin modules.
//!
//! A module is recognized as a plugin when it exports [`PLUGIN_INIT_SYMBOL`],
//! a zero-argument function returning a pointer to a static
//! [`PluginDescriptor`]. Strings cross the boundary as explicit-length byte
//! slices ([`AVal`]) and are never assumed to be NUL-terminated.
//!
//! ```rust,ignore
//! use rtmpkit_plugin_api::abi::{AVal, PluginDescriptor, PluginOption, PLUGIN_API_VERSION};
//!
//! static OPTIONS: [PluginOption; 2] = [
//!     PluginOption::new(AVal::from_static("counts"), AVal::from_static("int"),
//!                       AVal::from_static("Print packet counts"), Some(parse_counts)),
//!     PluginOption::SENTINEL,
//! ];
//!
//! static DESCRIPTOR: PluginDescriptor = PluginDescriptor {
//!     required_api_version: PLUGIN_API_VERSION,
//!     name: AVal::from_static("example"),
//!     version: AVal::from_static("1.0"),
//!     author: AVal::EMPTY,
//!     homepage: AVal::EMPTY,
//!     options: OPTIONS.as_ptr(),
//!     create: Some(create),
//!     delete: Some(delete),
//! };
//!
//! rtmpkit_plugin_api::rtmp_plugin!(DESCRIPTOR);
//! ```

use std::ffi::c_void;

/// Plugin API version. Modules built against a different value are rejected.
pub const PLUGIN_API_VERSION: u32 = 1;

/// Name of the initializer every plugin module exports.
pub const PLUGIN_INIT_SYMBOL: &str = "rtmp_init_plugin";

/// Upper bound on option table length, guarding against a missing sentinel.
pub const MAX_PLUGIN_OPTIONS: usize = 256;

/// Explicit-length byte string.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AVal {
    pub val: *const u8,
    pub len: usize,
}

// SAFETY: AVal values in descriptors point at static data owned by the
// module, which stays mapped while the plugin is registered.
unsafe impl Send for AVal {}
unsafe impl Sync for AVal {}

impl AVal {
    /// The empty string. Also terminates an option table.
    pub const EMPTY: AVal = AVal {
        val: std::ptr::null(),
        len: 0,
    };

    /// Wraps a static string.
    pub const fn from_static(s: &'static str) -> Self {
        Self {
            val: s.as_ptr(),
            len: s.len(),
        }
    }

    /// Borrows `bytes` for the duration of a hook call.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            val: bytes.as_ptr(),
            len: bytes.len(),
        }
    }

    /// Returns true if the string has zero length.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Views the string as bytes.
    ///
    /// # Safety
    ///
    /// `val` must point at `len` readable bytes that outlive `'a`, or be null.
    pub unsafe fn as_bytes<'a>(&self) -> &'a [u8] {
        if self.val.is_null() || self.len == 0 {
            &[]
        } else {
            // SAFETY: caller guarantees `val` covers `len` bytes.
            unsafe { std::slice::from_raw_parts(self.val, self.len) }
        }
    }
}

/// Called the first time one of the plugin's options is dispatched on a
/// connection. Returns the plugin's private state for that connection.
pub type CreateHook = unsafe extern "C" fn(connection: *mut c_void) -> *mut c_void;

/// Called once per instance at connection teardown with the state returned
/// by [`CreateHook`].
pub type DeleteHook = unsafe extern "C" fn(connection: *mut c_void, state: *mut c_void);

/// Called for every dispatched occurrence of the option.
pub type ParseHook =
    unsafe extern "C" fn(name: *const AVal, value: *const AVal, state: *mut c_void);

/// Signature of [`PLUGIN_INIT_SYMBOL`].
pub type PluginInitFn = unsafe extern "C" fn() -> *const PluginDescriptor;

/// One connection-setup option a plugin claims.
#[repr(C)]
#[derive(Debug)]
pub struct PluginOption {
    /// Name as it appears in the connection setup string
    pub name: AVal,
    /// Type name shown in the help screen
    pub type_label: AVal,
    /// Short description shown in the help screen
    pub usage: AVal,
    /// Receives the option value, if present
    pub parse: Option<ParseHook>,
}

// SAFETY: see AVal; the hook is a plain function pointer.
unsafe impl Sync for PluginOption {}

impl PluginOption {
    /// Table terminator.
    pub const SENTINEL: PluginOption = PluginOption {
        name: AVal::EMPTY,
        type_label: AVal::EMPTY,
        usage: AVal::EMPTY,
        parse: None,
    };

    pub const fn new(name: AVal, type_label: AVal, usage: AVal, parse: Option<ParseHook>) -> Self {
        Self {
            name,
            type_label,
            usage,
            parse,
        }
    }
}

/// Static registration record exported by a plugin module.
#[repr(C)]
#[derive(Debug)]
pub struct PluginDescriptor {
    /// Must equal [`PLUGIN_API_VERSION`]
    pub required_api_version: u32,
    /// Unique plugin name
    pub name: AVal,
    pub version: AVal,
    /// Author name and email
    pub author: AVal,
    /// Where the latest version can be downloaded
    pub homepage: AVal,
    /// Option table terminated by an entry with an empty name, or null
    pub options: *const PluginOption,
    pub create: Option<CreateHook>,
    pub delete: Option<DeleteHook>,
}

// SAFETY: descriptors are immutable statics inside the module.
unsafe impl Sync for PluginDescriptor {}

impl PluginDescriptor {
    /// Iterates the option table up to the sentinel.
    ///
    /// Stops after [`MAX_PLUGIN_OPTIONS`] entries; the caller decides whether
    /// running into the bound is an error.
    ///
    /// # Safety
    ///
    /// `options` must be null or point at a sentinel-terminated array.
    pub unsafe fn option_table(&self) -> impl Iterator<Item = &PluginOption> + '_ {
        let base = self.options;
        (0..MAX_PLUGIN_OPTIONS)
            .map_while(move |i| {
                if base.is_null() {
                    return None;
                }
                // SAFETY: every index up to the sentinel is in bounds.
                let option = unsafe { &*base.add(i) };
                (!option.name.is_empty()).then_some(option)
            })
    }
}

/// Exports `rtmp_init_plugin` returning the given static descriptor.
///
/// Must be invoked exactly once per module.
#[macro_export]
macro_rules! rtmp_plugin {
    ($descriptor:path) => {
        #[no_mangle]
        pub extern "C" fn rtmp_init_plugin() -> *const $crate::abi::PluginDescriptor {
            &$descriptor
        }
    };
}
