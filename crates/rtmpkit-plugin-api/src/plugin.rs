//! The capability interface every registered plugin is driven through.
//!
//! Native modules are adapted to [`Plugin`] by [`crate::native::NativePlugin`];
//! in-process plugins implement it directly and are registered as builtins.

use rtmpkit_core::types::ConnectionId;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::ffi::c_void;

/// Per-connection private state returned by [`Plugin::create`].
pub type PluginState = Box<dyn Any + Send>;

/// Identity and documentation fields of a plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub author: String,
    pub homepage: String,
}

impl PluginInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn homepage(mut self, homepage: impl Into<String>) -> Self {
        self.homepage = homepage.into();
        self
    }
}

/// A connection-setup option claimed by a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSpec {
    /// Name matched case-insensitively against dispatched options
    pub name: String,
    /// Type name shown in the help screen
    pub type_label: String,
    /// Short description shown in the help screen
    pub usage: String,
    /// Whether a matched value is forwarded to [`Plugin::parse_option`]
    pub has_parser: bool,
}

impl OptionSpec {
    pub fn new(
        name: impl Into<String>,
        type_label: impl Into<String>,
        usage: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_label: type_label.into(),
            usage: usage.into(),
            has_parser: true,
        }
    }

    /// Declares the option only to trigger instantiation; values are dropped.
    pub fn without_parser(mut self) -> Self {
        self.has_parser = false;
        self
    }

    /// Explicit length check, then ASCII case-folded byte comparison.
    pub fn matches(&self, name: &str) -> bool {
        self.name.len() == name.len() && self.name.as_bytes().eq_ignore_ascii_case(name.as_bytes())
    }
}

/// Opaque host session pointer handed to native create/delete hooks.
///
/// The plugin subsystem never dereferences it; it exists so that a plugin can
/// reach host services such as callback attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostHandle(*mut c_void);

// SAFETY: the handle is only passed through to plugin hooks on the thread
// that owns the connection; the subsystem never reads through it.
unsafe impl Send for HostHandle {}

impl HostHandle {
    pub const fn null() -> Self {
        Self(std::ptr::null_mut())
    }

    pub const fn from_raw(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.0
    }
}

impl Default for HostHandle {
    fn default() -> Self {
        Self::null()
    }
}

/// What a plugin hook sees of the connection it runs for.
#[derive(Debug, Default)]
pub struct ConnectionContext {
    id: ConnectionId,
    host: HostHandle,
}

impl ConnectionContext {
    pub fn new(id: ConnectionId, host: HostHandle) -> Self {
        Self { id, host }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn host_handle(&self) -> HostHandle {
        self.host
    }
}

/// A loadable extension that claims connection-setup options.
///
/// The host calls [`create`](Plugin::create) at most once per connection, the
/// first time one of the plugin's options is dispatched there, and
/// [`delete`](Plugin::delete) exactly once for that instance when the
/// connection is torn down.
pub trait Plugin: Send + Sync {
    fn info(&self) -> &PluginInfo;

    /// Options in declaration order. An entry with an empty name ends the table.
    fn options(&self) -> &[OptionSpec];

    /// Allocates per-connection state. `None` means the plugin keeps none.
    fn create(&self, _ctx: &mut ConnectionContext) -> Option<PluginState> {
        None
    }

    /// Releases everything allocated by `create` and `parse_option`.
    fn delete(&self, _ctx: &mut ConnectionContext, _state: Option<PluginState>) {}

    /// Consumes one matched option occurrence. Validation is the plugin's
    /// own business; there is no way to reject the option.
    fn parse_option(
        &self,
        _option: &OptionSpec,
        _name: &str,
        _value: &str,
        _state: Option<&mut PluginState>,
    ) {
    }

    fn name(&self) -> &str {
        &self.info().name
    }
}

/// Downcasts per-connection state to the plugin's concrete type.
pub fn state_mut<T: Any>(state: Option<&mut PluginState>) -> Option<&mut T> {
    state.and_then(|s| s.downcast_mut::<T>())
}
