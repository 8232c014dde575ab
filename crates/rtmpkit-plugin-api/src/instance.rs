//! Per-connection plugin instances.

use rtmpkit_core::types::ConnectionId;
use std::sync::Arc;
use tracing::debug;

use crate::error::PluginResult;
use crate::plugin::{ConnectionContext, HostHandle, PluginState};
use crate::registry::RegisteredPlugin;

/// One plugin's state on one connection.
pub struct Instance {
    plugin: Arc<RegisteredPlugin>,
    state: Option<PluginState>,
}

impl Instance {
    pub fn plugin(&self) -> &Arc<RegisteredPlugin> {
        &self.plugin
    }

    pub fn state(&self) -> Option<&PluginState> {
        self.state.as_ref()
    }

    pub fn state_mut(&mut self) -> Option<&mut PluginState> {
        self.state.as_mut()
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("plugin", &self.plugin.name())
            .field("has_state", &self.state.is_some())
            .finish()
    }
}

/// Instances of one connection, in creation order.
#[derive(Debug, Default)]
pub struct InstanceManager {
    instances: Vec<Instance>,
}

impl InstanceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an instance of `plugin`, running its create hook.
    ///
    /// Space is reserved before the hook runs, so an allocation failure
    /// leaves both the list and the plugin untouched.
    pub fn create(
        &mut self,
        ctx: &mut ConnectionContext,
        plugin: &Arc<RegisteredPlugin>,
    ) -> PluginResult<&mut Instance> {
        debug!(
            connection = %ctx.id(),
            plugin = %plugin.name(),
            "Creating new plugin instance"
        );

        self.instances.try_reserve(1)?;
        let state = plugin.plugin().create(ctx);
        let index = self.instances.len();
        self.instances.push(Instance {
            plugin: Arc::clone(plugin),
            state,
        });
        Ok(&mut self.instances[index])
    }

    /// Finds the instance created from exactly this registry entry.
    pub fn find(&self, plugin: &Arc<RegisteredPlugin>) -> Option<&Instance> {
        self.instances.iter().find(|i| Arc::ptr_eq(&i.plugin, plugin))
    }

    pub fn find_mut(&mut self, plugin: &Arc<RegisteredPlugin>) -> Option<&mut Instance> {
        self.instances
            .iter_mut()
            .find(|i| Arc::ptr_eq(&i.plugin, plugin))
    }

    /// Returns the existing instance of `plugin`, creating it first if needed.
    pub fn get_or_create(
        &mut self,
        ctx: &mut ConnectionContext,
        plugin: &Arc<RegisteredPlugin>,
    ) -> PluginResult<&mut Instance> {
        let index = match self
            .instances
            .iter()
            .position(|i| Arc::ptr_eq(&i.plugin, plugin))
        {
            Some(index) => index,
            None => {
                self.create(ctx, plugin)?;
                self.instances.len() - 1
            }
        };
        Ok(&mut self.instances[index])
    }

    /// Runs every delete hook in creation order and empties the list.
    ///
    /// Calling it again on the emptied list does nothing.
    pub fn delete_all(&mut self, ctx: &mut ConnectionContext) {
        for instance in std::mem::take(&mut self.instances) {
            debug!(
                connection = %ctx.id(),
                plugin = %instance.plugin.name(),
                "Deleting plugin instance"
            );
            instance.plugin.plugin().delete(ctx, instance.state);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// The host's view of a streaming session, as far as plugins are concerned.
///
/// Instances are torn down by [`Connection::delete_all_instances`]; a
/// connection dropped with live instances tears them down itself.
#[derive(Debug, Default)]
pub struct Connection {
    pub(crate) context: ConnectionContext,
    pub(crate) instances: InstanceManager,
}

impl Connection {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connection whose native hooks receive `host` as their session
    /// pointer.
    pub fn with_host_handle(id: ConnectionId, host: HostHandle) -> Self {
        Self {
            context: ConnectionContext::new(id, host),
            instances: InstanceManager::new(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.context.id()
    }

    pub fn context_mut(&mut self) -> &mut ConnectionContext {
        &mut self.context
    }

    pub fn instances(&self) -> &InstanceManager {
        &self.instances
    }

    /// Borrows the hook context and the instance list at the same time.
    pub fn split_mut(&mut self) -> (&mut ConnectionContext, &mut InstanceManager) {
        (&mut self.context, &mut self.instances)
    }

    pub fn delete_all_instances(&mut self) {
        self.instances.delete_all(&mut self.context);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if !self.instances.is_empty() {
            debug!(connection = %self.id(), "Connection dropped with live plugin instances");
            self.delete_all_instances();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{OptionSpec, Plugin, PluginInfo};
    use crate::registry::{PluginRegistry, PluginSource, Registration};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Journal {
        events: Mutex<Vec<String>>,
    }

    struct Recording {
        info: PluginInfo,
        journal: Arc<Journal>,
    }

    impl Plugin for Recording {
        fn info(&self) -> &PluginInfo {
            &self.info
        }

        fn options(&self) -> &[OptionSpec] {
            &[]
        }

        fn create(&self, _ctx: &mut ConnectionContext) -> Option<PluginState> {
            self.journal
                .events
                .lock()
                .push(format!("create {}", self.info.name));
            Some(Box::new(self.info.name.clone()))
        }

        fn delete(&self, _ctx: &mut ConnectionContext, state: Option<PluginState>) {
            let state = state
                .and_then(|s| s.downcast::<String>().ok())
                .map(|s| *s)
                .unwrap_or_default();
            self.journal.events.lock().push(format!("delete {state}"));
        }
    }

    struct Stateless {
        info: PluginInfo,
    }

    impl Plugin for Stateless {
        fn info(&self) -> &PluginInfo {
            &self.info
        }

        fn options(&self) -> &[OptionSpec] {
            &[]
        }
    }

    fn register(registry: &mut PluginRegistry, plugin: Box<dyn Plugin>) -> Arc<RegisteredPlugin> {
        match registry.register(plugin, PluginSource::Builtin).unwrap() {
            Registration::Added(entry) => entry,
            Registration::Duplicate => panic!("unexpected duplicate"),
        }
    }

    fn recording(name: &str, journal: &Arc<Journal>) -> Box<dyn Plugin> {
        Box::new(Recording {
            info: PluginInfo::new(name, "1"),
            journal: Arc::clone(journal),
        })
    }

    #[test]
    fn test_delete_all_runs_in_creation_order() {
        let journal = Arc::new(Journal::default());
        let mut registry = PluginRegistry::new();
        let first = register(&mut registry, recording("first", &journal));
        let second = register(&mut registry, recording("second", &journal));

        let mut conn = Connection::new();
        let (ctx, instances) = conn.split_mut();
        instances.create(ctx, &second).unwrap();
        instances.create(ctx, &first).unwrap();
        assert_eq!(conn.instances().len(), 2);

        conn.delete_all_instances();
        assert!(conn.instances().is_empty());
        assert_eq!(
            *journal.events.lock(),
            vec![
                "create second",
                "create first",
                "delete second",
                "delete first"
            ]
        );

        conn.delete_all_instances();
        assert_eq!(journal.events.lock().len(), 4);
    }

    #[test]
    fn test_find_uses_entry_identity() {
        let journal = Arc::new(Journal::default());
        let mut registry = PluginRegistry::new();
        let entry = register(&mut registry, recording("p", &journal));

        let mut other_registry = PluginRegistry::new();
        let lookalike = register(&mut other_registry, recording("p", &journal));

        let mut conn = Connection::new();
        let (ctx, instances) = conn.split_mut();
        instances.create(ctx, &entry).unwrap();

        assert!(conn.instances().find(&entry).is_some());
        assert!(conn.instances().find(&lookalike).is_none());
    }

    #[test]
    fn test_get_or_create_reuses_instance() {
        let journal = Arc::new(Journal::default());
        let mut registry = PluginRegistry::new();
        let entry = register(&mut registry, recording("p", &journal));

        let mut conn = Connection::new();
        let (ctx, instances) = conn.split_mut();
        instances.get_or_create(ctx, &entry).unwrap();
        instances.get_or_create(ctx, &entry).unwrap();

        assert_eq!(conn.instances().len(), 1);
        assert_eq!(journal.events.lock().as_slice(), ["create p"]);
    }

    #[test]
    fn test_missing_create_hook_means_no_state() {
        let mut registry = PluginRegistry::new();
        let entry = register(
            &mut registry,
            Box::new(Stateless {
                info: PluginInfo::new("bare", "1"),
            }),
        );

        let mut conn = Connection::new();
        let (ctx, instances) = conn.split_mut();
        let instance = instances.create(ctx, &entry).unwrap();
        assert!(instance.state().is_none());

        conn.delete_all_instances();
        assert!(conn.instances().is_empty());
    }

    #[test]
    fn test_drop_tears_down_instances() {
        let journal = Arc::new(Journal::default());
        let mut registry = PluginRegistry::new();
        let entry = register(&mut registry, recording("p", &journal));

        {
            let mut conn = Connection::new();
            let (ctx, instances) = conn.split_mut();
            instances.create(ctx, &entry).unwrap();
        }

        assert_eq!(journal.events.lock().as_slice(), ["create p", "delete p"]);
    }
}
