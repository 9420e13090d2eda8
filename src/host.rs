// src/host.rs

use std::{
    any::Any,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    path::{Path, PathBuf},
    sync::Arc,
};

use dashmap::DashMap;
use launcher_plugin::{Command, Outbox, PluginFactory, PluginUtils};
use tracing::{debug, error, info, warn};

use crate::{
    focus::FocusState,
    manifest::PluginManifest,
    registry::{PluginRecord, PluginRegistry, RegistryError},
};

/// Owns the plugins, the focus slot and the way out to the UI.
///
/// Nothing here is global: tests and embedders can run as many hosts as
/// they like side by side.
pub struct PluginHost {
    registry: PluginRegistry,
    focus: FocusState,
    factories: DashMap<String, PluginFactory>,
    outbox: Outbox,
    utils: PluginUtils,
}

impl PluginHost {
    pub fn new(outbox: Outbox) -> Arc<Self> {
        Arc::new(Self {
            registry: PluginRegistry::new(),
            focus: FocusState::new(),
            factories: DashMap::new(),
            utils: PluginUtils::detached(outbox.clone()),
            outbox,
        })
    }

    pub fn outbox(&self) -> Outbox {
        self.outbox.clone()
    }

    pub fn focus(&self) -> &FocusState {
        &self.focus
    }

    /// Make a plugin implementation available to manifests naming `name`.
    pub fn register_factory(&self, name: impl Into<String>, factory: PluginFactory) {
        let name = name.into();
        debug!(plugin = %name, "factory registered");
        self.factories.insert(name, factory);
    }

    /// Register the plugin described by the manifest at `config_path`.
    ///
    /// On failure the user gets a toast and the caller gets the same message.
    pub fn add_plugin(&self, config_path: impl AsRef<Path>) -> Result<(), RegistryError> {
        let path = config_path.as_ref();
        let result = PluginManifest::load(path).and_then(|manifest| {
            let command = self.admit(&manifest)?;
            let factory = self
                .factories
                .get(&command.id)
                .map(|f| f.value().clone())
                .ok_or_else(|| RegistryError::UnknownFactory(command.id.clone()))?;
            self.install(command, factory, Some(path.to_path_buf()))
        });
        self.report(result)
    }

    /// Register a plugin without a manifest file.
    pub fn add_plugin_with(
        &self,
        manifest: PluginManifest,
        factory: PluginFactory,
    ) -> Result<(), RegistryError> {
        let result = self
            .admit(&manifest)
            .and_then(|command| self.install(command, factory, None));
        self.report(result)
    }

    /// Remove `name`. Returns false, and broadcasts nothing, if it wasn't there.
    pub fn remove_plugin(&self, name: &str) -> bool {
        let Some(record) = self.registry.remove(name) else {
            debug!(plugin = %name, "remove: not registered");
            return false;
        };
        if self.focus.clear_if(name) {
            info!(plugin = %name, "focused plugin removed, focus cleared");
        }
        info!(plugin = %name, path = ?record.path, "plugin removed");
        self.broadcast_commands();
        true
    }

    pub fn get_plugin(&self, name: &str) -> Option<PluginRecord> {
        self.registry.get(name)
    }

    pub fn get_plugins(&self) -> Vec<PluginRecord> {
        self.registry.all()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.registry.commands()
    }

    // 1) validate, 2) reject duplicates before anything gets constructed
    fn admit(&self, manifest: &PluginManifest) -> Result<Command, RegistryError> {
        let command = manifest.validate()?;
        if self.registry.contains(&command.id) {
            return Err(RegistryError::Duplicate(command.id));
        }
        Ok(command)
    }

    fn install(
        &self,
        command: Command,
        factory: PluginFactory,
        path: Option<PathBuf>,
    ) -> Result<(), RegistryError> {
        let name = command.id.clone();
        let utils = PluginUtils::new(command.clone(), self.outbox.clone());
        let (plugin, handlers) = catch_unwind(AssertUnwindSafe(|| {
            let plugin = factory(utils);
            let handlers = plugin.methods();
            (plugin, handlers)
        }))
        .map_err(|panic| {
            error!(plugin = %name, "plugin panicked while being created");
            RegistryError::PluginInit { name: name.clone(), reason: panic_message(panic.as_ref()) }
        })?;
        let handler_count = handlers.len();

        self.registry.insert(command, plugin, handlers, path)?;
        info!(plugin = %name, handlers = handler_count, "plugin added");
        self.broadcast_commands();
        Ok(())
    }

    fn report(&self, result: Result<(), RegistryError>) -> Result<(), RegistryError> {
        if let Err(err) = &result {
            warn!(error = %err, "could not add plugin");
            self.utils.toast(err.to_string());
        }
        result
    }

    fn broadcast_commands(&self) {
        self.utils.update_commands(&self.registry.commands());
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginHost")
            .field("registry", &self.registry)
            .field("focus", &self.focus.current())
            .finish()
    }
}
