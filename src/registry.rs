// src/registry.rs

use std::{
    fmt,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::{DashMap, mapref::entry::Entry};
use launcher_plugin::{Command, EventHandlers, LauncherPlugin};
use thiserror::Error;

/// Why a plugin could not be registered. `Display` is the text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("file {0} does not exist")]
    ManifestNotFound(String),

    #[error("could not read manifest {path}: {reason}")]
    ManifestRead { path: String, reason: String },

    #[error("invalid manifest {path}: {reason}")]
    ManifestParse { path: String, reason: String },

    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("plugin {0} already exists")]
    Duplicate(String),

    #[error("no plugin factory registered for {0}")]
    UnknownFactory(String),

    #[error("plugin {name} failed to start: {reason}")]
    PluginInit { name: String, reason: String },
}

/// A registered plugin: its command, its implementation and where it came from.
#[derive(Clone)]
pub struct PluginRecord {
    pub command: Command,
    pub plugin: Arc<dyn LauncherPlugin>,
    pub handlers: EventHandlers,
    pub path: Option<PathBuf>,
    seq: u64,
}

impl PluginRecord {
    pub fn name(&self) -> &str {
        &self.command.id
    }
}

impl fmt::Debug for PluginRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRecord")
            .field("name", &self.command.id)
            .field("path", &self.path)
            .field("handlers", &self.handlers)
            .finish()
    }
}

/// Name → record. Listing follows registration order.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: DashMap<String, PluginRecord>,
    next_seq: AtomicU64,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &self,
        command: Command,
        plugin: Arc<dyn LauncherPlugin>,
        handlers: EventHandlers,
        path: Option<PathBuf>,
    ) -> Result<(), RegistryError> {
        match self.plugins.entry(command.id.clone()) {
            Entry::Occupied(_) => Err(RegistryError::Duplicate(command.id)),
            Entry::Vacant(slot) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                slot.insert(PluginRecord { command, plugin, handlers, path, seq });
                Ok(())
            }
        }
    }

    pub fn remove(&self, name: &str) -> Option<PluginRecord> {
        self.plugins.remove(name).map(|(_, record)| record)
    }

    pub fn get(&self, name: &str) -> Option<PluginRecord> {
        self.plugins.get(name).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn all(&self) -> Vec<PluginRecord> {
        let mut records: Vec<PluginRecord> = self
            .plugins
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|r| r.seq);
        records
    }

    pub fn commands(&self) -> Vec<Command> {
        self.all().into_iter().map(|r| r.command).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.commands().into_iter().map(|c| c.id).collect();
        f.debug_struct("PluginRegistry").field("plugins", &names).finish()
    }
}
