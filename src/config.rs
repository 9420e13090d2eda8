use std::{env, fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const ADDRESS_KEY: &str = "LAUNCHER_ADDRESS";
pub const PORT_KEY: &str = "LAUNCHER_PORT";
pub const PLUGIN_TIMEOUT_KEY: &str = "LAUNCHER_PLUGIN_TIMEOUT_MS";
pub const PLUGINS_KEY: &str = "LAUNCHER_PLUGINS";

#[async_trait::async_trait]
#[typetag::serde]
pub trait ConfigManagerType: Send + Sync {
    async fn keys(&self) -> Vec<String>;
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: &str) -> Result<(), String>;
    fn clone_box(&self) -> Box<dyn ConfigManagerType>;
    fn debug_box(&self) -> String;
}

#[derive(Serialize, Deserialize)]
pub struct ConfigManager(pub Box<dyn ConfigManagerType>);

impl Clone for ConfigManager {
    fn clone(&self) -> Self {
        ConfigManager(self.0.clone_box())
    }
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.debug_box())
    }
}

/// Process environment, seeded from a `.env` file when one exists.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvConfigManager {
    env_file: PathBuf,
}

impl EnvConfigManager {
    pub fn new(env_file: PathBuf) -> Box<Self> {
        if env_file.exists() {
            dotenvy::from_path(env_file.clone()).ok();
            info!("Loaded .env from {}", env_file.display());
        } else {
            warn!("no .env at {}, using the process environment", env_file.display())
        }

        Box::new(Self { env_file })
    }
}

#[typetag::serde]
#[async_trait]
impl ConfigManagerType for EnvConfigManager {
    async fn keys(&self) -> Vec<String> {
        env::vars().map(|(k, _)| k).collect()
    }

    async fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }

    /// Sets the variable for this process and persists it to the `.env` file.
    async fn set(&self, key: &str, value: &str) -> Result<(), String> {
        unsafe {
            env::set_var(key, value);
        };
        let content = fs::read_to_string(&self.env_file).unwrap_or_default();
        let mut found = false;
        let mut lines: Vec<String> = content
            .lines()
            .map(|line| match line.split_once('=') {
                Some((k, _)) if k.trim() == key => {
                    found = true;
                    format!("{key}={value}")
                }
                _ => line.to_string(),
            })
            .collect();

        if !found {
            lines.push(format!("{key}={value}"));
        }

        fs::write(&self.env_file, lines.join("\n")).map_err(|e| e.to_string())
    }

    fn clone_box(&self) -> Box<dyn ConfigManagerType> {
        Box::new(self.clone())
    }

    fn debug_box(&self) -> String {
        "EnvConfigManager".to_string()
    }
}

/// In-memory config, handy for tests and embedding.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct MapConfigManager {
    #[schemars(with = "std::collections::HashMap<String, String>")]
    map: DashMap<String, String>,
}

impl MapConfigManager {
    pub fn new() -> Box<Self> {
        Box::new(Self::default())
    }
}

#[typetag::serde]
#[async_trait]
impl ConfigManagerType for MapConfigManager {
    async fn keys(&self) -> Vec<String> {
        self.map.iter().map(|entry| entry.key().clone()).collect()
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).map(|v| v.clone())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), String> {
        self.map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn ConfigManagerType> {
        Box::new(self.clone())
    }

    fn debug_box(&self) -> String {
        format!("MapConfigManager({} entries)", self.map.len())
    }
}

// -----------------------------------------------------------------------------
// Host settings
// -----------------------------------------------------------------------------

/// Everything the host needs to start, resolved from a [`ConfigManager`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HostSettings {
    pub address: String,
    pub port: u16,
    /// Per plugin call; `0` waits forever.
    pub plugin_timeout_ms: u64,
    /// Manifests to load at startup, relative to the root dir.
    pub plugins: Vec<PathBuf>,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".into(),
            port: 8888,
            plugin_timeout_ms: 5_000,
            plugins: vec![],
        }
    }
}

impl HostSettings {
    pub async fn load(config: &ConfigManager) -> Result<Self> {
        let mut settings = HostSettings::default();

        if let Some(address) = config.0.get(ADDRESS_KEY).await {
            settings.address = address;
        }
        if let Some(port) = config.0.get(PORT_KEY).await {
            settings.port = port
                .trim()
                .parse()
                .with_context(|| format!("{PORT_KEY} must be a port number, got `{port}`"))?;
        }
        if let Some(timeout) = config.0.get(PLUGIN_TIMEOUT_KEY).await {
            settings.plugin_timeout_ms = timeout
                .trim()
                .parse()
                .with_context(|| format!("{PLUGIN_TIMEOUT_KEY} must be milliseconds, got `{timeout}`"))?;
        }
        if let Some(plugins) = config.0.get(PLUGINS_KEY).await {
            settings.plugins = plugins
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .collect();
        }

        Ok(settings)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn plugin_timeout(&self) -> Option<Duration> {
        match self.plugin_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}
