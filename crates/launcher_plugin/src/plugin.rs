use std::{collections::HashMap, fmt, future::Future, sync::Arc};

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

use crate::{command::Command, utils::PluginUtils};

/// All errors a plugin operation can return.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PluginError {
    /// Something went wrong encoding or decoding JSON.
    #[error("JSON error: {0}")]
    Json(String),

    /// The plugin does not provide this operation.
    #[error("operation `{0}` is not implemented")]
    NotImplemented(&'static str),

    /// A timeout occurred.
    #[error("operation timed out after {0} ms")]
    Timeout(u64),

    /// The plugin returned an unspecified failure.
    #[error("plugin error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for PluginError {
    fn from(err: serde_json::Error) -> PluginError {
        PluginError::Json(err.to_string())
    }
}

impl From<anyhow::Error> for PluginError {
    fn from(err: anyhow::Error) -> PluginError {
        PluginError::Other(err.to_string())
    }
}

// -----------------------------------------------------------------------------
// Named event handlers
// -----------------------------------------------------------------------------

pub type HandlerFuture = BoxFuture<'static, Result<(), PluginError>>;
pub type EventHandler = Arc<dyn Fn(Value) -> HandlerFuture + Send + Sync>;

/// Event name → handler, filled in once when the plugin is created.
#[derive(Clone, Default)]
pub struct EventHandlers {
    handlers: HashMap<String, EventHandler>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), PluginError>> + Send + 'static,
    {
        let handler: EventHandler = Arc::new(move |data| -> HandlerFuture { Box::pin(handler(data)) });
        self.handlers.insert(name.into(), handler);
        self
    }

    /// Builder flavour of [`register`](Self::register).
    pub fn with<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), PluginError>> + Send + 'static,
    {
        self.register(name, handler);
        self
    }

    pub fn get(&self, name: &str) -> Option<EventHandler> {
        self.handlers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("names", &self.names())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// The plugin contract
// -----------------------------------------------------------------------------

/// What the router can ask of a plugin.
///
/// Every operation is optional. The defaults answer
/// [`PluginError::NotImplemented`], which the host treats as a no-op.
#[async_trait]
pub trait LauncherPlugin: Send + Sync {
    /// Produce result items for `keyword`.
    async fn on_search(&self, _keyword: &str) -> Result<Vec<Value>, PluginError> {
        Err(PluginError::NotImplemented("onSearch"))
    }

    /// Preview HTML for the highlighted result, or `None` for no preview.
    async fn on_result_selected(&self, _result: Value) -> Result<Option<String>, PluginError> {
        Err(PluginError::NotImplemented("onResultSelected"))
    }

    async fn on_enter(&self, _command: &Command) -> Result<(), PluginError> {
        Err(PluginError::NotImplemented("onEnter"))
    }

    async fn on_exit(&self, _command: &Command) -> Result<(), PluginError> {
        Err(PluginError::NotImplemented("onExit"))
    }

    async fn on_result_tap(&self, _result: Value) -> Result<(), PluginError> {
        Err(PluginError::NotImplemented("onResultTap"))
    }

    /// Handlers for generic `event` intents. Called once, at registration.
    fn methods(&self) -> EventHandlers {
        EventHandlers::default()
    }
}

/// Builds a plugin instance around its utility bridge.
pub type PluginFactory = Arc<dyn Fn(PluginUtils) -> Arc<dyn LauncherPlugin> + Send + Sync>;
