use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    command::Command,
    plugin::{EventHandlers, LauncherPlugin, PluginError, PluginFactory},
    utils::PluginUtils,
};

/// One recorded plugin call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Search(String),
    ResultSelected(Value),
    Enter(String),
    Exit(String),
    ResultTap(Value),
    Event(String, Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Behaviour {
    #[default]
    Normal,
    Fail,
    Panic,
    Stall(Duration),
}

/// A plugin that records what it was asked to do.
pub struct RecordingPlugin {
    calls: Arc<Mutex<Vec<Call>>>,
    results: Vec<Value>,
    preview: Option<String>,
    handler_names: Vec<String>,
    behaviour: Behaviour,
    toast_on_tap: bool,
    utils: Mutex<Option<PluginUtils>>,
}

impl Default for RecordingPlugin {
    fn default() -> Self {
        Self {
            calls: Arc::new(Mutex::new(vec![])),
            results: vec![],
            preview: None,
            handler_names: vec![],
            behaviour: Behaviour::Normal,
            toast_on_tap: false,
            utils: Mutex::new(None),
        }
    }
}

impl RecordingPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(mut self, results: Vec<Value>) -> Self {
        self.results = results;
        self
    }

    pub fn with_preview(mut self, html: &str) -> Self {
        self.preview = Some(html.to_string());
        self
    }

    pub fn with_handler(mut self, name: &str) -> Self {
        self.handler_names.push(name.to_string());
        self
    }

    pub fn with_behaviour(mut self, behaviour: Behaviour) -> Self {
        self.behaviour = behaviour;
        self
    }

    /// Send a toast through the bridge whenever a result is tapped.
    pub fn toasting_on_tap(mut self) -> Self {
        self.toast_on_tap = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// A factory handing out this very instance, so the test keeps a handle.
    pub fn factory(plugin: Arc<RecordingPlugin>) -> PluginFactory {
        Arc::new(move |utils: PluginUtils| {
            *plugin.utils.lock().unwrap() = Some(utils);
            plugin.clone() as Arc<dyn LauncherPlugin>
        })
    }

    async fn act(&self, call: Call) -> Result<(), PluginError> {
        self.calls.lock().unwrap().push(call);
        match self.behaviour {
            Behaviour::Normal => Ok(()),
            Behaviour::Fail => Err(PluginError::Other("recording plugin asked to fail".into())),
            Behaviour::Panic => panic!("recording plugin asked to panic"),
            Behaviour::Stall(d) => {
                tokio::time::sleep(d).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl LauncherPlugin for RecordingPlugin {
    async fn on_search(&self, keyword: &str) -> Result<Vec<Value>, PluginError> {
        self.act(Call::Search(keyword.to_string())).await?;
        Ok(self.results.clone())
    }

    async fn on_result_selected(&self, result: Value) -> Result<Option<String>, PluginError> {
        self.act(Call::ResultSelected(result)).await?;
        Ok(self.preview.clone())
    }

    async fn on_enter(&self, command: &Command) -> Result<(), PluginError> {
        self.act(Call::Enter(command.id.clone())).await
    }

    async fn on_exit(&self, command: &Command) -> Result<(), PluginError> {
        self.act(Call::Exit(command.id.clone())).await
    }

    async fn on_result_tap(&self, result: Value) -> Result<(), PluginError> {
        self.act(Call::ResultTap(result)).await?;
        if self.toast_on_tap {
            if let Some(utils) = self.utils.lock().unwrap().as_ref() {
                utils.toast("tapped");
            }
        }
        Ok(())
    }

    fn methods(&self) -> EventHandlers {
        let mut handlers = EventHandlers::new();
        for name in &self.handler_names {
            let calls = self.calls.clone();
            let event = name.clone();
            handlers.register(name.clone(), move |data: Value| {
                calls.lock().unwrap().push(Call::Event(event.clone(), data));
                async { Ok(()) }
            });
        }
        handlers
    }
}
