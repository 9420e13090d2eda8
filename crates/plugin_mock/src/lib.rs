// plugin_mock/src/lib.rs
use std::sync::Arc;

use async_trait::async_trait;
use launcher_plugin::{
    Command, EventHandlers, LauncherPlugin, PluginError, PluginFactory, PluginUtils,
};
use serde_json::{Value, json};
use tracing::info;

pub const NAME: &str = "echo";

/// Upper bound on how many copies `repeat` will produce.
pub const MAX_REPEAT: usize = 50;

/// The command the echo plugin registers under.
pub fn command() -> Command {
    Command {
        id: NAME.into(),
        title: "Echo".into(),
        subtitle: "Repeat what you type".into(),
        description: "Demo plugin: every keyword comes back as a result".into(),
        icon: "echo.png".into(),
        mode: "list".into(),
        keywords: vec!["echo".into(), "say".into()],
    }
}

pub fn factory() -> PluginFactory {
    Arc::new(|utils: PluginUtils| Arc::new(EchoPlugin::new(utils)) as Arc<dyn LauncherPlugin>)
}

/// Turns every keyword into a result; tapping one "copies" it.
pub struct EchoPlugin {
    utils: PluginUtils,
}

impl EchoPlugin {
    pub fn new(utils: PluginUtils) -> Self {
        Self { utils }
    }

    fn results_for(keyword: &str, times: usize) -> Vec<Value> {
        if keyword.is_empty() {
            return vec![];
        }
        (0..times.max(1))
            .map(|i| {
                json!({
                    "id": format!("{NAME}-{i}"),
                    "title": keyword,
                    "subtitle": "tap to copy",
                })
            })
            .collect()
    }
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[async_trait]
impl LauncherPlugin for EchoPlugin {
    async fn on_search(&self, keyword: &str) -> Result<Vec<Value>, PluginError> {
        Ok(Self::results_for(keyword, 1))
    }

    async fn on_result_selected(&self, result: Value) -> Result<Option<String>, PluginError> {
        Ok(result
            .get("title")
            .and_then(Value::as_str)
            .map(|title| format!("<pre>{}</pre>", escape_html(title))))
    }

    async fn on_enter(&self, command: &Command) -> Result<(), PluginError> {
        info!(plugin = %command.id, "echo entered");
        self.utils.show_app();
        Ok(())
    }

    async fn on_result_tap(&self, result: Value) -> Result<(), PluginError> {
        let title = result
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| PluginError::Other("result has no title".into()))?;
        self.utils.toast(format!("copied: {title}"));
        self.utils.hide_app();
        Ok(())
    }

    fn methods(&self) -> EventHandlers {
        let clear = self.utils.clone();
        let repeat = self.utils.clone();
        EventHandlers::new()
            .with("clear", move |_data: Value| {
                let clear = clear.clone();
                async move {
                    clear.update_results(vec![]);
                    clear.update_preview(None);
                    Ok(())
                }
            })
            .with("repeat", move |data: Value| {
                let repeat = repeat.clone();
                async move {
                    let text = data.get("text").and_then(Value::as_str).unwrap_or_default();
                    let times = data
                        .get("times")
                        .and_then(Value::as_u64)
                        .map_or(2, |n| n.min(MAX_REPEAT as u64) as usize);
                    repeat.update_results(EchoPlugin::results_for(text, times));
                    Ok(())
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launcher_plugin::{message::{TOAST, HIDE_APP, UPDATE_RESULTS}, outbox};

    #[tokio::test]
    async fn search_echoes_keyword() {
        let (tx, _rx) = outbox();
        let plugin = EchoPlugin::new(PluginUtils::new(command(), tx));

        let results = plugin.on_search("hello").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["title"], "hello");
        assert!(plugin.on_search("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn preview_is_escaped() {
        let (tx, _rx) = outbox();
        let plugin = EchoPlugin::new(PluginUtils::new(command(), tx));
        let html = plugin.on_result_selected(json!({ "title": "<b>" })).await.unwrap();
        assert_eq!(html.as_deref(), Some("<pre>&lt;b&gt;</pre>"));
        assert_eq!(plugin.on_result_selected(json!({})).await.unwrap(), None);
    }

    #[tokio::test]
    async fn tap_toasts_then_hides() {
        let (tx, mut rx) = outbox();
        let plugin = EchoPlugin::new(PluginUtils::new(command(), tx));
        plugin.on_result_tap(json!({ "title": "hi" })).await.unwrap();

        let toast = rx.recv().await.unwrap();
        assert_eq!(toast.event_name(), Some(TOAST));
        assert_eq!(toast.payload["content"], "copied: hi");
        assert_eq!(rx.recv().await.unwrap().event_name(), Some(HIDE_APP));
    }

    #[tokio::test]
    async fn repeat_handler_updates_results() {
        let (tx, mut rx) = outbox();
        let plugin = EchoPlugin::new(PluginUtils::new(command(), tx));
        let handler = plugin.methods().get("repeat").unwrap();
        handler(json!({ "text": "yo", "times": 3 })).await.unwrap();

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.event_name(), Some(UPDATE_RESULTS));
        assert_eq!(ev.payload["results"].as_array().unwrap().len(), 3);
        assert_eq!(ev.payload["command"]["id"], NAME);
    }

    #[tokio::test]
    async fn repeat_count_is_capped() {
        let (tx, mut rx) = outbox();
        let plugin = EchoPlugin::new(PluginUtils::new(command(), tx));
        let handler = plugin.methods().get("repeat").unwrap();
        handler(json!({ "text": "yo", "times": u64::MAX })).await.unwrap();

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.payload["results"].as_array().unwrap().len(), MAX_REPEAT);
    }
}
