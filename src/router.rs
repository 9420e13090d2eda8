// src/router.rs

use std::{
    future::Future,
    panic::AssertUnwindSafe,
    sync::Arc,
    time::{Duration, Instant},
};

use futures::FutureExt;
use launcher_plugin::{Envelope, Intent, Outbox, PluginError};
use serde_json::{Value, json};
use tracing::{Level, debug, error, warn};

use crate::{
    host::{PluginHost, panic_message},
    registry::PluginRecord,
};

/// How a single plugin call ended.
enum Call<T> {
    Done(T),
    /// The plugin doesn't provide the operation.
    Absent,
    Failed,
}

impl<T> Call<T> {
    fn ok(self) -> Option<T> {
        match self {
            Call::Done(v) => Some(v),
            _ => None,
        }
    }

    fn failed(&self) -> bool {
        matches!(self, Call::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    Degraded,
}

impl Status {
    fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Degraded => "degraded",
        }
    }

    fn from_failed(failed: bool) -> Self {
        if failed { Status::Degraded } else { Status::Ok }
    }
}

/// Turns inbound envelopes into plugin calls and answers every request once.
pub struct Router {
    host: Arc<PluginHost>,
    outbox: Outbox,
    timeout: Option<Duration>,
}

impl Router {
    pub fn new(host: Arc<PluginHost>, timeout: Option<Duration>) -> Self {
        let outbox = host.outbox();
        Self { host, outbox, timeout }
    }

    pub fn host(&self) -> &Arc<PluginHost> {
        &self.host
    }

    /// Handle one inbound envelope to completion, reply included.
    pub async fn dispatch(&self, env: Envelope) {
        let Some(intent) = Intent::from_envelope(&env) else {
            debug!(id = %env.id, "callback from UI ignored");
            return;
        };

        let name = intent.name().to_string();
        let started = Instant::now();
        debug!(intent = %name, id = %env.id, "dispatching");

        let (payload, status) = self.handle(intent).await;
        if self.outbox.send(env.reply(payload)).is_err() {
            warn!(intent = %name, "outbox closed, reply dropped");
        }

        tracing::event!(
            target: "request",
            Level::INFO,
            intent = %name,
            latency_ms = started.elapsed().as_secs_f64() * 1_000.0,
            status = status.as_str(),
        );
    }

    async fn handle(&self, intent: Intent) -> (Value, Status) {
        match intent {
            Intent::GetCommands => (json!({ "commands": self.host.commands() }), Status::Ok),

            Intent::Search { keyword, command } => {
                let Some(record) = self.resolve(command.as_deref(), "onSearch") else {
                    return (json!({ "results": [] }), Status::Degraded);
                };
                let call = self
                    .call(record.name(), "onSearch", || record.plugin.on_search(&keyword))
                    .await;
                let status = Status::from_failed(call.failed());
                (json!({ "results": call.ok().unwrap_or_default() }), status)
            }

            Intent::ResultSelected { result, command } => {
                let record = match command.as_deref() {
                    Some(id) => self.resolve(Some(id), "onResultSelected"),
                    None => self.focused("onResultSelected"),
                };
                let Some(record) = record else {
                    return (json!({ "html": null }), Status::Degraded);
                };
                let call = self
                    .call(record.name(), "onResultSelected", || record.plugin.on_result_selected(result))
                    .await;
                let status = Status::from_failed(call.failed());
                (json!({ "html": call.ok().flatten() }), status)
            }

            Intent::Enter { command } => {
                let Some(record) = self.resolve(command.as_deref(), "onEnter") else {
                    return (json!({}), Status::Degraded);
                };
                self.host.focus().set(record.name());
                let call = self
                    .call(record.name(), "onEnter", || record.plugin.on_enter(&record.command))
                    .await;
                (json!({}), Status::from_failed(call.failed()))
            }

            Intent::ResultTap { result, command } => {
                let Some(record) = self.focused("onResultTap") else {
                    return (json!({}), Status::Degraded);
                };
                if let Some(id) = command.as_deref().filter(|id| *id != record.name()) {
                    debug!(focused = %record.name(), sent = %id, "onResultTap names another command, using focus");
                }
                let call = self
                    .call(record.name(), "onResultTap", || record.plugin.on_result_tap(result))
                    .await;
                (json!({}), Status::from_failed(call.failed()))
            }

            Intent::Exit { .. } => {
                let Some(record) = self.focused("onExit") else {
                    return (json!({}), Status::Degraded);
                };
                let call = self
                    .call(record.name(), "onExit", || record.plugin.on_exit(&record.command))
                    .await;
                self.host.focus().clear_if(record.name());
                (json!({}), Status::from_failed(call.failed()))
            }

            Intent::Event { handler_name, data } => {
                let Some(record) = self.focused("event") else {
                    return (json!({}), Status::Degraded);
                };
                let Some(handler_name) = handler_name else {
                    warn!(plugin = %record.name(), "event without handlerName");
                    return (json!({}), Status::Degraded);
                };
                let Some(handler) = record.handlers.get(&handler_name) else {
                    warn!(plugin = %record.name(), handler = %handler_name, "plugin has no such event handler");
                    return (json!({}), Status::Degraded);
                };
                let call = self.call(record.name(), &handler_name, move || handler(data)).await;
                (json!({}), Status::from_failed(call.failed()))
            }

            Intent::Unknown(raw) => {
                warn!(intent = %raw, "unknown intent");
                (json!({}), Status::Degraded)
            }
        }
    }

    /// Look up the plugin a request names by `command.id`.
    fn resolve(&self, id: Option<&str>, intent: &str) -> Option<PluginRecord> {
        let Some(id) = id else {
            warn!(intent, "request carries no command id");
            return None;
        };
        let record = self.host.get_plugin(id);
        if record.is_none() {
            warn!(intent, plugin = %id, "plugin not found");
        }
        record
    }

    /// The focused plugin, if there is one and it is still registered.
    fn focused(&self, intent: &str) -> Option<PluginRecord> {
        let Some(name) = self.host.focus().current() else {
            warn!(intent, "no plugin has focus");
            return None;
        };
        let record = self.host.get_plugin(&name);
        if record.is_none() {
            warn!(intent, plugin = %name, "focused plugin is gone");
            self.host.focus().clear_if(&name);
        }
        record
    }

    /// Run one plugin operation so that nothing it does can take the host
    /// down or hold a reply back past the timeout.
    ///
    /// `invoke` only runs inside the guarded future, so plugin code that
    /// executes before its own future is built is covered too.
    async fn call<T, F, Fut>(&self, plugin: &str, op: &str, invoke: F) -> Call<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, PluginError>>,
    {
        let guarded = AssertUnwindSafe(async move { invoke().await }).catch_unwind();
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let err = PluginError::Timeout(limit.as_millis() as u64);
                    warn!(plugin, op, error = %err, "plugin call abandoned");
                    return Call::Failed;
                }
            },
            None => guarded.await,
        };

        match outcome {
            Ok(Ok(value)) => Call::Done(value),
            Ok(Err(PluginError::NotImplemented(_))) => {
                debug!(plugin, op, "operation not implemented");
                Call::Absent
            }
            Ok(Err(err)) => {
                warn!(plugin, op, error = %err, "plugin call failed");
                Call::Failed
            }
            Err(panic) => {
                error!(plugin, op, reason = %panic_message(panic.as_ref()), "plugin panicked");
                Call::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::PluginManifest;
    use launcher_plugin::{
        IntentKind, MessageKind, OutboxReceiver, outbox,
        plugin_test_util::{Behaviour, Call as Recorded, RecordingPlugin},
    };

    fn manifest(name: &str) -> PluginManifest {
        PluginManifest {
            name: Some(name.into()),
            title: Some(name.into()),
            icon: Some("icon.png".into()),
            mode: Some("list".into()),
            keywords: vec![name.into()],
            ..Default::default()
        }
    }

    fn setup(plugin: RecordingPlugin, timeout: Option<Duration>) -> (Router, Arc<RecordingPlugin>, OutboxReceiver) {
        let (tx, mut rx) = outbox();
        let host = PluginHost::new(tx);
        let plugin = Arc::new(plugin);
        host.add_plugin_with(manifest("qrcode"), RecordingPlugin::factory(plugin.clone()))
            .unwrap();
        while rx.try_recv().is_ok() {}
        (Router::new(host, timeout), plugin, rx)
    }

    fn request(kind: IntentKind, payload: Value) -> Envelope {
        Envelope::request(MessageKind::Intent(kind), payload)
    }

    #[tokio::test]
    async fn search_routes_by_command_id_without_touching_focus() {
        let (router, plugin, mut rx) = setup(
            RecordingPlugin::new().with_results(vec![json!({ "title": "hit" })]),
            None,
        );
        let req = request(IntentKind::OnSearch, json!({ "keyword": "qr", "command": { "id": "qrcode" } }));
        router.dispatch(req.clone()).await;

        let reply = rx.recv().await.unwrap();
        assert!(reply.is_reply_to(&req));
        assert_eq!(reply.payload["results"][0]["title"], "hit");
        assert_eq!(plugin.calls(), vec![Recorded::Search("qr".into())]);
        assert_eq!(router.host().focus().current(), None);
    }

    #[tokio::test]
    async fn failing_plugin_still_gets_a_reply() {
        let (router, _plugin, mut rx) = setup(RecordingPlugin::new().with_behaviour(Behaviour::Fail), None);
        let req = request(IntentKind::OnSearch, json!({ "keyword": "x", "command": { "id": "qrcode" } }));
        router.dispatch(req.clone()).await;

        let reply = rx.recv().await.unwrap();
        assert!(reply.is_reply_to(&req));
        assert_eq!(reply.payload["results"], json!([]));
    }

    #[tokio::test]
    async fn panicking_plugin_is_contained() {
        let (router, _plugin, mut rx) = setup(RecordingPlugin::new().with_behaviour(Behaviour::Panic), None);
        let req = request(IntentKind::OnResultSelected, json!({ "result": {}, "command": { "id": "qrcode" } }));
        router.dispatch(req.clone()).await;

        let reply = rx.recv().await.unwrap();
        assert!(reply.is_reply_to(&req));
        assert_eq!(reply.payload["html"], Value::Null);
    }

    #[tokio::test]
    async fn stalled_plugin_times_out() {
        let (router, _plugin, mut rx) = setup(
            RecordingPlugin::new().with_behaviour(Behaviour::Stall(Duration::from_secs(30))),
            Some(Duration::from_millis(50)),
        );
        let req = request(IntentKind::OnEnter, json!({ "command": { "id": "qrcode" } }));
        let started = Instant::now();
        router.dispatch(req.clone()).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(rx.recv().await.unwrap().is_reply_to(&req));
        assert_eq!(router.host().focus().current().as_deref(), Some("qrcode"));
    }

    #[tokio::test]
    async fn unknown_intent_and_callbacks() {
        let (router, _plugin, mut rx) = setup(RecordingPlugin::new(), None);

        let unknown = Envelope::request(MessageKind::Other("onDance".into()), json!({}));
        router.dispatch(unknown.clone()).await;
        let reply = rx.recv().await.unwrap();
        assert!(reply.is_reply_to(&unknown));
        assert!(reply.payload.is_empty());

        router.dispatch(Envelope::request(MessageKind::Callback, json!({}))).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn selection_falls_back_to_focus() {
        let (router, plugin, mut rx) = setup(RecordingPlugin::new().with_preview("<p>hi</p>"), None);
        router.host().focus().set("qrcode");

        let req = request(IntentKind::OnResultSelected, json!({ "result": { "id": 1 } }));
        router.dispatch(req).await;

        assert_eq!(rx.recv().await.unwrap().payload["html"], "<p>hi</p>");
        assert_eq!(plugin.calls(), vec![Recorded::ResultSelected(json!({ "id": 1 }))]);
    }

    #[tokio::test]
    async fn event_without_handler_is_acknowledged() {
        let (router, plugin, mut rx) = setup(RecordingPlugin::new().with_handler("refresh"), None);
        router.host().focus().set("qrcode");

        let missing = Envelope::request(MessageKind::Event, json!({ "handlerName": "nope" }));
        router.dispatch(missing.clone()).await;
        assert!(rx.recv().await.unwrap().is_reply_to(&missing));

        let hit = Envelope::request(MessageKind::Event, json!({ "handlerName": "refresh", "handlerArgs": 7 }));
        router.dispatch(hit).await;
        rx.recv().await.unwrap();
        assert_eq!(plugin.calls(), vec![Recorded::Event("refresh".into(), json!(7))]);
    }
}
