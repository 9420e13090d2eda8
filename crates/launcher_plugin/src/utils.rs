use serde_json::{Value, json};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::debug;

use crate::{
    command::Command,
    message::{Envelope, HIDE_APP, SHOW_APP, TOAST, UPDATE_COMMANDS, UPDATE_PREVIEW, UPDATE_RESULTS},
};

/// Every envelope leaving the host goes through one of these.
pub type Outbox = UnboundedSender<Envelope>;
pub type OutboxReceiver = UnboundedReceiver<Envelope>;

pub fn outbox() -> (Outbox, OutboxReceiver) {
    unbounded_channel()
}

/// The callbacks a plugin uses to push UI effects.
///
/// Bound to the plugin's own command so result and preview updates are
/// stamped with where they came from. All calls are fire-and-forget.
#[derive(Clone, Debug)]
pub struct PluginUtils {
    command: Option<Command>,
    outbox: Outbox,
}

impl PluginUtils {
    pub fn new(command: Command, outbox: Outbox) -> Self {
        Self { command: Some(command), outbox }
    }

    /// Utilities not tied to any plugin, used by the host itself.
    pub fn detached(outbox: Outbox) -> Self {
        Self { command: None, outbox }
    }

    pub fn command(&self) -> Option<&Command> {
        self.command.as_ref()
    }

    pub fn toast(&self, content: impl Into<String>) {
        self.emit(TOAST, json!({ "content": content.into() }));
    }

    pub fn hide_app(&self) {
        self.emit(HIDE_APP, json!({}));
    }

    pub fn show_app(&self) {
        self.emit(SHOW_APP, json!({}));
    }

    pub fn update_results(&self, results: Vec<Value>) {
        self.emit(UPDATE_RESULTS, json!({ "results": results, "command": self.command }));
    }

    pub fn update_preview(&self, html: Option<String>) {
        self.emit(UPDATE_PREVIEW, json!({ "html": html, "command": self.command }));
    }

    pub fn update_commands(&self, commands: &[Command]) {
        self.emit(UPDATE_COMMANDS, json!({ "commands": commands }));
    }

    fn emit(&self, name: &str, payload: Value) {
        let ev = Envelope::event(name, payload);
        if self.outbox.send(ev).is_err() {
            debug!(event = name, "outbox closed, dropping event");
        }
    }
}
