pub mod command;
pub mod message;
pub mod plugin;
pub mod utils;

#[cfg(feature = "test-utils")]
pub mod plugin_test_util;

pub use command::Command;
pub use message::{Envelope, Intent, IntentKind, MessageKind};
pub use plugin::{EventHandlers, LauncherPlugin, PluginError, PluginFactory};
pub use utils::{Outbox, OutboxReceiver, PluginUtils, outbox};
