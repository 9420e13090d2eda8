//! The wire envelope exchanged between the host and the UI, and the intents
//! an inbound envelope can carry.

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::{AsRefStr, Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::plugin::PluginError;

// -----------------------------------------------------------------------------
// Outbound event names
// -----------------------------------------------------------------------------

pub const TOAST: &str = "toast";
pub const HIDE_APP: &str = "hideApp";
pub const SHOW_APP: &str = "showApp";
pub const UPDATE_RESULTS: &str = "updateResults";
pub const UPDATE_PREVIEW: &str = "updatePreview";
pub const UPDATE_COMMANDS: &str = "updateCommands";

/// Request intents the UI may name directly in the envelope `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, AsRefStr, IntoStaticStr, Display)]
#[strum(serialize_all = "camelCase")]
pub enum IntentKind {
    GetCommands,
    OnSearch,
    OnResultSelected,
    OnEnter,
    OnResultTap,
    OnExit,
}

impl IntentKind {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// The envelope `type` field.
///
/// The host only ever writes `event` and `callback`. The UI may also put a
/// request intent straight into `type`; anything unrecognised is kept as-is
/// so the router can still reply to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageKind {
    Event,
    Callback,
    Intent(IntentKind),
    Other(String),
}

impl MessageKind {
    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::Event => "event",
            MessageKind::Callback => "callback",
            MessageKind::Intent(kind) => kind.as_str(),
            MessageKind::Other(raw) => raw,
        }
    }
}

impl From<String> for MessageKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "event" => MessageKind::Event,
            "callback" => MessageKind::Callback,
            other => match other.parse::<IntentKind>() {
                Ok(kind) => MessageKind::Intent(kind),
                Err(_) => MessageKind::Other(raw),
            },
        }
    }
}

impl From<MessageKind> for String {
    fn from(kind: MessageKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of traffic on the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub id: String,
    /// The id the recipient must use for its reply.
    pub reply_id: String,
    /// Epoch millis, informational only.
    #[serde(default)]
    pub time: i64,
    #[serde(rename = "type")]
    #[schemars(with = "String")]
    pub kind: MessageKind,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Turn any JSON value into an envelope payload. Non-objects are wrapped
/// under `value`.
pub fn into_payload(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".into(), other);
            map
        }
    }
}

impl Envelope {
    /// A new request with freshly minted `id` and `replyId`.
    pub fn request(kind: MessageKind, payload: Value) -> Self {
        Envelope {
            id: fresh_id(),
            reply_id: fresh_id(),
            time: now_millis(),
            kind,
            payload: into_payload(payload),
        }
    }

    /// The callback answering `self`: its `id` is our `replyId`.
    pub fn reply(&self, payload: Value) -> Self {
        Envelope {
            id: self.reply_id.clone(),
            reply_id: fresh_id(),
            time: now_millis(),
            kind: MessageKind::Callback,
            payload: into_payload(payload),
        }
    }

    /// An unsolicited event; `payload.event` carries the event name.
    pub fn event(name: &str, payload: Value) -> Self {
        let mut payload = into_payload(payload);
        payload.insert("event".into(), Value::String(name.to_string()));
        Envelope {
            id: fresh_id(),
            reply_id: fresh_id(),
            time: now_millis(),
            kind: MessageKind::Event,
            payload,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, PluginError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json(&self) -> Result<String, PluginError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn is_reply_to(&self, request: &Envelope) -> bool {
        self.kind == MessageKind::Callback && self.id == request.reply_id
    }

    /// Name of an unsolicited event, if this is one.
    pub fn event_name(&self) -> Option<&str> {
        match self.kind {
            MessageKind::Event => self.payload.get("event").and_then(Value::as_str),
            _ => None,
        }
    }
}

// -----------------------------------------------------------------------------
// Intents
// -----------------------------------------------------------------------------

/// What an inbound envelope asks the host to do.
///
/// `command` fields carry the `payload.command.id` the UI sent along, if any.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    GetCommands,
    Search {
        keyword: String,
        command: Option<String>,
    },
    ResultSelected {
        result: Value,
        command: Option<String>,
    },
    Enter {
        command: Option<String>,
    },
    ResultTap {
        result: Value,
        command: Option<String>,
    },
    Exit {
        command: Option<String>,
    },
    Event {
        handler_name: Option<String>,
        data: Value,
    },
    Unknown(String),
}

fn command_id(payload: &Map<String, Value>) -> Option<String> {
    payload
        .get("command")
        .and_then(|c| c.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn field(payload: &Map<String, Value>, key: &str) -> Value {
    payload.get(key).cloned().unwrap_or(Value::Null)
}

impl Intent {
    /// Resolve the intent of an inbound envelope.
    ///
    /// Returns `None` for callbacks: the UI acknowledging something we sent
    /// is never answered.
    pub fn from_envelope(env: &Envelope) -> Option<Intent> {
        let payload = &env.payload;
        let kind = match &env.kind {
            MessageKind::Callback => return None,
            MessageKind::Intent(kind) => *kind,
            MessageKind::Other(raw) => return Some(Intent::Unknown(raw.clone())),
            MessageKind::Event => match payload.get("intent").and_then(Value::as_str) {
                Some(name) => match name.parse::<IntentKind>() {
                    Ok(kind) => kind,
                    Err(_) => return Some(Intent::Unknown(name.to_string())),
                },
                None => {
                    let handler_name = payload
                        .get("handlerName")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    let data = payload
                        .get("eventData")
                        .or_else(|| payload.get("handlerArgs"))
                        .cloned()
                        .unwrap_or(Value::Null);
                    return Some(Intent::Event { handler_name, data });
                }
            },
        };

        let command = command_id(payload);
        Some(match kind {
            IntentKind::GetCommands => Intent::GetCommands,
            IntentKind::OnSearch => Intent::Search {
                keyword: payload
                    .get("keyword")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                command,
            },
            IntentKind::OnResultSelected => Intent::ResultSelected {
                result: field(payload, "result"),
                command,
            },
            IntentKind::OnEnter => Intent::Enter { command },
            IntentKind::OnResultTap => Intent::ResultTap {
                result: field(payload, "result"),
                command,
            },
            IntentKind::OnExit => Intent::Exit { command },
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Intent::GetCommands => IntentKind::GetCommands.as_str(),
            Intent::Search { .. } => IntentKind::OnSearch.as_str(),
            Intent::ResultSelected { .. } => IntentKind::OnResultSelected.as_str(),
            Intent::Enter { .. } => IntentKind::OnEnter.as_str(),
            Intent::ResultTap { .. } => IntentKind::OnResultTap.as_str(),
            Intent::Exit { .. } => IntentKind::OnExit.as_str(),
            Intent::Event { .. } => "event",
            Intent::Unknown(raw) => raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reply_takes_request_reply_id() {
        let req = Envelope::request(MessageKind::Intent(IntentKind::GetCommands), json!({}));
        let reply = req.reply(json!({ "commands": [] }));

        assert_eq!(reply.id, req.reply_id);
        assert_ne!(reply.reply_id, req.reply_id);
        assert_eq!(reply.kind, MessageKind::Callback);
        assert!(reply.is_reply_to(&req));
    }

    #[test]
    fn event_carries_its_name_in_payload() {
        let ev = Envelope::event(TOAST, json!({ "content": "hi" }));
        assert_eq!(ev.kind, MessageKind::Event);
        assert_eq!(ev.event_name(), Some("toast"));
        assert_eq!(ev.payload["content"], "hi");
        assert_ne!(ev.id, ev.reply_id);
    }

    #[test]
    fn wire_format_uses_camel_case_and_type() {
        let raw = r#"{"id":"a","replyId":"b","time":1,"type":"onSearch","payload":{"keyword":"qr","command":{"id":"qrcode"}}}"#;
        let env = Envelope::from_json(raw).unwrap();
        assert_eq!(env.kind, MessageKind::Intent(IntentKind::OnSearch));

        let back: Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();
        assert_eq!(back["replyId"], "b");
        assert_eq!(back["type"], "onSearch");
    }

    #[test]
    fn missing_time_and_payload_default() {
        let env = Envelope::from_json(r#"{"id":"a","replyId":"b","type":"getCommands"}"#).unwrap();
        assert_eq!(env.time, 0);
        assert!(env.payload.is_empty());
    }

    #[test]
    fn garbage_is_a_json_error() {
        let err = Envelope::from_json("{not json").unwrap_err();
        assert!(matches!(err, PluginError::Json(_)));
    }

    #[test]
    fn intent_from_type_field() {
        let env = Envelope::request(
            MessageKind::Intent(IntentKind::OnSearch),
            json!({ "keyword": "abc", "command": { "id": "qrcode" } }),
        );
        assert_eq!(
            Intent::from_envelope(&env),
            Some(Intent::Search { keyword: "abc".into(), command: Some("qrcode".into()) })
        );
    }

    #[test]
    fn intent_from_payload_of_event() {
        let env = Envelope::request(
            MessageKind::Event,
            json!({ "intent": "onEnter", "command": { "id": "qrcode" } }),
        );
        assert_eq!(
            Intent::from_envelope(&env),
            Some(Intent::Enter { command: Some("qrcode".into()) })
        );
    }

    #[test]
    fn generic_event_accepts_either_argument_key() {
        let with_data = Envelope::request(
            MessageKind::Event,
            json!({ "handlerName": "refresh", "eventData": { "x": 1 } }),
        );
        let with_args = Envelope::request(
            MessageKind::Event,
            json!({ "handlerName": "refresh", "handlerArgs": [1, 2] }),
        );

        assert_eq!(
            Intent::from_envelope(&with_data),
            Some(Intent::Event { handler_name: Some("refresh".into()), data: json!({ "x": 1 }) })
        );
        assert_eq!(
            Intent::from_envelope(&with_args),
            Some(Intent::Event { handler_name: Some("refresh".into()), data: json!([1, 2]) })
        );
    }

    #[test]
    fn callbacks_are_not_intents_and_unknown_types_survive() {
        let cb = Envelope::request(MessageKind::Callback, json!({}));
        assert_eq!(Intent::from_envelope(&cb), None);

        let env = Envelope::from_json(r#"{"id":"a","replyId":"b","type":"onDance"}"#).unwrap();
        assert_eq!(env.kind, MessageKind::Other("onDance".into()));
        assert_eq!(Intent::from_envelope(&env), Some(Intent::Unknown("onDance".into())));
    }
}
