use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How a plugin shows up in the launcher's command list.
///
/// `id` is the plugin name; the UI echoes it back as `payload.command.id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Command {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub description: String,
    pub icon: String,
    pub mode: String,
    pub keywords: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_text_fields_default_to_empty() {
        let cmd: Command = serde_json::from_str(
            r#"{"id":"qrcode","title":"QR","icon":"qr.png","mode":"list","keywords":["qr"]}"#,
        )
        .unwrap();
        assert_eq!(cmd.subtitle, "");
        assert_eq!(cmd.description, "");
    }
}
