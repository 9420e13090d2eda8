use std::{fs, path::Path};

use launcher_plugin::Command;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::registry::RegistryError;

/// A plugin's `plugin.json`.
///
/// Everything is optional at the serde level so a broken manifest still
/// parses and can report *all* of its missing fields at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PluginManifest {
    pub name: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub mode: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Entry hint, diagnostics only.
    pub main: Option<String>,
}

fn present(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl PluginManifest {
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let shown = path.display().to_string();
        if !path.exists() {
            return Err(RegistryError::ManifestNotFound(shown));
        }
        let raw = fs::read_to_string(path).map_err(|e| RegistryError::ManifestRead {
            path: shown.clone(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|e| RegistryError::ManifestParse {
            path: shown,
            reason: e.to_string(),
        })
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = vec![];
        if !present(&self.name) {
            missing.push("name");
        }
        if !present(&self.title) {
            missing.push("title");
        }
        if !present(&self.icon) {
            missing.push("icon");
        }
        if !present(&self.mode) {
            missing.push("mode");
        }
        if self.keywords.iter().all(|k| k.trim().is_empty()) {
            missing.push("keywords");
        }
        missing
    }

    /// The command this manifest describes, if it is complete.
    pub fn validate(&self) -> Result<Command, RegistryError> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(RegistryError::MissingFields(missing));
        }
        Ok(Command {
            id: self.name.clone().unwrap_or_default(),
            title: self.title.clone().unwrap_or_default(),
            subtitle: self.subtitle.clone().unwrap_or_default(),
            description: self.description.clone().unwrap_or_default(),
            icon: self.icon.clone().unwrap_or_default(),
            mode: self.mode.clone().unwrap_or_default(),
            keywords: self.keywords.clone(),
        })
    }
}

impl From<Command> for PluginManifest {
    fn from(cmd: Command) -> Self {
        PluginManifest {
            name: Some(cmd.id),
            title: Some(cmd.title),
            subtitle: Some(cmd.subtitle),
            description: Some(cmd.description),
            icon: Some(cmd.icon),
            mode: Some(cmd.mode),
            keywords: cmd.keywords,
            main: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::write;
    use tempfile::tempdir;

    #[test]
    fn complete_manifest_becomes_command() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plugin.json");
        write(
            &path,
            r#"{"name":"qrcode","title":"QR","icon":"qr.png","mode":"list","keywords":["qr"],"main":"index.js"}"#,
        )
        .unwrap();

        let cmd = PluginManifest::load(&path).unwrap().validate().unwrap();
        assert_eq!(cmd.id, "qrcode");
        assert_eq!(cmd.subtitle, "");
        assert_eq!(cmd.keywords, vec!["qr"]);
    }

    #[test]
    fn all_missing_fields_reported_together() {
        let manifest: PluginManifest =
            serde_json::from_str(r#"{"name":"qrcode","title":"QR","mode":"list","keywords":[]}"#).unwrap();
        assert_eq!(
            manifest.validate().unwrap_err(),
            RegistryError::MissingFields(vec!["icon", "keywords"])
        );
    }

    #[test]
    fn blank_strings_count_as_missing() {
        let manifest = PluginManifest {
            name: Some("  ".into()),
            title: Some("t".into()),
            icon: Some("i".into()),
            mode: Some("m".into()),
            keywords: vec!["".into()],
            ..Default::default()
        };
        assert_eq!(manifest.missing_fields(), vec!["name", "keywords"]);
    }

    #[test]
    fn missing_and_broken_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope.json");
        assert!(matches!(
            PluginManifest::load(&path),
            Err(RegistryError::ManifestNotFound(p)) if p.ends_with("nope.json")
        ));

        write(&path, "{ not json").unwrap();
        assert!(matches!(PluginManifest::load(&path), Err(RegistryError::ManifestParse { .. })));
    }
}
