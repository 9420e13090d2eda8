// src/schema.rs

use std::{fs, path::Path};

use anyhow::Error;
use launcher_plugin::{Command, Envelope};
use schemars::schema_for;

use crate::{config::HostSettings, manifest::PluginManifest};

/// The entry point invoked by `main.rs` for `Commands::Schema`.
/// Returns the files written, relative to `out_dir`.
pub fn write_schema(out_dir: &Path) -> Result<Vec<String>, Error> {
    fs::create_dir_all(out_dir)?;

    let schemas = [
        ("plugin-manifest.schema.json", serde_json::to_string_pretty(&schema_for!(PluginManifest))?),
        ("envelope.schema.json", serde_json::to_string_pretty(&schema_for!(Envelope))?),
        ("command.schema.json", serde_json::to_string_pretty(&schema_for!(Command))?),
        ("host-settings.schema.json", serde_json::to_string_pretty(&schema_for!(HostSettings))?),
    ];

    let mut written = vec![];
    for (file, json) in schemas {
        fs::write(out_dir.join(file), json)?;
        written.push(file.to_string());
    }
    Ok(written)
}
