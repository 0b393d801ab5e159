//! Serialization of documents back into the file format.
//!
//! The output uses the same layout the loader reads (global first, then the
//! module sections, then extension sections) and writes defaults explicitly,
//! so loading the output again produces an equal document.

use super::loader::{ALLOW_REMOTE_KEY, CLASS_KEY, CONNECT_KEY, GLOBAL_SECTION};
use super::schema::{ConfigurationDocument, GlobalSettings, ModuleCategory, ModuleEntry};
use crate::error::{ConfigError, ConfigResult};
use serde_yaml::{Mapping, Value};
use std::path::Path;

/// Renders a document as YAML text.
pub fn to_yaml_string(doc: &ConfigurationDocument) -> ConfigResult<String> {
    serde_yaml::to_string(&to_yaml_value(doc)).map_err(ConfigError::Emit)
}

/// Builds the YAML tree of a document.
pub fn to_yaml_value(doc: &ConfigurationDocument) -> Value {
    let mut root = Mapping::new();
    root.insert(key(GLOBAL_SECTION), global_to_yaml(doc.global()));

    for category in ModuleCategory::ALL {
        let entries = doc.section(category);
        if entries.is_empty() {
            continue;
        }
        let section: Mapping = entries
            .into_iter()
            .map(|entry| (key(&entry.name), module_to_yaml(entry)))
            .collect();
        root.insert(key(category.as_str()), Value::Mapping(section));
    }

    for (name, value) in doc.extra_sections() {
        root.insert(key(name), value.clone());
    }

    Value::Mapping(root)
}

fn global_to_yaml(global: &GlobalSettings) -> Value {
    let mut mapping = Mapping::new();
    mapping.insert(
        key("startup"),
        Value::Sequence(global.startup.iter().map(|name| key(name)).collect()),
    );
    if let Some(server) = &global.remote_modules_server {
        let mut remote = Mapping::new();
        remote.insert(key("address"), key(&server.address));
        remote.insert(key("port"), Value::Number(server.port.into()));
        if let Some(certfile) = &server.certfile {
            remote.insert(key("certfile"), path_value(certfile));
        }
        if let Some(keyfile) = &server.keyfile {
            remote.insert(key("keyfile"), path_value(keyfile));
        }
        mapping.insert(key("remote_modules_server"), Value::Mapping(remote));
    }
    mapping.insert(
        key("namespace_server_port"),
        Value::Number(global.namespace_server_port.into()),
    );
    if let Some(dir) = &global.default_data_dir {
        mapping.insert(key("default_data_dir"), path_value(dir));
    }
    mapping.insert(key("daily_data_dirs"), Value::Bool(global.daily_data_dirs));
    if let Some(stylesheet) = &global.stylesheet {
        mapping.insert(key("stylesheet"), key(stylesheet));
    }
    if !global.extensions.is_empty() {
        mapping.insert(
            key("extensions"),
            Value::Sequence(global.extensions.iter().map(|p| path_value(p)).collect()),
        );
    }
    mapping.insert(
        key("hide_manager_window"),
        Value::Bool(global.hide_manager_window),
    );
    mapping.insert(
        key("force_remote_calls_by_value"),
        Value::Bool(global.force_remote_calls_by_value),
    );
    for (name, value) in &global.extra {
        mapping.insert(key(name), value.to_yaml());
    }
    Value::Mapping(mapping)
}

fn module_to_yaml(entry: &ModuleEntry) -> Value {
    let mut mapping = Mapping::new();
    mapping.insert(key(CLASS_KEY), key(&entry.class_path));
    if entry.allow_remote {
        mapping.insert(key(ALLOW_REMOTE_KEY), Value::Bool(true));
    }
    if !entry.connect.is_empty() {
        let connect: Mapping = entry
            .connect
            .iter()
            .map(|(role, target)| (key(role), key(target)))
            .collect();
        mapping.insert(key(CONNECT_KEY), Value::Mapping(connect));
    }
    for (name, value) in &entry.options {
        mapping.insert(key(name), value.to_yaml());
    }
    Value::Mapping(mapping)
}

fn key(s: &str) -> Value {
    Value::String(s.to_string())
}

fn path_value(path: &Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}
