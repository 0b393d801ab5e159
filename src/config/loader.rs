//! Configuration loading for instrument setup documents.
//!
//! This module turns YAML text into a validated [`ConfigurationDocument`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use daq_config::config::loader::{load, load_file};
//! use std::path::Path;
//!
//! // Load from a file
//! let doc = load_file(Path::new("config/spectrometer.yml"))?;
//!
//! // Load from text (tests, embedded defaults)
//! let doc = load("global:\n  startup: []\n")?;
//! ```
//!
//! Loading is a pure transformation: apart from reading the file in
//! [`load_file`] it performs no I/O, and either the whole document validates
//! or nothing is returned.

use super::schema::{
    ConfigurationDocument, GlobalSettings, ModuleCategory, ModuleEntry, RemoteServer,
    DEFAULT_REMOTE_ADDRESS,
};
use super::validation::validate_document;
use super::value::{describe, insert_unique, join_path, scalar_key, OptionValue};
use crate::error::{ConfigError, ConfigResult};
use crate::validation::{
    is_valid_class_path, is_valid_host, is_valid_module_name, is_valid_path, is_valid_port,
};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Key holding the implementation class path of a module.
pub const CLASS_KEY: &str = "module.Class";
/// Key holding the connector mapping of a module.
pub const CONNECT_KEY: &str = "connect";
/// Key holding the remote-access flag of a module.
pub const ALLOW_REMOTE_KEY: &str = "allow_remote";
/// Name of the global settings section.
pub const GLOBAL_SECTION: &str = "global";

/// Where a document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// In-memory YAML text
    Text(String),
    /// YAML file on disk
    File(PathBuf),
}

impl ConfigSource {
    /// Loads and validates the document from this source.
    pub fn load(&self) -> ConfigResult<ConfigurationDocument> {
        match self {
            ConfigSource::Text(text) => load(text),
            ConfigSource::File(path) => load_file(path),
        }
    }
}

impl From<PathBuf> for ConfigSource {
    fn from(path: PathBuf) -> Self {
        ConfigSource::File(path)
    }
}

impl From<&Path> for ConfigSource {
    fn from(path: &Path) -> Self {
        ConfigSource::File(path.to_path_buf())
    }
}

/// Load a configuration document from a YAML file.
///
/// # Arguments
///
/// * `path` - Path to the configuration file
///
/// # Returns
///
/// * `Ok(ConfigurationDocument)` if reading, parsing and validation succeed
/// * `Err(ConfigError::Io)` if the file cannot be read, otherwise the error of [`load`]
pub fn load_file(path: &Path) -> ConfigResult<ConfigurationDocument> {
    debug!("Loading configuration from: {}", path.display());

    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    load(&text)
}

/// Load a configuration document from YAML text.
///
/// Parsing recognizes the `global`, `gui`, `logic` and `hardware` sections;
/// every other top-level key is kept as an extension section. After parsing,
/// cross-references (connections and startup list) are validated.
pub fn load(text: &str) -> ConfigResult<ConfigurationDocument> {
    let root = parse_yaml(text)?;
    let doc = parse_document(&root)?;

    validate_document(&doc)?;

    let [gui, logic, hardware] = doc.counts();
    info!(
        gui = gui.1,
        logic = logic.1,
        hardware = hardware.1,
        extra_sections = doc.extra_sections().len(),
        "Loaded configuration"
    );

    Ok(doc)
}

/// Parses exactly one YAML document; an empty stream is a null document.
fn parse_yaml(text: &str) -> ConfigResult<Value> {
    let mut documents = serde_yaml::Deserializer::from_str(text);
    let Some(document) = documents.next() else {
        return Ok(Value::Null);
    };
    let root = Value::deserialize(document)?;
    if documents.next().is_some() {
        return Err(ConfigError::Syntax {
            message: "expected a single YAML document, found several".to_string(),
            line: None,
            column: None,
        });
    }
    Ok(root)
}

fn parse_document(root: &Value) -> ConfigResult<ConfigurationDocument> {
    let root = match untag(root) {
        Value::Null => return Ok(ConfigurationDocument::default()),
        Value::Mapping(mapping) => mapping,
        other => {
            return Err(ConfigError::type_mismatch(
                "<root>",
                "mapping of sections",
                describe(other),
            ))
        }
    };

    let mut global = GlobalSettings::default();
    let mut modules = Vec::new();
    let mut extra_sections = BTreeMap::new();

    for (key, value) in root {
        let key = scalar_key(key, "")?;
        if key == GLOBAL_SECTION {
            global = parse_global(value)?;
        } else if let Ok(category) = key.parse::<ModuleCategory>() {
            modules.extend(parse_section(category, value)?);
        } else {
            debug!(section = %key, "Preserving unrecognized section");
            insert_unique(&mut extra_sections, key, value.clone(), "")?;
        }
    }

    Ok(ConfigurationDocument::from_parts(
        global,
        modules,
        extra_sections,
    ))
}

fn parse_global(value: &Value) -> ConfigResult<GlobalSettings> {
    let mut global = GlobalSettings::default();
    let Some(mapping) = optional_mapping(value, GLOBAL_SECTION)? else {
        return Ok(global);
    };

    for (key, value) in mapping {
        let key = scalar_key(key, GLOBAL_SECTION)?;
        let path = join_path(GLOBAL_SECTION, &key);
        match key.as_str() {
            "startup" => global.startup = string_list(value, &path)?,
            "remote_modules_server" => {
                global.remote_modules_server = parse_remote_server(value, &path)?
            }
            "namespace_server_port" => global.namespace_server_port = coerce_port(value, &path)?,
            "default_data_dir" => global.default_data_dir = optional_path(value, &path)?,
            "daily_data_dirs" => global.daily_data_dirs = coerce_bool(value, &path)?,
            "stylesheet" => global.stylesheet = optional_string(value, &path)?,
            "extensions" => {
                global.extensions = string_list(value, &path)?
                    .into_iter()
                    .map(PathBuf::from)
                    .collect()
            }
            "hide_manager_window" => global.hide_manager_window = coerce_bool(value, &path)?,
            "force_remote_calls_by_value" => {
                global.force_remote_calls_by_value = coerce_bool(value, &path)?
            }
            _ => {
                let option = OptionValue::from_yaml(value, &path)?;
                insert_unique(&mut global.extra, key, option, GLOBAL_SECTION)?;
            }
        }
    }

    debug!(
        startup = global.startup.len(),
        namespace_server_port = global.namespace_server_port,
        "Parsed global section"
    );

    Ok(global)
}

fn parse_remote_server(value: &Value, path: &str) -> ConfigResult<Option<RemoteServer>> {
    let Some(mapping) = optional_mapping(value, path)? else {
        return Ok(None);
    };

    let mut address = DEFAULT_REMOTE_ADDRESS.to_string();
    let mut port = None;
    let mut certfile = None;
    let mut keyfile = None;

    for (key, value) in mapping {
        let key = scalar_key(key, path)?;
        let field_path = join_path(path, &key);
        match key.as_str() {
            "address" => {
                address = required_string(value, &field_path)?;
                is_valid_host(&address).map_err(|_| {
                    ConfigError::type_mismatch(&field_path, "host name or IP address", describe(value))
                })?;
            }
            "port" => port = Some(coerce_port(value, &field_path)?),
            "certfile" => certfile = optional_path(value, &field_path)?,
            "keyfile" => keyfile = optional_path(value, &field_path)?,
            _ => {
                return Err(ConfigError::schema(
                    field_path,
                    "unknown remote server field (expected address, port, certfile, keyfile)",
                ))
            }
        }
    }

    let port = port.ok_or_else(|| {
        ConfigError::schema(join_path(path, "port"), "missing required field")
    })?;

    Ok(Some(RemoteServer {
        address,
        port,
        certfile,
        keyfile,
    }))
}

fn parse_section(category: ModuleCategory, value: &Value) -> ConfigResult<Vec<ModuleEntry>> {
    let path = category.as_str();
    let Some(mapping) = optional_mapping(value, path)? else {
        return Ok(Vec::new());
    };

    let mut entries = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let name = scalar_key(key, path)?;
        entries.push(parse_module(category, name, value)?);
    }

    debug!(section = %category, modules = entries.len(), "Parsed module section");
    Ok(entries)
}

fn parse_module(category: ModuleCategory, name: String, value: &Value) -> ConfigResult<ModuleEntry> {
    let path = join_path(category.as_str(), &name);
    is_valid_module_name(&name).map_err(|msg| ConfigError::schema(&path, msg))?;

    let empty = Mapping::new();
    let mapping = optional_mapping(value, &path)?.unwrap_or(&empty);

    let class_path = match mapping.get(CLASS_KEY) {
        Some(value) => required_string(value, &join_path(&path, CLASS_KEY))?,
        None => {
            return Err(ConfigError::schema(
                join_path(&path, CLASS_KEY),
                format!("module '{name}' in section '{category}' is missing required field '{CLASS_KEY}'"),
            ))
        }
    };
    is_valid_class_path(&class_path)
        .map_err(|msg| ConfigError::schema(join_path(&path, CLASS_KEY), msg))?;

    let mut entry = ModuleEntry::new(category, name, class_path);

    for (key, value) in mapping {
        let key = scalar_key(key, &path)?;
        let field_path = join_path(&path, &key);
        match key.as_str() {
            CLASS_KEY => {}
            CONNECT_KEY => entry.connect = parse_connect(value, &field_path)?,
            ALLOW_REMOTE_KEY => entry.allow_remote = coerce_bool(value, &field_path)?,
            _ => {
                let option = OptionValue::from_yaml(value, &field_path)?;
                insert_unique(&mut entry.options, key, option, &path)?;
            }
        }
    }

    debug!(
        module = %entry.name,
        section = %category,
        class = %entry.class_path,
        connections = entry.connect.len(),
        options = entry.options.len(),
        "Parsed module entry"
    );

    Ok(entry)
}

fn parse_connect(value: &Value, path: &str) -> ConfigResult<BTreeMap<String, String>> {
    let mut connect = BTreeMap::new();
    let Some(mapping) = optional_mapping(value, path)? else {
        return Ok(connect);
    };

    for (key, value) in mapping {
        let role = scalar_key(key, path)?;
        let target = required_string(value, &join_path(path, &role))?;
        insert_unique(&mut connect, role, target, path)?;
    }

    Ok(connect)
}

// -----------------------------------------------------------------------------
// Coercion helpers
// -----------------------------------------------------------------------------

fn untag(value: &Value) -> &Value {
    match value {
        Value::Tagged(tagged) => untag(&tagged.value),
        other => other,
    }
}

/// A mapping, or `None` for an explicit null.
fn optional_mapping<'a>(value: &'a Value, path: &str) -> ConfigResult<Option<&'a Mapping>> {
    match untag(value) {
        Value::Null => Ok(None),
        Value::Mapping(mapping) => Ok(Some(mapping)),
        other => Err(ConfigError::type_mismatch(path, "mapping", describe(other))),
    }
}

fn required_string(value: &Value, path: &str) -> ConfigResult<String> {
    match untag(value) {
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        other => Err(ConfigError::type_mismatch(
            path,
            "non-empty string",
            describe(other),
        )),
    }
}

fn optional_string(value: &Value, path: &str) -> ConfigResult<Option<String>> {
    match untag(value) {
        Value::Null => Ok(None),
        other => required_string(other, path).map(Some),
    }
}

fn optional_path(value: &Value, path: &str) -> ConfigResult<Option<PathBuf>> {
    let Some(raw) = optional_string(value, path)? else {
        return Ok(None);
    };
    is_valid_path(&raw).map_err(|_| ConfigError::type_mismatch(path, "file system path", describe(value)))?;
    Ok(Some(PathBuf::from(raw)))
}

fn string_list(value: &Value, path: &str) -> ConfigResult<Vec<String>> {
    match untag(value) {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| required_string(item, &format!("{path}[{i}]")))
            .collect(),
        other => Err(ConfigError::type_mismatch(
            path,
            "list of strings",
            describe(other),
        )),
    }
}

fn coerce_bool(value: &Value, path: &str) -> ConfigResult<bool> {
    match untag(value) {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        other => Err(ConfigError::type_mismatch(path, "boolean", describe(other))),
    }
}

/// Coerces integers, integral floats and numeric strings to a port number.
fn coerce_port(value: &Value, path: &str) -> ConfigResult<u16> {
    let value = untag(value);
    let raw = match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u16::MAX))
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    raw.and_then(|p| u16::try_from(p).ok())
        .filter(|p| is_valid_port(*p).is_ok())
        .ok_or_else(|| ConfigError::type_mismatch(path, "port number (1-65535)", describe(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const MINIMAL: &str = r#"
global:
  startup: [scan_gui]

gui:
  scan_gui:
    module.Class: 'scan.scan_gui.ScanGui'
    connect:
      scan_logic: scan_logic

logic:
  scan_logic:
    module.Class: 'scan.scan_logic.ScanLogic'
    connect:
      stage: xyz_stage

hardware:
  xyz_stage:
    module.Class: 'motor.stage_dummy.StageDummy'
    axes: 3
"#;

    #[test]
    fn test_load_minimal_document() {
        let doc = load(MINIMAL).unwrap();
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.global().startup, vec!["scan_gui".to_string()]);
        let stage = doc.module("xyz_stage").unwrap();
        assert_eq!(stage.category, ModuleCategory::Hardware);
        assert_eq!(stage.option("axes"), Some(&OptionValue::Integer(3)));
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let doc = load("").unwrap();
        assert!(doc.is_empty());
        assert_eq!(doc.global(), &GlobalSettings::default());

        let doc = load("# only a comment\n").unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_null_section_is_empty() {
        let doc = load("gui:\nlogic:\nhardware:\n").unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_malformed_yaml_is_syntax_error() {
        let err = load("global:\n  startup: [a, b\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert!(matches!(err, ConfigError::Syntax { line: Some(_), .. }));
    }

    #[test]
    fn test_duplicate_module_key_is_syntax_error() {
        let text = r#"
hardware:
  cam:
    module.Class: 'camera.Dummy'
  cam:
    module.Class: 'camera.Other'
"#;
        assert_eq!(load(text).unwrap_err().kind(), ErrorKind::Syntax);
    }

    #[test]
    fn test_multiple_documents_rejected() {
        let err = load("global: {}\n---\nglobal: {}\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
    }

    #[test]
    fn test_root_must_be_mapping() {
        let err = load("- a\n- b\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(err.path(), Some("<root>"));
    }

    #[test]
    fn test_missing_class_is_schema_error() {
        let text = "logic:\n  fit_logic:\n    fit_count: 2\n";
        let err = load(text).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(err.path(), Some("logic.fit_logic.module.Class"));
        let msg = err.to_string();
        assert!(msg.contains("fit_logic") && msg.contains("logic"), "{msg}");
    }

    #[test]
    fn test_null_module_body_is_schema_error() {
        let err = load("hardware:\n  cam:\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn test_non_string_class_is_type_error() {
        let err = load("hardware:\n  cam:\n    module.Class: 42\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(err.path(), Some("hardware.cam.module.Class"));
    }

    #[test]
    fn test_invalid_module_name_is_schema_error() {
        let err = load("hardware:\n  'my cam':\n    module.Class: 'camera.Dummy'\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(err.path(), Some("hardware.my cam"));
    }

    #[test]
    fn test_port_coercion() {
        let doc = load("global:\n  namespace_server_port: '18862'\n").unwrap();
        assert_eq!(doc.global().namespace_server_port, 18862);

        let doc = load("global:\n  namespace_server_port: 18863.0\n").unwrap();
        assert_eq!(doc.global().namespace_server_port, 18863);

        for bad in ["abc", "70000", "0", "1.5", "[1]"] {
            let text = format!("global:\n  namespace_server_port: {bad}\n");
            let err = load(&text).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Type, "value {bad}");
            assert_eq!(err.path(), Some("global.namespace_server_port"));
        }
    }

    #[test]
    fn test_remote_server() {
        let text = r#"
global:
  remote_modules_server:
    address: '192.168.0.10'
    port: 12345
    certfile: /etc/lab/cert.pem
"#;
        let doc = load(text).unwrap();
        let server = doc.global().remote_modules_server.as_ref().unwrap();
        assert_eq!(server.address, "192.168.0.10");
        assert_eq!(server.port, 12345);
        assert_eq!(server.certfile, Some(PathBuf::from("/etc/lab/cert.pem")));
        assert_eq!(server.keyfile, None);
    }

    #[test]
    fn test_remote_server_defaults_and_errors() {
        let doc = load("global:\n  remote_modules_server: {port: 12345}\n").unwrap();
        assert_eq!(
            doc.global().remote_modules_server.as_ref().unwrap().address,
            "localhost"
        );

        let err = load("global:\n  remote_modules_server: {address: localhost}\n").unwrap_err();
        assert_eq!(err.path(), Some("global.remote_modules_server.port"));

        let err = load("global:\n  remote_modules_server: {port: twelve}\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);

        let err = load("global:\n  remote_modules_server: {port: 1, user: x}\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn test_global_flags_and_extra_keys() {
        let text = r#"
global:
  daily_data_dirs: false
  hide_manager_window: true
  extensions: ['/opt/lab/modules']
  stylesheet: 'dark.qss'
  default_data_dir: '/data'
  custom_flag: 7
"#;
        let doc = load(text).unwrap();
        let global = doc.global();
        assert!(!global.daily_data_dirs);
        assert!(global.hide_manager_window);
        assert!(!global.force_remote_calls_by_value);
        assert_eq!(global.extensions, vec![PathBuf::from("/opt/lab/modules")]);
        assert_eq!(global.stylesheet.as_deref(), Some("dark.qss"));
        assert_eq!(global.default_data_dir, Some(PathBuf::from("/data")));
        assert_eq!(global.extra.get("custom_flag"), Some(&OptionValue::Integer(7)));
    }

    #[test]
    fn test_startup_must_be_list_of_strings() {
        let err = load("global:\n  startup: scan_gui\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);

        let err = load("global:\n  startup: [1]\n").unwrap_err();
        assert_eq!(err.path(), Some("global.startup[0]"));
    }

    #[test]
    fn test_allow_remote_and_null_connect() {
        let text = r#"
hardware:
  laser:
    module.Class: 'laser.laser_dummy.LaserDummy'
    allow_remote: true
    connect:
"#;
        let doc = load(text).unwrap();
        let laser = doc.module("laser").unwrap();
        assert!(laser.allow_remote);
        assert!(laser.connect.is_empty());
        assert!(laser.options.is_empty());
    }

    #[test]
    fn test_connect_target_must_be_string() {
        let text = r#"
logic:
  a:
    module.Class: 'x.A'
    connect:
      dep: [b]
"#;
        let err = load(text).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(err.path(), Some("logic.a.connect.dep"));
    }

    #[test]
    fn test_unrecognized_sections_preserved() {
        let text = "plugins:\n  - name: fitting\n    enabled: true\nglobal: {}\n";
        let doc = load(text).unwrap();
        let plugins = doc.extra_sections().get("plugins").unwrap();
        let expected: Value = serde_yaml::from_str("- name: fitting\n  enabled: true\n").unwrap();
        assert_eq!(plugins, &expected);
    }

    #[test]
    fn test_connect_roles_with_same_text_rejected() {
        let text = "hardware:\n  a:\n    module.Class: 'x.A'\n  b:\n    module.Class: 'x.B'\nlogic:\n  c:\n    module.Class: 'x.C'\n    connect: {1: a, '1': b}\n";
        let err = load(text).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(err.path(), Some("logic.c.connect.1"));
    }

    #[test]
    fn test_load_file_missing_is_io_error() {
        let err = load_file(Path::new("/nonexistent/setup.yml")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_config_source_text() {
        let source = ConfigSource::Text(MINIMAL.to_string());
        assert_eq!(source.load().unwrap().len(), 3);
    }
}
