//! Cross-entry validation of a parsed document.
//!
//! Parsing checks each entry on its own; the rules here need the whole
//! document:
//!
//! - module names are unique across all categories, because connections are
//!   resolved by name alone
//! - every `global.startup` entry names an existing module
//! - every `connect` target names an existing module (any category)
//!
//! Entries are visited in document order and the first violation is returned.

use super::schema::{ConfigurationDocument, ModuleEntry};
use super::value::join_path;
use crate::error::{ConfigError, ConfigResult};
use std::collections::HashMap;

/// Pseudo module name used as the source of `global.startup` references.
pub const STARTUP_SOURCE: &str = "global.startup";

/// Runs all document-level checks.
pub fn validate_document(doc: &ConfigurationDocument) -> ConfigResult<()> {
    check_unique_names(doc.modules())?;
    check_startup(doc)?;
    check_connections(doc)?;
    Ok(())
}

fn check_unique_names(modules: &[ModuleEntry]) -> ConfigResult<()> {
    let mut seen: HashMap<&str, &ModuleEntry> = HashMap::with_capacity(modules.len());
    for entry in modules {
        if let Some(first) = seen.insert(entry.name.as_str(), entry) {
            return Err(ConfigError::schema(
                entry.key_path(),
                format!(
                    "module name '{}' is already used by '{}'",
                    entry.name,
                    first.key_path()
                ),
            ));
        }
    }
    Ok(())
}

fn check_startup(doc: &ConfigurationDocument) -> ConfigResult<()> {
    for (index, name) in doc.global().startup.iter().enumerate() {
        if !doc.contains(name) {
            return Err(ConfigError::Reference {
                source_module: STARTUP_SOURCE.to_string(),
                target: name.clone(),
                path: format!("{STARTUP_SOURCE}[{index}]"),
            });
        }
    }
    Ok(())
}

fn check_connections(doc: &ConfigurationDocument) -> ConfigResult<()> {
    for entry in doc.modules() {
        for (role, target) in &entry.connect {
            if !doc.contains(target) {
                return Err(ConfigError::Reference {
                    source_module: entry.name.clone(),
                    target: target.clone(),
                    path: join_path(&join_path(&entry.key_path(), "connect"), role),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::config::loader::load;
    use crate::error::{ConfigError, ErrorKind};

    #[test]
    fn test_dangling_connection_names_source_and_target() {
        let text = r#"
logic:
  spectrometer_logic:
    module.Class: 'spectrometer.spectrometer_logic.SpectrometerLogic'
    connect:
      spectrometer: missing_spectrometer
"#;
        match load(text).unwrap_err() {
            ConfigError::Reference {
                source_module,
                target,
                path,
            } => {
                assert_eq!(source_module, "spectrometer_logic");
                assert_eq!(target, "missing_spectrometer");
                assert_eq!(path, "logic.spectrometer_logic.connect.spectrometer");
            }
            other => panic!("expected reference error, got {other:?}"),
        }
    }

    #[test]
    fn test_cross_category_connections_allowed() {
        let text = r#"
gui:
  viewer:
    module.Class: 'viewer.Viewer'
    connect:
      camera: cam
hardware:
  cam:
    module.Class: 'camera.Dummy'
"#;
        assert!(load(text).is_ok());
    }

    #[test]
    fn test_name_collision_across_categories() {
        let text = r#"
logic:
  cam:
    module.Class: 'camera.CameraLogic'
hardware:
  cam:
    module.Class: 'camera.Dummy'
"#;
        let err = load(text).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(err.path(), Some("hardware.cam"));
        assert!(err.to_string().contains("logic.cam"));
    }

    #[test]
    fn test_unknown_startup_module() {
        let text = r#"
global:
  startup: [viewer]
"#;
        let err = load(text).unwrap_err();
        assert!(matches!(
            &err,
            ConfigError::Reference { source_module, target, .. }
                if source_module == "global.startup" && target == "viewer"
        ));
        assert_eq!(err.path(), Some("global.startup[0]"));
    }
}
