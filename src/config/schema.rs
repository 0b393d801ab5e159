//! Typed representation of an instrument configuration document.
//!
//! A document has one `global` section, three module sections (`gui`,
//! `logic`, `hardware`) and any number of extension sections that this crate
//! does not interpret but carries along unchanged.

use super::value::OptionValue;
use crate::error::{ConfigError, ConfigResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default port of the namespace (discovery) server.
pub const DEFAULT_NAMESPACE_SERVER_PORT: u16 = 18861;

/// Default bind address of the remote modules server.
pub const DEFAULT_REMOTE_ADDRESS: &str = "localhost";

/// Category a module belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleCategory {
    /// User interface panels
    Gui,
    /// Measurement and control logic
    Logic,
    /// Instrument drivers
    Hardware,
}

impl ModuleCategory {
    /// All categories in document order.
    pub const ALL: [ModuleCategory; 3] = [
        ModuleCategory::Gui,
        ModuleCategory::Logic,
        ModuleCategory::Hardware,
    ];

    /// Section name used in the configuration file.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleCategory::Gui => "gui",
            ModuleCategory::Logic => "logic",
            ModuleCategory::Hardware => "hardware",
        }
    }
}

impl fmt::Display for ModuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gui" => Ok(ModuleCategory::Gui),
            "logic" => Ok(ModuleCategory::Logic),
            "hardware" => Ok(ModuleCategory::Hardware),
            other => Err(format!(
                "Invalid module category '{}'. Must be one of: gui, logic, hardware",
                other
            )),
        }
    }
}

/// Address of the server exposing local modules to remote processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteServer {
    /// Host name or IP address to bind
    pub address: String,
    /// TCP port
    pub port: u16,
    /// TLS certificate file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certfile: Option<PathBuf>,
    /// TLS private key file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyfile: Option<PathBuf>,
}

/// Settings from the `global` section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalSettings {
    /// Modules to load at startup, in order
    pub startup: Vec<String>,
    /// Remote module server, if modules are shared over the network
    pub remote_modules_server: Option<RemoteServer>,
    /// Port of the namespace server
    pub namespace_server_port: u16,
    /// Root directory for saved data
    pub default_data_dir: Option<PathBuf>,
    /// Whether data is saved into per-day subdirectories
    pub daily_data_dirs: bool,
    /// GUI stylesheet file name
    pub stylesheet: Option<String>,
    /// Additional module search paths
    pub extensions: Vec<PathBuf>,
    /// Start with the manager window hidden
    pub hide_manager_window: bool,
    /// Pass arguments of remote calls by value instead of by reference
    pub force_remote_calls_by_value: bool,
    /// Unrecognized keys, preserved as-is
    pub extra: BTreeMap<String, OptionValue>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            startup: Vec::new(),
            remote_modules_server: None,
            namespace_server_port: DEFAULT_NAMESPACE_SERVER_PORT,
            default_data_dir: None,
            daily_data_dirs: true,
            stylesheet: None,
            extensions: Vec::new(),
            hide_manager_window: false,
            force_remote_calls_by_value: false,
            extra: BTreeMap::new(),
        }
    }
}

/// One loadable module declared in a category section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleEntry {
    /// Section the entry was declared in
    pub category: ModuleCategory,
    /// Unique module name
    pub name: String,
    /// Dotted implementation path, e.g. `spectrometer.spectrometer_dummy.SpectrometerDummy`
    pub class_path: String,
    /// Connector role -> name of the module fulfilling it
    pub connect: BTreeMap<String, String>,
    /// Whether the module may be accessed by remote clients
    pub allow_remote: bool,
    /// Module-specific options
    pub options: BTreeMap<String, OptionValue>,
}

impl ModuleEntry {
    /// Creates an entry with no connections or options.
    pub fn new(
        category: ModuleCategory,
        name: impl Into<String>,
        class_path: impl Into<String>,
    ) -> Self {
        Self {
            category,
            name: name.into(),
            class_path: class_path.into(),
            connect: BTreeMap::new(),
            allow_remote: false,
            options: BTreeMap::new(),
        }
    }

    /// Dotted key path of this entry, e.g. `logic.spectrometer_logic`.
    pub fn key_path(&self) -> String {
        format!("{}.{}", self.category, self.name)
    }

    /// Target module name for a connector role.
    pub fn connection(&self, role: &str) -> Option<&str> {
        self.connect.get(role).map(String::as_str)
    }

    /// Value of an option.
    pub fn option(&self, key: &str) -> Option<&OptionValue> {
        self.options.get(key)
    }
}

/// A fully loaded and validated configuration.
///
/// Documents are only produced by the loader and are read-only afterwards;
/// they can be shared between threads behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigurationDocument {
    global: GlobalSettings,
    modules: Vec<ModuleEntry>,
    extra_sections: BTreeMap<String, serde_yaml::Value>,
}

impl ConfigurationDocument {
    pub(crate) fn from_parts(
        global: GlobalSettings,
        modules: Vec<ModuleEntry>,
        extra_sections: BTreeMap<String, serde_yaml::Value>,
    ) -> Self {
        Self {
            global,
            modules,
            extra_sections,
        }
    }

    /// Global runtime settings.
    pub fn global(&self) -> &GlobalSettings {
        &self.global
    }

    /// All module entries, in document order.
    pub fn modules(&self) -> &[ModuleEntry] {
        &self.modules
    }

    /// Number of module entries across all categories.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the document declares no modules at all.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Entries of one category, in document order.
    pub fn section(&self, category: ModuleCategory) -> Vec<&ModuleEntry> {
        self.modules
            .iter()
            .filter(|entry| entry.category == category)
            .collect()
    }

    /// Looks up a module by name in any category.
    pub fn module(&self, name: &str) -> Option<&ModuleEntry> {
        self.modules.iter().find(|entry| entry.name == name)
    }

    /// Whether a module with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.module(name).is_some()
    }

    /// Resolves the module connected to `module_name` under `role_name`.
    pub fn resolve_connection(&self, module_name: &str, role_name: &str) -> ConfigResult<&ModuleEntry> {
        let entry = self
            .module(module_name)
            .ok_or_else(|| ConfigError::UnknownModule(module_name.to_string()))?;
        let target = entry
            .connection(role_name)
            .ok_or_else(|| ConfigError::UnknownConnection {
                module: module_name.to_string(),
                role: role_name.to_string(),
            })?;
        // Targets are checked at load time, so this only fails for documents
        // assembled by hand inside the crate.
        self.module(target)
            .ok_or_else(|| ConfigError::UnknownModule(target.to_string()))
    }

    /// Top-level sections this crate does not interpret.
    pub fn extra_sections(&self) -> &BTreeMap<String, serde_yaml::Value> {
        &self.extra_sections
    }

    /// Number of entries per category, in category order.
    pub fn counts(&self) -> [(ModuleCategory, usize); 3] {
        ModuleCategory::ALL.map(|category| (category, self.section(category).len()))
    }
}
