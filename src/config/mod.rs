//! Declarative instrument setup configuration.
//!
//! A setup document declares which modules (GUI panels, logic controllers,
//! hardware drivers) are loaded, how they are connected to each other, and a
//! few global runtime settings.
//!
//! # Architecture
//!
//! The configuration system consists of these layers:
//!
//! 1. **Schema** - Rust types for the document (`schema`, `value`)
//! 2. **Loader** - YAML parsing with key-path aware errors (`loader`)
//! 3. **Validation** - Cross-entry checks: unique names, references (`validation`)
//! 4. **Writer** - Serialization back into the file format (`writer`)
//! 5. **Dependencies** - Connection graph and activation order (`dependencies`)
//!
//! # Example Configuration
//!
//! ```yaml
//! global:
//!   startup: [spectrometer_gui]
//!   remote_modules_server: {address: localhost, port: 12345}
//!   namespace_server_port: 18861
//!   default_data_dir: /data
//!   stylesheet: dark.qss
//!
//! gui:
//!   spectrometer_gui:
//!     module.Class: 'spectrometer.spectrometer_gui.SpectrometerGui'
//!     connect:
//!       spectrometer_logic: spectrometer_logic
//!
//! logic:
//!   spectrometer_logic:
//!     module.Class: 'spectrometer_logic.SpectrometerLogic'
//!     connect:
//!       spectrometer: myspectrometer
//!
//! hardware:
//!   myspectrometer:
//!     module.Class: 'spectrometer.spectrometer_dummy.SpectrometerDummy'
//! ```
//!
//! # Usage
//!
//! ```rust
//! use daq_config::config::{self, ModuleCategory};
//!
//! let doc = config::load(
//!     "logic:\n  fit:\n    module.Class: 'fit.FitLogic'\n    connect: {data: dev}\n\
//!      hardware:\n  dev:\n    module.Class: 'dummy.Device'\n",
//! )
//! .unwrap();
//!
//! assert_eq!(config::get_section(&doc, ModuleCategory::Hardware).len(), 1);
//! let dev = config::resolve_connection(&doc, "fit", "data").unwrap();
//! assert_eq!(dev.name, "dev");
//! ```

pub mod dependencies;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod value;
pub mod writer;

// Re-exports for convenience
pub use dependencies::DependencyGraph;
pub use loader::{load, load_file, ConfigSource};
pub use schema::{
    ConfigurationDocument, GlobalSettings, ModuleCategory, ModuleEntry, RemoteServer,
};
pub use value::{OptionValue, ValueKind};
pub use writer::{to_yaml_string, to_yaml_value};

use crate::error::ConfigResult;

/// Entries of one category, in document order.
pub fn get_section(doc: &ConfigurationDocument, category: ModuleCategory) -> Vec<&ModuleEntry> {
    doc.section(category)
}

/// Resolves the module fulfilling `role_name` for `module_name`.
///
/// Fails with `UnknownModule` or `UnknownConnection` when either name is
/// not declared.
pub fn resolve_connection<'a>(
    doc: &'a ConfigurationDocument,
    module_name: &str,
    role_name: &str,
) -> ConfigResult<&'a ModuleEntry> {
    doc.resolve_connection(module_name, role_name)
}
