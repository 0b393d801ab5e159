//! # DAQ Configuration Library
//!
//! Loads, validates and writes the setup documents of a modular lab
//! instrument framework. A setup document lists the GUI, logic and hardware
//! modules to load, the dotted `module.Class` path that implements each of
//! them, the `connect` wiring between modules, and a handful of global
//! settings (startup modules, remote module server, name server port, data
//! directory, stylesheet).
//!
//! ## Crate Structure
//!
//! - **`config`**: The document model, the YAML loader and writer, reference
//!   validation and the connection dependency graph.
//! - **`error`**: The `ConfigError` enum shared by every fallible operation.
//! - **`registry`**: Maps `module.Class` paths to descriptors and factories
//!   and instantiates configured modules in dependency order.
//! - **`shared`**: `ConfigHandle`, an atomically replaceable document for
//!   components that observe reloads.
//! - **`settings`**: Settings of the command-line tool (Figment).
//! - **`logging`**: Tracing subscriber setup.
//! - **`validation`**: Small validators for ports, hosts, paths and names.
//!
//! ## Example
//!
//! ```rust
//! use daq_config::{load, ModuleCategory};
//!
//! let doc = load(
//!     "global:\n  namespace_server_port: 18861\n\
//!      hardware:\n  laser:\n    module.Class: 'laser.laser_dummy.LaserDummy'\n",
//! )
//! .unwrap();
//!
//! assert_eq!(doc.global().namespace_server_port, 18861);
//! assert_eq!(doc.section(ModuleCategory::Hardware)[0].name, "laser");
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod registry;
pub mod settings;
pub mod shared;
pub mod validation;

pub use config::{
    get_section, load, load_file, resolve_connection, to_yaml_string, ConfigSource,
    ConfigurationDocument, DependencyGraph, GlobalSettings, ModuleCategory, ModuleEntry,
    OptionValue, RemoteServer, ValueKind,
};
pub use error::{ConfigError, ConfigResult, ErrorKind};
pub use registry::{Module, ModuleDescriptor, ModuleRegistry};
pub use shared::ConfigHandle;
