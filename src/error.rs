//! Error types for configuration loading and module wiring.
//!
//! This module defines `ConfigError`, the single error type returned by the
//! loader, the validators, the dependency graph and the module registry.
//! Using the `thiserror` crate, every variant renders a message that names the
//! offending key path so a user can find the problem in the file.
//!
//! ## Error Hierarchy
//!
//! - **`Syntax`**: the text is not well-formed YAML (includes duplicate keys).
//! - **`Schema`**: a required field is missing or a value has the wrong shape,
//!   e.g. a module entry without `module.Class`.
//! - **`Reference`**: a `connect` target or `startup` entry names a module that
//!   does not exist anywhere in the document.
//! - **`Type`**: a value cannot be coerced to the expected semantic type, e.g.
//!   a non-numeric port.
//! - **`Io`**: the configuration file could not be read.
//!
//! Lookup and registry failures (`UnknownModule`, `UnknownClass`, ...) are
//! reported through the same enum so callers can use `?` throughout.
//!
//! None of these are recoverable by retrying; a partially wired instrument
//! setup is never returned.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the configuration error type.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Broad category of a [`ConfigError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed structured text
    Syntax,
    /// Missing field or wrong container shape
    Schema,
    /// Dangling module reference
    Reference,
    /// Value not coercible to the expected type
    Type,
    /// File could not be read or document could not be written
    Io,
    /// Module or connection lookup on a loaded document failed
    Lookup,
    /// Module registry or instantiation failure
    Registry,
}

/// Errors raised while loading, validating or wiring a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The text is not well-formed YAML.
    #[error("Syntax error{}: {message}", location_suffix(.line, .column))]
    Syntax {
        /// Parser message
        message: String,
        /// 1-based line, when known
        line: Option<usize>,
        /// 1-based column, when known
        column: Option<usize>,
    },

    /// A required field is missing or a container has the wrong shape.
    #[error("Schema error at '{path}': {message}")]
    Schema {
        /// Dotted key path of the offending node
        path: String,
        /// What is wrong
        message: String,
    },

    /// A module refers to a module that is not declared.
    #[error("Reference error at '{path}': module '{source_module}' refers to unknown module '{target}'")]
    Reference {
        /// Module holding the reference (`global.startup` for the startup list)
        source_module: String,
        /// Name that could not be found
        target: String,
        /// Dotted key path of the reference
        path: String,
    },

    /// A value cannot be coerced to the expected type.
    #[error("Type error at '{path}': expected {expected}, found {found}")]
    Type {
        /// Dotted key path of the value
        path: String,
        /// Expected type
        expected: String,
        /// Description of the value found
        found: String,
    },

    /// The configuration file could not be read.
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The document could not be serialized.
    #[error("Failed to serialize configuration: {0}")]
    Emit(#[source] serde_yaml::Error),

    /// No module with this name is declared.
    #[error("Unknown module '{0}'")]
    UnknownModule(String),

    /// The module has no `connect` entry for this role.
    #[error("Module '{module}' has no connection named '{role}'")]
    UnknownConnection {
        /// Module whose connections were searched
        module: String,
        /// Requested role
        role: String,
    },

    /// The class of a module is not registered.
    #[error("Module '{module}' uses unregistered class '{class_path}'")]
    UnknownClass {
        /// Module being instantiated
        module: String,
        /// Its `module.Class` path
        class_path: String,
    },

    /// A class path was registered twice.
    #[error("Class '{0}' is already registered")]
    DuplicateClass(String),

    /// A module factory failed.
    #[error("Failed to instantiate module '{module}': {message}")]
    Instantiation {
        /// Module being instantiated
        module: String,
        /// Factory error with its context chain
        message: String,
    },

    /// Connections form a cycle; the path starts and ends at the same module.
    #[error("Dependency cycle between modules: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),
}

fn location_suffix(line: &Option<usize>, column: &Option<usize>) -> String {
    match (*line, *column) {
        (Some(line), Some(column)) => format!(" at line {line}, column {column}"),
        (Some(line), None) => format!(" at line {line}"),
        _ => String::new(),
    }
}

impl ConfigError {
    /// Returns the broad category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::Syntax { .. } => ErrorKind::Syntax,
            ConfigError::Schema { .. } => ErrorKind::Schema,
            ConfigError::Reference { .. } => ErrorKind::Reference,
            ConfigError::Type { .. } => ErrorKind::Type,
            ConfigError::Io { .. } | ConfigError::Emit(_) => ErrorKind::Io,
            ConfigError::UnknownModule(_) | ConfigError::UnknownConnection { .. } => {
                ErrorKind::Lookup
            }
            ConfigError::UnknownClass { .. }
            | ConfigError::DuplicateClass(_)
            | ConfigError::Instantiation { .. }
            | ConfigError::DependencyCycle(_) => ErrorKind::Registry,
        }
    }

    /// Returns the dotted key path this error points at, if it has one.
    pub fn path(&self) -> Option<&str> {
        match self {
            ConfigError::Schema { path, .. }
            | ConfigError::Reference { path, .. }
            | ConfigError::Type { path, .. } => Some(path.as_str()),
            _ => None,
        }
    }

    pub(crate) fn schema(path: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Schema {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn type_mismatch(
        path: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        ConfigError::Type {
            path: path.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        let location = err.location();
        ConfigError::Syntax {
            message: err.to_string(),
            line: location.as_ref().map(|l| l.line()),
            column: location.as_ref().map(|l| l.column()),
        }
    }
}
