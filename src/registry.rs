//! Module registry for instantiating configured modules.
//!
//! Every module entry names its implementation with a dotted `module.Class`
//! path. The registry maps those paths to a [`ModuleDescriptor`]: the
//! connectors and options the implementation expects, plus a factory that
//! builds it. Implementations are registered explicitly at startup; nothing is
//! discovered or imported dynamically.
//!
//! # Example Usage
//!
//! ```rust
//! use daq_config::config::{self, ModuleCategory, ValueKind};
//! use daq_config::registry::{
//!     ConfigOption, Connector, Module, ModuleContext, ModuleDescriptor, ModuleRegistry,
//! };
//!
//! struct Spectrometer {
//!     name: String,
//! }
//!
//! impl Module for Spectrometer {
//!     fn name(&self) -> &str {
//!         &self.name
//!     }
//! }
//!
//! let mut registry = ModuleRegistry::new();
//! registry
//!     .register(
//!         ModuleDescriptor::new(
//!             "spectrometer.spectrometer_dummy.SpectrometerDummy",
//!             ModuleCategory::Hardware,
//!             |ctx: ModuleContext<'_>| {
//!                 Ok(Box::new(Spectrometer { name: ctx.name().to_string() }) as Box<dyn Module>)
//!             },
//!         )
//!         .option(ConfigOption::new("exposure").with_default(0.1).expect(ValueKind::Float)),
//!     )
//!     .unwrap();
//!
//! let doc = config::load(
//!     "hardware:\n  myspectrometer:\n    module.Class: 'spectrometer.spectrometer_dummy.SpectrometerDummy'\n",
//! )
//! .unwrap();
//!
//! registry.check_document(&doc).unwrap();
//! let module = registry.instantiate(&doc, "myspectrometer").unwrap();
//! assert_eq!(module.name(), "myspectrometer");
//! ```

use crate::config::dependencies::DependencyGraph;
use crate::config::{ConfigurationDocument, ModuleCategory, ModuleEntry, OptionValue, ValueKind};
use crate::error::{ConfigError, ConfigResult};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, info, warn};

// =============================================================================
// Module trait
// =============================================================================

/// A module instance produced by a registered factory.
pub trait Module: Send {
    /// Name of the configuration entry this instance was built from.
    fn name(&self) -> &str;

    /// Called when the module is brought up.
    fn on_activate(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called before the module is torn down.
    fn on_deactivate(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Builds a module from its resolved configuration.
pub type ModuleFactory =
    Box<dyn Fn(ModuleContext<'_>) -> anyhow::Result<Box<dyn Module>> + Send + Sync>;

// =============================================================================
// Declarations
// =============================================================================

/// What to do when a declared option is absent from a module entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPolicy {
    /// Reject the document
    Error,
    /// Log a warning and use the default
    Warn,
    /// Log at info level and use the default
    Info,
    /// Silently use the default
    Nothing,
}

/// A connector a module class expects in its `connect` mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connector {
    /// Role name used as key under `connect`
    pub name: String,
    /// Interface the connected module has to provide
    pub interface: String,
    /// Whether the connection may be left out
    pub optional: bool,
}

impl Connector {
    /// Declares a required connector for `interface` under the role `name`.
    pub fn new(name: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interface: interface.into(),
            optional: false,
        }
    }

    /// Marks the connector as optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// An option a module class reads from its entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigOption {
    /// Key in the module entry
    pub name: String,
    /// Value used when the key is absent
    pub default: Option<OptionValue>,
    /// Reaction to an absent key
    pub missing: MissingPolicy,
    /// Expected shape of the value, if constrained
    pub kind: Option<ValueKind>,
}

impl ConfigOption {
    /// Declares an option that is required unless a default is set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            missing: MissingPolicy::Error,
            kind: None,
        }
    }

    /// Sets the default value. Options with a default warn when missing
    /// unless another policy is set afterwards.
    pub fn with_default(mut self, default: impl Into<OptionValue>) -> Self {
        self.default = Some(default.into());
        if self.missing == MissingPolicy::Error {
            self.missing = MissingPolicy::Warn;
        }
        self
    }

    /// Sets the reaction to an absent key.
    pub fn missing(mut self, policy: MissingPolicy) -> Self {
        self.missing = policy;
        self
    }

    /// Constrains the shape of the value.
    pub fn expect(mut self, kind: ValueKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

/// Registration record for one implementation class.
pub struct ModuleDescriptor {
    class_path: String,
    category: ModuleCategory,
    interfaces: Vec<String>,
    connectors: Vec<Connector>,
    options: Vec<ConfigOption>,
    factory: ModuleFactory,
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("class_path", &self.class_path)
            .field("category", &self.category)
            .field("interfaces", &self.interfaces)
            .field("connectors", &self.connectors)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ModuleDescriptor {
    /// Describes the class at `class_path`, built by `factory`.
    pub fn new<F>(class_path: impl Into<String>, category: ModuleCategory, factory: F) -> Self
    where
        F: Fn(ModuleContext<'_>) -> anyhow::Result<Box<dyn Module>> + Send + Sync + 'static,
    {
        Self {
            class_path: class_path.into(),
            category,
            interfaces: Vec::new(),
            connectors: Vec::new(),
            options: Vec::new(),
            factory: Box::new(factory),
        }
    }

    /// Declares an interface this class provides to modules connected to it.
    pub fn provides(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Declares a connector.
    pub fn connector(mut self, connector: Connector) -> Self {
        self.connectors.push(connector);
        self
    }

    /// Declares an option.
    pub fn option(mut self, option: ConfigOption) -> Self {
        self.options.push(option);
        self
    }

    /// Dotted class path this descriptor is registered under.
    pub fn class_path(&self) -> &str {
        &self.class_path
    }

    /// Section the class belongs in.
    pub fn category(&self) -> ModuleCategory {
        self.category
    }

    /// Interfaces declared with [`provides`](Self::provides).
    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    /// Whether the class satisfies a connector asking for `interface`.
    ///
    /// A class always implements its own class name (the last path segment).
    pub fn implements(&self, interface: &str) -> bool {
        let class_name = self.class_path.rsplit('.').next().unwrap_or_default();
        class_name == interface || self.interfaces.iter().any(|i| i == interface)
    }

    /// Declared connectors.
    pub fn connectors(&self) -> &[Connector] {
        &self.connectors
    }

    /// Declared options.
    pub fn options(&self) -> &[ConfigOption] {
        &self.options
    }

    /// Checks one entry against this declaration and returns its options
    /// with defaults filled in.
    ///
    /// Connection targets are not looked at here; see
    /// [`ModuleRegistry::check_document`].
    pub fn check(&self, entry: &ModuleEntry) -> ConfigResult<BTreeMap<String, OptionValue>> {
        let path = entry.key_path();

        if entry.category != self.category {
            return Err(ConfigError::schema(
                &path,
                format!(
                    "class '{}' is a {} module but is declared in section '{}'",
                    self.class_path, self.category, entry.category
                ),
            ));
        }

        for connector in &self.connectors {
            if !connector.optional && !entry.connect.contains_key(&connector.name) {
                return Err(ConfigError::schema(
                    format!("{path}.connect.{}", connector.name),
                    format!(
                        "missing required connector '{}' (interface {})",
                        connector.name, connector.interface
                    ),
                ));
            }
        }

        for role in entry.connect.keys() {
            if !self.connectors.iter().any(|c| &c.name == role) {
                warn!(module = %entry.name, role = %role, "Connection is not declared by class {}", self.class_path);
            }
        }

        self.resolve_options(entry)
    }

    /// Option values for an entry with defaults filled in.
    ///
    /// Undeclared options are passed through unchanged.
    pub fn resolve_options(&self, entry: &ModuleEntry) -> ConfigResult<BTreeMap<String, OptionValue>> {
        let path = entry.key_path();
        let mut resolved = entry.options.clone();

        for option in &self.options {
            let option_path = format!("{path}.{}", option.name);
            match entry.options.get(&option.name) {
                Some(value) => {
                    if let Some(kind) = option.kind {
                        if !value.satisfies(kind) {
                            return Err(ConfigError::type_mismatch(
                                option_path,
                                kind.to_string(),
                                value.kind().to_string(),
                            ));
                        }
                    }
                }
                None => {
                    match option.missing {
                        MissingPolicy::Error => {
                            return Err(ConfigError::schema(
                                option_path,
                                "missing required option",
                            ))
                        }
                        MissingPolicy::Warn => warn!(
                            module = %entry.name,
                            option = %option.name,
                            "Option missing from configuration, using default {:?}",
                            option.default
                        ),
                        MissingPolicy::Info => info!(
                            module = %entry.name,
                            option = %option.name,
                            "Option missing from configuration, using default {:?}",
                            option.default
                        ),
                        MissingPolicy::Nothing => {}
                    }
                    if let Some(default) = &option.default {
                        resolved.insert(option.name.clone(), default.clone());
                    }
                }
            }
        }

        Ok(resolved)
    }
}

// =============================================================================
// Module context
// =============================================================================

/// Everything a factory needs to build a module.
#[derive(Debug)]
pub struct ModuleContext<'a> {
    entry: &'a ModuleEntry,
    connections: BTreeMap<String, &'a ModuleEntry>,
    options: BTreeMap<String, OptionValue>,
}

impl<'a> ModuleContext<'a> {
    /// Name of the entry being built.
    pub fn name(&self) -> &'a str {
        &self.entry.name
    }

    /// The entry being built.
    pub fn entry(&self) -> &'a ModuleEntry {
        self.entry
    }

    /// Entry connected under `role`.
    pub fn connection(&self, role: &str) -> Option<&'a ModuleEntry> {
        self.connections.get(role).copied()
    }

    /// Option value with defaults applied.
    pub fn option(&self, name: &str) -> Option<&OptionValue> {
        self.options.get(name)
    }

    /// All option values with defaults applied.
    pub fn options(&self) -> &BTreeMap<String, OptionValue> {
        &self.options
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Maps class paths to module descriptors.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    descriptors: HashMap<String, ModuleDescriptor>,
}

impl ModuleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a descriptor. Each class path can only be registered once.
    pub fn register(&mut self, descriptor: ModuleDescriptor) -> ConfigResult<()> {
        if self.descriptors.contains_key(&descriptor.class_path) {
            return Err(ConfigError::DuplicateClass(descriptor.class_path));
        }
        debug!(class = %descriptor.class_path, category = %descriptor.category, "Registered module class");
        self.descriptors
            .insert(descriptor.class_path.clone(), descriptor);
        Ok(())
    }

    /// Descriptor registered under `class_path`.
    pub fn get(&self, class_path: &str) -> Option<&ModuleDescriptor> {
        self.descriptors.get(class_path)
    }

    /// Whether `class_path` is registered.
    pub fn contains(&self, class_path: &str) -> bool {
        self.descriptors.contains_key(class_path)
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Registered class paths, sorted.
    pub fn class_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.descriptors.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    /// Checks every entry with a registered class against its declaration.
    ///
    /// Entries whose class is not registered are only logged; they may be
    /// provided by another process.
    pub fn check_document(&self, doc: &ConfigurationDocument) -> ConfigResult<()> {
        for entry in doc.modules() {
            match self.descriptors.get(&entry.class_path) {
                Some(descriptor) => {
                    self.check_entry(doc, entry, descriptor)?;
                }
                None => warn!(
                    module = %entry.name,
                    class = %entry.class_path,
                    "No registered implementation for module class"
                ),
            }
        }
        Ok(())
    }

    /// Checks an entry against its descriptor and every connection target
    /// against the interface of the connector it is wired to.
    fn check_entry(
        &self,
        doc: &ConfigurationDocument,
        entry: &ModuleEntry,
        descriptor: &ModuleDescriptor,
    ) -> ConfigResult<BTreeMap<String, OptionValue>> {
        let options = descriptor.check(entry)?;

        for connector in descriptor.connectors() {
            let Some(target_name) = entry.connect.get(&connector.name) else {
                continue;
            };
            let target = doc.resolve_connection(&entry.name, &connector.name)?;
            match self.descriptors.get(&target.class_path) {
                Some(target_descriptor) if !target_descriptor.implements(&connector.interface) => {
                    return Err(ConfigError::schema(
                        format!("{}.connect.{}", entry.key_path(), connector.name),
                        format!(
                            "module '{}' (class {}) does not provide interface '{}'",
                            target_name, target.class_path, connector.interface
                        ),
                    ));
                }
                Some(_) => {}
                None => warn!(
                    module = %entry.name,
                    role = %connector.name,
                    target = %target_name,
                    "Connected class {} is not registered, skipping interface check",
                    target.class_path
                ),
            }
        }

        Ok(options)
    }

    /// Builds the module declared under `name`.
    pub fn instantiate(
        &self,
        doc: &ConfigurationDocument,
        name: &str,
    ) -> ConfigResult<Box<dyn Module>> {
        let entry = doc
            .module(name)
            .ok_or_else(|| ConfigError::UnknownModule(name.to_string()))?;
        let descriptor =
            self.descriptors
                .get(&entry.class_path)
                .ok_or_else(|| ConfigError::UnknownClass {
                    module: entry.name.clone(),
                    class_path: entry.class_path.clone(),
                })?;

        let options = self.check_entry(doc, entry, descriptor)?;

        let mut connections = BTreeMap::new();
        for role in entry.connect.keys() {
            connections.insert(role.clone(), doc.resolve_connection(name, role)?);
        }

        let context = ModuleContext {
            entry,
            connections,
            options,
        };

        let module = (descriptor.factory)(context).map_err(|e| ConfigError::Instantiation {
            module: name.to_string(),
            message: format!("{e:#}"),
        })?;

        info!(module = %name, class = %entry.class_path, "Instantiated module");
        Ok(module)
    }

    /// Builds the startup modules and all of their dependencies,
    /// dependencies first.
    pub fn instantiate_startup(
        &self,
        doc: &ConfigurationDocument,
    ) -> ConfigResult<Vec<Box<dyn Module>>> {
        let graph = DependencyGraph::from_document(doc);
        let order = graph.activation_order(doc.global().startup.as_slice())?;
        debug!(order = ?order, "Resolved startup activation order");
        order
            .iter()
            .map(|name| self.instantiate(doc, name))
            .collect()
    }
}
