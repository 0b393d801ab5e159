//! Dependency tracking for module connections.
//!
//! Every `connect` entry makes one module depend on another. This module
//! keeps those edges in both directions, which is needed for:
//! - Activating modules in the right order (dependencies first)
//! - Deactivating everything that uses a module before the module itself
//! - Refusing to unload a module that other modules are connected to
//!
//! # Example
//!
//! ```rust
//! use daq_config::config::dependencies::DependencyGraph;
//!
//! let mut graph = DependencyGraph::new();
//!
//! // "spectrum_gui" uses "spectrometer_logic", which uses the "spectrometer" hardware
//! graph.add_assignment("spectrum_gui", "spectrometer_logic", "spectrometer_logic");
//! graph.add_assignment("spectrometer_logic", "spectrometer", "spectrometer");
//!
//! let order = graph.activation_order(&["spectrum_gui"]).unwrap();
//! assert_eq!(order, ["spectrometer", "spectrometer_logic", "spectrum_gui"]);
//!
//! // The hardware cannot be unloaded while the logic is connected to it
//! assert!(graph.can_remove("spectrometer").is_err());
//! ```

use super::schema::ConfigurationDocument;
use crate::error::{ConfigError, ConfigResult};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Graph of module-to-module connections.
///
/// # Architecture
///
/// - Forward map: `module` → `role` → `target` (one target per role)
/// - Reverse map: `target` → set of `(module, role)` pairs
/// - Roles are visited in sorted order, so traversals are deterministic
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    module_to_targets: BTreeMap<String, BTreeMap<String, String>>,
    target_to_modules: HashMap<String, BTreeSet<(String, String)>>,
}

impl DependencyGraph {
    /// Creates a new empty dependency graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the graph from every `connect` mapping in a document.
    pub fn from_document(doc: &ConfigurationDocument) -> Self {
        let mut graph = Self::new();
        for entry in doc.modules() {
            for (role, target) in &entry.connect {
                graph.add_assignment(&entry.name, role, target);
            }
        }
        graph
    }

    /// Records that `module` uses `target` under connector `role`.
    ///
    /// A role holds a single target; assigning it again replaces the
    /// previous target.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use daq_config::config::dependencies::DependencyGraph;
    /// let mut graph = DependencyGraph::new();
    /// graph.add_assignment("odmr_logic", "microwave", "mw_source");
    /// graph.add_assignment("odmr_logic", "microwave", "mw_source_2");
    ///
    /// assert!(graph.get_dependents("mw_source").is_empty());
    /// assert_eq!(graph.get_dependents("mw_source_2").len(), 1);
    /// ```
    pub fn add_assignment(&mut self, module: &str, role: &str, target: &str) {
        let previous = self
            .module_to_targets
            .entry(module.to_string())
            .or_default()
            .insert(role.to_string(), target.to_string());

        if let Some(previous) = previous {
            if let Some(users) = self.target_to_modules.get_mut(&previous) {
                users.remove(&(module.to_string(), role.to_string()));
            }
        }

        self.target_to_modules
            .entry(target.to_string())
            .or_default()
            .insert((module.to_string(), role.to_string()));
    }

    /// Removes all connections from `module` to `target`, whatever the role.
    pub fn remove_assignment(&mut self, module: &str, target: &str) {
        if let Some(roles) = self.module_to_targets.get_mut(module) {
            roles.retain(|_, t| t != target);
        }
        if let Some(users) = self.target_to_modules.get_mut(target) {
            users.retain(|(m, _)| m != module);
        }
    }

    /// Removes every connection originating from `module`.
    pub fn remove_module(&mut self, module: &str) {
        if let Some(roles) = self.module_to_targets.remove(module) {
            for (role, target) in roles {
                if let Some(users) = self.target_to_modules.get_mut(&target) {
                    users.remove(&(module.to_string(), role));
                }
            }
        }
    }

    /// Removes every connection pointing at `target`.
    pub fn remove_all(&mut self, target: &str) {
        if let Some(users) = self.target_to_modules.remove(target) {
            for (module, role) in users {
                if let Some(roles) = self.module_to_targets.get_mut(&module) {
                    roles.remove(&role);
                }
            }
        }
    }

    /// Returns `(module, role)` pairs of all modules connected to `target`.
    pub fn get_dependents(&self, target: &str) -> Vec<(String, String)> {
        self.target_to_modules
            .get(target)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns `(role, target)` pairs of the connections of `module`.
    pub fn dependencies_of(&self, module: &str) -> Vec<(String, String)> {
        self.module_to_targets
            .get(module)
            .map(|roles| {
                roles
                    .iter()
                    .map(|(role, target)| (role.clone(), target.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Checks if a module can be unloaded without breaking connections.
    ///
    /// # Returns
    ///
    /// - `Ok(())` if nothing is connected to `target`
    /// - `Err(modules)` with the names of the modules connected to it
    pub fn can_remove(&self, target: &str) -> Result<(), Vec<String>> {
        let mut modules: Vec<String> = self
            .get_dependents(target)
            .into_iter()
            .map(|(module, _)| module)
            .collect();
        modules.dedup();
        if modules.is_empty() {
            Ok(())
        } else {
            Err(modules)
        }
    }

    /// Orders `roots` and all of their transitive dependencies so that every
    /// module comes after the modules it is connected to.
    ///
    /// Fails with [`ConfigError::DependencyCycle`] when connections form a
    /// cycle; the error lists the modules on the cycle.
    pub fn activation_order<S: AsRef<str>>(&self, roots: &[S]) -> ConfigResult<Vec<String>> {
        let mut order = Vec::new();
        let mut done = HashSet::new();
        let mut path = Vec::new();
        for root in roots {
            self.visit_dependencies(root.as_ref(), &mut done, &mut path, &mut order)?;
        }
        Ok(order)
    }

    fn visit_dependencies(
        &self,
        module: &str,
        done: &mut HashSet<String>,
        path: &mut Vec<String>,
        order: &mut Vec<String>,
    ) -> ConfigResult<()> {
        if done.contains(module) {
            return Ok(());
        }
        if let Some(start) = path.iter().position(|m| m == module) {
            let mut cycle = path[start..].to_vec();
            cycle.push(module.to_string());
            return Err(ConfigError::DependencyCycle(cycle));
        }

        path.push(module.to_string());
        if let Some(roles) = self.module_to_targets.get(module) {
            for target in roles.values() {
                self.visit_dependencies(target, done, path, order)?;
            }
        }
        path.pop();

        done.insert(module.to_string());
        order.push(module.to_string());
        Ok(())
    }

    /// Lists `module` and everything that transitively depends on it, in
    /// the order they have to be deactivated (deepest dependent first,
    /// `module` last).
    pub fn deactivation_order(&self, module: &str) -> Vec<String> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        self.visit_dependents(module, &mut seen, &mut order);
        order
    }

    fn visit_dependents(&self, module: &str, seen: &mut HashSet<String>, order: &mut Vec<String>) {
        if !seen.insert(module.to_string()) {
            return;
        }
        if let Some(users) = self.target_to_modules.get(module) {
            for (user, _) in users {
                self.visit_dependents(user, seen, order);
            }
        }
        order.push(module.to_string());
    }
}
