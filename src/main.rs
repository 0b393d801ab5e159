//! CLI Entry Point for daq-config
//!
//! Inspects instrument setup documents without starting any module:
//! - `check`: load and validate a document
//! - `show`: list module entries
//! - `resolve`: follow one `connect` entry
//! - `order`: activation order of modules and their dependencies
//! - `dump`: re-emit the normalized document
//!
//! # Usage
//!
//! ```bash
//! daq-config check config/spectrometer.yml
//! daq-config show config/spectrometer.yml --category hardware --json
//! daq-config resolve config/spectrometer.yml spectrometer_logic spectrometer
//! daq-config order config/spectrometer.yml
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use daq_config::config::{
    self, ConfigurationDocument, DependencyGraph, ModuleCategory, ModuleEntry,
};
use daq_config::logging;
use daq_config::settings::{Settings, SETTINGS_FILE};
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "daq-config")]
#[command(about = "Validate and inspect instrument setup documents", long_about = None)]
struct Cli {
    /// Tool settings file
    #[arg(long, global = true, default_value = SETTINGS_FILE)]
    settings: PathBuf,

    /// Override the configured log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a setup document
    Check {
        /// Setup document (defaults to `config_path` from the settings)
        file: Option<PathBuf>,
    },

    /// List module entries
    Show {
        /// Setup document (defaults to `config_path` from the settings)
        file: Option<PathBuf>,

        /// Only list one category (gui, logic, hardware)
        #[arg(long)]
        category: Option<ModuleCategory>,

        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the module connected to `module` under `role`
    Resolve {
        /// Setup document
        file: PathBuf,
        /// Module whose connector is followed
        module: String,
        /// Connector role
        role: String,
    },

    /// Print the activation order of modules (dependencies first)
    Order {
        /// Setup document
        file: PathBuf,
        /// Modules to activate (defaults to `global.startup`)
        modules: Vec<String>,
    },

    /// Re-emit the normalized document as YAML
    Dump {
        /// Setup document (defaults to `config_path` from the settings)
        file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load_from(&cli.settings)
        .with_context(|| format!("Failed to load settings from {}", cli.settings.display()))?;
    if let Some(level) = cli.log_level {
        settings.log_level = level;
    }
    settings.validate().map_err(|e| anyhow!(e))?;
    logging::init_from_settings(&settings).map_err(|e| anyhow!(e))?;
    debug!(?settings, "Settings loaded");

    match cli.command {
        Commands::Check { file } => check(&load(file, &settings)?),
        Commands::Show { file, category, json } => show(&load(file, &settings)?, category, json),
        Commands::Resolve { file, module, role } => {
            resolve(&load(Some(file), &settings)?, &module, &role)
        }
        Commands::Order { file, modules } => order(&load(Some(file), &settings)?, &modules),
        Commands::Dump { file } => {
            print!("{}", config::to_yaml_string(&load(file, &settings)?)?);
            Ok(())
        }
    }
}

fn load(file: Option<PathBuf>, settings: &Settings) -> Result<ConfigurationDocument> {
    let path = file
        .or_else(|| settings.config_path.clone())
        .ok_or_else(|| anyhow!("No setup document given and no config_path in the settings"))?;
    info!(path = %path.display(), "Loading setup document");
    config::load_file(&path).with_context(|| format!("Invalid setup document {}", path.display()))
}

fn check(doc: &ConfigurationDocument) -> Result<()> {
    println!("OK: {} modules", doc.len());
    for (category, count) in doc.counts() {
        println!("  {:<9}{}", category.as_str(), count);
    }
    if !doc.extra_sections().is_empty() {
        let names: Vec<&str> = doc.extra_sections().keys().map(String::as_str).collect();
        println!("  extra sections: {}", names.join(", "));
    }
    Ok(())
}

fn show(doc: &ConfigurationDocument, category: Option<ModuleCategory>, json: bool) -> Result<()> {
    let entries: Vec<&ModuleEntry> = match category {
        Some(category) => doc.section(category),
        None => doc.modules().iter().collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for entry in entries {
        println!("{} ({})", entry.key_path(), entry.class_path);
        for (role, target) in &entry.connect {
            println!("    {} -> {}", role, target);
        }
    }
    Ok(())
}

fn resolve(doc: &ConfigurationDocument, module: &str, role: &str) -> Result<()> {
    let target = config::resolve_connection(doc, module, role)?;
    println!("{} ({})", target.key_path(), target.class_path);
    Ok(())
}

fn order(doc: &ConfigurationDocument, modules: &[String]) -> Result<()> {
    let roots = if modules.is_empty() {
        doc.global().startup.as_slice()
    } else {
        modules
    };
    if let Some(unknown) = roots.iter().find(|name| !doc.contains(name)) {
        return Err(anyhow!("Module '{}' is not declared", unknown));
    }

    let graph = DependencyGraph::from_document(doc);
    for name in graph.activation_order(roots)? {
        println!("{}", name);
    }
    Ok(())
}
