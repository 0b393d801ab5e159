//! Shared, atomically replaceable configuration.
//!
//! A loaded [`ConfigurationDocument`] is immutable. Components that need the
//! current configuration hold a [`ConfigHandle`] and take cheap `Arc`
//! snapshots; a reload builds a completely new document and swaps it in, so
//! readers never observe a half-updated configuration.

use crate::config::{ConfigSource, ConfigurationDocument};
use crate::error::ConfigResult;
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info};

/// Publishes the current document of one configuration source.
#[derive(Debug)]
pub struct ConfigHandle {
    source: ConfigSource,
    current: ArcSwap<ConfigurationDocument>,
    generation: AtomicU64,
}

impl ConfigHandle {
    /// Loads the source and publishes the result as generation 0.
    pub fn load(source: impl Into<ConfigSource>) -> ConfigResult<Self> {
        let source = source.into();
        let doc = source.load()?;
        Ok(Self {
            source,
            current: ArcSwap::from_pointee(doc),
            generation: AtomicU64::new(0),
        })
    }

    /// The source this handle reloads from.
    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    /// Snapshot of the currently published document.
    pub fn current(&self) -> Arc<ConfigurationDocument> {
        self.current.load_full()
    }

    /// Number of successful swaps since the handle was created.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Loads the source again and publishes the new document.
    ///
    /// On failure the previously published document stays in place and the
    /// error is returned.
    pub fn reload(&self) -> ConfigResult<Arc<ConfigurationDocument>> {
        match self.source.load() {
            Ok(doc) => Ok(self.replace(doc)),
            Err(e) => {
                error!("Failed to reload config: {}. Keeping current configuration.", e);
                Err(e)
            }
        }
    }

    /// Publishes an already loaded document.
    pub fn replace(&self, doc: ConfigurationDocument) -> Arc<ConfigurationDocument> {
        let doc = Arc::new(doc);
        self.current.store(Arc::clone(&doc));
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        info!(generation, modules = doc.len(), "Published configuration");
        doc
    }

    /// Watches a file source and reloads on every change.
    ///
    /// The returned watcher stops when dropped. Text sources have nothing to
    /// watch and are rejected.
    #[cfg(feature = "hot_reload")]
    pub fn watch(handle: &Arc<Self>) -> Result<notify::RecommendedWatcher, notify::Error> {
        use notify::{Event, RecursiveMode, Watcher};

        let ConfigSource::File(path) = &handle.source else {
            return Err(notify::Error::generic(
                "only file-backed configurations can be watched",
            ));
        };

        let path = path.clone();
        let reloader = Arc::clone(handle);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if event.kind.is_modify() || event.kind.is_create() {
                    info!("Config file change detected, reloading...");
                    // reload() logs and keeps the previous document on failure
                    let _ = reloader.reload();
                }
            }
            Err(e) => error!("Watch error: {:?}", e),
        })?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;
        info!(path = %path.display(), "Config watcher started");
        Ok(watcher)
    }
}
