//! Hot-reload version registry.
//!
//! During development a rebuilt function gets a new version tag while its
//! bundle hash stays the same. The tag is looked up by `(bundle hash,
//! function name)` and spliced into the request path so the server routes to
//! the freshly compiled handler.

use std::collections::HashMap;
use std::sync::RwLock;
use tracing::info;

/// Lookup from `(bundle hash, function name)` to version tag.
#[derive(Debug, Default)]
pub struct VersionRegistry {
    bundles: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl VersionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the version tag of `name` in bundle `hash`.
    ///
    /// Returns the tag it replaced, if any.
    pub fn register(
        &self,
        hash: impl Into<String>,
        name: impl Into<String>,
        tag: impl Into<String>,
    ) -> Option<String> {
        let hash = hash.into();
        let name = name.into();
        let tag = tag.into();
        info!("Registered {}@{} as version {}", name, hash, tag);
        self.bundles
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(hash)
            .or_default()
            .insert(name, tag)
    }

    /// Replace every tag of a bundle at once, as after a full rebuild.
    pub fn register_bundle(&self, hash: impl Into<String>, tags: HashMap<String, String>) {
        let hash = hash.into();
        info!("Registered {} function versions for bundle {}", tags.len(), hash);
        self.bundles
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(hash, tags);
    }

    /// Version tag of `name` in bundle `hash`.
    pub fn resolve(&self, hash: &str, name: &str) -> Option<String> {
        self.bundles
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(hash)
            .and_then(|functions| functions.get(name))
            .cloned()
    }

    /// Forget a bundle.
    pub fn remove_bundle(&self, hash: &str) -> bool {
        self.bundles
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(hash)
            .is_some()
    }
}
