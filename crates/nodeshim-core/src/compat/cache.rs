//! In-process preset memo.

use super::error::CompatError;
use super::preset::{PresetConfig, PresetProvider, PresetRequest};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Preset snapshots keyed by [`PresetRequest::cache_key`].
///
/// Lets watch-mode rebuilds reuse the snapshot instead of re-querying the
/// provider. Failed fetches are not cached.
#[derive(Debug, Default)]
pub struct PresetCache {
    entries: Mutex<HashMap<String, Arc<PresetConfig>>>,
}

impl PresetCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached snapshot for `request`, fetching it on a miss.
    pub fn get_or_fetch(
        &self,
        request: &PresetRequest,
        provider: &dyn PresetProvider,
    ) -> Result<Arc<PresetConfig>, CompatError> {
        let key = request.cache_key();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(preset) = entries.get(&key) {
            debug!(key = %key, "preset cache hit");
            return Ok(Arc::clone(preset));
        }

        let preset = Arc::new(provider.fetch(request)?);
        entries.insert(key, Arc::clone(&preset));
        Ok(preset)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
