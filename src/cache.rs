//! In-process cache of fully-resolved include sources

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::document::Document;
use crate::error::{Error, Result};

/// Memo of include sources whose own includes have been fully resolved,
/// keyed by source identity (`local:ci/base.yml`, `project:group/x/ci.yml@v1`).
///
/// One cache lives for one compilation run and may be shared by the worker
/// threads of that run. Entries are immutable once inserted and only ever
/// accumulate, so a pipeline that aborts half-way leaves the cache
/// consistent.
#[derive(Debug, Clone, Default)]
pub struct SourceCache {
    cache: Arc<Mutex<HashMap<String, Arc<Document>>>>,
}

impl SourceCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached document, or compute and cache it if not present
    pub fn get_or_process<F>(&self, key: &str, processor: F) -> Result<Arc<Document>>
    where
        F: FnOnce() -> Result<Document>,
    {
        if let Some(cached) = self.get(key)? {
            return Ok(cached);
        }

        // Computed outside the lock; concurrent misses may both process, and
        // the results are identical.
        let result = Arc::new(processor()?);
        self.insert(key, Arc::clone(&result))?;
        Ok(result)
    }

    /// Manually insert a value into the cache
    pub fn insert(&self, key: &str, value: Arc<Document>) -> Result<()> {
        let mut cache = self.lock()?;
        cache.insert(key.to_string(), value);
        Ok(())
    }

    /// Get a value from cache without computing
    pub fn get(&self, key: &str) -> Result<Option<Arc<Document>>> {
        let cache = self.lock()?;
        Ok(cache.get(key).cloned())
    }

    /// Check if a key exists in cache
    pub fn contains(&self, key: &str) -> Result<bool> {
        let cache = self.lock()?;
        Ok(cache.contains_key(key))
    }

    /// Get the number of cached entries
    pub fn len(&self) -> Result<usize> {
        let cache = self.lock()?;
        Ok(cache.len())
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Arc<Document>>>> {
        self.cache.lock().map_err(|_| Error::LockPoisoned {
            context: "include source cache".to_string(),
        })
    }
}
