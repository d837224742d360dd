//! Compiled-schema cache with least-recently-used eviction.
//!
//! Lookups share a read lock and bump the entry's access stamp atomically.
//! Inserts take the write lock, re-check for a concurrent insert of the same
//! id, and evict the entries with the oldest stamps until the cache is back
//! within capacity. Stamps come from a logical clock, so they are strictly
//! increasing.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde_json::Value;

use crate::capability::SchemaSource;

/// Why a schema could not be compiled.
#[derive(Debug, thiserror::Error)]
pub(crate) enum SchemaCompileError {
    #[error("schema is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid schema: {0}")]
    Invalid(String),
}

/// A compiled schema plus its last access stamp.
pub(crate) struct CachedSchema {
    validator: jsonschema::Validator,
    last_access: AtomicU64,
}

impl CachedSchema {
    fn compile(source: &SchemaSource) -> Result<Self, SchemaCompileError> {
        let document: Value = serde_json::from_str(source.text())?;
        let validator = jsonschema::validator_for(&document)
            .map_err(|err| SchemaCompileError::Invalid(err.to_string()))?;
        Ok(Self {
            validator,
            last_access: AtomicU64::new(0),
        })
    }

    pub(crate) const fn validator(&self) -> &jsonschema::Validator {
        &self.validator
    }

    fn touch(&self, stamp: u64) {
        self.last_access.store(stamp, Ordering::Relaxed);
    }

    fn stamp(&self) -> u64 {
        self.last_access.load(Ordering::Relaxed)
    }
}

pub(crate) struct SchemaCache {
    capacity: usize,
    clock: AtomicU64,
    entries: RwLock<HashMap<String, Arc<CachedSchema>>>,
}

impl SchemaCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            clock: AtomicU64::new(0),
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Returns the compiled schema for `source`, compiling and caching it on
    /// a miss. A zero capacity or an empty id disables caching.
    pub(crate) fn get_or_compile(
        &self,
        source: &SchemaSource,
    ) -> Result<Arc<CachedSchema>, SchemaCompileError> {
        let id = source.id();
        if let Some(hit) = self.lookup(id) {
            return Ok(hit);
        }

        let compiled = Arc::new(CachedSchema::compile(source)?);
        tracing::debug!(schema_id = %id, "compiled json schema");
        if self.capacity == 0 || id.is_empty() {
            return Ok(compiled);
        }

        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(id) {
            existing.touch(self.tick());
            return Ok(Arc::clone(existing));
        }
        compiled.touch(self.tick());
        entries.insert(id.to_owned(), Arc::clone(&compiled));

        while entries.len() > self.capacity {
            let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stamp())
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            entries.remove(&oldest);
            tracing::debug!(
                schema_id = %oldest,
                capacity = self.capacity,
                "evicted least recently used schema"
            );
        }
        Ok(compiled)
    }

    fn lookup(&self, id: &str) -> Option<Arc<CachedSchema>> {
        let entries = self.entries.read();
        let hit = entries.get(id)?;
        hit.touch(self.tick());
        tracing::trace!(schema_id = %id, "schema cache hit");
        Some(Arc::clone(hit))
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub(crate) fn clear(&self) {
        self.entries.write().clear();
    }
}

impl fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
