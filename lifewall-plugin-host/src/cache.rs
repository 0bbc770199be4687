//! Compiled-script cache keyed by the SHA-256 of the plugin source.
//!
//! Only immutable ASTs are stored. Nothing a plugin does at runtime can
//! reach the cache, so a hit is indistinguishable from a fresh compile.

use crate::error::PluginError;
use crate::sandbox::{CompiledScript, PluginSandbox};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

const DEFAULT_CAPACITY: usize = 256;

pub struct ScriptCache {
    entries: Mutex<HashMap<String, CompiledScript>>,
    capacity: usize,
}

impl Default for ScriptCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl fmt::Debug for ScriptCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl ScriptCache {
    /// A cache holding at most `capacity` scripts. When full, it is emptied
    /// before the next insert.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn source_hash(source: &str) -> String {
        hex::encode(Sha256::digest(source.as_bytes()))
    }

    /// Returns the cached script for `source`, compiling it on a miss.
    /// Compile failures are not cached.
    pub fn get_or_compile(&self, sandbox: &PluginSandbox, source: &str) -> Result<CompiledScript, PluginError> {
        let key = Self::source_hash(source);
        if let Some(script) = self.entries.lock().get(&key) {
            debug!(hash = %key, "Script cache hit");
            return Ok(script.clone());
        }

        // Compile outside the lock.
        let script = sandbox.compile(source)?;

        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            debug!(capacity = self.capacity, "Script cache full, clearing");
            entries.clear();
        }
        entries.insert(key, script.clone());
        Ok(script)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
