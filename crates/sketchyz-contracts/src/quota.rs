use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};

pub const GENERATION_COUNT_KEY: &str = "sketchyz_gen_count";
pub const MAX_GENERATIONS: u64 = 5;

/// Named integers that survive restarts (the app's "local storage").
pub trait ScalarStore: Send + Sync {
    fn get(&self, key: &str) -> Option<i64>;
    fn set(&self, key: &str, value: i64) -> anyhow::Result<()>;
}

/// Scalars kept in a JSON object file; a missing or corrupt file reads as empty.
#[derive(Debug, Clone)]
pub struct JsonScalarStore {
    path: PathBuf,
}

impl JsonScalarStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScalarStore for JsonScalarStore {
    fn get(&self, key: &str) -> Option<i64> {
        let payload = read_json_object(&self.path)?;
        match payload.get(key)? {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    fn set(&self, key: &str, value: i64) -> anyhow::Result<()> {
        let mut on_disk = read_json_object(&self.path).unwrap_or_default();
        on_disk.insert(key.to_string(), Value::Number(value.into()));
        write_json_object(&self.path, &on_disk)
    }
}

#[derive(Debug, Default)]
pub struct MemoryScalarStore {
    values: Mutex<BTreeMap<String, i64>>,
}

impl MemoryScalarStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScalarStore for MemoryScalarStore {
    fn get(&self, key: &str) -> Option<i64> {
        self.values.lock().ok()?.get(key).copied()
    }

    fn set(&self, key: &str, value: i64) -> anyhow::Result<()> {
        self.values
            .lock()
            .map_err(|_| anyhow::anyhow!("scalar store lock poisoned"))?
            .insert(key.to_string(), value);
        Ok(())
    }
}

/// Client-local generation gate. Not a security boundary: `reset` exists for
/// the "refill credits" debug affordance.
pub struct GenerationQuota {
    store: Box<dyn ScalarStore>,
    limit: u64,
}

impl GenerationQuota {
    pub fn new(store: Box<dyn ScalarStore>, limit: u64) -> Self {
        Self { store, limit }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn used(&self) -> u64 {
        self.store
            .get(GENERATION_COUNT_KEY)
            .map(|value| value.max(0) as u64)
            .unwrap_or(0)
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used())
    }

    pub fn is_exhausted(&self) -> bool {
        self.used() >= self.limit
    }

    /// Read-increment-persist; never moves past the limit.
    pub fn record_generation(&self) -> anyhow::Result<u64> {
        let next = (self.used() + 1).min(self.limit);
        self.store.set(GENERATION_COUNT_KEY, next as i64)?;
        Ok(next)
    }

    pub fn reset(&self) -> anyhow::Result<()> {
        self.store.set(GENERATION_COUNT_KEY, 0)
    }
}

fn read_json_object(path: &Path) -> Option<Map<String, Value>> {
    let raw = std::fs::read_to_string(path).ok()?;
    let parsed: Value = serde_json::from_str(&raw).ok()?;
    parsed.as_object().cloned()
}

fn write_json_object(path: &Path, payload: &Map<String, Value>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(
        path,
        serde_json::to_string_pretty(&Value::Object(payload.clone()))?,
    )?;
    Ok(())
}
