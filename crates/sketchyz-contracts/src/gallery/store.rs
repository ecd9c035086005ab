use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::Utc;
use serde_json::{Map, Value};

use super::item::{generate_id, GalleryItem, NewGalleryItem};

/// Gallery records kept in one JSON object keyed by record id.
///
/// Every write re-reads the file and touches only its own key, so two stores
/// pointed at the same file do not clobber each other's records.
#[derive(Debug, Clone)]
pub struct GalleryStore {
    path: PathBuf,
}

impl GalleryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn insert(&self, item: NewGalleryItem) -> anyhow::Result<GalleryItem> {
        self.insert_at(item, Utc::now().timestamp_millis())
    }

    pub fn insert_at(&self, item: NewGalleryItem, timestamp: i64) -> anyhow::Result<GalleryItem> {
        let mut on_disk = read_records(&self.path)?;
        let mut id = generate_id(timestamp);
        while on_disk.contains_key(&id) {
            id = generate_id(timestamp);
        }
        let record = item.into_item(id, timestamp);
        on_disk.insert(record.id.clone(), serde_json::to_value(&record)?);
        write_records(&self.path, &on_disk)
            .with_context(|| format!("failed to save gallery item to {}", self.path.display()))?;
        Ok(record)
    }

    /// Newest first. An unreadable store behaves as an empty gallery.
    pub fn list(&self) -> Vec<GalleryItem> {
        self.try_list().unwrap_or_default()
    }

    pub fn try_list(&self) -> anyhow::Result<Vec<GalleryItem>> {
        let mut items = read_records(&self.path)?
            .into_iter()
            .filter_map(|(_, value)| serde_json::from_value::<GalleryItem>(value).ok())
            .collect::<Vec<GalleryItem>>();
        items.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(items)
    }

    pub fn get(&self, id: &str) -> Option<GalleryItem> {
        read_records(&self.path)
            .ok()?
            .remove(id)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Returns whether a record was removed; a missing id is not an error.
    pub fn delete(&self, id: &str) -> anyhow::Result<bool> {
        let mut on_disk = read_records(&self.path)?;
        if on_disk.remove(id).is_none() {
            return Ok(false);
        }
        write_records(&self.path, &on_disk)
            .with_context(|| format!("failed to delete gallery item {id}"))?;
        Ok(true)
    }
}

fn read_records(path: &Path) -> anyhow::Result<Map<String, Value>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
        Err(err) => {
            return Err(anyhow::Error::new(err)
                .context(format!("gallery store unavailable ({})", path.display())))
        }
    };
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    let parsed: Value = serde_json::from_str(&raw)
        .with_context(|| format!("gallery store is corrupt ({})", path.display()))?;
    match parsed {
        Value::Object(records) => Ok(records),
        _ => bail!("gallery store is not a JSON object ({})", path.display()),
    }
}

fn write_records(path: &Path, records: &Map<String, Value>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(
        path,
        serde_json::to_string_pretty(&Value::Object(records.clone()))?,
    )?;
    Ok(())
}
