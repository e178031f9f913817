use std::{collections::BTreeMap, fs, io::ErrorKind, path::{Path, PathBuf}};

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{config::HISTORY_KEY, error::HistoryError, models::Generation};

/// Tiny key-value store persisted as one JSON object on disk.
#[derive(Debug, Clone)]
pub struct KvFile {
    path: PathBuf,
}

impl KvFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> BTreeMap<String, Value> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("⚠️ Ignoring unreadable store {}: {}", self.path.display(), e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!("⚠️ Failed to read {}: {}", self.path.display(), e);
                BTreeMap::new()
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.read_all().remove(key)
    }

    pub fn set(&self, key: &str, value: Value) -> Result<(), HistoryError> {
        let mut all = self.read_all();
        all.insert(key.to_string(), value);
        self.write_all(&all)
    }

    pub fn remove(&self, key: &str) -> Result<(), HistoryError> {
        let mut all = self.read_all();
        if all.remove(key).is_some() {
            self.write_all(&all)?;
        }
        Ok(())
    }

    fn write_all(&self, all: &BTreeMap<String, Value>) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(all)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Recent successful generations, newest first.
pub struct HistoryStore {
    kv: KvFile,
    cap: usize,
    items: Vec<Generation>,
}

impl HistoryStore {
    /// Loads persisted history. Corrupt data is treated as empty.
    pub fn load(kv: KvFile, cap: usize) -> Self {
        let items = match kv.get(HISTORY_KEY) {
            Some(value) => serde_json::from_value::<Vec<Generation>>(value).unwrap_or_else(|e| {
                warn!("⚠️ Failed to load history, starting empty: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };
        let mut store = Self { kv, cap, items };
        store.items.truncate(cap);
        store
    }

    pub fn items(&self) -> &[Generation] {
        &self.items
    }

    pub fn get(&self, id: Uuid) -> Option<&Generation> {
        self.items.iter().find(|g| g.id == id)
    }

    /// Puts `generation` at the front, dropping any older copy and anything
    /// past the cap.
    pub fn add(&mut self, generation: Generation) -> Result<(), HistoryError> {
        self.items.retain(|g| g.id != generation.id);
        self.items.insert(0, generation);
        self.items.truncate(self.cap);
        self.save()
    }

    pub fn clear(&mut self) -> Result<(), HistoryError> {
        self.items.clear();
        self.kv.remove(HISTORY_KEY)?;
        info!("🧹 History cleared");
        Ok(())
    }

    fn save(&self) -> Result<(), HistoryError> {
        self.kv.set(HISTORY_KEY, serde_json::to_value(&self.items)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GenerationRequest, Style};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn generation(prompt: &str) -> Generation {
        Generation::from_request(&GenerationRequest::new("data:image/png;base64,AAAA", prompt, Style::Minimalist))
    }

    #[test]
    fn keeps_newest_first_and_caps() {
        let dir = tempdir().unwrap();
        let mut store = HistoryStore::load(KvFile::new(dir.path().join("h.json")), 5);
        for i in 0..7 {
            store.add(generation(&format!("prompt {}", i))).unwrap();
        }
        let prompts: Vec<_> = store.items().iter().map(|g| g.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["prompt 6", "prompt 5", "prompt 4", "prompt 3", "prompt 2"]);
    }

    #[test]
    fn re_adding_moves_to_front_without_duplicating() {
        let dir = tempdir().unwrap();
        let mut store = HistoryStore::load(KvFile::new(dir.path().join("h.json")), 5);
        let first = generation("first");
        store.add(first.clone()).unwrap();
        store.add(generation("second")).unwrap();
        store.add(first.clone()).unwrap();
        assert_eq!(store.items().len(), 2);
        assert_eq!(store.items()[0].id, first.id);
        assert_eq!(store.get(first.id), Some(&first));
    }

    #[test]
    fn persists_across_loads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/h.json");
        let item = generation("kept");
        HistoryStore::load(KvFile::new(&path), 5).add(item.clone()).unwrap();

        let reloaded = HistoryStore::load(KvFile::new(&path), 5);
        assert_eq!(reloaded.items(), &[item]);
    }

    #[test]
    fn corrupt_data_loads_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("h.json");
        fs::write(&path, "{not json").unwrap();
        assert!(HistoryStore::load(KvFile::new(&path), 5).items().is_empty());

        let kv = KvFile::new(&path);
        kv.set(HISTORY_KEY, serde_json::json!({"unexpected": true})).unwrap();
        let mut store = HistoryStore::load(kv, 5);
        assert!(store.items().is_empty());
        store.add(generation("fresh")).unwrap();
        assert_eq!(store.items().len(), 1);
    }

    #[test]
    fn clear_removes_only_history_key() {
        let dir = tempdir().unwrap();
        let kv = KvFile::new(dir.path().join("h.json"));
        kv.set("theme", Value::String("dark".into())).unwrap();
        let mut store = HistoryStore::load(kv.clone(), 5);
        store.add(generation("gone")).unwrap();
        store.clear().unwrap();

        assert!(store.items().is_empty());
        assert_eq!(kv.get(HISTORY_KEY), None);
        assert_eq!(kv.get("theme"), Some(Value::String("dark".into())));
    }
}
