//! Tab-scoped fallback storage.
//!
//! Lives either in memory for the life of the process, or as a JSON object
//! in the temp directory so it is dropped with it.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::{Backend, StorageError, StorageResult};

#[derive(Debug, Clone)]
enum Area {
    Memory(Arc<Mutex<BTreeMap<String, String>>>),
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct TabStorage {
    area: Area,
    lock: Arc<Mutex<()>>,
}

impl TabStorage {
    pub fn in_memory() -> Self {
        Self {
            area: Area::Memory(Arc::default()),
            lock: Arc::default(),
        }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            area: Area::File(path.into()),
            lock: Arc::default(),
        }
    }

    pub fn default_path() -> PathBuf {
        std::env::temp_dir()
            .join("knocker-web")
            .join("session-storage.json")
    }

    fn with_map<T>(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> (T, bool)) -> StorageResult<T> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Unavailable)?;
        match &self.area {
            Area::Memory(map) => {
                let mut map = map.lock().map_err(|_| StorageError::Unavailable)?;
                Ok(f(&mut *map).0)
            }
            Area::File(path) => {
                let mut map: BTreeMap<String, String> = match fs::read_to_string(path) {
                    Ok(text) if text.trim().is_empty() => BTreeMap::new(),
                    Ok(text) => serde_json::from_str(&text)?,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
                    Err(e) => return Err(e.into()),
                };
                let (out, dirty) = f(&mut map);
                if dirty {
                    if let Some(dir) = path.parent() {
                        fs::create_dir_all(dir)?;
                    }
                    fs::write(path, serde_json::to_vec_pretty(&map)?)?;
                }
                Ok(out)
            }
        }
    }
}

impl Backend for TabStorage {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        self.with_map(|map| (map.get(key).cloned(), false))
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        self.with_map(|map| {
            map.insert(key.to_string(), value.to_string());
            ((), true)
        })
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.with_map(|map| {
            let dirty = map.remove(key).is_some();
            ((), dirty)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_round_trip() {
        let tab = TabStorage::in_memory();
        tab.write("k", "v").unwrap();
        assert_eq!(tab.read("k").unwrap().as_deref(), Some("v"));
        tab.remove("k").unwrap();
        assert_eq!(tab.read("k").unwrap(), None);
    }

    #[test]
    fn clones_share_the_same_tab() {
        let tab = TabStorage::in_memory();
        let other = tab.clone();
        tab.write("k", "v").unwrap();
        assert_eq!(other.read("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn file_backed_survives_new_handle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("tab.json");
        TabStorage::at(&path).write("k", "v").unwrap();
        assert_eq!(TabStorage::at(&path).read("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tab.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(TabStorage::at(&path).read("k"), Err(StorageError::Json(_))));
    }
}
