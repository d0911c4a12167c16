// Key-value persistence. The workspace only ever talks to `Storage`; the
// file store keeps one JSON document per key under <project_dir>/.windharmony/
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

pub const WINDHARMONY_DIR: &str = ".windharmony";

pub const COMPOSITION_KEY: &str = "composition";
pub const SESSION_KEY: &str = "session";
pub const CONFIG_KEY: &str = "config";

pub trait Storage {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(project_dir: &Path) -> Self {
        Self {
            dir: project_dir.join(WINDHARMONY_DIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // <project_dir>/.windharmony/<key>.json
    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // creates .windharmony/ on first write
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path_for(key), value)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl Storage for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

pub fn load_json<T: DeserializeOwned>(store: &dyn Storage, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(data) => Ok(Some(serde_json::from_str(&data)?)),
        None => Ok(None),
    }
}

pub fn save_json<T: Serialize>(store: &mut dyn Storage, key: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    store.set(key, &json)
}
