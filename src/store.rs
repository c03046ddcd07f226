use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::PersistenceError;

pub type Attributes = BTreeMap<String, String>;

/// Restart-survival storage for component attributes.
pub trait StateStore: Send + Sync {
    fn save(&self, component_id: &str, attributes: &Attributes) -> Result<(), PersistenceError>;

    /// `Ok(None)` when nothing has been saved for this component yet.
    fn load(&self, component_id: &str) -> Result<Option<Attributes>, PersistenceError>;
}

/// One JSON file per component under a state directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Bytes outside `[A-Za-z0-9_-]` are written as `%XX`, so distinct ids
    /// never share a file.
    fn path_for(&self, component_id: &str) -> PathBuf {
        let mut file = String::with_capacity(component_id.len());
        for b in component_id.bytes() {
            if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
                file.push(b as char);
            } else {
                file.push_str(&format!("%{b:02X}"));
            }
        }
        self.dir.join(format!("{file}.json"))
    }
}

impl StateStore for JsonFileStore {
    fn save(&self, component_id: &str, attributes: &Attributes) -> Result<(), PersistenceError> {
        let path = self.path_for(component_id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(attributes)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn load(&self, component_id: &str) -> Result<Option<Attributes>, PersistenceError> {
        let path = self.path_for(component_id);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Attributes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn save(&self, component_id: &str, attributes: &Attributes) -> Result<(), PersistenceError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| PersistenceError::Corrupt("memory store lock poisoned".to_string()))?;
        entries.insert(component_id.to_string(), attributes.clone());
        Ok(())
    }

    fn load(&self, component_id: &str) -> Result<Option<Attributes>, PersistenceError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| PersistenceError::Corrupt("memory store lock poisoned".to_string()))?;
        Ok(entries.get(component_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> Attributes {
        Attributes::from([
            ("running_total_hours".to_string(), "1.25".to_string()),
            ("last_observed_state".to_string(), "heating".to_string()),
        ])
    }

    #[test]
    fn json_store_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state")).unwrap();
        store.save("salus_heater_history", &attrs()).unwrap();

        let loaded = store.load("salus_heater_history").unwrap();
        assert_eq!(loaded, Some(attrs()));
        assert!(dir.path().join("state/salus_heater_history.json").exists());
    }

    #[test]
    fn json_store_missing_component() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        assert_eq!(store.load("nothing").unwrap(), None);
    }

    #[test]
    fn json_store_escapes_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        store.save("sensor.thermostat/state", &attrs()).unwrap();
        assert!(dir.path().join("sensor%2Ethermostat%2Fstate.json").exists());
        assert_eq!(store.load("sensor.thermostat/state").unwrap(), Some(attrs()));
    }

    #[test]
    fn json_store_similar_ids_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        let mut other = attrs();
        other.insert("running_total_hours".to_string(), "9.0".to_string());

        store.save("a.b", &attrs()).unwrap();
        store.save("a_b", &other).unwrap();
        store.save("a%2Eb", &other).unwrap();

        assert_eq!(store.load("a.b").unwrap(), Some(attrs()));
        assert_eq!(store.load("a_b").unwrap(), Some(other.clone()));
        assert_eq!(store.load("a%2Eb").unwrap(), Some(other));
    }

    #[test]
    fn json_store_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        std::fs::write(dir.path().join("broken.json"), b"{not json").unwrap();
        assert!(matches!(store.load("broken"), Err(PersistenceError::Json(_))));
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.load("a").unwrap(), None);
        store.save("a", &attrs()).unwrap();
        assert_eq!(store.load("a").unwrap(), Some(attrs()));
    }
}
