use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, error, warn};

/// Durable key/value storage shared by both notification stores. Load is
/// tolerant: malformed stored content is treated as "no data" and logged,
/// never raised to the caller.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// File-backed storage: one JSON object mapping keys to string values.
/// Every write flushes the whole map; the file is small (one reminder
/// collection plus housekeeping keys).
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, String>>(&raw) {
                Ok(map) => {
                    debug!(path = %path.display(), keys = map.len(), "Loaded storage file");
                    map
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Storage file malformed, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read storage file, starting empty");
                HashMap::new()
            }
        };

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn flush(&self, entries: &HashMap<String, String>) {
        let serialized = match serde_json::to_string_pretty(entries) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "Failed to serialize storage map");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, serialized) {
            error!(path = %self.path.display(), error = %e, "Failed to write storage file");
        }
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap();
        if entries.remove(key).is_some() {
            self.flush(&entries);
        }
    }
}

/// In-memory storage. Each instance is independent, so tests can run
/// without cross-talk.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("membership-notifier-{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn file_storage_round_trip() {
        let path = temp_path();
        {
            let storage = FileStorage::open(&path);
            storage.set("reminders", r#"[{"id":"a"}]"#);
            assert_eq!(storage.get("reminders").as_deref(), Some(r#"[{"id":"a"}]"#));
        }

        // Fresh instance reads what the previous one wrote
        let reopened = FileStorage::open(&path);
        assert_eq!(reopened.get("reminders").as_deref(), Some(r#"[{"id":"a"}]"#));

        reopened.remove("reminders");
        assert_eq!(reopened.get("reminders"), None);
        let reopened_again = FileStorage::open(&path);
        assert_eq!(reopened_again.get("reminders"), None);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn malformed_file_is_treated_as_empty() {
        let path = temp_path();
        std::fs::write(&path, "{ not json at all").unwrap();

        let storage = FileStorage::open(&path);
        assert_eq!(storage.get("anything"), None);

        // Storage keeps working after the bad load
        storage.set("k", "v");
        assert_eq!(storage.get("k").as_deref(), Some("v"));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_empty() {
        let storage = FileStorage::open(temp_path());
        assert_eq!(storage.get("k"), None);
    }

    #[test]
    fn memory_storage_instances_are_isolated() {
        let a = MemoryStorage::new();
        let b = MemoryStorage::new();
        a.set("k", "v");
        assert_eq!(a.get("k").as_deref(), Some("v"));
        assert_eq!(b.get("k"), None);
    }
}
