use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::broadcast;

use super::traits::{Storage, StorageEvent};
use crate::constants::STORAGE_EVENT_CAPACITY;
use crate::utils::Result;

/// In-process storage
///
/// Every mutation is broadcast, so several session managers sharing one
/// `MemoryStorage` behave like several open instances of the application.
#[derive(Debug)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    events: broadcast::Sender<StorageEvent>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(STORAGE_EVENT_CAPACITY);
        Self {
            entries: Mutex::new(HashMap::new()),
            events,
        }
    }

    fn notify(&self, key: &str) {
        // No subscribers is fine
        let _ = self.events.send(StorageEvent::new(key));
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let changed = {
            let mut entries = self.entries.lock();
            entries.insert(key.to_string(), value.to_string()).as_deref() != Some(value)
        };
        if changed {
            self.notify(key);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let removed = self.entries.lock().remove(key).is_some();
        if removed {
            self.notify(key);
        }
        Ok(())
    }

    fn get_all(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        let entries = self.entries.lock();
        Ok(keys.iter().map(|key| entries.get(*key).cloned()).collect())
    }

    fn set_all(&self, pairs: &[(&str, &str)]) -> Result<()> {
        let changed: Vec<&str> = {
            let mut entries = self.entries.lock();
            pairs
                .iter()
                .filter(|(key, value)| {
                    entries.insert(key.to_string(), value.to_string()).as_deref() != Some(*value)
                })
                .map(|(key, _)| *key)
                .collect()
        };
        for key in changed {
            self.notify(key);
        }
        Ok(())
    }

    fn remove_all(&self, keys: &[&str]) -> Result<()> {
        let removed: Vec<&str> = {
            let mut entries = self.entries.lock();
            keys.iter()
                .filter(|key| entries.remove(**key).is_some())
                .copied()
                .collect()
        };
        for key in removed {
            self.notify(key);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }
}
