use tokio::sync::broadcast;

use crate::utils::Result;

/// Signal that a key changed in durable storage
///
/// Other application instances sharing the same storage receive one event per
/// changed key, which lets them resync their session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
}

impl StorageEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// String key/value store that survives restarts
pub trait Storage: Send + Sync {
    /// Read a value; missing keys are `Ok(None)`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;

    /// Read several keys at once; implementations make this a consistent snapshot
    fn get_all(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    /// Write several keys at once, so readers never see a partial update
    fn set_all(&self, entries: &[(&str, &str)]) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Remove several keys at once
    fn remove_all(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }

    /// Subscribe to change notifications
    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;
}
