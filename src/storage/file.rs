use directories::ProjectDirs;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::traits::{Storage, StorageEvent};
use crate::constants::{SESSION_FILE_NAME, STORAGE_EVENT_CAPACITY};
use crate::utils::{ClinicError, FileEvent, FileSystemWatcher, Result};

type Entries = BTreeMap<String, String>;

/// Storage persisted as a JSON object in a single file
///
/// Every instance pointed at the same file sees the others' writes. Changes
/// made by another process are picked up by a file watcher and re-published
/// as [`StorageEvent`]s; our own writes never echo back as events.
pub struct FileStorage {
    inner: Arc<Inner>,
    _watcher: Option<FileSystemWatcher>,
}

struct Inner {
    path: PathBuf,
    /// Contents as last written by us or last observed by the watcher
    snapshot: Mutex<Entries>,
    events: broadcast::Sender<StorageEvent>,
}

impl FileStorage {
    /// Open (or lazily create) the storage file and watch it for external changes
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let storage = Self::open_unwatched(path)?;
        let inner = Arc::clone(&storage.inner);
        let watcher = FileSystemWatcher::new(&storage.inner.path, move |event| {
            inner.on_file_event(event);
        })
        .map_err(|e| ClinicError::Storage(format!("cannot watch session file: {e}")))?;

        Ok(Self {
            _watcher: Some(watcher),
            ..storage
        })
    }

    /// Open the storage file without a watcher
    pub fn open_unwatched(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let entries = read_entries(&path)?;
        let (events, _) = broadcast::channel(STORAGE_EVENT_CAPACITY);

        Ok(Self {
            inner: Arc::new(Inner {
                path,
                snapshot: Mutex::new(entries),
                events,
            }),
            _watcher: None,
        })
    }

    /// Default location: `<platform data dir>/clinicdesk/session.json`
    pub fn default_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "clinicdesk") {
            Ok(proj_dirs.data_dir().join(SESSION_FILE_NAME))
        } else {
            let home = std::env::var("HOME")
                .map_err(|_| ClinicError::Storage("could not determine home directory".into()))?;
            Ok(PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("clinicdesk")
                .join(SESSION_FILE_NAME))
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Re-read the file and publish events for keys that changed since the
    /// last observation. The watcher calls this; it is public for callers that
    /// run without one.
    pub fn sync(&self) -> Result<Vec<StorageEvent>> {
        self.inner.sync()
    }

    fn mutate(&self, apply: impl FnOnce(&mut Entries)) -> Result<()> {
        // Hold the snapshot lock across read-modify-write so concurrent local
        // writers do not lose each other's keys.
        let mut snapshot = self.inner.snapshot.lock();
        let mut entries = read_entries(&self.inner.path)?;
        apply(&mut entries);
        write_entries(&self.inner.path, &entries)?;
        *snapshot = entries;
        Ok(())
    }
}

impl Inner {
    fn on_file_event(&self, event: FileEvent) {
        debug!("session file event: {:?}", event);
        if let Err(e) = self.sync() {
            warn!("failed to resync session file {}: {}", self.path.display(), e);
        }
    }

    fn sync(&self) -> Result<Vec<StorageEvent>> {
        let current = read_entries(&self.path)?;
        let changed = {
            let mut snapshot = self.snapshot.lock();
            let changed = changed_keys(&snapshot, &current);
            *snapshot = current;
            changed
        };

        let events: Vec<StorageEvent> = changed.into_iter().map(StorageEvent::new).collect();
        for event in &events {
            let _ = self.events.send(event.clone());
        }
        Ok(events)
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(read_entries(&self.inner.path)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.mutate(|entries| {
            entries.remove(key);
        })
    }

    fn get_all(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        let entries = read_entries(&self.inner.path)?;
        Ok(keys.iter().map(|key| entries.get(*key).cloned()).collect())
    }

    fn set_all(&self, pairs: &[(&str, &str)]) -> Result<()> {
        self.mutate(|entries| {
            for (key, value) in pairs {
                entries.insert(key.to_string(), value.to_string());
            }
        })
    }

    fn remove_all(&self, keys: &[&str]) -> Result<()> {
        self.mutate(|entries| {
            for key in keys {
                entries.remove(*key);
            }
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.inner.events.subscribe()
    }
}

fn read_entries(path: &Path) -> Result<Entries> {
    match fs::read_to_string(path) {
        Ok(content) if content.trim().is_empty() => Ok(Entries::new()),
        Ok(content) => serde_json::from_str(&content).map_err(|e| {
            ClinicError::Storage(format!("corrupt session file {}: {}", path.display(), e))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Entries::new()),
        Err(e) => Err(e.into()),
    }
}

/// Replace the file in one rename: readers see the old or the new contents,
/// never a truncated file
fn write_entries(path: &Path, entries: &Entries) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut file, entries)?;
    file.flush()?;
    // Best-effort durability of the contents before they become visible
    let _ = file.as_file().sync_all();
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn changed_keys(before: &Entries, after: &Entries) -> BTreeSet<String> {
    before
        .keys()
        .chain(after.keys())
        .filter(|key| before.get(*key) != after.get(*key))
        .cloned()
        .collect()
}
