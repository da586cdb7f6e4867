use anyhow::Result;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};

/// Events that we care about for a watched file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
}

/// Watches a single file and forwards its changes to a handler
///
/// The parent directory is watched instead of the file itself so that
/// atomic replace-by-rename writes and delete/recreate cycles are still seen.
pub struct FileSystemWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl FileSystemWatcher {
    /// Start watching `path`; `handler` runs on the notify thread
    pub fn new<F>(path: &Path, handler: F) -> Result<Self>
    where
        F: Fn(FileEvent) + Send + 'static,
    {
        let target = path.to_path_buf();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let filter_target = target.clone();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            if let Ok(event) = event {
                for file_event in Self::classify(&event, &filter_target) {
                    handler(file_event);
                }
            }
        })?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            path: target,
        })
    }

    /// The file being watched
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Map a raw notify event onto the watched file, ignoring siblings
    fn classify(event: &Event, target: &Path) -> Vec<FileEvent> {
        let touches_target = event
            .paths
            .iter()
            .any(|p| p.file_name().is_some() && p.file_name() == target.file_name());
        if !touches_target {
            return Vec::new();
        }

        let path = target.to_path_buf();
        match event.kind {
            EventKind::Create(_) => vec![FileEvent::Created(path)],
            EventKind::Modify(modify_kind) => {
                use notify::event::ModifyKind;
                match modify_kind {
                    ModifyKind::Data(_) | ModifyKind::Name(_) | ModifyKind::Any => {
                        vec![FileEvent::Modified(path)]
                    },
                    _ => Vec::new(), // Ignore metadata changes
                }
            },
            EventKind::Remove(_) => vec![FileEvent::Deleted(path)],
            _ => Vec::new(),
        }
    }
}
