//! Debounced watcher on the folder being synchronized.

use notify_debouncer_full::notify::{self, EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, DebouncedEvent, Debouncer, RecommendedCache};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::synchronizer::is_hidden;

/// Reports batches of changed paths under a folder.
///
/// Each debounced batch that touches at least one visible file is sent as
/// one message; callers typically answer it with a folder scan.
pub struct FolderWatcher {
    debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

impl FolderWatcher {
    /// Create a watcher sending change batches to `changes`.
    pub fn new(changes: mpsc::Sender<Vec<PathBuf>>, debounce: Duration) -> Result<Self, notify::Error> {
        let debouncer = new_debouncer(debounce, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    let paths = changed_paths(&events);
                    if paths.is_empty() {
                        return;
                    }
                    // Runs on the debouncer's own thread.
                    if changes.blocking_send(paths).is_err() {
                        warn!("Change channel closed");
                    }
                }
                Err(errors) => {
                    for error in errors {
                        error!("Watch error: {error}");
                    }
                }
            }
        })?;

        Ok(Self { debouncer })
    }

    /// Start watching `path` recursively.
    pub fn watch(&mut self, path: &Path) -> Result<(), notify::Error> {
        debug!("Starting to watch: {:?}", path);
        self.debouncer.watch(path, RecursiveMode::Recursive)
    }

    /// Stop watching `path`.
    pub fn unwatch(&mut self, path: &Path) -> Result<(), notify::Error> {
        debug!("Stopping watch: {:?}", path);
        self.debouncer.unwatch(path)
    }
}

/// Distinct visible paths created, modified or removed in a batch.
fn changed_paths(events: &[DebouncedEvent]) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = events
        .iter()
        .filter(|event| {
            matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            )
        })
        .flat_map(|event| event.paths.iter())
        .filter(|path| !is_hidden(path))
        .cloned()
        .collect();
    paths.sort();
    paths.dedup();
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify_debouncer_full::notify::event::{AccessKind, CreateKind, DataChange, ModifyKind, RemoveKind};
    use std::time::Instant;

    fn make_event(kind: EventKind, paths: Vec<PathBuf>) -> DebouncedEvent {
        DebouncedEvent {
            event: notify::Event {
                kind,
                paths,
                attrs: Default::default(),
            },
            time: Instant::now(),
        }
    }

    #[test]
    fn test_changed_paths_collects_writes() {
        let events = vec![
            make_event(EventKind::Create(CreateKind::File), vec![PathBuf::from("/docs/b.txt")]),
            make_event(
                EventKind::Modify(ModifyKind::Data(DataChange::Any)),
                vec![PathBuf::from("/docs/a.md")],
            ),
            make_event(EventKind::Remove(RemoveKind::File), vec![PathBuf::from("/docs/b.txt")]),
        ];

        assert_eq!(
            changed_paths(&events),
            vec![PathBuf::from("/docs/a.md"), PathBuf::from("/docs/b.txt")]
        );
    }

    #[test]
    fn test_access_events_ignored() {
        let events = vec![make_event(
            EventKind::Access(AccessKind::Any),
            vec![PathBuf::from("/docs/a.md")],
        )];
        assert!(changed_paths(&events).is_empty());
    }

    #[test]
    fn test_hidden_paths_skipped() {
        let events = vec![
            make_event(EventKind::Create(CreateKind::File), vec![PathBuf::from("/docs/.notes.txt.swp")]),
            make_event(EventKind::Modify(ModifyKind::Any), vec![PathBuf::from("/docs/.DS_Store")]),
        ];
        assert!(changed_paths(&events).is_empty());
    }

    #[tokio::test]
    #[ignore] // Depends on OS file notifications
    async fn test_watcher_reports_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        let mut watcher = FolderWatcher::new(tx, Duration::from_millis(100)).unwrap();
        watcher.watch(dir.path()).unwrap();

        std::fs::write(dir.path().join("sky.txt"), "The sky is blue.").unwrap();

        let batch = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(batch.iter().any(|p| p.ends_with("sky.txt")));
    }
}
