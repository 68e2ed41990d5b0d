//! Reconciles the watched folder with the retrieval index.

use chrono::{DateTime, Utc};
use lectern_core::{NewDocument, Result, ScanStats};
use lectern_extract::ExtractorRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::rag_index::{file_modified, RagIndex};

/// Extensions picked up from the watched folder.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "txt", "md", "csv", "json", "html", "xml", "py", "js", "ts", "css", "pdf",
];

/// Folder synchronization settings.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Watched directory
    pub folder: PathBuf,
    /// Lower-case extensions (without the dot) to index
    pub extensions: Vec<String>,
}

impl SyncConfig {
    /// Watch `folder` with the default extension allow-list.
    #[must_use]
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
        }
    }
}

/// Scans the watched folder and brings the index in line with it.
pub struct FolderSynchronizer {
    config: SyncConfig,
    extractors: Arc<ExtractorRegistry>,
}

impl FolderSynchronizer {
    #[must_use]
    pub fn new(config: SyncConfig, extractors: Arc<ExtractorRegistry>) -> Self {
        Self { config, extractors }
    }

    #[must_use]
    pub fn folder(&self) -> &Path {
        &self.config.folder
    }

    /// Whether `path` has an allowed extension that some extractor handles.
    #[must_use]
    pub fn is_allowed(&self, path: &Path) -> bool {
        let allowed = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.config
                    .extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            });
        allowed && self.extractors.supports(path)
    }

    /// Allowed files under the folder, recursively, in path order. Hidden
    /// files and directories are skipped.
    pub fn list_files(&self) -> std::io::Result<Vec<PathBuf>> {
        fn visit_dir(dir: &Path, sync: &FolderSynchronizer, files: &mut Vec<PathBuf>) {
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Cannot read directory {:?}: {}", dir, e);
                    return;
                }
            };

            for entry in entries.flatten() {
                let path = entry.path();
                if is_hidden(&path) {
                    continue;
                }
                if path.is_dir() {
                    visit_dir(&path, sync, files);
                } else if path.is_file() && sync.is_allowed(&path) {
                    files.push(path);
                }
            }
        }

        // Surface an unreadable root instead of reporting an empty folder.
        std::fs::read_dir(&self.config.folder)?;

        let mut files = Vec::new();
        visit_dir(&self.config.folder, self, &mut files);
        files.sort();
        Ok(files)
    }

    /// Reconcile the folder with `rag`.
    ///
    /// Documents from files that disappeared are kept but flagged
    /// `in_folder = false`. Files whose mtime moved past the stored one are
    /// re-extracted and re-embedded under the same id. New files are added.
    /// A file that fails to extract or embed is logged, counted in `failed`
    /// and skipped. The store is written once at the end.
    pub async fn scan(&self, rag: &mut RagIndex) -> Result<ScanStats> {
        let folder = &self.config.folder;
        info!("Scanning: {:?}", folder);

        if !folder.exists() {
            tokio::fs::create_dir_all(folder).await?;
            info!("Created directory: {:?}", folder);
            return Ok(ScanStats::default());
        }

        let files = self.list_files()?;
        debug!("Found {} files", files.len());

        rag.mark_missing_under(folder);

        let mut stats = ScanStats {
            files_seen: files.len(),
            ..ScanStats::default()
        };
        let mut index_changed = false;

        for path in &files {
            let key = path.to_string_lossy().into_owned();
            let Some(modified) = file_modified(path) else {
                warn!("Cannot read mtime of {:?}, skipping", path);
                stats.failed += 1;
                continue;
            };

            match rag.find_by_original_file(&key) {
                Some((id, last_modified)) if modified > last_modified => {
                    rag.set_in_folder(&id, true);
                    match self.update(rag, &id, path, modified).await {
                        Ok(()) => {
                            stats.updated += 1;
                            index_changed = true;
                        }
                        Err(e) => {
                            warn!("Error updating {:?}: {}", path, e);
                            stats.failed += 1;
                        }
                    }
                }
                Some((id, _)) => rag.set_in_folder(&id, true),
                None => match self.add(rag, path, &key, modified).await {
                    Ok(created) => {
                        if created {
                            stats.added += 1;
                            index_changed = true;
                            info!("Added document from file: {:?}", path);
                        }
                    }
                    Err(e) => {
                        warn!("Error processing file {:?}: {}", path, e);
                        stats.failed += 1;
                    }
                },
            }
        }

        rag.persist(index_changed)
            .inspect_err(|e| error!("Failed to persist scan results: {}", e))?;
        stats.total_documents = rag.len();

        info!(
            "Scan complete: {} added, {} updated, {} failed, {} files, {} documents",
            stats.added, stats.updated, stats.failed, stats.files_seen, stats.total_documents
        );
        Ok(stats)
    }

    /// Path relative to the watched folder, `/`-separated.
    fn source_name(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.config.folder).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    async fn update(
        &self,
        rag: &mut RagIndex,
        id: &str,
        path: &Path,
        modified: DateTime<Utc>,
    ) -> Result<()> {
        let content = self.extractors.extract(path).await?.text;
        rag.replace_content(id, content, modified).await
    }

    async fn add(
        &self,
        rag: &mut RagIndex,
        path: &Path,
        key: &str,
        modified: DateTime<Utc>,
    ) -> Result<bool> {
        let content = self.extractors.extract(path).await?.text;
        let title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let new = NewDocument::new(content)
            .with_title(title)
            .with_original_file(key)
            .with_source_name(self.source_name(path))
            .with_metadata("source", key);
        Ok(rag.add_deferred(new, modified).await?.created)
    }
}

pub(crate) fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}
