//! Local file index
//!
//! Walks the file share directory on every call. The share holds a few
//! hundred files, so blocking disk I/O is acceptable here; async callers
//! should go through `spawn_blocking`.

use super::mime::{format_file_size, mime_type_for};
use super::{FileEntry, FileLocation, FileSize};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

const RESERVED_README: &str = "readme.md";

/// Recursive index over the local file share
#[derive(Debug, Clone)]
pub struct LocalFileIndex {
    root: PathBuf,
}

impl LocalFileIndex {
    /// Create an index rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the root directory if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn ensure_root(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    /// Root directory of the share
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List every regular file under the root, skipping dotfiles and the readme.
    #[must_use]
    pub fn list_files(&self) -> Vec<FileEntry> {
        let mut results = Vec::new();
        self.walk(&self.root, &mut results);
        results.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        results
    }

    fn walk(&self, dir: &Path, results: &mut Vec<FileEntry>) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!(dir = %dir.display(), error = %e, "Failed to scan directory");
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().to_string();

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to stat file");
                    continue;
                }
            };

            if metadata.is_dir() {
                self.walk(&path, results);
                continue;
            }

            if !metadata.is_file()
                || file_name.starts_with('.')
                || file_name.eq_ignore_ascii_case(RESERVED_README)
            {
                continue;
            }

            let relative_path = path
                .strip_prefix(&self.root)
                .unwrap_or(&path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let modified = metadata
                .modified()
                .ok()
                .map(|t| DateTime::<Local>::from(t).date_naive());

            results.push(FileEntry {
                mime_type: mime_type_for(&file_name),
                name: file_name,
                relative_path,
                size: FileSize::Known(metadata.len()),
                modified,
                location: FileLocation::Local { path },
            });
        }
    }

    /// Case-insensitive substring search on name and relative path
    #[must_use]
    pub fn search_files(&self, query: &str) -> Vec<FileEntry> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        self.list_files()
            .into_iter()
            .filter(|f| f.matches_query(query))
            .collect()
    }

    /// Files whose name or any parent folder contains the subject code
    #[must_use]
    pub fn files_by_subject_code(&self, code: &str) -> Vec<FileEntry> {
        self.list_files()
            .into_iter()
            .filter(|f| f.matches_subject_code(code))
            .collect()
    }

    /// Exact (case-insensitive) lookup by name or relative path
    #[must_use]
    pub fn get_file(&self, name: &str) -> Option<FileEntry> {
        if !is_valid_file_path(name) {
            warn!(file_name = %name, "Invalid file path attempted");
            return None;
        }
        self.list_files().into_iter().find(|f| {
            f.name.eq_ignore_ascii_case(name) || f.relative_path.eq_ignore_ascii_case(name)
        })
    }

    /// Numbered listing for the `files` command
    #[must_use]
    pub fn formatted_listing(&self) -> String {
        let files = self.list_files();
        if files.is_empty() {
            return "📁 *No files available*\n\nAdd files to the share directory to publish them."
                .to_string();
        }

        let mut message = String::from("📁 *Available Files*\n\n");
        for (index, file) in files.iter().enumerate() {
            message.push_str(&format!("{}. *{}*\n", index + 1, file.name));
            if file.relative_path != file.name {
                message.push_str(&format!("   📂 Path: {}\n", file.relative_path));
            }
            let size = file.size.bytes().map_or_else(|| "?".to_string(), format_file_size);
            message.push_str(&format!("   📊 Size: {size}\n\n"));
        }
        message.push_str(&format!("_Total: {} file(s)_", files.len()));
        message
    }
}

/// Read a local file into memory.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub async fn read_file(path: &Path) -> std::io::Result<Vec<u8>> {
    tokio::fs::read(path).await
}

/// Reject traversal and absolute paths in user supplied names.
#[must_use]
pub fn is_valid_file_path(name: &str) -> bool {
    !name.is_empty()
        && !name.contains('\0')
        && !name.contains("..")
        && !name.starts_with('/')
        && !name.starts_with('\\')
        && !Path::new(name).is_absolute()
}
