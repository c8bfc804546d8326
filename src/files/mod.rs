//! File sources for the study file share
//!
//! A [`FileEntry`] is built fresh on every search, either from the local
//! file index or from the Google Drive listing cache, and is never persisted.

/// Filename based classification and ranking
pub mod categorize;
/// Google Drive listing, caching and download
pub mod drive;
/// Local directory index
pub mod local;
/// Extension to MIME type table
pub mod mime;

use std::path::PathBuf;

pub use categorize::{categorize, prioritize, rank_all, CategorizedFiles, FileCategory};
pub use drive::{DownloadedFile, DriveProvider};
pub use local::LocalFileIndex;

/// Size of a file as reported by its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSize {
    /// Size in bytes
    Known(u64),
    /// The remote listing omitted the size
    Unknown,
}

impl FileSize {
    /// Key used when ranking by size.
    ///
    /// Unknown sizes sort after every known size, so a size-less remote file
    /// never wins the "smallest handout" pick.
    #[must_use]
    pub const fn sort_key(self) -> u64 {
        match self {
            Self::Known(bytes) => bytes,
            Self::Unknown => u64::MAX,
        }
    }

    /// Returns the byte count when known
    #[must_use]
    pub const fn bytes(self) -> Option<u64> {
        match self {
            Self::Known(bytes) => Some(bytes),
            Self::Unknown => None,
        }
    }
}

impl From<Option<u64>> for FileSize {
    fn from(value: Option<u64>) -> Self {
        value.map_or(Self::Unknown, Self::Known)
    }
}

/// Where the bytes of a file are fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileLocation {
    /// File on the local file share
    Local {
        /// Absolute or root-joined path on disk
        path: PathBuf,
    },
    /// File in a Google Drive folder
    Remote {
        /// Drive object id
        id: String,
        /// Direct download URL
        download_url: String,
    },
}

/// Origin of a file, used for logging and listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSource {
    /// Local file share
    Local,
    /// Google Drive
    Remote,
}

impl std::fmt::Display for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "drive"),
        }
    }
}

/// One deliverable file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Display file name
    pub name: String,
    /// Path relative to the source root (folders joined with `/`)
    pub relative_path: String,
    /// Size reported by the source
    pub size: FileSize,
    /// MIME type derived from the extension
    pub mime_type: &'static str,
    /// Modification date, local files only
    pub modified: Option<chrono::NaiveDate>,
    /// Ownership token for fetching the bytes
    pub location: FileLocation,
}

impl FileEntry {
    /// Returns the source of this entry
    #[must_use]
    pub const fn source(&self) -> FileSource {
        match self.location {
            FileLocation::Local { .. } => FileSource::Local,
            FileLocation::Remote { .. } => FileSource::Remote,
        }
    }

    /// Returns true if the extension is `.pdf` (case-insensitive)
    #[must_use]
    pub fn is_pdf(&self) -> bool {
        std::path::Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
    }

    /// Case-insensitive substring match on name or relative path
    #[must_use]
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        self.name.to_lowercase().contains(&query)
            || self.relative_path.to_lowercase().contains(&query)
    }

    /// Subject-code containment on name or relative path
    #[must_use]
    pub fn matches_subject_code(&self, code: &str) -> bool {
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            return false;
        }
        self.name.to_uppercase().contains(&code)
            || self.relative_path.to_uppercase().contains(&code)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Build a local entry for ranking tests
    pub fn local(name: &str, size: u64) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            relative_path: name.to_string(),
            size: FileSize::Known(size),
            mime_type: mime::mime_type_for(name),
            modified: None,
            location: FileLocation::Local {
                path: PathBuf::from(name),
            },
        }
    }

    /// Build a remote entry for ranking tests
    pub fn remote(name: &str, size: Option<u64>) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            relative_path: name.to_string(),
            size: size.into(),
            mime_type: mime::mime_type_for(name),
            modified: None,
            location: FileLocation::Remote {
                id: format!("id-{name}"),
                download_url: format!("https://example.invalid/{name}"),
            },
        }
    }
}
