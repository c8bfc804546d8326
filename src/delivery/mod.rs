//! Subject-code file search and paginated delivery
//!
//! A search merges local and Drive matches into one ranked list and stores
//! it as a per-chat [`DeliverySession`]. A background drain task sends the
//! files one by one until the batch limit, a pause or the end of the list.

/// Search, drain and session commands
pub mod manager;
/// Per-chat session registry
pub mod registry;
/// Session state machine
pub mod session;

pub use manager::{DeliveryManager, DeliveryOptions};
pub use registry::{SessionHandle, SessionRegistry};
pub use session::{BatchLimit, DeliverySession, SearchLimit, SessionState};

use crate::files::drive::DriveError;
use crate::files::{local, DownloadedFile, DriveProvider, FileEntry, LocalFileIndex};
use crate::transport::TransportError;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tracing::error;

/// Why a single file could not be delivered
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Local file could not be read
    #[error("Failed to read {name}: {source}")]
    Read {
        /// File name
        name: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// Drive download failed
    #[error(transparent)]
    Download(#[from] DriveError),
    /// Transport rejected the document
    #[error(transparent)]
    Send(#[from] TransportError),
}

/// Result of a delivery command, also reported to the chat as text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// A new session was created and its drain started
    Started {
        /// Files in the session
        found: usize,
        /// Files in the first batch
        sending: usize,
        /// Files remain after the first batch
        more_available: bool,
    },
    /// Nothing matched the search
    NotFound,
    /// The session was paused
    Paused {
        /// Files sent so far
        cursor: usize,
        /// Files in the session
        total: usize,
    },
    /// The session was resumed
    Resumed {
        /// Files sent so far
        cursor: usize,
        /// Files in the session
        total: usize,
    },
    /// The batch limit was raised
    MoreQueued {
        /// New batch limit
        batch_limit: BatchLimit,
    },
    /// Every file of the session was already sent
    AllSent,
    /// No session exists for the chat
    NoSession,
    /// `resume` named a different subject code than the live session
    CodeMismatch {
        /// Code named by the user
        requested: String,
        /// Code of the live session
        active: String,
    },
}

/// Local file source used by the delivery manager
#[async_trait]
pub trait LocalFiles: Send + Sync {
    /// Files matching a subject code
    async fn files_by_subject_code(&self, code: &str) -> Vec<FileEntry>;

    /// Read a file into memory
    async fn read(&self, path: &Path) -> std::io::Result<Vec<u8>>;
}

/// Remote file source used by the delivery manager
#[async_trait]
pub trait RemoteFiles: Send + Sync {
    /// Files matching a subject code; failures yield an empty list
    async fn search_by_subject_code(&self, code: &str) -> Vec<FileEntry>;

    /// Download one remote entry
    async fn download(&self, entry: &FileEntry) -> Result<DownloadedFile, DriveError>;

    /// Number of files in the current listing cache
    async fn cached_file_count(&self) -> usize;
}

#[async_trait]
impl LocalFiles for LocalFileIndex {
    async fn files_by_subject_code(&self, code: &str) -> Vec<FileEntry> {
        let index = self.clone();
        let code = code.to_string();
        match tokio::task::spawn_blocking(move || index.files_by_subject_code(&code)).await {
            Ok(files) => files,
            Err(e) => {
                error!(error = %e, "Local file scan task failed");
                Vec::new()
            }
        }
    }

    async fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        local::read_file(path).await
    }
}

#[async_trait]
impl RemoteFiles for DriveProvider {
    async fn search_by_subject_code(&self, code: &str) -> Vec<FileEntry> {
        Self::search_by_subject_code(self, code).await
    }

    async fn download(&self, entry: &FileEntry) -> Result<DownloadedFile, DriveError> {
        Self::download(self, entry).await
    }

    async fn cached_file_count(&self) -> usize {
        Self::cached_file_count(self).await
    }
}
