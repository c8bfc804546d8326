//! Per-chat delivery session state.

use crate::files::FileEntry;
use std::fmt;

/// How far the cursor may advance before delivery stalls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchLimit {
    /// Stop once `cursor` reaches this index
    Bounded(usize),
    /// Deliver everything
    Unbounded,
}

impl BatchLimit {
    /// Returns true if a file at `cursor` may be sent
    #[must_use]
    pub const fn allows(self, cursor: usize) -> bool {
        match self {
            Self::Bounded(limit) => cursor < limit,
            Self::Unbounded => true,
        }
    }

    /// Limit raised by `increment`
    #[must_use]
    pub const fn raised(self, increment: usize) -> Self {
        match self {
            Self::Bounded(limit) => Self::Bounded(limit.saturating_add(increment)),
            Self::Unbounded => Self::Unbounded,
        }
    }
}

impl fmt::Display for BatchLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded(limit) => write!(f, "{limit}"),
            Self::Unbounded => write!(f, "∞"),
        }
    }
}

/// Requested size of the first batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchLimit {
    /// Send the prioritized short-list first, `n` files
    Page(usize),
    /// Send every match without waiting for "more"
    All,
}

impl Default for SearchLimit {
    fn default() -> Self {
        Self::Page(crate::config::get_file_batch_size())
    }
}

impl SearchLimit {
    /// Initial batch limit for a session
    #[must_use]
    pub const fn batch_limit(self) -> BatchLimit {
        match self {
            Self::Page(n) => BatchLimit::Bounded(n),
            Self::All => BatchLimit::Unbounded,
        }
    }
}

/// Observable state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Files remain and the batch limit allows more
    Active,
    /// Batch limit reached, waiting for "more"
    Stalled,
    /// Paused by the user
    Paused,
    /// Every file was sent
    Completed,
}

/// One in-progress multi-file delivery.
///
/// `files` is fixed at creation; only `cursor`, `batch_limit` and `paused`
/// change afterwards. `cursor` never exceeds `files.len()`.
#[derive(Debug, Clone)]
pub struct DeliverySession {
    chat_id: String,
    subject_code: String,
    files: Vec<FileEntry>,
    cursor: usize,
    batch_limit: BatchLimit,
    paused: bool,
    /// Set while a drain task owns this session
    pub(crate) draining: bool,
}

impl DeliverySession {
    /// Create a session at cursor 0
    #[must_use]
    pub fn new(
        chat_id: impl Into<String>,
        subject_code: impl Into<String>,
        files: Vec<FileEntry>,
        batch_limit: BatchLimit,
    ) -> Self {
        Self {
            chat_id: chat_id.into(),
            subject_code: subject_code.into(),
            files,
            cursor: 0,
            batch_limit,
            paused: false,
            draining: false,
        }
    }

    /// Chat this session delivers to
    #[must_use]
    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// Subject code the session was created for
    #[must_use]
    pub fn subject_code(&self) -> &str {
        &self.subject_code
    }

    /// Full ranked file list
    #[must_use]
    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    /// Index of the next file to send
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Current batch limit
    #[must_use]
    pub const fn batch_limit(&self) -> BatchLimit {
        self.batch_limit
    }

    /// Returns true if paused by the user
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Total number of files
    #[must_use]
    pub fn total(&self) -> usize {
        self.files.len()
    }

    /// Returns true once every file was sent
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.cursor >= self.files.len()
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.is_complete() {
            SessionState::Completed
        } else if self.paused {
            SessionState::Paused
        } else if !self.batch_limit.allows(self.cursor) {
            SessionState::Stalled
        } else {
            SessionState::Active
        }
    }

    /// Number of files the current batch will send from the cursor on
    #[must_use]
    pub fn pending_in_batch(&self) -> usize {
        let end = match self.batch_limit {
            BatchLimit::Bounded(limit) => limit.min(self.files.len()),
            BatchLimit::Unbounded => self.files.len(),
        };
        end.saturating_sub(self.cursor)
    }

    /// Returns true if files remain beyond the current batch
    #[must_use]
    pub fn has_more_after_batch(&self) -> bool {
        match self.batch_limit {
            BatchLimit::Bounded(limit) => limit < self.files.len(),
            BatchLimit::Unbounded => false,
        }
    }

    /// File to send next, `None` if paused, stalled or complete
    #[must_use]
    pub fn next_file(&self) -> Option<&FileEntry> {
        if self.state() == SessionState::Active {
            self.files.get(self.cursor)
        } else {
            None
        }
    }

    /// Move past the current file
    pub fn advance(&mut self) {
        if self.cursor < self.files.len() {
            self.cursor += 1;
        }
    }

    /// Halt draining at the next file boundary
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Clear the pause flag
    pub fn unpause(&mut self) {
        self.paused = false;
    }

    /// Raise the batch limit and clear the pause flag
    pub fn extend_batch(&mut self, increment: usize) {
        self.batch_limit = self.batch_limit.raised(increment);
        self.paused = false;
    }
}
