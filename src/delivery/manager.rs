//! Delivery session manager
//!
//! `search`, `resume` and `more` never wait for files to be sent: they
//! update the session and hand sending over to a spawned drain task, so the
//! inbound message loop keeps serving other chats.

use super::registry::{SessionHandle, SessionRegistry};
use super::session::{DeliverySession, SearchLimit};
use super::{DeliveryError, DeliveryOutcome, LocalFiles, RemoteFiles};
use crate::config::{
    get_file_more_increment, get_file_send_delay_ms, Settings, FILE_MORE_INCREMENT,
    MAX_PRIORITIZED_FILES,
};
use crate::files::categorize::filter_by_keywords;
use crate::files::{categorize, prioritize, rank_all, CategorizedFiles, FileEntry, FileLocation};
use crate::stats::BotStats;
use crate::transport::{ChatTransport, OutgoingDocument};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Tunables of the delivery manager
#[derive(Debug, Clone)]
pub struct DeliveryOptions {
    /// Command prefix shown in hints
    pub bot_prefix: String,
    /// Contact shown when nothing is found
    pub owner_help_number: String,
    /// Pause between two documents
    pub send_delay: Duration,
    /// Files added by "more"
    pub more_increment: usize,
    /// Size of the prioritized short-list
    pub max_prioritized: usize,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            bot_prefix: "!".to_string(),
            owner_help_number: String::new(),
            send_delay: Duration::from_millis(crate::config::FILE_SEND_DELAY_MS),
            more_increment: FILE_MORE_INCREMENT,
            max_prioritized: MAX_PRIORITIZED_FILES,
        }
    }
}

impl DeliveryOptions {
    /// Options from settings and environment overrides
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            bot_prefix: settings.bot_prefix.clone(),
            owner_help_number: settings.owner_help_number.clone(),
            send_delay: Duration::from_millis(get_file_send_delay_ms()),
            more_increment: get_file_more_increment(),
            ..Self::default()
        }
    }
}

struct Inner<T: ChatTransport + 'static> {
    transport: Arc<T>,
    local: Arc<dyn LocalFiles>,
    remote: Arc<dyn RemoteFiles>,
    stats: Arc<BotStats>,
    registry: SessionRegistry<String>,
    options: DeliveryOptions,
}

/// Owns the per-chat delivery sessions
pub struct DeliveryManager<T: ChatTransport + 'static> {
    inner: Arc<Inner<T>>,
}

impl<T: ChatTransport + 'static> Clone for DeliveryManager<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: ChatTransport + 'static> DeliveryManager<T> {
    /// Create a manager with an empty session registry
    #[must_use]
    pub fn new(
        transport: Arc<T>,
        local: Arc<dyn LocalFiles>,
        remote: Arc<dyn RemoteFiles>,
        stats: Arc<BotStats>,
        options: DeliveryOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                local,
                remote,
                stats,
                registry: SessionRegistry::new(),
                options,
            }),
        }
    }

    /// Session registry, for inspection
    #[must_use]
    pub fn registry(&self) -> &SessionRegistry<String> {
        &self.inner.registry
    }

    /// Local and Drive matches for `code`, keyword-filtered and deduplicated
    /// by name. Local entries win over Drive entries of the same name.
    pub async fn find_files(&self, code: &str, keywords: &str) -> Vec<FileEntry> {
        let (local, remote) = tokio::join!(
            self.inner.local.files_by_subject_code(code),
            self.inner.remote.search_by_subject_code(code),
        );
        debug!(
            subject_code = %code,
            local = local.len(),
            remote = remote.len(),
            "Merged file search"
        );
        filter_by_keywords(dedup_by_name(local.into_iter().chain(remote)), keywords)
    }

    /// Full ranked list a session for this search would hold
    pub async fn ranked_files(&self, code: &str, keywords: &str, limit: SearchLimit) -> Vec<FileEntry> {
        let files = self.find_files(code, keywords).await;
        rank_for_limit(&categorize(files), limit, self.inner.options.max_prioritized)
    }

    /// Search and start delivering.
    ///
    /// Replaces any session of the chat. For a page limit the first batch is
    /// the prioritized short-list and the rest of the ranked list waits for
    /// "more"; `SearchLimit::All` sends everything.
    pub async fn search(
        &self,
        chat_id: &str,
        code: &str,
        keywords: &str,
        limit: SearchLimit,
    ) -> DeliveryOutcome {
        let code = code.trim().to_uppercase();
        let files = self.ranked_files(&code, keywords, limit).await;

        if files.is_empty() {
            info!(chat_id = %chat_id, subject_code = %code, "No files found");
            let text = not_found_text(&code, keywords, &self.inner.options.owner_help_number);
            self.notify(chat_id, &text).await;
            return DeliveryOutcome::NotFound;
        }

        let session = DeliverySession::new(chat_id, code.as_str(), files, limit.batch_limit());
        let found = session.total();
        let sending = session.pending_in_batch();
        let more_available = session.has_more_after_batch();

        let (handle, token) = self
            .inner
            .registry
            .replace(chat_id.to_string(), session)
            .await;
        info!(chat_id = %chat_id, subject_code = %code, found, sending, "File delivery session created");

        self.notify(chat_id, &started_text(&code, found, sending, limit, more_available))
            .await;
        self.ensure_drain(chat_id, handle, token).await;

        DeliveryOutcome::Started {
            found,
            sending,
            more_available,
        }
    }

    /// Pause the chat's session at the next file boundary
    pub async fn stop(&self, chat_id: &str) -> DeliveryOutcome {
        let Some(handle) = self.inner.registry.get(&chat_id.to_string()).await else {
            self.notify(chat_id, "❌ No active file sending session found.")
                .await;
            return DeliveryOutcome::NoSession;
        };

        let (code, cursor, total) = {
            let mut session = handle.lock().await;
            session.pause();
            (session.subject_code().to_string(), session.cursor(), session.total())
        };
        info!(chat_id = %chat_id, cursor, total, "File sending paused by user");

        let prefix = &self.inner.options.bot_prefix;
        self.notify(
            chat_id,
            &format!(
                "⏸️ *File sending paused*\n\n📚 Subject: *{code}*\n📊 Progress: {cursor}/{total} files sent\n\n▶️ Type `{prefix}resume {code}` to continue"
            ),
        )
        .await;
        DeliveryOutcome::Paused { cursor, total }
    }

    /// Resume a paused session; `code` must match the session's subject code
    pub async fn resume(&self, chat_id: &str, code: &str) -> DeliveryOutcome {
        let requested = code.trim().to_uppercase();
        let Some((handle, token)) = self.inner.registry.get_with_token(&chat_id.to_string()).await
        else {
            self.notify(
                chat_id,
                &format!("❌ No paused session found for *{requested}*\n\nStart a new search by typing the subject code."),
            )
            .await;
            return DeliveryOutcome::NoSession;
        };

        let resumed = {
            let mut session = handle.lock().await;
            if session.subject_code() == requested {
                session.unpause();
                Ok((session.cursor(), session.total()))
            } else {
                Err(session.subject_code().to_string())
            }
        };

        match resumed {
            Ok((cursor, total)) => {
                info!(chat_id = %chat_id, subject_code = %requested, cursor, "Resuming file sending");
                self.notify(
                    chat_id,
                    &format!(
                        "▶️ *Resuming file sending*\n\n📚 Subject: *{requested}*\n📊 Continuing from file {}/{total}",
                        (cursor + 1).min(total)
                    ),
                )
                .await;
                self.ensure_drain(chat_id, handle, token).await;
                DeliveryOutcome::Resumed { cursor, total }
            }
            Err(active) => {
                let prefix = &self.inner.options.bot_prefix;
                self.notify(
                    chat_id,
                    &format!("❌ No paused session for *{requested}*\n\nYou have a paused session for *{active}*\nUse: {prefix}resume {active}"),
                )
                .await;
                DeliveryOutcome::CodeMismatch { requested, active }
            }
        }
    }

    /// Raise the batch limit by the configured increment and keep sending
    pub async fn more(&self, chat_id: &str) -> DeliveryOutcome {
        let Some((handle, token)) = self.inner.registry.get_with_token(&chat_id.to_string()).await
        else {
            self.notify(chat_id, "❌ No previous search to continue.").await;
            return DeliveryOutcome::NoSession;
        };

        let increment = self.inner.options.more_increment;
        let batch_limit = {
            let mut session = handle.lock().await;
            if session.is_complete() {
                None
            } else {
                session.extend_batch(increment);
                Some(session.batch_limit())
            }
        };

        let Some(batch_limit) = batch_limit else {
            self.notify(chat_id, "✅ All files from previous search have been sent.")
                .await;
            return DeliveryOutcome::AllSent;
        };

        info!(chat_id = %chat_id, %batch_limit, "Sending more files");
        self.notify(chat_id, &format!("🔄 Sending {increment} more files..."))
            .await;
        self.ensure_drain(chat_id, handle, token).await;
        DeliveryOutcome::MoreQueued { batch_limit }
    }

    /// Wait until no drain task is running for the chat
    pub async fn wait_for_drain(&self, chat_id: &str) {
        let id = chat_id.to_string();
        while let Some(handle) = self.inner.registry.take_drain_handle(&id).await {
            if let Err(e) = handle.await {
                error!(chat_id = %chat_id, error = %e, "Drain task panicked");
            }
        }
    }

    /// Cancel all drains and drop every session
    pub async fn shutdown(&self) {
        self.inner.registry.shutdown().await;
    }

    /// Spawn a drain unless one already owns the session or nothing is sendable
    async fn ensure_drain(&self, chat_id: &str, handle: SessionHandle, token: CancellationToken) {
        {
            let mut session = handle.lock().await;
            if session.draining || session.next_file().is_none() {
                debug!(chat_id = %chat_id, draining = session.draining, "Drain not started");
                return;
            }
            session.draining = true;
        }

        let task = tokio::spawn(drain(
            self.inner.clone(),
            chat_id.to_string(),
            handle.clone(),
            token,
        ));
        self.inner
            .registry
            .set_drain_handle(&chat_id.to_string(), &handle, task)
            .await;
    }

    async fn notify(&self, chat_id: &str, text: &str) {
        self.inner.notify(chat_id, text).await;
    }
}

impl<T: ChatTransport + 'static> Inner<T> {
    async fn notify(&self, chat_id: &str, text: &str) {
        if let Err(e) = self.transport.send_text(chat_id, text).await {
            warn!(chat_id = %chat_id, error = %e, "Failed to send chat notice");
        }
    }

    /// Fetch the bytes of one entry and send them as a document
    async fn deliver_file(&self, chat_id: &str, file: &FileEntry) -> Result<(), DeliveryError> {
        let document = match &file.location {
            FileLocation::Local { path } => {
                let bytes = self
                    .local
                    .read(path)
                    .await
                    .map_err(|source| DeliveryError::Read {
                        name: file.name.clone(),
                        source,
                    })?;
                OutgoingDocument {
                    bytes,
                    file_name: file.name.clone(),
                    mime_type: file.mime_type.to_string(),
                }
            }
            FileLocation::Remote { .. } => {
                let downloaded = self.remote.download(file).await?;
                OutgoingDocument {
                    bytes: downloaded.bytes,
                    file_name: downloaded.name,
                    mime_type: downloaded.mime_type.to_string(),
                }
            }
        };

        self.transport.send_document(chat_id, document).await?;
        Ok(())
    }
}

/// Send files until the session is paused, stalled, complete or superseded.
///
/// Checks before every file that `session` is still the chat's registered
/// session, so a superseded drain never sends past its in-flight file.
async fn drain<T: ChatTransport + 'static>(
    inner: Arc<Inner<T>>,
    chat_id: String,
    session: SessionHandle,
    token: CancellationToken,
) {
    loop {
        if token.is_cancelled() || !inner.registry.is_current(&chat_id, &session).await {
            debug!(chat_id = %chat_id, "Drain superseded");
            return;
        }

        let next = {
            let mut guard = session.lock().await;
            let next = guard.next_file().cloned();
            if next.is_none() {
                guard.draining = false;
            }
            next
        };
        let Some(file) = next else {
            break;
        };

        match inner.deliver_file(&chat_id, &file).await {
            Ok(()) => {
                info!(chat_id = %chat_id, file_name = %file.name, source = %file.source(), "File sent");
                inner.stats.record_file_share(&file.name, &chat_id);
            }
            Err(e) => {
                error!(chat_id = %chat_id, file_name = %file.name, error = %e, "Failed to send file");
                inner.stats.record_error(&e.to_string(), &format!("send {}", file.name));
                inner
                    .notify(&chat_id, &format!("❌ Failed to send: {}", file.name))
                    .await;
            }
        }

        session.lock().await.advance();

        tokio::select! {
            () = token.cancelled() => return,
            () = tokio::time::sleep(inner.options.send_delay) => {}
        }
    }

    let (complete, code, cursor, total) = {
        let guard = session.lock().await;
        (
            guard.is_complete(),
            guard.subject_code().to_string(),
            guard.cursor(),
            guard.total(),
        )
    };

    if complete {
        if inner.registry.remove_if_current(&chat_id, &session).await {
            info!(chat_id = %chat_id, subject_code = %code, total, "File sending session completed");
        }
    } else {
        info!(chat_id = %chat_id, subject_code = %code, cursor, total, "File sending halted");
    }
}

/// Keep the first entry of each file name
fn dedup_by_name(files: impl IntoIterator<Item = FileEntry>) -> Vec<FileEntry> {
    let mut seen = HashSet::new();
    files
        .into_iter()
        .filter(|f| seen.insert(f.name.clone()))
        .collect()
}

/// Session order for a search.
///
/// `All` uses the plain category order. A page limit puts the prioritized
/// short-list first and appends the remaining files in category order.
#[must_use]
pub fn rank_for_limit(categorized: &CategorizedFiles, limit: SearchLimit, cap: usize) -> Vec<FileEntry> {
    let all = rank_all(categorized);
    match limit {
        SearchLimit::All => all,
        SearchLimit::Page(_) => {
            let mut ranked = prioritize(categorized, cap);
            let shown: HashSet<String> = ranked.iter().map(|f| f.name.clone()).collect();
            ranked.extend(all.into_iter().filter(|f| !shown.contains(&f.name)));
            ranked
        }
    }
}

fn not_found_text(code: &str, keywords: &str, owner: &str) -> String {
    let keywords = keywords.trim();
    let filter = if keywords.is_empty() {
        String::new()
    } else {
        format!(" with keywords \"{keywords}\"")
    };
    let contact = if owner.is_empty() {
        "👤 Please contact a group admin for assistance.".to_string()
    } else {
        format!("👤 Please contact the Owner for assistance:\n@{owner}")
    };
    format!("❌ *No files found* for *{code}*{filter}\n\n{contact}")
}

fn started_text(code: &str, found: usize, sending: usize, limit: SearchLimit, more: bool) -> String {
    let count = match limit {
        SearchLimit::All => "ALL".to_string(),
        SearchLimit::Page(_) => sending.to_string(),
    };
    let hint = if more {
        "\n\n💡 _Type \"send more\" or \"more files\" to get additional files._"
    } else {
        ""
    };
    format!(
        "📚 *Found {found} files* for {code}\n🚀 Sending {count} files...{hint}\n\n⏳ *Please wait for files to arrive.*"
    )
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started { found, sending, .. } => write!(f, "started ({sending}/{found})"),
            Self::NotFound => write!(f, "not found"),
            Self::Paused { cursor, total } => write!(f, "paused at {cursor}/{total}"),
            Self::Resumed { cursor, total } => write!(f, "resumed at {cursor}/{total}"),
            Self::MoreQueued { batch_limit } => write!(f, "batch limit raised to {batch_limit}"),
            Self::AllSent => write!(f, "all sent"),
            Self::NoSession => write!(f, "no session"),
            Self::CodeMismatch { requested, active } => {
                write!(f, "code mismatch ({requested} != {active})")
            }
        }
    }
}
