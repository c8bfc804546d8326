//! In-memory counters and bounded activity logs for the `stats` command.

use crate::utils::jid_user;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Entries kept per activity log
pub const MAX_LOG_SIZE: usize = 100;

/// One executed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLogEntry {
    /// Time of execution
    pub time: DateTime<Utc>,
    /// Command name without prefix
    pub command: String,
    /// Sender phone number
    pub user: String,
    /// Chat the command came from, `DM` for private chats
    pub chat: String,
}

/// One delivered file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileShareLogEntry {
    /// Time of delivery
    pub time: DateTime<Utc>,
    /// Delivered file name
    pub file_name: String,
    /// Recipient chat
    pub chat: String,
}

/// One recorded error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLogEntry {
    /// Time of the failure
    pub time: DateTime<Utc>,
    /// Error text
    pub error: String,
    /// What was being done
    pub context: String,
}

#[derive(Debug, Default)]
struct ActivityLogs {
    commands: VecDeque<CommandLogEntry>,
    file_shares: VecDeque<FileShareLogEntry>,
    errors: VecDeque<ErrorLogEntry>,
}

/// Newest first, capped at [`MAX_LOG_SIZE`]
fn push_bounded<T>(log: &mut VecDeque<T>, entry: T) {
    log.push_front(entry);
    log.truncate(MAX_LOG_SIZE);
}

/// Process-wide bot statistics
#[derive(Debug)]
pub struct BotStats {
    started: Instant,
    messages_received: AtomicU64,
    commands_executed: AtomicU64,
    files_shared: AtomicU64,
    errors: AtomicU64,
    logs: RwLock<ActivityLogs>,
}

impl Default for BotStats {
    fn default() -> Self {
        Self::new()
    }
}

impl BotStats {
    /// Start counting from now
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            messages_received: AtomicU64::new(0),
            commands_executed: AtomicU64::new(0),
            files_shared: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            logs: RwLock::new(ActivityLogs::default()),
        }
    }

    /// Count one inbound message
    pub fn record_message(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Count and log one executed command
    pub fn record_command(&self, command: &str, sender: &str, chat: Option<&str>) {
        self.commands_executed.fetch_add(1, Ordering::Relaxed);
        let entry = CommandLogEntry {
            time: Utc::now(),
            command: command.to_string(),
            user: jid_user(sender).to_string(),
            chat: chat.unwrap_or("DM").to_string(),
        };
        let mut logs = self.logs.write().unwrap_or_else(PoisonError::into_inner);
        push_bounded(&mut logs.commands, entry);
    }

    /// Count and log one delivered file
    pub fn record_file_share(&self, file_name: &str, chat: &str) {
        self.files_shared.fetch_add(1, Ordering::Relaxed);
        let entry = FileShareLogEntry {
            time: Utc::now(),
            file_name: file_name.to_string(),
            chat: chat.to_string(),
        };
        let mut logs = self.logs.write().unwrap_or_else(PoisonError::into_inner);
        push_bounded(&mut logs.file_shares, entry);
    }

    /// Count and log one error
    pub fn record_error(&self, error: &str, context: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        let entry = ErrorLogEntry {
            time: Utc::now(),
            error: error.to_string(),
            context: context.to_string(),
        };
        let mut logs = self.logs.write().unwrap_or_else(PoisonError::into_inner);
        push_bounded(&mut logs.errors, entry);
    }

    /// Inbound messages seen
    #[must_use]
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    /// Commands executed
    #[must_use]
    pub fn commands_executed(&self) -> u64 {
        self.commands_executed.load(Ordering::Relaxed)
    }

    /// Files delivered
    #[must_use]
    pub fn files_shared(&self) -> u64 {
        self.files_shared.load(Ordering::Relaxed)
    }

    /// Errors recorded
    #[must_use]
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Most recent file shares, newest first
    #[must_use]
    pub fn recent_file_shares(&self, limit: usize) -> Vec<FileShareLogEntry> {
        let logs = self.logs.read().unwrap_or_else(PoisonError::into_inner);
        logs.file_shares.iter().take(limit).cloned().collect()
    }

    /// Most recent commands, newest first
    #[must_use]
    pub fn recent_commands(&self, limit: usize) -> Vec<CommandLogEntry> {
        let logs = self.logs.read().unwrap_or_else(PoisonError::into_inner);
        logs.commands.iter().take(limit).cloned().collect()
    }

    /// Most recent errors, newest first
    #[must_use]
    pub fn recent_errors(&self, limit: usize) -> Vec<ErrorLogEntry> {
        let logs = self.logs.read().unwrap_or_else(PoisonError::into_inner);
        logs.errors.iter().take(limit).cloned().collect()
    }

    /// Uptime as `1d 2h 3m 4s`
    #[must_use]
    pub fn uptime(&self) -> String {
        format_uptime(self.started.elapsed())
    }

    /// Text for the `stats` command
    #[must_use]
    pub fn report(&self, bot_name: &str) -> String {
        let mut text = format!(
            "📊 *{bot_name} Stats*\n\n⏱️ Uptime: {}\n💬 Messages: {}\n⚡ Commands: {}\n📁 Files shared: {}\n❌ Errors: {}",
            self.uptime(),
            self.messages_received(),
            self.commands_executed(),
            self.files_shared(),
            self.errors(),
        );

        let shares = self.recent_file_shares(5);
        if !shares.is_empty() {
            text.push_str("\n\n📤 *Recent files*");
            for share in shares {
                text.push_str(&format!(
                    "\n• {} ({})",
                    share.file_name,
                    share.time.format("%H:%M")
                ));
            }
        }
        text
    }
}

/// Render a duration as `1d 2h 3m 4s`, omitting leading zero units.
#[must_use]
pub fn format_uptime(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs();
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    parts.push(format!("{secs}s"));
    parts.join(" ")
}
