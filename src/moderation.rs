//! Group moderation rules
//!
//! Link filtering, status-mention detection, persistent warning counters and
//! an in-memory repeated-message tracker.

use crate::store::{JsonStore, StoreError};
use lazy_regex::{lazy_regex, regex};
use regex::Regex;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

static RE_WHATSAPP_GROUP: lazy_regex::Lazy<Regex> =
    lazy_regex!(r"(?i)chat\.whatsapp\.com/[A-Za-z0-9]+");
static RE_WHATSAPP_CHANNEL: lazy_regex::Lazy<Regex> =
    lazy_regex!(r"(?i)whatsapp\.com/channel/[A-Za-z0-9_-]+");

static RE_FACEBOOK: lazy_regex::Lazy<Regex> =
    lazy_regex!(r"(?i)\b(facebook\.com|fb\.com|fb\.me|m\.facebook\.com)/\S*");
static RE_INSTAGRAM: lazy_regex::Lazy<Regex> = lazy_regex!(r"(?i)\b(instagram\.com|instagr\.am)/\S*");
static RE_TIKTOK: lazy_regex::Lazy<Regex> = lazy_regex!(r"(?i)\b(tiktok\.com|vm\.tiktok\.com)/\S*");
static RE_TWITTER: lazy_regex::Lazy<Regex> = lazy_regex!(r"(?i)\b(twitter\.com|x\.com|t\.co)/\S*");
static RE_TELEGRAM: lazy_regex::Lazy<Regex> = lazy_regex!(r"(?i)\b(t\.me|telegram\.me)/\S*");
static RE_SNAPCHAT: lazy_regex::Lazy<Regex> = lazy_regex!(r"(?i)\bsnapchat\.com/\S*");

/// Blocked social platforms, checked in order
static SOCIAL_RULES: [(&lazy_regex::Lazy<Regex>, &str); 6] = [
    (&RE_FACEBOOK, "Facebook"),
    (&RE_INSTAGRAM, "Instagram"),
    (&RE_TIKTOK, "TikTok"),
    (&RE_TWITTER, "Twitter/X"),
    (&RE_TELEGRAM, "Telegram"),
    (&RE_SNAPCHAT, "Snapchat"),
];

/// Window in which identical messages count as spam
pub const SPAM_WINDOW: Duration = Duration::from_secs(5);
/// Identical messages within the window that trigger a kick
pub const SPAM_REPEAT_LIMIT: u32 = 3;
/// Messages a locked member may send before being removed
pub const LOCK_KICK_THRESHOLD: u32 = 3;
/// Warning limits an admin may configure
pub const WARNING_LIMIT_RANGE: RangeInclusive<u32> = 1..=10;

/// Kind of link violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// WhatsApp group invite
    WhatsAppGroup,
    /// WhatsApp channel link
    WhatsAppChannel,
    /// Blocked social platform, with its display name
    SocialMedia(&'static str),
    /// Asking members to look at a status
    StatusMention,
}

/// What to do with a violating message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationVerdict {
    /// Rule that matched
    pub violation: Violation,
    /// Delete the original message
    pub delete: bool,
    /// Count a warning against the sender
    pub warn: bool,
    /// Message text with the offending link removed, if it may be reposted
    pub clean_text: Option<String>,
    /// Notice sent to the chat
    pub notice: String,
}

/// Link rules for group messages
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkModerator;

impl LinkModerator {
    /// Check a message, `None` if it is allowed.
    ///
    /// Rules apply in order: group invites, channel links, social platforms,
    /// status mentions. YouTube links match no rule.
    #[must_use]
    pub fn check(self, text: &str) -> Option<ModerationVerdict> {
        if text.is_empty() {
            return None;
        }

        if RE_WHATSAPP_GROUP.is_match(text) {
            return Some(ModerationVerdict {
                violation: Violation::WhatsAppGroup,
                delete: true,
                warn: true,
                clean_text: None,
                notice: "⚠️ *WhatsApp Group links are not allowed!*\n\n🚫 Your message was deleted.\n📌 Please follow group rules.".to_string(),
            });
        }

        if RE_WHATSAPP_CHANNEL.is_match(text) {
            let clean = RE_WHATSAPP_CHANNEL.replace_all(text, "[Channel Link Removed]");
            return Some(ModerationVerdict {
                violation: Violation::WhatsAppChannel,
                delete: true,
                warn: false,
                clean_text: Some(clean.into_owned()),
                notice: "⚠️ *WhatsApp Channel links are restricted!*\n\n📝 Your message was sent without the channel link.\n💡 Please share content directly instead of channel links.".to_string(),
            });
        }

        if let Some((_, name)) = SOCIAL_RULES.iter().find(|(re, _)| re.is_match(text)) {
            return Some(ModerationVerdict {
                violation: Violation::SocialMedia(name),
                delete: true,
                warn: true,
                clean_text: None,
                notice: format!(
                    "⚠️ *{name} links are not allowed!*\n\n🚫 Your message was deleted.\n📌 Only YouTube links are permitted."
                ),
            });
        }

        if has_status_mention(text) {
            return Some(ModerationVerdict {
                violation: Violation::StatusMention,
                delete: true,
                warn: false,
                clean_text: None,
                notice: "⚠️ *Status mentions are not allowed!*\n\n🚫 Please don't ask people to check your status.\n📌 Share content directly in the group if needed.".to_string(),
            });
        }

        None
    }
}

/// Returns true for "check my status", "status dekho" and similar
#[must_use]
pub fn has_status_mention(text: &str) -> bool {
    regex!(r"(?i)check\s*(my|out)?\s*status|see\s*(my)?\s*status|view\s*(my)?\s*status|dekho\s*(mera)?\s*status|status\s*dekho|status\s*lagaya|dp\s*(dekho|check)")
        .is_match(text)
}

/// Result of recording a warning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarningStatus {
    /// Warnings after this one
    pub count: u32,
    /// Limit for the chat
    pub limit: u32,
}

impl WarningStatus {
    /// Returns true once the member should be removed
    #[must_use]
    pub const fn should_kick(self) -> bool {
        self.count >= self.limit
    }
}

/// Warning counters persisted in the warnings store
pub struct WarningTracker<'a> {
    warnings: &'a JsonStore,
    settings: &'a JsonStore,
    default_limit: u32,
}

impl<'a> WarningTracker<'a> {
    /// Tracker reading per-chat limits from `settings`
    #[must_use]
    pub const fn new(warnings: &'a JsonStore, settings: &'a JsonStore, default_limit: u32) -> Self {
        Self {
            warnings,
            settings,
            default_limit,
        }
    }

    /// Warning limit of a chat (`<chat>.warningLimit`)
    #[must_use]
    pub fn limit(&self, chat_id: &str) -> u32 {
        self.settings
            .get::<u32>(&format!("{chat_id}.warningLimit"))
            .filter(|limit| *limit > 0)
            .unwrap_or(self.default_limit)
    }

    /// Current warnings of a member
    #[must_use]
    pub fn count(&self, chat_id: &str, user: &str) -> u32 {
        self.warnings
            .get::<u32>(&warning_key(chat_id, user))
            .unwrap_or(0)
    }

    /// Record one warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn add(&self, chat_id: &str, user: &str) -> Result<WarningStatus, StoreError> {
        let count = self.count(chat_id, user).saturating_add(1);
        self.warnings.set(&warning_key(chat_id, user), count)?;
        Ok(WarningStatus {
            count,
            limit: self.limit(chat_id),
        })
    }

    /// Clear the member's warnings.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn reset(&self, chat_id: &str, user: &str) -> Result<(), StoreError> {
        self.warnings.delete(&warning_key(chat_id, user))
    }

    /// Members of the chat with at least one warning, ordered by JID
    #[must_use]
    pub fn list(&self, chat_id: &str) -> Vec<(String, u32)> {
        let prefix = warning_key(chat_id, "");
        let mut warned: Vec<(String, u32)> = self
            .warnings
            .all()
            .into_iter()
            .filter_map(|(key, value)| {
                let user = key.strip_prefix(&prefix)?.to_string();
                let count = u32::try_from(value.as_u64()?).ok()?;
                (count > 0).then_some((user, count))
            })
            .collect();
        warned.sort();
        warned
    }

    /// Clear every warning in the chat; returns the number of members
    /// cleared.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn reset_all(&self, chat_id: &str) -> Result<usize, StoreError> {
        let prefix = warning_key(chat_id, "");
        let keys: Vec<String> = self
            .warnings
            .all()
            .into_iter()
            .map(|(key, _)| key)
            .filter(|key| key.starts_with(&prefix))
            .collect();
        for key in &keys {
            self.warnings.delete(key)?;
        }
        Ok(keys.len())
    }
}

fn warning_key(chat_id: &str, user: &str) -> String {
    format!("{chat_id}.{user}")
}

/// Notice text with the member mention and warning count
#[must_use]
pub fn formatted_warning(user: &str, notice: &str, status: Option<WarningStatus>) -> String {
    match status {
        Some(status) => format!(
            "@{user}\n\n{notice}\n\n📊 Warnings: {}/{}",
            status.count, status.limit
        ),
        None => format!("@{user}\n\n{notice}"),
    }
}

/// Chat locks persisted in the vip store
pub struct ChatLock<'a> {
    vip: &'a JsonStore,
}

impl<'a> ChatLock<'a> {
    /// Lock tracker over the vip store
    #[must_use]
    pub const fn new(vip: &'a JsonStore) -> Self {
        Self { vip }
    }

    /// Returns true if the member is locked in the chat
    #[must_use]
    pub fn is_locked(&self, chat_id: &str, user: &str) -> bool {
        self.vip.get_bool(&format!("{chat_id}.{user}.locked"), false)
    }

    /// Lock or unlock a member.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn set_locked(&self, chat_id: &str, user: &str, locked: bool) -> Result<(), StoreError> {
        self.vip.set(&format!("{chat_id}.{user}.locked"), locked)?;
        if !locked {
            self.vip.delete(&format!("{chat_id}.{user}.lockCount"))?;
        }
        Ok(())
    }

    /// Count one message of a locked member; returns true when the member
    /// must be removed, after which the lock is cleared.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn record_message(&self, chat_id: &str, user: &str) -> Result<bool, StoreError> {
        let key = format!("{chat_id}.{user}.lockCount");
        let count = self.vip.get::<u32>(&key).unwrap_or(0).saturating_add(1);
        if count >= LOCK_KICK_THRESHOLD {
            self.set_locked(chat_id, user, false)?;
            return Ok(true);
        }
        self.vip.set(&key, count)?;
        Ok(false)
    }
}

#[derive(Debug)]
struct SpamEntry {
    text: String,
    at: Instant,
    count: u32,
}

/// Repeated-message detector keyed by sender
#[derive(Debug, Default)]
pub struct SpamTracker {
    entries: Mutex<HashMap<String, SpamEntry>>,
}

impl SpamTracker {
    /// Create an empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message; returns true when the sender should be removed
    pub fn check(&self, sender: &str, text: &str) -> bool {
        self.check_at(sender, text, Instant::now())
    }

    /// Record a message observed at `now`
    pub fn check_at(&self, sender: &str, text: &str, now: Instant) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = entries.get_mut(sender) {
            if entry.text == text && now.saturating_duration_since(entry.at) < SPAM_WINDOW {
                entry.count += 1;
                if entry.count >= SPAM_REPEAT_LIMIT {
                    entries.remove(sender);
                    return true;
                }
                return false;
            }
        }

        entries.insert(
            sender.to_string(),
            SpamEntry {
                text: text.to_string(),
                at: now,
                count: 1,
            },
        );
        false
    }
}
