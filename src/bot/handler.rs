//! Inbound message dispatch
//!
//! Order per message: statistics, group moderation, commands, "more"
//! requests, subject-code file requests, AI answers.

use super::commands::{help_text, AiCommand, Command, Feature, WarnReset};
use crate::ai::{is_contact_request, should_use_ai, AiClient, DM_INSTRUCTION, GROUP_INSTRUCTION};
use crate::config::Settings;
use crate::delivery::{DeliveryManager, RemoteFiles, SearchLimit};
use crate::files::LocalFileIndex;
use crate::intent::{detect_file_request, is_more_request, parse_command};
use crate::moderation::{
    formatted_warning, ChatLock, LinkModerator, SpamTracker, WarningTracker, WARNING_LIMIT_RANGE,
};
use crate::stats::BotStats;
use crate::store::Stores;
use crate::transport::{ChatTransport, GroupAdmin, IncomingMessage};
use crate::utils::jid_user;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Everything the handler needs
pub struct HandlerContext<T: ChatTransport + GroupAdmin + 'static> {
    /// Application settings
    pub settings: Arc<Settings>,
    /// Outbound transport and group administration
    pub transport: Arc<T>,
    /// File delivery sessions
    pub delivery: DeliveryManager<T>,
    /// Local file share
    pub local: LocalFileIndex,
    /// Drive provider, for listing counts
    pub remote: Arc<dyn RemoteFiles>,
    /// Persistent stores
    pub stores: Arc<Stores>,
    /// Usage counters
    pub stats: Arc<BotStats>,
    /// Gemini client
    pub ai: Arc<AiClient>,
}

/// Role of the sender in the chat
#[derive(Debug, Clone, Copy, Default)]
struct Role {
    owner: bool,
    admin: bool,
}

impl Role {
    const fn privileged(self) -> bool {
        self.owner || self.admin
    }
}

/// Dispatches inbound messages
pub struct MessageHandler<T: ChatTransport + GroupAdmin + 'static> {
    ctx: HandlerContext<T>,
    spam: SpamTracker,
}

impl<T: ChatTransport + GroupAdmin + 'static> MessageHandler<T> {
    /// Create a handler
    #[must_use]
    pub fn new(ctx: HandlerContext<T>) -> Self {
        Self {
            ctx,
            spam: SpamTracker::new(),
        }
    }

    /// Delivery manager, for shutdown
    #[must_use]
    pub const fn delivery(&self) -> &DeliveryManager<T> {
        &self.ctx.delivery
    }

    /// Handle one inbound message
    pub async fn handle(&self, msg: &IncomingMessage) {
        let text = msg.text.trim();
        if text.is_empty() {
            return;
        }
        self.ctx.stats.record_message();

        let prefix = self.ctx.settings.bot_prefix.as_str();
        let command = parse_command(text, prefix);

        // Our own account only issues commands; its status replies must not
        // trigger searches
        if msg.is_from_me && command.is_none() {
            return;
        }

        let role = self.role(msg).await;

        if msg.is_group && !role.privileged() && self.moderate(msg).await {
            return;
        }

        if let Some((name, args)) = command {
            if let Some(command) = Command::parse(&name, &args) {
                info!(chat_id = %msg.chat_id, sender = %msg.sender, command = %name, "Executing command");
                let chat = msg.is_group.then_some(msg.chat_id.as_str());
                self.ctx.stats.record_command(&name, &msg.sender, chat);
                self.run_command(msg, command, role).await;
                return;
            }
            debug!(command = %name, "Unknown command");
        }

        if is_more_request(text) {
            self.ctx.delivery.more(&msg.chat_id).await;
            return;
        }

        if let Some(request) = detect_file_request(text) {
            if !self.feature_enabled(&msg.chat_id, Feature::FileSharing) {
                debug!(chat_id = %msg.chat_id, "File sharing disabled for chat");
                return;
            }
            info!(
                chat_id = %msg.chat_id,
                subject_code = %request.subject_code,
                keywords = %request.keywords,
                all = request.all,
                "File search"
            );
            let limit = if request.all {
                SearchLimit::All
            } else {
                SearchLimit::default()
            };
            self.ctx
                .delivery
                .search(&msg.chat_id, &request.subject_code, &request.keywords, limit)
                .await;
            return;
        }

        self.answer_with_ai(msg).await;
    }

    async fn role(&self, msg: &IncomingMessage) -> Role {
        let owner = msg.is_from_me || self.ctx.settings.is_owner(&msg.sender);
        let admin = if msg.is_group && !owner {
            match self
                .ctx
                .transport
                .is_group_admin(&msg.chat_id, &msg.sender)
                .await
            {
                Ok(admin) => admin,
                Err(e) => {
                    warn!(chat_id = %msg.chat_id, error = %e, "Admin lookup failed");
                    false
                }
            }
        } else {
            false
        };
        Role { owner, admin }
    }

    fn feature_enabled(&self, chat_id: &str, feature: Feature) -> bool {
        let settings = &self.ctx.settings;
        let default = match feature {
            Feature::FileSharing => settings.feature_file_sharing,
            Feature::AntiLink => settings.feature_link_moderation,
            Feature::AntiSpam => settings.feature_antispam,
            Feature::HandleGroup => false,
        };
        self.ctx
            .stores
            .settings
            .get_bool(&format!("{chat_id}.{}", feature.key()), default)
    }

    async fn reply(&self, chat_id: &str, text: &str) {
        if let Err(e) = self.ctx.transport.send_text(chat_id, text).await {
            warn!(chat_id = %chat_id, error = %e, "Failed to send reply");
        }
    }

    /// Apply chat lock, spam and link rules; returns true if the message
    /// was handled and must not be processed further
    async fn moderate(&self, msg: &IncomingMessage) -> bool {
        let chat = msg.chat_id.as_str();
        let user = msg.sender.as_str();
        let mention = jid_user(user);
        let stores = &self.ctx.stores;

        let lock = ChatLock::new(&stores.vip);
        if lock.is_locked(chat, user) {
            match lock.record_message(chat, user) {
                Ok(true) => {
                    self.kick(chat, user, &format!("🚫 @{mention} has been kicked due to chat lock."))
                        .await;
                }
                Ok(false) => self.delete(msg).await,
                Err(e) => error!(error = %e, "Failed to update chat lock"),
            }
            return true;
        }

        if self.feature_enabled(chat, Feature::AntiSpam) && self.spam.check(user, &msg.text) {
            self.kick(chat, user, &format!("🚫 @{mention} kicked for spamming."))
                .await;
            return true;
        }

        if !self.feature_enabled(chat, Feature::AntiLink) {
            return false;
        }
        let Some(verdict) = LinkModerator.check(&msg.text) else {
            return false;
        };
        info!(chat_id = %chat, sender = %user, violation = ?verdict.violation, "Moderation violation");

        if verdict.delete {
            self.delete(msg).await;
        }
        if let Some(clean) = &verdict.clean_text {
            self.reply(chat, &format!("@{mention}: {clean}")).await;
        }

        if !verdict.warn {
            self.reply(chat, &formatted_warning(mention, &verdict.notice, None))
                .await;
            return true;
        }

        let warnings = self.warnings();
        let status = match warnings.add(chat, user) {
            Ok(status) => status,
            Err(e) => {
                error!(error = %e, "Failed to record warning");
                return true;
            }
        };
        self.reply(chat, &formatted_warning(mention, &verdict.notice, Some(status)))
            .await;

        if status.should_kick()
            && self
                .kick(chat, user, &format!("🚫 @{mention} has been removed for repeated violations."))
                .await
        {
            if let Err(e) = warnings.reset(chat, user) {
                error!(error = %e, "Failed to reset warnings");
            }
        }
        true
    }

    async fn delete(&self, msg: &IncomingMessage) {
        if let Err(e) = self
            .ctx
            .transport
            .delete_message(&msg.chat_id, &msg.id, &msg.sender)
            .await
        {
            warn!(chat_id = %msg.chat_id, error = %e, "Failed to delete message");
        }
    }

    /// Remove `user` and announce it; returns true on success
    async fn kick(&self, chat: &str, user: &str, notice: &str) -> bool {
        match self.ctx.transport.remove_participant(chat, user).await {
            Ok(()) => {
                self.reply(chat, notice).await;
                true
            }
            Err(e) => {
                error!(chat_id = %chat, user = %user, error = %e, "Failed to remove participant");
                self.ctx.stats.record_error(&e.to_string(), "remove participant");
                self.reply(chat, "❌ Failed to remove user. Please check my admin permissions.")
                    .await;
                false
            }
        }
    }

    async fn run_command(&self, msg: &IncomingMessage, command: Command, role: Role) {
        let chat = msg.chat_id.as_str();
        let prefix = self.ctx.settings.bot_prefix.as_str();

        if command.group_only() && !msg.is_group {
            self.reply(chat, "❌ This command can only be used in groups.")
                .await;
            return;
        }
        if command.requires_admin() && !role.privileged() {
            self.reply(chat, "❌ Only admins can use this command.").await;
            return;
        }

        match command {
            Command::Help => {
                let text = help_text(&self.ctx.settings.bot_name, prefix, role.privileged());
                self.reply(chat, &text).await;
            }
            Command::Ping => self.reply(chat, "🏓 Pong! Bot is running.").await,
            Command::Files => self.list_local_files(chat).await,
            Command::AllFiles => self.count_all_files(chat).await,
            Command::Stop => {
                self.ctx.delivery.stop(chat).await;
            }
            Command::Resume(None) => {
                self.reply(
                    chat,
                    &format!("❌ Please specify subject code\n\nUsage: {prefix}resume CS101"),
                )
                .await;
            }
            Command::Resume(Some(code)) => {
                self.ctx.delivery.resume(chat, &code).await;
            }
            Command::More => {
                self.ctx.delivery.more(chat).await;
            }
            Command::Stats => {
                let report = self.ctx.stats.report(&self.ctx.settings.bot_name);
                self.reply(chat, &report).await;
            }
            Command::Toggle(feature, value) => self.toggle(chat, feature, value).await,
            Command::SetWarnLimit(limit) => self.set_warn_limit(chat, limit).await,
            Command::Lock(target) => self.set_lock(chat, target, true).await,
            Command::Unlock(target) => self.set_lock(chat, target, false).await,
            Command::ShowWarn(target) => self.show_warnings(chat, target).await,
            Command::WarnList => self.list_warnings(chat).await,
            Command::ResetWarn(target) => self.reset_warnings(chat, target).await,
            Command::Kick(None) => {
                self.reply(chat, "❌ Please give the number of the member to kick.")
                    .await;
            }
            Command::Kick(Some(target)) => {
                self.kick(chat, &target, "👞 User kicked successfully.").await;
            }
            Command::Ai(ai) => self.ai_command(msg, ai).await,
        }
    }

    async fn list_local_files(&self, chat: &str) {
        if !self.feature_enabled(chat, Feature::FileSharing) {
            self.reply(chat, "❌ File sharing is currently disabled.").await;
            return;
        }
        let index = self.ctx.local.clone();
        let listing = tokio::task::spawn_blocking(move || index.formatted_listing())
            .await
            .unwrap_or_else(|e| {
                error!(error = %e, "File listing task failed");
                "❌ Could not read the file list.".to_string()
            });
        self.reply(chat, &listing).await;
    }

    async fn count_all_files(&self, chat: &str) {
        let index = self.ctx.local.clone();
        let local = tokio::task::spawn_blocking(move || index.list_files().len())
            .await
            .unwrap_or_default();
        let remote = self.ctx.remote.cached_file_count().await;
        let text = format!(
            "📁 *ALL AVAILABLE FILES*\n\n📂 *Local Storage:* {local} files\n☁️ *Google Drive:* {remote} files\n📊 *Total:* {} files",
            local + remote
        );
        self.reply(chat, &text).await;
    }

    async fn set_warn_limit(&self, chat: &str, limit: Option<u32>) {
        let Some(limit) = limit else {
            let prefix = &self.ctx.settings.bot_prefix;
            self.reply(
                chat,
                &format!("⚠️ Usage: {prefix}setwarnlimit <number>\nExample: {prefix}setwarnlimit 5"),
            )
            .await;
            return;
        };
        if !WARNING_LIMIT_RANGE.contains(&limit) {
            self.reply(chat, "❌ Limit must be between 1 and 10.").await;
            return;
        }
        match self
            .ctx
            .stores
            .settings
            .set(&format!("{chat}.warningLimit"), limit)
        {
            Ok(()) => {
                self.reply(
                    chat,
                    &format!("⚠️ *Warning Limit Set*\n\nNew Limit: {limit} warnings = Action (Kick)"),
                )
                .await;
            }
            Err(e) => self.store_failed(chat, &e).await,
        }
    }

    fn warnings(&self) -> WarningTracker<'_> {
        WarningTracker::new(
            &self.ctx.stores.warnings,
            &self.ctx.stores.settings,
            self.ctx.settings.default_warning_limit,
        )
    }

    async fn show_warnings(&self, chat: &str, target: Option<String>) {
        let Some(target) = target else {
            let prefix = &self.ctx.settings.bot_prefix;
            self.reply(
                chat,
                &format!("📜 *Warning System*\n\nUsage:\n{prefix}warnlist - See all warned users\n{prefix}showwarn <number> - Check user warnings"),
            )
            .await;
            return;
        };
        let warnings = self.warnings();
        let text = format!(
            "⚠️ *Warning Status*\n\nUser: @{}\nWarnings: {} / {}",
            jid_user(&target),
            warnings.count(chat, &target),
            warnings.limit(chat)
        );
        self.reply(chat, &text).await;
    }

    async fn list_warnings(&self, chat: &str) {
        let warned = self.warnings().list(chat);
        if warned.is_empty() {
            self.reply(chat, "✅ No active warnings in this group.").await;
            return;
        }
        let lines: Vec<String> = warned
            .iter()
            .enumerate()
            .map(|(i, (user, count))| format!("{}. @{} - *{count}*", i + 1, jid_user(user)))
            .collect();
        let prefix = &self.ctx.settings.bot_prefix;
        let text = format!(
            "⚠️ *Warned Users List*\n\n{}\n\nTo reset all: {prefix}resetwarn all",
            lines.join("\n")
        );
        self.reply(chat, &text).await;
    }

    async fn reset_warnings(&self, chat: &str, target: Option<WarnReset>) {
        let warnings = self.warnings();
        let result = match target {
            None => {
                let prefix = &self.ctx.settings.bot_prefix;
                self.reply(
                    chat,
                    &format!("❌ Usage:\n1. `{prefix}resetwarn <number>` to reset one member\n2. `{prefix}resetwarn all` to reset everyone."),
                )
                .await;
                return;
            }
            Some(WarnReset::All) => warnings.reset_all(chat).map(|cleared| {
                format!("♻️ *Group Reset*\n\nCleared warnings for {cleared} users.")
            }),
            Some(WarnReset::Member(user)) => warnings.reset(chat, &user).map(|()| {
                format!("♻️ *Warnings Reset*\n\nUser: @{}\nWarnings cleared.", jid_user(&user))
            }),
        };
        match result {
            Ok(text) => self.reply(chat, &text).await,
            Err(e) => self.store_failed(chat, &e).await,
        }
    }

    async fn toggle(&self, chat: &str, feature: Feature, value: Option<bool>) {
        let prefix = self.ctx.settings.bot_prefix.as_str();
        let title = feature.title();
        let Some(value) = value else {
            let status = on_off(self.feature_enabled(chat, feature));
            self.reply(
                chat,
                &format!("{title}\n\nCurrent Status: *{status}*\nUsage: {prefix}{} on/off", feature.command()),
            )
            .await;
            return;
        };

        match self
            .ctx
            .stores
            .settings
            .set(&format!("{chat}.{}", feature.key()), value)
        {
            Ok(()) => {
                info!(chat_id = %chat, feature = feature.key(), value, "Feature toggled");
                self.reply(
                    chat,
                    &format!("{title}\n\nStatus changed to: *{}*", on_off(value)),
                )
                .await;
            }
            Err(e) => self.store_failed(chat, &e).await,
        }
    }

    async fn set_lock(&self, chat: &str, target: Option<String>, locked: bool) {
        let Some(target) = target else {
            let prefix = &self.ctx.settings.bot_prefix;
            let name = if locked { "lock" } else { "unlock" };
            self.reply(
                chat,
                &format!("❌ Please give the member's number.\n\nUsage: {prefix}{name} 923001234567"),
            )
            .await;
            return;
        };

        match ChatLock::new(&self.ctx.stores.vip).set_locked(chat, &target, locked) {
            Ok(()) => {
                let user = jid_user(&target);
                let text = if locked {
                    format!("🔒 *User Locked*\n\nUser: @{user}\nAction: User will be kicked after 3 messages.")
                } else {
                    format!("🔓 *User Unlocked*\n\nUser: @{user}")
                };
                self.reply(chat, &text).await;
            }
            Err(e) => self.store_failed(chat, &e).await,
        }
    }

    async fn store_failed(&self, chat: &str, e: &crate::store::StoreError) {
        error!(chat_id = %chat, error = %e, "Settings store write failed");
        self.ctx.stats.record_error(&e.to_string(), "settings store");
        self.reply(chat, "❌ An error occurred while saving the setting.")
            .await;
    }

    async fn ai_command(&self, msg: &IncomingMessage, command: AiCommand) {
        let chat = msg.chat_id.as_str();
        let value = match command {
            AiCommand::Usage => {
                let prefix = &self.ctx.settings.bot_prefix;
                self.reply(chat, &format!("🤖 Usage: {prefix}ai <question>"))
                    .await;
                return;
            }
            AiCommand::Ask(question) => {
                if !self.ai_available(chat) {
                    self.reply(chat, "❌ AI is not available in this chat.").await;
                    return;
                }
                self.ask(chat, &question, GROUP_INSTRUCTION).await;
                return;
            }
            AiCommand::On => true,
            AiCommand::Off => false,
        };

        match self
            .ctx
            .stores
            .settings
            .set(&format!("{chat}.ai_enabled"), value)
        {
            Ok(()) => {
                let text = if value {
                    "🔛 *AI Enabled*\n\nI will now reply to questions!"
                } else {
                    "📴 *AI Disabled*\n\nI will no longer reply to questions in this chat."
                };
                self.reply(chat, text).await;
            }
            Err(e) => self.store_failed(chat, &e).await,
        }
    }

    fn ai_available(&self, chat: &str) -> bool {
        self.ctx.settings.feature_ai_enabled
            && self.ctx.ai.is_configured()
            && self
                .ctx
                .stores
                .settings
                .get_bool(&format!("{chat}.ai_enabled"), true)
    }

    async fn ask(&self, chat: &str, question: &str, instruction: &str) {
        match self.ctx.ai.generate_response(question, instruction).await {
            Ok(Some(answer)) => self.reply(chat, &answer).await,
            Ok(None) => {}
            Err(e) => {
                error!(chat_id = %chat, error = %e, "AI request failed");
                self.ctx.stats.record_error(&e.to_string(), "ai");
            }
        }
    }

    /// Free-text fallback: DMs get an AI answer, groups only answer
    /// contact requests unless group handling is on
    async fn answer_with_ai(&self, msg: &IncomingMessage) {
        let chat = msg.chat_id.as_str();
        if !self.ai_available(chat) {
            return;
        }

        if !msg.is_group {
            let blocked = self
                .ctx
                .stores
                .settings
                .get::<Vec<String>>("ai_blocklist")
                .unwrap_or_default();
            if blocked.iter().any(|b| b == &msg.sender) {
                return;
            }
            self.ask(chat, &msg.text, DM_INSTRUCTION).await;
            return;
        }

        let owner = &self.ctx.settings.owner_help_number;
        if !owner.is_empty() && is_contact_request(&msg.text) {
            let text = format!(
                "🤖 *{}*\n\n📞 _Need human help? Contact:_\n🔗 *wa.me/{owner}*",
                self.ctx.settings.bot_name
            );
            self.reply(chat, &text).await;
            return;
        }

        if self.feature_enabled(chat, Feature::HandleGroup)
            && should_use_ai(&msg.text, &self.ctx.settings.bot_prefix)
        {
            self.ask(chat, &msg.text, GROUP_INSTRUCTION).await;
        }
    }
}

const fn on_off(value: bool) -> &'static str {
    if value {
        "ON"
    } else {
        "OFF"
    }
}
